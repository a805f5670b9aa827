use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Persisted source-to-translation map, written after every new entry so
/// an interrupted run never re-buys translations it already paid for.
pub struct TranslationCache {
    path: PathBuf,
    entries: serde_json::Map<String, Value>,
}

impl TranslationCache {
    /// Loads the cache from `path`. Missing files start empty, corrupt
    /// ones are discarded with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.exists() {
            debug!("translation cache not found at {}, starting empty", path.display());
            return Self {
                path,
                entries: serde_json::Map::new(),
            };
        }
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!("discarding corrupt translation cache {}: {}", path.display(), err);
                    serde_json::Map::new()
                }
            },
            Err(err) => {
                warn!("could not read translation cache {}: {}", path.display(), err);
                serde_json::Map::new()
            }
        };
        Self { path, entries }
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries.get(source).and_then(Value::as_str)
    }

    pub fn insert(&mut self, source: String, translated: String) {
        self.entries.insert(source, Value::String(translated));
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write translation cache {}", self.path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_entries_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("translation_cache.json");
        {
            let mut cache = TranslationCache::load(&path);
            cache.insert("Рахунок".to_string(), "Invoice".to_string());
            cache.insert("Сума".to_string(), "Amount".to_string());
            cache.save().unwrap();
        }
        let cache = TranslationCache::load(&path);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("Рахунок"), Some("Invoice"));
        assert_eq!(cache.get("невідомо"), None);
    }

    #[test]
    fn corrupt_cache_files_are_discarded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("translation_cache.json");
        fs::write(&path, "[1, 2, oops").unwrap();
        let cache = TranslationCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn non_object_cache_files_count_as_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("translation_cache.json");
        fs::write(&path, "[\"just\", \"a\", \"list\"]").unwrap();
        let cache = TranslationCache::load(&path);
        assert!(cache.is_empty());
    }
}
