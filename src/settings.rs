use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: String,
    pub target_lang: String,
    pub excluded_prefixes: Vec<String>,
    pub translation_cache_file: Option<String>,
    pub detection_source: String,
    pub ocr_languages: String,
    pub ocr_psm: u32,
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub size_cache_file: Option<String>,
    pub size_cache_capacity: usize,
    pub flush_policy: String,
    pub output_root: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: "deepl".to_string(),
            target_lang: "en".to_string(),
            excluded_prefixes: [
                "41", "шщ", "Св", "Ю!", "СТ", "ЦЕНТР", "0А", "ОА", ",АН", "РВС", "БІК", "04",
            ]
            .iter()
            .map(|fragment| fragment.to_string())
            .collect(),
            translation_cache_file: None,
            detection_source: "sidecar".to_string(),
            ocr_languages: "eng".to_string(),
            ocr_psm: 6,
            font_path: None,
            font_family: None,
            size_cache_file: None,
            size_cache_capacity: 10_000,
            flush_policy: "every-mutation".to_string(),
            output_root: "output".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    translate: Option<TranslateSettings>,
    ocr: Option<OcrFileSettings>,
    render: Option<RenderSettings>,
    output: Option<OutputSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    provider: Option<String>,
    target_lang: Option<String>,
    excluded_prefixes: Option<Vec<String>>,
    cache_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrFileSettings {
    source: Option<String>,
    languages: Option<String>,
    psm: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    font_path: Option<String>,
    font_family: Option<String>,
    cache_file: Option<String>,
    cache_capacity: Option<usize>,
    flush: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSettings {
    root: Option<String>,
}

/// Loads settings by layering, in order: `settings.toml` and
/// `settings.local.toml` in the working directory, the same pair in the
/// overprint home directory, and finally `extra_path` when given. Later
/// layers override earlier ones. The home settings file is created from
/// the built-in defaults on first use.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(translate) = incoming.translate {
            if let Some(provider) = translate.provider {
                if !provider.trim().is_empty() {
                    self.provider = provider;
                }
            }
            if let Some(lang) = translate.target_lang {
                if !lang.trim().is_empty() {
                    self.target_lang = lang;
                }
            }
            if let Some(prefixes) = translate.excluded_prefixes {
                self.excluded_prefixes = prefixes;
            }
            if let Some(path) = translate.cache_file {
                if !path.trim().is_empty() {
                    self.translation_cache_file = Some(path);
                }
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(source) = ocr.source {
                if !source.trim().is_empty() {
                    self.detection_source = source;
                }
            }
            if let Some(languages) = ocr.languages {
                if !languages.trim().is_empty() {
                    self.ocr_languages = languages;
                }
            }
            if let Some(psm) = ocr.psm {
                if psm > 0 {
                    self.ocr_psm = psm;
                }
            }
        }
        if let Some(render) = incoming.render {
            if let Some(path) = render.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(family) = render.font_family {
                if !family.trim().is_empty() {
                    self.font_family = Some(family);
                }
            }
            if let Some(path) = render.cache_file {
                if !path.trim().is_empty() {
                    self.size_cache_file = Some(path);
                }
            }
            if let Some(capacity) = render.cache_capacity {
                if capacity > 0 {
                    self.size_cache_capacity = capacity;
                }
            }
            if let Some(flush) = render.flush {
                if !flush.trim().is_empty() {
                    self.flush_policy = flush;
                }
            }
        }
        if let Some(output) = incoming.output {
            if let Some(root) = output.root {
                if !root.trim().is_empty() {
                    self.output_root = root;
                }
            }
        }
    }

    /// Path the font size cache lives at: the configured one, or
    /// `size-cache.json` in the overprint home directory.
    pub fn size_cache_path(&self) -> PathBuf {
        match &self.size_cache_file {
            Some(path) => PathBuf::from(path),
            None => home_dir()
                .map(|home| home.join("size-cache.json"))
                .unwrap_or_else(|| PathBuf::from("size-cache.json")),
        }
    }

    /// Path the translation cache lives at: the configured one, or
    /// `translation_cache.json` in the overprint home directory.
    pub fn translation_cache_path(&self) -> PathBuf {
        match &self.translation_cache_file {
            Some(path) => PathBuf::from(path),
            None => home_dir()
                .map(|home| home.join("translation_cache.json"))
                .unwrap_or_else(|| PathBuf::from("translation_cache.json")),
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".overprint"))
        }
    })
}
