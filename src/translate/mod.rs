mod cache;
mod deepl;
mod exclusions;

pub use cache::TranslationCache;
pub use deepl::DeepL;
pub use exclusions::ExclusionRules;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

use crate::detection::TextDetection;

pub type TranslationFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;

/// A machine translation backend. Implementations are called once per
/// uncached, non-excluded detection text.
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn translate(&self, text: &str, target_lang: &str) -> TranslationFuture;
}

/// Builds the provider selected in the settings. "none" disables
/// translation entirely; detections then keep whatever translated text
/// they arrived with.
pub fn build_provider(
    name: &str,
    override_key: Option<&str>,
) -> Result<Option<Box<dyn TranslationProvider>>> {
    match name.trim().to_lowercase().as_str() {
        "deepl" => {
            let key = deepl::resolve_key(override_key)?;
            Ok(Some(Box::new(DeepL::new(key))))
        }
        "none" | "" => Ok(None),
        other => anyhow::bail!(
            "unknown translation provider {:?} (expected \"deepl\" or \"none\")",
            other
        ),
    }
}

/// Fills in `translated_text` for every detection that needs it.
///
/// Detections that already carry a translation are left alone. Excluded
/// texts stay untranslated on purpose; the renderer will skip them. Cache
/// hits never reach the provider, and every fresh translation is persisted
/// immediately. Provider failures are logged per detection so one flaky
/// call cannot sink the whole page.
pub async fn translate_detections(
    detections: &mut [TextDetection],
    provider: Option<&dyn TranslationProvider>,
    cache: &mut TranslationCache,
    rules: &ExclusionRules,
    target_lang: &str,
) {
    for detection in detections.iter_mut() {
        if !detection.translated_text.trim().is_empty() {
            continue;
        }
        if rules.is_excluded(&detection.source_text) {
            debug!("excluded from translation: {:?}", detection.source_text);
            continue;
        }
        if let Some(hit) = cache.get(&detection.source_text) {
            detection.translated_text = hit.to_string();
            continue;
        }
        let Some(provider) = provider else {
            continue;
        };
        match provider.translate(&detection.source_text, target_lang).await {
            Ok(translated) => {
                if translated.trim().is_empty() {
                    debug!("empty translation for {:?}", detection.source_text);
                    continue;
                }
                cache.insert(detection.source_text.clone(), translated.clone());
                if let Err(err) = cache.save() {
                    warn!("failed to persist translation cache: {:#}", err);
                }
                detection.translated_text = translated;
            }
            Err(err) => {
                warn!(
                    "{} failed to translate {:?}: {:#}",
                    provider.name(),
                    detection.source_text,
                    err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Quad, TextDetection};
    use tempfile::tempdir;

    fn detection(source: &str) -> TextDetection {
        TextDetection {
            quad: Quad::from_corners([(0.0, 0.0), (50.0, 0.0), (50.0, 20.0), (0.0, 20.0)]),
            source_text: source.to_string(),
            confidence: 0.9,
            translated_text: String::new(),
            rotation_angle: 0.0,
        }
    }

    /// Echoes the source text uppercased; fails on demand.
    struct EchoProvider {
        fail: bool,
    }

    impl TranslationProvider for EchoProvider {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn translate(&self, text: &str, _target_lang: &str) -> TranslationFuture {
            let result = if self.fail {
                Err(anyhow::anyhow!("provider unavailable"))
            } else {
                Ok(text.to_uppercase())
            };
            Box::pin(async move { result })
        }
    }

    /// Echoes the source text uppercased, except one text it always
    /// fails on.
    struct FlakyProvider {
        fail_on: &'static str,
    }

    impl TranslationProvider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn translate(&self, text: &str, _target_lang: &str) -> TranslationFuture {
            let result = if text == self.fail_on {
                Err(anyhow::anyhow!("provider unavailable"))
            } else {
                Ok(text.to_uppercase())
            };
            Box::pin(async move { result })
        }
    }

    #[tokio::test]
    async fn cache_hits_skip_the_provider_and_exclusions_stay_empty() {
        let dir = tempdir().unwrap();
        let mut cache = TranslationCache::load(dir.path().join("cache.json"));
        cache.insert("Рахунок".to_string(), "Invoice".to_string());
        let rules = ExclusionRules::new(&["БІК".to_string()]).unwrap();

        let mut detections = vec![
            detection("Рахунок"),
            detection("БІК 305299"),
            detection("12/05/2023"),
        ];
        translate_detections(&mut detections, None, &mut cache, &rules, "en").await;

        assert_eq!(detections[0].translated_text, "Invoice");
        assert_eq!(detections[1].translated_text, "");
        assert_eq!(detections[2].translated_text, "");
    }

    #[tokio::test]
    async fn fresh_translations_come_from_the_provider_and_are_cached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = TranslationCache::load(&path);
        let rules = ExclusionRules::new(&[]).unwrap();
        let provider = EchoProvider { fail: false };

        let mut detections = vec![detection("рахунок")];
        translate_detections(&mut detections, Some(&provider), &mut cache, &rules, "en").await;

        assert_eq!(detections[0].translated_text, "РАХУНОК");
        assert_eq!(cache.get("рахунок"), Some("РАХУНОК"));
        // Persisted immediately, not at shutdown.
        assert!(path.exists());
    }

    #[tokio::test]
    async fn provider_failures_leave_the_detection_untranslated() {
        let dir = tempdir().unwrap();
        let mut cache = TranslationCache::load(dir.path().join("cache.json"));
        let rules = ExclusionRules::new(&[]).unwrap();
        let provider = EchoProvider { fail: true };

        let mut detections = vec![detection("Сума"), detection("Разом")];
        translate_detections(&mut detections, Some(&provider), &mut cache, &rules, "en").await;

        assert_eq!(detections[0].translated_text, "");
        assert_eq!(detections[1].translated_text, "");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn one_failed_translation_does_not_stop_the_rest() {
        let dir = tempdir().unwrap();
        let mut cache = TranslationCache::load(dir.path().join("cache.json"));
        let rules = ExclusionRules::new(&[]).unwrap();
        let provider = FlakyProvider { fail_on: "Сума" };

        // The failing detection comes first; the one behind it still gets
        // translated and cached.
        let mut detections = vec![detection("Сума"), detection("Разом")];
        translate_detections(&mut detections, Some(&provider), &mut cache, &rules, "en").await;

        assert_eq!(detections[0].translated_text, "");
        assert_eq!(detections[1].translated_text, "РАЗОМ");
        assert_eq!(cache.get("Разом"), Some("РАЗОМ"));
        assert_eq!(cache.get("Сума"), None);
    }

    #[tokio::test]
    async fn pre_translated_detections_are_left_alone() {
        let dir = tempdir().unwrap();
        let mut cache = TranslationCache::load(dir.path().join("cache.json"));
        let rules = ExclusionRules::new(&[]).unwrap();
        let provider = EchoProvider { fail: false };

        let mut detections = vec![detection("Сума")];
        detections[0].translated_text = "Total".to_string();
        translate_detections(&mut detections, Some(&provider), &mut cache, &rules, "en").await;

        assert_eq!(detections[0].translated_text, "Total");
        assert!(cache.is_empty());
    }

    #[test]
    fn provider_selection_validates_names() {
        assert!(build_provider("none", None).unwrap().is_none());
        assert!(build_provider("", None).unwrap().is_none());
        assert!(build_provider("google", None).is_err());
        // DeepL with an explicit key resolves without consulting the env.
        let provider = build_provider("deepl", Some("abc:fx")).unwrap();
        assert_eq!(provider.unwrap().name(), "deepl");
    }
}
