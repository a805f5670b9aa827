use anyhow::{Context, Result, bail};
use std::path::Path;
use tracing::{info, warn};

pub mod detection;
pub mod logging;
pub mod ocr;
pub mod render;
pub mod runs;
pub mod settings;
mod test_util;
pub mod translate;

pub use detection::{Point, Quad, TextDetection};
pub use render::{Compositor, FitOptions, FlushPolicy, FontFit, FontSizeCache};

#[derive(Debug, Clone)]
pub struct Config {
    /// Image file or directory of images.
    pub input: String,
    pub output: Option<String>,
    pub lang: Option<String>,
    pub provider: Option<String>,
    pub key: Option<String>,
    pub settings_path: Option<String>,
}

/// Everything one run carries from page to page.
struct Pipeline {
    detection_source: ocr::DetectionSource,
    ocr_options: ocr::OcrOptions,
    provider: Option<Box<dyn translate::TranslationProvider>>,
    translations: translate::TranslationCache,
    rules: translate::ExclusionRules,
    compositor: render::Compositor,
    size_cache: render::FontSizeCache,
    target_lang: String,
}

impl Pipeline {
    async fn process_image(&mut self, image_path: &Path, output_dir: &Path) -> Result<()> {
        let mut detections =
            ocr::load_detections(self.detection_source, image_path, &self.ocr_options)?;
        info!(
            "{}: {} text region(s)",
            image_path.display(),
            detections.len()
        );
        translate::translate_detections(
            &mut detections,
            self.provider.as_deref(),
            &mut self.translations,
            &self.rules,
            &self.target_lang,
        )
        .await;
        render::render_page(
            &self.compositor,
            &mut self.size_cache,
            image_path,
            &detections,
            output_dir,
            &self.target_lang,
        )?;
        Ok(())
    }
}

/// Runs the whole pipeline: stage the inputs into a fresh numbered run
/// directory, detect text, translate it, and render the translated pages.
/// Returns a one-line summary for the terminal.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    let target_lang = config
        .lang
        .as_deref()
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .unwrap_or(&settings.target_lang)
        .to_string();
    let flush_policy = render::FlushPolicy::parse(&settings.flush_policy)?;
    let font = render::resolve_overlay_font(
        settings.font_path.as_deref().map(Path::new),
        settings.font_family.as_deref(),
        render::DEFAULT_FONT_FALLBACKS,
    )?;

    let mut pipeline = Pipeline {
        detection_source: ocr::DetectionSource::parse(&settings.detection_source)?,
        ocr_options: ocr::OcrOptions {
            languages: settings.ocr_languages.clone(),
            psm: settings.ocr_psm,
        },
        provider: translate::build_provider(
            config.provider.as_deref().unwrap_or(&settings.provider),
            config.key.as_deref(),
        )?,
        translations: translate::TranslationCache::load(settings.translation_cache_path()),
        rules: translate::ExclusionRules::new(&settings.excluded_prefixes)?,
        compositor: render::Compositor::new(font),
        size_cache: render::FontSizeCache::load(
            settings.size_cache_path(),
            settings.size_cache_capacity,
            flush_policy,
        ),
        target_lang,
    };

    let input = Path::new(&config.input);
    let images = runs::collect_images(input)?;
    if images.is_empty() {
        bail!("no images found in {}", input.display());
    }
    let output_root = config.output.as_deref().unwrap_or(&settings.output_root);
    let run_dirs = runs::prepare_run_dir(Path::new(output_root))?;
    let staged = runs::stage_inputs(&images, &run_dirs.input_images)?;

    let mut processed = 0usize;
    let mut failed = 0usize;
    for image_path in &staged {
        match pipeline
            .process_image(image_path, &run_dirs.output_images)
            .await
        {
            Ok(()) => processed += 1,
            Err(err) => {
                warn!("skipping {}: {:#}", image_path.display(), err);
                failed += 1;
            }
        }
    }

    pipeline
        .size_cache
        .flush()
        .with_context(|| "failed to flush the font size cache")?;

    Ok(format!(
        "processed {processed} image(s), {failed} failed, output in {}",
        run_dirs.root.display()
    ))
}
