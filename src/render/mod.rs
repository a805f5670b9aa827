pub mod cache;
pub mod color;
pub mod compose;
pub mod fit;
pub mod font;

pub use cache::{FlushPolicy, FontSizeCache, GeometryKey};
pub use color::estimate_text_color;
pub use compose::Compositor;
pub use fit::{FitOptions, FontFit, TextMeasure, fit_font_size};
pub use font::{DEFAULT_FONT_FALLBACKS, FontMetrics, OverlayFont, resolve_overlay_font};

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::detection::{Quad, TextDetection};

/// Output files written for one page.
pub struct PageArtifacts {
    pub translated: PathBuf,
    pub debug: PathBuf,
}

/// Renders all translated detections of one page onto the image and writes
/// the translated page plus its debug counterpart into `output_dir`.
///
/// Detections without translated text are skipped. A detection that fails
/// to draw is logged and dropped; it never takes the rest of the page with
/// it. Text colors are sampled from the untouched source image, not from
/// the partially painted page.
pub fn render_page(
    compositor: &Compositor,
    cache: &mut FontSizeCache,
    image_path: &Path,
    detections: &[TextDetection],
    output_dir: &Path,
    target_lang: &str,
) -> Result<PageArtifacts> {
    let image_bytes = fs::read(image_path)
        .with_context(|| format!("failed to read image {}", image_path.display()))?;
    let decoded = image::load_from_memory(&image_bytes)
        .with_context(|| format!("failed to decode image {}", image_path.display()))?;
    let mime = mime_for_path(image_path)
        .ok_or_else(|| anyhow!("unsupported image type: {}", image_path.display()))?;
    let pristine = decoded.to_rgba8();
    let mut page = pristine.clone();

    let fit_options = FitOptions::default();
    let mut rendered: Vec<Quad> = Vec::new();
    for detection in detections {
        if detection.translated_text.trim().is_empty() {
            debug!("skipping untranslated region {:?}", detection.source_text);
            continue;
        }
        let fit = fit_font_size(
            cache,
            compositor.font_metrics(),
            &detection.quad,
            &detection.translated_text,
            fit_options,
        );
        if !fit.converged {
            debug!(
                "using best-effort font size {:.1} for {:?}",
                fit.size, detection.translated_text
            );
        }
        let color = estimate_text_color(&pristine, &detection.quad);
        if let Err(err) = compositor.paint_detection(
            &mut page,
            &detection.translated_text,
            &detection.quad,
            detection.rotation_angle,
            fit.size,
            color,
        ) {
            warn!(
                "failed to draw {:?} on {}: {:#}",
                detection.translated_text,
                image_path.display(),
                err
            );
            continue;
        }
        rendered.push(detection.quad.clone());
    }

    let file_name = image_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("image path has no usable file name: {}", image_path.display()))?;

    let translated_path = output_dir.join(format!("{target_lang}_{file_name}"));
    image::DynamicImage::ImageRgba8(page)
        .to_rgb8()
        .save(&translated_path)
        .with_context(|| format!("failed to write {}", translated_path.display()))?;

    let debug_page = compositor.render_debug_page(
        &image_bytes,
        mime,
        pristine.width(),
        pristine.height(),
        &rendered,
    )?;
    let debug_path = output_dir.join(format!("debug_{target_lang}_{file_name}"));
    image::DynamicImage::ImageRgba8(debug_page)
        .to_rgb8()
        .save(&debug_path)
        .with_context(|| format!("failed to write {}", debug_path.display()))?;

    info!(
        "rendered {} region(s) of {} -> {}",
        rendered.len(),
        file_name,
        translated_path.display()
    );
    Ok(PageArtifacts {
        translated: translated_path,
        debug: debug_path,
    })
}

/// Formats the renderer can both decode and embed into the debug page.
pub(crate) fn mime_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
