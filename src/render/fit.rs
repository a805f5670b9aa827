use tracing::{debug, warn};

use super::cache::{FontSizeCache, GeometryKey};
use crate::detection::Quad;

/// Source of rendered line widths for the fitting search. Implemented by
/// loaded font metrics; tests substitute synthetic measurers.
pub trait TextMeasure {
    /// Width in pixels of `text` drawn on one line at `font_size`.
    fn line_width(&self, text: &str, font_size: f32) -> f32;
}

#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub max_iterations: u32,
    /// Accepted deviation of the rendered-to-target ratios from 1.0.
    pub tolerance: f32,
    /// Safety margin applied to every returned size so the text sits inside
    /// the box instead of touching its edges.
    pub shrink_factor: f32,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 15,
            tolerance: 0.05,
            shrink_factor: 0.9,
        }
    }
}

/// Result of the fitting search. `converged` is false when the iteration
/// budget ran out and the last size tried was returned as a best effort.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontFit {
    pub size: f32,
    pub converged: bool,
}

/// Finds a font size at which `text` fills the axis-aligned extents of
/// `quad`, give or take `tolerance`.
///
/// Known geometry is answered straight from the cache without measuring
/// anything. Otherwise the search seeds from the box shape and walks the
/// size up or down by 10% per round, comparing the rendered line width and
/// the nominal line height (1.2 x size) against the box. Whatever size the
/// search settles on is cached before the safety margin is applied, so the
/// next lookup shrinks it again rather than compounding.
pub fn fit_font_size(
    cache: &mut FontSizeCache,
    measure: &dyn TextMeasure,
    quad: &Quad,
    text: &str,
    options: FitOptions,
) -> FontFit {
    let (raw_width, raw_height) = quad.axis_aligned_extents();
    // Degenerate boxes still get a positive size.
    let width = raw_width.max(1);
    let height = raw_height.max(1);
    let text_len = text.chars().count().max(1);
    let key = GeometryKey::new(width, height, text_len);

    if let Some(cached) = cache.get(key) {
        if cached > 0.0 {
            debug!(
                "font size {} for {}x{}/{} chars served from cache",
                cached, width, height, text_len
            );
            return FontFit {
                size: cached * options.shrink_factor,
                converged: true,
            };
        }
    }

    let target_width = width as f32;
    let target_height = height as f32;
    let mut size = ((height.min(width / text_len as i32)) as f32).max(1.0);

    for _ in 0..options.max_iterations {
        let rendered_width = measure.line_width(text, size);
        let rendered_height = size * 1.2;
        let width_ratio = rendered_width / target_width;
        let height_ratio = rendered_height / target_height;

        if (1.0 - width_ratio).abs() <= options.tolerance
            && (1.0 - height_ratio).abs() <= options.tolerance
        {
            remember(cache, key, size);
            return FontFit {
                size: size * options.shrink_factor,
                converged: true,
            };
        }

        if width_ratio > 1.0 + options.tolerance || height_ratio > 1.0 + options.tolerance {
            size *= 0.9;
        } else {
            size *= 1.1;
        }
    }

    debug!(
        "font size search for {}x{}/{} chars did not settle, using {}",
        width, height, text_len, size
    );
    remember(cache, key, size);
    FontFit {
        size: size * options.shrink_factor,
        converged: false,
    }
}

fn remember(cache: &mut FontSizeCache, key: GeometryKey, size: f32) {
    if let Err(err) = cache.set(key, size) {
        warn!("failed to persist font size cache: {:#}", err);
    }
}
