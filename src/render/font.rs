use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::{Face, name_id};
use usvg::fontdb;

use super::fit::TextMeasure;

/// Families tried in order when neither a font path nor a family name is
/// configured.
pub const DEFAULT_FONT_FALLBACKS: &[&str] = &["DejaVu Sans", "Liberation Sans", "Arial", "sans-serif"];

/// A loaded font face plus the handful of numbers needed to measure text
/// without shaping it through the renderer.
#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
}

/// Vertical ink extents of a line of text, in pixels relative to the
/// baseline with y growing upward. `bottom` is negative for descenders.
#[derive(Debug, Clone, Copy)]
pub struct TextInk {
    pub top: f32,
    pub bottom: f32,
}

impl FontMetrics {
    pub fn from_data(data: Vec<u8>, face_index: u32) -> Result<Self> {
        let face = Face::parse(&data, face_index)
            .map_err(|err| anyhow!("failed to parse font face: {err}"))?;
        let units_per_em = face.units_per_em();
        let space_advance = face
            .glyph_index(' ')
            .and_then(|glyph| face.glyph_hor_advance(glyph))
            .unwrap_or(units_per_em / 4);
        let ascender = face.ascender();
        let descender = face.descender();
        let family = extract_family_name(&face);
        Ok(Self {
            data: Arc::new(data),
            face_index,
            units_per_em,
            space_advance,
            ascender,
            descender,
            family,
        })
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Advance width of `text` on one line at `font_size`, matching what
    /// the renderer will lay out. Unknown glyphs fall back to the space
    /// advance; newlines are ignored.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return estimate_text_width_units(text) * font_size;
        };
        let units = self.units_per_em.max(1) as f32;
        let mut advance_units: u64 = 0;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance_units += u64::from(glyph_advance);
        }
        advance_units as f32 * (font_size / units)
    }

    /// Measured vertical ink extents of `text` at `font_size`, from glyph
    /// bounding boxes. Text without ink (spaces, unknown glyphs) falls back
    /// to the face ascender and descender.
    pub(crate) fn ink_extents(&self, text: &str, font_size: f32) -> TextInk {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return TextInk {
                top: font_size * 0.75,
                bottom: font_size * -0.25,
            };
        };
        let scale = font_size / self.units_per_em.max(1) as f32;
        let mut top = i16::MIN;
        let mut bottom = i16::MAX;
        let mut has_ink = false;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            let Some(glyph) = face.glyph_index(ch) else {
                continue;
            };
            if let Some(bounds) = face.glyph_bounding_box(glyph) {
                top = top.max(bounds.y_max);
                bottom = bottom.min(bounds.y_min);
                has_ink = true;
            }
        }
        if !has_ink {
            top = self.ascender;
            bottom = self.descender;
        }
        TextInk {
            top: top as f32 * scale,
            bottom: bottom as f32 * scale,
        }
    }
}

impl TextMeasure for FontMetrics {
    fn line_width(&self, text: &str, font_size: f32) -> f32 {
        self.text_width(text, font_size)
    }
}

/// The font all overlays are drawn with: parsed metrics for measuring plus
/// the family name handed to the SVG renderer.
pub struct OverlayFont {
    pub metrics: FontMetrics,
    pub family: String,
}

/// Resolves the overlay font from an explicit file path, a family name
/// looked up in the system font database, or the first fallback family
/// that resolves.
pub fn resolve_overlay_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallbacks: &[&str],
) -> Result<OverlayFont> {
    if let Some(path) = font_path {
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read font file {}", path.display()))?;
        let metrics = FontMetrics::from_data(data, 0)
            .with_context(|| format!("failed to load font {}", path.display()))?;
        let family = metrics
            .family()
            .map(str::to_string)
            .unwrap_or_else(|| "sans-serif".to_string());
        return Ok(OverlayFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    if let Some(family) = font_family {
        if !family.trim().is_empty() {
            let metrics = load_family_metrics(&db, family)
                .with_context(|| format!("font family {:?} not found", family))?;
            return Ok(OverlayFont {
                metrics,
                family: family.to_string(),
            });
        }
    }

    for family in fallbacks {
        if let Ok(metrics) = load_family_metrics(&db, family) {
            return Ok(OverlayFont {
                metrics,
                family: (*family).to_string(),
            });
        }
    }
    Err(anyhow!(
        "no usable overlay font found (set a font path or family in the settings)"
    ))
}

fn load_family_metrics(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let query_family = if family.eq_ignore_ascii_case("sans-serif") {
        fontdb::Family::SansSerif
    } else {
        fontdb::Family::Name(family)
    };
    let query = fontdb::Query {
        families: &[query_family],
        ..fontdb::Query::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("no face matches family {:?}", family))?;
    db.with_face_data(id, |data, face_index| {
        FontMetrics::from_data(data.to_vec(), face_index)
    })
    .ok_or_else(|| anyhow!("face data unavailable for family {:?}", family))?
}

fn extract_family_name(face: &Face) -> Option<String> {
    let names = face.names();
    let mut fallback = None;
    for i in 0..names.len() {
        let Some(name) = names.get(i) else { continue };
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        }
        if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

/// Rough per-character width in em units, used only when no font face is
/// available to measure against.
fn estimate_text_width_units(text: &str) -> f32 {
    text.chars().filter(|ch| *ch != '\n').map(estimate_char_units).sum()
}

fn estimate_char_units(ch: char) -> f32 {
    if ch.is_whitespace() {
        return 0.25;
    }
    if ch.is_ascii() {
        if ch.is_ascii_alphanumeric() {
            return 0.55;
        }
        return 0.35;
    }
    let code = ch as u32;
    // CJK ideographs and kana are full width.
    if (0x4E00..=0x9FFF).contains(&code)
        || (0x3040..=0x30FF).contains(&code)
        || (0x31F0..=0x31FF).contains(&code)
    {
        return 1.0;
    }
    0.9
}
