use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use image::{Rgb, RgbaImage};
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::font::{FontMetrics, OverlayFont};
use crate::detection::Quad;

/// Stroke drawn around rendered detections on the debug page.
const DEBUG_STROKE: &str = "#ff0000";
const DEBUG_STROKE_WIDTH: u32 = 2;

/// Everything a patch SVG is built from.
struct PatchSpec<'a> {
    canvas_width: u32,
    canvas_height: u32,
    box_width: u32,
    box_height: u32,
    angle_deg: f32,
    text: &'a str,
    font_size: f32,
    color: Rgb<u8>,
    font_family: &'a str,
    /// Vertical ink extents of the text relative to the baseline, y up.
    ink_top: f32,
    ink_bottom: f32,
}

/// Draws translated text patches and pastes them onto page images.
///
/// Each patch is a small SVG: a white rectangle covering the detected box
/// with the text centered on it, rotated as a whole and rasterized onto a
/// transparent canvas large enough to hold the rotated box. Pasting the
/// canvas centered on the original box reproduces the region in place.
pub struct Compositor {
    font: OverlayFont,
    fontdb: Arc<fontdb::Database>,
}

impl Compositor {
    pub fn new(font: OverlayFont) -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        db.load_font_data(font.metrics.data().to_vec());
        Self {
            font,
            fontdb: Arc::new(db),
        }
    }

    pub fn font_metrics(&self) -> &FontMetrics {
        &self.font.metrics
    }

    /// Rasterizes `text` over a white patch sized to `quad` and pastes it
    /// onto `page` at the quad's position. `angle_deg` rotates the patch
    /// counter-clockwise before pasting.
    pub fn paint_detection(
        &self,
        page: &mut RgbaImage,
        text: &str,
        quad: &Quad,
        angle_deg: f32,
        font_size: f32,
        color: Rgb<u8>,
    ) -> Result<()> {
        let (edge_width, edge_height) = quad.rotated_edge_lengths();
        let box_width = (edge_width as u32).max(1);
        let box_height = (edge_height as u32).max(1);
        let (canvas_width, canvas_height) = expanded_canvas(box_width, box_height, angle_deg);

        let ink = self.font.metrics.ink_extents(text, font_size);
        let svg = patch_svg(&PatchSpec {
            canvas_width,
            canvas_height,
            box_width,
            box_height,
            angle_deg,
            text,
            font_size,
            color,
            font_family: &self.font.family,
            ink_top: ink.top,
            ink_bottom: ink.bottom,
        });
        let patch = self.rasterize(&svg)?;

        let origin = quad.top_left();
        let paste_x = (origin.x - (canvas_width as f32 - box_width as f32) / 2.0) as i64;
        let paste_y = (origin.y - (canvas_height as f32 - box_height as f32) / 2.0) as i64;
        image::imageops::overlay(page, &patch, paste_x, paste_y);
        Ok(())
    }

    /// Renders the debug page: the original image with a red outline around
    /// every quad that received an overlay.
    pub fn render_debug_page(
        &self,
        image_bytes: &[u8],
        mime: &str,
        width: u32,
        height: u32,
        quads: &[Quad],
    ) -> Result<RgbaImage> {
        let svg = debug_page_svg(image_bytes, mime, width, height, quads);
        self.rasterize(&svg)
    }

    fn rasterize(&self, svg: &str) -> Result<RgbaImage> {
        let options = Options {
            fontdb: self.fontdb.clone(),
            ..Options::default()
        };
        let tree = Tree::from_str(svg, &options).context("failed to parse overlay SVG")?;
        let size = tree.size().to_int_size();
        let mut pixmap = Pixmap::new(size.width(), size.height())
            .ok_or_else(|| anyhow!("overlay SVG has an empty size"))?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());
        RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
            .ok_or_else(|| anyhow!("rasterized overlay has an unexpected buffer size"))
    }
}

/// Size of the transparent canvas that fits `box_width` x `box_height`
/// rotated by `angle_deg`. Trig is cleaned up so right angles stay exact
/// instead of ceiling up a pixel.
fn expanded_canvas(box_width: u32, box_height: u32, angle_deg: f32) -> (u32, u32) {
    let theta = f64::from(angle_deg).to_radians();
    let sin = round_trig(theta.sin()).abs();
    let cos = round_trig(theta.cos()).abs();
    let width = f64::from(box_width);
    let height = f64::from(box_height);
    let canvas_width = (width * cos + height * sin).ceil() as u32;
    let canvas_height = (width * sin + height * cos).ceil() as u32;
    (canvas_width.max(1), canvas_height.max(1))
}

fn round_trig(value: f64) -> f64 {
    (value * 1e12).round() / 1e12
}

fn patch_svg(spec: &PatchSpec) -> String {
    let center_x = spec.canvas_width as f32 / 2.0;
    let center_y = spec.canvas_height as f32 / 2.0;
    let rect_x = (spec.canvas_width as f32 - spec.box_width as f32) / 2.0;
    let rect_y = (spec.canvas_height as f32 - spec.box_height as f32) / 2.0;
    // SVG rotation is clockwise for positive angles, page rotation is
    // counter-clockwise.
    let rotation = -spec.angle_deg;
    // Centering the measured ink span on the box center keeps
    // ascender-only text from riding high.
    let baseline_y = center_y + (spec.ink_top + spec.ink_bottom) / 2.0;

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#,
        width = spec.canvas_width,
        height = spec.canvas_height,
    ));
    svg.push_str(&format!(
        r#"<g transform="rotate({rotation} {center_x} {center_y})">"#,
        rotation = rotation,
        center_x = center_x,
        center_y = center_y,
    ));
    svg.push_str(&format!(
        r##"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="#ffffff"/>"##,
        x = rect_x,
        y = rect_y,
        width = spec.box_width,
        height = spec.box_height,
    ));
    svg.push_str(&format!(
        r#"<text x="{x}" y="{y}" text-anchor="middle" font-family="{family}" font-size="{size}" fill="{fill}">{text}</text>"#,
        x = center_x,
        y = baseline_y,
        family = escape_xml(spec.font_family),
        size = spec.font_size,
        fill = css_color(spec.color),
        text = escape_xml(spec.text),
    ));
    svg.push_str("</g></svg>");
    svg
}

fn debug_page_svg(
    image_bytes: &[u8],
    mime: &str,
    width: u32,
    height: u32,
    quads: &[Quad],
) -> String {
    let encoded = BASE64_STANDARD.encode(image_bytes);
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#,
        width = width,
        height = height,
    ));
    let uri = format!("data:{mime};base64,{encoded}");
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{width}" height="{height}" preserveAspectRatio="none"/>"#,
        uri = uri,
        width = width,
        height = height,
    ));
    for quad in quads {
        let top_left = quad.0[0];
        let bottom_right = quad.0[2];
        let x = top_left.x.min(bottom_right.x);
        let y = top_left.y.min(bottom_right.y);
        let rect_width = (bottom_right.x - top_left.x).abs();
        let rect_height = (bottom_right.y - top_left.y).abs();
        if rect_width <= 0.0 || rect_height <= 0.0 {
            continue;
        }
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" fill="none" stroke="{stroke}" stroke-width="{stroke_width}"/>"#,
            x = x,
            y = y,
            width = rect_width,
            height = rect_height,
            stroke = DEBUG_STROKE,
            stroke_width = DEBUG_STROKE_WIDTH,
        ));
    }
    svg.push_str("</svg>");
    svg
}

fn css_color(color: Rgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color.0[0], color.0[1], color.0[2])
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
