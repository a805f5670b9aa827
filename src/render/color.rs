use image::{Rgb, RgbaImage};
use std::collections::HashMap;

use crate::detection::Quad;

/// Near-white pixels (every channel above this) are treated as background
/// and never win the frequency ranking.
const BACKGROUND_CHANNEL_FLOOR: u8 = 240;
/// A candidate color must be at least this dark on average to be believed
/// as ink.
const INK_MEAN_CEILING: f32 = 200.0;

/// Estimates the ink color of a text region by ranking pixel colors inside
/// the axis-aligned crop between the top-left and bottom-right corners.
///
/// The most frequent color that is not near-white wins, provided it is dark
/// enough to plausibly be ink. Anything else falls back to black, which is
/// always legible on the white patch the text is drawn onto.
pub fn estimate_text_color(image: &RgbaImage, quad: &Quad) -> Rgb<u8> {
    let top_left = quad.0[0];
    let bottom_right = quad.0[2];
    let left = (top_left.x as i64).clamp(0, image.width() as i64) as u32;
    let top = (top_left.y as i64).clamp(0, image.height() as i64) as u32;
    let right = (bottom_right.x as i64).clamp(0, image.width() as i64) as u32;
    let bottom = (bottom_right.y as i64).clamp(0, image.height() as i64) as u32;
    if right <= left || bottom <= top {
        return Rgb([0, 0, 0]);
    }

    let mut counts: HashMap<[u8; 3], u64> = HashMap::new();
    for y in top..bottom {
        for x in left..right {
            let pixel = image.get_pixel(x, y);
            let color = [pixel.0[0], pixel.0[1], pixel.0[2]];
            *counts.entry(color).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<([u8; 3], u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    for (color, _) in ranked {
        if color.iter().all(|channel| *channel > BACKGROUND_CHANNEL_FLOOR) {
            continue;
        }
        let mean = (color[0] as f32 + color[1] as f32 + color[2] as f32) / 3.0;
        if mean < INK_MEAN_CEILING {
            return Rgb(color);
        }
        // The dominant non-background color is too light to be ink.
        break;
    }
    Rgb([0, 0, 0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_image(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    fn full_quad(width: f32, height: f32) -> Quad {
        Quad::from_corners([(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)])
    }

    #[test]
    fn all_white_regions_fall_back_to_black() {
        let image = solid_image(20, 10, [255, 255, 255, 255]);
        let color = estimate_text_color(&image, &full_quad(20.0, 10.0));
        assert_eq!(color, Rgb([0, 0, 0]));
    }

    #[test]
    fn dominant_dark_ink_wins_over_background() {
        let mut image = solid_image(20, 10, [255, 255, 255, 255]);
        // A dark blue minority, the way glyph pixels sit inside a scan.
        for y in 0..10 {
            for x in 0..6 {
                image.put_pixel(x, y, Rgba([20, 30, 120, 255]));
            }
        }
        let color = estimate_text_color(&image, &full_quad(20.0, 10.0));
        assert_eq!(color, Rgb([20, 30, 120]));
    }

    #[test]
    fn light_dominant_color_is_not_trusted_as_ink() {
        // Light gray survives the near-white filter but is too bright to be
        // believed, so the estimate falls back to black.
        let image = solid_image(20, 10, [230, 230, 230, 255]);
        let color = estimate_text_color(&image, &full_quad(20.0, 10.0));
        assert_eq!(color, Rgb([0, 0, 0]));
    }

    #[test]
    fn near_white_majority_is_skipped_for_real_ink() {
        let mut image = solid_image(20, 10, [250, 250, 250, 255]);
        for x in 0..5 {
            image.put_pixel(x, 0, Rgba([40, 40, 40, 255]));
        }
        let color = estimate_text_color(&image, &full_quad(20.0, 10.0));
        assert_eq!(color, Rgb([40, 40, 40]));
    }

    #[test]
    fn out_of_bounds_quads_fall_back_to_black() {
        let image = solid_image(20, 10, [10, 10, 10, 255]);
        let quad = Quad::from_corners([
            (30.0, 30.0),
            (40.0, 30.0),
            (40.0, 40.0),
            (30.0, 40.0),
        ]);
        assert_eq!(estimate_text_color(&image, &quad), Rgb([0, 0, 0]));
    }
}
