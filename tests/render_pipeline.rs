use std::fs;
use std::path::Path;

use image::{Rgba, RgbaImage};
use overprint::render::{
    self, Compositor, DEFAULT_FONT_FALLBACKS, FlushPolicy, FontSizeCache, resolve_overlay_font,
};
use overprint::{Quad, TextDetection};

const GRAY: Rgba<u8> = Rgba([200, 200, 200, 255]);

/// A white 200x100 page with a gray text box covering x 10..110, y 10..50.
fn write_test_page(path: &Path) {
    let mut page = RgbaImage::from_pixel(200, 100, Rgba([255, 255, 255, 255]));
    for y in 10..50 {
        for x in 10..110 {
            page.put_pixel(x, y, GRAY);
        }
    }
    image::DynamicImage::ImageRgba8(page).save(path).unwrap();
}

fn detection(translated: &str, angle: f32) -> TextDetection {
    TextDetection {
        quad: Quad::from_corners([(10.0, 10.0), (110.0, 10.0), (110.0, 50.0), (10.0, 50.0)]),
        source_text: "Привіт".to_string(),
        confidence: 0.9,
        translated_text: translated.to_string(),
        rotation_angle: angle,
    }
}

fn test_compositor() -> Option<Compositor> {
    match resolve_overlay_font(None, None, DEFAULT_FONT_FALLBACKS) {
        Ok(font) => Some(Compositor::new(font)),
        Err(_) => {
            eprintln!("no usable system font found, skipping");
            None
        }
    }
}

#[test]
fn translated_page_paints_the_region_and_marks_it_in_the_debug_page() {
    let Some(compositor) = test_compositor() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let page_path = dir.path().join("page.png");
    write_test_page(&page_path);
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let mut cache =
        FontSizeCache::load(dir.path().join("sizes.json"), 100, FlushPolicy::OnShutdown);

    let detections = vec![detection("Hello", 0.0)];
    let artifacts = render::render_page(
        &compositor,
        &mut cache,
        &page_path,
        &detections,
        &out_dir,
        "en",
    )
    .unwrap();

    assert_eq!(artifacts.translated, out_dir.join("en_page.png"));
    assert_eq!(artifacts.debug, out_dir.join("debug_en_page.png"));

    let translated = image::open(&artifacts.translated).unwrap().to_rgb8();
    assert_eq!(translated.dimensions(), (200, 100));
    // The gray box is whited out before the replacement text is drawn.
    assert_eq!(translated.get_pixel(12, 12).0, [255, 255, 255]);
    assert_eq!(translated.get_pixel(107, 47).0, [255, 255, 255]);
    // The replacement text leaves ink inside the box.
    let has_ink = (10..50).any(|y| (10..110).any(|x| translated.get_pixel(x, y).0[0] < 128));
    assert!(has_ink, "no dark pixel found inside the painted region");
    // The rest of the page is untouched.
    assert_eq!(translated.get_pixel(150, 80).0, [255, 255, 255]);

    let debug = image::open(&artifacts.debug).unwrap().to_rgb8();
    let edge = debug.get_pixel(60, 10).0;
    assert!(
        edge[0] > 180 && edge[1] < 90 && edge[2] < 90,
        "expected a red outline on the box edge, got {edge:?}"
    );
    // The debug page shows the original scan inside the outline, not the
    // painted overlay.
    assert_eq!(debug.get_pixel(60, 30).0, [200, 200, 200]);
}

#[test]
fn regions_without_translations_are_left_untouched() {
    let Some(compositor) = test_compositor() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let page_path = dir.path().join("page.png");
    write_test_page(&page_path);
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let mut cache =
        FontSizeCache::load(dir.path().join("sizes.json"), 100, FlushPolicy::OnShutdown);

    let detections = vec![detection("", 0.0)];
    let artifacts = render::render_page(
        &compositor,
        &mut cache,
        &page_path,
        &detections,
        &out_dir,
        "en",
    )
    .unwrap();

    let translated = image::open(&artifacts.translated).unwrap().to_rgb8();
    assert_eq!(translated.get_pixel(60, 30).0, [200, 200, 200]);
    // No region was rendered, so the debug page carries no outline either.
    let debug = image::open(&artifacts.debug).unwrap().to_rgb8();
    assert_eq!(debug.get_pixel(60, 10).0, [200, 200, 200]);
}

#[test]
fn rotated_regions_render_onto_the_page() {
    let Some(compositor) = test_compositor() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let page_path = dir.path().join("page.png");
    write_test_page(&page_path);
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let mut cache =
        FontSizeCache::load(dir.path().join("sizes.json"), 100, FlushPolicy::OnShutdown);

    let detections = vec![detection("Hi", 90.0)];
    let artifacts = render::render_page(
        &compositor,
        &mut cache,
        &page_path,
        &detections,
        &out_dir,
        "en",
    )
    .unwrap();

    let translated = image::open(&artifacts.translated).unwrap().to_rgb8();
    let has_ink = translated.pixels().any(|px| px.0[0] < 128);
    assert!(has_ink, "rotated text left no ink on the page");
}
