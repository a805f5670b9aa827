mod sidecar;
mod tesseract;

use anyhow::Result;
use std::path::Path;

use crate::detection::TextDetection;

/// Where text detections for an image come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    /// A `<image>.json` file next to the image, produced by an external
    /// detector. A missing sidecar means no text on that page.
    Sidecar,
    /// The tesseract binary, run once per image.
    Tesseract,
}

impl DetectionSource {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "sidecar" => Ok(Self::Sidecar),
            "tesseract" => Ok(Self::Tesseract),
            other => anyhow::bail!(
                "unknown detection source {:?} (expected \"sidecar\" or \"tesseract\")",
                other
            ),
        }
    }
}

/// Knobs passed through to tesseract.
#[derive(Debug, Clone)]
pub struct OcrOptions {
    pub languages: String,
    pub psm: u32,
}

pub fn load_detections(
    source: DetectionSource,
    image_path: &Path,
    options: &OcrOptions,
) -> Result<Vec<TextDetection>> {
    match source {
        DetectionSource::Sidecar => sidecar::load(image_path),
        DetectionSource::Tesseract => tesseract::extract(image_path, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_sources_parse_case_insensitively() {
        assert_eq!(
            DetectionSource::parse("Sidecar").unwrap(),
            DetectionSource::Sidecar
        );
        assert_eq!(
            DetectionSource::parse(" tesseract ").unwrap(),
            DetectionSource::Tesseract
        );
        assert!(DetectionSource::parse("easyocr").is_err());
    }
}
