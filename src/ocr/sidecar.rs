use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::detection::TextDetection;

/// Loads detections from the JSON sidecar next to `image_path`.
///
/// A page without a sidecar simply has no text. A sidecar that exists but
/// does not parse is an error for that page; the caller decides whether to
/// carry on with the others.
pub(super) fn load(image_path: &Path) -> Result<Vec<TextDetection>> {
    let sidecar_path = image_path.with_extension("json");
    if !sidecar_path.exists() {
        debug!("no detection sidecar at {}", sidecar_path.display());
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&sidecar_path)
        .with_context(|| format!("failed to read {}", sidecar_path.display()))?;
    let mut detections: Vec<TextDetection> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse detections in {}", sidecar_path.display()))?;
    detections.retain(|detection| !detection.source_text.trim().is_empty());
    for detection in &mut detections {
        detection.confidence = detection.confidence.clamp(0.0, 1.0);
    }
    Ok(detections)
}
