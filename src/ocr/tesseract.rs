use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::OcrOptions;
use crate::detection::{Quad, TextDetection};

pub(super) fn extract(image_path: &Path, options: &OcrOptions) -> Result<Vec<TextDetection>> {
    let tsv = run_tesseract_tsv(image_path, options)?;
    let detections = parse_tsv_detections(&tsv);
    debug!(
        "tesseract found {} line(s) in {}",
        detections.len(),
        image_path.display()
    );
    Ok(detections)
}

fn run_tesseract_tsv(image_path: &Path, options: &OcrOptions) -> Result<String> {
    let output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .arg("-l")
        .arg(&options.languages)
        .arg("--oem")
        .arg("1")
        .arg("--psm")
        .arg(options.psm.to_string())
        .arg("--dpi")
        .arg("300")
        .arg("tsv")
        .output()
        .with_context(|| "failed to run tesseract (is it installed?)")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "tesseract failed on {}: {}",
            image_path.display(),
            stderr.trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug)]
struct Word {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    conf: f32,
    text: String,
}

/// Parses tesseract's TSV output into one detection per text line.
///
/// Word rows (level 5) are grouped by page, block, paragraph and line,
/// ordered left to right, and merged: the box is the union of the word
/// boxes and the confidence is the length-weighted word average scaled
/// into [0, 1].
pub(crate) fn parse_tsv_detections(tsv: &str) -> Vec<TextDetection> {
    let mut lines: HashMap<(u32, u32, u32, u32), Vec<Word>> = HashMap::new();
    for (index, row) in tsv.lines().enumerate() {
        if index == 0 {
            // Header row.
            continue;
        }
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }
        if columns[0].trim() != "5" {
            continue;
        }
        let Some(key) = parse_line_key(&columns) else {
            continue;
        };
        let conf: f32 = columns[10].trim().parse().unwrap_or(-1.0);
        if conf < 0.0 {
            continue;
        }
        let text = columns[11].trim();
        if text.is_empty() {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            columns[6].trim().parse::<i32>(),
            columns[7].trim().parse::<i32>(),
            columns[8].trim().parse::<i32>(),
            columns[9].trim().parse::<i32>(),
        ) else {
            continue;
        };
        lines.entry(key).or_default().push(Word {
            left,
            top,
            width,
            height,
            conf,
            text: text.to_string(),
        });
    }

    let mut keys: Vec<(u32, u32, u32, u32)> = lines.keys().copied().collect();
    keys.sort();
    keys.into_iter()
        .filter_map(|key| lines.remove(&key).map(merge_words))
        .collect()
}

fn parse_line_key(columns: &[&str]) -> Option<(u32, u32, u32, u32)> {
    let page = columns[1].trim().parse().ok()?;
    let block = columns[2].trim().parse().ok()?;
    let paragraph = columns[3].trim().parse().ok()?;
    let line = columns[4].trim().parse().ok()?;
    Some((page, block, paragraph, line))
}

fn merge_words(mut words: Vec<Word>) -> TextDetection {
    words.sort_by_key(|word| word.left);

    let left = words.iter().map(|word| word.left).min().unwrap_or(0);
    let top = words.iter().map(|word| word.top).min().unwrap_or(0);
    let right = words
        .iter()
        .map(|word| word.left + word.width)
        .max()
        .unwrap_or(0);
    let bottom = words
        .iter()
        .map(|word| word.top + word.height)
        .max()
        .unwrap_or(0);

    let mut text = String::new();
    let mut weighted_conf = 0.0f32;
    let mut total_len = 0usize;
    for word in &words {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&word.text);
        let len = word.text.chars().count().max(1);
        weighted_conf += word.conf * len as f32;
        total_len += len;
    }
    let confidence = if total_len > 0 {
        (weighted_conf / total_len as f32 / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let quad = Quad::from_corners([
        (left as f32, top as f32),
        (right as f32, top as f32),
        (right as f32, bottom as f32),
        (left as f32, bottom as f32),
    ]);
    TextDetection {
        quad,
        source_text: text,
        confidence,
        translated_text: String::new(),
        rotation_angle: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn words_on_one_line_merge_into_a_single_detection() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t90\tПро\n\
             5\t1\t1\t1\t1\t2\t55\t21\t60\t11\t80\tоплату\n"
        );
        let detections = parse_tsv_detections(&tsv);
        assert_eq!(detections.len(), 1);
        let detection = &detections[0];
        assert_eq!(detection.source_text, "Про оплату");
        assert_eq!(detection.quad.axis_aligned_extents(), (105, 12));
        assert_eq!(detection.quad.top_left().y, 20.0);
        // 3 chars at 0.90 and 6 chars at 0.80, length weighted.
        assert!((detection.confidence - (3.0 * 90.0 + 6.0 * 80.0) / 9.0 / 100.0).abs() < 1e-4);
        assert_eq!(detection.rotation_angle, 0.0);
    }

    #[test]
    fn separate_lines_stay_separate() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t90\tодин\n\
             5\t1\t1\t1\t2\t1\t10\t40\t40\t12\t90\tдва\n"
        );
        let detections = parse_tsv_detections(&tsv);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].source_text, "один");
        assert_eq!(detections[1].source_text, "два");
    }

    #[test]
    fn low_confidence_and_structural_rows_are_ignored() {
        let tsv = format!(
            "{HEADER}\n\
             4\t1\t1\t1\t1\t0\t10\t20\t200\t12\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t20\t40\t12\t-1\tшум\n\
             5\t1\t1\t1\t1\t2\t55\t20\t40\t12\t85\tслово\n"
        );
        let detections = parse_tsv_detections(&tsv);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].source_text, "слово");
    }

    #[test]
    fn short_rows_do_not_panic() {
        let detections = parse_tsv_detections("level\tpage\nbroken row\n5\t1\t1\n");
        assert!(detections.is_empty());
    }
}
