use anyhow::{Context, Result, anyhow, bail};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Extensions accepted as page images. These are the formats the renderer
/// can both decode and embed into the debug page.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

/// Directory layout of one numbered run.
pub struct RunDirs {
    pub root: PathBuf,
    pub input_images: PathBuf,
    pub output_images: PathBuf,
}

/// Creates the next numbered run directory under `output_root` with its
/// `input_images/` and `output_images/` subdirectories. Runs are numbered
/// 001, 002, ... after the highest existing all-digit directory name.
pub fn prepare_run_dir(output_root: &Path) -> Result<RunDirs> {
    fs::create_dir_all(output_root)
        .with_context(|| format!("failed to create {}", output_root.display()))?;
    let run_number = next_run_number(output_root)?;
    let root = output_root.join(format!("{run_number:03}"));
    let input_images = root.join("input_images");
    let output_images = root.join("output_images");
    fs::create_dir_all(&input_images)
        .with_context(|| format!("failed to create {}", input_images.display()))?;
    fs::create_dir_all(&output_images)
        .with_context(|| format!("failed to create {}", output_images.display()))?;
    info!("run directory: {}", root.display());
    Ok(RunDirs {
        root,
        input_images,
        output_images,
    })
}

fn next_run_number(output_root: &Path) -> Result<u32> {
    let mut highest = 0u32;
    let entries = fs::read_dir(output_root)
        .with_context(|| format!("failed to list {}", output_root.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.is_empty() && name.chars().all(|ch| ch.is_ascii_digit()) {
            if let Ok(number) = name.parse::<u32>() {
                highest = highest.max(number);
            }
        }
    }
    Ok(highest + 1)
}

/// Lists the images to process: either the single file given, or every
/// image directly inside the given directory, sorted by name.
pub fn collect_images(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input not found: {}", input.display());
    }
    let mut images = Vec::new();
    let entries =
        fs::read_dir(input).with_context(|| format!("failed to list {}", input.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| IMAGE_EXTENSIONS.contains(&extension.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Copies the images (and their detection sidecars, when present) into the
/// run's `input_images/` directory, so a run folder is self-contained and
/// reproducible. Returns the staged paths.
pub fn stage_inputs(images: &[PathBuf], input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut staged = Vec::with_capacity(images.len());
    for source in images {
        let name = source
            .file_name()
            .ok_or_else(|| anyhow!("image path has no file name: {}", source.display()))?;
        let destination = input_dir.join(name);
        fs::copy(source, &destination).with_context(|| {
            format!(
                "failed to copy {} to {}",
                source.display(),
                destination.display()
            )
        })?;
        let sidecar = source.with_extension("json");
        if sidecar.exists() {
            let sidecar_destination = destination.with_extension("json");
            fs::copy(&sidecar, &sidecar_destination).with_context(|| {
                format!("failed to copy sidecar {}", sidecar.display())
            })?;
        }
        staged.push(destination);
    }
    Ok(staged)
}
