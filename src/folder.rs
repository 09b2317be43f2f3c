use std::path::{Path, PathBuf};

use crate::error::{AnnotateError, Result};

pub const DEFAULT_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

fn is_supported(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Files directly inside `dir` with one of `extensions` (case-insensitive),
/// sorted by path.
pub fn list_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let read_folder = |source: std::io::Error| AnnotateError::ReadFolder {
        path: dir.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_folder)? {
        let path = entry.map_err(read_folder)?.path();
        if path.is_file() && is_supported(&path, extensions) {
            images.push(path);
        }
    }

    if images.is_empty() {
        return Err(AnnotateError::ImageListEmpty(dir.to_path_buf()));
    }
    images.sort();
    Ok(images)
}
