// src/pipeline/readers/image_reader.rs

use crate::data_model::{ImagePayload, WorkItem};
use crate::error::Result;
use crate::pipeline::readers::BaseReader;

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

pub fn is_supported_image(path: &Path) -> bool {
    extension_of(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Media type announced to the service; unknown extensions are sent as JPEG.
pub fn media_type_for(path: &Path) -> &'static str {
    match extension_of(path).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    }
}

/// Reads the image behind a work item without blocking the runtime.
pub async fn load_image(item: &WorkItem) -> Result<ImagePayload> {
    let bytes = tokio::fs::read(item.path()).await?;
    Ok(ImagePayload {
        bytes,
        media_type: media_type_for(item.path()),
    })
}

/// Expands files and directories given on the command line into work items.
///
/// Files are taken as given. Directories contribute their supported images,
/// sorted by path. Paths that do not exist are logged and skipped.
#[derive(Debug, Clone)]
pub struct ImageReader {
    inputs: Vec<PathBuf>,
    recursive: bool,
}

impl ImageReader {
    pub fn new(inputs: Vec<PathBuf>, recursive: bool) -> Self {
        ImageReader { inputs, recursive }
    }

    fn collect_dir(&self, dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                if self.recursive {
                    self.collect_dir(&path, found)?;
                }
            } else if is_supported_image(&path) {
                found.push(path);
            }
        }
        Ok(())
    }
}

impl BaseReader for ImageReader {
    fn read_items(&self) -> Result<Vec<WorkItem>> {
        let mut items = Vec::new();

        for input in &self.inputs {
            if input.is_dir() {
                let mut found = Vec::new();
                self.collect_dir(input, &mut found)?;
                found.sort();
                debug!(dir = %input.display(), count = found.len(), "Scanned directory");
                items.extend(found.into_iter().map(WorkItem::new));
            } else if input.is_file() {
                if !is_supported_image(input) {
                    warn!(path = %input.display(), "File extension is not a known image type; sending anyway");
                }
                items.push(WorkItem::new(input.clone()));
            } else {
                warn!(path = %input.display(), "Input does not exist. Skipping.");
            }
        }

        Ok(items)
    }
}
