//! Flat image directory (`ScoreNestImages/`) holding one file per page.
//!
//! Stored names are `<uuid>.<ext>`. Lookups always use the bare file name, so
//! references that still carry a directory prefix resolve to the same file.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use crate::algorithm::geometry::{ImageDimensions, ImageSize};
use crate::error::{AppError, AppResult};
use crate::models::library::{bare_file_name, Library};

const DEFAULT_EXTENSION: &str = "png";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcReport {
    pub kept: usize,
    pub deleted: Vec<String>,
    /// `(file name, error message)` for files that could not be removed.
    pub failures: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Store rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let store = Self::new(dir);
        store.ensure_dir()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| AppError::file_io(&self.dir, e))
    }

    pub fn path_of(&self, image_name: &str) -> PathBuf {
        self.dir.join(bare_file_name(image_name))
    }

    pub fn exists(&self, image_name: &str) -> bool {
        self.path_of(image_name).is_file()
    }

    /// Writes `bytes` under a fresh name and returns that name.
    pub fn store(&self, bytes: &[u8], extension: &str) -> AppResult<String> {
        self.ensure_dir()?;
        let extension = extension.trim().trim_start_matches('.');
        let extension = if extension.is_empty() {
            DEFAULT_EXTENSION.to_string()
        } else {
            extension.to_ascii_lowercase()
        };
        let name = format!("{}.{extension}", Uuid::new_v4());
        let path = self.dir.join(&name);
        std::fs::write(&path, bytes).map_err(|e| AppError::file_io(&path, e))?;
        log::info!("store_image: name={name} bytes={}", bytes.len());
        Ok(name)
    }

    /// Copies an external image file into the store under a fresh name.
    pub fn store_file(&self, source: &Path) -> AppResult<String> {
        let bytes = std::fs::read(source).map_err(|e| AppError::file_io(source, e))?;
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or(DEFAULT_EXTENSION);
        self.store(&bytes, extension)
    }

    pub fn read(&self, image_name: &str) -> AppResult<Vec<u8>> {
        let path = self.path_of(image_name);
        if !path.is_file() {
            return Err(AppError::ImageNotFound(bare_file_name(image_name).to_string()));
        }
        std::fs::read(&path).map_err(|e| AppError::file_io(&path, e))
    }

    /// Returns `false` when there was nothing to delete.
    pub fn delete(&self, image_name: &str) -> AppResult<bool> {
        let path = self.path_of(image_name);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| AppError::file_io(&path, e))?;
        Ok(true)
    }

    /// Stored file names, sorted; hidden files and directories are skipped.
    pub fn list(&self) -> AppResult<Vec<String>> {
        list_visible_files(&self.dir)
    }

    /// Copies `source` in as `image_name` unless a file with that name exists.
    pub fn copy_in_if_absent(&self, source: &Path, image_name: &str) -> AppResult<bool> {
        let destination = self.path_of(image_name);
        if destination.exists() {
            return Ok(false);
        }
        self.ensure_dir()?;
        std::fs::copy(source, &destination).map_err(|e| AppError::file_io(&destination, e))?;
        Ok(true)
    }

    /// Deletes every stored image that no page references.
    pub fn collect_garbage(&self, library: &Library) -> AppResult<GcReport> {
        let referenced: BTreeSet<String> = library.referenced_image_names();
        let mut report = GcReport::default();

        for name in self.list()? {
            if referenced.contains(&name) {
                report.kept += 1;
                continue;
            }
            match self.delete(&name) {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    log::warn!("collect_garbage: failed to delete {name}: {e}");
                    report.failures.push((name, e.to_string()));
                }
            }
        }

        log::info!(
            "collect_garbage: kept={} deleted={} failed={}",
            report.kept,
            report.deleted.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

impl ImageDimensions for ImageStore {
    /// Reads only the image header.
    fn dimensions(&self, image_name: &str) -> Option<ImageSize> {
        let path = self.path_of(image_name);
        match image::image_dimensions(&path) {
            Ok((width, height)) => Some(ImageSize::new(width, height)),
            Err(e) => {
                log::warn!("image_dimensions: {}: {e}", path.display());
                None
            }
        }
    }
}

pub(crate) fn list_visible_files(dir: &Path) -> AppResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|e| AppError::file_io(dir, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AppError::file_io(dir, e))?;
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
