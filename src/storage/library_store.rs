//! library_store: loading and saving library.json.

use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::models::library::{Library, SCHEMA_VERSION};

#[derive(Debug, Clone)]
pub struct LibraryStore {
    path: PathBuf,
}

impl LibraryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the library. A missing file is an empty library.
    pub fn load(&self) -> AppResult<Library> {
        if !self.path.exists() {
            log::info!("load_library: {} not found, starting empty", self.path.display());
            return Ok(Library::default());
        }

        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| AppError::file_io(&self.path, e))?;
        let mut library: Library = serde_json::from_str(&raw)?;

        if library.schema_version != SCHEMA_VERSION {
            return Err(AppError::UnsupportedSchema {
                expected: SCHEMA_VERSION,
                found: library.schema_version,
            });
        }

        library.normalize_order();
        log::info!(
            "load_library: path={} scores={}",
            self.path.display(),
            library.scores.len()
        );
        Ok(library)
    }

    /// Writes the library atomically (temp file, then rename).
    pub fn save(&self, library: &Library) -> AppResult<()> {
        if library.schema_version != SCHEMA_VERSION {
            return Err(AppError::UnsupportedSchema {
                expected: SCHEMA_VERSION,
                found: library.schema_version,
            });
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::file_io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(library)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| AppError::file_io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| AppError::file_io(&self.path, e))?;

        log::info!(
            "save_library: path={} scores={}",
            self.path.display(),
            library.scores.len()
        );
        Ok(())
    }

    /// Load, apply `edit`, save. Nothing is written when `edit` fails.
    pub fn update<T>(&self, edit: impl FnOnce(&mut Library) -> AppResult<T>) -> AppResult<T> {
        let mut library = self.load()?;
        let value = edit(&mut library)?;
        self.save(&library)?;
        Ok(value)
    }
}
