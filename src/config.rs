//! Application configuration (`<dataDir>/config.json`).

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::layout::LayoutConfig;
use crate::error::{AppError, AppResult};
use crate::playback::controller::{ControllerConfig, InteractionPolicy};
use crate::storage::{ImageStore, LibraryStore};

pub const DATA_DIR_ENV: &str = "SCORENEST_DATA_DIR";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const LIBRARY_FILE_NAME: &str = "library.json";
pub const IMAGES_SUBDIRECTORY: &str = "ScoreNestImages";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    /// Tick cadence of the playback ticker.
    pub frame_interval_ms: u64,
    pub interaction_policy: InteractionPolicy,
    pub external_scroll_tolerance_px: f64,
    pub segment_spacing: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().unwrap_or_default(),
            frame_interval_ms: 16,
            interaction_policy: InteractionPolicy::Pause,
            external_scroll_tolerance_px: 0.5,
            segment_spacing: 0.0,
        }
    }
}

impl AppConfig {
    /// Resolves the data directory (`data_dir` argument, then
    /// `SCORENEST_DATA_DIR`, then the platform default) and reads its
    /// `config.json` if there is one.
    pub fn load(data_dir: Option<PathBuf>) -> AppResult<Self> {
        let explicit = data_dir.or_else(|| env_data_dir(std::env::var_os(DATA_DIR_ENV)));
        let dir = explicit
            .clone()
            .or_else(default_data_dir)
            .ok_or(AppError::DataDirUnavailable)?;
        let mut config = Self::load_from(&dir)?;
        if let Some(dir) = explicit {
            config.data_dir = dir;
        }
        Ok(config)
    }

    /// Reads `<dir>/config.json`; a missing file yields defaults rooted at `dir`.
    pub fn load_from(dir: &Path) -> AppResult<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self {
                data_dir: dir.to_path_buf(),
                ..Self::default()
            });
        }

        let raw = std::fs::read_to_string(&path).map_err(|e| AppError::file_io(&path, e))?;
        let mut config: Self = serde_json::from_str(&raw)?;
        // The file lives inside the data directory it describes.
        config.data_dir = dir.to_path_buf();
        log::info!("load_config: path={}", path.display());
        Ok(config)
    }

    pub fn save(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| AppError::file_io(&self.data_dir, e))?;
        let path = self.config_path();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| AppError::file_io(&path, e))?;
        log::info!("save_config: path={}", path.display());
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE_NAME)
    }

    pub fn library_path(&self) -> PathBuf {
        self.data_dir.join(LIBRARY_FILE_NAME)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_SUBDIRECTORY)
    }

    pub fn library_store(&self) -> LibraryStore {
        LibraryStore::new(self.library_path())
    }

    pub fn image_store(&self) -> ImageStore {
        ImageStore::new(self.images_dir())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn controller_config(&self) -> ControllerConfig {
        let tolerance = if self.external_scroll_tolerance_px.is_finite() {
            self.external_scroll_tolerance_px.max(0.0)
        } else {
            ControllerConfig::default().external_scroll_tolerance
        };
        ControllerConfig {
            layout: LayoutConfig {
                segment_spacing: self.segment_spacing,
            },
            interaction_policy: self.interaction_policy,
            external_scroll_tolerance: tolerance,
        }
    }
}

fn env_data_dir(value: Option<OsString>) -> Option<PathBuf> {
    value.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// `<platform data dir>/ScoreNest`, falling back to `~/.scorenest`.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("ScoreNest"))
        .or_else(|| dirs::home_dir().map(|home| home.join(".scorenest")))
}
