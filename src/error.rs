use std::path::PathBuf;

use serde::ser::{SerializeStruct, Serializer};
use thiserror::Error;
use uuid::Uuid;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to access {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported schemaVersion: expected {expected}, got {found}")]
    UnsupportedSchema { expected: u32, found: u32 },

    #[error("Score not found: {0}")]
    ScoreNotFound(Uuid),

    #[error("Page not found: {0}")]
    PageNotFound(Uuid),

    #[error("Segment not found: {0}")]
    SegmentNotFound(Uuid),

    #[error("Score {0} has no autoplay timeline")]
    TimelineMissing(Uuid),

    #[error("Speed factor must be a positive finite number, got {0}")]
    InvalidSpeedFactor(f64),

    #[error("Base duration must be a positive finite number of seconds, got {0}")]
    InvalidDuration(f64),

    #[error("Crop rectangle is not normalized: {0}")]
    InvalidCropRect(String),

    #[error("Title must not be empty")]
    InvalidTitle,

    #[error("Bundle has no manifest.json: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("Bundle manifest is malformed: {0}")]
    ManifestMalformed(String),

    #[error("Bundle has no images directory: {}", .0.display())]
    ImagesDirMissing(PathBuf),

    #[error("Export target is not empty and holds no earlier bundle: {}", .0.display())]
    ExportTargetOccupied(PathBuf),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Failed to resolve application data directory")]
    DataDirUnavailable,

    #[error("Playback state lock was poisoned")]
    LockPoisoned,
}

impl AppError {
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::FileIo { .. } => "FILE_IO",
            Self::UnsupportedSchema { .. } => "UNSUPPORTED_SCHEMA",
            Self::ScoreNotFound(_) => "SCORE_NOT_FOUND",
            Self::PageNotFound(_) => "PAGE_NOT_FOUND",
            Self::SegmentNotFound(_) => "SEGMENT_NOT_FOUND",
            Self::TimelineMissing(_) => "TIMELINE_MISSING",
            Self::InvalidSpeedFactor(_) => "INVALID_SPEED_FACTOR",
            Self::InvalidDuration(_) => "INVALID_DURATION",
            Self::InvalidCropRect(_) => "INVALID_CROP_RECT",
            Self::InvalidTitle => "INVALID_TITLE",
            Self::ManifestMissing(_) => "IMPORT_MANIFEST_MISSING",
            Self::ManifestMalformed(_) => "IMPORT_MANIFEST_MALFORMED",
            Self::ImagesDirMissing(_) => "IMPORT_IMAGES_DIR_MISSING",
            Self::ExportTargetOccupied(_) => "EXPORT_TARGET_OCCUPIED",
            Self::ImageNotFound(_) => "IMAGE_NOT_FOUND",
            Self::DataDirUnavailable => "DATA_DIR_UNAVAILABLE",
            Self::LockPoisoned => "LOCK_POISONED",
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("AppError", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}
