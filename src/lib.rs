pub mod algorithm;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod playback;
pub mod storage;

pub use algorithm::geometry::{ImageDimensions, ImageSize, SegmentGeometry, TimelineGeometry};
pub use algorithm::layout::{LayoutConfig, LayoutProjection, Viewport};
pub use algorithm::playback_clock::PlaybackClock;
pub use algorithm::time_allocation::TimeAllocation;
pub use algorithm::PlaybackPlan;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use playback::{
    ControllerConfig, InteractionPolicy, PlaybackController, PlaybackSession, PlaybackState,
    PlaybackTicker, ScrollOffset, ScrollSurface, TickOutcome, VirtualViewport,
};
