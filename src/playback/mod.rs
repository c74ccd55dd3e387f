//! Drives a scroll surface through a timeline in real time.

pub mod controller;
pub mod session;
pub mod surface;
pub mod ticker;

pub use controller::{
    ControllerConfig, InteractionPolicy, PlaybackController, PlaybackState, TickOutcome,
};
pub use session::PlaybackSession;
pub use surface::{ScrollOffset, ScrollSurface, VirtualViewport};
pub use ticker::{lock_controller, shared, PlaybackTicker, SharedController};
