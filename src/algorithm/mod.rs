pub mod geometry;
pub mod layout;
pub mod playback_clock;
pub mod time_allocation;

use geometry::TimelineGeometry;
use layout::{LayoutConfig, LayoutProjection, Viewport};
use playback_clock::PlaybackClock;
use time_allocation::TimeAllocation;

/// Layout, time and clock tables built together from one geometry snapshot.
///
/// The tables are only ever produced as a unit so a clock can never refer to
/// a layout or allocation from an older timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    pub viewport: Viewport,
    pub projection: LayoutProjection,
    pub allocation: TimeAllocation,
    pub clock: PlaybackClock,
}

impl PlaybackPlan {
    pub fn build(geometry: &TimelineGeometry, viewport: Viewport, config: &LayoutConfig) -> Self {
        let projection = LayoutProjection::project(geometry, viewport, config);
        let allocation = TimeAllocation::allocate(
            &projection.distances(),
            &geometry.speed_factors(),
            geometry.base_duration_secs,
        );
        let clock = PlaybackClock::new(&projection, &allocation);
        Self {
            viewport,
            projection,
            allocation,
            clock,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.allocation.is_degenerate()
    }

    pub fn horizontal_offset(&self) -> f64 {
        self.projection.horizontal_center_offset(self.viewport.width)
    }
}
