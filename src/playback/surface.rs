//! The scrollable view driven by playback.
//!
//! The offset is shared between the playback clock and user gestures; the
//! surface reports whether a gesture currently owns it.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

impl ScrollOffset {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub trait ScrollSurface {
    fn offset(&self) -> ScrollOffset;

    fn set_offset(&mut self, offset: ScrollOffset);

    /// True while the user drags the view or it decelerates after a drag.
    fn is_user_interacting(&self) -> bool;
}

/// In-memory scroll view used by the CLI simulation and by tests.
#[derive(Debug, Clone, Default)]
pub struct VirtualViewport {
    offset: ScrollOffset,
    dragging: bool,
    decelerating: bool,
}

impl VirtualViewport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
        self.decelerating = false;
    }

    /// Moves the content as a finger drag would.
    pub fn drag_to(&mut self, y: f64) {
        self.offset.y = y;
    }

    pub fn end_drag(&mut self, decelerate: bool) {
        self.dragging = false;
        self.decelerating = decelerate;
    }

    pub fn end_deceleration(&mut self) {
        self.decelerating = false;
    }
}

impl ScrollSurface for VirtualViewport {
    fn offset(&self) -> ScrollOffset {
        self.offset
    }

    fn set_offset(&mut self, offset: ScrollOffset) {
        self.offset = offset;
    }

    fn is_user_interacting(&self) -> bool {
        self.dragging || self.decelerating
    }
}
