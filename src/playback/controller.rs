//! Playback controller: owns the play/pause/complete state machine and moves
//! the scroll surface along the playback clock on every tick.
//!
//! The controller never fights a gesture. While the user drags, it either
//! pauses (`InteractionPolicy::Pause`) or stands still and follows the user
//! (`InteractionPolicy::Follow`), re-deriving its time baseline from the
//! offset the user left behind. Any offset change it did not make itself is
//! treated the same way.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::algorithm::geometry::TimelineGeometry;
use crate::algorithm::layout::{LayoutConfig, Viewport};
use crate::algorithm::PlaybackPlan;
use crate::playback::surface::{ScrollOffset, ScrollSurface};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionPolicy {
    /// A user drag pauses playback; resuming continues from the dragged offset.
    #[default]
    Pause,
    /// Playback stays armed, skips ticks during the drag and resumes from the
    /// dragged offset once the gesture ends.
    Follow,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not playing; nothing to do.
    Idle,
    Advanced { offset: f64, segment_index: usize },
    /// A gesture owns the surface; the tick was skipped.
    Deferred,
    /// A gesture or external scroll paused playback.
    Interrupted,
    Completed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub layout: LayoutConfig,
    pub interaction_policy: InteractionPolicy,
    /// Offset drift beyond this is treated as an external scroll.
    pub external_scroll_tolerance: f64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            interaction_policy: InteractionPolicy::default(),
            external_scroll_tolerance: 0.5,
        }
    }
}

/// Maps wall-clock instants to playback time.
#[derive(Debug, Clone, Copy)]
struct TimeBaseline {
    anchor: Instant,
    anchor_elapsed: f64,
}

impl TimeBaseline {
    fn elapsed_at(&self, now: Instant) -> f64 {
        self.anchor_elapsed + now.saturating_duration_since(self.anchor).as_secs_f64()
    }
}

type CompletionCallback = Box<dyn FnMut() + Send>;

pub struct PlaybackController<S: ScrollSurface> {
    surface: S,
    config: ControllerConfig,
    state: PlaybackState,
    geometry: Option<TimelineGeometry>,
    viewport: Viewport,
    plan: Option<PlaybackPlan>,
    baseline: Option<TimeBaseline>,
    current_segment_index: Option<usize>,
    last_applied_y: Option<f64>,
    following_user: bool,
    completion_armed: bool,
    on_complete: Option<CompletionCallback>,
}

impl<S: ScrollSurface> fmt::Debug for PlaybackController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state)
            .field("viewport", &self.viewport)
            .field("has_plan", &self.plan.is_some())
            .field("current_segment_index", &self.current_segment_index)
            .finish()
    }
}

impl<S: ScrollSurface> PlaybackController<S> {
    pub fn new(surface: S, config: ControllerConfig) -> Self {
        Self {
            surface,
            config,
            state: PlaybackState::Stopped,
            geometry: None,
            viewport: Viewport::default(),
            plan: None,
            baseline: None,
            current_segment_index: None,
            last_applied_y: None,
            following_user: false,
            completion_armed: false,
            on_complete: None,
        }
    }

    /// Called once each time playback reaches the end on its own.
    pub fn set_on_complete(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn plan(&self) -> Option<&PlaybackPlan> {
        self.plan.as_ref()
    }

    pub fn current_offset(&self) -> f64 {
        self.surface.offset().y
    }

    pub fn current_segment_index(&self) -> Option<usize> {
        self.current_segment_index
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Gesture handlers reach the surface through here.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Installs a new timeline. Stops playback and rebuilds every table; with
    /// an unmeasured viewport the build waits for [`viewport_did_layout`].
    ///
    /// [`viewport_did_layout`]: PlaybackController::viewport_did_layout
    pub fn configure(&mut self, geometry: TimelineGeometry, viewport: Viewport) {
        self.stop();
        self.geometry = Some(geometry);
        self.viewport = viewport;
        self.rebuild();
    }

    /// Reports the measured viewport size. Builds a deferred configuration,
    /// or rebuilds (and stops) when the size changed.
    pub fn viewport_did_layout(&mut self, viewport: Viewport) {
        if self.plan.is_some() && self.viewport == viewport {
            return;
        }
        if self.plan.is_some() {
            self.stop();
        }
        self.viewport = viewport;
        self.rebuild();
    }

    /// Drops the tables after a structural edit until the next `configure`.
    pub fn invalidate(&mut self) {
        self.stop();
        self.geometry = None;
        self.plan = None;
        log::debug!("playback: tables invalidated");
    }

    fn rebuild(&mut self) {
        let Some(geometry) = self.geometry.as_ref() else {
            self.plan = None;
            return;
        };
        if !self.viewport.is_measured() {
            self.plan = None;
            log::debug!("playback: viewport not measured yet, deferring layout");
            return;
        }

        let plan = PlaybackPlan::build(geometry, self.viewport, &self.config.layout);
        let current = self.surface.offset();
        self.surface.set_offset(ScrollOffset::new(
            plan.horizontal_offset(),
            current.y.clamp(0.0, plan.clock.max_offset()),
        ));
        log::debug!(
            "playback: plan built segments={} max_offset={:.1} duration={:.2}s",
            plan.projection.len(),
            plan.clock.max_offset(),
            plan.clock.total_duration()
        );
        self.plan = Some(plan);
    }

    pub fn set_playing(&mut self, playing: bool, now: Instant) -> PlaybackState {
        if playing {
            self.play(now)
        } else {
            self.pause()
        }
    }

    /// Starts or resumes playback from the surface's current offset.
    pub fn play(&mut self, now: Instant) -> PlaybackState {
        if self.state == PlaybackState::Playing {
            return self.state;
        }
        let Some(plan) = self.plan.as_ref() else {
            log::warn!("playback: play requested before the timeline was laid out");
            return self.state;
        };
        let total_duration = plan.clock.total_duration();

        let mut current = self.surface.offset();
        if self.state == PlaybackState::Completed {
            current.y = 0.0;
            self.surface.set_offset(current);
        }

        self.completion_armed = true;
        self.following_user = false;
        self.last_applied_y = Some(current.y);

        if total_duration <= 0.0 {
            log::debug!("playback: nothing to scroll, completing immediately");
            self.complete();
            return self.state;
        }

        let from = self.state;
        self.resync(now, current.y);
        self.state = PlaybackState::Playing;
        log::debug!("playback: {from:?} -> Playing at offset {:.1}", current.y);
        self.state
    }

    pub fn pause(&mut self) -> PlaybackState {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            self.baseline = None;
            self.following_user = false;
            log::debug!("playback: Playing -> Paused at offset {:.1}", self.current_offset());
        }
        self.state
    }

    pub fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            log::debug!("playback: {:?} -> Stopped", self.state);
        }
        self.state = PlaybackState::Stopped;
        self.baseline = None;
        self.current_segment_index = None;
        self.last_applied_y = None;
        self.following_user = false;
        self.completion_armed = false;
    }

    /// Stops playback and releases the completion callback.
    pub fn teardown(&mut self) {
        self.stop();
        self.on_complete = None;
        self.plan = None;
        self.geometry = None;
    }

    /// Advances playback to `now`; call once per display frame.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state != PlaybackState::Playing {
            return TickOutcome::Idle;
        }
        if self.plan.is_none() {
            self.stop();
            return TickOutcome::Idle;
        }

        let current = self.surface.offset();
        let interacting = self.surface.is_user_interacting();
        let moved_externally = self
            .last_applied_y
            .is_some_and(|y| (current.y - y).abs() > self.config.external_scroll_tolerance);

        if interacting || moved_externally {
            match self.config.interaction_policy {
                InteractionPolicy::Pause => {
                    self.state = PlaybackState::Paused;
                    self.baseline = None;
                    log::debug!(
                        "playback: Playing -> Paused by user scroll at offset {:.1}",
                        current.y
                    );
                    return TickOutcome::Interrupted;
                }
                InteractionPolicy::Follow if interacting => {
                    self.following_user = true;
                    self.last_applied_y = Some(current.y);
                    return TickOutcome::Deferred;
                }
                InteractionPolicy::Follow => self.following_user = true,
            }
        }

        if self.following_user {
            self.following_user = false;
            self.resync(now, current.y);
        }

        let Some(baseline) = self.baseline else {
            self.resync(now, current.y);
            return TickOutcome::Deferred;
        };
        let elapsed = baseline.elapsed_at(now);

        let Some(plan) = self.plan.as_ref() else {
            return TickOutcome::Idle;
        };
        if plan.clock.is_complete(elapsed) {
            self.complete();
            return TickOutcome::Completed;
        }

        let target = plan.clock.position(elapsed);
        let segment_index = plan.clock.segment_index_at(elapsed).unwrap_or(0);
        self.surface.set_offset(ScrollOffset::new(current.x, target));
        self.last_applied_y = Some(target);
        if self.current_segment_index != Some(segment_index) {
            log::debug!("playback: entering segment {segment_index}");
        }
        self.current_segment_index = Some(segment_index);
        TickOutcome::Advanced {
            offset: target,
            segment_index,
        }
    }

    /// Re-derives the time baseline from an offset.
    fn resync(&mut self, now: Instant, offset_y: f64) {
        let Some(plan) = self.plan.as_ref() else {
            return;
        };
        let anchor_elapsed = plan.clock.elapsed_time(offset_y);
        self.baseline = Some(TimeBaseline {
            anchor: now,
            anchor_elapsed,
        });
        self.current_segment_index = plan.clock.segment_index_at(anchor_elapsed);
        self.last_applied_y = Some(offset_y);
    }

    fn complete(&mut self) {
        let max_offset = self
            .plan
            .as_ref()
            .map(|plan| plan.clock.max_offset())
            .unwrap_or(0.0);
        let current = self.surface.offset();
        self.surface.set_offset(ScrollOffset::new(current.x, max_offset));
        self.last_applied_y = Some(max_offset);
        self.baseline = None;
        self.current_segment_index = None;
        self.state = PlaybackState::Completed;
        log::debug!("playback: -> Completed at offset {max_offset:.1}");

        if self.completion_armed {
            self.completion_armed = false;
            if let Some(callback) = self.on_complete.as_mut() {
                callback();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::algorithm::geometry::{ImageSize, SegmentGeometry};
    use crate::models::library::NormalizedRect;
    use crate::playback::surface::VirtualViewport;

    const EPS: f64 = 1e-6;

    /// Distances 100/200/300 px at a 100x100 viewport, 60 s total.
    fn three_segment_geometry() -> TimelineGeometry {
        let segment = |height: u32| {
            SegmentGeometry::new(Some(ImageSize::new(100, height)), NormalizedRect::FULL, 1.0)
        };
        TimelineGeometry::new(60.0, 1.0, vec![segment(100), segment(200), segment(400)])
    }

    fn viewport() -> Viewport {
        Viewport::new(100.0, 100.0)
    }

    fn controller(policy: InteractionPolicy) -> PlaybackController<VirtualViewport> {
        let config = ControllerConfig {
            interaction_policy: policy,
            ..ControllerConfig::default()
        };
        let mut controller = PlaybackController::new(VirtualViewport::new(), config);
        controller.configure(three_segment_geometry(), viewport());
        controller
    }

    fn secs(value: f64) -> Duration {
        Duration::from_secs_f64(value)
    }

    fn completion_counter(controller: &mut PlaybackController<VirtualViewport>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let observed = count.clone();
        controller.set_on_complete(move || {
            observed.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn fixture_matches_expected_tables() {
        let controller = controller(InteractionPolicy::Pause);
        let plan = controller.plan().expect("plan");
        assert_eq!(plan.projection.end_offsets, vec![100.0, 300.0, 600.0]);
        assert_eq!(plan.clock.max_offset(), 600.0);
    }

    #[test]
    fn ticks_follow_the_clock() {
        let mut controller = controller(InteractionPolicy::Pause);
        let start = Instant::now();
        assert_eq!(controller.play(start), PlaybackState::Playing);

        match controller.tick(start + secs(5.0)) {
            TickOutcome::Advanced {
                offset,
                segment_index,
            } => {
                assert!((offset - 50.0).abs() < EPS);
                assert_eq!(segment_index, 0);
            }
            other => panic!("expected advance, got {other:?}"),
        }

        controller.tick(start + secs(20.0));
        assert!((controller.current_offset() - 200.0).abs() < EPS);
        assert_eq!(controller.current_segment_index(), Some(1));
    }

    #[test]
    fn completion_snaps_to_max_and_fires_once() {
        let mut controller = controller(InteractionPolicy::Pause);
        let completions = completion_counter(&mut controller);
        let start = Instant::now();
        controller.play(start);

        assert_eq!(controller.tick(start + secs(30.0)), TickOutcome::Advanced {
            offset: 300.0,
            segment_index: 2,
        });
        assert_eq!(controller.tick(start + secs(61.0)), TickOutcome::Completed);
        assert_eq!(controller.state(), PlaybackState::Completed);
        assert_eq!(controller.current_offset(), 600.0);
        assert_eq!(controller.tick(start + secs(62.0)), TickOutcome::Idle);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pause_and_stop_do_not_fire_completion() {
        let mut controller = controller(InteractionPolicy::Pause);
        let completions = completion_counter(&mut controller);
        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(1.0));
        controller.pause();
        controller.stop();
        assert_eq!(completions.load(Ordering::SeqCst), 0);
        assert_eq!(controller.tick(start + secs(100.0)), TickOutcome::Idle);
    }

    #[test]
    fn resume_after_scrub_continues_from_the_new_offset() {
        let mut controller = controller(InteractionPolicy::Pause);
        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(5.0));
        assert_eq!(controller.pause(), PlaybackState::Paused);

        // 0.4 * max lies inside the second segment (100..300 px, 10..30 s).
        controller.surface_mut().drag_to(240.0);
        let resumed_at = start + secs(40.0);
        assert_eq!(controller.play(resumed_at), PlaybackState::Playing);

        controller.tick(resumed_at);
        assert!((controller.current_offset() - 240.0).abs() < EPS);
        assert_eq!(controller.current_segment_index(), Some(1));

        controller.tick(resumed_at + secs(1.0));
        assert!((controller.current_offset() - 250.0).abs() < EPS);
    }

    #[test]
    fn drag_pauses_playback_under_pause_policy() {
        let mut controller = controller(InteractionPolicy::Pause);
        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(2.0));

        controller.surface_mut().begin_drag();
        assert_eq!(controller.tick(start + secs(3.0)), TickOutcome::Interrupted);
        assert_eq!(controller.state(), PlaybackState::Paused);
    }

    #[test]
    fn follow_policy_tracks_the_drag_and_resumes_without_a_jump() {
        let mut controller = controller(InteractionPolicy::Follow);
        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(2.0));

        controller.surface_mut().begin_drag();
        controller.surface_mut().drag_to(450.0);
        assert_eq!(controller.tick(start + secs(3.0)), TickOutcome::Deferred);
        assert_eq!(controller.current_offset(), 450.0);
        assert_eq!(controller.state(), PlaybackState::Playing);

        controller.surface_mut().drag_to(500.0);
        controller.surface_mut().end_drag(true);
        assert_eq!(controller.tick(start + secs(4.0)), TickOutcome::Deferred);
        controller.surface_mut().end_deceleration();

        let released = start + secs(9.0);
        controller.tick(released);
        assert!((controller.current_offset() - 500.0).abs() < EPS);

        // The third segment covers 300 px in 30 s.
        controller.tick(released + secs(3.0));
        assert!((controller.current_offset() - 530.0).abs() < EPS);
    }

    #[test]
    fn programmatic_scroll_is_treated_as_external() {
        let mut controller = controller(InteractionPolicy::Follow);
        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(1.0));

        controller
            .surface_mut()
            .set_offset(ScrollOffset::new(0.0, 300.0));
        let jumped = start + secs(2.0);
        controller.tick(jumped);
        assert!((controller.current_offset() - 300.0).abs() < EPS);
        assert_eq!(controller.current_segment_index(), Some(2));
    }

    #[test]
    fn reconfiguring_stops_and_rebuilds() {
        let mut controller = controller(InteractionPolicy::Pause);
        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(10.0));

        let shorter = TimelineGeometry::new(
            10.0,
            1.0,
            vec![SegmentGeometry::new(
                Some(ImageSize::new(100, 300)),
                NormalizedRect::FULL,
                1.0,
            )],
        );
        controller.configure(shorter, viewport());
        assert_eq!(controller.state(), PlaybackState::Stopped);
        let plan = controller.plan().expect("rebuilt plan");
        assert_eq!(plan.clock.max_offset(), 200.0);
        assert_eq!(plan.clock.total_duration(), 10.0);
        assert_eq!(controller.tick(start + secs(11.0)), TickOutcome::Idle);
    }

    #[test]
    fn invalidated_controller_refuses_to_play() {
        let mut controller = controller(InteractionPolicy::Pause);
        controller.invalidate();
        assert!(controller.plan().is_none());
        assert_eq!(controller.play(Instant::now()), PlaybackState::Stopped);
    }

    #[test]
    fn layout_waits_for_a_measured_viewport() {
        let mut controller =
            PlaybackController::new(VirtualViewport::new(), ControllerConfig::default());
        controller.configure(three_segment_geometry(), Viewport::default());
        assert!(controller.plan().is_none());
        assert_eq!(controller.play(Instant::now()), PlaybackState::Stopped);

        controller.viewport_did_layout(viewport());
        assert!(controller.plan().is_some());
        assert_eq!(controller.play(Instant::now()), PlaybackState::Playing);
    }

    #[test]
    fn viewport_resize_stops_and_rebuilds() {
        let mut controller = controller(InteractionPolicy::Pause);
        controller.play(Instant::now());
        controller.viewport_did_layout(Viewport::new(50.0, 100.0));
        assert_eq!(controller.state(), PlaybackState::Stopped);
        let plan = controller.plan().expect("plan");
        assert_eq!(plan.projection.content_height, 350.0);
    }

    #[test]
    fn content_that_fits_completes_instantly() {
        let fits = TimelineGeometry::new(
            60.0,
            1.0,
            vec![SegmentGeometry::new(
                Some(ImageSize::new(100, 50)),
                NormalizedRect::FULL,
                1.0,
            )],
        );
        let mut controller =
            PlaybackController::new(VirtualViewport::new(), ControllerConfig::default());
        controller.configure(fits, viewport());
        let completions = completion_counter(&mut controller);

        assert_eq!(controller.play(Instant::now()), PlaybackState::Completed);
        assert_eq!(controller.current_offset(), 0.0);
        assert_eq!(completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn play_after_completion_rewinds() {
        let mut controller = controller(InteractionPolicy::Pause);
        let completions = completion_counter(&mut controller);
        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(60.0));
        assert_eq!(controller.state(), PlaybackState::Completed);

        let again = start + secs(70.0);
        controller.play(again);
        assert_eq!(controller.current_offset(), 0.0);
        controller.tick(again + secs(61.0));
        assert_eq!(completions.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn horizontal_offset_is_preserved_while_playing() {
        let narrow = TimelineGeometry::new(
            60.0,
            0.5,
            vec![SegmentGeometry::new(
                Some(ImageSize::new(100, 800)),
                NormalizedRect::FULL,
                1.0,
            )],
        );
        let mut controller =
            PlaybackController::new(VirtualViewport::new(), ControllerConfig::default());
        controller.configure(narrow, viewport());
        assert_eq!(controller.surface().offset().x, -25.0);

        let start = Instant::now();
        controller.play(start);
        controller.tick(start + secs(30.0));
        assert_eq!(controller.surface().offset().x, -25.0);
        assert!((controller.current_offset() - 150.0).abs() < EPS);
    }

    #[test]
    fn teardown_releases_callback_and_tables() {
        let mut controller = controller(InteractionPolicy::Pause);
        let completions = completion_counter(&mut controller);
        controller.play(Instant::now());
        controller.teardown();
        assert_eq!(controller.state(), PlaybackState::Stopped);
        assert!(controller.plan().is_none());
        assert_eq!(Arc::strong_count(&completions), 1);
    }
}
