//! A playback controller bundled with the frame loop that drives it.
//!
//! Every transition goes through the session, which starts the ticker when
//! the controller enters `Playing` and aborts it on any other state. Dropping
//! the session aborts the ticker too.

use std::sync::MutexGuard;
use std::time::{Duration, Instant};

use crate::algorithm::geometry::TimelineGeometry;
use crate::algorithm::layout::Viewport;
use crate::error::AppResult;
use crate::playback::controller::{PlaybackController, PlaybackState};
use crate::playback::surface::ScrollSurface;
use crate::playback::ticker::{lock_controller, shared, PlaybackTicker, SharedController};

pub struct PlaybackSession<S: ScrollSurface> {
    controller: SharedController<S>,
    frame_interval: Duration,
    ticker: Option<PlaybackTicker>,
}

impl<S> PlaybackSession<S>
where
    S: ScrollSurface + Send + 'static,
{
    pub fn new(controller: PlaybackController<S>, frame_interval: Duration) -> Self {
        Self {
            controller: shared(controller),
            frame_interval,
            ticker: None,
        }
    }

    pub fn controller(&self) -> &SharedController<S> {
        &self.controller
    }

    pub fn lock(&self) -> AppResult<MutexGuard<'_, PlaybackController<S>>> {
        lock_controller(&self.controller)
    }

    /// Whether a frame loop is alive. Turns false on its own once the
    /// controller completes or a user scroll pauses it.
    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(PlaybackTicker::is_running)
    }

    pub fn state(&self) -> AppResult<PlaybackState> {
        Ok(self.lock()?.state())
    }

    /// Must be called from inside a Tokio runtime.
    pub fn play(&mut self, now: Instant) -> AppResult<PlaybackState> {
        let state = self.lock()?.play(now);
        self.sync_ticker(state);
        Ok(state)
    }

    pub fn pause(&mut self) -> AppResult<PlaybackState> {
        let state = self.lock()?.pause();
        self.sync_ticker(state);
        Ok(state)
    }

    pub fn set_playing(&mut self, playing: bool, now: Instant) -> AppResult<PlaybackState> {
        if playing {
            self.play(now)
        } else {
            self.pause()
        }
    }

    pub fn stop(&mut self) -> AppResult<()> {
        self.cancel_ticker();
        self.lock()?.stop();
        Ok(())
    }

    pub fn configure(&mut self, geometry: TimelineGeometry, viewport: Viewport) -> AppResult<()> {
        self.cancel_ticker();
        self.lock()?.configure(geometry, viewport);
        Ok(())
    }

    pub fn viewport_did_layout(&mut self, viewport: Viewport) -> AppResult<()> {
        let state = {
            let mut controller = self.lock()?;
            controller.viewport_did_layout(viewport);
            controller.state()
        };
        self.sync_ticker(state);
        Ok(())
    }

    pub fn invalidate(&mut self) -> AppResult<()> {
        self.cancel_ticker();
        self.lock()?.invalidate();
        Ok(())
    }

    pub fn teardown(&mut self) -> AppResult<()> {
        self.cancel_ticker();
        self.lock()?.teardown();
        Ok(())
    }

    fn sync_ticker(&mut self, state: PlaybackState) {
        if state != PlaybackState::Playing {
            self.cancel_ticker();
        } else if !self.is_ticking() {
            self.ticker = Some(PlaybackTicker::spawn(
                self.controller.clone(),
                self.frame_interval,
            ));
            log::debug!("playback: frame loop started");
        }
    }

    fn cancel_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
            log::debug!("playback: frame loop cancelled");
        }
    }
}
