//! Frame-rate driver for a shared [`PlaybackController`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, AppResult};
use crate::playback::controller::{PlaybackController, TickOutcome};
use crate::playback::surface::ScrollSurface;

pub type SharedController<S> = Arc<Mutex<PlaybackController<S>>>;

pub fn shared<S: ScrollSurface>(controller: PlaybackController<S>) -> SharedController<S> {
    Arc::new(Mutex::new(controller))
}

pub fn lock_controller<S: ScrollSurface>(
    controller: &SharedController<S>,
) -> AppResult<MutexGuard<'_, PlaybackController<S>>> {
    controller.lock().map_err(|_| AppError::LockPoisoned)
}

/// Ticks the controller once per frame until it leaves the playing state.
/// [`PlaybackSession`](crate::playback::PlaybackSession) restarts it on
/// resume.
///
/// Dropping the ticker aborts the task.
pub struct PlaybackTicker {
    handle: Option<JoinHandle<()>>,
}

impl PlaybackTicker {
    pub fn spawn<S>(controller: SharedController<S>, frame_interval: Duration) -> Self
    where
        S: ScrollSurface + Send + 'static,
    {
        let frame_interval = frame_interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(frame_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let outcome = {
                    let Ok(mut guard) = controller.lock() else {
                        log::error!("ticker: controller lock poisoned, stopping");
                        break;
                    };
                    if !guard.is_playing() {
                        break;
                    }
                    guard.tick(Instant::now())
                };
                if matches!(outcome, TickOutcome::Completed | TickOutcome::Interrupted) {
                    break;
                }
            }
            log::debug!("ticker: frame loop finished");
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Waits for the frame loop to end on its own.
    pub async fn finished(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PlaybackTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::geometry::{ImageSize, SegmentGeometry, TimelineGeometry};
    use crate::algorithm::layout::Viewport;
    use crate::models::library::NormalizedRect;
    use crate::playback::controller::{ControllerConfig, PlaybackState};
    use crate::playback::surface::VirtualViewport;

    fn short_controller(base_duration_secs: f64) -> PlaybackController<VirtualViewport> {
        let geometry = TimelineGeometry::new(
            base_duration_secs,
            1.0,
            vec![SegmentGeometry::new(
                Some(ImageSize::new(100, 400)),
                NormalizedRect::FULL,
                1.0,
            )],
        );
        let mut controller =
            PlaybackController::new(VirtualViewport::new(), ControllerConfig::default());
        controller.configure(geometry, Viewport::new(100.0, 100.0));
        controller
    }

    #[tokio::test]
    async fn runs_to_completion_and_reports_once() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let mut controller = short_controller(0.05);
        controller.set_on_complete(move || {
            let _ = sender.send(());
        });
        controller.play(Instant::now());
        let controller = shared(controller);

        let ticker = PlaybackTicker::spawn(controller.clone(), Duration::from_millis(5));
        let completed = tokio::time::timeout(Duration::from_secs(2), receiver.recv()).await;
        assert_eq!(completed.expect("completion before timeout"), Some(()));
        ticker.finished().await;

        let guard = lock_controller(&controller).expect("lock");
        assert_eq!(guard.state(), PlaybackState::Completed);
        assert_eq!(guard.current_offset(), 300.0);
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn exits_when_playback_is_paused() {
        let mut controller = short_controller(30.0);
        controller.play(Instant::now());
        let controller = shared(controller);

        let ticker = PlaybackTicker::spawn(controller.clone(), Duration::from_millis(5));
        assert!(ticker.is_running());
        lock_controller(&controller).expect("lock").pause();

        tokio::time::timeout(Duration::from_secs(2), ticker.finished())
            .await
            .expect("ticker exits after pause");
    }

    #[tokio::test]
    async fn stop_aborts_the_frame_loop() {
        let mut controller = short_controller(30.0);
        controller.play(Instant::now());
        let controller = shared(controller);

        let mut ticker = PlaybackTicker::spawn(controller.clone(), Duration::from_millis(5));
        ticker.stop();
        assert!(!ticker.is_running());
        tokio::time::sleep(Duration::from_millis(30)).await;

        let guard = lock_controller(&controller).expect("lock");
        assert_eq!(guard.state(), PlaybackState::Playing);
    }
}
