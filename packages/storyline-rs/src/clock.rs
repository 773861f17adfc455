//! The progress clock: a single-shot, cancelable ramp from 0 to 1.
//!
//! The clock drives two things for the story on screen: the continuously
//! interpolated progress value the indicator paints, and the single
//! `expired` event that the session translates into an automatic advance.
//!
//! # Contract
//!
//! - `start` begins a full-duration ramp from zero; `start_remaining` begins
//!   a ramp that completes in `fraction * duration`, honoring progress
//!   already consumed before a pause.
//! - `stop` halts the ramp and retains the last interpolated value so a
//!   pause can freeze it.
//! - At most one expiry is *accepted* per ramp. Restarting implicitly stops
//!   the prior ramp: every restart bumps a generation counter, and the owner
//!   discards expiries whose `(session, generation)` tag is stale. That one
//!   rule resolves both the pause/expiry race and late expiries after close.
//!
//! This is a wall-clock timer, not a frame counter; it needs to be smooth
//! enough for a progress bar and exact enough for one well-timed completion,
//! nothing more.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::session::SessionId;

/// How long one story stays on screen. Fixed per design.
pub const DEFAULT_STORY_DURATION: Duration = Duration::from_millis(5000);

/// A completion event from a clock ramp.
///
/// Tagged with the owning session and the ramp generation so the session
/// loop can discard events from ramps that were stopped or superseded
/// before the event was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockExpired {
    pub session: SessionId,
    pub generation: u64,
}

/// The injectable timing seam of the playback core.
///
/// Production sessions use [`TokioClock`]; tests drive a manual clock with
/// hand-fired expiries instead of wall-clock waits.
pub trait ProgressClock: Send {
    /// Begin (or restart) a full-duration ramp from zero.
    fn start(&mut self);

    /// Begin a ramp that completes in `fraction` of the full duration,
    /// with progress starting at `1 - fraction`.
    fn start_remaining(&mut self, fraction: f32);

    /// Halt the ramp, retaining the last interpolated progress value.
    fn stop(&mut self);

    /// The current progress in `[0, 1]`: interpolated while running,
    /// frozen at the last value otherwise.
    fn progress(&self) -> f32;

    /// Whether an expiry belongs to the ramp that is currently running.
    /// Stale expiries must be discarded by the owner.
    fn accepts(&self, expired: &ClockExpired) -> bool;
}

enum Ramp {
    Idle { progress: f32 },
    Running { started: Instant, span: Duration, base: f32 },
}

/// Wall-clock [`ProgressClock`] backed by a spawned `tokio::time::sleep`.
///
/// Each ramp spawns one sleeper task that sends a generation-tagged
/// [`ClockExpired`] into the session's expiry channel. Superseded sleepers
/// are not awaited or aborted; their events simply fail the
/// [`ProgressClock::accepts`] check.
pub struct TokioClock {
    session: SessionId,
    duration: Duration,
    expiry_tx: mpsc::UnboundedSender<ClockExpired>,
    generation: u64,
    ramp: Ramp,
}

impl TokioClock {
    /// Create a clock for `session` sending expiries into `expiry_tx`.
    pub fn new(
        session: SessionId,
        duration: Duration,
        expiry_tx: mpsc::UnboundedSender<ClockExpired>,
    ) -> Self {
        Self {
            session,
            duration,
            expiry_tx,
            generation: 0,
            ramp: Ramp::Idle { progress: 0.0 },
        }
    }

    fn begin(&mut self, span: Duration, base: f32) {
        self.generation += 1;
        self.ramp = Ramp::Running {
            started: Instant::now(),
            span,
            base,
        };
        let tx = self.expiry_tx.clone();
        let expired = ClockExpired {
            session: self.session,
            generation: self.generation,
        };
        tokio::spawn(async move {
            tokio::time::sleep(span).await;
            // A closed channel means the session is already torn down.
            let _ = tx.send(expired);
        });
    }
}

impl ProgressClock for TokioClock {
    fn start(&mut self) {
        self.begin(self.duration, 0.0);
    }

    fn start_remaining(&mut self, fraction: f32) {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.begin(self.duration.mul_f32(fraction), 1.0 - fraction);
    }

    fn stop(&mut self) {
        let progress = self.progress();
        // Bump the generation so an in-flight sleeper's event is stale.
        self.generation += 1;
        self.ramp = Ramp::Idle { progress };
    }

    fn progress(&self) -> f32 {
        match &self.ramp {
            Ramp::Idle { progress } => *progress,
            Ramp::Running { started, span, base } => {
                if span.is_zero() {
                    return 1.0;
                }
                let elapsed = started.elapsed().as_secs_f32() / span.as_secs_f32();
                (base + elapsed * (1.0 - base)).clamp(0.0, 1.0)
            }
        }
    }

    fn accepts(&self, expired: &ClockExpired) -> bool {
        matches!(self.ramp, Ramp::Running { .. })
            && expired.session == self.session
            && expired.generation == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_pair(
        duration: Duration,
    ) -> (TokioClock, mpsc::UnboundedReceiver<ClockExpired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TokioClock::new(SessionId::new(), duration, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_fires_exactly_once_at_duration() {
        let (mut clock, mut rx) = clock_pair(Duration::from_millis(5000));
        let t0 = Instant::now();
        clock.start();

        let expired = rx.recv().await.unwrap();
        assert_eq!(t0.elapsed(), Duration::from_millis(5000));
        assert!(clock.accepts(&expired));

        // No second expiry for the same ramp.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_ramp_fires_at_fraction_of_duration() {
        // Paused at progress 0.4, resumed: expiry at 0.6 * D, not D.
        let (mut clock, mut rx) = clock_pair(Duration::from_millis(5000));
        let t0 = Instant::now();
        clock.start_remaining(0.6);

        let expired = rx.recv().await.unwrap();
        assert_eq!(t0.elapsed(), Duration::from_millis(3000));
        assert!(clock.accepts(&expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_interpolates_from_base() {
        let (mut clock, _rx) = clock_pair(Duration::from_millis(5000));
        clock.start();
        assert!(clock.progress() < 0.01);

        tokio::time::advance(Duration::from_millis(2500)).await;
        assert!((clock.progress() - 0.5).abs() < 0.01);

        let (mut clock, _rx) = clock_pair(Duration::from_millis(5000));
        clock.start_remaining(0.5);
        assert!((clock.progress() - 0.5).abs() < 0.01);
        tokio::time::advance(Duration::from_millis(1250)).await;
        assert!((clock.progress() - 0.75).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_freezes_progress_and_stales_pending_expiry() {
        let (mut clock, mut rx) = clock_pair(Duration::from_millis(5000));
        clock.start();
        tokio::time::advance(Duration::from_millis(2000)).await;
        clock.stop();

        assert!((clock.progress() - 0.4).abs() < 0.01);
        // Progress stays frozen while stopped.
        tokio::time::advance(Duration::from_millis(3000)).await;
        assert!((clock.progress() - 0.4).abs() < 0.01);

        // The sleeper still delivers, but the event no longer belongs to a
        // running ramp.
        let expired = rx.recv().await.unwrap();
        assert!(!clock.accepts(&expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_prior_ramp() {
        let (mut clock, mut rx) = clock_pair(Duration::from_millis(5000));
        clock.start();
        tokio::time::advance(Duration::from_millis(2000)).await;
        clock.start();

        // First the stale expiry from the superseded ramp, then the real one.
        let first = rx.recv().await.unwrap();
        assert!(!clock.accepts(&first));
        let second = rx.recv().await.unwrap();
        assert!(clock.accepts(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_remaining_fraction_expires_immediately() {
        let (mut clock, mut rx) = clock_pair(Duration::from_millis(5000));
        let t0 = Instant::now();
        clock.start_remaining(0.0);
        assert_eq!(clock.progress(), 1.0);

        let expired = rx.recv().await.unwrap();
        assert_eq!(t0.elapsed(), Duration::ZERO);
        assert!(clock.accepts(&expired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_from_another_session_is_rejected() {
        let (mut clock, _rx) = clock_pair(Duration::from_millis(5000));
        clock.start();
        let foreign = ClockExpired {
            session: SessionId::new(),
            generation: 1,
        };
        assert!(!clock.accepts(&foreign));
    }
}
