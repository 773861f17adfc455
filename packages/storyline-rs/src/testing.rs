//! Testing utilities for the playback core.
//!
//! This module is available with the `testing` feature (and inside the
//! crate's own tests):
//!
//! ```toml
//! [dev-dependencies]
//! storyline = { version = "0.1", features = ["testing"] }
//! ```
//!
//! The centerpiece is [`ManualClock`]: a [`ProgressClock`] whose progress is
//! set and whose expiries are fired by the test, so session behavior is
//! exercised without wall-clock waits.
//!
//! ```ignore
//! let builder = SessionBuilder::new(groups, Position::ORIGIN);
//! let (clock, timer) = ManualClock::pair(builder.session_id(), builder.expiry_sender());
//! let (session, handle) = builder.with_clock(Box::new(clock)).open()?;
//! tokio::spawn(session.run());
//!
//! timer.fire(); // the story's time is up: session advances
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Notify};

use crate::bridge::ViewReportSink;
use crate::clock::{ClockExpired, ProgressClock};
use crate::model::{Author, AuthorId, AuthorStoryGroup, MediaKind, Story, StoryId};
use crate::session::SessionId;

/// A ramp command observed by a [`ManualClock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClockCommand {
    Started,
    StartedRemaining(f32),
    Stopped,
}

#[derive(Debug)]
struct ManualClockState {
    generation: u64,
    running: bool,
    progress: f32,
    commands: Vec<ClockCommand>,
}

/// A [`ProgressClock`] driven entirely by the test.
///
/// `start`/`start_remaining`/`stop` are recorded as [`ClockCommand`]s;
/// nothing expires until the paired [`ManualTimer`] fires.
pub struct ManualClock {
    session: SessionId,
    state: Arc<Mutex<ManualClockState>>,
}

/// The test's side of a [`ManualClock`]: fires expiries, sets progress,
/// and inspects the recorded ramp commands.
pub struct ManualTimer {
    session: SessionId,
    expiry_tx: mpsc::UnboundedSender<ClockExpired>,
    state: Arc<Mutex<ManualClockState>>,
}

impl ManualClock {
    /// Create a clock/timer pair for `session`, with expiries delivered
    /// into `expiry_tx` (a session builder's
    /// [`crate::SessionBuilder::expiry_sender`]).
    pub fn pair(
        session: SessionId,
        expiry_tx: mpsc::UnboundedSender<ClockExpired>,
    ) -> (Self, ManualTimer) {
        let state = Arc::new(Mutex::new(ManualClockState {
            generation: 0,
            running: false,
            progress: 0.0,
            commands: Vec::new(),
        }));
        (
            Self {
                session,
                state: state.clone(),
            },
            ManualTimer {
                session,
                expiry_tx,
                state,
            },
        )
    }
}

impl ProgressClock for ManualClock {
    fn start(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.running = true;
        state.progress = 0.0;
        state.commands.push(ClockCommand::Started);
    }

    fn start_remaining(&mut self, fraction: f32) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.running = true;
        state.progress = 1.0 - fraction.clamp(0.0, 1.0);
        state.commands.push(ClockCommand::StartedRemaining(fraction));
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.running = false;
        state.commands.push(ClockCommand::Stopped);
    }

    fn progress(&self) -> f32 {
        self.state.lock().unwrap().progress
    }

    fn accepts(&self, expired: &ClockExpired) -> bool {
        let state = self.state.lock().unwrap();
        state.running
            && expired.session == self.session
            && expired.generation == state.generation
    }
}

impl ManualTimer {
    /// Deliver the current ramp's expiry, as if its time ran out.
    pub fn fire(&self) {
        let generation = self.state.lock().unwrap().generation;
        let _ = self.expiry_tx.send(ClockExpired {
            session: self.session,
            generation,
        });
    }

    /// Deliver an expiry for a superseded ramp; the session must discard it.
    pub fn fire_stale(&self) {
        let generation = self.state.lock().unwrap().generation;
        let _ = self.expiry_tx.send(ClockExpired {
            session: self.session,
            generation: generation.wrapping_sub(1),
        });
    }

    /// Set the interpolated progress the clock will report next.
    pub fn set_progress(&self, progress: f32) {
        self.state.lock().unwrap().progress = progress;
    }

    /// All ramp commands the clock has received so far.
    pub fn commands(&self) -> Vec<ClockCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    /// The most recent ramp command, if any.
    pub fn last_command(&self) -> Option<ClockCommand> {
        self.state.lock().unwrap().commands.last().copied()
    }
}

/// A [`ViewReportSink`] that records dispatches and can be told to fail.
#[derive(Default)]
pub struct RecordingSink {
    attempts: AtomicUsize,
    failing: AtomicBool,
    reports: Mutex<Vec<StoryId>>,
    notify: Notify,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// When failing, `report_viewed` returns `Err` (after recording the
    /// attempt).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Stories successfully reported, in dispatch order.
    pub fn reports(&self) -> Vec<StoryId> {
        self.reports.lock().unwrap().clone()
    }

    /// Total dispatches observed, successes and failures.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` dispatches have been observed.
    pub async fn wait_for(&self, n: usize) {
        loop {
            let notified = self.notify.notified();
            if self.attempts() >= n {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl ViewReportSink for RecordingSink {
    async fn report_viewed(&self, story: StoryId) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing.load(Ordering::SeqCst);
        if !failing {
            self.reports.lock().unwrap().push(story);
        }
        self.notify.notify_waiters();
        if failing {
            bail!("view-report backend unavailable");
        }
        Ok(())
    }
}

/// Build an unviewed image story.
pub fn story_fixture() -> Story {
    Story {
        id: StoryId::new(),
        media_kind: MediaKind::Image,
        media_ref: "https://cdn.example/story.jpg".into(),
        viewed: false,
        created_at: Utc::now(),
    }
}

/// Build a group of `stories` unviewed stories for a named author.
pub fn group_fixture(name: &str, stories: usize) -> AuthorStoryGroup {
    AuthorStoryGroup {
        author: Author {
            id: AuthorId::new(),
            display_name: name.into(),
            avatar_url: None,
        },
        stories: (0..stories).map(|_| story_fixture()).collect(),
    }
}

/// Build a snapshot with one group per entry of `counts`.
pub fn snapshot_fixture(counts: &[usize]) -> Vec<AuthorStoryGroup> {
    counts
        .iter()
        .enumerate()
        .map(|(i, &n)| group_fixture(&format!("author{i}"), n))
        .collect()
}
