//! Story sessions: one open viewer, from `open` to `Closed`.
//!
//! A session ties the three core pieces together on a single cooperative
//! timeline: the [`Sequencer`] decides, the [`ProgressClock`] drives, and
//! the [`ViewReportBridge`] rides the side channel. The session run loop is
//! the only place transitions happen: gesture inputs and clock expiries are
//! processed one at a time, with gestures observed first when both are
//! queued. That serialization is what makes the pause/expiry race
//! deterministic: a pause that lands before its story's expiry is observed
//! stops the ramp, and the expiry is discarded as stale.
//!
//! ```text
//! Host UI gestures ──► SessionHandle ──► input channel ─┐
//!                                                       ▼
//!                                         StorySession::run loop
//!                                            │        ▲
//!                                 restart /  │        │ expiry channel
//!                                 stop ramp  ▼        │
//!                                        ProgressClock┘
//!                                            │
//!              watch::channel ◄── ViewerFrame│per state change
//!                                            │
//!                         ViewReportBridge ──► sink (fire-and-forget)
//! ```
//!
//! There is no process-wide "currently open viewer" singleton: a session is
//! an explicitly constructed object with its own identity, and everything it
//! owns dies with it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::bridge::{ViewReportBridge, ViewReportSink};
use crate::clock::{ClockExpired, ProgressClock, TokioClock, DEFAULT_STORY_DURATION};
use crate::error::SequencerError;
use crate::model::{AuthorId, AuthorStoryGroup, Story};
use crate::sequencer::{
    EndReason, NavZone, PlaybackStatus, Position, Sequencer, Transition,
};

/// Identity of one open viewer session.
///
/// Clock expiries are tagged with it so a late event from a dead session can
/// never advance a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the session publishes for the host UI to paint: the active story,
/// how far its indicator has advanced, and whether playback is running.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerFrame {
    pub position: Position,
    pub story: Story,
    /// Progress at publish time. For a smooth bar the host animates from
    /// here at the story-duration rate while `status` is `Playing`.
    pub progress: f32,
    pub status: PlaybackStatus,
    /// Set on the final frame; lets the host tear the viewer down and
    /// distinguish ran-out-of-content from an explicit close.
    pub ended: Option<EndReason>,
}

enum PlayerInput {
    Tap {
        x: f32,
        width: f32,
    },
    LongPressStart,
    LongPressEnd,
    JumpTo {
        author: AuthorId,
        story: usize,
        reply: oneshot::Sender<Result<(), SequencerError>>,
    },
    Close,
}

/// Builder wiring a session's snapshot, sink, clock, and timing together.
///
/// # Example
///
/// ```ignore
/// let (session, handle) = SessionBuilder::new(groups, Position::ORIGIN)
///     .with_sink(rest_sink)
///     .open()?;
/// tokio::spawn(session.run());
///
/// handle.tap(280.0, 300.0); // right third: advance
/// ```
pub struct SessionBuilder {
    groups: Vec<AuthorStoryGroup>,
    initial: Position,
    duration: Duration,
    sink: Option<Arc<dyn ViewReportSink>>,
    clock: Option<Box<dyn ProgressClock>>,
    session_id: SessionId,
    expiry_tx: mpsc::UnboundedSender<ClockExpired>,
    expiry_rx: mpsc::UnboundedReceiver<ClockExpired>,
}

impl SessionBuilder {
    /// Start building a session over `groups`, opening at `initial`.
    pub fn new(groups: Vec<AuthorStoryGroup>, initial: Position) -> Self {
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        Self {
            groups,
            initial,
            duration: DEFAULT_STORY_DURATION,
            sink: None,
            clock: None,
            session_id: SessionId::new(),
            expiry_tx,
            expiry_rx,
        }
    }

    /// The ID this session will carry. Needed before `open` when wiring a
    /// custom clock, whose expiries must be tagged with it.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The channel a custom clock must send its expiries into.
    pub fn expiry_sender(&self) -> mpsc::UnboundedSender<ClockExpired> {
        self.expiry_tx.clone()
    }

    /// Override the per-story display duration.
    pub fn with_story_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Attach the view-report sink. Without one, view dispatches are the
    /// local optimistic flip only.
    pub fn with_sink(mut self, sink: Arc<dyn ViewReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the wall-clock [`TokioClock`] with a custom clock (tests use
    /// a manual one).
    pub fn with_clock(mut self, clock: Box<dyn ProgressClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the snapshot and initial position, and wire the session.
    ///
    /// # Errors
    ///
    /// Propagates [`Sequencer::open`] failures: `EmptyContent` or
    /// `InvalidPosition`. The session never starts in either case.
    pub fn open(self) -> Result<(StorySession, SessionHandle), SequencerError> {
        let sequencer = Sequencer::open(self.groups, self.initial)?;
        let clock = self.clock.unwrap_or_else(|| {
            Box::new(TokioClock::new(
                self.session_id,
                self.duration,
                self.expiry_tx.clone(),
            ))
        });
        let bridge = ViewReportBridge::new(self.session_id, self.sink);

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let initial_frame = ViewerFrame {
            position: sequencer.position(),
            story: sequencer.active_story().clone(),
            progress: 0.0,
            status: sequencer.status(),
            ended: None,
        };
        let (frame_tx, frame_rx) = watch::channel(initial_frame);

        let session = StorySession {
            id: self.session_id,
            sequencer,
            clock,
            bridge,
            inputs: input_rx,
            expiries: self.expiry_rx,
            frames: frame_tx,
        };
        let handle = SessionHandle {
            session: self.session_id,
            inputs: input_tx,
            frames: frame_rx,
        };
        Ok((session, handle))
    }
}

/// The host UI's side of a running session.
///
/// Cheap to clone. Dropping every handle closes the session (the owning UI
/// unmounted).
#[derive(Clone)]
pub struct SessionHandle {
    session: SessionId,
    inputs: mpsc::UnboundedSender<PlayerInput>,
    frames: watch::Receiver<ViewerFrame>,
}

impl SessionHandle {
    /// The session this handle drives.
    pub fn id(&self) -> SessionId {
        self.session
    }

    /// Subscribe to published frames.
    pub fn frames(&self) -> watch::Receiver<ViewerFrame> {
        self.frames.clone()
    }

    /// The most recently published frame.
    pub fn frame(&self) -> ViewerFrame {
        self.frames.borrow().clone()
    }

    /// Forward a raw tap at horizontal position `x` on a surface of `width`.
    /// Zone mapping (left third back, right third forward) happens inside
    /// the core, not in the host UI.
    pub fn tap(&self, x: f32, width: f32) {
        let _ = self.inputs.send(PlayerInput::Tap { x, width });
    }

    /// Forward a long-press start (pause).
    pub fn long_press_start(&self) {
        let _ = self.inputs.send(PlayerInput::LongPressStart);
    }

    /// Forward a long-press end (resume).
    pub fn long_press_end(&self) {
        let _ = self.inputs.send(PlayerInput::LongPressEnd);
    }

    /// Navigate to a story of a specific author (carousel ring tap).
    ///
    /// Resolves on the session timeline and reports validation failures back
    /// to the caller; a bad target is never silently clamped. A jump sent
    /// to a session that has already ended is inert and returns `Ok`.
    pub async fn jump_to(
        &self,
        author: AuthorId,
        story: usize,
    ) -> Result<(), SequencerError> {
        let (reply, response) = oneshot::channel();
        if self
            .inputs
            .send(PlayerInput::JumpTo { author, story, reply })
            .is_err()
        {
            return Ok(());
        }
        response.await.unwrap_or(Ok(()))
    }

    /// Close the session explicitly.
    pub fn close(&self) {
        let _ = self.inputs.send(PlayerInput::Close);
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// One open viewer, from `open` to `Closed`.
///
/// Consume it with [`StorySession::run`], typically spawned:
///
/// ```ignore
/// tokio::spawn(session.run());
/// ```
pub struct StorySession {
    id: SessionId,
    sequencer: Sequencer,
    clock: Box<dyn ProgressClock>,
    bridge: ViewReportBridge,
    inputs: mpsc::UnboundedReceiver<PlayerInput>,
    expiries: mpsc::UnboundedReceiver<ClockExpired>,
    frames: watch::Sender<ViewerFrame>,
}

impl StorySession {
    /// This session's identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Run the session until it closes.
    ///
    /// Processes gesture inputs and clock expiries one at a time, gestures
    /// first. Returns after publishing the final frame; any sleeper task
    /// still pending simply delivers into a dropped channel.
    pub async fn run(mut self) {
        info!(
            session = %self.id,
            position = %self.sequencer.position(),
            groups = self.sequencer.groups().len(),
            "story session opened"
        );

        // The story visible at open counts as shown.
        self.report_active();
        self.clock.start();
        self.publish();

        loop {
            // Biased: when a gesture and an expiry are both queued, the
            // gesture is observed first, so a pause racing an in-flight
            // expiry deterministically suppresses it.
            tokio::select! {
                biased;
                input = self.inputs.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => {
                        // Owning UI unmounted: every handle is gone.
                        debug!(session = %self.id, "all handles dropped");
                        let _ = self.sequencer.close();
                    }
                },
                Some(expired) = self.expiries.recv() => self.handle_expiry(expired),
            }

            if self.sequencer.status() == PlaybackStatus::Closed {
                self.clock.stop();
                self.publish();
                break;
            }
        }

        info!(
            session = %self.id,
            reason = ?self.sequencer.end(),
            "story session ended"
        );
    }

    fn handle_input(&mut self, input: PlayerInput) {
        match input {
            PlayerInput::Tap { x, width } => match NavZone::for_tap(x, width) {
                NavZone::Back => {
                    let transition = self.sequencer.retreat();
                    self.apply(transition);
                }
                NavZone::Forward => {
                    let transition = self.sequencer.advance();
                    self.apply(transition);
                }
                // Middle third: reserved for future interaction affordances.
                NavZone::Neutral => {}
            },
            PlayerInput::LongPressStart => {
                let sampled = self.clock.progress();
                if self.sequencer.pause(sampled) {
                    self.clock.stop();
                    debug!(session = %self.id, progress = sampled, "paused");
                    self.publish();
                }
            }
            PlayerInput::LongPressEnd => {
                if let Some(remaining) = self.sequencer.resume() {
                    self.clock.start_remaining(remaining);
                    debug!(session = %self.id, remaining, "resumed");
                    self.publish();
                }
            }
            PlayerInput::JumpTo { author, story, reply } => {
                match self.sequencer.jump_to(author, story) {
                    Ok(transition) => {
                        let _ = reply.send(Ok(()));
                        self.apply(transition);
                    }
                    Err(error) => {
                        warn!(session = %self.id, %error, "rejected jump");
                        let _ = reply.send(Err(error));
                    }
                }
            }
            PlayerInput::Close => {
                let _ = self.sequencer.close();
            }
        }
    }

    fn handle_expiry(&mut self, expired: ClockExpired) {
        if !self.clock.accepts(&expired) {
            trace!(
                session = %self.id,
                generation = expired.generation,
                "discarding stale clock expiry"
            );
            return;
        }
        let transition = self.sequencer.advance();
        self.apply(transition);
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Moved { from, to } => {
                debug!(session = %self.id, %from, %to, "moved");
                self.clock.start();
                self.report_active();
                self.publish();
            }
            Transition::Replayed { at } => {
                debug!(session = %self.id, %at, "replaying current story");
                self.clock.start();
                self.publish();
            }
            // Terminal: run() stops the clock and publishes the final frame.
            Transition::Exhausted | Transition::Closed => {}
        }
    }

    fn report_active(&mut self) {
        if let Some(story) = self.sequencer.mark_active_viewed() {
            self.bridge.dispatch(story);
        }
    }

    fn publish(&self) {
        self.frames.send_replace(ViewerFrame {
            position: self.sequencer.position(),
            story: self.sequencer.active_story().clone(),
            progress: self.clock.progress(),
            status: self.sequencer.status(),
            ended: self.sequencer.end(),
        });
    }
}

impl fmt::Debug for StorySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorySession")
            .field("id", &self.id)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}
