//! # Storyline
//!
//! A deterministic playback core for ephemeral stories, where the sequencer
//! decides, the clock drives, and view reports ride a side channel.
//!
//! ## Core Concepts
//!
//! Storyline separates **deciding** from **timing** from **reporting**:
//! - [`Sequencer`] = the pure state machine over `(author, story)` position
//! - [`ProgressClock`] = a single-shot, cancelable 0→1 ramp per story
//! - [`ViewReportBridge`] = fire-and-forget "mark viewed" dispatch
//!
//! The key principle: **the sequencer is the sole authority on position**.
//! Clock expiries and user gestures are the only two inputs; everything else
//! observes.
//!
//! ## Architecture
//!
//! ```text
//! Host UI (gestures)          ProgressClock (expiry)
//!     │                            │
//!     ▼                            ▼
//!     SessionHandle ──────► StorySession::run
//!                                │
//!                    ┌───────────┼──────────────┐
//!                    ▼           ▼              ▼
//!               Sequencer    restart ramp   ViewReportBridge
//!               (decide)     (clock)        (spawn, never await)
//!                    │
//!                    ▼
//!               ViewerFrame ──► watch channel ──► Host UI (paint)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Exactly one active story** at every non-closed instant, indices in
//!    bounds
//! 2. **Transitions are serialized** - one run loop, one event at a time
//! 3. **No overlapping ramps** - restarts supersede; stale expiries are
//!    discarded by `(session, generation)` tag
//! 4. **Progress is honored across pauses** - resume ramps through the
//!    remaining fraction, so total display time per story is constant
//! 5. **View reports never touch the timing path** - spawned, logged,
//!    swallowed
//! 6. **Loud failures at the edges** - bad positions error, never clamp
//!
//! ## Example
//!
//! ```ignore
//! use storyline::{Position, SessionBuilder};
//!
//! let (session, handle) = SessionBuilder::new(groups, Position::ORIGIN)
//!     .with_sink(rest_sink)
//!     .open()?;
//! tokio::spawn(session.run());
//!
//! // Host UI forwards raw gestures; zone mapping lives in the core.
//! handle.tap(280.0, 300.0);     // right third: next story
//! handle.long_press_start();    // pause
//! handle.long_press_end();      // resume, remaining time honored
//!
//! let mut frames = handle.frames();
//! while frames.changed().await.is_ok() {
//!     render(&*frames.borrow());
//! }
//! ```
//!
//! ## What This Is Not
//!
//! Storyline is **not**:
//! - A media decoder or render surface (the host paints)
//! - A content fetcher (snapshots arrive from the REST layer)
//! - A persistence layer (sessions do not survive their viewer)
//!
//! Storyline **is**:
//! > The state machine and timing contract that decides, at every instant,
//! > which story is showing, how far its indicator has advanced, and what
//! > happens next.

mod bridge;
mod clock;
mod error;
mod model;
mod sequencer;
mod session;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;


// Re-export model types
pub use crate::model::{Author, AuthorId, AuthorStoryGroup, MediaKind, Story, StoryId};

// Re-export error types
pub use crate::error::SequencerError;

// Re-export sequencer types
pub use crate::sequencer::{
    EndReason, NavZone, PlaybackStatus, Position, Sequencer, Transition,
};

// Re-export clock types
pub use crate::clock::{ClockExpired, ProgressClock, TokioClock, DEFAULT_STORY_DURATION};

// Re-export bridge types
pub use crate::bridge::{ViewReportBridge, ViewReportSink};

// Re-export session types (primary entry point)
pub use crate::session::{
    SessionBuilder, SessionHandle, SessionId, StorySession, ViewerFrame,
};

// Re-export commonly used external types
pub use async_trait::async_trait;
