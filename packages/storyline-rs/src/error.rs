//! Structured error types for the playback core.
//!
//! # The Error Boundary Rule
//!
//! > **Sink failures never cross back into the state machine.**
//!
//! Errors here split into two classes with opposite propagation policies:
//!
//! - **State-machine-integrity errors** ([`SequencerError`]) are programmer
//!   or data errors: bad initial indices, a stale `jump_to` target, an empty
//!   snapshot. They fail loudly and synchronously at the call site. They are
//!   never silently clamped; clamping would desynchronize the progress
//!   indicator from the author-ring UI.
//! - **Side-effect errors** (a view-report sink returning `Err`) are
//!   isolated at the bridge: logged, swallowed, optimistic state retained.
//!   The user-visible failure mode is "no durable record of the view",
//!   never a playback glitch. `anyhow` is the transport for those; no
//!   `anyhow::Error` ever reaches a caller of the sequencer.

use thiserror::Error;

use crate::model::AuthorId;
use crate::sequencer::Position;

/// Errors surfaced synchronously by sequencer operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// `open` was called with zero groups, or a group with zero stories.
    /// The session never starts.
    #[error("cannot open a session over empty content")]
    EmptyContent,

    /// A supplied position is outside the bounds of the open snapshot.
    #[error("position {position} is out of bounds for the open snapshot")]
    InvalidPosition { position: Position },

    /// A `jump_to` target author is not present in the open snapshot.
    ///
    /// Same loud-failure class as [`SequencerError::InvalidPosition`]; kept
    /// as its own variant so callers can distinguish a stale carousel ring
    /// from a plain index bug.
    #[error("author {author} is not present in the open snapshot")]
    UnknownAuthor { author: AuthorId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = SequencerError::InvalidPosition {
            position: Position::new(2, 5),
        };
        assert!(err.to_string().contains("(2, 5)"));

        let author = AuthorId::new();
        let err = SequencerError::UnknownAuthor { author };
        assert!(err.to_string().contains(&author.to_string()));
    }
}
