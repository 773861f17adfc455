//! The sequencer: a pure state machine over a two-level story collection.
//!
//! The sequencer owns the playback position `(author, story)`, the playback
//! status, and the frozen progress value. It is the decision-making layer:
//! every operation is a synchronous, atomic state transition returning what
//! happened as a [`Transition`], and the owner translates that into clock
//! restarts and view reports.
//!
//! # Key Properties
//!
//! - **State is internal**: operations take `&mut self`
//! - **Pure transitions**: no IO, no async, no timers in here
//! - **One operation → one transition**: the returned [`Transition`] is the
//!   complete description of what the owner must do next
//! - **Loud failures**: bad indices are surfaced, never clamped
//!
//! # Position Rules
//!
//! - Forward past the last story of a group enters the next group at its
//!   *first* story; forward past the last group exhausts the session.
//! - Backward past the first story of a group lands on the previous group's
//!   *last* story, letting a user who steps back across a boundary resume
//!   where that author's narrative ends. This is a fixed contract.
//! - Backward at the global origin replays the current story from the start
//!   instead of closing.

use std::fmt;

use crate::error::SequencerError;
use crate::model::{AuthorId, AuthorStoryGroup, Story, StoryId};

/// A playback position inside the open snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// Index into the group list.
    pub author: usize,
    /// Index into the owning group's story list.
    pub story: usize,
}

impl Position {
    /// The first story of the first author.
    pub const ORIGIN: Self = Self { author: 0, story: 0 };

    /// Create a position from raw indices.
    pub fn new(author: usize, story: usize) -> Self {
        Self { author, story }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.author, self.story)
    }
}

/// Whether the session is running, held, or over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Playback advanced past the last story of the last author.
    Exhausted,
    /// The session was closed explicitly (gesture or UI unmount).
    Closed,
}

impl EndReason {
    fn transition(self) -> Transition {
        match self {
            EndReason::Exhausted => Transition::Exhausted,
            EndReason::Closed => Transition::Closed,
        }
    }
}

/// The outcome of a navigation operation.
///
/// Each variant tells the owner exactly what to do with the clock:
/// `Moved` and `Replayed` mean "restart the ramp from zero", the terminal
/// variants mean "stop the ramp and tear down".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Position changed; progress was reset to zero.
    Moved { from: Position, to: Position },
    /// Position unchanged, progress reset to zero (retreat at the origin).
    Replayed { at: Position },
    /// Content ran out. Terminal and sticky: further operations return this
    /// same transition.
    Exhausted,
    /// The session was closed. Terminal and sticky.
    Closed,
}

/// Horizontal tap-zone mapping for the viewer surface.
///
/// The left third of the surface navigates backward, the right third
/// forward, and the middle third is reserved for future interaction
/// affordances. The thresholds are a design constant, not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavZone {
    Back,
    Neutral,
    Forward,
}

impl NavZone {
    /// Map a horizontal tap coordinate to a navigation zone.
    ///
    /// Degenerate surfaces (zero or negative width, non-finite input) map to
    /// [`NavZone::Neutral`] so a broken layout can never navigate.
    pub fn for_tap(x: f32, width: f32) -> Self {
        if !x.is_finite() || !width.is_finite() || width <= 0.0 {
            return NavZone::Neutral;
        }
        if x < width / 3.0 {
            NavZone::Back
        } else if x > width * 2.0 / 3.0 {
            NavZone::Forward
        } else {
            NavZone::Neutral
        }
    }
}

/// The playback state machine.
///
/// Created with [`Sequencer::open`] over an immutable snapshot of story
/// groups. The snapshot is read-only for the lifetime of the session except
/// for the viewed flags, which flip through
/// [`Sequencer::mark_active_viewed`].
///
/// # Example
///
/// ```ignore
/// let mut seq = Sequencer::open(groups, Position::ORIGIN)?;
///
/// match seq.advance() {
///     Transition::Moved { to, .. } => { /* restart clock, publish frame */ }
///     Transition::Exhausted => { /* tear down the viewer */ }
///     _ => {}
/// }
/// ```
pub struct Sequencer {
    groups: Vec<AuthorStoryGroup>,
    position: Position,
    status: PlaybackStatus,
    /// Frozen progress in `[0, 1]`. Meaningful while `Paused`; while
    /// `Playing` the live value belongs to the clock.
    progress: f32,
    end: Option<EndReason>,
}

impl Sequencer {
    /// Open a session over a snapshot at an explicit initial position.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::EmptyContent`] if `groups` is empty or any group
    ///   has zero stories.
    /// - [`SequencerError::InvalidPosition`] if `initial` is out of bounds.
    pub fn open(
        groups: Vec<AuthorStoryGroup>,
        initial: Position,
    ) -> Result<Self, SequencerError> {
        if groups.is_empty() || groups.iter().any(|g| g.stories.is_empty()) {
            return Err(SequencerError::EmptyContent);
        }
        if initial.author >= groups.len()
            || initial.story >= groups[initial.author].stories.len()
        {
            return Err(SequencerError::InvalidPosition { position: initial });
        }
        Ok(Self {
            groups,
            position: initial,
            status: PlaybackStatus::Playing,
            progress: 0.0,
            end: None,
        })
    }

    /// Current playback position.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Current playback status.
    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    /// Last frozen progress value in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Why the session ended, once it has.
    pub fn end(&self) -> Option<EndReason> {
        self.end
    }

    /// The open snapshot.
    pub fn groups(&self) -> &[AuthorStoryGroup] {
        &self.groups
    }

    /// The story at the current position.
    ///
    /// Bounds hold at all times, including after the terminal transition,
    /// where this is the story that was showing when the session ended.
    pub fn active_story(&self) -> &Story {
        &self.groups[self.position.author].stories[self.position.story]
    }

    fn move_to(&mut self, to: Position) -> Transition {
        let from = self.position;
        self.position = to;
        self.progress = 0.0;
        self.status = PlaybackStatus::Playing;
        Transition::Moved { from, to }
    }

    /// Move to the next story, crossing author boundaries forward.
    ///
    /// Exhausting the last story of the last author returns
    /// [`Transition::Exhausted`] and closes the session. Terminal is sticky:
    /// further calls return the same transition without touching state.
    ///
    /// Navigation on a paused session moves and resumes playing.
    pub fn advance(&mut self) -> Transition {
        if let Some(reason) = self.end {
            return reason.transition();
        }
        let at = self.position;
        if at.story + 1 < self.groups[at.author].stories.len() {
            self.move_to(Position::new(at.author, at.story + 1))
        } else if at.author + 1 < self.groups.len() {
            self.move_to(Position::new(at.author + 1, 0))
        } else {
            self.status = PlaybackStatus::Closed;
            self.end = Some(EndReason::Exhausted);
            Transition::Exhausted
        }
    }

    /// Move to the previous story, crossing author boundaries backward onto
    /// the previous author's *last* story.
    ///
    /// At the global origin this is a replay: position unchanged, progress
    /// reset, never a close.
    pub fn retreat(&mut self) -> Transition {
        if let Some(reason) = self.end {
            return reason.transition();
        }
        let at = self.position;
        if at.story > 0 {
            self.move_to(Position::new(at.author, at.story - 1))
        } else if at.author > 0 {
            let author = at.author - 1;
            let last = self.groups[author].stories.len() - 1;
            self.move_to(Position::new(author, last))
        } else {
            self.progress = 0.0;
            self.status = PlaybackStatus::Playing;
            Transition::Replayed { at }
        }
    }

    /// Freeze playback at the sampled progress value.
    ///
    /// `progress_now` is the clock's current interpolated value; the
    /// sequencer holds it so a later [`Sequencer::resume`] can hand the
    /// remaining fraction back to the clock. Returns `false` (no-op) unless
    /// currently `Playing`.
    pub fn pause(&mut self, progress_now: f32) -> bool {
        if self.status != PlaybackStatus::Playing {
            return false;
        }
        self.status = PlaybackStatus::Paused;
        self.progress = progress_now.clamp(0.0, 1.0);
        true
    }

    /// Resume a paused session.
    ///
    /// Returns the remaining fraction `1 - progress` for the clock to ramp
    /// through, so total display time per story is constant regardless of
    /// how many times it was paused. Returns `None` (no-op) unless currently
    /// `Paused`.
    pub fn resume(&mut self) -> Option<f32> {
        if self.status != PlaybackStatus::Paused {
            return None;
        }
        self.status = PlaybackStatus::Playing;
        Some((1.0 - self.progress).clamp(0.0, 1.0))
    }

    /// Explicit navigation to a story of a specific author.
    ///
    /// Used when the user taps another author's ring in the outer carousel
    /// while the viewer is open.
    ///
    /// # Errors
    ///
    /// - [`SequencerError::UnknownAuthor`] if `author` is not in the open
    ///   snapshot (a stale target is a caller error, never clamped).
    /// - [`SequencerError::InvalidPosition`] if `story` is out of bounds for
    ///   that author.
    pub fn jump_to(
        &mut self,
        author: AuthorId,
        story: usize,
    ) -> Result<Transition, SequencerError> {
        if let Some(reason) = self.end {
            return Ok(reason.transition());
        }
        let author_index = self
            .groups
            .iter()
            .position(|g| g.author.id == author)
            .ok_or(SequencerError::UnknownAuthor { author })?;
        if story >= self.groups[author_index].stories.len() {
            return Err(SequencerError::InvalidPosition {
                position: Position::new(author_index, story),
            });
        }
        Ok(self.move_to(Position::new(author_index, story)))
    }

    /// Close the session unconditionally. Idempotent: a session that already
    /// ended keeps its original end reason.
    pub fn close(&mut self) -> Transition {
        if let Some(reason) = self.end {
            return reason.transition();
        }
        self.status = PlaybackStatus::Closed;
        self.end = Some(EndReason::Closed);
        Transition::Closed
    }

    /// Optimistically mark the active story viewed.
    ///
    /// Returns `Some(id)` only on the first call for a given story, which is
    /// the bridge's at-most-once dispatch guard. A single atomic update to
    /// the one story; the owning group's `has_unseen` is derived, so it
    /// reflects the flip immediately.
    pub fn mark_active_viewed(&mut self) -> Option<StoryId> {
        if self.end.is_some() {
            return None;
        }
        let story =
            &mut self.groups[self.position.author].stories[self.position.story];
        if story.viewed {
            None
        } else {
            story.viewed = true;
            Some(story.id)
        }
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("position", &self.position)
            .field("status", &self.status)
            .field("progress", &self.progress)
            .field("groups", &self.groups.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, MediaKind};
    use chrono::Utc;

    fn story() -> Story {
        Story {
            id: StoryId::new(),
            media_kind: MediaKind::Image,
            media_ref: "https://cdn.example/s.jpg".into(),
            viewed: false,
            created_at: Utc::now(),
        }
    }

    fn group(name: &str, count: usize) -> AuthorStoryGroup {
        AuthorStoryGroup {
            author: Author {
                id: AuthorId::new(),
                display_name: name.into(),
                avatar_url: None,
            },
            stories: (0..count).map(|_| story()).collect(),
        }
    }

    fn open(counts: &[usize]) -> Sequencer {
        let groups = counts
            .iter()
            .enumerate()
            .map(|(i, &n)| group(&format!("author{i}"), n))
            .collect();
        Sequencer::open(groups, Position::ORIGIN).unwrap()
    }

    #[test]
    fn test_open_rejects_empty_groups() {
        assert_eq!(
            Sequencer::open(vec![], Position::ORIGIN).unwrap_err(),
            SequencerError::EmptyContent
        );
    }

    #[test]
    fn test_open_rejects_group_with_no_stories() {
        let groups = vec![group("alice", 1), group("bob", 0)];
        assert_eq!(
            Sequencer::open(groups, Position::ORIGIN).unwrap_err(),
            SequencerError::EmptyContent
        );
    }

    #[test]
    fn test_open_rejects_out_of_bounds_initial_position() {
        let groups = vec![group("alice", 2)];
        let err = Sequencer::open(groups, Position::new(0, 2)).unwrap_err();
        assert_eq!(
            err,
            SequencerError::InvalidPosition {
                position: Position::new(0, 2)
            }
        );
    }

    #[test]
    fn test_advance_within_and_across_groups() {
        // groups = [alice: 2, bob: 1], open at (0,0)
        let mut seq = open(&[2, 1]);

        assert_eq!(
            seq.advance(),
            Transition::Moved {
                from: Position::new(0, 0),
                to: Position::new(0, 1)
            }
        );
        assert_eq!(
            seq.advance(),
            Transition::Moved {
                from: Position::new(0, 1),
                to: Position::new(1, 0)
            }
        );
        assert_eq!(seq.advance(), Transition::Exhausted);
        assert_eq!(seq.status(), PlaybackStatus::Closed);
        assert_eq!(seq.end(), Some(EndReason::Exhausted));
    }

    #[test]
    fn test_exhaustion_after_exactly_total_stories_advances() {
        for counts in [&[1usize, 3][..], &[2, 2, 2][..], &[5][..]] {
            let total: usize = counts.iter().sum();
            let mut seq = open(counts);
            for _ in 0..total - 1 {
                assert!(matches!(seq.advance(), Transition::Moved { .. }));
            }
            assert_eq!(seq.advance(), Transition::Exhausted);
        }
    }

    #[test]
    fn test_terminal_transition_is_sticky() {
        let mut seq = open(&[1]);
        assert_eq!(seq.advance(), Transition::Exhausted);
        // Further operations are no-ops returning the same transition.
        assert_eq!(seq.advance(), Transition::Exhausted);
        assert_eq!(seq.retreat(), Transition::Exhausted);
        assert_eq!(seq.close(), Transition::Exhausted);
        assert_eq!(seq.position(), Position::ORIGIN);
    }

    #[test]
    fn test_retreat_crosses_boundary_to_previous_authors_last_story() {
        let groups = vec![group("alice", 2), group("bob", 1)];
        let mut seq = Sequencer::open(groups, Position::new(1, 0)).unwrap();

        // Not (0,0): alice's *last* story.
        assert_eq!(
            seq.retreat(),
            Transition::Moved {
                from: Position::new(1, 0),
                to: Position::new(0, 1)
            }
        );
    }

    #[test]
    fn test_retreat_at_origin_replays_and_is_idempotent() {
        let mut seq = open(&[2, 1]);
        let _ = seq.pause(0.7);

        for _ in 0..3 {
            assert_eq!(
                seq.retreat(),
                Transition::Replayed {
                    at: Position::ORIGIN
                }
            );
            assert_eq!(seq.position(), Position::ORIGIN);
            assert_eq!(seq.progress(), 0.0);
            assert_eq!(seq.status(), PlaybackStatus::Playing);
        }
    }

    #[test]
    fn test_pause_freezes_sampled_progress() {
        let mut seq = open(&[1]);
        assert!(seq.pause(0.4));
        assert_eq!(seq.status(), PlaybackStatus::Paused);
        assert_eq!(seq.progress(), 0.4);

        // Already paused: no-op, frozen value untouched.
        assert!(!seq.pause(0.9));
        assert_eq!(seq.progress(), 0.4);
    }

    #[test]
    fn test_resume_returns_remaining_fraction() {
        let mut seq = open(&[1]);
        assert!(seq.pause(0.4));
        assert_eq!(seq.resume(), Some(0.6));
        assert_eq!(seq.status(), PlaybackStatus::Playing);

        // Already playing: no-op.
        assert_eq!(seq.resume(), None);
    }

    #[test]
    fn test_zero_length_pause_loses_no_time() {
        let mut seq = open(&[1]);
        assert!(seq.pause(0.0));
        assert_eq!(seq.resume(), Some(1.0));
    }

    #[test]
    fn test_pause_out_of_range_sample_is_clamped() {
        let mut seq = open(&[1]);
        assert!(seq.pause(1.3));
        assert_eq!(seq.progress(), 1.0);
        assert_eq!(seq.resume(), Some(0.0));
    }

    #[test]
    fn test_navigation_while_paused_resumes_playing() {
        let mut seq = open(&[2]);
        assert!(seq.pause(0.5));
        assert!(matches!(seq.advance(), Transition::Moved { .. }));
        assert_eq!(seq.status(), PlaybackStatus::Playing);
        assert_eq!(seq.progress(), 0.0);
    }

    #[test]
    fn test_jump_to_round_trip() {
        let groups = vec![group("alice", 2), group("bob", 3)];
        let bob = groups[1].author.id;
        let mut seq = Sequencer::open(groups, Position::ORIGIN).unwrap();

        let t = seq.jump_to(bob, 0).unwrap();
        assert_eq!(
            t,
            Transition::Moved {
                from: Position::ORIGIN,
                to: Position::new(1, 0)
            }
        );
        assert_eq!(seq.position(), Position::new(1, 0));
    }

    #[test]
    fn test_jump_to_unknown_author_fails_loudly() {
        let mut seq = open(&[1]);
        let stale = AuthorId::new();
        assert_eq!(
            seq.jump_to(stale, 0).unwrap_err(),
            SequencerError::UnknownAuthor { author: stale }
        );
        // Position untouched, no silent clamping.
        assert_eq!(seq.position(), Position::ORIGIN);
    }

    #[test]
    fn test_jump_to_story_out_of_bounds_fails_loudly() {
        let groups = vec![group("alice", 2)];
        let alice = groups[0].author.id;
        let mut seq = Sequencer::open(groups, Position::ORIGIN).unwrap();
        assert_eq!(
            seq.jump_to(alice, 2).unwrap_err(),
            SequencerError::InvalidPosition {
                position: Position::new(0, 2)
            }
        );
        assert_eq!(seq.position(), Position::ORIGIN);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut seq = open(&[2]);
        assert_eq!(seq.close(), Transition::Closed);
        assert_eq!(seq.close(), Transition::Closed);
        assert_eq!(seq.status(), PlaybackStatus::Closed);
        assert_eq!(seq.end(), Some(EndReason::Closed));
    }

    #[test]
    fn test_mark_active_viewed_flips_at_most_once() {
        let mut seq = open(&[1]);
        assert!(seq.groups()[0].has_unseen());

        let id = seq.mark_active_viewed();
        assert_eq!(id, Some(seq.active_story().id));
        assert!(!seq.groups()[0].has_unseen());

        // Revisit: already viewed, no second dispatch.
        assert_eq!(seq.mark_active_viewed(), None);
    }

    #[test]
    fn test_tap_zone_thirds() {
        let w = 300.0;
        assert_eq!(NavZone::for_tap(0.0, w), NavZone::Back);
        assert_eq!(NavZone::for_tap(99.0, w), NavZone::Back);
        assert_eq!(NavZone::for_tap(100.0, w), NavZone::Neutral);
        assert_eq!(NavZone::for_tap(150.0, w), NavZone::Neutral);
        assert_eq!(NavZone::for_tap(200.0, w), NavZone::Neutral);
        assert_eq!(NavZone::for_tap(201.0, w), NavZone::Forward);
        assert_eq!(NavZone::for_tap(w, w), NavZone::Forward);
    }

    #[test]
    fn test_tap_zone_degenerate_surface_never_navigates() {
        assert_eq!(NavZone::for_tap(10.0, 0.0), NavZone::Neutral);
        assert_eq!(NavZone::for_tap(10.0, -5.0), NavZone::Neutral);
        assert_eq!(NavZone::for_tap(f32::NAN, 300.0), NavZone::Neutral);
    }
}
