//! Domain model for the story playback core.
//!
//! These types are the immutable snapshot a session plays through. The
//! snapshot arrives from the content source (the REST layer in the full
//! product) already ordered: groups in carousel order, stories in
//! chronological creation order.
//!
//! # Mutability Contract
//!
//! For the lifetime of one session the snapshot is read-only except for a
//! single field: [`Story::viewed`], flipped optimistically by the view-report
//! bridge. Position bounds never shift mid-session. [`AuthorStoryGroup`]
//! keeps `has_unseen` as a derived method rather than a stored flag, so it
//! can never fall out of sync with the viewed flags it summarizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(Uuid);

impl StoryId {
    /// Create a new random story ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for StoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for StoryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of one author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(Uuid);

impl AuthorId {
    /// Create a new random author ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value.
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for AuthorId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for AuthorId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of media a story carries.
///
/// The playback core does not decode media; the host UI decides how to
/// render each kind. Both kinds run on the same fixed-duration ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// One time-boxed piece of ephemeral media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    /// Unique, stable identity.
    pub id: StoryId,
    /// Image or video; opaque to the sequencer.
    pub media_kind: MediaKind,
    /// Opaque media locator (URL); never interpreted here.
    pub media_ref: String,
    /// Whether this story has been seen. Mutated only through the
    /// view-report bridge's optimistic update.
    pub viewed: bool,
    /// Creation timestamp, for display only. Ordering within a group is
    /// positional, not timestamp-derived.
    pub created_at: DateTime<Utc>,
}

/// Author identity as shown in the viewer header and carousel ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// One author's ephemeral content bundle: a non-empty, ordered run of
/// stories treated as a single navigable unit.
///
/// A group with zero stories is invalid and must be excluded before the
/// snapshot reaches a session; [`crate::Sequencer::open`] rejects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorStoryGroup {
    pub author: Author,
    pub stories: Vec<Story>,
}

impl AuthorStoryGroup {
    /// True iff any story in this group is still unviewed.
    ///
    /// Derived on demand from the viewed flags, so flipping any
    /// [`Story::viewed`] is immediately reflected here.
    pub fn has_unseen(&self) -> bool {
        self.stories.iter().any(|s| !s.viewed)
    }
}
