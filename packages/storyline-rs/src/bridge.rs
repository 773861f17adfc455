//! The view-report bridge: fire-and-forget "mark viewed" dispatch.
//!
//! When the active story changes to one not yet viewed, the session flips
//! the flag optimistically and hands the story ID to the bridge. The bridge
//! spawns the sink call and moves on: its latency or failure never delays an
//! advance, pauses the clock, or blocks rendering.
//!
//! Failures are logged at `warn!` and swallowed. The optimistic flip is
//! never rolled back; the user-visible failure mode is "no durable record
//! of the view", not a playback glitch.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{trace, warn};

use crate::model::StoryId;
use crate::session::SessionId;

/// The external collaborator that persists views server-side.
///
/// Implementations typically wrap the REST client. From the playback core's
/// perspective the call is fire-and-forget and may fail silently.
#[async_trait]
pub trait ViewReportSink: Send + Sync + 'static {
    /// Record that `story` has been seen. Idempotent on the server side.
    async fn report_viewed(&self, story: StoryId) -> Result<()>;
}

/// Side-effect dispatcher decoupled from the timing path.
pub struct ViewReportBridge {
    session: SessionId,
    sink: Option<Arc<dyn ViewReportSink>>,
}

impl ViewReportBridge {
    /// Create a bridge for `session`. With no sink configured, dispatches
    /// are dropped (useful for previews and tests that don't care about
    /// view reporting).
    pub fn new(session: SessionId, sink: Option<Arc<dyn ViewReportSink>>) -> Self {
        Self { session, sink }
    }

    /// Dispatch one "mark viewed" notification, fire-and-forget.
    ///
    /// The caller guarantees at-most-once per story per session by only
    /// handing over IDs whose viewed flag just flipped.
    pub fn dispatch(&self, story: StoryId) {
        let Some(sink) = &self.sink else {
            trace!(session = %self.session, %story, "no view-report sink configured");
            return;
        };
        let sink = sink.clone();
        let session = self.session;
        tokio::spawn(async move {
            match sink.report_viewed(story).await {
                Ok(()) => trace!(session = %session, %story, "view reported"),
                Err(error) => {
                    warn!(session = %session, %story, %error, "view report failed");
                }
            }
        });
    }
}

impl std::fmt::Debug for ViewReportBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewReportBridge")
            .field("session", &self.session)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
