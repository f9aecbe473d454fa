//! Events delivered to conversation viewers.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::conversation::{ConversationSnapshot, SpeakerRole};

/// Opaque identifier of a viewer subscription.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ViewerId(Uuid);

impl ViewerId {
    /// Allocates a fresh identifier.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// An event observed while watching a conversation.
///
/// The first event a viewer receives is always a
/// [`ConversationEvent::Snapshot`] reflecting the state at join time;
/// every event after it is an incremental change, with no gaps and no
/// overlap with the snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEvent {
    /// A speaker is about to start producing text.
    GenerationStart {
        /// The speaking slot about to generate.
        speaker: SpeakerRole,
    },
    /// A fragment of in-progress text.
    ContentFragment {
        /// The speaking slot producing the text.
        speaker: SpeakerRole,
        /// The fragment, to be appended to the turn in progress.
        text: String,
    },
    /// A turn finished and was appended to the history.
    GenerationComplete {
        /// The speaking slot that finished.
        speaker: SpeakerRole,
        /// The full accumulated text of the completed turn.
        full_text: String,
    },
    /// A generation attempt failed; the turn was discarded.
    GenerationError {
        /// Human-readable description of the failure.
        message: String,
    },
    /// Point-in-time state, sent once on join.
    #[serde(rename = "conversation_snapshot")]
    Snapshot {
        /// The conversation state at join time.
        #[serde(flatten)]
        snapshot: ConversationSnapshot,
    },
    /// The conversation was torn down; no further events follow.
    ConversationClosed,
}

/// A live subscription to a conversation's event stream.
#[derive(Debug)]
pub struct Viewer {
    id: ViewerId,
    rx: mpsc::UnboundedReceiver<ConversationEvent>,
}

impl Viewer {
    pub(crate) fn new(
        id: ViewerId,
        rx: mpsc::UnboundedReceiver<ConversationEvent>,
    ) -> Self {
        Self { id, rx }
    }

    /// The identifier of this subscription.
    #[inline]
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the conversation is closed or the viewer
    /// has been detached.
    pub async fn recv(&mut self) -> Option<ConversationEvent> {
        self.rx.recv().await
    }
}
