//! Conversation-related types.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Opaque identifier of a conversation, unique per process and across
/// restarts.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Allocates a fresh identifier.
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConversationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One of the two fixed speaking slots of a conversation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    /// The speaker that opens the conversation.
    First,
    /// The speaker that responds to the opening.
    Second,
}

impl SpeakerRole {
    /// The role whose turn it is when the history already holds `len`
    /// turns: roles strictly alternate starting with `First`.
    #[inline]
    pub fn for_history_len(len: usize) -> Self {
        if len % 2 == 0 {
            SpeakerRole::First
        } else {
            SpeakerRole::Second
        }
    }

    /// The opposite role.
    #[inline]
    pub fn other(self) -> Self {
        match self {
            SpeakerRole::First => SpeakerRole::Second,
            SpeakerRole::Second => SpeakerRole::First,
        }
    }
}

/// Immutable configuration of a conversation, fixed at creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Philosopher key for the first speaker.
    pub philosopher1: String,
    /// Author key for the first speaker.
    pub author1: String,
    /// Model name the first speaker generates with.
    pub model1: String,
    /// Philosopher key for the second speaker.
    pub philosopher2: String,
    /// Author key for the second speaker.
    pub author2: String,
    /// Model name the second speaker generates with.
    pub model2: String,
    /// The discussion topic.
    pub topic: String,
}

/// The persona/model triple a single speaker is configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpeakerConfig<'a> {
    /// Philosopher key.
    pub philosopher: &'a str,
    /// Author key.
    pub author: &'a str,
    /// Model name.
    pub model: &'a str,
}

impl ConversationConfig {
    /// Checks that every required field is present, reporting all the
    /// missing ones at once.
    pub fn validate(&self) -> Result<(), Error> {
        let fields = [
            ("philosopher1", &self.philosopher1),
            ("author1", &self.author1),
            ("model1", &self.model1),
            ("philosopher2", &self.philosopher2),
            ("author2", &self.author2),
            ("model2", &self.model2),
            ("topic", &self.topic),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                missing: missing.join(", "),
            })
        }
    }

    /// Returns the persona pair and model configured for a role.
    #[inline]
    pub fn speaker(&self, role: SpeakerRole) -> SpeakerConfig<'_> {
        match role {
            SpeakerRole::First => SpeakerConfig {
                philosopher: &self.philosopher1,
                author: &self.author1,
                model: &self.model1,
            },
            SpeakerRole::Second => SpeakerConfig {
                philosopher: &self.philosopher2,
                author: &self.author2,
                model: &self.model2,
            },
        }
    }
}

/// One completed unit of dialogue, immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The speaking slot this turn belongs to.
    pub role: SpeakerRole,
    /// The full accumulated text of the turn.
    pub content: String,
    /// When the generation stream for this turn terminated.
    pub completed_at: DateTime<Utc>,
}

/// The live state of a conversation.
///
/// Owned exclusively by the conversation's orchestration actor; other
/// parts of the system only ever see [`ConversationSnapshot`]s.
#[derive(Clone, Debug, Serialize)]
pub struct Conversation {
    /// The conversation identifier.
    pub id: ConversationId,
    /// The immutable configuration.
    pub config: ConversationConfig,
    /// Completed turns, in speaking order. Append-only.
    pub turns: Vec<Turn>,
    /// Number of completed rounds (turn pairs).
    pub exchange_count: u32,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates an empty conversation with a fresh identifier.
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            id: ConversationId::new(),
            config,
            turns: Vec::new(),
            exchange_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Builds the point-in-time view handed to snapshot consumers.
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            config: self.config.clone(),
            history: self.turns.clone(),
            exchange_count: self.exchange_count,
        }
    }
}

/// A point-in-time copy of a conversation's shareable state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    /// The immutable configuration.
    pub config: ConversationConfig,
    /// Turns completed at the time of the snapshot.
    pub history: Vec<Turn>,
    /// Rounds completed at the time of the snapshot.
    pub exchange_count: u32,
}
