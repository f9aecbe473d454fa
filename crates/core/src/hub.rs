use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use parley_model::GenerationProvider;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::catalog::PersonaCatalog;
use crate::conversation::{
    Conversation, ConversationConfig, ConversationId, ConversationSnapshot,
};
use crate::dialogue::Dialogue;
use crate::events::{Viewer, ViewerId};
use crate::generation::GenerationClient;

/// How long a speaker waits after the previous turn before generating.
const DEFAULT_TURN_PAUSE: Duration = Duration::from_secs(2);

/// One viewer's subscription as recorded by the hub.
///
/// The membership index is shared with the orchestration actors: when
/// an actor drops a viewer whose channel is gone, it removes the
/// record here too, so hub-level accounting cannot drift from the
/// actors' viewer tables. `generation` identifies the subscription
/// itself; an actor cleaning up a stale channel must not erase the
/// record of a rejoin that happened in the meantime.
pub(crate) struct Membership {
    pub conversation: ConversationId,
    pub generation: u64,
}

pub(crate) type MembershipIndex = Arc<Mutex<HashMap<ViewerId, Membership>>>;

/// The process-wide registry of live conversations.
///
/// The hub owns the persona catalog and the generation backend, spawns
/// one orchestration actor per conversation, and routes control
/// operations and viewer subscriptions to them. It is cheap to share
/// behind an `Arc`.
pub struct DialogueHub {
    catalog: Arc<PersonaCatalog>,
    client: GenerationClient,
    pause: Duration,
    dialogues: RwLock<HashMap<ConversationId, Dialogue>>,
    memberships: MembershipIndex,
    subscription_seq: AtomicU64,
}

impl DialogueHub {
    /// Creates a conversation from the given config.
    ///
    /// The conversation is idle until [`start`](Self::start) is called;
    /// viewers may already join it.
    pub fn create(
        &self,
        config: ConversationConfig,
    ) -> Result<ConversationId, Error> {
        config.validate()?;
        let conversation = Conversation::new(config);
        let id = conversation.id;
        let dialogue = Dialogue::spawn(
            conversation,
            Arc::clone(&self.catalog),
            self.client.clone(),
            self.pause,
            Arc::clone(&self.memberships),
        );
        self.dialogues
            .write()
            .expect("dialogue registry is poisoned")
            .insert(id, dialogue);
        info!("created conversation {id}");
        Ok(id)
    }

    /// Begins the opening round of a conversation.
    pub async fn start(&self, id: ConversationId) -> Result<(), Error> {
        self.dialogue(id)?.start().await
    }

    /// Requests one more round of a conversation. Queued if a round is
    /// already in flight.
    pub fn continue_conversation(
        &self,
        id: ConversationId,
    ) -> Result<(), Error> {
        self.dialogue(id)?.request_round();
        Ok(())
    }

    /// Subscribes `viewer` to a conversation's event stream.
    ///
    /// The first event delivered is a snapshot of the current state. A
    /// viewer watches at most one conversation: joining another one
    /// implicitly leaves the previous one, and joining the same one
    /// replaces the previous subscription with a fresh stream.
    ///
    /// `role` is a self-description of the joining party. It is logged
    /// and carries no routing meaning.
    pub fn join(
        &self,
        viewer: ViewerId,
        id: ConversationId,
        role: &str,
    ) -> Result<Viewer, Error> {
        let dialogue = self.dialogue(id)?;
        debug!("viewer {viewer} joins conversation {id} as {role:?}");

        let generation = self.subscription_seq.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .memberships
            .lock()
            .expect("membership registry is poisoned")
            .insert(viewer, Membership {
                conversation: id,
                generation,
            });
        if let Some(previous) = previous {
            if let Ok(previous) = self.dialogue(previous.conversation) {
                previous.detach_viewer(viewer);
            }
        }

        Ok(dialogue.attach_viewer(viewer, generation))
    }

    /// Unsubscribes `viewer` from whatever it is watching. Does nothing
    /// for an unknown viewer.
    pub fn leave(&self, viewer: ViewerId) {
        let membership = self
            .memberships
            .lock()
            .expect("membership registry is poisoned")
            .remove(&viewer);
        if let Some(membership) = membership {
            if let Ok(dialogue) = self.dialogue(membership.conversation) {
                dialogue.detach_viewer(viewer);
            }
        }
    }

    /// Returns a point-in-time copy of a conversation's state.
    pub async fn history(
        &self,
        id: ConversationId,
    ) -> Result<ConversationSnapshot, Error> {
        self.dialogue(id)?.snapshot().await
    }

    /// Tears a conversation down. Viewers receive a final
    /// `conversation_closed` event; the identifier becomes unknown.
    pub fn close(&self, id: ConversationId) -> Result<(), Error> {
        let dialogue = self
            .dialogues
            .write()
            .expect("dialogue registry is poisoned")
            .remove(&id)
            .ok_or(Error::NotFound(id))?;
        self.memberships
            .lock()
            .expect("membership registry is poisoned")
            .retain(|_, membership| membership.conversation != id);
        dialogue.close();
        info!("closed conversation {id}");
        Ok(())
    }

    /// Probes the generation backend.
    ///
    /// Never fails: an unreachable backend is reported as a degraded
    /// status, with the probe error attached.
    pub async fn health(&self) -> HealthReport {
        let conversations = self
            .dialogues
            .read()
            .expect("dialogue registry is poisoned")
            .len();
        let viewers = self
            .memberships
            .lock()
            .expect("membership registry is poisoned")
            .len();
        match self.client.list_models().await {
            Ok(models) => HealthReport {
                status: HealthStatus::Healthy,
                backend_reachable: true,
                conversations,
                viewers,
                models,
                detail: None,
            },
            Err(err) => {
                warn!("backend health probe failed: {err}");
                HealthReport {
                    status: HealthStatus::Unhealthy,
                    backend_reachable: false,
                    conversations,
                    viewers,
                    models: Vec::new(),
                    detail: Some(err.to_string()),
                }
            }
        }
    }

    /// The persona catalog conversations are composed from.
    #[inline]
    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    fn dialogue(&self, id: ConversationId) -> Result<Dialogue, Error> {
        self.dialogues
            .read()
            .expect("dialogue registry is poisoned")
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound(id))
    }
}

/// Result of probing the generation backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall status, degraded when the backend probe fails.
    pub status: HealthStatus,
    /// Whether the backend answered the model listing probe.
    pub backend_reachable: bool,
    /// Number of live conversations.
    pub conversations: usize,
    /// Number of viewers currently subscribed to a conversation.
    pub viewers: usize,
    /// The model names the backend serves, empty when unhealthy.
    pub models: Vec<String>,
    /// The probe error, when unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Reachability of the generation backend.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// The backend answered the model listing probe.
    Healthy,
    /// The backend could not be reached or returned an error.
    Unhealthy,
}

/// [`DialogueHub`] builder.
pub struct DialogueHubBuilder {
    client: GenerationClient,
    catalog: PersonaCatalog,
    pause: Duration,
}

impl DialogueHubBuilder {
    /// Creates a new builder with the specified generation provider.
    #[inline]
    pub fn with_generation_provider<P: GenerationProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            client: GenerationClient::new(provider),
            catalog: PersonaCatalog::builtin(),
            pause: DEFAULT_TURN_PAUSE,
        }
    }

    /// Replaces the builtin persona catalog.
    #[inline]
    pub fn with_catalog(mut self, catalog: PersonaCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Overrides the pause between consecutive turns of a round.
    #[inline]
    pub fn with_turn_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Builds the hub.
    #[inline]
    pub fn build(self) -> DialogueHub {
        DialogueHub {
            catalog: Arc::new(self.catalog),
            client: self.client,
            pause: self.pause,
            dialogues: Default::default(),
            memberships: Default::default(),
            subscription_seq: AtomicU64::new(0),
        }
    }
}
