mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use parley_actor::ActorRef;
use tokio::sync::{mpsc, oneshot};

use crate::Error;
use crate::catalog::PersonaCatalog;
use crate::conversation::{Conversation, ConversationId, ConversationSnapshot};
use crate::events::{Viewer, ViewerId};
use crate::generation::GenerationClient;
use crate::hub::MembershipIndex;
use state::{
    AttachViewer, Close, DetachViewer, DialogueState, RequestRound,
    SnapshotRequest, Start,
};

/// Handle to one conversation's orchestration actor.
///
/// The actor is the only writer of the conversation state; every
/// operation below is a message through its mailbox, so viewers always
/// observe turns, fragments and snapshots in one consistent order.
#[derive(Clone)]
pub(crate) struct Dialogue {
    id: ConversationId,
    handle: ActorRef<DialogueState>,
}

impl Dialogue {
    pub(crate) fn spawn(
        conversation: Conversation,
        catalog: Arc<PersonaCatalog>,
        client: GenerationClient,
        pause: Duration,
        memberships: MembershipIndex,
    ) -> Self {
        let id = conversation.id;
        let state =
            DialogueState::new(conversation, catalog, client, pause, memberships);
        let handle = ActorRef::spawn(state, Some("dialogue"));
        Self { id, handle }
    }

    /// Requests the opening round. Resolves once the actor has either
    /// accepted the request or rejected it.
    pub(crate) async fn start(&self) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(Start { reply: tx })
            .map_err(|_| Error::NotFound(self.id))?;
        rx.await.map_err(|_| Error::NotFound(self.id))?
    }

    /// Requests one more round of dialogue. Runs immediately when the
    /// actor is idle, otherwise queues behind the work in flight.
    pub(crate) fn request_round(&self) {
        self.handle.send(RequestRound).ok();
    }

    /// Subscribes a viewer. The first event delivered is always a
    /// snapshot of the state at the time this message is processed.
    pub(crate) fn attach_viewer(
        &self,
        viewer: ViewerId,
        generation: u64,
    ) -> Viewer {
        let (tx, rx) = mpsc::unbounded_channel();
        self.handle
            .send(AttachViewer {
                viewer,
                generation,
                tx,
            })
            .ok();
        Viewer::new(viewer, rx)
    }

    pub(crate) fn detach_viewer(&self, viewer: ViewerId) {
        self.handle.send(DetachViewer(viewer)).ok();
    }

    pub(crate) async fn snapshot(&self) -> Result<ConversationSnapshot, Error> {
        let (tx, rx) = oneshot::channel();
        self.handle
            .send(SnapshotRequest { reply: tx })
            .map_err(|_| Error::NotFound(self.id))?;
        rx.await.map_err(|_| Error::NotFound(self.id))
    }

    /// Tears the conversation down. Viewers receive a final
    /// `conversation_closed` event and the actor quits.
    pub(crate) fn close(&self) {
        self.handle.send(Close).ok();
    }
}
