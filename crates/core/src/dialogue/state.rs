use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_actor::{ActorRef, Message};
use parley_model::{GenerationProviderError, GenerationRequest};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::Error;
use crate::catalog::PersonaCatalog;
use crate::conversation::{
    Conversation, ConversationSnapshot, SpeakerRole, Turn,
};
use crate::events::{ConversationEvent, ViewerId};
use crate::generation::{CompletedGeneration, GenerationClient};
use crate::hub::MembershipIndex;
use crate::prompt;

#[derive(Clone, Copy, Default, PartialEq, Eq)]
enum DialogueStage {
    #[default]
    Idle,
    Generating,
    Pausing,
}

struct ViewerLink {
    tx: mpsc::UnboundedSender<ConversationEvent>,
    /// The subscription generation assigned by the hub at join time.
    generation: u64,
    /// Set while the generation that was in flight when this viewer
    /// joined is still streaming. A muted viewer's snapshot does not
    /// contain the partial turn, so replaying its fragments would leave
    /// the viewer with torn text; it receives the completed turn via
    /// `generation_complete` instead.
    muted: bool,
}

/// State owned by one conversation's orchestration actor.
///
/// Messages dispatched to the actor are handled immediately, no matter
/// what the current stage is. A round requested while another round is
/// streaming is not rejected; it is queued and runs when the actor
/// becomes idle again.
pub(crate) struct DialogueState {
    conversation: Conversation,
    catalog: Arc<PersonaCatalog>,
    client: Option<GenerationClient>,
    pause: Duration,
    stage: DialogueStage,
    /// Speakers still owed a turn in the round being played.
    plan: VecDeque<SpeakerRole>,
    /// Rounds requested while the actor was busy.
    pending_rounds: u32,
    started: bool,
    viewers: HashMap<ViewerId, ViewerLink>,
    /// The hub's membership index, shared so that dropping a dead
    /// viewer link here also drops its hub-level record.
    memberships: MembershipIndex,
    running_task: Option<JoinHandle<()>>,
}

impl DialogueState {
    pub(crate) fn new(
        conversation: Conversation,
        catalog: Arc<PersonaCatalog>,
        client: GenerationClient,
        pause: Duration,
        memberships: MembershipIndex,
    ) -> Self {
        Self {
            conversation,
            catalog,
            client: Some(client),
            pause,
            stage: Default::default(),
            plan: Default::default(),
            pending_rounds: 0,
            started: false,
            viewers: Default::default(),
            memberships,
            running_task: None,
        }
    }

    fn request_round(&mut self, handle: &ActorRef<Self>) {
        if self.stage != DialogueStage::Idle {
            self.pending_rounds += 1;
            return;
        }
        self.start_round_checked(handle);
    }

    fn process_next_round(&mut self, handle: &ActorRef<Self>) {
        if self.stage != DialogueStage::Idle {
            // Cannot start the next round now. We don't need to send
            // another message to do this again, since this is called
            // automatically whenever the current round settles.
            return;
        }
        if self.pending_rounds > 0 {
            self.pending_rounds -= 1;
            self.start_round_checked(handle);
        }
    }

    /// Plans and begins a round, assuming the stage is checked.
    ///
    /// The plan is built from the history length at this moment, so a
    /// queued round always continues from wherever the previous one
    /// actually left off, including after a failed turn.
    fn start_round_checked(&mut self, handle: &ActorRef<Self>) {
        let first = SpeakerRole::for_history_len(self.conversation.turns.len());
        self.plan = VecDeque::from([first, first.other()]);
        self.begin_next_turn(handle);
    }

    fn begin_next_turn(&mut self, handle: &ActorRef<Self>) {
        let Some(speaker) = self.plan.pop_front() else {
            return;
        };
        self.stage = DialogueStage::Generating;
        self.broadcast_live(ConversationEvent::GenerationStart { speaker });

        let config = &self.conversation.config;
        let speaker_config = config.speaker(speaker);
        let prompt = prompt::compose(
            &self.catalog,
            &speaker_config,
            &config.topic,
            &self.conversation.turns,
        );
        let request = GenerationRequest::new(speaker_config.model, prompt);

        let client = self
            .client
            .take()
            .expect("generation client is already in use");
        let handle_clone = handle.clone();
        let task = tokio::spawn(async move {
            let result = client
                .send_request(request, {
                    let handle = handle_clone.clone();
                    move |text| {
                        handle.send(FragmentStreamed { speaker, text }).ok();
                    }
                })
                .await;
            handle_clone
                .send(GenerationFinished {
                    speaker,
                    client,
                    result,
                })
                .ok();
        });
        self.running_task = Some(task);
    }

    fn finish_generation(
        &mut self,
        speaker: SpeakerRole,
        result: Result<CompletedGeneration, Box<dyn GenerationProviderError>>,
        handle: &ActorRef<Self>,
    ) {
        self.running_task = None;

        match result {
            Ok(completed) => {
                let full_text = completed.full_text;
                self.conversation.turns.push(Turn {
                    role: speaker,
                    content: full_text.clone(),
                    completed_at: Utc::now(),
                });
                self.broadcast_all(ConversationEvent::GenerationComplete {
                    speaker,
                    full_text,
                });
                self.unmute_viewers();

                if self.plan.is_empty() {
                    self.conversation.exchange_count += 1;
                    self.stage = DialogueStage::Idle;
                    self.process_next_round(handle);
                } else {
                    self.stage = DialogueStage::Pausing;
                    self.spawn_pause(handle);
                }
            }
            Err(err) => {
                warn!("generation failed: {err}");
                self.broadcast_all(ConversationEvent::GenerationError {
                    message: err.to_string(),
                });
                self.unmute_viewers();

                // The failed turn never entered the history and the
                // rest of the round is abandoned; queued rounds still
                // get their chance.
                self.plan.clear();
                self.stage = DialogueStage::Idle;
                self.process_next_round(handle);
            }
        }
    }

    fn spawn_pause(&mut self, handle: &ActorRef<Self>) {
        let pause = self.pause;
        let handle = handle.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(pause).await;
            handle.send(PauseElapsed).ok();
        });
        self.running_task = Some(task);
    }

    fn attach_viewer(
        &mut self,
        viewer: ViewerId,
        generation: u64,
        tx: mpsc::UnboundedSender<ConversationEvent>,
    ) {
        let snapshot = self.conversation.snapshot();
        tx.send(ConversationEvent::Snapshot { snapshot }).ok();
        let muted = self.stage == DialogueStage::Generating;
        self.viewers.insert(viewer, ViewerLink {
            tx,
            generation,
            muted,
        });
    }

    /// Sends an event to the viewers that may observe in-progress text.
    /// Viewers whose channel is gone are dropped along the way.
    fn broadcast_live(&mut self, event: ConversationEvent) {
        let mut gone = Vec::new();
        self.viewers.retain(|viewer, link| {
            if link.muted || link.tx.send(event.clone()).is_ok() {
                return true;
            }
            gone.push((*viewer, link.generation));
            false
        });
        self.forget_memberships(&gone);
    }

    /// Sends an event to every viewer, muted ones included.
    fn broadcast_all(&mut self, event: ConversationEvent) {
        let mut gone = Vec::new();
        self.viewers.retain(|viewer, link| {
            if link.tx.send(event.clone()).is_ok() {
                return true;
            }
            gone.push((*viewer, link.generation));
            false
        });
        self.forget_memberships(&gone);
    }

    /// Erases the hub-level records of viewers dropped by a broadcast.
    ///
    /// A record is only erased while it still carries the dropped
    /// subscription's generation; a viewer that rejoined in the
    /// meantime holds a newer generation and keeps its record.
    fn forget_memberships(&self, gone: &[(ViewerId, u64)]) {
        if gone.is_empty() {
            return;
        }
        let mut memberships = self
            .memberships
            .lock()
            .expect("membership registry is poisoned");
        for (viewer, generation) in gone {
            let stale = memberships
                .get(viewer)
                .is_some_and(|membership| membership.generation == *generation);
            if stale {
                memberships.remove(viewer);
            }
        }
    }

    fn unmute_viewers(&mut self) {
        for link in self.viewers.values_mut() {
            link.muted = false;
        }
    }
}

#[derive(Debug)]
pub(crate) struct Start {
    pub reply: oneshot::Sender<Result<(), Error>>,
}

impl Message<DialogueState> for Start {
    fn handle(self, state: &mut DialogueState, handle: &ActorRef<DialogueState>) {
        if state.started {
            self.reply
                .send(Err(Error::AlreadyStarted(state.conversation.id)))
                .ok();
            return;
        }
        state.started = true;
        self.reply.send(Ok(())).ok();
        state.request_round(handle);
    }
}

#[derive(Debug)]
pub(crate) struct RequestRound;

impl Message<DialogueState> for RequestRound {
    fn handle(self, state: &mut DialogueState, handle: &ActorRef<DialogueState>) {
        state.started = true;
        state.request_round(handle);
    }
}

pub(crate) struct AttachViewer {
    pub viewer: ViewerId,
    pub generation: u64,
    pub tx: mpsc::UnboundedSender<ConversationEvent>,
}

impl Message<DialogueState> for AttachViewer {
    fn handle(
        self,
        state: &mut DialogueState,
        _handle: &ActorRef<DialogueState>,
    ) {
        state.attach_viewer(self.viewer, self.generation, self.tx);
    }
}

#[derive(Debug)]
pub(crate) struct DetachViewer(pub ViewerId);

impl Message<DialogueState> for DetachViewer {
    fn handle(
        self,
        state: &mut DialogueState,
        _handle: &ActorRef<DialogueState>,
    ) {
        state.viewers.remove(&self.0);
    }
}

#[derive(Debug)]
pub(crate) struct SnapshotRequest {
    pub reply: oneshot::Sender<ConversationSnapshot>,
}

impl Message<DialogueState> for SnapshotRequest {
    fn handle(
        self,
        state: &mut DialogueState,
        _handle: &ActorRef<DialogueState>,
    ) {
        self.reply.send(state.conversation.snapshot()).ok();
    }
}

struct FragmentStreamed {
    speaker: SpeakerRole,
    text: String,
}

impl Message<DialogueState> for FragmentStreamed {
    fn handle(
        self,
        state: &mut DialogueState,
        _handle: &ActorRef<DialogueState>,
    ) {
        state.broadcast_live(ConversationEvent::ContentFragment {
            speaker: self.speaker,
            text: self.text,
        });
    }
}

struct GenerationFinished {
    speaker: SpeakerRole,
    client: GenerationClient,
    result: Result<CompletedGeneration, Box<dyn GenerationProviderError>>,
}

impl Debug for GenerationFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationFinished")
            .field("speaker", &self.speaker)
            .finish_non_exhaustive()
    }
}

impl Message<DialogueState> for GenerationFinished {
    fn handle(self, state: &mut DialogueState, handle: &ActorRef<DialogueState>) {
        state.client = Some(self.client);
        state.finish_generation(self.speaker, self.result, handle);
    }
}

#[derive(Debug)]
struct PauseElapsed;

impl Message<DialogueState> for PauseElapsed {
    fn handle(self, state: &mut DialogueState, handle: &ActorRef<DialogueState>) {
        state.running_task = None;
        if state.stage == DialogueStage::Pausing {
            state.begin_next_turn(handle);
        }
    }
}

#[derive(Debug)]
pub(crate) struct Close;

impl Message<DialogueState> for Close {
    fn handle(self, state: &mut DialogueState, handle: &ActorRef<DialogueState>) {
        if let Some(task) = state.running_task.take() {
            task.abort();
        }
        state.broadcast_all(ConversationEvent::ConversationClosed);
        state.viewers.clear();
        handle.try_kill();
    }
}
