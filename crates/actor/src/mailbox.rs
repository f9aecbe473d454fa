use tokio::sync::{mpsc, watch};

use crate::{ActorDeadError, ActorRef};

/// A message that an actor can handle.
pub trait Message<S>: Send + 'static {
    /// Handles the message with mutable access to the actor's state.
    ///
    /// `actor` is a handle to the actor itself, so a handler can enqueue
    /// follow-up messages. They will run after every message that is
    /// already queued.
    fn handle(self, state: &mut S, actor: &ActorRef<S>);
}

/// Object-safe shim so messages of different types can share one queue.
pub(crate) trait DispatchMessage<S>: Send {
    fn dispatch(self: Box<Self>, state: &mut S, actor: &ActorRef<S>);
}

impl<S, M: Message<S>> DispatchMessage<S> for M {
    #[inline]
    fn dispatch(self: Box<Self>, state: &mut S, actor: &ActorRef<S>) {
        (*self).handle(state, actor)
    }
}

pub(crate) struct MailboxParts<S> {
    pub mailbox: Mailbox<S>,
    pub msg_rx: mpsc::UnboundedReceiver<Box<dyn DispatchMessage<S>>>,
    pub kill_rx: watch::Receiver<bool>,
}

pub(crate) struct Mailbox<S> {
    msg_tx: mpsc::UnboundedSender<Box<dyn DispatchMessage<S>>>,
    kill_tx: watch::Sender<bool>,
}

impl<S: Send + 'static> Mailbox<S> {
    #[inline]
    pub fn new() -> MailboxParts<S> {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox { msg_tx, kill_tx },
            msg_rx,
            kill_rx,
        }
    }

    #[inline]
    pub fn send(
        &self,
        msg: Box<dyn DispatchMessage<S>>,
    ) -> Result<(), ActorDeadError> {
        self.msg_tx.send(msg).map_err(|_| ActorDeadError)
    }

    #[inline]
    pub fn try_kill(&self) {
        self.kill_tx.send(true).ok();
    }
}
