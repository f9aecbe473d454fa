use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};

use crate::ActorRef;
use crate::mailbox::{DispatchMessage, Mailbox};

pub(crate) async fn run_actor<S: Send + 'static>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Box<dyn DispatchMessage<S>>>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let msg = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };

        {
            let Some(mailbox) = mailbox.upgrade() else {
                warn!("last mailbox has been dropped, discard the message");
                break;
            };

            let proc_span = trace_span!("proc msg");
            proc_span.in_scope(|| {
                msg.dispatch(&mut state, &ActorRef::from_mailbox(mailbox));
                trace!("finished");
            });
        }
    }
    debug!("will terminate");
}
