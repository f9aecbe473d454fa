//! A lightweight single-writer mailbox for actor-style components.
//!
//! Each actor owns its state exclusively: all mutation happens on one
//! task, in mailbox order. That makes an actor a natural run-serializer
//! for anything that must never see two operations in flight at once.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod scheduler;

pub use error::ActorDeadError;
pub use handle::ActorRef;
pub use mailbox::Message;
