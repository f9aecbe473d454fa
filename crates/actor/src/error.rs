use std::error::Error;
use std::fmt;

/// The error returned when sending a message to an actor whose task has
/// already terminated.
pub struct ActorDeadError;

impl fmt::Debug for ActorDeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorDeadError").finish()
    }
}

impl fmt::Display for ActorDeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        "the actor has dead".fmt(f)
    }
}

impl Error for ActorDeadError {}
