use thiserror::Error;

use crate::conversation::ConversationId;

/// Errors reported by the control surface.
///
/// Generation failures are deliberately not here: they are contained
/// per turn and surface as `generation_error` events on the affected
/// conversation instead of failing a caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The conversation config is missing required fields. Nothing was
    /// created.
    #[error("invalid conversation config, missing: {missing}")]
    Validation {
        /// Comma-separated names of the missing fields.
        missing: String,
    },
    /// No conversation exists under this identifier.
    #[error("conversation {0} not found")]
    NotFound(ConversationId),
    /// `start` was already called on this conversation. The opening
    /// round does not have to have produced any turns yet (or at all,
    /// if it failed); the first accepted `start` claims the
    /// conversation for good.
    #[error("conversation {0} has already started")]
    AlreadyStarted(ConversationId),
}
