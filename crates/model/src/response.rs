use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::GenerationProviderError;

/// A streaming response from the generation provider.
pub trait GenerationResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: GenerationProviderError;

    /// Attempts to pull out the next event from the response.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct response state:
    ///
    /// - `Poll::Pending` means that this response is still waiting for
    ///   the next event. Implementations will ensure that the current
    ///   task will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the response has an event
    ///   to deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the response has completed.
    /// - `Poll::Ready(Err(error))` means an error occurred while
    ///   processing the response.
    ///
    /// Calling this method after completion should always return `None`.
    ///
    /// Fragment boundaries carry no meaning: a fragment may split words,
    /// sentences or tokens arbitrarily, and a response may legitimately
    /// complete without producing a single fragment.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<GenerationEvent>, Self::Error>>;
}

/// The event from a generation response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GenerationEvent {
    /// Received an incremental text delta.
    Fragment(String),
    /// The backend signaled the natural end of generation.
    Completed,
}
