use std::pin::Pin;
use std::task::{Context, Poll, ready};

use parley_model::{
    ErrorKind, GenerationEvent, GenerationResponse,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::{Error as LinesError, Lines};
use crate::proto::GenerateChunk;

struct PartialState {
    lines: Lines,
    finished: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<GenerationEvent>, PartialState), Error>;

pin_project! {
    pub struct OllamaResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OllamaResponse {
    #[inline]
    pub fn from_lines(lines: Lines) -> Self {
        let partial_state = PartialState {
            lines,
            finished: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl GenerationResponse for OllamaResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<GenerationEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            // The stream has been exhausted.
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<GenerationEvent>, PartialState), Error> {
    if partial_state.finished {
        return Ok((None, partial_state));
    }

    loop {
        let line = match partial_state.lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                // The server closed the stream without a `done` record.
                // Treat it as a natural end of generation.
                partial_state.finished = true;
                return Ok((
                    Some(GenerationEvent::Completed),
                    partial_state,
                ));
            }
            Err(LinesError::Transport(message)) => {
                return Err(Error::new(message, ErrorKind::Other));
            }
            Err(LinesError::InvalidPayload) => {
                return Err(Error::new(
                    "stream payload is not valid UTF-8",
                    ErrorKind::MalformedStream,
                ));
            }
        };
        trace!("got generate record: {line}");

        let chunk = serde_json::from_str::<GenerateChunk>(&line)
            .map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::MalformedStream)
            })?;

        if let Some(error) = chunk.error {
            return Err(Error::new(error, ErrorKind::Other));
        }

        if chunk.done {
            partial_state.finished = true;
            return Ok((Some(GenerationEvent::Completed), partial_state));
        }

        if !chunk.response.is_empty() {
            return Ok((
                Some(GenerationEvent::Fragment(chunk.response)),
                partial_state,
            ));
        }

        // An empty delta carries nothing to report, keep reading.
    }
}
