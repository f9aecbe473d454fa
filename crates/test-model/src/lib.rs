//! A local fake generation backend for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use parley_model::{
    ErrorKind, GenerationEvent, GenerationProvider, GenerationProviderError,
    GenerationRequest, GenerationResponse,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl GenerationProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Debug)]
pub struct ScriptedResponse {
    preset: PresetGeneration,
    delay: Duration,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl GenerationResponse for ScriptedResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<GenerationEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(FailureMode::MidStream { after }) = this.preset.failure
            {
                if this.event_idx == after {
                    return Poll::Ready(Err(Error {
                        message: "scripted mid-stream failure",
                        kind: ErrorKind::MalformedStream,
                    }));
                }
            }

            if this.event_idx < this.preset.fragments.len() {
                let fragment = this.preset.fragments[this.event_idx].clone();
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(GenerationEvent::Fragment(
                    fragment,
                ))));
            } else if this.event_idx == this.preset.fragments.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(GenerationEvent::Completed)));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

/// What the fake backend reports when its models are listed.
#[derive(Clone, Debug, Default)]
enum ModelListing {
    #[default]
    Empty,
    Available(Vec<String>),
    Unreachable,
}

#[derive(Default)]
struct Shared {
    script: VecDeque<PresetGeneration>,
    requests: Vec<GenerationRequest>,
    models: ModelListing,
}

/// A local fake generation backend for testing purpose.
///
/// Before sending requests, you need to setup the script, which is the
/// ordered list of outcomes the backend should produce. Each incoming
/// request consumes the next preset; requests beyond the end of the
/// script fail. Every received request is recorded and can be inspected
/// afterwards, which is how tests assert on composed prompts and model
/// selection.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    shared: Arc<Mutex<Shared>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    /// Appends a preset outcome to the script.
    pub fn add_generation(&self, preset: PresetGeneration) {
        self.shared.lock().unwrap().script.push_back(preset);
    }

    /// Sets the names reported by `list_models`.
    pub fn set_models<I, S>(&self, models: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared.lock().unwrap().models = ModelListing::Available(
            models.into_iter().map(Into::into).collect(),
        );
    }

    /// Makes `list_models` fail, simulating an unreachable backend.
    pub fn fail_model_listing(&self) {
        self.shared.lock().unwrap().models = ModelListing::Unreachable;
    }

    /// Sets the delay between streamed events.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in arrival order.
    pub fn recorded_requests(&self) -> Vec<GenerationRequest> {
        self.shared.lock().unwrap().requests.clone()
    }
}

impl GenerationProvider for ScriptedProvider {
    type Error = crate::Error;
    type Response = ScriptedResponse;

    fn send_request(
        &self,
        req: &GenerationRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let mut shared = self.shared.lock().unwrap();
        shared.requests.push(req.clone());

        let result = match shared.script.pop_front() {
            None => Err(Error {
                message: "script exhausted",
                kind: ErrorKind::Other,
            }),
            Some(preset)
                if preset.failure == Some(FailureMode::BeforeStream) =>
            {
                Err(Error {
                    message: "scripted request failure",
                    kind: ErrorKind::Unreachable,
                })
            }
            Some(preset) => Ok(ScriptedResponse {
                preset,
                delay: self.delay.unwrap_or(Duration::from_millis(1)),
                event_idx: 0,
                sleep: None,
            }),
        };
        ready(result)
    }

    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static
    {
        let result = match &self.shared.lock().unwrap().models {
            ModelListing::Empty => Ok(vec![]),
            ModelListing::Available(models) => Ok(models.clone()),
            ModelListing::Unreachable => Err(Error {
                message: "scripted listing failure",
                kind: ErrorKind::Unreachable,
            }),
        };
        ready(result)
    }
}
