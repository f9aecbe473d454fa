use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use parley_model::{
    GenerationEvent, GenerationProvider, GenerationProviderError,
    GenerationRequest, GenerationResponse,
};
use tracing::Instrument;

type SendRequestResult =
    Result<CompletedGeneration, Box<dyn GenerationProviderError>>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(GenerationRequest, Box<dyn Fn(String) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

type ListModelsResult =
    Result<Vec<String>, Box<dyn GenerationProviderError>>;
type BoxedListModelsFuture =
    Pin<Box<dyn Future<Output = ListModelsResult> + Send>>;
type ListModelsFn =
    Arc<dyn Fn() -> BoxedListModelsFuture + Send + Sync>;

/// A wrapper around a generation provider that maintains an execution
/// environment for the provider and provides a type-erased interface
/// for the other modules.
#[derive(Clone)]
pub struct GenerationClient {
    handler_fn: HandlerFn,
    list_models_fn: ListModelsFn,
}

impl GenerationClient {
    /// Wraps a provider into a type-erased client.
    #[inline]
    pub fn new<P: GenerationProvider + 'static>(provider: P) -> Self {
        let provider = Arc::new(provider);
        // We have to erase the type `P`, since `GenerationClient` doesn't
        // have a generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new({
            let provider = Arc::clone(&provider);
            move |req, on_fragment| {
                let fut = provider.send_request(&req);
                Box::pin(
                    async move {
                        trace!("got a request: {:?}", req);
                        let resp_or_err = fut.await;
                        handle_response::<P>(resp_or_err, on_fragment).await
                    }
                    .instrument(trace_span!("generation client req")),
                )
            }
        });
        let list_models_fn: ListModelsFn = Arc::new(move || {
            let fut = provider.list_models();
            Box::pin(async move {
                fut.await.map_err(|err| {
                    Box::new(err) as Box<dyn GenerationProviderError>
                })
            })
        });
        Self {
            handler_fn,
            list_models_fn,
        }
    }

    /// Sends a request, invoking `on_fragment` for each text delta as
    /// it arrives, and returns the fully accumulated generation.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: GenerationRequest,
        on_fragment: impl Fn(String) + Send + 'static,
    ) -> Result<CompletedGeneration, Box<dyn GenerationProviderError>> {
        (self.handler_fn)(req, Box::new(on_fragment)).await
    }

    /// Queries the model names the backend currently serves.
    #[inline]
    pub async fn list_models(
        &self,
    ) -> Result<Vec<String>, Box<dyn GenerationProviderError>> {
        (self.list_models_fn)().await
    }
}

/// A completely received generation from the client.
#[derive(Clone, Debug)]
pub struct CompletedGeneration {
    /// All fragments concatenated in arrival order.
    pub full_text: String,
}

async fn handle_response<P: GenerationProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_fragment: Box<dyn Fn(String) + Send + 'static>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Box::new(err));
        }
    };

    let mut full_text = String::new();

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Box::new(err));
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            GenerationEvent::Fragment(text) => {
                full_text.push_str(&text);
                on_fragment(text);
            }
            GenerationEvent::Completed => {}
        }
    }

    trace!("finished a request");

    Ok(CompletedGeneration { full_text })
}
