use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use parley_model::{
    ErrorKind, GenerationEvent, GenerationProvider, GenerationProviderError,
    GenerationRequest, GenerationResponse,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeBackendError(ErrorKind);

impl Display for FakeBackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeBackendError {}

impl GenerationProviderError for FakeBackendError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug)]
struct FakeBackendResponse {
    fake_items: VecDeque<String>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeBackendResponse {
    fn new(prompt: &str) -> Self {
        let fake_items = format!("You asked {}", prompt)
            .split(" ")
            .map(ToString::to_string)
            .collect();
        Self {
            fake_items,
            sleep: None,
        }
    }
}

impl GenerationResponse for FakeBackendResponse {
    type Error = FakeBackendError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<GenerationEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(mut this_item) = this.fake_items.pop_front() {
                let need_space = !this.fake_items.is_empty();
                if need_space {
                    this_item.push(' ');
                }
                return Poll::Ready(Ok(Some(GenerationEvent::Fragment(
                    this_item,
                ))));
            }

            return Poll::Ready(Ok(None));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

struct FakeBackendProvider;

impl GenerationProvider for FakeBackendProvider {
    type Error = FakeBackendError;
    type Response = FakeBackendResponse;

    fn send_request(
        &self,
        req: &GenerationRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = if req.prompt.is_empty() {
            Err(FakeBackendError(ErrorKind::Other))
        } else {
            Ok(FakeBackendResponse::new(&req.prompt))
        };
        ready(result)
    }

    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static
    {
        ready(Ok(vec!["fake:latest".to_owned()]))
    }
}

mod tests {
    use std::future::poll_fn;

    use super::*;

    #[tokio::test]
    async fn test_streaming() {
        let provider = FakeBackendProvider;
        let req = GenerationRequest::new("fake:latest", "about virtue");
        let mut resp = provider.send_request(&req).await.unwrap();

        let mut full_text = String::new();
        loop {
            let resp_fut =
                poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx));
            match resp_fut.await {
                Ok(Some(event)) => match event {
                    GenerationEvent::Fragment(delta) => {
                        full_text.push_str(&delta);
                    }
                    GenerationEvent::Completed => break,
                },
                Ok(None) => break,
                Err(err) => unreachable!("unexpected error: {err:?}"),
            }
        }

        assert_eq!(full_text, "You asked about virtue");
    }

    #[tokio::test]
    async fn test_error() {
        let provider = FakeBackendProvider;
        let req = GenerationRequest::new("fake:latest", "");
        let result = provider.send_request(&req).await;
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_list_models() {
        let provider = FakeBackendProvider;
        let models = provider.list_models().await.unwrap();
        assert_eq!(models, ["fake:latest"]);
    }
}
