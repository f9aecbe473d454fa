//! A generation provider for the Ollama HTTP API.

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use parley_model::{
    ErrorKind, GenerationProvider, GenerationProviderError, GenerationRequest,
};
use reqwest::{Client, Response, header};

pub use config::{OllamaConfig, OllamaConfigBuilder};
use io::Lines;
use response::OllamaResponse;

/// Error type for [`OllamaProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl GenerationProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

fn transport_error(err: &reqwest::Error) -> ErrorKind {
    if err.is_connect() || err.is_timeout() {
        ErrorKind::Unreachable
    } else {
        ErrorKind::Other
    }
}

/// Ollama generation provider.
///
/// Generation streams newline-delimited JSON from `/api/generate`;
/// model listing queries `/api/tags`.
#[derive(Clone, Debug)]
pub struct OllamaProvider {
    client: Client,
    config: Arc<OllamaConfig>,
}

impl OllamaProvider {
    /// Creates a new `OllamaProvider` with the given configuration.
    #[inline]
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl GenerationProvider for OllamaProvider {
    type Error = Error;
    type Response = OllamaResponse;

    fn send_request(
        &self,
        req: &GenerationRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let ollama_req = proto::create_request(req);
        let resp_fut = self
            .client
            .post(format!("{}{}", self.config.base_url(), "/api/generate"))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&ollama_req)
            .send();

        async move {
            let resp = match resp_fut.await {
                Ok(resp) => match resp.error_for_status() {
                    Ok(resp) => resp,
                    Err(err) => {
                        return Err(Error::new(
                            format!("{err}"),
                            ErrorKind::Other,
                        ));
                    }
                },
                Err(err) => {
                    return Err(Error::new(
                        format!("{err}"),
                        transport_error(&err),
                    ));
                }
            };

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    let subtype = m.subtype().as_str();
                    subtype == "x-ndjson" || subtype == "json"
                })
                .unwrap_or(false);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::MalformedStream,
                ));
            }

            // Here we got a successful response.
            Ok(OllamaResponse::from_lines(Lines::from_response(resp)))
        }
    }

    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static
    {
        let resp_fut = self
            .client
            .get(format!("{}{}", self.config.base_url(), "/api/tags"))
            .send();

        async move {
            let resp = match resp_fut.await.and_then(Response::error_for_status)
            {
                Ok(resp) => resp,
                Err(err) => {
                    return Err(Error::new(
                        format!("{err}"),
                        transport_error(&err),
                    ));
                }
            };

            let tags = match resp.json::<proto::TagsResponse>().await {
                Ok(tags) => tags,
                Err(err) => {
                    return Err(Error::new(
                        format!("{err}"),
                        ErrorKind::MalformedStream,
                    ));
                }
            };
            trace!("listed {} models", tags.models.len());

            Ok(tags.models.into_iter().map(|m| m.name).collect())
        }
    }
}
