use std::error::Error;

use crate::error::ErrorKind;
use crate::request::GenerationRequest;
use crate::response::GenerationResponse;

/// The error type for a generation provider.
pub trait GenerationProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents a generation provider, which is an entry for
/// submitting prompts and querying the models the backend serves.
///
/// Once the provider is created, it should behave like a stateless object.
/// It can still have internal state, but callers should not rely on it,
/// and the provider should be prepared for being dropped anytime.
pub trait GenerationProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: GenerationProviderError;

    /// The response type for this provider.
    type Response: GenerationResponse<Error = Self::Error>;

    /// Submits a prompt to the backend.
    fn send_request(
        &self,
        req: &GenerationRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;

    /// Lists the model names the backend currently serves.
    ///
    /// Used by health checks; implementations should treat this as a
    /// cheap reachability probe.
    fn list_models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static;
}
