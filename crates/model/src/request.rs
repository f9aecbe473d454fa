use serde::{Deserialize, Serialize};

/// A request to be sent to the generation provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Name of the model to generate with.
    pub model: String,
    /// The fully composed instruction prompt.
    pub prompt: String,
    /// Sampling options for the backend.
    pub options: GenerationOptions,
}

impl GenerationRequest {
    /// Creates a request with the default sampling options.
    #[inline]
    pub fn new<M: Into<String>, P: Into<String>>(model: M, prompt: P) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: Default::default(),
        }
    }
}

/// Sampling options passed through to the backend.
///
/// The defaults match the dialogue tuning this system was built around:
/// slightly adventurous sampling for short conversational exchanges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling threshold.
    pub top_p: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
}

impl Default for GenerationOptions {
    #[inline]
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_p: 0.9,
            top_k: 40,
        }
    }
}
