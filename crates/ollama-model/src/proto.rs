use parley_model::GenerationRequest;
use serde::{Deserialize, Serialize};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    pub done_reason: Option<String>,
    // Ollama reports mid-stream failures as a payload with an `error`
    // field instead of closing the connection.
    pub error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TagsResponse {
    pub models: Vec<TagModel>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TagModel {
    pub name: String,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: Options,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct Options {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(req: &GenerationRequest) -> GenerateRequest {
    GenerateRequest {
        model: req.model.clone(),
        prompt: req.prompt.clone(),
        stream: true,
        options: Options {
            temperature: req.options.temperature,
            top_p: req.options.top_p,
            top_k: req.options.top_k,
        },
    }
}
