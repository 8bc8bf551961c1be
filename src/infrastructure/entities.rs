//! Ollama wire types

use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerateRequest {
    pub fn streaming(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        GenerateRequest {
            model: model.into(),
            prompt: prompt.into(),
            stream: true,
        }
    }
}

/// One line of the `/api/generate` NDJSON stream. Fields other than these two are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamChunk {
    pub response: Option<String>,
    pub done: Option<bool>,
}

impl UpstreamChunk {
    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
pub struct ModelTag {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct VersionResponse {
    pub version: Option<String>,
}
