//! Remote model service contracts.
//!
//! The engine treats embedding and chat completion as opaque remote
//! collaborators. Failures surface as gateway errors and are never retried
//! at this layer.

mod openai;

pub use openai::OpenAiCompatGateway;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::errors::RagError;

/// One message in a chat exchange. `role` follows the common wire
/// vocabulary: "system", "user", "assistant".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i32>,
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            stop: None,
        }
    }
}

/// Text-to-vector service. Deterministic for a fixed model version; all
/// vectors from one model share a dimension.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError>;
}

/// Language-generation service used for query rewriting (non-streaming)
/// and answer synthesis (streaming).
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String, RagError>;

    /// Finite stream of answer fragments. Each call produces one fresh
    /// stream; the channel closing without a prior error marks normal
    /// completion.
    async fn complete_stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError>;
}
