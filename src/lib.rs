//! Genius — retrieval-augmented conversational answering engine.
//!
//! Given an ingested document and a running conversation, the pipeline
//! rewrites each follow-up question into a self-contained query, retrieves
//! relevant and mutually diverse passages from a persistent vector index,
//! and streams a grounded answer while keeping the conversation log
//! consistent.
//!
//! The embedding and chat-completion services are opaque remote
//! collaborators behind the [`gateway`] traits; [`gateway::OpenAiCompatGateway`]
//! speaks the common `/v1` wire shape for both.

pub mod chunker;
pub mod core;
pub mod document;
pub mod gateway;
pub mod index;
pub mod logging;
pub mod memory;
pub mod pipeline;
pub mod retriever;
pub mod vector_math;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::chunker::{Chunker, TextChunk};
pub use crate::core::config::{GatewaySettings, RagSettings, RebuildPolicy};
pub use crate::core::errors::RagError;
pub use crate::document::{Document, DocumentLoader, SourceType};
pub use crate::gateway::{
    ChatGateway, ChatMessage, ChatRequest, EmbeddingGateway, OpenAiCompatGateway,
};
pub use crate::index::{MemoryVectorStore, SqliteVectorStore, VectorIndex, VectorStore};
pub use crate::memory::{ConversationMemory, Role, Turn};
pub use crate::pipeline::{AnswerStream, RagPipeline, TurnState};
pub use crate::retriever::Retriever;
