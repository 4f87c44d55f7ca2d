//! Per-turn orchestration.
//!
//! Composes rewrite → retrieve → synthesize for each user utterance and
//! owns the conversation log. A turn's answer is streamed; the utterance
//! and the complete answer are committed to memory together only when the
//! stream finishes cleanly. A failed or abandoned stream leaves memory
//! untouched.

pub mod rewriter;
pub mod synthesizer;

pub use rewriter::QueryRewriter;
pub use synthesizer::AnswerSynthesizer;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::chunker::Chunker;
use crate::core::config::RagSettings;
use crate::core::errors::RagError;
use crate::document::Document;
use crate::gateway::{ChatGateway, EmbeddingGateway};
use crate::index::{SqliteVectorStore, VectorIndex};
use crate::memory::{ConversationMemory, Role};
use crate::retriever::Retriever;

/// Where the current turn stands. `Idle` between turns; `Committed` and
/// `Failed` are the terminal states of the previous turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Rewriting,
    Retrieving,
    Synthesizing,
    Committed,
    Failed,
}

pub struct RagPipeline {
    rewriter: QueryRewriter,
    synthesizer: AnswerSynthesizer,
    retriever: Retriever,
    memory: ConversationMemory,
    state: TurnState,
}

impl RagPipeline {
    pub fn new(chat: Arc<dyn ChatGateway>, retriever: Retriever) -> Self {
        Self {
            rewriter: QueryRewriter::new(chat.clone()),
            synthesizer: AnswerSynthesizer::new(chat),
            retriever,
            memory: ConversationMemory::new(),
            state: TurnState::Idle,
        }
    }

    /// Wire a pipeline for one document: chunk it, build (or load) the
    /// collection derived from its source type, and point a retriever at
    /// it. An empty document loads the existing collection instead of
    /// rebuilding.
    pub async fn for_document(
        document: Document,
        settings: &RagSettings,
        chat: Arc<dyn ChatGateway>,
        embedder: Arc<dyn EmbeddingGateway>,
    ) -> Result<Self, RagError> {
        settings.validate()?;

        let chunks =
            Chunker::new(settings.chunk_size, settings.chunk_overlap).split(&document);
        let collection = document.collection_name();

        let store = Arc::new(SqliteVectorStore::open(&settings.persist_dir).await?);
        let mut index = VectorIndex::new(store, embedder, settings.rebuild);
        index.build_or_load(chunks, &collection).await?;
        let retriever = index.as_retriever(settings.retrieval_k, settings.mmr_lambda)?;

        Ok(Self::new(chat, retriever))
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Clear the conversation log.
    pub fn reset_memory(&mut self) {
        self.memory.reset();
    }

    /// Run one turn. The returned stream borrows the pipeline mutably, so
    /// a new turn cannot start until this one is consumed or dropped.
    pub async fn ask(&mut self, utterance: &str) -> Result<AnswerStream<'_>, RagError> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        // Turns committed strictly before this one; the in-flight turn is
        // invisible to its own rewrite and synthesis.
        let history = self.memory.snapshot();

        self.state = TurnState::Rewriting;
        let query = match self.rewriter.rewrite(&history, utterance).await {
            Ok(query) => query,
            Err(err) => return Err(self.fail(err)),
        };
        tracing::debug!(%query, "query rewritten");

        self.state = TurnState::Retrieving;
        let retrieved = match self.retriever.search(&query).await {
            Ok(retrieved) => retrieved,
            Err(err) => return Err(self.fail(err)),
        };
        tracing::debug!(passages = retrieved.len(), "passages retrieved");

        self.state = TurnState::Synthesizing;
        let fragments = match self.synthesizer.synthesize(&retrieved, &history, &query).await {
            Ok(fragments) => fragments,
            Err(err) => return Err(self.fail(err)),
        };

        Ok(AnswerStream {
            fragments,
            utterance: utterance.to_string(),
            answer: String::new(),
            finished: false,
            pipeline: self,
        })
    }

    fn fail(&mut self, err: RagError) -> RagError {
        tracing::warn!(error = %err, "turn failed");
        self.state = TurnState::Failed;
        err
    }
}

/// A turn's answer, produced fragment by fragment.
///
/// Consuming the stream to completion commits the turn: the user utterance
/// and the full answer are appended to memory together. An error fragment
/// or an early drop abandons the turn and memory stays as it was.
pub struct AnswerStream<'a> {
    pipeline: &'a mut RagPipeline,
    fragments: mpsc::Receiver<Result<String, RagError>>,
    utterance: String,
    answer: String,
    finished: bool,
}

impl AnswerStream<'_> {
    /// Next answer fragment; `None` once the stream is exhausted. The turn
    /// is committed at that point.
    pub async fn next(&mut self) -> Option<Result<String, RagError>> {
        if self.finished {
            return None;
        }

        match self.fragments.recv().await {
            Some(Ok(fragment)) => {
                self.answer.push_str(&fragment);
                Some(Ok(fragment))
            }
            Some(Err(err)) => {
                self.finished = true;
                self.pipeline.state = TurnState::Failed;
                tracing::warn!(error = %err, "answer stream failed");
                Some(Err(err))
            }
            None => {
                self.finished = true;
                self.commit();
                None
            }
        }
    }

    /// Drain the stream and return the complete answer.
    pub async fn collect(mut self) -> Result<String, RagError> {
        while let Some(fragment) = self.next().await {
            fragment?;
        }
        Ok(std::mem::take(&mut self.answer))
    }

    fn commit(&mut self) {
        self.pipeline
            .memory
            .append(Role::Human, self.utterance.clone());
        self.pipeline.memory.append(Role::Ai, self.answer.clone());
        self.pipeline.state = TurnState::Committed;
        tracing::debug!(turns = self.pipeline.memory.len(), "turn committed");
    }
}

impl Drop for AnswerStream<'_> {
    fn drop(&mut self) {
        // Abandoned mid-stream: nothing was committed and the next turn
        // starts from a clean slate.
        if !self.finished {
            self.pipeline.state = TurnState::Idle;
        }
    }
}
