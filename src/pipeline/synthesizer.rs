//! Grounded answer synthesis.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::chunker::TextChunk;
use crate::core::errors::RagError;
use crate::gateway::{ChatGateway, ChatMessage, ChatRequest};
use crate::memory::Turn;

use super::rewriter::turn_to_message;

const ANSWER_INSTRUCTION: &str =
    "Use the provided context to answer. If unsure, say you don't know.";

pub struct AnswerSynthesizer {
    chat: Arc<dyn ChatGateway>,
}

impl AnswerSynthesizer {
    pub fn new(chat: Arc<dyn ChatGateway>) -> Self {
        Self { chat }
    }

    /// Stream a grounded answer for `query` over the retrieved passages.
    ///
    /// The grounding instruction is a content contract with the remote
    /// model — best effort, not locally enforced. Each call produces one
    /// fresh, finite stream.
    pub async fn synthesize(
        &self,
        retrieved: &[TextChunk],
        history: &[Turn],
        query: &str,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
        let mut messages = vec![ChatMessage::system(grounding_prompt(retrieved))];
        messages.extend(history.iter().map(turn_to_message));
        messages.push(ChatMessage::user(query));

        let mut upstream = self.chat.complete_stream(ChatRequest::new(messages)).await?;

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            while let Some(fragment) = upstream.recv().await {
                let item = fragment.map(|text| scrub(&text));
                if tx.send(item).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}

fn grounding_prompt(retrieved: &[TextChunk]) -> String {
    let mut prompt = String::from(ANSWER_INSTRUCTION);
    prompt.push_str("\n\nContext:\n");
    for chunk in retrieved {
        prompt.push_str(&chunk.text);
        prompt.push_str("\n\n");
    }
    prompt.trim_end().to_string()
}

/// Stateless per-fragment cleanup applied to model output.
fn scrub(fragment: &str) -> String {
    fragment.replace('$', "S")
}
