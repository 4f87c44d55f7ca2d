//! History-aware query rewriting.

use std::sync::Arc;

use crate::core::errors::RagError;
use crate::gateway::{ChatGateway, ChatMessage, ChatRequest};
use crate::memory::{Role, Turn};

const REWRITE_INSTRUCTION: &str =
    "Rewrite the user query to be self-contained using the chat history. Do not answer.";

pub struct QueryRewriter {
    chat: Arc<dyn ChatGateway>,
}

impl QueryRewriter {
    pub fn new(chat: Arc<dyn ChatGateway>) -> Self {
        Self { chat }
    }

    /// Restate `utterance` so it can stand alone as a search query.
    ///
    /// Retrieval quality collapses on anaphoric follow-ups ("what is its
    /// population"), so referents are resolved against `history` before
    /// the query reaches the index. With no history there is nothing to
    /// resolve and the utterance passes through unchanged.
    pub async fn rewrite(&self, history: &[Turn], utterance: &str) -> Result<String, RagError> {
        if history.is_empty() {
            return Ok(utterance.to_string());
        }

        let mut messages = vec![ChatMessage::system(REWRITE_INSTRUCTION)];
        messages.extend(history.iter().map(turn_to_message));
        messages.push(ChatMessage::user(utterance));

        let response = self.chat.complete(ChatRequest::new(messages)).await?;
        let rewritten = response.trim();

        if rewritten.is_empty() {
            Ok(utterance.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}

pub(crate) fn turn_to_message(turn: &Turn) -> ChatMessage {
    match turn.role {
        Role::Human => ChatMessage::user(turn.content.as_str()),
        Role::Ai => ChatMessage::assistant(turn.content.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedChatGateway;

    #[tokio::test]
    async fn empty_history_passes_the_utterance_through_without_a_call() {
        let gateway = Arc::new(ScriptedChatGateway::new("unused", vec![]));
        let rewriter = QueryRewriter::new(gateway.clone());

        let query = rewriter
            .rewrite(&[], "What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(query, "What is the capital of France?");
        assert_eq!(gateway.complete_calls(), 0);
    }

    #[tokio::test]
    async fn history_is_sent_alongside_the_follow_up() {
        let gateway = Arc::new(ScriptedChatGateway::new(
            "What is the population of Paris?",
            vec![],
        ));
        let rewriter = QueryRewriter::new(gateway.clone());

        let history = vec![
            Turn {
                role: Role::Human,
                content: "What is the capital of France?".to_string(),
            },
            Turn {
                role: Role::Ai,
                content: "Paris.".to_string(),
            },
        ];

        let query = rewriter.rewrite(&history, "what is its population").await.unwrap();
        assert_eq!(query, "What is the population of Paris?");
        assert!(query.contains("Paris") && query.contains("population"));

        let request = gateway.last_request().unwrap();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.contains("Do not answer"));
        assert_eq!(request.messages[1].role, "user");
        assert_eq!(request.messages[2].role, "assistant");
        assert_eq!(request.messages[2].content, "Paris.");
        assert_eq!(request.messages[3].content, "what is its population");
    }

    #[tokio::test]
    async fn blank_completion_falls_back_to_the_utterance() {
        let gateway = Arc::new(ScriptedChatGateway::new("  \n", vec![]));
        let rewriter = QueryRewriter::new(gateway);

        let history = vec![Turn {
            role: Role::Human,
            content: "earlier".to_string(),
        }];
        let query = rewriter.rewrite(&history, "original question").await.unwrap();
        assert_eq!(query, "original question");
    }
}
