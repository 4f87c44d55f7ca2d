//! Deterministic gateway doubles for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::errors::RagError;
use crate::gateway::{ChatGateway, ChatRequest, EmbeddingGateway};

/// Embeds text as a normalized letter-frequency vector. Crude, but similar
/// texts land near each other, which is all the tests need, and the output
/// is fully deterministic.
pub(crate) struct LetterFrequencyEmbedder {
    calls: AtomicUsize,
    last_inputs: Mutex<Vec<String>>,
}

impl LetterFrequencyEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            last_inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Inputs of the most recent `embed` call.
    pub fn last_inputs(&self) -> Vec<String> {
        self.last_inputs.lock().unwrap().clone()
    }

    pub fn embed_one(text: &str) -> Vec<f32> {
        let mut v = [0f32; 26];
        for c in text.to_lowercase().chars() {
            if c.is_ascii_lowercase() {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v.to_vec()
    }
}

#[async_trait]
impl EmbeddingGateway for LetterFrequencyEmbedder {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_inputs.lock().unwrap() = inputs.to_vec();
        Ok(inputs.iter().map(|s| Self::embed_one(s)).collect())
    }
}

/// Scripted chat gateway: a canned completion, canned stream fragments, an
/// optional mid-stream failure, and call counters.
pub(crate) struct ScriptedChatGateway {
    completion: String,
    fragments: Vec<String>,
    fail_after: Option<usize>,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedChatGateway {
    pub fn new(completion: impl Into<String>, fragments: Vec<&str>) -> Self {
        Self {
            completion: completion.into(),
            fragments: fragments.into_iter().map(str::to_string).collect(),
            fail_after: None,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail the stream after `n` fragments have been delivered.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Request of the most recent `complete` or `complete_stream` call.
    pub fn last_request(&self) -> Option<ChatRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatGateway for ScriptedChatGateway {
    async fn complete(&self, request: ChatRequest) -> Result<String, RagError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        Ok(self.completion.clone())
    }

    async fn complete_stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);

        let (tx, rx) = mpsc::channel(8);
        let fragments = self.fragments.clone();
        let fail_after = self.fail_after;

        tokio::spawn(async move {
            for (idx, fragment) in fragments.into_iter().enumerate() {
                if fail_after == Some(idx) {
                    let _ = tx
                        .send(Err(RagError::ChatGateway("stream interrupted".to_string())))
                        .await;
                    return;
                }
                if tx.send(Ok(fragment)).await.is_err() {
                    return;
                }
            }
        });

        Ok(rx)
    }
}
