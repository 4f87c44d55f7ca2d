//! OpenAI-compatible HTTP gateway.
//!
//! Speaks the `/v1/chat/completions` and `/v1/embeddings` wire shape shared
//! by OpenAI, LM Studio, Ollama and similar servers. Which provider sits
//! behind the base URL is the caller's concern.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{ChatGateway, ChatRequest, EmbeddingGateway};
use crate::core::config::GatewaySettings;
use crate::core::errors::RagError;

#[derive(Clone)]
pub struct OpenAiCompatGateway {
    base_url: String,
    chat_model: String,
    embedding_model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatGateway {
    pub fn new(settings: &GatewaySettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            api_key: settings.api_key.clone(),
            client: Client::new(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    fn chat_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.chat_model,
            "messages": request.messages,
            "stream": stream,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = &request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        body
    }
}

#[async_trait]
impl ChatGateway for OpenAiCompatGateway {
    async fn complete(&self, request: ChatRequest) -> Result<String, RagError> {
        let res = self
            .post("/v1/chat/completions")
            .json(&self.chat_body(&request, false))
            .send()
            .await
            .map_err(RagError::chat)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::ChatGateway(format!(
                "completion failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(RagError::chat)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }

    async fn complete_stream(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<String, RagError>>, RagError> {
        let res = self
            .post("/v1/chat/completions")
            .json(&self.chat_body(&request, true))
            .send()
            .await
            .map_err(RagError::chat)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::ChatGateway(format!(
                "stream failed ({status}): {text}"
            )));
        }

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        let chunk_str = String::from_utf8_lossy(&bytes);
                        for line in chunk_str.lines() {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            if line == "data: [DONE]" {
                                return;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                if let Ok(json) = serde_json::from_str::<Value>(data) {
                                    if let Some(content) =
                                        json["choices"][0]["delta"]["content"].as_str()
                                    {
                                        if !content.is_empty()
                                            && tx.send(Ok(content.to_string())).await.is_err()
                                        {
                                            return;
                                        }
                                    }
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(RagError::chat(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiCompatGateway {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let body = json!({
            "model": self.embedding_model,
            "input": inputs,
        });

        let res = self
            .post("/v1/embeddings")
            .json(&body)
            .send()
            .await
            .map_err(RagError::embedding)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingGateway(format!(
                "embedding failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(RagError::embedding)?;
        let mut embeddings = Vec::new();
        if let Some(data) = payload["data"].as_array() {
            for item in data {
                if let Some(vals) = item["embedding"].as_array() {
                    embeddings.push(
                        vals.iter()
                            .filter_map(|v| v.as_f64().map(|f| f as f32))
                            .collect(),
                    );
                }
            }
        }

        if embeddings.len() != inputs.len() {
            return Err(RagError::EmbeddingGateway(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}
