//! OpenAI-compatible chat gateway.
//!
//! Works with Ollama, OpenAI, vLLM, llama.cpp, and any other service that
//! exposes a `/v1/chat/completions` endpoint. Action schemas travel inside
//! the system prompt rather than the `tools` field, so the same gateway
//! serves models with no function-calling support at all.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use deskpilot_core::{
    ActionSchema, GatewayError, Message, ModelGateway, ModelReply, ReplyChunk, Role,
    TerminationReason,
};

use crate::prompt::build_system_prompt;

/// A gateway speaking the OpenAI-compatible chat API.
pub struct OpenAiCompatGateway {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatGateway {
    /// Create a gateway for an arbitrary OpenAI-compatible endpoint.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
            request_timeout: Duration::from_secs(120),
            client,
        }
    }

    /// Create an Ollama gateway (convenience constructor). No key needed.
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            model,
        )
    }

    /// Create an OpenAI gateway (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", model).with_api_key(api_key)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// HTTP timeout for one request. Rebuilds the underlying client.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        self
    }

    /// List models the service advertises. Used by diagnostics; a service
    /// without a `/models` endpoint just yields an empty list.
    pub async fn list_models(&self) -> Result<Vec<String>, GatewayError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        let models = body["data"]
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|m| m["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        Ok(models)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    fn classify_transport(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.request_timeout.as_secs())
        } else if err.is_connect() {
            GatewayError::Unavailable(err.to_string())
        } else {
            GatewayError::Network(err.to_string())
        }
    }

    fn request_body(
        &self,
        messages: &[Message],
        schemas: &[ActionSchema],
        stream: bool,
    ) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": to_api_messages(messages, schemas),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }
}

#[async_trait]
impl ModelGateway for OpenAiCompatGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(
        &self,
        messages: &[Message],
        schemas: &[ActionSchema],
    ) -> Result<ModelReply, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            gateway = %self.name,
            model = %self.model,
            messages = messages.len(),
            actions = schemas.len(),
            "sending completion request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&self.request_body(messages, schemas, false))
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let response = check_status(response).await?;
        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(format!("failed to decode response: {e}")))?;

        reply_from_response(api_response)
    }

    async fn send_streaming(
        &self,
        messages: &[Message],
        schemas: &[ActionSchema],
    ) -> Result<mpsc::Receiver<Result<ReplyChunk, GatewayError>>, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            gateway = %self.name,
            model = %self.model,
            messages = messages.len(),
            "sending streaming request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&self.request_body(messages, schemas, true))
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let response = check_status(response).await?;

        let (tx, rx) = mpsc::channel(64);

        // Read the SSE byte stream line by line and forward text deltas.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut termination: Option<TerminationReason> = None;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(GatewayError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    // Skip blank lines and SSE comments.
                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        let _ = tx
                            .send(Ok(ReplyChunk {
                                text: String::new(),
                                done: true,
                                termination,
                            }))
                            .await;
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(parsed) => {
                            if let Some(choice) = parsed.choices.first() {
                                if let Some(reason) = &choice.finish_reason {
                                    termination = Some(TerminationReason::from_api(reason));
                                }
                                if let Some(content) = &choice.delta.content {
                                    if !content.is_empty() {
                                        let chunk = ReplyChunk {
                                            text: content.clone(),
                                            done: false,
                                            termination: None,
                                        };
                                        if tx.send(Ok(chunk)).await.is_err() {
                                            return; // receiver dropped
                                        }
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            trace!(data = %data, error = %e, "ignoring unparseable SSE chunk");
                        }
                    }
                }
            }

            // Stream ended without [DONE]; close out what we have.
            let _ = tx
                .send(Ok(ReplyChunk {
                    text: String::new(),
                    done: true,
                    termination,
                }))
                .await;
        });

        Ok(rx)
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GatewayError::Api {
                status: response.status().as_u16(),
                message: "health check failed".into(),
            })
        }
    }
}

/// Prepend the synthesized system prompt, then map the window.
fn to_api_messages(messages: &[Message], schemas: &[ActionSchema]) -> Vec<ApiMessage> {
    let mut api = Vec::with_capacity(messages.len() + 1);
    api.push(ApiMessage {
        role: "system".into(),
        content: build_system_prompt(schemas),
    });
    for message in messages {
        api.push(ApiMessage {
            role: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            }
            .into(),
            content: message.content.clone(),
        });
    }
    api
}

fn reply_from_response(response: ChatResponse) -> Result<ModelReply, GatewayError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Malformed("no choices in response".into()))?;

    let termination = choice
        .finish_reason
        .as_deref()
        .map(TerminationReason::from_api)
        .unwrap_or(TerminationReason::Other);

    Ok(ModelReply {
        text: choice.message.content.unwrap_or_default(),
        termination,
    })
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!(status = code, body = %body, "model API returned an error");

    // Rate limiting and server faults are transient; everything else is a
    // request-level problem worth surfacing with its status.
    if code == 429 || status.is_server_error() {
        Err(GatewayError::Unavailable(format!("status {code}: {body}")))
    } else {
        Err(GatewayError::Api {
            status: code,
            message: body,
        })
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}
