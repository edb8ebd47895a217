//! Model gateway trait — the abstraction over the upstream language model.
//!
//! A gateway owns transport and prompt assembly: the controller hands over
//! the visible message window plus the enabled action schemas and gets back
//! plain text. Failures keep their kind (timeout vs unavailable vs
//! protocol) so the controller can phrase its terminal message.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::action::ActionSchema;
use crate::error::GatewayError;
use crate::message::Message;

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminationReason {
    /// Natural end of the reply.
    Stop,
    /// Output limit hit; the reply may be cut mid-thought.
    Length,
    Other,
}

impl TerminationReason {
    /// Map an OpenAI-style `finish_reason` string.
    pub fn from_api(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "length" => Self::Length,
            _ => Self::Other,
        }
    }
}

/// A complete reply from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReply {
    pub text: String,
    pub termination: TerminationReason,
}

/// One chunk of a streaming reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyChunk {
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub done: bool,

    /// Present on the final chunk when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationReason>,
}

/// The model gateway contract.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// A human-readable name for this gateway (e.g. "ollama").
    fn name(&self) -> &str;

    /// Send the message window and get a complete reply.
    async fn send(
        &self,
        messages: &[Message],
        schemas: &[ActionSchema],
    ) -> Result<ModelReply, GatewayError>;

    /// Send the message window and get a stream of reply chunks.
    ///
    /// Default implementation calls `send` and wraps the reply as a single
    /// final chunk, so scripted test gateways only implement `send`.
    async fn send_streaming(
        &self,
        messages: &[Message],
        schemas: &[ActionSchema],
    ) -> Result<mpsc::Receiver<Result<ReplyChunk, GatewayError>>, GatewayError> {
        let reply = self.send(messages, schemas).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx
            .send(Ok(ReplyChunk {
                text: reply.text,
                done: true,
                termination: Some(reply.termination),
            }))
            .await;
        Ok(rx)
    }

    /// Can we reach the model service?
    async fn health_check(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

impl fmt::Debug for dyn ModelGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelGateway")
            .field("name", &self.name())
            .finish()
    }
}
