//! Error types for the Deskpilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the runtime maps
//! `ActionError` variants onto result statuses, the controller maps
//! `GatewayError` variants onto terminal user-facing text.

use thiserror::Error;

use crate::action::PermissionTier;

/// The top-level error type for all Deskpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Gateway errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- I/O ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures from the model gateway. The kinds are deliberately coarse but
/// distinguishable: the controller phrases its terminal message differently
/// for a timeout than for an unreachable service.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Model request timed out after {0}s")]
    Timeout(u64),

    #[error("Model service unavailable: {0}")]
    Unavailable(String),

    #[error("Model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed model response: {0}")]
    Malformed(String),

    #[error("Gateway not configured: {0}")]
    NotConfigured(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures around action validation and execution.
///
/// The first six arise before a handler runs (catalog and validation
/// checks); the rest classify what happened once it did.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Duplicate action name: {0}")]
    DuplicateName(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Action is disabled: {0}")]
    Disabled(String),

    #[error("Action '{action}' requires {required} tier (session tier is {granted})")]
    PermissionDenied {
        action: String,
        required: PermissionTier,
        granted: PermissionTier,
    },

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid type for {parameter}: expected {expected}, got {actual}")]
    InvalidParameterType {
        parameter: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Blocked by policy: {0}")]
    Blocked(String),

    /// Free-form handler fault; the message reaches the result verbatim.
    #[error("{0}")]
    Handler(String),

    #[error("Action '{action}' timed out after {timeout_secs}s")]
    Timeout { action: String, timeout_secs: u64 },

    #[error("Action '{action}' panicked: {detail}")]
    Panicked { action: String, detail: String },

    #[error("Worker pool unavailable: {0}")]
    Pool(String),
}
