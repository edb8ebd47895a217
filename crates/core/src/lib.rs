//! # Deskpilot Core
//!
//! Domain types, traits, and error definitions for the Deskpilot automation
//! agent — the trust boundary between a free-text-generating model and the
//! host machine. This crate defines the domain model that every other crate
//! implements against.
//!
//! ## Design Philosophy
//!
//! External collaborators (the model gateway, action handlers, the approval
//! prompt) are traits here; implementations live in their own crates and
//! are injected at construction time. There are no process-wide globals:
//! build a [`ToolCatalog`] once, share it behind an `Arc`, and pass it in.

pub mod action;
pub mod approval;
pub mod catalog;
pub mod error;
pub mod event;
pub mod gateway;
pub mod message;

// Re-export key types at crate root for ergonomics
pub use action::{
    ActionCategory, ActionDescriptor, ActionHandler, ActionRequest, ActionResult, ActionSchema,
    ExecutionStatus, HandlerOutcome, HandlerReport, ParamSpec, ParamType, PermissionTier,
    RiskLevel, SideEffectRecord,
};
pub use approval::{ApprovalDecider, DenyAll};
pub use catalog::{RegisteredAction, ToolCatalog};
pub use error::{ActionError, Error, GatewayError, Result};
pub use event::{AgentEvent, EventBus};
pub use gateway::{ModelGateway, ModelReply, ReplyChunk, TerminationReason};
pub use message::{Conversation, ConversationId, Message, Role};
