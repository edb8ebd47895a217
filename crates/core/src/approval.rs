//! Approval collaborator — the human (or policy) gate for flagged actions.

use async_trait::async_trait;
use tracing::warn;

use crate::action::ActionRequest;

/// Decides whether a confirmation-required action may proceed.
///
/// Invoked at most once per confirmation-required result. The controller
/// awaits the answer before doing anything else in the turn, so a blocking
/// UI prompt behind an async adapter is fine.
#[async_trait]
pub trait ApprovalDecider: Send + Sync {
    async fn approve(&self, request: &ActionRequest) -> bool;
}

/// Fail-safe default when no collaborator is wired up: deny everything.
pub struct DenyAll;

#[async_trait]
impl ApprovalDecider for DenyAll {
    async fn approve(&self, request: &ActionRequest) -> bool {
        warn!(action = %request.action, "No approval collaborator configured; denying");
        false
    }
}
