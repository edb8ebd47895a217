//! file_move — rename or relocate a file.
//!
//! The side-effect record carries a rollback invocation (move back) so an
//! owning collaborator can undo the relocation later.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel, SideEffectRecord,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "file_move",
        "Move or rename a file. Missing parent directories are created.",
        ActionCategory::FileSystem,
        RiskLevel::Medium,
        PermissionTier::Operator,
    )
    .with_parameters(vec![
        ParamSpec::new("source", ParamType::String, "Current path of the file"),
        ParamSpec::new("destination", ParamType::String, "New path of the file"),
    ])
    .with_confirmation()
}

pub struct FileMoveHandler {
    policy: PathPolicy,
}

impl FileMoveHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for FileMoveHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let source = arguments["source"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'source' argument".into()))?;
        let destination = arguments["destination"].as_str().ok_or_else(|| {
            ActionError::InvalidArguments("Missing 'destination' argument".into())
        })?;

        let from = self.policy.check(source)?;
        let to = self.policy.check(destination)?;

        if let Some(parent) = to.parent()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ActionError::Handler(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to move file: {e}")))?;

        let rollback = json!({
            "action": "file_move",
            "arguments": { "source": to.to_string_lossy(), "destination": from.to_string_lossy() },
        });
        let report = HandlerReport::new(json!({
            "source": from.to_string_lossy(),
            "destination": to.to_string_lossy(),
        }))
        .with_side_effect(
            SideEffectRecord::new("file-moved", to.to_string_lossy()).with_rollback(rollback),
        );
        Ok(report.into())
    }
}
