//! file_copy — copy a file inside the policy boundary.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel, SideEffectRecord,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "file_copy",
        "Copy a file to a new location. Missing parent directories are created.",
        ActionCategory::FileSystem,
        RiskLevel::Medium,
        PermissionTier::Operator,
    )
    .with_parameters(vec![
        ParamSpec::new("source", ParamType::String, "Path of the file to copy"),
        ParamSpec::new("destination", ParamType::String, "Path of the copy"),
    ])
}

pub struct FileCopyHandler {
    policy: PathPolicy,
}

impl FileCopyHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for FileCopyHandler {
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

        let bytes = tokio::fs::copy(&from, &to)
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to copy file: {e}")))?;

        let report = HandlerReport::new(json!({
            "source": from.to_string_lossy(),
            "destination": to.to_string_lossy(),
            "bytes": bytes,
        }))
        .with_side_effect(SideEffectRecord::new("file-created", to.to_string_lossy()));
        Ok(report.into())
    }
}
