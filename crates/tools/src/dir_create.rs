//! dir_create — recursive directory creation.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel, SideEffectRecord,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "dir_create",
        "Create a directory, including any missing parents. Succeeds if it already exists.",
        ActionCategory::FileSystem,
        RiskLevel::Low,
        PermissionTier::Operator,
    )
    .with_parameters(vec![ParamSpec::new(
        "path",
        ParamType::String,
        "Directory to create",
    )])
}

pub struct DirCreateHandler {
    policy: PathPolicy,
}

impl DirCreateHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for DirCreateHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.policy.check(path)?;
        let existed = resolved.is_dir();

        tokio::fs::create_dir_all(&resolved)
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to create directory: {e}")))?;

        let mut report = HandlerReport::new(json!({
            "path": resolved.to_string_lossy(),
            "already_existed": existed,
        }));
        if !existed {
            report = report.with_side_effect(SideEffectRecord::new(
                "dir-created",
                resolved.to_string_lossy(),
            ));
        }
        Ok(report.into())
    }
}
