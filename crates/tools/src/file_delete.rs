//! file_delete — remove a file or an empty directory.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel, SideEffectRecord,
};
use serde_json::{Value, json};
use tracing::warn;

use crate::policy::PathPolicy;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "file_delete",
        "Delete a file or an empty directory. Refuses non-empty directories.",
        ActionCategory::FileSystem,
        RiskLevel::High,
        PermissionTier::Operator,
    )
    .with_parameters(vec![ParamSpec::new(
        "path",
        ParamType::String,
        "Path of the file or empty directory to delete",
    )])
    .with_confirmation()
}

pub struct FileDeleteHandler {
    policy: PathPolicy,
}

impl FileDeleteHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for FileDeleteHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.policy.check(path)?;

        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to inspect path: {e}")))?;

        if metadata.is_dir() {
            // remove_dir fails on non-empty directories, which is the point.
            tokio::fs::remove_dir(&resolved)
                .await
                .map_err(|e| ActionError::Handler(format!("Failed to delete directory: {e}")))?;
        } else {
            tokio::fs::remove_file(&resolved)
                .await
                .map_err(|e| ActionError::Handler(format!("Failed to delete file: {e}")))?;
        }

        warn!(path = %resolved.display(), "Deleted");
        let report = HandlerReport::new(json!({
            "path": resolved.to_string_lossy(),
            "was_directory": metadata.is_dir(),
        }))
        .with_side_effect(SideEffectRecord::new(
            "file-deleted",
            resolved.to_string_lossy(),
        ));
        Ok(report.into())
    }
}
