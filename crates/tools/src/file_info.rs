//! file_info — metadata lookup without reading contents.

use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, ParamSpec,
    ParamType, PermissionTier, RiskLevel,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "file_info",
        "Look up metadata for a file or directory: kind, size, timestamps.",
        ActionCategory::FileSystem,
        RiskLevel::Low,
        PermissionTier::Observer,
    )
    .with_parameters(vec![ParamSpec::new(
        "path",
        ParamType::String,
        "Path to inspect",
    )])
}

pub struct FileInfoHandler {
    policy: PathPolicy,
}

impl FileInfoHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for FileInfoHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.policy.check(path)?;
        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to inspect path: {e}")))?;

        let kind = if metadata.is_dir() { "directory" } else { "file" };
        let modified_epoch_secs = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs());

        Ok(json!({
            "path": resolved.to_string_lossy(),
            "kind": kind,
            "size_bytes": metadata.len(),
            "readonly": metadata.permissions().readonly(),
            "modified_epoch_secs": modified_epoch_secs,
        })
        .into())
    }
}
