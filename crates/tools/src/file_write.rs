//! file_write — create or overwrite a file, parent directories included.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel, SideEffectRecord,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "file_write",
        "Write content to a file. Creates the file and any missing parent directories; \
         overwrites unless 'append' is true.",
        ActionCategory::FileSystem,
        RiskLevel::Medium,
        PermissionTier::Operator,
    )
    .with_parameters(vec![
        ParamSpec::new("path", ParamType::String, "Path of the file to write"),
        ParamSpec::new("content", ParamType::String, "Content to write"),
        ParamSpec::optional(
            "append",
            ParamType::Boolean,
            "Append instead of overwriting",
        )
        .with_default(json!(false)),
    ])
    .with_confirmation()
}

pub struct FileWriteHandler {
    policy: PathPolicy,
}

impl FileWriteHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for FileWriteHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'content' argument".into()))?;
        let append = arguments["append"].as_bool().unwrap_or(false);

        let resolved = self.policy.check(path)?;
        let existed = resolved.exists();

        if let Some(parent) = resolved.parent()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ActionError::Handler(format!("Failed to create directory: {e}")))?;
        }

        let written = if append {
            let mut existing = tokio::fs::read(&resolved).await.unwrap_or_default();
            existing.extend_from_slice(content.as_bytes());
            tokio::fs::write(&resolved, existing).await
        } else {
            tokio::fs::write(&resolved, content).await
        };
        written.map_err(|e| ActionError::Handler(format!("Failed to write file: {e}")))?;

        let kind = if existed { "file-modified" } else { "file-created" };
        let report = HandlerReport::new(json!({
            "path": resolved.to_string_lossy(),
            "bytes_written": content.len(),
            "appended": append,
        }))
        .with_side_effect(SideEffectRecord::new(kind, resolved.to_string_lossy()));
        Ok(report.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_shape() {
        let desc = descriptor();
        assert_eq!(desc.name, "file_write");
        assert_eq!(desc.tier, PermissionTier::Operator);
        assert!(desc.requires_confirmation);
        assert!(desc.param("append").is_some_and(|p| !p.required));
    }

    #[tokio::test]
    async fn writes_and_reports_side_effect() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("output.txt");

        let handler = FileWriteHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({
                "path": file_path.to_str().unwrap(),
                "content": "Hello from test!",
            }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                assert_eq!(report.side_effects.len(), 1);
                assert_eq!(report.side_effects[0].kind, "file-created");
            }
            other => panic!("expected report, got {other:?}"),
        }
        let content = std::fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "Hello from test!");
    }

    #[tokio::test]
    async fn creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("nested").join("deep").join("file.txt");

        let handler = FileWriteHandler::new(PathPolicy::unrestricted());
        handler
            .run(json!({
                "path": file_path.to_str().unwrap(),
                "content": "nested content",
            }))
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&file_path).unwrap(),
            "nested content"
        );
    }

    #[tokio::test]
    async fn append_extends_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("log.txt");
        std::fs::write(&file_path, "first\n").unwrap();

        let handler = FileWriteHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({
                "path": file_path.to_str().unwrap(),
                "content": "second\n",
                "append": true,
            }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                assert_eq!(report.side_effects[0].kind, "file-modified");
            }
            other => panic!("expected report, got {other:?}"),
        }
        assert_eq!(
            std::fs::read_to_string(&file_path).unwrap(),
            "first\nsecond\n"
        );
    }

    #[tokio::test]
    async fn missing_content_argument() {
        let handler = FileWriteHandler::new(PathPolicy::unrestricted());
        let result = handler.run(json!({ "path": "/tmp/x.txt" })).await;
        assert!(matches!(result, Err(ActionError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn traversal_blocked() {
        let handler = FileWriteHandler::new(PathPolicy::new(vec!["/srv/work".into()], vec![]));
        let result = handler
            .run(json!({ "path": "../../../etc/crontab", "content": "x" }))
            .await;
        assert!(matches!(result, Err(ActionError::Blocked(_))));
    }
}
