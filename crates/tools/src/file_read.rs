//! file_read — bounded file read with path validation.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

/// Read at most this many bytes unless the caller raises the bound.
pub const DEFAULT_MAX_BYTES: usize = 256 * 1024;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "file_read",
        "Read the contents of a text file. Large files are truncated.",
        ActionCategory::FileSystem,
        RiskLevel::Low,
        PermissionTier::Observer,
    )
    .with_parameters(vec![ParamSpec::new(
        "path",
        ParamType::String,
        "Path of the file to read",
    )])
}

pub struct FileReadHandler {
    policy: PathPolicy,
    max_bytes: usize,
}

impl FileReadHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self {
            policy,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl ActionHandler for FileReadHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.policy.check(path)?;

        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to read file: {e}")))?;

        let truncated = bytes.len() > self.max_bytes;
        let slice = if truncated {
            &bytes[..self.max_bytes]
        } else {
            &bytes[..]
        };
        let content = String::from_utf8_lossy(slice).into_owned();

        let mut report = HandlerReport::new(json!({
            "path": resolved.to_string_lossy(),
            "bytes": bytes.len(),
            "content": content,
        }));
        if truncated {
            report = report.with_warning(format!(
                "Content truncated to {} of {} bytes",
                self.max_bytes,
                bytes.len()
            ));
        }
        Ok(report.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn descriptor_shape() {
        let desc = descriptor();
        assert_eq!(desc.name, "file_read");
        assert_eq!(desc.tier, PermissionTier::Observer);
        assert!(!desc.requires_confirmation);
        assert!(desc.param("path").is_some_and(|p| p.required));
    }

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        let mut file = std::fs::File::create(&file_path).unwrap();
        writeln!(file, "Hello, World!").unwrap();

        let handler = FileReadHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({ "path": file_path.to_str().unwrap() }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                assert!(
                    report.payload["content"]
                        .as_str()
                        .unwrap()
                        .contains("Hello, World!")
                );
                assert!(report.warnings.is_empty());
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_file_truncates_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("big.txt");
        std::fs::write(&file_path, "a".repeat(64)).unwrap();

        let handler = FileReadHandler::new(PathPolicy::unrestricted()).with_max_bytes(16);
        let outcome = handler
            .run(json!({ "path": file_path.to_str().unwrap() }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                assert_eq!(report.payload["content"].as_str().unwrap().len(), 16);
                assert_eq!(report.payload["bytes"], 64);
                assert_eq!(report.warnings.len(), 1);
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nonexistent_file_is_handler_error() {
        let handler = FileReadHandler::new(PathPolicy::unrestricted());
        let result = handler
            .run(json!({ "path": "/definitely/not/here.txt" }))
            .await;
        match result {
            Err(ActionError::Handler(msg)) => assert!(msg.starts_with("Failed to read file:")),
            other => panic!("expected handler error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let handler = FileReadHandler::new(PathPolicy::unrestricted());
        let result = handler.run(json!({})).await;
        assert!(matches!(result, Err(ActionError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn protected_path_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("shadow");
        std::fs::write(&file_path, "secret").unwrap();

        let policy = PathPolicy::new(vec![], vec![dir.path().to_str().unwrap().into()]);
        let handler = FileReadHandler::new(policy);
        let result = handler
            .run(json!({ "path": file_path.to_str().unwrap() }))
            .await;
        assert!(matches!(result, Err(ActionError::Blocked(_))));
    }
}
