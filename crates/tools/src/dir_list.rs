//! dir_list — non-recursive directory listing.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, ParamSpec,
    ParamType, PermissionTier, RiskLevel,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "dir_list",
        "List the entries of a directory, non-recursively.",
        ActionCategory::FileSystem,
        RiskLevel::Low,
        PermissionTier::Observer,
    )
    .with_parameters(vec![ParamSpec::new(
        "path",
        ParamType::String,
        "Directory to list",
    )])
}

pub struct DirListHandler {
    policy: PathPolicy,
}

impl DirListHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for DirListHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.policy.check(path)?;
        let mut entries = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to list directory: {e}")))?;

        let mut listing = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ActionError::Handler(format!("Failed to list directory: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry.metadata().await.ok();
            let is_dir = metadata.as_ref().is_some_and(|m| m.is_dir());
            listing.push(json!({
                "name": name,
                "kind": if is_dir { "directory" } else { "file" },
                "size_bytes": metadata.map(|m| m.len()),
            }));
        }
        listing.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        Ok(json!({
            "path": resolved.to_string_lossy(),
            "entries": listing,
        })
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_shape() {
        let desc = descriptor();
        assert_eq!(desc.name, "dir_list");
        assert_eq!(desc.tier, PermissionTier::Observer);
    }

    #[tokio::test]
    async fn lists_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zebra.txt"), "").unwrap();
        std::fs::write(dir.path().join("alpha.txt"), "abc").unwrap();
        std::fs::create_dir(dir.path().join("middle")).unwrap();

        let handler = DirListHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({ "path": dir.path().to_str().unwrap() }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Value(value) => {
                let entries = value["entries"].as_array().unwrap();
                assert_eq!(entries.len(), 3);
                assert_eq!(entries[0]["name"], "alpha.txt");
                assert_eq!(entries[0]["size_bytes"], 3);
                assert_eq!(entries[1]["kind"], "directory");
                assert_eq!(entries[2]["name"], "zebra.txt");
            }
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_directory_is_handler_error() {
        let handler = DirListHandler::new(PathPolicy::unrestricted());
        let result = handler.run(json!({ "path": "/no/such/dir" })).await;
        assert!(matches!(result, Err(ActionError::Handler(_))));
    }

    #[tokio::test]
    async fn protected_path_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy::new(vec![], vec![dir.path().to_str().unwrap().into()]);
        let handler = DirListHandler::new(policy);
        let result = handler
            .run(json!({ "path": dir.path().to_str().unwrap() }))
            .await;
        assert!(matches!(result, Err(ActionError::Blocked(_))));
    }
}
