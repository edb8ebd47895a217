//! file_search — bounded breadth-first name search under a directory.

use std::collections::VecDeque;
use std::path::PathBuf;

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel,
};
use serde_json::{Value, json};

use crate::policy::PathPolicy;

/// Directory entries inspected before the walk gives up, matches or not.
const VISIT_BUDGET: usize = 10_000;

const DEFAULT_MAX_RESULTS: u64 = 50;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "file_search",
        "Search for files by name under a directory. Case-insensitive substring match, \
         breadth-first, bounded.",
        ActionCategory::FileSystem,
        RiskLevel::Low,
        PermissionTier::Observer,
    )
    .with_parameters(vec![
        ParamSpec::new("path", ParamType::String, "Directory to search under"),
        ParamSpec::new(
            "pattern",
            ParamType::String,
            "Substring to look for in file names",
        ),
        ParamSpec::optional("max_results", ParamType::Integer, "Result cap")
            .with_default(json!(DEFAULT_MAX_RESULTS)),
    ])
}

pub struct FileSearchHandler {
    policy: PathPolicy,
}

impl FileSearchHandler {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl ActionHandler for FileSearchHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'path' argument".into()))?;
        let pattern = arguments["pattern"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'pattern' argument".into()))?;
        let max_results = arguments["max_results"]
            .as_u64()
            .unwrap_or(DEFAULT_MAX_RESULTS) as usize;

        let root = self.policy.check(path)?;
        let needle = pattern.to_lowercase();

        let mut matches: Vec<String> = Vec::new();
        let mut queue: VecDeque<PathBuf> = VecDeque::from([root]);
        let mut visited = 0usize;
        let mut budget_hit = false;

        while let Some(dir) = queue.pop_front() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // Unreadable subdirectories are skipped, not fatal.
                Err(_) => continue,
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                visited += 1;
                if visited > VISIT_BUDGET {
                    budget_hit = true;
                    break;
                }

                let entry_path = entry.path();
                let name = entry.file_name().to_string_lossy().to_lowercase();
                if name.contains(&needle) {
                    matches.push(entry_path.to_string_lossy().into_owned());
                    if matches.len() >= max_results {
                        budget_hit = true;
                        break;
                    }
                }
                if entry_path.is_dir() {
                    queue.push_back(entry_path);
                }
            }
            if budget_hit {
                break;
            }
        }

        matches.sort();
        let mut report = HandlerReport::new(json!({
            "pattern": pattern,
            "matches": matches,
        }));
        if budget_hit {
            report = report.with_warning("Search stopped early; narrow the pattern for more");
        }
        Ok(report.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_tree(root: &std::path::Path) {
        std::fs::write(root.join("report.md"), "").unwrap();
        std::fs::write(root.join("notes.txt"), "").unwrap();
        let sub = root.join("archive");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("old_report.md"), "").unwrap();
        std::fs::write(sub.join("image.png"), "").unwrap();
    }

    #[test]
    fn descriptor_shape() {
        let desc = descriptor();
        assert_eq!(desc.name, "file_search");
        let cap = desc.param("max_results").unwrap();
        assert!(!cap.required);
        assert_eq!(cap.default, Some(json!(50)));
    }

    #[tokio::test]
    async fn finds_matches_in_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        seed_tree(dir.path());

        let handler = FileSearchHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({ "path": dir.path().to_str().unwrap(), "pattern": "report" }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                let matches = report.payload["matches"].as_array().unwrap();
                assert_eq!(matches.len(), 2);
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();

        let handler = FileSearchHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({ "path": dir.path().to_str().unwrap(), "pattern": "readme" }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                assert_eq!(report.payload["matches"].as_array().unwrap().len(), 1);
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn result_cap_stops_walk_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            std::fs::write(dir.path().join(format!("match_{i}.txt")), "").unwrap();
        }

        let handler = FileSearchHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({
                "path": dir.path().to_str().unwrap(),
                "pattern": "match",
                "max_results": 3,
            }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                assert_eq!(report.payload["matches"].as_array().unwrap().len(), 3);
                assert_eq!(report.warnings.len(), 1);
            }
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_matches_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();

        let handler = FileSearchHandler::new(PathPolicy::unrestricted());
        let outcome = handler
            .run(json!({ "path": dir.path().to_str().unwrap(), "pattern": "zzz" }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Report(report) => {
                assert!(report.payload["matches"].as_array().unwrap().is_empty());
            }
            other => panic!("expected report, got {other:?}"),
        }
    }
}
