//! app_open — launch an application as a detached process.
//!
//! The spawned process outlives the agent turn; no output is captured and
//! the handler never waits on it.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, HandlerReport,
    ParamSpec, ParamType, PermissionTier, RiskLevel, SideEffectRecord,
};
use serde_json::{Value, json};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "app_open",
        "Open an application by name or path. The process runs detached.",
        ActionCategory::Application,
        RiskLevel::Medium,
        PermissionTier::Operator,
    )
    .with_parameters(vec![
        ParamSpec::new(
            "identifier",
            ParamType::String,
            "Application name or executable path",
        )
        .with_examples(vec![json!("notepad"), json!("firefox")]),
        ParamSpec::optional("args", ParamType::Array, "Arguments passed to the application")
            .with_default(json!([])),
    ])
}

pub struct AppOpenHandler;

impl AppOpenHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AppOpenHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for AppOpenHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let identifier = arguments["identifier"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'identifier' argument".into()))?
            .trim();
        if identifier.is_empty() {
            return Err(ActionError::InvalidArguments(
                "'identifier' must not be empty".into(),
            ));
        }

        let extra: Vec<String> = match &arguments["args"] {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        ActionError::InvalidArguments("'args' must be an array of strings".into())
                    })
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(ActionError::InvalidArguments(
                    "'args' must be an array of strings".into(),
                ));
            }
        };

        let mut command = launcher(identifier);
        command
            .args(&extra)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = command
            .spawn()
            .map_err(|e| ActionError::Handler(format!("Failed to open '{identifier}': {e}")))?;
        let pid = child.id();
        info!(identifier = %identifier, pid = ?pid, "Opened application");

        let report = HandlerReport::new(json!({
            "identifier": identifier,
            "pid": pid,
        }))
        .with_side_effect(SideEffectRecord::new("process-spawned", identifier));
        Ok(report.into())
    }
}

/// Platform launcher: `start` on Windows, `open -a` on macOS, the bare
/// executable elsewhere.
fn launcher(identifier: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", identifier]);
        command
    } else if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.args(["-a", identifier]);
        command
    } else {
        Command::new(identifier)
    }
}
