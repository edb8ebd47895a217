//! shell_run — execute an allowlisted shell command and capture output.

use async_trait::async_trait;
use deskpilot_core::{
    ActionCategory, ActionDescriptor, ActionError, ActionHandler, HandlerOutcome, ParamSpec,
    ParamType, PermissionTier, RiskLevel,
};
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::{debug, warn};

pub fn descriptor() -> ActionDescriptor {
    ActionDescriptor::new(
        "shell_run",
        "Run a shell command and return its stdout, stderr, and exit code. \
         Only allowlisted commands are permitted.",
        ActionCategory::Process,
        RiskLevel::High,
        PermissionTier::Operator,
    )
    .with_parameters(vec![ParamSpec::new(
        "command",
        ParamType::String,
        "The command line to run",
    )])
    .with_confirmation()
}

/// Runs commands through the platform shell, gated by a first-token
/// allowlist. An empty allowlist permits everything.
pub struct ShellRunHandler {
    allowed_commands: Vec<String>,
}

impl ShellRunHandler {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self { allowed_commands }
    }

    fn is_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        let base = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|allowed| allowed == base)
    }
}

#[async_trait]
impl ActionHandler for ShellRunHandler {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ActionError::InvalidArguments("Missing 'command' argument".into()))?;

        if !self.is_allowed(command) {
            let base = command.split_whitespace().next().unwrap_or("");
            return Err(ActionError::Blocked(format!(
                "command '{base}' is not in the allowlist"
            )));
        }

        debug!(command = %command, "Running shell command");
        let output = if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", command]).output().await
        } else {
            Command::new("sh").args(["-c", command]).output().await
        }
        .map_err(|e| ActionError::Handler(format!("Failed to run command: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let exit_code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            warn!(command = %command, exit_code, "Command exited nonzero");
        }

        Ok(json!({
            "command": command,
            "exit_code": exit_code,
            "success": output.status.success(),
            "stdout": stdout,
            "stderr": stderr,
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
        assert_eq!(desc.name, "shell_run");
        assert_eq!(desc.risk, RiskLevel::High);
        assert!(desc.requires_confirmation);
    }

    #[test]
    fn allowlist_checks_first_token() {
        let handler = ShellRunHandler::new(vec!["ls".into(), "git".into()]);
        assert!(handler.is_allowed("ls -la"));
        assert!(handler.is_allowed("git status"));
        assert!(!handler.is_allowed("rm -rf /"));
        assert!(!handler.is_allowed("sudo ls"));
    }

    #[test]
    fn empty_allowlist_allows_all() {
        let handler = ShellRunHandler::new(vec![]);
        assert!(handler.is_allowed("anything goes"));
    }

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let handler = ShellRunHandler::new(vec![]);
        let outcome = handler
            .run(json!({ "command": "echo hello" }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Value(value) => {
                assert_eq!(value["exit_code"], 0);
                assert_eq!(value["success"], true);
                assert_eq!(value["stdout"], "hello");
            }
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported_not_error() {
        let handler = ShellRunHandler::new(vec![]);
        let outcome = handler
            .run(json!({ "command": "sh -c 'exit 3'" }))
            .await
            .unwrap();

        match outcome {
            HandlerOutcome::Value(value) => {
                assert_eq!(value["exit_code"], 3);
                assert_eq!(value["success"], false);
            }
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disallowed_command_blocked() {
        let handler = ShellRunHandler::new(vec!["ls".into()]);
        let result = handler.run(json!({ "command": "rm -rf /" })).await;
        match result {
            Err(ActionError::Blocked(reason)) => assert!(reason.contains("rm")),
            other => panic!("expected blocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_command_argument() {
        let handler = ShellRunHandler::new(vec![]);
        let result = handler.run(json!({})).await;
        assert!(matches!(result, Err(ActionError::InvalidArguments(_))));
    }
}
