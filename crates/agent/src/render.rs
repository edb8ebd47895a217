//! Textual renderings that cross the model boundary.
//!
//! Action results are summarized and size-capped before being fed back as
//! conversation context; final replies are stripped of leftover call
//! syntax before reaching the user.

use deskpilot_core::{ActionResult, ExecutionStatus};
use deskpilot_extract::strip_action_blocks;
use serde_json::Value;

/// Character cap for a rendered result payload.
pub const DEFAULT_RENDER_LIMIT: usize = 1000;

const TRUNCATION_MARK: &str = "... (truncated)";

/// Stand-in reply when the model's final text is empty or degenerate.
pub const FALLBACK_REPLY: &str = "Done!";

/// Render one action result as the user-role message fed back to the
/// model. The payload rendering is capped at `limit` characters.
pub fn feedback_for_model(action: &str, result: &ActionResult, limit: usize) -> String {
    let body = match result.status {
        ExecutionStatus::Success => {
            let payload = result.payload.as_ref().unwrap_or(&Value::Null);
            let rendered = serde_json::to_string_pretty(payload).unwrap_or_default();
            let mut text = format!(
                "Action '{action}' executed successfully.\nResult: {}",
                truncate_chars(&rendered, limit)
            );
            for warning in &result.warnings {
                text.push_str(&format!("\nWarning: {warning}"));
            }
            text
        }
        ExecutionStatus::Cancelled => "User cancelled this operation.".to_string(),
        ExecutionStatus::ConfirmationRequired => format!(
            "Action '{action}' requires confirmation from the user. \
             Ask the user whether to proceed."
        ),
        ExecutionStatus::Pending | ExecutionStatus::Running => {
            format!("Action '{action}' has not finished yet.")
        }
        _ => format!(
            "Action failed with error: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ),
    };

    format!(
        "[Action Result]\n{body}\n\nPlease continue with the task or provide a summary if complete."
    )
}

/// Clean a final model reply for display: drop any structured-call
/// remnants and substitute [`FALLBACK_REPLY`] when what remains is too
/// short to be an answer.
pub fn clean_final_reply(raw: &str) -> String {
    let cleaned = strip_action_blocks(raw);
    if cleaned.chars().count() < 5 {
        FALLBACK_REPLY.to_string()
    } else {
        cleaned
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => format!("{}{TRUNCATION_MARK}", &text[..index]),
        None => text.to_string(),
    }
}
