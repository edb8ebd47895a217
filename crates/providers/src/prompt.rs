//! System prompt assembly.
//!
//! The wire protocol has no native tool-call turn; actions are advertised
//! inside the system prompt and the model answers with a JSON object in
//! plain text. The extractor on the other side of the loop understands
//! the shape this prompt asks for.

use deskpilot_core::ActionSchema;

/// Build the system prompt advertising the enabled actions.
pub fn build_system_prompt(schemas: &[ActionSchema]) -> String {
    let mut prompt = String::from(
        "You are Deskpilot, an assistant that operates the user's computer \
         through a fixed set of actions.\n\n\
         To perform an action, reply with exactly one JSON object in this shape:\n\
         {\"thought\": \"<brief reasoning>\", \"action\": \"<action name>\", \"arguments\": {<parameters>}}\n\n\
         Rules:\n\
         - Request one action per reply and wait for its result before the next.\n\
         - Use only the actions listed below, with their declared parameters.\n\
         - Each action's result is reported back to you before you continue.\n\
         - Some actions need the user's confirmation first; a refused action \
         comes back cancelled.\n\
         - When the task is done, or no action is needed, answer in plain \
         language with no JSON object.\n\n",
    );

    if schemas.is_empty() {
        prompt.push_str("No actions are currently available; answer in plain language.\n");
        return prompt;
    }

    prompt.push_str("Available actions:\n");
    for schema in schemas {
        prompt.push_str(&format!("- {}: {}\n", schema.name, schema.description));
        let parameters =
            serde_json::to_string(&schema.parameters).unwrap_or_else(|_| "{}".to_string());
        prompt.push_str(&format!("  parameters: {parameters}\n"));
    }
    prompt
}
