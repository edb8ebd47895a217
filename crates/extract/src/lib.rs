//! # Deskpilot Extract
//!
//! Turns free-form model replies into structured action calls. Models wrap
//! their calls in whatever framing they were tuned on, so extraction walks a
//! fixed ladder of strategies from most to least explicit:
//!
//! 1. special delimiter tokens (`<|python_start|>` ... `<|python_end|>`)
//! 2. a ` ```json ` tagged code fence
//! 3. any code fence
//! 4. a bare object anywhere in the reply
//!
//! and finally a pattern-match salvage for almost-JSON replies. Every
//! strategy feeds candidate spans through the same balanced-object scanner,
//! so concatenated objects, prose around the call, and braces inside string
//! values are all handled uniformly. Extraction is total: malformed input
//! yields `None`, never an error.

use serde_json::{Map, Value};
use tracing::{debug, trace};

mod scan;

use scan::scan_objects;

/// Object key naming the action to invoke.
pub const ACTION_KEY: &str = "action";
/// Object key holding the argument mapping.
pub const ARGUMENTS_KEY: &str = "arguments";
/// Optional object key carrying the model's reasoning.
pub const THOUGHT_KEY: &str = "thought";

/// Opening token some chat templates emit around tool calls.
pub const DELIM_OPEN: &str = "<|python_start|>";
/// Closing token paired with [`DELIM_OPEN`].
pub const DELIM_CLOSE: &str = "<|python_end|>";

const FENCE: &str = "```";
const JSON_TAG: &str = "json";

/// A structured action call recovered from model output.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedAction {
    /// Action name, never empty.
    pub action: String,
    /// Arguments as given; missing or non-object `arguments` becomes empty.
    pub arguments: Map<String, Value>,
    /// Free-text reasoning, if the model included one.
    pub thought: Option<String>,
}

impl ExtractedAction {
    /// The arguments as a JSON object value.
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// Extract the first action call from a model reply.
///
/// Strategies run in a fixed order and the first hit wins, so an explicit
/// delimiter or fence always beats a bare object mentioned in passing.
/// Returns `None` when the reply carries no recognizable call.
pub fn extract(text: &str) -> Option<ExtractedAction> {
    if text.trim().is_empty() {
        return None;
    }

    let strategies: [fn(&str) -> Option<ExtractedAction>; 4] = [
        from_delimited,
        from_tagged_fence,
        from_any_fence,
        from_bare_object,
    ];
    for strategy in strategies {
        if let Some(call) = strategy(text) {
            debug!(action = %call.action, "extracted action call from reply");
            return Some(call);
        }
    }

    let salvaged = last_resort(text);
    if let Some(call) = &salvaged {
        debug!(action = %call.action, "salvaged action call via pattern match");
    }
    salvaged
}

// --- strategies ---

fn from_delimited(text: &str) -> Option<ExtractedAction> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(DELIM_OPEN) {
        let body_start = search_from + offset + DELIM_OPEN.len();
        // An opener without its closer is not a call span.
        let close_offset = text[body_start..].find(DELIM_CLOSE)?;
        let body = &text[body_start..body_start + close_offset];
        if let Some(call) = first_call_in_span(body) {
            return Some(call);
        }
        search_from = body_start + close_offset + DELIM_CLOSE.len();
    }
    None
}

fn from_tagged_fence(text: &str) -> Option<ExtractedAction> {
    for fence in fences(text) {
        // The tag sits right after the opening backticks; the body may start
        // on the same line, so no newline is required after it.
        if let Some(body) = text[fence.inner].strip_prefix(JSON_TAG) {
            if let Some(call) = first_call_in_span(body) {
                return Some(call);
            }
        }
    }
    None
}

fn from_any_fence(text: &str) -> Option<ExtractedAction> {
    for fence in fences(text) {
        // Any language tag is skipped naturally: the scanner only reacts to
        // braces, and tags do not contain them.
        if let Some(call) = first_call_in_span(&text[fence.inner]) {
            return Some(call);
        }
    }
    None
}

fn from_bare_object(text: &str) -> Option<ExtractedAction> {
    first_call_in_span(text)
}

/// Pattern-match salvage for replies that name an action in almost-JSON.
///
/// Recovers the action name from an `"action": "..."` pair and, when an
/// `"arguments"` object opens immediately after its key, the arguments too.
/// Anything less adjacent is too ambiguous to trust.
fn last_resort(text: &str) -> Option<ExtractedAction> {
    let action_re = regex_lite::Regex::new(r#""action"\s*:\s*"([^"]+)""#).ok()?;
    let captures = action_re.captures(text)?;
    let action = captures.get(1)?.as_str().trim();
    if action.is_empty() {
        return None;
    }
    trace!(action, "attempting pattern-match salvage");

    let tail = &text[captures.get(0)?.end()..];
    let arguments = salvage_arguments(tail).unwrap_or_default();
    Some(ExtractedAction {
        action: action.to_string(),
        arguments,
        thought: None,
    })
}

fn salvage_arguments(tail: &str) -> Option<Map<String, Value>> {
    let args_re = regex_lite::Regex::new(r#""arguments"\s*:\s*\{"#).ok()?;
    let found = args_re.find(tail)?;
    // The match ends one past the opening brace.
    let object_text = &tail[found.end() - 1..];
    let span = scan_objects(object_text).into_iter().next()?;
    if span.start != 0 {
        // The brace after the key never balanced; a later object is not ours.
        return None;
    }
    match serde_json::from_str::<Value>(&object_text[span]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

// --- span plumbing ---

/// First parseable object in `span` that carries an action key.
///
/// Objects without the key (or that fail to parse) are skipped rather than
/// aborting the span, so a reply like `{"meta":1}{"action":...}` still
/// resolves.
fn first_call_in_span(span: &str) -> Option<ExtractedAction> {
    scan_objects(span).into_iter().find_map(|range| {
        serde_json::from_str::<Value>(&span[range])
            .ok()
            .as_ref()
            .and_then(call_from_value)
    })
}

fn call_from_value(value: &Value) -> Option<ExtractedAction> {
    let object = value.as_object()?;
    let action = object.get(ACTION_KEY)?.as_str()?.trim();
    if action.is_empty() {
        return None;
    }
    let arguments = object
        .get(ARGUMENTS_KEY)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let thought = object
        .get(THOUGHT_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from);
    Some(ExtractedAction {
        action: action.to_string(),
        arguments,
        thought,
    })
}

#[derive(Debug, Clone)]
struct Fence {
    /// Span covering both backtick markers.
    outer: std::ops::Range<usize>,
    /// Span between the markers, tag included.
    inner: std::ops::Range<usize>,
}

fn fences(text: &str) -> Vec<Fence> {
    let mut found = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(FENCE) {
        let open = search_from + offset;
        let body_start = open + FENCE.len();
        let Some(close_offset) = text[body_start..].find(FENCE) else {
            // Unterminated fence; nothing after it can pair up either.
            break;
        };
        let body_end = body_start + close_offset;
        let outer_end = body_end + FENCE.len();
        found.push(Fence {
            outer: open..outer_end,
            inner: body_start..body_end,
        });
        search_from = outer_end;
    }
    found
}

// --- reply cleanup ---

/// Remove call framing from a reply, keeping the conversational text.
///
/// Strips matched delimiter spans, code fences whose body is a call, and
/// bare call objects, then collapses the blank runs left behind. A reply
/// that was nothing but a call collapses to the empty string.
pub fn strip_action_blocks(text: &str) -> String {
    let stripped = drop_delimited_spans(text);
    let stripped = drop_call_fences(&stripped);
    let stripped = drop_bare_calls(&stripped);
    collapse_blank_runs(&stripped).trim().to_string()
}

fn drop_delimited_spans(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(open) = rest.find(DELIM_OPEN) else {
            out.push_str(rest);
            break;
        };
        let body_start = open + DELIM_OPEN.len();
        match rest[body_start..].find(DELIM_CLOSE) {
            Some(close_offset) => {
                out.push_str(&rest[..open]);
                rest = &rest[body_start + close_offset + DELIM_CLOSE.len()..];
            }
            None => {
                // Unmatched opener stays put.
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

fn drop_call_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied_to = 0;
    for fence in fences(text) {
        if first_call_in_span(&text[fence.inner]).is_some() {
            out.push_str(&text[copied_to..fence.outer.start]);
            copied_to = fence.outer.end;
        }
    }
    out.push_str(&text[copied_to..]);
    out
}

fn drop_bare_calls(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied_to = 0;
    for span in scan_objects(text) {
        let is_call = serde_json::from_str::<Value>(&text[span.clone()])
            .ok()
            .as_ref()
            .and_then(call_from_value)
            .is_some();
        if is_call {
            out.push_str(&text[copied_to..span.start]);
            copied_to = span.end;
        }
    }
    out.push_str(&text[copied_to..]);
    out
}

/// Cap consecutive newlines at two so removals do not leave gaping holes.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = 0u32;
    for ch in text.chars() {
        if ch == '\n' {
            run += 1;
            if run <= 2 {
                out.push(ch);
            }
        } else {
            run = 0;
            out.push(ch);
        }
    }
    out
}
