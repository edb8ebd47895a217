//! Action domain types — descriptors, requests, results.
//!
//! These types cross the trust boundary: a descriptor is what the host
//! declares, a request is what the model asked for, a result is the single
//! terminal record of what actually happened.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ActionError;
use crate::message::ConversationId;

/// Broad grouping of actions, used for display and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    FileSystem,
    Application,
    Process,
    System,
}

impl ActionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileSystem => "file_system",
            Self::Application => "application",
            Self::Process => "process",
            Self::System => "system",
        }
    }
}

/// How much damage an action can do if misused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// Ordered privilege level. An action executes only when its declared tier
/// is at or below the session tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionTier {
    Observer,
    Operator,
    Administrator,
    System,
}

impl PermissionTier {
    /// Parse a tier from its lowercase name, as it appears in config files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "observer" => Some(Self::Observer),
            "operator" => Some(Self::Operator),
            "administrator" => Some(Self::Administrator),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observer => "observer",
            Self::Operator => "operator",
            Self::Administrator => "administrator",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared primitive type of an action parameter.
///
/// `Other` covers declared types this runtime does not recognize; values
/// for those pass type checking untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Other(String),
}

impl ParamType {
    pub fn name(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Other(name) => name,
        }
    }

    /// Whether the supplied runtime value fits this declared type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Other(_) => true,
        }
    }
}

impl From<&str> for ParamType {
    fn from(name: &str) -> Self {
        match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ParamType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ParamType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

/// Schema for one action parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ParamType,

    pub description: String,

    #[serde(default = "default_required")]
    pub required: bool,

    /// Injected into the argument mapping when the model omits the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Values the model should choose from. Advertised, not enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

fn default_required() -> bool {
    true
}

impl ParamSpec {
    /// A required parameter.
    pub fn new(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
            default: None,
            allowed: None,
            examples: Vec::new(),
        }
    }

    /// An optional parameter.
    pub fn optional(
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::new(name, kind, description)
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_allowed(mut self, values: Vec<Value>) -> Self {
        self.allowed = Some(values);
        self
    }

    pub fn with_examples(mut self, values: Vec<Value>) -> Self {
        self.examples = values;
        self
    }
}

/// Immutable description of one action: identity, schema, and the gates
/// that apply before its handler may run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Unique key within a catalog.
    pub name: String,

    pub description: String,

    pub category: ActionCategory,

    pub risk: RiskLevel,

    /// Minimum session tier required to execute.
    pub tier: PermissionTier,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParamSpec>,

    /// When true the runtime demands an approved resubmission before dispatch.
    #[serde(default)]
    pub requires_confirmation: bool,
}

impl ActionDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ActionCategory,
        risk: RiskLevel,
        tier: PermissionTier,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            risk,
            tier,
            parameters: Vec::new(),
            requires_confirmation: false,
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<ParamSpec>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Build the per-action object advertised to the model gateway.
    pub fn schema(&self) -> ActionSchema {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = serde_json::Map::new();
            prop.insert("type".into(), Value::String(param.kind.name().to_string()));
            prop.insert(
                "description".into(),
                Value::String(param.description.clone()),
            );
            if let Some(default) = &param.default {
                prop.insert("default".into(), default.clone());
            }
            if let Some(allowed) = &param.allowed {
                prop.insert("enum".into(), Value::Array(allowed.clone()));
            }
            if !param.examples.is_empty() {
                prop.insert("examples".into(), Value::Array(param.examples.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        ActionSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

/// The model-facing advertisement of one action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSchema {
    pub name: String,
    pub description: String,
    /// JSON-Schema-shaped parameter object.
    pub parameters: Value,
}

/// One model-proposed invocation, stamped with conversation coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: String,

    /// Name of the action to invoke.
    pub action: String,

    /// Argument mapping; keys are unique by construction.
    #[serde(default)]
    pub arguments: serde_json::Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,

    /// Iteration index within the originating turn.
    #[serde(default)]
    pub step: u32,

    /// Set on resubmission after the approval collaborator said yes.
    #[serde(default)]
    pub confirmed: bool,

    pub created_at: DateTime<Utc>,
}

impl ActionRequest {
    pub fn new(action: impl Into<String>, arguments: serde_json::Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action: action.into(),
            arguments,
            conversation_id: None,
            step: 0,
            confirmed: false,
            created_at: Utc::now(),
        }
    }

    pub fn for_conversation(mut self, conversation_id: ConversationId, step: u32) -> Self {
        self.conversation_id = Some(conversation_id);
        self.step = step;
        self
    }

    /// Resubmission after approval. Keeps the same request id so the
    /// confirmation round-trip stays one logical request.
    pub fn confirm(mut self) -> Self {
        self.confirmed = true;
        self
    }
}

/// Lifecycle of an action request.
///
/// `ConfirmationRequired` is the only non-terminal status a caller sees: it
/// is always followed by a confirmed resubmission or a cancelled result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Cancelled,
    Timeout,
    PermissionDenied,
    ConfirmationRequired,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::Pending | Self::Running | Self::ConfirmationRequired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::PermissionDenied => "permission_denied",
            Self::ConfirmationRequired => "confirmation_required",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about a mutation an action performed. The core never undoes
/// side effects; the record exists so an owning collaborator can try later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffectRecord {
    /// Free-form kind tag, e.g. "file-created", "process-started".
    pub kind: String,

    /// Path or identifier the mutation touched.
    pub target: String,

    #[serde(default)]
    pub reversible: bool,

    /// Opaque payload for whichever collaborator owns the rollback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Value>,
}

impl SideEffectRecord {
    pub fn new(kind: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: target.into(),
            reversible: false,
            rollback: None,
        }
    }

    pub fn with_rollback(mut self, rollback: Value) -> Self {
        self.reversible = true;
        self.rollback = Some(rollback);
        self
    }
}

/// The single terminal record of one request. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub request_id: String,

    pub status: ExecutionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub elapsed_ms: u64,

    pub completed_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_effects: Vec<SideEffectRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ActionResult {
    fn base(request_id: impl Into<String>, status: ExecutionStatus, elapsed_ms: u64) -> Self {
        Self {
            request_id: request_id.into(),
            status,
            payload: None,
            error: None,
            elapsed_ms,
            completed_at: Utc::now(),
            side_effects: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn success(request_id: impl Into<String>, payload: Value, elapsed_ms: u64) -> Self {
        Self {
            payload: Some(payload),
            ..Self::base(request_id, ExecutionStatus::Success, elapsed_ms)
        }
    }

    pub fn from_report(
        request_id: impl Into<String>,
        report: HandlerReport,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            payload: Some(report.payload),
            side_effects: report.side_effects,
            warnings: report.warnings,
            ..Self::base(request_id, ExecutionStatus::Success, elapsed_ms)
        }
    }

    pub fn failure(
        request_id: impl Into<String>,
        error: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::base(request_id, ExecutionStatus::Failed, elapsed_ms)
        }
    }

    pub fn cancelled(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::base(request_id, ExecutionStatus::Cancelled, 0)
        }
    }

    pub fn confirmation_required(request_id: impl Into<String>, action: &str) -> Self {
        Self {
            error: Some(format!("Action '{action}' requires confirmation")),
            ..Self::base(request_id, ExecutionStatus::ConfirmationRequired, 0)
        }
    }

    /// Map a pre-dispatch error onto its status. Tier failures become
    /// `permission_denied`, runtime timeouts become `timeout`, everything
    /// else is a plain `failed`.
    pub fn from_error(request_id: impl Into<String>, error: &ActionError, elapsed_ms: u64) -> Self {
        let status = match error {
            ActionError::PermissionDenied { .. } => ExecutionStatus::PermissionDenied,
            ActionError::Timeout { .. } => ExecutionStatus::Timeout,
            _ => ExecutionStatus::Failed,
        };
        Self {
            error: Some(error.to_string()),
            ..Self::base(request_id, status, elapsed_ms)
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Structured success produced by a handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerReport {
    pub payload: Value,
    pub side_effects: Vec<SideEffectRecord>,
    pub warnings: Vec<String>,
}

impl HandlerReport {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            side_effects: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_side_effect(mut self, record: SideEffectRecord) -> Self {
        self.side_effects.push(record);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// What a handler produced on success.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// Full structured outcome: payload plus side effects and warnings.
    Report(HandlerReport),
    /// Bare value; the runtime wraps it as a plain success payload.
    Value(Value),
}

impl From<HandlerReport> for HandlerOutcome {
    fn from(report: HandlerReport) -> Self {
        Self::Report(report)
    }
}

impl From<Value> for HandlerOutcome {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// An action implementation.
///
/// Handlers receive the validated argument mapping (declared defaults
/// already injected) as a JSON object. They must assume confirmation has
/// already happened — a handler never prompts for approval itself.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, arguments: Value) -> Result<HandlerOutcome, ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tiers_are_ordered() {
        assert!(PermissionTier::Observer < PermissionTier::Operator);
        assert!(PermissionTier::Operator < PermissionTier::Administrator);
        assert!(PermissionTier::Administrator < PermissionTier::System);
    }

    #[test]
    fn tier_names_round_trip() {
        for tier in [
            PermissionTier::Observer,
            PermissionTier::Operator,
            PermissionTier::Administrator,
            PermissionTier::System,
        ] {
            assert_eq!(PermissionTier::from_name(tier.as_str()), Some(tier));
        }
        assert_eq!(PermissionTier::from_name("root"), None);
    }

    #[test]
    fn param_type_accepts_matching_values() {
        assert!(ParamType::String.accepts(&json!("hi")));
        assert!(!ParamType::String.accepts(&json!(3)));
        assert!(ParamType::Integer.accepts(&json!(3)));
        assert!(!ParamType::Integer.accepts(&json!(3.5)));
        assert!(ParamType::Number.accepts(&json!(3.5)));
        assert!(ParamType::Number.accepts(&json!(3)));
        assert!(ParamType::Boolean.accepts(&json!(true)));
        assert!(ParamType::Array.accepts(&json!([1, 2])));
        assert!(ParamType::Object.accepts(&json!({"a": 1})));
    }

    #[test]
    fn unknown_param_type_is_permissive() {
        let kind = ParamType::from("duration");
        assert_eq!(kind, ParamType::Other("duration".into()));
        assert!(kind.accepts(&json!("5s")));
        assert!(kind.accepts(&json!(17)));
    }

    #[test]
    fn schema_lists_required_parameters() {
        let descriptor = ActionDescriptor::new(
            "file_read",
            "Read a file",
            ActionCategory::FileSystem,
            RiskLevel::Low,
            PermissionTier::Observer,
        )
        .with_parameters(vec![
            ParamSpec::new("path", ParamType::String, "Path to read"),
            ParamSpec::optional("max_bytes", ParamType::Integer, "Read limit")
                .with_default(json!(65536)),
        ]);

        let schema = descriptor.schema();
        assert_eq!(schema.name, "file_read");
        assert_eq!(schema.parameters["required"], json!(["path"]));
        assert_eq!(
            schema.parameters["properties"]["max_bytes"]["default"],
            json!(65536)
        );
    }

    #[test]
    fn schema_advertises_allowed_values() {
        let descriptor = ActionDescriptor::new(
            "window_set",
            "Change window state",
            ActionCategory::Application,
            RiskLevel::Low,
            PermissionTier::Operator,
        )
        .with_parameters(vec![ParamSpec::new(
            "state",
            ParamType::String,
            "Target state",
        )
        .with_allowed(vec![json!("minimized"), json!("maximized")])]);

        let schema = descriptor.schema();
        assert_eq!(
            schema.parameters["properties"]["state"]["enum"],
            json!(["minimized", "maximized"])
        );
    }

    #[test]
    fn confirm_keeps_request_id() {
        let request = ActionRequest::new("file_delete", serde_json::Map::new());
        let id = request.id.clone();
        let confirmed = request.confirm();
        assert!(confirmed.confirmed);
        assert_eq!(confirmed.id, id);
    }

    #[test]
    fn confirmation_required_is_not_terminal() {
        let result = ActionResult::confirmation_required("req-1", "file_delete");
        assert_eq!(result.status, ExecutionStatus::ConfirmationRequired);
        assert!(!result.is_terminal());
        assert!(
            result
                .error
                .as_deref()
                .unwrap()
                .contains("requires confirmation")
        );
    }

    #[test]
    fn from_error_maps_statuses() {
        let denied = ActionResult::from_error(
            "req-1",
            &ActionError::PermissionDenied {
                action: "x".into(),
                required: PermissionTier::System,
                granted: PermissionTier::Observer,
            },
            0,
        );
        assert_eq!(denied.status, ExecutionStatus::PermissionDenied);

        let timed_out = ActionResult::from_error(
            "req-2",
            &ActionError::Timeout {
                action: "x".into(),
                timeout_secs: 30,
            },
            30_000,
        );
        assert_eq!(timed_out.status, ExecutionStatus::Timeout);

        let failed =
            ActionResult::from_error("req-3", &ActionError::UnknownAction("nope".into()), 0);
        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("Unknown action: nope"));
    }

    #[test]
    fn report_collects_side_effects_and_warnings() {
        let report = HandlerReport::new(json!({"written": 42}))
            .with_side_effect(
                SideEffectRecord::new("file-created", "/tmp/out.txt")
                    .with_rollback(json!({"delete": "/tmp/out.txt"})),
            )
            .with_warning("overwrote existing file");

        let result = ActionResult::from_report("req-1", report, 12);
        assert_eq!(result.status, ExecutionStatus::Success);
        assert_eq!(result.side_effects.len(), 1);
        assert!(result.side_effects[0].reversible);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ExecutionStatus::PermissionDenied).unwrap();
        assert_eq!(json, "\"permission_denied\"");
    }
}
