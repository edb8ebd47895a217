//! Request validation and handler dispatch.
//!
//! `execute` runs one request through a fixed pipeline: catalog lookup,
//! enablement, session tier, required parameters with default injection,
//! declared-type checks, then the confirmation gate. Only a request that
//! clears every gate reaches its handler, and it does so exactly once.
//!
//! Handlers run on a fixed-size worker pool under a wall-clock deadline
//! that includes time spent queued for a slot. The deadline is
//! cooperative: an overrunning handler keeps its slot until it returns on
//! its own, the caller just stops waiting for the result.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use deskpilot_core::{
    ActionError, ActionHandler, ActionRequest, ActionResult, HandlerOutcome, PermissionTier,
    RegisteredAction, ToolCatalog,
};

use crate::history::ExecutionHistory;

/// Wall-clock bound per action, queue wait included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Handlers allowed to run at once.
pub const DEFAULT_WORKERS: usize = 4;

/// Terminal results retained in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Executes validated action requests against a catalog.
///
/// The runtime owns the session permission tier, the worker pool, and the
/// execution history. It is cheap to share behind an `Arc`; all methods
/// take `&self`.
pub struct ToolRuntime {
    catalog: Arc<ToolCatalog>,
    session_tier: PermissionTier,
    timeout: Duration,
    workers: Arc<Semaphore>,
    history: ExecutionHistory,
}

impl ToolRuntime {
    pub fn new(catalog: Arc<ToolCatalog>) -> Self {
        Self {
            catalog,
            session_tier: PermissionTier::Operator,
            timeout: DEFAULT_TIMEOUT,
            workers: Arc::new(Semaphore::new(DEFAULT_WORKERS)),
            history: ExecutionHistory::new(DEFAULT_HISTORY_CAPACITY),
        }
    }

    pub fn with_session_tier(mut self, tier: PermissionTier) -> Self {
        self.session_tier = tier;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Size of the worker pool. Clamped to at least one slot.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Arc::new(Semaphore::new(workers.max(1)));
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = ExecutionHistory::new(capacity);
        self
    }

    pub fn session_tier(&self) -> PermissionTier {
        self.session_tier
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    /// Execute one request end to end and return its result.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// result's status and error text. Terminal results are recorded in
    /// history; a confirmation hold is not, since the same request id
    /// comes back for its real run.
    pub async fn execute(&self, request: ActionRequest) -> ActionResult {
        let result = self.run(request).await;
        if result.is_terminal() {
            self.history.push(result.clone());
        }
        result
    }

    /// Record a cancelled result for a request the approver rejected.
    ///
    /// The handler never ran; this is the only source of cancelled
    /// entries.
    pub fn record_cancelled(
        &self,
        request: &ActionRequest,
        reason: impl Into<String>,
    ) -> ActionResult {
        let result = ActionResult::cancelled(&request.id, reason);
        info!(action = %request.action, "action cancelled before dispatch");
        self.history.push(result.clone());
        result
    }

    async fn run(&self, request: ActionRequest) -> ActionResult {
        let started = Instant::now();

        let (registered, arguments) = match self.validate(&request) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(action = %request.action, error = %err, "rejected action request");
                return ActionResult::from_error(&request.id, &err, elapsed(started));
            }
        };

        if registered.descriptor.requires_confirmation && !request.confirmed {
            debug!(action = %request.action, "holding action until confirmed");
            return ActionResult::confirmation_required(&request.id, &request.action);
        }

        info!(
            action = %request.action,
            step = request.step,
            confirmed = request.confirmed,
            "dispatching action"
        );
        self.dispatch(&request, registered.handler, arguments, started)
            .await
    }

    /// Validation pipeline, in fixed order: existence, enablement, tier,
    /// required parameters (injecting declared defaults), declared types.
    /// Parameters the descriptor does not declare pass through untouched.
    fn validate(
        &self,
        request: &ActionRequest,
    ) -> Result<(RegisteredAction, Map<String, Value>), ActionError> {
        let registered = self
            .catalog
            .lookup(&request.action)
            .ok_or_else(|| ActionError::UnknownAction(request.action.clone()))?;
        if !registered.enabled {
            return Err(ActionError::Disabled(request.action.clone()));
        }

        let required = registered.descriptor.tier;
        if required > self.session_tier {
            return Err(ActionError::PermissionDenied {
                action: request.action.clone(),
                required,
                granted: self.session_tier,
            });
        }

        let mut arguments = request.arguments.clone();
        for spec in &registered.descriptor.parameters {
            if !arguments.contains_key(&spec.name) {
                if let Some(default) = &spec.default {
                    arguments.insert(spec.name.clone(), default.clone());
                } else if spec.required {
                    return Err(ActionError::MissingParameter(spec.name.clone()));
                }
            }
            if let Some(value) = arguments.get(&spec.name) {
                if !spec.kind.accepts(value) {
                    return Err(ActionError::InvalidParameterType {
                        parameter: spec.name.clone(),
                        expected: spec.kind.name().to_string(),
                        actual: value_type_name(value).to_string(),
                    });
                }
            }
        }

        Ok((registered, arguments))
    }

    async fn dispatch(
        &self,
        request: &ActionRequest,
        handler: Arc<dyn ActionHandler>,
        arguments: Map<String, Value>,
        started: Instant,
    ) -> ActionResult {
        let workers = Arc::clone(&self.workers);
        let task = tokio::spawn(async move {
            // The permit is taken inside the task so queue wait counts
            // against the caller's deadline.
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|err| ActionError::Pool(err.to_string()))?;
            handler.run(Value::Object(arguments)).await
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(outcome))) => {
                let elapsed_ms = elapsed(started);
                debug!(action = %request.action, elapsed_ms, "action completed");
                match outcome {
                    HandlerOutcome::Report(report) => {
                        ActionResult::from_report(&request.id, report, elapsed_ms)
                    }
                    HandlerOutcome::Value(value) => {
                        ActionResult::success(&request.id, value, elapsed_ms)
                    }
                }
            }
            Ok(Ok(Err(err))) => {
                warn!(action = %request.action, error = %err, "action handler failed");
                ActionResult::from_error(&request.id, &err, elapsed(started))
            }
            Ok(Err(join_err)) => {
                let err = if join_err.is_panic() {
                    ActionError::Panicked {
                        action: request.action.clone(),
                        detail: panic_detail(join_err),
                    }
                } else {
                    ActionError::Handler("execution task was aborted".to_string())
                };
                error!(action = %request.action, error = %err, "action execution fault");
                ActionResult::from_error(&request.id, &err, elapsed(started))
            }
            Err(_deadline) => {
                // The worker may still be running; its pool slot stays
                // held until the handler returns on its own.
                warn!(
                    action = %request.action,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "action timed out; abandoning result"
                );
                let err = ActionError::Timeout {
                    action: request.action.clone(),
                    timeout_secs: self.timeout.as_secs(),
                };
                ActionResult::from_error(&request.id, &err, elapsed(started))
            }
        }
    }
}

fn elapsed(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn panic_detail(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(text) = payload.downcast_ref::<&str>() {
                (*text).to_string()
            } else if let Some(text) = payload.downcast_ref::<String>() {
                text.clone()
            } else {
                "non-string panic payload".to_string()
            }
        }
        Err(_) => "task aborted".to_string(),
    }
}
