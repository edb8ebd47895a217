//! The turn controller — one model-call / action-execution cycle at a time.

use std::sync::Arc;

use chrono::Utc;
use deskpilot_core::{
    ActionRequest, AgentEvent, ApprovalDecider, Conversation, DenyAll, EventBus, ExecutionStatus,
    Message, ModelGateway,
};
use deskpilot_extract::{ExtractedAction, extract};
use deskpilot_runtime::ToolRuntime;
use tracing::{debug, info, warn};

use crate::render;

/// Hard bound on actions per user turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Most recent messages included in each model call.
pub const DEFAULT_WINDOW: usize = 20;

/// Fixed notice appended when the iteration budget runs out.
const BUDGET_NOTICE: &str =
    "I've reached the maximum number of actions for this request. Please provide further guidance.";

/// How one turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnTermination {
    /// The model produced a final text reply.
    Completed,
    /// The iteration budget ran out while the model kept proposing actions.
    BudgetExhausted,
    /// The model gateway failed; the reply is a terminal error notice.
    GatewayFailed,
}

/// The final reply of a turn plus how the loop ended.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    pub termination: TurnTermination,
}

/// Drives a conversation turn: model call, action extraction, gated
/// execution, context update, repeat.
///
/// Exactly one model call and at most one action dispatch are in flight at
/// a time; parallelism lives in the runtime's worker pool, not here. The
/// controller never returns an error: gateway failures become a terminal
/// natural-language reply.
pub struct TurnController {
    gateway: Arc<dyn ModelGateway>,
    runtime: Arc<ToolRuntime>,
    approver: Arc<dyn ApprovalDecider>,
    events: Arc<EventBus>,
    max_iterations: u32,
    window: usize,
    render_limit: usize,
}

impl TurnController {
    /// Create a controller with the default knobs, no approver (deny all),
    /// and a private event bus.
    pub fn new(gateway: Arc<dyn ModelGateway>, runtime: Arc<ToolRuntime>) -> Self {
        Self {
            gateway,
            runtime,
            approver: Arc::new(DenyAll),
            events: Arc::new(EventBus::default()),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            window: DEFAULT_WINDOW,
            render_limit: render::DEFAULT_RENDER_LIMIT,
        }
    }

    /// Attach the approval collaborator consulted for flagged actions.
    pub fn with_approver(mut self, approver: Arc<dyn ApprovalDecider>) -> Self {
        self.approver = approver;
        self
    }

    /// Share an event bus with outside subscribers.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_render_limit(mut self, limit: usize) -> Self {
        self.render_limit = limit;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Run one user turn to completion.
    ///
    /// Loops model call → extract → execute until the model answers in
    /// plain text or the iteration budget runs out. The caller is expected
    /// to have pushed the user's message already; this method appends the
    /// assistant traffic it generates.
    pub async fn run_turn(&self, conversation: &mut Conversation) -> TurnOutcome {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.len(),
            "Starting turn"
        );
        let schemas = self.runtime.catalog().list_enabled();
        let mut iteration = 0u32;

        loop {
            iteration += 1;
            if iteration > self.max_iterations {
                warn!(
                    conversation_id = %conversation.id,
                    budget = self.max_iterations,
                    "Iteration budget exhausted, ending turn"
                );
                conversation.push(Message::assistant(BUDGET_NOTICE));
                return TurnOutcome {
                    reply: BUDGET_NOTICE.to_string(),
                    termination: TurnTermination::BudgetExhausted,
                };
            }
            debug!(conversation_id = %conversation.id, iteration, "Turn iteration");

            let reply = match self
                .gateway
                .send(conversation.recent_window(self.window), &schemas)
                .await
            {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(conversation_id = %conversation.id, error = %err, "Model gateway failed");
                    self.events.publish(AgentEvent::GatewayFailed {
                        conversation_id: conversation.id.clone(),
                        detail: err.to_string(),
                        timestamp: Utc::now(),
                    });
                    let notice =
                        format!("I encountered an error communicating with the model: {err}");
                    conversation.push(Message::assistant(&notice));
                    return TurnOutcome {
                        reply: notice,
                        termination: TurnTermination::GatewayFailed,
                    };
                }
            };

            let Some(call) = extract(&reply.text) else {
                let final_text = render::clean_final_reply(&reply.text);
                conversation.push(Message::assistant(&final_text));
                info!(conversation_id = %conversation.id, iterations = iteration, "Turn complete");
                return TurnOutcome {
                    reply: final_text,
                    termination: TurnTermination::Completed,
                };
            };

            let (request, result, feedback) = self.dispatch(conversation, call, iteration).await;
            conversation.push(Message::assistant(&reply.text).with_request(request));
            conversation.push(Message::user(&feedback).with_result(result));
        }
    }

    /// Execute one extracted call, resolving the confirmation gate if the
    /// runtime raises it. Returns the stamped request, the terminal result,
    /// and the rendered feedback text.
    async fn dispatch(
        &self,
        conversation: &Conversation,
        call: ExtractedAction,
        step: u32,
    ) -> (ActionRequest, deskpilot_core::ActionResult, String) {
        let ExtractedAction {
            action,
            arguments,
            thought,
        } = call;

        if let Some(thought) = thought {
            self.events.publish(AgentEvent::Reasoning {
                conversation_id: conversation.id.clone(),
                text: thought,
                timestamp: Utc::now(),
            });
        }

        let request = ActionRequest::new(action.as_str(), arguments)
            .for_conversation(conversation.id.clone(), step);
        self.events.publish(AgentEvent::ActionStarted {
            conversation_id: conversation.id.clone(),
            request_id: request.id.clone(),
            action: request.action.clone(),
            timestamp: Utc::now(),
        });

        let mut result = self.runtime.execute(request.clone()).await;
        if result.status == ExecutionStatus::ConfirmationRequired {
            if self.approver.approve(&request).await {
                debug!(action = %request.action, "Approved, resubmitting confirmed request");
                result = self.runtime.execute(request.clone().confirm()).await;
            } else {
                info!(action = %request.action, "Denied by approver");
                result = self
                    .runtime
                    .record_cancelled(&request, "User cancelled the operation");
            }
        }

        self.events.publish(AgentEvent::ActionFinished {
            conversation_id: conversation.id.clone(),
            request_id: result.request_id.clone(),
            action: request.action.clone(),
            status: result.status,
            elapsed_ms: result.elapsed_ms,
            timestamp: Utc::now(),
        });

        let feedback = render::feedback_for_model(&request.action, &result, self.render_limit);
        (request, result, feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deskpilot_core::{
        ActionCategory, ActionDescriptor, ActionError, ActionHandler, ActionSchema, GatewayError,
        HandlerOutcome, ModelReply, PermissionTier, RiskLevel, TerminationReason, ToolCatalog,
    };
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CALL_PING: &str = "```json\n{\"thought\": \"Need to ping\", \"action\": \"ping\", \"arguments\": {}}\n```";

    struct ScriptedGateway {
        replies: Mutex<VecDeque<String>>,
        seen_window: Mutex<Vec<usize>>,
    }

    impl ScriptedGateway {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                seen_window: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(
            &self,
            messages: &[Message],
            _schemas: &[ActionSchema],
        ) -> Result<ModelReply, GatewayError> {
            self.seen_window.lock().unwrap().push(messages.len());
            match self.replies.lock().unwrap().pop_front() {
                Some(text) => Ok(ModelReply {
                    text,
                    termination: TerminationReason::Stop,
                }),
                None => Err(GatewayError::Unavailable("script exhausted".into())),
            }
        }
    }

    /// Always replies with the same action call; used for budget tests.
    struct RepeatingGateway;

    #[async_trait]
    impl ModelGateway for RepeatingGateway {
        fn name(&self) -> &str {
            "repeating"
        }

        async fn send(
            &self,
            _messages: &[Message],
            _schemas: &[ActionSchema],
        ) -> Result<ModelReply, GatewayError> {
            Ok(ModelReply {
                text: CALL_PING.into(),
                termination: TerminationReason::Stop,
            })
        }
    }

    struct FailingGateway;

    #[async_trait]
    impl ModelGateway for FailingGateway {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(
            &self,
            _messages: &[Message],
            _schemas: &[ActionSchema],
        ) -> Result<ModelReply, GatewayError> {
            Err(GatewayError::Timeout(120))
        }
    }

    struct CountingHandler {
        calls: AtomicUsize,
        payload: Value,
    }

    impl CountingHandler {
        fn new(payload: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                payload,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ActionHandler for CountingHandler {
        async fn run(&self, _arguments: Value) -> Result<HandlerOutcome, ActionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone().into())
        }
    }

    struct ApproveAll;

    #[async_trait]
    impl ApprovalDecider for ApproveAll {
        async fn approve(&self, _request: &ActionRequest) -> bool {
            true
        }
    }

    fn ping_descriptor() -> ActionDescriptor {
        ActionDescriptor::new(
            "ping",
            "Reply with pong",
            ActionCategory::System,
            RiskLevel::Low,
            PermissionTier::Observer,
        )
    }

    fn runtime_with(
        descriptor: ActionDescriptor,
        handler: Arc<dyn ActionHandler>,
    ) -> Arc<ToolRuntime> {
        let catalog = Arc::new(ToolCatalog::new());
        catalog.register(descriptor, handler).unwrap();
        Arc::new(ToolRuntime::new(catalog))
    }

    fn seeded_conversation() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("Please ping"));
        conversation
    }

    #[tokio::test]
    async fn plain_text_reply_completes() {
        let gateway = ScriptedGateway::new(&["The answer is 4."]);
        let runtime = runtime_with(ping_descriptor(), CountingHandler::new(json!("pong")));
        let controller = TurnController::new(gateway, runtime);

        let mut conversation = seeded_conversation();
        let outcome = controller.run_turn(&mut conversation).await;

        assert_eq!(outcome.reply, "The answer is 4.");
        assert_eq!(outcome.termination, TurnTermination::Completed);
        // User message plus the final assistant reply.
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn action_then_text_executes_handler_once() {
        let gateway = ScriptedGateway::new(&[CALL_PING, "Pinged successfully."]);
        let handler = CountingHandler::new(json!({"pong": true}));
        let runtime = runtime_with(ping_descriptor(), handler.clone());
        let controller = TurnController::new(gateway, runtime);

        let mut conversation = seeded_conversation();
        let outcome = controller.run_turn(&mut conversation).await;

        assert_eq!(handler.calls(), 1);
        assert_eq!(outcome.termination, TurnTermination::Completed);
        assert_eq!(outcome.reply, "Pinged successfully.");

        // user, raw assistant call, user feedback, final assistant.
        assert_eq!(conversation.len(), 4);
        let feedback = &conversation.recent_window(2)[0];
        assert!(feedback.content.contains("executed successfully"));
        assert!(feedback.content.contains("Please continue with the task"));
    }

    #[tokio::test]
    async fn degenerate_final_reply_becomes_filler() {
        let gateway = ScriptedGateway::new(&["ok"]);
        let runtime = runtime_with(ping_descriptor(), CountingHandler::new(json!("pong")));
        let controller = TurnController::new(gateway, runtime);

        let outcome = controller.run_turn(&mut seeded_conversation()).await;
        assert_eq!(outcome.reply, "Done!");
    }

    #[tokio::test]
    async fn repeating_actions_exhaust_budget() {
        let handler = CountingHandler::new(json!("pong"));
        let runtime = runtime_with(ping_descriptor(), handler.clone());
        let controller =
            TurnController::new(Arc::new(RepeatingGateway), runtime).with_max_iterations(3);

        let mut conversation = seeded_conversation();
        let outcome = controller.run_turn(&mut conversation).await;

        assert_eq!(outcome.termination, TurnTermination::BudgetExhausted);
        assert!(outcome.reply.contains("maximum number of actions"));
        assert_eq!(handler.calls(), 3);
    }

    #[tokio::test]
    async fn gateway_failure_yields_terminal_notice() {
        let runtime = runtime_with(ping_descriptor(), CountingHandler::new(json!("pong")));
        let controller = TurnController::new(Arc::new(FailingGateway), runtime);

        let mut conversation = seeded_conversation();
        let outcome = controller.run_turn(&mut conversation).await;

        assert_eq!(outcome.termination, TurnTermination::GatewayFailed);
        assert!(
            outcome
                .reply
                .starts_with("I encountered an error communicating with the model")
        );
        // The notice is part of the conversation for the next turn.
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn denied_confirmation_cancels_without_running_handler() {
        let gateway = ScriptedGateway::new(&[CALL_PING, "Understood, leaving it alone."]);
        let handler = CountingHandler::new(json!("pong"));
        let runtime = runtime_with(ping_descriptor().with_confirmation(), handler.clone());
        // Default approver denies everything.
        let controller = TurnController::new(gateway, runtime.clone());

        let mut conversation = seeded_conversation();
        let outcome = controller.run_turn(&mut conversation).await;

        assert_eq!(handler.calls(), 0);
        assert_eq!(outcome.termination, TurnTermination::Completed);

        let recorded = runtime.history().recent(10);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, ExecutionStatus::Cancelled);

        let feedback = &conversation.recent_window(2)[0];
        assert!(feedback.content.contains("User cancelled this operation."));
    }

    #[tokio::test]
    async fn approved_confirmation_runs_handler_once() {
        let gateway = ScriptedGateway::new(&[CALL_PING, "Pinged."]);
        let handler = CountingHandler::new(json!("pong"));
        let runtime = runtime_with(ping_descriptor().with_confirmation(), handler.clone());
        let controller =
            TurnController::new(gateway, runtime.clone()).with_approver(Arc::new(ApproveAll));

        let outcome = controller.run_turn(&mut seeded_conversation()).await;

        assert_eq!(handler.calls(), 1);
        assert_eq!(outcome.termination, TurnTermination::Completed);

        let recorded = runtime.history().recent(10);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].status, ExecutionStatus::Success);
    }

    #[tokio::test]
    async fn events_cover_the_action_lifecycle() {
        let gateway = ScriptedGateway::new(&[CALL_PING, "All done here."]);
        let runtime = runtime_with(ping_descriptor(), CountingHandler::new(json!("pong")));
        let controller = TurnController::new(gateway, runtime);

        let mut receiver = controller.events().subscribe();
        controller.run_turn(&mut seeded_conversation()).await;

        let first = receiver.recv().await.unwrap();
        assert!(matches!(first.as_ref(), AgentEvent::Reasoning { text, .. } if text == "Need to ping"));

        let second = receiver.recv().await.unwrap();
        assert!(
            matches!(second.as_ref(), AgentEvent::ActionStarted { action, .. } if action == "ping")
        );

        let third = receiver.recv().await.unwrap();
        match third.as_ref() {
            AgentEvent::ActionFinished { action, status, .. } => {
                assert_eq!(action, "ping");
                assert_eq!(*status, ExecutionStatus::Success);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_result_feedback_is_truncated() {
        let gateway = ScriptedGateway::new(&[CALL_PING, "Summarized."]);
        let handler = CountingHandler::new(json!({ "blob": "y".repeat(5000) }));
        let runtime = runtime_with(ping_descriptor(), handler);
        let controller = TurnController::new(gateway, runtime).with_render_limit(100);

        let mut conversation = seeded_conversation();
        controller.run_turn(&mut conversation).await;

        let feedback = &conversation.recent_window(2)[0];
        assert!(feedback.content.contains("... (truncated)"));
        assert!(feedback.content.len() < 600);
    }

    #[tokio::test]
    async fn model_window_is_bounded() {
        let gateway = ScriptedGateway::new(&["Noted."]);
        let runtime = runtime_with(ping_descriptor(), CountingHandler::new(json!("pong")));
        let controller = TurnController::new(gateway.clone(), runtime).with_window(5);

        let mut conversation = Conversation::new();
        for i in 0..30 {
            conversation.push(Message::user(format!("message {i}")));
        }
        controller.run_turn(&mut conversation).await;

        assert_eq!(*gateway.seen_window.lock().unwrap(), vec![5]);
    }
}
