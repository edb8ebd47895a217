//! `deskpilot chat` — Interactive or single-message chat mode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deskpilot_agent::TurnController;
use deskpilot_config::AppConfig;
use deskpilot_core::{ActionRequest, AgentEvent, ApprovalDecider, Conversation, Message};
use deskpilot_runtime::ToolRuntime;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // An OpenAI-flavored provider cannot work without a key; say so up
    // front instead of failing on the first request.
    if config.provider.kind == "openai" && config.provider.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    DESKPILOT_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY    = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!(
            "    {}",
            AppConfig::config_dir().join("config.toml").display()
        );
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let gateway = deskpilot_providers::build_from_config(&config.provider)
        .map_err(|e| format!("Failed to build model gateway: {e}"))?;

    let catalog = Arc::new(deskpilot_tools::default_catalog(&config)?);
    let enabled_actions = catalog.list_enabled().len();

    let mut runtime = ToolRuntime::new(catalog)
        .with_timeout(Duration::from_secs(config.runtime.action_timeout_secs))
        .with_workers(config.runtime.workers)
        .with_history_capacity(config.runtime.history_capacity);
    if let Some(tier) = config.runtime.tier() {
        runtime = runtime.with_session_tier(tier);
    }

    let controller = TurnController::new(gateway, Arc::new(runtime))
        .with_approver(Arc::new(StdinApprover))
        .with_max_iterations(config.agent.max_iterations)
        .with_window(config.agent.context_window)
        .with_render_limit(config.agent.render_limit);

    // Progress lines go to stderr so they never interleave with the reply.
    let mut events = controller.events().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.as_ref() {
                AgentEvent::ActionStarted { action, .. } => {
                    eprintln!("  [action] {action} ...");
                }
                AgentEvent::ActionFinished {
                    action,
                    status,
                    elapsed_ms,
                    ..
                } => {
                    eprintln!("  [action] {action} {status} ({elapsed_ms}ms)");
                }
                _ => {}
            }
        }
    });

    if let Some(msg) = message {
        // Single message mode
        let mut conversation = Conversation::new();
        conversation.push(Message::user(&msg));

        let outcome = controller.run_turn(&mut conversation).await;
        println!("{}", outcome.reply);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║         Deskpilot — Interactive Mode         ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.provider.kind);
    println!("  Model:     {}", config.provider.model);
    println!(
        "  Actions:   {} enabled (tier: {})",
        enabled_actions, config.runtime.session_tier
    );
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or 'quit' to end the session.");
    println!();

    let mut conversation = Conversation::new();

    loop {
        let line = tokio::task::spawn_blocking(|| prompt_line("  You > ")).await??;
        let Some(line) = line else { break };
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        conversation.push(Message::user(&line));
        let outcome = controller.run_turn(&mut conversation).await;

        println!();
        for reply_line in outcome.reply.lines() {
            println!("  Deskpilot > {reply_line}");
        }
        println!();
    }

    println!();
    println!("  Goodbye! 👋");
    println!();

    Ok(())
}

/// Print a prompt and read one trimmed line; `None` on EOF.
fn prompt_line(prompt: &str) -> std::io::Result<Option<String>> {
    use std::io::Write;

    print!("{prompt}");
    std::io::stdout().flush()?;

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}

/// Asks the operator on stdin before a gated action runs. Anything other
/// than an explicit yes is a denial.
struct StdinApprover;

#[async_trait]
impl ApprovalDecider for StdinApprover {
    async fn approve(&self, request: &ActionRequest) -> bool {
        let action = request.action.clone();
        let arguments = serde_json::Value::Object(request.arguments.clone()).to_string();

        let answer = tokio::task::spawn_blocking(move || {
            prompt_line(&format!(
                "\n  Allow action '{action}' with arguments {arguments}? [y/N] "
            ))
        })
        .await;

        match answer {
            Ok(Ok(Some(line))) => {
                let line = line.to_lowercase();
                line == "y" || line == "yes"
            }
            _ => false,
        }
    }
}
