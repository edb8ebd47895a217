//! Model gateway implementations for Deskpilot.
//!
//! Everything here implements the `deskpilot_core::ModelGateway` trait.
//! The factory resolves defaults from the provider kind, so an empty
//! config file still reaches a local Ollama.

use std::sync::Arc;
use std::time::Duration;

use deskpilot_config::ProviderSection;
use deskpilot_core::{GatewayError, ModelGateway};

pub mod openai_compat;
pub mod prompt;

pub use openai_compat::OpenAiCompatGateway;
pub use prompt::build_system_prompt;

/// Build the configured gateway.
///
/// Every supported kind speaks the OpenAI-compatible chat API; the kind
/// only picks the default base URL and whether a key is mandatory.
pub fn build_from_config(
    provider: &ProviderSection,
) -> Result<Arc<dyn ModelGateway>, GatewayError> {
    Ok(Arc::new(compat_from_config(provider)?))
}

/// Build the concrete client. For callers that need more than the trait
/// surface, such as the doctor command listing served models.
pub fn compat_from_config(
    provider: &ProviderSection,
) -> Result<OpenAiCompatGateway, GatewayError> {
    if provider.kind == "openai" && provider.api_key.is_none() {
        return Err(GatewayError::NotConfigured(
            "provider 'openai' requires an api_key (set DESKPILOT_API_KEY)".into(),
        ));
    }

    let base_url = provider
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url(&provider.kind));

    let mut gateway = OpenAiCompatGateway::new(&provider.kind, base_url, &provider.model)
        .with_temperature(provider.temperature)
        .with_max_tokens(provider.max_tokens)
        .with_request_timeout(Duration::from_secs(provider.request_timeout_secs));

    if let Some(api_key) = &provider.api_key {
        gateway = gateway.with_api_key(api_key);
    }

    Ok(gateway)
}

/// Default base URL for well-known provider kinds.
pub fn default_base_url(kind: &str) -> String {
    match kind {
        "openai" => "https://api.openai.com/v1".into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        // Ollama, and anything we have never heard of running locally.
        _ => "http://localhost:11434/v1".into(),
    }
}
