//! Configuration loading and validation for Deskpilot.
//!
//! Loads `~/.deskpilot/config.toml` with environment variable overrides
//! and validates every setting at startup. A missing file is not an
//! error; defaults describe a local Ollama setup that works out of the
//! box.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use deskpilot_core::PermissionTier;

/// The root configuration structure.
///
/// Maps directly to `~/.deskpilot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider connection.
    #[serde(default)]
    pub provider: ProviderSection,

    /// Action execution settings.
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// Turn loop settings.
    #[serde(default)]
    pub agent: AgentSection,

    /// Filesystem and command boundaries for the bundled actions.
    #[serde(default)]
    pub security: SecuritySection,
}

/// Connection settings for the model gateway.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    /// Provider flavor. `"ollama"` and `"openai"` both speak the
    /// OpenAI-compatible chat API; they differ only in defaults.
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    /// Base URL of the chat completions API. When absent the gateway
    /// resolves a well-known URL from `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Bearer token. Optional; local Ollama needs none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout for one model request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: None,
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    match secret {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSection")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Action execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSection {
    /// Session permission tier: observer, operator, administrator, system.
    #[serde(default = "default_session_tier")]
    pub session_tier: String,

    /// Wall-clock bound per action, queue wait included.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// Handlers allowed to run at once.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Terminal results retained for inspection.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Actions hidden from the model and the runtime.
    #[serde(default)]
    pub disabled_actions: Vec<String>,
}

fn default_session_tier() -> String {
    "operator".into()
}
fn default_action_timeout_secs() -> u64 {
    30
}
fn default_workers() -> usize {
    4
}
fn default_history_capacity() -> usize {
    100
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            session_tier: default_session_tier(),
            action_timeout_secs: default_action_timeout_secs(),
            workers: default_workers(),
            history_capacity: default_history_capacity(),
            disabled_actions: vec![],
        }
    }
}

impl RuntimeSection {
    /// The configured tier, if the name is one of the four known tiers.
    pub fn tier(&self) -> Option<PermissionTier> {
        PermissionTier::from_name(&self.session_tier)
    }
}

/// Turn loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Hard bound on actions per user turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Most recent messages sent to the model.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Character cap when rendering an action result back to the model.
    #[serde(default = "default_render_limit")]
    pub render_limit: usize,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_context_window() -> usize {
    20
}
fn default_render_limit() -> usize {
    1000
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            context_window: default_context_window(),
            render_limit: default_render_limit(),
        }
    }
}

/// Filesystem and command boundaries enforced by the bundled actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySection {
    /// Roots file actions may touch. Empty means no root restriction.
    #[serde(default)]
    pub allowed_roots: Vec<String>,

    /// Paths no file action may touch, restriction or not.
    #[serde(default = "default_protected_paths")]
    pub protected_paths: Vec<String>,

    /// Binaries `shell_run` may invoke.
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,

    /// Actions forced to require confirmation, beyond the built-in set.
    #[serde(default)]
    pub confirm_actions: Vec<String>,
}

fn default_protected_paths() -> Vec<String> {
    vec![
        "/etc".into(),
        "/proc".into(),
        "/sys".into(),
        "/boot".into(),
        "~/.ssh".into(),
        "~/.gnupg".into(),
        "~/.aws".into(),
    ]
}

fn default_allowed_commands() -> Vec<String> {
    vec![
        "ls".into(),
        "cat".into(),
        "grep".into(),
        "find".into(),
        "echo".into(),
        "date".into(),
        "whoami".into(),
        "uname".into(),
        "df".into(),
        "ps".into(),
        "git".into(),
    ]
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            allowed_roots: vec![],
            protected_paths: default_protected_paths(),
            allowed_commands: default_allowed_commands(),
            confirm_actions: vec![],
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deskpilot/config.toml).
    ///
    /// Environment variables override the file:
    /// - `DESKPILOT_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `DESKPILOT_MODEL`
    /// - `DESKPILOT_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.provider.api_key.is_none() {
            config.provider.api_key = std::env::var("DESKPILOT_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }
        if let Ok(model) = std::env::var("DESKPILOT_MODEL") {
            config.provider.model = model;
        }
        if let Ok(base_url) = std::env::var("DESKPILOT_BASE_URL") {
            config.provider.base_url = Some(base_url);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deskpilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if let Some(base_url) = &self.provider.base_url {
            if base_url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "provider.base_url must not be empty when set".into(),
                ));
            }
        }
        if self.runtime.tier().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "runtime.session_tier '{}' is not one of observer, operator, administrator, system",
                self.runtime.session_tier
            )));
        }
        if self.runtime.workers == 0 {
            return Err(ConfigError::ValidationError(
                "runtime.workers must be at least 1".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.provider.kind, "ollama");
        assert_eq!(config.provider.base_url, None);
        assert_eq!(config.runtime.tier(), Some(PermissionTier::Operator));
        assert_eq!(config.agent.max_iterations, 10);
        assert_eq!(config.agent.context_window, 20);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.runtime.workers, config.runtime.workers);
        assert_eq!(parsed.agent.render_limit, config.agent.render_limit);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            provider: ProviderSection {
                temperature: 5.0,
                ..ProviderSection::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_tier_rejected() {
        let config = AppConfig {
            runtime: RuntimeSection {
                session_tier: "root".into(),
                ..RuntimeSection::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_base_url_rejected() {
        let config = AppConfig {
            provider: ProviderSection {
                base_url: Some("  ".into()),
                ..ProviderSection::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_rejected() {
        let config = AppConfig {
            runtime: RuntimeSection {
                workers: 0,
                ..RuntimeSection::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().provider.kind, "ollama");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[provider]
model = "qwen2.5"

[runtime]
session_tier = "administrator"
disabled_actions = ["shell_run"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.provider.model, "qwen2.5");
        assert_eq!(config.provider.base_url, None);
        assert_eq!(config.runtime.tier(), Some(PermissionTier::Administrator));
        assert_eq!(config.runtime.disabled_actions, vec!["shell_run"]);
        assert_eq!(config.agent.max_iterations, 10);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[provider\nmodel=").unwrap();

        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let config = ProviderSection {
            api_key: Some("sk-very-secret".into()),
            ..ProviderSection::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
