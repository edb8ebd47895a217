//! Filesystem boundaries shared by every file action.
//!
//! A [`PathPolicy`] confines the bundled file actions to the configured
//! allowed roots and keeps them away from protected paths (~/.ssh, /etc,
//! and friends). Handlers check every model-supplied path through the
//! policy before touching the filesystem.

use std::path::{Path, PathBuf};

use deskpilot_config::SecuritySection;
use deskpilot_core::ActionError;

/// Why a path was refused.
#[derive(Debug, thiserror::Error)]
pub enum PolicyViolation {
    #[error("path '{0}' contains a traversal sequence")]
    Traversal(String),

    #[error("path '{path}' touches protected location '{pattern}'")]
    Protected { path: String, pattern: String },

    #[error("path '{0}' is outside the allowed roots")]
    OutsideRoots(String),

    #[error("cannot resolve path '{path}': {reason}")]
    Unresolvable { path: String, reason: String },
}

impl From<PolicyViolation> for ActionError {
    fn from(violation: PolicyViolation) -> Self {
        ActionError::Blocked(violation.to_string())
    }
}

/// Allowed roots plus protected paths, applied to every file argument.
///
/// An empty root list means any location is fine as long as no protected
/// path is touched. Comparison happens on the resolved path, lowercased
/// with forward slashes, so symlink tricks and case games on Windows do
/// not slip through.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    allowed_roots: Vec<String>,
    protected_paths: Vec<String>,
}

impl PathPolicy {
    pub fn new(allowed_roots: Vec<String>, protected_paths: Vec<String>) -> Self {
        Self {
            allowed_roots,
            protected_paths,
        }
    }

    pub fn from_config(security: &SecuritySection) -> Self {
        Self::new(
            security.allowed_roots.clone(),
            security.protected_paths.clone(),
        )
    }

    /// A policy that allows everything. Meant for tests.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Validate a model-supplied path and return its resolved form.
    ///
    /// Rejects raw traversal sequences before resolving, canonicalizes the
    /// path (or its parent for yet-to-exist files), then checks protected
    /// paths and allowed roots against the resolved string.
    pub fn check(&self, path: &str) -> Result<PathBuf, PolicyViolation> {
        let expanded = expand_tilde(path);

        let normalized_input = expanded.replace('\\', "/");
        if normalized_input.contains("../")
            || normalized_input.contains("/..")
            || normalized_input == ".."
        {
            return Err(PolicyViolation::Traversal(path.into()));
        }

        let resolved = resolve(Path::new(&expanded), path)?;
        let resolved_str = comparable(&resolved);

        for protected in &self.protected_paths {
            let pattern = comparable_str(&expand_tilde(protected));
            if resolved_str.starts_with(&pattern) {
                return Err(PolicyViolation::Protected {
                    path: path.into(),
                    pattern: protected.clone(),
                });
            }
        }

        if !self.allowed_roots.is_empty() {
            let inside = self.allowed_roots.iter().any(|root| {
                let root = comparable_str(&expand_tilde(root));
                resolved_str.starts_with(&root)
            });
            if !inside {
                return Err(PolicyViolation::OutsideRoots(path.into()));
            }
        }

        Ok(resolved)
    }
}

/// Canonicalize, falling back to the parent for paths that do not exist
/// yet (writes, moves) and to the raw path when nothing resolves.
fn resolve(input: &Path, original: &str) -> Result<PathBuf, PolicyViolation> {
    if input.exists() {
        return input
            .canonicalize()
            .map_err(|e| PolicyViolation::Unresolvable {
                path: original.into(),
                reason: e.to_string(),
            });
    }

    if let Some(parent) = input.parent()
        && parent.exists()
    {
        let parent = parent
            .canonicalize()
            .map_err(|e| PolicyViolation::Unresolvable {
                path: original.into(),
                reason: format!("parent dir: {e}"),
            })?;
        return Ok(parent.join(input.file_name().unwrap_or_default()));
    }

    Ok(input.to_path_buf())
}

/// Lowercased forward-slash form used for prefix comparison. Strips the
/// `\\?\` prefix Windows canonicalization adds.
fn comparable(path: &Path) -> String {
    comparable_str(&path.to_string_lossy())
}

fn comparable_str(path: &str) -> String {
    let normalized = path.replace('\\', "/").to_lowercase();
    normalized
        .strip_prefix("//?/")
        .unwrap_or(&normalized)
        .to_string()
}

/// Expand a leading ~ to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if (path.starts_with("~/") || path == "~")
        && let Some(home) = home_dir()
    {
        return path.replacen('~', &home, 1);
    }
    path.to_string()
}

fn home_dir() -> Option<String> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE").ok()
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME").ok()
    }
}
