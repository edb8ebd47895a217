//! Built-in action pack for Deskpilot.
//!
//! One module per action, each exporting a `descriptor()` and a handler.
//! Filesystem actions share a [`PathPolicy`]; `shell_run` carries its own
//! command allowlist. [`default_catalog`] wires the full set into a
//! [`ToolCatalog`] from configuration.

pub mod app_open;
pub mod dir_create;
pub mod dir_list;
pub mod file_copy;
pub mod file_delete;
pub mod file_info;
pub mod file_move;
pub mod file_read;
pub mod file_search;
pub mod file_write;
pub mod policy;
pub mod shell_run;

use std::sync::Arc;

use deskpilot_config::AppConfig;
use deskpilot_core::{ActionDescriptor, ActionError, ActionHandler, ToolCatalog};
use tracing::warn;

pub use policy::{PathPolicy, PolicyViolation};

/// Build the full built-in catalog, honoring the configured security
/// boundaries, extra confirmation flags, and disabled actions.
///
/// Registration order is fixed, so the schema listing the model sees is
/// stable across runs.
pub fn default_catalog(config: &AppConfig) -> Result<ToolCatalog, ActionError> {
    let policy = PathPolicy::from_config(&config.security);
    let confirm_extra = &config.security.confirm_actions;

    let catalog = ToolCatalog::new();
    let entries: Vec<(ActionDescriptor, Arc<dyn ActionHandler>)> = vec![
        (
            file_read::descriptor(),
            Arc::new(file_read::FileReadHandler::new(policy.clone())),
        ),
        (
            file_write::descriptor(),
            Arc::new(file_write::FileWriteHandler::new(policy.clone())),
        ),
        (
            file_delete::descriptor(),
            Arc::new(file_delete::FileDeleteHandler::new(policy.clone())),
        ),
        (
            file_copy::descriptor(),
            Arc::new(file_copy::FileCopyHandler::new(policy.clone())),
        ),
        (
            file_move::descriptor(),
            Arc::new(file_move::FileMoveHandler::new(policy.clone())),
        ),
        (
            file_info::descriptor(),
            Arc::new(file_info::FileInfoHandler::new(policy.clone())),
        ),
        (
            file_search::descriptor(),
            Arc::new(file_search::FileSearchHandler::new(policy.clone())),
        ),
        (
            dir_list::descriptor(),
            Arc::new(dir_list::DirListHandler::new(policy.clone())),
        ),
        (
            dir_create::descriptor(),
            Arc::new(dir_create::DirCreateHandler::new(policy)),
        ),
        (app_open::descriptor(), Arc::new(app_open::AppOpenHandler::new())),
        (
            shell_run::descriptor(),
            Arc::new(shell_run::ShellRunHandler::new(
                config.security.allowed_commands.clone(),
            )),
        ),
    ];

    for (mut descriptor, handler) in entries {
        if confirm_extra.contains(&descriptor.name) {
            descriptor = descriptor.with_confirmation();
        }
        catalog.register(descriptor, handler)?;
    }

    for name in &config.runtime.disabled_actions {
        if !catalog.disable(name) {
            warn!(action = %name, "Cannot disable unknown action");
        }
    }

    Ok(catalog)
}
