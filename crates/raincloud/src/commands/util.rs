//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::time::Duration;

use dialoguer::{Confirm, Input, Password, Select};
use raincloud_core::Hub;
use tracing::debug;

use crate::cli::SecretStore;
use crate::error::CliError;

/// Wait until a poll newer than `after` completes, or give up at `limit`.
pub async fn wait_for_refresh(hub: &Hub, after: u64, limit: Duration) {
    let mut status = hub.coordinator().status();
    let waited = tokio::time::timeout(limit, status.wait_for(|s| s.polls > after)).await;
    if waited.is_err() {
        debug!(?limit, "no refresh completed in time");
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to prompt on, `--yes` is required.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(prompt_err)
}

/// Prompt for a value unless one was given on the command line.
pub fn input_or(given: Option<String>, prompt: &str) -> Result<String, CliError> {
    if let Some(value) = given {
        return Ok(value);
    }
    Input::new()
        .with_prompt(prompt)
        .interact_text()
        .map_err(prompt_err)
}

/// The password from `RAINCLOUD_PASSWORD`, else a hidden prompt.
pub fn password() -> Result<String, CliError> {
    if let Ok(pw) = std::env::var(raincloud_config::PASSWORD_ENV) {
        return Ok(pw);
    }
    let pw = Password::new()
        .with_prompt("Password")
        .interact()
        .map_err(prompt_err)?;
    if pw.is_empty() {
        return Err(CliError::Validation {
            field: "password".into(),
            reason: "cannot be empty".into(),
        });
    }
    Ok(pw)
}

/// Where to keep a password, asking when no `--store` was given.
pub fn secret_store(given: Option<SecretStore>) -> Result<SecretStore, CliError> {
    if let Some(store) = given {
        return Ok(store);
    }
    let choices = [
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(&choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    Ok(if selection == 0 {
        SecretStore::Keyring
    } else {
        SecretStore::Plaintext
    })
}
