//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use raincloud_config::ConfigError;
use raincloud_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {service}: {reason}")]
    #[diagnostic(
        code(raincloud::connection_failed),
        help("Check that the service is reachable and try again.")
    )]
    ConnectionFailed { service: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(code(raincloud::timeout))]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(raincloud::auth_failed),
        help(
            "Verify the username and password.\n\
             Update a stored password with: raincloud config reauth"
        )
    )]
    AuthFailed { message: String },

    #[error("No password available for account '{account}'")]
    #[diagnostic(
        code(raincloud::no_credentials),
        help(
            "Store one with: raincloud config reauth --account {account}\n\
             Or set the RAINCLOUD_PASSWORD environment variable."
        )
    )]
    NoCredentials { account: String },

    // ── Entities ─────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(raincloud::not_found),
        help("Run: raincloud {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("'{unique_id}' is a {platform}, not a switch")]
    #[diagnostic(
        code(raincloud::not_a_switch),
        help("Run: raincloud status --platform switch to list switches")
    )]
    NotASwitch { unique_id: String, platform: String },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(raincloud::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    // ── Writes and refreshes ─────────────────────────────────────────
    #[error("Write to {target} failed: {message}")]
    #[diagnostic(code(raincloud::write_failed))]
    WriteFailed { target: String, message: String },

    #[error("Rain delay failed on {failed} zone(s), {succeeded} succeeded")]
    #[diagnostic(
        code(raincloud::partial_fan_out),
        help("{details}\nZones that succeeded keep the new delay; rerun to retry the rest.")
    )]
    PartialFanOut {
        failed: usize,
        succeeded: usize,
        details: String,
    },

    #[error("Refresh failed: {message}")]
    #[diagnostic(code(raincloud::refresh_failed))]
    RefreshFailed { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(raincloud::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Account '{name}' not found in configuration")]
    #[diagnostic(
        code(raincloud::account_not_found),
        help("List accounts with: raincloud config show")
    )]
    AccountNotFound { name: String },

    #[error("No account configured")]
    #[diagnostic(
        code(raincloud::no_account),
        help(
            "Create one with: raincloud config init\n\
             Or pass --username and --fixture.\n\
             Expected at: {path}"
        )
    )]
    NoAccount { path: String },

    #[error("Account '{account}' has no fixture to serve it")]
    #[diagnostic(
        code(raincloud::no_fixture),
        help("Pass --fixture <FILE> or set `fixture` on the account.")
    )]
    NoFixture { account: String },

    #[error("Keyring error: {0}")]
    #[diagnostic(code(raincloud::keyring))]
    Keyring(String),

    #[error(transparent)]
    #[diagnostic(code(raincloud::config))]
    Config(Box<figment::Error>),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(raincloud::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(raincloud::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    #[diagnostic(code(raincloud::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(raincloud::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::AccountNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. }
            | Self::NotASwitch { .. }
            | Self::NoFixture { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::ConnectionFailed { service, reason } => {
                CliError::ConnectionFailed { service, reason }
            }

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            // Setup failures keep the exit code of what went wrong.
            CoreError::SetupFailed { source } => CliError::from(*source),

            CoreError::FetchFailed { message } => CliError::RefreshFailed { message },

            CoreError::NotReady => CliError::RefreshFailed {
                message: "the first refresh has not completed".into(),
            },

            CoreError::MutateFailed { target, message } => {
                CliError::WriteFailed { target, message }
            }

            CoreError::PartialFanOut { failed, succeeded } => CliError::PartialFanOut {
                details: failed
                    .iter()
                    .map(|f| format!("  {}: {}", f.zone, f.reason))
                    .collect::<Vec<_>>()
                    .join("\n"),
                failed: failed.len(),
                succeeded: succeeded.len(),
            },

            CoreError::ZoneNotFound { zone } => CliError::NotFound {
                resource_type: "zone".into(),
                identifier: zone,
                list_command: "status".into(),
            },

            CoreError::EntityNotFound { unique_id } => CliError::NotFound {
                resource_type: "entity".into(),
                identifier: unique_id,
                list_command: "status".into(),
            },

            CoreError::NotAControl {
                unique_id,
                platform,
            } => CliError::NotASwitch {
                unique_id,
                platform,
            },

            CoreError::DuplicateEntity { unique_id } => CliError::Conflict {
                resource_type: "entity".into(),
                identifier: unique_id,
            },

            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::AlreadyConfigured { unique_id } => CliError::Conflict {
                resource_type: "account".into(),
                identifier: unique_id,
            },
            ConfigError::AccountNotFound { name } => CliError::AccountNotFound { name },
            ConfigError::NoAccount => CliError::NoAccount {
                path: raincloud_config::config_path().display().to_string(),
            },
            ConfigError::NoCredentials { account } => CliError::NoCredentials { account },
            ConfigError::Keyring(message) => CliError::Keyring(message),
            ConfigError::Serialization(e) => CliError::Internal(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use raincloud_core::{FanOutFailure, ObjectId};

    use super::*;

    #[test]
    fn setup_failure_keeps_underlying_exit_code() {
        let err = CoreError::SetupFailed {
            source: Box::new(CoreError::ConnectionFailed {
                service: "raincloud".into(),
                reason: "refused".into(),
            }),
        };
        assert_eq!(CliError::from(err).exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn partial_fan_out_lists_failed_zones() {
        let err = CliError::from(CoreError::PartialFanOut {
            failed: vec![FanOutFailure {
                zone: ObjectId::zone("F1", 2),
                reason: "rejected".into(),
            }],
            succeeded: vec![ObjectId::zone("F1", 1), ObjectId::zone("F1", 3)],
        });
        assert_eq!(err.exit_code(), exit_code::GENERAL);
        let CliError::PartialFanOut {
            failed,
            succeeded,
            details,
        } = err
        else {
            panic!("expected a partial fan-out error");
        };
        assert_eq!((failed, succeeded), (1, 2));
        assert!(details.contains("zone:F1/2"), "details: {details}");
    }

    #[test]
    fn config_errors_map_to_usage_and_auth_codes() {
        let invalid = CliError::from(ConfigError::Validation {
            field: "poll_interval".into(),
            reason: "bad".into(),
        });
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        let missing = CliError::from(ConfigError::NoCredentials {
            account: "gardener@example.com".into(),
        });
        assert_eq!(missing.exit_code(), exit_code::AUTH);
    }
}
