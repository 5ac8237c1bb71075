// ── Runtime account configuration ──
//
// Describes one account login: credentials plus polling and watering
// tuning. Never touches disk; the CLI builds a `HubConfig` from
// raincloud-config and hands it in.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::CoreError;

/// Poll cadence used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Manual watering length (minutes) used when none is configured.
pub const DEFAULT_WATERING_MINUTES: u32 = 15;

/// Manual watering lengths the service accepts.
pub const ALLOWED_WATERING_MINUTES: [u32; 6] = [5, 10, 15, 30, 45, 60];

/// Configuration for a single account.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub username: String,
    pub password: SecretString,
    /// How often the background task polls.
    pub poll_interval: Duration,
    /// Minutes a manual watering switch runs when turned on.
    pub watering_minutes: u32,
}

impl HubConfig {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            poll_interval: DEFAULT_POLL_INTERVAL,
            watering_minutes: DEFAULT_WATERING_MINUTES,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_watering_minutes(mut self, minutes: u32) -> Self {
        self.watering_minutes = minutes;
        self
    }

    /// Durable key of the account: the lower-cased username.
    pub fn unique_id(&self) -> String {
        unique_id_for(&self.username)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.username.trim().is_empty() {
            return Err(CoreError::Validation {
                message: "username must not be empty".into(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation {
                message: "poll interval must be greater than zero".into(),
            });
        }
        if !ALLOWED_WATERING_MINUTES.contains(&self.watering_minutes) {
            return Err(CoreError::Validation {
                message: format!(
                    "watering time must be one of {ALLOWED_WATERING_MINUTES:?} minutes, got {}",
                    self.watering_minutes
                ),
            });
        }
        Ok(())
    }
}

/// Account key derived from a username.
pub fn unique_id_for(username: &str) -> String {
    username.trim().to_lowercase()
}
