//! Shared configuration for the RainCloud CLI.
//!
//! TOML account entries keyed by unique id (the lower-cased username),
//! credential resolution (env + keyring + plaintext), and translation to
//! `raincloud_core::HubConfig`. The CLI adds flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use raincloud_core::{
    DEFAULT_POLL_INTERVAL, DEFAULT_WATERING_MINUTES, HubConfig, unique_id_for,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Keyring service name for stored passwords.
pub const KEYRING_SERVICE: &str = "raincloud";

/// Env var overriding the config file location.
pub const CONFIG_ENV: &str = "RAINCLOUD_CONFIG";

/// Env var holding a password for whichever account is selected.
pub const PASSWORD_ENV: &str = "RAINCLOUD_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("account '{unique_id}' is already configured")]
    AlreadyConfigured { unique_id: String },

    #[error("account '{name}' not found")]
    AccountNotFound { name: String },

    #[error("no account selected and no default account configured")]
    NoAccount,

    #[error("no credentials configured for account '{account}'")]
    NoCredentials { account: String },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Unique id of the account used when none is selected.
    pub default_account: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Account entries keyed by unique id.
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    /// Poll cadence as a humantime duration, e.g. `"10s"`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Manual watering length in minutes.
    #[serde(default = "default_watering_minutes")]
    pub watering_minutes: u32,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            watering_minutes: default_watering_minutes(),
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_poll_interval() -> String {
    humantime::format_duration(DEFAULT_POLL_INTERVAL).to_string()
}
fn default_watering_minutes() -> u32 {
    DEFAULT_WATERING_MINUTES
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// One configured account.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Account {
    pub username: String,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override the poll cadence.
    pub poll_interval: Option<String>,

    /// Override the manual watering length.
    pub watering_minutes: Option<u32>,

    /// Serve this account from a simulated-account JSON fixture.
    pub fixture: Option<PathBuf>,
}

impl Account {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
            password_env: None,
            poll_interval: None,
            watering_minutes: None,
            fixture: None,
        }
    }

    pub fn unique_id(&self) -> String {
        unique_id_for(&self.username)
    }
}

// ── Account entries ─────────────────────────────────────────────────

impl Config {
    /// Add a new account entry; one entry per unique id.
    ///
    /// The first account added becomes the default.
    pub fn add_account(&mut self, account: Account) -> Result<String, ConfigError> {
        let unique_id = account.unique_id();
        if unique_id.is_empty() {
            return Err(ConfigError::Validation {
                field: "username".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.accounts.contains_key(&unique_id) {
            return Err(ConfigError::AlreadyConfigured { unique_id });
        }
        self.accounts.insert(unique_id.clone(), account);
        if self.default_account.is_none() {
            self.default_account = Some(unique_id.clone());
        }
        Ok(unique_id)
    }

    /// Replace the stored password of an existing entry.
    ///
    /// `None` clears the plaintext password (it lives in the keyring).
    pub fn reauth_account(
        &mut self,
        unique_id: &str,
        password: Option<String>,
    ) -> Result<(), ConfigError> {
        let account = self
            .accounts
            .get_mut(unique_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                name: unique_id.into(),
            })?;
        account.password = password;
        Ok(())
    }

    pub fn remove_account(&mut self, unique_id: &str) -> Result<Account, ConfigError> {
        let account =
            self.accounts
                .remove(unique_id)
                .ok_or_else(|| ConfigError::AccountNotFound {
                    name: unique_id.into(),
                })?;
        if self.default_account.as_deref() == Some(unique_id) {
            self.default_account = self.accounts.keys().next().cloned();
        }
        Ok(account)
    }

    /// Select an account: the named one, else the default, else the only one.
    ///
    /// Names match case-insensitively, like unique ids.
    pub fn account(&self, name: Option<&str>) -> Result<(String, &Account), ConfigError> {
        let unique_id = match name {
            Some(name) => unique_id_for(name),
            None => match (&self.default_account, self.accounts.len()) {
                (Some(default), _) => default.clone(),
                (None, 1) => self.accounts.keys().next().cloned().unwrap_or_default(),
                (None, _) => return Err(ConfigError::NoAccount),
            },
        };
        let account = self
            .accounts
            .get(&unique_id)
            .ok_or_else(|| ConfigError::AccountNotFound {
                name: unique_id.clone(),
            })?;
        Ok((unique_id, account))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `RAINCLOUD_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "raincloud", "raincloud").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("raincloud");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + `RAINCLOUD_`-prefixed environment.
///
/// Nested keys use a double underscore: `RAINCLOUD_DEFAULTS__POLL_INTERVAL`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("RAINCLOUD_")
                .ignore(&["CONFIG", "PASSWORD", "USERNAME", "FIXTURE", "ACCOUNT"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_user(unique_id: &str) -> String {
    format!("{unique_id}/password")
}

/// Resolve an account password without CLI flags.
///
/// Chain: the account's `password_env` variable, `RAINCLOUD_PASSWORD`,
/// the system keyring, then the plaintext entry.
pub fn resolve_password(account: &Account, unique_id: &str) -> Result<SecretString, ConfigError> {
    // 1. Account's password_env → env var lookup
    if let Some(ref env_name) = account.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Shared env var
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    match keyring::Entry::new(KEYRING_SERVICE, &keyring_user(unique_id)) {
        Ok(entry) => match entry.get_password() {
            Ok(pw) => return Ok(SecretString::from(pw)),
            Err(e) => debug!(error = %e, "no keyring password"),
        },
        Err(e) => debug!(error = %e, "keyring unavailable"),
    }

    // 4. Plaintext in config
    if let Some(ref pw) = account.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        account: unique_id.into(),
    })
}

/// Store a password in the system keyring.
pub fn store_password(unique_id: &str, password: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_user(unique_id))
        .and_then(|entry| entry.set_password(password))
        .map_err(|e| ConfigError::Keyring(e.to_string()))
}

/// Remove a stored password; a missing entry is not an error.
pub fn delete_password(unique_id: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(unique_id))
        .map_err(|e| ConfigError::Keyring(e.to_string()))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(ConfigError::Keyring(e.to_string())),
    }
}

// ── Translation to HubConfig ────────────────────────────────────────

/// Parse a humantime duration field.
pub fn parse_poll_interval(raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| ConfigError::Validation {
        field: "poll_interval".into(),
        reason: format!("'{raw}': {e}"),
    })
}

/// Build a `HubConfig` from an account entry, resolving its password.
pub fn account_to_hub_config(
    account: &Account,
    unique_id: &str,
    defaults: &Defaults,
) -> Result<HubConfig, ConfigError> {
    let password = resolve_password(account, unique_id)?;
    build_hub_config(account, password, defaults)
}

/// Build a `HubConfig` for an account with an already-known password.
pub fn build_hub_config(
    account: &Account,
    password: SecretString,
    defaults: &Defaults,
) -> Result<HubConfig, ConfigError> {
    let poll_interval = parse_poll_interval(
        account
            .poll_interval
            .as_deref()
            .unwrap_or(&defaults.poll_interval),
    )?;
    let watering_minutes = account
        .watering_minutes
        .unwrap_or(defaults.watering_minutes);

    let config = HubConfig::new(account.username.clone(), password)
        .with_poll_interval(poll_interval)
        .with_watering_minutes(watering_minutes);
    config.validate().map_err(|e| ConfigError::Validation {
        field: "account".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    #[test]
    fn add_account_rejects_same_username_in_other_case() {
        let mut config = Config::default();
        let id = config.add_account(Account::new("Gardener@Example.com")).unwrap();
        assert_eq!(id, "gardener@example.com");
        assert_eq!(config.default_account.as_deref(), Some("gardener@example.com"));

        let err = config
            .add_account(Account::new("gardener@example.com"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyConfigured { .. }));
    }

    #[test]
    fn reauth_replaces_password_of_existing_entry() {
        let mut config = Config::default();
        let mut account = Account::new("a@b.c");
        account.password = Some("old".into());
        config.add_account(account).unwrap();

        config.reauth_account("a@b.c", Some("new".into())).unwrap();
        assert_eq!(config.accounts["a@b.c"].password.as_deref(), Some("new"));
        assert!(matches!(
            config.reauth_account("x@y.z", None),
            Err(ConfigError::AccountNotFound { .. })
        ));
    }

    #[test]
    fn removing_default_promotes_another_account() {
        let mut config = Config::default();
        config.add_account(Account::new("a@b.c")).unwrap();
        config.add_account(Account::new("d@e.f")).unwrap();

        config.remove_account("a@b.c").unwrap();
        assert_eq!(config.default_account.as_deref(), Some("d@e.f"));
        assert_eq!(config.account(None).unwrap().0, "d@e.f");
    }

    #[test]
    fn account_selection_is_case_insensitive() {
        let mut config = Config::default();
        config.add_account(Account::new("a@b.c")).unwrap();
        assert_eq!(config.account(Some("A@B.C")).unwrap().0, "a@b.c");
        assert!(config.account(Some("nobody")).is_err());
    }

    #[test]
    fn round_trips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        let mut account = Account::new("a@b.c");
        account.poll_interval = Some("30s".into());
        account.fixture = Some(PathBuf::from("/tmp/fixture.json"));
        config.add_account(account).unwrap();
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.accounts.is_empty());
        assert_eq!(loaded.defaults.poll_interval, "10s");
        assert_eq!(loaded.defaults.watering_minutes, 15);
    }

    #[test]
    fn password_env_takes_precedence_over_plaintext() {
        let mut account = Account::new("a@b.c");
        account.password = Some("plaintext".into());
        // PATH is always set, so the env step wins.
        account.password_env = Some("PATH".into());

        let pw = resolve_password(&account, "raincloud-test-a@b.c").unwrap();
        assert_eq!(pw.expose_secret(), std::env::var("PATH").unwrap());
    }

    #[test]
    fn hub_config_applies_account_overrides() {
        let mut account = Account::new("Gardener@Example.com");
        account.poll_interval = Some("1m".into());
        account.watering_minutes = Some(30);

        let hub = build_hub_config(&account, SecretString::from("pw"), &Defaults::default())
            .unwrap();
        assert_eq!(hub.poll_interval, Duration::from_secs(60));
        assert_eq!(hub.watering_minutes, 30);
        assert_eq!(hub.unique_id(), "gardener@example.com");
    }

    #[test]
    fn hub_config_rejects_bad_values() {
        let mut account = Account::new("a@b.c");
        account.poll_interval = Some("soon".into());
        assert!(build_hub_config(&account, SecretString::from("pw"), &Defaults::default()).is_err());

        account.poll_interval = None;
        account.watering_minutes = Some(12);
        let err = build_hub_config(&account, SecretString::from("pw"), &Defaults::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
