//! Config subcommand handlers.

use std::fmt::Write as _;

use raincloud_config::{Account, Config};
use raincloud_core::{CredentialCheck, validate_credentials};
use secrecy::SecretString;
use tracing::warn;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, SecretStore};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking passwords.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_account {
        let _ = writeln!(out, "default_account = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "poll_interval = \"{}\"", cfg.defaults.poll_interval);
    let _ = writeln!(out, "watering_minutes = {}", cfg.defaults.watering_minutes);
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);

    for (id, a) in &cfg.accounts {
        let _ = writeln!(out);
        let _ = writeln!(out, "[accounts.\"{id}\"]");
        let _ = writeln!(out, "username = \"{}\"", a.username);
        if a.password.is_some() {
            let _ = writeln!(out, "password = \"{MASK}\"");
        }
        if let Some(ref env) = a.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        if let Some(ref interval) = a.poll_interval {
            let _ = writeln!(out, "poll_interval = \"{interval}\"");
        }
        if let Some(minutes) = a.watering_minutes {
            let _ = writeln!(out, "watering_minutes = {minutes}");
        }
        if let Some(ref fixture) = a.fixture {
            let _ = writeln!(out, "fixture = \"{}\"", fixture.display());
        }
    }

    out
}

fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for account in cfg.accounts.values_mut() {
        if account.password.is_some() {
            account.password = Some(MASK.into());
        }
    }
    cfg
}

/// Log in once with the candidate credentials.
async fn check_credentials(
    account: &Account,
    unique_id: &str,
    password: &str,
) -> Result<(), CliError> {
    let client = config::client_for(account, unique_id)?;
    let secret = SecretString::from(password.to_owned());
    match validate_credentials(client, &account.username, &secret).await {
        CredentialCheck::Valid => Ok(()),
        CredentialCheck::InvalidAuth => Err(CliError::AuthFailed {
            message: format!("the account rejected the credentials for {}", account.username),
        }),
        CredentialCheck::CannotConnect => Err(CliError::ConnectionFailed {
            service: "raincloud".into(),
            reason: "the credential check could not reach the account".into(),
        }),
        CredentialCheck::Unknown => Err(CliError::Internal(
            "unexpected error during the credential check".into(),
        )),
    }
}

/// Put the password where the user asked; returns the plaintext to keep, if any.
fn store_secret(
    store: SecretStore,
    unique_id: &str,
    password: String,
) -> Result<Option<String>, CliError> {
    match store {
        SecretStore::Keyring => {
            raincloud_config::store_password(unique_id, &password)?;
            eprintln!("   ✓ password stored in system keyring");
            Ok(None)
        }
        SecretStore::Plaintext => Ok(Some(password)),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init { store } => init(store, global).await,

        ConfigCommand::Show => {
            let cfg = raincloud_config::load_config()?;
            let out = output::render_single(
                &global.output,
                &redacted(&cfg),
                format_config_redacted,
                |c| c.accounts.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(
                &raincloud_config::config_path().display().to_string(),
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::Reauth { store } => reauth(store, global).await,

        ConfigCommand::Remove => remove(global),
    }
}

/// Add an account: prompt, check the credentials, store, save.
async fn init(store: Option<SecretStore>, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = raincloud_config::load_config()?;
    eprintln!("RainCloud account setup");
    eprintln!("   Config path: {}\n", raincloud_config::config_path().display());

    let username = util::input_or(global.username.clone(), "Username")?;
    let mut account = Account::new(username.trim());
    let unique_id = account.unique_id();
    if cfg.accounts.contains_key(&unique_id) {
        return Err(CliError::Conflict {
            resource_type: "account".into(),
            identifier: unique_id,
        });
    }

    account.fixture = Some(match global.fixture {
        Some(ref path) => path.clone(),
        None => util::input_or(None, "Fixture file")?.into(),
    });
    account.poll_interval.clone_from(&global.poll_interval);
    account.watering_minutes = global.watering_minutes;
    // Reject bad overrides before anything is stored.
    raincloud_config::build_hub_config(&account, SecretString::from(String::new()), &cfg.defaults)?;

    let password = util::password()?;
    check_credentials(&account, &unique_id, &password).await?;

    account.password = store_secret(util::secret_store(store)?, &unique_id, password)?;
    let unique_id = cfg.add_account(account)?;
    let path = raincloud_config::save_config(&cfg)?;
    eprintln!("   ✓ account {unique_id} saved to {}", path.display());
    Ok(())
}

/// Replace the password of an existing account after checking it.
async fn reauth(store: Option<SecretStore>, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = raincloud_config::load_config()?;
    let (unique_id, account) = cfg.account(global.account.as_deref())?;
    let mut account = account.clone();
    if let Some(ref fixture) = global.fixture {
        account.fixture = Some(fixture.clone());
    }

    let password = util::password()?;
    check_credentials(&account, &unique_id, &password).await?;

    let plaintext = store_secret(util::secret_store(store)?, &unique_id, password)?;
    cfg.reauth_account(&unique_id, plaintext)?;
    raincloud_config::save_config(&cfg)?;
    eprintln!("   ✓ password for {unique_id} updated");
    Ok(())
}

fn remove(global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = raincloud_config::load_config()?;
    let (unique_id, _) = cfg.account(global.account.as_deref())?;

    if !util::confirm("config remove", &format!("Remove account {unique_id}?"), global.yes)? {
        eprintln!("aborted");
        return Ok(());
    }

    cfg.remove_account(&unique_id)?;
    if let Err(e) = raincloud_config::delete_password(&unique_id) {
        warn!(error = %e, "could not remove keyring password (non-fatal)");
    }
    raincloud_config::save_config(&cfg)?;
    eprintln!("   ✓ account {unique_id} removed");
    Ok(())
}
