//! CLI configuration -- thin wrapper around `raincloud_config`.
//!
//! Adds the resolution that respects `GlobalOpts` overrides (--username,
//! --fixture, --poll-interval, --watering-minutes) and builds the
//! `DeviceClient` serving the selected account.

use std::path::Path;
use std::sync::Arc;

use raincloud_config::{Account, Config};
use raincloud_core::{DeviceClient, HubConfig, SimulatedAccount};
use tracing::debug;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Everything needed to set up a `Hub` for one account.
pub struct Resolved {
    pub unique_id: String,
    pub hub: HubConfig,
    pub client: Arc<dyn DeviceClient>,
}

/// Pick the account from flags and config, apply flag overrides.
///
/// `--username` bypasses the config file; otherwise `--account` or the
/// default account is used.
pub fn select_account(global: &GlobalOpts, cfg: &Config) -> Result<(String, Account), CliError> {
    let (unique_id, mut account) = match global.username {
        Some(ref username) => {
            let account = Account::new(username.clone());
            (account.unique_id(), account)
        }
        None => {
            let (unique_id, account) = cfg.account(global.account.as_deref())?;
            (unique_id, account.clone())
        }
    };

    if let Some(ref fixture) = global.fixture {
        account.fixture = Some(fixture.clone());
    }
    if let Some(ref interval) = global.poll_interval {
        account.poll_interval = Some(interval.clone());
    }
    if let Some(minutes) = global.watering_minutes {
        account.watering_minutes = Some(minutes);
    }
    Ok((unique_id, account))
}

/// Resolve the selected account into a `HubConfig` and its client.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = raincloud_config::load_config()?;
    let (unique_id, account) = select_account(global, &cfg)?;
    let client = client_for(&account, &unique_id)?;
    let hub = raincloud_config::account_to_hub_config(&account, &unique_id, &cfg.defaults)?;
    debug!(account = %unique_id, poll_interval = ?hub.poll_interval, "account resolved");

    Ok(Resolved {
        unique_id,
        hub,
        client,
    })
}

/// The client serving an account: its simulated-account fixture.
pub fn client_for(account: &Account, unique_id: &str) -> Result<Arc<dyn DeviceClient>, CliError> {
    let path = account
        .fixture
        .as_deref()
        .ok_or_else(|| CliError::NoFixture {
            account: unique_id.to_owned(),
        })?;
    load_fixture(path)
}

fn load_fixture(path: &Path) -> Result<Arc<dyn DeviceClient>, CliError> {
    let account = SimulatedAccount::from_file(path).map_err(|e| CliError::Validation {
        field: "fixture".into(),
        reason: format!("{}: {e}", path.display()),
    })?;
    Ok(Arc::new(account))
}
