// ── Hub ──
//
// Per-account context object: one Hub per login, created by `setup` and
// torn down by `shutdown`. Owns the connection, coordinator, dispatcher
// and entity registry, and is passed to whatever needs them.

use std::sync::Arc;

use raincloud_api::DeviceClient;
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::attribute::Platform;
use crate::command::{Command, CommandDispatcher, CommandResult};
use crate::config::HubConfig;
use crate::connection::Connection;
use crate::coordinator::{RefreshCoordinator, RefreshStatus};
use crate::entity::{Entity, EntitySnapshot};
use crate::error::CoreError;
use crate::registry::{EntityOptions, EntityRegistry};

pub struct Hub {
    config: HubConfig,
    connection: Arc<Connection>,
    coordinator: RefreshCoordinator,
    dispatcher: CommandDispatcher,
    registry: EntityRegistry,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Hub {
    /// Log in, run the first refresh, discover entities and start polling.
    ///
    /// Fails without leaving anything running if login or the first
    /// refresh fails.
    pub async fn setup(config: HubConfig, client: Arc<dyn DeviceClient>) -> Result<Self, CoreError> {
        config.validate()?;

        let connection =
            Arc::new(Connection::open(client, &config.username, &config.password).await?);
        let coordinator = RefreshCoordinator::new(Arc::clone(&connection), config.poll_interval);

        let topology = match coordinator.first_refresh().await {
            Ok(topology) => topology,
            Err(e) => {
                if let Err(logout) = connection.logout().await {
                    warn!(error = %logout, "logout after failed setup failed (non-fatal)");
                }
                return Err(e);
            }
        };

        let registry = EntityRegistry::discover(
            &topology,
            &EntityOptions {
                watering_minutes: config.watering_minutes,
            },
        );
        for entity in registry.iter() {
            let observer = entity.observer();
            coordinator.register(Arc::clone(&observer))?;
            observer.recompute_from(&topology);
        }

        let dispatcher = CommandDispatcher::new(Arc::clone(&connection), coordinator.clone());
        let cancel = CancellationToken::new();
        let task = coordinator.spawn(cancel.clone());

        let (controllers, faucets, zones) = topology.node_counts();
        info!(
            account = %config.unique_id(),
            username = connection.username(),
            controllers,
            faucets,
            zones,
            entities = registry.len(),
            "account set up"
        );

        Ok(Self {
            config,
            connection,
            coordinator,
            dispatcher,
            registry,
            cancel,
            task: Mutex::new(Some(task)),
        })
    }

    /// Stop polling and log out. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        if let Err(e) = task.await {
            warn!(error = %e, "refresh task ended abnormally");
        }

        if let Err(e) = self.connection.logout().await {
            warn!(error = %e, "logout failed (non-fatal)");
        }
        debug!(account = %self.config.unique_id(), "account shut down");
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn unique_id(&self) -> String {
        self.config.unique_id()
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn entities(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn entity(&self, unique_id: &str) -> Result<&Arc<Entity>, CoreError> {
        self.registry
            .get(unique_id)
            .ok_or_else(|| CoreError::EntityNotFound {
                unique_id: unique_id.to_owned(),
            })
    }

    /// Snapshots of every entity, optionally filtered by platform.
    pub fn entity_snapshots(&self, platform: Option<Platform>) -> Vec<EntitySnapshot> {
        let available = self.coordinator.last_update_success();
        self.registry
            .iter()
            .filter(|e| platform.is_none_or(|p| e.platform() == p))
            .map(|e| e.snapshot(available))
            .collect()
    }

    pub fn status(&self) -> RefreshStatus {
        self.coordinator.status_snapshot()
    }

    pub fn updates(&self) -> watch::Receiver<u64> {
        self.coordinator.updates()
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        self.dispatcher.execute(command).await
    }

    /// Rain delay for every zone of the account.
    pub async fn rain_delay(&self, days: u32) -> Result<CommandResult, CoreError> {
        self.execute(Command::SetRainDelay { days }).await
    }

    pub async fn turn_on(&self, unique_id: &str) -> Result<CommandResult, CoreError> {
        let entity = self.entity(unique_id)?;
        self.dispatcher.turn_on(entity).await
    }

    pub async fn turn_off(&self, unique_id: &str) -> Result<CommandResult, CoreError> {
        let entity = self.entity(unique_id)?;
        self.dispatcher.turn_off(entity).await
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("account", &self.config.unique_id())
            .field("entities", &self.registry.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Credential check ─────────────────────────────────────────────────

/// Result of checking credentials before storing an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CredentialCheck {
    Valid,
    CannotConnect,
    InvalidAuth,
    Unknown,
}

/// Try a login, then always log out again.
pub async fn validate_credentials(
    client: Arc<dyn DeviceClient>,
    username: &str,
    password: &SecretString,
) -> CredentialCheck {
    let connection = match Connection::open(client, username, password).await {
        Ok(connection) => connection,
        Err(e) if e.is_auth() => return CredentialCheck::InvalidAuth,
        Err(e) if e.is_transient() => {
            debug!(error = %e, "credential check could not connect");
            return CredentialCheck::CannotConnect;
        }
        Err(e) => {
            warn!(error = %e, "unexpected error during credential check");
            return CredentialCheck::Unknown;
        }
    };

    if let Err(e) = connection.logout().await {
        warn!(error = %e, "logout after credential check failed (non-fatal)");
    }
    CredentialCheck::Valid
}
