// ── Command dispatch ──
//
// User-triggered writes. Each command resolves its targets against the
// current Topology, performs the writes on the blocking pool, then asks
// the coordinator for one refresh whether or not the writes succeeded.
// Writes are not serialized against each other and nothing is rolled back.

use std::sync::Arc;

use futures_util::future::join_all;
use raincloud_api::{ManualWatering, Mutation, ObjectId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::coordinator::RefreshCoordinator;
use crate::entity::{Entity, SwitchAction};
use crate::error::{CoreError, FanOutFailure};

/// A user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetAutoWatering {
        zone: ObjectId,
        enabled: bool,
    },
    SetManualWatering {
        zone: ObjectId,
        watering: ManualWatering,
    },
    /// Applies to every zone of every faucet of every controller.
    SetRainDelay {
        days: u32,
    },
}

impl Command {
    /// The command behind turning a switch entity on or off.
    pub fn for_switch(entity: &Entity, on: bool) -> Result<Self, CoreError> {
        let Some(action) = entity.control() else {
            return Err(CoreError::NotAControl {
                unique_id: entity.unique_id().to_owned(),
                platform: entity.platform().to_string(),
            });
        };
        let zone = entity.node().clone();
        Ok(match action {
            SwitchAction::AutoWatering => Self::SetAutoWatering { zone, enabled: on },
            SwitchAction::ManualWatering { minutes } => Self::SetManualWatering {
                zone,
                watering: if on {
                    ManualWatering::Minutes(minutes)
                } else {
                    ManualWatering::Off
                },
            },
        })
    }
}

/// Outcome of a successful command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommandResult {
    Applied { target: ObjectId },
    FannedOut { targets: Vec<ObjectId> },
}

/// Routes commands to DeviceClient writes.
#[derive(Clone)]
pub struct CommandDispatcher {
    connection: Arc<Connection>,
    coordinator: RefreshCoordinator,
}

impl CommandDispatcher {
    pub fn new(connection: Arc<Connection>, coordinator: RefreshCoordinator) -> Self {
        Self {
            connection,
            coordinator,
        }
    }

    /// Run a command, then request exactly one refresh.
    pub async fn execute(&self, command: Command) -> Result<CommandResult, CoreError> {
        debug!(?command, "executing command");
        let result = self.route(command).await;
        if let Err(ref e) = result {
            warn!(error = %e, "command failed");
        }
        self.coordinator.request_refresh();
        result
    }

    pub async fn turn_on(&self, entity: &Entity) -> Result<CommandResult, CoreError> {
        self.execute(Command::for_switch(entity, true)?).await
    }

    pub async fn turn_off(&self, entity: &Entity) -> Result<CommandResult, CoreError> {
        self.execute(Command::for_switch(entity, false)?).await
    }

    async fn route(&self, command: Command) -> Result<CommandResult, CoreError> {
        match command {
            Command::SetAutoWatering { zone, enabled } => {
                self.write_zone(zone, Mutation::AutoWatering(enabled)).await
            }
            Command::SetManualWatering { zone, watering } => {
                self.write_zone(zone, Mutation::ManualWatering(watering))
                    .await
            }
            Command::SetRainDelay { days } => self.rain_delay(days).await,
        }
    }

    async fn write_zone(
        &self,
        zone: ObjectId,
        mutation: Mutation,
    ) -> Result<CommandResult, CoreError> {
        let topology = self.coordinator.current().ok_or(CoreError::NotReady)?;
        if !zone.is_zone() || !topology.contains(&zone) {
            return Err(CoreError::ZoneNotFound {
                zone: zone.to_string(),
            });
        }
        self.connection.mutate(zone.clone(), mutation).await?;
        Ok(CommandResult::Applied { target: zone })
    }

    /// Best-effort fan-out: every zone is written, failures are collected.
    async fn rain_delay(&self, days: u32) -> Result<CommandResult, CoreError> {
        let topology = self.coordinator.current().ok_or(CoreError::NotReady)?;
        let zones: Vec<ObjectId> = topology.zones().map(|(id, _)| id).collect();

        let writes = zones.into_iter().map(|zone| async move {
            let result = self
                .connection
                .mutate(zone.clone(), Mutation::RainDelay(days))
                .await;
            (zone, result)
        });

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        for (zone, result) in join_all(writes).await {
            match result {
                Ok(()) => succeeded.push(zone),
                Err(e) => failed.push(FanOutFailure {
                    zone,
                    reason: e.to_string(),
                }),
            }
        }

        info!(
            days,
            succeeded = succeeded.len(),
            failed = failed.len(),
            "rain delay applied"
        );

        if failed.is_empty() {
            Ok(CommandResult::FannedOut { targets: succeeded })
        } else {
            Err(CoreError::PartialFanOut { failed, succeeded })
        }
    }
}
