//! Switch command handlers.

use std::time::Duration;

use raincloud_core::{CommandResult, EntitySnapshot, Hub};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::{GlobalOpts, SwitchArgs, SwitchCommand};
use crate::error::CliError;
use crate::output;

use super::util;

/// How long to wait for the refresh a command requests.
const REFRESH_WAIT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SwitchOutcome {
    #[serde(flatten)]
    result: CommandResult,
    entity: EntitySnapshot,
}

fn detail(o: &SwitchOutcome) -> String {
    let e = &o.entity;
    [
        format!("Entity:    {}", e.unique_id),
        format!("Name:      {}", e.name),
        format!("State:     {}", e.state),
        format!("Available: {}", e.available),
        format!("Icon:      {}", e.icon.as_deref().unwrap_or("-")),
    ]
    .join("\n")
}

pub async fn handle(hub: &Hub, args: SwitchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (entity_id, on) = match args.command {
        SwitchCommand::On { entity } => (entity, true),
        SwitchCommand::Off { entity } => (entity, false),
    };

    let before = hub.status().polls;
    let result = if on {
        hub.turn_on(&entity_id).await?
    } else {
        hub.turn_off(&entity_id).await?
    };
    debug!(entity = %entity_id, on, ?result, "switch command applied");

    util::wait_for_refresh(hub, before, REFRESH_WAIT).await;
    if !hub.coordinator().last_update_success() {
        warn!("post-command refresh failed; state shown may be stale");
    }

    let outcome = SwitchOutcome {
        result,
        entity: hub.entity(&entity_id)?.snapshot(hub.coordinator().last_update_success()),
    };
    let out = output::render_single(&global.output, &outcome, detail, |o| {
        o.entity.state.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
