//! Rain delay command: fan out to every zone of the account.

use raincloud_core::{CommandResult, Hub, ObjectId};
use serde::Serialize;

use crate::cli::{GlobalOpts, RainDelayArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct RainDelayOutcome {
    days: u32,
    zones: Vec<ObjectId>,
}

fn detail(o: &RainDelayOutcome) -> String {
    let zones = o
        .zones
        .iter()
        .map(|z| format!("  {z}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Rain delay of {} day(s) set on {} zone(s):\n{zones}",
        o.days,
        o.zones.len()
    )
}

pub async fn handle(hub: &Hub, args: &RainDelayArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let zones = match hub.rain_delay(args.days).await? {
        CommandResult::FannedOut { targets } => targets,
        CommandResult::Applied { target } => vec![target],
    };

    let outcome = RainDelayOutcome {
        days: args.days,
        zones,
    };
    let out = output::render_single(&global.output, &outcome, detail, |o| {
        o.zones
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
