//! Watch command: keep the coordinator running and print each refresh.

use chrono::Local;
use raincloud_core::Hub;
use tracing::{debug, warn};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::status::{platform_of, render_entities};

pub async fn handle(hub: &Hub, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let platform = args.platform.map(platform_of);
    let mut status = hub.coordinator().status();
    let mut seen = status.borrow_and_update().polls;
    let stop_at = args.polls.map(|n| seen.saturating_add(n));

    print_refresh(hub, platform, global)?;

    loop {
        if stop_at.is_some_and(|stop| seen >= stop) {
            return Ok(());
        }

        tokio::select! {
            changed = status.changed() => {
                if changed.is_err() {
                    debug!("coordinator stopped");
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                return Ok(());
            }
        }

        let current = status.borrow_and_update().clone();
        if current.polls == seen {
            continue;
        }
        seen = current.polls;

        match current.last_error {
            None => print_refresh(hub, platform, global)?,
            Some(ref error) => {
                warn!(
                    error = %error,
                    consecutive_failures = current.consecutive_failures,
                    "refresh failed, showing last known state"
                );
                if current.reauth_required {
                    warn!("the account rejected the session: run `raincloud config reauth`");
                }
            }
        }
    }
}

fn print_refresh(
    hub: &Hub,
    platform: Option<raincloud_core::Platform>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        eprintln!("── refreshed {} ──", Local::now().format("%H:%M:%S"));
    }
    let snapshots = hub.entity_snapshots(platform);
    output::print_output(&render_entities(&snapshots, global)?, global.quiet);
    Ok(())
}
