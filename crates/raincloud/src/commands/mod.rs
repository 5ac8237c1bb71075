//! Command dispatch: bridges CLI args -> Hub operations -> output formatting.

pub mod config_cmd;
pub mod rain_delay;
pub mod status;
pub mod switch;
pub mod util;
pub mod watch;

use raincloud_core::Hub;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an account-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, hub: &Hub, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(hub, &args, global),
        Command::Watch(args) => watch::handle(hub, &args, global).await,
        Command::Switch(args) => switch::handle(hub, args, global).await,
        Command::RainDelay(args) => rain_delay::handle(hub, &args, global).await,
        // Config and Completions are handled before an account is set up
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need an account".into(),
        )),
    }
}
