//! Status command: one refresh, every entity.

use raincloud_core::{ATTRIBUTION, EntitySnapshot, Hub, Platform};
use tabled::Tabled;

use crate::cli::{GlobalOpts, OutputFormat, PlatformArg, StatusArgs};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "Entity")]
    unique_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Platform")]
    platform: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Icon")]
    icon: String,
}

impl EntityRow {
    fn from_snapshot(s: &EntitySnapshot, color: bool) -> Self {
        let state = if s.available {
            output::paint_state(&s.state, color)
        } else {
            format!("{} (stale)", s.state)
        };
        Self {
            unique_id: s.unique_id.clone(),
            name: s.name.clone(),
            platform: s.platform.to_string(),
            state,
            unit: s.unit.unwrap_or_default().to_owned(),
            icon: s.icon.clone().unwrap_or_default(),
        }
    }
}

pub(crate) fn platform_of(arg: PlatformArg) -> Platform {
    match arg {
        PlatformArg::BinarySensor => Platform::BinarySensor,
        PlatformArg::Sensor => Platform::Sensor,
        PlatformArg::Switch => Platform::Switch,
    }
}

/// Render entity snapshots in the selected output format.
pub(crate) fn render_entities(
    snapshots: &[EntitySnapshot],
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let color = output::should_color(&global.color);
    output::render_list(
        &global.output,
        snapshots,
        |s| EntityRow::from_snapshot(s, color),
        |s| format!("{}\t{}", s.unique_id, s.state),
    )
}

pub fn handle(hub: &Hub, args: &StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshots = hub.entity_snapshots(args.platform.map(platform_of));
    output::print_output(&render_entities(&snapshots, global)?, global.quiet);

    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        eprintln!("{ATTRIBUTION}");
    }
    Ok(())
}
