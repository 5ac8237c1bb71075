// ── Attribute metadata ──
//
// Static table mapping every `AttributeKey` to how it is exposed: the
// entity platform, display label, icon rule and unit of measurement.

use raincloud_api::AttributeKey;
use serde::Serialize;
use strum::{Display, EnumString};

/// Provider credit attached to every entity.
pub const ATTRIBUTION: &str = "Data provided by Melnor Aquatimer.com";

/// Platform an entity is exposed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Sensor,
    Switch,
}

/// How an entity's icon is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Fixed(&'static str),
    /// Flips with the boolean state.
    Toggle {
        on: &'static str,
        off: &'static str,
    },
    /// Derived from the battery level.
    Battery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeMeta {
    pub key: AttributeKey,
    pub label: &'static str,
    pub platform: Platform,
    pub icon: Icon,
    pub unit: Option<&'static str>,
}

pub const fn meta(key: AttributeKey) -> AttributeMeta {
    let (label, platform, icon, unit) = match key {
        AttributeKey::Status => (
            "Status",
            Platform::BinarySensor,
            Icon::Toggle {
                on: "mdi:pipe",
                off: "mdi:pipe-disconnected",
            },
            None,
        ),
        AttributeKey::IsWatering => (
            "Watering",
            Platform::BinarySensor,
            Icon::Toggle {
                on: "mdi:water",
                off: "mdi:water-off",
            },
            None,
        ),
        AttributeKey::Battery => ("Battery", Platform::Sensor, Icon::Battery, Some("%")),
        AttributeKey::NextCycle => (
            "Next Cycle",
            Platform::Sensor,
            Icon::Fixed("mdi:calendar-clock"),
            None,
        ),
        AttributeKey::RainDelay => (
            "Rain Delay",
            Platform::Sensor,
            Icon::Fixed("mdi:weather-rainy"),
            Some("d"),
        ),
        AttributeKey::WateringTime => (
            "Remaining Watering Time",
            Platform::Sensor,
            Icon::Fixed("mdi:water-pump"),
            Some("min"),
        ),
        AttributeKey::AutoWatering => (
            "Automatic Watering",
            Platform::Switch,
            Icon::Fixed("mdi:autorenew"),
            None,
        ),
        AttributeKey::ManualWatering => (
            "Manual Watering",
            Platform::Switch,
            Icon::Fixed("mdi:water-pump"),
            None,
        ),
    };
    AttributeMeta {
        key,
        label,
        platform,
        icon,
        unit,
    }
}

impl Icon {
    /// Resolve to a concrete icon name.
    pub fn resolve(self, is_on: Option<bool>, level: Option<f64>) -> Option<String> {
        match self {
            Self::Fixed(icon) => Some(icon.to_owned()),
            Self::Toggle { on, off } => Some(if is_on == Some(true) { on } else { off }.to_owned()),
            Self::Battery => Some(icon_for_battery_level(level)),
        }
    }
}

/// Battery icon for a (not charging) battery level in percent.
pub fn icon_for_battery_level(level: Option<f64>) -> String {
    let Some(level) = level.filter(|l| l.is_finite()) else {
        return "mdi:battery-unknown".into();
    };
    if level <= 5.0 {
        "mdi:battery-alert".into()
    } else if level < 95.0 {
        let step = (level / 10.0 - 0.01).round().clamp(1.0, 9.0);
        format!("mdi:battery-{}", step * 10.0)
    } else {
        "mdi:battery".into()
    }
}
