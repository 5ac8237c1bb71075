// ── Topology snapshot model ──
//
// One `Topology` is the full Controller -> Faucet -> Zone tree captured at a
// single fetch. Nodes carry a closed set of attributes keyed by
// `AttributeKey`; a key that is absent means the service did not report it.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::error::Error;

// ── Attributes ──────────────────────────────────────────────────────

/// Every attribute the integration knows how to expose.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttributeKey {
    Status,
    Battery,
    IsWatering,
    AutoWatering,
    ManualWatering,
    NextCycle,
    RainDelay,
    WateringTime,
}

/// A raw attribute value as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    Text(String),
    /// Serialized as a humantime string, e.g. `"15m"`.
    Duration(#[serde(with = "humantime_duration")] Duration),
}

impl AttributeValue {
    /// Loose truthiness: `false`, `0`, empty/`"off"` text and zero
    /// durations are false, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Text(s) => !s.is_empty() && !s.eq_ignore_ascii_case("off"),
            Self::Duration(d) => !d.is_zero(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view. Durations are reported in whole minutes.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Duration(d) => Some(minutes(*d)),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("on"),
            Self::Bool(false) => f.write_str("off"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Duration(d) => write!(f, "{}", d.as_secs() / 60),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for AttributeValue {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Duration> for AttributeValue {
    fn from(d: Duration) -> Self {
        Self::Duration(d)
    }
}

fn minutes(d: Duration) -> f64 {
    f64::from(u32::try_from(d.as_secs() / 60).unwrap_or(u32::MAX))
}

pub type Attributes = BTreeMap<AttributeKey, AttributeValue>;

// ── Nodes ───────────────────────────────────────────────────────────

/// A single irrigation zone (valve) on a faucet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone number, unique within its faucet only.
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A faucet timer owning up to four zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faucet {
    pub serial: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub zones: Vec<Zone>,
}

/// A cloud-connected controller (hub) owning faucets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub serial: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub faucets: Vec<Faucet>,
}

// ── ObjectId ────────────────────────────────────────────────────────

/// Stable identity of one node, valid across every snapshot of the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObjectId {
    Controller { serial: String },
    Faucet { serial: String },
    Zone { faucet_serial: String, zone_id: u32 },
}

impl ObjectId {
    pub fn zone(faucet_serial: impl Into<String>, zone_id: u32) -> Self {
        Self::Zone {
            faucet_serial: faucet_serial.into(),
            zone_id,
        }
    }

    pub fn is_zone(&self) -> bool {
        matches!(self, Self::Zone { .. })
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller { serial } => write!(f, "controller:{serial}"),
            Self::Faucet { serial } => write!(f, "faucet:{serial}"),
            Self::Zone {
                faucet_serial,
                zone_id,
            } => write!(f, "zone:{faucet_serial}/{zone_id}"),
        }
    }
}

// ── Topology ────────────────────────────────────────────────────────

/// Immutable snapshot of an account's full device tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub controllers: Vec<Controller>,
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl Topology {
    pub fn new(controllers: Vec<Controller>) -> Self {
        Self {
            controllers,
            fetched_at: Utc::now(),
        }
    }

    pub fn controller(&self, serial: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.serial == serial)
    }

    pub fn faucet(&self, serial: &str) -> Option<&Faucet> {
        self.faucets().find(|f| f.serial == serial)
    }

    pub fn zone(&self, faucet_serial: &str, zone_id: u32) -> Option<&Zone> {
        self.faucet(faucet_serial)?
            .zones
            .iter()
            .find(|z| z.id == zone_id)
    }

    pub fn faucets(&self) -> impl Iterator<Item = &Faucet> + '_ {
        self.controllers.iter().flat_map(|c| c.faucets.iter())
    }

    /// Every zone in tree order, paired with its identity.
    pub fn zones(&self) -> impl Iterator<Item = (ObjectId, &Zone)> + '_ {
        self.faucets().flat_map(|f| {
            f.zones
                .iter()
                .map(move |z| (ObjectId::zone(f.serial.clone(), z.id), z))
        })
    }

    /// Attribute map of the node addressed by `id`, if it exists.
    pub fn attributes_of(&self, id: &ObjectId) -> Option<&Attributes> {
        match id {
            ObjectId::Controller { serial } => self.controller(serial).map(|c| &c.attributes),
            ObjectId::Faucet { serial } => self.faucet(serial).map(|f| &f.attributes),
            ObjectId::Zone {
                faucet_serial,
                zone_id,
            } => self.zone(faucet_serial, *zone_id).map(|z| &z.attributes),
        }
    }

    pub fn attribute(&self, id: &ObjectId, key: AttributeKey) -> Option<&AttributeValue> {
        self.attributes_of(id)?.get(&key)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.attributes_of(id).is_some()
    }

    /// `(controllers, faucets, zones)` counts.
    pub fn node_counts(&self) -> (usize, usize, usize) {
        let faucets = self.faucets().count();
        let zones = self.faucets().map(|f| f.zones.len()).sum();
        (self.controllers.len(), faucets, zones)
    }

    /// Reject trees where a controller or faucet serial repeats anywhere
    /// in the account, or a zone id repeats on its faucet.
    pub fn validate(&self) -> Result<(), Error> {
        unique(self.controllers.iter().map(|c| c.serial.as_str()), "controller")?;
        // Faucets are addressed by serial alone.
        unique(self.faucets().map(|f| f.serial.as_str()), "faucet")?;
        for controller in &self.controllers {
            for faucet in &controller.faucets {
                let mut seen = HashSet::new();
                for zone in &faucet.zones {
                    if !seen.insert(zone.id) {
                        return Err(Error::Deserialization {
                            message: format!(
                                "duplicate zone {} on faucet {}",
                                zone.id, faucet.serial
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn unique<'a>(ids: impl Iterator<Item = &'a str>, kind: &str) -> Result<(), Error> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(Error::Deserialization {
                message: format!("duplicate {kind} serial {id}"),
            });
        }
    }
    Ok(())
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
