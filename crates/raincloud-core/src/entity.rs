// ── Observers and entities ──
//
// An Observer is bound to one attribute of one node and recomputes its
// exposed state from each published Topology. Three small variants cover
// the attribute kinds; `Entity` wraps an Observer with the naming, identity
// and extra attributes the platform shows.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use raincloud_api::{AttributeKey, AttributeValue, ObjectId, Topology};
use serde::Serialize;
use tracing::trace;

use crate::attribute::{self, ATTRIBUTION, AttributeMeta, Platform};

// ── AttributeState ───────────────────────────────────────────────────

/// What an Observer currently exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttributeState {
    pub value: Option<AttributeValue>,
    pub is_on: Option<bool>,
    pub icon: Option<String>,
    pub unit: Option<&'static str>,
}

impl AttributeState {
    /// Compact display form: `on`/`off` for booleans, the value otherwise.
    pub fn display(&self) -> String {
        match (self.is_on, &self.value) {
            (Some(true), _) => "on".into(),
            (Some(false), _) => "off".into(),
            (None, Some(value)) => value.to_string(),
            (None, None) => "unknown".into(),
        }
    }
}

// ── Observer ─────────────────────────────────────────────────────────

/// One exposed device attribute.
///
/// `recompute_from` is called exactly once per successful poll, with the
/// snapshot every other Observer of that poll also sees. It never fails:
/// when the bound node or attribute is absent the previous state is kept.
pub trait Observer: Send + Sync {
    /// Stable unique id, identical across polls and restarts.
    fn id(&self) -> &str;

    fn recompute_from(&self, topology: &Topology) -> AttributeState;

    fn current_state(&self) -> AttributeState;
}

/// Node + attribute an Observer is bound to, with its last state.
struct Binding {
    id: String,
    node: ObjectId,
    meta: AttributeMeta,
    state: ArcSwap<AttributeState>,
}

impl Binding {
    fn new(id: String, node: ObjectId, key: AttributeKey) -> Self {
        Self {
            id,
            node,
            meta: attribute::meta(key),
            state: ArcSwap::from_pointee(AttributeState::default()),
        }
    }

    /// Look up the raw value, or keep the previous state when it is gone.
    fn update(
        &self,
        topology: &Topology,
        map: impl FnOnce(&AttributeValue) -> AttributeState,
    ) -> AttributeState {
        let Some(value) = topology.attribute(&self.node, self.meta.key) else {
            trace!(id = %self.id, node = %self.node, "attribute absent, keeping previous state");
            return self.current();
        };
        let next = map(value);
        self.state.store(Arc::new(next.clone()));
        next
    }

    fn current(&self) -> AttributeState {
        AttributeState::clone(&self.state.load())
    }
}

/// Predicate turning a raw value into on/off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predicate {
    /// `value == "Online"`
    Online,
    Truthy,
}

impl Predicate {
    fn for_key(key: AttributeKey) -> Self {
        if key == AttributeKey::Status {
            Self::Online
        } else {
            Self::Truthy
        }
    }

    fn test(self, value: &AttributeValue) -> bool {
        match self {
            Self::Online => value.as_text() == Some("Online"),
            Self::Truthy => value.is_truthy(),
        }
    }
}

/// Status and watering sensors.
pub struct BooleanObserver {
    binding: Binding,
    predicate: Predicate,
}

impl BooleanObserver {
    pub fn new(id: String, node: ObjectId, key: AttributeKey) -> Self {
        Self {
            binding: Binding::new(id, node, key),
            predicate: Predicate::for_key(key),
        }
    }
}

impl Observer for BooleanObserver {
    fn id(&self) -> &str {
        &self.binding.id
    }

    fn recompute_from(&self, topology: &Topology) -> AttributeState {
        let meta = self.binding.meta;
        let predicate = self.predicate;
        self.binding.update(topology, |value| {
            let is_on = predicate.test(value);
            AttributeState {
                value: Some(value.clone()),
                is_on: Some(is_on),
                icon: meta.icon.resolve(Some(is_on), None),
                unit: meta.unit,
            }
        })
    }

    fn current_state(&self) -> AttributeState {
        self.binding.current()
    }
}

/// Battery, next cycle, rain delay and remaining watering time.
pub struct ScalarObserver {
    binding: Binding,
}

impl ScalarObserver {
    pub fn new(id: String, node: ObjectId, key: AttributeKey) -> Self {
        Self {
            binding: Binding::new(id, node, key),
        }
    }
}

impl Observer for ScalarObserver {
    fn id(&self) -> &str {
        &self.binding.id
    }

    fn recompute_from(&self, topology: &Topology) -> AttributeState {
        let meta = self.binding.meta;
        self.binding.update(topology, |value| AttributeState {
            value: Some(value.clone()),
            is_on: None,
            icon: meta.icon.resolve(None, value.as_number()),
            unit: meta.unit,
        })
    }

    fn current_state(&self) -> AttributeState {
        self.binding.current()
    }
}

/// What turning a switch on or off writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SwitchAction {
    AutoWatering,
    /// On starts a manual cycle of `minutes`; off stops it.
    ManualWatering { minutes: u32 },
}

/// Automatic and manual watering switches.
pub struct SwitchObserver {
    binding: Binding,
    action: SwitchAction,
}

impl SwitchObserver {
    pub fn new(id: String, node: ObjectId, key: AttributeKey, action: SwitchAction) -> Self {
        Self {
            binding: Binding::new(id, node, key),
            action,
        }
    }

    pub fn action(&self) -> SwitchAction {
        self.action
    }
}

impl Observer for SwitchObserver {
    fn id(&self) -> &str {
        &self.binding.id
    }

    fn recompute_from(&self, topology: &Topology) -> AttributeState {
        let meta = self.binding.meta;
        self.binding.update(topology, |value| {
            let is_on = value.is_truthy();
            AttributeState {
                value: Some(value.clone()),
                is_on: Some(is_on),
                icon: meta.icon.resolve(Some(is_on), None),
                unit: meta.unit,
            }
        })
    }

    fn current_state(&self) -> AttributeState {
        self.binding.current()
    }
}

// ── Entity ───────────────────────────────────────────────────────────

/// Names of the node an entity is bound to.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NodeNames<'a> {
    pub serial: &'a str,
    pub id: &'a str,
    pub name: &'a str,
    /// Owning faucet `(serial, id)` for zones.
    pub faucet: Option<(&'a str, &'a str)>,
}

/// Platform-facing wrapper around one Observer.
pub struct Entity {
    unique_id: String,
    name: String,
    platform: Platform,
    node: ObjectId,
    key: AttributeKey,
    extra: BTreeMap<String, String>,
    observer: Arc<dyn Observer>,
    control: Option<SwitchAction>,
}

impl Entity {
    pub(crate) fn build(
        node: ObjectId,
        key: AttributeKey,
        names: NodeNames<'_>,
        watering_minutes: u32,
    ) -> Self {
        let meta = attribute::meta(key);
        let unique_id = unique_id(&node, key);
        let name = display_name(&node, names, meta.label);

        let mut extra = BTreeMap::from([
            ("attribution".to_owned(), ATTRIBUTION.to_owned()),
            ("identifier".to_owned(), names.serial.to_owned()),
        ]);

        let (observer, control): (Arc<dyn Observer>, Option<SwitchAction>) = match meta.platform
        {
            Platform::BinarySensor => (
                Arc::new(BooleanObserver::new(unique_id.clone(), node.clone(), key)),
                None,
            ),
            Platform::Sensor => (
                Arc::new(ScalarObserver::new(unique_id.clone(), node.clone(), key)),
                None,
            ),
            Platform::Switch => {
                let action = if key == AttributeKey::ManualWatering {
                    extra.insert(
                        "default_manual_timer".to_owned(),
                        watering_minutes.to_string(),
                    );
                    SwitchAction::ManualWatering {
                        minutes: watering_minutes,
                    }
                } else {
                    SwitchAction::AutoWatering
                };
                (
                    Arc::new(SwitchObserver::new(
                        unique_id.clone(),
                        node.clone(),
                        key,
                        action,
                    )),
                    Some(action),
                )
            }
        };

        Self {
            unique_id,
            name,
            platform: meta.platform,
            node,
            key,
            extra,
            observer,
            control,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn node(&self) -> &ObjectId {
        &self.node
    }

    pub fn key(&self) -> AttributeKey {
        self.key
    }

    pub fn extra_attributes(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    pub fn observer(&self) -> Arc<dyn Observer> {
        Arc::clone(&self.observer)
    }

    /// Switch behavior, `None` for sensors.
    pub fn control(&self) -> Option<SwitchAction> {
        self.control
    }

    pub fn state(&self) -> AttributeState {
        self.observer.current_state()
    }

    /// Serializable view; `available` mirrors the last poll's outcome.
    pub fn snapshot(&self, available: bool) -> EntitySnapshot {
        let state = self.state();
        EntitySnapshot {
            unique_id: self.unique_id.clone(),
            name: self.name.clone(),
            platform: self.platform,
            state: state.display(),
            value: state.value,
            is_on: state.is_on,
            icon: state.icon,
            unit: state.unit,
            available,
            attributes: self.extra.clone(),
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("unique_id", &self.unique_id)
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of an entity for display and serialization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub unique_id: String,
    pub name: String,
    pub platform: Platform,
    pub state: String,
    pub value: Option<AttributeValue>,
    pub is_on: Option<bool>,
    pub icon: Option<String>,
    pub unit: Option<&'static str>,
    pub available: bool,
    pub attributes: BTreeMap<String, String>,
}

// ── Identity and naming ──────────────────────────────────────────────

/// `{serial}_{attribute}`, or `{faucet_serial}_{attribute}_{zone_id}` for zones.
pub fn unique_id(node: &ObjectId, key: AttributeKey) -> String {
    match node {
        ObjectId::Controller { serial } | ObjectId::Faucet { serial } => format!("{serial}_{key}"),
        ObjectId::Zone {
            faucet_serial,
            zone_id,
        } => format!("{faucet_serial}_{key}_{zone_id}"),
    }
}

fn display_name(node: &ObjectId, names: NodeNames<'_>, label: &str) -> String {
    if !names.name.is_empty() {
        return format!("{} {label}", names.name);
    }
    match (node, names.faucet) {
        (ObjectId::Zone { zone_id, .. }, Some((_, faucet_id))) => {
            format!("{faucet_id}: Zone {zone_id} {label}")
        }
        _ => format!("{} {label}", names.id),
    }
}
