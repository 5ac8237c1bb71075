// ── Entity discovery ──
//
// Builds the fixed entity set for an account from the first Topology:
// controller status; faucet status and battery; per zone the watering
// sensor, three scalar sensors and the two watering switches.

use std::collections::HashMap;
use std::sync::Arc;

use raincloud_api::{AttributeKey, ObjectId, Topology};
use tracing::{debug, warn};

use crate::attribute::Platform;
use crate::config::DEFAULT_WATERING_MINUTES;
use crate::entity::{Entity, NodeNames};

const CONTROLLER_KEYS: &[AttributeKey] = &[AttributeKey::Status];
const FAUCET_KEYS: &[AttributeKey] = &[AttributeKey::Status, AttributeKey::Battery];
const ZONE_KEYS: &[AttributeKey] = &[
    AttributeKey::IsWatering,
    AttributeKey::NextCycle,
    AttributeKey::RainDelay,
    AttributeKey::WateringTime,
    AttributeKey::AutoWatering,
    AttributeKey::ManualWatering,
];

/// Discovery options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityOptions {
    /// Minutes a manual watering switch runs when turned on.
    pub watering_minutes: u32,
}

impl Default for EntityOptions {
    fn default() -> Self {
        Self {
            watering_minutes: DEFAULT_WATERING_MINUTES,
        }
    }
}

/// Every entity of one account, in discovery order.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Vec<Arc<Entity>>,
    index: HashMap<String, usize>,
}

impl EntityRegistry {
    pub fn discover(topology: &Topology, options: &EntityOptions) -> Self {
        let mut registry = Self::default();

        for controller in &topology.controllers {
            let node = ObjectId::Controller {
                serial: controller.serial.clone(),
            };
            let names = NodeNames {
                serial: &controller.serial,
                id: &controller.id,
                name: &controller.name,
                faucet: None,
            };
            for key in CONTROLLER_KEYS {
                registry.push(Entity::build(node.clone(), *key, names, options.watering_minutes));
            }

            for faucet in &controller.faucets {
                let node = ObjectId::Faucet {
                    serial: faucet.serial.clone(),
                };
                let names = NodeNames {
                    serial: &faucet.serial,
                    id: &faucet.id,
                    name: &faucet.name,
                    faucet: None,
                };
                for key in FAUCET_KEYS {
                    registry.push(Entity::build(
                        node.clone(),
                        *key,
                        names,
                        options.watering_minutes,
                    ));
                }

                for zone in &faucet.zones {
                    let node = ObjectId::zone(faucet.serial.clone(), zone.id);
                    let zone_id = zone.id.to_string();
                    let names = NodeNames {
                        serial: &faucet.serial,
                        id: &zone_id,
                        name: &zone.name,
                        faucet: Some((&faucet.serial, &faucet.id)),
                    };
                    for key in ZONE_KEYS {
                        registry.push(Entity::build(
                            node.clone(),
                            *key,
                            names,
                            options.watering_minutes,
                        ));
                    }
                }
            }
        }

        debug!(entities = registry.len(), "entity discovery complete");
        registry
    }

    fn push(&mut self, entity: Entity) {
        if self.index.contains_key(entity.unique_id()) {
            warn!(unique_id = entity.unique_id(), "duplicate entity id, skipping");
            return;
        }
        self.index
            .insert(entity.unique_id().to_owned(), self.entities.len());
        self.entities.push(Arc::new(entity));
    }

    pub fn get(&self, unique_id: &str) -> Option<&Arc<Entity>> {
        self.index
            .get(unique_id)
            .and_then(|i| self.entities.get(*i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        self.entities.iter()
    }

    pub fn by_platform(&self, platform: Platform) -> impl Iterator<Item = &Arc<Entity>> + '_ {
        self.entities
            .iter()
            .filter(move |e| e.platform() == platform)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use raincloud_api::{Attributes, Controller, Faucet, Zone};

    fn zone(id: u32) -> Zone {
        Zone {
            id,
            name: String::new(),
            attributes: Attributes::new(),
        }
    }

    fn topology() -> Topology {
        Topology::new(vec![Controller {
            serial: "C1".into(),
            id: "c-1".into(),
            name: "Garden".into(),
            attributes: Attributes::new(),
            faucets: vec![
                Faucet {
                    serial: "F1".into(),
                    id: "f-1".into(),
                    name: String::new(),
                    attributes: Attributes::new(),
                    zones: vec![zone(1), zone(2)],
                },
                Faucet {
                    serial: "F2".into(),
                    id: "f-2".into(),
                    name: String::new(),
                    attributes: Attributes::new(),
                    zones: vec![zone(1)],
                },
            ],
        }])
    }

    #[test]
    fn discovers_the_fixed_entity_set() {
        let registry = EntityRegistry::discover(&topology(), &EntityOptions::default());
        // 1 controller status, 2 x (status + battery), 3 zones x 6
        assert_eq!(registry.len(), 1 + 4 + 18);
        assert_eq!(registry.by_platform(Platform::Switch).count(), 6);
        assert_eq!(registry.by_platform(Platform::BinarySensor).count(), 1 + 2 + 3);
        assert!(registry.get("F2_rain_delay_1").is_some());
        assert_eq!(registry.get("C1_status").unwrap().name(), "Garden Status");
    }

    #[test]
    fn identities_are_stable_across_snapshots() {
        let first = EntityRegistry::discover(&topology(), &EntityOptions::default());
        let mut later = topology();
        later.controllers[0].faucets[0].zones[0]
            .attributes
            .insert(AttributeKey::RainDelay, 2u32.into());
        let second = EntityRegistry::discover(&later, &EntityOptions::default());

        let ids = |r: &EntityRegistry| -> Vec<String> {
            r.iter().map(|e| e.unique_id().to_owned()).collect()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn duplicate_ids_keep_the_first_entity() {
        let mut topo = topology();
        // Same faucet serial under a second controller.
        let mut twin = topo.controllers[0].clone();
        twin.serial = "C2".into();
        topo.controllers.push(twin);

        let registry = EntityRegistry::discover(&topo, &EntityOptions::default());
        assert_eq!(registry.len(), 1 + 4 + 18 + 1);
    }
}
