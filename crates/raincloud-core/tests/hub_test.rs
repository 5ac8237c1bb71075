// Scenario tests for `Hub`: setup, polling, commands and teardown
// against a simulated account.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use raincloud_api::{AttributeKey, AttributeValue, Fault, ObjectId, SimulatedAccount};
use raincloud_core::{
    CommandResult, CoreError, CredentialCheck, Hub, HubConfig, Platform, validate_credentials,
};
use secrecy::SecretString;

// ── Helpers ─────────────────────────────────────────────────────────

const USERNAME: &str = "Gardener@Example.com";

const FIXTURE: &str = r#"{
    "username": "gardener@example.com",
    "password": "hunter2",
    "controllers": [{
        "serial": "C1", "id": "c-1", "name": "Backyard",
        "attributes": { "status": { "text": "Online" } },
        "faucets": [{
            "serial": "F1", "id": "f-1", "name": "",
            "attributes": { "status": { "text": "Online" }, "battery": { "number": 87 } },
            "zones": [
                { "id": 1, "name": "Roses", "attributes": {
                    "is_watering": { "bool": false },
                    "auto_watering": { "bool": true },
                    "manual_watering": { "bool": false },
                    "next_cycle": { "text": "2026-10-15T06:00:00Z" },
                    "rain_delay": { "number": 0 },
                    "watering_time": { "duration": "0s" }
                } },
                { "id": 2, "attributes": { "rain_delay": { "number": 0 } } },
                { "id": 3, "attributes": { "rain_delay": { "number": 0 } } }
            ]
        }]
    }]
}"#;

fn config() -> HubConfig {
    HubConfig::new(USERNAME, SecretString::from("hunter2"))
        .with_poll_interval(Duration::from_secs(3600))
}

fn faucet() -> ObjectId {
    ObjectId::Faucet {
        serial: "F1".into(),
    }
}

async fn setup() -> (Arc<SimulatedAccount>, Hub) {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let hub = Hub::setup(config(), account.clone()).await.unwrap();
    (account, hub)
}

async fn wait_for_polls(hub: &Hub, polls: u64) {
    let mut status = hub.coordinator().status();
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.polls >= polls))
        .await
        .unwrap()
        .map(|_| ())
        .unwrap();
}

fn value_of(hub: &Hub, unique_id: &str) -> Option<AttributeValue> {
    hub.entity(unique_id).unwrap().state().value
}

// ── Setup ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_healthy_cycle() {
    let (account, hub) = setup().await;

    assert_eq!(hub.unique_id(), "gardener@example.com");
    assert_eq!(hub.entities().len(), 1 + 2 + 3 * 6);
    assert!(hub.coordinator().last_update_success());

    let status = hub.entity("F1_status").unwrap().state();
    assert_eq!(status.is_on, Some(true));
    assert_eq!(status.icon.as_deref(), Some("mdi:pipe"));

    let battery = hub.entity("F1_battery").unwrap().state();
    assert_eq!(battery.value, Some(AttributeValue::Number(87.0)));
    assert_eq!(battery.unit, Some("%"));

    let watering = hub.entity("F1_is_watering_1").unwrap();
    assert_eq!(watering.name(), "Roses Watering");
    assert_eq!(watering.state().is_on, Some(false));
    assert_eq!(watering.state().icon.as_deref(), Some("mdi:water-off"));
    assert_eq!(hub.entity("F1_rain_delay_2").unwrap().name(), "f-1: Zone 2 Rain Delay");

    let switches = hub.entity_snapshots(Some(Platform::Switch));
    assert_eq!(switches.len(), 6);
    assert!(switches.iter().all(|s| s.available));

    hub.shutdown().await;
    assert_eq!(account.active_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_setup_rejects_bad_credentials() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let config = HubConfig::new(USERNAME, SecretString::from("wrong"));

    let err = Hub::setup(config, account.clone()).await.unwrap_err();
    assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    assert_eq!(account.fetch_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_setup_aborts_when_first_refresh_fails() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    account.fail_next_fetch(Fault::Remote("maintenance".into()));

    let err = Hub::setup(config(), account.clone()).await.unwrap_err();
    assert!(matches!(err, CoreError::SetupFailed { .. }));
    assert_eq!(account.active_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_setup_validates_watering_minutes() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let err = Hub::setup(config().with_watering_minutes(7), account.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(account.active_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_debug_names_account_without_password() {
    let (_account, hub) = setup().await;

    let debug = format!("{hub:?}");
    assert!(debug.starts_with("Hub {"));
    assert!(debug.contains("gardener@example.com"));
    assert!(debug.contains("entities: 21"));
    assert!(!debug.contains("hunter2"));

    hub.shutdown().await;
    assert!(format!("{hub:?}").contains("cancelled: true"));
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_battery_survives_failed_poll() {
    let (account, hub) = setup().await;
    let mut exposed = Vec::new();

    account.set_attribute(&faucet(), AttributeKey::Battery, 50.0.into());
    hub.coordinator().poll().await.unwrap();
    exposed.push(value_of(&hub, "F1_battery"));

    account.fail_next_fetch(Fault::Remote("bad gateway".into()));
    hub.coordinator().poll().await.unwrap_err();
    exposed.push(value_of(&hub, "F1_battery"));
    assert!(!hub.entity_snapshots(None)[0].available);

    account.set_attribute(&faucet(), AttributeKey::Battery, 48.0.into());
    hub.coordinator().poll().await.unwrap();
    exposed.push(value_of(&hub, "F1_battery"));

    let numbers: Vec<Option<f64>> = exposed
        .iter()
        .map(|v| v.as_ref().and_then(AttributeValue::as_number))
        .collect();
    assert_eq!(numbers, vec![Some(50.0), Some(50.0), Some(48.0)]);
    hub.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_next_cycle_keeps_previous_value() {
    let (account, hub) = setup().await;
    let zone = ObjectId::zone("F1", 1);
    let before = value_of(&hub, "F1_next_cycle_1");
    assert!(before.is_some());

    account.remove_attribute(&zone, AttributeKey::NextCycle);
    account.set_attribute(&zone, AttributeKey::RainDelay, 1u32.into());
    hub.coordinator().poll().await.unwrap();

    assert_eq!(value_of(&hub, "F1_next_cycle_1"), before);
    assert_eq!(
        value_of(&hub, "F1_rain_delay_1"),
        Some(AttributeValue::Number(1.0))
    );
    hub.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_updates_counter_tracks_published_snapshots() {
    let (account, hub) = setup().await;
    let updates = hub.updates();
    assert_eq!(*updates.borrow(), 1);

    account.fail_next_fetch(Fault::Timeout);
    hub.coordinator().poll().await.unwrap_err();
    assert_eq!(*updates.borrow(), 1);

    hub.coordinator().poll().await.unwrap();
    assert_eq!(*updates.borrow(), 2);
    hub.shutdown().await;
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rain_delay_partial_failure() {
    let (account, hub) = setup().await;
    account.fail_mutations_for(
        ObjectId::zone("F1", 2),
        Fault::Rejected("valve offline".into()),
    );
    let fetches = account.fetch_count();
    let polls = hub.status().polls;

    let err = hub.rain_delay(3).await.unwrap_err();
    let CoreError::PartialFanOut { failed, succeeded } = err else {
        panic!("expected a partial fan-out");
    };
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].zone, ObjectId::zone("F1", 2));
    assert_eq!(
        succeeded,
        vec![ObjectId::zone("F1", 1), ObjectId::zone("F1", 3)]
    );

    // One refresh, and entities reflect what the service actually holds.
    wait_for_polls(&hub, polls + 1).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(account.fetch_count(), fetches + 1);

    assert_eq!(value_of(&hub, "F1_rain_delay_1"), Some(AttributeValue::Number(3.0)));
    assert_eq!(value_of(&hub, "F1_rain_delay_2"), Some(AttributeValue::Number(0.0)));
    assert_eq!(value_of(&hub, "F1_rain_delay_3"), Some(AttributeValue::Number(3.0)));
    hub.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rain_delay_targets_every_zone() {
    let (_account, hub) = setup().await;
    let result = hub.rain_delay(2).await.unwrap();
    let CommandResult::FannedOut { targets } = result else {
        panic!("expected a fan-out result");
    };
    assert_eq!(targets.len(), 3);
    hub.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_manual_watering_switch_uses_default_minutes() {
    let (account, hub) = setup().await;
    let polls = hub.status().polls;

    hub.turn_on("F1_manual_watering_1").await.unwrap();
    wait_for_polls(&hub, polls + 1).await;

    let zone = ObjectId::zone("F1", 1);
    assert_eq!(
        account.peek().attribute(&zone, AttributeKey::WateringTime),
        Some(&AttributeValue::Duration(Duration::from_secs(15 * 60)))
    );
    assert_eq!(hub.entity("F1_manual_watering_1").unwrap().state().is_on, Some(true));
    assert_eq!(hub.entity("F1_is_watering_1").unwrap().state().is_on, Some(true));

    hub.turn_off("F1_manual_watering_1").await.unwrap();
    wait_for_polls(&hub, polls + 2).await;
    assert_eq!(hub.entity("F1_manual_watering_1").unwrap().state().is_on, Some(false));
    hub.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_switch_write_keeps_prior_state() {
    let (account, hub) = setup().await;
    let zone = ObjectId::zone("F1", 1);
    account.fail_mutations_for(zone, Fault::Rejected("busy".into()));
    let polls = hub.status().polls;

    let err = hub.turn_off("F1_auto_watering_1").await.unwrap_err();
    assert!(matches!(err, CoreError::MutateFailed { .. }));

    // The refresh still runs and shows the unchanged remote state.
    wait_for_polls(&hub, polls + 1).await;
    assert_eq!(hub.entity("F1_auto_watering_1").unwrap().state().is_on, Some(true));
    hub.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sensors_and_unknown_ids_are_not_switchable() {
    let (_account, hub) = setup().await;

    let err = hub.turn_on("F1_battery").await.unwrap_err();
    assert!(matches!(err, CoreError::NotAControl { ref platform, .. } if platform == "sensor"));

    let err = hub.turn_on("F9_auto_watering_1").await.unwrap_err();
    assert!(matches!(err, CoreError::EntityNotFound { .. }));
    hub.shutdown().await;
}

// ── Credential check ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_validate_credentials_maps_failures() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let good = SecretString::from("hunter2");

    assert_eq!(
        validate_credentials(account.clone(), USERNAME, &good).await,
        CredentialCheck::Valid
    );
    assert_eq!(account.active_sessions(), 0);

    assert_eq!(
        validate_credentials(account.clone(), USERNAME, &SecretString::from("nope")).await,
        CredentialCheck::InvalidAuth
    );

    account.fail_next_login(Fault::Connect);
    assert_eq!(
        validate_credentials(account.clone(), USERNAME, &good).await,
        CredentialCheck::CannotConnect
    );

    account.fail_next_login(Fault::Remote("unexpected".into()));
    assert_eq!(
        validate_credentials(account.clone(), USERNAME, &good).await,
        CredentialCheck::Unknown
    );
    assert_eq!(CredentialCheck::InvalidAuth.to_string(), "invalid_auth");
}
