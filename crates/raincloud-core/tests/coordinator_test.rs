// Integration tests for `RefreshCoordinator` against a simulated account.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use pretty_assertions::assert_eq;
use raincloud_api::{
    AttributeKey, DeviceClient, Error, Fault, Mutation, ObjectId, Session, SimulatedAccount,
    Topology,
};
use raincloud_core::{AttributeState, Connection, CoreError, Observer, RefreshCoordinator};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

// ── Helpers ─────────────────────────────────────────────────────────

const USERNAME: &str = "gardener@example.com";

const FIXTURE: &str = r#"{
    "username": "gardener@example.com",
    "password": "hunter2",
    "controllers": [{
        "serial": "C1", "id": "c-1", "name": "Backyard",
        "attributes": { "status": { "text": "Online" } },
        "faucets": [{
            "serial": "F1", "id": "f-1",
            "attributes": { "status": { "text": "Online" }, "battery": { "number": 87 } },
            "zones": [
                { "id": 1, "attributes": { "rain_delay": { "number": 0 } } },
                { "id": 2, "attributes": { "rain_delay": { "number": 0 } } }
            ]
        }]
    }]
}"#;

fn password() -> SecretString {
    SecretString::from("hunter2")
}

async fn coordinator_for(
    client: Arc<dyn DeviceClient>,
    interval: Duration,
) -> RefreshCoordinator {
    let connection = Connection::open(client, USERNAME, &password()).await.unwrap();
    RefreshCoordinator::new(Arc::new(connection), interval)
}

async fn wait_for_polls(coordinator: &RefreshCoordinator, polls: u64) {
    let mut status = coordinator.status();
    tokio::time::timeout(Duration::from_secs(5), status.wait_for(|s| s.polls >= polls))
        .await
        .unwrap()
        .map(|_| ())
        .unwrap();
}

/// Records the address of every snapshot it is notified with.
struct Recorder {
    id: String,
    seen: Mutex<Vec<usize>>,
}

impl Recorder {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<usize> {
        self.seen.lock().unwrap().clone()
    }
}

impl Observer for Recorder {
    fn id(&self) -> &str {
        &self.id
    }

    fn recompute_from(&self, topology: &Topology) -> AttributeState {
        self.seen
            .lock()
            .unwrap()
            .push(std::ptr::from_ref(topology).addr());
        AttributeState::default()
    }

    fn current_state(&self) -> AttributeState {
        AttributeState::default()
    }
}

/// Blocks every fetch until the test releases it.
struct GatedClient {
    account: SimulatedAccount,
    entered: tokio::sync::mpsc::UnboundedSender<()>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl DeviceClient for GatedClient {
    fn authenticate(&self, username: &str, password: &SecretString) -> Result<Session, Error> {
        self.account.authenticate(username, password)
    }

    fn fetch_topology(&self, session: &Session) -> Result<Topology, Error> {
        let _ = self.entered.send(());
        self.release
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| Error::Remote {
                message: "gate closed".into(),
            })?;
        self.account.fetch_topology(session)
    }

    fn mutate(
        &self,
        session: &Session,
        target: &ObjectId,
        mutation: Mutation,
    ) -> Result<(), Error> {
        self.account.mutate(session, target, mutation)
    }

    fn logout(&self, session: &Session) -> Result<(), Error> {
        self.account.logout(session)
    }
}

// ── Snapshot semantics ──────────────────────────────────────────────

#[tokio::test]
async fn test_failed_poll_keeps_previous_snapshot() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let coordinator = coordinator_for(account.clone(), Duration::from_secs(3600)).await;
    assert!(coordinator.current().is_none());

    let first = coordinator.poll().await.unwrap();
    account.fail_next_fetch(Fault::Remote("service unavailable".into()));
    let err = coordinator.poll().await.unwrap_err();

    assert!(matches!(err, CoreError::FetchFailed { .. }));
    assert!(Arc::ptr_eq(&coordinator.current().unwrap(), &first));

    let status = coordinator.status_snapshot();
    assert_eq!(status.polls, 2);
    assert_eq!(status.consecutive_failures, 1);
    assert!(status.last_error.is_some());
    assert!(!coordinator.last_update_success());

    coordinator.poll().await.unwrap();
    assert!(coordinator.last_update_success());
    assert_eq!(coordinator.status_snapshot().consecutive_failures, 0);
}

#[tokio::test]
async fn test_observers_notified_once_with_same_snapshot() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let coordinator = coordinator_for(account.clone(), Duration::from_secs(3600)).await;
    let recorders: Vec<_> = ["a", "b", "c"].into_iter().map(Recorder::new).collect();
    for recorder in &recorders {
        coordinator.register(recorder.clone()).unwrap();
    }

    let first = coordinator.poll().await.unwrap();
    account.fail_next_fetch(Fault::Timeout);
    coordinator.poll().await.unwrap_err();
    let third = coordinator.poll().await.unwrap();

    for recorder in &recorders {
        let seen = recorder.seen();
        assert_eq!(seen.len(), 2, "observer {} notified wrong number of times", recorder.id);
        assert_eq!(seen[0], Arc::as_ptr(&first).addr());
        assert_eq!(seen[1], Arc::as_ptr(&third).addr());
    }
}

#[tokio::test]
async fn test_invalid_topology_is_a_failed_poll() {
    let mut topology = SimulatedAccount::from_json(FIXTURE).unwrap().peek();
    // Two zones numbered 1 on one faucet.
    topology.controllers[0].faucets[0].zones[1].id = 1;
    let account = Arc::new(SimulatedAccount::new(USERNAME, None, topology));
    let coordinator = coordinator_for(account, Duration::from_secs(3600)).await;
    let recorder = Recorder::new("a");
    coordinator.register(recorder.clone()).unwrap();

    assert!(coordinator.poll().await.is_err());
    assert!(coordinator.current().is_none());
    assert!(recorder.seen().is_empty());
}

#[tokio::test]
async fn test_duplicate_observer_rejected() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let coordinator = coordinator_for(account, Duration::from_secs(3600)).await;

    coordinator.register(Recorder::new("F1_battery")).unwrap();
    let err = coordinator.register(Recorder::new("F1_battery")).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateEntity { unique_id } if unique_id == "F1_battery"));
    assert_eq!(coordinator.observer_count(), 1);

    assert!(coordinator.unregister("F1_battery"));
    assert!(!coordinator.unregister("F1_battery"));
}

#[tokio::test]
async fn test_rejected_session_flags_reauth() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let coordinator = coordinator_for(account.clone(), Duration::from_secs(3600)).await;
    coordinator.poll().await.unwrap();

    account.fail_next_fetch(Fault::Authentication);
    let err = coordinator.poll().await.unwrap_err();
    assert!(err.is_auth());
    assert!(coordinator.status_snapshot().reauth_required);

    coordinator.poll().await.unwrap();
    assert!(!coordinator.status_snapshot().reauth_required);
}

#[tokio::test]
async fn test_first_refresh_failure_is_a_setup_failure() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let coordinator = coordinator_for(account.clone(), Duration::from_secs(3600)).await;
    account.fail_next_fetch(Fault::Connect);

    let err = coordinator.first_refresh().await.unwrap_err();
    assert!(matches!(err, CoreError::SetupFailed { .. }));
    assert!(err.is_transient());
}

// ── Background task ─────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_refresh_coalesces_during_inflight_poll() {
    let (entered_tx, mut entered_rx) = tokio::sync::mpsc::unbounded_channel();
    let (release_tx, release_rx) = mpsc::channel();
    let client = Arc::new(GatedClient {
        account: SimulatedAccount::from_json(FIXTURE).unwrap(),
        entered: entered_tx,
        release: Mutex::new(release_rx),
    });
    let coordinator = coordinator_for(client.clone(), Duration::from_secs(3600)).await;
    let cancel = CancellationToken::new();
    let task = coordinator.spawn(cancel.clone());

    coordinator.request_refresh();
    entered_rx.recv().await.unwrap();

    for _ in 0..5 {
        coordinator.request_refresh();
    }
    release_tx.send(()).unwrap();

    // Exactly one follow-up poll for the five requests.
    entered_rx.recv().await.unwrap();
    release_tx.send(()).unwrap();
    wait_for_polls(&coordinator, 2).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(entered_rx.try_recv().is_err());
    assert_eq!(client.account.fetch_count(), 2);
    assert_eq!(coordinator.status_snapshot().polls, 2);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_polls_on_cadence_until_cancelled() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let coordinator = coordinator_for(account.clone(), Duration::from_millis(50)).await;
    let cancel = CancellationToken::new();
    let task = coordinator.spawn(cancel.clone());

    wait_for_polls(&coordinator, 3).await;
    cancel.cancel();
    task.await.unwrap();

    let polls = coordinator.status_snapshot().polls;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(coordinator.status_snapshot().polls, polls);
    assert!(coordinator.current().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zero_interval_refreshes_on_demand_only() {
    let account = Arc::new(SimulatedAccount::from_json(FIXTURE).unwrap());
    let coordinator = coordinator_for(account.clone(), Duration::ZERO).await;
    let cancel = CancellationToken::new();
    let task = coordinator.spawn(cancel.clone());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.status_snapshot().polls, 0);

    coordinator.request_refresh();
    wait_for_polls(&coordinator, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(coordinator.status_snapshot().polls, 1);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_abandons_inflight_fetch() {
    let (entered_tx, mut entered_rx) = tokio::sync::mpsc::unbounded_channel();
    let (release_tx, release_rx) = mpsc::channel();
    let client = Arc::new(GatedClient {
        account: SimulatedAccount::from_json(FIXTURE).unwrap(),
        entered: entered_tx,
        release: Mutex::new(release_rx),
    });
    let coordinator = coordinator_for(client.clone(), Duration::from_secs(3600)).await;
    let cancel = CancellationToken::new();
    let task = coordinator.spawn(cancel.clone());

    coordinator.request_refresh();
    entered_rx.recv().await.unwrap();
    cancel.cancel();
    task.await.unwrap();

    // The blocking fetch finishes after the task is gone; nothing is published.
    release_tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(coordinator.current().is_none());
    assert_eq!(coordinator.status_snapshot().polls, 0);
    assert_eq!(client.account.fetch_count(), 1);

    let zone = ObjectId::zone("F1", 1);
    assert!(
        client
            .account
            .peek()
            .attribute(&zone, AttributeKey::RainDelay)
            .is_some()
    );
}
