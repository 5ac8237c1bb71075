// ── Simulated account ──
//
// A `DeviceClient` backed by an in-memory topology, loaded from a JSON
// fixture or built in code. Writes update the in-memory tree the way the
// cloud service would, and faults can be injected per fetch or per node.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::client::{DeviceClient, ManualWatering, Mutation, Session};
use crate::error::Error;
use crate::model::{AttributeKey, AttributeValue, Controller, ObjectId, Topology};

const SERVICE: &str = "simulated account";

/// A failure to inject into the simulated account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Connect,
    Timeout,
    Authentication,
    Remote(String),
    Rejected(String),
}

impl Fault {
    fn into_error(self, target: &str) -> Error {
        match self {
            Self::Connect => Error::Connect {
                service: SERVICE.into(),
                reason: "connection refused".into(),
            },
            Self::Timeout => Error::Timeout { timeout_secs: 30 },
            Self::Authentication => Error::SessionExpired,
            Self::Remote(message) => Error::Remote { message },
            Self::Rejected(message) => Error::Mutate {
                target: target.into(),
                message,
            },
        }
    }
}

/// On-disk fixture: credentials plus the device tree.
#[derive(Debug, Deserialize)]
struct AccountFixture {
    username: String,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    controllers: Vec<Controller>,
}

/// In-memory stand-in for a cloud irrigation account.
pub struct SimulatedAccount {
    username: String,
    /// `None` accepts any password.
    password: Option<SecretString>,
    state: ArcSwap<Topology>,
    sessions: DashSet<String>,
    fetch_faults: Mutex<VecDeque<Fault>>,
    mutate_faults: DashMap<ObjectId, Fault>,
    login_fault: Mutex<Option<Fault>>,
    next_token: AtomicU64,
    fetches: AtomicU64,
    mutations: AtomicU64,
}

impl SimulatedAccount {
    pub fn new(
        username: impl Into<String>,
        password: Option<SecretString>,
        topology: Topology,
    ) -> Self {
        Self {
            username: username.into(),
            password,
            state: ArcSwap::from_pointee(topology),
            sessions: DashSet::new(),
            fetch_faults: Mutex::new(VecDeque::new()),
            mutate_faults: DashMap::new(),
            login_fault: Mutex::new(None),
            next_token: AtomicU64::new(1),
            fetches: AtomicU64::new(0),
            mutations: AtomicU64::new(0),
        }
    }

    /// Parse a JSON fixture (`{"username", "password"?, "controllers"}`).
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        let fixture: AccountFixture = serde_json::from_str(raw)?;
        let topology = Topology::new(fixture.controllers);
        topology.validate()?;
        Ok(Self::new(
            fixture.username,
            fixture.password.map(SecretString::from),
            topology,
        ))
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    // ── Fault injection ──────────────────────────────────────────────

    /// Fail the next fetch (faults queue up, one per fetch).
    pub fn fail_next_fetch(&self, fault: Fault) {
        lock(&self.fetch_faults).push_back(fault);
    }

    /// Fail every write to `target` until [`clear_faults`](Self::clear_faults).
    pub fn fail_mutations_for(&self, target: ObjectId, fault: Fault) {
        self.mutate_faults.insert(target, fault);
    }

    /// Fail the next login attempt.
    pub fn fail_next_login(&self, fault: Fault) {
        *lock(&self.login_fault) = Some(fault);
    }

    pub fn clear_faults(&self) {
        lock(&self.fetch_faults).clear();
        self.mutate_faults.clear();
        *lock(&self.login_fault) = None;
    }

    // ── Remote-side state changes ────────────────────────────────────

    /// Change an attribute as if the device reported a new value.
    pub fn set_attribute(&self, target: &ObjectId, key: AttributeKey, value: AttributeValue) {
        self.state.rcu(|current| {
            let mut next = Topology::clone(current);
            if let Some(attrs) = attributes_mut(&mut next, target) {
                attrs.insert(key, value.clone());
            }
            next
        });
    }

    /// Stop reporting an attribute.
    pub fn remove_attribute(&self, target: &ObjectId, key: AttributeKey) {
        self.state.rcu(|current| {
            let mut next = Topology::clone(current);
            if let Some(attrs) = attributes_mut(&mut next, target) {
                attrs.remove(&key);
            }
            next
        });
    }

    // ── Introspection ────────────────────────────────────────────────

    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn mutation_count(&self) -> u64 {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// The account's current state, without counting as a fetch.
    pub fn peek(&self) -> Topology {
        Topology::clone(&self.state.load())
    }

    fn check_session(&self, session: &Session) -> Result<(), Error> {
        if self.sessions.contains(session.token().expose_secret()) {
            Ok(())
        } else {
            Err(Error::SessionExpired)
        }
    }
}

impl DeviceClient for SimulatedAccount {
    fn authenticate(&self, username: &str, password: &SecretString) -> Result<Session, Error> {
        if let Some(fault) = lock(&self.login_fault).take() {
            return Err(match fault {
                Fault::Authentication => Error::Authentication {
                    message: "invalid username or password".into(),
                },
                other => other.into_error(SERVICE),
            });
        }

        let password_ok = self
            .password
            .as_ref()
            .is_none_or(|expected| expected.expose_secret() == password.expose_secret());
        if !username.eq_ignore_ascii_case(&self.username) || !password_ok {
            return Err(Error::Authentication {
                message: "invalid username or password".into(),
            });
        }

        let token = format!("sim-{}", self.next_token.fetch_add(1, Ordering::SeqCst));
        self.sessions.insert(token.clone());
        debug!(username, "simulated login");
        Ok(Session::new(username, SecretString::from(token)))
    }

    fn fetch_topology(&self, session: &Session) -> Result<Topology, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_session(session)?;

        if let Some(fault) = lock(&self.fetch_faults).pop_front() {
            return Err(fault.into_error(SERVICE));
        }

        let mut topology = self.peek();
        topology.fetched_at = Utc::now();
        Ok(topology)
    }

    fn mutate(
        &self,
        session: &Session,
        target: &ObjectId,
        mutation: Mutation,
    ) -> Result<(), Error> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.check_session(session)?;

        if let Some(fault) = self.mutate_faults.get(target) {
            return Err(fault.clone().into_error(&target.to_string()));
        }
        if !target.is_zone() {
            return Err(Error::Mutate {
                target: target.to_string(),
                message: format!("{} can only be set on zones", mutation.attribute()),
            });
        }
        if !self.state.load().contains(target) {
            return Err(Error::UnknownObject(target.to_string()));
        }

        self.state.rcu(|current| {
            let mut next = Topology::clone(current);
            if let Some(attrs) = attributes_mut(&mut next, target) {
                for (key, value) in apply(mutation) {
                    attrs.insert(key, value);
                }
            }
            next
        });
        debug!(%target, ?mutation, "simulated write applied");
        Ok(())
    }

    fn logout(&self, session: &Session) -> Result<(), Error> {
        self.sessions.remove(session.token().expose_secret());
        Ok(())
    }
}

/// Attribute changes a write produces on the service side.
fn apply(mutation: Mutation) -> Vec<(AttributeKey, AttributeValue)> {
    match mutation {
        Mutation::AutoWatering(enabled) => vec![(AttributeKey::AutoWatering, enabled.into())],
        Mutation::ManualWatering(ManualWatering::Minutes(minutes)) => {
            let duration = Duration::from_secs(u64::from(minutes) * 60);
            vec![
                (AttributeKey::ManualWatering, duration.into()),
                (AttributeKey::IsWatering, true.into()),
                (AttributeKey::WateringTime, duration.into()),
            ]
        }
        Mutation::ManualWatering(ManualWatering::Off) => vec![
            (AttributeKey::ManualWatering, false.into()),
            (AttributeKey::IsWatering, false.into()),
            (AttributeKey::WateringTime, Duration::ZERO.into()),
        ],
        Mutation::RainDelay(days) => vec![(AttributeKey::RainDelay, days.into())],
    }
}

fn attributes_mut<'a>(
    topology: &'a mut Topology,
    id: &ObjectId,
) -> Option<&'a mut crate::model::Attributes> {
    match id {
        ObjectId::Controller { serial } => topology
            .controllers
            .iter_mut()
            .find(|c| &c.serial == serial)
            .map(|c| &mut c.attributes),
        ObjectId::Faucet { serial } => topology
            .controllers
            .iter_mut()
            .flat_map(|c| c.faucets.iter_mut())
            .find(|f| &f.serial == serial)
            .map(|f| &mut f.attributes),
        ObjectId::Zone {
            faucet_serial,
            zone_id,
        } => topology
            .controllers
            .iter_mut()
            .flat_map(|c| c.faucets.iter_mut())
            .find(|f| &f.serial == faucet_serial)?
            .zones
            .iter_mut()
            .find(|z| z.id == *zone_id)
            .map(|z| &mut z.attributes),
    }
}

/// Poison-tolerant lock: a panicking test thread must not wedge the account.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
