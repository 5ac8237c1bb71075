// ── Device-access boundary ──
//
// The contract every device-access library must satisfy. All calls are
// synchronous and may block on network I/O; callers are expected to run
// them on a blocking worker, never on an async executor thread.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::{AttributeKey, ObjectId, Topology};

/// An authenticated session handle.
///
/// Opaque to the integration: it is handed back to the client on every
/// call and dropped after `logout`.
#[derive(Debug, Clone)]
pub struct Session {
    username: String,
    token: SecretString,
}

impl Session {
    pub fn new(username: impl Into<String>, token: SecretString) -> Self {
        Self {
            username: username.into(),
            token,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }
}

/// Manual watering request for one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualWatering {
    /// Water for the given number of minutes.
    Minutes(u32),
    /// Stop a running manual cycle.
    Off,
}

/// One remote write against a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    AutoWatering(bool),
    ManualWatering(ManualWatering),
    /// Rain delay in days; `0` clears it.
    RainDelay(u32),
}

impl Mutation {
    /// The attribute this write changes.
    pub fn attribute(&self) -> AttributeKey {
        match self {
            Self::AutoWatering(_) => AttributeKey::AutoWatering,
            Self::ManualWatering(_) => AttributeKey::ManualWatering,
            Self::RainDelay(_) => AttributeKey::RainDelay,
        }
    }
}

/// Synchronous device-access client.
///
/// Implementations must be shareable across threads: fetches and writes
/// are issued from a blocking worker pool, possibly concurrently (writes
/// are not serialized by the caller).
pub trait DeviceClient: Send + Sync {
    /// Log in and return a session.
    fn authenticate(&self, username: &str, password: &SecretString) -> Result<Session, Error>;

    /// Fetch the complete controller/faucet/zone tree with current values.
    fn fetch_topology(&self, session: &Session) -> Result<Topology, Error>;

    /// Apply one write to the addressed node. A successful write is only
    /// visible after the next `fetch_topology`.
    fn mutate(&self, session: &Session, target: &ObjectId, mutation: Mutation)
    -> Result<(), Error>;

    /// End the session.
    fn logout(&self, session: &Session) -> Result<(), Error>;
}
