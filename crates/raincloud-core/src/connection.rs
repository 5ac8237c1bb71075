// ── Authenticated connection ──
//
// Pairs a DeviceClient with its session. Every client call is blocking
// I/O, so each one runs on tokio's blocking pool and is awaited from the
// async side. No timeout is imposed: a call that never returns keeps its
// worker thread.

use std::sync::Arc;

use raincloud_api::{DeviceClient, Mutation, ObjectId, Session, Topology};
use secrecy::SecretString;
use tracing::debug;

use crate::error::CoreError;

/// A logged-in DeviceClient shared by the coordinator and the dispatcher.
pub struct Connection {
    client: Arc<dyn DeviceClient>,
    session: Session,
}

impl Connection {
    /// Authenticate and wrap the resulting session.
    pub async fn open(
        client: Arc<dyn DeviceClient>,
        username: &str,
        password: &SecretString,
    ) -> Result<Self, CoreError> {
        let session = {
            let client = Arc::clone(&client);
            let username = username.to_owned();
            let password = password.clone();
            blocking(move || client.authenticate(&username, &password)).await?
        };
        debug!(username, "session established");
        Ok(Self { client, session })
    }

    pub fn username(&self) -> &str {
        self.session.username()
    }

    pub(crate) async fn fetch(&self) -> Result<Topology, CoreError> {
        let client = Arc::clone(&self.client);
        let session = self.session.clone();
        blocking(move || client.fetch_topology(&session)).await
    }

    pub(crate) async fn mutate(
        &self,
        target: ObjectId,
        mutation: Mutation,
    ) -> Result<(), CoreError> {
        let client = Arc::clone(&self.client);
        let session = self.session.clone();
        blocking(move || client.mutate(&session, &target, mutation)).await
    }

    pub(crate) async fn logout(&self) -> Result<(), CoreError> {
        let client = Arc::clone(&self.client);
        let session = self.session.clone();
        blocking(move || client.logout(&session)).await
    }
}

/// Run a blocking client call on the blocking pool.
pub(crate) async fn blocking<T, F>(call: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, raincloud_api::Error> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| CoreError::Internal(format!("device client task failed: {e}")))?
        .map_err(CoreError::from)
}
