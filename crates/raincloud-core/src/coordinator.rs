// ── Refresh coordination ──
//
// One shared poll of the account feeding every Observer. The coordinator
// owns the current Topology pointer and the refresh status; both change
// only inside `poll()`. A background task polls on a fixed cadence and on
// demand, with at most one extra poll queued behind an in-flight one.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use raincloud_api::Topology;
use serde::Serialize;
use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::entity::Observer;
use crate::error::CoreError;

// ── RefreshStatus ────────────────────────────────────────────────────

/// Outcome of recent polls, observable by status-reporting callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    pub last_success: Option<DateTime<Utc>>,
    /// Error of the most recent poll, cleared by the next success.
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Completed polls, successful or not.
    pub polls: u64,
    /// The service rejected the session; credentials must be renewed.
    pub reauth_required: bool,
}

impl RefreshStatus {
    pub fn last_update_success(&self) -> bool {
        self.last_success.is_some() && self.last_error.is_none()
    }
}

// ── RefreshCoordinator ───────────────────────────────────────────────

/// Cheaply cloneable handle to the shared poll.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    connection: Arc<Connection>,
    poll_interval: Duration,
    fetch_guard: Mutex<()>,
    current: ArcSwapOption<Topology>,
    observers: DashMap<String, Arc<dyn Observer>>,
    status: watch::Sender<RefreshStatus>,
    generation: watch::Sender<u64>,
    refresh_requested: Notify,
}

impl RefreshCoordinator {
    pub fn new(connection: Arc<Connection>, poll_interval: Duration) -> Self {
        let (status, _) = watch::channel(RefreshStatus::default());
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(CoordinatorInner {
                connection,
                poll_interval,
                fetch_guard: Mutex::new(()),
                current: ArcSwapOption::empty(),
                observers: DashMap::new(),
                status,
                generation,
                refresh_requested: Notify::new(),
            }),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Fetch the topology and publish it.
    ///
    /// On success the snapshot is swapped and every registered Observer
    /// is notified once with it. On failure the previous snapshot stays
    /// current and no Observer is notified.
    pub async fn poll(&self) -> Result<Arc<Topology>, CoreError> {
        let _guard = self.inner.fetch_guard.lock().await;

        let fetched = self
            .inner
            .connection
            .fetch()
            .await
            .and_then(|topology| {
                topology.validate()?;
                Ok(topology)
            });

        match fetched {
            Ok(topology) => {
                let topology = Arc::new(topology);
                self.publish(&topology);
                Ok(topology)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    /// Initial poll of setup; any failure aborts setup.
    pub async fn first_refresh(&self) -> Result<Arc<Topology>, CoreError> {
        self.poll().await.map_err(CoreError::setup)
    }

    /// Ask the background task for an out-of-band poll.
    ///
    /// Never blocks. Requests made while a poll is in flight collapse into
    /// a single follow-up poll.
    pub fn request_refresh(&self) {
        self.inner.refresh_requested.notify_one();
    }

    fn publish(&self, topology: &Arc<Topology>) {
        self.inner.current.store(Some(Arc::clone(topology)));

        let observers: Vec<Arc<dyn Observer>> = self
            .inner
            .observers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for observer in &observers {
            observer.recompute_from(topology);
        }

        let (controllers, faucets, zones) = topology.node_counts();
        self.inner.status.send_modify(|status| {
            if status.reauth_required {
                info!("session accepted again");
            }
            status.last_success = Some(topology.fetched_at);
            status.last_error = None;
            status.consecutive_failures = 0;
            status.polls += 1;
            status.reauth_required = false;
        });
        self.inner.generation.send_modify(|g| *g += 1);

        debug!(
            controllers,
            faucets,
            zones,
            observers = observers.len(),
            "refresh complete"
        );
    }

    fn record_failure(&self, err: &CoreError) {
        let auth = err.is_auth();
        self.inner.status.send_modify(|status| {
            if auth && !status.reauth_required {
                error!(error = %err, "authentication rejected, re-authentication required");
            } else {
                warn!(
                    error = %err,
                    failures = status.consecutive_failures + 1,
                    "refresh failed"
                );
            }
            status.last_error = Some(err.to_string());
            status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            status.polls += 1;
            status.reauth_required = auth;
        });
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Add an Observer; ids must be unique.
    pub fn register(&self, observer: Arc<dyn Observer>) -> Result<(), CoreError> {
        match self.inner.observers.entry(observer.id().to_owned()) {
            Entry::Occupied(entry) => Err(CoreError::DuplicateEntity {
                unique_id: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(observer);
                Ok(())
            }
        }
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.inner.observers.remove(id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    // ── State observation ────────────────────────────────────────────

    /// Latest published snapshot, `None` before the first success.
    pub fn current(&self) -> Option<Arc<Topology>> {
        self.inner.current.load_full()
    }

    pub fn status(&self) -> watch::Receiver<RefreshStatus> {
        self.inner.status.subscribe()
    }

    pub fn status_snapshot(&self) -> RefreshStatus {
        self.inner.status.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.inner.status.borrow().last_update_success()
    }

    /// Counter bumped after every published snapshot.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }

    // ── Background task ──────────────────────────────────────────────

    /// Spawn the refresh task: polls every `poll_interval` and whenever
    /// [`request_refresh`](Self::request_refresh) is called, until
    /// `cancel` fires. A poll cancelled mid-fetch is dropped; the blocking
    /// fetch still finishes on its worker and the result is discarded.
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        if self.inner.poll_interval.is_zero() {
            warn!("poll interval is zero; refreshing on demand only");
        }
        tokio::spawn(refresh_task(self.clone(), cancel))
    }
}

/// Cadence ticker; `None` for a zero interval, which never ticks.
fn ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn refresh_task(coordinator: RefreshCoordinator, cancel: CancellationToken) {
    let mut interval = ticker(coordinator.inner.poll_interval);
    if let Some(ref mut interval) = interval {
        interval.tick().await; // consume the immediate first tick
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = coordinator.inner.refresh_requested.notified() => {
                debug!("on-demand refresh");
            }
            () = tick(&mut interval) => {}
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            // Failures are recorded in RefreshStatus; the next tick retries.
            _ = coordinator.poll() => {}
        }
        if let Some(ref mut interval) = interval {
            interval.reset();
        }
    }
    debug!("refresh task stopped");
}
