//! Process-wide cache of live database clients keyed by connection id

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use parking_lot::Mutex;
use tokio::time::{Instant, timeout};
use tracing::Instrument;

use super::error::{ConnectError, ConnectResult};
use super::eviction::EvictionTask;
use super::factory::{ClientFactory, ManagedClient};
use super::policy::EvictionPolicy;
use crate::client::{ConnectionConfig, build_address};

/// Shared handle to a cached client.
///
/// Callers borrow it for one operation. The cache may close the underlying
/// client at any time after that operation started.
pub type ClientHandle<C> = Arc<C>;

type PendingBuild<C> = Shared<BoxFuture<'static, ConnectResult<ClientHandle<C>>>>;
type PendingClose = Shared<BoxFuture<'static, ()>>;

/// Resident and connecting slots remember the address they were built for
enum Slot<C> {
    Ready {
        client: ClientHandle<C>,
        address: String,
        last_accessed: Instant,
    },
    Connecting {
        pending: PendingBuild<C>,
        address: String,
    },
    Closing(PendingClose),
}

impl<C> Slot<C> {
    fn address(&self) -> Option<&str> {
        match self {
            Self::Ready { address, .. } | Self::Connecting { address, .. } => {
                Some(address.as_str())
            }
            Self::Closing(_) => None,
        }
    }
}

enum Wait<C> {
    Build(PendingBuild<C>),
    /// A build for an outdated address; wait for it, then look again
    Settle(PendingBuild<C>),
    Close(PendingClose),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Idle,
    Invalidated,
}

impl CloseReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Invalidated => "invalidated",
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

/// Point-in-time connection cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served by a resident client
    pub hits: u64,
    /// Lookups that started a new construction
    pub misses: u64,
    /// Lookups that joined a construction already in flight
    pub coalesced: u64,
    /// Constructions that ended in an error
    pub failures: u64,
    /// Clients closed by the idle sweep
    pub evictions: u64,
    /// Clients closed by explicit invalidation
    pub invalidations: u64,
    /// Clients currently resident and ready
    pub resident: u64,
}

struct Inner<F: ClientFactory> {
    factory: F,
    policy: EvictionPolicy,
    slots: Mutex<HashMap<String, Slot<F::Client>>>,
    counters: Counters,
    eviction: OnceLock<EvictionTask>,
}

impl<F: ClientFactory> Inner<F> {
    fn finish_build(
        &self,
        connection_id: &str,
        address: String,
        outcome: &ConnectResult<ClientHandle<F::Client>>,
        elapsed: Duration,
    ) {
        let mut slots = self.slots.lock();
        match outcome {
            Ok(client) => {
                slots.insert(
                    connection_id.to_owned(),
                    Slot::Ready {
                        client: Arc::clone(client),
                        address,
                        last_accessed: Instant::now(),
                    },
                );
            }
            Err(_) => {
                slots.remove(connection_id);
            }
        }
        let resident = count_ready(&slots);
        drop(slots);

        match outcome {
            Ok(_) => {
                tracing::info!(
                    connection.id = connection_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Client connected"
                );
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    connection.id = connection_id,
                    error.kind = e.kind(),
                    error = %e,
                    "Client construction failed"
                );
            }
        }

        #[cfg(feature = "metrics")]
        {
            let status = outcome.as_ref().map_or_else(|e| e.kind(), |_| "ok");
            crate::observability::record_client_build(elapsed, status);
            crate::observability::set_resident_clients(resident);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = resident;
    }

    fn finish_close(&self, connection_id: &str, reason: CloseReason) {
        let mut slots = self.slots.lock();
        if matches!(slots.get(connection_id), Some(Slot::Closing(_))) {
            slots.remove(connection_id);
        }
        let resident = count_ready(&slots);
        drop(slots);

        let counter = match reason {
            CloseReason::Idle => &self.counters.evictions,
            CloseReason::Invalidated => &self.counters.invalidations,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        {
            crate::observability::record_client_close(reason.as_str());
            crate::observability::set_resident_clients(resident);
        }
        #[cfg(not(feature = "metrics"))]
        let _ = resident;
    }
}

fn count_ready<C>(slots: &HashMap<String, Slot<C>>) -> u64 {
    slots
        .values()
        .filter(|slot| matches!(slot, Slot::Ready { .. }))
        .count() as u64
}

/// Lazily populated map from connection id to a live client.
///
/// * Concurrent misses for one id share a single construction attempt; all
///   waiters observe the same handle or the same error.
/// * Failed constructions leave nothing behind, so the next call retries.
/// * Construction and teardown for one id never overlap: a lookup that finds
///   the id closing waits for the close before building a replacement.
/// * A background task started on first use closes entries idle longer than
///   [`EvictionPolicy::idle_timeout`].
///
/// Cloning is cheap and yields a handle to the same cache.
pub struct ConnectionCache<F: ClientFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: ClientFactory> Clone for ConnectionCache<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ClientFactory> std::fmt::Debug for ConnectionCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("policy", &self.inner.policy)
            .field("entry_count", &self.inner.slots.lock().len())
            .field("eviction", &self.inner.eviction.get())
            .finish_non_exhaustive()
    }
}

impl<F: ClientFactory> ConnectionCache<F> {
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self::with_policy(factory, EvictionPolicy::default())
    }

    #[must_use]
    pub fn with_policy(factory: F, policy: EvictionPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                policy,
                slots: Mutex::new(HashMap::new()),
                counters: Counters::default(),
                eviction: OnceLock::new(),
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &EvictionPolicy {
        &self.inner.policy
    }

    #[must_use]
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Return the resident client for `connection_id`, building one from
    /// `config` on a miss.
    ///
    /// A resident client built for a different address than `config`
    /// resolves to is closed and replaced, so a caller holding an edited
    /// record never receives a client for the old target.
    pub async fn get_or_create(
        &self,
        connection_id: &str,
        config: &ConnectionConfig,
    ) -> ConnectResult<ClientHandle<F::Client>> {
        if connection_id.is_empty() {
            return Err(ConnectError::InvalidTarget(
                "connection id must not be empty".into(),
            ));
        }
        config.validate()?;
        let address = build_address(config)?;
        self.ensure_eviction();

        loop {
            let wait = {
                let mut slots = self.inner.slots.lock();
                match self.retire_stale(&mut slots, connection_id, &address) {
                    Some(wait) => wait,
                    None => match slots.get_mut(connection_id) {
                        Some(Slot::Ready {
                            client,
                            last_accessed,
                            ..
                        }) => {
                            *last_accessed = (*last_accessed).max(Instant::now());
                            let client = Arc::clone(client);
                            drop(slots);
                            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                cache.result = "hit",
                                connection.id = connection_id,
                                "Client cache lookup"
                            );
                            #[cfg(feature = "metrics")]
                            crate::observability::record_client_lookup("hit");
                            return Ok(client);
                        }
                        Some(Slot::Connecting { pending, .. }) => {
                            self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                cache.result = "pending",
                                connection.id = connection_id,
                                "Client cache lookup"
                            );
                            #[cfg(feature = "metrics")]
                            crate::observability::record_client_lookup("pending");
                            Wait::Build(pending.clone())
                        }
                        Some(Slot::Closing(pending)) => Wait::Close(pending.clone()),
                        None => {
                            let pending =
                                self.spawn_build(connection_id, config.clone(), address.clone());
                            slots.insert(
                                connection_id.to_owned(),
                                Slot::Connecting {
                                    pending: pending.clone(),
                                    address: address.clone(),
                                },
                            );
                            drop(slots);
                            self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                cache.result = "miss",
                                connection.id = connection_id,
                                "Client cache lookup"
                            );
                            #[cfg(feature = "metrics")]
                            crate::observability::record_client_lookup("miss");
                            Wait::Build(pending)
                        }
                    }
                }
            };

            match wait {
                Wait::Build(pending) => return pending.await,
                Wait::Settle(pending) => {
                    let _ = pending.await;
                }
                Wait::Close(pending) => pending.await,
            }
        }
    }

    /// Close and forget the client for `connection_id`, if any.
    ///
    /// A construction in flight is allowed to finish and is then closed.
    /// Operations already running on the old handle are not interrupted.
    pub async fn invalidate(&self, connection_id: &str) {
        loop {
            let wait = {
                let mut slots = self.inner.slots.lock();
                match slots.get(connection_id) {
                    None => return,
                    Some(Slot::Connecting { pending, .. }) => Wait::Build(pending.clone()),
                    Some(Slot::Closing(pending)) => Wait::Close(pending.clone()),
                    Some(Slot::Ready { .. }) => {
                        match self.begin_close(&mut slots, connection_id, CloseReason::Invalidated)
                        {
                            Some(pending) => Wait::Close(pending),
                            None => return,
                        }
                    }
                }
            };

            match wait {
                Wait::Build(pending) | Wait::Settle(pending) => {
                    let _ = pending.await;
                }
                Wait::Close(pending) => {
                    pending.await;
                    return;
                }
            }
        }
    }

    /// Invalidate every entry
    pub async fn invalidate_all(&self) {
        let ids: Vec<String> = self.inner.slots.lock().keys().cloned().collect();
        if !ids.is_empty() {
            tracing::info!(count = ids.len(), "Closing all cached clients");
        }
        join_all(ids.iter().map(|id| self.invalidate(id))).await;
    }

    /// Close every entry idle longer than the policy allows.
    ///
    /// Candidates are picked under the lock; the closes themselves run in
    /// their own tasks. Returns the number of clients closed.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let pending: Vec<PendingClose> = {
            let mut slots = self.inner.slots.lock();
            let expired: Vec<String> = slots
                .iter()
                .filter_map(|(id, slot)| match slot {
                    Slot::Ready { last_accessed, .. }
                        if self
                            .inner
                            .policy
                            .is_expired(now.saturating_duration_since(*last_accessed)) =>
                    {
                        Some(id.clone())
                    }
                    _ => None,
                })
                .collect();

            expired
                .iter()
                .filter_map(|id| self.begin_close(&mut slots, id, CloseReason::Idle))
                .collect()
        };

        let evicted = pending.len();
        join_all(pending).await;
        evicted
    }

    /// Stop the eviction task and close every client
    pub async fn shutdown(&self) {
        if let Some(task) = self.inner.eviction.get() {
            task.stop().await;
        }
        self.invalidate_all().await;
    }

    /// Number of clients resident and ready
    #[must_use]
    pub fn len(&self) -> usize {
        count_ready(&self.inner.slots.lock()) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a ready client is resident for `connection_id`
    #[must_use]
    pub fn contains(&self, connection_id: &str) -> bool {
        matches!(
            self.inner.slots.lock().get(connection_id),
            Some(Slot::Ready { .. })
        )
    }

    /// Last access time of a resident client
    #[must_use]
    pub fn last_accessed(&self, connection_id: &str) -> Option<Instant> {
        match self.inner.slots.lock().get(connection_id) {
            Some(Slot::Ready { last_accessed, .. }) => Some(*last_accessed),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_eviction_running(&self) -> bool {
        self.inner
            .eviction
            .get()
            .is_some_and(|task| !task.is_cancelled())
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let counters = &self.inner.counters;
        CacheStats {
            hits: counters.hits.load(Ordering::Relaxed),
            misses: counters.misses.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
            invalidations: counters.invalidations.load(Ordering::Relaxed),
            resident: self.len() as u64,
        }
    }

    fn ensure_eviction(&self) {
        self.inner.eviction.get_or_init(|| {
            let weak = Arc::downgrade(&self.inner);
            tracing::debug!(
                interval = ?self.inner.policy.sweep_interval,
                idle_timeout = ?self.inner.policy.idle_timeout,
                "Starting idle eviction task"
            );
            EvictionTask::spawn(self.inner.policy.sweep_interval, move || {
                let cache = Self {
                    inner: weak.upgrade()?,
                };
                Some(async move { cache.evict_idle().await }.boxed())
            })
        });
    }

    fn spawn_build(
        &self,
        connection_id: &str,
        config: ConnectionConfig,
        address: String,
    ) -> PendingBuild<F::Client> {
        let inner = Arc::clone(&self.inner);
        let id = connection_id.to_owned();
        let span = tracing::debug_span!("cache.connect", connection.id = %id);

        let task = tokio::spawn(
            async move {
                let started = Instant::now();
                let connect_timeout = inner.policy.connect_timeout;
                let attempt = timeout(inner.policy.build_deadline(), inner.factory.build(&config));

                let outcome = match AssertUnwindSafe(attempt).catch_unwind().await {
                    Ok(Ok(Ok(client))) => Ok(Arc::new(client)),
                    Ok(Ok(Err(e))) => Err(e),
                    Ok(Err(_elapsed)) => Err(ConnectError::ConnectTimeout(connect_timeout)),
                    Err(_panic) => Err(ConnectError::Internal("client factory panicked".into())),
                };

                inner.finish_build(&id, address, &outcome, started.elapsed());
                outcome
            }
            .instrument(span),
        );

        async move {
            task.await.unwrap_or_else(|e| {
                Err(ConnectError::Internal(format!(
                    "client construction task aborted: {e}"
                )))
            })
        }
        .boxed()
        .shared()
    }

    /// Retire a slot built for an address other than `address`.
    /// Returns `None` when the slot is absent or current.
    fn retire_stale(
        &self,
        slots: &mut HashMap<String, Slot<F::Client>>,
        connection_id: &str,
        address: &str,
    ) -> Option<Wait<F::Client>> {
        let resident = slots.get(connection_id)?.address()?;
        if resident == address {
            return None;
        }
        tracing::info!(
            connection.id = connection_id,
            "Connection target changed, replacing client"
        );
        match slots.get(connection_id)? {
            Slot::Connecting { pending, .. } => Some(Wait::Settle(pending.clone())),
            _ => self
                .begin_close(slots, connection_id, CloseReason::Invalidated)
                .map(Wait::Close),
        }
    }

    /// Swap a ready slot for a closing one and start the close.
    /// Returns `None` when the slot is absent or not ready.
    fn begin_close(
        &self,
        slots: &mut HashMap<String, Slot<F::Client>>,
        connection_id: &str,
        reason: CloseReason,
    ) -> Option<PendingClose> {
        let slot = slots.get_mut(connection_id)?;
        let Slot::Ready { client, .. } = slot else {
            return None;
        };
        let pending = self.spawn_close(connection_id, Arc::clone(client), reason);
        *slot = Slot::Closing(pending.clone());
        Some(pending)
    }

    fn spawn_close(
        &self,
        connection_id: &str,
        client: ClientHandle<F::Client>,
        reason: CloseReason,
    ) -> PendingClose {
        let inner = Arc::clone(&self.inner);
        let id = connection_id.to_owned();
        let span = tracing::debug_span!(
            "cache.close",
            connection.id = %id,
            reason = reason.as_str(),
        );

        let task = tokio::spawn(
            async move {
                let close_timeout = inner.policy.close_timeout;
                match AssertUnwindSafe(timeout(close_timeout, client.close()))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(Ok(()))) => {
                        tracing::info!(
                            connection.id = %id,
                            reason = reason.as_str(),
                            "Client closed"
                        );
                    }
                    Ok(Ok(Err(e))) => {
                        tracing::warn!(connection.id = %id, error = %e, "Failed to close client");
                    }
                    Ok(Err(_elapsed)) => {
                        tracing::warn!(
                            connection.id = %id,
                            timeout = ?close_timeout,
                            "Client close timed out"
                        );
                    }
                    Err(_panic) => {
                        tracing::warn!(connection.id = %id, "Client close panicked");
                    }
                }
                inner.finish_close(&id, reason);
            }
            .instrument(span),
        );

        async move {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Client close task aborted");
            }
        }
        .boxed()
        .shared()
    }
}
