//! Connection handles for live collections
//!
//! [`SyncClient`] owns a set of independent live handles. Each handle:
//! - Holds exactly one store subscription
//! - Reduces every pushed snapshot and caches the latest view
//! - Delivers updates to at most one listener
//! - Releases its subscription deterministically on `close`
//!
//! Every delivery runs under a per-handle reentrant gate and re-checks the
//! closed flag and the subscription generation, so nothing reaches the
//! listener once `close` has returned, and nothing from a superseded
//! subscription reaches it after `reconnect` or a failure.

use crate::config::SyncConfig;
use crate::entity::{OrderedCollectionView, RawSnapshot};
use crate::error::{HandleError, QueryError, StoreError, SubscriptionError};
use crate::gateway::MutationGateway;
use crate::reducer::reduce;
use crate::store::{DocumentStore, SnapshotSink, Subscription};
use crate::types::{CollectionRef, DocumentId, HandleId, QueryOptions};
use dashmap::DashMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Listener invoked with every update of one handle
pub type Listener = Arc<dyn Fn(LiveUpdate) + Send + Sync>;

/// Connection state reported alongside every update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// Subscribed, waiting for the first snapshot
    Connecting,
    /// Snapshots are flowing
    Connected,
    /// Handle closed
    Disconnected,
    /// Subscription failed; no updates until reconnect
    Error,
}

/// Payload delivered to a handle's listener
#[derive(Debug, Clone)]
pub struct LiveUpdate {
    /// Originating handle
    pub handle: HandleId,
    /// Connection state after this update
    pub status: ConnectionStatus,
    /// Full current view, or the subscription failure
    pub result: Result<Arc<OrderedCollectionView>, SubscriptionError>,
}

impl LiveUpdate {
    /// View, if this update carries one
    #[inline]
    #[must_use]
    pub fn view(&self) -> Option<&OrderedCollectionView> {
        self.result.as_deref().ok()
    }

    /// Failure, if this update carries one
    #[inline]
    #[must_use]
    pub fn error(&self) -> Option<&SubscriptionError> {
        self.result.as_ref().err()
    }
}

/// Watchdog report for one handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleHealth {
    /// Current connection state
    pub status: ConnectionStatus,
    /// Snapshots delivered since open
    pub snapshots: u64,
    /// Time since the last snapshot
    pub last_snapshot_age: Option<Duration>,
    /// No snapshot within the configured threshold
    pub stale: bool,
}

/// State of one live handle
struct HandleEntry {
    id: HandleId,
    collection: CollectionRef,
    query: QueryOptions,
    closed: AtomicBool,
    generation: AtomicU64,
    gate: ReentrantMutex<()>,
    listener: Mutex<Option<Listener>>,
    subscription: Mutex<Option<Box<dyn Subscription>>>,
    latest: RwLock<Option<Arc<OrderedCollectionView>>>,
    last_error: Mutex<Option<SubscriptionError>>,
    status: RwLock<ConnectionStatus>,
    attached_at: Mutex<Instant>,
    last_snapshot_at: Mutex<Option<Instant>>,
    snapshots: AtomicU64,
}

impl HandleEntry {
    fn new(collection: CollectionRef, query: QueryOptions) -> Self {
        Self {
            id: HandleId::new(),
            collection,
            query,
            closed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            gate: ReentrantMutex::new(()),
            listener: Mutex::new(None),
            subscription: Mutex::new(None),
            latest: RwLock::new(None),
            last_error: Mutex::new(None),
            status: RwLock::new(ConnectionStatus::Connecting),
            attached_at: Mutex::new(Instant::now()),
            last_snapshot_at: Mutex::new(None),
            snapshots: AtomicU64::new(0),
        }
    }

    /// Start a new store subscription, returning the one it supersedes
    fn attach(self: &Arc<Self>, store: &dyn DocumentStore) -> Option<Box<dyn Subscription>> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *self.status.write() = ConnectionStatus::Connecting;
        *self.attached_at.lock() = Instant::now();

        let weak = Arc::downgrade(self);
        let sink: SnapshotSink = Arc::new(move |push| {
            if let Some(entry) = weak.upgrade() {
                entry.deliver(generation, push);
            }
        });

        let subscription = store.subscribe(&self.collection, &self.query, sink);
        self.subscription.lock().replace(subscription)
    }

    fn deliver(&self, generation: u64, push: Result<RawSnapshot, StoreError>) {
        let _gate = self.gate.lock();

        if self.closed.load(Ordering::Acquire) || self.generation.load(Ordering::Acquire) != generation {
            tracing::trace!("Discarding stale push for handle {}", self.id);
            return;
        }

        let update = match push {
            Ok(raw) => {
                let view = Arc::new(reduce(&raw));
                *self.latest.write() = Some(Arc::clone(&view));
                self.last_error.lock().take();
                *self.status.write() = ConnectionStatus::Connected;
                *self.last_snapshot_at.lock() = Some(Instant::now());
                self.snapshots.fetch_add(1, Ordering::AcqRel);

                tracing::debug!(
                    "Snapshot for handle {} on {}: {} entities",
                    self.id,
                    self.collection,
                    view.len()
                );

                LiveUpdate {
                    handle: self.id,
                    status: ConnectionStatus::Connected,
                    result: Ok(view),
                }
            }
            Err(cause) => {
                // Anything the failed subscription still has queued is dropped.
                self.generation.fetch_add(1, Ordering::AcqRel);
                *self.status.write() = ConnectionStatus::Error;

                tracing::warn!(
                    "Subscription for handle {} on {} failed: {}",
                    self.id,
                    self.collection,
                    cause
                );

                let error = SubscriptionError {
                    collection: self.collection.clone(),
                    cause,
                };
                *self.last_error.lock() = Some(error.clone());

                LiveUpdate {
                    handle: self.id,
                    status: ConnectionStatus::Error,
                    result: Err(error),
                }
            }
        };

        self.notify(update);
    }

    /// Invoke the listener outside the listener slot lock
    fn notify(&self, update: LiveUpdate) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(update);
        }
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        let subscription = {
            // Waits out a delivery in flight on another thread.
            let _gate = self.gate.lock();
            *self.status.write() = ConnectionStatus::Disconnected;
            self.listener.lock().take();
            self.subscription.lock().take()
        };

        if let Some(mut subscription) = subscription {
            subscription.unsubscribe();
        }
    }

    fn health(&self, stale_after: Option<Duration>) -> HandleHealth {
        let now = Instant::now();
        let last = *self.last_snapshot_at.lock();
        let reference = last.unwrap_or(*self.attached_at.lock());
        let status = *self.status.read();

        HandleHealth {
            status,
            snapshots: self.snapshots.load(Ordering::Acquire),
            last_snapshot_age: last.map(|t| now.saturating_duration_since(t)),
            stale: status != ConnectionStatus::Disconnected
                && stale_after.is_some_and(|limit| now.saturating_duration_since(reference) > limit),
        }
    }
}

/// Owner of live collection handles
///
/// Handles are fully independent; dropping the client closes them all.
pub struct SyncClient {
    store: Arc<dyn DocumentStore>,
    config: SyncConfig,
    handles: DashMap<HandleId, Arc<HandleEntry>>,
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("config", &self.config)
            .field("open_handles", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl SyncClient {
    /// Create client with default configuration
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, SyncConfig::default())
    }

    /// Create client with custom configuration
    #[must_use]
    pub fn with_config(store: Arc<dyn DocumentStore>, config: SyncConfig) -> Self {
        Self {
            store,
            config,
            handles: DashMap::new(),
        }
    }

    /// Client configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Mutation gateway over the same store
    #[inline]
    #[must_use]
    pub fn gateway(&self) -> MutationGateway {
        MutationGateway::new(Arc::clone(&self.store))
    }

    /// Open a live query
    ///
    /// Returns immediately; the first snapshot arrives through the
    /// listener. Store failures are delivered there too, never returned.
    ///
    /// # Errors
    /// - `QueryError::EmptyCollection` if the collection name is empty
    /// - any error of [`QueryOptions::validate`]
    pub fn open(
        &self,
        collection: impl Into<CollectionRef>,
        query: QueryOptions,
    ) -> Result<HandleId, QueryError> {
        let collection = collection.into();
        if collection.is_empty() {
            return Err(QueryError::EmptyCollection);
        }
        query.validate()?;

        let entry = Arc::new(HandleEntry::new(collection, query));
        let id = entry.id;
        let _ = entry.attach(self.store.as_ref());
        self.handles.insert(id, Arc::clone(&entry));

        tracing::info!("Opened handle {} on {}", id, entry.collection);
        Ok(id)
    }

    /// Open a preset query from configuration
    ///
    /// # Errors
    /// - `QueryError::UnknownPreset` if no preset has that name
    /// - any error of [`SyncClient::open`]
    pub fn open_named(&self, name: &str) -> Result<HandleId, QueryError> {
        let preset = self
            .config
            .preset(name)
            .cloned()
            .ok_or_else(|| QueryError::UnknownPreset(name.to_string()))?;
        self.open(preset.collection, preset.query)
    }

    /// Open a live view of a single document
    ///
    /// The view holds the document, or nothing while it does not exist.
    ///
    /// # Errors
    /// Any error of [`SyncClient::open`]
    pub fn open_document(
        &self,
        collection: impl Into<CollectionRef>,
        id: &DocumentId,
    ) -> Result<HandleId, QueryError> {
        self.open(collection, QueryOptions::for_document(id))
    }

    /// Register the handle's listener, replacing any previous one
    ///
    /// With `replay_latest_on_register` set, the new listener immediately
    /// receives the failure of a failed handle, or else the cached view.
    ///
    /// # Errors
    /// `HandleError::UnknownHandle` if the handle is unknown or closed
    pub fn on_snapshot<F>(&self, handle: HandleId, listener: F) -> Result<(), HandleError>
    where
        F: Fn(LiveUpdate) + Send + Sync + 'static,
    {
        let entry = self.entry(handle)?;
        let _gate = entry.gate.lock();
        if entry.closed.load(Ordering::Acquire) {
            return Err(HandleError::UnknownHandle(handle));
        }

        *entry.listener.lock() = Some(Arc::new(listener));

        if self.config.replay_latest_on_register {
            let status = *entry.status.read();
            let replay = if status == ConnectionStatus::Error {
                entry.last_error.lock().clone().map(Err)
            } else {
                entry.latest.read().clone().map(Ok)
            };
            if let Some(result) = replay {
                entry.notify(LiveUpdate {
                    handle,
                    status,
                    result,
                });
            }
        }
        Ok(())
    }

    /// Release a handle
    ///
    /// No listener invocation happens after this returns. Closing an
    /// unknown or already closed handle is a no-op.
    pub fn close(&self, handle: HandleId) {
        if let Some((_, entry)) = self.handles.remove(&handle) {
            entry.shutdown();
            tracing::info!("Closed handle {} on {}", handle, entry.collection);
        }
    }

    /// Release every handle
    pub fn close_all(&self) {
        let ids: Vec<HandleId> = self.handles.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.close(id);
        }
    }

    /// Drop the current subscription and subscribe again with the same query
    ///
    /// # Errors
    /// `HandleError::UnknownHandle` if the handle is unknown or closed
    pub fn reconnect(&self, handle: HandleId) -> Result<(), HandleError> {
        let entry = self.entry(handle)?;

        let previous = {
            let _gate = entry.gate.lock();
            if entry.closed.load(Ordering::Acquire) {
                return Err(HandleError::UnknownHandle(handle));
            }
            entry.attach(self.store.as_ref())
        };

        if let Some(mut previous) = previous {
            previous.unsubscribe();
        }

        tracing::info!("Reconnected handle {} on {}", handle, entry.collection);
        Ok(())
    }

    /// Connection state of an open handle
    #[must_use]
    pub fn status(&self, handle: HandleId) -> Option<ConnectionStatus> {
        self.handles.get(&handle).map(|e| *e.status.read())
    }

    /// Latest cached view of an open handle
    #[must_use]
    pub fn latest(&self, handle: HandleId) -> Option<Arc<OrderedCollectionView>> {
        self.handles.get(&handle).and_then(|e| e.latest.read().clone())
    }

    /// Watchdog report of an open handle
    #[must_use]
    pub fn health(&self, handle: HandleId) -> Option<HandleHealth> {
        let stale_after = self.config.stale_after();
        self.handles.get(&handle).map(|e| e.health(stale_after))
    }

    /// Number of open handles
    #[inline]
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.handles.len()
    }

    fn entry(&self, handle: HandleId) -> Result<Arc<HandleEntry>, HandleError> {
        self.handles
            .get(&handle)
            .map(|e| Arc::clone(e.value()))
            .ok_or(HandleError::UnknownHandle(handle))
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.close_all();
    }
}
