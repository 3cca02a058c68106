//! In-memory document store
//!
//! Reference [`DocumentStore`] used by tests and the CLI. It honors query
//! order, filters and limits, stamps server timestamps at write time, and
//! pushes a fresh snapshot to every matching subscriber after each write.
//!
//! Each subscription gets its own dispatch task, so snapshots reach a sink
//! in write order and never synchronously from inside `subscribe`.
//!
//! Ordering follows the usual realtime-store rules: with an order field,
//! documents lacking that field are excluded; without one, documents are
//! delivered in insertion order.

use crate::entity::{Entity, RawDocument, RawSnapshot};
use crate::error::StoreError;
use crate::store::{DocumentStore, SetMode, SnapshotSink, Subscription};
use crate::types::{CollectionRef, Direction, DocumentId, Operator, QueryOptions, WhereClause, DOCUMENT_ID_FIELD};
use crate::value::{Fields, StoreFields, StoreValue, Value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use ulid::Ulid;

type Collections = HashMap<CollectionRef, IndexMap<DocumentId, Fields>>;
type Push = Result<RawSnapshot, StoreError>;

/// Live subscriber registration
#[derive(Debug)]
struct Subscriber {
    collection: CollectionRef,
    query: QueryOptions,
    tx: mpsc::UnboundedSender<Push>,
}

#[derive(Debug, Default)]
struct StoreInner {
    collections: RwLock<Collections>,
    subscribers: DashMap<u64, Subscriber>,
    next_subscriber: AtomicU64,
    write_failures: DashMap<CollectionRef, StoreError>,
    read_failures: DashMap<CollectionRef, StoreError>,
    writes: AtomicU64,
}

/// Shared in-memory store; clones address the same data
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<StoreInner>,
}

impl InMemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace a document without going through failure injection
    pub fn insert(&self, collection: impl Into<CollectionRef>, id: impl Into<DocumentId>, fields: StoreFields) {
        let collection = collection.into();
        let mut guard = self.inner.collections.write();
        guard
            .entry(collection.clone())
            .or_default()
            .insert(id.into(), stamp_fields(fields, Utc::now()));
        self.inner.broadcast(RwLockWriteGuard::downgrade(guard), &collection);
    }

    /// Current documents of a collection in insertion order
    #[must_use]
    pub fn documents(&self, collection: &CollectionRef) -> Vec<Entity> {
        self.inner
            .collections
            .read()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Entity::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Look up one document
    #[must_use]
    pub fn document(&self, collection: &CollectionRef, id: &DocumentId) -> Option<Entity> {
        self.inner
            .collections
            .read()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Entity::new(id.clone(), fields.clone()))
    }

    /// Make every write to `collection` fail with `error`
    pub fn fail_writes(&self, collection: impl Into<CollectionRef>, error: StoreError) {
        self.inner.write_failures.insert(collection.into(), error);
    }

    /// Make new subscriptions to `collection` fail with `error`
    pub fn fail_reads(&self, collection: impl Into<CollectionRef>, error: StoreError) {
        self.inner.read_failures.insert(collection.into(), error);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.inner.write_failures.clear();
        self.inner.read_failures.clear();
    }

    /// Terminate live subscriptions to `collection` with `error`
    pub fn drop_subscriptions(&self, collection: &CollectionRef, error: &StoreError) {
        self.inner.subscribers.retain(|_, sub| {
            if &sub.collection != collection {
                return true;
            }
            let _ = sub.tx.send(Err(error.clone()));
            false
        });
    }

    /// Number of live subscriptions
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Number of writes accepted so far
    #[inline]
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.inner.writes.load(Ordering::Acquire)
    }

    fn check_write(&self, collection: &CollectionRef) -> Result<(), StoreError> {
        match self.inner.write_failures.get(collection) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl StoreInner {
    /// Push a fresh snapshot to every subscriber of `collection`
    ///
    /// Runs under the collections lock so snapshots leave in write order.
    fn broadcast(&self, collections: RwLockReadGuard<'_, Collections>, collection: &CollectionRef) {
        for sub in self.subscribers.iter().filter(|s| &s.collection == collection) {
            let snapshot = run_query(collections.get(collection), &sub.query);
            let _ = sub.tx.send(Ok(snapshot));
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    fn subscribe(
        &self,
        collection: &CollectionRef,
        query: &QueryOptions,
        sink: SnapshotSink,
    ) -> Box<dyn Subscription> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Push>();

        tokio::spawn(async move {
            while let Some(push) = rx.recv().await {
                sink(push);
            }
        });

        let id = self.inner.next_subscriber.fetch_add(1, Ordering::AcqRel);

        if let Some(error) = self.inner.read_failures.get(collection) {
            let _ = tx.send(Err(error.clone()));
            return Box::new(MemorySubscription::inactive(id));
        }

        let guard = self.inner.collections.read();
        let _ = tx.send(Ok(run_query(guard.get(collection), query)));
        self.inner.subscribers.insert(
            id,
            Subscriber {
                collection: collection.clone(),
                query: query.clone(),
                tx,
            },
        );
        drop(guard);

        tracing::trace!("Subscriber {} attached to {}", id, collection);

        Box::new(MemorySubscription {
            id,
            store: Arc::downgrade(&self.inner),
        })
    }

    async fn update_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: StoreFields,
    ) -> Result<(), StoreError> {
        self.check_write(collection)?;

        let mut guard = self.inner.collections.write();
        let doc = guard
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.clone(),
                id: id.clone(),
            })?;
        doc.extend(stamp_fields(fields, Utc::now()));

        self.inner.writes.fetch_add(1, Ordering::AcqRel);
        self.inner.broadcast(RwLockWriteGuard::downgrade(guard), collection);
        Ok(())
    }

    async fn add_document(
        &self,
        collection: &CollectionRef,
        fields: StoreFields,
    ) -> Result<DocumentId, StoreError> {
        self.check_write(collection)?;

        let id = DocumentId::new(Ulid::new().to_string());
        let mut guard = self.inner.collections.write();
        guard
            .entry(collection.clone())
            .or_default()
            .insert(id.clone(), stamp_fields(fields, Utc::now()));

        self.inner.writes.fetch_add(1, Ordering::AcqRel);
        self.inner.broadcast(RwLockWriteGuard::downgrade(guard), collection);
        Ok(id)
    }

    async fn set_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: StoreFields,
        mode: SetMode,
    ) -> Result<(), StoreError> {
        self.check_write(collection)?;

        let stamped = stamp_fields(fields, Utc::now());
        let mut guard = self.inner.collections.write();
        let docs = guard.entry(collection.clone()).or_default();
        match docs.get_mut(id) {
            Some(existing) if mode == SetMode::Merge => existing.extend(stamped),
            _ => {
                docs.insert(id.clone(), stamped);
            }
        }

        self.inner.writes.fetch_add(1, Ordering::AcqRel);
        self.inner.broadcast(RwLockWriteGuard::downgrade(guard), collection);
        Ok(())
    }
}

/// Subscription token for [`InMemoryStore`]
#[derive(Debug)]
struct MemorySubscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl MemorySubscription {
    fn inactive(id: u64) -> Self {
        Self {
            id,
            store: Weak::new(),
        }
    }
}

impl Subscription for MemorySubscription {
    fn unsubscribe(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.subscribers.remove(&self.id);
        }
        self.store = Weak::new();
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Evaluate a query against one collection
fn run_query(docs: Option<&IndexMap<DocumentId, Fields>>, query: &QueryOptions) -> RawSnapshot {
    let Some(docs) = docs else {
        return RawSnapshot::default();
    };

    let mut matched: Vec<(&DocumentId, &Fields)> = docs
        .iter()
        .filter(|(id, fields)| query.where_clauses.iter().all(|c| matches_clause(id, fields, c)))
        .collect();

    if let Some(order) = query.order_by_field.as_deref() {
        matched.retain(|(id, fields)| field_value(id, fields, order).is_some());
        matched.sort_by(|(a_id, a), (b_id, b)| {
            let ord = match (field_value(a_id, a, order), field_value(b_id, b, order)) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => std::cmp::Ordering::Equal,
            };
            match query.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });
    }

    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }

    RawSnapshot::new(
        matched
            .into_iter()
            .map(|(id, fields)| {
                let data = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), StoreValue::from(v.clone())))
                    .collect();
                RawDocument::new(id.clone(), data)
            })
            .collect(),
    )
}

fn field_value(id: &DocumentId, fields: &Fields, name: &str) -> Option<Value> {
    if name == DOCUMENT_ID_FIELD {
        return Some(Value::from(id.as_str()));
    }
    fields.get(name).cloned()
}

fn matches_clause(id: &DocumentId, fields: &Fields, clause: &WhereClause) -> bool {
    let Some(actual) = field_value(id, fields, &clause.field) else {
        return false;
    };
    let expected = &clause.value;
    match clause.op {
        Operator::Eq => actual.loosely_eq(expected),
        Operator::NotEq => !actual.loosely_eq(expected),
        Operator::Lt => same_kind(&actual, expected) && actual.total_cmp(expected).is_lt(),
        Operator::Le => same_kind(&actual, expected) && actual.total_cmp(expected).is_le(),
        Operator::Gt => same_kind(&actual, expected) && actual.total_cmp(expected).is_gt(),
        Operator::Ge => same_kind(&actual, expected) && actual.total_cmp(expected).is_ge(),
        Operator::ArrayContains => match &actual {
            Value::Array(items) => items.iter().any(|v| v.loosely_eq(expected)),
            _ => false,
        },
        Operator::In => match expected {
            Value::Array(options) => options.iter().any(|v| v.loosely_eq(&actual)),
            _ => false,
        },
    }
}

/// Range filters only match values of the operand's kind
fn same_kind(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
        || (a.as_f64().is_some() && b.as_f64().is_some())
}

fn stamp_fields(fields: StoreFields, now: DateTime<Utc>) -> Fields {
    fields.into_iter().map(|(k, v)| (k, stamp(v, now))).collect()
}

/// Resolve write sentinels against the commit time
fn stamp(value: StoreValue, now: DateTime<Utc>) -> Value {
    match value {
        StoreValue::Null => Value::Null,
        StoreValue::Bool(b) => Value::Bool(b),
        StoreValue::Integer(i) => Value::Integer(i),
        StoreValue::Double(d) => Value::Double(d),
        StoreValue::String(s) => Value::String(s),
        StoreValue::Timestamp(t) => Value::Timestamp(t),
        StoreValue::ServerTimestamp(t) => Value::Timestamp(t.unwrap_or(now)),
        StoreValue::Array(items) => Value::Array(items.into_iter().map(|v| stamp(v, now)).collect()),
        StoreValue::Map(map) => Value::Map(stamp_fields(map, now)),
    }
}
