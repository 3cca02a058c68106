//! Document store boundary
//!
//! The realtime store is an external collaborator. This core consumes it
//! through [`DocumentStore`]: live query subscriptions that push full
//! snapshots, plus per-document atomic writes.

use crate::entity::RawSnapshot;
use crate::error::StoreError;
use crate::types::{CollectionRef, DocumentId, QueryOptions};
use crate::value::StoreFields;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback receiving every pushed snapshot or the terminal error
pub type SnapshotSink = Arc<dyn Fn(Result<RawSnapshot, StoreError>) + Send + Sync>;

/// Live subscription owned by a connection handle
pub trait Subscription: Send {
    /// Stop pushing to the sink. Idempotent.
    fn unsubscribe(&mut self);
}

/// Whole-document write mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetMode {
    /// Replace every field
    #[default]
    Overwrite,
    /// Merge given fields into the existing document
    Merge,
}

/// Realtime document store client
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Open a live query
    ///
    /// Must not block on the first snapshot, and must report transport or
    /// permission failures through `sink` rather than returning them.
    fn subscribe(
        &self,
        collection: &CollectionRef,
        query: &QueryOptions,
        sink: SnapshotSink,
    ) -> Box<dyn Subscription>;

    /// Apply a partial update to one document
    async fn update_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: StoreFields,
    ) -> Result<(), StoreError>;

    /// Append a document with a store-assigned key
    async fn add_document(
        &self,
        collection: &CollectionRef,
        fields: StoreFields,
    ) -> Result<DocumentId, StoreError>;

    /// Write a whole document under a known key
    async fn set_document(
        &self,
        collection: &CollectionRef,
        id: &DocumentId,
        fields: StoreFields,
        mode: SetMode,
    ) -> Result<(), StoreError>;
}
