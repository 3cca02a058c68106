//! War Room Sync - live collection core for the War Room dashboard
//!
//! Every dashboard board follows the same loop:
//! - Subscribe to a live query on the document store
//! - Reduce each pushed snapshot into an ordered list of entities
//! - Filter, sort and group that list for display
//! - Write small field updates back and wait for the next snapshot
//!
//! # Architecture
//!
//! ```text
//! DocumentStore ──push──▶ SyncClient handle ──reduce──▶ LiveUpdate ──▶ listener
//!       ▲                                                               │
//!       └────────────── MutationGateway ◀──── WarRoom actions ◀────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warroom_sync::prelude::*;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! let client = SyncClient::new(store);
//!
//! let handle = client.open_named("blockers")?;
//! client.on_snapshot(handle, |update| {
//!     if let Some(view) = update.view() {
//!         let board = group_by_status::<BlockerStatus>(view.entities(), "status");
//!         println!("{} blockers", board.len());
//!     }
//! })?;
//!
//! WarRoom::new(client.gateway())
//!     .move_blocker(&DocumentId::new("b1"), BlockerStatus::Done)
//!     .await?;
//!
//! client.close(handle);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod config;
pub mod dashboard;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod handle;
pub mod memory;
pub mod reducer;
pub mod status;
pub mod store;
pub mod types;
pub mod value;
pub mod view;

// Re-exports for convenience
pub use config::{Preset, SyncConfig};
pub use dashboard::{ChatReceipt, ChatRole, WarRoom};
pub use entity::{Entity, OrderedCollectionView, RawDocument, RawSnapshot};
pub use error::{
    ConfigError, HandleError, InvalidMutation, MutationError, QueryError, StoreError,
    SubscriptionError, SyncError,
};
pub use gateway::{AppendWrite, MutationGateway};
pub use handle::{ConnectionStatus, HandleHealth, Listener, LiveUpdate, SyncClient};
pub use memory::InMemoryStore;
pub use reducer::reduce;
pub use status::{BlockerStatus, BoardStatus, Bucket, PipelineStage};
pub use store::{DocumentStore, SetMode, SnapshotSink, Subscription};
pub use types::{
    CollectionRef, Direction, DocumentId, HandleId, Operator, QueryOptions, WhereClause,
    DOCUMENT_ID_FIELD,
};
pub use value::{Fields, StoreFields, StoreValue, Value};
pub use view::{
    filter_text, group_by_status, sort_entities, SortKey, SortKeys, SortMode, StatusBoard,
    ViewSettings,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with live collections
    pub use crate::{
        group_by_status, BlockerStatus, BoardStatus, Bucket, CollectionRef, ConnectionStatus,
        Direction, DocumentId, DocumentStore, Entity, InMemoryStore, LiveUpdate, MutationGateway,
        OrderedCollectionView, PipelineStage, QueryOptions, SortMode, StoreFields, StoreValue,
        SyncClient, SyncConfig, Value, ViewSettings, WarRoom,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
