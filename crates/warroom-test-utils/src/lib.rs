//! Testing utilities for the War Room workspace
//!
//! Shared fixtures, seeded stores and listener recorders.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use warroom_sync::{
    CollectionRef, HandleError, HandleId, InMemoryStore, LiveUpdate, StoreFields, StoreValue,
    SyncClient,
};

/// How long recorders wait for a pushed update
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Build store fields from a JSON object literal
pub fn store_fields(json: serde_json::Value) -> StoreFields {
    StoreValue::fields_from_json(json).unwrap()
}

/// Blockers used by the board scenarios
pub fn blocker_fixtures() -> Vec<(&'static str, StoreFields)> {
    vec![
        (
            "b1",
            store_fields(serde_json::json!({
                "title": "Invoice stuck in legal",
                "client": "Acme",
                "status": "Critical",
                "impact": 10,
                "overdueDays": 3,
            })),
        ),
        (
            "b2",
            store_fields(serde_json::json!({
                "title": "Missing design sign-off",
                "client": "Globex",
                "status": "Overdue",
                "impact": 50,
                "overdueDays": 9,
            })),
        ),
        (
            "b3",
            store_fields(serde_json::json!({
                "title": "Hosting renewal",
                "client": "Acme",
                "status": "This Week",
                "impact": 30,
                "overdueDays": 0,
            })),
        ),
    ]
}

/// Store seeded with [`blocker_fixtures`]
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for (id, fields) in blocker_fixtures() {
        store.insert(CollectionRef::new("blockers"), id, fields);
    }
    store
}

/// Listener that forwards every update into a channel
pub struct Recorder {
    rx: mpsc::UnboundedReceiver<LiveUpdate>,
}

impl Recorder {
    /// Register a recording listener on `handle`
    pub fn attach(client: &SyncClient, handle: HandleId) -> Result<Self, HandleError> {
        let (tx, rx) = mpsc::unbounded_channel();
        client.on_snapshot(handle, move |update| {
            let _ = tx.send(update);
        })?;
        Ok(Self { rx })
    }

    /// Next update, panicking after [`UPDATE_TIMEOUT`]
    pub async fn next(&mut self) -> LiveUpdate {
        tokio::time::timeout(UPDATE_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for update")
            .expect("listener dropped")
    }

    /// Wait until an update satisfies `pred`
    pub async fn next_matching(&mut self, pred: impl Fn(&LiveUpdate) -> bool) -> LiveUpdate {
        loop {
            let update = self.next().await;
            if pred(&update) {
                return update;
            }
        }
    }

    /// Assert nothing arrives within `window`
    pub async fn assert_silent(&mut self, window: Duration) {
        if let Ok(Some(update)) = tokio::time::timeout(window, self.rx.recv()).await {
            panic!("unexpected update: {update:?}");
        }
    }

    /// Drain everything already queued
    pub fn drain(&mut self) -> Vec<LiveUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            updates.push(update);
        }
        updates
    }
}

/// Ids of a view in order
pub fn view_ids(update: &LiveUpdate) -> Vec<String> {
    update
        .view()
        .map(|view| view.ids().map(|id| id.as_str().to_string()).collect())
        .unwrap_or_default()
}
