//! Live Collection Tests
//!
//! Connection handles driven end-to-end against the in-memory store.

use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use warroom_sync::prelude::*;
use warroom_sync::{Operator, StoreError, WhereClause};
use warroom_test_utils::{seeded_store, store_fields, view_ids, Recorder};

#[tokio::test]
async fn test_close_before_first_snapshot_never_calls_listener() {
    let store = seeded_store();
    let client = SyncClient::new(store.clone());

    let calls = Arc::new(AtomicUsize::new(0));
    let handle = client.open("blockers", QueryOptions::new()).unwrap();
    let counter = Arc::clone(&calls);
    client
        .on_snapshot(handle, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    client.close(handle);

    // Give the dispatch task a chance to run.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.subscriber_count(), 0);
    assert_eq!(client.status(handle), None);
}

#[tokio::test]
async fn test_server_order_by_impact_desc() {
    let store = seeded_store();
    let client = SyncClient::new(store);

    let handle = client
        .open("blockers", QueryOptions::new().order_by("impact", Direction::Desc))
        .unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();

    let update = recorder.next().await;
    assert_eq!(update.status, ConnectionStatus::Connected);
    assert_eq!(view_ids(&update), vec!["b2", "b3", "b1"]);
}

#[tokio::test]
async fn test_limit_and_filter_reach_the_store() {
    let store = seeded_store();
    let client = SyncClient::new(store);

    let query = QueryOptions::new()
        .order_by("impact", Direction::Asc)
        .filter(WhereClause::new("impact", Operator::Gt, 5))
        .with_limit(2);
    let handle = client.open("blockers", query).unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();

    assert_eq!(view_ids(&recorder.next().await), vec!["b1", "b3"]);
}

#[tokio::test]
async fn test_every_write_pushes_a_full_view() {
    let store = seeded_store();
    let client = SyncClient::new(store.clone());

    let handle = client
        .open("blockers", QueryOptions::new().order_by("impact", Direction::Desc))
        .unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();
    recorder.next().await;

    let id = client
        .gateway()
        .add(
            &CollectionRef::new("blockers"),
            store_fields(serde_json::json!({ "title": "New", "impact": 40, "status": "Critical" })),
        )
        .await
        .unwrap();

    let update = recorder.next().await;
    let ids = view_ids(&update);
    assert_eq!(ids.len(), 4);
    assert_eq!(ids[1], id.as_str());
    assert_eq!(client.latest(handle).unwrap().len(), 4);
}

#[tokio::test]
async fn test_grouping_end_to_end() {
    let store = seeded_store();
    store.insert(
        CollectionRef::new("blockers"),
        "b4",
        store_fields(serde_json::json!({ "title": "Legacy", "status": "Unknown", "impact": 1 })),
    );
    let client = SyncClient::new(store);

    let handle = client.open_named("blockers").unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();
    let update = recorder.next().await;

    let board = group_by_status::<BlockerStatus>(update.view().unwrap().entities(), "status");
    assert_eq!(board.len(), 4);
    assert_eq!(board.bucket(Bucket::Status(BlockerStatus::Critical)).len(), 1);
    assert_eq!(board.bucket(Bucket::Status(BlockerStatus::Overdue)).len(), 1);
    assert_eq!(board.bucket(Bucket::Status(BlockerStatus::ThisWeek)).len(), 1);
    assert!(board.bucket(Bucket::Status(BlockerStatus::Done)).is_empty());
    assert_eq!(board.unsorted()[0].id.as_str(), "b4");
}

#[tokio::test]
async fn test_stream_error_then_reconnect() {
    let store = seeded_store();
    let client = SyncClient::new(store.clone());
    let blockers = CollectionRef::new("blockers");

    let handle = client.open("blockers", QueryOptions::new()).unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();
    recorder.next().await;

    store.drop_subscriptions(&blockers, &StoreError::Unavailable("network lost".to_string()));

    let failure = recorder.next().await;
    assert_eq!(failure.status, ConnectionStatus::Error);
    let error = failure.error().unwrap();
    assert_eq!(error.collection, blockers);
    assert!(error.cause.is_retryable());
    assert_eq!(client.status(handle), Some(ConnectionStatus::Error));

    // Writes after the failure are not seen until reconnect.
    store.insert(blockers.clone(), "b9", store_fields(serde_json::json!({ "impact": 1 })));
    recorder.assert_silent(Duration::from_millis(50)).await;

    client.reconnect(handle).unwrap();
    let update = recorder.next().await;
    assert_eq!(update.status, ConnectionStatus::Connected);
    assert_eq!(update.view().unwrap().len(), 4);
    assert_eq!(store.subscriber_count(), 1);
}

#[tokio::test]
async fn test_permission_denied_on_subscribe_is_delivered() {
    let store = seeded_store();
    store.fail_reads("settings", StoreError::PermissionDenied("rules".to_string()));
    let client = SyncClient::new(store.clone());

    let handle = client.open("settings", QueryOptions::new()).unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();

    let update = recorder.next().await;
    assert_eq!(update.status, ConnectionStatus::Error);
    assert!(!update.error().unwrap().cause.is_retryable());

    store.clear_failures();
    client.reconnect(handle).unwrap();
    let update = recorder.next().await;
    assert!(update.view().unwrap().is_empty());
}

#[tokio::test]
async fn test_handles_on_same_collection_are_independent() {
    let store = seeded_store();
    let client = SyncClient::new(store.clone());

    let first = client.open("blockers", QueryOptions::new()).unwrap();
    let second = client
        .open("blockers", QueryOptions::new().order_by("impact", Direction::Asc))
        .unwrap();
    let mut a = Recorder::attach(&client, first).unwrap();
    let mut b = Recorder::attach(&client, second).unwrap();

    assert_eq!(view_ids(&a.next().await), vec!["b1", "b2", "b3"]);
    assert_eq!(view_ids(&b.next().await), vec!["b1", "b3", "b2"]);

    client.close(first);
    store.insert(CollectionRef::new("blockers"), "b4", store_fields(serde_json::json!({ "impact": 99 })));

    assert_eq!(view_ids(&b.next().await), vec!["b1", "b3", "b2", "b4"]);
    a.assert_silent(Duration::from_millis(50)).await;
    assert_eq!(client.open_count(), 1);
}

#[tokio::test]
async fn test_late_listener_gets_cached_view() {
    let store = seeded_store();
    let client = SyncClient::new(store);

    let handle = client.open_named("blockers").unwrap();
    let mut first = Recorder::attach(&client, handle).unwrap();
    first.next().await;

    let mut late = Recorder::attach(&client, handle).unwrap();
    assert_eq!(view_ids(&late.next().await), vec!["b2", "b3", "b1"]);
}

#[tokio::test]
async fn test_unknown_preset_rejected() {
    let client = SyncClient::new(seeded_store());
    let err = client.open_named("nope").unwrap_err();
    assert_eq!(err, warroom_sync::QueryError::UnknownPreset("nope".to_string()));
    assert_eq!(client.open_count(), 0);
}

#[tokio::test]
async fn test_dropping_client_releases_store_subscriptions() {
    let store = seeded_store();
    {
        let client = SyncClient::new(store.clone());
        client.open("blockers", QueryOptions::new()).unwrap();
        client.open_named("pipeline").unwrap();
        assert_eq!(store.subscriber_count(), 2);
    }
    assert_eq!(store.subscriber_count(), 0);
}

#[tokio::test]
async fn test_concurrent_writes_reach_every_handle() {
    let store = seeded_store();
    let client = SyncClient::new(store.clone());
    let gateway = client.gateway();
    let blockers = CollectionRef::new("blockers");

    let mut recorders: Vec<Recorder> = (0..4)
        .map(|_| {
            let handle = client.open_named("blockers").unwrap();
            Recorder::attach(&client, handle).unwrap()
        })
        .collect();
    for recorder in &mut recorders {
        recorder.next().await;
    }

    let writes = (0..8).map(|i| {
        let fields = store_fields(serde_json::json!({ "title": format!("Load {i}"), "impact": i }));
        gateway.add(&blockers, fields)
    });
    let ids = futures::future::join_all(writes).await;
    assert!(ids.iter().all(Result::is_ok));

    for recorder in &mut recorders {
        let last = recorder
            .next_matching(|u| u.view().is_some_and(|v| v.len() == 11))
            .await;
        assert_eq!(view_ids(&last)[0], "b2");
    }
    assert_eq!(store.write_count(), 8);
}

#[tokio::test]
async fn test_single_document_handle() {
    let store = seeded_store();
    let stats = CollectionRef::new("stats");
    store.insert(stats.clone(), "previous", store_fields(serde_json::json!({ "revenue": 1 })));
    let client = SyncClient::new(store.clone());

    let handle = client.open_named("stats").unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();

    // Missing document is an empty view, not a failure.
    let first = recorder.next().await;
    assert_eq!(first.status, ConnectionStatus::Connected);
    assert!(first.view().unwrap().is_empty());

    store.insert(stats.clone(), "current", store_fields(serde_json::json!({ "revenue": 100 })));
    let created = recorder.next().await;
    assert_eq!(view_ids(&created), vec!["current"]);

    client
        .gateway()
        .update(
            &stats,
            &DocumentId::new("current"),
            store_fields(serde_json::json!({ "revenue": 250 })),
        )
        .await
        .unwrap();
    let updated = recorder.next().await;
    let view = updated.view().unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.entities()[0].number("revenue"), Some(250.0));
}

#[tokio::test]
async fn test_open_document_on_missing_collection() {
    let client = SyncClient::new(seeded_store());
    let handle = client
        .open_document("knowledge", &DocumentId::new("memory_core"))
        .unwrap();
    let mut recorder = Recorder::attach(&client, handle).unwrap();

    let update = recorder.next().await;
    assert!(update.error().is_none());
    assert!(update.view().unwrap().is_empty());
}
