mod common;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use std::sync::Arc;

use logistics_sync::dto::SyncOrderRequest;
use logistics_sync::models::{OrderStatus, Task, TaskStatus};
use logistics_sync::repositories::{AggregateStore, MemoryAggregateStore, OrderQueries};
use logistics_sync::services::{ChangeKind, NotificationDispatcher, ReconcilePolicy, Reconciler, SyncError};

use common::{aggregate, properties, FailingNotifier, RecordingNotifier};

fn memory() -> Arc<dyn AggregateStore> {
    Arc::new(MemoryAggregateStore::default())
}

#[tokio::test]
async fn test_idempotent_resync() {
    properties::idempotent_resync(memory(), "MEM").await;
}

#[tokio::test]
async fn test_full_replacement() {
    properties::full_replacement(memory(), "MEM").await;
}

#[tokio::test]
async fn test_failed_write_is_atomic() {
    properties::failed_write_is_atomic(memory(), "MEM").await;
}

#[tokio::test]
async fn test_one_row_per_key() {
    properties::one_row_per_key(memory(), "MEM").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_leave_one_coherent_set() {
    properties::concurrent_writers_leave_one_coherent_set(memory(), "MEM").await;
}

#[tokio::test]
async fn test_active_orders_exclude_terminal() {
    properties::active_orders_exclude_terminal(memory(), "MEM").await;
}

#[tokio::test]
async fn test_emptied_container_list() {
    properties::emptied_container_list(memory(), "MEM").await;
}

#[tokio::test]
async fn test_soft_delete_then_recreate() {
    properties::soft_delete_then_recreate(memory(), "MEM").await;
}

#[tokio::test]
async fn test_failed_write_leaves_no_rows_for_new_key() {
    let store = Arc::new(MemoryAggregateStore::default());
    let failing = Arc::new(common::FailingStore::new(store.clone(), 0));

    let result = common::reconciler(failing).reconcile_aggregate(aggregate("NEW", &["C1"])).await;

    assert!(matches!(result, Err(SyncError::Storage(_))));
    assert_eq!(store.order_row_count().await, 0);
    assert_eq!(store.container_row_count().await, 0);
}

#[tokio::test]
async fn test_children_keep_supplied_order() {
    let store = memory();
    let reconciler = common::reconciler(store.clone());

    let mut payload = aggregate("ORD", &["Z", "A", "M"]);
    payload.tasks = vec![Task::new("second"), Task::new("first")];
    reconciler.reconcile_aggregate(payload).await.unwrap();

    let stored = store.find_aggregate("ORD").await.unwrap().unwrap();
    assert_eq!(common::container_numbers(&stored), vec!["Z", "A", "M"]);
    let descriptions: Vec<&str> = stored.tasks.iter().map(|t| t.description.as_str()).collect();
    assert_eq!(descriptions, vec!["second", "first"]);
}

#[tokio::test]
async fn test_wire_payload_round_trip_through_store() {
    let store = memory();
    let reconciler = common::reconciler(store.clone());

    let request: SyncOrderRequest = serde_json::from_value(json!({
        "id": 12,
        "orderNumber": "TM-001",
        "clientName": "Acme",
        "status": "AtBorder",
        "containers": [
            { "containerNumber": "C1", "driverFirstName": "Ali", "driverLastName": "Rezaei" },
            { "containerNumber": "GONE", "isDeleted": true }
        ],
        "tasks": [{ "description": "Customs papers", "status": 2 }]
    }))
    .unwrap();

    let outcome = reconciler.reconcile(request).await.unwrap();
    assert_eq!(outcome.containers, 1);
    assert_eq!(outcome.tasks, 1);

    let stored = store.find_aggregate("TM-001").await.unwrap().unwrap();
    assert_eq!(stored.header.order.client_record_id, Some(12));
    assert_eq!(stored.header.order.status, Some(OrderStatus::AtBorder));
    assert_eq!(stored.containers[0].driver_name().as_deref(), Some("Ali Rezaei"));
    assert_eq!(stored.tasks[0].status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_invalid_payload_touches_nothing() {
    let store = Arc::new(MemoryAggregateStore::default());
    let reconciler = common::reconciler(store.clone());

    let request: SyncOrderRequest = serde_json::from_value(json!({ "orderNumber": "" })).unwrap();
    let result = reconciler.reconcile(request).await;

    assert!(matches!(result, Err(SyncError::InvalidPayload(_))));
    assert_eq!(store.order_row_count().await, 0);
}

#[tokio::test]
async fn test_stale_guard_is_off_by_default() {
    let store = memory();
    let reconciler = common::reconciler(store.clone());
    let now = Utc::now();

    let mut newer = aggregate("LWW", &["NEW"]);
    newer.order.client_modified_at = Some(now);
    reconciler.reconcile_aggregate(newer).await.unwrap();

    let mut older = aggregate("LWW", &["OLD"]);
    older.order.client_modified_at = Some(now - ChronoDuration::hours(1));
    reconciler.reconcile_aggregate(older).await.unwrap();

    let stored = store.find_aggregate("LWW").await.unwrap().unwrap();
    assert_eq!(common::container_numbers(&stored), vec!["OLD"]);
}

#[tokio::test]
async fn test_stale_guard_rejects_when_enabled() {
    let store = memory();
    let (dispatcher, _worker) = NotificationDispatcher::spawn(Arc::new(FailingNotifier), 8);
    let reconciler = Reconciler::new(
        store.clone(),
        dispatcher,
        ReconcilePolicy {
            reject_stale: true,
            ..ReconcilePolicy::default()
        },
    );
    let now = Utc::now();

    let mut newer = aggregate("GUARD", &["NEW"]);
    newer.order.client_modified_at = Some(now);
    reconciler.reconcile_aggregate(newer).await.unwrap();

    let mut older = aggregate("GUARD", &["OLD"]);
    older.order.client_modified_at = Some(now - ChronoDuration::hours(1));
    let result = reconciler.reconcile_aggregate(older).await;
    assert!(matches!(result, Err(SyncError::Stale { .. })));

    // Payloads without a client stamp are always accepted
    reconciler.reconcile_aggregate(aggregate("GUARD", &["UNSTAMPED"])).await.unwrap();
    let stored = store.find_aggregate("GUARD").await.unwrap().unwrap();
    assert_eq!(common::container_numbers(&stored), vec!["UNSTAMPED"]);
}

#[tokio::test]
async fn test_statistics_and_overdue_tasks() {
    let store = memory();
    let reconciler = common::reconciler(store.clone());
    let yesterday = Utc::now() - ChronoDuration::days(1);

    let mut open = aggregate("OPEN", &["C1", "C2"]);
    let mut late = Task::new("Call driver");
    late.due_date = Some(yesterday);
    let mut done = Task::new("Pay invoice");
    done.due_date = Some(yesterday);
    done.status = TaskStatus::Completed;
    open.tasks = vec![late, done];
    reconciler.reconcile_aggregate(open).await.unwrap();

    let mut closed = aggregate("CLOSED", &["C3"]);
    closed.order.status = Some(OrderStatus::Cancelled);
    reconciler.reconcile_aggregate(closed).await.unwrap();

    let mut removed = aggregate("REMOVED", &["C4"]);
    removed.order.is_deleted = true;
    reconciler.reconcile_aggregate(removed).await.unwrap();

    let stats = store.statistics().await.unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.active_orders, 1);
    assert_eq!(stats.total_containers, 3);

    let overdue = store.overdue_tasks(Utc::now()).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].order_number, "OPEN");
    assert_eq!(overdue[0].task.description, "Call driver");
}

#[tokio::test]
async fn test_recent_changes_order_and_limit() {
    let store = memory();
    let reconciler = common::reconciler(store.clone());

    for key in ["A", "B", "C"] {
        reconciler.reconcile_aggregate(aggregate(key, &[])).await.unwrap();
    }
    reconciler.reconcile_aggregate(aggregate("A", &["C1"])).await.unwrap();

    let recent = store.recent_changes(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].order.order_number, "A");
    assert!(recent[0].last_modified >= recent[1].last_modified);
}

#[tokio::test]
async fn test_change_events_follow_commits() {
    let store = memory();
    let recorder = RecordingNotifier::default();
    let (dispatcher, worker) = NotificationDispatcher::spawn(Arc::new(recorder.clone()), 8);
    let reconciler = Reconciler::new(store, dispatcher, ReconcilePolicy::default());

    reconciler.reconcile_aggregate(aggregate("EVT", &["C1"])).await.unwrap();
    reconciler.reconcile_aggregate(aggregate("EVT", &[])).await.unwrap();
    let mut tombstone = aggregate("EVT", &[]);
    tombstone.order.is_deleted = true;
    reconciler.reconcile_aggregate(tombstone).await.unwrap();

    drop(reconciler);
    worker.await.unwrap();

    let kinds: Vec<ChangeKind> = recorder.events.lock().await.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Created, ChangeKind::Updated, ChangeKind::Deleted]);
}

#[tokio::test]
async fn test_failing_notifier_does_not_affect_sync() {
    let store = memory();
    let (dispatcher, _worker) = NotificationDispatcher::spawn(Arc::new(FailingNotifier), 1);
    let reconciler = Reconciler::new(store.clone(), dispatcher, ReconcilePolicy::default());

    for _ in 0..5 {
        reconciler.reconcile_aggregate(aggregate("NOTIFY", &["C1"])).await.unwrap();
    }

    let stored = store.find_aggregate("NOTIFY").await.unwrap().unwrap();
    assert_eq!(common::container_numbers(&stored), vec!["C1"]);
}

#[tokio::test]
async fn test_recorder_sees_committed_identity() {
    let store = memory();
    let recorder = RecordingNotifier::default();
    let (dispatcher, _worker) = NotificationDispatcher::spawn(Arc::new(recorder.clone()), 8);
    let reconciler = Reconciler::new(store, dispatcher, ReconcilePolicy::default());

    let outcome = reconciler.reconcile_aggregate(aggregate("ID", &["C1", "C2"])).await.unwrap();

    let events = common::wait_for_events(&recorder, 1).await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].order_id, outcome.order_id);
    assert_eq!(events[0].containers, 2);
}
