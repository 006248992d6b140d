//! Reconciliation properties shared by the memory and PostgreSQL suites.
//! Every check takes a key prefix so runs against a shared database do not
//! collide.

use futures::future::join_all;
use std::sync::Arc;

use logistics_sync::models::{OrderStatus, Task};
use logistics_sync::repositories::{AggregateStore, OrderQueries};

use super::{aggregate, container_numbers, reconciler, FailingStore};

pub async fn idempotent_resync(store: Arc<dyn AggregateStore>, prefix: &str) {
    let key = format!("{}-IDEM", prefix);
    let reconciler = reconciler(store.clone());

    let mut payload = aggregate(&key, &["C1", "C2"]);
    payload.tasks.push(Task::new("Book truck"));

    let first = reconciler.reconcile_aggregate(payload.clone()).await.unwrap();
    let before = store.find_aggregate(&key).await.unwrap().unwrap();

    let second = reconciler.reconcile_aggregate(payload).await.unwrap();
    let after = store.find_aggregate(&key).await.unwrap().unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.order_id, second.order_id);
    assert_eq!(before.header.order, after.header.order);
    assert_eq!(before.containers, after.containers);
    assert_eq!(before.tasks, after.tasks);
    assert!(after.header.last_modified >= before.header.last_modified);
}

pub async fn full_replacement(store: Arc<dyn AggregateStore>, prefix: &str) {
    let key = format!("{}-REPL", prefix);
    let reconciler = reconciler(store.clone());

    reconciler.reconcile_aggregate(aggregate(&key, &["A", "B"])).await.unwrap();
    reconciler.reconcile_aggregate(aggregate(&key, &["C"])).await.unwrap();

    let stored = store.find_aggregate(&key).await.unwrap().unwrap();
    assert_eq!(container_numbers(&stored), vec!["C"]);
}

/// Failure after the parent update and one child insert leaves the previous state
pub async fn failed_write_is_atomic(store: Arc<dyn AggregateStore>, prefix: &str) {
    let key = format!("{}-ATOM", prefix);
    reconciler(store.clone())
        .reconcile_aggregate(aggregate(&key, &["OLD-1", "OLD-2"]))
        .await
        .unwrap();
    let committed = store.find_aggregate(&key).await.unwrap().unwrap();

    let failing: Arc<dyn AggregateStore> = Arc::new(FailingStore::new(store.clone(), 1));
    let mut payload = aggregate(&key, &["NEW-1", "NEW-2", "NEW-3"]);
    payload.order.client_name = Some("Changed".to_string());

    let result = reconciler(failing).reconcile_aggregate(payload).await;
    assert!(result.is_err());

    let after = store.find_aggregate(&key).await.unwrap().unwrap();
    assert_eq!(after, committed);
}

pub async fn one_row_per_key(store: Arc<dyn AggregateStore>, prefix: &str) {
    let key = format!("{}-UNIQ", prefix);
    let reconciler = reconciler(store.clone());

    let first = reconciler.reconcile_aggregate(aggregate(&key, &[])).await.unwrap();
    let second = reconciler.reconcile_aggregate(aggregate(&key, &["C1"])).await.unwrap();

    assert_eq!(first.order_id, second.order_id);
    let matching = store
        .recent_changes(500)
        .await
        .unwrap()
        .into_iter()
        .filter(|o| o.order.order_number == key)
        .count();
    assert_eq!(matching, 1);
}

/// N writers race on one key; the survivor is exactly one writer's child set
pub async fn concurrent_writers_leave_one_coherent_set(store: Arc<dyn AggregateStore>, prefix: &str) {
    const WRITERS: usize = 8;
    let key = format!("{}-RACE", prefix);
    let reconciler = Arc::new(reconciler(store.clone()));

    let payloads: Vec<Vec<String>> = (0..WRITERS)
        .map(|w| (0..=w % 3).map(|c| format!("W{}-{}", w, c)).collect())
        .collect();

    let handles = payloads.iter().cloned().map(|numbers| {
        let reconciler = reconciler.clone();
        let key = key.clone();
        tokio::spawn(async move {
            let refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
            reconciler.reconcile_aggregate(aggregate(&key, &refs)).await
        })
    });

    let outcomes: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|o| o.created).count(), 1);
    assert!(outcomes.iter().all(|o| o.order_id == outcomes[0].order_id));

    let stored = store.find_aggregate(&key).await.unwrap().unwrap();
    let survivor = container_numbers(&stored);
    assert!(payloads.contains(&survivor), "mixed child set: {:?}", survivor);
}

pub async fn active_orders_exclude_terminal(store: Arc<dyn AggregateStore>, prefix: &str) {
    let key = format!("{}-ACT", prefix);
    let reconciler = reconciler(store.clone());

    let mut payload = aggregate(&key, &["C1"]);
    payload.order.status = Some(OrderStatus::InTransit);
    reconciler.reconcile_aggregate(payload.clone()).await.unwrap();

    let active = store.active_orders().await.unwrap();
    assert!(active.iter().any(|o| o.order.order_number == key));

    payload.order.status = Some(OrderStatus::Completed);
    reconciler.reconcile_aggregate(payload).await.unwrap();

    let active = store.active_orders().await.unwrap();
    assert!(!active.iter().any(|o| o.order.order_number == key));
    assert!(store.find_aggregate(&key).await.unwrap().is_some());

    // no status yet still counts as in flight
    let unset = format!("{}-ACT-NULL", prefix);
    let mut payload = aggregate(&unset, &[]);
    payload.order.status = None;
    reconciler.reconcile_aggregate(payload).await.unwrap();

    let active = store.active_orders().await.unwrap();
    assert!(active.iter().any(|o| o.order.order_number == unset && o.order.status.is_none()));
}

/// `X1` with one container, then resynced with an empty list
pub async fn emptied_container_list(store: Arc<dyn AggregateStore>, prefix: &str) {
    let key = format!("{}-X1", prefix);
    let reconciler = reconciler(store.clone());

    let first = reconciler.reconcile_aggregate(aggregate(&key, &["C1"])).await.unwrap();
    let stored = store.find_aggregate(&key).await.unwrap().unwrap();
    assert_eq!(container_numbers(&stored), vec!["C1"]);

    let second = reconciler.reconcile_aggregate(aggregate(&key, &[])).await.unwrap();
    assert_eq!(second.order_id, first.order_id);
    assert_eq!(second.containers, 0);

    let stored = store.find_aggregate(&key).await.unwrap().unwrap();
    assert!(stored.containers.is_empty());
}

pub async fn soft_delete_then_recreate(store: Arc<dyn AggregateStore>, prefix: &str) {
    let key = format!("{}-DEL", prefix);
    let reconciler = reconciler(store.clone());

    let created = reconciler.reconcile_aggregate(aggregate(&key, &["C1"])).await.unwrap();

    let mut tombstone = aggregate(&key, &["C1"]);
    tombstone.order.is_deleted = true;
    let deleted = reconciler.reconcile_aggregate(tombstone).await.unwrap();
    assert!(deleted.deleted);
    assert_eq!(deleted.order_id, created.order_id);
    assert!(store.find_aggregate(&key).await.unwrap().is_none());

    let revived = reconciler.reconcile_aggregate(aggregate(&key, &["C2"])).await.unwrap();
    assert!(revived.created);
    assert_ne!(revived.order_id, created.order_id);

    let stored = store.find_aggregate(&key).await.unwrap().unwrap();
    assert_eq!(container_numbers(&stored), vec!["C2"]);
}
