#![allow(dead_code)]

pub mod properties;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use logistics_sync::config::{EnvironmentConfig, StorageBackend};
use logistics_sync::models::{
    Container, Order, OrderAggregate, OrderStatistics, OverdueTask, StoredAggregate, StoredOrder, Task,
};
use logistics_sync::repositories::{AggregateStore, LiveOrderRef, OrderQueries, StoreError, SyncTransaction};
use logistics_sync::services::{
    ChangeEvent, ChangeNotifier, LogNotifier, NotificationDispatcher, NotifyError, ReconcilePolicy, Reconciler,
};

pub const TEST_API_KEY: &str = "test-api-key";

pub fn aggregate(order_number: &str, containers: &[&str]) -> OrderAggregate {
    let mut order = Order::new(order_number);
    order.container_count = Some(containers.len() as i32);
    OrderAggregate {
        order,
        containers: containers.iter().map(|c| Container::numbered(*c)).collect(),
        tasks: Vec::new(),
    }
}

pub fn container_numbers(stored: &StoredAggregate) -> Vec<String> {
    stored
        .containers
        .iter()
        .map(|c| c.container_number.clone().unwrap_or_default())
        .collect()
}

pub fn reconciler(store: Arc<dyn AggregateStore>) -> Reconciler {
    let (dispatcher, _worker) = NotificationDispatcher::spawn(Arc::new(LogNotifier), 64);
    Reconciler::new(store, dispatcher, ReconcilePolicy::default())
}

pub fn memory_config() -> EnvironmentConfig {
    EnvironmentConfig {
        api_key: Some(TEST_API_KEY.to_string()),
        storage_backend: StorageBackend::Memory,
        ..EnvironmentConfig::default()
    }
}

/// Keeps every event it receives
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    pub events: Arc<Mutex<Vec<ChangeEvent>>>,
}

#[async_trait]
impl ChangeNotifier for RecordingNotifier {
    async fn notify(&self, event: &ChangeEvent) -> Result<(), NotifyError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Always rejects, like a channel with a revoked token
pub struct FailingNotifier;

#[async_trait]
impl ChangeNotifier for FailingNotifier {
    async fn notify(&self, _event: &ChangeEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected {
            status: 401,
            body: "Unauthorized".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Store wrapper whose transactions fail on the N-th container insert
pub struct FailingStore {
    inner: Arc<dyn AggregateStore>,
    fail_on_container: usize,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn AggregateStore>, fail_on_container: usize) -> Self {
        Self { inner, fail_on_container }
    }
}

struct FailingTransaction {
    inner: Box<dyn SyncTransaction>,
    inserted: usize,
    fail_on_container: usize,
}

#[async_trait]
impl SyncTransaction for FailingTransaction {
    async fn lock_order_number(&mut self, order_number: &str) -> Result<(), StoreError> {
        self.inner.lock_order_number(order_number).await
    }

    async fn find_live_order(&mut self, order_number: &str) -> Result<Option<LiveOrderRef>, StoreError> {
        self.inner.find_live_order(order_number).await
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(i64, DateTime<Utc>), StoreError> {
        self.inner.insert_order(order).await
    }

    async fn update_order(&mut self, id: i64, order: &Order) -> Result<DateTime<Utc>, StoreError> {
        self.inner.update_order(id, order).await
    }

    async fn delete_children(&mut self, order_id: i64) -> Result<(), StoreError> {
        self.inner.delete_children(order_id).await
    }

    async fn insert_container(&mut self, order_id: i64, position: i32, container: &Container) -> Result<(), StoreError> {
        if self.inserted == self.fail_on_container {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inserted += 1;
        self.inner.insert_container(order_id, position, container).await
    }

    async fn insert_task(&mut self, order_id: i64, position: i32, task: &Task) -> Result<(), StoreError> {
        self.inner.insert_task(order_id, position, task).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        this.inner.commit().await
    }
}

#[async_trait]
impl OrderQueries for FailingStore {
    async fn recent_changes(&self, limit: i64) -> Result<Vec<StoredOrder>, StoreError> {
        self.inner.recent_changes(limit).await
    }

    async fn active_orders(&self) -> Result<Vec<StoredOrder>, StoreError> {
        self.inner.active_orders().await
    }

    async fn find_aggregate(&self, order_number: &str) -> Result<Option<StoredAggregate>, StoreError> {
        self.inner.find_aggregate(order_number).await
    }

    async fn statistics(&self) -> Result<OrderStatistics, StoreError> {
        self.inner.statistics().await
    }

    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<OverdueTask>, StoreError> {
        self.inner.overdue_tasks(now).await
    }
}

#[async_trait]
impl AggregateStore for FailingStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.inner.ensure_schema().await
    }

    async fn begin(&self) -> Result<Box<dyn SyncTransaction>, StoreError> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin().await?,
            inserted: 0,
            fail_on_container: self.fail_on_container,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Poll until the recorder holds `count` events or the deadline passes
pub async fn wait_for_events(recorder: &RecordingNotifier, count: usize) -> Vec<ChangeEvent> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let events = recorder.events.lock().await.clone();
        if events.len() >= count || tokio::time::Instant::now() >= deadline {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
