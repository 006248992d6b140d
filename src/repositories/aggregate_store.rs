//! Aggregate store seam
//!
//! The reconciler drives a [`SyncTransaction`] step by step, so the same
//! algorithm runs against PostgreSQL and against the in-process store. The
//! query surface reads through [`OrderQueries`].
//!
//! A transaction that is dropped without [`SyncTransaction::commit`] is rolled
//! back, and its connection (or lock) is released.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

use crate::models::{Container, Order, OrderStatistics, OverdueTask, StoredAggregate, StoredOrder, Task};

/// Storage failures. All of them are retryable from the caller's point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("timed out waiting for the write lock on '{0}'")]
    LockTimeout(String),

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Identity and stamps of the live row matched by business key
#[derive(Debug, Clone, PartialEq)]
pub struct LiveOrderRef {
    pub id: i64,
    pub last_modified: DateTime<Utc>,
    pub client_modified_at: Option<DateTime<Utc>>,
}

/// One reconciliation transaction
#[async_trait]
pub trait SyncTransaction: Send {
    /// Exclusive per-key lock held until commit or rollback
    async fn lock_order_number(&mut self, order_number: &str) -> Result<(), StoreError>;

    async fn find_live_order(&mut self, order_number: &str) -> Result<Option<LiveOrderRef>, StoreError>;

    /// Insert a new header; returns the new identity and its `last_modified`
    async fn insert_order(&mut self, order: &Order) -> Result<(i64, DateTime<Utc>), StoreError>;

    /// Overwrite every scalar field; `last_modified` never moves backwards
    async fn update_order(&mut self, id: i64, order: &Order) -> Result<DateTime<Utc>, StoreError>;

    /// Remove every container and task owned by the order
    async fn delete_children(&mut self, order_id: i64) -> Result<(), StoreError>;

    async fn insert_container(&mut self, order_id: i64, position: i32, container: &Container) -> Result<(), StoreError>;

    async fn insert_task(&mut self, order_id: i64, position: i32, task: &Task) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Read-only projections over committed, non-deleted orders
#[async_trait]
pub trait OrderQueries: Send + Sync {
    /// Most recently modified first, ties by order number ascending
    async fn recent_changes(&self, limit: i64) -> Result<Vec<StoredOrder>, StoreError>;

    /// Orders whose status is not terminal
    async fn active_orders(&self) -> Result<Vec<StoredOrder>, StoreError>;

    /// Header and children from one snapshot
    async fn find_aggregate(&self, order_number: &str) -> Result<Option<StoredAggregate>, StoreError>;

    async fn statistics(&self) -> Result<OrderStatistics, StoreError>;

    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<OverdueTask>, StoreError>;
}

#[async_trait]
pub trait AggregateStore: OrderQueries {
    /// Idempotent; safe on every start
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    async fn begin(&self) -> Result<Box<dyn SyncTransaction>, StoreError>;

    fn backend_name(&self) -> &'static str;
}
