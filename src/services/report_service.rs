//! Servicio de reportes
//!
//! Read-only projections over committed orders. Each call is a single store
//! read, so a report never shows a half-written aggregate.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::models::{OrderStatistics, OverdueTask, StoredAggregate, StoredOrder};
use crate::repositories::{AggregateStore, OrderQueries, StoreError};

pub const DEFAULT_RECENT_LIMIT: i64 = 100;
pub const MAX_RECENT_LIMIT: i64 = 500;

/// Clamp a requested page size to `1..=MAX_RECENT_LIMIT`
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT)
}

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn AggregateStore>,
}

impl ReportService {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self { store }
    }

    pub async fn recent_changes(&self, limit: Option<i64>) -> Result<Vec<StoredOrder>, StoreError> {
        let limit = clamp_limit(limit);
        debug!("📊 Recent changes (limit={})", limit);
        self.store.recent_changes(limit).await
    }

    pub async fn active_orders(&self) -> Result<Vec<StoredOrder>, StoreError> {
        self.store.active_orders().await
    }

    pub async fn find_order(&self, order_number: &str) -> Result<Option<StoredAggregate>, StoreError> {
        self.store.find_aggregate(order_number.trim()).await
    }

    pub async fn statistics(&self) -> Result<OrderStatistics, StoreError> {
        self.store.statistics().await
    }

    pub async fn overdue_tasks(&self) -> Result<Vec<OverdueTask>, StoreError> {
        self.store.overdue_tasks(Utc::now()).await
    }
}
