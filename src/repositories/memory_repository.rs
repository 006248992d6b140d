//! In-process aggregate store
//!
//! Same contract as the PostgreSQL repository, kept in memory. A write
//! transaction holds the store-wide lock from `begin` until commit or drop and
//! works on a staged copy, so readers only ever see committed state and a
//! dropped transaction leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::aggregate_store::{AggregateStore, LiveOrderRef, OrderQueries, StoreError, SyncTransaction};
use crate::models::{Container, Order, OrderStatistics, OverdueTask, StoredAggregate, StoredOrder, Task};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    orders: BTreeMap<i64, StoredOrder>,
    containers: BTreeMap<i64, Vec<(i32, Container)>>,
    tasks: BTreeMap<i64, Vec<(i32, Task)>>,
}

impl MemoryState {
    fn live_orders(&self) -> impl Iterator<Item = &StoredOrder> {
        self.orders.values().filter(|o| !o.order.is_deleted)
    }

    fn find_live(&self, order_number: &str) -> Option<&StoredOrder> {
        self.live_orders().find(|o| o.order.order_number == order_number)
    }

    fn children_of<T: Clone>(map: &BTreeMap<i64, Vec<(i32, T)>>, order_id: i64) -> Vec<T> {
        let mut rows = map.get(&order_id).cloned().unwrap_or_default();
        rows.sort_by_key(|(position, _)| *position);
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

fn by_recency(a: &StoredOrder, b: &StoredOrder) -> std::cmp::Ordering {
    b.last_modified
        .cmp(&a.last_modified)
        .then_with(|| a.order.order_number.cmp(&b.order.order_number))
}

#[derive(Clone)]
pub struct MemoryAggregateStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl MemoryAggregateStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }

    /// Number of header rows, soft-deleted ones included
    pub async fn order_row_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Number of container rows across all orders
    pub async fn container_row_count(&self) -> usize {
        self.state.lock().await.containers.values().map(Vec::len).sum()
    }
}

impl Default for MemoryAggregateStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

pub struct MemorySyncTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl SyncTransaction for MemorySyncTransaction {
    async fn lock_order_number(&mut self, _order_number: &str) -> Result<(), StoreError> {
        // The store-wide lock taken in `begin` already covers every key
        Ok(())
    }

    async fn find_live_order(&mut self, order_number: &str) -> Result<Option<LiveOrderRef>, StoreError> {
        Ok(self.staged.find_live(order_number).map(|stored| LiveOrderRef {
            id: stored.id,
            last_modified: stored.last_modified,
            client_modified_at: stored.order.client_modified_at,
        }))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(i64, DateTime<Utc>), StoreError> {
        self.staged.next_id += 1;
        let id = self.staged.next_id;
        let last_modified = Utc::now();

        self.staged.orders.insert(
            id,
            StoredOrder {
                id,
                last_modified,
                order: order.clone(),
            },
        );
        Ok((id, last_modified))
    }

    async fn update_order(&mut self, id: i64, order: &Order) -> Result<DateTime<Utc>, StoreError> {
        let stored = self
            .staged
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::Unavailable(format!("order row {} vanished mid-transaction", id)))?;

        stored.last_modified = Utc::now().max(stored.last_modified);
        stored.order = order.clone();
        Ok(stored.last_modified)
    }

    async fn delete_children(&mut self, order_id: i64) -> Result<(), StoreError> {
        let containers = self.staged.containers.remove(&order_id).map(|c| c.len()).unwrap_or(0);
        let tasks = self.staged.tasks.remove(&order_id).map(|t| t.len()).unwrap_or(0);
        debug!("🗑️ Order {}: removed {} containers and {} tasks", order_id, containers, tasks);
        Ok(())
    }

    async fn insert_container(&mut self, order_id: i64, position: i32, container: &Container) -> Result<(), StoreError> {
        if !self.staged.orders.contains_key(&order_id) {
            return Err(StoreError::Unavailable(format!("container references missing order {}", order_id)));
        }
        self.staged
            .containers
            .entry(order_id)
            .or_default()
            .push((position, container.clone()));
        Ok(())
    }

    async fn insert_task(&mut self, order_id: i64, position: i32, task: &Task) -> Result<(), StoreError> {
        if !self.staged.orders.contains_key(&order_id) {
            return Err(StoreError::Unavailable(format!("task references missing order {}", order_id)));
        }
        self.staged.tasks.entry(order_id).or_default().push((position, task.clone()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemorySyncTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl OrderQueries for MemoryAggregateStore {
    async fn recent_changes(&self, limit: i64) -> Result<Vec<StoredOrder>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<StoredOrder> = state.live_orders().cloned().collect();
        orders.sort_by(by_recency);
        orders.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(orders)
    }

    async fn active_orders(&self) -> Result<Vec<StoredOrder>, StoreError> {
        let state = self.state.lock().await;
        let mut orders: Vec<StoredOrder> = state.live_orders().filter(|o| o.order.is_active()).cloned().collect();
        orders.sort_by(by_recency);
        Ok(orders)
    }

    async fn find_aggregate(&self, order_number: &str) -> Result<Option<StoredAggregate>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.find_live(order_number).map(|header| StoredAggregate {
            header: header.clone(),
            containers: MemoryState::children_of(&state.containers, header.id),
            tasks: MemoryState::children_of(&state.tasks, header.id),
        }))
    }

    async fn statistics(&self) -> Result<OrderStatistics, StoreError> {
        let state = self.state.lock().await;
        let mut stats = OrderStatistics::default();
        for stored in state.live_orders() {
            stats.total_orders += 1;
            if stored.order.is_active() {
                stats.active_orders += 1;
            }
            stats.total_containers += i64::from(stored.order.container_count.unwrap_or(0));
        }
        Ok(stats)
    }

    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<OverdueTask>, StoreError> {
        let state = self.state.lock().await;
        let mut overdue: Vec<(i32, OverdueTask)> = Vec::new();

        for stored in state.live_orders() {
            let Some(tasks) = state.tasks.get(&stored.id) else {
                continue;
            };
            for (position, task) in tasks {
                if !task.is_overdue(now) {
                    continue;
                }
                if let Some(due_date) = task.due_date {
                    overdue.push((
                        *position,
                        OverdueTask {
                            order_id: stored.id,
                            order_number: stored.order.order_number.clone(),
                            client_name: stored.order.client_name.clone(),
                            due_date,
                            task: task.clone(),
                        },
                    ));
                }
            }
        }

        overdue.sort_by(|(pa, a), (pb, b)| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.order_number.cmp(&b.order_number))
                .then_with(|| pa.cmp(pb))
        });
        Ok(overdue.into_iter().map(|(_, task)| task).collect())
    }
}

#[async_trait]
impl AggregateStore for MemoryAggregateStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn SyncTransaction>, StoreError> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout("in-memory store".to_string()))?;
        let staged = (*guard).clone();

        Ok(Box::new(MemorySyncTransaction { guard, staged }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
