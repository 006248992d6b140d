//! Reconciliador de pedidos
//!
//! Applies one incoming aggregate to the store as a single transaction:
//!
//! 1. take the per-order-number write lock
//! 2. resolve the live row by order number
//! 3. update it in place (last write wins) and drop its children, or insert a
//!    new row
//! 4. insert the supplied containers and tasks in order
//! 5. commit, then enqueue a change notification
//!
//! Any failure before commit drops the transaction, which rolls it back. The
//! whole write runs under the configured sync timeout.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use validator::ValidationErrors;

use super::notifier::{ChangeEvent, ChangeKind, NotificationDispatcher};
use crate::dto::SyncOrderRequest;
use crate::models::OrderAggregate;
use crate::repositories::{AggregateStore, StoreError, SyncTransaction};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ValidationErrors),

    #[error("{0}")]
    Validation(String),

    #[error("order '{order_number}' was modified at {stored} on the server, incoming copy is from {incoming}")]
    Stale {
        order_number: String,
        incoming: DateTime<Utc>,
        stored: DateTime<Utc>,
    },

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct ReconcilePolicy {
    /// Upper bound for one reconciliation, lock waits included
    pub timeout: Duration,
    /// Reject payloads whose client stamp is older than the stored one
    pub reject_stale: bool,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            reject_stale: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub order_id: i64,
    pub order_number: String,
    pub created: bool,
    pub deleted: bool,
    pub containers: usize,
    pub tasks: usize,
    pub last_modified: DateTime<Utc>,
}

impl ReconcileOutcome {
    fn change_kind(&self) -> ChangeKind {
        if self.deleted {
            ChangeKind::Deleted
        } else if self.created {
            ChangeKind::Created
        } else {
            ChangeKind::Updated
        }
    }
}

pub struct Reconciler {
    store: Arc<dyn AggregateStore>,
    notifier: NotificationDispatcher,
    policy: ReconcilePolicy,
}

impl Reconciler {
    pub fn new(store: Arc<dyn AggregateStore>, notifier: NotificationDispatcher, policy: ReconcilePolicy) -> Self {
        Self { store, notifier, policy }
    }

    pub fn policy(&self) -> &ReconcilePolicy {
        &self.policy
    }

    /// Validate a wire payload and reconcile it
    pub async fn reconcile(&self, request: SyncOrderRequest) -> Result<ReconcileOutcome, SyncError> {
        let aggregate = request.into_aggregate()?;
        self.reconcile_aggregate(aggregate).await
    }

    pub async fn reconcile_aggregate(&self, aggregate: OrderAggregate) -> Result<ReconcileOutcome, SyncError> {
        let started = Instant::now();
        let order_number = aggregate.order.order_number.clone();

        let outcome = match tokio::time::timeout(self.policy.timeout, self.apply(&aggregate)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("⏱️ Sync of order {} timed out after {:?}", order_number, self.policy.timeout);
                return Err(StoreError::Timeout(self.policy.timeout).into());
            }
        };

        info!(
            "✅ Order {} synced (id={}, created={}, deleted={}, containers={}, tasks={}) in {:?}",
            outcome.order_number,
            outcome.order_id,
            outcome.created,
            outcome.deleted,
            outcome.containers,
            outcome.tasks,
            started.elapsed()
        );

        self.notifier.dispatch(ChangeEvent {
            kind: outcome.change_kind(),
            order_id: outcome.order_id,
            last_modified: outcome.last_modified,
            order: aggregate.order,
            containers: outcome.containers,
            tasks: outcome.tasks,
        });

        Ok(outcome)
    }

    async fn apply(&self, aggregate: &OrderAggregate) -> Result<ReconcileOutcome, SyncError> {
        let order = &aggregate.order;
        let mut tx = self.store.begin().await?;

        tx.lock_order_number(&order.order_number).await?;

        let (order_id, last_modified, created) = match tx.find_live_order(&order.order_number).await? {
            Some(live) => {
                if self.policy.reject_stale {
                    if let (Some(incoming), Some(stored)) = (order.client_modified_at, live.client_modified_at) {
                        if incoming < stored {
                            return Err(SyncError::Stale {
                                order_number: order.order_number.clone(),
                                incoming,
                                stored,
                            });
                        }
                    }
                }

                let last_modified = tx.update_order(live.id, order).await?;
                tx.delete_children(live.id).await?;
                debug!("✏️ Updating order {} in place (id={})", order.order_number, live.id);
                (live.id, last_modified, false)
            }
            None => {
                let (id, last_modified) = tx.insert_order(order).await?;
                debug!("➕ Inserted order {} (id={})", order.order_number, id);
                (id, last_modified, true)
            }
        };

        let (containers, tasks) = if order.is_deleted {
            (0, 0)
        } else {
            insert_children(tx.as_mut(), order_id, aggregate).await?
        };

        tx.commit().await?;

        Ok(ReconcileOutcome {
            order_id,
            order_number: order.order_number.clone(),
            created,
            deleted: order.is_deleted,
            containers,
            tasks,
            last_modified,
        })
    }
}

fn position(index: usize) -> Result<i32, SyncError> {
    i32::try_from(index).map_err(|_| SyncError::Validation("too many child entries".to_string()))
}

async fn insert_children(
    tx: &mut dyn SyncTransaction,
    order_id: i64,
    aggregate: &OrderAggregate,
) -> Result<(usize, usize), SyncError> {
    for (index, container) in aggregate.containers.iter().enumerate() {
        tx.insert_container(order_id, position(index)?, container).await?;
    }
    for (index, task) in aggregate.tasks.iter().enumerate() {
        tx.insert_task(order_id, position(index)?, task).await?;
    }
    Ok((aggregate.containers.len(), aggregate.tasks.len()))
}
