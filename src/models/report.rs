//! Read-side projections served by the report endpoints

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::task::Task;

/// Counters computed from one consistent read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    pub total_orders: i64,
    pub active_orders: i64,
    pub total_containers: i64,
}

/// Open task past its due date, with enough of its order to identify it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueTask {
    pub order_id: i64,
    pub order_number: String,
    pub client_name: Option<String>,
    pub due_date: DateTime<Utc>,
    pub task: Task,
}
