//! Order model
//!
//! The order header (aggregate root) plus the aggregate types that carry it
//! together with its owned containers and tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::container::Container;
use super::task::Task;

/// Order status as reported by the client of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Loading,
    InTransit,
    AtTransitPort,
    AtBorder,
    CustomsClearance,
    Arrived,
    Delivered,
    Completed,
    Cancelled,
}

/// Status string that does not name any `OrderStatus`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown order status '{0}'")]
pub struct UnknownOrderStatus(pub String);

impl OrderStatus {
    /// Statuses after which an order is no longer active
    pub const TERMINAL: [OrderStatus; 2] = [OrderStatus::Completed, OrderStatus::Cancelled];

    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::New,
        OrderStatus::Loading,
        OrderStatus::InTransit,
        OrderStatus::AtTransitPort,
        OrderStatus::AtBorder,
        OrderStatus::CustomsClearance,
        OrderStatus::Arrived,
        OrderStatus::Delivered,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "New",
            OrderStatus::Loading => "Loading",
            OrderStatus::InTransit => "InTransit",
            OrderStatus::AtTransitPort => "AtTransitPort",
            OrderStatus::AtBorder => "AtBorder",
            OrderStatus::CustomsClearance => "CustomsClearance",
            OrderStatus::Arrived => "Arrived",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Terminal statuses as stored in the `status` column
    pub fn terminal_names() -> Vec<String> {
        Self::TERMINAL.iter().map(|s| s.as_str().to_string()).collect()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownOrderStatus;

    /// Accepts `InTransit`, `in_transit`, `In Transit` and similar spellings.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(|c| c.to_lowercase())
            .collect();

        // "Canceled" is the spelling some client builds send
        if normalized == "canceled" {
            return Ok(OrderStatus::Cancelled);
        }

        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().to_lowercase() == normalized)
            .ok_or_else(|| UnknownOrderStatus(value.to_string()))
    }
}

/// Scalar fields of an order header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_number: String,
    /// Record id on the client of record; informational only
    pub client_record_id: Option<i64>,
    pub client_name: Option<String>,
    pub container_count: Option<i32>,
    pub goods_type: Option<String>,
    pub route: Option<String>,
    pub transit_port: Option<String>,
    pub document_number: Option<String>,
    pub chinese_transport_company: Option<String>,
    pub iranian_transport_company: Option<String>,
    pub status: Option<OrderStatus>,
    pub status_color: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub loading_date: Option<DateTime<Utc>>,
    pub departure_date: Option<DateTime<Utc>>,
    pub arrival_iran_date: Option<DateTime<Utc>>,
    pub truck_loading_date: Option<DateTime<Utc>>,
    pub arrival_turkmenistan_date: Option<DateTime<Utc>>,
    pub client_receiving_date: Option<DateTime<Utc>>,
    pub arrival_notice_date: Option<DateTime<Utc>>,
    pub tkm_date: Option<DateTime<Utc>>,
    pub eta_date: Option<DateTime<Utc>>,
    pub has_loading_photo: Option<bool>,
    pub has_local_charges: Option<bool>,
    pub has_tex: Option<bool>,
    pub notes: Option<String>,
    pub additional_info: Option<String>,
    /// Last-modified stamp as sent by the client; the server keeps its own
    pub client_modified_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
}

impl Order {
    /// Empty header for a business key
    pub fn new(order_number: impl Into<String>) -> Self {
        Self {
            order_number: order_number.into(),
            client_record_id: None,
            client_name: None,
            container_count: None,
            goods_type: None,
            route: None,
            transit_port: None,
            document_number: None,
            chinese_transport_company: None,
            iranian_transport_company: None,
            status: None,
            status_color: None,
            creation_date: None,
            loading_date: None,
            departure_date: None,
            arrival_iran_date: None,
            truck_loading_date: None,
            arrival_turkmenistan_date: None,
            client_receiving_date: None,
            arrival_notice_date: None,
            tkm_date: None,
            eta_date: None,
            has_loading_photo: None,
            has_local_charges: None,
            has_tex: None,
            notes: None,
            additional_info: None,
            client_modified_at: None,
            is_deleted: false,
        }
    }

    /// An order with no status counts as active
    pub fn is_active(&self) -> bool {
        !self.is_deleted && !self.status.map(|s| s.is_terminal()).unwrap_or(false)
    }
}

/// Incoming aggregate, validated and ready to reconcile
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAggregate {
    pub order: Order,
    pub containers: Vec<Container>,
    pub tasks: Vec<Task>,
}

/// Order header as stored, with its surrogate identity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredOrder {
    pub id: i64,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub order: Order,
}

/// Full stored aggregate, children in the order they were supplied
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAggregate {
    #[serde(flatten)]
    pub header: StoredOrder,
    pub containers: Vec<Container>,
    pub tasks: Vec<Task>,
}
