//! Modelo de Container
//!
//! A container is owned by exactly one order and is only ever addressed
//! through that order's business key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Container row - maps the `containers` table minus its keys
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub container_number: Option<String>,
    pub container_type: Option<String>,
    pub weight: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub loading_date: Option<DateTime<Utc>>,
    pub departure_date: Option<DateTime<Utc>>,
    pub arrival_iran_date: Option<DateTime<Utc>>,
    pub truck_loading_date: Option<DateTime<Utc>>,
    pub arrival_turkmenistan_date: Option<DateTime<Utc>>,
    pub client_receiving_date: Option<DateTime<Utc>>,
    pub driver_first_name: Option<String>,
    pub driver_last_name: Option<String>,
    pub driver_company: Option<String>,
    pub truck_number: Option<String>,
    pub driver_iran_phone: Option<String>,
    pub driver_turkmenistan_phone: Option<String>,
}

impl Container {
    pub fn numbered(container_number: impl Into<String>) -> Self {
        Self {
            container_number: Some(container_number.into()),
            ..Default::default()
        }
    }

    /// "First Last", skipping whichever part is missing
    pub fn driver_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.driver_first_name.as_deref(), self.driver_last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}
