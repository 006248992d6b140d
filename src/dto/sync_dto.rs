//! Payload de sincronización
//!
//! Wire shape of one order aggregate as pushed by the client of record.
//! Field names are camelCase; unknown fields are rejected. Conversion into
//! [`OrderAggregate`] is the validation boundary: nothing reaches the
//! reconciler without passing through [`SyncOrderRequest::into_aggregate`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::models::{Container, Order, OrderAggregate, OrderStatus, Task, TaskStatus};
use crate::services::reconciler::SyncError;
use crate::utils::validation::{lenient_datetime, normalize_text, null_as_default, validate_not_blank, validate_order_number};

/// Request para sincronizar un pedido completo
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncOrderRequest {
    /// Record id on the client; kept for reference, never used as identity
    pub id: Option<i64>,

    #[validate(custom = "validate_order_number")]
    pub order_number: Option<String>,

    #[validate(length(max = 200))]
    pub client_name: Option<String>,

    #[validate(range(min = 0))]
    pub container_count: Option<i32>,

    #[validate(length(max = 100))]
    pub goods_type: Option<String>,

    #[validate(length(max = 200))]
    pub route: Option<String>,

    #[validate(length(max = 100))]
    pub transit_port: Option<String>,

    #[validate(length(max = 100))]
    pub document_number: Option<String>,

    #[validate(length(max = 200))]
    pub chinese_transport_company: Option<String>,

    #[validate(length(max = 200))]
    pub iranian_transport_company: Option<String>,

    #[validate(length(max = 50))]
    pub status: Option<String>,

    #[validate(length(max = 20))]
    pub status_color: Option<String>,

    #[serde(default, with = "lenient_datetime")]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub loading_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub departure_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub arrival_iran_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub truck_loading_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub arrival_turkmenistan_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub client_receiving_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub arrival_notice_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub tkm_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub eta_date: Option<DateTime<Utc>>,

    pub has_loading_photo: Option<bool>,
    pub has_local_charges: Option<bool>,
    pub has_tex: Option<bool>,

    pub notes: Option<String>,
    pub additional_info: Option<String>,

    #[serde(default, with = "lenient_datetime")]
    pub last_modified: Option<DateTime<Utc>>,

    pub is_deleted: Option<bool>,

    #[serde(default, deserialize_with = "null_as_default")]
    #[validate]
    pub containers: Vec<SyncContainerRequest>,

    #[serde(default, deserialize_with = "null_as_default")]
    #[validate]
    pub tasks: Vec<SyncTaskRequest>,
}

/// Contenedor dentro del payload
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncContainerRequest {
    /// Client-side ids and stamps are accepted and ignored
    pub id: Option<i64>,
    pub order_id: Option<i64>,
    #[serde(default, with = "lenient_datetime")]
    pub last_modified: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,

    #[validate(length(max = 50))]
    pub container_number: Option<String>,

    #[validate(length(max = 50))]
    pub container_type: Option<String>,

    pub weight: Option<Decimal>,
    pub volume: Option<Decimal>,

    #[serde(default, with = "lenient_datetime")]
    pub loading_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub departure_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub arrival_iran_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub truck_loading_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub arrival_turkmenistan_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub client_receiving_date: Option<DateTime<Utc>>,

    #[validate(length(max = 100))]
    pub driver_first_name: Option<String>,

    #[validate(length(max = 100))]
    pub driver_last_name: Option<String>,

    #[validate(length(max = 200))]
    pub driver_company: Option<String>,

    #[validate(length(max = 50))]
    pub truck_number: Option<String>,

    #[validate(length(max = 50))]
    pub driver_iran_phone: Option<String>,

    #[validate(length(max = 50))]
    pub driver_turkmenistan_phone: Option<String>,
}

/// Tarea dentro del payload
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncTaskRequest {
    pub task_id: Option<i64>,
    pub order_id: Option<i64>,
    #[serde(default, with = "lenient_datetime")]
    pub last_modified: Option<DateTime<Utc>>,
    pub is_deleted: Option<bool>,

    #[validate(length(max = 500), custom = "validate_not_blank")]
    #[serde(default)]
    pub description: String,

    #[validate(length(max = 100))]
    pub assigned_to: Option<String>,

    /// Ordinal: 0 ToDo, 1 InProgress, 2 Completed
    pub status: Option<i32>,

    pub priority: Option<i32>,

    #[serde(default, with = "lenient_datetime")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_datetime")]
    pub created_date: Option<DateTime<Utc>>,
}

impl SyncOrderRequest {
    /// Validate and convert into the domain aggregate.
    ///
    /// Children flagged `isDeleted` are client-side tombstones and are left out
    /// of the live set. A missing `containerCount` falls back to the number of
    /// live containers.
    pub fn into_aggregate(mut self) -> Result<OrderAggregate, SyncError> {
        self.containers.retain(|c| !c.is_deleted.unwrap_or(false));
        self.tasks.retain(|t| !t.is_deleted.unwrap_or(false));
        self.validate()?;

        let order_number = self
            .order_number
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| SyncError::Validation("orderNumber is required".to_string()))?
            .to_string();

        let status = normalize_text(self.status)
            .map(|raw| raw.parse::<OrderStatus>())
            .transpose()
            .map_err(|e| SyncError::Validation(e.to_string()))?;

        let containers: Vec<Container> = self
            .containers
            .into_iter()
            .map(SyncContainerRequest::into_container)
            .collect();

        let tasks = self
            .tasks
            .into_iter()
            .map(SyncTaskRequest::into_task)
            .collect::<Result<Vec<Task>, SyncError>>()?;

        let container_count = self
            .container_count
            .or_else(|| i32::try_from(containers.len()).ok());

        let order = Order {
            order_number,
            client_record_id: self.id,
            client_name: normalize_text(self.client_name),
            container_count,
            goods_type: normalize_text(self.goods_type),
            route: normalize_text(self.route),
            transit_port: normalize_text(self.transit_port),
            document_number: normalize_text(self.document_number),
            chinese_transport_company: normalize_text(self.chinese_transport_company),
            iranian_transport_company: normalize_text(self.iranian_transport_company),
            status,
            status_color: normalize_text(self.status_color),
            creation_date: self.creation_date,
            loading_date: self.loading_date,
            departure_date: self.departure_date,
            arrival_iran_date: self.arrival_iran_date,
            truck_loading_date: self.truck_loading_date,
            arrival_turkmenistan_date: self.arrival_turkmenistan_date,
            client_receiving_date: self.client_receiving_date,
            arrival_notice_date: self.arrival_notice_date,
            tkm_date: self.tkm_date,
            eta_date: self.eta_date,
            has_loading_photo: self.has_loading_photo,
            has_local_charges: self.has_local_charges,
            has_tex: self.has_tex,
            notes: self.notes,
            additional_info: self.additional_info,
            client_modified_at: self.last_modified,
            is_deleted: self.is_deleted.unwrap_or(false),
        };

        Ok(OrderAggregate { order, containers, tasks })
    }
}

impl SyncContainerRequest {
    fn into_container(self) -> Container {
        Container {
            container_number: normalize_text(self.container_number),
            container_type: normalize_text(self.container_type),
            weight: self.weight,
            volume: self.volume,
            loading_date: self.loading_date,
            departure_date: self.departure_date,
            arrival_iran_date: self.arrival_iran_date,
            truck_loading_date: self.truck_loading_date,
            arrival_turkmenistan_date: self.arrival_turkmenistan_date,
            client_receiving_date: self.client_receiving_date,
            driver_first_name: normalize_text(self.driver_first_name),
            driver_last_name: normalize_text(self.driver_last_name),
            driver_company: normalize_text(self.driver_company),
            truck_number: normalize_text(self.truck_number),
            driver_iran_phone: normalize_text(self.driver_iran_phone),
            driver_turkmenistan_phone: normalize_text(self.driver_turkmenistan_phone),
        }
    }
}

impl SyncTaskRequest {
    fn into_task(self) -> Result<Task, SyncError> {
        let status = self
            .status
            .map(TaskStatus::try_from)
            .transpose()
            .map_err(|e| SyncError::Validation(e.to_string()))?
            .unwrap_or_default();

        Ok(Task {
            description: self.description.trim().to_string(),
            assigned_to: normalize_text(self.assigned_to),
            status,
            priority: self.priority,
            due_date: self.due_date,
            created_date: self.created_date,
        })
    }
}
