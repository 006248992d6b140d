//! PostgreSQL aggregate store
//!
//! Each reconciliation borrows one pooled connection for the lifetime of its
//! transaction. Same-key writers are serialized with a transaction-scoped
//! advisory lock, which also covers the first insert of a new order number.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use super::aggregate_store::{AggregateStore, LiveOrderRef, OrderQueries, StoreError, SyncTransaction};
use crate::database::schema;
use crate::models::{
    Container, Order, OrderStatistics, OrderStatus, OverdueTask, StoredAggregate, StoredOrder, Task, TaskStatus,
};

/// SQLSTATE lock_not_available, raised when `lock_timeout` expires
const LOCK_NOT_AVAILABLE: &str = "55P03";

const ORDER_SELECT: &str = r#"
    SELECT id, last_modified, order_number, client_record_id, client_name, container_count,
           goods_type, route, transit_port, document_number, chinese_transport_company,
           iranian_transport_company, status, status_color, creation_date, loading_date,
           departure_date, arrival_iran_date, truck_loading_date, arrival_turkmenistan_date,
           client_receiving_date, arrival_notice_date, tkm_date, eta_date, has_loading_photo,
           has_local_charges, has_tex, notes, additional_info, client_modified_at, is_deleted
    FROM orders
"#;

// Row structs mirror the tables; status columns are decoded by hand

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    last_modified: DateTime<Utc>,
    order_number: String,
    client_record_id: Option<i64>,
    client_name: Option<String>,
    container_count: Option<i32>,
    goods_type: Option<String>,
    route: Option<String>,
    transit_port: Option<String>,
    document_number: Option<String>,
    chinese_transport_company: Option<String>,
    iranian_transport_company: Option<String>,
    status: Option<String>,
    status_color: Option<String>,
    creation_date: Option<DateTime<Utc>>,
    loading_date: Option<DateTime<Utc>>,
    departure_date: Option<DateTime<Utc>>,
    arrival_iran_date: Option<DateTime<Utc>>,
    truck_loading_date: Option<DateTime<Utc>>,
    arrival_turkmenistan_date: Option<DateTime<Utc>>,
    client_receiving_date: Option<DateTime<Utc>>,
    arrival_notice_date: Option<DateTime<Utc>>,
    tkm_date: Option<DateTime<Utc>>,
    eta_date: Option<DateTime<Utc>>,
    has_loading_photo: Option<bool>,
    has_local_charges: Option<bool>,
    has_tex: Option<bool>,
    notes: Option<String>,
    additional_info: Option<String>,
    client_modified_at: Option<DateTime<Utc>>,
    is_deleted: bool,
}

impl From<OrderRow> for StoredOrder {
    fn from(row: OrderRow) -> Self {
        let status = row.status.as_deref().and_then(|raw| match raw.parse::<OrderStatus>() {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("⚠️ Order {} has {}, reading it as no status", row.order_number, e);
                None
            }
        });

        StoredOrder {
            id: row.id,
            last_modified: row.last_modified,
            order: Order {
                order_number: row.order_number,
                client_record_id: row.client_record_id,
                client_name: row.client_name,
                container_count: row.container_count,
                goods_type: row.goods_type,
                route: row.route,
                transit_port: row.transit_port,
                document_number: row.document_number,
                chinese_transport_company: row.chinese_transport_company,
                iranian_transport_company: row.iranian_transport_company,
                status,
                status_color: row.status_color,
                creation_date: row.creation_date,
                loading_date: row.loading_date,
                departure_date: row.departure_date,
                arrival_iran_date: row.arrival_iran_date,
                truck_loading_date: row.truck_loading_date,
                arrival_turkmenistan_date: row.arrival_turkmenistan_date,
                client_receiving_date: row.client_receiving_date,
                arrival_notice_date: row.arrival_notice_date,
                tkm_date: row.tkm_date,
                eta_date: row.eta_date,
                has_loading_photo: row.has_loading_photo,
                has_local_charges: row.has_local_charges,
                has_tex: row.has_tex,
                notes: row.notes,
                additional_info: row.additional_info,
                client_modified_at: row.client_modified_at,
                is_deleted: row.is_deleted,
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    description: String,
    assigned_to: Option<String>,
    status: i32,
    priority: Option<i32>,
    due_date: Option<DateTime<Utc>>,
    created_date: Option<DateTime<Utc>>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        let status = TaskStatus::try_from(row.status).unwrap_or_else(|e| {
            warn!("⚠️ {}, reading it as ToDo", e);
            TaskStatus::ToDo
        });

        Task {
            description: row.description,
            assigned_to: row.assigned_to,
            status,
            priority: row.priority,
            due_date: row.due_date,
            created_date: row.created_date,
        }
    }
}

#[derive(Debug, FromRow)]
struct OverdueTaskRow {
    order_id: i64,
    order_number: String,
    client_name: Option<String>,
    due_date: DateTime<Utc>,
    #[sqlx(flatten)]
    task: TaskRow,
}

/// Bind the 29 header columns as `$1..$29`, in `orders` column order
fn bind_order<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    order: &'q Order,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    query
        .bind(&order.order_number)
        .bind(order.client_record_id)
        .bind(&order.client_name)
        .bind(order.container_count)
        .bind(&order.goods_type)
        .bind(&order.route)
        .bind(&order.transit_port)
        .bind(&order.document_number)
        .bind(&order.chinese_transport_company)
        .bind(&order.iranian_transport_company)
        .bind(order.status.map(|s| s.as_str()))
        .bind(&order.status_color)
        .bind(order.creation_date)
        .bind(order.loading_date)
        .bind(order.departure_date)
        .bind(order.arrival_iran_date)
        .bind(order.truck_loading_date)
        .bind(order.arrival_turkmenistan_date)
        .bind(order.client_receiving_date)
        .bind(order.arrival_notice_date)
        .bind(order.tkm_date)
        .bind(order.eta_date)
        .bind(order.has_loading_photo)
        .bind(order.has_local_charges)
        .bind(order.has_tex)
        .bind(&order.notes)
        .bind(&order.additional_info)
        .bind(order.client_modified_at)
        .bind(order.is_deleted)
}

fn lock_error(err: sqlx::Error, order_number: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(LOCK_NOT_AVAILABLE) {
            return StoreError::LockTimeout(order_number.to_string());
        }
    }
    StoreError::Database(err)
}

/// Repository over a shared `PgPool`
#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl OrderRepository {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self { pool, lock_timeout_ms }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Open reconciliation transaction holding one pooled connection
pub struct PgSyncTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl SyncTransaction for PgSyncTransaction {
    async fn lock_order_number(&mut self, order_number: &str) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(order_number)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| lock_error(e, order_number))?;
        Ok(())
    }

    async fn find_live_order(&mut self, order_number: &str) -> Result<Option<LiveOrderRef>, StoreError> {
        let row: Option<(i64, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT id, last_modified, client_modified_at
            FROM orders
            WHERE order_number = $1 AND NOT is_deleted
            FOR UPDATE
            "#,
        )
        .bind(order_number)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| lock_error(e, order_number))?;

        Ok(row.map(|(id, last_modified, client_modified_at)| LiveOrderRef {
            id,
            last_modified,
            client_modified_at,
        }))
    }

    async fn insert_order(&mut self, order: &Order) -> Result<(i64, DateTime<Utc>), StoreError> {
        let query = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            INSERT INTO orders (
                order_number, client_record_id, client_name, container_count, goods_type,
                route, transit_port, document_number, chinese_transport_company,
                iranian_transport_company, status, status_color, creation_date, loading_date,
                departure_date, arrival_iran_date, truck_loading_date, arrival_turkmenistan_date,
                client_receiving_date, arrival_notice_date, tkm_date, eta_date, has_loading_photo,
                has_local_charges, has_tex, notes, additional_info, client_modified_at, is_deleted,
                last_modified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                    $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, clock_timestamp())
            RETURNING id, last_modified
            "#,
        );

        let inserted = bind_order(query, order).fetch_one(&mut *self.tx).await?;
        Ok(inserted)
    }

    async fn update_order(&mut self, id: i64, order: &Order) -> Result<DateTime<Utc>, StoreError> {
        let query = sqlx::query_as::<_, (DateTime<Utc>,)>(
            r#"
            UPDATE orders SET
                order_number = $1, client_record_id = $2, client_name = $3, container_count = $4,
                goods_type = $5, route = $6, transit_port = $7, document_number = $8,
                chinese_transport_company = $9, iranian_transport_company = $10, status = $11,
                status_color = $12, creation_date = $13, loading_date = $14, departure_date = $15,
                arrival_iran_date = $16, truck_loading_date = $17, arrival_turkmenistan_date = $18,
                client_receiving_date = $19, arrival_notice_date = $20, tkm_date = $21,
                eta_date = $22, has_loading_photo = $23, has_local_charges = $24, has_tex = $25,
                notes = $26, additional_info = $27, client_modified_at = $28, is_deleted = $29,
                last_modified = GREATEST(clock_timestamp(), last_modified)
            WHERE id = $30
            RETURNING last_modified
            "#,
        );

        let (last_modified,) = bind_order(query, order).bind(id).fetch_one(&mut *self.tx).await?;
        Ok(last_modified)
    }

    async fn delete_children(&mut self, order_id: i64) -> Result<(), StoreError> {
        let containers = sqlx::query("DELETE FROM containers WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;

        let tasks = sqlx::query("DELETE FROM tasks WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *self.tx)
            .await?;

        debug!(
            "🗑️ Order {}: removed {} containers and {} tasks",
            order_id,
            containers.rows_affected(),
            tasks.rows_affected()
        );
        Ok(())
    }

    async fn insert_container(&mut self, order_id: i64, position: i32, container: &Container) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO containers (
                order_id, sort_order, container_number, container_type, weight, volume,
                loading_date, departure_date, arrival_iran_date, truck_loading_date,
                arrival_turkmenistan_date, client_receiving_date, driver_first_name,
                driver_last_name, driver_company, truck_number, driver_iran_phone,
                driver_turkmenistan_phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(order_id)
        .bind(position)
        .bind(&container.container_number)
        .bind(&container.container_type)
        .bind(container.weight)
        .bind(container.volume)
        .bind(container.loading_date)
        .bind(container.departure_date)
        .bind(container.arrival_iran_date)
        .bind(container.truck_loading_date)
        .bind(container.arrival_turkmenistan_date)
        .bind(container.client_receiving_date)
        .bind(&container.driver_first_name)
        .bind(&container.driver_last_name)
        .bind(&container.driver_company)
        .bind(&container.truck_number)
        .bind(&container.driver_iran_phone)
        .bind(&container.driver_turkmenistan_phone)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_task(&mut self, order_id: i64, position: i32, task: &Task) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                order_id, sort_order, description, assigned_to, status, priority, due_date, created_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order_id)
        .bind(position)
        .bind(&task.description)
        .bind(&task.assigned_to)
        .bind(i32::from(task.status))
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.created_date)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderQueries for OrderRepository {
    async fn recent_changes(&self, limit: i64) -> Result<Vec<StoredOrder>, StoreError> {
        let sql = format!(
            "{} WHERE NOT is_deleted ORDER BY last_modified DESC, order_number ASC LIMIT $1",
            ORDER_SELECT
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(StoredOrder::from).collect())
    }

    async fn active_orders(&self) -> Result<Vec<StoredOrder>, StoreError> {
        let sql = format!(
            "{} WHERE NOT is_deleted AND (status IS NULL OR status <> ALL($1)) \
             ORDER BY last_modified DESC, order_number ASC",
            ORDER_SELECT
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(OrderStatus::terminal_names())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(StoredOrder::from).collect())
    }

    async fn find_aggregate(&self, order_number: &str) -> Result<Option<StoredAggregate>, StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let sql = format!("{} WHERE order_number = $1 AND NOT is_deleted", ORDER_SELECT);
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_number)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.commit().await?;
            return Ok(None);
        };

        let containers = sqlx::query_as::<_, Container>(
            r#"
            SELECT container_number, container_type, weight, volume, loading_date, departure_date,
                   arrival_iran_date, truck_loading_date, arrival_turkmenistan_date,
                   client_receiving_date, driver_first_name, driver_last_name, driver_company,
                   truck_number, driver_iran_phone, driver_turkmenistan_phone
            FROM containers
            WHERE order_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *tx)
        .await?;

        let tasks = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT description, assigned_to, status, priority, due_date, created_date
            FROM tasks
            WHERE order_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(row.id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(StoredAggregate {
            header: StoredOrder::from(row),
            containers,
            tasks: tasks.into_iter().map(Task::from).collect(),
        }))
    }

    async fn statistics(&self) -> Result<OrderStatistics, StoreError> {
        let (total_orders, active_orders, total_containers): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(*) FILTER (WHERE status IS NULL OR status <> ALL($1)),
                   COALESCE(SUM(container_count), 0)::BIGINT
            FROM orders
            WHERE NOT is_deleted
            "#,
        )
        .bind(OrderStatus::terminal_names())
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderStatistics {
            total_orders,
            active_orders,
            total_containers,
        })
    }

    async fn overdue_tasks(&self, now: DateTime<Utc>) -> Result<Vec<OverdueTask>, StoreError> {
        let rows = sqlx::query_as::<_, OverdueTaskRow>(
            r#"
            SELECT o.id AS order_id, o.order_number, o.client_name, t.due_date,
                   t.description, t.assigned_to, t.status, t.priority, t.created_date
            FROM tasks t
            JOIN orders o ON o.id = t.order_id
            WHERE NOT o.is_deleted AND t.status <> $1 AND t.due_date < $2
            ORDER BY t.due_date ASC, o.order_number ASC, t.sort_order ASC
            "#,
        )
        .bind(i32::from(TaskStatus::Completed))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| OverdueTask {
                order_id: row.order_id,
                order_number: row.order_number,
                client_name: row.client_name,
                due_date: row.due_date,
                task: Task::from(row.task),
            })
            .collect())
    }
}

#[async_trait]
impl AggregateStore for OrderRepository {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        schema::ensure_schema(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Box<dyn SyncTransaction>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters; the value is an integer from config
        sqlx::query(&format!("SET LOCAL lock_timeout = '{}ms'", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgSyncTransaction { tx }))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
