//! Schema manager
//!
//! Idempotent DDL for the `orders`, `containers` and `tasks` tables. Runs at
//! every start under a transaction-scoped advisory lock so that two instances
//! starting together do not race on `CREATE TABLE IF NOT EXISTS`.

use sqlx::PgPool;
use tracing::{debug, info};

/// Advisory lock key reserved for schema changes
const SCHEMA_LOCK_KEY: i64 = 0x6f72_6465_7273;

pub const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        order_number VARCHAR(50) NOT NULL,
        client_record_id BIGINT,
        client_name VARCHAR(200),
        container_count INT,
        goods_type VARCHAR(100),
        route VARCHAR(200),
        transit_port VARCHAR(100),
        document_number VARCHAR(100),
        chinese_transport_company VARCHAR(200),
        iranian_transport_company VARCHAR(200),
        status VARCHAR(50),
        status_color VARCHAR(20),
        creation_date TIMESTAMPTZ,
        loading_date TIMESTAMPTZ,
        departure_date TIMESTAMPTZ,
        arrival_iran_date TIMESTAMPTZ,
        truck_loading_date TIMESTAMPTZ,
        arrival_turkmenistan_date TIMESTAMPTZ,
        client_receiving_date TIMESTAMPTZ,
        arrival_notice_date TIMESTAMPTZ,
        tkm_date TIMESTAMPTZ,
        eta_date TIMESTAMPTZ,
        has_loading_photo BOOLEAN,
        has_local_charges BOOLEAN,
        has_tex BOOLEAN,
        notes TEXT,
        additional_info TEXT,
        client_modified_at TIMESTAMPTZ,
        last_modified TIMESTAMPTZ NOT NULL DEFAULT now(),
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    // One live row per business key; soft-deleted rows keep their number
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS orders_live_order_number_idx
        ON orders (order_number) WHERE NOT is_deleted
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS orders_last_modified_idx
        ON orders (last_modified DESC, order_number)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS containers (
        id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        sort_order INT NOT NULL,
        container_number VARCHAR(50),
        container_type VARCHAR(50),
        weight NUMERIC,
        volume NUMERIC,
        loading_date TIMESTAMPTZ,
        departure_date TIMESTAMPTZ,
        arrival_iran_date TIMESTAMPTZ,
        truck_loading_date TIMESTAMPTZ,
        arrival_turkmenistan_date TIMESTAMPTZ,
        client_receiving_date TIMESTAMPTZ,
        driver_first_name VARCHAR(100),
        driver_last_name VARCHAR(100),
        driver_company VARCHAR(200),
        truck_number VARCHAR(50),
        driver_iran_phone VARCHAR(50),
        driver_turkmenistan_phone VARCHAR(50)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS containers_order_id_idx
        ON containers (order_id, sort_order)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id BIGINT GENERATED BY DEFAULT AS IDENTITY PRIMARY KEY,
        order_id BIGINT NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        sort_order INT NOT NULL,
        description VARCHAR(500) NOT NULL,
        assigned_to VARCHAR(100),
        status INT NOT NULL DEFAULT 0 CHECK (status BETWEEN 0 AND 2),
        priority INT,
        due_date TIMESTAMPTZ,
        created_date TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS tasks_order_id_idx
        ON tasks (order_id, sort_order)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS tasks_open_due_date_idx
        ON tasks (due_date) WHERE status <> 2
    "#,
];

/// Create tables and indexes if absent
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SCHEMA_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    for statement in SCHEMA_STATEMENTS {
        debug!("📐 {}", statement.split_whitespace().take(6).collect::<Vec<_>>().join(" "));
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    info!("✅ Tables ensured: orders, containers, tasks");
    Ok(())
}
