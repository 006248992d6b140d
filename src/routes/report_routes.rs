use axum::{
    extract::{Path, Query, State},
    middleware,
    routing::get,
    Json, Router,
};

use crate::dto::{ApiResponse, ListResponse, RecentChangesQuery};
use crate::middleware::require_api_key_for_reports;
use crate::models::{OrderStatistics, OverdueTask, StoredAggregate, StoredOrder};
use crate::state::AppState;
use crate::utils::errors::{not_found_error, AppError};

pub fn create_report_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(recent_changes))
        .route("/active", get(active_orders))
        .route("/orders/:order_number", get(get_order))
        .route("/stats", get(statistics))
        .route("/tasks/overdue", get(overdue_tasks))
        .route_layer(middleware::from_fn_with_state(state, require_api_key_for_reports))
}

async fn recent_changes(
    State(state): State<AppState>,
    Query(query): Query<RecentChangesQuery>,
) -> Result<Json<ApiResponse<ListResponse<StoredOrder>>>, AppError> {
    let orders = state.reports.recent_changes(query.limit).await?;
    Ok(Json(ApiResponse::success(orders.into())))
}

async fn active_orders(State(state): State<AppState>) -> Result<Json<ApiResponse<ListResponse<StoredOrder>>>, AppError> {
    let orders = state.reports.active_orders().await?;
    Ok(Json(ApiResponse::success(orders.into())))
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<StoredAggregate>>, AppError> {
    let aggregate = state
        .reports
        .find_order(&order_number)
        .await?
        .ok_or_else(|| not_found_error("Order", &order_number))?;
    Ok(Json(ApiResponse::success(aggregate)))
}

async fn statistics(State(state): State<AppState>) -> Result<Json<ApiResponse<OrderStatistics>>, AppError> {
    let stats = state.reports.statistics().await?;
    Ok(Json(ApiResponse::success(stats)))
}

async fn overdue_tasks(State(state): State<AppState>) -> Result<Json<ApiResponse<ListResponse<OverdueTask>>>, AppError> {
    let tasks = state.reports.overdue_tasks().await?;
    Ok(Json(ApiResponse::success(tasks.into())))
}
