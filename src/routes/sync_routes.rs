use axum::{
    extract::{rejection::JsonRejection, State},
    middleware,
    routing::post,
    Json, Router,
};

use crate::dto::{ApiResponse, SyncOrderRequest};
use crate::middleware::require_api_key;
use crate::services::ReconcileOutcome;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_sync_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/order", post(sync_order))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

async fn sync_order(
    State(state): State<AppState>,
    payload: Result<Json<SyncOrderRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<ReconcileOutcome>>, AppError> {
    let Json(request) = payload.map_err(|rejection| AppError::Validation {
        message: rejection.body_text(),
        details: None,
    })?;

    let outcome = state.reconciler.reconcile(request).await?;

    let verb = if outcome.deleted {
        "deleted"
    } else if outcome.created {
        "created"
    } else {
        "updated"
    };
    let message = format!("Order {} {}", outcome.order_number, verb);

    Ok(Json(ApiResponse::success_with_message(outcome, message)))
}
