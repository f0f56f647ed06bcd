use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use parcel_order::{Actor, ReceiptView};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/receipts", get(list_receipts))
        .route("/receipts/{id}", get(get_receipt))
}

/// GET /receipts, newest first
async fn list_receipts(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<ReceiptView>>, AppError> {
    Ok(Json(state.engine.list_receipts(&actor).await?))
}

/// GET /receipts/{id}
async fn get_receipt(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<ReceiptView>, AppError> {
    let receipt_id = Uuid::parse_str(&id)
        .map_err(|_| AppError::NotFoundError(format!("Receipt {} not found", id)))?;
    Ok(Json(state.engine.get_receipt(&actor, receipt_id).await?))
}
