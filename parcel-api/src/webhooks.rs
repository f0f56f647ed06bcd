use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use parcel_order::WebhookOutcome;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /webhook
///
/// The raw body is needed for signature verification, so it is never parsed
/// as JSON before the engine has checked it.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.engine.handle_payment_webhook(&body, signature).await?;
    if let WebhookOutcome::Reconciled { order_id, payment_status } = outcome {
        tracing::info!("Webhook reconciled order {} to {}", order_id, payment_status.as_str());
    }

    Ok(Json(json!({ "received": true })))
}
