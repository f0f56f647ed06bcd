use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use parcel_core::{
    Carrier, Currency, OrderStatus, PackageSize, PaymentOption, PaymentProvider, PaymentStatus,
    PickupAddress, ReturnOrder, Schedule,
};
use parcel_order::{
    Actor, ConfirmedOrder, CreatedOrder, OrderRequest, PaymentIntentCreated, PaymentIntentRequest,
    TrackingInfo,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppJson};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResponse {
    pub size: PackageSize,
    pub dimensions: String,
    pub label_attached: bool,
    pub carrier: Carrier,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// Provider prefix, e.g. `stripe`
    pub method: &'static str,
    /// Full logical method id, e.g. `stripe_klarna`
    #[serde(rename = "type")]
    pub method_type: &'static str,
    pub amount: i64,
    pub currency: Currency,
    pub status: PaymentStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: OrderStatus,
    pub pickup_address: PickupAddress,
    pub packages: Vec<PackageResponse>,
    pub schedule: Schedule,
    pub payment: PaymentResponse,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReturnOrder> for OrderResponse {
    fn from(order: ReturnOrder) -> Self {
        Self {
            id: order.id,
            status: order.status,
            pickup_address: order.pickup_address,
            packages: order
                .packages
                .into_iter()
                .map(|p| PackageResponse {
                    size: p.size,
                    dimensions: p.dimensions,
                    label_attached: p.label_attached,
                    carrier: p.carrier,
                })
                .collect(),
            schedule: order.schedule,
            payment: PaymentResponse {
                method: order.payment.method.provider().as_str(),
                method_type: order.payment.method.as_str(),
                amount: order.payment.amount,
                currency: order.payment.currency,
                status: order.payment.status,
            },
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub payment_intent_id: String,
    /// Client secret for card flows, approval link for PayPal
    pub client_secret: Option<String>,
    pub requires_action: bool,
    pub provider: PaymentProvider,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    pub payment: IntentResponse,
}

impl From<CreatedOrder> for CreateOrderResponse {
    fn from(created: CreatedOrder) -> Self {
        Self {
            order: created.order.into(),
            payment: IntentResponse {
                payment_intent_id: created.intent.payment_id,
                client_secret: created.intent.client_reference,
                requires_action: created.intent.requires_action,
                provider: created.intent.provider,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub order_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSummary {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConfirmPaymentResponse {
    pub order: OrderResponse,
    pub receipt: ReceiptSummary,
}

impl From<ConfirmedOrder> for ConfirmPaymentResponse {
    fn from(confirmed: ConfirmedOrder) -> Self {
        Self {
            receipt: ReceiptSummary {
                id: confirmed.receipt.id,
                generated_at: confirmed.receipt.generated_at,
            },
            order: confirmed.order.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

// ============================================================================
// Routes
// ============================================================================

/// Routes that need an authenticated caller
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/payment-intent", post(create_payment_intent))
        .route("/confirm-payment", post(confirm_payment))
        .route("/tracking", get(list_tracking))
        .route("/{id}", get(get_order))
        .route("/{id}/status", patch(update_status))
        .route("/{id}/pay", post(retry_payment))
        .route("/{id}/tracking", get(get_tracking))
}

/// Unknown and malformed ids are both simply not found
fn parse_order_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFoundError(format!("Order {} not found", raw)))
}

/// GET /payment-options
pub async fn payment_options(State(state): State<AppState>) -> Json<Vec<PaymentOption>> {
    Json(state.engine.payment_options())
}

/// POST /payment-intent
async fn create_payment_intent(
    State(state): State<AppState>,
    AppJson(payload): AppJson<PaymentIntentRequest>,
) -> Result<Json<PaymentIntentCreated>, AppError> {
    let created = state.engine.create_payment_intent(payload).await?;
    Ok(Json(created))
}

/// POST /confirm-payment
async fn confirm_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(payload): AppJson<ConfirmPaymentRequest>,
) -> Result<(StatusCode, Json<ConfirmPaymentResponse>), AppError> {
    let confirmed = state
        .engine
        .confirm_payment_and_create_order(
            &actor.user_id,
            payload.payment_intent_id.as_deref(),
            payload.order_data,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(confirmed.into())))
}

/// POST /
async fn create_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppJson(payload): AppJson<OrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let created = state.engine.create_order(&actor.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /
async fn list_orders(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state.engine.list_orders(&actor).await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /{id}
async fn get_order(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.engine.get_order(&actor, parse_order_id(&id)?).await?;
    Ok(Json(order.into()))
}

/// PATCH /{id}/status
async fn update_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let order_id = parse_order_id(&id)?;
    let target: OrderStatus = payload
        .status
        .parse()
        .map_err(|e: parcel_core::CoreError| AppError::ValidationError(e.to_string()))?;

    let order = state
        .engine
        .transition(&actor, order_id, target, payload.notes)
        .await?;
    Ok(Json(order.into()))
}

/// POST /{id}/pay
async fn retry_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let created = state.engine.retry_payment(&actor, parse_order_id(&id)?).await?;
    Ok(Json(created.into()))
}

/// GET /tracking
async fn list_tracking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Vec<TrackingInfo>>, AppError> {
    Ok(Json(state.engine.tracking_list(&actor).await?))
}

/// GET /{id}/tracking, by order id or order number
async fn get_tracking(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(identifier): Path<String>,
) -> Result<Json<TrackingInfo>, AppError> {
    Ok(Json(state.engine.tracking(&actor, &identifier).await?))
}
