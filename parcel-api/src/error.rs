use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parcel_core::GatewayError;
use parcel_order::EngineError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    AuthorizationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    PaymentRequired(String),
    #[error("{0}")]
    InternalServerError(String),
    /// Body could not be read as the expected JSON; keeps the rejection's status
    #[error("{1}")]
    InvalidBody(StatusCode, String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidBody(rejection.status(), rejection.body_text())
    }
}

/// `Json` extractor whose rejections render as `{"error": ...}`
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::InvalidBody(status, msg) => (status, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::MissingFields(_)
            | EngineError::Validation(_)
            | EngineError::UnsupportedPaymentMethod(_)
            | EngineError::AmountNotAllowed
            | EngineError::MissingPaymentReference
            | EngineError::MissingOrderData(_)
            | EngineError::MissingCancellationReason
            | EngineError::InvalidTransition { .. }
            | EngineError::InvalidWebhookSignature(_) => AppError::ValidationError(message),
            EngineError::NotFound(_) => AppError::NotFoundError(message),
            EngineError::Forbidden(_) => AppError::AuthorizationError(message),
            EngineError::StatusConflict { .. } | EngineError::PaymentAlreadyInitiated(_) => {
                AppError::ConflictError(message)
            }
            EngineError::PaymentGateway { source, .. } => match source {
                GatewayError::Declined(reason) => AppError::PaymentRequired(reason),
                GatewayError::UnsupportedPaymentMethod(_) => AppError::ValidationError(message),
                _ => AppError::InternalServerError(message),
            },
            EngineError::OrderCreationFailed { .. } | EngineError::Repository(_) => {
                AppError::InternalServerError(message)
            }
        }
    }
}
