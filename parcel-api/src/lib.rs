use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod middleware;
pub mod orders;
pub mod receipts;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub const ORDERS_PREFIX: &str = "/api/orders";

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    let protected = Router::new()
        .merge(orders::routes())
        .merge(receipts::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Webhooks authenticate by signature, not by bearer token
    let public = Router::new()
        .route("/payment-options", get(orders::payment_options))
        .route("/webhook", post(webhooks::handle_payment_webhook));

    Router::new()
        .nest(ORDERS_PREFIX, protected.merge(public))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .with_state(state)
}
