use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use parcel_api::middleware::Claims;
use parcel_api::state::{AppState, AuthConfig, RateLimitConfig};
use parcel_api::{app, ORDERS_PREFIX};
use parcel_core::PaymentProvider;
use parcel_order::gateways::{stripe, MockPaymentGateway};
use parcel_order::{LifecycleEngine, PaymentOrchestrator, PricingPolicy};
use parcel_store::InMemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const JWT_SECRET: &str = "test-secret";
const WEBHOOK_SECRET: &str = "whsec_api_test";

struct TestApp {
    router: Router,
    card: Arc<MockPaymentGateway>,
}

fn test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let card = Arc::new(
        MockPaymentGateway::new(PaymentProvider::Stripe).with_webhook_secret(WEBHOOK_SECRET),
    );
    let redirect = Arc::new(MockPaymentGateway::new(PaymentProvider::Paypal));
    let engine = LifecycleEngine::new(
        store.clone(),
        store,
        PaymentOrchestrator::new(card.clone(), redirect),
        PricingPolicy::default(),
    );

    let state = AppState {
        engine: Arc::new(engine),
        redis: None,
        rate_limit: RateLimitConfig {
            requests_per_minute: 100,
        },
        auth: AuthConfig {
            secret: JWT_SECRET.to_string(),
        },
    };

    TestApp {
        router: app(state),
        card,
    }
}

fn token(sub: &str, role: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("{}{}", ORDERS_PREFIX, path));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn order_body() -> Value {
    json!({
        "pickupAddress": { "building": "Hauptstrasse 12", "floor": "3", "contactPhone": "+43 660 1234567" },
        "packages": [
            { "size": "small", "dimensions": "10x10x10", "carrier": "DHL", "labelAttached": true }
        ],
        "schedule": { "date": "2030-05-01", "timeWindow": { "start": "09:00", "end": "12:00" } },
        "paymentMethod": "stripe_card"
    })
}

async fn create_order(app: &TestApp, token: &str) -> Value {
    let (status, body) = send(
        &app.router,
        request(Method::POST, "", Some(token), Some(order_body())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = test_app();
    let (status, _) = send(&app.router, request(Method::POST, "", None, Some(order_body()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app.router, request(Method::GET, "", Some("not-a-jwt"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_order_response_shape() {
    let app = test_app();
    let token = token("customer-1", "CUSTOMER");
    let body = create_order(&app, &token).await;

    let order = &body["order"];
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment"]["method"], "stripe");
    assert_eq!(order["payment"]["type"], "stripe_card");
    assert_eq!(order["payment"]["amount"], 499);
    assert_eq!(order["payment"]["currency"], "EUR");
    assert_eq!(order["payment"]["status"], "requires_action");
    assert_eq!(order["packages"][0]["carrier"], "DHL");
    assert!(order["packages"][0].get("price").is_none());
    assert_eq!(order["schedule"]["timeWindow"]["start"], "09:00");
    assert!(body["payment"]["paymentIntentId"].as_str().unwrap().starts_with("mock_pi_"));
    assert!(body["payment"]["clientSecret"].is_string());
}

#[tokio::test]
async fn test_status_updates_follow_transition_table() {
    let app = test_app();
    let token = token("customer-1", "CUSTOMER");
    let id = create_order(&app, &token).await["order"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, body) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/{}/status", id),
            Some(&token),
            Some(json!({ "status": "picked_up" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid status transition"));

    let (status, body) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/{}/status", id),
            Some(&token),
            Some(json!({ "status": "scheduled" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "scheduled");

    let (status, _) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/{}/status", id),
            Some(&token),
            Some(json!({ "status": "teleported" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_foreign_and_unknown_orders() {
    let app = test_app();
    let owner = token("customer-1", "CUSTOMER");
    let stranger = token("customer-2", "CUSTOMER");
    let id = create_order(&app, &owner).await["order"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = send(&app.router, request(Method::GET, &format!("/{}", id), Some(&stranger), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app.router, request(Method::GET, "/not-a-uuid", Some(&owner), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let agent = token("agent-1", "AGENT");
    let (status, body) = send(
        &app.router,
        request(
            Method::PATCH,
            &format!("/{}/status", id),
            Some(&agent),
            Some(json!({ "status": "cancelled", "notes": "Duplicate booking" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}

#[tokio::test]
async fn test_client_amount_and_bad_payloads() {
    let app = test_app();
    let token = token("customer-1", "CUSTOMER");

    let mut body = order_body();
    body["amount"] = json!(1);
    let (status, _) = send(&app.router, request(Method::POST, "", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = order_body();
    body["packages"][0]["carrier"] = json!("FedEx");
    let (status, error) = send(&app.router, request(Method::POST, "", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error["error"].as_str().unwrap().contains("carrier"));

    let malformed = Request::builder()
        .method(Method::POST)
        .uri(ORDERS_PREFIX)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"packages\": ["))
        .unwrap();
    let (status, error) = send(&app.router, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error["error"].is_string());

    let mut body = order_body();
    body["paymentMethod"] = json!("bitcoin");
    let (status, _) = send(&app.router, request(Method::POST, "", Some(&token), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_declined_payment_is_402() {
    let app = test_app();
    let token = token("customer-1", "CUSTOMER");
    app.card.set_declining(true);

    let (status, _) = send(
        &app.router,
        request(Method::POST, "", Some(&token), Some(order_body())),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    // The order survives and can be paid once the card works
    let (_, orders) = send(&app.router, request(Method::GET, "", Some(&token), None)).await;
    let id = orders[0]["id"].as_str().unwrap().to_string();
    app.card.set_declining(false);

    let (status, body) = send(
        &app.router,
        request(Method::POST, &format!("/{}/pay", id), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["id"], id.as_str());
}

#[tokio::test]
async fn test_pay_first_flow() {
    let app = test_app();
    let token = token("customer-1", "CUSTOMER");

    let (status, intent) = send(
        &app.router,
        request(
            Method::POST,
            "/payment-intent",
            Some(&token),
            Some(json!({ "packages": order_body()["packages"], "paymentMethod": "stripe_klarna", "currency": "USD" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(intent["amount"], 499);
    assert_eq!(intent["currency"], "USD");
    let intent_id = intent["paymentIntentId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        request(
            Method::POST,
            "/confirm-payment",
            Some(&token),
            Some(json!({ "paymentIntentId": intent_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Order data"));

    let (status, body) = send(
        &app.router,
        request(
            Method::POST,
            "/confirm-payment",
            Some(&token),
            Some(json!({ "paymentIntentId": intent_id, "orderData": order_body() })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["order"]["status"], "pending");
    let receipt_id = body["receipt"]["id"].as_str().unwrap().to_string();

    let (status, receipts) = send(&app.router, request(Method::GET, "/receipts", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipts.as_array().unwrap().len(), 1);
    assert_eq!(receipts[0]["id"], receipt_id.as_str());
    assert_eq!(receipts[0]["amount"], 499);

    let (status, receipt) = send(
        &app.router,
        request(Method::GET, &format!("/receipts/{}", receipt_id), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["status"], "pending");
}

#[tokio::test]
async fn test_tracking_by_order_number() {
    let app = test_app();
    let token = token("customer-1", "CUSTOMER");
    create_order(&app, &token).await;

    let (status, list) = send(&app.router, request(Method::GET, "/tracking", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    let number = list[0]["orderNumber"].as_str().unwrap().to_string();

    let (status, tracking) = send(
        &app.router,
        request(Method::GET, &format!("/{}/tracking", number), Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracking["status"]["current"], "Pending Approval");
    assert_eq!(tracking["pickupAddress"], "Hauptstrasse 12, Floor 3");
    assert_eq!(tracking["pickupPIN"].as_str().unwrap().len(), 4);
}

#[tokio::test]
async fn test_payment_options_are_public() {
    let app = test_app();
    let (status, body) = send(&app.router, request(Method::GET, "/payment-options", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 4);
    assert_eq!(body[2]["name"], "Google Pay");
}

#[tokio::test]
async fn test_webhook_signature_is_enforced() {
    let app = test_app();
    let token = token("customer-1", "CUSTOMER");
    let created = create_order(&app, &token).await;
    let intent_id = created["payment"]["paymentIntentId"].as_str().unwrap();

    let payload = json!({
        "id": "evt_1",
        "type": "payment_intent.succeeded",
        "data": { "object": { "id": intent_id } }
    })
    .to_string();

    let bad = Request::builder()
        .method(Method::POST)
        .uri(format!("{}/webhook", ORDERS_PREFIX))
        .header("stripe-signature", "t=1,v1=abc")
        .body(Body::from(payload.clone()))
        .unwrap();
    let (status, _) = send(&app.router, bad).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let signature = stripe::sign_payload(payload.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
    let good = Request::builder()
        .method(Method::POST)
        .uri(format!("{}/webhook", ORDERS_PREFIX))
        .header("stripe-signature", signature)
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = send(&app.router, good).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "received": true }));

    let (_, orders) = send(&app.router, request(Method::GET, "", Some(&token), None)).await;
    assert_eq!(orders[0]["payment"]["status"], "completed");
    assert_eq!(orders[0]["status"], "pending");
}
