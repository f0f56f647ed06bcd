use anyhow::Context;
use parcel_api::{
    app,
    state::{AppState, AuthConfig, RateLimitConfig},
};
use parcel_core::{OrderRepository, PaymentGateway, PaymentProvider, ReceiptRepository};
use parcel_order::gateways::{
    MockPaymentGateway, PaypalConfig, PaypalGateway, StripeConfig, StripeGateway,
};
use parcel_order::{LifecycleEngine, PaymentOrchestrator, PricingPolicy, SizePrices};
use parcel_store::app_config::Config;
use parcel_store::{DbClient, InMemoryStore, PgOrderRepository, PgReceiptRepository, RedisClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "parcel_api=debug,parcel_order=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting parcel API on port {}", config.server.port);

    let (orders, receipts) = repositories(&config).await?;
    let payments = PaymentOrchestrator::new(
        card_gateway(&config),
        redirect_gateway(&config),
    )
    .with_timeout(Duration::from_secs(config.payments.gateway_timeout_seconds));

    let pricing = PricingPolicy::new(SizePrices {
        small: config.pricing.small,
        medium: config.pricing.medium,
        large: config.pricing.large,
        xlarge: config.pricing.xlarge,
    });
    let engine = LifecycleEngine::new(orders, receipts, payments, pricing)
        .with_max_create_attempts(config.orders.max_create_attempts);

    let (redis, requests_per_minute) = match &config.redis {
        Some(redis_config) => {
            let client = RedisClient::new(&redis_config.url)
                .await
                .context("Failed to connect to Redis")?;
            (Some(Arc::new(client)), redis_config.requests_per_minute)
        }
        None => {
            tracing::warn!("Redis not configured, rate limiting disabled");
            (None, 0)
        }
    };

    let app_state = AppState {
        engine: Arc::new(engine),
        redis,
        rate_limit: RateLimitConfig { requests_per_minute },
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn repositories(
    config: &Config,
) -> anyhow::Result<(Arc<dyn OrderRepository>, Arc<dyn ReceiptRepository>)> {
    if config.database.in_memory {
        tracing::warn!("Using in-memory order store, data is lost on restart");
        let store = Arc::new(InMemoryStore::new());
        let orders: Arc<dyn OrderRepository> = store.clone();
        let receipts: Arc<dyn ReceiptRepository> = store;
        return Ok((orders, receipts));
    }

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let orders: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(db.pool.clone()));
    let receipts: Arc<dyn ReceiptRepository> = Arc::new(PgReceiptRepository::new(db.pool));
    Ok((orders, receipts))
}

fn card_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    let payments = &config.payments;
    if payments.mock {
        tracing::warn!("Using mock card gateway");
        return Arc::new(
            MockPaymentGateway::new(PaymentProvider::Stripe)
                .with_webhook_secret(payments.stripe_webhook_secret.clone()),
        );
    }
    Arc::new(StripeGateway::new(StripeConfig {
        secret_key: payments.stripe_secret_key.clone(),
        webhook_secret: payments.stripe_webhook_secret.clone(),
        api_base: payments.stripe_api_base.clone(),
        webhook_tolerance_seconds: payments.webhook_tolerance_seconds,
    }))
}

fn redirect_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    let payments = &config.payments;
    if payments.mock {
        return Arc::new(MockPaymentGateway::new(PaymentProvider::Paypal));
    }
    Arc::new(PaypalGateway::new(PaypalConfig {
        client_id: payments.paypal_client_id.clone(),
        secret: payments.paypal_secret.clone(),
        api_base: payments.paypal_api_base.clone(),
    }))
}
