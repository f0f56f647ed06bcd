use parcel_order::LifecycleEngine;
use parcel_store::RedisClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct RateLimitConfig {
    pub requests_per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    /// Rate limiting is off when Redis is not configured
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}
