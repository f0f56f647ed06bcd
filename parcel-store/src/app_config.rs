use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    pub pricing: PricingTable,
    #[serde(default)]
    pub orders: OrdersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Keep orders in process memory instead of Postgres (local runs only)
    #[serde(default)]
    pub in_memory: bool,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: i64,
}

fn default_requests_per_minute() -> i64 { 100 }

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub mock: bool,
    #[serde(default)]
    pub stripe_secret_key: String,
    #[serde(default)]
    pub stripe_webhook_secret: String,
    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,
    #[serde(default)]
    pub paypal_client_id: String,
    #[serde(default)]
    pub paypal_secret: String,
    #[serde(default = "default_paypal_api_base")]
    pub paypal_api_base: String,
    #[serde(default = "default_gateway_timeout")]
    pub gateway_timeout_seconds: u64,
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_seconds: i64,
}

fn default_stripe_api_base() -> String { "https://api.stripe.com".to_string() }
fn default_paypal_api_base() -> String { "https://api-m.sandbox.paypal.com".to_string() }
fn default_gateway_timeout() -> u64 { 15 }
fn default_webhook_tolerance() -> i64 { 300 }

/// Fallback per-package prices in minor units
#[derive(Debug, Deserialize, Clone)]
pub struct PricingTable {
    pub small: i64,
    pub medium: i64,
    pub large: i64,
    pub xlarge: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OrdersConfig {
    #[serde(default = "default_max_create_attempts")]
    pub max_create_attempts: u32,
}

fn default_max_create_attempts() -> u32 { 3 }

impl Default for OrdersConfig {
    fn default() -> Self {
        Self {
            max_create_attempts: default_max_create_attempts(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `PARCEL_PAYMENTS__STRIPE_SECRET_KEY=sk_live_...`
            .add_source(config::Environment::with_prefix("PARCEL").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let s = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 3000

                [database]
                url = "postgres://localhost/parcel"

                [auth]
                jwt_secret = "secret"

                [payments]
                mock = true

                [pricing]
                small = 499
                medium = 699
                large = 899
                xlarge = 1099
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let config: Config = s.try_deserialize().unwrap();
        assert!(config.redis.is_none());
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.payments.gateway_timeout_seconds, 15);
        assert_eq!(config.payments.webhook_tolerance_seconds, 300);
        assert_eq!(config.orders.max_create_attempts, 3);
    }
}
