use async_trait::async_trait;
use chrono::Utc;
use parcel_core::{
    GatewayError, GatewayIntent, IntentRequest, PaymentGateway, PaymentProvider, WebhookEvent,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use super::stripe;

/// In-process gateway for local runs and tests.
///
/// Failure, decline and latency can be switched on to exercise the
/// engine's error paths. Webhooks use the Stripe header format.
pub struct MockPaymentGateway {
    provider: PaymentProvider,
    webhook_secret: String,
    delay: Option<Duration>,
    failing: AtomicBool,
    declining: AtomicBool,
    calls: AtomicUsize,
}

impl MockPaymentGateway {
    pub fn new(provider: PaymentProvider) -> Self {
        Self {
            provider,
            webhook_secret: String::new(),
            delay: None,
            failing: AtomicBool::new(false),
            declining: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = secret.into();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_declining(&self, declining: bool) {
        self.declining.store(declining, Ordering::SeqCst);
    }

    /// Number of intent creations attempted so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn provider(&self) -> PaymentProvider {
        self.provider
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("Simulated payment gateway failure".to_string()));
        }
        if self.declining.load(Ordering::SeqCst) {
            return Err(GatewayError::Declined("Your card was declined.".to_string()));
        }

        let token = Uuid::new_v4().simple();
        let intent = match self.provider {
            PaymentProvider::Stripe => GatewayIntent {
                payment_id: format!("mock_pi_{}", token),
                client_reference: Some(format!("mock_pi_{}_secret_{}", token, request.amount)),
                requires_action: true,
                provider: PaymentProvider::Stripe,
            },
            PaymentProvider::Paypal => GatewayIntent {
                payment_id: format!("MOCK-{}", token),
                client_reference: Some(format!(
                    "https://www.sandbox.paypal.com/checkoutnow?token=MOCK-{}",
                    token
                )),
                requires_action: true,
                provider: PaymentProvider::Paypal,
            },
        };
        Ok(intent)
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, GatewayError> {
        if self.provider == PaymentProvider::Paypal {
            return Err(GatewayError::WebhookUnsupported("paypal"));
        }
        stripe::verify_signature(payload, signature, &self.webhook_secret, 300, Utc::now().timestamp())?;
        stripe::parse_event(payload)
    }
}
