use parcel_core::{
    GatewayError, GatewayIntent, IntentRequest, PaymentGateway, PaymentProvider, WebhookEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);

/// Routes each logical payment method to its processor and bounds every call.
pub struct PaymentOrchestrator {
    card: Arc<dyn PaymentGateway>,
    redirect: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl PaymentOrchestrator {
    pub fn new(card: Arc<dyn PaymentGateway>, redirect: Arc<dyn PaymentGateway>) -> Self {
        Self {
            card,
            redirect,
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn gateway_for(&self, provider: PaymentProvider) -> &Arc<dyn PaymentGateway> {
        match provider {
            PaymentProvider::Stripe => &self.card,
            PaymentProvider::Paypal => &self.redirect,
        }
    }

    /// Exactly one intent creation against the routed provider.
    ///
    /// Expiry of the timeout is reported as `GatewayError::Timeout`; nothing is retried here.
    pub async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        let gateway = self.gateway_for(request.method.provider());

        match tokio::time::timeout(self.timeout, gateway.create_intent(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    provider = gateway.provider().as_str(),
                    timeout_secs = self.timeout.as_secs(),
                    "Payment gateway call timed out"
                );
                Err(GatewayError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// Webhooks arrive from the card processor only
    pub fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, GatewayError> {
        self.card.verify_webhook(payload, signature)
    }
}
