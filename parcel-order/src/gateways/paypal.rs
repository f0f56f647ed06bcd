use async_trait::async_trait;
use parcel_core::{
    GatewayError, GatewayIntent, IntentRequest, PaymentGateway, PaymentMethod, PaymentProvider,
    WebhookEvent,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PaypalConfig {
    pub client_id: String,
    pub secret: String,
    pub api_base: String,
}

/// Redirect processor: a checkout order the customer approves on PayPal
pub struct PaypalGateway {
    client: reqwest::Client,
    config: PaypalConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct CheckoutOrder {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Deserialize)]
struct Link {
    href: String,
    rel: String,
}

impl PaypalGateway {
    pub fn new(config: PaypalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.api_base))
            .basic_auth(&self.config.client_id, Some(&self.config.secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GatewayError::Provider(format!(
                "PayPal authentication failed with HTTP {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        Ok(token.access_token)
    }
}

/// PayPal wants a decimal string in major units
pub fn format_amount(minor_units: i64) -> String {
    let sign = if minor_units < 0 { "-" } else { "" };
    let abs = minor_units.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

fn approval_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|link| link.rel == "approve" || link.rel == "payer-action")
        .map(|link| link.href.clone())
}

#[async_trait]
impl PaymentGateway for PaypalGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paypal
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        if request.method != PaymentMethod::Paypal {
            return Err(GatewayError::UnsupportedPaymentMethod(request.method.to_string()));
        }

        let token = self.access_token().await?;
        let mut unit = json!({
            "amount": {
                "currency_code": request.currency.as_str(),
                "value": format_amount(request.amount),
            }
        });
        if let Some(order_id) = request.order_reference {
            unit["reference_id"] = json!(order_id.to_string());
        }

        let response = self
            .client
            .post(format!("{}/v2/checkout/orders", self.config.api_base))
            .bearer_auth(token)
            .json(&json!({ "intent": "CAPTURE", "purchase_units": [unit] }))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider(format!(
                "PayPal order creation failed with HTTP {}: {}",
                status, detail
            )));
        }

        let order: CheckoutOrder = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        let approval = approval_link(&order.links).ok_or_else(|| {
            GatewayError::MalformedResponse(format!("PayPal order {} has no approval link", order.id))
        })?;
        debug!(payment_id = %order.id, "Created PayPal checkout order");

        Ok(GatewayIntent {
            payment_id: order.id,
            client_reference: Some(approval),
            requires_action: true,
            provider: PaymentProvider::Paypal,
        })
    }

    fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> Result<WebhookEvent, GatewayError> {
        Err(GatewayError::WebhookUnsupported("paypal"))
    }
}
