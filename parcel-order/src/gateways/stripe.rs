use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use parcel_core::{
    GatewayError, GatewayIntent, IntentRequest, PaymentGateway, PaymentMethod, PaymentProvider,
    WebhookEvent, WebhookEventKind,
};
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub webhook_tolerance_seconds: i64,
}

/// Card processor: card, Klarna and Google Pay all become a PaymentIntent
pub struct StripeGateway {
    client: reqwest::Client,
    config: StripeConfig,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
    status: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: StripeApiError,
}

#[derive(Deserialize)]
struct StripeApiError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

/// Google Pay is tokenized into a plain card charge
fn method_type(method: PaymentMethod) -> Result<&'static str, GatewayError> {
    match method {
        PaymentMethod::StripeCard | PaymentMethod::StripeGooglePay => Ok("card"),
        PaymentMethod::StripeKlarna => Ok("klarna"),
        other => Err(GatewayError::UnsupportedPaymentMethod(other.to_string())),
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError> {
        let method_type = method_type(request.method)?;

        let mut form = vec![
            ("amount", request.amount.to_string()),
            ("currency", request.currency.as_str().to_ascii_lowercase()),
            ("payment_method_types[]", method_type.to_string()),
            ("metadata[payment_method]", request.method.to_string()),
        ];
        if let Some(order_id) = request.order_reference {
            form.push(("metadata[order_id]", order_id.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorEnvelope = response
                .json()
                .await
                .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
            let message = body
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(match body.error.kind.as_deref() {
                Some("card_error") => GatewayError::Declined(message),
                _ => GatewayError::Provider(message),
            });
        }

        let intent: IntentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;
        debug!(payment_id = %intent.id, status = %intent.status, "Created Stripe payment intent");

        Ok(GatewayIntent {
            requires_action: awaits_client(&intent.status),
            payment_id: intent.id,
            client_reference: intent.client_secret,
            provider: PaymentProvider::Stripe,
        })
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, GatewayError> {
        verify_signature(
            payload,
            signature,
            &self.config.webhook_secret,
            self.config.webhook_tolerance_seconds,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}

/// Until the client confirms with the secret, a fresh intent sits in
/// `requires_payment_method`, `requires_confirmation` or `requires_action`.
fn awaits_client(status: &str) -> bool {
    !matches!(status, "succeeded" | "processing")
}

/// Check a `t=<unix>,v1=<hex hmac>` header against the raw body.
///
/// Any `v1` entry may match; the timestamp must be within `tolerance` of `now`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: i64,
    now: i64,
) -> Result<(), GatewayError> {
    if secret.is_empty() {
        return Err(GatewayError::InvalidSignature(
            "webhook secret is not configured".to_string(),
        ));
    }

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => candidates.push(sig),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| GatewayError::InvalidSignature("missing timestamp".to_string()))?;
    if candidates.is_empty() {
        return Err(GatewayError::InvalidSignature("missing v1 signature".to_string()));
    }
    if (now - timestamp).abs() > tolerance {
        return Err(GatewayError::InvalidSignature(
            "timestamp outside the tolerance window".to_string(),
        ));
    }

    let matched = candidates.iter().any(|candidate| {
        let Ok(expected) = hex::decode(candidate) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&expected).is_ok()
    });

    if matched {
        Ok(())
    } else {
        Err(GatewayError::InvalidSignature(
            "no signature matches the payload".to_string(),
        ))
    }
}

/// Produce a header `verify_signature` accepts. Used by local tooling and tests.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes())))
}

#[derive(Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    data: Option<EventData>,
}

#[derive(Deserialize)]
struct EventData {
    object: EventObject,
}

#[derive(Deserialize)]
struct EventObject {
    id: Option<String>,
}

pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, GatewayError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| GatewayError::MalformedResponse(format!("webhook body: {}", e)))?;

    Ok(WebhookEvent {
        id: envelope.id,
        kind: WebhookEventKind::from_type(&envelope.kind),
        payment_intent_id: envelope.data.and_then(|d| d.object.id),
    })
}
