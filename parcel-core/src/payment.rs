use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Eur,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Eur => "EUR",
            Currency::Usd => "USD",
        }
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EUR" => Ok(Currency::Eur),
            "USD" => Ok(Currency::Usd),
            other => Err(CoreError::ValidationError(format!(
                "Unsupported currency: {}. Allowed: USD, EUR",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    RequiresAction,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Money has moved; later processor events must not overwrite it
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded)
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "requires_action" => Ok(PaymentStatus::RequiresAction),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(CoreError::ValidationError(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// The external processor a logical payment method is routed to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Paypal,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paypal => "paypal",
        }
    }
}

/// Logical payment method as chosen by the customer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    StripeCard,
    StripeKlarna,
    StripeGooglePay,
    Paypal,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::StripeCard,
        PaymentMethod::StripeKlarna,
        PaymentMethod::StripeGooglePay,
        PaymentMethod::Paypal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::StripeCard => "stripe_card",
            PaymentMethod::StripeKlarna => "stripe_klarna",
            PaymentMethod::StripeGooglePay => "stripe_google_pay",
            PaymentMethod::Paypal => "paypal",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PaymentMethod::StripeCard => "Credit/Debit Card",
            PaymentMethod::StripeKlarna => "Klarna",
            PaymentMethod::StripeGooglePay => "Google Pay",
            PaymentMethod::Paypal => "PayPal",
        }
    }

    pub fn provider(&self) -> PaymentProvider {
        match self {
            PaymentMethod::Paypal => PaymentProvider::Paypal,
            _ => PaymentProvider::Stripe,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| GatewayError::UnsupportedPaymentMethod(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PaymentOption {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
}

/// Static catalogue of the payment methods the service accepts
pub fn payment_options() -> Vec<PaymentOption> {
    PaymentMethod::ALL
        .iter()
        .map(|method| PaymentOption {
            id: method.as_str(),
            name: method.display_name(),
            provider: method.provider().as_str(),
        })
        .collect()
}

/// A logical request for exactly one external payment-intent creation
#[derive(Debug, Clone, PartialEq)]
pub struct IntentRequest {
    /// Amount in minor units
    pub amount: i64,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub order_reference: Option<Uuid>,
}

/// What a gateway hands back after creating an intent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayIntent {
    /// Provider's ID (e.g., pi_123 or a PayPal order id)
    pub payment_id: String,
    /// Client secret for card flows, approval link for redirect flows
    pub client_reference: Option<String>,
    pub requires_action: bool,
    pub provider: PaymentProvider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentSucceeded,
    PaymentFailed,
    Other(String),
}

impl WebhookEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => WebhookEventKind::PaymentSucceeded,
            "payment_intent.payment_failed" => WebhookEventKind::PaymentFailed,
            other => WebhookEventKind::Other(other.to_string()),
        }
    }
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: WebhookEventKind,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    #[error("Payment gateway transport error: {0}")]
    Transport(String),

    #[error("Payment provider rejected the request: {0}")]
    Provider(String),

    #[error("Payment declined: {0}")]
    Declined(String),

    #[error("Payment gateway did not answer within {0} seconds")]
    Timeout(u64),

    #[error("Malformed payment gateway response: {0}")]
    MalformedResponse(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Webhooks are not supported by the {0} gateway")]
    WebhookUnsupported(&'static str),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    /// Create a payment intent with the provider
    async fn create_intent(&self, request: &IntentRequest) -> Result<GatewayIntent, GatewayError>;

    /// Verify a webhook signature over the raw body and parse the event
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, GatewayError>;
}
