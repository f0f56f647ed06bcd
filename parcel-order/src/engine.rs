use chrono::Utc;
use parcel_core::{
    Currency, GatewayError, GatewayIntent, IntentRequest, OrderMetadata, OrderRepository,
    OrderStatus, PackageSpec, PaymentInfo, PaymentMethod, PaymentOption, PaymentProvider,
    PaymentStatus, Receipt, ReceiptRepository, RepositoryError, ReturnOrder, StatusHistoryEntry,
    UniqueField, WebhookEventKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::access::Actor;
use crate::identifiers::{IdentifierGenerator, RandomIdentifiers};
use crate::lifecycle::{self, TransitionError};
use crate::orchestrator::PaymentOrchestrator;
use crate::pricing::PricingPolicy;
use crate::tracking::{ReceiptView, TrackingInfo};
use crate::validation::{self, OrderRequest, ValidatedOrder, ValidationError};

pub const DEFAULT_MAX_CREATE_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    #[error("Amount is computed by the server and must not be supplied")]
    AmountNotAllowed,

    #[error("Payment intent id is required")]
    MissingPaymentReference,

    #[error("Order data is missing or invalid: {0}")]
    MissingOrderData(String),

    #[error("A reason is required to cancel an order")]
    MissingCancellationReason,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not allowed to access order {0}")]
    Forbidden(Uuid),

    #[error("Order {order_id} changed concurrently: expected {expected}, found {actual}")]
    StatusConflict {
        order_id: Uuid,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("Payment for order {0} has already been initiated")]
    PaymentAlreadyInitiated(String),

    #[error("Order could not be created after {attempts} attempts")]
    OrderCreationFailed { attempts: u32 },

    #[error("{context}: {source}")]
    PaymentGateway {
        context: String,
        #[source]
        source: GatewayError,
    },

    #[error("Invalid webhook signature: {0}")]
    InvalidWebhookSignature(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::MissingFields(fields) => EngineError::MissingFields(fields),
            ValidationError::Invalid(message) => EngineError::Validation(message),
            ValidationError::UnsupportedPaymentMethod(method) => {
                EngineError::UnsupportedPaymentMethod(method)
            }
            ValidationError::AmountNotAllowed => EngineError::AmountNotAllowed,
        }
    }
}

impl From<TransitionError> for EngineError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, to } => {
                EngineError::InvalidTransition { from, to }
            }
            TransitionError::MissingCancellationReason => EngineError::MissingCancellationReason,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Body of a pay-first intent request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    #[serde(default)]
    pub packages: Option<Vec<PackageSpec>>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentCreated {
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: Currency,
    pub payment_intent_id: String,
    pub provider: PaymentProvider,
    pub requires_action: bool,
}

/// An order persisted together with the intent that will pay for it
#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order: ReturnOrder,
    pub intent: GatewayIntent,
}

#[derive(Debug, Clone)]
pub struct ConfirmedOrder {
    pub order: ReturnOrder,
    pub receipt: Receipt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Reconciled {
        order_id: Uuid,
        payment_status: PaymentStatus,
    },
    Unmatched,
    Ignored,
}

/// Owns the order state machine and every write to an order.
pub struct LifecycleEngine {
    orders: Arc<dyn OrderRepository>,
    receipts: Arc<dyn ReceiptRepository>,
    payments: PaymentOrchestrator,
    pricing: PricingPolicy,
    identifiers: Arc<dyn IdentifierGenerator>,
    max_create_attempts: u32,
}

impl LifecycleEngine {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        receipts: Arc<dyn ReceiptRepository>,
        payments: PaymentOrchestrator,
        pricing: PricingPolicy,
    ) -> Self {
        Self {
            orders,
            receipts,
            payments,
            pricing,
            identifiers: Arc::new(RandomIdentifiers),
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
        }
    }

    pub fn with_identifiers(mut self, identifiers: Arc<dyn IdentifierGenerator>) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn with_max_create_attempts(mut self, attempts: u32) -> Self {
        self.max_create_attempts = attempts.max(1);
        self
    }

    pub fn payment_options(&self) -> Vec<PaymentOption> {
        parcel_core::payment::payment_options()
    }

    /// Price the packages and open an intent. Nothing is persisted.
    pub async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> EngineResult<PaymentIntentCreated> {
        if request.amount.is_some() {
            return Err(EngineError::AmountNotAllowed);
        }

        let mut missing = Vec::new();
        let packages = request.packages.unwrap_or_default();
        if packages.is_empty() {
            missing.push("packages");
        }
        let method = request.payment_method.unwrap_or_default();
        if method.is_empty() {
            missing.push("paymentMethod");
        }
        if !missing.is_empty() {
            return Err(EngineError::MissingFields(missing));
        }

        let method = validation::parse_method(&method)?;
        let currency = validation::parse_currency(request.currency.as_deref())?;
        validation::validate_packages(&packages)?;

        let amount = self.pricing.price(&packages);
        let intent = self
            .payments
            .create_intent(&IntentRequest {
                amount,
                currency,
                method,
                order_reference: None,
            })
            .await
            .map_err(|source| {
                error!(method = %method, amount, error = %source, "Payment intent creation failed");
                EngineError::PaymentGateway {
                    context: format!("creating {} payment intent", method),
                    source,
                }
            })?;

        info!(payment_intent_id = %intent.payment_id, method = %method, amount, "Payment intent created");

        Ok(PaymentIntentCreated {
            client_secret: intent.client_reference,
            amount,
            currency,
            payment_intent_id: intent.payment_id,
            provider: intent.provider,
            requires_action: intent.requires_action,
        })
    }

    /// Create-then-pay: persist at `pending`, then open the intent and link it.
    ///
    /// A gateway failure leaves the order pending without a reference; it
    /// can be paid later through [`LifecycleEngine::retry_payment`].
    pub async fn create_order(
        &self,
        owner_id: &str,
        request: OrderRequest,
    ) -> EngineResult<CreatedOrder> {
        let validated = request.validate()?;
        let order = self.new_order(owner_id, validated, None);
        let order = self.insert_with_retry(order).await?;

        info!(
            order_id = %order.id,
            order_number = %order.metadata.order_number,
            amount = order.payment.amount,
            "Return order created"
        );

        self.initiate_payment(order).await
    }

    /// Pay-then-create: the intent already exists, create the order and its receipt.
    ///
    /// Confirming an intent that already backs an order returns that order.
    pub async fn confirm_payment_and_create_order(
        &self,
        owner_id: &str,
        payment_intent_id: Option<&str>,
        order_data: Option<serde_json::Value>,
    ) -> EngineResult<ConfirmedOrder> {
        let intent_id = payment_intent_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(EngineError::MissingPaymentReference)?;

        let data = order_data
            .filter(|data| !data.is_null())
            .ok_or_else(|| EngineError::MissingOrderData("orderData is required".to_string()))?;
        let request: OrderRequest = serde_json::from_value(data)
            .map_err(|e| EngineError::MissingOrderData(e.to_string()))?;
        let validated = request.validate().map_err(|e| match e {
            ValidationError::AmountNotAllowed => EngineError::AmountNotAllowed,
            ValidationError::UnsupportedPaymentMethod(m) => EngineError::UnsupportedPaymentMethod(m),
            other => EngineError::MissingOrderData(other.to_string()),
        })?;

        if let Some(existing) = self.orders.find_by_gateway_reference(intent_id).await? {
            debug!(order_id = %existing.id, payment_intent_id = intent_id, "Payment already confirmed");
            return self.existing_confirmation(owner_id, existing).await;
        }

        let order = self.new_order(owner_id, validated, Some(intent_id.to_string()));
        let order = match self.insert_with_retry(order).await {
            Ok(order) => order,
            Err(EngineError::Repository(RepositoryError::DuplicateKey(
                UniqueField::GatewayReference,
            ))) => {
                let existing = self
                    .orders
                    .find_by_gateway_reference(intent_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("order for {}", intent_id)))?;
                return self.existing_confirmation(owner_id, existing).await;
            }
            Err(e) => return Err(e),
        };

        let receipt = self.issue_receipt(&order).await?;
        info!(
            order_id = %order.id,
            order_number = %order.metadata.order_number,
            receipt_id = %receipt.id,
            payment_intent_id = intent_id,
            "Payment confirmed and order created"
        );

        Ok(ConfirmedOrder { order, receipt })
    }

    /// Re-open payment for a pending order whose first attempt never reached the gateway
    pub async fn retry_payment(&self, actor: &Actor, order_id: Uuid) -> EngineResult<CreatedOrder> {
        let order = self.authorized_order(actor, order_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(EngineError::Validation(format!(
                "Payment can only be retried while the order is pending, order is {}",
                order.status
            )));
        }
        if order.payment.gateway_reference.is_some() {
            return Err(EngineError::PaymentAlreadyInitiated(
                order.metadata.order_number.clone(),
            ));
        }

        self.initiate_payment(order).await
    }

    /// Move an order along one edge of the state machine.
    ///
    /// Cancelling an already cancelled order is a successful no-op.
    pub async fn transition(
        &self,
        actor: &Actor,
        order_id: Uuid,
        target: OrderStatus,
        notes: Option<String>,
    ) -> EngineResult<ReturnOrder> {
        let order = self.authorized_order(actor, order_id).await?;

        if order.status == OrderStatus::Cancelled && target == OrderStatus::Cancelled {
            debug!(order_id = %order.id, "Order already cancelled");
            return Ok(order);
        }

        let change = lifecycle::plan_transition(order.status, target, notes, Utc::now())?;

        match self.orders.apply_transition(order.id, order.status, &change).await? {
            Some(updated) => {
                info!(
                    order_id = %updated.id,
                    from = %order.status,
                    to = %target,
                    actor = %actor.user_id,
                    "Order status changed"
                );
                Ok(updated)
            }
            None => {
                let current = self
                    .orders
                    .get_order(order.id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound(format!("order {}", order.id)))?;

                if current.status == OrderStatus::Cancelled && target == OrderStatus::Cancelled {
                    return Ok(current);
                }
                warn!(
                    order_id = %order.id,
                    expected = %order.status,
                    actual = %current.status,
                    "Lost transition race"
                );
                Err(EngineError::StatusConflict {
                    order_id: order.id,
                    expected: order.status,
                    actual: current.status,
                })
            }
        }
    }

    pub async fn get_order(&self, actor: &Actor, order_id: Uuid) -> EngineResult<ReturnOrder> {
        self.authorized_order(actor, order_id).await
    }

    pub async fn list_orders(&self, actor: &Actor) -> EngineResult<Vec<ReturnOrder>> {
        Ok(self.orders.list_orders(&actor.user_id).await?)
    }

    /// Tracking view by order id or order number, scoped to the caller's orders
    pub async fn tracking(&self, actor: &Actor, identifier: &str) -> EngineResult<TrackingInfo> {
        let order = self
            .orders
            .find_for_owner(&actor.user_id, identifier)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {}", identifier)))?;
        Ok(TrackingInfo::from(&order))
    }

    pub async fn tracking_list(&self, actor: &Actor) -> EngineResult<Vec<TrackingInfo>> {
        let orders = self.orders.list_orders(&actor.user_id).await?;
        Ok(orders.iter().map(TrackingInfo::from).collect())
    }

    pub async fn list_receipts(&self, actor: &Actor) -> EngineResult<Vec<ReceiptView>> {
        let receipts = self.receipts.list_receipts(&actor.user_id).await?;

        let mut views = Vec::with_capacity(receipts.len());
        for receipt in &receipts {
            match self.orders.get_order(receipt.order_id).await? {
                Some(order) => views.push(ReceiptView::new(receipt, &order)),
                None => warn!(receipt_id = %receipt.id, order_id = %receipt.order_id, "Receipt without order"),
            }
        }
        Ok(views)
    }

    pub async fn get_receipt(&self, actor: &Actor, receipt_id: Uuid) -> EngineResult<ReceiptView> {
        let receipt = self
            .receipts
            .get_receipt(receipt_id, &actor.user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("receipt {}", receipt_id)))?;
        let order = self
            .orders
            .get_order(receipt.order_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {}", receipt.order_id)))?;
        Ok(ReceiptView::new(&receipt, &order))
    }

    /// Verify a processor webhook and reconcile the payment status it reports.
    ///
    /// Only `payment.status` and `payment.paidAt` move; lifecycle status and
    /// history are untouched.
    pub async fn handle_payment_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> EngineResult<WebhookOutcome> {
        let signature = signature.ok_or_else(|| {
            warn!("Webhook without signature header");
            EngineError::InvalidWebhookSignature("missing signature header".to_string())
        })?;
        let event = self.payments.verify_webhook(payload, signature).map_err(|e| {
            warn!(error = %e, "Webhook verification failed");
            EngineError::InvalidWebhookSignature(e.to_string())
        })?;

        let target = match &event.kind {
            WebhookEventKind::PaymentSucceeded => PaymentStatus::Completed,
            WebhookEventKind::PaymentFailed => PaymentStatus::Failed,
            WebhookEventKind::Other(kind) => {
                debug!(event_id = %event.id, event_type = %kind, "Ignoring webhook event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let Some(reference) = event.payment_intent_id.as_deref() else {
            warn!(event_id = %event.id, "Payment event without intent id");
            return Ok(WebhookOutcome::Unmatched);
        };
        let Some(order) = self.orders.find_by_gateway_reference(reference).await? else {
            info!(event_id = %event.id, payment_intent_id = reference, "No order for payment event");
            return Ok(WebhookOutcome::Unmatched);
        };

        if order.payment.status.is_settled() {
            debug!(order_id = %order.id, payment_status = order.payment.status.as_str(), "Payment already settled");
            return Ok(WebhookOutcome::Reconciled {
                order_id: order.id,
                payment_status: order.payment.status,
            });
        }

        let paid_at = (target == PaymentStatus::Completed).then(Utc::now);
        let Some(updated) = self
            .orders
            .update_payment_status(reference, target, paid_at)
            .await?
        else {
            // Settled between the read above and the conditional update
            let current = self
                .orders
                .find_by_gateway_reference(reference)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("order for {}", reference)))?;
            debug!(
                order_id = %current.id,
                payment_status = current.payment.status.as_str(),
                "Payment settled concurrently, webhook not applied"
            );
            return Ok(WebhookOutcome::Reconciled {
                order_id: current.id,
                payment_status: current.payment.status,
            });
        };

        info!(
            order_id = %updated.id,
            event_id = %event.id,
            payment_status = target.as_str(),
            "Payment status reconciled from webhook"
        );
        Ok(WebhookOutcome::Reconciled {
            order_id: updated.id,
            payment_status: target,
        })
    }

    async fn authorized_order(&self, actor: &Actor, order_id: Uuid) -> EngineResult<ReturnOrder> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {}", order_id)))?;

        if !actor.may_act_on(&order.owner_id) {
            warn!(order_id = %order_id, actor = %actor.user_id, "Access to foreign order denied");
            return Err(EngineError::Forbidden(order_id));
        }
        Ok(order)
    }

    fn fresh_metadata(&self) -> OrderMetadata {
        OrderMetadata::new(
            self.identifiers.order_number(),
            self.identifiers.tracking_number(),
            self.identifiers.pickup_pin(),
        )
    }

    fn new_order(
        &self,
        owner_id: &str,
        validated: ValidatedOrder,
        gateway_reference: Option<String>,
    ) -> ReturnOrder {
        let (packages, amount) = self.pricing.price_packages(&validated.packages);
        let now = Utc::now();

        ReturnOrder {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            pickup_address: validated.pickup_address,
            packages,
            schedule: validated.schedule,
            payment: PaymentInfo {
                method: validated.method,
                amount,
                currency: validated.currency,
                status: PaymentStatus::Pending,
                gateway_reference,
                paid_at: None,
            },
            status: OrderStatus::Pending,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                changed_at: now,
                notes: None,
            }],
            metadata: self.fresh_metadata(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Insert, regenerating identifiers on order/tracking number collisions
    async fn insert_with_retry(&self, mut order: ReturnOrder) -> EngineResult<ReturnOrder> {
        let mut attempt = 1;
        loop {
            match self.orders.insert_order(&order).await {
                Ok(()) => return Ok(order),
                Err(RepositoryError::DuplicateKey(
                    field @ (UniqueField::OrderNumber | UniqueField::TrackingNumber),
                )) => {
                    if attempt >= self.max_create_attempts {
                        error!(attempts = attempt, %field, "Giving up on order creation");
                        return Err(EngineError::OrderCreationFailed { attempts: attempt });
                    }
                    warn!(attempt, %field, "Identifier collision, regenerating");
                    attempt += 1;
                    order.metadata = self.fresh_metadata();
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn initiate_payment(&self, order: ReturnOrder) -> EngineResult<CreatedOrder> {
        let method: PaymentMethod = order.payment.method;
        let request = IntentRequest {
            amount: order.payment.amount,
            currency: order.payment.currency,
            method,
            order_reference: Some(order.id),
        };

        let intent = self.payments.create_intent(&request).await.map_err(|source| {
            error!(
                order_id = %order.id,
                order_number = %order.metadata.order_number,
                error = %source,
                "Payment initiation failed, order stays pending without a gateway reference"
            );
            EngineError::PaymentGateway {
                context: format!("initiating payment for order {}", order.metadata.order_number),
                source,
            }
        })?;

        let status = if intent.requires_action {
            PaymentStatus::RequiresAction
        } else {
            PaymentStatus::Pending
        };
        let order = self
            .orders
            .attach_payment(order.id, &intent.payment_id, status)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {}", order.id)))?;

        info!(
            order_id = %order.id,
            payment_intent_id = %intent.payment_id,
            provider = intent.provider.as_str(),
            "Payment initiated"
        );
        Ok(CreatedOrder { order, intent })
    }

    async fn existing_confirmation(
        &self,
        owner_id: &str,
        order: ReturnOrder,
    ) -> EngineResult<ConfirmedOrder> {
        if !order.is_owned_by(owner_id) {
            warn!(order_id = %order.id, owner = owner_id, "Payment intent belongs to another owner");
            return Err(EngineError::Forbidden(order.id));
        }
        let receipt = match self.receipts.receipt_for_order(order.id).await? {
            Some(receipt) => receipt,
            None => self.issue_receipt(&order).await?,
        };
        Ok(ConfirmedOrder { order, receipt })
    }

    /// One receipt per order; a concurrent issuer's receipt is returned instead of a second one
    async fn issue_receipt(&self, order: &ReturnOrder) -> EngineResult<Receipt> {
        let receipt = Receipt::new(order.owner_id.clone(), order.id);
        match self.receipts.create_receipt(&receipt).await {
            Ok(()) => Ok(receipt),
            Err(RepositoryError::DuplicateKey(UniqueField::ReceiptOrder)) => self
                .receipts
                .receipt_for_order(order.id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("receipt for order {}", order.id))),
            Err(e) => Err(e.into()),
        }
    }
}
