use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::models::{OrderStatus, Receipt, ReturnOrder, StatusChange};
use crate::payment::PaymentStatus;

/// Fields guarded by a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    OrderNumber,
    TrackingNumber,
    GatewayReference,
    ReceiptOrder,
    Other,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UniqueField::OrderNumber => "metadata.orderNumber",
            UniqueField::TrackingNumber => "metadata.trackingNumber",
            UniqueField::GatewayReference => "payment.gatewayReference",
            UniqueField::ReceiptOrder => "receipt.orderId",
            UniqueField::Other => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Duplicate key on {0}")]
    DuplicateKey(UniqueField),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Record store for return orders.
///
/// Implementations enforce structural constraints only (unique order number,
/// tracking number and gateway reference). Transition legality and pricing live in the engine.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert_order(&self, order: &ReturnOrder) -> RepositoryResult<()>;

    async fn get_order(&self, id: Uuid) -> RepositoryResult<Option<ReturnOrder>>;

    /// Look up an owner's order by id or by order number
    async fn find_for_owner(
        &self,
        owner_id: &str,
        identifier: &str,
    ) -> RepositoryResult<Option<ReturnOrder>>;

    async fn find_by_gateway_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<ReturnOrder>>;

    /// Newest first
    async fn list_orders(&self, owner_id: &str) -> RepositoryResult<Vec<ReturnOrder>>;

    /// Commit `change` only if the order is still in `expected`.
    ///
    /// Status, history append and payment settlement are written together.
    /// Returns `None` when the order is missing or its status moved on.
    async fn apply_transition(
        &self,
        id: Uuid,
        expected: OrderStatus,
        change: &StatusChange,
    ) -> RepositoryResult<Option<ReturnOrder>>;

    /// Record the gateway reference and initial payment status on an order
    async fn attach_payment(
        &self,
        id: Uuid,
        reference: &str,
        status: PaymentStatus,
    ) -> RepositoryResult<Option<ReturnOrder>>;

    /// Payment reconciliation keyed on the gateway reference.
    ///
    /// Payments that are already `completed` or `refunded` are left alone and
    /// yield `None`, the same as an unknown reference.
    async fn update_payment_status(
        &self,
        reference: &str,
        status: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Option<ReturnOrder>>;
}

#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    async fn create_receipt(&self, receipt: &Receipt) -> RepositoryResult<()>;

    async fn receipt_for_order(&self, order_id: Uuid) -> RepositoryResult<Option<Receipt>>;

    async fn get_receipt(&self, id: Uuid, owner_id: &str) -> RepositoryResult<Option<Receipt>>;

    /// Newest first
    async fn list_receipts(&self, owner_id: &str) -> RepositoryResult<Vec<Receipt>>;
}
