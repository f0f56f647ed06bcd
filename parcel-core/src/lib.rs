pub mod models;
pub mod payment;
pub mod pii;
pub mod repository;

pub use models::{
    Carrier, OrderMetadata, OrderStatus, Package, PackageSize, PackageSpec, PaymentInfo,
    PaymentSettlement, PickupAddress, Receipt, ReturnOrder, Schedule, StatusChange,
    StatusHistoryEntry, TimeWindow,
};
pub use payment::{
    Currency, GatewayError, GatewayIntent, IntentRequest, PaymentGateway, PaymentMethod,
    PaymentOption, PaymentProvider, PaymentStatus, WebhookEvent, WebhookEventKind,
};
pub use pii::Masked;
pub use repository::{OrderRepository, ReceiptRepository, RepositoryError, UniqueField};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
}
