pub mod access;
pub mod engine;
pub mod gateways;
pub mod identifiers;
pub mod lifecycle;
pub mod orchestrator;
pub mod pricing;
pub mod tracking;
pub mod validation;

pub use access::{Actor, Role};
pub use engine::{
    ConfirmedOrder, CreatedOrder, EngineError, EngineResult, LifecycleEngine, PaymentIntentCreated,
    PaymentIntentRequest, WebhookOutcome,
};
pub use identifiers::{IdentifierGenerator, RandomIdentifiers};
pub use orchestrator::PaymentOrchestrator;
pub use pricing::{PricingPolicy, SizePrices};
pub use tracking::{ReceiptView, TrackingInfo};
pub use validation::OrderRequest;
