//! Payment gateway adapters: Stripe for card-style methods, PayPal for the
//! redirect flow, and an in-process mock.

pub mod mock;
pub mod paypal;
pub mod stripe;

pub use mock::MockPaymentGateway;
pub use paypal::{PaypalConfig, PaypalGateway};
pub use stripe::{StripeConfig, StripeGateway};
