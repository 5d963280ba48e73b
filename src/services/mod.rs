//! Business logic services

pub mod auth;
pub mod checkout;
pub mod session;

pub use auth::AuthService;
pub use checkout::{CheckoutOutcome, CheckoutRequest, CheckoutService, CheckoutStarted};
pub use session::{CheckoutCorrelation, SessionCorrelator};
