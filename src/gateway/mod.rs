//! Payment gateway client
//!
//! Typed client for the provider's ready/approve/cancel HTTP API. The
//! checkout orchestrator depends on the [`PaymentGateway`] trait, never on
//! the concrete client.

pub mod error;
pub mod http;
pub mod kakao_pay;
pub mod types;

use crate::gateway::error::GatewayResult;
use crate::gateway::types::{Approval, CancelReceipt, CheckoutReady, ReadyRequest};
use async_trait::async_trait;

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register the payment at the provider. Returns the provider
    /// transaction id and the hosted payment page to redirect the payer to.
    async fn ready(&self, request: ReadyRequest) -> GatewayResult<CheckoutReady>;

    /// Finalize the payment after the payer approved it. Must be called at
    /// most once per transaction id; a timeout is indeterminate (the money
    /// may have been captured) and is never retried by this client.
    async fn approve(
        &self,
        transaction_id: &str,
        approval_token: &str,
        order_id: &str,
        payer_id: &str,
    ) -> GatewayResult<Approval>;

    /// Cancel a captured payment at the provider.
    async fn cancel(
        &self,
        transaction_id: &str,
        amount: i64,
        tax_free_amount: i64,
    ) -> GatewayResult<CancelReceipt>;
}
