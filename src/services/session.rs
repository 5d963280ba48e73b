//! Checkout session correlator
//!
//! Between the `ready` call and the payer's return from the hosted payment
//! page, the provider transaction id and merchant order id have to survive
//! outside the request. They are stored under an opaque single-use token
//! carried in a browser cookie; the callback consumes the token exactly once.

use crate::cache::keys::checkout::CorrelationKey;
use crate::cache::store::Cache;
use crate::error::{AppError, AppErrorKind, AppResult, InfrastructureError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// State bridging checkout entry and the provider callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutCorrelation {
    /// Provider transaction id from the `ready` call.
    pub tid: String,
    /// Merchant order id of the pending donation row.
    pub order_id: String,
    /// Donor email, echoed to the provider as `partner_user_id`.
    pub donor_email: String,
}

pub struct SessionCorrelator {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl SessionCorrelator {
    pub fn new(cache: Arc<dyn Cache>, ttl_secs: u64) -> Self {
        Self {
            cache,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// Store a correlation and hand back the opaque token for the browser.
    /// The token carries no payment data itself.
    pub async fn begin(&self, correlation: &CheckoutCorrelation) -> AppResult<String> {
        let token = Uuid::new_v4().to_string();
        let key = CorrelationKey::new(&token);
        let value = serde_json::to_string(correlation).map_err(|e| {
            AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Cache {
                message: format!("failed to serialize checkout correlation: {}", e),
            }))
        })?;

        self.cache
            .set_with_ttl(&key.to_string(), &value, self.ttl)
            .await?;
        Ok(token)
    }

    /// Redeem a token. Returns `None` when the token is unknown, expired, or
    /// already redeemed; each token resolves at most once.
    pub async fn consume(&self, token: &str) -> AppResult<Option<CheckoutCorrelation>> {
        let key = CorrelationKey::new(token);
        let Some(value) = self.cache.take(&key.to_string()).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<CheckoutCorrelation>(&value) {
            Ok(correlation) => Ok(Some(correlation)),
            Err(e) => {
                // The value is gone either way; treat garbage like an expired
                // session rather than failing the callback with a 500.
                warn!(error = %e, "discarding unparseable checkout correlation");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryCache;

    fn correlation() -> CheckoutCorrelation {
        CheckoutCorrelation {
            tid: "T1234567890".to_string(),
            order_id: "donation_abc".to_string(),
            donor_email: "donor@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn consume_returns_stored_correlation_once() {
        let correlator = SessionCorrelator::new(Arc::new(MemoryCache::new()), 900);
        let token = correlator.begin(&correlation()).await.expect("begin");

        let first = correlator.consume(&token).await.expect("consume");
        assert_eq!(first, Some(correlation()));

        let second = correlator.consume(&token).await.expect("consume");
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn consume_of_unknown_token_is_none() {
        let correlator = SessionCorrelator::new(Arc::new(MemoryCache::new()), 900);
        let result = correlator
            .consume("not-a-real-token")
            .await
            .expect("consume");
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn expired_session_is_not_redeemable() {
        let correlator = SessionCorrelator::new(Arc::new(MemoryCache::new()), 0);
        let token = correlator.begin(&correlation()).await.expect("begin");

        tokio::time::sleep(Duration::from_millis(5)).await;
        let result = correlator.consume(&token).await.expect("consume");
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn tokens_are_unique_per_checkout() {
        let correlator = SessionCorrelator::new(Arc::new(MemoryCache::new()), 900);
        let a = correlator.begin(&correlation()).await.expect("begin");
        let b = correlator.begin(&correlation()).await.expect("begin");
        assert_ne!(a, b);
    }
}
