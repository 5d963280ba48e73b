use crate::config::KakaoPayConfig;
use crate::gateway::error::{GatewayError, GatewayResult};
use crate::gateway::http::GatewayHttpClient;
use crate::gateway::types::{
    Approval, CancelReceipt, CheckoutReady, KakaoPayApproveRequest, KakaoPayApproveResponse,
    KakaoPayCancelRequest, KakaoPayCancelResponse, KakaoPayReadyRequest, KakaoPayReadyResponse,
    PaymentAmount, ReadyRequest,
};
use crate::gateway::PaymentGateway;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

/// Item name shown on the KakaoPay payment page and in receipts.
const ITEM_NAME: &str = "후원금";

pub struct KakaoPayClient {
    config: KakaoPayConfig,
    http: GatewayHttpClient,
}

impl KakaoPayClient {
    pub fn new(config: KakaoPayConfig) -> GatewayResult<Self> {
        let http = GatewayHttpClient::new(
            Duration::from_secs(config.request_timeout),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn payload<T: Serialize>(request: &T) -> GatewayResult<JsonValue> {
        serde_json::to_value(request).map_err(|e| GatewayError::ValidationError {
            message: format!("failed to serialize provider request: {}", e),
            field: None,
        })
    }

    fn ensure_ready_request(request: &ReadyRequest) -> GatewayResult<()> {
        if request.amount <= 0 {
            return Err(GatewayError::ValidationError {
                message: "amount must be positive".to_string(),
                field: Some("amount".to_string()),
            });
        }
        if request.payer_id.trim().is_empty() {
            return Err(GatewayError::ValidationError {
                message: "payer_id is required".to_string(),
                field: Some("payer_id".to_string()),
            });
        }
        if request.order_id.trim().is_empty() {
            return Err(GatewayError::ValidationError {
                message: "order_id is required".to_string(),
                field: Some("order_id".to_string()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for KakaoPayClient {
    async fn ready(&self, request: ReadyRequest) -> GatewayResult<CheckoutReady> {
        Self::ensure_ready_request(&request)?;

        let payload = Self::payload(&KakaoPayReadyRequest {
            cid: self.config.cid.clone(),
            partner_order_id: request.order_id.clone(),
            partner_user_id: request.payer_id.clone(),
            item_name: ITEM_NAME.to_string(),
            quantity: 1,
            total_amount: request.amount,
            tax_free_amount: 0,
            approval_url: request.success_url,
            cancel_url: request.cancel_url,
            fail_url: request.fail_url,
        })?;

        let response: KakaoPayReadyResponse = self
            .http
            .post_json(
                &self.endpoint("/online/v1/payment/ready"),
                &self.config.secret_key,
                &payload,
            )
            .await?;

        info!(
            order_id = %request.order_id,
            tid = %response.tid,
            amount = request.amount,
            "payment registered at provider"
        );

        Ok(CheckoutReady {
            transaction_id: response.tid,
            redirect_url: response.next_redirect_pc_url,
        })
    }

    async fn approve(
        &self,
        transaction_id: &str,
        approval_token: &str,
        order_id: &str,
        payer_id: &str,
    ) -> GatewayResult<Approval> {
        let payload = Self::payload(&KakaoPayApproveRequest {
            cid: self.config.cid.clone(),
            tid: transaction_id.to_string(),
            partner_order_id: order_id.to_string(),
            partner_user_id: payer_id.to_string(),
            pg_token: approval_token.to_string(),
        })?;

        // Single attempt: on timeout the provider may have captured the
        // payment, so a replay could double-charge or hit an already-used
        // pg_token. The caller resolves the ambiguity, not the transport.
        let response: KakaoPayApproveResponse = self
            .http
            .post_json_once(
                &self.endpoint("/online/v1/payment/approve"),
                &self.config.secret_key,
                &payload,
            )
            .await?;

        info!(
            order_id = %order_id,
            tid = %response.tid,
            aid = %response.aid,
            amount = response.amount.total,
            method = %response.payment_method_type,
            "payment approved at provider"
        );

        Ok(Approval {
            approval_id: response.aid,
            transaction_id: response.tid,
            amount: PaymentAmount {
                total: response.amount.total,
                tax_free: response.amount.tax_free,
                vat: response.amount.vat,
            },
            payment_method: response.payment_method_type,
            approved_at: response.approved_at,
        })
    }

    async fn cancel(
        &self,
        transaction_id: &str,
        amount: i64,
        tax_free_amount: i64,
    ) -> GatewayResult<CancelReceipt> {
        let payload = Self::payload(&KakaoPayCancelRequest {
            cid: self.config.cid.clone(),
            tid: transaction_id.to_string(),
            cancel_amount: amount,
            cancel_tax_free_amount: tax_free_amount,
        })?;

        let response: KakaoPayCancelResponse = self
            .http
            .post_json(
                &self.endpoint("/online/v1/payment/cancel"),
                &self.config.secret_key,
                &payload,
            )
            .await?;

        info!(
            tid = %response.tid,
            status = %response.status,
            canceled_amount = response.canceled_amount.total,
            "payment canceled at provider"
        );

        Ok(CancelReceipt {
            transaction_id: response.tid,
            status: response.status,
            canceled_amount: response.canceled_amount.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> KakaoPayConfig {
        KakaoPayConfig {
            base_url: "https://open-api.kakaopay.com".to_string(),
            secret_key: "test_secret".to_string(),
            cid: "TC0ONETIME".to_string(),
            request_timeout: 15,
            max_retries: 3,
        }
    }

    #[test]
    fn endpoint_joins_base_url_and_path() {
        let client = KakaoPayClient::new(test_config()).unwrap();
        assert_eq!(
            client.endpoint("/online/v1/payment/ready"),
            "https://open-api.kakaopay.com/online/v1/payment/ready"
        );
    }

    #[tokio::test]
    async fn ready_rejects_non_positive_amount() {
        let client = KakaoPayClient::new(test_config()).unwrap();
        let result = client
            .ready(ReadyRequest {
                order_id: "donation_1".to_string(),
                payer_id: "donor@example.com".to_string(),
                amount: 0,
                success_url: "http://localhost/donation/success".to_string(),
                cancel_url: "http://localhost/donation/cancel".to_string(),
                fail_url: "http://localhost/donation/fail".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::ValidationError { field: Some(f), .. }) if f == "amount"
        ));
    }

    #[tokio::test]
    async fn ready_rejects_blank_payer_id() {
        let client = KakaoPayClient::new(test_config()).unwrap();
        let result = client
            .ready(ReadyRequest {
                order_id: "donation_1".to_string(),
                payer_id: "  ".to_string(),
                amount: 5000,
                success_url: "http://localhost/donation/success".to_string(),
                cancel_url: "http://localhost/donation/cancel".to_string(),
                fail_url: "http://localhost/donation/fail".to_string(),
            })
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::ValidationError { field: Some(f), .. }) if f == "payer_id"
        ));
    }
}
