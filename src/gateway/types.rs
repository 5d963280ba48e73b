use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// KakaoPay timestamps usually arrive without a zone offset
/// (`2026-08-28T10:01:00`, KST wall-clock or UTC depending on endpoint).
/// Rejecting them after an approve would discard a capture that already
/// happened, so accept both RFC 3339 and zone-less forms; zone-less values
/// are taken as UTC.
mod provider_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("unrecognized provider timestamp '{}': {}", raw, e))
    }
}

/// Input to [`PaymentGateway::ready`]: everything the provider needs to
/// register a one-time payment and hand back a hosted payment page.
///
/// [`PaymentGateway::ready`]: crate::gateway::PaymentGateway::ready
#[derive(Debug, Clone)]
pub struct ReadyRequest {
    /// Merchant-side order id, unique per checkout attempt.
    pub order_id: String,
    /// Merchant-side payer identifier (the donor's email).
    pub payer_id: String,
    /// Total amount in whole KRW.
    pub amount: i64,
    pub success_url: String,
    pub cancel_url: String,
    pub fail_url: String,
}

/// Outcome of a successful `ready` call.
#[derive(Debug, Clone)]
pub struct CheckoutReady {
    /// Provider transaction id. Required for approve and cancel.
    pub transaction_id: String,
    /// Hosted payment page the payer's browser is redirected to.
    pub redirect_url: String,
}

/// Amount breakdown echoed back by the provider on approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAmount {
    pub total: i64,
    pub tax_free: i64,
    pub vat: i64,
}

/// Outcome of a successful `approve` call. The money has been captured.
#[derive(Debug, Clone)]
pub struct Approval {
    /// Provider approval id (`aid`). Proof that capture happened.
    pub approval_id: String,
    pub transaction_id: String,
    pub amount: PaymentAmount,
    /// Provider payment method, e.g. `CARD` or `MONEY`.
    pub payment_method: String,
    pub approved_at: DateTime<Utc>,
}

/// Outcome of a successful `cancel` call.
#[derive(Debug, Clone)]
pub struct CancelReceipt {
    pub transaction_id: String,
    pub status: String,
    pub canceled_amount: i64,
}

// ---------------------------------------------------------------------------
// KakaoPay wire format (open-api.kakaopay.com, online/v1)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct KakaoPayReadyRequest {
    pub cid: String,
    pub partner_order_id: String,
    pub partner_user_id: String,
    pub item_name: String,
    pub quantity: u32,
    pub total_amount: i64,
    pub tax_free_amount: i64,
    pub approval_url: String,
    pub cancel_url: String,
    pub fail_url: String,
}

#[derive(Debug, Deserialize)]
pub struct KakaoPayReadyResponse {
    pub tid: String,
    pub next_redirect_pc_url: String,
    #[serde(default)]
    pub next_redirect_mobile_url: Option<String>,
    #[serde(default)]
    pub next_redirect_app_url: Option<String>,
    #[serde(with = "provider_time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct KakaoPayApproveRequest {
    pub cid: String,
    pub tid: String,
    pub partner_order_id: String,
    pub partner_user_id: String,
    pub pg_token: String,
}

#[derive(Debug, Deserialize)]
pub struct KakaoPayApproveResponse {
    pub aid: String,
    pub tid: String,
    pub cid: String,
    pub partner_order_id: String,
    pub partner_user_id: String,
    pub payment_method_type: String,
    pub amount: KakaoPayAmount,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(with = "provider_time")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "provider_time")]
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct KakaoPayAmount {
    pub total: i64,
    pub tax_free: i64,
    pub vat: i64,
    #[serde(default)]
    pub point: i64,
    #[serde(default)]
    pub discount: i64,
}

#[derive(Debug, Serialize)]
pub struct KakaoPayCancelRequest {
    pub cid: String,
    pub tid: String,
    pub cancel_amount: i64,
    pub cancel_tax_free_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct KakaoPayCancelResponse {
    pub tid: String,
    pub status: String,
    pub canceled_amount: KakaoPayAmount,
}

/// Error body KakaoPay returns on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct KakaoPayErrorBody {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_response_parses_provider_payload() {
        let body = r#"{
            "tid": "T1234567890",
            "next_redirect_app_url": "https://online-pay.kakao.com/app",
            "next_redirect_mobile_url": "https://online-pay.kakao.com/mobile",
            "next_redirect_pc_url": "https://online-pay.kakao.com/pc",
            "android_app_scheme": "kakaotalk://kakaopay",
            "ios_app_scheme": "kakaotalk://kakaopay",
            "created_at": "2026-08-28T10:00:00Z"
        }"#;

        let parsed: KakaoPayReadyResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.tid, "T1234567890");
        assert_eq!(parsed.next_redirect_pc_url, "https://online-pay.kakao.com/pc");
    }

    #[test]
    fn approve_response_parses_amount_breakdown() {
        let body = r#"{
            "aid": "A1234567890",
            "tid": "T1234567890",
            "cid": "TC0ONETIME",
            "partner_order_id": "donation_abc",
            "partner_user_id": "donor@example.com",
            "payment_method_type": "MONEY",
            "amount": {"total": 5000, "tax_free": 0, "vat": 455, "point": 0, "discount": 0},
            "item_name": "후원금",
            "created_at": "2026-08-28T10:00:00Z",
            "approved_at": "2026-08-28T10:01:00Z"
        }"#;

        let parsed: KakaoPayApproveResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.aid, "A1234567890");
        assert_eq!(parsed.amount.total, 5000);
        assert_eq!(parsed.payment_method_type, "MONEY");
    }

    #[test]
    fn approve_response_accepts_zone_less_timestamps() {
        let body = r#"{
            "aid": "A1234567890",
            "tid": "T1234567890",
            "cid": "TC0ONETIME",
            "partner_order_id": "donation_abc",
            "partner_user_id": "donor@example.com",
            "payment_method_type": "CARD",
            "amount": {"total": 5000, "tax_free": 0, "vat": 455},
            "created_at": "2026-08-28T10:00:00",
            "approved_at": "2026-08-28T10:01:00"
        }"#;

        let parsed: KakaoPayApproveResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.approved_at.to_rfc3339(), "2026-08-28T10:01:00+00:00");
    }

    #[test]
    fn provider_timestamps_parse_with_and_without_offset() {
        let with_offset = provider_time::parse("2026-08-28T19:01:00+09:00").unwrap();
        assert_eq!(with_offset.to_rfc3339(), "2026-08-28T10:01:00+00:00");

        let zone_less = provider_time::parse("2026-08-28T10:01:00").unwrap();
        assert_eq!(zone_less.to_rfc3339(), "2026-08-28T10:01:00+00:00");

        let fractional = provider_time::parse("2026-08-28T10:01:00.123").unwrap();
        assert_eq!(fractional.timestamp_subsec_millis(), 123);

        assert!(provider_time::parse("not a timestamp").is_err());
    }

    #[test]
    fn error_body_tolerates_missing_fields() {
        let parsed: KakaoPayErrorBody = serde_json::from_str("{}").unwrap();
        assert!(parsed.error_code.is_none());

        let parsed: KakaoPayErrorBody =
            serde_json::from_str(r#"{"error_code": -780, "error_message": "approval failed"}"#)
                .unwrap();
        assert_eq!(parsed.error_code, Some(-780));
    }
}
