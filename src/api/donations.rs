//! Donation checkout endpoints
//!
//! `POST /donation` starts a checkout and redirects the browser to the
//! provider's payment page, carrying the session token in an HttpOnly
//! cookie. The three callback endpoints redeem that cookie and always
//! answer with a redirect to an outcome page; raw errors never reach the
//! browser here.

use crate::error::{AppErrorKind, AppResult};
use crate::middleware::error::{tag_request_id, validation_rejection};
use crate::services::{CheckoutOutcome, CheckoutRequest, CheckoutService};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

const SESSION_COOKIE: &str = "donation_session";
const SESSION_COOKIE_MAX_AGE_SECS: u64 = 900;

#[derive(Clone)]
pub struct DonationsState {
    pub checkout: Arc<CheckoutService>,
}

pub fn routes(state: DonationsState) -> Router {
    Router::new()
        .route("/donation", post(start_donation))
        .route("/donation/success", get(donation_success))
        .route("/donation/cancel", get(donation_cancel))
        .route("/donation/fail", get(donation_fail))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    /// Approval token appended by the provider on redirect. Absent when
    /// the donor lands here outside a real payment flow.
    #[serde(default)]
    pub pg_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailQuery {
    /// Error detail forwarded by the provider, if any.
    pub error: Option<String>,
}

async fn start_donation(
    State(state): State<DonationsState>,
    headers: HeaderMap,
    Form(request): Form<CheckoutRequest>,
) -> AppResult<Response> {
    // Echoed on rejection so the form can be re-rendered as submitted.
    let submitted = serde_json::json!({
        "name": request.name,
        "email": request.email,
        "amount": request.amount,
        "message": request.message,
    });

    let started = match state.checkout.start(request).await {
        Ok(started) => started,
        Err(error) if matches!(error.kind, AppErrorKind::Validation(_)) => {
            let error = tag_request_id(error, &headers);
            return Ok(validation_rejection(&error, submitted));
        }
        Err(error) => return Err(tag_request_id(error, &headers)),
    };

    let mut response = redirect(&started.redirect_url);
    set_session_cookie(&mut response, &started.session_token);
    Ok(response)
}

async fn donation_success(
    State(state): State<DonationsState>,
    Query(query): Query<SuccessQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let Some(pg_token) = query.pg_token.as_deref().filter(|t| !t.is_empty()) else {
        warn!("success callback arrived without an approval token");
        return Ok(outcome_redirect(CheckoutOutcome::InvalidSession));
    };

    let token = session_cookie(&headers);
    let outcome = state
        .checkout
        .complete(token.as_deref(), pg_token)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;
    Ok(outcome_redirect(outcome))
}

async fn donation_cancel(
    State(state): State<DonationsState>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let token = session_cookie(&headers);
    let outcome = state
        .checkout
        .cancel(token.as_deref())
        .await
        .map_err(|e| tag_request_id(e, &headers))?;
    Ok(outcome_redirect(outcome))
}

async fn donation_fail(
    State(state): State<DonationsState>,
    Query(query): Query<FailQuery>,
    headers: HeaderMap,
) -> AppResult<Response> {
    if let Some(error) = &query.error {
        warn!(provider_error = %error, "provider reported payment failure");
    }
    let token = session_cookie(&headers);
    let outcome = state
        .checkout
        .fail(token.as_deref())
        .await
        .map_err(|e| tag_request_id(e, &headers))?;
    Ok(outcome_redirect(outcome))
}

/// Map a checkout outcome to its browser-facing redirect. The session
/// cookie is cleared on every callback; the correlation behind it is gone
/// either way.
fn outcome_redirect(outcome: CheckoutOutcome) -> Response {
    let location = match &outcome {
        CheckoutOutcome::Completed(donation) => with_query(
            "/donation/complete",
            &[("order_id", donation.order_id.as_str())],
        ),
        CheckoutOutcome::Cancelled(_) => {
            with_query("/donation", &[("notice", "Payment was cancelled")])
        }
        CheckoutOutcome::Failed { reason } => {
            with_query("/donation/fail", &[("reason", reason.as_str())])
        }
        CheckoutOutcome::InvalidSession => with_query(
            "/donation",
            &[("error", "Your checkout session has expired. Please start again")],
        ),
    };

    let mut response = redirect(&location);
    clear_session_cookie(&mut response);
    response
}

fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    match serde_urlencoded::to_string(params) {
        Ok(query) if !query.is_empty() => format!("{}?{}", path, query),
        _ => path.to_string(),
    }
}

fn redirect(location: &str) -> Response {
    match header::HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = StatusCode::SEE_OTHER.into_response();
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => {
            warn!(location = %location, "redirect target is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn set_session_cookie(response: &mut Response, token: &str) {
    let cookie = format!(
        "{}={}; Max-Age={}; Path=/donation; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token, SESSION_COOKIE_MAX_AGE_SECS
    );
    if let Ok(value) = header::HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

fn clear_session_cookie(response: &mut Response) {
    let cookie = format!(
        "{}=; Max-Age=0; Path=/donation; HttpOnly; SameSite=Lax",
        SESSION_COOKIE
    );
    if let Ok(value) = header::HeaderValue::from_str(&cookie) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_extracted_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; donation_session=abc123; lang=ko".parse().unwrap(),
        );
        assert_eq!(session_cookie(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn absent_or_empty_cookie_yields_none() {
        assert_eq!(session_cookie(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "donation_session=".parse().unwrap());
        assert_eq!(session_cookie(&headers), None);
    }

    #[test]
    fn redirect_response_is_see_other_with_location() {
        let response = redirect("https://pay.example.com/checkout");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://pay.example.com/checkout"
        );
    }

    #[test]
    fn success_query_tolerates_missing_approval_token() {
        let query: SuccessQuery = serde_urlencoded::from_str("").unwrap();
        assert_eq!(query.pg_token, None);

        let query: SuccessQuery = serde_urlencoded::from_str("pg_token=tok_1").unwrap();
        assert_eq!(query.pg_token.as_deref(), Some("tok_1"));
    }

    #[test]
    fn missing_approval_token_redirects_like_an_expired_session() {
        let response = outcome_redirect(CheckoutOutcome::InvalidSession);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with("/donation?error="));
    }

    #[test]
    fn failure_outcome_redirects_with_encoded_reason() {
        let response = outcome_redirect(CheckoutOutcome::Failed {
            reason: "Payment processing failed".to_string(),
        });
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(location.starts_with("/donation/fail?reason="));
        assert!(!location.contains(' '));
    }
}
