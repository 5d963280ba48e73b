//! Checkout orchestrator
//!
//! Drives the donation state machine: `pending` is entered by a successful
//! provider `ready` call followed by a ledger insert, and left exactly once
//! through `completed`, `cancelled`, or `failed`. Every failure on a
//! callback path resolves to a terminal outcome for the caller; nothing
//! here surfaces raw provider or database errors to the browser.

use crate::database::donation_repository::{
    CompletionReceipt, Donation, DonationLedger, DonationStatus, NewDonation,
};
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::gateway::types::ReadyRequest;
use crate::gateway::PaymentGateway;
use crate::services::auth::validate_email;
use crate::services::session::{CheckoutCorrelation, SessionCorrelator};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

const MIN_AMOUNT: i64 = 1_000;
const MAX_AMOUNT: i64 = 1_000_000;
const MAX_MESSAGE_LEN: usize = 500;
const MIN_NAME_LEN: usize = 2;

/// Checkout entry form: `{name, email, amount, message?}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub name: String,
    pub email: String,
    pub amount: i64,
    #[serde(default)]
    pub message: Option<String>,
}

/// A checkout that passed `ready` and has a pending ledger row.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    /// Opaque session token for the browser cookie.
    pub session_token: String,
    /// Provider-hosted payment page.
    pub redirect_url: String,
    pub order_id: String,
}

/// Terminal result of a provider callback.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    Completed(Donation),
    Cancelled(Donation),
    Failed { reason: String },
    /// Correlation missing, expired, or already consumed. The ledger was
    /// not touched.
    InvalidSession,
}

pub struct CheckoutService {
    ledger: Arc<dyn DonationLedger>,
    gateway: Arc<dyn PaymentGateway>,
    correlator: SessionCorrelator,
    public_base_url: String,
}

impl CheckoutService {
    pub fn new(
        ledger: Arc<dyn DonationLedger>,
        gateway: Arc<dyn PaymentGateway>,
        correlator: SessionCorrelator,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            correlator,
            public_base_url: public_base_url.into(),
        }
    }

    fn callback_url(&self, leaf: &str) -> String {
        format!("{}/donation/{}", self.public_base_url, leaf)
    }

    fn validate(request: &CheckoutRequest) -> AppResult<()> {
        if request.name.trim().chars().count() < MIN_NAME_LEN {
            return Err(AppError::validation(ValidationError::InvalidName {
                reason: format!("must be at least {} characters", MIN_NAME_LEN),
            }));
        }
        validate_email(&request.email)?;
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&request.amount) {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: request.amount.to_string(),
                reason: format!("must be between {} and {} KRW", MIN_AMOUNT, MAX_AMOUNT),
            }));
        }
        if let Some(message) = &request.message {
            if message.chars().count() > MAX_MESSAGE_LEN {
                return Err(AppError::validation(ValidationError::FieldTooLong {
                    field: "message".to_string(),
                    max: MAX_MESSAGE_LEN,
                }));
            }
        }
        Ok(())
    }

    /// Start a checkout: validate, register the payment at the provider,
    /// insert the pending ledger row, then store the correlation. The
    /// pending row is durably visible before the browser is redirected, so
    /// any callback can observe it.
    pub async fn start(&self, request: CheckoutRequest) -> AppResult<CheckoutStarted> {
        Self::validate(&request)?;

        let order_id = format!("donation_{}", Uuid::new_v4().simple());
        let email = request.email.trim().to_lowercase();

        let ready = self
            .gateway
            .ready(ReadyRequest {
                order_id: order_id.clone(),
                payer_id: email.clone(),
                amount: request.amount,
                success_url: self.callback_url("success"),
                cancel_url: self.callback_url("cancel"),
                fail_url: self.callback_url("fail"),
            })
            .await?;

        let donation = self
            .ledger
            .create_pending(NewDonation {
                order_id: order_id.clone(),
                donor_name: request.name.trim().to_string(),
                donor_email: email.clone(),
                amount: request.amount,
                message: request.message.filter(|m| !m.trim().is_empty()),
                tid: ready.transaction_id.clone(),
            })
            .await
            .map_err(|e| {
                if e.is_duplicate() {
                    AppError::domain(DomainError::DuplicateOrderId {
                        order_id: order_id.clone(),
                    })
                } else {
                    e.into()
                }
            })?;

        let session_token = self
            .correlator
            .begin(&CheckoutCorrelation {
                tid: ready.transaction_id,
                order_id: order_id.clone(),
                donor_email: email,
            })
            .await?;

        info!(
            order_id = %order_id,
            tid = %donation.tid,
            amount = donation.amount,
            "checkout started"
        );

        Ok(CheckoutStarted {
            session_token,
            redirect_url: ready.redirect_url,
            order_id,
        })
    }

    /// Success callback: redeem the correlation, approve the payment, and
    /// complete the ledger row. A callback for an already-completed row is
    /// a duplicate delivery and returns the stored result without a second
    /// `approve` call.
    pub async fn complete(
        &self,
        session_token: Option<&str>,
        approval_token: &str,
    ) -> AppResult<CheckoutOutcome> {
        let Some(correlation) = self.redeem(session_token).await? else {
            return Ok(CheckoutOutcome::InvalidSession);
        };

        let existing = self
            .ledger
            .find_by_correlation(&correlation.order_id, &correlation.tid)
            .await?;
        match existing {
            None => {
                warn!(
                    order_id = %correlation.order_id,
                    tid = %correlation.tid,
                    "correlation matches no ledger row, treating as invalid session"
                );
                return Ok(CheckoutOutcome::InvalidSession);
            }
            Some(donation) if donation.status == DonationStatus::Completed => {
                info!(
                    order_id = %donation.order_id,
                    "duplicate success callback for completed donation"
                );
                return Ok(CheckoutOutcome::Completed(donation));
            }
            Some(donation) if donation.status.is_terminal() => {
                warn!(
                    order_id = %donation.order_id,
                    status = %donation.status,
                    "success callback for donation already finalized"
                );
                return Ok(CheckoutOutcome::Failed {
                    reason: AppError::domain(DomainError::AlreadyFinalized {
                        order_id: donation.order_id,
                        status: donation.status.to_string(),
                    })
                    .user_message(),
                });
            }
            Some(_) => {}
        }

        let approval = match self
            .gateway
            .approve(
                &correlation.tid,
                approval_token,
                &correlation.order_id,
                &correlation.donor_email,
            )
            .await
        {
            Ok(approval) => approval,
            Err(e) => {
                warn!(
                    order_id = %correlation.order_id,
                    tid = %correlation.tid,
                    error = %e,
                    retryable = e.is_retryable(),
                    "provider approve failed"
                );
                self.mark_failed_best_effort(&correlation).await;
                return Ok(CheckoutOutcome::Failed {
                    reason: AppError::from(e).user_message(),
                });
            }
        };

        match self
            .ledger
            .complete_pending(
                &correlation.order_id,
                &correlation.tid,
                CompletionReceipt {
                    approval_id: approval.approval_id.clone(),
                    payment_method: approval.payment_method.clone(),
                },
            )
            .await
        {
            Ok(Some(donation)) => {
                info!(
                    order_id = %donation.order_id,
                    aid = %approval.approval_id,
                    amount = donation.amount,
                    "donation completed"
                );
                Ok(CheckoutOutcome::Completed(donation))
            }
            Ok(None) => {
                // Money is captured but the row left `pending` under us.
                // Needs out-of-band reconciliation; keep every identifier in
                // the log line.
                error!(
                    order_id = %correlation.order_id,
                    tid = %correlation.tid,
                    aid = %approval.approval_id,
                    "approve succeeded but no pending ledger row matched"
                );
                Ok(CheckoutOutcome::Failed {
                    reason: "Payment processing failed. Please contact support".to_string(),
                })
            }
            Err(e) => {
                error!(
                    order_id = %correlation.order_id,
                    tid = %correlation.tid,
                    aid = %approval.approval_id,
                    error = %e,
                    "approve succeeded but ledger update failed"
                );
                Ok(CheckoutOutcome::Failed {
                    reason: "Payment processing failed. Please contact support".to_string(),
                })
            }
        }
    }

    /// Cancel callback: the payer backed out on the provider's page.
    pub async fn cancel(&self, session_token: Option<&str>) -> AppResult<CheckoutOutcome> {
        self.finalize(session_token, DonationStatus::Cancelled)
            .await
    }

    /// Fail callback: the provider reported the payment failed.
    pub async fn fail(&self, session_token: Option<&str>) -> AppResult<CheckoutOutcome> {
        self.finalize(session_token, DonationStatus::Failed).await
    }

    async fn finalize(
        &self,
        session_token: Option<&str>,
        status: DonationStatus,
    ) -> AppResult<CheckoutOutcome> {
        let Some(correlation) = self.redeem(session_token).await? else {
            return Ok(CheckoutOutcome::InvalidSession);
        };

        match self
            .ledger
            .finalize_pending(&correlation.order_id, &correlation.tid, status)
            .await?
        {
            Some(donation) => {
                info!(
                    order_id = %donation.order_id,
                    status = %donation.status,
                    "donation finalized"
                );
                Ok(match status {
                    DonationStatus::Cancelled => CheckoutOutcome::Cancelled(donation),
                    _ => CheckoutOutcome::Failed {
                        reason: "Payment failed at the provider".to_string(),
                    },
                })
            }
            None => {
                // Already finalized (safe idempotent exit) or the
                // correlation was forged; either way nothing was written.
                warn!(
                    order_id = %correlation.order_id,
                    tid = %correlation.tid,
                    target_status = %status,
                    "no pending ledger row matched callback"
                );
                match self
                    .ledger
                    .find_by_correlation(&correlation.order_id, &correlation.tid)
                    .await?
                {
                    Some(donation) if donation.status == DonationStatus::Cancelled => {
                        Ok(CheckoutOutcome::Cancelled(donation))
                    }
                    Some(donation) if donation.status == DonationStatus::Completed => {
                        Ok(CheckoutOutcome::Completed(donation))
                    }
                    Some(_) => Ok(CheckoutOutcome::Failed {
                        reason: "Payment failed at the provider".to_string(),
                    }),
                    None => Ok(CheckoutOutcome::InvalidSession),
                }
            }
        }
    }

    async fn redeem(&self, session_token: Option<&str>) -> AppResult<Option<CheckoutCorrelation>> {
        let Some(token) = session_token else {
            return Ok(None);
        };
        self.correlator.consume(token).await
    }

    async fn mark_failed_best_effort(&self, correlation: &CheckoutCorrelation) {
        match self
            .ledger
            .finalize_pending(&correlation.order_id, &correlation.tid, DonationStatus::Failed)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(
                    order_id = %correlation.order_id,
                    "donation already finalized while marking failed"
                );
            }
            Err(e) => {
                error!(
                    order_id = %correlation.order_id,
                    error = %e,
                    "failed to mark donation failed after approve error"
                );
            }
        }
    }
}
