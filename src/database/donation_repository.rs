//! Donation ledger
//!
//! The single source of truth for donation status transitions. Every
//! finalization goes through an atomic find-and-update so concurrent
//! callbacks for the same order race in the database and at most one wins.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Donation lifecycle status. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "donation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl DonationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DonationStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Completed => "completed",
            DonationStatus::Cancelled => "cancelled",
            DonationStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Donation entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Donation {
    pub id: Uuid,
    /// Caller-generated correlation key, unique across all donations
    pub order_id: String,
    pub donor_name: String,
    pub donor_email: String,
    /// Integer KRW, immutable after creation
    pub amount: i64,
    pub message: Option<String>,
    /// Gateway transaction id issued by the `ready` call
    pub tid: String,
    pub status: DonationStatus,
    pub payment_method: String,
    /// Gateway approval id, set on completion
    pub approval_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a new pending donation
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub order_id: String,
    pub donor_name: String,
    pub donor_email: String,
    pub amount: i64,
    pub message: Option<String>,
    pub tid: String,
}

/// Completion details recorded from the gateway approve response
#[derive(Debug, Clone)]
pub struct CompletionReceipt {
    pub approval_id: String,
    pub payment_method: String,
}

const DONATION_COLUMNS: &str = "id, order_id, donor_name, donor_email, amount, message, tid, \
     status, payment_method, approval_id, created_at, updated_at, completed_at";

/// Storage seam for the donation ledger. The checkout orchestrator depends
/// on this trait so the state machine can be exercised without a database.
#[async_trait]
pub trait DonationLedger: Send + Sync {
    /// Insert a new donation in `pending` status. Fails with a duplicate
    /// error if the order id already exists.
    async fn create_pending(&self, donation: NewDonation) -> Result<Donation, DatabaseError>;

    /// Look up a donation by its correlation pair without mutating it.
    async fn find_by_correlation(
        &self,
        order_id: &str,
        tid: &str,
    ) -> Result<Option<Donation>, DatabaseError>;

    /// Atomically transition a still-pending donation to `completed`,
    /// recording the approval receipt and `completed_at`. Returns `None`
    /// when no matching pending row exists (already finalized, or the
    /// correlation was forged).
    async fn complete_pending(
        &self,
        order_id: &str,
        tid: &str,
        receipt: CompletionReceipt,
    ) -> Result<Option<Donation>, DatabaseError>;

    /// Atomically transition a still-pending donation to `cancelled` or
    /// `failed`. Terminal rows are never touched; `None` means no pending
    /// row matched.
    async fn finalize_pending(
        &self,
        order_id: &str,
        tid: &str,
        status: DonationStatus,
    ) -> Result<Option<Donation>, DatabaseError>;
}

/// Postgres-backed donation ledger
pub struct DonationRepository {
    pool: PgPool,
}

impl DonationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DonationLedger for DonationRepository {
    async fn create_pending(&self, donation: NewDonation) -> Result<Donation, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "INSERT INTO donations \
             (order_id, donor_name, donor_email, amount, message, tid, status, payment_method) \
             VALUES ($1, $2, $3, $4, $5, $6, 'pending', 'kakao_pay') \
             RETURNING {}",
            DONATION_COLUMNS
        ))
        .bind(&donation.order_id)
        .bind(&donation.donor_name)
        .bind(&donation.donor_email)
        .bind(donation.amount)
        .bind(&donation.message)
        .bind(&donation.tid)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_correlation(
        &self,
        order_id: &str,
        tid: &str,
    ) -> Result<Option<Donation>, DatabaseError> {
        sqlx::query_as::<_, Donation>(&format!(
            "SELECT {} FROM donations WHERE order_id = $1 AND tid = $2",
            DONATION_COLUMNS
        ))
        .bind(order_id)
        .bind(tid)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn complete_pending(
        &self,
        order_id: &str,
        tid: &str,
        receipt: CompletionReceipt,
    ) -> Result<Option<Donation>, DatabaseError> {
        // Single statement: the `status = 'pending'` guard makes concurrent
        // finalizers race in the database with exactly one winner.
        sqlx::query_as::<_, Donation>(&format!(
            "UPDATE donations \
             SET status = 'completed', approval_id = $3, payment_method = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE order_id = $1 AND tid = $2 AND status = 'pending' \
             RETURNING {}",
            DONATION_COLUMNS
        ))
        .bind(order_id)
        .bind(tid)
        .bind(&receipt.approval_id)
        .bind(&receipt.payment_method)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn finalize_pending(
        &self,
        order_id: &str,
        tid: &str,
        status: DonationStatus,
    ) -> Result<Option<Donation>, DatabaseError> {
        debug_assert!(status.is_terminal() && status != DonationStatus::Completed);

        sqlx::query_as::<_, Donation>(&format!(
            "UPDATE donations \
             SET status = $3, updated_at = NOW() \
             WHERE order_id = $1 AND tid = $2 AND status = 'pending' \
             RETURNING {}",
            DONATION_COLUMNS
        ))
        .bind(order_id)
        .bind(tid)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

/// In-process ledger with the same atomic transition semantics, keyed by
/// order id. Used by the test suite to exercise the checkout state machine
/// without a database.
#[derive(Default)]
pub struct MemoryLedger {
    rows: std::sync::Mutex<std::collections::HashMap<String, Donation>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_id: &str) -> Option<Donation> {
        self.rows
            .lock()
            .expect("ledger lock poisoned")
            .get(order_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("ledger lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DonationLedger for MemoryLedger {
    async fn create_pending(&self, donation: NewDonation) -> Result<Donation, DatabaseError> {
        let mut rows = self.rows.lock().expect("ledger lock poisoned");
        if rows.contains_key(&donation.order_id) {
            return Err(DatabaseError::new(DatabaseErrorKind::Duplicate {
                constraint: "donations_order_id_key".to_string(),
            }));
        }

        let now = Utc::now();
        let row = Donation {
            id: Uuid::new_v4(),
            order_id: donation.order_id.clone(),
            donor_name: donation.donor_name,
            donor_email: donation.donor_email,
            amount: donation.amount,
            message: donation.message,
            tid: donation.tid,
            status: DonationStatus::Pending,
            payment_method: "kakao_pay".to_string(),
            approval_id: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        rows.insert(donation.order_id, row.clone());
        Ok(row)
    }

    async fn find_by_correlation(
        &self,
        order_id: &str,
        tid: &str,
    ) -> Result<Option<Donation>, DatabaseError> {
        let rows = self.rows.lock().expect("ledger lock poisoned");
        Ok(rows.get(order_id).filter(|d| d.tid == tid).cloned())
    }

    async fn complete_pending(
        &self,
        order_id: &str,
        tid: &str,
        receipt: CompletionReceipt,
    ) -> Result<Option<Donation>, DatabaseError> {
        let mut rows = self.rows.lock().expect("ledger lock poisoned");
        let Some(row) = rows
            .get_mut(order_id)
            .filter(|d| d.tid == tid && d.status == DonationStatus::Pending)
        else {
            return Ok(None);
        };

        let now = Utc::now();
        row.status = DonationStatus::Completed;
        row.approval_id = Some(receipt.approval_id);
        row.payment_method = receipt.payment_method;
        row.completed_at = Some(now);
        row.updated_at = now;
        Ok(Some(row.clone()))
    }

    async fn finalize_pending(
        &self,
        order_id: &str,
        tid: &str,
        status: DonationStatus,
    ) -> Result<Option<Donation>, DatabaseError> {
        debug_assert!(status.is_terminal() && status != DonationStatus::Completed);

        let mut rows = self.rows.lock().expect("ledger lock poisoned");
        let Some(row) = rows
            .get_mut(order_id)
            .filter(|d| d.tid == tid && d.status == DonationStatus::Pending)
        else {
            return Ok(None);
        };

        row.status = status;
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!DonationStatus::Pending.is_terminal());
        assert!(DonationStatus::Completed.is_terminal());
        assert!(DonationStatus::Cancelled.is_terminal());
        assert!(DonationStatus::Failed.is_terminal());
    }

    #[test]
    fn status_display_matches_column_values() {
        assert_eq!(DonationStatus::Pending.to_string(), "pending");
        assert_eq!(DonationStatus::Completed.to_string(), "completed");
        assert_eq!(DonationStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(DonationStatus::Failed.to_string(), "failed");
    }
}
