//! End-to-end checkout state machine tests over the service layer, using
//! the in-process ledger and session store with a scripted gateway.

use async_trait::async_trait;
use chrono::Utc;
use donation_backend::cache::store::MemoryCache;
use donation_backend::database::donation_repository::{
    CompletionReceipt, DonationLedger, DonationStatus, MemoryLedger, NewDonation,
};
use donation_backend::gateway::error::GatewayResult;
use donation_backend::gateway::types::{
    Approval, CancelReceipt, CheckoutReady, PaymentAmount, ReadyRequest,
};
use donation_backend::gateway::PaymentGateway;
use donation_backend::services::{
    CheckoutOutcome, CheckoutRequest, CheckoutService, SessionCorrelator,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct ScriptedGateway {
    approve_calls: AtomicU32,
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn ready(&self, request: ReadyRequest) -> GatewayResult<CheckoutReady> {
        Ok(CheckoutReady {
            transaction_id: format!("T_{}", request.order_id),
            redirect_url: "https://pay.example.com/checkout".to_string(),
        })
    }

    async fn approve(
        &self,
        transaction_id: &str,
        _approval_token: &str,
        order_id: &str,
        _payer_id: &str,
    ) -> GatewayResult<Approval> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Approval {
            approval_id: format!("A_{}", order_id),
            transaction_id: transaction_id.to_string(),
            amount: PaymentAmount {
                total: 5000,
                tax_free: 0,
                vat: 455,
            },
            payment_method: "MONEY".to_string(),
            approved_at: Utc::now(),
        })
    }

    async fn cancel(
        &self,
        transaction_id: &str,
        amount: i64,
        _tax_free_amount: i64,
    ) -> GatewayResult<CancelReceipt> {
        Ok(CancelReceipt {
            transaction_id: transaction_id.to_string(),
            status: "CANCEL_PAYMENT".to_string(),
            canceled_amount: amount,
        })
    }
}

struct World {
    ledger: Arc<MemoryLedger>,
    gateway: Arc<ScriptedGateway>,
    service: CheckoutService,
}

fn world() -> World {
    let ledger = Arc::new(MemoryLedger::new());
    let gateway = Arc::new(ScriptedGateway::default());
    let correlator = SessionCorrelator::new(Arc::new(MemoryCache::new()), 900);
    let service = CheckoutService::new(
        ledger.clone(),
        gateway.clone(),
        correlator,
        "http://localhost:3000",
    );
    World {
        ledger,
        gateway,
        service,
    }
}

fn request() -> CheckoutRequest {
    CheckoutRequest {
        name: "Kim".to_string(),
        email: "a@b.com".to_string(),
        amount: 5000,
        message: Some("화이팅!".to_string()),
    }
}

#[tokio::test]
async fn full_success_flow_creates_one_completed_donation() {
    let w = world();

    let started = w.service.start(request()).await.expect("start");
    assert_eq!(w.ledger.len(), 1);
    assert_eq!(
        w.ledger.get(&started.order_id).unwrap().status,
        DonationStatus::Pending
    );

    let outcome = w
        .service
        .complete(Some(&started.session_token), "pg_token_xyz")
        .await
        .expect("complete");

    let CheckoutOutcome::Completed(donation) = outcome else {
        panic!("expected completed outcome, got {:?}", outcome);
    };
    assert_eq!(donation.status, DonationStatus::Completed);
    assert_eq!(donation.amount, 5000);
    assert!(donation.approval_id.is_some());
    assert!(donation.completed_at.is_some());
    assert_eq!(w.gateway.approve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(w.ledger.len(), 1);
}

#[tokio::test]
async fn concurrent_finalizers_race_with_exactly_one_winner() {
    let ledger = Arc::new(MemoryLedger::new());
    let row = ledger
        .create_pending(NewDonation {
            order_id: "donation_race".to_string(),
            donor_name: "Kim".to_string(),
            donor_email: "a@b.com".to_string(),
            amount: 5000,
            message: None,
            tid: "T_race".to_string(),
        })
        .await
        .expect("create");
    assert_eq!(row.status, DonationStatus::Pending);

    let complete = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            ledger
                .complete_pending(
                    "donation_race",
                    "T_race",
                    CompletionReceipt {
                        approval_id: "A_race".to_string(),
                        payment_method: "MONEY".to_string(),
                    },
                )
                .await
                .expect("complete")
        })
    };
    let cancel = {
        let ledger = ledger.clone();
        tokio::spawn(async move {
            ledger
                .finalize_pending("donation_race", "T_race", DonationStatus::Cancelled)
                .await
                .expect("finalize")
        })
    };

    let (completed, cancelled) = (complete.await.unwrap(), cancel.await.unwrap());
    assert!(
        completed.is_some() ^ cancelled.is_some(),
        "exactly one finalizer must win; got complete={:?} cancel={:?}",
        completed.map(|d| d.status),
        cancelled.map(|d| d.status),
    );

    let row = ledger.get("donation_race").expect("row exists");
    assert!(row.status.is_terminal());
}

#[tokio::test]
async fn consumed_correlation_rejects_replayed_callback() {
    let w = world();
    let started = w.service.start(request()).await.expect("start");

    let first = w
        .service
        .complete(Some(&started.session_token), "pg_token_xyz")
        .await
        .expect("complete");
    assert!(matches!(first, CheckoutOutcome::Completed(_)));

    let replay = w
        .service
        .complete(Some(&started.session_token), "pg_token_xyz")
        .await
        .expect("complete");
    assert!(matches!(replay, CheckoutOutcome::InvalidSession));

    // Still exactly one approve and one completed row.
    assert_eq!(w.gateway.approve_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        w.ledger.get(&started.order_id).unwrap().status,
        DonationStatus::Completed
    );
}

#[tokio::test]
async fn expired_correlation_never_finalizes_a_donation() {
    let ledger = Arc::new(MemoryLedger::new());
    let gateway = Arc::new(ScriptedGateway::default());
    let correlator = SessionCorrelator::new(Arc::new(MemoryCache::new()), 0);
    let service = CheckoutService::new(
        ledger.clone(),
        gateway.clone(),
        correlator,
        "http://localhost:3000",
    );

    let started = service.start(request()).await.expect("start");
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let outcome = service
        .complete(Some(&started.session_token), "pg_token_xyz")
        .await
        .expect("complete");
    assert!(matches!(outcome, CheckoutOutcome::InvalidSession));
    assert_eq!(gateway.approve_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        ledger.get(&started.order_id).unwrap().status,
        DonationStatus::Pending
    );
}

#[tokio::test]
async fn cancel_callback_yields_cancelled_donation() {
    let w = world();
    let started = w.service.start(request()).await.expect("start");

    let outcome = w
        .service
        .cancel(Some(&started.session_token))
        .await
        .expect("cancel");
    let CheckoutOutcome::Cancelled(donation) = outcome else {
        panic!("expected cancelled outcome");
    };
    assert_eq!(donation.status, DonationStatus::Cancelled);
    assert_eq!(w.gateway.approve_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn below_minimum_amount_never_reaches_gateway_or_ledger() {
    let w = world();
    let mut bad = request();
    bad.amount = 500;

    assert!(w.service.start(bad).await.is_err());
    assert!(w.ledger.is_empty());
}

#[tokio::test]
async fn each_checkout_gets_a_distinct_order_id() {
    let w = world();
    let a = w.service.start(request()).await.expect("start");
    let b = w.service.start(request()).await.expect("start");

    assert_ne!(a.order_id, b.order_id);
    assert_eq!(w.ledger.len(), 2);
}
