/// End-to-end payment flow against the scripted gateway
///
/// Covers the path a user takes through an upgrade:
/// - checkout hand-off with a normalized origin
/// - return URL interpretation
/// - reconciliation to a terminal view

use pennywise_payments::checkout::begin_checkout;
use pennywise_payments::mock::{CountingSink, MockGateway};
use pennywise_payments::{
    parse_return, GatewayError, PaymentReconciler, PaymentReturn, PaymentStatusResponse,
    ReconcileOutcome, ReconcileStatus, ReconcileView, ReconcilerConfig,
};
use pennywise_shared::auth::gate::Route;
use std::sync::Arc;
use std::time::Duration;

fn return_url_for(session_id: &str) -> String {
    format!("https://app.example/payment/success?session_id={}", session_id)
}

#[tokio::test(start_paused = true)]
async fn test_checkout_then_confirmed_upgrade() {
    let gateway = Arc::new(
        MockGateway::new()
            .then_pending(2)
            .then_status(PaymentStatusResponse::paid(4.99, "eur")),
    );
    let sink = Arc::new(CountingSink::new());

    let checkout = begin_checkout(gateway.as_ref(), "https://app.example/")
        .await
        .unwrap();
    let session_id = checkout.session_id.unwrap();

    let PaymentReturn::Reconcile { session_id } = parse_return(&return_url_for(&session_id)) else {
        panic!("expected a session id in the return URL");
    };

    let reconciler = PaymentReconciler::new(
        session_id,
        gateway.clone(),
        sink.clone(),
        ReconcilerConfig::default(),
    );
    let outcome = reconciler.start().unwrap().finished().await;

    assert_eq!(outcome, ReconcileOutcome::Finished(ReconcileStatus::Success));
    assert_eq!(gateway.polls(), 3);
    assert_eq!(sink.upgrades(), 1);
    assert_eq!(
        reconciler.view(),
        ReconcileView::Success {
            continue_to: Route::Insights,
            amount: Some(4.99),
            currency: Some("eur".to_string()),
        }
    );
}

#[tokio::test]
async fn test_return_without_session_goes_to_settings() {
    assert_eq!(
        parse_return("https://app.example/payment/success"),
        PaymentReturn::Redirect(Route::Settings)
    );
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_checkout_offers_retry() {
    let gateway = Arc::new(MockGateway::new().then_status(PaymentStatusResponse::expired()));
    let sink = Arc::new(CountingSink::new());

    let reconciler =
        PaymentReconciler::new("cs_gone", gateway, sink.clone(), ReconcilerConfig::default());
    reconciler.start().unwrap().finished().await;

    assert_eq!(
        reconciler.view(),
        ReconcileView::Failed {
            retry_to: Route::Settings
        }
    );
    assert_eq!(sink.upgrades(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_flaky_backend_times_out_with_custom_budget() {
    let gateway = Arc::new(
        MockGateway::new()
            .then_error(GatewayError::Transport("timeout".to_string()))
            .then_pending(1)
            .then_error(GatewayError::InvalidResponse("truncated body".to_string())),
    );
    let sink = Arc::new(CountingSink::new());
    let config = ReconcilerConfig::new(Duration::from_millis(250), 3);

    let reconciler = PaymentReconciler::new("cs_flaky", gateway.clone(), sink, config);
    let mut progress = reconciler.subscribe();
    let task = reconciler.start().unwrap();

    let mut seen = Vec::new();
    while progress.changed().await.is_ok() {
        let state = progress.borrow_and_update().clone();
        seen.push(state.attempt_count);
        if state.status.is_terminal() {
            break;
        }
    }

    assert_eq!(task.finished().await, ReconcileOutcome::Finished(ReconcileStatus::TimedOut));
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(gateway.polls(), 3);
    assert_eq!(
        reconciler.view(),
        ReconcileView::TimedOut {
            retry_to: Route::Settings
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_leaving_the_page_stops_reconciliation() {
    let gateway = Arc::new(MockGateway::new());
    let sink = Arc::new(CountingSink::new());

    let reconciler =
        PaymentReconciler::new("cs_left", gateway.clone(), sink, ReconcilerConfig::default());
    let task = reconciler.start().unwrap();

    tokio::time::sleep(Duration::from_millis(4100)).await;
    assert_eq!(gateway.polls(), 3);

    task.cancel();
    assert_eq!(task.finished().await, ReconcileOutcome::Cancelled);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(gateway.polls(), 3);
    assert_eq!(reconciler.status(), ReconcileStatus::Checking);
}
