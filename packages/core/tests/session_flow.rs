//! End-to-end session flow: share bandwidth, accrue, disconnect, settle
//! through the payments backend and withdraw.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use peershare::ledger::{
    AccrualLedger, ConnectionStatus, LedgerError, PeerInfo, PeerLocation, TransactionKind,
    TransactionStatus, MINIMUM_WITHDRAWAL,
};
use peershare::nodes::NodeDirectory;
use peershare::pricing::{DemandLevel, PricingEngine};
use peershare::services::{HttpPaymentProcessor, ProcessorError, SimulatedProcessor};
use peershare::session::SessionStore;
use peershare::settings::ShareSettings;

fn neighbour() -> PeerInfo {
    PeerInfo {
        peer_id: "peer-42".to_string(),
        peer_name: "Neighbour".to_string(),
        location: PeerLocation {
            latitude: 40.7128,
            longitude: -74.0060,
            address: "Next door".to_string(),
            distance_km: 1.0,
        },
    }
}

fn heavy_user_session() -> SessionStore {
    SessionStore::new(
        PricingEngine::default(),
        NodeDirectory::demo(),
        ShareSettings::default(),
    )
    .with_accrual(AccrualLedger::new(100.0))
}

#[tokio::test]
async fn provider_earns_settles_and_withdraws() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .and(body_partial_json(json!({ "amount": 1250 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_settled",
            "amount": 1250,
            "currency": "USD",
            "status": "succeeded"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let backend = HttpPaymentProcessor::new(server.uri(), None);

    let mut session = heavy_user_session();
    let id = session.accept_peer(neighbour(), DemandLevel::High).unwrap();
    session.mark_connected(&id).unwrap();
    assert_eq!(session.connection(&id).unwrap().pricing.current_rate, 0.125);

    assert_eq!(session.tick(3600), 1);
    assert_eq!(session.connection(&id).unwrap().earnings(), Some(12.5));

    let tx_id = session.disconnect(&id).unwrap().expect("accrued amount is booked");
    assert_eq!(
        session.connection(&id).unwrap().status,
        ConnectionStatus::Disconnected
    );
    assert_eq!(session.ledger().total_earnings(), 0.0);

    let tx = session.settle(&tx_id, &backend).await.unwrap();
    assert_eq!(tx.kind, TransactionKind::Earning);
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.processor_reference.as_deref(), Some("pi_settled"));
    assert_eq!(session.ledger().total_earnings(), 12.5);
    assert_eq!(session.ledger().recompute_totals(), session.ledger().totals());

    assert!(session.ledger().available_balance() >= MINIMUM_WITHDRAWAL);
    let payout = session
        .withdraw(&SimulatedProcessor::instant(), "acct_1")
        .await
        .unwrap();
    assert_eq!(payout.amount, 12.5);
    assert_eq!(session.ledger().available_balance(), 0.0);

    let err = session
        .withdraw(&SimulatedProcessor::instant(), "acct_1")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BelowMinimum { .. }));
}

#[tokio::test]
async fn backend_failure_leaves_transaction_pending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let backend = HttpPaymentProcessor::new(server.uri(), None);

    let mut session = heavy_user_session();
    let id = session.connect_to_node("node-001", DemandLevel::Low).unwrap();
    session.mark_connected(&id).unwrap();
    session.tick(60);
    let tx_id = session.disconnect(&id).unwrap().unwrap();

    let err = session.settle(&tx_id, &backend).await.unwrap_err();
    assert!(matches!(err, LedgerError::Processor(_)));

    let tx = session.ledger().get(&tx_id).unwrap();
    assert_eq!(tx.kind, TransactionKind::Payment);
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(session.ledger().total_spent(), 0.0);

    session.reject(&tx_id).unwrap();
    assert_eq!(
        session.ledger().get(&tx_id).unwrap().status,
        TransactionStatus::Failed
    );
    assert!(matches!(
        session.settle(&tx_id, &backend).await,
        Err(LedgerError::TransactionFinalized { .. })
    ));
}

#[tokio::test]
async fn unconfirmed_intent_does_not_settle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_needs_card",
            "amount": 1250,
            "currency": "USD",
            "status": "requires_payment_method"
        })))
        .expect(1)
        .mount(&server)
        .await;
    let backend = HttpPaymentProcessor::new(server.uri(), None);

    let mut session = heavy_user_session();
    let id = session.accept_peer(neighbour(), DemandLevel::High).unwrap();
    session.mark_connected(&id).unwrap();
    session.tick(3600);
    let tx_id = session.disconnect(&id).unwrap().unwrap();

    let err = session.settle(&tx_id, &backend).await.unwrap_err();
    match err {
        LedgerError::Processor(ProcessorError::Rejected { message }) => {
            assert!(message.contains("requires_payment_method"))
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let tx = session.ledger().get(&tx_id).unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert!(tx.processor_reference.is_none());
    assert_eq!(session.ledger().total_earnings(), 0.0);
}
