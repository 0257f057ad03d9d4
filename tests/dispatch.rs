use std::sync::Arc;
use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolValue;
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

use tokenops::ledger::mock::{MockLedger, MockOutcome};
use tokenops::operation::{Hold, Transfer};
use tokenops::{
    Amount, Capability, Dispatcher, EntityId, ErrorKind, Explorer, Network, Operation,
    OperationRequest, Payload, StaticCapabilities, Surface, TokenRef, TransactionResponse,
};
use tokenops_signer::dfns::{DfnsClient, DfnsCtx};
use tokenops_signer::mock::ScriptedApi;
use tokenops_signer::{
    ChannelSession, CustodialSigner, LocalKeySigner, PollConfig, RemoteStatus, SigningResult,
    SigningStrategy, WalletSessionSigner, verify_secp256k1,
};

const OPERATOR: EntityId = EntityId::new(0, 0, 1001);

fn token() -> TokenRef {
    TokenRef {
        token_id: EntityId::new(0, 0, 5005),
        contract: Some(EntityId::new(0, 0, 5006)),
        treasury: EntityId::new(0, 0, 5006),
        decimals: 2,
    }
}

fn amount(value: &str) -> Amount {
    Amount::parse(value, 2).unwrap()
}

fn capabilities(entries: &[(Operation, Surface)]) -> Arc<StaticCapabilities> {
    Arc::new(StaticCapabilities::new().with_token(
        token().token_id,
        entries
            .iter()
            .map(|(operation, surface)| Capability::new(*operation, *surface))
            .collect(),
    ))
}

fn dispatcher(
    ledger: &Arc<MockLedger>,
    signer: SigningStrategy,
    entries: &[(Operation, Surface)],
) -> Dispatcher {
    Dispatcher::new(
        ledger.clone(),
        signer,
        capabilities(entries),
        OPERATOR,
        Explorer::hashscan(Network::Testnet).unwrap(),
    )
}

fn local_signer() -> (SigningStrategy, alloy::primitives::Address) {
    let signer = LocalKeySigner::new(PrivateKeySigner::random());
    let address = signer.address();
    (SigningStrategy::LocalKey(signer), address)
}

fn submitted_json(ledger: &MockLedger) -> Value {
    let submitted = ledger.submitted();
    assert_eq!(submitted.len(), 1);
    serde_json::from_slice(&submitted[0].body).unwrap()
}

fn assert_failed(response: &TransactionResponse, kind: ErrorKind) {
    assert!(!response.is_success(), "expected failure, got {response:?}");
    assert!(response.payload().is_none());
    assert_eq!(response.error().unwrap().kind, kind, "{response:?}");
}

#[tokio::test]
async fn burn_routes_to_contract_surface_and_is_signed_by_local_key() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, address) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[(Operation::Burn, Surface::Contract)]);

    let response = dispatcher
        .execute(
            &token(),
            &OperationRequest::Burn {
                amount: amount("10.00"),
            },
        )
        .await;

    assert!(response.is_success(), "{response:?}");
    assert!(response.error().is_none());
    assert_eq!(response.payload(), Some(&Payload::Settled));
    assert_eq!(ledger.submissions(), 1);

    let body = submitted_json(&ledger);
    assert_eq!(body["body"]["surface"], "contract");
    assert_eq!(body["body"]["function"], "burn");
    assert_eq!(body["body"]["contract"], "0.0.5006");
    assert_eq!(body["transaction_id"], response.id().unwrap().to_string());

    let artifact = &ledger.submitted()[0];
    let SigningResult::Signature(signature) = &artifact.signature else {
        panic!("local key returns a detached signature");
    };
    assert!(verify_secp256k1(&artifact.body, signature, address).unwrap());
}

#[tokio::test]
async fn native_capability_builds_native_body() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(
        &ledger,
        signer,
        &[(Operation::Freeze, Surface::Native)],
    );

    let response = dispatcher
        .execute(
            &token(),
            &OperationRequest::Freeze {
                target: EntityId::new(0, 0, 7),
            },
        )
        .await;

    assert!(response.is_success(), "{response:?}");
    let body = submitted_json(&ledger);
    assert_eq!(body["body"]["surface"], "native");
    assert_eq!(body["body"]["type"], "token_freeze");
}

#[tokio::test]
async fn batch_transfer_debits_sender_on_native_surface() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[(Operation::Transfers, Surface::Native)]);

    let response = dispatcher
        .execute(
            &token(),
            &OperationRequest::Transfers {
                from: token().treasury,
                transfers: vec![
                    Transfer {
                        to: EntityId::new(0, 0, 21),
                        amount: amount("1.00"),
                    },
                    Transfer {
                        to: EntityId::new(0, 0, 22),
                        amount: amount("2.50"),
                    },
                ],
            },
        )
        .await;

    assert!(response.is_success(), "{response:?}");
    let body = submitted_json(&ledger);
    assert_eq!(body["body"]["type"], "crypto_transfer");
    assert_eq!(
        body["body"]["transfers"],
        json!([
            {"account": "0.0.21", "amount": 100},
            {"account": "0.0.22", "amount": 250},
            {"account": "0.0.5006", "amount": -350},
        ])
    );
}

#[tokio::test]
async fn empty_capabilities_forbid_cash_in_without_touching_the_network() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[]);

    let response = dispatcher
        .execute(
            &token(),
            &OperationRequest::CashIn {
                target: EntityId::new(0, 0, 5006),
                amount: amount("1.00"),
            },
        )
        .await;

    assert_failed(&response, ErrorKind::OperationNotAllowed);
    let error = response.error().unwrap();
    assert!(error.message.contains("0.0.1001"), "{}", error.message);
    assert!(error.message.contains("cash_in"), "{}", error.message);
    assert!(error.message.contains("0.0.5005"), "{}", error.message);
    assert!(error.transaction_id.is_none());
    assert!(error.explorer_url.is_none());
    assert!(response.id().is_none());
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn capability_for_another_operation_does_not_leak() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(
        &ledger,
        signer,
        &[
            (Operation::Pause, Surface::Native),
            (Operation::Unpause, Surface::Contract),
        ],
    );

    let forbidden = [
        OperationRequest::Delete,
        OperationRequest::Wipe {
            target: EntityId::new(0, 0, 7),
            amount: amount("1"),
        },
        OperationRequest::GrantKyc {
            target: EntityId::new(0, 0, 7),
        },
        OperationRequest::RescueHbar {
            amount: Amount::parse("1", 8).unwrap(),
        },
    ];

    for request in &forbidden {
        let response = dispatcher.execute(&token(), request).await;
        assert_failed(&response, ErrorKind::OperationNotAllowed);
        assert!(!response.error().unwrap().is_retryable());
    }

    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn create_hold_decodes_contract_return_values() {
    let return_data = Bytes::from((true, U256::from(42)).abi_encode_params());
    let ledger = Arc::new(MockLedger::new(MockOutcome::Success {
        call_result: Some(return_data),
    }));
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(
        &ledger,
        signer,
        &[(Operation::CreateHold, Surface::Contract)],
    );

    let request = OperationRequest::CreateHold {
        hold: Hold {
            amount: amount("3.50"),
            escrow: EntityId::new(0, 0, 8),
            expiration: Utc.timestamp_opt(1_900_000_000, 0).unwrap(),
            destination: None,
            data: Bytes::new(),
        },
    };

    let response = dispatcher.execute(&token(), &request).await;

    let Some(Payload::Decoded(values)) = response.payload() else {
        panic!("expected decoded payload, got {response:?}");
    };
    assert_eq!(
        values,
        &vec![DynSolValue::Bool(true), DynSolValue::Uint(U256::from(42), 256)]
    );
}

#[tokio::test]
async fn empty_return_data_is_an_invalid_response_with_transaction_id() {
    let ledger = Arc::new(MockLedger::new(MockOutcome::Success {
        call_result: Some(Bytes::new()),
    }));
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(
        &ledger,
        signer,
        &[(Operation::CreateHold, Surface::Contract)],
    );

    let request = OperationRequest::CreateHold {
        hold: Hold {
            amount: amount("1"),
            escrow: EntityId::new(0, 0, 8),
            expiration: Utc.timestamp_opt(1_900_000_000, 0).unwrap(),
            destination: Some(EntityId::new(0, 0, 9)),
            data: Bytes::new(),
        },
    };

    let response = dispatcher.execute(&token(), &request).await;

    assert_failed(&response, ErrorKind::InvalidResponse);
    let error = response.error().unwrap();
    assert!(error.message.contains("createHold"), "{}", error.message);
    assert!(error.transaction_id.is_some());
    assert_eq!(response.id(), error.transaction_id);
    assert_eq!(ledger.submissions(), 1);
}

#[tokio::test]
async fn settlement_failure_carries_transaction_id_and_explorer_link() {
    let ledger = Arc::new(MockLedger::new(MockOutcome::SettlementFailure(
        "INSUFFICIENT_TOKEN_BALANCE".to_string(),
    )));
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[(Operation::Wipe, Surface::Native)]);

    let response = dispatcher
        .execute(
            &token(),
            &OperationRequest::Wipe {
                target: EntityId::new(0, 0, 7),
                amount: amount("5.00"),
            },
        )
        .await;

    assert_failed(&response, ErrorKind::SettlementFailed);
    let error = response.error().unwrap();
    let id = error.transaction_id.unwrap();
    assert_eq!(id.payer, OPERATOR);
    assert!(error.message.contains("INSUFFICIENT_TOKEN_BALANCE"));
    assert_eq!(
        error.explorer_url.as_ref().unwrap().as_str(),
        format!(
            "https://hashscan.io/testnet/transactionsById/{}",
            id.to_path_segment()
        )
    );
}

#[tokio::test]
async fn submission_failure_is_retryable_and_keeps_the_id() {
    let ledger = Arc::new(MockLedger::new(MockOutcome::SubmitError(
        "BUSY".to_string(),
    )));
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[(Operation::Pause, Surface::Native)]);

    let response = dispatcher.execute(&token(), &OperationRequest::Pause).await;

    assert_failed(&response, ErrorKind::NetworkSubmissionFailed);
    let error = response.error().unwrap();
    assert!(error.is_retryable());
    assert!(error.transaction_id.is_some());
    assert!(error.explorer_url.is_some());
}

#[tokio::test]
async fn amount_with_wrong_scale_is_rejected_before_signing() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[(Operation::Burn, Surface::Native)]);

    let response = dispatcher
        .execute(
            &token(),
            &OperationRequest::Burn {
                amount: Amount::parse("1.5", 6).unwrap(),
            },
        )
        .await;

    assert_failed(&response, ErrorKind::InvalidRequest);
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn uninitialized_wallet_session_is_reported_distinctly() {
    let ledger = Arc::new(MockLedger::succeeding());
    let dispatcher = dispatcher(
        &ledger,
        SigningStrategy::WalletSession(WalletSessionSigner::uninitialized()),
        &[(Operation::Pause, Surface::Native)],
    );

    let response = dispatcher.execute(&token(), &OperationRequest::Pause).await;

    assert_failed(&response, ErrorKind::SessionNotInitialized);
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn paired_wallet_session_submits_signed_transaction() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (session, mut remote) = ChannelSession::pair("0.0.1001");
    let dispatcher = dispatcher(
        &ledger,
        SigningStrategy::WalletSession(WalletSessionSigner::new(Arc::new(session))),
        &[(Operation::Unpause, Surface::Native)],
    );

    let wallet = tokio::spawn(async move {
        let pending = remote.next().await.unwrap();
        let mut signed = pending.payload.to_vec();
        signed.extend_from_slice(b"|sig");
        pending.approve(Bytes::from(signed));
    });

    let response = dispatcher.execute(&token(), &OperationRequest::Unpause).await;
    wallet.await.unwrap();

    assert!(response.is_success(), "{response:?}");
    let artifact = &ledger.submitted()[0];
    let SigningResult::SignedTransaction(signed) = &artifact.signature else {
        panic!("wallet session returns the signed transaction");
    };
    assert!(signed.ends_with(b"|sig"));
    assert!(signed.starts_with(&artifact.body));
}

#[tokio::test]
async fn wallet_rejection_is_a_signing_error() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (session, mut remote) = ChannelSession::pair("0.0.1001");
    let dispatcher = dispatcher(
        &ledger,
        SigningStrategy::WalletSession(WalletSessionSigner::new(Arc::new(session))),
        &[(Operation::Unpause, Surface::Native)],
    );

    let wallet = tokio::spawn(async move {
        remote.next().await.unwrap().reject("user declined");
    });

    let response = dispatcher.execute(&token(), &OperationRequest::Unpause).await;
    wallet.await.unwrap();

    assert_failed(&response, ErrorKind::SigningError);
    assert!(response.error().unwrap().message.contains("user declined"));
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test(start_paused = true)]
async fn custodial_timeout_is_a_retryable_signing_error() {
    let ledger = Arc::new(MockLedger::succeeding());
    let api = Arc::new(ScriptedApi::new(vec![RemoteStatus::Pending; 3]));
    let signer = CustodialSigner::new(
        api.clone(),
        PollConfig {
            max_attempts: 3,
            interval: Duration::from_secs(1),
        },
    );
    let dispatcher = dispatcher(
        &ledger,
        SigningStrategy::Fireblocks(signer),
        &[(Operation::Pause, Surface::Native)],
    );

    let response = dispatcher.execute(&token(), &OperationRequest::Pause).await;

    assert_failed(&response, ErrorKind::SigningError);
    let error = response.error().unwrap();
    assert!(error.is_retryable());
    assert!(error.message.contains("increase poll attempts"), "{}", error.message);
    assert_eq!(api.status_calls(), 3);
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
async fn dfns_signature_flows_into_submission() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/wallets/wa-1/signatures");
        then.status(200)
            .json_body(json!({"id": "sig-1", "status": "Pending"}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/wallets/wa-1/signatures/sig-1");
        then.status(200).json_body(json!({
            "id": "sig-1",
            "status": "Signed",
            "signature": {"r": format!("0x{}", "11".repeat(32)), "s": format!("0x{}", "22".repeat(32))}
        }));
    });

    let client = DfnsClient::new(DfnsCtx {
        base_url: server.base_url().parse().unwrap(),
        app_id: "ap-test".to_string(),
        auth_token: "token".to_string(),
        wallet_id: "wa-1".to_string(),
    });
    let signer = CustodialSigner::new(
        Arc::new(client),
        PollConfig {
            max_attempts: 3,
            interval: Duration::from_millis(10),
        },
    );
    let ledger = Arc::new(MockLedger::succeeding());
    let dispatcher = dispatcher(
        &ledger,
        SigningStrategy::Dfns(signer),
        &[(Operation::GrantKyc, Surface::Contract)],
    );

    let response = dispatcher
        .execute(
            &token(),
            &OperationRequest::GrantKyc {
                target: EntityId::new(0, 0, 7),
            },
        )
        .await;

    assert!(response.is_success(), "{response:?}");
    let artifact = &ledger.submitted()[0];
    let mut expected = vec![0x11; 32];
    expected.extend([0x22; 32]);
    assert_eq!(artifact.signature, SigningResult::Signature(Bytes::from(expected)));
}

#[tokio::test]
async fn cancelled_request_never_reaches_the_ledger() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[(Operation::Pause, Surface::Native)]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let response = dispatcher
        .execute_with_cancel(&token(), &OperationRequest::Pause, &cancel)
        .await;

    assert_failed(&response, ErrorKind::Cancelled);
    assert_eq!(ledger.submissions(), 0);
}

#[tokio::test]
#[traced_test]
async fn submission_is_logged_with_explorer_link() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[(Operation::Pause, Surface::Native)]);

    let response = dispatcher.execute(&token(), &OperationRequest::Pause).await;

    assert!(response.is_success());
    assert!(logs_contain("Submitted transaction"));
    assert!(logs_contain("https://hashscan.io/testnet/transactionsById/"));
}

#[tokio::test]
#[traced_test]
async fn failures_are_logged_with_their_kind() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(&ledger, signer, &[]);

    dispatcher.execute(&token(), &OperationRequest::Delete).await;

    assert!(logs_contain("operation_not_allowed"));
}

#[tokio::test]
async fn capability_on_surface_without_builder_is_an_invariant_violation() {
    let ledger = Arc::new(MockLedger::succeeding());
    let (signer, _) = local_signer();
    let dispatcher = dispatcher(
        &ledger,
        signer,
        &[(Operation::UpdateCustomFees, Surface::Contract)],
    );

    let response = dispatcher
        .execute(&token(), &OperationRequest::UpdateCustomFees { fees: Vec::new() })
        .await;

    assert_failed(&response, ErrorKind::InternalInvariantViolation);
    assert!(!response.error().unwrap().is_retryable());
    assert_eq!(ledger.submissions(), 0);
}
