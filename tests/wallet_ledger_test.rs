//! Wallet ledger tests: the cached balance always equals the sum of the
//! transaction log, debits are conditional, and the HTTP surface exposes
//! balance, deposits and paginated history.

mod common;

use axum::http::Method;
use common::{json_body, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use storefront_api::{
    entities::wallet_transaction::WalletTransactionKind, errors::ServiceError,
};

const PASSWORD: &str = "a long and private passphrase";

fn dec_field(body: &Value, field: &str) -> Decimal {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("field {field} should be a decimal string: {body}"))
        .parse()
        .unwrap_or_else(|_| panic!("field {field} should parse as a decimal"))
}

async fn ledger_sum(app: &TestApp, token: &str) -> Decimal {
    let response = app
        .request(
            Method::GET,
            "/api/v1/wallet/transactions?per_page=100",
            None,
            Some(token),
        )
        .await;
    assert_eq!(response.status(), 200);
    json_body(response)
        .await["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| dec_field(entry, "amount"))
        .sum()
}

// ==================== Balance and deposits ====================

#[tokio::test]
async fn new_wallets_start_empty() {
    let app = TestApp::new().await;
    let (token, _) = app.register_customer("fresh@example.com", PASSWORD).await;

    let response = app
        .request(Method::GET, "/api/v1/wallet", None, Some(&token))
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(dec_field(&json_body(response).await, "balance"), Decimal::ZERO);
}

#[tokio::test]
async fn deposit_credits_balance_and_appends_entry() {
    let app = TestApp::new().await;
    let (token, _) = app.register_customer("saver@example.com", PASSWORD).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/wallet/deposit",
            Some(json!({ "amount": "75.50", "description": "Gift card" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 201);

    let body = json_body(response).await;
    assert_eq!(dec_field(&body, "balance"), dec!(75.50));
    assert_eq!(body["transaction"]["kind"], "deposit");
    assert_eq!(dec_field(&body["transaction"], "amount"), dec!(75.50));
    assert_eq!(body["transaction"]["description"], "Gift card");
}

#[tokio::test]
async fn deposit_rejects_non_positive_amounts() {
    let app = TestApp::new().await;
    let (token, customer_id) = app.register_customer("zero@example.com", PASSWORD).await;

    for amount in ["0", "-10.00"] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/wallet/deposit",
                Some(json!({ "amount": amount })),
                Some(&token),
            )
            .await;
        assert_eq!(response.status(), 400, "amount {amount} should be rejected");
    }

    assert_eq!(app.wallet_balance(customer_id).await, Decimal::ZERO);
}

#[tokio::test]
async fn wallet_endpoints_require_authentication() {
    let app = TestApp::new().await;

    for uri in ["/api/v1/wallet", "/api/v1/wallet/transactions"] {
        let response = app.request(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), 401, "{uri} should require a token");
    }

    let response = app
        .request(
            Method::POST,
            "/api/v1/wallet/deposit",
            Some(json!({ "amount": "10.00" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
}

// ==================== Ledger invariant ====================

#[tokio::test]
async fn balance_always_equals_ledger_sum() {
    let app = TestApp::new().await;
    let (token, customer_id) = app.register_customer("ledger@example.com", PASSWORD).await;

    app.deposit(&token, "100.00").await;
    app.deposit(&token, "49.25").await;

    let wallet = &app.state.services.wallet;
    let conn = app.state.db.as_ref();

    wallet
        .debit(
            conn,
            customer_id,
            dec!(30.00),
            WalletTransactionKind::Payment,
            "Payment for order ORD-TEST0001",
            None,
        )
        .await
        .expect("debit within balance");
    wallet
        .credit(
            conn,
            customer_id,
            dec!(5.75),
            WalletTransactionKind::Cashback,
            "Cashback for order ORD-TEST0001",
            None,
        )
        .await
        .expect("cashback credit");

    let balance = app.wallet_balance(customer_id).await;
    assert_eq!(balance, dec!(125.00));
    assert_eq!(balance, ledger_sum(&app, &token).await);
}

#[tokio::test]
async fn overdraft_debit_fails_and_leaves_no_trace() {
    let app = TestApp::new().await;
    let (token, customer_id) = app.register_customer("overdraft@example.com", PASSWORD).await;
    app.deposit(&token, "20.00").await;

    let result = app
        .state
        .services
        .wallet
        .debit(
            app.state.db.as_ref(),
            customer_id,
            dec!(20.01),
            WalletTransactionKind::Payment,
            "Overdraft attempt",
            None,
        )
        .await;

    match result {
        Err(ServiceError::InsufficientFunds { available, required }) => {
            assert_eq!(available, dec!(20.00));
            assert_eq!(required, dec!(20.01));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    // Neither the balance nor the ledger moved.
    assert_eq!(app.wallet_balance(customer_id).await, dec!(20.00));
    assert_eq!(ledger_sum(&app, &token).await, dec!(20.00));
}

#[tokio::test]
async fn debit_of_exact_balance_drains_the_wallet() {
    let app = TestApp::new().await;
    let (token, customer_id) = app.register_customer("drain@example.com", PASSWORD).await;
    app.deposit(&token, "42.00").await;

    app.state
        .services
        .wallet
        .debit(
            app.state.db.as_ref(),
            customer_id,
            dec!(42.00),
            WalletTransactionKind::Payment,
            "Exact drain",
            None,
        )
        .await
        .expect("debit of the full balance succeeds");

    assert_eq!(app.wallet_balance(customer_id).await, Decimal::ZERO);
    assert_eq!(ledger_sum(&app, &token).await, Decimal::ZERO);
}

#[tokio::test]
async fn refund_credits_the_wallet_with_an_order_reference() {
    let app = TestApp::new().await;
    let (token, customer_id) = app.register_customer("refund@example.com", PASSWORD).await;
    let order_id = uuid::Uuid::new_v4();

    app.state
        .services
        .wallet
        .refund(customer_id, dec!(15.00), order_id, "Refund for returned item")
        .await
        .expect("refund succeeds");

    assert_eq!(app.wallet_balance(customer_id).await, dec!(15.00));

    let response = app
        .request(Method::GET, "/api/v1/wallet/transactions", None, Some(&token))
        .await;
    let body = json_body(response).await;
    assert_eq!(body["data"][0]["kind"], "refund");
    assert_eq!(body["data"][0]["order_id"], order_id.to_string());
}

// ==================== History ====================

#[tokio::test]
async fn transaction_history_is_paginated_newest_first() {
    let app = TestApp::new().await;
    let (token, customer_id) = app.register_customer("history@example.com", PASSWORD).await;

    // Deposits with distinct timestamps so ordering is deterministic.
    for amount in ["10.00", "20.00", "30.00"] {
        app.deposit(&token, amount).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let response = app
        .request(
            Method::GET,
            "/api/v1/wallet/transactions?page=1&per_page=2",
            None,
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), 200);

    let body = json_body(response).await;
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["total_pages"], 2);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(dec_field(&entries[0], "amount"), dec!(30.00));
    assert_eq!(dec_field(&entries[1], "amount"), dec!(20.00));

    let response = app
        .request(
            Method::GET,
            "/api/v1/wallet/transactions?page=2&per_page=2",
            None,
            Some(&token),
        )
        .await;
    let body = json_body(response).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(dec_field(&entries[0], "amount"), dec!(10.00));

    assert_eq!(app.wallet_balance(customer_id).await, dec!(60.00));
}

#[tokio::test]
async fn ledgers_are_isolated_per_customer() {
    let app = TestApp::new().await;
    let (token_a, customer_a) = app.register_customer("iso-a@example.com", PASSWORD).await;
    let (token_b, customer_b) = app.register_customer("iso-b@example.com", PASSWORD).await;

    app.deposit(&token_a, "100.00").await;
    app.deposit(&token_b, "7.00").await;

    assert_eq!(app.wallet_balance(customer_a).await, dec!(100.00));
    assert_eq!(app.wallet_balance(customer_b).await, dec!(7.00));

    let response = app
        .request(Method::GET, "/api/v1/wallet/transactions", None, Some(&token_b))
        .await;
    let body = json_body(response).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(dec_field(&body["data"][0], "amount"), dec!(7.00));
}
