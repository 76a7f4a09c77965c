//! Settlement integration tests
//!
//! End-to-end scenarios through the router, against a live PostgreSQL
//! with the migrations applied. The tests truncate shared tables, so run
//! them serially:
//!
//! cargo test --test integration_settlement -- --ignored --test-threads=1

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware, Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::util::ServiceExt;
use uuid::Uuid;

use pdv_backend::api;

mod common;

fn app(pool: PgPool) -> Router {
    api::create_router()
        .layer(middleware::from_fn(
            api::middleware::operator_context_middleware,
        ))
        .with_state(pool)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    operator: Uuid,
    role: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Operator-Id", operator.to_string())
        .header("X-Operator-Role", role);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn open_session(app: &Router, operator: Uuid, balance: Decimal) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/sessions/open",
        operator,
        "OPERATOR",
        Some(json!({ "opening_balance": balance })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "session open failed: {body}");
    body
}

fn as_decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.to_string().parse().unwrap(),
        other => panic!("not a decimal value: {other:?}"),
    }
}

// =========================================================================
// Scenario A: cash sale with change
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_cash_sale_with_change() {
    let pool = common::setup_test_db().await;
    let app = app(pool.clone());
    let operator = Uuid::new_v4();

    open_session(&app, operator, dec!(100.00)).await;
    let product_id = common::seed_product(&pool, "Chocolate 90g", dec!(25.50), 10).await;

    let (status, body) = send(
        &app,
        "POST",
        "/sales",
        operator,
        "OPERATOR",
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 2, "unit_price": "25.50" }],
            "payments": [{ "tender": "CASH", "amount": "51.00", "received_amount": "60.00" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "settlement failed: {body}");

    assert_eq!(as_decimal(&body["sale"]["total"]), dec!(51.00));
    assert_eq!(body["sale"]["tender_group"], "CASH");
    assert_eq!(as_decimal(&body["payments"][0]["change"]), dec!(9.00));

    // stock decreased by 2
    assert_eq!(common::product_stock(&pool, product_id).await, 8);

    // live indicator reflects the cash movement total
    let (status, indicators) =
        send(&app, "GET", "/sessions/indicators", operator, "OPERATOR", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(indicators["session_open"], true);
    assert_eq!(as_decimal(&indicators["cash_total"]), dec!(51.00));
    assert_eq!(indicators["sale_count"], 1);
}

// =========================================================================
// Scenario B: overselling is rejected with nothing persisted
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_insufficient_stock_persists_nothing() {
    let pool = common::setup_test_db().await;
    let app = app(pool.clone());
    let operator = Uuid::new_v4();

    open_session(&app, operator, dec!(0.00)).await;
    let product_id = common::seed_product(&pool, "Biscoito 140g", dec!(4.00), 3).await;

    let (status, body) = send(
        &app,
        "POST",
        "/sales",
        operator,
        "OPERATOR",
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 5, "unit_price": "4.00" }],
            "payments": [{ "tender": "CASH", "amount": "20.00" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "insufficient_stock");
    assert!(body["details"].as_str().unwrap().contains("Biscoito 140g"));

    assert_eq!(common::product_stock(&pool, product_id).await, 3);
    let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(sales, 0);
    // only the OPENING movement exists
    let movements: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cash_movements")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(movements, 1);
}

// =========================================================================
// Scenario C: unconfirmed PIX aborts a mixed sale
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_unconfirmed_pix_commits_nothing() {
    let pool = common::setup_test_db().await;
    let app = app(pool.clone());
    let operator = Uuid::new_v4();

    open_session(&app, operator, dec!(0.00)).await;
    let product_id = common::seed_product(&pool, "Energetico 473ml", dec!(100.00), 5).await;

    let (status, body) = send(
        &app,
        "POST",
        "/sales",
        operator,
        "OPERATOR",
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 1, "unit_price": "100.00" }],
            "payments": [
                { "tender": "CASH", "amount": "40.00" },
                { "tender": "PIX", "amount": "60.00" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "pix_not_confirmed");

    assert_eq!(common::product_stock(&pool, product_id).await, 5);
    let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(sales, 0);
}

// =========================================================================
// Scenario D: withdrawals bounded by available cash
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_withdrawal_bounded_by_cash_on_hand() {
    let pool = common::setup_test_db().await;
    let app = app(pool.clone());
    let operator = Uuid::new_v4();

    open_session(&app, operator, dec!(50.00)).await;
    let product_id = common::seed_product(&pool, "Salgadinho 80g", dec!(30.00), 10).await;

    let (status, _) = send(
        &app,
        "POST",
        "/sales",
        operator,
        "OPERATOR",
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 1, "unit_price": "30.00" }],
            "payments": [{ "tender": "CASH", "amount": "30.00" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // available = 50 + 30 = 80, first withdrawal fits
    let (status, _) = send(
        &app,
        "POST",
        "/sessions/withdrawal",
        operator,
        "OPERATOR",
        Some(json!({ "amount": "20.00", "reason": "deposito no cofre" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // available is now 60, a 70.00 withdrawal must fail
    let (status, body) = send(
        &app,
        "POST",
        "/sessions/withdrawal",
        operator,
        "OPERATOR",
        Some(json!({ "amount": "70.00", "reason": "deposito no cofre" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "insufficient_cash_on_hand");
    assert!(body["details"].as_str().unwrap().contains("60.00"));
}

// =========================================================================
// Scenario E: closing discrepancy requires a justification
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_closing_discrepancy_requires_justification() {
    let pool = common::setup_test_db().await;
    let app = app(pool.clone());
    let operator = Uuid::new_v4();

    open_session(&app, operator, dec!(200.00)).await;

    // preview matches what close would compute, without mutating state
    let (status, preview) = send(
        &app,
        "POST",
        "/sessions/closing-preview",
        operator,
        "OPERATOR",
        Some(json!({ "counted_cash": "190.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_decimal(&preview["expected"]), dec!(200.00));
    assert_eq!(as_decimal(&preview["difference"]), dec!(-10.00));

    let (status, body) = send(
        &app,
        "POST",
        "/sessions/close",
        operator,
        "OPERATOR",
        Some(json!({ "counted_cash": "190.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "justification_required");

    let (status, summary) = send(
        &app,
        "POST",
        "/sessions/close",
        operator,
        "OPERATOR",
        Some(json!({ "counted_cash": "190.00", "justification": "faltou" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "close failed: {summary}");
    assert_eq!(as_decimal(&summary["expected"]), dec!(200.00));
    assert_eq!(as_decimal(&summary["difference"]), dec!(-10.00));

    // closing is terminal
    let (status, body) = send(
        &app,
        "POST",
        "/sessions/close",
        operator,
        "OPERATOR",
        Some(json!({ "counted_cash": "190.00", "justification": "faltou" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "session_closed");
}

// =========================================================================
// One OPEN session per operator
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_second_open_is_rejected() {
    let pool = common::setup_test_db().await;
    let app = app(pool.clone());
    let operator = Uuid::new_v4();

    open_session(&app, operator, dec!(10.00)).await;

    let (status, body) = send(
        &app,
        "POST",
        "/sessions/open",
        operator,
        "OPERATOR",
        Some(json!({ "opening_balance": "10.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error_code"], "session_already_open");

    // another operator is unaffected
    let other = Uuid::new_v4();
    open_session(&app, other, dec!(0.00)).await;
}

// =========================================================================
// Concurrent sales never oversell
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_concurrent_sales_do_not_oversell() {
    let pool = common::setup_test_db().await;
    let operator = Uuid::new_v4();
    let app_handle = app(pool.clone());

    open_session(&app_handle, operator, dec!(0.00)).await;
    let product_id = common::seed_product(&pool, "Pilha AA", dec!(10.00), 5).await;

    let sale_body = json!({
        "items": [{ "product_id": product_id, "quantity": 3, "unit_price": "10.00" }],
        "payments": [{ "tender": "CASH", "amount": "30.00" }]
    });

    let mut handles = Vec::new();
    for _ in 0..2 {
        let app = app_handle.clone();
        let body = sale_body.clone();
        handles.push(tokio::spawn(async move {
            send(&app, "POST", "/sales", operator, "OPERATOR", Some(body)).await
        }));
    }

    let mut created = 0;
    let mut rejected = 0;
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        match status {
            StatusCode::CREATED => created += 1,
            StatusCode::BAD_REQUEST => rejected += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    // only one of the two 3-unit sales fits into stock 5
    assert_eq!(created, 1);
    assert_eq!(rejected, 1);
    assert_eq!(common::product_stock(&pool, product_id).await, 2);
}

// =========================================================================
// Purge is admin-gated and removes everything
// =========================================================================

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn test_purge_requires_admin_and_clears_history() {
    let pool = common::setup_test_db().await;
    let app = app(pool.clone());
    let operator = Uuid::new_v4();

    open_session(&app, operator, dec!(25.00)).await;
    let product_id = common::seed_product(&pool, "Isqueiro", dec!(5.00), 10).await;
    let (status, _) = send(
        &app,
        "POST",
        "/sales",
        operator,
        "OPERATOR",
        Some(json!({
            "items": [{ "product_id": product_id, "quantity": 1, "unit_price": "5.00" }],
            "payments": [{ "tender": "CASH", "amount": "5.00" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "DELETE", "/admin/history", operator, "OPERATOR", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, summary) = send(&app, "DELETE", "/admin/history", operator, "ADMIN", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["sales_removed"], 1);
    assert_eq!(summary["sessions_removed"], 1);
    // OPENING + SALE movements
    assert_eq!(summary["movements_removed"], 2);

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cash_sessions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(sessions, 0);
    // products survive a history purge
    assert_eq!(common::product_stock(&pool, product_id).await, 9);
}
