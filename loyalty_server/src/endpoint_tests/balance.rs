use std::sync::Arc;

use actix_web::{http::StatusCode, test};
use chrono::{TimeZone, Utc};
use lgw_common::Points;
use loyalty_engine::{
    db_types::{Balance, OrderNumber, Withdrawal},
    traits::StorageError,
};
use rust_decimal_macros::dec;

use super::{
    helpers::{auth_cookie, test_app},
    mocks::{MockStore, StubSink},
};

fn withdraw_request(order: &str, sum: f64, user_id: i64) -> actix_http::Request {
    test::TestRequest::post()
        .uri("/api/user/balance/withdraw")
        .cookie(auth_cookie(user_id))
        .set_json(serde_json::json!({"order": order, "sum": sum}))
        .to_request()
}

#[actix_web::test]
async fn the_balance_is_a_pair_of_numbers() {
    let mut store = MockStore::new();
    store.expect_user_balance().withf(|&id| id == 1).returning(|_| {
        Ok(Balance { current: Points::from(dec!(32.5)), withdrawn: Points::from(dec!(10)) })
    });
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let req = test::TestRequest::get().uri("/api/user/balance").cookie(auth_cookie(1)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["current"].as_f64(), Some(32.5));
    assert_eq!(body["withdrawn"].as_f64(), Some(10.0));
}

#[actix_web::test]
async fn a_covered_withdrawal_succeeds() {
    let mut store = MockStore::new();
    store
        .expect_user_balance()
        .returning(|_| Ok(Balance { current: Points::from(dec!(42.5)), withdrawn: Points::default() }));
    store
        .expect_add_withdrawal()
        .withf(|w| w.order_number == OrderNumber::from("2377225624") && w.sum == Points::from(dec!(10)))
        .returning(|_| Ok(()));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let resp = test::call_service(&app, withdraw_request("2377225624", 10.0, 1)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn an_uncovered_withdrawal_is_payment_required() {
    let mut store = MockStore::new();
    store
        .expect_user_balance()
        .returning(|_| Ok(Balance { current: Points::from(dec!(32.5)), withdrawn: Points::from(dec!(10)) }));
    // add_withdrawal is never reached; the balance pre-check already refuses.
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let resp = test::call_service(&app, withdraw_request("2377225624", 1000.0, 1)).await;
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
}

#[actix_web::test]
async fn the_database_floor_also_maps_to_payment_required() {
    // The pre-check passes on a stale read, but the atomic debit in storage refuses to cross zero.
    let mut store = MockStore::new();
    store
        .expect_user_balance()
        .returning(|_| Ok(Balance { current: Points::from(dec!(50)), withdrawn: Points::default() }));
    store.expect_add_withdrawal().returning(|_| Err(StorageError::InsufficientFunds));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let resp = test::call_service(&app, withdraw_request("2377225624", 10.0, 1)).await;
    assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
}

#[actix_web::test]
async fn withdrawal_numbers_go_through_the_same_checksum_gate() {
    let app = test_app(MockStore::new(), Arc::new(StubSink::default())).await;
    let resp = test::call_service(&app, withdraw_request("12345678901", 10.0, 1)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn non_positive_sums_are_rejected() {
    let app = test_app(MockStore::new(), Arc::new(StubSink::default())).await;
    for sum in [0.0, -5.0] {
        let resp = test::call_service(&app, withdraw_request("2377225624", sum, 1)).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[actix_web::test]
async fn withdrawals_are_listed_on_both_routes() {
    let processed_at = Utc.with_ymd_and_hms(2024, 6, 12, 11, 0, 0).unwrap();
    let withdrawal = Withdrawal {
        user_id: 1,
        order_number: OrderNumber::from("2377225624"),
        sum: Points::from(dec!(10)),
        processed_at,
    };
    let mut store = MockStore::new();
    store.expect_withdrawals_for_user().times(2).returning(move |_| Ok(vec![withdrawal.clone()]));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    for uri in ["/api/user/withdrawals", "/api/user/balance/withdrawals"] {
        let req = test::TestRequest::get().uri(uri).cookie(auth_cookie(1)).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "on {uri}");
        let body: serde_json::Value = test::read_body_json(resp).await;
        let list = body.as_array().expect("an array of withdrawals");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["order"], "2377225624");
        assert_eq!(list[0]["sum"].as_f64(), Some(10.0));
        assert_eq!(list[0]["processed_at"], "2024-06-12T11:00:00Z");
    }
}

#[actix_web::test]
async fn no_withdrawals_yet_is_a_204() {
    let mut store = MockStore::new();
    store.expect_withdrawals_for_user().returning(|_| Err(StorageError::WithdrawalNotFound));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let req = test::TestRequest::get().uri("/api/user/withdrawals").cookie(auth_cookie(1)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
