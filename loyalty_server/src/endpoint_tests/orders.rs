use std::sync::Arc;

use actix_web::{http::StatusCode, test};
use chrono::{TimeZone, Utc};
use lgw_common::Points;
use loyalty_engine::{
    db_types::{Order, OrderNumber, OrderStatus},
    traits::StorageError,
};
use rust_decimal_macros::dec;

use super::{
    helpers::{auth_cookie, test_app},
    mocks::{MockStore, StubSink},
};

fn upload_request(number: &str, user_id: i64) -> actix_http::Request {
    test::TestRequest::post()
        .uri("/api/user/orders")
        .cookie(auth_cookie(user_id))
        .set_payload(number.to_string())
        .to_request()
}

#[actix_web::test]
async fn a_fresh_order_is_accepted_and_handed_to_the_updater() {
    let mut store = MockStore::new();
    store
        .expect_add_order()
        .withf(|order| order.number == OrderNumber::from("79927398713") && order.status == OrderStatus::New)
        .returning(|_| Ok(()));
    let sink = Arc::new(StubSink::default());
    let app = test_app(store, sink.clone()).await;

    let resp = test::call_service(&app, upload_request("79927398713", 1)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let submitted = sink.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].number, OrderNumber::from("79927398713"));
    assert_eq!(submitted[0].user_id, 1);
}

#[actix_web::test]
async fn surrounding_whitespace_is_tolerated() {
    let mut store = MockStore::new();
    store.expect_add_order().withf(|order| order.number == OrderNumber::from("79927398713")).returning(|_| Ok(()));
    let sink = Arc::new(StubSink::default());
    let app = test_app(store, sink.clone()).await;

    let resp = test::call_service(&app, upload_request("  79927398713\n", 1)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[actix_web::test]
async fn a_bad_check_digit_is_rejected_before_storage() {
    // No expectations: the mock panics if any storage call slips through the Luhn gate.
    let sink = Arc::new(StubSink::default());
    let app = test_app(MockStore::new(), sink.clone()).await;

    let resp = test::call_service(&app, upload_request("12345678901", 1)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(sink.submitted().is_empty());
}

#[actix_web::test]
async fn re_uploading_your_own_order_is_ok_and_not_tracked_again() {
    let mut store = MockStore::new();
    store.expect_add_order().returning(|_| Err(StorageError::OrderAlreadyExists));
    store
        .expect_order_by_number()
        .returning(|number| Ok(Order::new(number.clone(), 1, Utc::now())));
    let sink = Arc::new(StubSink::default());
    let app = test_app(store, sink.clone()).await;

    let resp = test::call_service(&app, upload_request("79927398713", 1)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(sink.submitted().is_empty());
}

#[actix_web::test]
async fn an_order_owned_by_someone_else_is_a_conflict() {
    let mut store = MockStore::new();
    store.expect_add_order().returning(|_| Err(StorageError::OrderAlreadyExists));
    store
        .expect_order_by_number()
        .returning(|number| Ok(Order::new(number.clone(), 2, Utc::now())));
    let sink = Arc::new(StubSink::default());
    let app = test_app(store, sink.clone()).await;

    let resp = test::call_service(&app, upload_request("79927398713", 1)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert!(sink.submitted().is_empty());
}

#[actix_web::test]
async fn orders_are_listed_with_accruals_where_they_exist() {
    let uploaded_at = Utc.with_ymd_and_hms(2024, 6, 12, 10, 30, 0).unwrap();
    let mut settled = Order::new(OrderNumber::from("79927398713"), 1, uploaded_at);
    settled.status = OrderStatus::Processed;
    settled.accrual = Points::from(dec!(42.5));
    let open = Order::new(OrderNumber::from("2377225624"), 1, uploaded_at);

    let mut store = MockStore::new();
    store.expect_orders_for_user().withf(|&id| id == 1).returning(move |_| Ok(vec![settled.clone(), open.clone()]));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let req = test::TestRequest::get().uri("/api/user/orders").cookie(auth_cookie(1)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    let list = body.as_array().expect("an array of orders");
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["number"], "79927398713");
    assert_eq!(list[0]["status"], "PROCESSED");
    assert_eq!(list[0]["accrual"].as_f64(), Some(42.5));
    assert_eq!(list[0]["uploaded_at"], "2024-06-12T10:30:00Z");
    assert_eq!(list[1]["status"], "NEW");
    assert!(list[1].get("accrual").is_none());
}

#[actix_web::test]
async fn no_orders_yet_is_a_204() {
    let mut store = MockStore::new();
    store.expect_orders_for_user().returning(|_| Err(StorageError::OrdersNotFound));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let req = test::TestRequest::get().uri("/api/user/orders").cookie(auth_cookie(1)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
