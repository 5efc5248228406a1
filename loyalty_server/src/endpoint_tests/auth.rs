use std::sync::Arc;

use actix_web::{http::StatusCode, test};
use lgw_common::Points;
use loyalty_engine::{db_types::User, traits::StorageError};

use super::{
    helpers::{access_token_from, auth_cookie, hasher, issuer, test_app},
    mocks::{MockStore, StubSink},
};

fn alice(id: i64) -> User {
    User {
        id,
        login: "alice".to_string(),
        password_hash: hasher().hash("pw12345!").unwrap(),
        current: Points::default(),
        withdrawn: Points::default(),
    }
}

#[actix_web::test]
async fn register_creates_the_user_and_signs_them_in() {
    let mut store = MockStore::new();
    store.expect_create_user().withf(|login, _| login == "alice").returning(|_, _| Ok(1));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let req = test::TestRequest::post()
        .uri("/api/user/register")
        .set_json(serde_json::json!({"login": "alice", "password": "pw12345!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = access_token_from(&resp).expect("register must set the AccessToken cookie");
    assert_eq!(issuer().validate(&token).unwrap().user_id(), 1);
}

#[actix_web::test]
async fn register_rejects_a_taken_login() {
    let mut store = MockStore::new();
    store.expect_create_user().returning(|_, _| Err(StorageError::UserAlreadyExists));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let req = test::TestRequest::post()
        .uri("/api/user/register")
        .set_json(serde_json::json!({"login": "alice", "password": "pw12345!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn register_rejects_a_malformed_body() {
    let app = test_app(MockStore::new(), Arc::new(StubSink::default())).await;
    let req = test::TestRequest::post()
        .uri("/api/user/register")
        .insert_header(("content-type", "application/json"))
        .set_payload(r#"{"login": "alice""#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn login_sets_the_cookie() {
    let mut store = MockStore::new();
    store.expect_user_by_credentials().withf(|login, _| login == "alice").returning(|_, _| Ok(alice(7)));
    let app = test_app(store, Arc::new(StubSink::default())).await;

    let req = test::TestRequest::post()
        .uri("/api/user/login")
        .set_json(serde_json::json!({"login": "alice", "password": "pw12345!"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = access_token_from(&resp).expect("login must set the AccessToken cookie");
    assert_eq!(issuer().validate(&token).unwrap().user_id(), 7);
}

#[actix_web::test]
async fn bad_password_and_unknown_login_look_identical() {
    for failure in [StorageError::BadPassword, StorageError::UserNotFound] {
        let mut store = MockStore::new();
        let failure = failure.clone();
        store.expect_user_by_credentials().returning(move |_, _| Err(failure.clone()));
        let app = test_app(store, Arc::new(StubSink::default())).await;

        let req = test::TestRequest::post()
            .uri("/api/user/login")
            .set_json(serde_json::json!({"login": "alice", "password": "wrong"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(access_token_from(&resp).is_none());
    }
}

#[actix_web::test]
async fn protected_routes_require_the_cookie() {
    let app = test_app(MockStore::new(), Arc::new(StubSink::default())).await;
    for uri in ["/api/user/orders", "/api/user/balance", "/api/user/withdrawals"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "no cookie on {uri}");
    }
}

#[actix_web::test]
async fn a_tampered_token_is_rejected() {
    let app = test_app(MockStore::new(), Arc::new(StubSink::default())).await;
    let mut cookie = auth_cookie(1);
    cookie.set_value(format!("{}x", cookie.value()));
    let req = test::TestRequest::get().uri("/api/user/balance").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn ping_needs_no_authentication() {
    let app = test_app(MockStore::new(), Arc::new(StubSink::default())).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/ping").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
