use std::{sync::Arc, time::Duration};

use actix_http::Request;
use actix_web::{
    cookie::Cookie,
    dev::{Service, ServiceResponse},
    test, web, App, Error,
};
use lgw_common::Secret;
use loyalty_engine::{helpers::PasswordHasher, OrderSink, UserApi};

use super::mocks::{MockStore, StubSink};
use crate::{
    auth::{TokenIssuer, ACCESS_TOKEN_COOKIE},
    routes,
};

pub const TEST_SALT: &str = "endpoint-test-salt";

pub fn hasher() -> PasswordHasher {
    PasswordHasher::new(&Secret::new(TEST_SALT)).unwrap()
}

pub fn issuer() -> TokenIssuer {
    TokenIssuer::new(&Secret::new(TEST_SALT), Duration::from_secs(3600))
}

pub fn auth_cookie(user_id: i64) -> Cookie<'static> {
    Cookie::build(ACCESS_TOKEN_COOKIE, issuer().issue_token(user_id).unwrap()).path("/").finish()
}

/// An app instance wired exactly like the production one, but over a mock store and a recording sink.
pub async fn test_app(
    store: MockStore,
    sink: Arc<StubSink>,
) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
    let _ = env_logger::try_init();
    let sink: Arc<dyn OrderSink> = sink;
    test::init_service(
        App::new()
            .app_data(web::Data::new(UserApi::new(store, hasher())))
            .app_data(web::Data::new(issuer()))
            .app_data(web::Data::from(sink))
            .service(routes::ping)
            .configure(routes::configure::<MockStore>),
    )
    .await
}

/// Pulls the `AccessToken` value out of a `Set-Cookie` response header.
pub fn access_token_from(resp: &ServiceResponse) -> Option<String> {
    let header = resp.headers().get(actix_web::http::header::SET_COOKIE)?.to_str().ok()?;
    let value = header.strip_prefix(&format!("{ACCESS_TOKEN_COOKIE}="))?;
    Some(value.split(';').next().unwrap_or_default().to_string())
}
