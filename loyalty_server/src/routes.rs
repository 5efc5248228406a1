//! Request handler definitions.
//!
//! Handlers are generic over the storage backend so the same functions serve both the real server (backed by
//! [`loyalty_engine::PgDatabase`]) and the endpoint tests (backed by mocks). [`configure`] wires them into an
//! actix `App`.

use actix_web::{cookie::Cookie, get, web, HttpResponse, Responder};
use log::*;
use loyalty_engine::{
    traits::{LoyaltyStore, StorageError},
    OrderSink, UserApi, UserApiError,
};

use crate::{
    auth::{JwtClaims, TokenIssuer, ACCESS_TOKEN_COOKIE},
    data_objects::{AuthRequest, OrderResult, WithdrawRequest, WithdrawalResult},
    errors::ServerError,
};

pub fn configure<B: LoyaltyStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/user")
            .route("/register", web::post().to(register::<B>))
            .route("/login", web::post().to(login::<B>))
            .route("/orders", web::post().to(post_order::<B>))
            .route("/orders", web::get().to(get_orders::<B>))
            .route("/balance", web::get().to(get_balance::<B>))
            .route("/balance/withdraw", web::post().to(post_withdraw::<B>))
            .route("/balance/withdrawals", web::get().to(get_withdrawals::<B>))
            .route("/withdrawals", web::get().to(get_withdrawals::<B>)),
    );
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/ping")]
pub async fn ping() -> impl Responder {
    trace!("💻️ Received ping");
    HttpResponse::Ok().body("pong\n")
}

// ----------------------------------------------    Auth   ----------------------------------------------------
/// `POST /api/user/register`. Creates the account and signs the user in immediately: the response carries the
/// `AccessToken` cookie.
pub async fn register<B: LoyaltyStore>(
    body: web::Json<AuthRequest>,
    api: web::Data<UserApi<B>>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let AuthRequest { login, password } = body.into_inner();
    debug!("💻️ POST register for login {login}");
    let user_id = api.sign_up(&login, &password).await?;
    authenticated_ok(user_id, &issuer)
}

/// `POST /api/user/login`. A missing user and a wrong password are indistinguishable in the response.
pub async fn login<B: LoyaltyStore>(
    body: web::Json<AuthRequest>,
    api: web::Data<UserApi<B>>,
    issuer: web::Data<TokenIssuer>,
) -> Result<HttpResponse, ServerError> {
    let AuthRequest { login, password } = body.into_inner();
    debug!("💻️ POST login for login {login}");
    let user = api.sign_in(&login, &password).await?;
    authenticated_ok(user.id, &issuer)
}

fn authenticated_ok(user_id: i64, issuer: &TokenIssuer) -> Result<HttpResponse, ServerError> {
    let token = issuer.issue_token(user_id)?;
    let cookie = Cookie::build(ACCESS_TOKEN_COOKIE, token).path("/").http_only(true).finish();
    Ok(HttpResponse::Ok().cookie(cookie).finish())
}

// ----------------------------------------------   Orders  ----------------------------------------------------
/// `POST /api/user/orders`. The body is the raw order number. A successful upload is also handed to the updater
/// so reconciliation starts on the next poll.
pub async fn post_order<B: LoyaltyStore>(
    claims: JwtClaims,
    body: web::Bytes,
    api: web::Data<UserApi<B>>,
    updater: web::Data<dyn OrderSink>,
) -> Result<HttpResponse, ServerError> {
    let number = String::from_utf8(body.to_vec())
        .map_err(|e| ServerError::InvalidRequestBody(format!("The order number is not valid UTF-8: {e}")))?;
    let number = number.trim();
    let user_id = claims.user_id();
    debug!("💻️ POST order [{number}] for user #{user_id}");
    match api.add_order(user_id, number).await {
        Ok(order) => {
            if let Err(e) = updater.submit(order) {
                // The row is safely stored; bootstrap will pick it up if the updater is gone.
                error!("💻️ Could not hand order [{number}] to the updater: {e}");
            }
            Ok(HttpResponse::Accepted().finish())
        },
        // The same user re-uploading the same number is not an error.
        Err(UserApiError::RepeatedOrderRequest) => Ok(HttpResponse::Ok().finish()),
        Err(e) => Err(e.into()),
    }
}

/// `GET /api/user/orders`. 204 when the user has not uploaded anything yet.
pub async fn get_orders<B: LoyaltyStore>(
    claims: JwtClaims,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = claims.user_id();
    trace!("💻️ GET orders for user #{user_id}");
    match api.get_orders(user_id).await {
        Ok(orders) => {
            let result = orders.into_iter().map(OrderResult::from).collect::<Vec<OrderResult>>();
            Ok(HttpResponse::Ok().json(result))
        },
        Err(UserApiError::StorageError(StorageError::OrdersNotFound)) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Err(e.into()),
    }
}

// ----------------------------------------------  Balance  ----------------------------------------------------
/// `GET /api/user/balance`.
pub async fn get_balance<B: LoyaltyStore>(
    claims: JwtClaims,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = claims.user_id();
    trace!("💻️ GET balance for user #{user_id}");
    let balance = api.get_balance(user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

/// `POST /api/user/balance/withdraw`.
pub async fn post_withdraw<B: LoyaltyStore>(
    claims: JwtClaims,
    body: web::Json<WithdrawRequest>,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let WithdrawRequest { order, sum } = body.into_inner();
    let user_id = claims.user_id();
    debug!("💻️ POST withdraw of {sum} against order [{order}] for user #{user_id}");
    api.withdraw(user_id, &order, sum).await?;
    Ok(HttpResponse::Ok().finish())
}

/// `GET /api/user/withdrawals` (also reachable as `GET /api/user/balance/withdrawals`). 204 when there are none.
pub async fn get_withdrawals<B: LoyaltyStore>(
    claims: JwtClaims,
    api: web::Data<UserApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let user_id = claims.user_id();
    trace!("💻️ GET withdrawals for user #{user_id}");
    match api.get_withdrawals(user_id).await {
        Ok(withdrawals) => {
            let result = withdrawals.into_iter().map(WithdrawalResult::from).collect::<Vec<WithdrawalResult>>();
            Ok(HttpResponse::Ok().json(result))
        },
        Err(UserApiError::StorageError(StorageError::WithdrawalNotFound)) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Err(e.into()),
    }
}
