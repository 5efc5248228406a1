use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware, middleware::Logger, web, App, HttpServer};
use log::*;
use loyalty_engine::{
    accrual::HttpAccrualClient,
    db_types::OrderStatus,
    helpers::PasswordHasher,
    traits::LoyaltyStore,
    OrderSink, OrderUpdater, PgDatabase, UpdaterConfig, UserApi,
};
use tokio_util::sync::CancellationToken;

use crate::{auth::TokenIssuer, config::ServerConfig, errors::ServerError, routes};

const DB_POOL_SIZE: u32 = 25;

/// Brings the whole system up: database, reconciliation engine, HTTP server. Blocks until the HTTP server exits,
/// then drains the updater.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = PgDatabase::new_with_url(&config.database_uri, DB_POOL_SIZE)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let hasher = PasswordHasher::new(&config.password_salt).map_err(|e| ServerError::InitializeError(e.to_string()))?;

    let cancel = CancellationToken::new();
    let accrual = HttpAccrualClient::new(&config.accrual_address, cancel.clone());
    let updater = Arc::new(OrderUpdater::new(db.clone(), accrual, cancel, UpdaterConfig::default()));

    let mut updater_errors =
        updater.start().map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // Transient reconciliation failures are logged and retried internally, nothing more to do with them here.
    tokio::spawn(async move {
        while let Some(e) = updater_errors.recv().await {
            warn!("🔄 Updater reported: {e}");
        }
    });
    rehydrate_pending_orders(&db, updater.as_ref()).await?;

    let srv = create_server_instance(&config, db, hasher, updater.clone())?;
    let result = srv.await.map_err(|e| ServerError::IOError(e));
    if let Err(e) = updater.stop().await {
        warn!("🚀️ Updater did not stop cleanly: {e}");
    }
    result
}

/// Every order that was non-terminal when the process last stopped goes straight back into the updater's pending
/// set, before the HTTP server starts accepting requests.
pub async fn rehydrate_pending_orders<B, C>(db: &B, updater: &OrderUpdater<B, C>) -> Result<(), ServerError>
where
    B: LoyaltyStore + 'static,
    C: loyalty_engine::accrual::AccrualClient + 'static,
{
    let pending = db
        .orders_by_status(&[OrderStatus::New, OrderStatus::Processing])
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let count = pending.len();
    updater.submit_many(pending).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Rehydrated {count} pending orders into the updater");
    Ok(())
}

pub fn create_server_instance(
    config: &ServerConfig,
    db: PgDatabase,
    hasher: PasswordHasher,
    updater: Arc<dyn OrderSink>,
) -> Result<Server, ServerError> {
    let issuer = TokenIssuer::new(&config.password_salt, config.access_token_ttl);
    let updater = web::Data::from(updater);
    let srv = HttpServer::new(move || {
        let users_api = UserApi::new(db.clone(), hasher.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %U"))
            .wrap(middleware::Compress::default())
            .app_data(web::Data::new(users_api))
            .app_data(web::Data::new(issuer.clone()))
            .app_data(updater.clone())
            .service(routes::ping)
            .configure(routes::configure::<PgDatabase>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(config.run_address.as_str())?
    .run();
    Ok(srv)
}
