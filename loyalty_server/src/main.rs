use dotenvy::dotenv;
use log::{error, info};
use loyalty_server::{config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_and_args();
    if !preflight_check(&config) {
        eprintln!("🚀️ Preflight check failed. Exiting. Check the logs for details.");
        std::process::exit(1);
    }

    info!("🚀️ Starting the loyalty gateway on {}", config.run_address);
    match run_server(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        },
    }
}

fn preflight_check(config: &ServerConfig) -> bool {
    let mut result = true;
    info!("🚦️ Running preflight checks...");
    if config.database_uri.is_empty() {
        error!("🚦️ DATABASE_URI is not set. Please point it at the gateway's PostgreSQL database.");
        result = false;
    }
    if config.password_salt.reveal().len() < 8 {
        error!(
            "🚦️ PASSWORD_SALT is missing or shorter than 8 characters. It protects user passwords and signs \
             access tokens, so the server will not start without it."
        );
        result = false;
    }
    if config.accrual_address.is_empty() {
        error!("🚦️ ACCRUAL_SYSTEM_ADDRESS is not set. Orders would never be reconciled.");
        result = false;
    }
    if result {
        info!("🚦️ Preflight check PASSED.");
    } else {
        error!("🚦️ Preflight check FAILED: Please fix the issues above before starting the server.");
    }
    result
}
