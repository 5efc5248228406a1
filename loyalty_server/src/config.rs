use std::{env, time::Duration};

use clap::Parser;
use lgw_common::Secret;
use log::*;

const DEFAULT_RUN_ADDRESS: &str = "localhost:8081";
const DEFAULT_ACCRUAL_ADDRESS: &str = "http://localhost:8080";
/// Clients are expected to authenticate once and keep the cookie around.
const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Parser)]
#[command(name = "loyalty_server", about = "Loyalty-points gateway server")]
struct CliArgs {
    /// Address to listen on, host:port
    #[arg(short = 'a', long = "address")]
    run_address: Option<String>,
    /// Connection string for the PostgreSQL database
    #[arg(short = 'd', long = "database-uri")]
    database_uri: Option<String>,
    /// Base URL of the accrual calculation service
    #[arg(short = 'r', long = "accrual-address")]
    accrual_address: Option<String>,
    /// Salt used for password hashing and token signing
    #[arg(short = 'p', long = "password-salt")]
    password_salt: Option<String>,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub run_address: String,
    pub database_uri: String,
    pub accrual_address: String,
    pub password_salt: Secret,
    pub access_token_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            run_address: DEFAULT_RUN_ADDRESS.to_string(),
            database_uri: String::default(),
            accrual_address: DEFAULT_ACCRUAL_ADDRESS.to_string(),
            password_salt: Secret::default(),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from command-line flags, then lets environment variables override them
    /// (`RUN_ADDRESS`, `DATABASE_URI`, `ACCRUAL_SYSTEM_ADDRESS`, `PASSWORD_SALT`). The environment wins.
    pub fn from_env_and_args() -> Self {
        let args = CliArgs::parse();
        Self::resolve(args)
    }

    fn resolve(args: CliArgs) -> Self {
        let defaults = Self::default();
        let run_address = env::var("RUN_ADDRESS")
            .ok()
            .or(args.run_address)
            .unwrap_or_else(|| defaults.run_address.clone());
        let database_uri = env::var("DATABASE_URI").ok().or(args.database_uri).unwrap_or_default();
        let accrual_address = env::var("ACCRUAL_SYSTEM_ADDRESS")
            .ok()
            .or(args.accrual_address)
            .unwrap_or_else(|| defaults.accrual_address.clone());
        let password_salt = env::var("PASSWORD_SALT").ok().or(args.password_salt).unwrap_or_else(|| {
            warn!("🚦️ PASSWORD_SALT is not set. User passwords and access tokens cannot be secured without it.");
            String::default()
        });
        Self {
            run_address,
            database_uri,
            accrual_address,
            password_salt: Secret::new(password_salt),
            access_token_ttl: DEFAULT_ACCESS_TOKEN_TTL,
        }
    }
}
