use std::time::Duration;

use async_trait::async_trait;
use log::*;
use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use super::{AccrualClient, AccrualOutcome, AccrualReply};
use crate::db_types::OrderNumber;

/// The HTTP implementation of [`AccrualClient`]. Stateless and cheap to share between tasks; the cancellation
/// token it is built with is raced against every request so that shutdown terminates outstanding calls.
#[derive(Debug, Clone)]
pub struct HttpAccrualClient {
    base_url: String,
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl HttpAccrualClient {
    pub fn new(base_url: &str, cancel: CancellationToken) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), client: reqwest::Client::new(), cancel }
    }

    async fn fold_response(&self, order_number: &OrderNumber, response: Response) -> AccrualOutcome {
        match response.status() {
            StatusCode::OK => match response.json::<AccrualReply>().await {
                Ok(reply) => AccrualOutcome::Known { status: reply.status, accrual: reply.accrual },
                Err(e) => {
                    debug!("📡 Malformed accrual body for order [{order_number}]: {e}");
                    AccrualOutcome::TransportError
                },
            },
            StatusCode::NO_CONTENT => AccrualOutcome::NoContent,
            StatusCode::TOO_MANY_REQUESTS => match parse_retry_after(&response) {
                Some(retry_after) => AccrualOutcome::RateLimited { retry_after },
                None => {
                    debug!("📡 429 without a usable Retry-After header for order [{order_number}]");
                    AccrualOutcome::TransportError
                },
            },
            s if s.is_server_error() => AccrualOutcome::RemoteError,
            s => {
                debug!("📡 Unexpected accrual status {s} for order [{order_number}]");
                AccrualOutcome::TransportError
            },
        }
    }
}

#[async_trait]
impl AccrualClient for HttpAccrualClient {
    async fn get_accrual(&self, order_number: &OrderNumber) -> AccrualOutcome {
        let url = format!("{}/api/orders/{}", self.base_url, order_number);
        trace!("📡 GET {url}");
        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("📡 Accrual request for order [{order_number}] cancelled by shutdown");
                AccrualOutcome::TransportError
            },
            result = async {
                match self.client.get(&url).send().await {
                    Ok(response) => self.fold_response(order_number, response).await,
                    Err(e) => {
                        debug!("📡 Accrual request for order [{order_number}] failed: {e}");
                        AccrualOutcome::TransportError
                    },
                }
            } => result,
        }
    }
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
