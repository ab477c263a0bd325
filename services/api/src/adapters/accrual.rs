//! services/api/src/adapters/accrual.rs
//!
//! This module contains the adapter for the external accrual system.
//! It implements the `AccrualService` port from the `core` crate over plain HTTP.

use async_trait::async_trait;
use gophermart_core::domain::{AccrualReport, OrderStatus};
use gophermart_core::ports::{AccrualService, PortError, PortResult};
use reqwest::{header::RETRY_AFTER, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `AccrualService` port against `GET {base}/api/orders/{number}`.
#[derive(Clone)]
pub struct HttpAccrualAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAccrualAdapter {
    /// Creates a new `HttpAccrualAdapter` whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Wire format of a 200 response.
#[derive(Deserialize, Debug)]
struct AccrualResponse {
    #[serde(default)]
    order: String,
    status: String,
    #[serde(default)]
    accrual: Option<f64>,
}

//=========================================================================================
// `AccrualService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccrualService for HttpAccrualAdapter {
    /// 204 is not treated as an error: it is the accrual system's answer for an
    /// order it has not registered yet, so it maps to `Ok(None)` and the caller
    /// skips the order until the next tick.
    async fn fetch_order(&self, number: &str) -> PortResult<Option<AccrualReport>> {
        let url = format!("{}/api/orders/{}", self.base_url, number);
        debug!(%url, "Querying accrual system");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("accrual request failed: {}", e)))?;

        match response.status() {
            StatusCode::OK => {}
            // Not registered in the accrual system yet.
            StatusCode::NO_CONTENT => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Err(PortError::RateLimited { retry_after });
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(PortError::Unexpected(format!(
                    "accrual responded with status {}: {}",
                    status, body
                )));
            }
        }

        let body: AccrualResponse = response
            .json()
            .await
            .map_err(|e| PortError::Malformed(e.to_string()))?;

        if body.order.is_empty() {
            return Ok(None);
        }
        if body.order != number {
            return Err(PortError::Malformed(format!(
                "asked for order {} but got {}",
                number, body.order
            )));
        }

        let status = body
            .status
            .parse::<OrderStatus>()
            .map_err(|e| PortError::Malformed(e.to_string()))?;

        let accrual = match status {
            OrderStatus::Processed => body.accrual.unwrap_or(0.0),
            _ => 0.0,
        };
        if !accrual.is_finite() || accrual < 0.0 {
            return Err(PortError::Malformed(format!(
                "accrual for order {} is not a non-negative number: {}",
                number, accrual
            )));
        }

        Ok(Some(AccrualReport {
            order: body.order,
            status,
            accrual,
        }))
    }
}
