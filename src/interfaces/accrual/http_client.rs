use crate::domain::money::Money;
use crate::domain::order::OrderNumber;
use crate::domain::ports::AccrualService;
use crate::domain::transition::{Outcome, Verdict};
use crate::error::AccrualError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Path prefix of the per-order lookup endpoint.
pub const ORDERS_PATH: &str = "/api/orders/";

#[derive(Debug, Clone)]
pub struct AccrualClientConfig {
    /// Scheme, host and optional port of the accrual service, e.g. `http://localhost:8081`.
    pub base_url: String,
    pub request_timeout: Duration,
    /// How many ledger minor units make one unit of the service's currency.
    pub minor_units_per_unit: u32,
}

impl AccrualClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(5),
            minor_units_per_unit: 100,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
enum WireStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

#[derive(Debug, Deserialize)]
struct AccrualResponse {
    status: WireStatus,
    accrual: Option<Decimal>,
}

/// Accrual service client speaking `GET {base}/api/orders/{number}`.
///
/// Classifies each response into an [`Outcome`]; retries are left to the
/// caller's polling cadence.
#[derive(Clone)]
pub struct HttpAccrualClient {
    client: Client,
    base_url: String,
    minor_units_per_unit: u32,
}

impl HttpAccrualClient {
    pub fn new(config: AccrualClientConfig) -> Result<Self, AccrualError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            minor_units_per_unit: config.minor_units_per_unit,
        })
    }

    fn order_url(&self, number: &OrderNumber) -> String {
        format!("{}{}{}", self.base_url, ORDERS_PATH, number)
    }

    fn classify(&self, body: &[u8]) -> Result<Outcome, AccrualError> {
        let response: AccrualResponse = serde_json::from_slice(body).map_err(|e| {
            AccrualError::Payload(format!("{e}: {}", String::from_utf8_lossy(body)))
        })?;
        let verdict = match response.status {
            WireStatus::Registered => Verdict::Registered,
            WireStatus::Processing => Verdict::Processing,
            WireStatus::Invalid => Verdict::Invalid,
            WireStatus::Processed => {
                let accrual = match response.accrual {
                    Some(units) => Money::from_units(units, self.minor_units_per_unit)
                        .map_err(|e| AccrualError::Payload(e.to_string()))?,
                    None => Money::ZERO,
                };
                Verdict::Processed { accrual }
            }
        };
        Ok(Outcome::Verdict(verdict))
    }
}

#[async_trait]
impl AccrualService for HttpAccrualClient {
    async fn lookup(&self, number: &OrderNumber) -> Result<Outcome, AccrualError> {
        let response = self.client.get(self.order_url(number)).send().await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(Outcome::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => Ok(Outcome::RateLimited),
            StatusCode::OK => {
                let body = response.bytes().await?;
                self.classify(&body)
            }
            other => Err(AccrualError::UnexpectedStatus(other.as_u16())),
        }
    }
}
