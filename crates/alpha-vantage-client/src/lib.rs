use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use valuation_core::{EarningsRecord, MarketDataProvider, PricePoint, ValuationError};

pub const BASE_URL: &str = "https://www.alphavantage.co";

const EARNINGS_FUNCTION: &str = "EARNINGS";
const DAILY_ADJUSTED_FUNCTION: &str = "TIME_SERIES_DAILY_ADJUSTED";

const EARNINGS_FIELD: &str = "quarterlyEarnings";
const DAILY_SERIES_FIELD: &str = "Time Series (Daily)";
const ADJUSTED_CLOSE_FIELD: &str = "5. adjusted close";

const EARNINGS_NOT_FOUND: &str = "Earnings data not found";
const PRICES_NOT_FOUND: &str = "Stock price data not found";

/// Fields Alpha Vantage returns instead of data when a call is throttled or rejected.
const NOTICE_FIELDS: &[&str] = &["Note", "Information", "Error Message"];

#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl AlphaVantageClient {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self::with_base_url(api_key, BASE_URL.to_string(), timeout)
    }

    pub fn with_base_url(api_key: String, base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client for Alpha Vantage");
                Client::new()
            });

        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        }
    }

    /// Run one `/query` call and return the decoded JSON body.
    async fn query(&self, function: &str, symbol: &str) -> Result<Value, ValuationError> {
        let url = format!("{}/query", self.base_url);

        tracing::debug!(function, symbol, "Alpha Vantage request");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .query(&[
                ("function", function),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error(function, e))?;

        if !response.status().is_success() {
            return Err(ValuationError::UpstreamUnavailable(format!(
                "Alpha Vantage {} returned HTTP {}",
                function,
                response.status()
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            ValuationError::UpstreamUnavailable(format!(
                "Alpha Vantage {} returned invalid JSON: {}",
                function, e
            ))
        })?;

        log_notices(function, symbol, &body);
        Ok(body)
    }

    /// Quarterly EPS, most recent first, at most `limit` quarters.
    pub async fn get_quarterly_earnings(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<EarningsRecord>, ValuationError> {
        let body = self.query(EARNINGS_FUNCTION, symbol).await?;
        parse_quarterly_earnings(&body, limit)
    }

    /// Daily adjusted closes, most recent first, at most `limit` days.
    pub async fn get_daily_adjusted(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<PricePoint>, ValuationError> {
        let body = self.query(DAILY_ADJUSTED_FUNCTION, symbol).await?;
        parse_daily_adjusted(&body, limit)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageClient {
    async fn quarterly_earnings(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<EarningsRecord>, ValuationError> {
        self.get_quarterly_earnings(symbol, limit).await
    }

    async fn daily_adjusted_prices(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<PricePoint>, ValuationError> {
        self.get_daily_adjusted(symbol, limit).await
    }

    fn provider_name(&self) -> &'static str {
        "alpha_vantage"
    }
}

fn transport_error(function: &str, err: reqwest::Error) -> ValuationError {
    if err.is_timeout() {
        ValuationError::UpstreamUnavailable(format!("Alpha Vantage {} timed out", function))
    } else {
        ValuationError::UpstreamUnavailable(format!("Alpha Vantage {}: {}", function, err))
    }
}

fn log_notices(function: &str, symbol: &str, body: &Value) {
    for field in NOTICE_FIELDS {
        if let Some(notice) = body.get(*field).and_then(|v| v.as_str()) {
            tracing::warn!(function, symbol, notice, "Alpha Vantage returned a notice instead of data");
        }
    }
}

pub fn parse_quarterly_earnings(
    body: &Value,
    limit: usize,
) -> Result<Vec<EarningsRecord>, ValuationError> {
    let quarters = body
        .get(EARNINGS_FIELD)
        .and_then(|v| v.as_array())
        .ok_or_else(|| ValuationError::UpstreamDataMissing(EARNINGS_NOT_FOUND.to_string()))?;

    quarters
        .iter()
        .take(limit)
        .map(|quarter| -> Result<EarningsRecord, ValuationError> {
            let raw_eps = quarter.get("reportedEPS").unwrap_or(&Value::Null);
            let reported_eps = parse_number(raw_eps).ok_or_else(|| {
                ValuationError::UpstreamDataMissing(format!(
                    "{}: reportedEPS {} is not a number",
                    EARNINGS_NOT_FOUND, raw_eps
                ))
            })?;

            Ok(EarningsRecord {
                fiscal_date_ending: quarter.get("fiscalDateEnding").and_then(parse_date),
                reported_date: quarter.get("reportedDate").and_then(parse_date),
                reported_eps,
            })
        })
        .collect()
}

pub fn parse_daily_adjusted(body: &Value, limit: usize) -> Result<Vec<PricePoint>, ValuationError> {
    let series = body
        .get(DAILY_SERIES_FIELD)
        .and_then(|v| v.as_object())
        .ok_or_else(|| ValuationError::UpstreamDataMissing(PRICES_NOT_FOUND.to_string()))?;

    series
        .iter()
        .take(limit)
        .map(|(date, bar)| -> Result<PricePoint, ValuationError> {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                ValuationError::UpstreamDataMissing(format!(
                    "{}: unrecognised trading date {:?}",
                    PRICES_NOT_FOUND, date
                ))
            })?;

            let adjusted_close = bar
                .get(ADJUSTED_CLOSE_FIELD)
                .and_then(parse_number)
                .ok_or_else(|| {
                    ValuationError::UpstreamDataMissing(format!(
                        "{}: no adjusted close for {}",
                        PRICES_NOT_FOUND, date
                    ))
                })?;

            Ok(PricePoint { date, adjusted_close })
        })
        .collect()
}

/// Alpha Vantage sends numbers as strings ("1.52"); accept bare numbers too.
fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    value
        .as_str()
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}
