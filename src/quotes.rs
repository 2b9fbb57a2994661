use crate::storage_utils::ProviderConfig;
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One trading day. Any price may be missing when the exchange reports a hole.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

/// Source of daily quotes for a symbol, oldest first.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_daily(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Quote>>;
}

// --- Yahoo chart payload ---

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug, Default)]
struct ChartMeta {
    #[serde(rename = "gmtoffset", default)]
    gmt_offset: i64,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Deserialize, Debug, Default)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn column(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// Turns the column-oriented chart payload into one `Quote` per timestamp.
/// Dates are taken in the exchange's local time so a session never slips to
/// the previous UTC day.
fn parse_chart(body: &[u8]) -> Result<Vec<Quote>> {
    let envelope: ChartEnvelope = serde_json::from_slice(body)?;

    if let Some(err) = envelope.chart.error {
        bail!("chart error {}: {}", err.code, err.description);
    }

    let result = envelope
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow!("chart response had no result"))?;

    let columns = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();
    let offset = result.meta.gmt_offset;

    let mut quotes: Vec<Quote> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(Quote {
                date,
                open: column(&columns.open, i),
                high: column(&columns.high, i),
                low: column(&columns.low, i),
                close: column(&columns.close, i),
            })
        })
        .collect();

    quotes.sort_by_key(|q| q.date);
    Ok(quotes)
}

fn unix_seconds(date: NaiveDate) -> Result<i64> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| anyhow!("invalid date {}", date))
}

/// Daily candles from the Yahoo Finance chart endpoint.
pub struct YahooChartProvider {
    client: Client,
    base_url: String,
    interval: String,
}

impl YahooChartProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            interval: config.interval.clone(),
        })
    }
}

#[async_trait]
impl QuoteProvider for YahooChartProvider {
    async fn fetch_daily(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Quote>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let query = [
            ("period1", unix_seconds(from)?.to_string()),
            ("period2", unix_seconds(to)?.to_string()),
            ("interval", self.interval.clone()),
        ];

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            bail!("rate limited while fetching {}", symbol);
        }

        // Unknown symbols come back as 404 with a chart error body worth reporting.
        let body = response.bytes().await?;
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            bail!("{} returned HTTP {}", symbol, status);
        }

        let quotes = parse_chart(&body)?;
        debug!(symbol, count = quotes.len(), "fetched daily quotes");
        Ok(quotes)
    }
}
