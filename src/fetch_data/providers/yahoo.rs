use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::fetch_data::types::retry;
use crate::model::{OptionRow, OptionType};

const OPTIONS_URL: &str = "https://query2.finance.yahoo.com/v7/finance/options";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URL: &str = "https://query2.finance.yahoo.com/v1/test/getcrumb";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko)";
pub const RATE_LIMIT_MS: u64 = 250;

// ── API response types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    option_chain: OptionChain,
}

#[derive(Debug, Deserialize)]
struct OptionChain {
    #[serde(default)]
    result: Vec<ChainResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResult {
    #[serde(default)]
    pub expiration_dates: Vec<i64>,
    pub quote: Option<Quote>,
    #[serde(default)]
    pub options: Vec<OptionSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSet {
    pub expiration_date: i64,
    #[serde(default)]
    pub calls: Vec<Contract>,
    #[serde(default)]
    pub puts: Vec<Contract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_symbol: String,
    pub strike: f64,
    pub currency: Option<String>,
    pub last_price: Option<f64>,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub volume: Option<f64>,
    pub open_interest: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub contract_size: Option<String>,
    pub last_trade_date: Option<i64>, // unix seconds
    pub implied_volatility: Option<f64>,
    pub in_the_money: Option<bool>,
}

// ── Conversion ───────────────────────────────────────────────────────

pub fn expiration_date(ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

fn expiration_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

impl Contract {
    /// Normalise into the row format. `spot_price` is the quote's market
    /// price, carried so later stages can use it as the reference price.
    pub fn into_row(self, ticker: &str, option_type: OptionType, expiration: NaiveDate, spot_price: Option<f64>) -> OptionRow {
        let mut row = OptionRow::new(ticker, &expiration.to_string(), self.strike);
        row.contract_symbol = Some(self.contract_symbol);
        row.option_type = Some(option_type);
        row.last_trade_date = self
            .last_trade_date
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.to_rfc3339());
        row.last_price = self.last_price;
        row.bid = self.bid;
        row.ask = self.ask;
        row.change = self.change;
        row.percent_change = self.percent_change;
        row.volume = self.volume;
        row.open_interest = self.open_interest;
        row.implied_volatility = self.implied_volatility;
        row.in_the_money = self.in_the_money.map(|b| b.to_string());
        row.contract_size = self.contract_size;
        row.currency = self.currency;
        row.spot_price = spot_price;
        row
    }
}

impl OptionSet {
    pub fn into_rows(self, ticker: &str, spot_price: Option<f64>) -> Vec<OptionRow> {
        let Some(expiration) = expiration_date(self.expiration_date) else {
            warn!(ticker, ts = self.expiration_date, "unreadable expiration timestamp");
            return Vec::new();
        };
        let calls = self
            .calls
            .into_iter()
            .map(|c| c.into_row(ticker, OptionType::Call, expiration, spot_price));
        let puts = self
            .puts
            .into_iter()
            .map(|c| c.into_row(ticker, OptionType::Put, expiration, spot_price));
        calls.chain(puts).collect()
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Yahoo Finance options endpoint client.
pub struct YahooClient {
    client: reqwest::Client,
    crumb: Option<String>,
}

impl YahooClient {
    /// Build a client and obtain a session crumb. A failed handshake is
    /// logged; requests are then attempted without one.
    pub async fn connect() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .context("creating HTTP client")?;

        let crumb = match fetch_crumb(&client).await {
            Ok(crumb) => Some(crumb),
            Err(e) => {
                warn!("could not obtain Yahoo crumb: {e:#}");
                None
            }
        };
        Ok(Self { client, crumb })
    }

    /// Chain for one expiration, or the nearest one (plus the list of all
    /// expirations) when `expiration` is `None`.
    pub async fn chain(&self, ticker: &str, expiration: Option<NaiveDate>) -> Result<ChainResult> {
        let url = format!("{OPTIONS_URL}/{ticker}");
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(date) = expiration {
            query.push(("date", expiration_ts(date).to_string()));
        }
        if let Some(crumb) = &self.crumb {
            query.push(("crumb", crumb.clone()));
        }
        debug!(ticker, ?expiration, "requesting option chain");

        let resp = retry(3, || {
            let request = self.client.get(&url).query(&query);
            async move {
                let r = request
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<OptionsResponse>()
                    .await?;
                Ok::<_, anyhow::Error>(r)
            }
        })
        .await
        .with_context(|| format!("fetching option chain for {ticker}"))?;

        if let Some(err) = resp.option_chain.error.filter(|e| !e.is_null()) {
            bail!("Yahoo returned an error for {ticker}: {err}");
        }
        resp.option_chain
            .result
            .into_iter()
            .next()
            .with_context(|| format!("no option chain returned for {ticker}"))
    }
}

async fn fetch_crumb(client: &reqwest::Client) -> Result<String> {
    // Only the session cookie matters; the status is usually 404.
    let _ = client.get(COOKIE_URL).send().await;
    let crumb = client
        .get(CRUMB_URL)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    let crumb = crumb.trim().to_string();
    if crumb.is_empty() {
        bail!("empty crumb");
    }
    Ok(crumb)
}
