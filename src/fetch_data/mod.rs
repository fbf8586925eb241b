pub mod plan;
pub mod providers;
pub mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::data::{layout, write_csv};
use crate::model::OptionRow;
use providers::yahoo::{self, YahooClient};
use types::{ExpirationFilter, FetchedTicker};

/// Run the fetch command: download each configured ticker's option chain
/// and write `<outdir>/<TICKER>/<TICKER>_options_<tag>_filtered.csv`.
///
/// A ticker that fails is logged and skipped.
pub fn run(config: &PipelineConfig) -> Result<Vec<FetchedTicker>> {
    let filter = ExpirationFilter::from_config(config)?;
    let outdir = config.outdir();
    if config.tickers.is_empty() {
        println!("No tickers configured. Nothing to fetch.");
        return Ok(Vec::new());
    }

    println!(
        "Fetch plan: {} tickers, expirations: {}",
        config.tickers.len(),
        filter.file_tag()
    );

    let rt = tokio::runtime::Runtime::new().context("creating async runtime")?;
    rt.block_on(async {
        let client = YahooClient::connect().await?;

        let pb = indicatif::ProgressBar::new(config.tickers.len() as u64);
        if let Ok(style) =
            indicatif::ProgressStyle::default_bar().template("  Fetching [{bar:40}] {pos}/{len} {msg}")
        {
            pb.set_style(style);
        }

        let mut fetched = Vec::new();
        let mut fail_count = 0u32;
        for ticker in &config.tickers {
            pb.set_message(ticker.clone());
            match fetch_ticker(&client, ticker, &filter).await {
                Ok((rows_before, rows, spot_price)) => {
                    let dir = layout::ticker_dir(&outdir, ticker);
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("creating {}", dir.display()))?;
                    let path = dir.join(plan::chain_file_name(ticker, &filter));
                    write_csv(&path, &rows)?;
                    info!(
                        ticker = %ticker,
                        rows_before,
                        rows_after = rows.len(),
                        path = %path.display(),
                        "wrote option chain"
                    );
                    fetched.push(FetchedTicker {
                        ticker: ticker.clone(),
                        path,
                        rows_before,
                        rows_after: rows.len(),
                        spot_price,
                    });
                }
                Err(e) => {
                    warn!(ticker = %ticker, "fetch failed, skipping: {e:#}");
                    fail_count += 1;
                }
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        println!(
            "Done: {} fetched, {} failed. Output under {}",
            fetched.len(),
            fail_count,
            outdir.display()
        );
        Ok::<_, anyhow::Error>(fetched)
    })
}

/// Download, filter and sort one ticker's chain. Returns the row count
/// before filtering, the kept rows and the quoted spot price.
async fn fetch_ticker(
    client: &YahooClient,
    ticker: &str,
    filter: &ExpirationFilter,
) -> Result<(usize, Vec<OptionRow>, Option<f64>)> {
    let first = client.chain(ticker, None).await?;
    let spot_price = first.quote.as_ref().and_then(|q| q.regular_market_price);
    let available: Vec<NaiveDate> = first
        .expiration_dates
        .iter()
        .filter_map(|ts| yahoo::expiration_date(*ts))
        .collect();
    let wanted = plan::pick_expirations(&available, filter);
    if wanted.is_empty() {
        warn!(ticker, "no listed expiration matches the filter");
    }

    let mut raw: Vec<OptionRow> = Vec::new();
    for expiration in wanted {
        tokio::time::sleep(Duration::from_millis(yahoo::RATE_LIMIT_MS)).await;
        match client.chain(ticker, Some(expiration)).await {
            Ok(chain) => {
                for set in chain.options {
                    raw.extend(set.into_rows(ticker, spot_price));
                }
            }
            Err(e) => warn!(ticker, %expiration, "skipping expiration: {e:#}"),
        }
    }

    let rows_before = raw.len();
    let mut rows = plan::apply_filters(raw);
    plan::sort_rows(&mut rows);
    Ok((rows_before, rows, spot_price))
}
