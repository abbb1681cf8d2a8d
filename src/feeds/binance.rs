use crate::errors::{MonitorError, MonitorResult};
use crate::state::EngineEvent;
use reqwest::Client;
use tokio::sync::mpsc;

/// Binance public ticker client. Polls the spot price at a configurable
/// interval and sends SpotPrice events to the engine via bounded channel.
pub async fn run_spot_feed(
    base_url: String,
    symbol: String,
    poll_secs: u64,
    engine_tx: mpsc::Sender<EngineEvent>,
) {
    tracing::info!(symbol = %symbol, "spot price feed started (Binance)");

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap_or_default();

    let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(poll_secs.max(1)));
    let mut consecutive_errors: u32 = 0;

    loop {
        interval.tick().await;

        match fetch_spot_price(&client, &base_url, &symbol).await {
            Ok(price) => {
                consecutive_errors = 0;
                let timestamp_ms = chrono::Utc::now().timestamp_millis();

                if engine_tx
                    .send(EngineEvent::SpotPrice {
                        price,
                        timestamp_ms,
                    })
                    .await
                    .is_err()
                {
                    tracing::error!("engine channel closed, spot feed shutting down");
                    return;
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::warn!(
                    error = %e,
                    consecutive = consecutive_errors,
                    "spot price fetch failed"
                );

                // Exponential backoff on repeated failures (cap at 30s)
                if consecutive_errors > 3 {
                    let backoff = std::cmp::min(consecutive_errors * 2, 30);
                    tokio::time::sleep(tokio::time::Duration::from_secs(backoff as u64)).await;
                }
            }
        }
    }
}

// Binance ticker response format:
// { "symbol": "BTCUSDT", "price": "68078.01000000" }

#[derive(serde::Deserialize)]
struct TickerResponse {
    #[allow(dead_code)]
    symbol: Option<String>,
    price: Option<String>,
}

async fn fetch_spot_price(client: &Client, base_url: &str, symbol: &str) -> MonitorResult<f64> {
    let url = format!(
        "{}/ticker/price?symbol={symbol}",
        base_url.trim_end_matches('/')
    );

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| MonitorError::PriceFeed(format!("request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(MonitorError::PriceFeed(format!("HTTP {status}: {body}")));
    }

    let data: TickerResponse = resp
        .json()
        .await
        .map_err(|e| MonitorError::PriceFeed(format!("parse: {e}")))?;

    // Price arrives as a string like "68078.01000000"
    let price_str = data
        .price
        .as_deref()
        .ok_or_else(|| MonitorError::PriceFeed("no price in response".into()))?;

    let price: f64 = price_str
        .parse()
        .map_err(|_| MonitorError::PriceFeed(format!("invalid price string: {price_str}")))?;

    if price <= 0.0 || !price.is_finite() {
        return Err(MonitorError::PriceFeed(format!("invalid price: {price}")));
    }

    Ok(price)
}
