use crate::errors::{EngineError, EngineResult};
use crate::state::{AppState, SpotQuote, WsMessage};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::watch;

/// Spot-price poller. Publishes the latest quote into a single-slot watch
/// mailbox; the engine consumes whatever is current at each tick start.
///
/// Failure policy: the FIRST confirmed failure latches the feed down. We
/// publish the configured fallback price flagged as degraded, surface one
/// warning-level notification, and stop polling for good. No retries, no
/// backoff escalation.
pub async fn run_spot_feed(
    state: Arc<AppState>,
    quote_tx: watch::Sender<Option<SpotQuote>>,
) {
    let symbol = state.config.spot_feed_symbol.clone();
    let base_url = state.config.spot_feed_base_url.clone();
    let fallback = state.config.fallback_spot;

    tracing::info!(symbol = %symbol, "spot price feed started");

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .unwrap_or_default();

    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(state.config.spot_poll_secs));

    loop {
        interval.tick().await;

        match fetch_spot(&client, &base_url, &symbol).await {
            Ok(price) => {
                let quote = SpotQuote {
                    price,
                    degraded: false,
                    timestamp_ms: chrono::Utc::now().timestamp_millis(),
                };
                if quote_tx.send(Some(quote)).is_err() {
                    tracing::error!("engine gone, spot feed shutting down");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback = fallback,
                    "spot fetch failed; latching feed down and degrading to fallback"
                );

                state.broadcast(WsMessage::FeedDown {
                    reason: e.to_string(),
                    fallback,
                });

                let quote = SpotQuote {
                    price: fallback,
                    degraded: true,
                    timestamp_ms: chrono::Utc::now().timestamp_millis(),
                };
                let _ = quote_tx.send(Some(quote));

                // Park instead of returning: a dropped sender closes the
                // mailbox before the engine has consumed the fallback.
                std::future::pending::<()>().await;
            }
        }
    }
}

// Chart endpoint response shape (only the fields we read):
// {
//   "chart": {
//     "result": [ { "meta": { "regularMarketPrice": 689.42 } } ]
//   }
// }

#[derive(serde::Deserialize)]
struct ChartResponse {
    chart: Option<ChartBody>,
}

#[derive(serde::Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
}

#[derive(serde::Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

async fn fetch_spot(client: &Client, base_url: &str, symbol: &str) -> EngineResult<f64> {
    let url = format!("{}/{symbol}", base_url.trim_end_matches('/'));

    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| EngineError::Feed(format!("request failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(EngineError::Feed(format!("HTTP {status}: {body}")));
    }

    let data: ChartResponse = resp
        .json()
        .await
        .map_err(|e| EngineError::Feed(format!("parse: {e}")))?;

    let price = data
        .chart
        .and_then(|c| c.result)
        .and_then(|r| r.into_iter().next())
        .and_then(|r| r.meta)
        .and_then(|m| m.regular_market_price)
        .ok_or_else(|| EngineError::Feed(format!("no price for {symbol} in response")))?;

    if price <= 0.0 || !price.is_finite() {
        return Err(EngineError::Feed(format!("invalid price: {price}")));
    }

    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tokio::sync::mpsc;

    fn dead_feed_config() -> AppConfig {
        AppConfig {
            // Nothing listens here; the first poll fails immediately
            spot_feed_base_url: "http://127.0.0.1:9/v8/finance/chart".into(),
            spot_feed_symbol: "SPY".into(),
            spot_poll_secs: 1,
            fallback_spot: 690.0,
            default_iv: 0.16,
            risk_free_rate: 0.05,
            frame_rate: 60,
            server_port: 0,
        }
    }

    #[tokio::test]
    async fn test_feed_failure_leaves_degraded_fallback_readable_at_tick() {
        let (engine_tx, _engine_rx) = mpsc::channel(8);
        let state = AppState::new(dead_feed_config(), engine_tx);
        let (quote_tx, mut quote_rx) = watch::channel::<Option<SpotQuote>>(None);

        // Separate receiver for waiting, so the engine-side one stays unseen
        let mut wait_rx = quote_rx.clone();

        tokio::spawn(run_spot_feed(state, quote_tx));

        tokio::time::timeout(std::time::Duration::from_secs(10), wait_rx.changed())
            .await
            .expect("feed never published after failure")
            .expect("feed dropped the quote sender after latching");

        // The tick loop's exact guard must still see the fallback
        assert!(
            quote_rx.has_changed().unwrap_or(false),
            "fallback quote unreachable by the tick loop"
        );
        let quote = (*quote_rx.borrow_and_update()).expect("mailbox empty");
        assert!(quote.degraded);
        assert_eq!(quote.price, 690.0);

        // And the mailbox must stay open afterwards
        assert!(quote_rx.has_changed().is_ok());
    }
}
