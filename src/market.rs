//! Market data client
//!
//! HTTP-backed collaborator for quantitative data (quotes, price history).
//! The backing service is configured via MARKET_DATA_BASE_URL; without it
//! the client is absent and the collection executor reports an explicit
//! error result instead of failing at startup.

use crate::error::WorkflowError;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("MARKET_DATA_BASE_URL")
            .or_else(|_| env::var("QUOTES_API_BASE_URL"))
            .ok()?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()
            .ok()?;

        Some(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Current quote snapshot for a set of ticker symbols.
    pub async fn quote_snapshot(&self, symbols: &[String]) -> crate::Result<Value> {
        self.post_json("/api/v1/quotes", &json!({ "symbols": symbols }))
            .await
    }

    /// Daily price history for one symbol over the given period (e.g. "1y").
    pub async fn price_history(&self, symbol: &str, period: &str) -> crate::Result<Value> {
        self.post_json(
            "/api/v1/history",
            &json!({ "symbol": symbol, "period": period, "interval": "1d" }),
        )
        .await
    }

    async fn post_json(&self, path: &str, body: &Value) -> crate::Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                WorkflowError::MarketDataError(format!(
                    "Market data request failed for {}: {}",
                    path, e
                ))
            })?;

        let status = response.status();
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| WorkflowError::MarketDataError(format!("Invalid JSON response: {}", e)))?;

        if !status.is_success() {
            return Err(WorkflowError::MarketDataError(format!(
                "Market data service returned {} for {}: {}",
                status, path, body
            )));
        }

        Ok(body)
    }
}

/// Pull ticker-looking tokens (2-5 uppercase letters) out of free text.
/// Short all-caps stopwords that show up in directives are skipped.
pub fn extract_tickers(text: &str) -> Vec<String> {
    const STOPWORDS: &[&str] = &["US", "UK", "EU", "CEO", "CFO", "IPO", "ETF", "GDP", "CPI", "AI"];

    let mut tickers: Vec<String> = Vec::new();

    for token in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        let is_ticker = token.len() >= 2
            && token.len() <= 5
            && token.chars().all(|c| c.is_ascii_uppercase())
            && !STOPWORDS.contains(&token);

        if is_ticker && !tickers.iter().any(|t| t == token) {
            tickers.push(token.to_string());
        }
    }

    tickers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_tickers() {
        let tickers = extract_tickers("Assess AAPL and MSFT before Q2 earnings in the US");
        assert_eq!(tickers, vec!["AAPL".to_string(), "MSFT".to_string()]);
    }

    #[test]
    fn test_extract_tickers_dedupes() {
        let tickers = extract_tickers("AAPL vs AAPL again");
        assert_eq!(tickers.len(), 1);
    }

    #[test]
    fn test_extract_tickers_empty_for_plain_text() {
        let tickers = extract_tickers("assess the semiconductor sector before earnings");
        assert!(tickers.is_empty());
    }
}
