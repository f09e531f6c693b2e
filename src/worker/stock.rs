//! Stock quote retrieval via the Stooq CSV endpoint (keyless demo source).

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;

use super::{WorkerAdapter, WorkerError};
use crate::protocol::Envelope;

const STOOQ_URL: &str = "https://stooq.com";

pub struct StockAdapter {
    client: Client,
    base_url: String,
}

impl StockAdapter {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: STOOQ_URL.to_string(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for StockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerAdapter for StockAdapter {
    fn capability(&self) -> &str {
        "stock"
    }

    async fn handle(&self, envelope: &Envelope) -> Result<String, WorkerError> {
        let ticker = envelope
            .metadata("ticker")
            .map(normalize_ticker)
            .or_else(|| extract_ticker(&envelope.content))
            .ok_or_else(|| {
                WorkerError::NoData(format!("no ticker found in request '{}'", envelope.content))
            })?;

        let symbol = stooq_symbol(&ticker);
        let url = format!(
            "{}/q/l/?s={}&f=sd2t2ohlcv&h&e=csv",
            self.base_url, symbol
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::Upstream(format!("quote request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            429 => {
                return Err(WorkerError::RateLimited(
                    "quote provider rate limit exceeded".to_string(),
                ))
            }
            s if !(200..300).contains(&s) => {
                return Err(WorkerError::Upstream(format!(
                    "quote provider returned HTTP {}",
                    status
                )))
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| WorkerError::Upstream(format!("unreadable quote response: {}", e)))?;

        format_quote(&ticker, &symbol, &body)
    }
}

/// Uppercase and strip everything but letters, digits, and dots.
fn normalize_ticker(query: &str) -> String {
    query
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
        .collect()
}

/// Pull the first ticker-looking token out of free text.
fn extract_ticker(content: &str) -> Option<String> {
    let re = match regex::Regex::new(r"\b[A-Z]{1,5}(\.[A-Z]{1,3})?\b") {
        Ok(r) => r,
        Err(_) => return None,
    };
    re.find(content.trim()).map(|m| m.as_str().to_string())
}

/// Stooq symbols are lowercase; bare US tickers get the `.us` suffix.
fn stooq_symbol(ticker: &str) -> String {
    let sym = ticker.to_lowercase();
    if sym.contains('.') {
        sym
    } else {
        format!("{}.us", sym)
    }
}

/// Parse the two-line CSV (header + one row) into a readable OHLCV summary.
fn format_quote(ticker: &str, symbol: &str, csv: &str) -> Result<String, WorkerError> {
    let lines: Vec<&str> = csv.trim().lines().collect();
    if lines.len() < 2 {
        return Err(WorkerError::NoData(format!(
            "no quote found for '{}'; try a ticker like NVDA/AAPL/TSLA",
            ticker
        )));
    }

    let header: Vec<&str> = lines[0].split(',').collect();
    let values: Vec<&str> = lines[1].split(',').collect();
    let row: HashMap<&str, &str> = header.into_iter().zip(values).collect();

    match row.get("Close") {
        None | Some(&"") | Some(&"N/A") => Err(WorkerError::NoData(format!(
            "quote unavailable for '{}' (symbol used: {})",
            ticker, symbol
        ))),
        Some(_) => {
            let field = |name: &str| row.get(name).copied().unwrap_or("N/A");
            Ok(format!(
                "**{}**\n- Date: {} {}\n- Open: {}\n- High: {}\n- Low: {}\n- Close: {}\n- Volume: {}\n- Source: Stooq (CSV)",
                field("Symbol"),
                field("Date"),
                field("Time"),
                field("Open"),
                field("High"),
                field("Low"),
                field("Close"),
                field("Volume"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("nvda"), "NVDA");
        assert_eq!(normalize_ticker(" NVDA! "), "NVDA");
        assert_eq!(normalize_ticker("brk.b"), "BRK.B");
    }

    #[test]
    fn test_extract_ticker_from_text() {
        assert_eq!(extract_ticker("NVDA").as_deref(), Some("NVDA"));
        assert_eq!(
            extract_ticker("what is AAPL doing today").as_deref(),
            Some("AAPL")
        );
        assert_eq!(extract_ticker("no ticker here").as_deref(), None);
    }

    #[test]
    fn test_stooq_symbol_suffix() {
        assert_eq!(stooq_symbol("NVDA"), "nvda.us");
        assert_eq!(stooq_symbol("BRK.B"), "brk.b");
    }

    #[test]
    fn test_format_quote_happy_path() {
        let csv = "Symbol,Date,Time,Open,High,Low,Close,Volume\n\
NVDA.US,2026-08-03,22:00:07,870.0,880.5,865.2,875.3,31000000";
        let text = format_quote("NVDA", "nvda.us", csv).unwrap();
        assert!(text.contains("**NVDA.US**"));
        assert!(text.contains("Close: 875.3"));
        assert!(text.contains("Volume: 31000000"));
    }

    #[test]
    fn test_header_only_body_is_no_data() {
        let err = format_quote("ZZZZ", "zzzz.us", "Symbol,Date,Time\n").unwrap_err();
        assert!(matches!(err, WorkerError::NoData(_)));
    }

    #[test]
    fn test_na_close_is_no_data() {
        let csv = "Symbol,Date,Time,Open,High,Low,Close,Volume\n\
ZZZZ.US,N/A,N/A,N/A,N/A,N/A,N/A,N/A";
        let err = format_quote("ZZZZ", "zzzz.us", csv).unwrap_err();
        assert!(matches!(err, WorkerError::NoData(_)));
    }
}
