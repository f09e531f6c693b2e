//! Delegation planning: decide which capabilities a request needs.
//!
//! Planning is a replaceable strategy behind the `Planner` trait; the router
//! only sees the resulting plan. The default strategy is a keyword matcher,
//! which is deliberately dumb: anything smarter (an LLM-backed planner, say)
//! plugs in without touching dispatch or aggregation.

use regex::Regex;
use thiserror::Error;

use crate::protocol::Envelope;

/// One unit of delegated work: which capability, and what to send it.
#[derive(Debug, Clone)]
pub struct Subtask {
    pub capability: String,
    pub envelope: Envelope,
}

/// Ordered subtasks for one request. Empty means "answer directly".
#[derive(Debug, Clone, Default)]
pub struct DelegationPlan {
    pub subtasks: Vec<Subtask>,
}

impl DelegationPlan {
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn is_direct(&self) -> bool {
        self.subtasks.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("cannot plan an empty request")]
    EmptyContent,
}

/// Pluggable planning strategy.
pub trait Planner: Send + Sync {
    fn plan(&self, content: &str) -> Result<DelegationPlan, PlanError>;
}

const STOCK_KEYWORDS: [&str; 8] = [
    "stock", "price", "quote", "ticker", "shares", "trading", "outlook", "market",
];

const NEWS_KEYWORDS: [&str; 7] = [
    "news", "headline", "article", "announcement", "recent", "latest", "press",
];

const WEATHER_KEYWORDS: [&str; 8] = [
    "weather", "forecast", "alert", "temperature", "rain", "snow", "storm", "wind",
];

/// All-caps words that look like tickers but never are.
const TICKER_STOPWORDS: [&str; 12] = [
    "THE", "AND", "FOR", "NOT", "NOW", "NEW", "TOP", "GET", "WHAT", "WITH", "OVER", "NEXT",
];

/// Keyword-driven default strategy.
///
/// Capabilities are matched independently, so a compound query ("price and
/// recent news") fans out into multiple subtasks.
pub struct KeywordPlanner;

impl Planner for KeywordPlanner {
    fn plan(&self, content: &str) -> Result<DelegationPlan, PlanError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(PlanError::EmptyContent);
        }

        let lowered = trimmed.to_lowercase();
        let ticker = extract_ticker(trimmed);
        let mut subtasks = Vec::new();

        if contains_any(&lowered, &STOCK_KEYWORDS) {
            let mut envelope = Envelope::text(trimmed).with_metadata("capability", "stock");
            if let Some(ticker) = &ticker {
                envelope = envelope.with_metadata("ticker", ticker.clone());
            }
            subtasks.push(Subtask {
                capability: "stock".to_string(),
                envelope,
            });
        }

        if contains_any(&lowered, &NEWS_KEYWORDS) {
            let mut envelope = Envelope::text(trimmed).with_metadata("capability", "news");
            // A detected ticker makes a tighter news topic than the raw text.
            if let Some(ticker) = &ticker {
                envelope = envelope.with_metadata("topic", ticker.clone());
            }
            subtasks.push(Subtask {
                capability: "news".to_string(),
                envelope,
            });
        }

        if contains_any(&lowered, &WEATHER_KEYWORDS) {
            subtasks.push(Subtask {
                capability: "weather".to_string(),
                envelope: Envelope::text(trimmed).with_metadata("capability", "weather"),
            });
        }

        Ok(DelegationPlan { subtasks })
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Pull the first plausible ticker symbol out of a request.
fn extract_ticker(content: &str) -> Option<String> {
    let re = match Regex::new(r"\b[A-Z]{2,5}\b") {
        Ok(r) => r,
        Err(_) => return None,
    };

    let result = re
        .find_iter(content)
        .map(|m| m.as_str().to_string())
        .find(|t| !TICKER_STOPWORDS.contains(&t.as_str()));
    result
}
