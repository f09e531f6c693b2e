//! Tech news retrieval via NewsAPI.org.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{WorkerAdapter, WorkerError};
use crate::protocol::Envelope;

const NEWS_API_URL: &str = "https://newsapi.org/v2";

/// Outlets the everything-search is pinned to.
const NEWS_DOMAINS: &str = "arstechnica.com,techcrunch.com,theverge.com,wired.com,\
theregister.com,zdnet.com,venturebeat.com,engadget.com,bleepingcomputer.com,\
securityweek.com,krebsonsecurity.com";

pub struct NewsAdapter {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    title: String,
    url: String,
    #[serde(rename = "publishedAt")]
    published_at: String,
    description: Option<String>,
    source: Source,
}

#[derive(Deserialize)]
struct Source {
    name: String,
}

impl NewsAdapter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: NEWS_API_URL.to_string(),
        }
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WorkerAdapter for NewsAdapter {
    fn capability(&self) -> &str {
        "news"
    }

    async fn handle(&self, envelope: &Envelope) -> Result<String, WorkerError> {
        let topic = envelope
            .metadata("topic")
            .unwrap_or(envelope.content.trim())
            .to_string();
        // NewsAPI free-tier history is shallow; clamp the window regardless.
        let days: i64 = envelope
            .metadata("days")
            .and_then(|d| d.parse().ok())
            .unwrap_or(1)
            .clamp(1, 30);

        let response = self
            .client
            .get(format!("{}/everything", self.base_url))
            .query(&[
                ("q", build_query(&topic).as_str()),
                ("from", from_date(days).as_str()),
                ("sortBy", "publishedAt"),
                ("language", "en"),
                ("searchIn", "title,description"),
                ("apiKey", self.api_key.as_str()),
                ("domains", NEWS_DOMAINS),
                ("pageSize", "20"),
            ])
            .send()
            .await
            .map_err(|e| WorkerError::Upstream(format!("news request failed: {}", e)))?;

        let status = response.status();
        match status.as_u16() {
            401 | 403 => {
                return Err(WorkerError::Unauthorized(format!(
                    "news provider rejected API key (HTTP {})",
                    status
                )))
            }
            429 => {
                return Err(WorkerError::RateLimited(
                    "news provider rate limit exceeded".to_string(),
                ))
            }
            s if !(200..300).contains(&s) => {
                return Err(WorkerError::Upstream(format!(
                    "news provider returned HTTP {}",
                    status
                )))
            }
            _ => {}
        }

        let data: NewsResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::Upstream(format!("unparseable news response: {}", e)))?;

        if data.articles.is_empty() {
            return Err(WorkerError::NoData(format!(
                "no news found about '{}' in the last {} day(s)",
                topic, days
            )));
        }

        Ok(format_articles(&data.articles))
    }
}

/// Widen a topic into the tech-scoped everything-search query.
fn build_query(topic: &str) -> String {
    format!(
        "({}) AND (technology OR tech OR software OR AI OR \"artificial intelligence\" \
OR cybersecurity OR \"information security\" OR cloud OR \"data center\" \
OR semiconductors OR GPU OR chip)",
        topic
    )
}

/// Start of the search window, `days` back from now, as YYYY-MM-DD.
fn from_date(days: i64) -> String {
    (Utc::now() - Duration::days(days)).format("%Y-%m-%d").to_string()
}

fn format_articles(articles: &[Article]) -> String {
    let summaries: Vec<String> = articles
        .iter()
        .map(|a| {
            format!(
                "**{}**\n  - Source: {}\n  - Date: {}\n  - Summary: {}\n  - URL: {}",
                a.title,
                a.source.name,
                a.published_at,
                a.description.as_deref().unwrap_or("(no description)"),
                a.url
            )
        })
        .collect();

    summaries.join("\n---\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_embeds_topic() {
        let q = build_query("NVDA");
        assert!(q.starts_with("(NVDA) AND"));
        assert!(q.contains("semiconductors"));
    }

    #[test]
    fn test_from_date_shape() {
        let date = from_date(1);
        // YYYY-MM-DD
        assert_eq!(date.len(), 10);
        assert_eq!(date.matches('-').count(), 2);
    }

    #[test]
    fn test_parse_and_format_articles() {
        let raw = r#"{
            "status": "ok",
            "articles": [
                {
                    "title": "Nvidia unveils next-gen GPU",
                    "url": "https://example.com/nvda",
                    "publishedAt": "2026-08-03T10:00:00Z",
                    "description": "New accelerator line announced.",
                    "source": {"name": "Ars Technica"}
                },
                {
                    "title": "Chip supply update",
                    "url": "https://example.com/chips",
                    "publishedAt": "2026-08-03T08:00:00Z",
                    "description": null,
                    "source": {"name": "The Register"}
                }
            ]
        }"#;
        let parsed: NewsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.articles.len(), 2);

        let text = format_articles(&parsed.articles);
        assert!(text.contains("Nvidia unveils next-gen GPU"));
        assert!(text.contains("Ars Technica"));
        assert!(text.contains("(no description)"));
        assert!(text.contains("\n---\n"));
    }

    #[test]
    fn test_empty_articles_field_defaults() {
        let parsed: NewsResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(parsed.articles.is_empty());
    }
}
