//! Worker adapters: one leaf retrieval capability behind the envelope contract.
//!
//! A worker only serves retrieval; it never delegates further.

pub mod news;
pub mod stock;
pub mod weather;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use thiserror::Error;

use crate::protocol::Envelope;
use crate::transport::{EnvelopeHandler, ServiceError};

pub use news::NewsAdapter;
pub use stock::StockAdapter;
pub use weather::WeatherAdapter;

/// Provider failures translated into the uniform taxonomy callers see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("rate limited by upstream provider: {0}")]
    RateLimited(String),

    #[error("upstream provider rejected credentials: {0}")]
    Unauthorized(String),

    #[error("no data for request: {0}")]
    NoData(String),

    #[error("upstream provider failure: {0}")]
    Upstream(String),
}

impl WorkerError {
    /// Stable kind string used in wire error bodies and aggregation reports.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::RateLimited(_) => "rate_limited",
            WorkerError::Unauthorized(_) => "unauthorized",
            WorkerError::NoData(_) => "no_data",
            WorkerError::Upstream(_) => "upstream",
        }
    }

    /// HTTP status carried alongside the error body.
    pub fn status(&self) -> StatusCode {
        match self {
            WorkerError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            WorkerError::Unauthorized(_) => StatusCode::BAD_GATEWAY,
            WorkerError::NoData(_) => StatusCode::NOT_FOUND,
            WorkerError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// One external retrieval capability behind a uniform request/response shape.
#[async_trait]
pub trait WorkerAdapter: Send + Sync {
    /// Capability name this adapter serves (e.g. "news").
    fn capability(&self) -> &str;

    /// Perform the retrieval described by the envelope.
    async fn handle(&self, envelope: &Envelope) -> Result<String, WorkerError>;
}

/// Bridges an adapter onto the wire endpoint.
pub struct WorkerHandler {
    adapter: Arc<dyn WorkerAdapter>,
}

impl WorkerHandler {
    pub fn new(adapter: Arc<dyn WorkerAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl EnvelopeHandler for WorkerHandler {
    async fn handle(&self, envelope: Envelope) -> Result<Envelope, ServiceError> {
        tracing::info!(
            correlation_id = %envelope.correlation_id,
            capability = self.adapter.capability(),
            "Handling retrieval request"
        );

        match self.adapter.handle(&envelope).await {
            Ok(payload) => Ok(envelope.reply_text(payload)),
            Err(e) => {
                tracing::warn!(
                    correlation_id = %envelope.correlation_id,
                    capability = self.adapter.capability(),
                    "Retrieval failed: {}",
                    e
                );
                Err(ServiceError::new(e.status(), e.kind(), e.to_string()))
            }
        }
    }
}
