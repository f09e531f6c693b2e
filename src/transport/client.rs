//! Transport client: one envelope out, one envelope back.
//!
//! Unreachable peers are retried with exponential backoff; timeouts are not,
//! since retrying a slow call risks duplicate side effects at the worker.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{self, Envelope};
use crate::transport::server::ErrorBody;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("transport timeout after {0:?}")]
    Timeout(Duration),

    #[error("agent unreachable at {address}: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("request rejected by {address}: [{error_kind}] {message}")]
    Rejected {
        address: String,
        error_kind: String,
        message: String,
    },

    #[error("undecodable reply: {0}")]
    Decode(#[from] protocol::DecodeError),
}

/// Whether an error is worth another connection attempt.
pub fn should_retry(error: &TransportError) -> bool {
    matches!(error, TransportError::Unreachable { .. })
}

/// Retry schedule for unreachable peers.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_base: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry `attempt` (1-based): base, 2*base, 4*base, ...
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Sends an envelope to an agent address and awaits the single reply.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        address: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<Envelope, TransportError>;
}

/// HTTP transport posting envelopes to `{address}/nlip/`.
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            retry,
        }
    }

    async fn send_once(
        &self,
        address: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<Envelope, TransportError> {
        let url = format!("{}/nlip/", address.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(protocol::encode(envelope))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(address, timeout, &e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_request_error(address, timeout, &e))?;

        if !status.is_success() {
            let error: ErrorBody = serde_json::from_slice(&body).unwrap_or_else(|_| ErrorBody {
                error_kind: "upstream".to_string(),
                message: format!("HTTP {} from {}", status, address),
            });
            return Err(TransportError::Rejected {
                address: address.to_string(),
                error_kind: error.error_kind,
                message: error.message,
            });
        }

        Ok(protocol::decode(&body)?)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        address: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<Envelope, TransportError> {
        let attempts = self.retry.retries + 1;
        let mut last_error: Option<TransportError> = None;

        for attempt in 1..=attempts {
            match self.send_once(address, envelope, timeout).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    let retryable = should_retry(&e);
                    tracing::warn!(
                        correlation_id = %envelope.correlation_id,
                        "Transport attempt {}/{} to {} failed: {}",
                        attempt,
                        attempts,
                        address,
                        e
                    );
                    last_error = Some(e);
                    if !retryable {
                        break;
                    }
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry.backoff_delay(attempt)).await;
            }
        }

        Err(last_error.unwrap_or(TransportError::Unreachable {
            address: address.to_string(),
            reason: "no send attempt completed".to_string(),
        }))
    }
}

fn classify_request_error(
    address: &str,
    timeout: Duration,
    error: &reqwest::Error,
) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Unreachable {
            address: address.to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_only_on_unreachable() {
        assert!(should_retry(&TransportError::Unreachable {
            address: "http://127.0.0.1:1".to_string(),
            reason: "connection refused".to_string(),
        }));
        assert!(!should_retry(&TransportError::Timeout(Duration::from_secs(5))));
        assert!(!should_retry(&TransportError::Rejected {
            address: "http://127.0.0.1:1".to_string(),
            error_kind: "no_data".to_string(),
            message: "empty".to_string(),
        }));
    }

    #[test]
    fn test_backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));

        let fast = RetryPolicy {
            retries: 2,
            backoff_base: Duration::from_millis(1),
        };
        assert_eq!(fast.backoff_delay(3), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn test_unreachable_retry_stops_after_two_extra_attempts() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // Accepts connections and slams them shut so every attempt fails
        // without a response, while still being countable.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        let accepts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepts);
        tokio::spawn(async move {
            loop {
                if let Ok((stream, _)) = listener.accept().await {
                    counter.fetch_add(1, Ordering::SeqCst);
                    drop(stream);
                }
            }
        });

        let transport = HttpTransport::with_retry(RetryPolicy {
            retries: 2,
            backoff_base: Duration::from_millis(1),
        });
        let err = transport
            .send(&address, &Envelope::text("ping"), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Unreachable { .. }));
        assert_eq!(accepts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unreachable_peer_surfaces_after_retries() {
        // Nothing listens on a freshly bound-then-dropped port.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = HttpTransport::with_retry(RetryPolicy {
            retries: 2,
            backoff_base: Duration::from_millis(1),
        });
        let envelope = Envelope::text("hello");
        let err = transport
            .send(
                &format!("http://127.0.0.1:{}", port),
                &envelope,
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Unreachable { .. }));
    }
}
