//! Wire endpoint server using Axum.
//!
//! Every agent process exposes the same surface: `POST /nlip/` taking an
//! envelope body and returning exactly one reply envelope, or an
//! `{error_kind, message}` object with a non-2xx status.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::protocol::{self, Envelope};

/// Wire error object returned with non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_kind: String,
    pub message: String,
}

/// A handler failure mapped onto the wire error shape.
#[derive(Debug)]
pub struct ServiceError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ServiceError {
    pub fn new(status: StatusCode, error_kind: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error_kind: error_kind.to_string(),
                message: message.into(),
            },
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Processes one inbound envelope into its single reply.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync {
    async fn handle(&self, envelope: Envelope) -> Result<Envelope, ServiceError>;
}

type SharedHandler = Arc<dyn EnvelopeHandler>;

/// Server bind configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Build the agent-process router.
pub fn app(handler: SharedHandler) -> Router {
    Router::new()
        .route("/nlip/", post(handle_message))
        .route("/health", get(health_check))
        .with_state(handler)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Run the wire endpoint until the process is stopped.
pub async fn serve(config: ServerConfig, handler: SharedHandler) -> Result<(), Error> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| Error::Server(format!("Invalid address: {}", e)))?;

    tracing::info!("Starting agent endpoint on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app(handler))
        .await
        .map_err(|e| Error::Server(e.to_string()))?;

    Ok(())
}

async fn handle_message(State(handler): State<SharedHandler>, body: Bytes) -> Response {
    let envelope = match protocol::decode(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Rejected inbound message: {}", e);
            return ServiceError::new(StatusCode::BAD_REQUEST, e.kind(), e.to_string())
                .into_response();
        }
    };

    tracing::debug!(
        correlation_id = %envelope.correlation_id,
        format = %envelope.format,
        "Inbound envelope"
    );

    match handler.handle(envelope).await {
        Ok(reply) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            protocol::encode(&reply),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct EchoHandler;

    #[async_trait]
    impl EnvelopeHandler for EchoHandler {
        async fn handle(&self, envelope: Envelope) -> Result<Envelope, ServiceError> {
            if envelope.content == "fail" {
                return Err(ServiceError::new(
                    StatusCode::BAD_GATEWAY,
                    "upstream",
                    "provider exploded",
                ));
            }
            let reply = envelope.reply_text(format!("echo: {}", envelope.content));
            Ok(reply)
        }
    }

    fn post_envelope(envelope: &Envelope) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/nlip/")
            .header("content-type", "application/json")
            .body(Body::from(protocol::encode(envelope)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_through_endpoint() {
        let app = app(Arc::new(EchoHandler));
        let request = Envelope::text("ping").with_correlation_id("corr-7");

        let response = app.oneshot(post_envelope(&request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let reply = protocol::decode(&body).unwrap();
        assert_eq!(reply.content, "echo: ping");
        assert_eq!(reply.correlation_id, "corr-7");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = app(Arc::new(EchoHandler));
        let request = Request::builder()
            .method("POST")
            .uri("/nlip/")
            .body(Body::from("{broken"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_kind, "malformed_format");
    }

    #[tokio::test]
    async fn test_handler_error_maps_to_error_body() {
        let app = app(Arc::new(EchoHandler));
        let request = Envelope::text("fail");

        let response = app.oneshot(post_envelope(&request)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error_kind, "upstream");
        assert_eq!(error.message, "provider exploded");
    }

    #[tokio::test]
    async fn test_http_transport_round_trip_over_socket() {
        use crate::transport::client::{HttpTransport, Transport};
        use std::time::Duration;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app(Arc::new(EchoHandler))).await.unwrap();
        });

        let transport = HttpTransport::new();
        let request = Envelope::text("over the wire").with_correlation_id("corr-net");

        let reply = transport
            .send(&address, &request, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply.content, "echo: over the wire");
        assert_eq!(reply.correlation_id, "corr-net");
    }

    #[tokio::test]
    async fn test_http_transport_surfaces_rejection() {
        use crate::transport::client::{HttpTransport, Transport, TransportError};
        use std::time::Duration;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app(Arc::new(EchoHandler))).await.unwrap();
        });

        let transport = HttpTransport::new();
        let request = Envelope::text("fail");

        let err = transport
            .send(&address, &request, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            TransportError::Rejected { error_kind, message, .. } => {
                assert_eq!(error_kind, "upstream");
                assert_eq!(message, "provider exploded");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app(Arc::new(EchoHandler));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
