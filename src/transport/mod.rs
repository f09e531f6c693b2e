//! Request/response transport between agent processes.

pub mod client;
pub mod server;

pub use client::{HttpTransport, RetryPolicy, Transport, TransportError};
pub use server::{serve, EnvelopeHandler, ErrorBody, ServerConfig, ServiceError};
