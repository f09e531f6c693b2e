//! Error types for nlip-mesh.
#![allow(dead_code)]

use thiserror::Error;

use crate::protocol::DecodeError;
use crate::registry::NotFoundError;
use crate::transport::TransportError;
use crate::worker::WorkerError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Registry error: {0}")]
    Registry(#[from] NotFoundError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("{0}")]
    Other(String),
}
