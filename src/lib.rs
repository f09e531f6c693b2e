//! nlip-mesh library root.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod registry;
pub mod transport;
pub mod worker;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use coordinator::{CombinedReport, DelegationRouter, KeywordPlanner, Planner};
pub use error::{Error, Result};
pub use protocol::{Envelope, Format};
pub use registry::{AgentDescriptor, Registry};
pub use transport::{HttpTransport, Transport};
pub use worker::{WorkerAdapter, WorkerError};
