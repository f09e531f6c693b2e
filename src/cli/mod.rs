//! CLI commands for nlip-mesh using clap.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{load_settings_or_default, validate_settings, Settings};
use crate::coordinator::{CoordinatorHandler, DelegationRouter, KeywordPlanner, RouterConfig};
use crate::protocol::Envelope;
use crate::registry::Registry;
use crate::transport::{serve, HttpTransport, ServerConfig, Transport};
use crate::worker::{NewsAdapter, StockAdapter, WeatherAdapter, WorkerAdapter, WorkerHandler};

/// nlip-mesh - inter-agent message protocol and delegation router.
#[derive(Parser)]
#[command(name = "nlip-mesh")]
#[command(version = "0.1.0")]
#[command(about = "Coordinator and worker services for an NLIP agent mesh", long_about = None)]
pub struct Commands {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the coordinator service
    Coordinator {
        /// Bind host (overrides settings)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides settings)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a worker service for one retrieval capability
    Worker {
        /// Capability to serve: news, stock, or weather
        #[arg(long)]
        capability: String,

        /// Bind host (overrides settings)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides settings)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Send a one-shot message to an agent endpoint
    Send {
        /// Agent base URL
        #[arg(long, default_value = "http://127.0.0.1:8012")]
        to: String,

        /// Message to send
        message: String,

        /// Seconds to wait for the reply
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },

    /// Validate settings and registry wiring, then exit
    Check,
}

impl Commands {
    pub async fn run(self) -> Result<()> {
        let settings = load_settings_or_default();

        match self.command {
            Command::Coordinator { host, port } => run_coordinator(settings, host, port).await,
            Command::Worker { capability, host, port } => {
                run_worker(settings, capability, host, port).await
            }
            Command::Send { to, message, timeout_secs } => {
                run_send(to, message, timeout_secs).await
            }
            Command::Check => run_check(settings),
        }
    }
}

async fn run_coordinator(
    settings: Settings,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let registry = Arc::new(Registry::from_entries(&settings.agents)?);
    if registry.is_empty() {
        return Err(anyhow!("no agents configured; the coordinator has nothing to delegate to"));
    }

    tracing::info!(
        "Coordinator serving capabilities: {}",
        registry.capabilities().join(", ")
    );

    let config = RouterConfig {
        request_timeout: Duration::from_secs(settings.coordinator.request_timeout_secs),
        transport_timeout: Duration::from_secs(settings.coordinator.transport_timeout_secs),
        ..RouterConfig::default()
    };

    let router = DelegationRouter::new(
        registry,
        Arc::new(HttpTransport::new()),
        Arc::new(KeywordPlanner),
        config,
    );

    let server_config = ServerConfig {
        host: host.unwrap_or(settings.coordinator.host),
        port: port.unwrap_or(settings.coordinator.port),
    };

    serve(server_config, Arc::new(CoordinatorHandler::new(router))).await?;
    Ok(())
}

async fn run_worker(
    settings: Settings,
    capability: String,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let adapter = build_adapter(&settings, &capability)?;

    let bind = settings.workers.get(&capability);
    let server_config = ServerConfig {
        host: host
            .or_else(|| bind.map(|b| b.host.clone()))
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: port
            .or_else(|| bind.map(|b| b.port))
            .ok_or_else(|| anyhow!("no port configured for worker '{}'", capability))?,
    };

    tracing::info!("Worker serving capability '{}'", capability);

    serve(server_config, Arc::new(WorkerHandler::new(adapter))).await?;
    Ok(())
}

/// Build the adapter for a capability. Missing provider keys fail here, at
/// startup, not on the first request.
fn build_adapter(settings: &Settings, capability: &str) -> Result<Arc<dyn WorkerAdapter>> {
    match capability {
        "news" => {
            let api_key = settings.news_api_key().ok_or_else(|| {
                anyhow!(
                    "NEWS_API_KEY is required for the news worker; set it in the \
environment or under providers.news_api_key in settings"
                )
            })?;
            Ok(Arc::new(NewsAdapter::new(api_key)))
        }
        "stock" => Ok(Arc::new(StockAdapter::new())),
        "weather" => Ok(Arc::new(WeatherAdapter::new())),
        other => Err(anyhow!(
            "unknown capability '{}'; expected news, stock, or weather",
            other
        )),
    }
}

async fn run_send(to: String, message: String, timeout_secs: u64) -> Result<()> {
    let transport = HttpTransport::new();
    let envelope = Envelope::text(message);

    println!("-> {} [{}]", to, envelope.correlation_id);

    let reply = transport
        .send(&to, &envelope, Duration::from_secs(timeout_secs))
        .await
        .context("send failed")?;

    println!("{}", reply.content);
    Ok(())
}

fn run_check(settings: Settings) -> Result<()> {
    validate_settings(&settings)?;

    let registry = Registry::from_entries(&settings.agents)?;
    println!("Settings OK");
    println!("Coordinator: {}:{}", settings.coordinator.host, settings.coordinator.port);
    println!("Registered capabilities:");
    for capability in registry.capabilities() {
        let descriptor = registry
            .resolve(capability)
            .map_err(|e| anyhow!(e.to_string()))?;
        println!("  {} -> {} ({})", capability, descriptor.address, descriptor.name);
    }

    if settings.workers.contains_key("news") && settings.news_api_key().is_none() {
        println!("Warning: news worker configured but NEWS_API_KEY is not set");
    }

    Ok(())
}
