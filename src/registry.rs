//! Static agent registry mapping capabilities to worker addresses.
//!
//! Loaded once at startup from settings and never mutated afterward, so
//! concurrent lookups need no locking.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::config::AgentEntry;
use crate::error::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no agent registered for capability '{0}'")]
pub struct NotFoundError(pub String);

/// A registered agent process: logical name, base URL, and the retrieval
/// capabilities it serves.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub address: String,
    pub capabilities: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct Registry {
    by_capability: HashMap<String, AgentDescriptor>,
}

impl Registry {
    /// Build the registry from settings entries.
    ///
    /// Each capability must resolve to exactly one agent; a duplicate is a
    /// configuration error rather than a silent override.
    pub fn from_entries(entries: &[AgentEntry]) -> Result<Self, Error> {
        let mut by_capability: HashMap<String, AgentDescriptor> = HashMap::new();

        for entry in entries {
            if entry.capabilities.is_empty() {
                return Err(Error::Config(format!(
                    "agent '{}' declares no capabilities",
                    entry.name
                )));
            }

            let descriptor = AgentDescriptor {
                name: entry.name.clone(),
                address: entry.address.trim_end_matches('/').to_string(),
                capabilities: entry.capabilities.iter().cloned().collect(),
            };

            for capability in &entry.capabilities {
                if let Some(existing) = by_capability.get(capability) {
                    return Err(Error::Config(format!(
                        "capability '{}' registered by both '{}' and '{}'",
                        capability, existing.name, entry.name
                    )));
                }
                by_capability.insert(capability.clone(), descriptor.clone());
            }
        }

        Ok(Self { by_capability })
    }

    /// Resolve the agent serving a capability.
    pub fn resolve(&self, capability: &str) -> Result<&AgentDescriptor, NotFoundError> {
        self.by_capability
            .get(capability)
            .ok_or_else(|| NotFoundError(capability.to_string()))
    }

    /// All registered capabilities, sorted.
    pub fn capabilities(&self) -> Vec<&str> {
        let mut caps: Vec<&str> = self.by_capability.keys().map(String::as_str).collect();
        caps.sort_unstable();
        caps
    }

    pub fn len(&self) -> usize {
        self.by_capability.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_capability.is_empty()
    }
}
