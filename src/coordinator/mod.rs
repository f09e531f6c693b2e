//! Coordinator: plans delegations, dispatches them, and merges the results.

pub mod aggregate;
pub mod planner;
pub mod router;

use async_trait::async_trait;

use crate::protocol::Envelope;
use crate::transport::{EnvelopeHandler, ServiceError};

pub use aggregate::{aggregate, CombinedReport, ResultStatus, SubtaskOutcome, WorkerResult};
pub use planner::{DelegationPlan, KeywordPlanner, PlanError, Planner, Subtask};
pub use router::{DelegationRouter, RouterConfig};

/// Bridges the delegation router onto the wire endpoint.
pub struct CoordinatorHandler {
    router: DelegationRouter,
}

impl CoordinatorHandler {
    pub fn new(router: DelegationRouter) -> Self {
        Self { router }
    }
}

#[async_trait]
impl EnvelopeHandler for CoordinatorHandler {
    async fn handle(&self, envelope: Envelope) -> Result<Envelope, ServiceError> {
        // The router reports failures inside the combined reply rather than
        // through wire-level error statuses.
        Ok(self.router.handle_request(envelope).await)
    }
}
