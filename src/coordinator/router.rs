//! Delegation router: the per-request state machine.
//!
//! Each request walks Received -> Planned -> Dispatched -> Aggregating ->
//! Completed (or Failed when planning/resolution dies first). All per-request
//! state lives on the handling task; the only shared data is the read-only
//! registry, so concurrent requests cannot contaminate each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::coordinator::aggregate::{aggregate, CombinedReport, SubtaskOutcome, WorkerResult};
use crate::coordinator::planner::{Planner, Subtask};
use crate::protocol::Envelope;
use crate::registry::Registry;
use crate::transport::{RetryPolicy, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Received,
    Planned,
    Dispatched,
    Aggregating,
    Completed,
    Failed,
}

impl RequestState {
    fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::Planned => "planned",
            RequestState::Dispatched => "dispatched",
            RequestState::Aggregating => "aggregating",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Deadline for the whole request, all subtasks included.
    pub request_timeout: Duration,
    /// Per-call timeout handed to the transport.
    pub transport_timeout: Duration,
    /// Backoff schedule for rate-limited worker replies.
    pub retry: RetryPolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            transport_timeout: Duration::from_secs(20),
            retry: RetryPolicy::default(),
        }
    }
}

pub struct DelegationRouter {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    planner: Arc<dyn Planner>,
    config: RouterConfig,
}

impl DelegationRouter {
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        planner: Arc<dyn Planner>,
        config: RouterConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            planner,
            config,
        }
    }

    /// Handle one request end to end. Always produces a reply envelope; any
    /// failure is reported inside the combined payload.
    pub async fn handle_request(&self, request: Envelope) -> Envelope {
        let request_id = ulid::Ulid::new().to_string();
        let correlation_id = request.correlation_id.clone();

        self.trace_state(&request_id, &correlation_id, RequestState::Received);

        let plan = match self.planner.plan(&request.content) {
            Ok(plan) => plan,
            Err(e) => {
                self.trace_state(&request_id, &correlation_id, RequestState::Failed);
                return CombinedReport::request_failed(
                    &correlation_id,
                    "plan",
                    "plan_failed",
                    e.to_string(),
                )
                .into_envelope(&request);
            }
        };

        tracing::debug!(
            request_id = %request_id,
            correlation_id = %correlation_id,
            subtasks = plan.subtasks.len(),
            "Delegation plan ready"
        );
        self.trace_state(&request_id, &correlation_id, RequestState::Planned);

        // Zero subtasks: answer directly, transport never gets involved.
        if plan.is_direct() {
            self.trace_state(&request_id, &correlation_id, RequestState::Completed);
            return aggregate(&correlation_id, Vec::new()).into_envelope(&request);
        }

        // Resolve every subtask up front; a registry miss is fatal to the
        // request and is never retried.
        let mut resolved: Vec<(Subtask, String)> = Vec::with_capacity(plan.subtasks.len());
        for subtask in plan.subtasks {
            match self.registry.resolve(&subtask.capability) {
                Ok(descriptor) => resolved.push((subtask, descriptor.address.clone())),
                Err(e) => {
                    self.trace_state(&request_id, &correlation_id, RequestState::Failed);
                    return CombinedReport::request_failed(
                        &correlation_id,
                        "registry",
                        "capability_not_found",
                        e.to_string(),
                    )
                    .into_envelope(&request);
                }
            }
        }

        self.trace_state(&request_id, &correlation_id, RequestState::Dispatched);
        let outcomes = self.dispatch(&request_id, &correlation_id, resolved).await;

        let report = aggregate(&correlation_id, outcomes);
        self.trace_state(&request_id, &correlation_id, RequestState::Completed);

        report.into_envelope(&request)
    }

    /// Fan the subtasks out concurrently and collect their outcomes under the
    /// request deadline. Subtasks still outstanding at the deadline are
    /// aborted and degraded rather than awaited.
    async fn dispatch(
        &self,
        request_id: &str,
        correlation_id: &str,
        subtasks: Vec<(Subtask, String)>,
    ) -> Vec<SubtaskOutcome> {
        let mut join_set: JoinSet<(usize, SubtaskOutcome)> = JoinSet::new();
        let mut pending: HashMap<usize, String> = HashMap::new();

        for (index, (subtask, address)) in subtasks.into_iter().enumerate() {
            pending.insert(index, subtask.capability.clone());

            let envelope = subtask.envelope.with_correlation_id(correlation_id);
            let transport = Arc::clone(&self.transport);
            let timeout = self.config.transport_timeout;
            let retry = self.config.retry.clone();
            let capability = subtask.capability;

            join_set.spawn(async move {
                let result = dispatch_one(transport, &address, &envelope, timeout, &retry).await;
                (index, SubtaskOutcome { capability, result })
            });
        }

        self.trace_state(request_id, correlation_id, RequestState::Aggregating);

        let deadline = tokio::time::Instant::now() + self.config.request_timeout;
        let mut outcomes = Vec::new();

        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => {
                    pending.remove(&index);
                    outcomes.push(outcome);
                }
                Ok(Some(Err(e))) => {
                    tracing::error!(
                        request_id = %request_id,
                        correlation_id = %correlation_id,
                        "Subtask task aborted: {}",
                        e
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        request_id = %request_id,
                        correlation_id = %correlation_id,
                        abandoned = pending.len(),
                        "Request deadline elapsed, abandoning outstanding subtasks"
                    );
                    join_set.abort_all();
                    break;
                }
            }
        }

        // Whatever is still pending (deadline hit, or a task died) failed.
        let mut abandoned: Vec<(usize, String)> = pending.into_iter().collect();
        abandoned.sort_unstable_by_key(|(index, _)| *index);
        for (_, capability) in abandoned {
            outcomes.push(SubtaskOutcome {
                capability,
                result: WorkerResult::error(
                    "deadline_exceeded",
                    "request deadline elapsed before the subtask completed",
                ),
            });
        }

        outcomes
    }

    fn trace_state(&self, request_id: &str, correlation_id: &str, state: RequestState) {
        tracing::info!(
            request_id = %request_id,
            correlation_id = %correlation_id,
            state = state.as_str(),
            "Request state"
        );
    }
}

/// Send one subtask, absorbing the transport's own unreachable-retry and
/// adding the worker-level rule: only rate-limited replies earn another
/// attempt, with the same backoff schedule.
async fn dispatch_one(
    transport: Arc<dyn Transport>,
    address: &str,
    envelope: &Envelope,
    timeout: Duration,
    retry: &RetryPolicy,
) -> WorkerResult {
    let mut attempt = 0u32;

    loop {
        match transport.send(address, envelope, timeout).await {
            Ok(reply) => return WorkerResult::ok(reply.content),
            Err(TransportError::Rejected {
                error_kind,
                message,
                ..
            }) => {
                if error_kind == "rate_limited" && attempt < retry.retries {
                    attempt += 1;
                    tracing::debug!(
                        correlation_id = %envelope.correlation_id,
                        "Worker rate limited, retry {}/{} after backoff",
                        attempt,
                        retry.retries
                    );
                    tokio::time::sleep(retry.backoff_delay(attempt)).await;
                    continue;
                }
                return WorkerResult::error(&error_kind, message);
            }
            Err(e @ TransportError::Timeout(_)) => {
                return WorkerResult::error("timeout", e.to_string());
            }
            Err(e @ TransportError::Unreachable { .. }) => {
                return WorkerResult::error("unreachable", e.to_string());
            }
            Err(TransportError::Decode(e)) => {
                return WorkerResult::error(e.kind(), e.to_string());
            }
        }
    }
}
