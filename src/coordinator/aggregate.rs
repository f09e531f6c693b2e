//! Aggregation of subtask outcomes into one combined reply.
//!
//! Partial-failure semantics: a failed subtask degrades the combined status,
//! it never erases the results that did arrive.

use serde::{Deserialize, Serialize};

use crate::protocol::Envelope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    Partial,
    Error,
}

/// Outcome of one delegated retrieval. `payload` is present iff the status is
/// not `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub status: ResultStatus,
    pub payload: Option<String>,
    pub error_kind: Option<String>,
    pub message: Option<String>,
}

impl WorkerResult {
    pub fn ok(payload: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Ok,
            payload: Some(payload.into()),
            error_kind: None,
            message: None,
        }
    }

    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            payload: None,
            error_kind: Some(kind.to_string()),
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ResultStatus::Error
    }
}

/// A resolved subtask, tagged with the capability that served it.
#[derive(Debug, Clone)]
pub struct SubtaskOutcome {
    pub capability: String,
    pub result: WorkerResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub capability: String,
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityFailure {
    pub capability: String,
    pub error_kind: String,
    pub message: String,
}

/// The combined answer returned to the client: every successful payload plus
/// a flag for every capability that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedReport {
    pub status: ResultStatus,
    pub correlation_id: String,
    pub results: Vec<CapabilityResult>,
    pub failures: Vec<CapabilityFailure>,
}

impl CombinedReport {
    /// Report for a request that never got past planning.
    pub fn request_failed(
        correlation_id: &str,
        stage: &str,
        error_kind: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: ResultStatus::Error,
            correlation_id: correlation_id.to_string(),
            results: Vec::new(),
            failures: vec![CapabilityFailure {
                capability: stage.to_string(),
                error_kind: error_kind.to_string(),
                message: message.into(),
            }],
        }
    }

    /// Wrap the report in a structured reply to the originating request.
    pub fn into_envelope(self, request: &Envelope) -> Envelope {
        let content = serde_json::to_string(&self).unwrap_or_default();
        request
            .reply_structured(content)
            .with_metadata("status", status_str(self.status))
    }
}

fn status_str(status: ResultStatus) -> &'static str {
    match status {
        ResultStatus::Ok => "ok",
        ResultStatus::Partial => "partial",
        ResultStatus::Error => "error",
    }
}

/// Merge subtask outcomes: `ok` when everything succeeded (including the
/// zero-subtask direct answer), `error` when everything failed, `partial` in
/// between.
pub fn aggregate(correlation_id: &str, outcomes: Vec<SubtaskOutcome>) -> CombinedReport {
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        if outcome.result.is_error() {
            failures.push(CapabilityFailure {
                capability: outcome.capability,
                error_kind: outcome
                    .result
                    .error_kind
                    .unwrap_or_else(|| "upstream".to_string()),
                message: outcome.result.message.unwrap_or_default(),
            });
        } else {
            results.push(CapabilityResult {
                capability: outcome.capability,
                payload: outcome.result.payload.unwrap_or_default(),
            });
        }
    }

    let status = if failures.is_empty() {
        ResultStatus::Ok
    } else if results.is_empty() {
        ResultStatus::Error
    } else {
        ResultStatus::Partial
    };

    CombinedReport {
        status,
        correlation_id: correlation_id.to_string(),
        results,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_outcome(capability: &str, payload: &str) -> SubtaskOutcome {
        SubtaskOutcome {
            capability: capability.to_string(),
            result: WorkerResult::ok(payload),
        }
    }

    fn err_outcome(capability: &str, kind: &str) -> SubtaskOutcome {
        SubtaskOutcome {
            capability: capability.to_string(),
            result: WorkerResult::error(kind, format!("{} failed", capability)),
        }
    }

    #[test]
    fn test_all_ok() {
        let report = aggregate(
            "corr-1",
            vec![ok_outcome("stock", "875.30"), ok_outcome("news", "3 articles")],
        );
        assert_eq!(report.status, ResultStatus::Ok);
        assert_eq!(report.results.len(), 2);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_zero_subtasks_is_ok() {
        let report = aggregate("corr-2", vec![]);
        assert_eq!(report.status, ResultStatus::Ok);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_mixed_outcomes_are_partial() {
        let report = aggregate(
            "corr-3",
            vec![ok_outcome("stock", "875.30"), err_outcome("news", "no_data")],
        );
        assert_eq!(report.status, ResultStatus::Partial);
        assert_eq!(report.results[0].capability, "stock");
        assert_eq!(report.failures[0].capability, "news");
        assert_eq!(report.failures[0].error_kind, "no_data");
    }

    #[test]
    fn test_all_failed_is_error() {
        let report = aggregate(
            "corr-4",
            vec![err_outcome("stock", "upstream"), err_outcome("news", "upstream")],
        );
        assert_eq!(report.status, ResultStatus::Error);
        assert!(report.results.is_empty());
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn test_worker_result_payload_invariant() {
        let ok = WorkerResult::ok("data");
        assert!(ok.payload.is_some());
        assert!(ok.error_kind.is_none());

        let err = WorkerResult::error("no_data", "empty");
        assert!(err.payload.is_none());
        assert_eq!(err.error_kind.as_deref(), Some("no_data"));
    }

    #[test]
    fn test_report_envelope_round_trips_as_json() {
        let request = Envelope::text("quote NVDA").with_correlation_id("corr-5");
        let report = aggregate("corr-5", vec![ok_outcome("stock", "875.30")]);
        let envelope = report.into_envelope(&request);

        assert_eq!(envelope.correlation_id, "corr-5");
        assert_eq!(envelope.metadata("status"), Some("ok"));

        let parsed: CombinedReport = serde_json::from_str(&envelope.content).unwrap();
        assert_eq!(parsed.status, ResultStatus::Ok);
        assert_eq!(parsed.correlation_id, "corr-5");
    }

    #[test]
    fn test_request_failed_report() {
        let report = CombinedReport::request_failed("corr-6", "plan", "plan_failed", "empty");
        assert_eq!(report.status, ResultStatus::Error);
        assert_eq!(report.failures[0].error_kind, "plan_failed");
    }
}
