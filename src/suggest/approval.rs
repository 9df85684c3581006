//! Approval hook
//!
//! The boundary where a validated candidate leaves the engine. What happens
//! after submission (review queues, human sign-off, insertion into the
//! library) belongs to the host system.

use std::sync::{Arc, Mutex, PoisonError};

use crate::observability::{log_event_with_fields, Event};
use crate::scoring::{BoundedCaller, CollaboratorError, CollaboratorResult};

use super::candidate::FingerprintCandidate;

/// Hands a candidate to an external approval workflow.
///
/// Returns whether the workflow accepted it for review. The engine does not
/// wait for a review outcome.
pub trait ApprovalHook: Send + Sync {
    fn submit_candidate(
        &self,
        candidate: &FingerprintCandidate,
        approver: Option<&str>,
    ) -> CollaboratorResult<bool>;
}

/// Keeps every submitted candidate in memory
#[derive(Debug, Default)]
pub struct RecordingApprovalHook {
    submitted: Mutex<Vec<(FingerprintCandidate, Option<String>)>>,
}

impl RecordingApprovalHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submissions so far, oldest first
    pub fn submissions(&self) -> Vec<(FingerprintCandidate, Option<String>)> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ApprovalHook for RecordingApprovalHook {
    fn submit_candidate(
        &self,
        candidate: &FingerprintCandidate,
        approver: Option<&str>,
    ) -> CollaboratorResult<bool> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((candidate.clone(), approver.map(String::from)));
        Ok(true)
    }
}

/// Submits `candidate` through `caller`.
///
/// Returns `Some(accepted)`, or `None` when the hook could not be reached
/// within its bounds. Failures are logged, never raised.
pub fn submit_bounded(
    caller: &BoundedCaller,
    hook: &Arc<dyn ApprovalHook>,
    candidate: &FingerprintCandidate,
    approver: Option<&str>,
) -> Option<bool> {
    let hook = Arc::clone(hook);
    let job_candidate = candidate.clone();
    let job_approver = approver.map(String::from);

    let result = caller.call("approval", move || {
        hook.submit_candidate(&job_candidate, job_approver.as_deref())
    });

    let trace = candidate.source_trace.to_string();
    match result {
        Ok(accepted) => {
            log_event_with_fields(
                Event::CandidateSubmitted,
                &[
                    ("accepted", if accepted { "true" } else { "false" }),
                    ("rule_id", &candidate.proposed_rule_id),
                    ("trace_id", &trace),
                ],
            );
            Some(accepted)
        }
        Err(e) => {
            let event = match e {
                CollaboratorError::Timeout { .. } => Event::CollaboratorTimeout,
                _ => Event::CollaboratorFailed,
            };
            log_event_with_fields(
                event,
                &[
                    ("code", e.code()),
                    ("collaborator", "approval"),
                    ("reason", &e.to_string()),
                    ("trace_id", &trace),
                ],
            );
            None
        }
    }
}
