//! Match retrieval step.
//!
//! Two collaborator calls in sequence: trigger the computation, then list
//! the results — the list call never runs when the computation reports a
//! non-ok status. Retrieval is user-triggered; every refresh re-runs the
//! full sequence.

use crate::model::{SessionToken, WorkflowEvent};
use crate::service::{ComputeStatus, MatchService};
use std::time::Instant;

#[derive(Default)]
pub struct MatchStep {
    pub in_flight: bool,
    /// Set at each fresh retrieval, cleared when it settles.
    started: Option<Instant>,
    /// Elapsed seconds of the last settled retrieval.
    settled_secs: u64,
    /// `None` until the first successful retrieval; `Some(vec![])` is the
    /// valid "no matches yet" outcome, distinct from an error.
    pub matches: Option<Vec<String>>,
    pub error: Option<String>,
}

impl MatchStep {
    pub fn can_fetch(&self) -> bool {
        !self.in_flight
    }

    pub(crate) fn begin(&mut self) {
        self.in_flight = true;
        self.started = Some(Instant::now());
        self.error = None;
    }

    pub(crate) fn settle(&mut self) {
        self.settled_secs = self.elapsed_secs();
        self.in_flight = false;
        self.started = None;
    }

    /// Waiting-time counter shown by the UI. Advances while the retrieval
    /// is in flight, freezes at settle, resets at the next retrieval.
    /// Observational only — it never affects the request itself.
    pub fn elapsed_secs(&self) -> u64 {
        match self.started {
            Some(started) => started.elapsed().as_secs(),
            None => self.settled_secs,
        }
    }
}

/// Run the compute→list sequence for one retrieval.
pub async fn retrieve(service: &dyn MatchService, token: &SessionToken) -> WorkflowEvent {
    match service.compute_matches(token).await {
        Ok(ComputeStatus::Complete) => match service.list_matches(token).await {
            Ok(handles) => WorkflowEvent::MatchesFetched {
                handles: handles.iter().map(|h| normalize_handle(h)).collect(),
            },
            Err(e) => WorkflowEvent::MatchFetchFailed {
                message: format!("listing matches failed: {e}"),
            },
        },
        Ok(ComputeStatus::Failed(status)) => WorkflowEvent::MatchFetchFailed {
            message: format!("match computation reported: {status}"),
        },
        Err(e) => WorkflowEvent::MatchFetchFailed {
            message: format!("match computation failed: {e}"),
        },
    }
}

/// Handles arrive optionally `@`-prefixed; store them bare and let views
/// add the prefix back.
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_string()
}
