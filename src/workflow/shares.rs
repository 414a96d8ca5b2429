//! Share generation and upload step.
//!
//! Generation keeps at most one share set in memory; upload is gated on a
//! non-empty handle and a held share set, and is permanently disabled once a
//! token has been received.

use crate::model::{Profile, ShareSet, WorkflowEvent};
use crate::service::{MatchService, UploadOutcome};

#[derive(Default)]
pub struct ShareStep {
    pub handle: String,
    pub shares: Option<ShareSet>,
    pub generating: bool,
    pub uploading: bool,
    pub upload_complete: bool,
    pub error: Option<String>,
}

impl ShareStep {
    pub fn can_generate(&self) -> bool {
        self.shares.is_none() && !self.generating && !self.uploading
    }

    pub fn can_upload(&self) -> bool {
        self.shares.as_ref().is_some_and(|s| !s.is_empty())
            && !self.handle.trim().is_empty()
            && !self.generating
            && !self.uploading
            && !self.upload_complete
    }

    pub fn busy(&self) -> bool {
        self.generating || self.uploading
    }

    pub fn push_handle_char(&mut self, c: char) {
        if !c.is_control() {
            self.handle.push(c);
        }
    }

    pub fn pop_handle_char(&mut self) {
        self.handle.pop();
    }
}

/// Call the split collaborator for one profile record.
pub async fn generate(service: &dyn MatchService, profile: &Profile) -> WorkflowEvent {
    match service.split(profile).await {
        Ok(shares) if !shares.is_empty() => WorkflowEvent::SharesGenerated { shares },
        Ok(_) => WorkflowEvent::GenerateFailed {
            message: "split returned no shares".into(),
        },
        Err(e) => WorkflowEvent::GenerateFailed {
            message: format!("share generation failed: {e}"),
        },
    }
}

/// Upload a share set under a public handle.
pub async fn upload(service: &dyn MatchService, shares: &ShareSet, handle: &str) -> WorkflowEvent {
    match service.upload(shares, handle).await {
        Ok(UploadOutcome::Accepted(token)) => WorkflowEvent::UploadAccepted { token },
        Ok(UploadOutcome::Rejected(message)) => WorkflowEvent::UploadRejected { message },
        Err(e) => WorkflowEvent::UploadFailed {
            message: format!("upload failed: {e}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::support::{sample_profile, sample_shares, MockService};

    #[tokio::test]
    async fn generate_wraps_split_output() {
        let service = MockService::default().with_shares(sample_shares(3));
        let ev = generate(&service, &sample_profile()).await;
        match ev {
            WorkflowEvent::SharesGenerated { shares } => assert_eq!(shares.len(), 3),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_surfaces_split_failures_as_retryable_errors() {
        let service = MockService::default().with_split_failure();
        let ev = generate(&service, &sample_profile()).await;
        match ev {
            WorkflowEvent::GenerateFailed { message } => {
                assert!(message.contains("share generation failed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_surfaces_empty_share_lists_as_errors() {
        let service = MockService::default().with_shares(sample_shares(0));
        let ev = generate(&service, &sample_profile()).await;
        assert!(matches!(ev, WorkflowEvent::GenerateFailed { .. }));
    }

    #[tokio::test]
    async fn upload_distinguishes_rejection_from_transport_failure() {
        let service = MockService::default().with_upload_rejection("bad handle");
        let ev = upload(&service, &sample_shares(3), "alice").await;
        match ev {
            WorkflowEvent::UploadRejected { message } => assert_eq!(message, "bad handle"),
            other => panic!("unexpected event: {other:?}"),
        }

        let service = MockService::default().with_upload_transport_failure();
        let ev = upload(&service, &sample_shares(3), "alice").await;
        assert!(matches!(ev, WorkflowEvent::UploadFailed { .. }));
    }

    #[test]
    fn upload_gate_requires_handle_and_shares() {
        let mut step = ShareStep::default();
        assert!(!step.can_upload());

        step.shares = Some(sample_shares(3));
        assert!(!step.can_upload());

        step.handle = "  ".into();
        assert!(!step.can_upload());

        step.handle = "alice".into();
        assert!(step.can_upload());

        step.upload_complete = true;
        assert!(!step.can_upload());
    }

    #[test]
    fn generate_gate_closes_while_a_set_is_held() {
        let mut step = ShareStep::default();
        assert!(step.can_generate());
        step.generating = true;
        assert!(!step.can_generate());
        step.generating = false;
        step.shares = Some(sample_shares(3));
        assert!(!step.can_generate());
    }
}
