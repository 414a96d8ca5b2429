//! Client-side workflow state machine.
//!
//! Sequences the profile → shares → matches flow, persists progress across
//! restarts and owns the session-token lifecycle. UI layers ask the machine
//! to `begin_*` an operation (which hands back a command for the controller
//! when the gate is open) and feed completions back through `apply`. The
//! machine and its store are only ever touched from one logical thread.

mod controller;
pub mod matches;
pub mod profile;
pub mod shares;

pub use controller::{run_controller, WorkflowCommand};
pub use matches::MatchStep;
pub use profile::ProfileStep;
pub use shares::ShareStep;

use crate::model::{Profile, SessionToken, Stage, StoredProfile, WorkflowEvent};
use crate::schema;
use crate::store::{self, KeyValueStore};
use anyhow::Result;

/// Initial stage as a pure function of what survived in the store.
///
/// A token without a profile cannot occur through the normal flow; if the
/// store ever presents one, the profile stage wins and the orphan token is
/// overwritten by the next upload.
pub fn derive_stage(has_profile: bool, has_token: bool) -> Stage {
    match (has_profile, has_token) {
        (false, _) => Stage::Profile,
        (true, false) => Stage::Shares,
        (true, true) => Stage::Matches,
    }
}

pub struct Workflow<S: KeyValueStore> {
    store: S,
    stage: Stage,
    show_profile: bool,
    saved_utc: Option<String>,
    token: Option<SessionToken>,
    pub profile: ProfileStep,
    pub shares: ShareStep,
    pub matches: MatchStep,
}

impl<S: KeyValueStore> Workflow<S> {
    /// Run the schema guard, then derive the initial stage from the store.
    /// `draft` seeds the editable record when nothing is persisted yet.
    pub fn load(mut store: S, draft: Profile) -> Result<Self> {
        schema::ensure_current(&mut store)?;

        let stored = store::load_profile(&store);
        let token = store::load_token(&store);
        let stage = derive_stage(stored.is_some(), token.is_some());

        let (profile, saved_utc) = match stored {
            Some(StoredProfile { saved_utc, profile }) => {
                (ProfileStep::submitted(profile), Some(saved_utc))
            }
            None => (ProfileStep::draft(draft), None),
        };

        Ok(Self {
            store,
            stage,
            show_profile: false,
            saved_utc,
            token,
            profile,
            shares: ShareStep::default(),
            matches: MatchStep::default(),
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn saved_utc(&self) -> Option<&str> {
        self.saved_utc.as_deref()
    }

    /// Whether the profile view is on screen: always in the profile stage,
    /// later only while the read-only overlay is toggled on.
    pub fn profile_visible(&self) -> bool {
        self.stage == Stage::Profile || self.show_profile
    }

    /// Overlay the stored profile for review. A projection only — the
    /// underlying stage does not change, and the record stays read-only.
    pub fn toggle_profile_view(&mut self) {
        if self.stage != Stage::Profile {
            self.show_profile = !self.show_profile;
        }
    }

    /// Persist the profile and advance to the shares stage. Returns whether
    /// anything happened; with fewer than the required interests selected
    /// this is a gated no-op and nothing is persisted.
    pub fn submit_profile(&mut self) -> Result<bool> {
        if self.stage != Stage::Profile || !self.profile.can_submit() {
            return Ok(false);
        }
        let stored = store::save_profile(&mut self.store, self.profile.record())?;
        self.saved_utc = Some(stored.saved_utc);
        self.profile.mark_read_only();
        self.stage = Stage::Shares;
        Ok(true)
    }

    pub fn begin_generate(&mut self) -> Option<WorkflowCommand> {
        if self.stage != Stage::Shares || !self.shares.can_generate() {
            return None;
        }
        self.shares.generating = true;
        self.shares.error = None;
        Some(WorkflowCommand::GenerateShares {
            profile: self.profile.record().clone(),
        })
    }

    pub fn begin_upload(&mut self) -> Option<WorkflowCommand> {
        if self.stage != Stage::Shares || !self.shares.can_upload() {
            return None;
        }
        let shares = self.shares.shares.clone()?;
        self.shares.uploading = true;
        self.shares.error = None;
        Some(WorkflowCommand::UploadShares {
            shares,
            handle: self.shares.handle.trim().to_string(),
        })
    }

    pub fn begin_match_fetch(&mut self) -> Option<WorkflowCommand> {
        if self.stage != Stage::Matches || !self.matches.can_fetch() {
            return None;
        }
        let token = self.token.clone()?;
        self.matches.begin();
        Some(WorkflowCommand::FetchMatches { token })
    }

    /// Apply a completion. All store writes happen here, on the calling
    /// thread; a second share set arriving while one is held is discarded.
    pub fn apply(&mut self, event: WorkflowEvent) -> Result<()> {
        match event {
            WorkflowEvent::SharesGenerated { shares } => {
                self.shares.generating = false;
                if self.shares.shares.is_none() {
                    self.shares.shares = Some(shares);
                }
            }
            WorkflowEvent::GenerateFailed { message } => {
                self.shares.generating = false;
                self.shares.error = Some(message);
            }
            WorkflowEvent::UploadAccepted { token } => {
                self.shares.uploading = false;
                self.shares.upload_complete = true;
                self.shares.error = None;
                store::save_token(&mut self.store, &token)?;
                self.token = Some(token);
                self.stage = Stage::Matches;
            }
            WorkflowEvent::UploadRejected { message } | WorkflowEvent::UploadFailed { message } => {
                self.shares.uploading = false;
                self.shares.error = Some(message);
            }
            WorkflowEvent::MatchesFetched { handles } => {
                self.matches.settle();
                self.matches.matches = Some(handles);
            }
            WorkflowEvent::MatchFetchFailed { message } => {
                self.matches.settle();
                self.matches.error = Some(message);
            }
        }
        Ok(())
    }

    /// Full reset: wipe the store, restamp the schema version and start
    /// over from an empty profile stage. The only path that regresses the
    /// stage.
    pub fn reset(&mut self, draft: Profile) -> Result<()> {
        self.store.clear()?;
        schema::ensure_current(&mut self.store)?;
        self.stage = Stage::Profile;
        self.show_profile = false;
        self.saved_utc = None;
        self.token = None;
        self.profile = ProfileStep::draft(draft);
        self.shares = ShareStep::default();
        self.matches = MatchStep::default();
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod support {
    use crate::model::{MatchCriteria, Profile, SessionToken, ShareSet};
    use crate::service::{ComputeStatus, MatchService, ServiceError, UploadOutcome};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    pub fn sample_profile() -> Profile {
        Profile {
            id: "0x1fed07ad686a727dfc33b91206d526e61f519dca".into(),
            id_nullifier: 12345,
            age: 30,
            gender: 0,
            region: 1,
            interests: vec![5, 8, 10],
            preferences: MatchCriteria {
                age_min: 25,
                age_max: 35,
                gender: 1,
            },
        }
    }

    pub fn sample_shares(n: usize) -> ShareSet {
        ShareSet {
            shares: (0..n)
                .map(|i| Bytes::from(vec![i as u8; 4]))
                .collect(),
        }
    }

    #[derive(Debug, Default, Clone, Copy)]
    pub struct CallCounts {
        pub split: usize,
        pub upload: usize,
        pub compute_matches: usize,
        pub list_matches: usize,
    }

    /// Scripted collaborator with call counters.
    #[derive(Default)]
    pub struct MockService {
        calls: Mutex<CallCounts>,
        shares: Option<ShareSet>,
        split_failure: bool,
        token: Option<String>,
        upload_rejection: Option<String>,
        upload_transport_failure: bool,
        compute_status: Option<String>,
        matches: Option<Vec<String>>,
    }

    impl MockService {
        pub fn with_shares(mut self, shares: ShareSet) -> Self {
            self.shares = Some(shares);
            self
        }

        pub fn with_split_failure(mut self) -> Self {
            self.split_failure = true;
            self
        }

        pub fn with_token(mut self, token: &str) -> Self {
            self.token = Some(token.into());
            self
        }

        pub fn with_upload_rejection(mut self, message: &str) -> Self {
            self.upload_rejection = Some(message.into());
            self
        }

        pub fn with_upload_transport_failure(mut self) -> Self {
            self.upload_transport_failure = true;
            self
        }

        pub fn with_compute_status(mut self, status: &str) -> Self {
            self.compute_status = Some(status.into());
            self
        }

        pub fn with_matches(mut self, matches: Vec<String>) -> Self {
            self.matches = Some(matches);
            self
        }

        pub fn calls(&self) -> CallCounts {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl MatchService for MockService {
        async fn split(&self, _profile: &Profile) -> Result<ShareSet, ServiceError> {
            self.calls.lock().unwrap().split += 1;
            if self.split_failure {
                return Err(ServiceError::Decode("connection refused".into()));
            }
            Ok(self.shares.clone().unwrap_or_else(|| sample_shares(3)))
        }

        async fn upload(
            &self,
            _shares: &ShareSet,
            _handle: &str,
        ) -> Result<UploadOutcome, ServiceError> {
            self.calls.lock().unwrap().upload += 1;
            if self.upload_transport_failure {
                return Err(ServiceError::Decode("connection refused".into()));
            }
            if let Some(message) = &self.upload_rejection {
                return Ok(UploadOutcome::Rejected(message.clone()));
            }
            let token = self.token.clone().unwrap_or_else(|| "token-1".into());
            Ok(UploadOutcome::Accepted(SessionToken::new(token)))
        }

        async fn compute_matches(
            &self,
            _token: &SessionToken,
        ) -> Result<ComputeStatus, ServiceError> {
            self.calls.lock().unwrap().compute_matches += 1;
            match &self.compute_status {
                None => Ok(ComputeStatus::Complete),
                Some(status) => Ok(ComputeStatus::Failed(status.clone())),
            }
        }

        async fn list_matches(&self, _token: &SessionToken) -> Result<Vec<String>, ServiceError> {
            self.calls.lock().unwrap().list_matches += 1;
            Ok(self.matches.clone().unwrap_or_default())
        }
    }
}
