use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub split_url: String,
    pub user_agent: String,
}

/// Match criteria attached to a profile record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub age_min: u32,
    pub age_max: u32,
    pub gender: u32,
}

/// One user's profile and match criteria, as sent to the split endpoint.
///
/// `gender` is 0/1, `region` 1..=4, `preferences.gender` 0/1/2 (2 = any).
/// `interests` must hold exactly 3 distinct values before the record is
/// submittable; that gate lives in the profile step, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub id_nullifier: u32,
    pub age: u32,
    pub gender: u32,
    pub region: u32,
    pub interests: Vec<u32>,
    pub preferences: MatchCriteria,
}

/// Persisted envelope for a submitted profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredProfile {
    #[serde(default)]
    pub saved_utc: String,
    pub profile: Profile,
}

/// Ordered secret shares produced by the split endpoint.
///
/// Held in memory only; a restart before upload discards them and the
/// shares stage allows regeneration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSet {
    pub shares: Vec<Bytes>,
}

impl ShareSet {
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

/// Bearer credential returned by a successful upload.
///
/// Opaque to the client; expiry, if any, surfaces as a request failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Workflow stage, re-derived from persisted state at every startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Profile,
    Shares,
    Matches,
}

/// Completions emitted by the controller and applied to the workflow
/// machine on the UI thread.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    SharesGenerated { shares: ShareSet },
    GenerateFailed { message: String },
    UploadAccepted { token: SessionToken },
    /// Server-reported semantic rejection, message shown verbatim.
    UploadRejected { message: String },
    /// Transport or parse failure on upload.
    UploadFailed { message: String },
    MatchesFetched { handles: Vec<String> },
    MatchFetchFailed { message: String },
}
