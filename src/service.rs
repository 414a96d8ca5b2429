//! Remote collaborators: the split, upload and matches endpoints.
//!
//! The workflow treats all four calls as opaque. Server-reported semantic
//! errors (an upload rejection, a non-ok compute status) are data, not
//! `Err` — only transport and parse failures surface as `ServiceError`.

use crate::model::{ClientConfig, Profile, SessionToken, ShareSet};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Outcome of an upload that completed at the transport level.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Accepted(SessionToken),
    Rejected(String),
}

/// Outcome of a compute-matches call that completed at the transport level.
#[derive(Debug, Clone)]
pub enum ComputeStatus {
    Complete,
    Failed(String),
}

#[async_trait]
pub trait MatchService: Send + Sync {
    async fn split(&self, profile: &Profile) -> Result<ShareSet, ServiceError>;
    async fn upload(&self, shares: &ShareSet, handle: &str) -> Result<UploadOutcome, ServiceError>;
    async fn compute_matches(&self, token: &SessionToken) -> Result<ComputeStatus, ServiceError>;
    async fn list_matches(&self, token: &SessionToken) -> Result<Vec<String>, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct SplitResponse {
    shares: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MatchListResponse {
    matches: Vec<String>,
}

pub struct HttpMatchService {
    http: reqwest::Client,
    split_url: String,
    api_url: String,
}

impl HttpMatchService {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            split_url: cfg.split_url.clone(),
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MatchService for HttpMatchService {
    async fn split(&self, profile: &Profile) -> Result<ShareSet, ServiceError> {
        let resp: SplitResponse = self
            .http
            .post(&self.split_url)
            .json(profile)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let shares = resp
            .shares
            .iter()
            .map(|encoded| hex::decode(encoded).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServiceError::Decode(format!("share blob is not hex: {e}")))?;
        Ok(ShareSet { shares })
    }

    async fn upload(&self, shares: &ShareSet, handle: &str) -> Result<UploadOutcome, ServiceError> {
        let mut form = reqwest::multipart::Form::new();
        for (idx, share) in shares.shares.iter().enumerate() {
            form = form.part(
                format!("file{}", idx + 1),
                reqwest::multipart::Part::bytes(share.to_vec()),
            );
        }

        let resp: UploadResponse = self
            .http
            .post(format!("{}/upload", self.api_url))
            .query(&[("twitter_handle", handle)])
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (resp.token, resp.error) {
            (Some(token), _) => Ok(UploadOutcome::Accepted(SessionToken::new(token))),
            (None, Some(error)) => Ok(UploadOutcome::Rejected(error)),
            (None, None) => Err(ServiceError::Decode(
                "upload response carried neither token nor error".into(),
            )),
        }
    }

    async fn compute_matches(&self, token: &SessionToken) -> Result<ComputeStatus, ServiceError> {
        let status: serde_json::Value = self
            .http
            .post(format!("{}/matches", self.api_url))
            .bearer_auth(token.as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match status.as_str() {
            Some("ok") => Ok(ComputeStatus::Complete),
            Some(other) => Ok(ComputeStatus::Failed(other.to_string())),
            None => Ok(ComputeStatus::Failed(status.to_string())),
        }
    }

    async fn list_matches(&self, token: &SessionToken) -> Result<Vec<String>, ServiceError> {
        let resp: MatchListResponse = self
            .http
            .get(format!("{}/matches", self.api_url))
            .bearer_auth(token.as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.matches)
    }
}
