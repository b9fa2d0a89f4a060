//! promoter-ci: starting parameterized CI builds.
//!
//! Builds are queued through [`BuildTrigger`]; [`JenkinsTrigger`] posts to
//! the job's `buildWithParameters` endpoint and reports the queue item id
//! from the `Location` header.

use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use promoter_core::config::CiConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("CI request failed: {0}")]
    Transport(String),

    #[error("job {job} not found")]
    JobNotFound { job: String },

    #[error("CI server rejected build of {job} with HTTP {status}")]
    Rejected { job: String, status: u16 },

    #[error("invalid CI client settings: {0}")]
    Config(String),
}

/// Queue position of a triggered build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedBuild {
    pub job: String,
    /// Queue item id, when the server reported one.
    pub queue_id: Option<u64>,
}

#[async_trait::async_trait]
pub trait BuildTrigger: Send + Sync {
    async fn start_build(&self, job: &str, branch: &str, change_type: &str) -> Result<QueuedBuild, BuildError>;
}

pub struct JenkinsTrigger {
    http: reqwest::Client,
    base_url: String,
    user: String,
    token: String,
}

impl JenkinsTrigger {
    pub fn new(base_url: &str, user: &str, token: &str) -> Result<Self, BuildError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| BuildError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            token: token.to_string(),
        })
    }

    pub fn from_config(config: &CiConfig) -> Result<Self, BuildError> {
        Self::new(&config.base_url, &config.user, &config.token)
    }
}

#[async_trait::async_trait]
impl BuildTrigger for JenkinsTrigger {
    async fn start_build(&self, job: &str, branch: &str, change_type: &str) -> Result<QueuedBuild, BuildError> {
        let url = format!("{}/job/{}/buildWithParameters", self.base_url, job);
        let params = [("CHANGE_TYPE", change_type), ("gitlabSourceBranch", branch)];

        let resp = self
            .http
            .post(&url)
            .basic_auth(&self.user, Some(&self.token))
            .form(&params)
            .send()
            .await
            .map_err(|e| BuildError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            warn!(%job, "CI job not found");
            return Err(BuildError::JobNotFound { job: job.to_string() });
        }
        if !status.is_success() {
            warn!(%job, status = status.as_u16(), "CI build rejected");
            return Err(BuildError::Rejected {
                job: job.to_string(),
                status: status.as_u16(),
            });
        }

        let queue_id = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_queue_id);

        info!(%job, %branch, ?queue_id, "build is in queue");
        Ok(QueuedBuild {
            job: job.to_string(),
            queue_id,
        })
    }
}

/// Extract the id from a `.../queue/item/<id>/` location.
pub fn parse_queue_id(location: &str) -> Option<u64> {
    let mut segments = location.trim_end_matches('/').rsplit('/');
    let id = segments.next()?;
    match segments.next() {
        Some("item") => id.parse().ok(),
        _ => None,
    }
}
