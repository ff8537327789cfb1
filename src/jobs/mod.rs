// Asynchronous media generation jobs
//
// Providers accept a prompt, hand back a job id and finish minutes later:
// - Sora: video generation through the OpenAI videos API
// - Mureka: instrumental music generation

pub mod mureka;
pub mod sora;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::config::{Config, Credentials, Service};
use crate::error::{KataribeError, Result};
use crate::poll::{PollPolicy, PollState};

/// Normalized job state across providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// A job as last reported by its provider
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub id: String,
    pub status: JobStatus,
    /// Provider reply, kept for display
    pub raw: serde_json::Value,
}

/// Create / status / download for a generation provider
#[async_trait]
pub trait GenerationJobs: Send + Sync {
    /// "video" or "music", used in logs and timeouts
    fn kind(&self) -> &'static str;

    async fn create(&self, prompt: &str) -> Result<JobInfo>;

    async fn status(&self, id: &str) -> Result<JobInfo>;

    /// Save the finished job's media to `dest`
    async fn download(&self, id: &str, dest: &Path) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Video,
    Music,
}

impl FromStr for JobKind {
    type Err = KataribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "music" => Ok(Self::Music),
            _ => Err(KataribeError::Input(format!("Invalid job kind '{}'. Valid kinds: video, music", s))),
        }
    }
}

/// Factory for job providers
pub struct JobsFactory;

impl JobsFactory {
    pub fn create(kind: JobKind, config: &Config, credentials: &Credentials) -> Result<Box<dyn GenerationJobs>> {
        let jobs: Box<dyn GenerationJobs> = match kind {
            JobKind::Video => Box::new(sora::SoraJobs::new(
                &config.generation.openai.base_url,
                &config.jobs.video_model,
                credentials.require(Service::OpenAi)?,
            )?),
            JobKind::Music => Box::new(mureka::MurekaJobs::new(
                &config.jobs.mureka_base_url,
                &config.jobs.music_model,
                credentials.require(Service::Mureka)?,
            )?),
        };
        Ok(jobs)
    }
}

/// Poll a job until it completes; a failed job ends polling with `JobFailed`
pub async fn wait_for_job(jobs: &dyn GenerationJobs, id: &str, policy: &PollPolicy) -> Result<JobInfo> {
    let what = format!("{} job {}", jobs.kind(), id);
    let info = policy
        .poll_until(&what, || async {
            let info = jobs.status(id).await?;
            info!("{} job {}: {}", jobs.kind(), id, info.status);
            match &info.status {
                JobStatus::Completed => Ok(PollState::Ready(info)),
                JobStatus::Failed(reason) => Err(KataribeError::JobFailed {
                    id: id.to_string(),
                    reason: reason.clone(),
                }),
                JobStatus::Pending | JobStatus::Running => Ok(PollState::Pending),
            }
        })
        .await?;
    Ok(info)
}
