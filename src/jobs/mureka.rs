use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::{GenerationJobs, JobInfo, JobStatus};
use crate::error::{KataribeError, Result};
use crate::http::{DEFAULT_TIMEOUT, build_client, download_to_file, ensure_success};

const SERVICE: &str = "Mureka";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct MusicTask {
    id: String,
    status: String,
    #[serde(default)]
    failed_reason: Option<String>,
    #[serde(default)]
    choices: Vec<MusicChoice>,
}

#[derive(Debug, Deserialize)]
struct MusicChoice {
    #[serde(default)]
    url: Option<String>,
}

fn map_status(task: &MusicTask) -> JobStatus {
    match task.status.as_str() {
        "preparing" | "queued" => JobStatus::Pending,
        "running" | "streaming" => JobStatus::Running,
        "succeeded" => JobStatus::Completed,
        "failed" | "timeouted" | "cancelled" => JobStatus::Failed(
            task.failed_reason
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| task.status.clone()),
        ),
        other => JobStatus::Failed(format!("unknown status '{}'", other)),
    }
}

/// Mureka instrumental music generation
pub struct MurekaJobs {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl MurekaJobs {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn query(&self, id: &str) -> Result<(MusicTask, serde_json::Value)> {
        let response = self
            .client
            .get(format!("{}/v1/instrumental/query/{}", self.base_url, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let raw: serde_json::Value = response.json().await?;
        Ok((serde_json::from_value(raw.clone())?, raw))
    }
}

#[async_trait]
impl GenerationJobs for MurekaJobs {
    fn kind(&self) -> &'static str {
        "music"
    }

    async fn create(&self, prompt: &str) -> Result<JobInfo> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
        };
        let response = self
            .client
            .post(format!("{}/v1/instrumental/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let raw: serde_json::Value = response.json().await?;
        let task: MusicTask = serde_json::from_value(raw.clone())?;

        info!("Created music job {} ({})", task.id, task.status);
        Ok(JobInfo {
            status: map_status(&task),
            id: task.id,
            raw,
        })
    }

    async fn status(&self, id: &str) -> Result<JobInfo> {
        let (task, raw) = self.query(id).await?;
        Ok(JobInfo {
            status: map_status(&task),
            id: task.id,
            raw,
        })
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<u64> {
        let (task, _) = self.query(id).await?;
        if map_status(&task) != JobStatus::Completed {
            return Err(KataribeError::service(
                SERVICE,
                format!("music job {} is not finished (status: {})", id, task.status),
            ));
        }

        let url = task
            .choices
            .iter()
            .find_map(|choice| choice.url.as_deref())
            .ok_or_else(|| KataribeError::service(SERVICE, format!("music job {} has no audio url", id)))?;

        let response = self.client.get(url).send().await?;
        let written = download_to_file(SERVICE, response, dest).await?;
        info!("Downloaded music {} to {}", id, dest.display());
        Ok(written)
    }
}
