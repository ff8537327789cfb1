use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::Form;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use super::{GenerationJobs, JobInfo, JobStatus};
use crate::error::Result;
use crate::http::{DEFAULT_TIMEOUT, build_client, download_to_file, ensure_success};

const SERVICE: &str = "OpenAI";

#[derive(Debug, Deserialize)]
struct VideoJob {
    id: String,
    status: String,
    #[serde(default)]
    error: Option<VideoError>,
}

#[derive(Debug, Deserialize)]
struct VideoError {
    #[serde(default)]
    message: String,
}

fn map_status(job: &VideoJob) -> JobStatus {
    match job.status.as_str() {
        "queued" => JobStatus::Pending,
        "in_progress" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed(
            job.error
                .as_ref()
                .map(|e| e.message.clone())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "video generation failed".to_string()),
        ),
        other => JobStatus::Failed(format!("unknown status '{}'", other)),
    }
}

/// Sora video generation via the OpenAI videos API
pub struct SoraJobs {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl SoraJobs {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn parse(response: reqwest::Response) -> Result<JobInfo> {
        let response = ensure_success(SERVICE, response).await?;
        let raw: serde_json::Value = response.json().await?;
        let job: VideoJob = serde_json::from_value(raw.clone())?;
        Ok(JobInfo {
            status: map_status(&job),
            id: job.id,
            raw,
        })
    }
}

#[async_trait]
impl GenerationJobs for SoraJobs {
    fn kind(&self) -> &'static str {
        "video"
    }

    async fn create(&self, prompt: &str) -> Result<JobInfo> {
        let form = Form::new()
            .text("model", self.model.clone())
            .text("prompt", prompt.to_string());

        let response = self
            .client
            .post(format!("{}/v1/videos", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let info = Self::parse(response).await?;
        info!("Created video job {} ({})", info.id, info.status);
        Ok(info)
    }

    async fn status(&self, id: &str) -> Result<JobInfo> {
        let response = self
            .client
            .get(format!("{}/v1/videos/{}", self.base_url, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn download(&self, id: &str, dest: &Path) -> Result<u64> {
        let response = self
            .client
            .get(format!("{}/v1/videos/{}/content", self.base_url, id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let written = download_to_file(SERVICE, response, dest).await?;
        info!("Downloaded video {} to {}", id, dest.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn maps_video_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/videos"))
            .and(header("authorization", "Bearer sk"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "video_1", "object": "video", "status": "queued", "progress": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/video_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "video_1", "status": "failed", "error": {"code": "x", "message": "blocked"}
            })))
            .mount(&server)
            .await;

        let jobs = SoraJobs::new(&server.uri(), "sora-2", "sk").unwrap();
        let created = jobs.create("夕焼けの海").await.unwrap();
        assert_eq!(created.id, "video_1");
        assert_eq!(created.status, JobStatus::Pending);

        let checked = jobs.status("video_1").await.unwrap();
        assert_eq!(checked.status, JobStatus::Failed("blocked".to_string()));
    }

    #[tokio::test]
    async fn downloads_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/videos/video_1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("video.mp4");
        let jobs = SoraJobs::new(&server.uri(), "sora-2", "sk").unwrap();
        assert_eq!(jobs.download("video_1", &dest).await.unwrap(), 3);
    }
}
