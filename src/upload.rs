use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::config::{OAuthCredentials, Privacy, UploadConfig};
use crate::error::{KataribeError, Result};
use crate::http::{DEFAULT_TIMEOUT, build_client, ensure_success};

const SERVICE: &str = "YouTube";

#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
}

impl VideoMetadata {
    /// Metadata with the upload section's category and privacy defaults
    pub fn new(title: Option<String>, description: Option<String>, config: &UploadConfig) -> Self {
        Self {
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled Video".to_string()),
            description: description.unwrap_or_default(),
            tags: Vec::new(),
            category_id: config.category_id.clone(),
            privacy: config.privacy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedVideo {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    privacy_status: &'static str,
}

#[derive(Debug, Serialize)]
struct InsertRequest<'a> {
    snippet: Snippet<'a>,
    status: Status,
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
}

/// Resumable YouTube Data API upload authorized by a refresh token
pub struct YouTubeUploader {
    client: Client,
    config: UploadConfig,
    credentials: OAuthCredentials,
}

impl YouTubeUploader {
    pub fn new(config: UploadConfig, credentials: OAuthCredentials) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            config,
            credentials,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.client.post(&self.config.token_url).form(&params).send().await?;
        let response = ensure_success(SERVICE, response).await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    pub async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<UploadedVideo> {
        if !video.exists() {
            return Err(KataribeError::FileNotFound(video.display().to_string()));
        }

        let bytes = tokio::fs::read(video).await?;
        info!(
            "Uploading {} ({:.2} MB)...",
            video.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            bytes.len() as f64 / 1024.0 / 1024.0
        );

        let token = self.access_token().await?;
        debug!("Obtained access token");

        let body = InsertRequest {
            snippet: Snippet {
                title: &metadata.title,
                description: &metadata.description,
                tags: &metadata.tags,
                category_id: &metadata.category_id,
            },
            status: Status {
                privacy_status: metadata.privacy.as_str(),
            },
        };

        let session = self
            .client
            .post(&self.config.upload_url)
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", "video/*")
            .header("X-Upload-Content-Length", bytes.len().to_string())
            .json(&body)
            .send()
            .await?;
        let session = ensure_success(SERVICE, session).await?;
        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| KataribeError::service(SERVICE, "resumable session had no Location header"))?
            .to_string();

        let response = self
            .client
            .put(&location)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, "video/*")
            .header(CONTENT_LENGTH, bytes.len())
            .body(bytes)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let inserted: InsertResponse = response.json().await?;

        let uploaded = UploadedVideo {
            url: format!("https://www.youtube.com/watch?v={}", inserted.id),
            id: inserted.id,
        };
        info!("Upload complete! Video ID: {}", uploaded.id);
        Ok(uploaded)
    }
}
