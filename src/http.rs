use futures_util::StreamExt;
use reqwest::{Client, Response};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{KataribeError, Result};

/// Generation requests can take minutes; uploads and downloads even longer
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

pub fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Turn a non-2xx response into a service error carrying the response body
pub async fn ensure_success(service: &'static str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(KataribeError::service(service, format!("API error {}: {}", status, error_text)))
}

/// Stream a response body into `path`, returning the number of bytes written
pub async fn download_to_file(service: &'static str, response: Response, path: &Path) -> Result<u64> {
    let response = ensure_success(service, response).await?;
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!("Wrote {} bytes from {} to {}", written, service, path.display());
    Ok(written)
}
