use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use super::{SpeechSynthesizer, SpeechTranscriber};
use crate::alignment::WordToken;
use crate::config::SpeechConfig;
use crate::error::{KataribeError, Result};
use crate::http::{DEFAULT_TIMEOUT, build_client, download_to_file, ensure_success};
use crate::poll::{PollPolicy, PollState};

const SERVICE: &str = "ElevenLabs";

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    words: Vec<ApiWord>,
    #[serde(default)]
    transcription_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiWord {
    text: String,
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    end: Option<f64>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl TranscriptResponse {
    fn is_complete(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Spoken words and spacing; audio events like "(laughs)" are dropped
    fn into_words(self) -> Vec<WordToken> {
        self.words
            .into_iter()
            .filter(|w| w.kind.as_deref() != Some("audio_event"))
            .map(|w| WordToken {
                text: w.text,
                start: w.start,
                end: w.end,
            })
            .collect()
    }
}

/// ElevenLabs text-to-speech and speech-to-text client
pub struct ElevenLabsClient {
    client: Client,
    config: SpeechConfig,
    api_key: String,
    polling: PollPolicy,
}

impl ElevenLabsClient {
    pub fn new(config: SpeechConfig, api_key: &str, polling: PollPolicy) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            config,
            api_key: api_key.to_string(),
            polling,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.url(path))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        Ok(response.json().await?)
    }

    /// Available synthesis and transcription models
    pub async fn list_models(&self) -> Result<serde_json::Value> {
        self.get_json("/v1/models").await
    }

    /// Voices available to the account
    pub async fn list_voices(&self) -> Result<serde_json::Value> {
        self.get_json("/v1/voices").await
    }

    async fn fetch_transcript(&self, transcription_id: &str) -> Result<TranscriptResponse> {
        let response = self
            .client
            .get(self.url(&format!("/v1/speech-to-text/transcripts/{}", transcription_id)))
            .header("xi-api-key", &self.api_key)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, dest: &Path) -> Result<u64> {
        if text.trim().is_empty() {
            return Err(KataribeError::Input("cannot synthesize empty text".to_string()));
        }

        debug!("Synthesizing {} characters with voice {}", text.chars().count(), self.config.voice_id);
        let body = SynthesisRequest {
            text,
            model_id: &self.config.tts_model,
        };

        let response = self
            .client
            .post(self.url(&format!("/v1/text-to-speech/{}", self.config.voice_id)))
            .query(&[("output_format", self.config.output_format.as_str())])
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let written = download_to_file(SERVICE, response, dest).await?;
        info!("Saved synthesized audio to {}", dest.display());
        Ok(written)
    }
}

#[async_trait]
impl SpeechTranscriber for ElevenLabsClient {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<WordToken>> {
        if !audio.exists() {
            return Err(KataribeError::FileNotFound(audio.display().to_string()));
        }

        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let form = Form::new()
            .text("model_id", self.config.stt_model.clone())
            .part("file", Part::bytes(bytes).file_name(file_name).mime_str("audio/mpeg")?);

        info!("Transcribing {}", audio.display());
        let response = self
            .client
            .post(self.url("/v1/speech-to-text"))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let submitted: TranscriptResponse = response.json().await?;

        if submitted.is_complete() {
            return Ok(submitted.into_words());
        }

        let transcription_id = submitted
            .transcription_id
            .ok_or_else(|| KataribeError::service(SERVICE, "reply had neither text nor a transcription id"))?;
        info!("Transcription job started with ID: {}", transcription_id);

        let what = format!("transcript {}", transcription_id);
        let transcript = self
            .polling
            .poll_until(&what, || async {
                let transcript = self.fetch_transcript(&transcription_id).await?;
                let state = if transcript.is_complete() {
                    PollState::Ready(transcript)
                } else {
                    PollState::Pending
                };
                Ok::<_, KataribeError>(state)
            })
            .await?;

        info!("Transcription {} completed", transcription_id);
        Ok(transcript.into_words())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> ElevenLabsClient {
        let config = SpeechConfig {
            base_url,
            ..SpeechConfig::default()
        };
        let polling = PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 5,
        };
        ElevenLabsClient::new(config, "xi-test", polling).unwrap()
    }

    fn audio_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let audio = dir.path().join("output-0.mp3");
        std::fs::write(&audio, b"ID3").unwrap();
        audio
    }

    #[tokio::test]
    async fn synthesis_streams_audio_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/text-to-speech/3VEofVNyr4k6BtjvBTfN"))
            .and(query_param("output_format", "mp3_44100_128"))
            .and(header("xi-api-key", "xi-test"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("output-0.mp3");
        let written = client(server.uri()).synthesize("こんにちは。", &dest).await.unwrap();

        assert_eq!(written, 9);
        assert_eq!(std::fs::read(&dest).unwrap(), b"mp3-bytes");
    }

    #[tokio::test]
    async fn synchronous_transcript_is_used_directly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech-to-text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "今日は",
                "words": [
                    {"text": "今日", "start": 0.0, "end": 0.4, "type": "word"},
                    {"text": "(笑)", "start": 0.4, "end": 0.5, "type": "audio_event"},
                    {"text": "は", "start": 0.5, "end": 0.6, "type": "word"}
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let words = client(server.uri()).transcribe(&audio_file(&dir)).await.unwrap();
        assert_eq!(words, vec![WordToken::new("今日", 0.0, 0.4), WordToken::new("は", 0.5, 0.6)]);
    }

    #[tokio::test]
    async fn pending_transcript_is_polled_until_text_arrives() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech-to-text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transcription_id": "tr-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/speech-to-text/transcripts/tr-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": ""})))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/speech-to-text/transcripts/tr-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "はい。",
                "words": [{"text": "はい", "start": 1.0, "end": 1.3}, {"text": "。"}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let words = client(server.uri()).transcribe(&audio_file(&dir)).await.unwrap();
        assert_eq!(words, vec![WordToken::new("はい", 1.0, 1.3), WordToken::untimed("。")]);
    }

    #[tokio::test]
    async fn never_finishing_transcript_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech-to-text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "transcription_id": "tr-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/speech-to-text/transcripts/tr-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = client(server.uri()).transcribe(&audio_file(&dir)).await;
        assert!(matches!(result, Err(KataribeError::Timeout { attempts: 5, .. })));
    }
}
