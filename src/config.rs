use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{KataribeError, Result};

const DEFAULT_REPORT_SYSTEM_PROMPT: &str = "あなたは経済ニュースを分かりやすく解説するアナリストです。\
最新の情報を調べ、事実と出典に基づいたレポートをマークダウンで作成してください。";

const DEFAULT_SCRIPT_PROMPT: &str = "以下は、AIが作ったレポート。これを、読み上げる台本にしたい。\n\
マークダウン用の記号とか、括弧や、リファレンスURL、「以上、台本でした」と言った文言など、台本としてふさわしくない要素を取り除いて、プレーンテキストとして出力してください。\n\
そのまま出力をプログラムで音声化APIに使いたいので、セクションごとのタイトルとかも要りません。台本のみ出力してください。";

const DEFAULT_BLOG_PROMPT: &str = "以下の資料をもとに、読みやすいブログ記事をマークダウンで書いてください。\
見出しを付け、事実関係は資料の内容から逸脱しないでください。記事本文のみを出力してください。";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub workspace: WorkspaceConfig,
    pub generation: GenerationConfig,
    pub speech: SpeechConfig,
    pub subtitle: SubtitleConfig,
    pub correction: CorrectionConfig,
    pub media: MediaConfig,
    pub jobs: JobsConfig,
    pub upload: UploadConfig,
    pub topics: TopicsConfig,
    pub polling: PollingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding every intermediate and final artifact
    pub dir: PathBuf,
    /// Still image used as the video background
    pub background_image: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            background_image: PathBuf::from("background.jpg"),
        }
    }
}

/// Text generation provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl FromStr for Provider {
    type Err = KataribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(KataribeError::Config(format!(
                "Invalid provider '{}'. Valid providers: openai, anthropic, gemini, ollama",
                s
            ))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider used for report generation
    pub report_provider: Provider,
    /// Provider used to turn the report into a narration script
    pub script_provider: Provider,
    /// Provider used for blog drafts
    pub blog_provider: Provider,
    pub openai: OpenAiConfig,
    pub anthropic: AnthropicConfig,
    pub gemini: GeminiConfig,
    pub ollama: OllamaConfig,
    pub report_system_prompt: String,
    pub script_prompt: String,
    pub blog_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            report_provider: Provider::OpenAi,
            script_provider: Provider::Anthropic,
            blog_provider: Provider::Gemini,
            openai: OpenAiConfig::default(),
            anthropic: AnthropicConfig::default(),
            gemini: GeminiConfig::default(),
            ollama: OllamaConfig::default(),
            report_system_prompt: DEFAULT_REPORT_SYSTEM_PROMPT.to_string(),
            script_prompt: DEFAULT_SCRIPT_PROMPT.to_string(),
            blog_prompt: DEFAULT_BLOG_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    /// Attach the hosted web search tool to requests
    pub web_search: bool,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-5".to_string(),
            web_search: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 16000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-pro".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    pub model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    /// Voice used for synthesis
    pub voice_id: String,
    pub tts_model: String,
    pub output_format: String,
    pub stt_model: String,
    /// Upper bound on characters sent per synthesis request
    pub max_chunk_chars: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            voice_id: "3VEofVNyr4k6BtjvBTfN".to_string(),
            tts_model: "eleven_v3".to_string(),
            output_format: "mp3_44100_128".to_string(),
            stt_model: "scribe_v1".to_string(),
            max_chunk_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TokenizerKind {
    /// External MeCab process with an IPADIC-style dictionary
    Mecab,
    /// Built-in writing-system segmentation, no external dependency
    Script,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub tokenizer: TokenizerKind,
    pub mecab_path: String,
    pub mecab_args: Vec<String>,
    /// Characters after which the next clause is preceded by a space
    pub max_line_chars: usize,
    /// Close a cue at a clause boundary once it would run longer than this (seconds)
    pub max_cue_duration: Option<f64>,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerKind::Mecab,
            mecab_path: "mecab".to_string(),
            mecab_args: Vec::new(),
            max_line_chars: 10,
            max_cue_duration: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Run the correction pass as part of the full pipeline
    pub enabled: bool,
    pub provider: Provider,
    pub prompt: String,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: Provider::Anthropic,
            prompt: crate::correction::DEFAULT_CORRECTION_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    /// Output frame rate of rendered chunk videos
    pub frame_rate: u32,
    pub audio_bitrate: String,
    /// ASS style override passed to the subtitles filter (e.g. "FontName=Noto Sans CJK JP,FontSize=20")
    pub subtitle_style: Option<String>,
    /// Additional encoding options for chunk rendering
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub video_options: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
            frame_rate: 30,
            audio_bitrate: "192k".to_string(),
            subtitle_style: None,
            video_options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub video_model: String,
    pub mureka_base_url: String,
    pub music_model: String,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            video_model: "sora-2".to_string(),
            mureka_base_url: "https://api.mureka.ai".to_string(),
            music_model: "mureka-7.5".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Public,
    Private,
    Unlisted,
}

impl FromStr for Privacy {
    type Err = KataribeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            "unlisted" => Ok(Self::Unlisted),
            _ => Err(KataribeError::Input(format!(
                "Invalid privacy status '{}'. Valid values: public, private, unlisted",
                s
            ))),
        }
    }
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Unlisted => "unlisted",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub token_url: String,
    pub upload_url: String,
    /// YouTube category id, 22 is "People & Blogs"
    pub category_id: String,
    pub privacy: Privacy,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            upload_url: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            category_id: "22".to_string(),
            privacy: Privacy::Private,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub newsapi_url: String,
    pub news_query: String,
    pub lunarcrush_api_url: String,
    pub lunarcrush_topic_url: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            newsapi_url: "https://newsapi.org".to_string(),
            news_query: "ai".to_string(),
            lunarcrush_api_url: "https://lunarcrush.com/api4".to_string(),
            lunarcrush_topic_url: "https://lunarcrush.ai/topic".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_secs: u64,
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            max_attempts: 360,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of chunk operations in flight per stage
    pub max_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KataribeError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| KataribeError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| KataribeError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.speech.max_chunk_chars == 0 {
            return Err(KataribeError::Config("speech.max_chunk_chars must be positive".to_string()));
        }
        if self.subtitle.max_line_chars == 0 {
            return Err(KataribeError::Config("subtitle.max_line_chars must be positive".to_string()));
        }
        if let Some(limit) = self.subtitle.max_cue_duration {
            if !(limit > 0.0) {
                return Err(KataribeError::Config(
                    "subtitle.max_cue_duration must be a positive number of seconds".to_string(),
                ));
            }
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(KataribeError::Config("pipeline.max_concurrency must be positive".to_string()));
        }
        if self.polling.max_attempts == 0 {
            return Err(KataribeError::Config("polling.max_attempts must be positive".to_string()));
        }
        Ok(())
    }
}

/// External services that need a secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    OpenAi,
    Anthropic,
    Gemini,
    ElevenLabs,
    Mureka,
    NewsApi,
    LunarCrush,
}

impl Service {
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::ElevenLabs => "ELEVENLABS_API_KEY",
            Self::Mureka => "MUREKA_API_KEY",
            Self::NewsApi => "NEWSAPI_API_KEY",
            Self::LunarCrush => "LUNARCRUSH_API_KEY",
        }
    }
}

/// OAuth client credentials for the upload service
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// Secrets read from the environment; never serialized to the config file
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    keys: Vec<(&'static str, String)>,
}

impl Credentials {
    /// Read credentials from the process environment (after `.env` has been loaded)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        const NAMES: [&str; 10] = [
            "OPENAI_API_KEY",
            "ANTHROPIC_API_KEY",
            "GEMINI_API_KEY",
            "ELEVENLABS_API_KEY",
            "MUREKA_API_KEY",
            "NEWSAPI_API_KEY",
            "LUNARCRUSH_API_KEY",
            "YOUTUBE_CLIENT_ID",
            "YOUTUBE_CLIENT_SECRET",
            "YOUTUBE_REFRESH_TOKEN",
        ];

        let keys = NAMES
            .iter()
            .filter_map(|name| {
                lookup(name)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| (*name, value))
            })
            .collect();

        Self { keys }
    }

    fn get(&self, name: &'static str) -> Result<&str> {
        self.keys
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
            .ok_or(KataribeError::MissingCredential(name))
    }

    /// API key for a service, or a configuration error naming the missing variable
    pub fn require(&self, service: Service) -> Result<&str> {
        self.get(service.env_var())
    }

    pub fn require_youtube(&self) -> Result<OAuthCredentials> {
        Ok(OAuthCredentials {
            client_id: self.get("YOUTUBE_CLIENT_ID")?.to_string(),
            client_secret: self.get("YOUTUBE_CLIENT_SECRET")?.to_string(),
            refresh_token: self.get("YOUTUBE_REFRESH_TOKEN")?.to_string(),
        })
    }
}
