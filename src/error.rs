use thiserror::Error;

#[derive(Error, Debug)]
pub enum KataribeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{service} error: {message}")]
    Service { service: &'static str, message: String },

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Subtitle error: {0}")]
    Subtitle(String),

    #[error("Subtitle correction error: {0}")]
    Correction(String),

    #[error("Cue track validation error: {0}")]
    Quality(String),

    #[error("Timed out waiting for {what} after {attempts} attempts")]
    Timeout { what: String, attempts: u32 },

    #[error("Job {id} failed: {reason}")]
    JobFailed { id: String, reason: String },

    #[error("Stage '{stage}' incomplete: {failed} chunk(s) failed")]
    IncompleteStage { stage: String, failed: usize },
}

impl KataribeError {
    pub(crate) fn service(service: &'static str, message: impl Into<String>) -> Self {
        Self::Service { service, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, KataribeError>;
