use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a report for a topic prompt (report.md)
    Report {
        /// Topic prompt
        prompt: Option<String>,

        /// Text generation provider (openai, anthropic, gemini, ollama)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Convert report.md into a narration script (speech.txt)
    Script {
        /// Text generation provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Draft a blog post from source documents
    Blog {
        /// Source documents (default: report.md)
        inputs: Vec<PathBuf>,

        /// Output file (default: blog.md in the workspace)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Text generation provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Synthesize speech.txt into chunk audio files
    Tts,

    /// Transcribe chunk audio and build subtitles
    Stt,

    /// Rebuild subtitles from saved words without transcribing again
    Resegment,

    /// Correct chunk subtitles against the narration script
    Correct {
        /// Text generation provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Render one video per chunk with burned-in subtitles
    Render,

    /// Concatenate chunk audio into output-final.mp3
    CombineAudio,

    /// Concatenate chunk videos into output-final.mp4
    CombineVideo,

    /// Merge chunk subtitles into output-final.srt
    CombineSubtitles,

    /// Render chunk videos and combine them
    Video,

    /// Run every stage from a topic prompt to the final video
    Pipeline {
        /// Topic prompt
        prompt: Option<String>,

        /// Skip the subtitle correction pass
        #[arg(long)]
        no_correct: bool,
    },

    /// Start a video generation job
    VideoGen {
        prompt: String,

        /// Wait for the job and download the result
        #[arg(long)]
        wait: bool,
    },

    /// Show the status of a video generation job
    VideoCheck { id: String },

    /// Download a finished video job (video.mp4)
    VideoDownload {
        id: String,

        /// Wait for the job to finish first
        #[arg(long)]
        wait: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start an instrumental music generation job
    MusicGen {
        prompt: String,

        /// Wait for the job and download the result
        #[arg(long)]
        wait: bool,
    },

    /// Show the status of a music generation job
    MusicCheck { id: String },

    /// Download a finished music job (music.mp3)
    MusicDownload {
        id: String,

        /// Wait for the job to finish first
        #[arg(long)]
        wait: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a video to YouTube
    Upload {
        /// Video file (default: output-final.mp4)
        video: Option<PathBuf>,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,

        /// Privacy status (public, private, unlisted)
        #[arg(short, long)]
        privacy: Option<String>,

        #[arg(long)]
        category: Option<String>,
    },

    /// Fetch AI headlines from NewsAPI (ai-topics.json)
    AiTopics,

    /// Fetch coins by social volume from LunarCrush (coin-topics.json)
    CoinTopics,

    /// Fetch one coin's topic summary (report-coin.md)
    CoinTopic { topic: String },

    /// List ElevenLabs models
    Models,

    /// List ElevenLabs voices
    Voices,

    /// Write the default configuration to a file
    ConfigInit {
        /// Output path
        #[arg(default_value = "kataribe.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
