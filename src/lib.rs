//! Kataribe - narrated video production pipeline
//!
//! Turns a topic prompt into a narrated video: report and script generation,
//! chunked speech synthesis, word-timed transcription, clause-aware subtitle
//! cues, an optional correction pass and per-chunk rendering with ffmpeg.

pub mod alignment;
pub mod batch;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod correction;
pub mod error;
pub mod generate;
pub mod http;
pub mod jobs;
pub mod media;
pub mod poll;
pub mod quality;
pub mod segment;
pub mod speech;
pub mod subtitle;
pub mod timeline;
pub mod topics;
pub mod upload;
pub mod workflow;
pub mod workspace;
