use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::alignment::WordToken;
use crate::batch::{BatchReport, describe_failures, run_batch};
use crate::chunker::split_into_chunks;
use crate::config::{Config, Credentials, Provider, Service};
use crate::correction::SubtitleCorrector;
use crate::error::{KataribeError, Result};
use crate::generate::{GenerationRequest, GeneratorFactory, TextGenerator, strip_code_fences};
use crate::jobs::{JobInfo, JobKind, JobsFactory, wait_for_job};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::poll::PollPolicy;
use crate::quality::QualityValidator;
use crate::segment::CueSegmenter;
use crate::speech::{ElevenLabsClient, SpeechSynthesizer, SpeechTranscriber, read_words, write_words};
use crate::subtitle::{read_srt, write_srt};
use crate::timeline::{concat_audio, offset_cues};
use crate::topics::TopicSources;
use crate::upload::{UploadedVideo, VideoMetadata, YouTubeUploader};
use crate::workspace::{ArtifactKind, Workspace};

/// Every pipeline stage, reading and writing the workspace directory
pub struct Workflow {
    config: Config,
    credentials: Credentials,
    workspace: Workspace,
    segmenter: CueSegmenter,
    validator: QualityValidator,
    media: Box<dyn MediaProcessorTrait>,
}

impl Workflow {
    pub fn new(config: Config, credentials: Credentials) -> Self {
        let workspace = Workspace::new(config.workspace.dir.clone());
        let segmenter = CueSegmenter::from_config(&config.subtitle);
        let media = MediaProcessorFactory::create_processor(config.media.clone());

        info!(
            "Workspace: {} (tokenizer: {})",
            workspace.dir().display(),
            segmenter.tokenizer_name()
        );

        Self {
            config,
            credentials,
            workspace,
            segmenter,
            validator: QualityValidator::default(),
            media,
        }
    }

    /// Replace the ffmpeg-backed processor
    pub fn with_media(mut self, media: Box<dyn MediaProcessorTrait>) -> Self {
        self.media = media;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    async fn generator(&self, provider: Provider) -> Result<Arc<dyn TextGenerator>> {
        let generator = GeneratorFactory::create(provider, &self.config.generation, &self.credentials)?;
        generator.check_availability().await?;
        Ok(generator)
    }

    fn elevenlabs(&self) -> Result<ElevenLabsClient> {
        ElevenLabsClient::new(
            self.config.speech.clone(),
            self.credentials.require(Service::ElevenLabs)?,
            self.poll_policy(),
        )
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::from(&self.config.polling)
    }

    fn concurrency(&self) -> usize {
        self.config.pipeline.max_concurrency
    }

    /// Generate a report for `prompt` and save it as `report.md`
    pub async fn report(&self, prompt: &str) -> Result<PathBuf> {
        if prompt.trim().is_empty() {
            return Err(KataribeError::Input("report prompt is empty".to_string()));
        }
        self.workspace.ensure().await?;

        let generator = self.generator(self.config.generation.report_provider).await?;
        info!("Generating report with {}", generator.name());
        let request = GenerationRequest::new(prompt).with_system(self.config.generation.report_system_prompt.clone());
        let report = generator.generate(&request).await?;

        let output = self.workspace.report_path();
        tokio::fs::write(&output, report.trim()).await?;
        info!("Report saved to {}", output.display());
        Ok(output)
    }

    /// Turn `report.md` into plain narration text in `speech.txt`
    pub async fn script(&self) -> Result<PathBuf> {
        let generator = self.generator(self.config.generation.script_provider).await?;
        self.script_with(generator.as_ref()).await
    }

    pub(crate) async fn script_with(&self, generator: &dyn TextGenerator) -> Result<PathBuf> {
        let report = read_required(&self.workspace.report_path()).await?;
        let prompt = format!("{}\n\n```\n{}\n```", self.config.generation.script_prompt, report.trim());

        info!("Writing narration script with {}", generator.name());
        let script = strip_code_fences(&generator.generate(&GenerationRequest::new(prompt)).await?);
        if script.is_empty() {
            return Err(KataribeError::service(generator.name(), "narration script came back empty"));
        }

        let output = self.workspace.speech_path();
        tokio::fs::write(&output, &script).await?;
        info!("Narration script ({} characters) saved to {}", script.chars().count(), output.display());
        Ok(output)
    }

    /// Draft a blog post from one or more source documents
    pub async fn blog(&self, inputs: &[PathBuf], output: Option<PathBuf>) -> Result<PathBuf> {
        let inputs = if inputs.is_empty() {
            vec![self.workspace.report_path()]
        } else {
            inputs.to_vec()
        };

        let mut sources = Vec::with_capacity(inputs.len());
        for input in &inputs {
            sources.push(read_required(input).await?);
        }

        let generator = self.generator(self.config.generation.blog_provider).await?;
        info!("Drafting blog post from {} document(s) with {}", inputs.len(), generator.name());
        let prompt = format!(
            "{}\n\n{}",
            self.config.generation.blog_prompt,
            sources
                .iter()
                .map(|s| format!("```\n{}\n```", s.trim()))
                .collect::<Vec<_>>()
                .join("\n\n")
        );
        let post = strip_code_fences(&generator.generate(&GenerationRequest::new(prompt)).await?);

        self.workspace.ensure().await?;
        let output = output.unwrap_or_else(|| self.workspace.blog_path());
        tokio::fs::write(&output, post).await?;
        info!("Blog post saved to {}", output.display());
        Ok(output)
    }

    async fn chunk_texts(&self) -> Result<Vec<String>> {
        let script = read_required(&self.workspace.speech_path()).await?;
        split_into_chunks(&script, self.config.speech.max_chunk_chars)
    }

    /// Synthesize `speech.txt` chunk by chunk into `output-<n>.mp3`
    pub async fn tts(&self) -> Result<usize> {
        self.synthesize_chunks(&self.elevenlabs()?).await
    }

    pub(crate) async fn synthesize_chunks(&self, synthesizer: &dyn SpeechSynthesizer) -> Result<usize> {
        let chunks = self.chunk_texts().await?;
        if chunks.is_empty() {
            return Err(KataribeError::Input("narration script is empty".to_string()));
        }

        // a shorter script must not leave chunks of the previous run behind
        for kind in [
            ArtifactKind::Audio,
            ArtifactKind::Words,
            ArtifactKind::Subtitle,
            ArtifactKind::CorrectedSubtitle,
            ArtifactKind::Video,
        ] {
            self.workspace.remove_chunks(kind).await?;
        }
        self.workspace.ensure().await?;

        info!("Split narration into {} chunk(s)", chunks.len());
        let workspace = &self.workspace;
        let report = run_batch("tts", chunks.into_iter().enumerate().collect(), self.concurrency(), |ordinal, text: String| async move {
            let dest = workspace.chunk_path(ArtifactKind::Audio, ordinal);
            synthesizer.synthesize(&text, &dest).await
        })
        .await;

        finish_stage(report).map(|done| done.len())
    }

    /// Transcribe every audio chunk, keeping its words and building its cues
    pub async fn stt(&self) -> Result<usize> {
        self.transcribe_chunks(&self.elevenlabs()?).await
    }

    pub(crate) async fn transcribe_chunks(&self, transcriber: &dyn SpeechTranscriber) -> Result<usize> {
        let audio = self.workspace.chunk_artifacts(ArtifactKind::Audio)?;
        if audio.is_empty() {
            return Err(KataribeError::Input(format!(
                "no audio chunks in {}",
                self.workspace.dir().display()
            )));
        }

        let items = audio.into_iter().map(|a| (a.ordinal, a.path)).collect();
        let report = run_batch("stt", items, self.concurrency(), |ordinal, path: PathBuf| async move {
            let words = transcriber.transcribe(&path).await?;
            write_words(&words, self.workspace.chunk_path(ArtifactKind::Words, ordinal)).await?;
            self.write_cues(ordinal, &words).await
        })
        .await;

        finish_stage(report).map(|done| done.len())
    }

    /// Rebuild cues from saved words without transcribing again
    pub async fn resegment(&self) -> Result<usize> {
        let saved = self.workspace.chunk_artifacts(ArtifactKind::Words)?;
        if saved.is_empty() {
            return Err(KataribeError::Input("no saved words to re-segment; run stt first".to_string()));
        }

        let items = saved.into_iter().map(|a| (a.ordinal, a.path)).collect();
        let report = run_batch("resegment", items, self.concurrency(), |ordinal, path: PathBuf| async move {
            let words = read_words(&path).await?;
            self.write_cues(ordinal, &words).await
        })
        .await;

        finish_stage(report).map(|done| done.len())
    }

    async fn write_cues(&self, ordinal: usize, words: &[WordToken]) -> Result<usize> {
        let cues = self.segmenter.segment(words)?;
        let quality = self.validator.validate_track(&cues)?;
        if quality.cue_count == 0 {
            warn!("Chunk {} produced no cues", ordinal);
        }
        write_srt(&cues, self.workspace.chunk_path(ArtifactKind::Subtitle, ordinal)).await?;
        Ok(cues.len())
    }

    /// Correct every chunk's cue text against its narration text
    pub async fn correct(&self) -> Result<usize> {
        let generator = self.generator(self.config.correction.provider).await?;
        self.correct_chunks(generator).await
    }

    pub(crate) async fn correct_chunks(&self, generator: Arc<dyn TextGenerator>) -> Result<usize> {
        let tracks = self.workspace.chunk_artifacts(ArtifactKind::Subtitle)?;
        if tracks.is_empty() {
            return Err(KataribeError::Input("no subtitles to correct; run stt first".to_string()));
        }

        let script = read_required(&self.workspace.speech_path()).await?;
        let texts = split_into_chunks(&script, self.config.speech.max_chunk_chars)?;
        let corrector = SubtitleCorrector::with_instructions(generator, self.config.correction.prompt.clone());

        let items = tracks.into_iter().map(|a| (a.ordinal, a.path)).collect();
        let (corrector, texts, script) = (&corrector, &texts, &script);
        let report = run_batch("correct", items, self.concurrency(), |ordinal, path: PathBuf| async move {
            let reference = texts.get(ordinal).unwrap_or(script);
            let cues = read_srt(&path).await?;
            let corrected = corrector.correct(reference, &cues).await?;
            self.validator.validate_correction(&cues, &corrected)?;
            write_srt(&corrected, self.workspace.chunk_path(ArtifactKind::CorrectedSubtitle, ordinal)).await?;
            Ok(corrected.len())
        })
        .await;

        finish_stage(report).map(|done| done.len())
    }

    /// Render one video per audio chunk with its preferred subtitles burned in
    pub async fn render(&self) -> Result<usize> {
        self.media.check_availability().await?;
        info!("Using {}", self.media.get_version_info().await?);

        let background = self.config.workspace.background_image.as_path();
        if !background.is_file() {
            return Err(KataribeError::FileNotFound(background.display().to_string()));
        }

        let audio = self.workspace.chunk_artifacts(ArtifactKind::Audio)?;
        if audio.is_empty() {
            return Err(KataribeError::Input("no audio chunks to render".to_string()));
        }

        let items = audio.into_iter().map(|a| (a.ordinal, a.path)).collect();
        let report = run_batch("render", items, self.concurrency(), |ordinal, path: PathBuf| async move {
            let subtitles = self.workspace.preferred_subtitle(ordinal).ok_or_else(|| {
                KataribeError::FileNotFound(format!("subtitles for chunk {} not found", ordinal))
            })?;
            let output = self.workspace.chunk_path(ArtifactKind::Video, ordinal);
            self.media.render_chunk_video(background, &path, &subtitles, &output).await?;
            Ok(output)
        })
        .await;

        finish_stage(report).map(|done| done.len())
    }

    /// Byte-concatenate audio chunks into `output-final.mp3`
    pub async fn combine_audio(&self) -> Result<PathBuf> {
        let inputs: Vec<PathBuf> = self
            .workspace
            .chunk_artifacts(ArtifactKind::Audio)?
            .into_iter()
            .map(|a| a.path)
            .collect();
        let output = self.workspace.final_audio_path();
        concat_audio(&inputs, &output).await?;
        Ok(output)
    }

    /// Concatenate chunk videos into `output-final.mp4`
    pub async fn combine_video(&self) -> Result<PathBuf> {
        let inputs: Vec<PathBuf> = self
            .workspace
            .chunk_artifacts(ArtifactKind::Video)?
            .into_iter()
            .map(|a| a.path)
            .collect();
        info!("Combining {} chunk videos", inputs.len());
        let output = self.workspace.final_video_path();
        self.media.concat_videos(&inputs, &output).await?;
        info!("Final video saved to {}", output.display());
        Ok(output)
    }

    /// Merge chunk subtitles into `output-final.srt`, offset by probed chunk durations
    pub async fn combine_subtitles(&self) -> Result<PathBuf> {
        let audio = self.workspace.chunk_artifacts(ArtifactKind::Audio)?;
        if audio.is_empty() {
            return Err(KataribeError::Input("no audio chunks to align subtitles with".to_string()));
        }

        let mut tracks = Vec::with_capacity(audio.len());
        for chunk in &audio {
            let duration = self.media.probe_duration(&chunk.path).await?;
            let cues = match self.workspace.preferred_subtitle(chunk.ordinal) {
                Some(path) => read_srt(&path).await?,
                None => {
                    warn!("No subtitles for chunk {}, leaving a gap of {:.3}s", chunk.ordinal, duration);
                    Vec::new()
                }
            };
            tracks.push((cues, duration));
        }

        let merged = offset_cues(&tracks);
        self.validator.validate_track(&merged)?;
        let output = self.workspace.final_subtitle_path();
        write_srt(&merged, &output).await?;
        Ok(output)
    }

    /// Render chunk videos, then combine them
    pub async fn video(&self) -> Result<PathBuf> {
        self.render().await?;
        self.combine_video().await
    }

    /// Everything from a topic prompt to the final video, audio and subtitles
    pub async fn pipeline(&self, prompt: &str) -> Result<PathBuf> {
        info!("┌─ Pipeline started");
        self.report(prompt).await?;
        self.script().await?;
        self.tts().await?;
        self.stt().await?;
        if self.config.correction.enabled {
            self.correct().await?;
        } else {
            info!("Subtitle correction disabled, using raw cues");
        }
        let video = self.video().await?;
        self.combine_audio().await?;
        self.combine_subtitles().await?;
        info!("└─ Pipeline finished: {}", video.display());
        Ok(video)
    }

    fn job_output(&self, kind: JobKind) -> PathBuf {
        match kind {
            JobKind::Video => self.workspace.generated_video_path(),
            JobKind::Music => self.workspace.music_path(),
        }
    }

    /// Start a generation job; with `wait`, poll it to completion and download the result
    pub async fn create_job(&self, kind: JobKind, prompt: &str, wait: bool) -> Result<JobInfo> {
        let jobs = JobsFactory::create(kind, &self.config, &self.credentials)?;
        let created = jobs.create(prompt).await?;
        if !wait {
            return Ok(created);
        }

        let finished = wait_for_job(jobs.as_ref(), &created.id, &self.poll_policy()).await?;
        self.workspace.ensure().await?;
        jobs.download(&finished.id, &self.job_output(kind)).await?;
        Ok(finished)
    }

    pub async fn check_job(&self, kind: JobKind, id: &str) -> Result<JobInfo> {
        let jobs = JobsFactory::create(kind, &self.config, &self.credentials)?;
        jobs.status(id).await
    }

    pub async fn download_job(&self, kind: JobKind, id: &str, wait: bool, output: Option<PathBuf>) -> Result<PathBuf> {
        let jobs = JobsFactory::create(kind, &self.config, &self.credentials)?;
        if wait {
            wait_for_job(jobs.as_ref(), id, &self.poll_policy()).await?;
        }

        self.workspace.ensure().await?;
        let output = output.unwrap_or_else(|| self.job_output(kind));
        jobs.download(id, &output).await?;
        Ok(output)
    }

    pub async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<UploadedVideo> {
        let uploader = YouTubeUploader::new(self.config.upload.clone(), self.credentials.require_youtube()?)?;
        uploader.upload(video, metadata).await
    }

    fn topics(&self) -> Result<TopicSources> {
        TopicSources::new(self.config.topics.clone())
    }

    /// Save NewsAPI AI headlines to `ai-topics.json`
    pub async fn ai_topics(&self) -> Result<PathBuf> {
        let news = self.topics()?.ai_news(self.credentials.require(Service::NewsApi)?).await?;
        self.save_json("ai-topics.json", &news).await
    }

    /// Save coin names by social volume to `coin-topics.json`
    pub async fn coin_topics(&self) -> Result<PathBuf> {
        let names = self
            .topics()?
            .coin_names(self.credentials.require(Service::LunarCrush)?)
            .await?;
        self.save_json("coin-topics.json", &names).await
    }

    /// Save one coin's topic page to `report-coin.md`
    pub async fn coin_topic(&self, topic: &str) -> Result<PathBuf> {
        if topic.trim().is_empty() {
            return Err(KataribeError::Input("coin topic must be specified".to_string()));
        }
        let text = self
            .topics()?
            .coin_topic(self.credentials.require(Service::LunarCrush)?, topic)
            .await?;

        self.workspace.ensure().await?;
        let output = self.workspace.file("report-coin.md");
        tokio::fs::write(&output, text).await?;
        info!("Topic '{}' saved to {}", topic, output.display());
        Ok(output)
    }

    async fn save_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        self.workspace.ensure().await?;
        let output = self.workspace.file(name);
        tokio::fs::write(&output, serde_json::to_string_pretty(value)?).await?;
        info!("Saved {}", output.display());
        Ok(output)
    }

    pub async fn models(&self) -> Result<serde_json::Value> {
        self.elevenlabs()?.list_models().await
    }

    pub async fn voices(&self) -> Result<serde_json::Value> {
        self.elevenlabs()?.list_voices().await
    }
}

async fn read_required(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(KataribeError::FileNotFound(path.display().to_string()));
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Log every failed chunk, then turn failures into `IncompleteStage`
fn finish_stage<T>(report: BatchReport<T>) -> Result<Vec<(usize, T)>> {
    for line in describe_failures(&report) {
        warn!("{}", line);
    }
    report.into_complete()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerKind;
    use crate::generate::MockTextGenerator;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeSynthesizer {
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(&self, text: &str, dest: &Path) -> Result<u64> {
            if self.fail_on.is_some_and(|needle| text.contains(needle)) {
                return Err(KataribeError::service("ElevenLabs", "quota exceeded"));
            }
            tokio::fs::write(dest, text.as_bytes()).await?;
            Ok(text.len() as u64)
        }
    }

    /// Turns the synthesized "audio" (the chunk text) back into one word per character
    struct FakeTranscriber;

    #[async_trait]
    impl SpeechTranscriber for FakeTranscriber {
        async fn transcribe(&self, audio: &Path) -> Result<Vec<WordToken>> {
            let text = tokio::fs::read_to_string(audio).await?;
            Ok(text
                .chars()
                .enumerate()
                .map(|(i, ch)| WordToken::new(ch.to_string(), i as f64 * 0.1, (i + 1) as f64 * 0.1))
                .collect())
        }
    }

    #[derive(Default)]
    struct FakeMedia {
        rendered: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl MediaProcessorTrait for FakeMedia {
        async fn render_chunk_video(&self, _background: &Path, _audio: &Path, subtitles: &Path, output: &Path) -> Result<()> {
            tokio::fs::copy(subtitles, output).await?;
            self.rendered.lock().unwrap().push(output.to_path_buf());
            Ok(())
        }

        async fn concat_videos(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
            concat_audio(inputs, output).await.map(|_| ())
        }

        async fn probe_duration(&self, _media: &Path) -> Result<f64> {
            Ok(2.0)
        }

        async fn check_availability(&self) -> Result<()> {
            Ok(())
        }

        async fn get_version_info(&self) -> Result<String> {
            Ok("fake".to_string())
        }
    }

    fn workflow(dir: &Path, max_chunk_chars: usize) -> Workflow {
        let mut config = Config::default();
        config.workspace.dir = dir.join("out");
        config.workspace.background_image = dir.join("background.jpg");
        config.subtitle.tokenizer = TokenizerKind::Script;
        config.speech.max_chunk_chars = max_chunk_chars;
        Workflow::new(config, Credentials::default()).with_media(Box::new(FakeMedia::default()))
    }

    async fn with_script(workflow: &Workflow, script: &str) {
        workflow.workspace().ensure().await.unwrap();
        tokio::fs::write(workflow.workspace().speech_path(), script).await.unwrap();
    }

    #[tokio::test]
    async fn tts_replaces_stale_chunks() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 6);
        with_script(&wf, "こんにちは。さようなら。").await;
        std::fs::write(wf.workspace().chunk_path(ArtifactKind::Audio, 7), b"old").unwrap();
        std::fs::write(wf.workspace().chunk_path(ArtifactKind::Subtitle, 7), b"old").unwrap();

        let written = wf.synthesize_chunks(&FakeSynthesizer { fail_on: None }).await.unwrap();

        assert_eq!(written, 2);
        let ordinals: Vec<usize> = wf
            .workspace()
            .chunk_artifacts(ArtifactKind::Audio)
            .unwrap()
            .iter()
            .map(|a| a.ordinal)
            .collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert!(!wf.workspace().chunk_path(ArtifactKind::Subtitle, 7).exists());
    }

    #[tokio::test]
    async fn failed_chunk_makes_stage_incomplete_after_siblings_finish() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 6);
        with_script(&wf, "こんにちは。さようなら。またね。").await;

        let result = wf.synthesize_chunks(&FakeSynthesizer { fail_on: Some("さようなら") }).await;

        assert!(matches!(result, Err(KataribeError::IncompleteStage { failed: 1, .. })));
        assert!(wf.workspace().chunk_path(ArtifactKind::Audio, 0).exists());
        assert!(wf.workspace().chunk_path(ArtifactKind::Audio, 2).exists());
    }

    #[tokio::test]
    async fn stt_writes_words_and_cues_then_resegment_rebuilds_them() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 100);
        with_script(&wf, "今日は晴れ。明日は雨。").await;
        wf.synthesize_chunks(&FakeSynthesizer { fail_on: None }).await.unwrap();

        assert_eq!(wf.transcribe_chunks(&FakeTranscriber).await.unwrap(), 1);

        let srt_path = wf.workspace().chunk_path(ArtifactKind::Subtitle, 0);
        let cues = read_srt(&srt_path).await.unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "今日は晴れ。");
        assert_eq!(cues[1].text, "明日は雨。");
        assert!(wf.workspace().chunk_path(ArtifactKind::Words, 0).exists());

        std::fs::remove_file(&srt_path).unwrap();
        assert_eq!(wf.resegment().await.unwrap(), 1);
        assert_eq!(read_srt(&srt_path).await.unwrap(), cues);
    }

    #[tokio::test]
    async fn correction_keeps_timestamps_and_writes_corrected_track() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 100);
        with_script(&wf, "今日は晴れ。").await;
        wf.synthesize_chunks(&FakeSynthesizer { fail_on: None }).await.unwrap();
        wf.transcribe_chunks(&FakeTranscriber).await.unwrap();

        let mut generator = MockTextGenerator::new();
        generator.expect_name().return_const("mock");
        generator
            .expect_generate()
            .returning(|_| Ok("1\n00:00:09,000 --> 00:00:10,000\n今日は快晴。\n\n".to_string()));

        wf.correct_chunks(Arc::new(generator)).await.unwrap();

        let plain = read_srt(wf.workspace().chunk_path(ArtifactKind::Subtitle, 0)).await.unwrap();
        let corrected = read_srt(wf.workspace().chunk_path(ArtifactKind::CorrectedSubtitle, 0))
            .await
            .unwrap();
        assert_eq!(corrected[0].text, "今日は快晴。");
        assert_eq!(corrected[0].start, plain[0].start);
        assert_eq!(corrected[0].end, plain[0].end);
    }

    #[tokio::test]
    async fn render_reports_chunks_without_subtitles() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("background.jpg"), b"jpg").unwrap();
        let wf = workflow(temp.path(), 6);
        with_script(&wf, "こんにちは。さようなら。").await;
        wf.synthesize_chunks(&FakeSynthesizer { fail_on: None }).await.unwrap();
        std::fs::write(
            wf.workspace().chunk_path(ArtifactKind::Subtitle, 0),
            "1\n00:00:00,000 --> 00:00:01,000\nこんにちは。\n\n",
        )
        .unwrap();

        let result = wf.render().await;

        assert!(matches!(result, Err(KataribeError::IncompleteStage { failed: 1, .. })));
        assert!(wf.workspace().chunk_path(ArtifactKind::Video, 0).exists());
        assert!(!wf.workspace().chunk_path(ArtifactKind::Video, 1).exists());
    }

    #[tokio::test]
    async fn combined_subtitles_are_offset_by_chunk_duration() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 6);
        with_script(&wf, "こんにちは。さようなら。").await;
        wf.synthesize_chunks(&FakeSynthesizer { fail_on: None }).await.unwrap();
        for ordinal in 0..2 {
            std::fs::write(
                wf.workspace().chunk_path(ArtifactKind::Subtitle, ordinal),
                "1\n00:00:00,500 --> 00:00:01,000\nはい。\n\n",
            )
            .unwrap();
        }
        // corrected track wins over the plain one
        std::fs::write(
            wf.workspace().chunk_path(ArtifactKind::CorrectedSubtitle, 1),
            "1\n00:00:00,500 --> 00:00:01,000\nいいえ。\n\n",
        )
        .unwrap();

        let output = wf.combine_subtitles().await.unwrap();
        let merged = read_srt(output).await.unwrap();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].index, 2);
        assert!((merged[1].start - 2.5).abs() < 1e-9);
        assert_eq!(merged[1].text, "いいえ。");
    }

    #[tokio::test]
    async fn combine_audio_follows_numeric_order() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 100);
        wf.workspace().ensure().await.unwrap();
        for (ordinal, bytes) in [(10, "c"), (2, "b"), (0, "a")] {
            std::fs::write(wf.workspace().chunk_path(ArtifactKind::Audio, ordinal), bytes).unwrap();
        }

        let output = wf.combine_audio().await.unwrap();
        assert_eq!(std::fs::read_to_string(output).unwrap(), "abc");
    }

    #[tokio::test]
    async fn missing_script_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 100);
        let result = wf.synthesize_chunks(&FakeSynthesizer { fail_on: None }).await;
        assert!(matches!(result, Err(KataribeError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let temp = tempfile::tempdir().unwrap();
        let wf = workflow(temp.path(), 100);
        assert!(matches!(
            wf.tts().await,
            Err(KataribeError::MissingCredential("ELEVENLABS_API_KEY"))
        ));
        assert!(matches!(
            wf.ai_topics().await,
            Err(KataribeError::MissingCredential("NEWSAPI_API_KEY"))
        ));
    }
}
