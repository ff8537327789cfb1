use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{KataribeError, Result};
use crate::generate::{GenerationRequest, TextGenerator, strip_code_fences};
use crate::subtitle::{Cue, parse_srt, render_srt};

pub const DEFAULT_CORRECTION_PROMPT: &str = "あなたは字幕の校正者です。\
音声認識で作成したSRT字幕を、読み上げ原稿と照らし合わせて修正してください。\n\
- 同音異義語や聞き間違いを原稿どおりの表記に直す\n\
- 数字はアラビア数字にし、4桁以上は3桁ごとにカンマを入れる\n\
- 人名・社名・銘柄名などの固有名詞を原稿どおりにする\n\
- 不要な空白を取り除き、読みやすい位置の空白は残す\n\
字幕の番号・件数・タイムスタンプは絶対に変更しないでください。\
修正後のSRTのみを出力してください。";

/// Text-only correction of a cue track against the script it was spoken from
pub struct SubtitleCorrector {
    generator: Arc<dyn TextGenerator>,
    instructions: String,
}

impl SubtitleCorrector {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self::with_instructions(generator, DEFAULT_CORRECTION_PROMPT)
    }

    pub fn with_instructions<S: Into<String>>(generator: Arc<dyn TextGenerator>, instructions: S) -> Self {
        Self {
            generator,
            instructions: instructions.into(),
        }
    }

    /// Ask the generator to fix cue text, keeping the original timestamps.
    ///
    /// The reply must contain exactly as many cues as `cues`.
    pub async fn correct(&self, reference: &str, cues: &[Cue]) -> Result<Vec<Cue>> {
        if cues.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = format!(
            "[原稿]\n```\n{}\n```\n\n[字幕]\n```srt\n{}```",
            reference.trim(),
            render_srt(cues)
        );
        let request = GenerationRequest::new(prompt).with_system(self.instructions.clone());

        info!("Correcting {} cues with {}", cues.len(), self.generator.name());
        let reply = self.generator.generate(&request).await?;
        let corrected = parse_srt(&strip_code_fences(&reply))
            .map_err(|e| KataribeError::Correction(format!("reply is not valid SRT: {}", e)))?;

        if corrected.len() != cues.len() {
            return Err(KataribeError::Correction(format!(
                "expected {} cues but the reply has {}",
                cues.len(),
                corrected.len()
            )));
        }

        let result = retain_timing(cues, &corrected);
        let changed = result.iter().zip(cues).filter(|(new, old)| new.text != old.text).count();
        debug!("Correction changed the text of {} cues", changed);
        Ok(result)
    }
}

/// Pair cues by position and take only the text from `corrected`
pub fn retain_timing(original: &[Cue], corrected: &[Cue]) -> Vec<Cue> {
    original
        .iter()
        .zip(corrected)
        .map(|(source, fixed)| {
            let text = fixed.text.trim();
            Cue {
                text: if text.is_empty() { source.text.clone() } else { text.to_string() },
                ..source.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::MockTextGenerator;

    fn cues() -> Vec<Cue> {
        vec![
            Cue { index: 1, start: 0.0, end: 1.5, text: "きょうの しじょう".to_string() },
            Cue { index: 2, start: 1.5, end: 3.25, text: "にせんえん".to_string() },
        ]
    }

    fn generator_replying(reply: &'static str) -> Arc<dyn TextGenerator> {
        let mut mock = MockTextGenerator::new();
        mock.expect_generate()
            .withf(|request| request.prompt.contains("[原稿]") && request.system.is_some())
            .times(1)
            .returning(move |_| Ok(reply.to_string()));
        mock.expect_name().return_const("mock");
        Arc::new(mock)
    }

    #[tokio::test]
    async fn keeps_timestamps_and_replaces_text() {
        // reply timestamps deliberately differ from the source
        let reply = "```srt\n1\n00:00:09,000 --> 00:00:10,000\n今日の 市場\n\n\
                     2\n00:00:11,000 --> 00:00:12,000\n2,000円\n```";
        let corrector = SubtitleCorrector::new(generator_replying(reply));

        let corrected = corrector.correct("今日の市場。2,000円。", &cues()).await.unwrap();
        let source = cues();

        assert_eq!(corrected.len(), 2);
        assert_eq!(corrected[0].text, "今日の 市場");
        assert_eq!(corrected[1].text, "2,000円");
        for (new, old) in corrected.iter().zip(&source) {
            assert_eq!((new.index, new.start, new.end), (old.index, old.start, old.end));
        }
    }

    #[tokio::test]
    async fn count_mismatch_is_rejected() {
        let reply = "1\n00:00:00,000 --> 00:00:03,250\n今日の市場 2,000円\n";
        let corrector = SubtitleCorrector::new(generator_replying(reply));

        let result = corrector.correct("原稿", &cues()).await;
        assert!(matches!(result, Err(KataribeError::Correction(_))));
    }

    #[tokio::test]
    async fn unparseable_reply_is_rejected() {
        let corrector = SubtitleCorrector::new(generator_replying("修正しました!"));
        assert!(matches!(corrector.correct("原稿", &cues()).await, Err(KataribeError::Correction(_))));
    }

    #[tokio::test]
    async fn empty_track_skips_the_generator() {
        let corrector = SubtitleCorrector::new(Arc::new(MockTextGenerator::new()));
        assert!(corrector.correct("原稿", &[]).await.unwrap().is_empty());
    }

    #[test]
    fn blank_corrected_text_keeps_original() {
        let mut fixed = cues();
        fixed[1].text = "  ".to_string();
        let merged = retain_timing(&cues(), &fixed);
        assert_eq!(merged[1].text, "にせんえん");
    }
}
