use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use tracing::{error, info};

use crate::error::{KataribeError, Result};

/// Per-chunk outcome of a stage
#[derive(Debug)]
pub struct BatchReport<T> {
    pub stage: String,
    /// Successful results, sorted by chunk ordinal
    pub succeeded: Vec<(usize, T)>,
    /// Failed chunks with their error messages, sorted by ordinal
    pub failed: Vec<(usize, String)>,
}

impl<T> BatchReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Successful results in ordinal order, or `IncompleteStage` if any chunk failed
    pub fn into_complete(self) -> Result<Vec<(usize, T)>> {
        if self.failed.is_empty() {
            Ok(self.succeeded)
        } else {
            Err(KataribeError::IncompleteStage {
                stage: self.stage,
                failed: self.failed.len(),
            })
        }
    }
}

/// Run `task` for every item with at most `max_concurrency` in flight.
///
/// A failing item is logged and recorded; the others keep running. The
/// report is returned only after every item has resolved.
pub async fn run_batch<I, T, F, Fut>(stage: &str, items: Vec<(usize, I)>, max_concurrency: usize, task: F) -> BatchReport<T>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = items.len();
    info!("┌─ Stage {}: {} chunk(s)", stage, total);

    let progress = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template("{prefix:>12} [{bar:30}] {pos}/{len} {msg}") {
        progress.set_style(style.progress_chars("=> "));
    }
    progress.set_prefix(stage.to_string());

    let task = &task;
    let progress_ref = &progress;
    let results: Vec<(usize, Result<T>)> = stream::iter(items)
        .map(|(ordinal, item)| async move {
            let result = task(ordinal, item).await;
            progress_ref.inc(1);
            (ordinal, result)
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;
    progress.finish_and_clear();

    let mut report = BatchReport {
        stage: stage.to_string(),
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (ordinal, result) in results {
        match result {
            Ok(value) => report.succeeded.push((ordinal, value)),
            Err(e) => {
                error!("{} failed for chunk {}: {}", stage, ordinal, e);
                report.failed.push((ordinal, e.to_string()));
            }
        }
    }
    report.succeeded.sort_by_key(|(ordinal, _)| *ordinal);
    report.failed.sort_by_key(|(ordinal, _)| *ordinal);

    info!(
        "└─ Stage {}: {} succeeded, {} failed",
        stage,
        report.succeeded.len(),
        report.failed.len()
    );
    report
}

/// One line per failed chunk, for the end-of-stage summary
pub fn describe_failures<T>(report: &BatchReport<T>) -> Vec<String> {
    report
        .failed
        .iter()
        .map(|(ordinal, message)| format!("{} chunk {}: {}", report.stage, ordinal, message))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn results_are_ordered_by_ordinal_not_completion() {
        let items: Vec<(usize, u64)> = vec![(0, 30), (1, 1), (2, 15), (10, 5)];

        let report = run_batch("render", items, 4, |ordinal, delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(ordinal * 2)
        })
        .await;

        assert!(report.is_complete());
        assert_eq!(report.into_complete().unwrap(), vec![(0, 0), (1, 2), (2, 4), (10, 20)]);
    }

    #[tokio::test]
    async fn failures_do_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        let items: Vec<(usize, ())> = (0..5).map(|i| (i, ())).collect();

        let report = run_batch("tts", items, 2, move |ordinal, _| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if ordinal == 1 || ordinal == 3 {
                    Err(KataribeError::service("ElevenLabs", "boom"))
                } else {
                    Ok(ordinal)
                }
            }
        })
        .await;

        assert_eq!(finished.load(Ordering::SeqCst), 5);
        assert_eq!(report.failed.iter().map(|(o, _)| *o).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(describe_failures(&report)[0], "tts chunk 1: ElevenLabs error: boom");

        match report.into_complete() {
            Err(KataribeError::IncompleteStage { stage, failed }) => {
                assert_eq!(stage, "tts");
                assert_eq!(failed, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (in_flight_ref, peak_ref) = (in_flight.clone(), peak.clone());
        let items: Vec<(usize, ())> = (0..8).map(|i| (i, ())).collect();

        let report = run_batch("stt", items, 3, move |_, _| {
            let in_flight = in_flight_ref.clone();
            let peak = peak_ref.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await;

        assert!(report.is_complete());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }
}
