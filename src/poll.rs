use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::PollingConfig;
use crate::error::{KataribeError, Result};

/// Outcome of one status check
#[derive(Debug, Clone, PartialEq)]
pub enum PollState<T> {
    Ready(T),
    Pending,
}

/// Fixed-interval polling with a bounded number of attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
        }
    }
}

impl PollPolicy {
    /// Run `check` until it reports ready, sleeping `interval` between attempts.
    ///
    /// Errors from `check` end polling immediately; running out of attempts is
    /// a `Timeout` naming `what`.
    pub async fn poll_until<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollState<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            debug!("Checking {} (attempt {}/{})", what, attempt, self.max_attempts);
            if let PollState::Ready(value) = check().await? {
                return Ok(value);
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(KataribeError::Timeout {
            what: what.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts,
        }
    }

    #[tokio::test]
    async fn returns_once_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = fast(10)
            .poll_until("transcript", move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(if n == 3 { PollState::Ready(n) } else { PollState::Pending })
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausting_attempts_times_out() {
        let result: Result<()> = fast(4).poll_until("job abc", || async { Ok(PollState::Pending) }).await;

        match result {
            Err(KataribeError::Timeout { what, attempts }) => {
                assert_eq!(what, "job abc");
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn check_errors_stop_polling() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = fast(10)
            .poll_until("job", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(KataribeError::JobFailed {
                        id: "j1".to_string(),
                        reason: "moderation".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(KataribeError::JobFailed { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
