use std::future::Future;
use std::time::Duration;

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-delay retry, no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(retries: u32, delay: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            delay,
        }
    }

    /// Runs `op` until `is_retryable` rejects its result or the attempt budget
    /// is spent, and returns the last result. Attempts are numbered from 1.
    pub async fn run<T, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        mut op: F,
        is_retryable: impl Fn(&T) -> bool,
    ) -> T
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = op(attempt).await;
            if attempt >= max_attempts || !is_retryable(&result) {
                return result;
            }
            tracing::debug!(attempt, delay_ms = self.delay.as_millis() as u64, "retrying");
            sleeper.sleep(self.delay).await;
            attempt += 1;
        }
    }
}
