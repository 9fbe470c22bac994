use crate::backends::InferenceBackend;
use async_trait::async_trait;
use maestro_core::{MaestroError, MaestroResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(test)]
type Sleeper = Box<
    dyn Fn(Duration) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        + Send
        + Sync,
>;

/// Per-backend retry budget and backoff bounds, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries granted to one backend before the next one is tried.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub backoff_base_ms: u64,
    /// Upper bound for any single delay.
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): base doubled per
    /// attempt, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = self
            .backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

const TRANSIENT_MARKERS: &[&str] = &[
    "429", "401", "500", "502", "503", "504", "5xx", "timeout", "timed out",
];

/// Transient failures: rate limits, auth hiccups, 5xx and timeouts.
/// A 400 is never transient.
pub fn is_transient(err: &MaestroError) -> bool {
    let text = err.to_string().to_lowercase();
    !text.contains("400") && TRANSIENT_MARKERS.iter().any(|m| text.contains(m))
}

/// Tries each backend in order, retrying transient failures with
/// exponential backoff. The last error wins when every backend gives up.
pub struct FailoverBackend {
    chain: Vec<Box<dyn InferenceBackend>>,
    policy: RetryPolicy,
    #[cfg(test)]
    sleeper: Option<Sleeper>,
}

impl FailoverBackend {
    /// Fails with [`MaestroError::Config`] on an empty chain.
    pub fn new(
        chain: Vec<Box<dyn InferenceBackend>>,
        policy: RetryPolicy,
    ) -> MaestroResult<Self> {
        if chain.is_empty() {
            return Err(MaestroError::Config(
                "failover needs at least one backend".into(),
            ));
        }
        Ok(Self {
            chain,
            policy,
            #[cfg(test)]
            sleeper: None,
        })
    }

    /// Number of backends in the chain.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false for a constructed chain.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    async fn pause(&self, delay: Duration) {
        #[cfg(test)]
        if let Some(sleeper) = &self.sleeper {
            sleeper(delay).await;
            return;
        }
        tokio::time::sleep(delay).await;
    }

    /// Run one backend until it succeeds, fails permanently, or its retry
    /// budget runs out.
    async fn drive(
        &self,
        index: usize,
        backend: &dyn InferenceBackend,
        system_prompt: Option<&str>,
        prompt: &str,
    ) -> MaestroResult<String> {
        let mut attempt = 0;
        loop {
            let err = match backend.infer(system_prompt, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };
            if !is_transient(&err) || attempt >= self.policy.max_retries {
                return Err(err);
            }
            let delay = self.policy.delay(attempt);
            debug!(
                backend = index,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient inference failure, retrying"
            );
            self.pause(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl InferenceBackend for FailoverBackend {
    async fn infer(&self, system_prompt: Option<&str>, prompt: &str) -> MaestroResult<String> {
        let mut last = None;
        for (index, backend) in self.chain.iter().enumerate() {
            match self
                .drive(index, backend.as_ref(), system_prompt, prompt)
                .await
            {
                Ok(text) => return Ok(text),
                Err(e) => {
                    if index + 1 < self.chain.len() {
                        warn!(
                            backend = index,
                            error = %e,
                            "Inference backend gave up, failing over"
                        );
                    }
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| MaestroError::Inference("no inference backend left".into())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Replay {
        answers: parking_lot::Mutex<VecDeque<MaestroResult<String>>>,
        calls: Arc<AtomicUsize>,
    }

    impl Replay {
        fn boxed(
            answers: Vec<MaestroResult<String>>,
        ) -> (Box<dyn InferenceBackend>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let backend = Replay {
                answers: parking_lot::Mutex::new(answers.into()),
                calls: calls.clone(),
            };
            (Box::new(backend), calls)
        }
    }

    #[async_trait]
    impl InferenceBackend for Replay {
        async fn infer(&self, _: Option<&str>, _: &str) -> MaestroResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(MaestroError::Inference("replay exhausted".into())))
        }
    }

    fn http(msg: &str) -> MaestroResult<String> {
        Err(MaestroError::Http(msg.into()))
    }

    fn no_wait(chain: Vec<Box<dyn InferenceBackend>>) -> FailoverBackend {
        let mut failover = FailoverBackend::new(
            chain,
            RetryPolicy {
                max_retries: 3,
                backoff_base_ms: 0,
                backoff_max_ms: 0,
            },
        )
        .unwrap();
        failover.sleeper = Some(Box::new(|_| Box::pin(async {})));
        failover
    }

    #[tokio::test]
    async fn test_rate_limit_then_success() {
        let (backend, calls) =
            Replay::boxed(vec![http("429 Too Many Requests"), Ok("ok".into())]);
        let failover = no_wait(vec![backend]);
        assert_eq!(failover.infer(None, "p").await.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_chain_reports_last_error() {
        let (first, first_calls) = Replay::boxed((0..4).map(|_| http("500 oops")).collect());
        let (second, _) = Replay::boxed((0..4).map(|_| http("503 busy")).collect());
        let failover = no_wait(vec![first, second]);

        let err = failover.infer(None, "p").await.unwrap_err().to_string();
        assert!(err.contains("503"), "got: {err}");
        assert_eq!(first_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_bad_request_fails_over_without_retry() {
        let (first, first_calls) =
            Replay::boxed(vec![http("400 Bad Request"), Ok("unused".into())]);
        let (second, _) = Replay::boxed(vec![Ok("fallback ok".into())]);
        let failover = no_wait(vec![first, second]);

        assert_eq!(failover.infer(None, "p").await.unwrap(), "fallback ok");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(2), Duration::from_millis(2000));
        assert_eq!(policy.delay(10), Duration::from_millis(30_000));
    }

    #[test]
    fn test_transient_classification() {
        for msg in [
            "429 Too Many Requests",
            "401 Unauthorized",
            "request timed out",
            "502 Bad Gateway",
        ] {
            assert!(is_transient(&MaestroError::Http(msg.into())), "{msg}");
        }
        assert!(!is_transient(&MaestroError::Http("400 Bad Request".into())));
        assert!(!is_transient(&MaestroError::Inference("malformed".into())));
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(matches!(
            FailoverBackend::new(Vec::new(), RetryPolicy::default()),
            Err(MaestroError::Config(_))
        ));
    }
}
