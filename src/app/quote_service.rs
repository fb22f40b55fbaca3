use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::domain::{FetchError, Quote, QuoteRequest};
use crate::infra::llm::{GeminiProvider, QuoteProvider};

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Retry policy for rate-limited responses.
///
/// The wait before attempt `n + 1` is `initial_backoff * 2^(n - 1)`, capped at
/// `max_backoff`. No wait follows the final attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.max_attempts == 0 {
            return Err(FetchError::config("max_attempts must be at least 1"));
        }
        if self.initial_backoff.is_zero() {
            return Err(FetchError::config("initial_backoff must be greater than 0"));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(FetchError::config(
                "max_backoff must not be shorter than initial_backoff",
            ));
        }
        Ok(())
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_backoff
            .saturating_mul(1_u32 << exponent)
            .min(self.max_backoff)
    }
}

#[derive(Clone)]
pub struct QuoteService {
    provider: Arc<dyn QuoteProvider>,
    retry_config: RetryConfig,
}

impl QuoteService {
    pub fn new(provider: Arc<dyn QuoteProvider>) -> Self {
        Self {
            provider,
            retry_config: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(
        provider: Arc<dyn QuoteProvider>,
        retry_config: RetryConfig,
    ) -> Result<Self, FetchError> {
        retry_config.validate()?;
        Ok(Self {
            provider,
            retry_config,
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry_config
    }

    pub fn fetch(&self, request: QuoteRequest) -> Result<Quote, FetchError> {
        self.fetch_with_cancel(request, || false)
    }

    pub fn fetch_with_cancel<F>(
        &self,
        request: QuoteRequest,
        is_cancelled: F,
    ) -> Result<Quote, FetchError>
    where
        F: Fn() -> bool,
    {
        request.validate()?;

        let max_attempts = self.retry_config.max_attempts;
        let mut attempt = 1;
        loop {
            if is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            debug!(
                "requesting quote from {} (attempt {attempt}/{max_attempts})",
                self.provider.provider_id()
            );
            match self.provider.fetch(&request) {
                Ok(mut quote) => {
                    quote.metadata.attempts = attempt;
                    info!(
                        "received quote from {} after {attempt} attempt(s)",
                        self.provider.provider_id()
                    );
                    return Ok(quote);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let backoff = self.retry_config.backoff_for_attempt(attempt);
                    warn!(
                        "quote request rate limited (attempt {attempt}/{max_attempts}); retrying in {backoff:?}"
                    );
                    wait_with_cancel(backoff, &is_cancelled)?;
                    attempt += 1;
                }
                Err(error) => {
                    warn!("quote request failed on attempt {attempt}/{max_attempts}: {error}");
                    return Err(error);
                }
            }
        }
    }
}

/// Fetches a motivational quote from Gemini with the default retry policy.
///
/// A blank `api_key` fails with [`FetchError::Config`] before any request is made.
pub fn fetch_quote(prompt: &str, api_key: &str) -> Result<String, FetchError> {
    let provider = GeminiProvider::from_api_key(api_key)?;
    QuoteService::new(Arc::new(provider))
        .fetch(QuoteRequest::new(prompt))
        .map(|quote| quote.text)
}

fn wait_with_cancel<F>(duration: Duration, is_cancelled: &F) -> Result<(), FetchError>
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + duration;
    loop {
        if is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        thread::sleep(remaining.min(CANCEL_POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use super::{QuoteService, RetryConfig, fetch_quote};
    use crate::domain::{FetchError, Quote, QuoteRequest};
    use crate::infra::llm::QuoteProvider;

    struct ScriptedProvider {
        calls: AtomicUsize,
        responses: Mutex<VecDeque<Result<Quote, FetchError>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<Quote, FetchError>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses.into()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl QuoteProvider for ScriptedProvider {
        fn provider_id(&self) -> &str {
            "scripted"
        }

        fn fetch(&self, _request: &QuoteRequest) -> Result<Quote, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("response queue lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Err(FetchError::internal("script exhausted")))
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn rate_limited() -> Result<Quote, FetchError> {
        Err(FetchError::http(429, "Resource has been exhausted"))
    }

    #[test]
    fn default_retry_config_doubles_from_one_second() {
        let config = RetryConfig::default();

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.backoff_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.backoff_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.backoff_for_attempt(3), Duration::from_secs(4));
        assert_eq!(config.backoff_for_attempt(10), Duration::from_secs(4));
    }

    #[test]
    fn with_retry_config_rejects_invalid_values() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));

        let zero_attempts = RetryConfig {
            max_attempts: 0,
            ..fast_retry()
        };
        assert!(matches!(
            QuoteService::with_retry_config(provider.clone(), zero_attempts),
            Err(FetchError::Config { .. })
        ));

        let inverted = RetryConfig {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(5),
        };
        assert!(matches!(
            QuoteService::with_retry_config(provider, inverted),
            Err(FetchError::Config { .. })
        ));
    }

    #[test]
    fn fetch_retries_rate_limited_responses_until_success() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            rate_limited(),
            rate_limited(),
            Ok(Quote::new("Keep pushing.")),
        ]));
        let service = QuoteService::with_retry_config(provider.clone(), fast_retry())
            .expect("retry config should be valid");

        let quote = service
            .fetch(QuoteRequest::default())
            .expect("third attempt should succeed");

        assert_eq!(quote.text, "Keep pushing.");
        assert_eq!(quote.metadata.attempts, 3);
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn fetch_returns_rate_limit_error_once_attempts_are_exhausted() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            rate_limited(),
            rate_limited(),
            rate_limited(),
            Ok(Quote::new("never reached")),
        ]));
        let service = QuoteService::with_retry_config(provider.clone(), fast_retry())
            .expect("retry config should be valid");

        let error = service
            .fetch(QuoteRequest::default())
            .expect_err("exhausted retries should fail");

        assert_eq!(error.status(), Some(429));
        assert_eq!(provider.calls(), 3);
    }

    #[test]
    fn fetch_does_not_retry_other_failures() {
        for failure in [
            FetchError::http(500, "internal"),
            FetchError::parse("missing text"),
            FetchError::transport("connection reset"),
        ] {
            let provider = Arc::new(ScriptedProvider::new(vec![
                Err(failure.clone()),
                Ok(Quote::new("never reached")),
            ]));
            let service = QuoteService::with_retry_config(provider.clone(), fast_retry())
                .expect("retry config should be valid");

            let error = service
                .fetch(QuoteRequest::default())
                .expect_err("non-retryable failure should abort");

            assert_eq!(error, failure);
            assert_eq!(provider.calls(), 1);
        }
    }

    #[test]
    fn fetch_rejects_blank_prompt_without_calling_provider() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Quote::new("unused"))]));
        let service = QuoteService::new(provider.clone());

        let error = service
            .fetch(QuoteRequest::new(""))
            .expect_err("blank prompt should fail");

        assert!(matches!(error, FetchError::Config { .. }));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn fetch_with_cancel_stops_during_backoff() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            rate_limited(),
            Ok(Quote::new("never reached")),
        ]));
        let service = QuoteService::with_retry_config(
            provider.clone(),
            RetryConfig {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(5),
                max_backoff: Duration::from_secs(5),
            },
        )
        .expect("retry config should be valid");

        let started = Instant::now();
        let error = service
            .fetch_with_cancel(QuoteRequest::default(), || {
                started.elapsed() >= Duration::from_millis(30)
            })
            .expect_err("cancellation should stop the backoff wait");

        assert_eq!(error, FetchError::Cancelled);
        assert_eq!(provider.calls(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn fetch_with_cancel_skips_request_when_already_cancelled() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(Quote::new("unused"))]));
        let service = QuoteService::new(provider.clone());

        let error = service
            .fetch_with_cancel(QuoteRequest::default(), || true)
            .expect_err("pre-cancelled fetch should fail");

        assert_eq!(error, FetchError::Cancelled);
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn fetch_quote_rejects_empty_api_key_before_network() {
        let error = fetch_quote("Give me a quote", "").expect_err("empty key should fail");

        assert_eq!(error, FetchError::missing_api_key());
    }
}
