use moodwatch_core::{CoreError, RedditApiError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
    /// Consecutive failed operations before the circuit opens
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before a trial request
    pub recovery_timeout_s: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            failure_threshold: 5,
            recovery_timeout_s: 60,
        }
    }
}

impl RetryConfig {
    /// Retry settings for polling Reddit listings
    pub fn reddit() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
            failure_threshold: 3,
            recovery_timeout_s: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Stops hammering Reddit after repeated failed operations.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: CircuitBreakerState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    config: RetryConfig,
}

impl CircuitBreaker {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            state: CircuitBreakerState::Closed,
            failure_count: 0,
            last_failure_time: None,
            config,
        }
    }

    pub fn allow_request(&mut self) -> bool {
        match self.state {
            CircuitBreakerState::Closed | CircuitBreakerState::HalfOpen => true,
            CircuitBreakerState::Open => {
                let recovery_duration = Duration::from_secs(self.config.recovery_timeout_s);
                match self.last_failure_time {
                    Some(last_failure) if last_failure.elapsed() >= recovery_duration => {
                        debug!("Circuit breaker transitioning to half-open for recovery test");
                        self.state = CircuitBreakerState::HalfOpen;
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state == CircuitBreakerState::HalfOpen {
            info!("Circuit breaker recovery successful, returning to closed state");
            self.state = CircuitBreakerState::Closed;
            self.last_failure_time = None;
        }
        self.failure_count = 0;
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_time = Some(Instant::now());

        match self.state {
            CircuitBreakerState::Closed if self.failure_count >= self.config.failure_threshold => {
                warn!(
                    "Circuit breaker opening due to {} consecutive failures",
                    self.failure_count
                );
                self.state = CircuitBreakerState::Open;
            }
            CircuitBreakerState::HalfOpen => {
                warn!("Circuit breaker recovery failed, returning to open state");
                self.state = CircuitBreakerState::Open;
            }
            _ => {}
        }
    }

    pub fn get_state(&self) -> CircuitBreakerState {
        self.state.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Retry with exponential backoff
    Retry,
    /// Retry after the delay the server asked for
    RetryWithDelay(Duration),
    /// Permanent failure
    NoRetry,
}

pub fn get_retry_strategy(error: &CoreError) -> RetryStrategy {
    match error {
        CoreError::RedditApi(reddit_error) => match reddit_error {
            RedditApiError::RateLimitExceeded { retry_after } => {
                RetryStrategy::RetryWithDelay(Duration::from_secs(*retry_after))
            }
            RedditApiError::ServerError { .. } => RetryStrategy::Retry,
            RedditApiError::RequestTimeout => RetryStrategy::Retry,
            // Reddit occasionally serves an HTML error page with a 200
            RedditApiError::InvalidResponse { .. } => RetryStrategy::Retry,
            RedditApiError::AuthenticationFailed { .. }
            | RedditApiError::InvalidToken
            | RedditApiError::Forbidden { .. }
            | RedditApiError::SubredditNotFound { .. } => RetryStrategy::NoRetry,
        },
        CoreError::Network(reqwest_error) => {
            if reqwest_error.is_timeout() || reqwest_error.is_connect() {
                RetryStrategy::Retry
            } else {
                RetryStrategy::NoRetry
            }
        }
        _ => RetryStrategy::NoRetry,
    }
}

/// Exponential backoff with jitter, capped at `max_delay_ms`.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let max_delay = Duration::from_millis(config.max_delay_ms);

    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms);
    let exponential_delay = Duration::from_millis(delay_ms);

    let jitter_range = (exponential_delay.as_millis() as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    (exponential_delay + Duration::from_millis(jitter)).min(max_delay)
}

#[derive(Debug, Clone, Default)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_operations: u64,
    pub circuit_breaker_trips: u64,
}

/// Runs an operation with retries and a circuit breaker.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    circuit_breaker: Arc<Mutex<CircuitBreaker>>,
    metrics: Arc<Mutex<RetryMetrics>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        let circuit_breaker = Arc::new(Mutex::new(CircuitBreaker::new(config.clone())));

        Self {
            config,
            circuit_breaker,
            metrics: Arc::new(Mutex::new(RetryMetrics::default())),
        }
    }

    /// Executes `operation`, retrying transient failures. On failure the
    /// error of the last attempt is returned.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let allowed = lock(&self.circuit_breaker).allow_request();
        if !allowed {
            lock(&self.metrics).circuit_breaker_trips += 1;
            warn!(
                "Circuit breaker is open, blocking request for {}",
                operation_name
            );
            return Err(CoreError::Internal {
                message: "Circuit breaker is open".to_string(),
            });
        }

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                debug!("Retry attempt {} for {}", attempt, operation_name);
            }

            let error = match operation().await {
                Ok(result) => {
                    lock(&self.circuit_breaker).record_success();
                    if attempt > 0 {
                        let mut metrics = lock(&self.metrics);
                        metrics.total_retries += attempt as u64;
                        metrics.successful_retries += 1;
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name, attempt
                        );
                    }
                    return Ok(result);
                }
                Err(error) => error,
            };

            let attempts_left = attempt + 1 < self.config.max_attempts;
            let strategy = get_retry_strategy(&error);
            let delay = match strategy {
                RetryStrategy::Retry if attempts_left => calculate_delay(attempt, &self.config),
                RetryStrategy::RetryWithDelay(delay) if attempts_left => {
                    delay.min(Duration::from_millis(self.config.max_delay_ms))
                }
                _ => {
                    // Permanent errors say nothing about Reddit's health
                    if strategy != RetryStrategy::NoRetry {
                        lock(&self.circuit_breaker).record_failure();
                    }
                    {
                        let mut metrics = lock(&self.metrics);
                        metrics.total_retries += attempt as u64;
                        metrics.failed_operations += 1;
                    }
                    error!(
                        "Operation {} failed after {} attempt(s): {}",
                        operation_name,
                        attempt + 1,
                        error
                    );
                    return Err(error);
                }
            };

            info!(
                "Retrying {} in {:?} due to: {}",
                operation_name, delay, error
            );
            sleep(delay).await;
            attempt += 1;
        }
    }

    pub fn get_metrics(&self) -> RetryMetrics {
        lock(&self.metrics).clone()
    }

    pub fn get_circuit_breaker_state(&self) -> CircuitBreakerState {
        lock(&self.circuit_breaker).get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_reddit() {
        let config = RetryConfig::reddit();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 2000);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn test_circuit_breaker_failure_threshold() {
        let config = RetryConfig {
            failure_threshold: 2,
            ..Default::default()
        };
        let mut breaker = CircuitBreaker::new(config);

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitBreakerState::Closed);
        assert!(breaker.allow_request());

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitBreakerState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn test_circuit_breaker_recovery() {
        let config = RetryConfig {
            failure_threshold: 1,
            recovery_timeout_s: 0,
            ..Default::default()
        };
        let mut breaker = CircuitBreaker::new(config);

        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitBreakerState::Open);

        std::thread::sleep(Duration::from_millis(1));
        assert!(breaker.allow_request());
        assert_eq!(breaker.get_state(), CircuitBreakerState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.get_state(), CircuitBreakerState::Closed);
    }

    #[test]
    fn test_retry_strategy_for_errors() {
        let rate_limit_error =
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
        assert_eq!(
            get_retry_strategy(&rate_limit_error),
            RetryStrategy::RetryWithDelay(Duration::from_secs(60))
        );

        let not_found = CoreError::RedditApi(RedditApiError::SubredditNotFound {
            subreddit: "nope".to_string(),
        });
        assert_eq!(get_retry_strategy(&not_found), RetryStrategy::NoRetry);

        let server_error = CoreError::RedditApi(RedditApiError::ServerError { status_code: 502 });
        assert_eq!(get_retry_strategy(&server_error), RetryStrategy::Retry);

        let config_error = CoreError::InvalidInput {
            message: "x".to_string(),
        };
        assert_eq!(get_retry_strategy(&config_error), RetryStrategy::NoRetry);
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            ..Default::default()
        };

        assert_eq!(calculate_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(3, &config), Duration::from_millis(8000));
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(10000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[tokio::test]
    async fn test_retry_executor_success_after_retries() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            ..Default::default()
        };
        let executor = RetryExecutor::new(config);

        let attempt_count = Arc::new(Mutex::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result = executor
            .execute("fetch_posts", move || {
                let attempt_count = attempt_count_clone.clone();
                async move {
                    let mut count = attempt_count.lock().unwrap();
                    *count += 1;
                    if *count < 3 {
                        Err(CoreError::RedditApi(RedditApiError::ServerError {
                            status_code: 503,
                        }))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);

        let metrics = executor.get_metrics();
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(metrics.successful_retries, 1);
    }

    #[tokio::test]
    async fn test_retry_executor_returns_original_error() {
        let executor = RetryExecutor::new(RetryConfig::default());

        let attempt_count = Arc::new(Mutex::new(0));
        let attempt_count_clone = attempt_count.clone();

        let result = executor
            .execute("fetch_posts", move || {
                let attempt_count = attempt_count_clone.clone();
                async move {
                    *attempt_count.lock().unwrap() += 1;
                    Err::<i32, CoreError>(CoreError::RedditApi(
                        RedditApiError::SubredditNotFound {
                            subreddit: "missing".to_string(),
                        },
                    ))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }))
        ));
        assert_eq!(*attempt_count.lock().unwrap(), 1);
        assert_eq!(executor.get_metrics().failed_operations, 1);
    }

    #[tokio::test]
    async fn test_permanent_errors_keep_circuit_closed() {
        let executor = RetryExecutor::new(RetryConfig::reddit());

        // More permanent failures than the reddit failure threshold of 3
        for _ in 0..4 {
            let result = executor
                .execute("fetch_posts", || async {
                    Err::<i32, CoreError>(CoreError::RedditApi(
                        RedditApiError::SubredditNotFound {
                            subreddit: "privado".to_string(),
                        },
                    ))
                })
                .await;
            assert!(matches!(
                result,
                Err(CoreError::RedditApi(RedditApiError::SubredditNotFound { .. }))
            ));
        }

        let result = executor
            .execute("fetch_posts", || async {
                Err::<i32, CoreError>(CoreError::RedditApi(RedditApiError::Forbidden {
                    resource: "r/privado".to_string(),
                }))
            })
            .await;
        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::Forbidden { .. }))
        ));

        assert_eq!(
            executor.get_circuit_breaker_state(),
            CircuitBreakerState::Closed
        );
        let metrics = executor.get_metrics();
        assert_eq!(metrics.failed_operations, 5);
        assert_eq!(metrics.circuit_breaker_trips, 0);
    }

    #[tokio::test]
    async fn test_retry_executor_circuit_breaker() {
        let config = RetryConfig {
            max_attempts: 2,
            failure_threshold: 2,
            base_delay_ms: 1,
            ..Default::default()
        };
        let executor = RetryExecutor::new(config);

        for _ in 0..2 {
            let result = executor
                .execute("fetch_posts", || async {
                    Err::<i32, CoreError>(CoreError::RedditApi(RedditApiError::ServerError {
                        status_code: 500,
                    }))
                })
                .await;
            assert!(result.is_err());
        }

        assert_eq!(
            executor.get_circuit_breaker_state(),
            CircuitBreakerState::Open
        );

        let blocked = executor
            .execute("fetch_posts", || async { Ok::<i32, CoreError>(42) })
            .await;
        assert!(blocked
            .unwrap_err()
            .to_string()
            .contains("Circuit breaker is open"));
        assert_eq!(executor.get_metrics().circuit_breaker_trips, 1);
    }
}
