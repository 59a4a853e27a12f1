//! Retry policies, strategies and conditions.
//!
//! A [`RetryPolicy`] combines a [`RetryStrategy`] (how many attempts and how
//! long to wait between them) with an ordered list of [`RetryCondition`]s that
//! look at each [`Response`] and decide whether another attempt is warranted.
//! A response carrying an error is always retried while attempts remain.

use crate::rate_limit::RateLimitInfo;
use crate::Response;
use http::StatusCode;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Defines how many attempts are made and how long to wait between them.
///
/// Attempt counts include the first attempt, so `attempts: 3` means at most
/// two retries.
///
/// # Examples
///
/// ```
/// use chainreq::RetryStrategy;
/// use std::time::Duration;
///
/// // A single attempt, never retried
/// let no_retry = RetryStrategy::None;
///
/// // 100ms, 200ms, 400ms, 800ms between five attempts
/// let exponential = RetryStrategy::ExponentialBackoff {
///     attempts: 5,
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(30),
///     jitter: false,
/// };
///
/// // Three attempts one second apart
/// let linear = RetryStrategy::fixed(3, Duration::from_secs(1));
/// assert_eq!(linear.max_attempts(), Some(3));
/// ```
#[derive(Debug, Clone, Default)]
pub enum RetryStrategy {
    /// Exactly one attempt.
    ///
    /// Set on a request, this disables any retry policy configured on the client.
    #[default]
    None,

    /// Exponentially increasing delays.
    ///
    /// The wait after attempt `n` is `initial_delay * 2^(n-1)`, capped at `max_delay`.
    ExponentialBackoff {
        /// Total number of attempts.
        attempts: usize,
        /// The delay after the first attempt.
        initial_delay: Duration,
        /// Upper bound for any single delay.
        max_delay: Duration,
        /// Scale each delay by a random factor between 0.5 and 1.0.
        jitter: bool,
    },

    /// The same delay between every attempt. A zero delay retries immediately.
    Linear {
        /// Total number of attempts.
        attempts: usize,
        /// The delay between attempts.
        delay: Duration,
    },

    /// Caller supplied schedule.
    ///
    /// The function receives the number of attempts made so far and returns
    /// the delay before the next one, or `None` to stop.
    Custom {
        /// Computes the delay after the given attempt.
        delay_fn: fn(attempt: usize) -> Option<Duration>,
    },
}

impl RetryStrategy {
    /// Shorthand for [`RetryStrategy::Linear`].
    pub fn fixed(attempts: usize, delay: Duration) -> Self {
        RetryStrategy::Linear { attempts, delay }
    }

    /// Returns the delay to wait after `attempt` (1-indexed) has completed, or
    /// `None` if no further attempt is allowed.
    pub fn delay_after(&self, attempt: usize) -> Option<Duration> {
        match self {
            RetryStrategy::None => None,
            RetryStrategy::ExponentialBackoff {
                attempts,
                initial_delay,
                max_delay,
                jitter,
            } => {
                if attempt >= *attempts {
                    return None;
                }
                let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                let factor = 2u32.checked_pow(exp).unwrap_or(u32::MAX);
                let delay = initial_delay.saturating_mul(factor).min(*max_delay);
                if *jitter {
                    Some(delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0)))
                } else {
                    Some(delay)
                }
            }
            RetryStrategy::Linear { attempts, delay } => (attempt < *attempts).then_some(*delay),
            RetryStrategy::Custom { delay_fn } => delay_fn(attempt),
        }
    }

    /// Returns the total number of attempts, if bounded by the strategy itself.
    pub fn max_attempts(&self) -> Option<usize> {
        match self {
            RetryStrategy::None => Some(1),
            RetryStrategy::ExponentialBackoff { attempts, .. }
            | RetryStrategy::Linear { attempts, .. } => Some(*attempts),
            RetryStrategy::Custom { .. } => None,
        }
    }
}

/// Decides whether a completed response warrants another attempt.
///
/// Closures of type `Fn(&Response) -> bool` implement this trait, so the
/// simplest condition is a closure:
///
/// ```
/// use chainreq::{RetryPolicy, RetryStrategy, Response};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(RetryStrategy::fixed(5, Duration::from_millis(10)))
///     .condition(|resp: &Response| resp.header("x-job-state") != Some("done"));
/// ```
pub trait RetryCondition: Send + Sync {
    /// Returns `true` if the request should be attempted again.
    fn should_retry(&self, response: &Response) -> bool;
}

impl<F> RetryCondition for F
where
    F: Fn(&Response) -> bool + Send + Sync,
{
    fn should_retry(&self, response: &Response) -> bool {
        self(response)
    }
}

/// Retry on 5xx server errors.
#[derive(Debug, Clone, Copy)]
pub struct RetryOn5xx;

impl RetryCondition for RetryOn5xx {
    fn should_retry(&self, response: &Response) -> bool {
        response.status().is_some_and(|s| s.is_server_error())
    }
}

/// Retry when the status is one of the listed codes.
#[derive(Debug, Clone)]
pub struct RetryOnStatus(pub Vec<StatusCode>);

impl RetryCondition for RetryOnStatus {
    fn should_retry(&self, response: &Response) -> bool {
        response.status().is_some_and(|s| self.0.contains(&s))
    }
}

/// Retry on `429 Too Many Requests` or when rate limit headers show an
/// exhausted window.
#[derive(Debug, Clone, Copy)]
pub struct RetryOnRateLimit;

impl RetryCondition for RetryOnRateLimit {
    fn should_retry(&self, response: &Response) -> bool {
        response.status() == Some(StatusCode::TOO_MANY_REQUESTS)
            || RateLimitInfo::from_headers(response.headers()).is_rate_limited()
    }
}

/// Retries if ANY of the inner conditions returns `true`.
///
/// # Examples
///
/// ```
/// use chainreq::retry::{OrCondition, RetryOn5xx, RetryOnRateLimit};
///
/// let condition = OrCondition::new(vec![Box::new(RetryOn5xx), Box::new(RetryOnRateLimit)]);
/// ```
pub struct OrCondition {
    conditions: Vec<Box<dyn RetryCondition>>,
}

impl OrCondition {
    pub fn new(conditions: Vec<Box<dyn RetryCondition>>) -> Self {
        Self { conditions }
    }
}

impl RetryCondition for OrCondition {
    fn should_retry(&self, response: &Response) -> bool {
        self.conditions.iter().any(|c| c.should_retry(response))
    }
}

/// Retries only if ALL of the inner conditions return `true`.
pub struct AndCondition {
    conditions: Vec<Box<dyn RetryCondition>>,
}

impl AndCondition {
    pub fn new(conditions: Vec<Box<dyn RetryCondition>>) -> Self {
        Self { conditions }
    }
}

impl RetryCondition for AndCondition {
    fn should_retry(&self, response: &Response) -> bool {
        self.conditions.iter().all(|c| c.should_retry(response))
    }
}

/// A complete retry configuration for a client or a single request.
///
/// # Examples
///
/// ```
/// use chainreq::{retry::RetryOn5xx, RetryPolicy, RetryStrategy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(RetryStrategy::ExponentialBackoff {
///     attempts: 4,
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(2),
///     jitter: true,
/// })
/// .condition(RetryOn5xx)
/// .max_duration(Duration::from_secs(10))
/// .respect_rate_limit(Duration::from_secs(30));
/// ```
#[derive(Clone, Default)]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    conditions: Vec<Arc<dyn RetryCondition>>,
    max_duration: Option<Duration>,
    rate_limit_wait: Option<Duration>,
}

impl RetryPolicy {
    /// Creates a policy with the given strategy and no conditions.
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::default()
    }

    /// Appends a condition. Conditions run in the order they were added and
    /// the first one returning `true` triggers a retry.
    pub fn condition(mut self, condition: impl RetryCondition + 'static) -> Self {
        self.conditions.push(Arc::new(condition));
        self
    }

    /// Gives up with [`Error::RetryMaxDurationExceeded`](crate::Error::RetryMaxDurationExceeded)
    /// when waiting for the next attempt would take the total elapsed time past `max`.
    pub fn max_duration(mut self, max: Duration) -> Self {
        self.max_duration = Some(max);
        self
    }

    /// Waits as long as the response's rate limit headers ask, up to
    /// `max_wait`, instead of the strategy's delay.
    pub fn respect_rate_limit(mut self, max_wait: Duration) -> Self {
        self.rate_limit_wait = Some(max_wait);
        self
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    pub(crate) fn max_duration_limit(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Returns `true` if `response` warrants another attempt.
    pub(crate) fn should_retry(&self, response: &Response) -> bool {
        response.error().is_some() || self.conditions.iter().any(|c| c.should_retry(response))
    }

    /// Returns the delay before the attempt following `attempt`, or `None` if
    /// the strategy allows no more attempts.
    pub(crate) fn next_delay(&self, attempt: usize, response: &Response) -> Option<Duration> {
        let delay = self.strategy.delay_after(attempt)?;
        let server_delay = self
            .rate_limit_wait
            .and_then(|max_wait| RateLimitInfo::from_headers(response.headers()).delay(max_wait));
        Some(server_delay.unwrap_or(delay))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("strategy", &self.strategy)
            .field("conditions", &self.conditions.len())
            .field("max_duration", &self.max_duration)
            .field("rate_limit_wait", &self.rate_limit_wait)
            .finish()
    }
}

impl From<RetryStrategy> for RetryPolicy {
    fn from(strategy: RetryStrategy) -> Self {
        Self::new(strategy)
    }
}
