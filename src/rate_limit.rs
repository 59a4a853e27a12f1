//! Rate limit header parsing.
//!
//! When a [`RetryPolicy`](crate::RetryPolicy) respects rate limits, the delay
//! before the next attempt is taken from the response's `Retry-After` or
//! `X-RateLimit-Reset` headers instead of the retry strategy.

use http::HeaderMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RESET_HEADERS: [&str; 2] = ["x-ratelimit-reset", "ratelimit-reset"];

/// Rate limit data extracted from response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// How long to wait before retrying, from `Retry-After`.
    pub retry_after: Option<Duration>,

    /// When the current window resets, from `X-RateLimit-Reset` or `RateLimit-Reset`.
    pub reset_at: Option<SystemTime>,

    /// Requests left in the current window, from `X-RateLimit-Remaining`.
    pub remaining: Option<u64>,
}

impl RateLimitInfo {
    /// Parses rate limit headers.
    ///
    /// `Retry-After` may be either delay-seconds or an HTTP date.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::rate_limit::RateLimitInfo;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "60".parse().unwrap());
    ///
    /// let info = RateLimitInfo::from_headers(&headers);
    /// assert_eq!(info.retry_after, Some(Duration::from_secs(60)));
    /// ```
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let retry_after = header_str(headers, "retry-after").and_then(|value| {
            match value.parse::<u64>() {
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => httpdate::parse_http_date(value)
                    .ok()?
                    .duration_since(SystemTime::now())
                    .ok(),
            }
        });

        let reset_at = RESET_HEADERS
            .iter()
            .find_map(|name| header_str(headers, name)?.parse::<u64>().ok())
            .map(|secs| UNIX_EPOCH + Duration::from_secs(secs));

        let remaining = header_str(headers, "x-ratelimit-remaining").and_then(|v| v.parse().ok());

        Self {
            retry_after,
            reset_at,
            remaining,
        }
    }

    /// Returns the delay the server asked for, capped at `max_wait`.
    ///
    /// `Retry-After` takes precedence over the reset time. Returns `None` when
    /// the server did not indicate a wait.
    pub fn delay(&self, max_wait: Duration) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after.min(max_wait));
        }
        let until_reset = self.reset_at?.duration_since(SystemTime::now()).ok()?;
        Some(until_reset.min(max_wait))
    }

    /// Returns `true` if the headers indicate an active rate limit.
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.remaining == Some(0)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}
