//! Cancellation scopes for requests.
//!
//! A [`Context`] bundles a cancellation token with an optional deadline. Child
//! contexts inherit both from their parent: cancelling a parent cancels every
//! child, and a child's deadline is never later than its parent's.

use crate::Error;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A cancellation scope with an optional deadline.
///
/// Contexts are cheap to clone; clones share the same cancellation state.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{Client, Context};
/// use std::time::Duration;
///
/// # async fn example() {
/// let ctx = Context::background().with_timeout(Duration::from_secs(3));
/// let result = Client::new()
///     .get("https://httpbin.org/delay/10")
///     .context(ctx)
///     .send()
///     .await
///     .text()
///     .await;
/// assert!(result.is_err());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Returns a context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Returns a child context that can be canceled independently of `self`.
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Returns a child context whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a child context whose deadline is at most `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<Error> {
        if self.token.is_cancelled() {
            return Some(Error::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Error::DeadlineExceeded),
            _ => None,
        }
    }

    /// Completes once the context is canceled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Waits for the context to finish and returns its error.
    pub(crate) async fn wait_err(&self) -> Error {
        self.done().await;
        self.err().unwrap_or(Error::Canceled)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
