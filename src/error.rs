//! Error types for building and dispatching requests.
//!
//! Errors are *sticky*: once a [`Client`](crate::Client), [`Request`](crate::Request)
//! or [`Response`](crate::Response) records an error, every further chained call
//! becomes a no-op and the same error is returned by the terminal call. For that
//! reason [`Error`] is cheap to clone: wrapped foreign errors are held behind an
//! [`Arc`].

use http::StatusCode;
use std::error::Error as StdError;
use std::sync::Arc;

/// The main error type of the crate.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{Client, Error};
///
/// # async fn example() {
/// let client = Client::new();
/// match client.get("https://api.example.com/users/1").send().await.text().await {
///     Ok(body) => println!("{body}"),
///     Err(Error::BadStatus(status)) => eprintln!("unexpected status {status}"),
///     Err(Error::Network(e)) => eprintln!("network failure: {e}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The client could not be configured.
    ///
    /// `cause` names the builder setter that failed.
    #[error("client [{cause}]: {source}")]
    Client {
        /// The setter that raised the error.
        cause: &'static str,
        /// The underlying error.
        source: Box<Error>,
    },

    /// The request could not be built.
    ///
    /// `cause` names the request setter that failed.
    #[error("request [{cause}]: {source}")]
    Request {
        /// The setter that raised the error.
        cause: &'static str,
        /// The underlying error.
        source: Box<Error>,
    },

    /// A transport option was set on a client built from a caller supplied
    /// `reqwest::Client`, which cannot be reconfigured.
    #[error("current transport is a pre-built reqwest::Client and cannot be reconfigured")]
    UnexpectedTransport,

    /// A context setter received `None`.
    #[error("nil context")]
    NilContext,

    /// The client has no cookie jar.
    #[error("nil cookie jar")]
    NilCookieJar,

    /// The cookie jar holds no cookies for the given URL.
    #[error("cookies for the given URL not present")]
    JarCookiesNotPresent,

    /// The cookie jar holds no cookie with the given name for the given URL.
    #[error("named cookie for the given URL not present")]
    JarNamedCookieNotPresent,

    /// The response carries no cookies.
    #[error("cookies not present")]
    ResponseCookiesNotPresent,

    /// The response carries no cookie with the given name.
    #[error("named cookie not present")]
    ResponseNamedCookieNotPresent,

    /// The retry policy's maximum duration would be exceeded by another attempt.
    #[error("retry max duration exceeded")]
    RetryMaxDurationExceeded,

    /// The HTTP method is not a valid token.
    #[error("invalid method: {0:?}")]
    InvalidMethod(String),

    /// An invalid URL was provided.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A header name or value is invalid.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A multipart file part has no filename.
    #[error("filename of [{0}] not specified")]
    MissingFilename(String),

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("network error: {0}")]
    Network(#[source] Arc<reqwest::Error>),

    /// The transport timed out.
    #[error("request timed out")]
    Timeout,

    /// The request context was canceled.
    #[error("context canceled")]
    Canceled,

    /// The request context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A status assertion failed.
    #[error("bad status: {0}")]
    BadStatus(StatusCode),

    /// Failed to serialize the request body.
    #[error("failed to serialize request: {0}")]
    SerializationFailed(String),

    /// Failed to deserialize the response body into the expected type.
    ///
    /// The raw body is kept so it can be logged or inspected.
    #[error("failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The decoder error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A local I/O operation failed (reading a part body, writing a file, ...).
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// The response body could not be decompressed.
    #[error("failed to decompress response body: {0}")]
    Decompression(String),

    /// An error raised by caller code, typically an interceptor.
    #[error("{0}")]
    Other(Arc<dyn StdError + Send + Sync + 'static>),
}

impl Error {
    /// Wraps a caller error, e.g. to abort the pipeline from an interceptor.
    pub fn other<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Error::Other(Arc::new(error))
    }

    /// Builds an [`Error::Other`] from a message.
    pub fn msg(message: impl Into<String>) -> Self {
        let boxed: Box<dyn StdError + Send + Sync> = message.into().into();
        Error::Other(Arc::from(boxed))
    }

    pub(crate) fn client(cause: &'static str, source: Error) -> Self {
        Error::Client {
            cause,
            source: Box::new(source),
        }
    }

    pub(crate) fn request(cause: &'static str, source: Error) -> Self {
        Error::Request {
            cause,
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, looking through client and request wrappers.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::{Error, Request};
    ///
    /// let request = Request::new("GET", "http://example.com").context(None);
    /// let err = request.error().unwrap();
    /// assert!(matches!(err.root_cause(), Error::NilContext));
    /// ```
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::Client { source, .. } | Error::Request { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    /// Returns `true` if this error is potentially retryable.
    ///
    /// Network errors, timeouts, and 5xx/429 status assertion failures are
    /// considered retryable. Build errors and decode failures are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::Error;
    /// use http::StatusCode;
    ///
    /// assert!(Error::BadStatus(StatusCode::BAD_GATEWAY).is_retryable());
    /// assert!(!Error::BadStatus(StatusCode::NOT_FOUND).is_retryable());
    /// assert!(!Error::NilContext.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::Timeout => true,
            Error::BadStatus(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::BadStatus(status) => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(Arc::new(e))
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
