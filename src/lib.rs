//! # chainreq - a fluent HTTP client with sticky errors
//!
//! chainreq wraps `reqwest` in a chainable API. Building a request never fails
//! on the spot: the first invalid setter records an error, every later call
//! becomes a no-op, and the error surfaces once from the terminal call. The
//! same holds for clients and responses.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chainreq::{Client, Json, Params};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> chainreq::Result<()> {
//!     let client = Client::builder()
//!         .user_agent("my-app/1.0")
//!         .bearer_token("secret")
//!         .build();
//!
//!     let user: User = client
//!         .get("https://api.example.com/users/123")
//!         .query(Params::new().with("expand", "profile"))
//!         .send()
//!         .await
//!         .ensure_status_ok()
//!         .json()
//!         .await?;
//!     println!("{} is #{}", user.name, user.id);
//!
//!     let mut created = client
//!         .post("https://api.example.com/users")
//!         .json(&Json::new().with("name", "Alice"))
//!         .send()
//!         .await
//!         .ensure_status_2xx();
//!     println!("{}", created.h().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Sticky errors** - chain freely and check once at the end
//! - **Precedence merge** - request settings override client defaults
//! - **Interceptors** - inspect or veto requests and responses
//! - **Cancellable retries** - backoff strategies raced against a [`Context`]
//! - **Cached bodies** - decode a response as text, JSON, XML or file, any number of times
//! - **Streaming multipart** - file uploads encoded on the fly with MIME sniffing
//! - **Transparent gzip** - `Content-Encoding: gzip` bodies are inflated while reading
//! - **Structured logging** - every attempt is traced with `tracing`
//!
//! ## Error Handling
//!
//! Configuration and build errors are wrapped with the operation that raised
//! them; [`Error::root_cause`] gets to the underlying failure:
//!
//! ```
//! use chainreq::{Error, Request};
//!
//! let req = Request::new("GET", "http://example.com").header("bad\nname", "v");
//! let err = req.error().unwrap();
//! assert!(matches!(err, Error::Request { cause: "header", .. }));
//! assert!(matches!(err.root_cause(), Error::InvalidHeader(_)));
//! ```
//!
//! ## Retries
//!
//! ```no_run
//! use chainreq::retry::{OrCondition, RetryOn5xx, RetryOnRateLimit};
//! use chainreq::{Client, Context, RetryPolicy, RetryStrategy};
//! use std::time::Duration;
//!
//! # async fn example() -> chainreq::Result<()> {
//! let policy = RetryPolicy::new(RetryStrategy::ExponentialBackoff {
//!     attempts: 5,
//!     initial_delay: Duration::from_millis(100),
//!     max_delay: Duration::from_secs(10),
//!     jitter: true,
//! })
//! .condition(OrCondition::new(vec![Box::new(RetryOn5xx), Box::new(RetryOnRateLimit)]))
//! .max_duration(Duration::from_secs(30))
//! .respect_rate_limit(Duration::from_secs(60));
//!
//! let ctx = Context::background().with_timeout(Duration::from_secs(45));
//! let body = Client::new()
//!     .get("https://api.example.com/flaky")
//!     .context(ctx)
//!     .retry(policy)
//!     .send()
//!     .await
//!     .text()
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod codec;
mod context;
mod cookie;
mod error;
mod global;
pub mod multipart;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;
mod values;

pub use client::{
    Client, ClientBuilder, RequestInterceptor, ResponseInterceptor, DEFAULT_TIMEOUT,
    DEFAULT_USER_AGENT,
};
pub use context::Context;
pub use cookie::Cookie;
pub use error::{Error, Result};
pub use global::{
    default_client, delete, execute, filter_cookie, filter_cookies, get, head, patch, post, put,
    request,
};
pub use multipart::{File, Files};
pub use request::Request;
pub use response::Response;
pub use retry::{RetryCondition, RetryPolicy, RetryStrategy};
pub use values::{canonical_header_key, Form, Headers, Json, KeyValues, Params, Value, Values};
