//! Package-level helpers backed by a lazily built default [`Client`].
//!
//! Requests created with [`Request::new`] and sent without a client also go
//! through this default client, so they share its connection pool and cookie
//! jar.

use crate::cookie::Cookie;
use crate::{Client, Request, Response, Result};
use http::Method;
use once_cell::sync::Lazy;

static DEFAULT_CLIENT: Lazy<Client> = Lazy::new(Client::new);

/// Returns the process-wide default client.
pub fn default_client() -> &'static Client {
    &DEFAULT_CLIENT
}

pub fn request(method: impl AsRef<str>, url: impl AsRef<str>) -> Request {
    default_client().request(method, url)
}

/// Starts a `GET` request on the default client.
///
/// ```no_run
/// # async fn example() -> chainreq::Result<()> {
/// let body = chainreq::get("https://example.com").send().await.text().await?;
/// # Ok(())
/// # }
/// ```
pub fn get(url: impl AsRef<str>) -> Request {
    request(Method::GET, url)
}

pub fn head(url: impl AsRef<str>) -> Request {
    request(Method::HEAD, url)
}

pub fn post(url: impl AsRef<str>) -> Request {
    request(Method::POST, url)
}

pub fn put(url: impl AsRef<str>) -> Request {
    request(Method::PUT, url)
}

pub fn patch(url: impl AsRef<str>) -> Request {
    request(Method::PATCH, url)
}

pub fn delete(url: impl AsRef<str>) -> Request {
    request(Method::DELETE, url)
}

/// Sends `req` through the default client.
pub async fn execute(req: Request) -> Response {
    default_client().execute(req).await
}

/// Cookies the default client's jar would send to `url`.
pub fn filter_cookies(url: &str) -> Result<Vec<Cookie>> {
    default_client().filter_cookies(url)
}

pub fn filter_cookie(url: &str, name: &str) -> Result<Cookie> {
    default_client().filter_cookie(url, name)
}
