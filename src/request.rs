//! The fluent request builder.
//!
//! A [`Request`] accumulates everything needed to describe one HTTP exchange.
//! Invalid input never panics: the first failing setter records a sticky
//! [`Error::Request`], every later setter becomes a no-op, and the error is
//! handed back unchanged by [`Request::send`].

use crate::codec;
use crate::context::Context;
use crate::cookie::Cookie;
use crate::multipart::{Files, Multipart};
use crate::retry::RetryPolicy;
use crate::values::KeyValues;
use crate::{Client, Error, Response};
use bytes::Bytes;
use http::header::{CONTENT_TYPE, REFERER, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use url::Url;

pub(crate) const CONTENT_TYPE_OCTET: &str = "application/octet-stream";
pub(crate) const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
pub(crate) const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const CONTENT_TYPE_XML: &str = "application/xml";

/// The body of a request.
#[derive(Default)]
pub(crate) enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    Multipart(Multipart),
}

/// An HTTP request under construction.
///
/// Requests are usually created through the verb methods of a [`Client`],
/// which bind the request to that client so [`Request::send`] dispatches
/// through it.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{Client, Headers, Params};
/// use std::time::Duration;
///
/// # async fn example() -> chainreq::Result<()> {
/// let client = Client::new();
/// let body = client
///     .get("https://httpbin.org/get")
///     .query(Params::new().with("q", "rust").with("page", 2))
///     .headers(Headers::new().with("Accept", "application/json"))
///     .bearer_token("secret")
///     .timeout(Duration::from_secs(5))
///     .send()
///     .await
///     .text()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Request {
    pub(crate) method: Method,
    pub(crate) url: Option<Url>,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: Vec<Cookie>,
    pub(crate) body: Body,
    pub(crate) host: Option<String>,
    pub(crate) basic_auth: Option<(String, String)>,
    pub(crate) bearer_token: Option<String>,
    pub(crate) ctx: Option<Context>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) err: Option<Error>,
    pub(crate) client: Option<Client>,
}

impl Request {
    /// Creates a request, validating `method` and `url` immediately.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::{Error, Request};
    ///
    /// let req = Request::new("GET", "not a url");
    /// assert!(matches!(req.error().unwrap().root_cause(), Error::InvalidUrl(_)));
    /// ```
    pub fn new(method: impl AsRef<str>, url: impl AsRef<str>) -> Self {
        let mut req = Self {
            method: Method::GET,
            url: None,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            body: Body::Empty,
            host: None,
            basic_auth: None,
            bearer_token: None,
            ctx: None,
            timeout: None,
            retry: None,
            err: None,
            client: None,
        };

        let method = method.as_ref();
        match Method::from_bytes(method.as_bytes()) {
            Ok(m) => req.method = m,
            Err(_) => return req.fail("new", Error::InvalidMethod(method.to_string())),
        }
        match Url::parse(url.as_ref()) {
            Ok(u) => req.url = Some(u),
            Err(e) => return req.fail("new", Error::InvalidUrl(e)),
        }
        req
    }

    pub(crate) fn bind(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    fn fail(mut self, cause: &'static str, err: Error) -> Self {
        if self.err.is_none() {
            self.err = Some(Error::request(cause, err));
        }
        self
    }

    /// Sets a raw body without touching `Content-Type`.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        if self.err.is_none() {
            self.body = Body::Bytes(body.into());
        }
        self
    }

    /// Overrides the `Host` header sent to the server.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        if self.err.is_none() {
            self.host = Some(host.into());
        }
        self
    }

    /// Appends every value of every key; existing values are kept.
    pub fn headers(mut self, headers: impl KeyValues) -> Self {
        if self.err.is_some() {
            return self;
        }
        for key in headers.keys() {
            for value in headers.get(&key) {
                if let Err(e) = append_header(&mut self.headers, &key, &value) {
                    return self.fail("headers", e);
                }
            }
        }
        self
    }

    /// Appends a single header value.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if self.err.is_some() {
            return self;
        }
        match append_header(&mut self.headers, name.as_ref(), value.as_ref()) {
            Ok(()) => self,
            Err(e) => self.fail("header", e),
        }
    }

    pub fn content_type(self, content_type: impl AsRef<str>) -> Self {
        self.replace_header(CONTENT_TYPE, content_type.as_ref(), "content_type")
    }

    pub fn user_agent(self, user_agent: impl AsRef<str>) -> Self {
        self.replace_header(USER_AGENT, user_agent.as_ref(), "user_agent")
    }

    pub fn referer(self, referer: impl AsRef<str>) -> Self {
        self.replace_header(REFERER, referer.as_ref(), "referer")
    }

    fn replace_header(mut self, name: HeaderName, value: &str, cause: &'static str) -> Self {
        if self.err.is_some() {
            return self;
        }
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.headers.insert(name, v);
                self
            }
            Err(e) => self.fail(cause, Error::InvalidHeader(format!("{name}: {e}"))),
        }
    }

    /// Appends query parameters in ascending key order.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::{Params, Request};
    ///
    /// let req = Request::new("GET", "http://example.com/search?lang=en")
    ///     .query(Params::new().with("q", "a b").with("ids", vec![1, 2]));
    /// assert_eq!(
    ///     req.url().unwrap().as_str(),
    ///     "http://example.com/search?lang=en&ids=1&ids=2&q=a+b"
    /// );
    /// ```
    pub fn query(mut self, params: impl KeyValues) -> Self {
        if self.err.is_some() {
            return self;
        }
        let projected: Vec<(String, String)> = params
            .keys()
            .into_iter()
            .flat_map(|key| {
                params
                    .get(&key)
                    .into_iter()
                    .map(move |value| (key.clone(), value))
            })
            .collect();
        // opening the serializer on a bare URL would leave a trailing `?`
        if projected.is_empty() {
            return self;
        }
        if let Some(url) = self.url.as_mut() {
            url.query_pairs_mut().extend_pairs(projected);
        }
        self
    }

    /// Sets a binary body as `application/octet-stream`.
    pub fn content(self, content: impl Into<Bytes>) -> Self {
        self.typed_body(content.into(), CONTENT_TYPE_OCTET)
    }

    /// Sets a plain text body.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.typed_body(Bytes::from(text.into()), CONTENT_TYPE_TEXT)
    }

    /// Sets a URL-encoded form body, keys in ascending order.
    pub fn form(self, form: impl KeyValues) -> Self {
        if self.err.is_some() {
            return self;
        }
        let mut encoder = url::form_urlencoded::Serializer::new(String::new());
        for key in form.keys() {
            for value in form.get(&key) {
                encoder.append_pair(&key, &value);
            }
        }
        self.typed_body(Bytes::from(encoder.finish()), CONTENT_TYPE_FORM)
    }

    /// Sets a JSON body. `<`, `>` and `&` are written as-is.
    pub fn json<T: Serialize + ?Sized>(self, data: &T) -> Self {
        self.encode_json(data, false)
    }

    /// Sets a JSON body with `<`, `>`, `&`, U+2028 and U+2029 escaped, safe
    /// to embed in HTML.
    pub fn json_with_html_escape<T: Serialize + ?Sized>(self, data: &T) -> Self {
        self.encode_json(data, true)
    }

    fn encode_json<T: Serialize + ?Sized>(self, data: &T, escape_html: bool) -> Self {
        if self.err.is_some() {
            return self;
        }
        match codec::to_json_vec(data, escape_html) {
            Ok(buf) => self.typed_body(Bytes::from(buf), CONTENT_TYPE_JSON),
            Err(e) => self.fail("json", e),
        }
    }

    /// Sets an XML body.
    pub fn xml<T: Serialize>(self, data: &T) -> Self {
        if self.err.is_some() {
            return self;
        }
        match codec::to_xml(data) {
            Ok(xml) => self.typed_body(Bytes::from(xml), CONTENT_TYPE_XML),
            Err(e) => self.fail("xml", e),
        }
    }

    /// Sets a streaming `multipart/form-data` body.
    ///
    /// Every file part must have a filename. Parts are read only when the
    /// request is sent.
    pub fn multipart(mut self, files: Files, form: impl KeyValues) -> Self {
        if self.err.is_some() {
            return self;
        }
        match Multipart::new(files, &form) {
            Ok(multipart) => {
                // set with its boundary when the form is assembled
                self.headers.remove(CONTENT_TYPE);
                self.body = Body::Multipart(multipart);
                self
            }
            Err(e) => self.fail("multipart", e),
        }
    }

    fn typed_body(mut self, body: Bytes, content_type: &'static str) -> Self {
        if self.err.is_none() {
            self.body = Body::Bytes(body);
            self.headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        self
    }

    pub fn cookie(mut self, cookie: Cookie) -> Self {
        if self.err.is_none() {
            self.cookies.push(cookie);
        }
        self
    }

    pub fn cookies(mut self, cookies: impl IntoIterator<Item = Cookie>) -> Self {
        if self.err.is_none() {
            self.cookies.extend(cookies);
        }
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        if self.err.is_none() {
            self.basic_auth = Some((username.into(), password.into()));
        }
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        if self.err.is_none() {
            self.bearer_token = Some(token.into());
        }
        self
    }

    /// Attaches a cancellation context. Passing `None` is a build error.
    pub fn context(mut self, ctx: impl Into<Option<Context>>) -> Self {
        if self.err.is_some() {
            return self;
        }
        match ctx.into() {
            Some(ctx) => {
                self.ctx = Some(ctx);
                self
            }
            None => self.fail("context", Error::NilContext),
        }
    }

    /// Bounds the whole exchange, retries included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        if self.err.is_none() {
            self.timeout = Some(timeout);
        }
        self
    }

    /// Overrides the client's retry policy for this request.
    pub fn retry(mut self, policy: impl Into<RetryPolicy>) -> Self {
        if self.err.is_none() {
            self.retry = Some(policy.into());
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_map_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn cookie_list(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Returns the body if it is held in memory.
    pub fn body_bytes(&self) -> Option<&Bytes> {
        match &self.body {
            Body::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the sticky build error, if any.
    pub fn error(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Dispatches the request through its client, or the default client.
    pub async fn send(mut self) -> Response {
        match self.client.take() {
            Some(client) => client.execute(self).await,
            None => crate::global::default_client().execute(self).await,
        }
    }
}

pub(crate) fn append_header(headers: &mut HeaderMap, name: &str, value: &str) -> crate::Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
    let value =
        HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
    headers.append(name, value);
    Ok(())
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("url", &self.url.as_ref().map(Url::as_str))
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("timeout", &self.timeout)
            .field("err", &self.err)
            .finish_non_exhaustive()
    }
}
