//! The HTTP client and its dispatch pipeline.
//!
//! A [`Client`] owns a `reqwest` connection pool plus defaults (host, headers,
//! cookies, auth, context, retry policy) and interceptors that apply to every
//! request it sends. Use [`ClientBuilder`] to configure one.

use crate::context::Context;
use crate::cookie::{self, Cookie};
use crate::request::{append_header, Body, Request};
use crate::response::{RequestTrace, Response};
use crate::retry::RetryPolicy;
use crate::values::KeyValues;
use crate::{Error, Result};
use base64::Engine;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, HOST, REFERER, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::redirect;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Default timeout of a single exchange on the transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// `User-Agent` sent when neither the client nor the request sets one.
pub const DEFAULT_USER_AGENT: &str = concat!("chainreq/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 100;

/// Runs on every outgoing request after client defaults are merged in.
///
/// Returning an error aborts the request before any network I/O.
pub trait RequestInterceptor: Send + Sync {
    fn intercept(&self, request: &mut Request) -> Result<()>;
}

impl<F> RequestInterceptor for F
where
    F: Fn(&mut Request) -> Result<()> + Send + Sync,
{
    fn intercept(&self, request: &mut Request) -> Result<()> {
        self(request)
    }
}

/// Runs on every response once the retry loop has finished.
///
/// Returning an error makes it the response's sticky error.
pub trait ResponseInterceptor: Send + Sync {
    fn intercept(&self, response: &mut Response) -> Result<()>;
}

impl<F> ResponseInterceptor for F
where
    F: Fn(&mut Response) -> Result<()> + Send + Sync,
{
    fn intercept(&self, response: &mut Response) -> Result<()> {
        self(response)
    }
}

/// A reusable HTTP client.
///
/// Cloning is cheap and clones share the connection pool and cookie jar.
/// Configuration is fixed once the client is built, so a client can be used
/// from many tasks at once.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{Client, Headers, RetryPolicy, RetryStrategy};
/// use std::time::Duration;
///
/// # async fn example() -> chainreq::Result<()> {
/// let client = Client::builder()
///     .headers(Headers::new().with("Accept", "application/json"))
///     .bearer_token("secret")
///     .retry(RetryStrategy::fixed(3, Duration::from_millis(200)))
///     .request_interceptor(|req: &mut chainreq::Request| -> chainreq::Result<()> {
///         req.header_map_mut().remove("x-debug");
///         Ok(())
///     })
///     .build();
///
/// let user = client
///     .get("https://api.example.com/users/1")
///     .send()
///     .await
///     .ensure_status_ok()
///     .h()
///     .await?;
/// println!("{user}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: Option<reqwest::Client>,
    jar: Option<Arc<Jar>>,
    host: Option<String>,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    basic_auth: Option<(String, String)>,
    bearer_token: Option<String>,
    ctx: Option<Context>,
    retry: Option<RetryPolicy>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    err: Option<Error>,
}

impl Client {
    /// Creates a client with default settings and a fresh cookie jar.
    pub fn new() -> Self {
        ClientBuilder::new().build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the configuration error recorded while building, if any.
    pub fn error(&self) -> Option<&Error> {
        self.inner.err.as_ref()
    }

    /// Returns the underlying `reqwest::Client`.
    pub fn raw(&self) -> Result<&reqwest::Client> {
        if let Some(err) = &self.inner.err {
            return Err(err.clone());
        }
        self.inner
            .http
            .as_ref()
            .ok_or_else(|| Error::client("raw", Error::UnexpectedTransport))
    }

    /// Starts a request with an arbitrary method, bound to this client.
    pub fn request(&self, method: impl AsRef<str>, url: impl AsRef<str>) -> Request {
        Request::new(method, url).bind(self.clone())
    }

    pub fn get(&self, url: impl AsRef<str>) -> Request {
        self.request(Method::GET, url)
    }

    pub fn head(&self, url: impl AsRef<str>) -> Request {
        self.request(Method::HEAD, url)
    }

    pub fn post(&self, url: impl AsRef<str>) -> Request {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: impl AsRef<str>) -> Request {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: impl AsRef<str>) -> Request {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: impl AsRef<str>) -> Request {
        self.request(Method::DELETE, url)
    }

    /// Returns the cookies the jar would send to `url`.
    pub fn filter_cookies(&self, url: &str) -> Result<Vec<Cookie>> {
        if let Some(err) = &self.inner.err {
            return Err(err.clone());
        }
        let jar = self.inner.jar.as_ref().ok_or(Error::NilCookieJar)?;
        let url = Url::parse(url)?;
        let cookies = jar
            .cookies(&url)
            .and_then(|value| value.to_str().ok().map(cookie::parse_header))
            .unwrap_or_default();
        if cookies.is_empty() {
            return Err(Error::JarCookiesNotPresent);
        }
        Ok(cookies)
    }

    /// Returns the cookie named `name` the jar would send to `url`.
    pub fn filter_cookie(&self, url: &str, name: &str) -> Result<Cookie> {
        self.filter_cookies(url)?
            .into_iter()
            .find(|c| c.name == name)
            .ok_or(Error::JarNamedCookieNotPresent)
    }

    /// Sends `req` through the pipeline and returns its response.
    ///
    /// Errors never escape as `Err`; they are carried by the returned
    /// [`Response`] and surface from its terminal methods.
    pub async fn execute(&self, mut req: Request) -> Response {
        if let Some(err) = &self.inner.err {
            return Response::from_error(err.clone());
        }
        if let Some(err) = req.err.take() {
            return Response::from_error(err);
        }

        self.merge(&mut req);

        for interceptor in &self.inner.request_interceptors {
            if let Err(err) = interceptor.intercept(&mut req) {
                tracing::debug!(error = %err, "request interceptor aborted the request");
                return Response::from_error(err);
            }
        }
        if let Some(err) = req.err.take() {
            return Response::from_error(err);
        }

        let mut resp = self.dispatch(req).await;

        for interceptor in &self.inner.response_interceptors {
            if let Err(err) = interceptor.intercept(&mut resp) {
                tracing::debug!(error = %err, "response interceptor rejected the response");
                resp.fail(err);
                break;
            }
        }
        resp
    }

    /// Layers client defaults under the request's own settings.
    fn merge(&self, req: &mut Request) {
        let inner = &self.inner;

        if req.host.is_none() {
            req.host = inner.host.clone();
        }

        let mut headers = inner.headers.clone();
        for name in req.headers.keys() {
            headers.remove(name);
        }
        for (name, value) in &req.headers {
            headers.append(name.clone(), value.clone());
        }
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        }
        req.headers = headers;

        let mut cookies = inner.cookies.clone();
        cookies.append(&mut req.cookies);
        req.cookies = cookies;

        if req.basic_auth.is_none() {
            req.basic_auth = inner.basic_auth.clone();
        }
        if req.bearer_token.is_none() {
            req.bearer_token = inner.bearer_token.clone();
        }
        if req.ctx.is_none() {
            req.ctx = inner.ctx.clone();
        }
        if req.retry.is_none() {
            req.retry = inner.retry.clone();
        }
    }

    async fn dispatch(&self, mut req: Request) -> Response {
        let http = match self.raw() {
            Ok(http) => http,
            Err(err) => return Response::from_error(err),
        };
        let Some(url) = req.url.take() else {
            return Response::from_error(Error::request("new", Error::msg("missing URL")));
        };
        let headers = match outbound_headers(&req) {
            Ok(headers) => headers,
            Err(err) => return Response::from_error(Error::request("headers", err)),
        };

        let mut ctx = req.ctx.take().unwrap_or_default();
        if let Some(timeout) = req.timeout {
            ctx = ctx.with_timeout(timeout);
        }
        let policy = req.retry.take().unwrap_or_default();

        let mut encoder_err = None;
        let builder = http.request(req.method.clone(), url);
        let (template, sent) = match std::mem::take(&mut req.body) {
            Body::Empty => (builder.headers(headers).build(), None),
            Body::Bytes(bytes) => {
                let built = builder.headers(headers).body(bytes.clone()).build();
                (built, Some(bytes))
            }
            Body::Multipart(multipart) => {
                ctx = ctx.with_cancel();
                match multipart.into_form(ctx.clone()).await {
                    Ok((form, err_rx)) => {
                        encoder_err = Some(err_rx);
                        let mut headers = headers;
                        headers.remove(CONTENT_TYPE);
                        (builder.headers(headers).multipart(form).build(), None)
                    }
                    Err(err) => return Response::from_error(Error::request("multipart", err)),
                }
            }
        };
        let template = match template {
            Ok(template) => template,
            Err(err) => return Response::from_error(Error::from(err)),
        };
        let streaming = encoder_err.is_some();
        let explicit_cookies = template.headers().get(COOKIE).cloned();

        let trace = RequestTrace {
            method: template.method().clone(),
            url: template.url().clone(),
            headers: template.headers().clone(),
            body: sent,
        };
        let mut template = Some(template);

        let start = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outbound = if streaming {
                template.take()
            } else {
                template.as_ref().and_then(reqwest::Request::try_clone)
            };
            let Some(mut outbound) = outbound else {
                return Response::from_error(Error::msg("request body cannot be replayed"));
            };
            // reqwest skips the jar when a Cookie header is present
            if let (Some(jar), Some(explicit)) = (&self.inner.jar, &explicit_cookies) {
                if let Some(merged) = merge_jar_cookies(jar, outbound.url(), explicit) {
                    outbound.headers_mut().insert(COOKIE, merged);
                }
            }

            tracing::debug!(
                method = %trace.method,
                url = %trace.url,
                attempt = attempt,
                "Executing HTTP request"
            );

            let result = tokio::select! {
                biased;
                err = ctx.wait_err() => Err(err),
                result = http.execute(outbound) => result.map_err(Error::from),
            };

            let mut resp = match result {
                Ok(raw) => Response::from_raw(raw, Some(trace.clone())),
                Err(err) => Response::from_error(err),
            };
            resp.attempts = attempt;
            resp.latency = start.elapsed();

            if let Some(ctx_err) = ctx.err() {
                let err = encoder_err
                    .as_mut()
                    .and_then(|rx| rx.try_recv().ok())
                    .unwrap_or(ctx_err);
                tracing::warn!(error = %err, attempt = attempt, "Request canceled");
                resp.fail(err);
                return resp;
            }

            match (resp.status(), resp.error()) {
                (Some(status), _) => tracing::info!(
                    status = status.as_u16(),
                    latency_ms = resp.latency.as_millis(),
                    attempt = attempt,
                    "Received HTTP response"
                ),
                (None, Some(err)) => tracing::warn!(
                    error = %err,
                    attempt = attempt,
                    "Request failed"
                ),
                (None, None) => {}
            }

            if streaming || !policy.should_retry(&resp) {
                return resp;
            }
            let Some(delay) = policy.next_delay(attempt, &resp) else {
                return resp;
            };
            if let Some(max) = policy.max_duration_limit() {
                if start.elapsed() + delay > max {
                    tracing::warn!(attempt = attempt, "Retry max duration exceeded");
                    resp.fail(Error::RetryMaxDurationExceeded);
                    return resp;
                }
            }

            tracing::warn!(
                delay_ms = delay.as_millis(),
                attempt = attempt,
                "Retrying request after delay"
            );
            tokio::select! {
                biased;
                err = ctx.wait_err() => {
                    resp.fail(err);
                    return resp;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.inner.host)
            .field("headers", &self.inner.headers)
            .field("cookies", &self.inner.cookies)
            .field("retry", &self.inner.retry)
            .field("has_jar", &self.inner.jar.is_some())
            .field("err", &self.inner.err)
            .finish_non_exhaustive()
    }
}

/// Builds the final header map: host override, cookies, then authorization.
fn outbound_headers(req: &Request) -> Result<HeaderMap> {
    let mut headers = req.headers.clone();

    if let Some(host) = &req.host {
        headers.insert(HOST, header_value(host)?);
    }

    if !req.cookies.is_empty() {
        let mut value = cookie::to_header(&req.cookies);
        if let Some(existing) = headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            value = format!("{existing}; {value}");
        }
        headers.insert(COOKIE, header_value(&value)?);
    }

    if let Some((username, password)) = &req.basic_auth {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        headers.insert(AUTHORIZATION, header_value(&format!("Basic {credentials}"))?);
    }
    if let Some(token) = &req.bearer_token {
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
    }

    Ok(headers)
}

/// Prepends the jar's cookies for `url` to an explicit `Cookie` header.
fn merge_jar_cookies(jar: &Jar, url: &Url, explicit: &HeaderValue) -> Option<HeaderValue> {
    let stored = jar.cookies(url)?;
    let mut value = stored.as_bytes().to_vec();
    value.extend_from_slice(b"; ");
    value.extend_from_slice(explicit.as_bytes());
    HeaderValue::from_bytes(&value).ok()
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(e.to_string()))
}

enum Transport {
    Configured(TransportConfig),
    Prebuilt(reqwest::Client),
}

struct TransportConfig {
    timeout: Duration,
    redirect: Option<redirect::Policy>,
    proxies: Vec<reqwest::Proxy>,
    no_proxy: bool,
    root_certificates: Vec<reqwest::Certificate>,
    identity: Option<reqwest::Identity>,
    accept_invalid_certs: bool,
}

impl TransportConfig {
    fn build(self, jar: Option<Arc<Jar>>) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_keepalive(TCP_KEEPALIVE)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .danger_accept_invalid_certs(self.accept_invalid_certs);

        if let Some(policy) = self.redirect {
            builder = builder.redirect(policy);
        }
        if self.no_proxy {
            builder = builder.no_proxy();
        }
        for proxy in self.proxies {
            builder = builder.proxy(proxy);
        }
        for cert in self.root_certificates {
            builder = builder.add_root_certificate(cert);
        }
        if let Some(identity) = self.identity {
            builder = builder.identity(identity);
        }
        if let Some(jar) = jar {
            builder = builder.cookie_provider(jar);
        }

        Ok(builder.build()?)
    }
}

/// Builder for a [`Client`].
///
/// Setters never fail immediately. The first invalid setting is recorded as a
/// configuration error ([`Error::Client`]); later setters are ignored, and the
/// built client returns that error from every request.
///
/// # Examples
///
/// ```
/// use chainreq::{ClientBuilder, Error};
///
/// let client = ClientBuilder::new()
///     .transport(reqwest::Client::new())
///     .proxy_url("http://127.0.0.1:8080")
///     .build();
/// assert!(matches!(
///     client.error().unwrap().root_cause(),
///     Error::UnexpectedTransport
/// ));
/// ```
pub struct ClientBuilder {
    transport: Transport,
    jar: Option<Arc<Jar>>,
    host: Option<String>,
    headers: HeaderMap,
    cookies: Vec<Cookie>,
    basic_auth: Option<(String, String)>,
    bearer_token: Option<String>,
    ctx: Option<Context>,
    retry: Option<RetryPolicy>,
    request_interceptors: Vec<Arc<dyn RequestInterceptor>>,
    response_interceptors: Vec<Arc<dyn ResponseInterceptor>>,
    err: Option<Error>,
}

impl ClientBuilder {
    /// Creates a builder with default transport settings and a fresh cookie jar.
    pub fn new() -> Self {
        Self {
            transport: Transport::Configured(TransportConfig {
                timeout: DEFAULT_TIMEOUT,
                redirect: None,
                proxies: Vec::new(),
                no_proxy: false,
                root_certificates: Vec::new(),
                identity: None,
                accept_invalid_certs: false,
            }),
            jar: Some(Arc::new(Jar::default())),
            host: None,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            basic_auth: None,
            bearer_token: None,
            ctx: None,
            retry: None,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            err: None,
        }
    }

    fn fail(mut self, cause: &'static str, err: Error) -> Self {
        if self.err.is_none() {
            self.err = Some(Error::client(cause, err));
        }
        self
    }

    /// Applies `f` to the transport settings, or fails if the transport was
    /// supplied pre-built.
    fn configure(
        mut self,
        cause: &'static str,
        f: impl FnOnce(&mut TransportConfig),
    ) -> Self {
        if self.err.is_some() {
            return self;
        }
        if let Transport::Prebuilt(_) = self.transport {
            return self.fail(cause, Error::UnexpectedTransport);
        }
        if let Transport::Configured(config) = &mut self.transport {
            f(config);
        }
        self
    }

    /// Uses a pre-built `reqwest::Client` as the transport.
    ///
    /// The client's own settings are used as-is: transport setters called
    /// afterwards fail with [`Error::UnexpectedTransport`], and the cookie jar
    /// helpers report [`Error::NilCookieJar`].
    pub fn transport(mut self, client: reqwest::Client) -> Self {
        if self.err.is_none() {
            self.transport = Transport::Prebuilt(client);
            self.jar = None;
        }
        self
    }

    /// Sets the redirect policy.
    pub fn redirect(self, policy: redirect::Policy) -> Self {
        self.configure("redirect", |c| c.redirect = Some(policy))
    }

    pub fn disable_redirect(self) -> Self {
        self.redirect(redirect::Policy::none())
    }

    /// Replaces the cookie jar, e.g. to share one jar between clients.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        if self.err.is_some() {
            return self;
        }
        if let Transport::Prebuilt(_) = self.transport {
            return self.fail("cookie_jar", Error::UnexpectedTransport);
        }
        self.jar = Some(jar);
        self
    }

    /// Removes the cookie jar; cookies are no longer kept between requests.
    pub fn disable_session(mut self) -> Self {
        if self.err.is_some() {
            return self;
        }
        if let Transport::Prebuilt(_) = self.transport {
            return self.fail("disable_session", Error::UnexpectedTransport);
        }
        self.jar = None;
        self
    }

    /// Sets the timeout of a single exchange on the transport.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.configure("timeout", |c| c.timeout = timeout)
    }

    pub fn proxy(self, proxy: reqwest::Proxy) -> Self {
        self.configure("proxy", |c| c.proxies.push(proxy))
    }

    /// Routes all traffic through the proxy at `url`.
    pub fn proxy_url(self, url: &str) -> Self {
        if self.err.is_some() {
            return self;
        }
        if let Transport::Prebuilt(_) = self.transport {
            return self.fail("proxy_url", Error::UnexpectedTransport);
        }
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return self.fail("proxy_url", Error::InvalidUrl(e)),
        };
        match reqwest::Proxy::all(parsed) {
            Ok(proxy) => self.proxy(proxy),
            Err(e) => self.fail("proxy_url", Error::from(e)),
        }
    }

    /// Ignores system proxy settings.
    pub fn disable_proxy(self) -> Self {
        self.configure("disable_proxy", |c| c.no_proxy = true)
    }

    /// Trusts the PEM encoded certificate(s) in the file at `path`.
    pub fn add_root_certificate_pem(self, path: impl AsRef<Path>) -> Self {
        if self.err.is_some() {
            return self;
        }
        let cert = std::fs::read(path.as_ref())
            .map_err(Error::from)
            .and_then(|pem| reqwest::Certificate::from_pem(&pem).map_err(Error::from));
        match cert {
            Ok(cert) => self.configure("add_root_certificate_pem", |c| c.root_certificates.push(cert)),
            Err(e) => self.fail("add_root_certificate_pem", e),
        }
    }

    /// Presents the PEM encoded private key and certificate chain in the file
    /// at `path` as the client identity.
    pub fn identity_pem(self, path: impl AsRef<Path>) -> Self {
        if self.err.is_some() {
            return self;
        }
        let identity = std::fs::read(path.as_ref())
            .map_err(Error::from)
            .and_then(|pem| reqwest::Identity::from_pem(&pem).map_err(Error::from));
        match identity {
            Ok(identity) => self.configure("identity_pem", |c| c.identity = Some(identity)),
            Err(e) => self.fail("identity_pem", e),
        }
    }

    /// Accepts any server certificate. Only for testing.
    pub fn disable_verify(self) -> Self {
        self.configure("disable_verify", |c| c.accept_invalid_certs = true)
    }

    /// Sets the default `Host` header.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        if self.err.is_none() {
            self.host = Some(host.into());
        }
        self
    }

    /// Appends default headers. Per request, any header name the request sets
    /// itself replaces all of the client's values for that name.
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

    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if self.err.is_some() {
            return self;
        }
        match append_header(&mut self.headers, name.as_ref(), value.as_ref()) {
            Ok(()) => self,
            Err(e) => self.fail("header", e),
        }
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

    /// Adds cookies sent with every request, before the request's own cookies.
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

    /// Sets the default cancellation context. Passing `None` is a
    /// configuration error.
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

    /// Sets the default retry policy.
    pub fn retry(mut self, policy: impl Into<RetryPolicy>) -> Self {
        if self.err.is_none() {
            self.retry = Some(policy.into());
        }
        self
    }

    /// Appends a request interceptor. Interceptors run in the order added.
    pub fn request_interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        if self.err.is_none() {
            self.request_interceptors.push(Arc::new(interceptor));
        }
        self
    }

    /// Appends a response interceptor. Interceptors run in the order added.
    pub fn response_interceptor(mut self, interceptor: impl ResponseInterceptor + 'static) -> Self {
        if self.err.is_none() {
            self.response_interceptors.push(Arc::new(interceptor));
        }
        self
    }

    /// Builds the client. A configuration error is kept on the client rather
    /// than returned.
    pub fn build(self) -> Client {
        let mut err = self.err;
        let http = match (err.is_some(), self.transport) {
            (true, _) => None,
            (false, Transport::Prebuilt(client)) => Some(client),
            (false, Transport::Configured(config)) => match config.build(self.jar.clone()) {
                Ok(client) => Some(client),
                Err(e) => {
                    err = Some(Error::client("build", e));
                    None
                }
            },
        };

        Client {
            inner: Arc::new(ClientInner {
                http,
                jar: self.jar,
                host: self.host,
                headers: self.headers,
                cookies: self.cookies,
                basic_auth: self.basic_auth,
                bearer_token: self.bearer_token,
                ctx: self.ctx,
                retry: self.retry,
                request_interceptors: self.request_interceptors,
                response_interceptors: self.response_interceptors,
                err,
            }),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
