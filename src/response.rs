//! The response wrapper.
//!
//! A [`Response`] carries the outcome of one dispatched [`Request`](crate::Request):
//! either the head of an HTTP response with its not-yet-read body, or the
//! sticky error that stopped the pipeline. The body is read from the network at
//! most once; every decode method works on the cached buffer afterwards.

use crate::codec;
use crate::cookie::Cookie;
use crate::values::Json;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use encoding_rs::Encoding;
use flate2::write::GzDecoder;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE, HOST};
use http::{HeaderMap, Method, StatusCode, Version};
use serde::de::DeserializeOwned;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// What was sent, kept for [`Response::verbose`].
#[derive(Debug, Clone)]
pub(crate) struct RequestTrace {
    pub(crate) method: Method,
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

/// The result of dispatching a request.
///
/// Decode methods ([`text`](Response::text), [`json`](Response::json),
/// [`xml`](Response::xml), [`h`](Response::h), [`save`](Response::save)) can be
/// called any number of times in any order; only the first one reads the body.
///
/// # Examples
///
/// ```no_run
/// use chainreq::Client;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Ip {
///     origin: String,
/// }
///
/// # async fn example() -> chainreq::Result<()> {
/// let mut resp = Client::new()
///     .get("https://httpbin.org/ip")
///     .send()
///     .await
///     .ensure_status_ok();
///
/// let text = resp.text().await?;
/// let ip: Ip = resp.json().await?;
/// resp.save("ip.json").await?;
/// println!("{text} {} after {:?}", ip.origin, resp.latency());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Response {
    status: Option<StatusCode>,
    version: Option<Version>,
    headers: HeaderMap,
    url: Option<Url>,
    cookies: Vec<Cookie>,
    raw: Option<reqwest::Response>,
    gzip: bool,
    body: Option<Bytes>,
    err: Option<Error>,
    trace: Option<RequestTrace>,
    pub(crate) attempts: usize,
    pub(crate) latency: Duration,
}

impl Response {
    /// A response that never reached the network.
    pub(crate) fn from_error(err: Error) -> Self {
        Self {
            status: None,
            version: None,
            headers: HeaderMap::new(),
            url: None,
            cookies: Vec::new(),
            raw: None,
            gzip: false,
            body: None,
            err: Some(err),
            trace: None,
            attempts: 0,
            latency: Duration::ZERO,
        }
    }

    pub(crate) fn from_raw(raw: reqwest::Response, trace: Option<RequestTrace>) -> Self {
        let gzip = raw
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"))
            && raw.content_length() != Some(0);

        Self {
            status: Some(raw.status()),
            version: Some(raw.version()),
            headers: raw.headers().clone(),
            url: Some(raw.url().clone()),
            cookies: raw.cookies().map(Cookie::from).collect(),
            raw: Some(raw),
            gzip,
            body: None,
            err: None,
            trace,
            attempts: 1,
            latency: Duration::ZERO,
        }
    }

    /// Records `err` as the sticky error, replacing any previous one.
    pub(crate) fn fail(&mut self, err: Error) {
        self.err = Some(err);
    }

    /// Returns the HTTP status, or `None` if no response was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the first value of header `name`, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the final URL, after redirects.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Returns how many attempts were made, retries included.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns the time from the first attempt until the final response head arrived.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Returns the sticky error, if any.
    pub fn error(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Converts into `Err` if an error is sticky.
    pub fn into_result(self) -> Result<Self> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Returns the whole body, reading it from the network on first use.
    ///
    /// Gzip-encoded bodies are decompressed. A read or decompression failure
    /// becomes the sticky error.
    pub async fn content(&mut self) -> Result<Bytes> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if let Some(body) = &self.body {
            return Ok(body.clone());
        }

        let result = self.read_body(None).await;
        self.store(result)
    }

    /// Decodes the body as text using the `Content-Type` charset, or UTF-8.
    /// Invalid sequences are replaced.
    pub async fn text(&mut self) -> Result<String> {
        let body = self.content().await?;
        Ok(self.decode_text(&body, None))
    }

    /// Decodes the body as text in the named charset (`"gbk"`, `"latin1"`,
    /// ...). An unknown label falls back to the `Content-Type` charset, then
    /// UTF-8.
    pub async fn text_with_charset(&mut self, charset: &str) -> Result<String> {
        let body = self.content().await?;
        Ok(self.decode_text(&body, Some(charset)))
    }

    fn decode_text(&self, body: &[u8], label: Option<&str>) -> String {
        let encoding = label
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .or_else(|| self.content_type_charset())
            .unwrap_or(encoding_rs::UTF_8);
        let (text, _, _) = encoding.decode(body);
        text.into_owned()
    }

    fn content_type_charset(&self) -> Option<&'static Encoding> {
        let content_type = self
            .headers
            .get(CONTENT_TYPE)?
            .to_str()
            .ok()?
            .parse::<mime::Mime>()
            .ok()?;
        let charset = content_type.get_param(mime::CHARSET)?;
        Encoding::for_label(charset.as_str().as_bytes())
    }

    /// Decodes the body as JSON.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let body = self.content().await?;
        serde_json::from_slice(&body).map_err(|e| self.decode_error(&body, e.to_string()))
    }

    /// Decodes the body as XML.
    pub async fn xml<T: DeserializeOwned>(&mut self) -> Result<T> {
        let body = self.content().await?;
        let text = String::from_utf8_lossy(&body);
        codec::from_xml(&text).map_err(|e| self.decode_error(&body, e))
    }

    /// Decodes the body as a JSON object.
    pub async fn h(&mut self) -> Result<Json> {
        self.json().await
    }

    fn decode_error(&self, body: &[u8], serde_error: String) -> Error {
        tracing::debug!(error = %serde_error, "failed to decode response body");
        Error::DeserializationFailed {
            raw_response: String::from_utf8_lossy(body).into_owned(),
            serde_error,
            status: self.status.unwrap_or_default(),
        }
    }

    /// Fails with [`Error::BadStatus`] unless the status is `code`.
    pub fn ensure_status(self, code: StatusCode) -> Self {
        self.ensure(|status| status == code)
    }

    /// Fails with [`Error::BadStatus`] unless the status is `200 OK`.
    pub fn ensure_status_ok(self) -> Self {
        self.ensure_status(StatusCode::OK)
    }

    /// Fails with [`Error::BadStatus`] unless the status is in `200..=299`.
    pub fn ensure_status_2xx(self) -> Self {
        self.ensure(|status| status.is_success())
    }

    fn ensure(mut self, check: impl FnOnce(StatusCode) -> bool) -> Self {
        if self.err.is_some() {
            return self;
        }
        if let Some(status) = self.status {
            if !check(status) {
                self.err = Some(Error::BadStatus(status));
            }
        }
        self
    }

    /// Returns the cookies set by the response.
    pub fn cookies(&self) -> Result<&[Cookie]> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if self.cookies.is_empty() {
            return Err(Error::ResponseCookiesNotPresent);
        }
        Ok(&self.cookies)
    }

    /// Returns the cookie named `name` set by the response.
    pub fn cookie(&self, name: &str) -> Result<&Cookie> {
        self.cookies()?
            .iter()
            .find(|c| c.name == name)
            .ok_or(Error::ResponseNamedCookieNotPresent)
    }

    /// Writes the body to the file at `path`.
    ///
    /// An unread body is streamed to the file and cached on the way, so later
    /// decodes do not read the network again.
    pub async fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }

        let mut file = tokio::fs::File::create(path.as_ref()).await?;
        if let Some(body) = self.body.clone() {
            file.write_all(&body).await?;
        } else {
            let result = self.read_body(Some(&mut file)).await;
            self.store(result)?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Writes a curl-style trace of the request and response to `w`.
    ///
    /// The body is materialized through the cache, so it remains available to
    /// later decode calls.
    pub async fn verbose<W: Write>(&mut self, w: &mut W) -> Result<()> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let body = self.content().await?;
        self.write_trace(w, &body).map_err(Error::from)
    }

    fn write_trace<W: Write>(&self, w: &mut W, body: &[u8]) -> io::Result<()> {
        let proto = format!("{:?}", self.version.unwrap_or_default());

        if let Some(trace) = &self.trace {
            let mut target = trace.url.path().to_string();
            if let Some(query) = trace.url.query() {
                target.push('?');
                target.push_str(query);
            }
            write!(w, "> {} {} {}\r\n", trace.method, target, proto)?;
            let host = match trace.headers.get(HOST).and_then(|v| v.to_str().ok()) {
                Some(host) => host.to_string(),
                None => host_port(&trace.url),
            };
            write!(w, "> Host: {host}\r\n")?;
            for (name, value) in trace.headers.iter().filter(|(name, _)| **name != HOST) {
                write!(w, "> {}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()))?;
            }
            write!(w, ">\r\n")?;
            if let Some(sent) = trace.body.as_ref().filter(|b| !b.is_empty()) {
                w.write_all(sent)?;
                write!(w, "\r\n")?;
            }
        }

        if let Some(status) = self.status {
            write!(w, "< {proto} {status}\r\n")?;
        }
        for (name, value) in &self.headers {
            write!(w, "< {}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()))?;
        }
        write!(w, "<\r\n")?;
        if !body.is_empty() {
            w.write_all(body)?;
            write!(w, "\r\n")?;
        }
        Ok(())
    }

    fn store(&mut self, result: Result<Bytes>) -> Result<Bytes> {
        match result {
            Ok(body) => {
                self.body = Some(body.clone());
                Ok(body)
            }
            Err(err) => {
                self.err = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Reads the live body to the end, decompressing and optionally copying
    /// each decoded chunk to `sink`.
    async fn read_body(&mut self, mut sink: Option<&mut tokio::fs::File>) -> Result<Bytes> {
        let Some(mut raw) = self.raw.take() else {
            return Ok(Bytes::new());
        };

        let mut inflater = Inflater::new(self.gzip);
        let mut buf = BytesMut::new();
        while let Some(chunk) = raw.chunk().await? {
            let decoded = inflater.push(&chunk)?;
            if let Some(file) = sink.as_deref_mut() {
                file.write_all(&decoded).await?;
            }
            buf.extend_from_slice(&decoded);
        }

        let tail = inflater.finish()?;
        if let Some(file) = sink.as_deref_mut() {
            file.write_all(&tail).await?;
        }
        buf.extend_from_slice(&tail);
        Ok(buf.freeze())
    }
}

/// Incremental gzip decoding, or a pass-through for identity bodies.
enum Inflater {
    Identity,
    Gzip { decoder: GzDecoder<Vec<u8>>, seen: bool },
}

impl Inflater {
    fn new(gzip: bool) -> Self {
        if gzip {
            Inflater::Gzip {
                decoder: GzDecoder::new(Vec::new()),
                seen: false,
            }
        } else {
            Inflater::Identity
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Result<Vec<u8>> {
        match self {
            Inflater::Identity => Ok(chunk.to_vec()),
            Inflater::Gzip { decoder, seen } => {
                *seen |= !chunk.is_empty();
                decoder.write_all(chunk).map_err(decompression)?;
                Ok(std::mem::take(decoder.get_mut()))
            }
        }
    }

    /// Flushes the decoder. An empty gzip body decodes to an empty body.
    fn finish(self) -> Result<Vec<u8>> {
        match self {
            Inflater::Identity => Ok(Vec::new()),
            Inflater::Gzip { seen: false, .. } => Ok(Vec::new()),
            Inflater::Gzip { decoder, .. } => decoder.finish().map_err(decompression),
        }
    }
}

fn decompression(e: io::Error) -> Error {
    Error::Decompression(e.to_string())
}

fn host_port(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}
