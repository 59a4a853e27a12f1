//! Streaming `multipart/form-data` bodies.
//!
//! File parts are never buffered in full. At dispatch time the parts are
//! assembled into a `reqwest` multipart form whose file bodies are fed by a
//! spawned producer through bounded channels.

use crate::context::Context;
use crate::values::KeyValues;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, StreamExt};
use reqwest::multipart::{Form, Part};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};

/// Number of bytes inspected when guessing a part's content type.
pub const SNIFF_LEN: usize = 512;

const CHUNK_LEN: usize = 32 * 1024;
const CHANNEL_DEPTH: usize = 8;

/// One file part of a multipart body.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{File, Files};
///
/// # fn example() -> chainreq::Result<()> {
/// let files = Files::new()
///     .with("avatar", File::open("./testdata/avatar.png")?)
///     .with("notes", File::from_bytes("notes.txt", "hello"))
///     .with("blob", File::from_bytes("blob.bin", vec![0u8, 1, 2]).with_mime("application/x-blob"));
/// # Ok(())
/// # }
/// ```
pub struct File {
    filename: Option<String>,
    mime: Option<String>,
    body: Box<dyn AsyncRead + Send + Unpin>,
}

impl File {
    /// Creates a part reading from `body`, without a filename.
    ///
    /// A filename must be supplied with [`File::with_filename`] before the part
    /// is attached to a request.
    pub fn from_reader(body: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            filename: None,
            mime: None,
            body: Box::new(body),
        }
    }

    /// Creates a part holding `data` in memory.
    pub fn from_bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::from_reader(io::Cursor::new(data.into())).with_filename(filename)
    }

    /// Opens the file at `path`; the part's filename is the path's last component.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let part = Self::from_reader(tokio::fs::File::from_std(file));
        Ok(match path.file_name() {
            Some(name) => part.with_filename(name.to_string_lossy()),
            None => part,
        })
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Declares the part's content type. A declared type disables sniffing.
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("filename", &self.filename)
            .field("mime", &self.mime)
            .finish_non_exhaustive()
    }
}

/// File parts keyed by form field name, written in ascending key order.
#[derive(Debug, Default)]
pub struct Files(BTreeMap<String, File>);

impl Files {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `file` under `key` and returns the container, for chaining.
    pub fn with(mut self, key: impl Into<String>, file: File) -> Self {
        self.set(key, file);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, file: File) {
        self.0.insert(key.into(), file);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, File)> for Files {
    fn from_iter<I: IntoIterator<Item = (K, File)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, f)| (k.into(), f)).collect())
    }
}

/// A validated multipart body waiting to be streamed.
pub(crate) struct Multipart {
    files: Vec<(String, String, File)>,
    fields: Vec<(String, String)>,
}

type Pump = (Box<dyn AsyncRead + Send + Unpin>, mpsc::Sender<io::Result<Bytes>>);

impl Multipart {
    /// Checks every part and captures the form fields.
    ///
    /// Fails with [`Error::MissingFilename`] before any part is read.
    pub(crate) fn new(files: Files, form: &impl KeyValues) -> Result<Self> {
        let mut parts = Vec::with_capacity(files.len());
        for (key, file) in files.0 {
            let Some(filename) = file.filename.clone() else {
                return Err(Error::MissingFilename(key));
            };
            parts.push((key, filename, file));
        }

        let fields = form
            .keys()
            .into_iter()
            .flat_map(|k| form.get(&k).into_iter().map(move |v| (k.clone(), v)))
            .collect();

        Ok(Self {
            files: parts,
            fields,
        })
    }

    /// Builds the form: file parts first, then fields.
    ///
    /// Each file without a declared type has its first [`SNIFF_LEN`] bytes
    /// read here to pick its content type. The rest of every file is streamed
    /// by a spawned producer; the returned slot receives the producer's error
    /// if it fails, in which case it also cancels `ctx`.
    pub(crate) async fn into_form(self, ctx: Context) -> Result<(Form, oneshot::Receiver<Error>)> {
        let mut form = Form::new();
        let mut pumps: Vec<Pump> = Vec::with_capacity(self.files.len());

        for (key, filename, mut file) in self.files {
            let head = match file.mime {
                Some(_) => Vec::new(),
                None => read_prefix(&mut file.body).await?,
            };
            let mime = file.mime.unwrap_or_else(|| sniff(&head).to_string());

            let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
            let part = Part::stream(part_body(head, rx))
                .file_name(filename)
                .mime_str(&mime)
                .map_err(|e| Error::InvalidHeader(format!("{mime}: {e}")))?;
            form = form.part(key, part);
            pumps.push((file.body, tx));
        }
        for (key, value) in self.fields {
            form = form.text(key, value);
        }

        Ok((form, spawn_producer(pumps, ctx)))
    }
}

/// The body of one file part: the sniffed prefix, then whatever the producer
/// sends.
fn part_body(head: Vec<u8>, rx: mpsc::Receiver<io::Result<Bytes>>) -> reqwest::Body {
    let head = stream::iter((!head.is_empty()).then(|| Ok::<_, io::Error>(Bytes::from(head))));
    let rest = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) });
    reqwest::Body::wrap_stream(head.chain(rest))
}

/// Streams every file into its part's channel, one file after another.
fn spawn_producer(pumps: Vec<Pump>, ctx: Context) -> oneshot::Receiver<Error> {
    let (err_tx, err_rx) = oneshot::channel();

    tokio::spawn(async move {
        for (mut body, tx) in pumps {
            if let Err(e) = pump(&mut body, &tx).await {
                if tx.is_closed() {
                    return;
                }
                tracing::debug!(error = %e, "multipart producer failed");
                let body_err = io::Error::new(e.kind(), e.to_string());
                let _ = err_tx.send(Error::request("multipart", Error::from(e)));
                ctx.cancel();
                let _ = tx.send(Err(body_err)).await;
                return;
            }
        }
    });

    err_rx
}

async fn pump(
    body: &mut (dyn AsyncRead + Send + Unpin),
    tx: &mpsc::Sender<io::Result<Bytes>>,
) -> io::Result<()> {
    loop {
        let mut buf = BytesMut::zeroed(CHUNK_LEN);
        let n = body.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        buf.truncate(n);
        tx.send(Ok(buf.freeze()))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body dropped"))?;
    }
}

/// Reads up to [`SNIFF_LEN`] bytes, stopping early only at end of input.
async fn read_prefix(body: &mut (dyn AsyncRead + Send + Unpin)) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    body.take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
    Ok(head)
}

const HTML_TAGS: [&[u8]; 17] = [
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const MAGIC: [(&[u8], &str); 9] = [
    (b"%PDF-", "application/pdf"),
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b\x08", "application/x-gzip"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
];

/// Guesses a content type from the first bytes of a part.
///
/// Only the first [`SNIFF_LEN`] bytes are considered. Unrecognized binary
/// data is `application/octet-stream`.
///
/// # Examples
///
/// ```
/// use chainreq::multipart::sniff;
///
/// assert_eq!(sniff(b"\x89PNG\r\n\x1a\n...."), "image/png");
/// assert_eq!(sniff(b"  <html><body>hi</body></html>"), "text/html; charset=utf-8");
/// assert_eq!(sniff(b"plain words"), "text/plain; charset=utf-8");
/// assert_eq!(sniff(&[0u8, 1, 2, 3]), "application/octet-stream");
/// ```
pub fn sniff(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0c' | b'\r' | b' '))
        .unwrap_or(data.len());
    let trimmed = &data[start..];

    for tag in HTML_TAGS {
        if trimmed.len() > tag.len()
            && trimmed[..tag.len()].eq_ignore_ascii_case(tag)
            && matches!(trimmed[tag.len()], b' ' | b'>')
        {
            return "text/html; charset=utf-8";
        }
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    if let Some((_, mime)) = MAGIC.iter().find(|(magic, _)| data.starts_with(magic)) {
        return *mime;
    }
    if data.len() >= 14 && &data[..4] == b"RIFF" && &data[8..14] == b"WEBPVP" {
        return "image/webp";
    }

    let binary = data
        .iter()
        .any(|&b| matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f));
    if binary {
        "application/octet-stream"
    } else {
        "text/plain; charset=utf-8"
    }
}
