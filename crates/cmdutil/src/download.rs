//! Streaming HTTP downloads with optional progress lines.
//!
//! ```rust,no_run
//! use cmdutil::download::{DownloadOptions, Downloader};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), cmdutil::DownloadError> {
//! let downloader = Downloader::new(DownloadOptions::new().connect_timeout(Duration::from_secs(5)))
//!     .progress(std::io::stderr());
//! downloader.download("https://go.dev/dl/go1.22.0.linux-amd64.tar.gz", "tmp/go.tar.gz")?;
//! # Ok(())
//! # }
//! ```

use crate::error::DownloadError;
use reqwest::blocking::Client;
use reqwest::{Proxy, StatusCode};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub use reqwest::Url;

const COPY_BUF_SIZE: usize = 32 * 1024;

/// Resolver deciding the proxy for each request URL.
pub type ProxyResolver = Arc<dyn Fn(&Url) -> Option<Url> + Send + Sync>;

/// How requests pick a proxy.
#[derive(Clone, Default)]
pub enum ProxySetting {
    /// Proxies from the `HTTP_PROXY` / `HTTPS_PROXY` / `NO_PROXY` environment
    #[default]
    System,
    /// Always connect directly
    None,
    /// Ask a resolver; `None` from it means a direct connection
    Custom(ProxyResolver),
}

impl fmt::Debug for ProxySetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("System"),
            Self::None => f.write_str("None"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Client settings for a [`Downloader`].
#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    /// Proxy selection
    pub proxy: ProxySetting,

    /// Limit on the whole request, body included; `None` waits forever
    pub timeout: Option<Duration>,

    /// Limit on establishing the TCP/TLS connection only
    pub connect_timeout: Option<Duration>,

    /// Accept any server certificate
    pub insecure_skip_verify: bool,
}

impl DownloadOptions {
    /// No timeouts, system proxy, verified TLS.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the proxy selection.
    pub fn proxy(mut self, proxy: ProxySetting) -> Self {
        self.proxy = proxy;
        self
    }

    /// Sets the overall request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Disables certificate verification.
    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }
}

/// HTTP GET into files or writers.
#[derive(Default)]
pub struct Downloader {
    options: DownloadOptions,
    progress: Option<Mutex<Box<dyn Write + Send>>>,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("options", &self.options)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Downloader {
    /// Creates a downloader with the given client settings.
    pub fn new(options: DownloadOptions) -> Self {
        Self {
            options,
            progress: None,
        }
    }

    /// Writes progress lines to `sink`.
    pub fn progress<W>(mut self, sink: W) -> Self
    where
        W: Write + Send + 'static,
    {
        self.progress = Some(Mutex::new(Box::new(sink)));
        self
    }

    /// Client settings in use.
    pub fn options(&self) -> &DownloadOptions {
        &self.options
    }

    /// Downloads `url` into the file at `dst`.
    ///
    /// Missing parent directories are created. If anything fails after the
    /// file was created, the partial file is removed.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `dst` is empty
    /// - The request fails or the status is not 200
    /// - The body is shorter or longer than its Content-Length
    /// - The file cannot be written
    pub fn download(&self, url: &str, dst: impl AsRef<Path>) -> Result<u64, DownloadError> {
        let dst = dst.as_ref();
        if dst.as_os_str().is_empty() {
            return Err(DownloadError::EmptyPath);
        }

        if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(dst)?;
        let result = self.fetch_into_file(url, file);
        if result.is_err() {
            if let Err(e) = fs::remove_file(dst) {
                tracing::warn!(path = %dst.display(), error = %e, "failed to remove partial download");
            }
        }
        result
    }

    fn fetch_into_file(&self, url: &str, file: File) -> Result<u64, DownloadError> {
        let mut writer = BufWriter::new(file);
        let copied = self.download_to_writer(url, &mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(copied)
    }

    /// Streams the body of `url` into `dst`.
    ///
    /// Returns the number of bytes copied.
    pub fn download_to_writer<W>(&self, url: &str, dst: &mut W) -> Result<u64, DownloadError>
    where
        W: Write + ?Sized,
    {
        let client = self.client()?;
        tracing::debug!(url, "connect start");

        let started = Instant::now();
        let mut response = match client.get(url).send() {
            Ok(response) => {
                tracing::debug!(url, cost = ?started.elapsed(), "connect success");
                response
            }
            Err(e) => {
                tracing::debug!(url, cost = ?started.elapsed(), error = %e, "connect failed");
                return Err(e.into());
            }
        };
        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::Status(status));
        }
        let total = response.content_length();

        let copied = match &self.progress {
            Some(sink) => {
                let mut sink = sink.lock().unwrap_or_else(|e| e.into_inner());
                let mut progress = ProgressWriter::new(dst, &mut **sink, total);
                let copied = copy_body(&mut response, &mut progress, total)?;
                progress.finish();
                copied
            }
            None => copy_body(&mut response, dst, total)?,
        };

        if let Some(expected) = total {
            if copied != expected {
                return Err(DownloadError::LengthMismatch { copied, expected });
            }
        }

        tracing::info!(url, bytes = copied, "download finished");
        Ok(copied)
    }

    fn client(&self) -> Result<Client, DownloadError> {
        let options = &self.options;
        let mut builder = Client::builder()
            .pool_max_idle_per_host(0)
            .no_gzip()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_skip_verify);

        if let Some(timeout) = options.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }

        builder = match &options.proxy {
            ProxySetting::System => builder,
            ProxySetting::None => builder.no_proxy(),
            ProxySetting::Custom(resolver) => {
                let resolver = Arc::clone(resolver);
                builder.proxy(Proxy::custom(move |url| resolver(url)))
            }
        };

        Ok(builder.build()?)
    }
}

/// Copies the body, telling a truncated body apart from a local write error.
fn copy_body<R, W>(body: &mut R, dst: &mut W, total: Option<u64>) -> Result<u64, DownloadError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut copied = 0u64;
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(match total {
                    Some(expected) if copied < expected => {
                        tracing::debug!(error = %e, copied, expected, "body ended early");
                        DownloadError::LengthMismatch { copied, expected }
                    }
                    _ => DownloadError::Io(e),
                });
            }
        };
        dst.write_all(&buf[..n])?;
        copied += n as u64;
    }
    Ok(copied)
}

/// Passes writes through and reports progress at most once per second.
pub struct ProgressWriter<'a, W: ?Sized> {
    inner: &'a mut W,
    sink: &'a mut dyn Write,
    written: u64,
    total: Option<u64>,
    last_second: Option<u64>,
}

impl<'a, W: Write + ?Sized> ProgressWriter<'a, W> {
    /// Wraps `inner`; `total` is the expected byte count, if known.
    pub fn new(inner: &'a mut W, sink: &'a mut dyn Write, total: Option<u64>) -> Self {
        Self {
            inner,
            sink,
            written: 0,
            total,
            last_second: None,
        }
    }

    /// Bytes passed through so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Emits the final progress line.
    pub fn finish(&mut self) {
        self.report(true);
    }

    fn report(&mut self, finished: bool) {
        let line = progress_line(self.written, self.total, finished);
        // Progress output is best effort.
        let _ = self.sink.write_all(line.as_bytes());
    }
}

impl<W: Write + ?Sized> Write for ProgressWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        if self.last_second != Some(now) {
            self.report(false);
            self.last_second = Some(now);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn progress_line(written: u64, total: Option<u64>, finished: bool) -> String {
    let end = if finished { "" } else { " ..." };
    match total {
        Some(total) if total > 0 => {
            let width = total.to_string().len();
            let percent = 100.0 * written as f64 / total as f64;
            format!("Downloaded {percent:5.1}% ({written:>width$} / {total} bytes){end}\n")
        }
        _ => format!("Downloaded {written} bytes{end}\n"),
    }
}
