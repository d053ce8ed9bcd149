//! Source byte streams.
//!
//! `ByteSource` is implemented by [`HttpSource`] for real transfers and
//! by in-memory fakes in tests.

use std::future::Future;
use std::pin::Pin;

use futures_util::TryStreamExt;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::error::PipelineError;

/// Body of an opened source.
pub type SourceReader = Pin<Box<dyn AsyncRead + Send>>;

/// An opened source: a lazily streamed body plus its declared length.
pub struct OpenedSource {
    pub reader: SourceReader,
    /// Length announced before the body, if the source announced one.
    pub declared_len: Option<u64>,
}

/// Something that can be opened as a byte stream.
pub trait ByteSource: Send + Sync {
    /// Opens the stream. Metadata is read eagerly; the body is not.
    fn open(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<OpenedSource, PipelineError>> + Send + '_>>;

    /// Human-readable source location, for logs.
    fn describe(&self) -> String;
}

/// GET request to a URL, streamed without buffering the body.
pub struct HttpSource {
    http: reqwest::Client,
    url: String,
}

impl HttpSource {
    /// Creates a source for `url` with a default HTTP client.
    pub fn new(url: &str) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| PipelineError::Source(e.to_string()))?;
        Self::with_client(http, url)
    }

    /// Creates a source for `url` reusing an existing HTTP client.
    pub fn with_client(http: reqwest::Client, url: &str) -> Result<Self, PipelineError> {
        reqwest::Url::parse(url)
            .map_err(|e| PipelineError::Configuration(format!("invalid source URL {url}: {e}")))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

impl ByteSource for HttpSource {
    fn open(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<OpenedSource, PipelineError>> + Send + '_>> {
        Box::pin(async move {
            // Long downloads over HTTP/1.1 keep-alive get reset by some
            // servers; HTTP/1.0 avoids it.
            let resp = self
                .http
                .get(&self.url)
                .version(reqwest::Version::HTTP_10)
                .send()
                .await
                .map_err(|e| PipelineError::Source(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                return Err(PipelineError::Source(format!(
                    "GET {} returned {status}",
                    self.url
                )));
            }

            let declared_len = resp.content_length();
            debug!(url = %self.url, ?declared_len, "source opened");

            let body = resp.bytes_stream().map_err(std::io::Error::other);
            let reader: SourceReader = Box::pin(StreamReader::new(body));
            Ok(OpenedSource {
                reader,
                declared_len,
            })
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
