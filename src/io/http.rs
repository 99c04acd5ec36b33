use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_LENGTH, RANGE};
use reqwest::{Client, Response};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

use super::{ByteSource, ByteStream, check_range};
use crate::error::{Result, ZipStreamError};

/// Byte source backed by HTTP Range requests against a single URL
pub struct HttpSource {
    client: Client,
    url: String,
    length: u64,
    transferred_bytes: Arc<AtomicU64>,
    max_retry: u32,
}

impl HttpSource {
    /// Create a new HTTP source
    ///
    /// This will send a HEAD request to learn the content length. Whether the
    /// server honors ranges is probed separately, see
    /// [`ByteSource::supports_ranges`].
    pub async fn new(url: String) -> Result<Self> {
        Self::with_client(build_client()?, url).await
    }

    /// Like [`HttpSource::new`], but on a caller-configured client (proxies,
    /// timeouts, extra root certificates)
    pub async fn with_client(client: Client, url: String) -> Result<Self> {
        let length = content_length(&client, &url).await?;
        Ok(Self::from_parts(client, url, length))
    }

    /// Create a source for a URL whose content length is already known
    pub fn with_length(url: String, length: u64) -> Result<Self> {
        Ok(Self::from_parts(build_client()?, url, length))
    }

    fn from_parts(client: Client, url: String, length: u64) -> Self {
        Self {
            client,
            url,
            length,
            transferred_bytes: Arc::new(AtomicU64::new(0)),
            max_retry: 10,
        }
    }

    /// Body bytes received so far across all range responses
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    async fn send_range(&self, range: &str) -> Result<Response> {
        let mut retry_count = 0;
        loop {
            let result = self
                .client
                .get(&self.url)
                .header(RANGE, range)
                .header(ACCEPT_ENCODING, "identity")
                .send()
                .await;

            match result {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(e.into());
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn build_client() -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

/// Discover the size of a remote resource with a HEAD request
pub async fn content_length(client: &Client, url: &str) -> Result<u64> {
    let resp = client.head(url).send().await?;

    if !resp.status().is_success() {
        return Err(ZipStreamError::HttpStatus(resp.status()));
    }

    resp.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            ZipStreamError::MissingLengthMetadata(format!(
                "{url} did not return a usable Content-Length"
            ))
        })
}

#[async_trait]
impl ByteSource for HttpSource {
    fn length(&self) -> u64 {
        self.length
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        check_range(start, end, self.length)?;
        let range = format!("bytes={}-{}", start, end);
        debug!(url = %self.url, %range, "requesting range");

        let resp = self.send_range(&range).await?;
        // 200 means the range was ignored; callers detect that via the probe
        if !resp.status().is_success() {
            return Err(ZipStreamError::HttpStatus(resp.status()));
        }

        let counter = self.transferred_bytes.clone();
        let body = resp
            .bytes_stream()
            .map_ok(move |chunk| {
                counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                chunk
            })
            .map_err(std::io::Error::other);

        Ok(Box::pin(StreamReader::new(body)))
    }
}
