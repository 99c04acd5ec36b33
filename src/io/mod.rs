mod http;
mod local;
mod memory;

pub use http::{HttpSource, content_length};
pub use local::LocalFileSource;
pub use memory::MemorySource;

use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, ZipStreamError};
use crate::zip::stream::read_exact_bytes;

/// A forward-only byte stream handed out by a [`ByteSource`].
///
/// Each stream is single-use and must be drained or dropped before the
/// consumer relies on anything positioned after it.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// A byte blob of fixed length that can be streamed in inclusive sub-ranges
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Total size of the blob in bytes
    fn length(&self) -> u64;

    /// Stream the inclusive range `[start, end]`.
    ///
    /// A source whose transport ignores ranges may return more bytes than
    /// asked for, starting at offset zero; see [`ByteSource::supports_ranges`].
    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream>;

    /// Probe whether range requests are honored by asking for two bytes and
    /// checking that no more than two come back.
    async fn supports_ranges(&self) -> Result<bool> {
        if self.length() < 2 {
            return Ok(false);
        }
        let mut stream = self.stream_bytes(0, 1).await?;
        let mut probe = Vec::with_capacity(4);
        (&mut stream).take(4).read_to_end(&mut probe).await?;
        Ok(probe.len() <= 2)
    }
}

/// Read the inclusive range `[start, end]` into memory.
///
/// Fails with `MalformedArchive` when the source delivers fewer bytes than the
/// range covers.
pub async fn read_range<S: ByteSource + ?Sized>(source: &S, start: u64, end: u64) -> Result<Vec<u8>> {
    let mut stream = source.stream_bytes(start, end).await?;
    let len = (end - start + 1) as usize;
    read_exact_bytes(&mut stream, len, "byte range").await
}

/// Reject ranges that are empty, reversed, or run past the end of the source.
pub(crate) fn check_range(start: u64, end: u64, length: u64) -> Result<()> {
    if start > end || end >= length {
        return Err(ZipStreamError::InvalidRange { start, end, length });
    }
    Ok(())
}
