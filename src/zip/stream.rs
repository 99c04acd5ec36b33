//! Byte-stream helpers shared by the decoder and the range fetchers.
//!
//! Every helper reads forward only. A short read is reported as
//! [`ZipStreamError::MalformedArchive`] because a record that ends early
//! leaves the stream at an unknown position.

use std::io::Read;

use flate2::read::DeflateDecoder;
use futures::{Stream, TryStreamExt, future};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, ZipStreamError};

/// Upper bound on buffer space reserved from a size the archive declares.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Read exactly `len` bytes.
pub async fn read_exact_bytes<R>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    (&mut *reader).take(len as u64).read_to_end(&mut buf).await?;
    if buf.len() < len {
        return Err(ZipStreamError::malformed(format!(
            "stream ended after {} of {} bytes of {}",
            buf.len(),
            len,
            what
        )));
    }
    Ok(buf)
}

/// Read a fixed-size section into an array.
pub async fn read_array<const N: usize, R>(reader: &mut R, what: &str) -> Result<[u8; N]>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; N];
    let mut filled = 0;
    while filled < N {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(ZipStreamError::malformed(format!(
                "stream ended after {} of {} bytes of {}",
                filled, N, what
            )));
        }
        filled += n;
    }
    Ok(buf)
}

/// Read up to `N` bytes, stopping early only at end of stream.
///
/// Returns how many bytes were filled; zero means the stream was already
/// exhausted.
pub async fn read_up_to<const N: usize, R>(reader: &mut R) -> Result<([u8; N], usize)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; N];
    let mut filled = 0;
    while filled < N {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok((buf, filled))
}

/// Read exactly `len` bytes and decode them as UTF-8 (lossy).
pub async fn read_string<R>(reader: &mut R, len: usize, what: &str) -> Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if len == 0 {
        return Ok(String::new());
    }
    let bytes = read_exact_bytes(reader, len, what).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Consume and drop exactly `len` bytes.
pub async fn skip_bytes<R>(reader: &mut R, len: u64, what: &str) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let copied = tokio::io::copy(&mut (&mut *reader).take(len), &mut tokio::io::sink()).await?;
    if copied < len {
        return Err(ZipStreamError::malformed(format!(
            "stream ended after {} of {} bytes of {}",
            copied, len, what
        )));
    }
    Ok(())
}

/// Concatenate whatever remains of the stream into one buffer.
pub async fn concat_bytes<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Inflate a raw deflate body (no zlib wrapper).
pub fn inflate_raw(compressed: &[u8], size_hint: u64, path: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(size_hint.min(MAX_PREALLOC as u64) as usize);
    DeflateDecoder::new(compressed)
        .read_to_end(&mut out)
        .map_err(|e| ZipStreamError::malformed(format!("corrupt deflate data in '{}': {}", path, e)))?;
    Ok(out)
}

/// Keep only the successful items accepted by `keep`; errors pass through.
pub fn filter_stream<S, T, F>(stream: S, keep: F) -> impl Stream<Item = Result<T>>
where
    S: Stream<Item = Result<T>>,
    F: Fn(&T) -> bool,
{
    stream.try_filter(move |item| future::ready(keep(item)))
}
