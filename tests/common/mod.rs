//! Shared fixtures: a small ZIP writer and instrumented byte sources.

#![allow(dead_code)]

use std::io::Write;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use streamzip::{ByteSource, ByteStream, MemorySource, Result};

const DOS_TIME: u16 = (10 << 11) | (30 << 5);
const DOS_DATE: u16 = (44 << 9) | (1 << 5) | 2;

struct Member {
    path: String,
    method: u16,
    data: Vec<u8>,
    descriptor: bool,
}

/// Builds ZIP archives in memory, one member at a time, in insertion order.
#[derive(Default)]
pub struct ZipBuilder {
    members: Vec<Member>,
    comment: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(mut self, path: &str, data: &[u8]) -> Self {
        self.members.push(Member {
            path: path.to_string(),
            method: 0,
            data: data.to_vec(),
            descriptor: false,
        });
        self
    }

    pub fn deflated(mut self, path: &str, data: &[u8]) -> Self {
        self.members.push(Member {
            path: path.to_string(),
            method: 8,
            data: data.to_vec(),
            descriptor: false,
        });
        self
    }

    /// A deflated member written the way streaming writers do: zero sizes
    /// and CRC in the local header, real values in a trailing data
    /// descriptor and the central directory.
    pub fn streamed(mut self, path: &str, data: &[u8]) -> Self {
        self.members.push(Member {
            path: path.to_string(),
            method: 8,
            data: data.to_vec(),
            descriptor: true,
        });
        self
    }

    /// A member whose body is written as given under an arbitrary method
    /// number, for methods the reader does not implement.
    pub fn with_method(mut self, path: &str, method: u16, body: &[u8]) -> Self {
        self.members.push(Member {
            path: path.to_string(),
            method,
            data: body.to_vec(),
            descriptor: false,
        });
        self
    }

    pub fn directory(self, path: &str) -> Self {
        assert!(path.ends_with('/'));
        self.stored(path, b"")
    }

    /// A stored member of `len` bytes nobody asks for, spacing out its
    /// neighbours.
    pub fn padding(self, name: &str, len: usize) -> Self {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        self.stored(name, &data)
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for member in &self.members {
            let offset = out.len() as u32;
            let body = match member.method {
                8 => deflate(&member.data),
                _ => member.data.clone(),
            };
            let mut crc = flate2::Crc::new();
            crc.update(&member.data);
            let crc = crc.sum();
            let flags: u16 = if member.descriptor { 0x0008 } else { 0 };
            let (local_crc, local_compressed, local_size) = if member.descriptor {
                (0, 0, 0)
            } else {
                (crc, body.len() as u32, member.data.len() as u32)
            };

            out.write_u32::<LittleEndian>(0x04034b50).unwrap();
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(flags).unwrap();
            out.write_u16::<LittleEndian>(member.method).unwrap();
            out.write_u16::<LittleEndian>(DOS_TIME).unwrap();
            out.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            out.write_u32::<LittleEndian>(local_crc).unwrap();
            out.write_u32::<LittleEndian>(local_compressed).unwrap();
            out.write_u32::<LittleEndian>(local_size).unwrap();
            out.write_u16::<LittleEndian>(member.path.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.extend_from_slice(member.path.as_bytes());
            out.extend_from_slice(&body);
            if member.descriptor {
                out.write_u32::<LittleEndian>(0x08074b50).unwrap();
                out.write_u32::<LittleEndian>(crc).unwrap();
                out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
                out.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
            }

            central.write_u32::<LittleEndian>(0x02014b50).unwrap();
            central.write_u16::<LittleEndian>(0x031e).unwrap();
            central.write_u16::<LittleEndian>(20).unwrap();
            central.write_u16::<LittleEndian>(flags).unwrap();
            central.write_u16::<LittleEndian>(member.method).unwrap();
            central.write_u16::<LittleEndian>(DOS_TIME).unwrap();
            central.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            central.write_u32::<LittleEndian>(crc).unwrap();
            central.write_u32::<LittleEndian>(body.len() as u32).unwrap();
            central.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
            central.write_u16::<LittleEndian>(member.path.len() as u16).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u32::<LittleEndian>(0).unwrap();
            central.write_u32::<LittleEndian>(offset).unwrap();
            central.extend_from_slice(member.path.as_bytes());
        }

        let cd_offset = out.len() as u32;
        let cd_size = central.len() as u32;
        out.extend_from_slice(&central);

        out.write_u32::<LittleEndian>(0x06054b50).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.members.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(self.members.len() as u16).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);
        out
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// The archive used by the end-to-end scenarios.
pub fn sample_archive() -> Vec<u8> {
    ZipBuilder::new()
        .stored("a.txt", b"hi")
        .directory("b/")
        .deflated("b/c.txt", b"hello world")
        .build()
}

/// Memory source that records how many of its streams are open at once.
pub struct CountingSource {
    inner: MemorySource,
    delay: Duration,
    open: Arc<AtomicUsize>,
    max_open: Arc<AtomicUsize>,
    requests: AtomicUsize,
}

impl CountingSource {
    pub fn new(data: Vec<u8>, delay: Duration) -> Self {
        Self {
            inner: MemorySource::new(data),
            delay,
            open: Arc::new(AtomicUsize::new(0)),
            max_open: Arc::new(AtomicUsize::new(0)),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct TrackedStream {
    inner: ByteStream,
    _guard: OpenGuard,
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.get_mut().inner.as_mut().poll_read(cx, buf)
    }
}

#[async_trait]
impl ByteSource for CountingSource {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let now_open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = OpenGuard(self.open.clone());
        self.max_open.fetch_max(now_open, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let inner = self.inner.stream_bytes(start, end).await?;
        Ok(Box::pin(TrackedStream {
            inner,
            _guard: guard,
        }))
    }
}

/// Memory source that drops the last `shortfall` bytes of every range it
/// serves, optionally sparing ranges that reach the end of the archive.
pub struct TruncatingSource {
    inner: MemorySource,
    shortfall: u64,
    spare_tail: bool,
}

impl TruncatingSource {
    pub fn new(data: Vec<u8>, shortfall: u64, spare_tail: bool) -> Self {
        Self {
            inner: MemorySource::new(data),
            shortfall,
            spare_tail,
        }
    }
}

#[async_trait]
impl ByteSource for TruncatingSource {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        let stream = self.inner.stream_bytes(start, end).await?;
        if self.spare_tail && end + 1 == self.length() {
            return Ok(stream);
        }
        let len = (end - start + 1).saturating_sub(self.shortfall);
        Ok(Box::pin(stream.take(len)))
    }
}

/// Memory source that serves the first `limit` bytes of any longer range
/// that stops short of the archive end, then never delivers the rest.
/// Short ranges and ranges reaching the end are served in full.
pub struct StallingSource {
    inner: MemorySource,
    limit: u64,
}

impl StallingSource {
    pub fn new(data: Vec<u8>, limit: u64) -> Self {
        Self {
            inner: MemorySource::new(data),
            limit,
        }
    }
}

struct StallAfter {
    inner: ByteStream,
}

impl AsyncRead for StallAfter {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let (filled, room) = (buf.filled().len(), buf.remaining());
        match self.get_mut().inner.as_mut().poll_read(cx, buf) {
            // The prefix is used up: hang like a connection that went quiet.
            Poll::Ready(Ok(())) if room > 0 && buf.filled().len() == filled => Poll::Pending,
            other => other,
        }
    }
}

#[async_trait]
impl ByteSource for StallingSource {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    async fn stream_bytes(&self, start: u64, end: u64) -> Result<ByteStream> {
        let stream = self.inner.stream_bytes(start, end).await?;
        if end + 1 == self.length() || end - start + 1 <= self.limit {
            return Ok(stream);
        }
        Ok(Box::pin(StallAfter {
            inner: Box::pin(stream.take(self.limit)),
        }))
    }
}

/// Memory source whose transport ignores ranges and always sends everything.
pub struct NoRangeSource {
    inner: MemorySource,
}

impl NoRangeSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            inner: MemorySource::new(data),
        }
    }
}

#[async_trait]
impl ByteSource for NoRangeSource {
    fn length(&self) -> u64 {
        self.inner.length()
    }

    async fn stream_bytes(&self, _start: u64, _end: u64) -> Result<ByteStream> {
        self.inner.stream_bytes(0, self.length() - 1).await
    }
}
