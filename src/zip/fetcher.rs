//! Bounded-concurrency batch fetcher.
//!
//! A dispatcher task walks the batches in order. For each one it waits for a
//! permit from the fetcher's semaphore and spawns a worker. The worker opens
//! one stream over the batch's byte range and decodes the requested local
//! records as the bytes arrive, handing each entry over a small per-batch
//! channel the moment its record is complete. Those channels are queued in
//! batch order, and the consumer drains them one after another, so output
//! order follows batch order no matter which request finishes first.
//!
//! A worker keeps its permit, and its stream, until the last requested record
//! of its batch has been handed over. Dropping the output stream closes every
//! queued channel: the dispatcher stops issuing new batches and running
//! workers stop at their next hand-over.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{Result, ZipStreamError};
use crate::io::ByteSource;

use super::parser::{SignatureCheck, read_file_body, read_file_header};
use super::stream::{read_array, skip_bytes};
use super::structures::{CentralDirectoryEntry, FLAG_DATA_DESCRIPTOR, FileEntry, LocalFileHeader};

/// Signature plus fixed section of a local file header.
const LOCAL_PREFIX: usize = 4 + LocalFileHeader::FIXED_SIZE;

/// Entries a worker may decode ahead of the consumer.
const HANDOVER_DEPTH: usize = 1;

type EntryReceiver = mpsc::Receiver<Result<FileEntry>>;
type BatchOutput = (EntryReceiver, JoinHandle<()>);

/// Fetches partitioned batches with at most as many requests in flight as the
/// semaphore has permits
pub struct BatchFetcher<S: ByteSource + 'static> {
    source: Arc<S>,
    permits: Arc<Semaphore>,
    queue_depth: usize,
}

impl<S: ByteSource + 'static> BatchFetcher<S> {
    /// Create a fetcher that draws permits from `permits`.
    pub fn new(source: Arc<S>, permits: Arc<Semaphore>) -> Self {
        let queue_depth = permits.available_permits().max(1);
        Self {
            source,
            permits,
            queue_depth,
        }
    }

    /// Create a fetcher with its own pool of `max_in_flight` permits.
    pub fn with_limit(source: Arc<S>, max_in_flight: usize) -> Self {
        Self::new(source, Arc::new(Semaphore::new(max_in_flight.max(1))))
    }

    /// Fetch every batch and stream the requested entries.
    ///
    /// Entries come out in batch order and, within a batch, in file offset
    /// order. Each entry is yielded as soon as its record has been read, not
    /// when its whole batch has arrived. The stream ends after the first
    /// error.
    pub fn fetch(self, batches: Vec<Vec<CentralDirectoryEntry>>) -> BoxStream<'static, Result<FileEntry>> {
        let (tx, rx) = mpsc::channel::<BatchOutput>(self.queue_depth);
        tokio::spawn(dispatch(self.source, self.permits, batches, tx));

        stream::try_unfold((rx, None), |(rx, current)| next_ready(rx, current)).boxed()
    }
}

type Pending = (mpsc::Receiver<BatchOutput>, Option<BatchOutput>);

/// Take the next entry from the batch being drained, moving on to the oldest
/// queued batch once the current one is exhausted.
async fn next_ready(
    mut batches: mpsc::Receiver<BatchOutput>,
    mut current: Option<BatchOutput>,
) -> Result<Option<(FileEntry, Pending)>> {
    loop {
        if let Some((mut entries, worker)) = current.take() {
            match entries.recv().await {
                Some(entry) => return Ok(Some((entry?, (batches, Some((entries, worker)))))),
                // Surfaces a worker that panicked instead of reporting a short batch.
                None => worker.await?,
            }
        }
        match batches.recv().await {
            Some(next) => current = Some(next),
            None => return Ok(None),
        }
    }
}

async fn dispatch<S: ByteSource + 'static>(
    source: Arc<S>,
    permits: Arc<Semaphore>,
    batches: Vec<Vec<CentralDirectoryEntry>>,
    tx: mpsc::Sender<BatchOutput>,
) {
    for batch in batches.into_iter().filter(|batch| !batch.is_empty()) {
        let permit = tokio::select! {
            _ = tx.closed() => {
                debug!("output dropped, not issuing remaining batches");
                return;
            }
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        let (entry_tx, entry_rx) = mpsc::channel(HANDOVER_DEPTH);
        let worker = tokio::spawn(fetch_batch(source.clone(), permit, batch, entry_tx));
        if tx.send((entry_rx, worker)).await.is_err() {
            debug!("output dropped, not issuing remaining batches");
            return;
        }
    }
}

async fn fetch_batch<S: ByteSource + ?Sized>(
    source: Arc<S>,
    _permit: OwnedSemaphorePermit,
    batch: Vec<CentralDirectoryEntry>,
    tx: mpsc::Sender<Result<FileEntry>>,
) {
    if let Err(err) = stream_batch(source.as_ref(), batch, &tx).await {
        let _ = tx.send(Err(err)).await;
    }
}

/// Stream one batch range and decode its requested records in offset order.
///
/// Bytes between requested records (other entries' framing and bodies) are
/// skipped unparsed. When a local record turns out longer than the central
/// directory suggested, the missing tail is requested and chained behind the
/// batch stream.
async fn stream_batch<S: ByteSource + ?Sized>(
    source: &S,
    mut batch: Vec<CentralDirectoryEntry>,
    tx: &mpsc::Sender<Result<FileEntry>>,
) -> Result<()> {
    batch.sort_by_key(|entry| entry.first_byte_at);
    let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
        return Ok(());
    };

    let start = first.first_byte_at;
    let mut end = last.last_byte_at.min(source.length().saturating_sub(1));
    if start > end {
        return Err(ZipStreamError::malformed(format!(
            "entry '{}' starts at {} beyond the end of the archive",
            first.path, start
        )));
    }
    debug!(start, end, entries = batch.len(), "streaming batch");
    let mut stream = source.stream_bytes(start, end).await?;
    let mut position = start;

    for requested in &batch {
        if requested.first_byte_at < position {
            return Err(ZipStreamError::malformed(format!(
                "local header of '{}' at {} overlaps the previous record",
                requested.path, requested.first_byte_at
            )));
        }
        skip_bytes(&mut stream, requested.first_byte_at - position, "bytes between batch entries").await?;

        let prefix: [u8; LOCAL_PREFIX] = read_array(&mut stream, "local file header").await?;
        let record_end = requested.first_byte_at + local_record_len(&prefix, requested);
        if record_end > end + 1 && record_end <= source.length() {
            trace!(path = %requested.path, missing = record_end - end - 1, "fetching record tail");
            let tail = source.stream_bytes(end + 1, record_end - 1).await?;
            stream = Box::pin(stream.chain(tail));
            end = record_end - 1;
        }

        let entry = decode_requested(&mut (&prefix[..]).chain(&mut stream), requested).await?;
        position = record_end;
        trace!(path = %entry.header.path, size = entry.bytes().len(), "decoded requested entry");

        if tx.send(Ok(entry)).await.is_err() {
            debug!("output dropped, abandoning batch");
            return Ok(());
        }
    }
    Ok(())
}

/// Full length of a local record from its fixed section, taking the sizes
/// from the central directory when a data descriptor holds the real ones.
fn local_record_len(prefix: &[u8; LOCAL_PREFIX], requested: &CentralDirectoryEntry) -> u64 {
    let flags = LittleEndian::read_u16(&prefix[6..8]);
    let mut compressed = LittleEndian::read_u32(&prefix[18..22]) as u64;
    if flags & FLAG_DATA_DESCRIPTOR != 0 && compressed == 0 {
        compressed = requested.compressed_size;
    }
    let path_len = LittleEndian::read_u16(&prefix[26..28]) as u64;
    let extra_len = LittleEndian::read_u16(&prefix[28..30]) as u64;
    LOCAL_PREFIX as u64 + path_len + extra_len + compressed
}

async fn decode_requested<R>(reader: &mut R, requested: &CentralDirectoryEntry) -> Result<FileEntry>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = read_file_header(reader, SignatureCheck::Verify)
        .await?
        .ok_or_else(|| {
            ZipStreamError::malformed(format!(
                "no local file header at offset {} for '{}'",
                requested.first_byte_at, requested.path
            ))
        })?;
    if header.path != requested.path {
        return Err(ZipStreamError::malformed(format!(
            "local header at {} names '{}', central directory says '{}'",
            requested.first_byte_at, header.path, requested.path
        )));
    }
    if header.has_data_descriptor() && header.compressed_size == 0 {
        header.compressed_size = requested.compressed_size;
        header.uncompressed_size = requested.uncompressed_size;
        header.crc32 = requested.crc32;
    }

    let body = read_file_body(reader, &header).await?;
    Ok(FileEntry::new(header, body))
}
