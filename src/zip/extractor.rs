use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::io::{ByteSource, HttpSource};

use super::fetcher::BatchFetcher;
use super::locator::{CentralDirectory, read_central_directory};
use super::parser::file_entries;
use super::partition::partition_nearby_entries;
use super::stream::filter_stream;
use super::structures::{EntryFilter, EntryMetadata, FileEntry};

/// Lazy, single-pass sequence of decoded file entries
pub type FileEntryStream = BoxStream<'static, Result<FileEntry>>;

/// How an archive is going to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Stream the whole archive from the start, decoding every record
    Linear,
    /// Read the central directory and fetch only the wanted entries
    Ranged,
}

/// Streaming ZIP extractor
pub struct ZipExtractor<S: ByteSource + 'static> {
    source: Arc<S>,
    config: ReaderConfig,
    permits: Arc<Semaphore>,
}

impl<S: ByteSource + 'static> ZipExtractor<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self::with_config(source, ReaderConfig::default())
    }

    pub fn with_config(source: Arc<S>, config: ReaderConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1)));
        Self {
            source,
            config,
            permits,
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Read the central directory through backward range scans
    pub async fn central_directory(&self) -> Result<CentralDirectory> {
        read_central_directory(self.source.as_ref(), self.config.scan_window).await
    }

    /// Pick the read strategy for `filter`.
    ///
    /// Ranged reads pay for a central directory lookup plus one request per
    /// batch, so they are only chosen for a selective filter over a large
    /// archive whose source honors range requests.
    pub async fn strategy(&self, filter: &EntryFilter) -> Result<Strategy> {
        if filter.selects_everything() {
            return Ok(Strategy::Linear);
        }
        let length = self.source.length();
        if length < self.config.prefer_ranges_above {
            return Ok(Strategy::Linear);
        }
        if !self.source.supports_ranges().await? {
            debug!("source ignores range requests");
            return Ok(Strategy::Linear);
        }
        Ok(Strategy::Ranged)
    }

    /// Stream the file entries selected by `filter`.
    pub async fn entries(&self, filter: EntryFilter) -> Result<FileEntryStream> {
        let strategy = self.strategy(&filter).await?;
        debug!(?strategy, length = self.source.length(), "reading archive");
        match strategy {
            Strategy::Linear => self.linear_entries(filter).await,
            Strategy::Ranged => self.ranged_entries(filter).await,
        }
    }

    /// Decode every record from the first byte to the last
    pub async fn linear_entries(&self, filter: EntryFilter) -> Result<FileEntryStream> {
        let length = self.source.length();
        if length == 0 {
            return Ok(stream::empty().boxed());
        }
        let body = self.source.stream_bytes(0, length - 1).await?;
        Ok(filter_stream(file_entries(body), move |entry| filter.matches(entry)).boxed())
    }

    /// Central directory lookup, then batched range fetches of matching entries
    pub async fn ranged_entries(&self, filter: EntryFilter) -> Result<FileEntryStream> {
        let directory = self.central_directory().await?;
        let total = directory.entries.len();

        let mut wanted: Vec<_> = directory
            .entries
            .into_iter()
            .filter(|entry| filter.matches(entry))
            .collect();
        wanted.sort_by_key(|entry| entry.first_byte_at);

        let batches = partition_nearby_entries(wanted, self.config.batch_gap);
        debug!(total, batches = batches.len(), "partitioned matching entries");

        Ok(BatchFetcher::new(self.source.clone(), self.permits.clone()).fetch(batches))
    }
}

/// Write an entry below `output_path`; directories are created, files written
pub async fn extract_to_file(entry: &FileEntry, output_path: &Path) -> Result<()> {
    if entry.is_directory() {
        fs::create_dir_all(output_path).await?;
        return Ok(());
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(output_path).await?;
    file.write_all(entry.bytes()).await?;
    file.flush().await?;

    Ok(())
}

/// Copy an entry's decoded contents to stdout
pub async fn extract_to_stdout(entry: &FileEntry) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(entry.bytes()).await?;
    stdout.flush().await?;

    Ok(())
}

/// Stream entries of a remote archive matching `filter`, discovering its
/// length with a HEAD request first.
pub async fn iterate_from_url(url: &str, filter: EntryFilter) -> Result<FileEntryStream> {
    let source = HttpSource::new(url.to_string()).await?;
    ZipExtractor::new(Arc::new(source)).entries(filter).await
}
