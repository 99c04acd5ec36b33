//! # streamzip
//!
//! A streaming ZIP reader for archives that are too large, or too remote, to
//! download in full.
//!
//! Archives are read through a [`ByteSource`]: anything with a fixed length
//! that can stream an inclusive byte range. When only some entries are
//! wanted from a large archive, the reader locates the central directory by
//! scanning backward from the end, groups the wanted entries into nearby
//! batches and fetches each batch with one range request, a bounded number
//! at a time. Small archives, unfiltered reads and servers that ignore range
//! requests fall back to a single linear pass.
//!
//! ## Features
//!
//! - Local files, in-memory buffers and HTTP/HTTPS URLs as sources
//! - Backward chunked search for the end of central directory
//! - Batched range requests with bounded concurrency
//! - STORED and DEFLATE entries
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::TryStreamExt;
//! use streamzip::{EntryFilter, EntryMetadata, HttpSource, ZipExtractor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = Arc::new(HttpSource::new("https://example.com/archive.zip".to_string()).await?);
//!     let extractor = ZipExtractor::new(source);
//!
//!     let filter = EntryFilter::matching(|entry| entry.path().starts_with("docs/"));
//!     let mut entries = extractor.entries(filter).await?;
//!     while let Some(entry) = entries.try_next().await? {
//!         println!("{} ({} bytes)", entry.path(), entry.bytes().len());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod pattern;
pub mod zip;

pub use cli::Cli;
pub use config::ReaderConfig;
pub use error::{Result, ZipStreamError};
pub use io::{ByteSource, ByteStream, HttpSource, LocalFileSource, MemorySource};
pub use pattern::PathSelector;
pub use zip::{
    CentralDirectory, CentralDirectoryEndEntry, CentralDirectoryEntry, CompressionMethod,
    EntryFilter, EntryMetadata, FileEntry, FileEntryStream, LocalFileHeader, Strategy, ZipEntry,
    ZipExtractor, iterate_from_url,
};
