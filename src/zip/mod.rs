//! ZIP archive streaming.
//!
//! This module reads ZIP archives as forward-only byte streams, either end to
//! end or selectively through byte-range requests against a
//! [`ByteSource`](crate::io::ByteSource).
//!
//! ## Architecture
//!
//! - `structures`: record types (local file, central directory, trailer)
//! - [`stream`]: byte-stream helpers (exact reads, string decoding, inflate)
//! - [`parser`]: the binary record decoder
//! - [`locator`]: backward scan for the end of central directory
//! - [`partition`]: grouping of nearby entries into batches
//! - [`fetcher`]: bounded-concurrency range fetches of batches
//! - [`extractor`]: strategy selection and the public entry point
//!
//! ## Read Strategies
//!
//! Small archives, unfiltered reads and sources without range support are
//! streamed linearly from the first byte. Otherwise the central directory is
//! located from the tail, filtered, partitioned, and only the wanted entries
//! are fetched.
//!
//! ## Limitations
//!
//! - Only STORED and DEFLATE entries can be decoded
//! - No ZIP64, encryption or multi-disk archives

pub mod extractor;
pub mod fetcher;
pub mod locator;
pub mod parser;
pub mod partition;
pub mod stream;
mod structures;

pub use extractor::{
    FileEntryStream, Strategy, ZipExtractor, extract_to_file, extract_to_stdout, iterate_from_url,
};
pub use fetcher::BatchFetcher;
pub use locator::{CentralDirectory, locate_central_directory, read_central_directory};
pub use parser::{SignatureCheck, file_entries, read_next_entry, zip_entries};
pub use partition::{EntryPartitioner, partition_nearby_entries};
pub use structures::*;
