//! Central directory locator.
//!
//! The end-of-central-directory record sits at the tail of the archive, after
//! an optional comment of unknown length. The locator fetches fixed-size
//! windows backward from the end, prepends each one to an accumulator and
//! scans the newly covered bytes for the record signature. Once a consistent
//! record is found, the accumulator is widened or trimmed so that it starts
//! exactly at the first central directory entry. Memory stays around one
//! window plus the central directory, whatever the archive size.

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::error::{Result, ZipStreamError};
use crate::io::{ByteSource, read_range};

use super::parser::{SignatureCheck, read_central_directory_entry, read_end_entry};
use super::structures::{CentralDirectoryEndEntry, CentralDirectoryEntry};

/// All central directory records of an archive plus its trailer
#[derive(Debug, Clone)]
pub struct CentralDirectory {
    pub entries: Vec<CentralDirectoryEntry>,
    pub end: CentralDirectoryEndEntry,
}

/// Result of scanning the accumulated tail for the trailer
enum Scan {
    Found { at: usize, cd_offset: u64, cd_size: u64 },
    NotFound,
}

/// Locate the central directory and return its raw bytes, starting at the
/// first entry, together with the decoded trailer.
pub async fn locate_central_directory<S>(
    source: &S,
    window: u64,
) -> Result<(Vec<u8>, CentralDirectoryEndEntry)>
where
    S: ByteSource + ?Sized,
{
    let length = source.length();
    let window = window.max(1);
    let mut accumulated: Vec<u8> = Vec::new();
    let mut chunk_start = length;
    let mut rejected: Option<String> = None;

    while chunk_start > 0 {
        let chunk_end = chunk_start - 1;
        chunk_start = chunk_start.saturating_sub(window);

        let mut chunk = read_range(source, chunk_start, chunk_end).await?;
        let new_len = chunk.len();
        chunk.extend_from_slice(&accumulated);
        accumulated = chunk;

        match scan_for_end(&accumulated, new_len, chunk_start, &mut rejected) {
            Scan::NotFound => continue,
            Scan::Found { at, cd_offset, cd_size } => {
                let mut record = &accumulated[at..];
                let end = read_end_entry(&mut record, SignatureCheck::Verify)
                    .await?
                    .ok_or_else(|| ZipStreamError::malformed("end of central directory vanished"))?;

                debug!(
                    eocd_at = chunk_start + at as u64,
                    cd_offset, cd_size, "found end of central directory"
                );

                if cd_offset < chunk_start {
                    let mut missing = read_range(source, cd_offset, chunk_start - 1).await?;
                    missing.extend_from_slice(&accumulated);
                    accumulated = missing;
                } else if cd_offset > chunk_start {
                    accumulated.drain(..(cd_offset - chunk_start) as usize);
                }
                accumulated.truncate(cd_size as usize);
                return Ok((accumulated, end));
            }
        }
    }

    match rejected {
        Some(reason) => Err(ZipStreamError::MalformedArchive(reason)),
        None => Err(ZipStreamError::CentralDirectoryNotFound),
    }
}

/// Scan backward over every position whose signature overlaps the newest
/// `new_len` bytes at the front of `buf`.
///
/// `buf` starts at absolute offset `base`. Candidates without room for the
/// whole record are truncation artifacts and are skipped silently; candidates
/// whose fields contradict the archive layout are skipped but remembered so
/// that an archive with only a corrupt trailer reports `MalformedArchive`.
fn scan_for_end(buf: &[u8], new_len: usize, base: u64, rejected: &mut Option<String>) -> Scan {
    if buf.len() < 4 || new_len == 0 {
        return Scan::NotFound;
    }
    let top = (new_len - 1).min(buf.len() - 4);

    for i in (0..=top).rev() {
        if LittleEndian::read_u32(&buf[i..i + 4]) != CentralDirectoryEndEntry::SIGNATURE {
            continue;
        }
        if i + CentralDirectoryEndEntry::RECORD_SIZE > buf.len() {
            continue;
        }

        let cd_size = LittleEndian::read_u32(&buf[i + 12..i + 16]) as u64;
        let cd_offset = LittleEndian::read_u32(&buf[i + 16..i + 20]) as u64;
        let comment_len = LittleEndian::read_u16(&buf[i + 20..i + 22]) as usize;
        let eocd_at = base + i as u64;

        if i + CentralDirectoryEndEntry::RECORD_SIZE + comment_len > buf.len() {
            rejected.get_or_insert_with(|| {
                format!("archive comment length {} runs past end of file", comment_len)
            });
            continue;
        }
        if cd_offset + cd_size > eocd_at {
            rejected.get_or_insert_with(|| {
                format!(
                    "central directory {}+{} overlaps its end record at {}",
                    cd_offset, cd_size, eocd_at
                )
            });
            continue;
        }

        return Scan::Found { at: i, cd_offset, cd_size };
    }
    Scan::NotFound
}

/// Locate and decode the whole central directory.
pub async fn read_central_directory<S>(source: &S, window: u64) -> Result<CentralDirectory>
where
    S: ByteSource + ?Sized,
{
    let (bytes, end) = locate_central_directory(source, window).await?;

    let mut reader = bytes.as_slice();
    let mut entries = Vec::with_capacity(end.total_records as usize);
    while let Some(entry) = read_central_directory_entry(&mut reader, SignatureCheck::Verify).await? {
        entries.push(entry);
    }

    if entries.len() != end.total_records as usize {
        warn!(
            "central directory holds {} entries, trailer declares {}",
            entries.len(),
            end.total_records
        );
    }

    Ok(CentralDirectory { entries, end })
}
