//! Binary record decoder.
//!
//! This module decodes the three ZIP record kinds straight off a
//! forward-only byte stream positioned at a record boundary.
//!
//! ## Parsing Strategy
//!
//! Every record starts with a 4-byte little-endian signature that acts as the
//! tag of [`ZipEntry`]. The fixed-size section that follows is read in one
//! piece and decoded at known offsets; variable-length fields are then read
//! in declared order. Local file records additionally carry their body, which
//! is drained eagerly: the stream cannot seek, so leaving part of a body
//! unread would misplace every later record.

use byteorder::{ByteOrder, LittleEndian};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncRead;
use tracing::trace;

use crate::error::{Result, ZipStreamError};

use super::stream::{inflate_raw, read_array, read_exact_bytes, read_string, read_up_to, skip_bytes};
use super::structures::*;

/// Whether the caller already consumed the 4-byte record signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature was read (and dispatched on) by the caller
    Consumed,
    /// Read the signature and return `None` if it is not the expected one
    Verify,
}

/// Read the next record signature.
///
/// `None` means the stream ended cleanly at a record boundary.
pub async fn read_signature<R>(reader: &mut R) -> Result<Option<u32>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let (buf, filled) = read_up_to::<4, _>(reader).await?;
    match filled {
        0 => Ok(None),
        4 => Ok(Some(LittleEndian::read_u32(&buf))),
        n => Err(ZipStreamError::malformed(format!(
            "stream ended after {} of 4 signature bytes",
            n
        ))),
    }
}

async fn expect_signature<R>(reader: &mut R, check: SignatureCheck, expected: u32) -> Result<bool>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match check {
        SignatureCheck::Consumed => Ok(true),
        SignatureCheck::Verify => Ok(read_signature(reader).await? == Some(expected)),
    }
}

/// Decode whichever record comes next.
///
/// Returns `None` at end of stream or when the signature is not one of the
/// three known record kinds.
pub async fn read_next_entry<R>(reader: &mut R) -> Result<Option<ZipEntry>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let Some(signature) = read_signature(reader).await? else {
        return Ok(None);
    };

    let entry = match signature {
        LocalFileHeader::SIGNATURE => read_file_entry(reader, SignatureCheck::Consumed)
            .await?
            .map(ZipEntry::File),
        CentralDirectoryEntry::SIGNATURE => {
            read_central_directory_entry(reader, SignatureCheck::Consumed)
                .await?
                .map(ZipEntry::CentralDirectory)
        }
        CentralDirectoryEndEntry::SIGNATURE => {
            read_end_entry(reader, SignatureCheck::Consumed)
                .await?
                .map(ZipEntry::CentralDirectoryEnd)
        }
        other => {
            trace!("unknown record signature {:#010x}", other);
            None
        }
    };
    Ok(entry)
}

/// Decode a local file header without touching its body.
pub async fn read_file_header<R>(
    reader: &mut R,
    check: SignatureCheck,
) -> Result<Option<LocalFileHeader>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if !expect_signature(reader, check, LocalFileHeader::SIGNATURE).await? {
        return Ok(None);
    }

    let data: [u8; LocalFileHeader::FIXED_SIZE] = read_array(reader, "local file header").await?;
    let path_len = LittleEndian::read_u16(&data[22..24]) as usize;
    let extra_len = LittleEndian::read_u16(&data[24..26]) as usize;

    let path = read_string(reader, path_len, "local file path").await?;
    let extra = read_exact_bytes(reader, extra_len, "local extra field").await?;

    Ok(Some(LocalFileHeader {
        version: LittleEndian::read_u32(&data[0..4]),
        general_purpose: LittleEndian::read_u16(&data[2..4]),
        compression_method: CompressionMethod::from_u16(LittleEndian::read_u16(&data[4..6])),
        last_mod_time: LittleEndian::read_u16(&data[6..8]),
        last_mod_date: LittleEndian::read_u16(&data[8..10]),
        crc32: LittleEndian::read_u32(&data[10..14]),
        compressed_size: LittleEndian::read_u32(&data[14..18]) as u64,
        uncompressed_size: LittleEndian::read_u32(&data[18..22]) as u64,
        is_directory: path.ends_with('/'),
        path,
        extra,
    }))
}

/// Read exactly `header.compressed_size` body bytes and decompress them.
pub async fn read_file_body<R>(reader: &mut R, header: &LocalFileHeader) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match header.compression_method {
        CompressionMethod::Stored => {
            read_exact_bytes(reader, header.compressed_size as usize, "stored body").await
        }
        CompressionMethod::Deflate => {
            let compressed =
                read_exact_bytes(reader, header.compressed_size as usize, "deflated body").await?;
            inflate_raw(&compressed, header.uncompressed_size, &header.path)
        }
        CompressionMethod::Unknown(method) => {
            // Drain first so the error is the only thing wrong with the stream
            skip_bytes(reader, header.compressed_size, "body").await?;
            Err(ZipStreamError::UnsupportedCompression {
                path: header.path.clone(),
                method,
            })
        }
    }
}

/// Decode a local file record, body included.
pub async fn read_file_entry<R>(reader: &mut R, check: SignatureCheck) -> Result<Option<FileEntry>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let Some(header) = read_file_header(reader, check).await? else {
        return Ok(None);
    };
    let body = read_file_body(reader, &header).await?;
    trace!(path = %header.path, size = body.len(), "decoded file entry");
    Ok(Some(FileEntry::new(header, body)))
}

/// Decode a central directory file header.
pub async fn read_central_directory_entry<R>(
    reader: &mut R,
    check: SignatureCheck,
) -> Result<Option<CentralDirectoryEntry>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if !expect_signature(reader, check, CentralDirectoryEntry::SIGNATURE).await? {
        return Ok(None);
    }

    let data: [u8; CentralDirectoryEntry::FIXED_SIZE] =
        read_array(reader, "central directory header").await?;
    let compressed_size = LittleEndian::read_u32(&data[16..20]) as u64;
    let path_len = LittleEndian::read_u16(&data[24..26]);
    let extra_len = LittleEndian::read_u16(&data[26..28]);
    let comment_len = LittleEndian::read_u16(&data[28..30]);
    let first_byte_at = LittleEndian::read_u32(&data[38..42]) as u64;

    let path = read_string(reader, path_len as usize, "central directory path").await?;
    let extra = read_exact_bytes(reader, extra_len as usize, "central directory extra field").await?;
    let file_comment = read_string(reader, comment_len as usize, "file comment").await?;

    Ok(Some(CentralDirectoryEntry {
        version_created: LittleEndian::read_u16(&data[0..2]),
        version_needed: LittleEndian::read_u16(&data[2..4]),
        general_purpose: LittleEndian::read_u16(&data[4..6]),
        compression_method: CompressionMethod::from_u16(LittleEndian::read_u16(&data[6..8])),
        last_mod_time: LittleEndian::read_u16(&data[8..10]),
        last_mod_date: LittleEndian::read_u16(&data[10..12]),
        crc32: LittleEndian::read_u32(&data[12..16]),
        compressed_size,
        uncompressed_size: LittleEndian::read_u32(&data[20..24]) as u64,
        disk_number: LittleEndian::read_u16(&data[30..32]),
        internal_attributes: LittleEndian::read_u16(&data[32..34]),
        external_attributes: LittleEndian::read_u32(&data[34..38]),
        first_byte_at,
        last_byte_at: CentralDirectoryEntry::estimate_last_byte(
            first_byte_at,
            path_len as u64,
            extra_len as u64,
            comment_len as u64,
            compressed_size,
        ),
        is_directory: path.ends_with('/'),
        path,
        extra,
        file_comment,
    }))
}

/// Decode the end-of-central-directory record, comment included.
pub async fn read_end_entry<R>(
    reader: &mut R,
    check: SignatureCheck,
) -> Result<Option<CentralDirectoryEndEntry>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if !expect_signature(reader, check, CentralDirectoryEndEntry::SIGNATURE).await? {
        return Ok(None);
    }

    let data: [u8; CentralDirectoryEndEntry::FIXED_SIZE] =
        read_array(reader, "end of central directory").await?;
    let comment_len = LittleEndian::read_u16(&data[16..18]) as usize;
    let comment = read_string(reader, comment_len, "archive comment").await?;

    Ok(Some(CentralDirectoryEndEntry {
        disk_number: LittleEndian::read_u16(&data[0..2]),
        central_directory_start_disk: LittleEndian::read_u16(&data[2..4]),
        records_on_this_disk: LittleEndian::read_u16(&data[4..6]),
        total_records: LittleEndian::read_u16(&data[6..8]),
        central_directory_size: LittleEndian::read_u32(&data[8..12]) as u64,
        central_directory_offset: LittleEndian::read_u32(&data[12..16]) as u64,
        comment,
    }))
}

/// Every record of a stream, in file order, ending at the first unknown
/// signature or at end of stream.
///
/// The sequence stops after the first error.
pub fn zip_entries<R>(reader: R) -> BoxStream<'static, Result<ZipEntry>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    stream::try_unfold(reader, |mut reader| async move {
        let entry = read_next_entry(&mut reader).await?;
        Ok::<_, ZipStreamError>(entry.map(|entry| (entry, reader)))
    })
    .boxed()
}

/// Only the local file records of a stream.
pub fn file_entries<R>(reader: R) -> BoxStream<'static, Result<FileEntry>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    zip_entries(reader)
        .try_filter_map(|entry| async move {
            Ok::<_, ZipStreamError>(match entry {
                ZipEntry::File(file) => Some(file),
                _ => None,
            })
        })
        .boxed()
}
