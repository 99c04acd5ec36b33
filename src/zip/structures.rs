use std::fmt;
use std::sync::Arc;

/// Compression method field of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// General-purpose flag bit: sizes and CRC follow the body in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Local file header (LFH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Raw 32-bit word at the start of the fixed section; its low half is the
    /// version needed to extract
    pub version: u32,
    pub general_purpose: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub path: String,
    pub is_directory: bool,
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x04034b50;
    /// Fixed section size, signature excluded
    pub const FIXED_SIZE: usize = 26;

    pub fn version_needed(&self) -> u16 {
        self.version as u16
    }

    pub fn has_data_descriptor(&self) -> bool {
        self.general_purpose & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Full record size on disk: signature, fixed section, variable fields
    /// and body.
    pub fn record_len(&self) -> u64 {
        4 + Self::FIXED_SIZE as u64
            + self.path.len() as u64
            + self.extra.len() as u64
            + self.compressed_size
    }
}

/// A local file record with its body already read and decompressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub header: LocalFileHeader,
    body: Vec<u8>,
}

impl FileEntry {
    pub(crate) fn new(header: LocalFileHeader, body: Vec<u8>) -> Self {
        Self { header, body }
    }

    /// Decompressed contents
    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    /// Decompressed contents decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.body
    }
}

/// Central Directory File Header (CDFH)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    pub version_created: u16,
    pub version_needed: u16,
    pub general_purpose: u16,
    pub compression_method: CompressionMethod,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub disk_number: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    /// Offset of the matching local file header
    pub first_byte_at: u64,
    /// Estimated last byte of the local record, inclusive
    pub last_byte_at: u64,
    pub path: String,
    pub is_directory: bool,
    pub extra: Vec<u8>,
    pub file_comment: String,
}

impl CentralDirectoryEntry {
    pub const SIGNATURE: u32 = 0x02014b50;
    pub const FIXED_SIZE: usize = 42;

    /// Header size assumed when estimating where the local record ends
    pub const LOCAL_HEADER_ESTIMATE: u64 = 32;

    /// Inclusive end of the local record, estimated from central metadata.
    ///
    /// The local extra field is assumed to match the central one; the comment
    /// length and two spare header bytes give some slack.
    pub fn estimate_last_byte(
        first_byte_at: u64,
        path_len: u64,
        extra_len: u64,
        comment_len: u64,
        compressed_size: u64,
    ) -> u64 {
        first_byte_at + Self::LOCAL_HEADER_ESTIMATE + path_len + extra_len + comment_len
            + compressed_size
            - 1
    }
}

/// End of Central Directory (EOCD)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEndEntry {
    pub disk_number: u16,
    pub central_directory_start_disk: u16,
    pub records_on_this_disk: u16,
    pub total_records: u16,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
    pub comment: String,
}

impl CentralDirectoryEndEntry {
    pub const SIGNATURE: u32 = 0x06054b50;
    pub const FIXED_SIZE: usize = 18;
    /// Signature plus fixed section
    pub const RECORD_SIZE: usize = 4 + Self::FIXED_SIZE;
}

/// Any record that can appear at a record boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZipEntry {
    File(FileEntry),
    CentralDirectory(CentralDirectoryEntry),
    CentralDirectoryEnd(CentralDirectoryEndEntry),
}

impl ZipEntry {
    pub fn signature(&self) -> u32 {
        match self {
            ZipEntry::File(_) => LocalFileHeader::SIGNATURE,
            ZipEntry::CentralDirectory(_) => CentralDirectoryEntry::SIGNATURE,
            ZipEntry::CentralDirectoryEnd(_) => CentralDirectoryEndEntry::SIGNATURE,
        }
    }
}

/// Metadata shared by local and central records; predicates see entries
/// through this trait so they work on either read path.
pub trait EntryMetadata {
    fn path(&self) -> &str;
    fn is_directory(&self) -> bool;
    fn compression_method(&self) -> CompressionMethod;
    fn compressed_size(&self) -> u64;
    fn uncompressed_size(&self) -> u64;
    fn crc32(&self) -> u32;
    fn last_mod_time(&self) -> u16;
    fn last_mod_date(&self) -> u16;

    /// DOS date as (year, month, day)
    fn mod_date(&self) -> (u16, u8, u8) {
        let date = self.last_mod_date();
        let day = (date & 0x1F) as u8;
        let month = ((date >> 5) & 0x0F) as u8;
        let year = ((date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// DOS time as (hour, minute, second); seconds have 2 s resolution
    fn mod_time(&self) -> (u8, u8, u8) {
        let time = self.last_mod_time();
        let second = ((time & 0x1F) * 2) as u8;
        let minute = ((time >> 5) & 0x3F) as u8;
        let hour = ((time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

macro_rules! impl_entry_metadata {
    ($ty:ty, |$s:ident| $fields:expr) => {
        impl EntryMetadata for $ty {
            fn path(&self) -> &str {
                let $s = self;
                &$fields.path
            }
            fn is_directory(&self) -> bool {
                let $s = self;
                $fields.is_directory
            }
            fn compression_method(&self) -> CompressionMethod {
                let $s = self;
                $fields.compression_method
            }
            fn compressed_size(&self) -> u64 {
                let $s = self;
                $fields.compressed_size
            }
            fn uncompressed_size(&self) -> u64 {
                let $s = self;
                $fields.uncompressed_size
            }
            fn crc32(&self) -> u32 {
                let $s = self;
                $fields.crc32
            }
            fn last_mod_time(&self) -> u16 {
                let $s = self;
                $fields.last_mod_time
            }
            fn last_mod_date(&self) -> u16 {
                let $s = self;
                $fields.last_mod_date
            }
        }
    };
}

impl_entry_metadata!(LocalFileHeader, |s| s);
impl_entry_metadata!(FileEntry, |s| s.header);
impl_entry_metadata!(CentralDirectoryEntry, |s| s);

type Predicate = Arc<dyn Fn(&dyn EntryMetadata) -> bool + Send + Sync>;

/// Selects which entries a read should produce.
///
/// `All` is distinguished from a predicate that happens to accept everything:
/// it lets the reader skip the central directory and stream linearly.
#[derive(Clone, Default)]
pub enum EntryFilter {
    #[default]
    All,
    Matching(Predicate),
}

impl EntryFilter {
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&dyn EntryMetadata) -> bool + Send + Sync + 'static,
    {
        EntryFilter::Matching(Arc::new(predicate))
    }

    pub fn matches<E: EntryMetadata>(&self, entry: &E) -> bool {
        match self {
            EntryFilter::All => true,
            EntryFilter::Matching(predicate) => predicate(entry as &dyn EntryMetadata),
        }
    }

    pub fn selects_everything(&self) -> bool {
        matches!(self, EntryFilter::All)
    }
}

impl fmt::Debug for EntryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryFilter::All => f.write_str("EntryFilter::All"),
            EntryFilter::Matching(_) => f.write_str("EntryFilter::Matching(..)"),
        }
    }
}
