//! Tunables for the selective, range-based read path.

/// Size of each backward window when scanning for the end of central directory.
pub const DEFAULT_SCAN_WINDOW: u64 = 110 * 1024;

/// Entries closer than this many bytes are fetched with a single range request.
pub const DEFAULT_BATCH_GAP: u64 = 10 * 1024;

/// Upper bound of simultaneously outstanding range requests.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 10;

/// Archives smaller than this are always read in one linear pass.
pub const DEFAULT_PREFER_RANGES_ABOVE: u64 = 1024 * 1024;

/// Configuration for [`ZipExtractor`](crate::ZipExtractor)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Backward scan window used to locate the central directory
    pub scan_window: u64,
    /// Maximum byte gap between two entries that still share one batch
    pub batch_gap: u64,
    /// Maximum number of range requests in flight at once
    pub max_concurrent_fetches: usize,
    /// Content length at which the range-based strategy becomes eligible
    pub prefer_ranges_above: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            scan_window: DEFAULT_SCAN_WINDOW,
            batch_gap: DEFAULT_BATCH_GAP,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            prefer_ranges_above: DEFAULT_PREFER_RANGES_ABOVE,
        }
    }
}

impl ReaderConfig {
    /// Set the backward scan window; zero is raised to one byte
    pub fn with_scan_window(mut self, bytes: u64) -> Self {
        self.scan_window = bytes.max(1);
        self
    }

    /// Set the batching gap threshold
    pub fn with_batch_gap(mut self, bytes: u64) -> Self {
        self.batch_gap = bytes;
        self
    }

    /// Set the concurrency cap for range requests; zero is raised to one
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    /// Set the size threshold for the range-based strategy
    pub fn with_prefer_ranges_above(mut self, bytes: u64) -> Self {
        self.prefer_ranges_above = bytes;
        self
    }
}
