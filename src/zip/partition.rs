//! Groups nearby central directory entries into batches.
//!
//! One range request costs a round-trip; a few kilobytes of unwanted bytes
//! between two wanted entries usually cost less. Entries are therefore
//! collected into a batch as long as each one starts within `max_gap` bytes
//! of where the previous one ended.

use super::structures::CentralDirectoryEntry;

/// Incremental partitioner; feed entries in ascending `first_byte_at` order.
#[derive(Debug)]
pub struct EntryPartitioner {
    max_gap: u64,
    last_entry_ends_at: u64,
    current: Vec<CentralDirectoryEntry>,
}

impl EntryPartitioner {
    pub fn new(max_gap: u64) -> Self {
        Self {
            max_gap,
            last_entry_ends_at: 0,
            current: Vec::new(),
        }
    }

    /// Add an entry; returns the previous batch if this entry is too far
    /// from it.
    pub fn push(&mut self, entry: CentralDirectoryEntry) -> Option<Vec<CentralDirectoryEntry>> {
        let closed = if entry.first_byte_at > self.last_entry_ends_at.saturating_add(self.max_gap) {
            Some(std::mem::take(&mut self.current)).filter(|batch| !batch.is_empty())
        } else {
            None
        };
        self.last_entry_ends_at = entry.last_byte_at;
        self.current.push(entry);
        closed
    }

    /// The last, possibly empty, batch.
    pub fn finish(self) -> Vec<CentralDirectoryEntry> {
        self.current
    }
}

/// Partition a whole sequence at once. Empty batches are never returned.
pub fn partition_nearby_entries<I>(entries: I, max_gap: u64) -> Vec<Vec<CentralDirectoryEntry>>
where
    I: IntoIterator<Item = CentralDirectoryEntry>,
{
    let mut partitioner = EntryPartitioner::new(max_gap);
    let mut batches: Vec<_> = entries
        .into_iter()
        .filter_map(|entry| partitioner.push(entry))
        .collect();
    let last = partitioner.finish();
    if !last.is_empty() {
        batches.push(last);
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::structures::CompressionMethod;

    fn entry(path: &str, first_byte_at: u64, last_byte_at: u64) -> CentralDirectoryEntry {
        CentralDirectoryEntry {
            version_created: 20,
            version_needed: 20,
            general_purpose: 0,
            compression_method: CompressionMethod::Stored,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            disk_number: 0,
            internal_attributes: 0,
            external_attributes: 0,
            first_byte_at,
            last_byte_at,
            path: path.to_string(),
            is_directory: false,
            extra: Vec::new(),
            file_comment: String::new(),
        }
    }

    fn paths(batches: &[Vec<CentralDirectoryEntry>]) -> Vec<Vec<&str>> {
        batches
            .iter()
            .map(|b| b.iter().map(|e| e.path.as_str()).collect())
            .collect()
    }

    #[test]
    fn gap_equal_to_threshold_stays_in_one_batch() {
        let batches = partition_nearby_entries(
            vec![entry("a", 0, 99), entry("b", 99 + 1024, 2000)],
            1024,
        );
        assert_eq!(paths(&batches), vec![vec!["a", "b"]]);
    }

    #[test]
    fn gap_one_past_threshold_splits() {
        let batches = partition_nearby_entries(
            vec![entry("a", 0, 99), entry("b", 99 + 1025, 2000)],
            1024,
        );
        assert_eq!(paths(&batches), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn far_first_entry_does_not_produce_empty_batch() {
        let batches = partition_nearby_entries(
            vec![
                entry("a", 50_000, 50_100),
                entry("b", 50_101, 50_200),
                entry("c", 90_000, 90_010),
            ],
            10 * 1024,
        );
        assert_eq!(paths(&batches), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(partition_nearby_entries(Vec::new(), 10).is_empty());
        assert!(EntryPartitioner::new(10).finish().is_empty());
    }

    #[test]
    fn incremental_push_reports_closed_batches() {
        let mut partitioner = EntryPartitioner::new(0);
        assert!(partitioner.push(entry("a", 0, 9)).is_none());
        assert!(partitioner.push(entry("b", 9, 19)).is_none());
        let closed = partitioner.push(entry("c", 100, 109)).unwrap();
        assert_eq!(closed.len(), 2);
        assert_eq!(partitioner.finish().len(), 1);
    }
}
