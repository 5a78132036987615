use crate::*;
use memtable::Entry;
use std::path::Path;

mod reader_tests;
mod writer_tests;

pub const TEST_BLOOM_BITS: u64 = 8192;

/// Writes `entries` (already sorted by key) as `0-<order>.sst` and reopens
/// the descriptor.
pub fn write_segment(
    dir: &Path,
    order: u32,
    timestamp: u64,
    entries: &[(u64, Entry<String>)],
) -> Segment<u64> {
    let path = segment_path(dir, 0, order);
    SegmentWriter::write_from_entries(&path, entries, timestamp, TEST_BLOOM_BITS).unwrap();
    Segment::open(&path, 0, order, TEST_BLOOM_BITS).unwrap()
}

pub fn value(s: &str) -> Entry<String> {
    Entry::Value(s.to_string())
}
