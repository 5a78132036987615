//! Cold-start recovery: rebuild the segment list from the data directory.
//!
//! The directory of segment files *is* the persisted state. Recovery scans
//! it, discards leftovers from an interrupted major compaction, and resumes
//! the generation and order counters past whatever is on disk.

use anyhow::{Context, Result};
use sstable::{parse_segment_name, segment_path, KeyCodec, Segment, TEMP_SUFFIX};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Deletes stale `.temp` files left by an interrupted major compaction.
///
/// Safe to discard: old segment files are only deleted after *every* temp
/// file has been fully written and the replacement is about to be renamed
/// in, so a surviving temp always coexists with a complete old segment set.
pub(crate) fn discard_stale_temp_files(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(TEMP_SUFFIX) {
            warn!(file = name, "discarding stale temp file from interrupted compaction");
            let _ = std::fs::remove_file(&path);
        }
    }
}

/// Opens every `<level>-<order>.sst` file in `dir`.
///
/// Returns the descriptors sorted by (level, order), the resumed generation
/// counter (one past the highest timestamp on disk), and the next free
/// order number.
///
/// # Errors
///
/// A segment that exists but cannot be opened (truncated, corrupt) fails
/// recovery as a whole — this engine defines no repair path.
pub(crate) fn load_segments<K: KeyCodec>(
    dir: &Path,
    bloom_bits: u64,
) -> Result<(Vec<Arc<Segment<K>>>, u64, u32)> {
    let mut found: Vec<(u32, u32)> = Vec::new();
    for entry in std::fs::read_dir(dir)?.flatten() {
        if let Some(name) = entry.path().file_name().and_then(|n| n.to_str()) {
            if let Some((level, order)) = parse_segment_name(name) {
                found.push((level, order));
            }
        }
    }
    found.sort_unstable();

    let mut segments = Vec::with_capacity(found.len());
    let mut max_timestamp = 0u64;
    let mut next_order = 0u32;
    for (level, order) in found {
        let path = segment_path(dir, level, order);
        let segment = Segment::open(&path, level, order, bloom_bits)
            .with_context(|| format!("failed to open segment {}", path.display()))?;
        max_timestamp = max_timestamp.max(segment.timestamp());
        next_order = next_order.max(order + 1);
        segments.push(Arc::new(segment));
    }

    let generation = if segments.is_empty() { 0 } else { max_timestamp + 1 };
    Ok((segments, generation, next_order))
}
