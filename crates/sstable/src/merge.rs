//! Segment merge for major compaction.
//!
//! Builds a unified view of a set of level-0 segments: for every key, the
//! entry from the segment with the highest generation timestamp wins, and a
//! key whose winning entry is a tombstone is dropped from the output
//! entirely. Level-0 segments overlap freely, so every segment must be read
//! in full — there is no shortcut.

use memtable::Entry;
use std::collections::BTreeMap;

use crate::codec::{KeyCodec, ValueCodec};
use crate::reader::{Segment, SegmentError};

/// Merges `segments` into one sorted, deduplicated, tombstone-free run.
///
/// Ties on timestamp keep the first segment seen; in practice ties only
/// occur between segments produced by the same compaction, whose key ranges
/// are disjoint.
pub fn merge_segments<'a, K, V, I>(segments: I) -> Result<Vec<(K, Entry<V>)>, SegmentError>
where
    K: KeyCodec,
    V: ValueCodec,
    I: IntoIterator<Item = &'a Segment<K>>,
{
    let mut merged: BTreeMap<K, (u64, Entry<V>)> = BTreeMap::new();

    for segment in segments {
        let timestamp = segment.timestamp();
        for (key, entry) in segment.read_all::<V>()? {
            match merged.get(&key) {
                Some((best, _)) if *best >= timestamp => {}
                _ => {
                    merged.insert(key, (timestamp, entry));
                }
            }
        }
    }

    // A winning tombstone removes the key for good: after a full merge of
    // the level there is no older segment left for it to shadow.
    Ok(merged
        .into_iter()
        .filter_map(|(key, (_, entry))| match entry {
            Entry::Tombstone => None,
            live => Some((key, live)),
        })
        .collect())
}
