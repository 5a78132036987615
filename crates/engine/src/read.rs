//! Read path: `get()`.
//!
//! Lookups consult the active memtable, then the immutable memtable, then
//! every level-0 segment. A memtable hit is always the freshest possible
//! answer and resolves immediately. Segments are different: their on-disk
//! order says nothing about recency once merges have run, so the scan is
//! exhaustive and the hit with the highest generation timestamp wins. The
//! only shortcut taken is metadata-level — a segment whose timestamp is
//! already below the best hit cannot change the outcome and is skipped
//! before any I/O.

use anyhow::Result;
use memtable::Entry;

use crate::Engine;
use sstable::{KeyCodec, ValueCodec};

impl<K: KeyCodec, V: ValueCodec> Engine<K, V> {
    /// Looks up a key, returning `Ok(None)` for both "never written" and
    /// "deleted".
    ///
    /// Holds the state lock in shared mode for the whole call, so reads
    /// never block each other and never observe a half-finished rotation.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment read fails (I/O or corruption).
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let st = self.shared.state.read();

        if let Some(entry) = st.active.get(key) {
            return Ok(entry.as_value().cloned());
        }

        if let Some(immutable) = &st.immutable {
            if let Some(entry) = immutable.get(key) {
                return Ok(entry.as_value().cloned());
            }
        }

        let mut best: Option<(u64, Entry<V>)> = None;
        for segment in &st.segments {
            if let Some((best_ts, _)) = &best {
                if segment.timestamp() < *best_ts {
                    continue;
                }
            }
            if let Some(entry) = segment.get::<V>(key)? {
                best = Some((segment.timestamp(), entry));
            }
        }

        Ok(best.and_then(|(_, entry)| entry.into_value()))
    }
}
