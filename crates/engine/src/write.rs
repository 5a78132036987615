//! Write path: `put()`, `del()`, `flush()`, and rotation.
//!
//! Every mutation lands in the active memtable under a brief exclusive lock.
//! When an insert would push the table past its capacity, the writer first
//! rotates: the active table is frozen into the immutable slot and handed to
//! the compaction worker, and a fresh table takes its place. The writer
//! releases the state lock *before* requesting rotation, so concurrent reads
//! and fast-path writes only ever wait out the pointer swap, never the disk
//! write.

use memtable::{Entry, Memtable};
use std::sync::Arc;
use tracing::{debug, error};

use crate::compaction::FlushJob;
use crate::Engine;
use sstable::{KeyCodec, ValueCodec};

impl<K: KeyCodec, V: ValueCodec> Engine<K, V> {
    /// Inserts or overwrites a key-value pair.
    ///
    /// Overwriting an existing key never triggers a capacity check — the
    /// table does not grow. A brand-new key that would exceed the capacity
    /// rotates the memtable first, then inserts into the fresh one. The call
    /// may block on the compaction gate while a previous flush is still in
    /// flight; it never returns an error.
    pub fn put(&self, key: K, value: V) {
        self.write(key, Entry::Value(value));
    }

    /// Deletes a key by writing a tombstone through the normal write path.
    ///
    /// Deleting an absent key still records the tombstone; the engine does
    /// not track whether the key ever existed.
    pub fn del(&self, key: K) {
        self.write(key, Entry::Tombstone);
    }

    /// Rotates the active memtable (if non-empty) and waits for the
    /// resulting flush — and any major compaction it triggers — to finish.
    pub fn flush(&self) {
        self.rotate();
        self.wait_for_compactions();
    }

    fn write(&self, key: K, entry: Entry<V>) {
        {
            let mut st = self.shared.state.write();
            // Overwrite of a present key cannot grow the table.
            if st.active.get(&key).is_some() {
                st.active.put(key, entry);
                return;
            }
            if st.active.len() + 1 <= st.capacity {
                st.active.put(key, entry);
                return;
            }
        }

        // Table is full. Hand it to the flush pipeline, then insert into the
        // fresh one. The lock is *not* held across the gate wait.
        self.rotate();
        let mut st = self.shared.state.write();
        st.active.put(key, entry);
    }

    /// Swaps the active memtable into the immutable slot and queues it for
    /// flushing. Blocks on the gate while another compaction sequence is in
    /// flight; the gate is released by the worker once the flush (and any
    /// major compaction) completes.
    ///
    /// If the active table is empty by the time the gate is acquired —
    /// another writer may have rotated first — this is a no-op.
    pub(crate) fn rotate(&self) {
        self.shared.gate.acquire();

        let table = {
            let mut st = self.shared.state.write();
            if st.active.is_empty() {
                None
            } else {
                let cfg = &self.shared.config;
                let full = std::mem::replace(
                    &mut st.active,
                    Memtable::with_tuning(cfg.max_level, cfg.probability),
                );
                let frozen = Arc::new(full);
                st.immutable = Some(Arc::clone(&frozen));
                Some(frozen)
            }
        };

        match table {
            Some(table) => {
                debug!(entries = table.len(), "memtable rotated");
                let send_failed = match &self.jobs {
                    Some(jobs) => jobs.send(FlushJob { table }).is_err(),
                    None => true,
                };
                if send_failed {
                    // Worker already shut down; nothing will flush this table.
                    error!("compaction worker unavailable, rotation dropped");
                    self.shared.state.write().immutable = None;
                    self.shared.gate.release();
                }
            }
            None => self.shared.gate.release(),
        }
    }
}
