//! The compaction pipeline: single-flight gate, flush worker, and the
//! minor/major compaction steps.
//!
//! Exactly one compaction sequence runs at a time. A rotation acquires the
//! gate, hands the frozen memtable to the worker over a channel, and
//! returns; the worker flushes it to a level-0 segment, runs a major
//! compaction if the level has reached the fan-in threshold, and only then
//! releases the gate. A second rotation arriving in between blocks on the
//! gate, which bounds the pending immutable memtables to one.
//!
//! File deletes and renames during a major compaction happen under the gate
//! only; the read/write lock is taken just for the final in-memory swap of
//! the segment list.

use anyhow::Result;
use crossbeam_channel::Receiver;
use memtable::Memtable;
use parking_lot::{Condvar, Mutex};
use sstable::{
    merge_segments, segment_path, sync_parent_dir, temp_path, KeyCodec, Segment, SegmentWriter,
    ValueCodec,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::{Shared, LEVEL0};

/// Single-flight latch for the compaction sequence.
///
/// Prevents concurrent compactions by construction: there is no retry path
/// because the race cannot happen.
pub(crate) struct Gate {
    busy: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            busy: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Blocks until no compaction is in flight, then claims the gate.
    pub fn acquire(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.cond.wait(&mut busy);
        }
        *busy = true;
    }

    /// Releases the gate and wakes every waiter.
    pub fn release(&self) {
        let mut busy = self.busy.lock();
        *busy = false;
        self.cond.notify_all();
    }

    /// Blocks until the gate is free without claiming it.
    pub fn wait_idle(&self) {
        let mut busy = self.busy.lock();
        while *busy {
            self.cond.wait(&mut busy);
        }
    }
}

/// A frozen memtable on its way to disk.
pub(crate) struct FlushJob<K: KeyCodec, V: ValueCodec> {
    pub table: Arc<Memtable<K, V>>,
}

/// Worker loop: one flush job per gate acquisition, in arrival order.
///
/// Runs until the job channel closes (engine drop), draining any queued
/// job first so shutdown never abandons a frozen memtable.
pub(crate) fn run_worker<K: KeyCodec, V: ValueCodec>(
    shared: Arc<Shared<K, V>>,
    jobs: Receiver<FlushJob<K, V>>,
) {
    for job in jobs.iter() {
        if let Err(e) = flush_immutable(&shared, &job.table) {
            // An unwritable data directory is fatal for durability but not
            // for serving: drop the frozen table, keep the engine alive.
            error!(error = %e, "background flush failed, immutable memtable dropped");
            shared.state.write().immutable = None;
        }
        shared.gate.release();
    }
}

/// Minor compaction: serialize the frozen memtable into a new level-0
/// segment, publish the descriptor, bump the generation, clear the
/// immutable slot. Triggers a major compaction when the level is full.
fn flush_immutable<K: KeyCodec, V: ValueCodec>(
    shared: &Shared<K, V>,
    table: &Memtable<K, V>,
) -> Result<()> {
    let (timestamp, order) = {
        let st = shared.state.read();
        (st.generation, st.next_order)
    };

    let path = segment_path(&shared.dir, LEVEL0, order);
    SegmentWriter::write_from_memtable(&path, table, timestamp, shared.config.bloom_bits)?;
    let segment = Arc::new(Segment::open(&path, LEVEL0, order, shared.config.bloom_bits)?);

    info!(
        file = %path.display(),
        entries = segment.len(),
        timestamp,
        "minor compaction complete"
    );

    let fanin = shared.config.compaction_fanin;
    let level_full = {
        let mut st = shared.state.write();
        st.segments.push(segment);
        st.immutable = None;
        st.generation += 1;
        st.next_order += 1;
        fanin > 0 && st.segments.len() >= fanin
    };

    if level_full {
        major_compact(shared)?;
    }
    Ok(())
}

/// Major compaction: merge every level-0 segment into `floor(n/2)` fresh
/// ones, written first as `.temp` files and only then swapped in.
///
/// The in-memory segment list is replaced wholesale under a brief exclusive
/// lock; concurrent readers either see the old descriptors (whose open file
/// handles outlive the unlink) or the new ones, never a mix.
fn major_compact<K: KeyCodec, V: ValueCodec>(shared: &Shared<K, V>) -> Result<()> {
    let (old, merge_timestamp) = {
        let st = shared.state.read();
        (st.segments.clone(), st.generation)
    };

    let live = merge_segments::<K, V, _>(old.iter().map(|s| s.as_ref()))?;

    // Partition into floor(old/2) output segments of roughly equal size,
    // the last absorbing the remainder. Fewer outputs when tombstones left
    // fewer live keys than that.
    let mut staged: Vec<(std::path::PathBuf, std::path::PathBuf, u32)> = Vec::new();
    if !live.is_empty() {
        let target = (old.len() / 2).max(1).min(live.len());
        let chunk = live.len() / target;
        for i in 0..target {
            let start = i * chunk;
            let end = if i + 1 == target { live.len() } else { start + chunk };
            let order = i as u32;
            let final_path = segment_path(&shared.dir, LEVEL0, order);
            let staging_path = temp_path(&final_path);
            SegmentWriter::write_from_entries(
                &staging_path,
                &live[start..end],
                merge_timestamp,
                shared.config.bloom_bits,
            )?;
            staged.push((staging_path, final_path, order));
        }
    }

    // Every temp file exists; now the old files can go and the temps can
    // take their names.
    for segment in &old {
        let _ = std::fs::remove_file(segment.path());
    }
    let mut merged = Vec::with_capacity(staged.len());
    for (staging_path, final_path, order) in staged {
        std::fs::rename(&staging_path, &final_path)?;
        merged.push(Arc::new(Segment::open(
            &final_path,
            LEVEL0,
            order,
            shared.config.bloom_bits,
        )?));
    }
    if let Some(first) = merged.first() {
        sync_parent_dir(first.path());
    }

    let next_order = merged.len() as u32;
    {
        let mut st = shared.state.write();
        st.segments = merged;
        st.generation += 1;
        st.capacity = st.capacity.saturating_mul(2);
        st.next_order = next_order;
    }

    info!(
        merged_from = old.len(),
        merged_into = next_order,
        live_entries = live.len(),
        timestamp = merge_timestamp,
        "major compaction complete"
    );
    Ok(())
}
