//! # Engine - StrataKV storage engine
//!
//! The central orchestrator that ties together the [`memtable`] and
//! [`sstable`] crates into a complete single-level LSM key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌─────────────────────────────────────────────────┐
//! │                    ENGINE                       │
//! │                                                 │
//! │ write.rs → active memtable insert               │
//! │              |                                  │
//! │              |  (capacity exceeded?)            │
//! │              |            yes                   │
//! │              v                                  │
//! │        rotation → immutable memtable            │
//! │              |                                  │
//! │              v   (compaction worker)            │
//! │        flush → new level-0 segment              │
//! │              |                                  │
//! │              |  (segment count >= fan-in?)      │
//! │              |            yes                   │
//! │              v                                  │
//! │        merge → floor(n/2) segments, capacity x2 │
//! │                                                 │
//! │ read.rs → active → immutable → every segment    │
//! │            (highest timestamp wins)             │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | `lib.rs`       | `Engine` struct, constructor, accessors, `Debug`, `Drop` |
//! | [`recovery`]   | segment loading, stale temp-file cleanup             |
//! | [`write`]      | `put()`, `del()`, `flush()`, rotation                |
//! | [`read`]       | `get()`                                              |
//! | [`compaction`] | flush worker, minor + major compaction, the gate     |
//!
//! ## Concurrency
//!
//! A read/write lock guards the {active memtable, immutable memtable,
//! segment list} triple: `get` holds it shared for its whole duration,
//! `put`'s fast path holds it exclusive only for the in-memory insert. A
//! single-flight gate (mutex + condvar) admits at most one compaction
//! sequence at a time; a rotation requested while one is in flight blocks on
//! the gate, which is what bounds the pending immutable memtables to exactly
//! one. The segment write itself runs on a dedicated worker thread, so a
//! `put` that triggers rotation returns as soon as the memtable swap is
//! done, not when the bytes hit disk.
//!
//! ## Durability
//!
//! Persisted state is exactly the directory of segment files. Whatever sits
//! in the active memtable at crash time is lost; a clean [`Drop`] flushes it
//! first.

mod compaction;
mod read;
mod recovery;
mod write;

use anyhow::Result;
use compaction::{FlushJob, Gate};
use memtable::Memtable;
use parking_lot::RwLock;
use sstable::{segment_path, KeyCodec, Segment, SegmentWriter, ValueCodec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};

pub use config::Config;

/// The only level this engine ever populates.
pub(crate) const LEVEL0: u32 = 0;

/// The mutable triple guarded by the engine's read/write lock, plus the
/// counters that only change under the compaction gate.
pub(crate) struct State<K: KeyCodec, V: ValueCodec> {
    /// Receives every write. Always present.
    pub active: Memtable<K, V>,
    /// At most one memtable frozen for flushing — the backpressure point.
    pub immutable: Option<Arc<Memtable<K, V>>>,
    /// Level-0 segment descriptors, in order of creation.
    pub segments: Vec<Arc<Segment<K>>>,
    /// Generation counter stamped into every flushed or merged segment.
    pub generation: u64,
    /// Soft cap on active-memtable entries; doubles after a major compaction.
    pub capacity: u64,
    /// Order assigned to the next flushed segment file.
    pub next_order: u32,
}

pub(crate) struct Shared<K: KeyCodec, V: ValueCodec> {
    pub state: RwLock<State<K, V>>,
    pub gate: Gate,
    pub dir: PathBuf,
    pub config: Config,
}

/// The StrataKV storage engine.
///
/// All three public operations are callable through `&self` from any number
/// of threads; see the module docs for the locking protocol.
pub struct Engine<K: KeyCodec, V: ValueCodec> {
    shared: Arc<Shared<K, V>>,
    jobs: Option<crossbeam_channel::Sender<FlushJob<K, V>>>,
    worker: Option<JoinHandle<()>>,
}

impl<K: KeyCodec, V: ValueCodec> Engine<K, V> {
    /// Opens an engine over `dir`, creating the directory if needed and
    /// recovering any segments a previous instance left behind.
    ///
    /// # Recovery steps
    ///
    /// 1. Create the data directory if it does not exist.
    /// 2. Discard stale `.temp` files from an interrupted major compaction
    ///    (the old segments they were meant to replace are all still there).
    /// 3. Open every `<level>-<order>.sst` file and rebuild the descriptor
    ///    list, resuming the generation counter past the highest timestamp
    ///    on disk.
    /// 4. Spawn the compaction worker.
    pub fn open<P: AsRef<Path>>(dir: P, config: Config) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        recovery::discard_stale_temp_files(&dir);
        let (segments, generation, next_order) =
            recovery::load_segments::<K>(&dir, config.bloom_bits)?;

        info!(
            dir = %dir.display(),
            segments = segments.len(),
            generation,
            "engine opened"
        );

        let state = State {
            active: Memtable::with_tuning(config.max_level, config.probability),
            immutable: None,
            segments,
            generation,
            capacity: config.memtable_capacity,
            next_order,
        };
        let shared = Arc::new(Shared {
            state: RwLock::new(state),
            gate: Gate::new(),
            dir,
            config,
        });

        let (jobs, job_rx) = crossbeam_channel::unbounded();
        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("strata-compaction".to_string())
                .spawn(move || compaction::run_worker(shared, job_rx))?
        };

        Ok(Self {
            shared,
            jobs: Some(jobs),
            worker: Some(worker),
        })
    }

    /// Blocks until no compaction sequence (minor, plus any major it
    /// triggered) is in flight.
    pub fn wait_for_compactions(&self) {
        self.shared.gate.wait_idle();
    }

    /// Data directory this engine persists into.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.shared.dir
    }

    /// Number of level-0 segments currently on disk.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.shared.state.read().segments.len()
    }

    /// Entry count of the active memtable.
    #[must_use]
    pub fn memtable_len(&self) -> u64 {
        self.shared.state.read().active.len()
    }

    /// Current soft capacity of the active memtable.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.shared.state.read().capacity
    }

    /// Current generation counter.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.state.read().generation
    }
}

impl<K: KeyCodec, V: ValueCodec> std::fmt::Debug for Engine<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.state.read();
        f.debug_struct("Engine")
            .field("dir", &self.shared.dir)
            .field("memtable_entries", &st.active.len())
            .field("immutable_pending", &st.immutable.is_some())
            .field("segments", &st.segments.len())
            .field("generation", &st.generation)
            .field("capacity", &st.capacity)
            .finish()
    }
}

/// Clean shutdown: drain the compaction pipeline, then flush whatever is
/// left in the active memtable so a restart sees it.
///
/// Errors during the final flush are logged and swallowed — `Drop` cannot
/// propagate them, and losing the active memtable on a failed write matches
/// the crash contract.
impl<K: KeyCodec, V: ValueCodec> Drop for Engine<K, V> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain any queued flush and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        let mut st = self.shared.state.write();
        if st.active.is_empty() {
            return;
        }
        let table = std::mem::replace(
            &mut st.active,
            Memtable::with_tuning(self.shared.config.max_level, self.shared.config.probability),
        );
        let path = segment_path(&self.shared.dir, LEVEL0, st.next_order);
        match SegmentWriter::write_from_memtable(
            &path,
            &table,
            st.generation,
            self.shared.config.bloom_bits,
        ) {
            Ok(()) => {
                st.generation += 1;
                st.next_order += 1;
            }
            Err(e) => error!(error = %e, "final flush on shutdown failed"),
        }
    }
}

#[cfg(test)]
mod tests;
