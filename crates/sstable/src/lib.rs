//! # Segment - sorted on-disk table
//!
//! Immutable, bloom-filtered storage files for the StrataKV engine.
//!
//! When a memtable fills up the engine flushes it to disk as a segment.
//! Segments are *write-once, read-many* — once renamed into place they are
//! never modified, only deleted after a major compaction replaces them.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ HEADER (fixed width)                                          │
//! │                                                               │
//! │ timestamp (u64) | entry_count (u64)                           │
//! │ min_key (K::WIDTH) | max_key (K::WIDTH)                       │
//! ├───────────────────────────────────────────────────────────────┤
//! │ BLOOM SECTION                                                 │
//! │                                                               │
//! │ raw bitmap, bloom_bits / 8 bytes, MSB-first per byte          │
//! ├───────────────────────────────────────────────────────────────┤
//! │ INDEX SECTION (sparse index, one entry per key)               │
//! │                                                               │
//! │ key (K::WIDTH) | offset (u64)   ... repeated entry_count x    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ VALUES SECTION                                                │
//! │                                                               │
//! │ tag (u8) | [value bytes]        ... repeated entry_count x    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. `offset` is absolute from the start of
//! the file; value blob i ends where blob i+1 begins, and the last blob runs
//! to end of file. Files are named `<level>-<order>.sst` and written via a
//! `.temp` twin plus atomic rename.

mod codec;
mod format;
mod merge;
mod reader;
mod writer;

pub use codec::{KeyCodec, ValueCodec};
pub use format::{parse_segment_name, segment_path, temp_path, SegmentHeader, TEMP_SUFFIX};
pub use merge::merge_segments;
pub use reader::{Segment, SegmentError};
pub use writer::{sync_parent_dir, SegmentWriter};

#[cfg(test)]
mod tests;
