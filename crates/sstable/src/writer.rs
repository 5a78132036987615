use anyhow::Result;
use bloom::BloomFilter;
use byteorder::{LittleEndian, WriteBytesExt};
use memtable::{Entry, Memtable};
use std::fs::{rename, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::codec::{KeyCodec, ValueCodec};
use crate::format::{encode_entry, temp_path, values_base_offset, SegmentHeader};

/// Writes a sorted run of entries to disk as an immutable segment file.
///
/// The writer is stateless — all work happens inside the two static entry
/// points. [`write_from_memtable`](SegmentWriter::write_from_memtable) is
/// crash-safe on its own: bytes go to a `.temp` twin, are fsynced, and the
/// file is atomically renamed into place.
/// [`write_from_entries`](SegmentWriter::write_from_entries) writes exactly
/// the path it is given, because major compaction stages *all* of its output
/// as `.temp` files before any rename happens.
pub struct SegmentWriter {}

impl SegmentWriter {
    /// Flushes `mem` to a new segment file at `path`.
    ///
    /// A single ascending pass over the memtable builds the bloom filter and
    /// the sparse index, assigning each value blob an absolute offset
    /// starting right after the header + bloom + index sections.
    ///
    /// # Errors
    ///
    /// Returns an error if the memtable is empty (an empty segment indicates
    /// a logic bug upstream) or on any I/O failure.
    pub fn write_from_memtable<K: KeyCodec, V: ValueCodec>(
        path: &Path,
        mem: &Memtable<K, V>,
        timestamp: u64,
        bloom_bits: u64,
    ) -> Result<()> {
        let (min_key, max_key) = match mem.min_max() {
            Some((min, max)) => (*min, *max),
            None => anyhow::bail!("refusing to write an empty segment (empty memtable)"),
        };

        let tmp = temp_path(path);
        Self::write_internal(
            &tmp,
            timestamp,
            bloom_bits,
            min_key,
            max_key,
            mem.len(),
            mem.iter(),
        )?;
        rename(&tmp, path)?;
        sync_parent_dir(path);
        Ok(())
    }

    /// Writes a segment from an already-sorted, deduplicated entry slice,
    /// directly to `path` (no rename).
    ///
    /// This is the major-compaction entry point: the merge produces one
    /// sorted run which the engine partitions into slices, writes each slice
    /// to a `.temp` path through here, and renames the whole batch only once
    /// every file exists.
    pub fn write_from_entries<K: KeyCodec, V: ValueCodec>(
        path: &Path,
        entries: &[(K, Entry<V>)],
        timestamp: u64,
        bloom_bits: u64,
    ) -> Result<()> {
        let (min_key, max_key) = match (entries.first(), entries.last()) {
            (Some((min, _)), Some((max, _))) => (*min, *max),
            _ => anyhow::bail!("refusing to write an empty segment (no entries)"),
        };
        Self::write_internal(
            path,
            timestamp,
            bloom_bits,
            min_key,
            max_key,
            entries.len() as u64,
            entries.iter().map(|(k, e)| (k, e)),
        )
    }

    fn write_internal<'a, K, V, I>(
        path: &Path,
        timestamp: u64,
        bloom_bits: u64,
        min_key: K,
        max_key: K,
        entry_count: u64,
        entries: I,
    ) -> Result<()>
    where
        K: KeyCodec,
        V: ValueCodec + 'a,
        I: Iterator<Item = (&'a K, &'a Entry<V>)>,
    {
        let header = SegmentHeader {
            timestamp,
            entry_count,
            min_key,
            max_key,
        };

        // One pass: bloom + index + concatenated value blobs. Offsets are
        // absolute, starting at the end of the index section.
        let mut bloom = BloomFilter::new(bloom_bits);
        let mut index: Vec<(K, u64)> = Vec::with_capacity(entry_count as usize);
        let mut values: Vec<u8> = Vec::new();
        let mut offset = values_base_offset::<K>(entry_count, bloom_bits);

        for (key, entry) in entries {
            bloom.add(&key.encoded());
            index.push((*key, offset));
            let before = values.len();
            encode_entry(entry, &mut values);
            offset += (values.len() - before) as u64;
        }
        anyhow::ensure!(
            index.len() as u64 == entry_count,
            "entry count mismatch: header says {}, enumeration yielded {}",
            entry_count,
            index.len()
        );

        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::new(raw_file);

        header.write_to(&mut file)?;
        file.write_all(bloom.bitmap())?;
        for (key, data_offset) in &index {
            file.write_all(&key.encoded())?;
            file.write_u64::<LittleEndian>(*data_offset)?;
        }
        file.write_all(&values)?;

        file.flush()?;
        file.into_inner()?.sync_all()?;
        Ok(())
    }
}

/// Fsyncs the directory containing `path` so a completed rename survives a
/// crash on ext4/XFS, where the directory entry is not otherwise durable.
pub fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}
