use bloom::BloomFilter;
use byteorder::{LittleEndian, ReadBytesExt};
use memtable::Entry;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::codec::{KeyCodec, ValueCodec};
use crate::format::{decode_entry, values_base_offset, SegmentHeader};

/// Errors raised while opening or reading a segment file.
///
/// A segment that fails to open is unrecoverable; there is no repair path.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is shorter than its own header and sections claim.
    #[error("segment file truncated")]
    Truncated,

    /// A structural invariant of the format does not hold.
    #[error("corrupt segment: {0}")]
    Corrupt(&'static str),
}

/// An immutable on-disk segment plus its in-memory descriptor.
///
/// [`open`](Segment::open) loads the header, the bloom bitmap, and the full
/// sparse index into memory; value blobs stay on disk and are fetched with a
/// single seek + read per lookup. A persistent file handle is kept behind a
/// `Mutex` so `get` works through `&self`.
///
/// Once opened, everything here is effectively immutable — the engine shares
/// descriptors freely across threads and only ever drops them (after a major
/// compaction deletes the underlying file).
pub struct Segment<K> {
    level: u32,
    order: u32,
    path: PathBuf,
    header: SegmentHeader<K>,
    bloom: BloomFilter,
    /// Ascending (key, absolute byte offset) pairs, one per entry.
    index: Vec<(K, u64)>,
    file: Mutex<BufReader<File>>,
    file_len: u64,
}

impl<K: KeyCodec> Segment<K> {
    /// Opens a segment file and loads its descriptor.
    ///
    /// # Validation
    ///
    /// - The file must be large enough for header + bloom + index.
    /// - Index keys must be strictly ascending.
    /// - Index offsets must be strictly increasing and inside the file.
    pub fn open(path: &Path, level: u32, order: u32, bloom_bits: u64) -> Result<Self, SegmentError> {
        let f = File::open(path)?;
        let file_len = f.metadata()?.len();
        let mut reader = BufReader::new(f);

        if file_len < SegmentHeader::<K>::encoded_len() {
            return Err(SegmentError::Truncated);
        }
        let header = SegmentHeader::<K>::read_from(&mut reader)?;

        let values_base = values_base_offset::<K>(header.entry_count, bloom_bits);
        if file_len < values_base {
            return Err(SegmentError::Truncated);
        }

        let mut bitmap = vec![0u8; (bloom_bits / 8) as usize];
        reader.read_exact(&mut bitmap)?;
        let bloom = BloomFilter::from_bitmap(bitmap, bloom_bits);

        let mut index: Vec<(K, u64)> = Vec::with_capacity(header.entry_count as usize);
        let mut key_buf = vec![0u8; K::WIDTH];
        for _ in 0..header.entry_count {
            reader.read_exact(&mut key_buf)?;
            let key = K::decode(&key_buf);
            let offset = reader.read_u64::<LittleEndian>()?;

            if let Some(&(prev_key, prev_offset)) = index.last() {
                if prev_key >= key {
                    return Err(SegmentError::Corrupt("index keys out of order"));
                }
                if prev_offset >= offset {
                    return Err(SegmentError::Corrupt("index offsets not increasing"));
                }
            } else if offset != values_base {
                return Err(SegmentError::Corrupt("first value offset mismatch"));
            }
            if offset >= file_len {
                return Err(SegmentError::Corrupt("value offset beyond end of file"));
            }
            index.push((key, offset));
        }

        Ok(Self {
            level,
            order,
            path: path.to_path_buf(),
            header,
            bloom,
            index,
            file: Mutex::new(reader),
            file_len,
        })
    }

    /// Point lookup for a single key.
    ///
    /// The bloom filter is consulted first; a negative answer means the key
    /// is definitely absent and costs no I/O. On a possible hit the sparse
    /// index is binary-searched, and only an exact match reads the value
    /// blob (which may be a tombstone).
    pub fn get<V: ValueCodec>(&self, key: &K) -> Result<Option<Entry<V>>, SegmentError> {
        if !self.bloom.may_contain(&key.encoded()) {
            return Ok(None);
        }
        let slot = match self.index.binary_search_by(|(k, _)| k.cmp(key)) {
            Ok(i) => i,
            Err(_) => return Ok(None),
        };
        self.read_entry_at(slot).map(Some)
    }

    /// Reads every entry in key order. Used by major compaction, which
    /// consumes whole segments at a time.
    pub fn read_all<V: ValueCodec>(&self) -> Result<Vec<(K, Entry<V>)>, SegmentError> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        // One sequential read of the whole values region, then slice it up.
        let base = self.index[0].1;
        let mut region = vec![0u8; (self.file_len - base) as usize];
        {
            let mut file = self.lock_file()?;
            file.seek(SeekFrom::Start(base))?;
            file.read_exact(&mut region)?;
        }

        let mut out = Vec::with_capacity(self.index.len());
        for i in 0..self.index.len() {
            let (start, end) = self.blob_range(i);
            let blob = &region[(start - base) as usize..(end - base) as usize];
            out.push((self.index[i].0, decode_entry(blob)?));
        }
        Ok(out)
    }

    /// Generation timestamp from the header.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.header.timestamp
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn min_key(&self) -> K {
        self.header.min_key
    }

    #[must_use]
    pub fn max_key(&self) -> K {
        self.header.max_key
    }

    /// Number of entries in the segment.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ---- Internal helpers ----

    /// Byte range of value blob `i`: up to the next offset, or to EOF for
    /// the last entry.
    fn blob_range(&self, i: usize) -> (u64, u64) {
        let start = self.index[i].1;
        let end = if i + 1 < self.index.len() {
            self.index[i + 1].1
        } else {
            self.file_len
        };
        (start, end)
    }

    fn read_entry_at<V: ValueCodec>(&self, i: usize) -> Result<Entry<V>, SegmentError> {
        let (start, end) = self.blob_range(i);
        let mut blob = vec![0u8; (end - start) as usize];
        let mut file = self.lock_file()?;
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut blob)?;
        drop(file);
        decode_entry(&blob)
    }

    fn lock_file(&self) -> Result<std::sync::MutexGuard<'_, BufReader<File>>, SegmentError> {
        self.file.lock().map_err(|_| {
            SegmentError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "segment file lock poisoned",
            ))
        })
    }
}

impl<K: KeyCodec + std::fmt::Debug> std::fmt::Debug for Segment<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("level", &self.level)
            .field("order", &self.order)
            .field("timestamp", &self.header.timestamp)
            .field("entries", &self.index.len())
            .field("min_key", &self.header.min_key)
            .field("max_key", &self.header.max_key)
            .finish()
    }
}
