//! Segment binary format constants and header read/write helpers.
//!
//! ## Layout (all integers little-endian, fields fixed-width)
//!
//! ```text
//! [timestamp: u64][entry_count: u64][min_key: K::WIDTH][max_key: K::WIDTH]
//! [bloom bitmap: bloom_bits / 8 bytes, MSB-first within each byte]
//! [index: entry_count x (key: K::WIDTH, offset: u64)]
//! [values: entry_count entry blobs, concatenated in key order]
//! ```
//!
//! `offset[i]` is the absolute byte position of value blob i, so blob i
//! spans `[offset[i], offset[i+1])` and the last blob runs to end of file.
//!
//! An entry blob is `[tag: u8][value bytes]` — tag 1 carries a live value,
//! tag 0 is a tombstone with no payload.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memtable::Entry;
use std::io::{Read, Result as IoResult, Write};
use std::path::{Path, PathBuf};

use crate::codec::{KeyCodec, ValueCodec};
use crate::reader::SegmentError;

/// Entry blob tag for a tombstone.
pub const TAG_TOMBSTONE: u8 = 0;

/// Entry blob tag for a live value.
pub const TAG_VALUE: u8 = 1;

/// Suffix appended to a segment path while it is being written.
pub const TEMP_SUFFIX: &str = ".temp";

/// `<level>-<order>.sst` inside the engine's data directory.
pub fn segment_path(dir: &Path, level: u32, order: u32) -> PathBuf {
    dir.join(format!("{}-{}.sst", level, order))
}

/// The in-progress twin of a segment path: `<level>-<order>.sst.temp`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Parses `<level>-<order>.sst` back into `(level, order)`.
pub fn parse_segment_name(name: &str) -> Option<(u32, u32)> {
    let stem = name.strip_suffix(".sst")?;
    let (level, order) = stem.split_once('-')?;
    Some((level.parse().ok()?, order.parse().ok()?))
}

/// Fixed-width segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader<K> {
    /// Generation timestamp; higher wins on duplicate keys across segments.
    pub timestamp: u64,
    pub entry_count: u64,
    pub min_key: K,
    pub max_key: K,
}

impl<K: KeyCodec> SegmentHeader<K> {
    /// Header size in bytes: two u64 fields plus two fixed-width keys.
    pub fn encoded_len() -> u64 {
        8 + 8 + 2 * K::WIDTH as u64
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> IoResult<()> {
        w.write_u64::<LittleEndian>(self.timestamp)?;
        w.write_u64::<LittleEndian>(self.entry_count)?;
        w.write_all(&self.min_key.encoded())?;
        w.write_all(&self.max_key.encoded())?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> IoResult<Self> {
        let timestamp = r.read_u64::<LittleEndian>()?;
        let entry_count = r.read_u64::<LittleEndian>()?;
        let mut raw = vec![0u8; K::WIDTH];
        r.read_exact(&mut raw)?;
        let min_key = K::decode(&raw);
        r.read_exact(&mut raw)?;
        let max_key = K::decode(&raw);
        Ok(Self {
            timestamp,
            entry_count,
            min_key,
            max_key,
        })
    }
}

/// Size of one sparse-index entry: fixed-width key plus u64 offset.
pub fn index_entry_len<K: KeyCodec>() -> u64 {
    K::WIDTH as u64 + 8
}

/// Absolute offset of the first value blob: header + bloom bitmap + index.
pub fn values_base_offset<K: KeyCodec>(entry_count: u64, bloom_bits: u64) -> u64 {
    SegmentHeader::<K>::encoded_len() + bloom_bits / 8 + entry_count * index_entry_len::<K>()
}

/// Encoded size of an entry blob: tag byte plus value bytes.
pub fn entry_encoded_len<V: ValueCodec>(entry: &Entry<V>) -> u64 {
    match entry {
        Entry::Value(v) => 1 + v.encoded_len(),
        Entry::Tombstone => 1,
    }
}

/// Appends an entry blob (`[tag][value bytes]`) to `buf`.
pub fn encode_entry<V: ValueCodec>(entry: &Entry<V>, buf: &mut Vec<u8>) {
    match entry {
        Entry::Value(v) => {
            buf.push(TAG_VALUE);
            v.encode_into(buf);
        }
        Entry::Tombstone => buf.push(TAG_TOMBSTONE),
    }
}

/// Decodes an entry blob previously produced by [`encode_entry`].
pub fn decode_entry<V: ValueCodec>(buf: &[u8]) -> Result<Entry<V>, SegmentError> {
    match buf.split_first() {
        Some((&TAG_VALUE, rest)) => Ok(Entry::Value(V::decode(rest)?)),
        Some((&TAG_TOMBSTONE, rest)) if rest.is_empty() => Ok(Entry::Tombstone),
        _ => Err(SegmentError::Corrupt("invalid entry blob tag")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_path_and_parse_roundtrip() {
        let p = segment_path(Path::new("/data"), 0, 17);
        assert_eq!(p, Path::new("/data/0-17.sst"));
        assert_eq!(parse_segment_name("0-17.sst"), Some((0, 17)));
        assert_eq!(parse_segment_name("0-17.sst.temp"), None);
        assert_eq!(parse_segment_name("junk"), None);
    }

    #[test]
    fn temp_path_appends_suffix() {
        let p = temp_path(Path::new("/data/0-3.sst"));
        assert_eq!(p, Path::new("/data/0-3.sst.temp"));
    }

    #[test]
    fn header_roundtrip() {
        let h = SegmentHeader::<u64> {
            timestamp: 42,
            entry_count: 7,
            min_key: 1,
            max_key: 99,
        };
        let mut buf = Vec::new();
        h.write_to(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, SegmentHeader::<u64>::encoded_len());

        let back = SegmentHeader::<u64>::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn entry_blob_roundtrip() {
        let mut buf = Vec::new();
        encode_entry(&Entry::Value("hello".to_string()), &mut buf);
        assert_eq!(buf.len() as u64, entry_encoded_len(&Entry::Value("hello".to_string())));
        let back: Entry<String> = decode_entry(&buf).unwrap();
        assert_eq!(back, Entry::Value("hello".to_string()));

        buf.clear();
        encode_entry::<String>(&Entry::Tombstone, &mut buf);
        assert_eq!(buf, vec![TAG_TOMBSTONE]);
        let back: Entry<String> = decode_entry(&buf).unwrap();
        assert!(back.is_tombstone());
    }

    #[test]
    fn decode_entry_rejects_garbage() {
        assert!(decode_entry::<String>(&[]).is_err());
        assert!(decode_entry::<String>(&[9, 1, 2]).is_err());
        // A tombstone with trailing bytes is corrupt.
        assert!(decode_entry::<String>(&[TAG_TOMBSTONE, 1]).is_err());
    }

    #[test]
    fn values_base_accounts_for_all_sections() {
        // u64 keys: header 32, bloom 10240, index 5 * 16.
        assert_eq!(values_base_offset::<u64>(5, 81920), 32 + 10240 + 80);
    }
}
