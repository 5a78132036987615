use super::*;
use crate::format::values_base_offset;
use anyhow::Result;
use memtable::Memtable;
use tempfile::tempdir;

fn make_sample_memtable() -> Memtable<u64, String> {
    let mut m = Memtable::new();
    m.put(2, value("banana"));
    m.put(1, value("apple"));
    m.put(3, Entry::Value(String::new())); // present but empty value
    m.put(4, Entry::Tombstone);
    m
}

#[test]
fn write_empty_memtable_is_rejected() {
    let dir = tempdir().unwrap();
    let path = segment_path(dir.path(), 0, 0);
    let mem: Memtable<u64, String> = Memtable::new();

    let result = SegmentWriter::write_from_memtable(&path, &mem, 1, TEST_BLOOM_BITS);
    assert!(result.is_err(), "writing an empty memtable should fail");
    assert!(
        result.unwrap_err().to_string().contains("empty"),
        "error message should mention 'empty'"
    );
    assert!(!path.exists(), "no .sst file should be created");
}

#[test]
fn write_empty_entry_slice_is_rejected() {
    let dir = tempdir().unwrap();
    let path = segment_path(dir.path(), 0, 0);
    let entries: Vec<(u64, Entry<String>)> = Vec::new();

    let result = SegmentWriter::write_from_entries(&path, &entries, 1, TEST_BLOOM_BITS);
    assert!(result.is_err());
    assert!(!path.exists());
}

#[test]
fn write_then_reopen_roundtrip() -> Result<()> {
    let dir = tempdir()?;
    let path = segment_path(dir.path(), 0, 0);
    let mem = make_sample_memtable();

    SegmentWriter::write_from_memtable(&path, &mem, 7, TEST_BLOOM_BITS)?;
    let seg: Segment<u64> = Segment::open(&path, 0, 0, TEST_BLOOM_BITS)?;

    assert_eq!(seg.timestamp(), 7);
    assert_eq!(seg.level(), 0);
    assert_eq!(seg.order(), 0);
    assert_eq!(seg.len(), 4);
    assert_eq!(seg.min_key(), 1);
    assert_eq!(seg.max_key(), 4);

    assert_eq!(seg.get::<String>(&1)?, Some(value("apple")));
    assert_eq!(seg.get::<String>(&2)?, Some(value("banana")));
    assert_eq!(seg.get::<String>(&3)?, Some(Entry::Value(String::new())));
    assert_eq!(seg.get::<String>(&4)?, Some(Entry::Tombstone));
    Ok(())
}

#[test]
fn file_size_matches_layout() -> Result<()> {
    let dir = tempdir()?;
    let path = segment_path(dir.path(), 0, 0);
    let mem = make_sample_memtable();

    SegmentWriter::write_from_memtable(&path, &mem, 1, TEST_BLOOM_BITS)?;

    // Blobs: tag + "apple", tag + "banana", tag + "", tombstone tag.
    let blob_bytes: u64 = (1 + 5) + (1 + 6) + (1 + 0) + 1;
    let expected = values_base_offset::<u64>(4, TEST_BLOOM_BITS) + blob_bytes;
    assert_eq!(std::fs::metadata(&path)?.len(), expected);
    Ok(())
}

#[test]
fn no_temp_file_left_behind() -> Result<()> {
    let dir = tempdir()?;
    let path = segment_path(dir.path(), 0, 3);
    let mem = make_sample_memtable();

    SegmentWriter::write_from_memtable(&path, &mem, 1, TEST_BLOOM_BITS)?;

    assert!(path.exists());
    assert!(!temp_path(&path).exists(), ".temp twin must be renamed away");
    Ok(())
}

#[test]
fn write_from_entries_matches_memtable_write() -> Result<()> {
    let dir = tempdir()?;
    let entries = vec![(10u64, value("x")), (20, Entry::Tombstone), (30, value("z"))];

    let seg = write_segment(dir.path(), 0, 5, &entries);
    assert_eq!(seg.len(), 3);
    assert_eq!(seg.min_key(), 10);
    assert_eq!(seg.max_key(), 30);
    assert_eq!(seg.read_all::<String>()?, entries);
    Ok(())
}

#[test]
fn single_entry_segment() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_segment(dir.path(), 0, 1, &[(42u64, value("only"))]);

    assert_eq!(seg.min_key(), 42);
    assert_eq!(seg.max_key(), 42);
    assert_eq!(seg.get::<String>(&42)?, Some(value("only")));
    Ok(())
}
