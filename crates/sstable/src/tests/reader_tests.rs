use super::*;
use crate::format::{values_base_offset, SegmentHeader};
use anyhow::Result;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use tempfile::tempdir;

#[test]
fn open_missing_file_fails() {
    let dir = tempdir().unwrap();
    let path = segment_path(dir.path(), 0, 0);
    let result: Result<Segment<u64>, _> = Segment::open(&path, 0, 0, TEST_BLOOM_BITS);
    assert!(matches!(result, Err(SegmentError::Io(_))));
}

#[test]
fn open_truncated_file_fails() -> Result<()> {
    let dir = tempdir()?;
    let path = segment_path(dir.path(), 0, 0);
    let entries = vec![(1u64, value("a")), (2, value("b"))];
    SegmentWriter::write_from_entries(&path, &entries, 1, TEST_BLOOM_BITS)?;

    // Chop the file in the middle of the bloom section.
    let f = std::fs::OpenOptions::new().write(true).open(&path)?;
    f.set_len(SegmentHeader::<u64>::encoded_len() + 10)?;
    drop(f);

    let result: Result<Segment<u64>, _> = Segment::open(&path, 0, 0, TEST_BLOOM_BITS);
    assert!(matches!(result, Err(SegmentError::Truncated)));
    Ok(())
}

#[test]
fn open_rejects_out_of_order_index() -> Result<()> {
    let dir = tempdir()?;
    let path = segment_path(dir.path(), 0, 0);

    // Hand-craft a file whose index keys are descending.
    let mut buf = Vec::new();
    SegmentHeader::<u64> {
        timestamp: 1,
        entry_count: 2,
        min_key: 1,
        max_key: 2,
    }
    .write_to(&mut buf)?;
    buf.extend_from_slice(&vec![0u8; (TEST_BLOOM_BITS / 8) as usize]);
    let base = values_base_offset::<u64>(2, TEST_BLOOM_BITS);
    buf.write_u64::<LittleEndian>(2)?; // key 2 first
    buf.write_u64::<LittleEndian>(base)?;
    buf.write_u64::<LittleEndian>(1)?; // then key 1
    buf.write_u64::<LittleEndian>(base + 2)?;
    buf.extend_from_slice(&[1, b'x', 1, b'y']);
    std::fs::File::create(&path)?.write_all(&buf)?;

    let result: Result<Segment<u64>, _> = Segment::open(&path, 0, 0, TEST_BLOOM_BITS);
    assert!(matches!(result, Err(SegmentError::Corrupt(_))));
    Ok(())
}

#[test]
fn open_rejects_non_increasing_offsets() -> Result<()> {
    let dir = tempdir()?;
    let path = segment_path(dir.path(), 0, 0);

    let mut buf = Vec::new();
    SegmentHeader::<u64> {
        timestamp: 1,
        entry_count: 2,
        min_key: 1,
        max_key: 2,
    }
    .write_to(&mut buf)?;
    buf.extend_from_slice(&vec![0u8; (TEST_BLOOM_BITS / 8) as usize]);
    let base = values_base_offset::<u64>(2, TEST_BLOOM_BITS);
    buf.write_u64::<LittleEndian>(1)?;
    buf.write_u64::<LittleEndian>(base)?;
    buf.write_u64::<LittleEndian>(2)?;
    buf.write_u64::<LittleEndian>(base)?; // same offset twice
    buf.extend_from_slice(&[1, b'x', 1, b'y']);
    std::fs::File::create(&path)?.write_all(&buf)?;

    let result: Result<Segment<u64>, _> = Segment::open(&path, 0, 0, TEST_BLOOM_BITS);
    assert!(matches!(result, Err(SegmentError::Corrupt(_))));
    Ok(())
}

#[test]
fn absent_key_returns_none() -> Result<()> {
    let dir = tempdir()?;
    let seg = write_segment(dir.path(), 0, 1, &[(10u64, value("x")), (30, value("z"))]);

    // 20 falls between indexed keys; 999 is far outside. Either the bloom
    // filter or the binary search rejects them — both must come back None.
    assert_eq!(seg.get::<String>(&20)?, None);
    assert_eq!(seg.get::<String>(&999)?, None);
    Ok(())
}

#[test]
fn last_entry_reads_to_end_of_file() -> Result<()> {
    let dir = tempdir()?;
    let entries = vec![
        (1u64, value("short")),
        (2, value("a considerably longer final value blob")),
    ];
    let seg = write_segment(dir.path(), 0, 1, &entries);

    assert_eq!(
        seg.get::<String>(&2)?,
        Some(value("a considerably longer final value blob"))
    );
    Ok(())
}

#[test]
fn read_all_yields_ascending_entries() -> Result<()> {
    let dir = tempdir()?;
    let entries: Vec<(u64, Entry<String>)> = (0..50u64)
        .map(|k| {
            if k % 7 == 0 {
                (k, Entry::Tombstone)
            } else {
                (k, value(&format!("v{}", k)))
            }
        })
        .collect();
    let seg = write_segment(dir.path(), 0, 3, &entries);

    assert_eq!(seg.read_all::<String>()?, entries);
    Ok(())
}

#[test]
fn concurrent_gets_share_one_descriptor() -> Result<()> {
    let dir = tempdir()?;
    let entries: Vec<(u64, Entry<String>)> =
        (0..100u64).map(|k| (k, value(&format!("v{}", k)))).collect();
    let seg = std::sync::Arc::new(write_segment(dir.path(), 0, 1, &entries));

    let mut handles = Vec::new();
    for t in 0..4u64 {
        let seg = seg.clone();
        handles.push(std::thread::spawn(move || {
            for k in (t..100).step_by(4) {
                let got = seg.get::<String>(&k).unwrap();
                assert_eq!(got, Some(Entry::Value(format!("v{}", k))));
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    Ok(())
}
