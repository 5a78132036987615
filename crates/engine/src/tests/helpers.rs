use crate::{Config, Engine};
use std::fs;
use std::path::Path;

/// Engine with a small bloom filter and the given capacity/fan-in, suitable
/// for driving rotations and merges with a handful of keys.
pub fn test_engine(dir: &Path, capacity: u64, fanin: usize) -> Engine<u64, String> {
    let config = Config::default()
        .memtable_capacity(capacity)
        .compaction_fanin(fanin)
        .bloom_bits(8192);
    Engine::open(dir, config).unwrap()
}

pub fn count_sst_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "sst")
                .unwrap_or(false)
        })
        .count()
}
