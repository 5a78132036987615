//! Engine configuration for StrataKV.
//!
//! A plain value type with sensible defaults — no file parsing, no I/O.
//! Callers construct one with [`Config::default`] and override individual
//! knobs through the builder-style setters before handing it to the engine.

/// Tuning knobs for a StrataKV engine instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Soft cap on memtable entries before a rotation is requested.
    ///
    /// This is the *starting* threshold: the engine doubles it after every
    /// major compaction, so a long-lived instance flushes progressively
    /// larger memtables.
    pub memtable_capacity: u64,

    /// Number of level-0 segments that triggers a major compaction.
    pub compaction_fanin: usize,

    /// Bloom filter bit-vector length, in bits. Must be a multiple of 8.
    pub bloom_bits: u64,

    /// Maximum skip-list level (level 0 is the full chain).
    pub max_level: usize,

    /// Probability of promoting a new skip-list node one level higher.
    pub probability: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            memtable_capacity: 1024,
            compaction_fanin: 8,
            bloom_bits: 81920,
            max_level: 16,
            probability: 0.5,
        }
    }
}

impl Config {
    pub fn memtable_capacity(mut self, entries: u64) -> Self {
        self.memtable_capacity = entries;
        self
    }

    pub fn compaction_fanin(mut self, segments: usize) -> Self {
        self.compaction_fanin = segments;
        self
    }

    pub fn bloom_bits(mut self, bits: u64) -> Self {
        self.bloom_bits = bits;
        self
    }

    pub fn max_level(mut self, level: usize) -> Self {
        self.max_level = level;
        self
    }

    pub fn probability(mut self, p: f64) -> Self {
        self.probability = p;
        self
    }
}
