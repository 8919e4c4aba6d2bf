//! Test corpus model and shard partitioning.

use std::ops::Range;

/// One labeled position: a position descriptor and the target outcome
/// probability for the side to move, in `[0, 1]`.
///
/// Records are created once at load and read-only thereafter.
#[derive(Clone, Debug, PartialEq)]
pub struct TestRecord {
    pub position: String,
    pub target: f64,
}

impl TestRecord {
    pub fn new(position: impl Into<String>, target: f64) -> Self {
        Self {
            position: position.into(),
            target,
        }
    }
}

/// Partition `len` records into `count` contiguous, disjoint, order-preserving
/// shards covering the corpus exactly once, sized as evenly as possible.
///
/// The first `len % count` shards take one extra record.
pub fn shard_ranges(len: usize, count: usize) -> Vec<Range<usize>> {
    assert!(count >= 1, "shard count must be at least 1");
    let base = len / count;
    let extra = len % count;
    let mut ranges = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < extra);
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_cover_corpus_exactly_once() {
        for len in [0, 1, 7, 100, 101, 4096] {
            for count in 1..=8 {
                let ranges = shard_ranges(len, count);
                assert_eq!(ranges.len(), count);
                let mut expected_start = 0;
                for range in &ranges {
                    assert_eq!(range.start, expected_start);
                    expected_start = range.end;
                }
                assert_eq!(expected_start, len, "len={len} count={count}");
                let total: usize = ranges.iter().map(|r| r.len()).sum();
                assert_eq!(total, len);
            }
        }
    }

    #[test]
    fn shard_sizes_are_balanced() {
        let ranges = shard_ranges(10, 3);
        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn more_shards_than_records_yields_empty_tails() {
        let ranges = shard_ranges(2, 4);
        let sizes: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![1, 1, 0, 0]);
    }
}
