//! Constant-volume greedy bin-packing (§4.2 step 4, §8 invariants 1-2).
//!
//! Items are sorted by size descending and placed into the first bin with
//! room; a new bin opens only when none admits the item. A single item
//! larger than `capacity` gets a bin to itself. Deterministic; the test
//! suite only pins partition cardinality and per-bin sum, not the exact
//! assignment (§9).

pub fn pack_constant_volume<T>(mut items: Vec<(u64, T)>, capacity: u64) -> Vec<Vec<(u64, T)>> {
    items.sort_by(|a, b| b.0.cmp(&a.0));
    let mut bin_used: Vec<u64> = Vec::new();
    let mut bins: Vec<Vec<(u64, T)>> = Vec::new();
    for (size, item) in items {
        match bin_used.iter().position(|&used| used + size <= capacity) {
            Some(i) => {
                bin_used[i] += size;
                bins[i].push((size, item));
            }
            None => {
                bin_used.push(size);
                bins.push(vec![(size, item)]);
            }
        }
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_without_exceeding_capacity() {
        let items = vec![(300u64, "a"), (400, "b"), (500, "c")];
        let bins = pack_constant_volume(items, 1000);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].len(), 3);
    }

    #[test]
    fn splits_when_capacity_exceeded() {
        let items = vec![(700u64, "a"), (600, "b"), (500, "c"), (400, "d")];
        let bins = pack_constant_volume(items, 1000);
        let total_items: usize = bins.iter().map(|b| b.len()).sum();
        assert_eq!(total_items, 4);
        for bin in &bins {
            let sum: u64 = bin.iter().map(|(s, _)| *s).sum();
            assert!(sum <= 1000, "bin sum {sum} exceeded capacity");
        }
        assert!(bins.len() >= 2);
    }

    #[test]
    fn oversized_single_item_gets_its_own_bin() {
        let items = vec![(1500u64, "huge"), (100, "small")];
        let bins = pack_constant_volume(items, 1000);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].len(), 1);
        assert_eq!(bins[0][0].0, 1500);
    }

    #[test]
    fn cardinality_gate_observable_on_bins() {
        let items: Vec<(u64, usize)> = (0..30_000).map(|i| (1u64, i)).collect();
        let bins = pack_constant_volume(items, 1_000_000_000);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].len(), 30_000);
    }

    #[test]
    fn item_equal_to_capacity_is_its_own_bin() {
        let items = vec![(1000u64, "exact")];
        let bins = pack_constant_volume(items, 1000);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].len(), 1);
    }
}
