//! Exercises the Picker's packing-then-cardinality-gate interplay through
//! the crate's public API, without a real LTA DB or File Catalog:
//! `pack_constant_volume` is the same function
//! `Picker::process_transfer_request` calls, so asserting its output
//! against `MAX_FILE_COUNT` here pins the same contract the Picker
//! enforces before ever reaching the network.

use lta_worker::packing::pack_constant_volume;

fn exceeds_cardinality(bins: &[Vec<(u64, &'static str)>], max_file_count: u64) -> bool {
    bins.iter().any(|bin| bin.len() as u64 > max_file_count)
}

#[test]
fn small_request_fits_under_the_cardinality_gate() {
    let items: Vec<(u64, &'static str)> = (0..10).map(|i| (1u64, Box::leak(i.to_string().into_boxed_str()) as &'static str)).collect();
    let bins = pack_constant_volume(items, 100);
    assert_eq!(bins.len(), 1);
    assert!(!exceeds_cardinality(&bins, 25));
}

#[test]
fn oversized_bin_trips_the_cardinality_gate() {
    // 30 one-byte files all fit a single 100-byte bundle by size, but a
    // MAX_FILE_COUNT of 25 should still reject it.
    let items: Vec<(u64, &'static str)> = (0..30).map(|i| (1u64, Box::leak(i.to_string().into_boxed_str()) as &'static str)).collect();
    let bins = pack_constant_volume(items, 100);
    assert_eq!(bins.len(), 1);
    assert!(exceeds_cardinality(&bins, 25));
}

#[test]
fn size_driven_split_keeps_every_bin_under_the_gate() {
    // Large files that force many bins by size should still each land
    // comfortably under a generous cardinality gate.
    let items: Vec<(u64, &'static str)> = (0..8).map(|i| (130u64, Box::leak(i.to_string().into_boxed_str()) as &'static str)).collect();
    let bins = pack_constant_volume(items, 100);
    assert!(bins.len() >= 8);
    assert!(!exceeds_cardinality(&bins, 25));
}
