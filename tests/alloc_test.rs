//! Heap accounting with the tracking allocator installed.

use recstream::monitor::alloc::{self, TrackingAllocator};

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[test]
fn counts_allocations_and_tracks_peak() {
    assert!(alloc::is_active());
    let before = alloc::heap_stats();

    let block = std::hint::black_box(vec![0_u8; 4 * 1024 * 1024]);
    let during = alloc::heap_stats();
    assert!(during.total_allocated_bytes >= before.total_allocated_bytes + block.len() as u64);
    assert!(during.peak_bytes >= block.len() as u64);

    drop(block);
    let after = alloc::heap_stats();
    assert!(after.peak_bytes >= 4 * 1024 * 1024);

    let old_peak = alloc::reset_peak();
    assert!(old_peak >= 4 * 1024 * 1024);
    // Other test threads may allocate concurrently, but nothing close to 4 MiB.
    assert!(alloc::heap_stats().peak_bytes < old_peak);
}
