//! Heap accounting allocator.
//!
//! Install [`TrackingAllocator`] as the global allocator to make heap figures
//! available to the monitor. Without it every figure reads zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

static LIVE: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);
static TOTAL: AtomicU64 = AtomicU64::new(0);

/// Wraps the system allocator and counts bytes in and out.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator;

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            on_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        LIVE.fetch_sub(layout.size(), Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            LIVE.fetch_sub(layout.size(), Ordering::Relaxed);
            on_alloc(new_size);
        }
        new_ptr
    }
}

fn on_alloc(size: usize) {
    let live = LIVE.fetch_add(size, Ordering::Relaxed) + size;
    PEAK.fetch_max(live, Ordering::Relaxed);
    TOTAL.fetch_add(size as u64, Ordering::Relaxed);
}

/// Point-in-time heap figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Bytes currently allocated.
    pub live_bytes: u64,
    /// High-water mark since the last [`reset_peak`].
    pub peak_bytes: u64,
    /// Bytes ever allocated.
    pub total_allocated_bytes: u64,
}

pub fn heap_stats() -> HeapStats {
    HeapStats {
        live_bytes: LIVE.load(Ordering::Relaxed) as u64,
        peak_bytes: PEAK.load(Ordering::Relaxed) as u64,
        total_allocated_bytes: TOTAL.load(Ordering::Relaxed),
    }
}

/// Reset the high-water mark to the current live size and return the old one.
pub fn reset_peak() -> u64 {
    let live = LIVE.load(Ordering::Relaxed);
    PEAK.swap(live, Ordering::Relaxed) as u64
}

/// Whether the tracking allocator is actually installed in this process.
pub fn is_active() -> bool {
    TOTAL.load(Ordering::Relaxed) > 0
}
