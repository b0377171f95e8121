use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counting allocator for allocation-budget tests.
///
/// Install it as the `#[global_allocator]` of a test binary with a single
/// `#[test]`, since counters are process-wide.
pub struct BudgetAlloc {
    live: AtomicUsize,
    peak: AtomicUsize,
    allocations: AtomicUsize,
}

/// Counters observed across one [`BudgetAlloc::track`] call.
#[derive(Clone, Copy, Debug)]
pub struct AllocSnapshot {
    /// Peak bytes above the level live when tracking started.
    pub peak_bytes: usize,
    pub allocations: usize,
    /// Bytes still held when the closure returned (its result included).
    pub retained_bytes: usize,
}

impl AllocSnapshot {
    pub fn peak_kib(&self) -> f64 {
        self.peak_bytes as f64 / 1024.0
    }
}

impl BudgetAlloc {
    pub const fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
        }
    }

    /// Run `f` and report what it allocated relative to the current level.
    pub fn track<T>(&self, f: impl FnOnce() -> T) -> (T, AllocSnapshot) {
        let baseline = self.live.load(Ordering::SeqCst);
        self.peak.store(baseline, Ordering::SeqCst);
        let allocations_before = self.allocations.load(Ordering::SeqCst);

        let value = f();

        let snapshot = AllocSnapshot {
            peak_bytes: self.peak.load(Ordering::SeqCst).saturating_sub(baseline),
            allocations: self.allocations.load(Ordering::SeqCst) - allocations_before,
            retained_bytes: self.live.load(Ordering::SeqCst).saturating_sub(baseline),
        };
        (value, snapshot)
    }

    fn grow(&self, bytes: usize) {
        let now = self.live.fetch_add(bytes, Ordering::SeqCst) + bytes;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn shrink(&self, bytes: usize) {
        let _ = self
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                Some(live.saturating_sub(bytes))
            });
    }

    fn note_allocation(&self, ptr: *mut u8, bytes: usize) {
        if !ptr.is_null() {
            self.grow(bytes);
            self.allocations.fetch_add(1, Ordering::SeqCst);
        }
    }
}

unsafe impl GlobalAlloc for BudgetAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        self.note_allocation(ptr, layout.size());
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        self.note_allocation(ptr, layout.size());
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        self.shrink(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            self.shrink(layout.size());
            self.note_allocation(new_ptr, new_size);
        }
        new_ptr
    }
}
