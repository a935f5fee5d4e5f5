use crate::region::{HeapOptions, HeapRegion};
use crate::utils::formatted_size;

/// Free regions, partitioned into a mutator view and a collector view. The
/// collector view is carved off the right end of the heap so evacuation
/// always has somewhere to copy to; only the mutator view counts towards
/// [`FreeSet::available`].
pub struct FreeSet {
    mutator_free: Box<[bool]>,
    collector_free: Box<[bool]>,
    mutator_leftmost: usize,
    mutator_rightmost: usize,
    collector_leftmost: usize,
    collector_rightmost: usize,
    capacity: usize,
    used: usize,
}

impl FreeSet {
    pub fn new(options: &HeapOptions) -> Self {
        let count = options.region_count;
        Self {
            mutator_free: vec![false; count].into_boxed_slice(),
            collector_free: vec![false; count].into_boxed_slice(),
            mutator_leftmost: count,
            mutator_rightmost: 0,
            collector_leftmost: count,
            collector_rightmost: 0,
            capacity: 0,
            used: 0,
        }
    }

    pub fn clear(&mut self) {
        let count = self.mutator_free.len();
        self.mutator_free.fill(false);
        self.collector_free.fill(false);
        self.mutator_leftmost = count;
        self.mutator_rightmost = 0;
        self.collector_leftmost = count;
        self.collector_rightmost = 0;
        self.capacity = 0;
        self.used = 0;
    }

    /// Rescan the region table, claiming every fully free region for the
    /// mutator view.
    pub fn rebuild(&mut self, regions: &[HeapRegion]) {
        self.clear();
        for region in regions {
            if region.is_empty() {
                let idx = region.index();
                self.mutator_free[idx] = true;
                self.mutator_leftmost = self.mutator_leftmost.min(idx);
                self.mutator_rightmost = self.mutator_rightmost.max(idx);
                self.capacity += region.free();
            }
        }
        log::debug!(target: "gc", "Free set rebuilt, capacity: {}", formatted_size(self.capacity));
    }

    /// Move regions from the right end of the mutator view into the
    /// collector view until `to_reserve` bytes are set aside.
    pub fn reserve_regions(&mut self, regions: &[HeapRegion], to_reserve: usize) {
        if self.mutator_leftmost > self.mutator_rightmost {
            return;
        }
        let mut reserved = 0;
        let mut idx = self.mutator_rightmost;
        loop {
            if reserved >= to_reserve {
                break;
            }
            if self.mutator_free[idx] {
                let bytes = regions[idx].free();
                self.mutator_free[idx] = false;
                self.collector_free[idx] = true;
                self.collector_leftmost = self.collector_leftmost.min(idx);
                self.collector_rightmost = self.collector_rightmost.max(idx);
                self.capacity -= bytes;
                reserved += bytes;
            }
            if idx == self.mutator_leftmost {
                break;
            }
            idx -= 1;
        }
        self.recompute_mutator_bounds();
    }

    fn recompute_mutator_bounds(&mut self) {
        let count = self.mutator_free.len();
        self.mutator_leftmost = count;
        self.mutator_rightmost = 0;
        for idx in 0..count {
            if self.mutator_free[idx] {
                self.mutator_leftmost = self.mutator_leftmost.min(idx);
                self.mutator_rightmost = self.mutator_rightmost.max(idx);
            }
        }
    }

    pub fn is_mutator_free(&self, idx: usize) -> bool {
        self.mutator_free[idx]
    }

    pub fn is_collector_free(&self, idx: usize) -> bool {
        self.collector_free[idx]
    }

    pub fn increase_used(&mut self, bytes: usize) {
        self.used += bytes;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Bytes the mutator may still allocate. The collector reserve is not
    /// included; triggers clamp the generation's own availability to this
    /// figure.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.used)
    }
}
