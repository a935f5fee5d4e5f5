use atomic::{Atomic, Ordering};
use parking_lot::Mutex;

use crate::heuristics::Heuristics;
use crate::region::HeapRegion;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GenerationKind {
    Young,
    Old,
    Global,
}

/// A logical partition of the heap. Every generation owns one heuristic;
/// the collector's control thread is the only caller that ever locks it.
pub struct Generation {
    kind: GenerationKind,
    max_capacity: Atomic<usize>,
    soft_max_capacity: Atomic<usize>,
    used: Atomic<usize>,
    bytes_allocated_since_gc_start: Atomic<usize>,
    heuristics: Mutex<Box<dyn Heuristics>>,
}

impl Generation {
    pub fn new(kind: GenerationKind, max_capacity: usize, heuristics: Box<dyn Heuristics>) -> Self {
        Self {
            kind,
            max_capacity: Atomic::new(max_capacity),
            soft_max_capacity: Atomic::new(max_capacity),
            used: Atomic::new(0),
            bytes_allocated_since_gc_start: Atomic::new(0),
            heuristics: Mutex::new(heuristics),
        }
    }

    pub fn kind(&self) -> GenerationKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            GenerationKind::Young => "Young",
            GenerationKind::Old => "Old",
            GenerationKind::Global => "Global",
        }
    }

    pub fn is_young(&self) -> bool {
        self.kind == GenerationKind::Young
    }

    pub fn is_old(&self) -> bool {
        self.kind == GenerationKind::Old
    }

    pub fn is_global(&self) -> bool {
        self.kind == GenerationKind::Global
    }

    /// Whether this generation collects the given region.
    pub fn contains(&self, region: &HeapRegion) -> bool {
        match self.kind {
            GenerationKind::Young => region.is_young(),
            GenerationKind::Old => region.is_old(),
            GenerationKind::Global => true,
        }
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity.load(Ordering::Relaxed)
    }

    pub fn soft_max_capacity(&self) -> usize {
        self.soft_max_capacity.load(Ordering::Relaxed)
    }

    pub fn set_soft_max_capacity(&self, capacity: usize) {
        debug_assert!(capacity <= self.max_capacity());
        self.soft_max_capacity.store(capacity, Ordering::Relaxed);
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn set_used(&self, bytes: usize) {
        self.used.store(bytes, Ordering::Relaxed);
    }

    pub fn increase_used(&self, bytes: usize) {
        self.used.fetch_add(bytes, Ordering::Relaxed);
        self.bytes_allocated_since_gc_start
            .fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn decrease_used(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::Relaxed);
    }

    pub fn available(&self) -> usize {
        self.max_capacity().saturating_sub(self.used())
    }

    pub fn soft_available(&self) -> usize {
        self.soft_max_capacity().saturating_sub(self.used())
    }

    pub fn bytes_allocated_since_gc_start(&self) -> usize {
        self.bytes_allocated_since_gc_start.load(Ordering::Relaxed)
    }

    pub fn set_bytes_allocated_since_gc_start(&self, bytes: usize) {
        self.bytes_allocated_since_gc_start
            .store(bytes, Ordering::Relaxed);
    }

    pub fn reset_bytes_allocated_since_gc_start(&self) {
        self.bytes_allocated_since_gc_start.store(0, Ordering::Relaxed);
    }

    pub fn heuristics(&self) -> &Mutex<Box<dyn Heuristics>> {
        &self.heuristics
    }
}
