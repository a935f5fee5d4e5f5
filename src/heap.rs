use std::time::Instant;

use atomic::{Atomic, Ordering};
use parking_lot::Mutex;

use crate::collection_set::CollectionSet;
use crate::free_set::FreeSet;
use crate::generation::{Generation, GenerationKind};
use crate::heuristics::adaptive::AdaptiveHeuristics;
use crate::heuristics::old::OldHeuristics;
use crate::region::{HeapArguments, HeapOptions, HeapRegion};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    NonGenerational,
    Generational,
}

impl Mode {
    pub fn is_generational(&self) -> bool {
        *self == Mode::Generational
    }
}

/// The heap facade the heuristics pull their inputs from: the region table,
/// the free and collection sets, the generations, evacuation reserves,
/// promotion figures published by marking, and the monotonic clock.
pub struct Heap {
    options: HeapOptions,
    mode: Mode,
    regions: Vec<HeapRegion>,
    free_set: Mutex<FreeSet>,
    collection_set: Mutex<CollectionSet>,
    global: Generation,
    young: Option<Generation>,
    old: Option<Generation>,
    young_evac_reserve: Atomic<usize>,
    old_evac_reserve: Atomic<usize>,
    promotion_potential: Atomic<usize>,
    promotion_in_place_potential: Atomic<usize>,
    epoch: Instant,
}

impl Heap {
    pub fn new(args: &HeapArguments, mode: Mode) -> Self {
        let options = HeapRegion::setup_sizes(args);
        let regions: Vec<HeapRegion> = (0..options.region_count)
            .map(|index| HeapRegion::new(index, &options))
            .collect();

        let mut free_set = FreeSet::new(&options);
        free_set.rebuild(&regions);
        let collection_set = CollectionSet::new(&options);

        let global = Generation::new(
            GenerationKind::Global,
            options.max_heap_size,
            Box::new(AdaptiveHeuristics::new(&options, GenerationKind::Global)),
        );
        let (young, old) = if mode.is_generational() {
            (
                Some(Generation::new(
                    GenerationKind::Young,
                    options.max_heap_size,
                    Box::new(AdaptiveHeuristics::new(&options, GenerationKind::Young)),
                )),
                Some(Generation::new(
                    GenerationKind::Old,
                    options.max_heap_size,
                    Box::new(OldHeuristics::new(&options)),
                )),
            )
        } else {
            (None, None)
        };

        Self {
            options,
            mode,
            regions,
            free_set: Mutex::new(free_set),
            collection_set: Mutex::new(collection_set),
            global,
            young,
            old,
            young_evac_reserve: Atomic::new(0),
            old_evac_reserve: Atomic::new(0),
            promotion_potential: Atomic::new(0),
            promotion_in_place_potential: Atomic::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn options(&self) -> &HeapOptions {
        &self.options
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn max_capacity(&self) -> usize {
        self.options.max_heap_size
    }

    pub fn capacity(&self) -> usize {
        self.options.max_heap_size
    }

    pub fn regions(&self) -> &[HeapRegion] {
        &self.regions
    }

    pub fn region(&self, idx: usize) -> &HeapRegion {
        &self.regions[idx]
    }

    pub fn free_set(&self) -> &Mutex<FreeSet> {
        &self.free_set
    }

    pub fn collection_set(&self) -> &Mutex<CollectionSet> {
        &self.collection_set
    }

    pub fn global_generation(&self) -> &Generation {
        &self.global
    }

    pub fn young_generation(&self) -> &Generation {
        match &self.young {
            Some(young) => young,
            None => panic!("young generation requires a generational heap"),
        }
    }

    pub fn old_generation(&self) -> &Generation {
        match &self.old {
            Some(old) => old,
            None => panic!("old generation requires a generational heap"),
        }
    }

    pub fn get_young_evac_reserve(&self) -> usize {
        self.young_evac_reserve.load(Ordering::Relaxed)
    }

    pub fn set_young_evac_reserve(&self, bytes: usize) {
        self.young_evac_reserve.store(bytes, Ordering::Relaxed);
    }

    pub fn get_old_evac_reserve(&self) -> usize {
        self.old_evac_reserve.load(Ordering::Relaxed)
    }

    pub fn set_old_evac_reserve(&self, bytes: usize) {
        self.old_evac_reserve.store(bytes, Ordering::Relaxed);
    }

    /// Live bytes in tenured young regions the next cycle intends to move to
    /// the old generation. Published by marking.
    pub fn get_promotion_potential(&self) -> usize {
        self.promotion_potential.load(Ordering::Relaxed)
    }

    pub fn set_promotion_potential(&self, bytes: usize) {
        self.promotion_potential.store(bytes, Ordering::Relaxed);
    }

    pub fn get_promotion_in_place_potential(&self) -> usize {
        self.promotion_in_place_potential.load(Ordering::Relaxed)
    }

    pub fn set_promotion_in_place_potential(&self, bytes: usize) {
        self.promotion_in_place_potential
            .store(bytes, Ordering::Relaxed);
    }

    /// Monotonic seconds since the heap came up.
    pub fn elapsed_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}
