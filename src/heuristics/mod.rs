use crate::collection_set::CollectionSet;
use crate::generation::Generation;
use crate::heap::Heap;
use crate::number_seq::TruncatedSeq;
use crate::utils::formatted_size;

pub mod adaptive;
pub mod old;

/// recover from penalties
pub const CONCURRENT_ADJUST: isize = -1;
/// how much to penalize average GC duration history on Degenerated GC
pub const DEGENERATED_PENALTY: isize = 10;
/// how much to penalize average GC duration history on Full GC
pub const FULL_PENALTY: isize = 20;

pub const MOVING_AVERAGE_SAMPLES: usize = 10;

/// A region paired with its sort key, as handed to the collection-set
/// choosers.
#[derive(Clone, Copy, Debug)]
pub struct RegionData {
    pub region: usize,
    pub garbage: usize,
}

/// State every heuristic keeps regardless of policy: the cycle-time history
/// the triggers budget against, the penalty accumulated from degenerated and
/// full collections, and the learning/streak counters.
pub struct HeuristicsBase {
    pub(crate) gc_time_history: TruncatedSeq,
    pub(crate) cycle_start: f64,
    pub(crate) last_cycle_end: f64,
    pub(crate) gc_times_learned: usize,
    pub(crate) gc_time_penalties: isize,
    pub(crate) degenerated_cycles_in_a_row: usize,
    pub(crate) successful_cycles_in_a_row: usize,
}

impl HeuristicsBase {
    pub fn new(decay_factor: f64) -> Self {
        Self {
            gc_time_history: TruncatedSeq::new(MOVING_AVERAGE_SAMPLES, decay_factor),
            cycle_start: 0.0,
            last_cycle_end: 0.0,
            gc_times_learned: 0,
            gc_time_penalties: 0,
            degenerated_cycles_in_a_row: 0,
            successful_cycles_in_a_row: 0,
        }
    }

    pub fn gc_times_learned(&self) -> usize {
        self.gc_times_learned
    }

    pub fn gc_time_penalties(&self) -> isize {
        self.gc_time_penalties
    }

    pub(crate) fn adjust_penalty(&mut self, step: isize) {
        self.gc_time_penalties = (self.gc_time_penalties + step).clamp(0, 100);
    }

    pub(crate) fn record_cycle_start(&mut self, now: f64) {
        self.cycle_start = now;
    }

    pub(crate) fn record_success_concurrent(&mut self, now: f64, abbreviated: bool) {
        self.degenerated_cycles_in_a_row = 0;
        self.successful_cycles_in_a_row += 1;
        // Abbreviated cycles would bias the cycle-time estimate down; only
        // full-length cycles feed the history.
        if !abbreviated {
            self.gc_time_history.add(now - self.cycle_start);
            self.gc_times_learned += 1;
        }
        self.adjust_penalty(CONCURRENT_ADJUST);
    }

    pub(crate) fn record_success_degenerated(&mut self) {
        self.degenerated_cycles_in_a_row += 1;
        self.successful_cycles_in_a_row = 0;
        self.adjust_penalty(DEGENERATED_PENALTY);
    }

    pub(crate) fn record_success_full(&mut self) {
        self.degenerated_cycles_in_a_row = 0;
        self.successful_cycles_in_a_row += 1;
        self.adjust_penalty(FULL_PENALTY);
    }

    /// The time-based fallback trigger: fire once the guaranteed interval
    /// has passed since the previous cycle ended.
    pub(crate) fn should_start_guaranteed_gc(&self, heap: &Heap, name: &str) -> bool {
        let interval_ms = heap.options().guaranteed_gc_interval;
        if interval_ms == 0 {
            return false;
        }
        let since_ms = (heap.elapsed_time() - self.last_cycle_end) * 1000.0;
        if since_ms > interval_ms as f64 {
            log::info!(target: "gc", "Trigger ({}): Time since last GC ({:.0} ms) is larger than guaranteed interval ({} ms)",
                name, since_ms, interval_ms);
            return true;
        }
        false
    }
}

/// The policy interface each generation's heuristic implements. Callers
/// serialize every operation on the owning generation's lock; nothing here
/// takes locks of its own or blocks.
pub trait Heuristics: Send {
    fn base(&self) -> &HeuristicsBase;
    fn base_mut(&mut self) -> &mut HeuristicsBase;

    fn record_cycle_start(&mut self, heap: &Heap, generation: &Generation) {
        self.base_mut().record_cycle_start(heap.elapsed_time());
        generation.reset_bytes_allocated_since_gc_start();
    }

    fn record_cycle_end(&mut self, heap: &Heap) {
        self.base_mut().last_cycle_end = heap.elapsed_time();
    }

    fn record_success_concurrent(&mut self, heap: &Heap, generation: &Generation, abbreviated: bool) {
        let _ = generation;
        self.base_mut()
            .record_success_concurrent(heap.elapsed_time(), abbreviated);
    }

    fn record_success_degenerated(&mut self) {
        self.base_mut().record_success_degenerated();
    }

    fn record_success_full(&mut self) {
        self.base_mut().record_success_full();
    }

    fn record_allocation_failure_gc(&mut self) {}

    /// An explicit GC request usually means external state changed
    /// significantly; forget the learned timings and relearn.
    fn record_requested_gc(&mut self) {
        self.base_mut().gc_times_learned = 0;
    }

    fn should_degenerate_cycle(&self, heap: &Heap) -> bool {
        self.base().degenerated_cycles_in_a_row <= heap.options().full_gc_threshold
    }

    fn should_start_gc(&mut self, heap: &Heap, generation: &Generation) -> bool {
        self.base().should_start_guaranteed_gc(heap, generation.name())
    }

    /// Old-region candidates still waiting for a mixed evacuation. Exposed
    /// on the base interface so consumers never need the concrete old
    /// heuristic type.
    fn unprocessed_old_collection_candidates(&self) -> usize {
        0
    }

    /// Requeue the old-region candidates for mixed evacuation. A no-op for
    /// every heuristic but the old generation's.
    fn prepare_for_old_collection(&mut self, heap: &Heap) {
        let _ = heap;
    }

    /// Walk the generation's regions, reclaim immediate garbage, and hand
    /// the remaining candidates to the policy's chooser.
    fn choose_collection_set(&mut self, heap: &Heap, generation: &Generation, cset: &mut CollectionSet) {
        let mut candidates = Vec::with_capacity(heap.regions().len());
        let mut total_garbage = 0usize;
        let mut immediate_garbage = 0usize;
        let mut immediate_regions = 0usize;

        for region in heap.regions() {
            if !region.is_regular() || !generation.contains(region) {
                continue;
            }
            let garbage = region.garbage();
            total_garbage += garbage;
            if garbage > 0 && region.get_live_data_bytes() == 0 {
                // Nothing lives here; reclaim without evacuating.
                region.make_trash();
                immediate_garbage += garbage;
                immediate_regions += 1;
            } else {
                candidates.push(RegionData {
                    region: region.index(),
                    garbage,
                });
            }
        }

        let immediate_percent = if total_garbage == 0 {
            0
        } else {
            immediate_garbage * 100 / total_garbage
        };

        if immediate_percent <= heap.options().immediate_threshold {
            let actual_free = heap.free_set().lock().available();
            self.choose_collection_set_from_regiondata(heap, cset, &mut candidates, actual_free);
        }

        log::info!(target: "gc", "Immediate Garbage: {} ({} regions), CSet: {} regions, {} garbage",
            formatted_size(immediate_garbage), immediate_regions, cset.count(), formatted_size(cset.garbage()));
    }

    fn choose_collection_set_from_regiondata(
        &mut self,
        heap: &Heap,
        cset: &mut CollectionSet,
        data: &mut [RegionData],
        actual_free: usize,
    );

    /// How many bytes the mutator may still allocate before any trigger
    /// would fire. Only meaningful for the young generation's heuristic.
    fn bytes_of_allocation_runway_before_gc_trigger(
        &mut self,
        heap: &Heap,
        generation: &Generation,
        young_regions_to_be_reclaimed: usize,
    ) -> usize {
        let _ = (heap, generation, young_regions_to_be_reclaimed);
        debug_assert!(false, "allocation runway is only meaningful for the young heuristic");
        0
    }
}
