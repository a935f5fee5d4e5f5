use crate::collection_set::CollectionSet;
use crate::generation::{Generation, GenerationKind};
use crate::heap::Heap;
use crate::heuristics::adaptive::AdaptiveHeuristics;
use crate::heuristics::{Heuristics, HeuristicsBase, RegionData};
use crate::region::HeapOptions;
use crate::utils::formatted_size;

/// The old generation's heuristic: the adaptive policy plus the queue of
/// old-region candidates waiting for mixed evacuation. The young heuristic
/// consults the candidate count (through the base interface) to expedite
/// cycles that open up regions for finishing mixed evacuations.
pub struct OldHeuristics {
    adaptive: AdaptiveHeuristics,
    candidates: Vec<usize>,
    next_candidate: usize,
}

impl OldHeuristics {
    pub fn new(options: &HeapOptions) -> Self {
        Self {
            adaptive: AdaptiveHeuristics::new(options, GenerationKind::Old),
            candidates: Vec::new(),
            next_candidate: 0,
        }
    }

    /// Scan the old generation and queue every region worth mixing into
    /// upcoming young collections, best garbage first.
    fn select_old_collection_candidates(&mut self, heap: &Heap) {
        let options = heap.options();
        let garbage_threshold = options.region_size_bytes * options.garbage_threshold / 100;

        let mut candidates: Vec<RegionData> = heap
            .regions()
            .iter()
            .filter(|r| r.is_regular() && r.is_old() && r.garbage() > garbage_threshold)
            .map(|r| RegionData {
                region: r.index(),
                garbage: r.garbage(),
            })
            .collect();
        candidates.sort_unstable_by(|a, b| b.garbage.cmp(&a.garbage).then(a.region.cmp(&b.region)));

        let total_garbage: usize = candidates.iter().map(|c| c.garbage).sum();
        self.candidates = candidates.into_iter().map(|c| c.region).collect();
        self.next_candidate = 0;

        log::info!(target: "gc", "Old candidate regions: {}, reclaimable: {}",
            self.candidates.len(), formatted_size(total_garbage));
    }

    /// The next old region a mixed evacuation should take, without
    /// consuming it.
    pub fn next_old_collection_candidate(&self) -> Option<usize> {
        self.candidates.get(self.next_candidate).copied()
    }

    /// Mark the first `count` outstanding candidates as handled by a mixed
    /// evacuation.
    pub fn consume_old_collection_candidates(&mut self, count: usize) {
        self.next_candidate = (self.next_candidate + count).min(self.candidates.len());
    }

    pub fn abandon_collection_candidates(&mut self) {
        self.candidates.clear();
        self.next_candidate = 0;
    }
}

impl Heuristics for OldHeuristics {
    fn base(&self) -> &HeuristicsBase {
        self.adaptive.base()
    }

    fn base_mut(&mut self) -> &mut HeuristicsBase {
        self.adaptive.base_mut()
    }

    fn record_cycle_start(&mut self, heap: &Heap, generation: &Generation) {
        self.adaptive.record_cycle_start(heap, generation);
    }

    fn record_success_concurrent(&mut self, heap: &Heap, generation: &Generation, abbreviated: bool) {
        self.adaptive
            .record_success_concurrent(heap, generation, abbreviated);
    }

    fn record_success_degenerated(&mut self) {
        self.adaptive.record_success_degenerated();
    }

    fn record_success_full(&mut self) {
        self.adaptive.record_success_full();
    }

    fn should_start_gc(&mut self, heap: &Heap, generation: &Generation) -> bool {
        self.adaptive.should_start_gc(heap, generation)
    }

    fn unprocessed_old_collection_candidates(&self) -> usize {
        self.candidates.len() - self.next_candidate
    }

    fn prepare_for_old_collection(&mut self, heap: &Heap) {
        self.select_old_collection_candidates(heap);
    }

    fn choose_collection_set_from_regiondata(
        &mut self,
        heap: &Heap,
        cset: &mut CollectionSet,
        data: &mut [RegionData],
        actual_free: usize,
    ) {
        self.adaptive
            .choose_collection_set_from_regiondata(heap, cset, data, actual_free);
    }
}
