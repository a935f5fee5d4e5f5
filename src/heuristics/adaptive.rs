use crate::collection_set::CollectionSet;
use crate::generation::{Generation, GenerationKind};
use crate::heap::Heap;
use crate::heuristics::{Heuristics, HeuristicsBase, RegionData, MOVING_AVERAGE_SAMPLES};
use crate::number_seq::TruncatedSeq;
use crate::region::HeapOptions;
use crate::utils::formatted_size;

// These constants are used to adjust the margin of error for the moving
// average of the allocation rate and cycle time. The units are standard
// deviations.
pub const FULL_PENALTY_SD: f64 = 0.2;
pub const DEGENERATED_PENALTY_SD: f64 = 0.1;

// A z-score inside this band at the end of a successful concurrent cycle
// leaves the trigger parameters alone.
const LOWEST_EXPECTED_AVAILABLE_AT_END: f64 = -0.5;
const HIGHEST_EXPECTED_AVAILABLE_AT_END: f64 = 0.5;

// Bounds on the confidence interval, in standard deviations. The minimum
// corresponds to a 25% confidence interval, the maximum to 99.9%.
pub const MINIMUM_CONFIDENCE: f64 = 0.319;
pub const MAXIMUM_CONFIDENCE: f64 = 3.291;

// Attenuates the z-score-driven adjustments so a concurrent cycle moves the
// triggers an order of magnitude less than a degenerated or full one.
const Z_SCORE_ATTENUATION: f64 = 100.0;

/// Which trigger fired the cycle whose outcome we are about to judge.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Trigger {
    Rate,
    Spike,
    Other,
}

fn saturate(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Online estimate of the mutator's allocation rate. Samples a monotonic
/// allocated-bytes counter no more than once per sampling interval.
pub struct AllocationRate {
    last_sample_time: f64,
    last_sample_value: usize,
    interval_sec: f64,
    pub(crate) rate: TruncatedSeq,
    pub(crate) rate_avg: TruncatedSeq,
}

impl AllocationRate {
    pub fn new(options: &HeapOptions) -> Self {
        let samples = options.adaptive_sample_size_seconds * options.adaptive_sample_frequency_hz;
        Self {
            last_sample_time: 0.0,
            last_sample_value: 0,
            interval_sec: 1.0 / options.adaptive_sample_frequency_hz as f64,
            rate: TruncatedSeq::new(samples, options.adaptive_decay_factor),
            rate_avg: TruncatedSeq::new(samples, options.adaptive_decay_factor),
        }
    }

    pub fn sample(&mut self, now: f64, allocated: usize) -> f64 {
        let mut rate = 0.0;
        if now - self.last_sample_time > self.interval_sec {
            // A counter that went backwards is a racy read; skip the sample
            // but move the snapshot forward.
            if allocated >= self.last_sample_value {
                rate = self.instantaneous_rate(now, allocated);
                self.rate.add(rate);
                self.rate_avg.add(self.rate.avg());
            }

            self.last_sample_time = now;
            self.last_sample_value = allocated;
        }
        rate
    }

    /// Upper confidence bound on the sustained allocation rate. Uses the
    /// deviation of the running average rather than of the raw samples: it
    /// is far more stable across bursts and it is the statistic the trigger
    /// actually budgets with.
    pub fn upper_bound(&self, sds: f64) -> f64 {
        self.rate.davg() + sds * self.rate_avg.dsd()
    }

    pub fn is_spiking(&self, rate: f64, threshold_sd: f64) -> bool {
        if rate <= 0.0 {
            return false;
        }
        let sd = self.rate.sd();
        if sd > 0.0 {
            let z_score = (rate - self.rate.avg()) / sd;
            if z_score > threshold_sd {
                return true;
            }
        }
        false
    }

    /// Snapshot time and zero the counter baseline, so the next sample
    /// measures within-cycle allocation only.
    pub fn allocation_counter_reset(&mut self, now: f64) {
        self.last_sample_time = now;
        self.last_sample_value = 0;
    }

    fn instantaneous_rate(&self, now: f64, allocated: usize) -> f64 {
        let delta = allocated.saturating_sub(self.last_sample_value);
        let time_delta_sec = now - self.last_sample_time;
        if time_delta_sec > 0.0 {
            delta as f64 / time_delta_sec
        } else {
            0.0
        }
    }
}

/// The adaptive policy: moving-average statistics over allocation rate and
/// cycle time, trigger parameters the heuristic retunes from cycle
/// outcomes, and the garbage-first collection-set choosers.
pub struct AdaptiveHeuristics {
    base: HeuristicsBase,
    kind: GenerationKind,
    pub(crate) allocation_rate: AllocationRate,
    pub(crate) margin_of_error_sd: f64,
    pub(crate) spike_threshold_sd: f64,
    pub(crate) last_trigger: Trigger,
    pub(crate) available: TruncatedSeq,
}

impl AdaptiveHeuristics {
    pub fn new(options: &HeapOptions, kind: GenerationKind) -> Self {
        Self {
            base: HeuristicsBase::new(options.adaptive_decay_factor),
            kind,
            allocation_rate: AllocationRate::new(options),
            margin_of_error_sd: options.adaptive_initial_confidence,
            spike_threshold_sd: options.adaptive_initial_spike_threshold,
            last_trigger: Trigger::Other,
            available: TruncatedSeq::new(MOVING_AVERAGE_SAMPLES, options.adaptive_decay_factor),
        }
    }

    pub fn kind(&self) -> GenerationKind {
        self.kind
    }

    pub fn margin_of_error_sd(&self) -> f64 {
        self.margin_of_error_sd
    }

    pub fn spike_threshold_sd(&self) -> f64 {
        self.spike_threshold_sd
    }

    pub fn last_trigger(&self) -> Trigger {
        self.last_trigger
    }

    fn min_free_threshold(&self, generation: &Generation, options: &HeapOptions) -> usize {
        generation.soft_max_capacity() * options.min_free_threshold / 100
    }

    pub(crate) fn adjust_last_trigger_parameters(&mut self, amount: f64) {
        match self.last_trigger {
            Trigger::Rate => self.adjust_margin_of_error(amount),
            Trigger::Spike => self.adjust_spike_threshold(amount),
            Trigger::Other => {}
        }
    }

    pub(crate) fn adjust_margin_of_error(&mut self, amount: f64) {
        self.margin_of_error_sd = saturate(
            self.margin_of_error_sd + amount,
            MINIMUM_CONFIDENCE,
            MAXIMUM_CONFIDENCE,
        );
        log::debug!(target: "gc", "Margin of error now {:.2}", self.margin_of_error_sd);
    }

    // The sign is flipped: raising the spike threshold makes the spike
    // trigger less sensitive, so a positive adjustment must lower it.
    pub(crate) fn adjust_spike_threshold(&mut self, amount: f64) {
        self.spike_threshold_sd = saturate(
            self.spike_threshold_sd - amount,
            MINIMUM_CONFIDENCE,
            MAXIMUM_CONFIDENCE,
        );
        log::debug!(target: "gc", "Spike threshold now: {:.2}", self.spike_threshold_sd);
    }

    fn choose_collection_set_generational(
        &mut self,
        heap: &Heap,
        cset: &mut CollectionSet,
        data: &[RegionData],
        actual_free: usize,
        garbage_threshold: usize,
        ignore_threshold: usize,
    ) {
        let options = heap.options();
        let capacity = heap.young_generation().max_capacity();
        let tenuring_threshold = options.tenuring_threshold;

        // cur_young_garbage counts everything the cycle returns to young,
        // including entire pre-selected regions whose live data is promoted
        // out of the generation.
        let mut cur_young_garbage = 0usize;

        for d in data.iter() {
            let region = heap.region(d.region);
            if cset.is_preselected(region.index()) {
                debug_assert!(
                    region.age() >= tenuring_threshold,
                    "preselected regions must have tenure age"
                );
                // Promotion accounting for this region is already reserved;
                // its whole footprint leaves the young generation.
                cur_young_garbage += region.garbage();
                cset.add_region(region);
            }
        }

        if self.kind == GenerationKind::Global {
            let max_young_cset = (heap.get_young_evac_reserve() as f64 / options.evac_waste) as usize;
            let mut young_cur_cset = 0usize;
            let max_old_cset = (heap.get_old_evac_reserve() as f64 / options.old_evac_waste) as usize;
            let mut old_cur_cset = 0usize;
            let free_target = capacity * options.min_free_threshold / 100 + max_young_cset;
            let min_garbage = free_target.saturating_sub(actual_free);

            log::info!(target: "gc", "Adaptive CSet Selection for GLOBAL. Max Young Evacuation: {}, Max Old Evacuation: {}, Actual Free: {}",
                formatted_size(max_young_cset), formatted_size(max_old_cset), formatted_size(actual_free));

            // No early break here: the caller's sort key is not monotone in
            // live bytes, so a region that busts one budget says nothing
            // about the regions after it.
            for d in data.iter() {
                let region = heap.region(d.region);
                if cset.is_preselected(region.index()) {
                    continue;
                }
                let mut add_region = false;
                if region.is_old() {
                    let new_cset = old_cur_cset + region.get_live_data_bytes();
                    if new_cset <= max_old_cset && region.garbage() > garbage_threshold {
                        add_region = true;
                        old_cur_cset = new_cset;
                    }
                } else if region.age() < tenuring_threshold {
                    let new_cset = young_cur_cset + region.get_live_data_bytes();
                    let region_garbage = region.garbage();
                    let new_garbage = cur_young_garbage + region_garbage;
                    let add_regardless =
                        region_garbage > ignore_threshold && new_garbage < min_garbage;
                    if new_cset <= max_young_cset
                        && (add_regardless || region_garbage > garbage_threshold)
                    {
                        add_region = true;
                        young_cur_cset = new_cset;
                        cur_young_garbage = new_garbage;
                    }
                }
                // Aged regions that were not preselected stay behind: the
                // old generation has no room for their live data yet.

                if add_region {
                    cset.add_region(region);
                }
            }
        } else {
            // Young collection or mixed evacuation; in the mixed case the
            // old candidates were added by the old heuristic already.
            let max_cset = (heap.get_young_evac_reserve() as f64 / options.evac_waste) as usize;
            let mut cur_cset = 0usize;
            let free_target = capacity * options.min_free_threshold / 100 + max_cset;
            let min_garbage = free_target.saturating_sub(actual_free);

            log::info!(target: "gc", "Adaptive CSet Selection for YOUNG. Max Evacuation: {}, Actual Free: {}",
                formatted_size(max_cset), formatted_size(actual_free));

            for d in data.iter() {
                let region = heap.region(d.region);
                if cset.is_preselected(region.index()) {
                    continue;
                }
                if region.age() < tenuring_threshold {
                    debug_assert!(
                        !region.is_old(),
                        "only young candidates expected in the data array"
                    );
                    let new_cset = cur_cset + region.get_live_data_bytes();
                    let region_garbage = region.garbage();
                    let new_garbage = cur_young_garbage + region_garbage;
                    let add_regardless =
                        region_garbage > ignore_threshold && new_garbage < min_garbage;
                    if new_cset <= max_cset && (add_regardless || region_garbage > garbage_threshold)
                    {
                        cur_cset = new_cset;
                        cur_young_garbage = new_garbage;
                        cset.add_region(region);
                    }
                }
            }
        }
    }

    fn choose_collection_set_single(
        &mut self,
        heap: &Heap,
        cset: &mut CollectionSet,
        data: &[RegionData],
        actual_free: usize,
        garbage_threshold: usize,
    ) {
        let options = heap.options();
        let capacity = heap.max_capacity();
        let max_cset =
            ((capacity as f64 / 100.0 * options.evac_reserve as f64) / options.evac_waste) as usize;
        let free_target = capacity * options.min_free_threshold / 100 + max_cset;
        let min_garbage = free_target.saturating_sub(actual_free);

        log::info!(target: "gc", "Adaptive CSet Selection. Target Free: {}, Actual Free: {}, Max Evacuation: {}, Min Garbage: {}",
            formatted_size(free_target), formatted_size(actual_free),
            formatted_size(max_cset), formatted_size(min_garbage));

        // Unconditionally take the best regions until the post-cycle free
        // target is safe, then keep taking whatever clears the garbage
        // threshold, and stop outright when the evacuation budget is spent.
        let mut cur_cset = 0usize;
        let mut cur_garbage = 0usize;

        for d in data.iter() {
            let region = heap.region(d.region);
            let new_cset = cur_cset + region.get_live_data_bytes();

            if new_cset > max_cset {
                break;
            }

            if cur_garbage < min_garbage || region.garbage() > garbage_threshold {
                cset.add_region(region);
                cur_cset = new_cset;
                cur_garbage += region.garbage();
            }
        }
    }
}

impl Heuristics for AdaptiveHeuristics {
    fn base(&self) -> &HeuristicsBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut HeuristicsBase {
        &mut self.base
    }

    fn record_cycle_start(&mut self, heap: &Heap, generation: &Generation) {
        let now = heap.elapsed_time();
        self.base.record_cycle_start(now);
        generation.reset_bytes_allocated_since_gc_start();
        self.allocation_rate.allocation_counter_reset(now);
    }

    fn record_success_concurrent(&mut self, heap: &Heap, generation: &Generation, abbreviated: bool) {
        self.base
            .record_success_concurrent(heap.elapsed_time(), abbreviated);

        let available = generation
            .available()
            .min(heap.free_set().lock().available());

        let mut z_score = 0.0;
        let available_sd = self.available.sd();
        if available_sd > 0.0 {
            let available_avg = self.available.avg();
            z_score = (available as f64 - available_avg) / available_sd;
            log::debug!(target: "gc", "{} Available: {}, z-score={:.3}. Average available: {} +/- {}",
                generation.name(), formatted_size(available), z_score,
                formatted_size(available_avg as usize), formatted_size(available_sd as usize));
        }

        self.available.add(available as f64);

        // A cycle that finished with an unusually small amount of free
        // memory makes the triggers more sensitive, and vice versa; the
        // z-score doubles as the size of the adjustment. Inside the expected
        // band nothing moves, so a stable application stops being retuned.
        if z_score < LOWEST_EXPECTED_AVAILABLE_AT_END || z_score > HIGHEST_EXPECTED_AVAILABLE_AT_END
        {
            // Negative z-score means below-average free memory, hence the
            // sign flip: positive adjustments increase sensitivity.
            self.adjust_last_trigger_parameters(z_score / -Z_SCORE_ATTENUATION);
        }
    }

    fn record_success_degenerated(&mut self) {
        self.base.record_success_degenerated();
        // Either trigger should have fired earlier to avoid degenerating;
        // tighten both.
        self.adjust_margin_of_error(DEGENERATED_PENALTY_SD);
        self.adjust_spike_threshold(DEGENERATED_PENALTY_SD);
    }

    fn record_success_full(&mut self) {
        self.base.record_success_full();
        self.adjust_margin_of_error(FULL_PENALTY_SD);
        self.adjust_spike_threshold(FULL_PENALTY_SD);
    }

    fn should_start_gc(&mut self, heap: &Heap, generation: &Generation) -> bool {
        debug_assert!(generation.kind() == self.kind);
        let options = heap.options();
        let capacity = generation.soft_max_capacity();
        let mut available = generation.soft_available();
        let allocated = generation.bytes_allocated_since_gc_start();

        log::debug!(target: "gc", "should_start_gc ({})? available: {}, soft_max_capacity: {}, allocated: {}",
            generation.name(), available, capacity, allocated);

        // The collector reserve may eat into what the mutator is allowed to
        // use; judge depletion by what the mutator can actually get.
        let usable = heap.free_set().lock().available();
        if usable < available {
            log::debug!(target: "gc", "Usable ({}) is less than available ({})",
                formatted_size(usable), formatted_size(available));
            available = usable;
        }

        // Track the allocation rate even if the cycle starts for another
        // reason.
        let rate = self.allocation_rate.sample(heap.elapsed_time(), allocated);
        self.last_trigger = Trigger::Other;

        // The old generation is kept as small as possible; depletion
        // triggers do not apply to it.
        if !generation.is_old() {
            let min_threshold = self.min_free_threshold(generation, options);
            if available < min_threshold {
                log::info!(target: "gc", "Trigger ({}): Free ({}) is below minimum threshold ({})",
                    generation.name(), formatted_size(available), formatted_size(min_threshold));
                return true;
            }

            let max_learn = options.learning_steps;
            if self.base.gc_times_learned < max_learn {
                let init_threshold = capacity * options.init_free_threshold / 100;
                if available < init_threshold {
                    log::info!(target: "gc", "Trigger ({}): Learning {} of {}. Free ({}) is below initial threshold ({})",
                        generation.name(), self.base.gc_times_learned + 1, max_learn,
                        formatted_size(available), formatted_size(init_threshold));
                    return true;
                }
            }

            // Headroom is what remains after the spike cushion and the
            // penalties accumulated from degenerated/full cycles.
            let spike_headroom = capacity * options.alloc_spike_factor / 100;
            let penalties = capacity * self.base.gc_time_penalties as usize / 100;

            let mut allocation_headroom = available;
            allocation_headroom -= allocation_headroom.min(penalties);
            allocation_headroom -= allocation_headroom.min(spike_headroom);

            let avg_cycle_time = self.base.gc_time_history.davg()
                + self.margin_of_error_sd * self.base.gc_time_history.dsd();
            let avg_alloc_rate = self.allocation_rate.upper_bound(self.margin_of_error_sd);
            log::debug!(target: "gc", "{}: average GC time: {:.2} ms, allocation rate: {}/s",
                generation.name(), avg_cycle_time * 1000.0, formatted_size(avg_alloc_rate as usize));

            if avg_alloc_rate > 0.0 && avg_cycle_time > allocation_headroom as f64 / avg_alloc_rate
            {
                log::info!(target: "gc", "Trigger ({}): Average GC time ({:.2} ms) is above the time for average allocation rate ({}/s) to deplete free headroom ({}) (margin of error = {:.2})",
                    generation.name(), avg_cycle_time * 1000.0,
                    formatted_size(avg_alloc_rate as usize),
                    formatted_size(allocation_headroom), self.margin_of_error_sd);
                log::info!(target: "gc", "Free headroom: {} (free) - {} (spike) - {} (penalties) = {}",
                    formatted_size(available), formatted_size(spike_headroom),
                    formatted_size(penalties), formatted_size(allocation_headroom));
                self.last_trigger = Trigger::Rate;
                return true;
            }

            if self.allocation_rate.is_spiking(rate, self.spike_threshold_sd)
                && avg_cycle_time > allocation_headroom as f64 / rate
            {
                log::info!(target: "gc", "Trigger ({}): Average GC time ({:.2} ms) is above the time for instantaneous allocation rate ({}/s) to deplete free headroom ({}) (spike threshold = {:.2})",
                    generation.name(), avg_cycle_time * 1000.0, formatted_size(rate as usize),
                    formatted_size(allocation_headroom), self.spike_threshold_sd);
                self.last_trigger = Trigger::Spike;
                return true;
            }

            if heap.mode().is_generational() {
                // Promotions and mixed evacuations take markedly longer than
                // plain young cycles; start them as early as possible.
                let promo_potential = heap.get_promotion_potential();
                if promo_potential > 0 {
                    debug_assert!(promo_potential < heap.capacity());
                    log::info!(target: "gc", "Trigger ({}): expedite promotion of {}",
                        generation.name(), formatted_size(promo_potential));
                    return true;
                }
                let promo_in_place_potential = heap.get_promotion_in_place_potential();
                if promo_in_place_potential > 0 {
                    debug_assert!(promo_in_place_potential < heap.capacity());
                    log::info!(target: "gc", "Trigger ({}): expedite promotion in place of {}",
                        generation.name(), formatted_size(promo_in_place_potential));
                    return true;
                }
                let mixed_candidates = heap
                    .old_generation()
                    .heuristics()
                    .lock()
                    .unprocessed_old_collection_candidates();
                if mixed_candidates > 0 {
                    // Young GC opens up free regions for finishing the mixed
                    // evacuations.
                    log::info!(target: "gc", "Trigger ({}): expedite mixed evacuation of {} regions",
                        generation.name(), mixed_candidates);
                    return true;
                }
            }
        }

        self.base.should_start_guaranteed_gc(heap, generation.name())
    }

    fn choose_collection_set_from_regiondata(
        &mut self,
        heap: &Heap,
        cset: &mut CollectionSet,
        data: &mut [RegionData],
        actual_free: usize,
    ) {
        let options = heap.options();
        let garbage_threshold = options.region_size_bytes * options.garbage_threshold / 100;
        let ignore_threshold = options.region_size_bytes * options.ignore_garbage_threshold / 100;

        // Callers hand the array over pre-sorted, but the generational sort
        // key interleaves tenured regions with garbage-rich ones; selection
        // always re-sorts garbage-first.
        data.sort_unstable_by(|a, b| b.garbage.cmp(&a.garbage).then(a.region.cmp(&b.region)));

        if heap.mode().is_generational() {
            self.choose_collection_set_generational(
                heap,
                cset,
                data,
                actual_free,
                garbage_threshold,
                ignore_threshold,
            );
        } else {
            self.choose_collection_set_single(heap, cset, data, actual_free, garbage_threshold);
        }

        let collected_old = cset.get_old_bytes_reserved_for_evacuation();
        let collected_promoted = cset.get_young_bytes_to_be_promoted();
        let collected_young = cset.get_young_bytes_reserved_for_evacuation();
        log::info!(target: "gc", "Chosen CSet evacuates young: {} (of which at least: {} are to be promoted), old: {}",
            formatted_size(collected_young), formatted_size(collected_promoted), formatted_size(collected_old));
    }

    fn bytes_of_allocation_runway_before_gc_trigger(
        &mut self,
        heap: &Heap,
        generation: &Generation,
        young_regions_to_be_reclaimed: usize,
    ) -> usize {
        debug_assert!(generation.is_young(), "only meaningful for the young heuristic");

        let options = heap.options();
        let capacity = generation.soft_max_capacity();
        let available = generation.soft_available();
        let allocated = generation.bytes_allocated_since_gc_start();

        let available_young_collected = heap
            .collection_set()
            .lock()
            .get_young_available_bytes_collected();
        let anticipated_available = (available
            + young_regions_to_be_reclaimed * options.region_size_bytes)
            .saturating_sub(available_young_collected);

        let spike_headroom = capacity * options.alloc_spike_factor / 100;
        let penalties = capacity * self.base.gc_time_penalties as usize / 100;

        let rate = self.allocation_rate.sample(heap.elapsed_time(), allocated);

        let avg_cycle_time = self.base.gc_time_history.davg()
            + self.margin_of_error_sd * self.base.gc_time_history.dsd();
        let avg_alloc_rate = self.allocation_rate.upper_bound(self.margin_of_error_sd);

        // Slack before the average-rate trigger would fire.
        let budget_avg = avg_cycle_time * avg_alloc_rate + (penalties + spike_headroom) as f64;
        let evac_slack_avg = if anticipated_available as f64 > budget_avg {
            anticipated_available - budget_avg as usize
        } else {
            0
        };

        // Slack before the spike trigger would fire; collapses to the
        // average slack while no spike is in progress.
        let evac_slack_spiking = if self.allocation_rate.is_spiking(rate, self.spike_threshold_sd) {
            let budget_spike = avg_cycle_time * rate + (penalties + spike_headroom) as f64;
            if anticipated_available as f64 > budget_spike {
                anticipated_available - budget_spike as usize
            } else {
                0
            }
        } else {
            evac_slack_avg
        };

        let threshold = self.min_free_threshold(generation, options);
        let evac_min_threshold = anticipated_available.saturating_sub(threshold);

        evac_slack_spiking
            .min(evac_slack_avg)
            .min(evac_min_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::HeapArguments;

    fn test_rate() -> AllocationRate {
        let options = crate::region::HeapRegion::setup_sizes(&HeapArguments {
            max_heap_size: 64 * 1024 * 1024,
            ..Default::default()
        });
        AllocationRate::new(&options)
    }

    #[test]
    fn samples_are_rate_limited() {
        // 10 Hz sampling: anything inside 100 ms is ignored outright
        let mut rate = test_rate();
        assert!(rate.sample(0.2, 2_000_000) > 0.0);
        assert_eq!(rate.sample(0.25, 4_000_000), 0.0);
        assert_eq!(rate.rate.num(), 1);
        assert_eq!(rate.rate_avg.num(), 1);
        // the skipped tick did not move the snapshot
        let sampled = rate.sample(0.4, 4_000_000);
        assert!((sampled - 2_000_000.0 / 0.2).abs() < 1e-6);
    }

    #[test]
    fn counter_regression_is_skipped() {
        let mut rate = test_rate();
        assert!(rate.sample(0.2, 100) > 0.0);
        // the counter went backwards: no sample, but the snapshot advances
        assert_eq!(rate.sample(0.4, 50), 0.0);
        assert_eq!(rate.rate.num(), 1);
        // next delta is measured from the regressed value
        let sampled = rate.sample(0.6, 90);
        assert!((sampled - 40.0 / 0.2).abs() < 1e-6);
        assert!(rate.rate.avg() >= 0.0);
    }

    #[test]
    fn counter_reset_rebases_sampling() {
        let mut rate = test_rate();
        rate.sample(0.2, 10_000_000);
        rate.allocation_counter_reset(1.0);
        let sampled = rate.sample(1.5, 5_000_000);
        assert!((sampled - 5_000_000.0 / 0.5).abs() < 1e-6);
    }

    #[test]
    fn upper_bound_tracks_decayed_average() {
        let mut rate = test_rate();
        for i in 1..=16 {
            rate.sample(0.2 * i as f64, i * 1_000_000);
        }
        // constant 5 MB/s: no deviation of the running average
        assert!((rate.upper_bound(3.0) - 5_000_000.0).abs() < 1e-6);
    }

    #[test]
    fn spike_detection_needs_spread_and_magnitude() {
        let mut rate = test_rate();
        // alternating samples give the window a real deviation
        let mut allocated = 0;
        for i in 0..16 {
            let delta = if i % 2 == 0 { 1_500_000 } else { 2_500_000 };
            allocated += delta;
            rate.sample(0.2 * (i + 1) as f64, allocated);
        }
        assert!(!rate.is_spiking(0.0, 2.0));
        assert!(!rate.is_spiking(10_500_000.0, 2.0));
        assert!(rate.is_spiking(50_000_000.0, 2.0));
    }
}
