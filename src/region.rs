use atomic::{Atomic, Ordering};

use crate::utils::{align_down, align_usize, formatted_size, read_float_from_env, read_uint_from_env};

/*
 Region state transitions are guarded by the heap lock. An "Empty" region
 (committed or not) becomes "Regular" on first allocation, a "Regular" region
 moves to "Cset" when selected for evacuation, and reclaimed regions pass
 through "Trash" before being recycled back to "Empty". Humongous starts and
 continuations never enter the collection set.
*/
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum RegionState {
    EmptyUncommitted,
    EmptyCommitted,
    Regular,
    HumongousStart,
    HumongousCont,
    Cset,
    Trash,
}

/// Which generation a region currently feeds. Meaningful only on
/// generational heaps; regions of a non-generational heap stay `Free`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RegionAffiliation {
    Free,
    Young,
    Old,
}

/// User-facing collector knobs. Compiled into an immutable [`HeapOptions`]
/// by [`HeapRegion::setup_sizes`] before the heap comes up.
#[derive(Clone, Debug)]
pub struct HeapArguments {
    /// With automatic region sizing, the regions would be at most this large.
    pub max_region_size: usize,
    /// With automatic region sizing, the regions would be at least this large.
    pub min_region_size: usize,
    /// With automatic region sizing, this is the approximate number of
    /// regions that would be used, within min/max region size limits.
    pub target_num_regions: usize,
    /// Static heap region size. Set zero to enable automatic sizing.
    pub region_size: usize,
    /// How large an object must be, in percents of the region size, to get a
    /// separate humongous region.
    pub humongous_threshold: usize,
    pub max_heap_size: usize,
    /// Percent of capacity that must stay free; dipping below it triggers a
    /// collection unconditionally.
    pub min_free_threshold: usize,
    /// Percent of capacity kept free while the heuristic is still learning
    /// the application's cycle times.
    pub init_free_threshold: usize,
    /// Percent of capacity held back to absorb allocation spikes.
    pub alloc_spike_factor: usize,
    /// Percent of a region that must be garbage for the region to be worth
    /// evacuating once the free target is met.
    pub garbage_threshold: usize,
    /// Percent of a region below which its garbage cannot count towards the
    /// free target.
    pub ignore_garbage_threshold: usize,
    /// Percent of capacity reserved to receive evacuated objects.
    pub evac_reserve: usize,
    /// Evacuation packing-waste multiplier for young/global evacuation.
    pub evac_waste: f64,
    /// Evacuation packing-waste multiplier for old evacuation.
    pub old_evac_waste: f64,
    /// Age at which a young region's survivors are promoted.
    pub tenuring_threshold: u8,
    /// Completed cycles observed before the learning thresholds step aside.
    pub learning_steps: usize,
    /// Upper bound, in milliseconds, on the time between two cycles. Zero
    /// disables the guaranteed trigger.
    pub guaranteed_gc_interval: usize,
    /// If at least this percent of garbage is reclaimable without moving
    /// anything, skip building a collection set.
    pub immediate_threshold: usize,
    /// Consecutive degenerated cycles tolerated before falling back to a
    /// full collection.
    pub full_gc_threshold: usize,
    pub adaptive_decay_factor: f64,
    pub adaptive_initial_confidence: f64,
    pub adaptive_initial_spike_threshold: f64,
    pub adaptive_sample_frequency_hz: usize,
    pub adaptive_sample_size_seconds: usize,
}

impl Default for HeapArguments {
    fn default() -> Self {
        Self {
            max_region_size: 32 * 1024 * 1024,
            min_region_size: HeapRegion::MIN_REGION_SIZE,
            target_num_regions: 2048,
            region_size: 0,
            humongous_threshold: 100,
            max_heap_size: 96 * 1024 * 1024,
            min_free_threshold: 10,
            init_free_threshold: 70,
            alloc_spike_factor: 5,
            garbage_threshold: 25,
            ignore_garbage_threshold: 5,
            evac_reserve: 5,
            evac_waste: 1.2,
            old_evac_waste: 1.4,
            tenuring_threshold: 7,
            learning_steps: 5,
            guaranteed_gc_interval: 5 * 60 * 1000,
            immediate_threshold: 90,
            full_gc_threshold: 3,
            adaptive_decay_factor: 0.5,
            adaptive_initial_confidence: 1.8,
            adaptive_initial_spike_threshold: 1.8,
            adaptive_sample_frequency_hz: 10,
            adaptive_sample_size_seconds: 10,
        }
    }
}

impl HeapArguments {
    pub fn from_env() -> Self {
        let mut this = Self::default();

        if let Some(x) = read_uint_from_env("GC_MIN_REGION_SIZE") {
            this.min_region_size = x;
        }
        if let Some(x) = read_uint_from_env("GC_MAX_REGION_SIZE") {
            this.max_region_size = x;
        }
        if let Some(x) = read_uint_from_env("GC_REGION_SIZE") {
            this.region_size = x;
        }
        if let Some(x) = read_uint_from_env("GC_TARGET_NUM_REGIONS") {
            this.target_num_regions = x;
        }
        if let Some(x) = read_uint_from_env("GC_HUMONGOUS_THRESHOLD") {
            this.humongous_threshold = x;
        }
        if let Some(x) = read_uint_from_env("GC_MAX_HEAP_SIZE") {
            this.max_heap_size = x;
        }
        if let Some(x) = read_uint_from_env("GC_MIN_FREE_THRESHOLD") {
            this.min_free_threshold = x;
        }
        if let Some(x) = read_uint_from_env("GC_INIT_FREE_THRESHOLD") {
            this.init_free_threshold = x;
        }
        if let Some(x) = read_uint_from_env("GC_ALLOC_SPIKE_FACTOR") {
            this.alloc_spike_factor = x;
        }
        if let Some(x) = read_uint_from_env("GC_GARBAGE_THRESHOLD") {
            this.garbage_threshold = x;
        }
        if let Some(x) = read_uint_from_env("GC_IGNORE_GARBAGE_THRESHOLD") {
            this.ignore_garbage_threshold = x;
        }
        if let Some(x) = read_uint_from_env("GC_EVAC_RESERVE") {
            this.evac_reserve = x;
        }
        if let Some(x) = read_float_from_env("GC_EVAC_WASTE") {
            this.evac_waste = x;
        }
        if let Some(x) = read_float_from_env("GC_OLD_EVAC_WASTE") {
            this.old_evac_waste = x;
        }
        if let Some(x) = read_uint_from_env("GC_TENURING_THRESHOLD") {
            this.tenuring_threshold = x as u8;
        }
        if let Some(x) = read_uint_from_env("GC_LEARNING_STEPS") {
            this.learning_steps = if x == 0 { 1 } else { x };
        }
        if let Some(x) = read_uint_from_env("GC_GUARANTEED_GC_INTERVAL") {
            this.guaranteed_gc_interval = x;
        }
        if let Some(x) = read_uint_from_env("GC_IMMEDIATE_THRESHOLD") {
            this.immediate_threshold = x;
        }
        if let Some(x) = read_uint_from_env("GC_FULL_GC_THRESHOLD") {
            this.full_gc_threshold = x;
        }
        if let Some(x) = read_float_from_env("GC_ADAPTIVE_DECAY_FACTOR") {
            this.adaptive_decay_factor = x;
        }
        if let Some(x) = read_float_from_env("GC_ADAPTIVE_INITIAL_CONFIDENCE") {
            this.adaptive_initial_confidence = x;
        }
        if let Some(x) = read_float_from_env("GC_ADAPTIVE_INITIAL_SPIKE_THRESHOLD") {
            this.adaptive_initial_spike_threshold = x;
        }
        if let Some(x) = read_uint_from_env("GC_ADAPTIVE_SAMPLE_FREQUENCY_HZ") {
            this.adaptive_sample_frequency_hz = x;
        }
        if let Some(x) = read_uint_from_env("GC_ADAPTIVE_SAMPLE_SIZE_SECONDS") {
            this.adaptive_sample_size_seconds = x;
        }

        this
    }
}

/// Derived sizing and the tunables every collector component reads.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapOptions {
    pub region_size_bytes: usize,
    pub region_size_words: usize,
    pub region_size_bytes_shift: usize,
    pub region_size_bytes_mask: usize,
    pub region_size_words_shift: usize,
    pub region_size_words_mask: usize,
    pub region_count: usize,
    pub humongous_threshold_words: usize,
    pub humongous_threshold_bytes: usize,
    pub max_heap_size: usize,
    pub min_free_threshold: usize,
    pub init_free_threshold: usize,
    pub alloc_spike_factor: usize,
    pub garbage_threshold: usize,
    pub ignore_garbage_threshold: usize,
    pub evac_reserve: usize,
    pub evac_waste: f64,
    pub old_evac_waste: f64,
    pub tenuring_threshold: u8,
    pub learning_steps: usize,
    pub guaranteed_gc_interval: usize,
    pub immediate_threshold: usize,
    pub full_gc_threshold: usize,
    pub adaptive_decay_factor: f64,
    pub adaptive_initial_confidence: f64,
    pub adaptive_initial_spike_threshold: f64,
    pub adaptive_sample_frequency_hz: usize,
    pub adaptive_sample_size_seconds: usize,
}

impl HeapOptions {
    pub const fn required_regions(&self, size: usize) -> usize {
        (size + self.region_size_bytes - 1) >> self.region_size_bytes_shift
    }
}

impl std::fmt::Display for HeapOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "HeapOptions:")?;
        writeln!(f, "\tmax_heap_size: {}", formatted_size(self.max_heap_size))?;
        writeln!(f, "\tregion_count: {}", self.region_count)?;
        writeln!(
            f,
            "\tregion_size_bytes: {}",
            formatted_size(self.region_size_bytes)
        )?;
        writeln!(
            f,
            "\thumongous_threshold_bytes: {}",
            formatted_size(self.humongous_threshold_bytes)
        )?;
        writeln!(f, "\ttenuring_threshold: {}", self.tenuring_threshold)
    }
}

/// Region metadata, stored in a side table indexed by region number. The
/// heuristics only ever read and write the accounting here; the backing
/// memory belongs to the allocation layer.
pub struct HeapRegion {
    index: usize,
    size: usize,
    state: Atomic<RegionState>,
    affiliation: Atomic<RegionAffiliation>,
    age: Atomic<u8>,
    used: Atomic<usize>,
    live_data: Atomic<usize>,
}

impl HeapRegion {
    pub const MIN_REGION_SIZE: usize = 256 * 1024;
    pub const MIN_NUM_REGIONS: usize = 10;
    pub const MAX_REGION_SIZE: usize = 32 * 1024 * 1024;

    const PAGE_SIZE: usize = 4096;

    pub fn new(index: usize, options: &HeapOptions) -> Self {
        Self {
            index,
            size: options.region_size_bytes,
            state: Atomic::new(RegionState::EmptyCommitted),
            affiliation: Atomic::new(RegionAffiliation::Free),
            age: Atomic::new(0),
            used: Atomic::new(0),
            live_data: Atomic::new(0),
        }
    }

    /// Setups heap region sizes and thresholds based on input parameters.
    pub fn setup_sizes(args: &HeapArguments) -> HeapOptions {
        let mut opts = HeapOptions::default();

        opts.min_free_threshold = args.min_free_threshold;
        opts.init_free_threshold = args.init_free_threshold;
        opts.alloc_spike_factor = args.alloc_spike_factor;
        opts.garbage_threshold = args.garbage_threshold;
        opts.ignore_garbage_threshold = args.ignore_garbage_threshold;
        opts.evac_reserve = args.evac_reserve;
        opts.evac_waste = args.evac_waste;
        opts.old_evac_waste = args.old_evac_waste;
        opts.tenuring_threshold = args.tenuring_threshold;
        opts.learning_steps = args.learning_steps;
        opts.guaranteed_gc_interval = args.guaranteed_gc_interval;
        opts.immediate_threshold = args.immediate_threshold;
        opts.full_gc_threshold = args.full_gc_threshold;
        opts.adaptive_decay_factor = args.adaptive_decay_factor;
        opts.adaptive_initial_confidence = args.adaptive_initial_confidence;
        opts.adaptive_initial_spike_threshold = args.adaptive_initial_spike_threshold;
        opts.adaptive_sample_frequency_hz = args.adaptive_sample_frequency_hz;
        opts.adaptive_sample_size_seconds = args.adaptive_sample_size_seconds;

        let min_region_size = args.min_region_size.max(Self::MIN_REGION_SIZE);
        let target_num_regions = if args.target_num_regions == 0 {
            2048
        } else {
            args.target_num_regions
        };
        let max_region_size = if args.max_region_size == 0 || args.max_region_size < min_region_size
        {
            Self::MAX_REGION_SIZE
        } else {
            args.max_region_size
        };

        let mut max_heap_size = args.max_heap_size;
        if min_region_size > max_heap_size / Self::MIN_NUM_REGIONS {
            panic!("Max heap size ({}) is too low to afford the minimum number of regions ({}) of minimum region size ({})",
                formatted_size(max_heap_size), Self::MIN_NUM_REGIONS, formatted_size(min_region_size)
            );
        }

        let mut region_size = if args.region_size != 0 {
            args.region_size
        } else {
            let mut region_size = max_heap_size / target_num_regions;
            region_size = region_size.max(min_region_size);
            max_region_size.min(region_size)
        };

        region_size = align_usize(region_size, Self::PAGE_SIZE);

        let region_size_log = (region_size as f64).log2() as usize;
        region_size = 1 << region_size_log;
        max_heap_size = align_usize(max_heap_size, region_size);

        opts.region_size_bytes = region_size;
        opts.region_size_words = region_size >> 3;
        opts.region_size_bytes_shift = region_size_log;
        opts.region_size_words_shift = region_size_log - 3;
        opts.region_size_bytes_mask = region_size - 1;
        opts.region_size_words_mask = opts.region_size_words - 1;
        opts.region_count = max_heap_size / region_size;
        opts.max_heap_size = max_heap_size;

        let humongous_threshold = if args.humongous_threshold == 0 {
            100
        } else {
            args.humongous_threshold
        };
        opts.humongous_threshold_words =
            align_down(opts.region_size_words * humongous_threshold / 100, 8);
        opts.humongous_threshold_bytes = opts.humongous_threshold_words * 8;

        log::info!(target: "gc", "Region sizes setup complete");
        log::info!(target: "gc", "- Max heap size: {}", formatted_size(opts.max_heap_size));
        log::info!(target: "gc", "- Region count: {}", opts.region_count);
        log::info!(target: "gc", "- Region size: {}", formatted_size(opts.region_size_bytes));
        log::info!(target: "gc", "- Humongous threshold: {}", formatted_size(opts.humongous_threshold_bytes));

        opts
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn state(&self) -> RegionState {
        self.state.load(Ordering::Relaxed)
    }

    pub fn set_state(&self, state: RegionState) {
        self.state.store(state, Ordering::Relaxed);
    }

    pub fn is_empty(&self) -> bool {
        matches!(
            self.state(),
            RegionState::EmptyUncommitted | RegionState::EmptyCommitted
        )
    }

    pub fn is_regular(&self) -> bool {
        self.state() == RegionState::Regular
    }

    pub fn is_humongous_start(&self) -> bool {
        self.state() == RegionState::HumongousStart
    }

    pub fn is_humongous_cont(&self) -> bool {
        self.state() == RegionState::HumongousCont
    }

    pub fn is_cset(&self) -> bool {
        self.state() == RegionState::Cset
    }

    pub fn is_trash(&self) -> bool {
        self.state() == RegionState::Trash
    }

    pub fn affiliation(&self) -> RegionAffiliation {
        self.affiliation.load(Ordering::Relaxed)
    }

    pub fn set_affiliation(&self, affiliation: RegionAffiliation) {
        self.affiliation.store(affiliation, Ordering::Relaxed);
    }

    pub fn is_young(&self) -> bool {
        self.affiliation() == RegionAffiliation::Young
    }

    pub fn is_old(&self) -> bool {
        self.affiliation() == RegionAffiliation::Old
    }

    pub fn is_free(&self) -> bool {
        self.affiliation() == RegionAffiliation::Free
    }

    pub fn age(&self) -> u8 {
        self.age.load(Ordering::Relaxed)
    }

    pub fn set_age(&self, age: u8) {
        self.age.store(age, Ordering::Relaxed);
    }

    pub fn increment_age(&self) {
        self.age.fetch_add(1, Ordering::Relaxed);
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    pub fn set_used(&self, bytes: usize) {
        self.used.store(bytes, Ordering::Relaxed);
    }

    pub fn increase_used(&self, bytes: usize) {
        self.used.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn free(&self) -> usize {
        if self.is_empty() {
            return self.size;
        }
        self.size - self.used().min(self.size)
    }

    pub fn get_live_data_bytes(&self) -> usize {
        self.live_data.load(Ordering::Relaxed)
    }

    pub fn set_live_data_bytes(&self, bytes: usize) {
        self.live_data.store(bytes, Ordering::Relaxed);
    }

    pub fn increase_live_data(&self, bytes: usize) {
        self.live_data.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Bytes reclaimable from this region: everything used but not live.
    pub fn garbage(&self) -> usize {
        self.used().saturating_sub(self.get_live_data_bytes())
    }

    pub fn make_regular_allocation(&self, affiliation: RegionAffiliation) {
        debug_assert!(self.is_empty() || self.is_regular());
        self.set_state(RegionState::Regular);
        if self.is_free() {
            self.set_affiliation(affiliation);
        }
    }

    pub fn make_cset(&self) {
        debug_assert!(self.is_regular());
        self.set_state(RegionState::Cset);
    }

    pub fn make_trash(&self) {
        debug_assert!(self.is_regular() || self.is_cset() || self.is_humongous_start() || self.is_humongous_cont());
        self.set_state(RegionState::Trash);
    }

    pub fn make_empty(&self) {
        debug_assert!(self.is_trash());
        self.set_state(RegionState::EmptyCommitted);
    }

    /// Return a trash region to the free pool, wiping its accounting.
    pub fn recycle(&self) {
        if self.is_trash() {
            self.make_empty();
        }
        self.set_affiliation(RegionAffiliation::Free);
        self.set_age(0);
        self.set_used(0);
        self.set_live_data_bytes(0);
    }
}
