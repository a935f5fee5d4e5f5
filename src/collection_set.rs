use crate::region::{HeapOptions, HeapRegion};

/// The set of regions picked for evacuation in the upcoming cycle, plus the
/// byte accounting the heuristics and the evacuation reserves are sized
/// from.
pub struct CollectionSet {
    map: Box<[bool]>,
    preselected: Box<[bool]>,
    tenuring_threshold: u8,
    count: usize,
    garbage: usize,
    live: usize,
    old_bytes_reserved_for_evacuation: usize,
    young_bytes_reserved_for_evacuation: usize,
    young_bytes_to_be_promoted: usize,
    young_available_bytes_collected: usize,
}

impl CollectionSet {
    pub fn new(options: &HeapOptions) -> Self {
        Self {
            map: vec![false; options.region_count].into_boxed_slice(),
            preselected: vec![false; options.region_count].into_boxed_slice(),
            tenuring_threshold: options.tenuring_threshold,
            count: 0,
            garbage: 0,
            live: 0,
            old_bytes_reserved_for_evacuation: 0,
            young_bytes_reserved_for_evacuation: 0,
            young_bytes_to_be_promoted: 0,
            young_available_bytes_collected: 0,
        }
    }

    pub fn clear(&mut self) {
        self.map.fill(false);
        self.preselected.fill(false);
        self.count = 0;
        self.garbage = 0;
        self.live = 0;
        self.old_bytes_reserved_for_evacuation = 0;
        self.young_bytes_reserved_for_evacuation = 0;
        self.young_bytes_to_be_promoted = 0;
        self.young_available_bytes_collected = 0;
    }

    pub fn add_region(&mut self, region: &HeapRegion) {
        let idx = region.index();
        debug_assert!(!self.map[idx], "region already in the collection set");

        let live = region.get_live_data_bytes();
        self.map[idx] = true;
        self.count += 1;
        self.garbage += region.garbage();
        self.live += live;

        if region.is_old() {
            self.old_bytes_reserved_for_evacuation += live;
        } else {
            // Free space inside collected young regions comes back to the
            // young generation with the rest of the region.
            self.young_available_bytes_collected += region.free();
            if region.age() >= self.tenuring_threshold {
                self.young_bytes_to_be_promoted += live;
            } else {
                self.young_bytes_reserved_for_evacuation += live;
            }
        }

        region.make_cset();
    }

    pub fn is_in(&self, idx: usize) -> bool {
        self.map[idx]
    }

    /// Mark a region chosen by an earlier phase for wholesale promotion.
    pub fn preselect_region(&mut self, idx: usize) {
        self.preselected[idx] = true;
    }

    pub fn is_preselected(&self, idx: usize) -> bool {
        self.preselected[idx]
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn garbage(&self) -> usize {
        self.garbage
    }

    pub fn live(&self) -> usize {
        self.live
    }

    pub fn get_old_bytes_reserved_for_evacuation(&self) -> usize {
        self.old_bytes_reserved_for_evacuation
    }

    pub fn get_young_bytes_reserved_for_evacuation(&self) -> usize {
        self.young_bytes_reserved_for_evacuation
    }

    pub fn get_young_bytes_to_be_promoted(&self) -> usize {
        self.young_bytes_to_be_promoted
    }

    pub fn get_young_available_bytes_collected(&self) -> usize {
        self.young_available_bytes_collected
    }
}
