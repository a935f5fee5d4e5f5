use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use perseid::collection_set::CollectionSet;
use perseid::generation::GenerationKind;
use perseid::heap::{Heap, Mode};
use perseid::heuristics::adaptive::AdaptiveHeuristics;
use perseid::heuristics::{Heuristics, RegionData};
use perseid::region::{HeapArguments, RegionAffiliation, RegionState};

const MIB: usize = 1024 * 1024;

pub fn bench_heuristics(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive heuristics");
    group.sample_size(50);

    let args = HeapArguments {
        max_heap_size: 1024 * MIB,
        region_size: 4 * MIB,
        guaranteed_gc_interval: 0,
        ..Default::default()
    };
    let heap = Heap::new(&args, Mode::NonGenerational);
    let generation = heap.global_generation();
    generation.set_used(100 * MIB);

    group.bench_function("should_start_gc", |b| {
        let mut h = AdaptiveHeuristics::new(heap.options(), GenerationKind::Global);
        b.iter(|| h.should_start_gc(&heap, generation));
    });

    for region in heap.regions() {
        region.make_regular_allocation(RegionAffiliation::Free);
        region.set_used(4 * MIB);
        region.set_live_data_bytes(region.index() % 4 * MIB / 2);
    }

    group.bench_function(BenchmarkId::new("choose_collection_set", heap.regions().len()), |b| {
        let mut h = AdaptiveHeuristics::new(heap.options(), GenerationKind::Global);
        b.iter_batched_ref(
            || {
                for region in heap.regions() {
                    if region.state() == RegionState::Cset {
                        region.set_state(RegionState::Regular);
                    }
                }
                let data: Vec<RegionData> = heap
                    .regions()
                    .iter()
                    .map(|r| RegionData {
                        region: r.index(),
                        garbage: r.garbage(),
                    })
                    .collect();
                (CollectionSet::new(heap.options()), data)
            },
            |(cset, data)| h.choose_collection_set_from_regiondata(&heap, cset, data, 200 * MIB),
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_heuristics);
criterion_main!(benches);
