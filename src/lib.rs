//! # Perseid
//!
//! Perseid is the heuristics core of a region-based, concurrent, optionally
//! generational garbage collector. It decides *when* a concurrent cycle
//! should start and *which* regions it should evacuate, and it retunes its
//! own confidence bounds from the outcome of every cycle.
//!
//! # Pieces
//!
//! - [TruncatedSeq](number_seq::TruncatedSeq): moving averages with decayed
//!   statistics, feeding every estimate below.
//! - [AllocationRate](heuristics::adaptive::AllocationRate): interval-gated
//!   sampling of the mutator's allocated-bytes counter, with spike detection.
//! - [AdaptiveHeuristics](heuristics::adaptive::AdaptiveHeuristics): the
//!   trigger decision, the post-cycle feedback loop, the allocation-runway
//!   estimate and the garbage-first collection-set choosers.
//! - [Heap](heap::Heap), [Generation](generation::Generation),
//!   [FreeSet](free_set::FreeSet),
//!   [CollectionSet](collection_set::CollectionSet),
//!   [HeapRegion](region::HeapRegion): the collaborators the heuristics pull
//!   their inputs from. Regions here carry byte accounting only; backing
//!   memory belongs to the allocation layer of the embedding collector.
//!
//! Every heuristic operation runs to completion on the collector's control
//! thread; the per-generation locks exist to own the state, not to
//! coordinate concurrent callers.

pub mod collection_set;
pub mod free_set;
pub mod generation;
pub mod heap;
pub mod heuristics;
pub mod number_seq;
pub mod region;
pub mod utils;
