//! Counting logic: fragments in, per-gene counts out.

pub mod accumulate;
pub mod fragments;
pub mod resolve;

pub use accumulate::CountAccumulator;
pub use fragments::{AssemblyOptions, AssemblyStats, FragmentAssembler};
pub use resolve::{Assignment, OverlapResolver};

use crate::types::Fragment;

/// Resolve a batch of fragments and book every outcome.
pub fn count_batch(resolver: &OverlapResolver<'_>, fragments: &[Fragment], counts: &mut CountAccumulator) {
    for fragment in fragments {
        counts.add(resolver.resolve(fragment));
    }
}
