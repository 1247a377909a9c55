//! Per-gene count accumulation.

use crate::annotation::AnnotationIndex;
use crate::counter::resolve::Assignment;
use crate::types::GeneCount;

/// Integer counts for every gene plus tallies of unassigned fragments.
///
/// Every gene starts at zero, so genes without reads still show up in the
/// final table. Accumulators built over the same annotation can be merged
/// in any order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountAccumulator {
    counts: Vec<u64>,
    no_feature: u64,
    ambiguous: u64,
}

impl CountAccumulator {
    /// Zero-initialized counts for `num_genes` genes.
    pub fn new(num_genes: usize) -> Self {
        CountAccumulator {
            counts: vec![0; num_genes],
            no_feature: 0,
            ambiguous: 0,
        }
    }

    /// Add one fragment to gene `idx`.
    pub(crate) fn record(&mut self, idx: usize) {
        self.counts[idx] += 1;
    }

    /// Book the outcome of one resolved fragment.
    ///
    /// # Panics
    ///
    /// Panics if an `Assigned` index is not below the gene count given to
    /// [`CountAccumulator::new`].
    pub fn add(&mut self, assignment: Assignment) {
        match assignment {
            Assignment::Assigned(idx) => self.record(idx),
            Assignment::NoFeature => self.no_feature += 1,
            Assignment::Ambiguous => self.ambiguous += 1,
        }
    }

    /// Sum another accumulator into this one.
    pub fn merge(&mut self, other: &CountAccumulator) {
        debug_assert_eq!(self.counts.len(), other.counts.len());
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        self.no_feature += other.no_feature;
        self.ambiguous += other.ambiguous;
    }

    /// Counts indexed like `AnnotationIndex::genes`.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn assigned(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn no_feature(&self) -> u64 {
        self.no_feature
    }

    pub fn ambiguous(&self) -> u64 {
        self.ambiguous
    }

    /// Pair every count with its gene identifier.
    pub fn gene_counts(&self, index: &AnnotationIndex) -> Vec<GeneCount> {
        index
            .genes()
            .iter()
            .zip(&self.counts)
            .map(|(gene, &count)| GeneCount {
                gene_id: gene.id.clone(),
                count,
            })
            .collect()
    }
}
