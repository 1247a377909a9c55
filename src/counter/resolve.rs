//! Overlap resolution: fragment to zero-or-one gene.
//!
//! The candidate set `G` holds every gene whose reduced exons share at least
//! one base with the fragment (strand-filtered when counting is stranded).
//! Each [`CountMode`] then narrows `G` differently; anything that does not
//! end with exactly one gene is left unassigned.

use crate::annotation::AnnotationIndex;
use crate::types::{CountMode, Fragment, Gene, GenomicInterval};

/// Outcome of resolving one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Dense index of the winning gene.
    Assigned(usize),
    /// No gene qualifies.
    NoFeature,
    /// More than one gene qualifies.
    Ambiguous,
}

/// Resolves fragments against a shared, read-only annotation.
#[derive(Debug, Clone, Copy)]
pub struct OverlapResolver<'a> {
    index: &'a AnnotationIndex,
    mode: CountMode,
    stranded: bool,
}

impl<'a> OverlapResolver<'a> {
    pub fn new(index: &'a AnnotationIndex, mode: CountMode, stranded: bool) -> Self {
        OverlapResolver {
            index,
            mode,
            stranded,
        }
    }

    pub fn mode(&self) -> CountMode {
        self.mode
    }

    /// Genes whose reduced exons overlap the fragment.
    pub fn overlapping_genes(&self, fragment: &Fragment) -> Vec<usize> {
        self.index
            .genes_spanning(&fragment.chrom, fragment.start, fragment.end)
            .filter(|&idx| {
                let gene = self.index.gene(idx);
                (!self.stranded || gene.strand.is_compatible(fragment.strand))
                    && exons_overlap(&gene.reduced_exons, fragment.start, fragment.end)
            })
            .collect()
    }

    /// Assign `fragment` to at most one gene.
    pub fn resolve(&self, fragment: &Fragment) -> Assignment {
        let hits = self.overlapping_genes(fragment);
        match self.mode {
            CountMode::Union => single(&hits),
            CountMode::IntersectionStrict => {
                let covering: Vec<usize> = hits
                    .into_iter()
                    .filter(|&idx| {
                        exons_cover(
                            &self.index.gene(idx).reduced_exons,
                            fragment.start,
                            fragment.end,
                        )
                    })
                    .collect();
                single(&covering)
            }
            CountMode::IntersectionNotEmpty => {
                if hits.len() <= 1 {
                    return single(&hits);
                }
                let genes: Vec<&Gene> = hits.iter().map(|&idx| self.index.gene(idx)).collect();
                let survivors = genes_with_unique_coverage(&genes, fragment.start, fragment.end);
                match survivors.as_slice() {
                    [only] => Assignment::Assigned(hits[*only]),
                    _ => Assignment::Ambiguous,
                }
            }
        }
    }
}

fn single(genes: &[usize]) -> Assignment {
    match genes {
        [] => Assignment::NoFeature,
        [only] => Assignment::Assigned(*only),
        _ => Assignment::Ambiguous,
    }
}

/// First reduced exon that ends at or after `start`.
fn first_reaching(reduced: &[GenomicInterval], start: i64) -> Option<&GenomicInterval> {
    let idx = reduced.partition_point(|iv| iv.end < start);
    reduced.get(idx)
}

/// True when any reduced exon shares a base with `start..=end`.
pub fn exons_overlap(reduced: &[GenomicInterval], start: i64, end: i64) -> bool {
    first_reaching(reduced, start).is_some_and(|iv| iv.start <= end)
}

/// True when one reduced exon contains all of `start..=end`.
///
/// Reduced exons are disjoint and never abut, so full coverage by the
/// union is the same as containment in a single interval.
pub fn exons_cover(reduced: &[GenomicInterval], start: i64, end: i64) -> bool {
    first_reaching(reduced, start).is_some_and(|iv| iv.contains(start, end))
}

/// Positions (into `genes`) of genes owning at least one base of
/// `start..=end` that no other gene in `genes` covers.
pub fn genes_with_unique_coverage(genes: &[&Gene], start: i64, end: i64) -> Vec<usize> {
    // (position, opening, owner); closing events sit one past the last base.
    let mut events: Vec<(i64, bool, usize)> = Vec::new();
    for (owner, gene) in genes.iter().enumerate() {
        for iv in &gene.reduced_exons {
            let s = iv.start.max(start);
            let e = iv.end.min(end);
            if s <= e {
                events.push((s, true, owner));
                events.push((e + 1, false, owner));
            }
        }
    }
    events.sort_unstable();

    let mut active = vec![false; genes.len()];
    let mut unique = vec![false; genes.len()];
    let mut depth = 0usize;
    let mut i = 0;
    while i < events.len() {
        let pos = events[i].0;
        // The run just before `pos` had constant coverage.
        if depth == 1 {
            if let Some(owner) = active.iter().position(|&a| a) {
                unique[owner] = true;
            }
        }
        while i < events.len() && events[i].0 == pos {
            let (_, opening, owner) = events[i];
            if opening {
                active[owner] = true;
                depth += 1;
            } else {
                active[owner] = false;
                depth -= 1;
            }
            i += 1;
        }
    }

    unique
        .iter()
        .enumerate()
        .filter(|(_, u)| **u)
        .map(|(k, _)| k)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Exon, Strand};

    fn exon(gene: &str, start: i64, end: i64, strand: Strand) -> Exon {
        Exon::new(gene.to_string(), "chr1".to_string(), start, end, strand)
    }

    fn frag(start: i64, end: i64) -> Fragment {
        Fragment::new("chr1".to_string(), start, end, Strand::Positive)
    }

    fn resolve_all(index: &AnnotationIndex, fragment: &Fragment) -> [Assignment; 3] {
        [
            OverlapResolver::new(index, CountMode::Union, false).resolve(fragment),
            OverlapResolver::new(index, CountMode::IntersectionStrict, false).resolve(fragment),
            OverlapResolver::new(index, CountMode::IntersectionNotEmpty, false).resolve(fragment),
        ]
    }

    fn id(index: &AnnotationIndex, assignment: Assignment) -> Option<&str> {
        match assignment {
            Assignment::Assigned(idx) => Some(index.gene(idx).id.as_str()),
            _ => None,
        }
    }

    #[test]
    fn test_exons_overlap_and_cover() {
        let reduced = vec![
            GenomicInterval::new("chr1".to_string(), 100, 200, Strand::Positive),
            GenomicInterval::new("chr1".to_string(), 300, 400, Strand::Positive),
        ];
        assert!(exons_overlap(&reduced, 150, 250));
        assert!(exons_overlap(&reduced, 250, 300));
        assert!(!exons_overlap(&reduced, 201, 299));
        assert!(!exons_overlap(&reduced, 401, 500));
        assert!(exons_cover(&reduced, 300, 400));
        assert!(!exons_cover(&reduced, 150, 350)); // spans the intron
    }

    #[test]
    fn test_intronic_fragment_is_no_feature() {
        let index = AnnotationIndex::build(vec![
            exon("A", 100, 200, Strand::Positive),
            exon("A", 300, 400, Strand::Positive),
        ])
        .unwrap();
        for outcome in resolve_all(&index, &frag(210, 290)) {
            assert_eq!(outcome, Assignment::NoFeature);
        }
    }

    #[test]
    fn test_nested_gene() {
        let index = AnnotationIndex::build(vec![
            exon("OUTER", 100, 500, Strand::Positive),
            exon("INNER", 200, 300, Strand::Positive),
        ])
        .unwrap();

        // Entirely inside the shared part.
        let [union, strict, not_empty] = resolve_all(&index, &frag(250, 280));
        assert_eq!(union, Assignment::Ambiguous);
        assert_eq!(strict, Assignment::Ambiguous);
        assert_eq!(not_empty, Assignment::Ambiguous);

        // Reaches into the outer gene's own bases.
        let [union, strict, not_empty] = resolve_all(&index, &frag(250, 350));
        assert_eq!(union, Assignment::Ambiguous);
        assert_eq!(id(&index, strict), Some("OUTER"));
        assert_eq!(id(&index, not_empty), Some("OUTER"));
    }

    #[test]
    fn test_strict_requires_full_coverage() {
        let index = AnnotationIndex::build(vec![exon("A", 100, 200, Strand::Positive)]).unwrap();
        let [union, strict, not_empty] = resolve_all(&index, &frag(150, 250));
        assert_eq!(id(&index, union), Some("A"));
        assert_eq!(strict, Assignment::NoFeature);
        assert_eq!(id(&index, not_empty), Some("A"));
    }

    #[test]
    fn test_partially_shared_exons() {
        let index = AnnotationIndex::build(vec![
            exon("A", 100, 200, Strand::Positive),
            exon("B", 150, 250, Strand::Positive),
        ])
        .unwrap();

        // Touches A-only bases (120..149) and shared bases, but no B-only bases.
        let [union, strict, not_empty] = resolve_all(&index, &frag(120, 160));
        assert_eq!(union, Assignment::Ambiguous);
        assert_eq!(id(&index, strict), Some("A"));
        assert_eq!(id(&index, not_empty), Some("A"));

        // Reaches both A-only and B-only bases.
        let [union, strict, not_empty] = resolve_all(&index, &frag(140, 210));
        assert_eq!(union, Assignment::Ambiguous);
        assert_eq!(strict, Assignment::NoFeature);
        assert_eq!(not_empty, Assignment::Ambiguous);
    }

    #[test]
    fn test_stranded_filter() {
        let index = AnnotationIndex::build(vec![
            exon("PLUS", 100, 200, Strand::Positive),
            exon("MINUS", 100, 200, Strand::Negative),
        ])
        .unwrap();
        let fragment = frag(120, 160);

        let unstranded = OverlapResolver::new(&index, CountMode::Union, false);
        assert_eq!(unstranded.resolve(&fragment), Assignment::Ambiguous);

        let stranded = OverlapResolver::new(&index, CountMode::Union, true);
        assert_eq!(id(&index, stranded.resolve(&fragment)), Some("PLUS"));

        let reverse = Fragment::new("chr1".to_string(), 120, 160, Strand::Negative);
        assert_eq!(id(&index, stranded.resolve(&reverse)), Some("MINUS"));
    }

    #[test]
    fn test_unknown_chrom_is_no_feature() {
        let index = AnnotationIndex::build(vec![exon("A", 100, 200, Strand::Positive)]).unwrap();
        let fragment = Fragment::new("chr9".to_string(), 100, 200, Strand::Positive);
        assert_eq!(resolve_all(&index, &fragment), [Assignment::NoFeature; 3]);
    }

    #[test]
    fn test_unique_coverage_sweep() {
        let index = AnnotationIndex::build(vec![
            exon("A", 100, 200, Strand::Positive),
            exon("B", 150, 250, Strand::Positive),
            exon("C", 300, 400, Strand::Positive),
        ])
        .unwrap();
        let genes: Vec<&Gene> = index.genes().iter().collect();
        assert_eq!(genes_with_unique_coverage(&genes, 120, 160), vec![0]);
        assert_eq!(genes_with_unique_coverage(&genes, 150, 200), Vec::<usize>::new());
        assert_eq!(genes_with_unique_coverage(&genes, 190, 320), vec![1, 2]);
    }
}
