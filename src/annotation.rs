//! Gene models and the per-chromosome gene index.
//!
//! Exons are grouped by gene, reduced to disjoint sorted intervals and
//! summarized into full-span and effective (exonic) lengths. Genes are then
//! indexed by chromosome so that an overlap probe only visits genes whose
//! span could reach the query.

use ahash::AHashMap;
use indexmap::IndexMap;
use log::warn;
use std::fmt;

use crate::types::{Exon, Gene, GenomicInterval, Strand};

/// Errors raised while building gene models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    /// A gene's exons lie on more than one chromosome.
    MixedChromosomes { gene_id: String, chroms: Vec<String> },
    /// A gene without exons.
    EmptyGene(String),
    /// An exon whose end precedes its start.
    InvalidInterval { gene_id: String, start: i64, end: i64 },
}

impl fmt::Display for AnnotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationError::MixedChromosomes { gene_id, chroms } => write!(
                f,
                "gene '{}' has exons on more than one chromosome: {}",
                gene_id,
                chroms.join(", ")
            ),
            AnnotationError::EmptyGene(gene_id) => write!(f, "gene '{}' has no exons", gene_id),
            AnnotationError::InvalidInterval {
                gene_id,
                start,
                end,
            } => write!(
                f,
                "gene '{}' has an exon with end before start ({} > {})",
                gene_id, start, end
            ),
        }
    }
}

impl std::error::Error for AnnotationError {}

/// Merge intervals that overlap or abut into a disjoint list sorted by start.
///
/// All intervals are expected to share a chromosome; the strand of the
/// first interval in each merged run is kept.
pub fn reduce_intervals(intervals: &[GenomicInterval]) -> Vec<GenomicInterval> {
    let mut sorted: Vec<&GenomicInterval> = intervals.iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

    let mut reduced: Vec<GenomicInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match reduced.last_mut() {
            Some(last) if interval.start <= last.end + 1 => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => reduced.push(interval.clone()),
        }
    }
    reduced
}

/// Build one gene model from its exons.
pub fn build_gene(gene_id: &str, exons: Vec<Exon>) -> Result<Gene, AnnotationError> {
    let first = exons
        .first()
        .ok_or_else(|| AnnotationError::EmptyGene(gene_id.to_string()))?;
    let chrom = first.interval.chrom.clone();
    let mut strand = first.interval.strand;

    let mut chroms: Vec<String> = Vec::new();
    for exon in &exons {
        if exon.interval.end < exon.interval.start {
            return Err(AnnotationError::InvalidInterval {
                gene_id: gene_id.to_string(),
                start: exon.interval.start,
                end: exon.interval.end,
            });
        }
        if !chroms.contains(&exon.interval.chrom) {
            chroms.push(exon.interval.chrom.clone());
        }
        if exon.interval.strand != strand {
            strand = Strand::Unknown;
        }
    }
    if chroms.len() > 1 {
        return Err(AnnotationError::MixedChromosomes {
            gene_id: gene_id.to_string(),
            chroms,
        });
    }
    if strand == Strand::Unknown && first.interval.strand != Strand::Unknown {
        warn!("Gene {} has exons on both strands; treating it as unstranded", gene_id);
    }

    let intervals: Vec<GenomicInterval> = exons.iter().map(|e| e.interval.clone()).collect();
    let reduced_exons = reduce_intervals(&intervals);

    let start = intervals.iter().map(|i| i.start).min().unwrap_or(0);
    let end = intervals.iter().map(|i| i.end).max().unwrap_or(0);
    let full_span = GenomicInterval::new(chrom.clone(), start, end, strand);

    let effective: i64 = reduced_exons.iter().map(|i| i.length()).sum();

    Ok(Gene {
        id: gene_id.to_string(),
        chrom,
        strand,
        exons,
        reduced_exons,
        full_length_kb: full_span.length() as f64 / 1000.0,
        effective_length_kb: effective as f64 / 1000.0,
        full_span,
    })
}

/// Genes of one chromosome, ordered by span start.
#[derive(Debug, Clone, Default)]
struct ChromGenes {
    /// Indices into `AnnotationIndex::genes`, sorted by (start, id).
    order: Vec<usize>,
    /// Span starts aligned with `order`.
    starts: Vec<i64>,
    /// Longest full span on the chromosome.
    max_span: i64,
}

/// Read-only gene models plus a coordinate index.
#[derive(Debug, Clone, Default)]
pub struct AnnotationIndex {
    /// Gene models sorted by identifier.
    genes: Vec<Gene>,
    by_chrom: AHashMap<String, ChromGenes>,
}

impl AnnotationIndex {
    /// Group exons by gene and build every gene model.
    pub fn build<I>(exons: I) -> Result<Self, AnnotationError>
    where
        I: IntoIterator<Item = Exon>,
    {
        let mut grouped: IndexMap<String, Vec<Exon>> = IndexMap::new();
        for exon in exons {
            grouped.entry(exon.gene_id.clone()).or_default().push(exon);
        }

        let mut genes = Vec::with_capacity(grouped.len());
        for (gene_id, gene_exons) in grouped {
            genes.push(build_gene(&gene_id, gene_exons)?);
        }
        genes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut by_chrom: AHashMap<String, ChromGenes> = AHashMap::new();
        for (idx, gene) in genes.iter().enumerate() {
            let entry = by_chrom.entry(gene.chrom.clone()).or_default();
            entry.order.push(idx);
            entry.max_span = entry.max_span.max(gene.end() - gene.start());
        }
        for chrom_genes in by_chrom.values_mut() {
            chrom_genes
                .order
                .sort_by(|&a, &b| genes[a].start().cmp(&genes[b].start()).then(a.cmp(&b)));
            chrom_genes.starts = chrom_genes.order.iter().map(|&i| genes[i].start()).collect();
        }

        Ok(AnnotationIndex { genes, by_chrom })
    }

    /// All genes, sorted by identifier.
    pub fn genes(&self) -> &[Gene] {
        &self.genes
    }

    /// Gene by dense index.
    ///
    /// # Panics
    ///
    /// Panics if `idx >= self.len()`. Use [`AnnotationIndex::position`] to
    /// look a gene up by identifier instead.
    pub fn gene(&self, idx: usize) -> &Gene {
        &self.genes[idx]
    }

    /// Dense index of a gene identifier.
    pub fn position(&self, gene_id: &str) -> Option<usize> {
        self.genes
            .binary_search_by(|g| g.id.as_str().cmp(gene_id))
            .ok()
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// True when at least one gene lives on `chrom`.
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.by_chrom.contains_key(chrom)
    }

    /// Chromosome names present in the annotation.
    pub fn chroms(&self) -> impl Iterator<Item = &str> {
        self.by_chrom.keys().map(|c| c.as_str())
    }

    /// Indices of genes on `chrom` whose full span overlaps `start..=end`.
    pub fn genes_spanning<'a>(
        &'a self,
        chrom: &str,
        start: i64,
        end: i64,
    ) -> impl Iterator<Item = usize> + 'a {
        let (slice, from) = match self.by_chrom.get(chrom) {
            Some(chrom_genes) => {
                let search_start = start.saturating_sub(chrom_genes.max_span);
                let from = find_search_start_index(&chrom_genes.starts, search_start);
                (chrom_genes.order.as_slice(), from)
            }
            None => (&[][..], 0),
        };
        slice[from..]
            .iter()
            .copied()
            .take_while(move |&idx| self.genes[idx].start() <= end)
            .filter(move |&idx| self.genes[idx].end() >= start)
    }
}

/// First position whose start is not below `search_start`.
pub fn find_search_start_index(starts: &[i64], search_start: i64) -> usize {
    starts.partition_point(|&s| s < search_start)
}
