//! Core data structures for genecount.
//!
//! This module contains the value types shared by the annotation index,
//! the fragment assembler, the overlap resolver and the normalizer.

use std::fmt;
use std::str::FromStr;

/// Strand orientation for genomic features and reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Positive,
    Negative,
    Unknown,
}

/// Error type for parsing strand from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStrandError;

impl fmt::Display for ParseStrandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid strand: expected '+', '-', '.' or '*'")
    }
}

impl std::error::Error for ParseStrandError {}

impl FromStr for Strand {
    type Err = ParseStrandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "+" => Ok(Strand::Positive),
            "-" => Ok(Strand::Negative),
            "." | "*" => Ok(Strand::Unknown),
            _ => Err(ParseStrandError),
        }
    }
}

impl Strand {
    /// Convert strand to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Positive => "+",
            Strand::Negative => "-",
            Strand::Unknown => ".",
        }
    }

    /// Same-strand test used for stranded counting.
    ///
    /// An unknown strand on either side is compatible with anything.
    pub fn is_compatible(&self, other: Strand) -> bool {
        *self == Strand::Unknown || other == Strand::Unknown || *self == other
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overlap-resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountMode {
    /// Count when exactly one gene overlaps the fragment.
    Union,
    /// Count when exactly one gene's exons contain the whole fragment.
    IntersectionStrict,
    /// Count when exactly one gene covers part of the fragment no other gene covers.
    IntersectionNotEmpty,
}

/// Error type for parsing a count mode from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCountModeError(pub String);

impl fmt::Display for ParseCountModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid mode '{}': expected 'union', 'intersection-strict' or 'intersection-not-empty'",
            self.0
        )
    }
}

impl std::error::Error for ParseCountModeError {}

impl FromStr for CountMode {
    type Err = ParseCountModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "union" => Ok(CountMode::Union),
            "intersectionstrict" => Ok(CountMode::IntersectionStrict),
            "intersectionnotempty" => Ok(CountMode::IntersectionNotEmpty),
            _ => Err(ParseCountModeError(s.to_string())),
        }
    }
}

impl CountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountMode::Union => "union",
            CountMode::IntersectionStrict => "intersection-strict",
            CountMode::IntersectionNotEmpty => "intersection-not-empty",
        }
    }
}

impl fmt::Display for CountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stranded closed interval on one chromosome (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
}

impl GenomicInterval {
    /// Create a new interval.
    pub fn new(chrom: String, start: i64, end: i64, strand: Strand) -> Self {
        GenomicInterval {
            chrom,
            start,
            end,
            strand,
        }
    }

    /// Number of bases covered (end - start + 1).
    pub fn length(&self) -> i64 {
        self.end - self.start + 1
    }

    /// True when the two closed ranges share at least one base.
    ///
    /// Only coordinates are compared; callers check chrom and strand.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.start <= end && start <= self.end
    }

    /// True when every base of `start..=end` lies inside this interval.
    pub fn contains(&self, start: i64, end: i64) -> bool {
        self.start <= start && end <= self.end
    }
}

/// An exon record tagged with its gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exon {
    pub gene_id: String,
    pub interval: GenomicInterval,
}

impl Exon {
    /// Create a new exon.
    pub fn new(gene_id: String, chrom: String, start: i64, end: i64, strand: Strand) -> Self {
        Exon {
            gene_id,
            interval: GenomicInterval::new(chrom, start, end, strand),
        }
    }

    /// Get exon length.
    pub fn length(&self) -> i64 {
        self.interval.length()
    }
}

/// A gene model built from its exons.
#[derive(Debug, Clone)]
pub struct Gene {
    pub id: String,
    pub chrom: String,
    pub strand: Strand,
    /// Raw exons, in annotation order.
    pub exons: Vec<Exon>,
    /// Disjoint exonic intervals, sorted by start.
    pub reduced_exons: Vec<GenomicInterval>,
    /// Minimum exon start to maximum exon end.
    pub full_span: GenomicInterval,
    pub full_length_kb: f64,
    pub effective_length_kb: f64,
}

impl Gene {
    /// Start of the full span.
    pub fn start(&self) -> i64 {
        self.full_span.start
    }

    /// End of the full span.
    pub fn end(&self) -> i64 {
        self.full_span.end
    }
}

/// One alignment as delivered by the alignment reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentRecord {
    /// Read-pair identity.
    pub name: String,
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
    pub mapq: u32,
    pub paired: bool,
    pub mate_present: bool,
    /// First segment of the template; its strand is the fragment strand.
    pub first_mate: bool,
    pub is_primary: bool,
}

impl AlignmentRecord {
    /// A primary, unpaired alignment.
    pub fn single(name: &str, chrom: &str, start: i64, end: i64, strand: Strand, mapq: u32) -> Self {
        AlignmentRecord {
            name: name.to_string(),
            chrom: chrom.to_string(),
            start,
            end,
            strand,
            mapq,
            paired: false,
            mate_present: false,
            first_mate: true,
            is_primary: true,
        }
    }

    /// A primary alignment of a properly paired read whose mate is mapped.
    pub fn mate(
        name: &str,
        chrom: &str,
        start: i64,
        end: i64,
        strand: Strand,
        mapq: u32,
        first_mate: bool,
    ) -> Self {
        AlignmentRecord {
            name: name.to_string(),
            chrom: chrom.to_string(),
            start,
            end,
            strand,
            mapq,
            paired: true,
            mate_present: true,
            first_mate,
            is_primary: true,
        }
    }
}

/// One countable unit: a single read or the span of a read pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub strand: Strand,
}

impl Fragment {
    /// Create a new fragment.
    pub fn new(chrom: String, start: i64, end: i64, strand: Strand) -> Self {
        Fragment {
            chrom,
            start,
            end,
            strand,
        }
    }

    /// Get the fragment length (end - start + 1).
    pub fn length(&self) -> i64 {
        self.end - self.start + 1
    }
}

impl From<&AlignmentRecord> for Fragment {
    fn from(record: &AlignmentRecord) -> Self {
        Fragment::new(record.chrom.clone(), record.start, record.end, record.strand)
    }
}

/// Final integer count for one gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneCount {
    pub gene_id: String,
    pub count: u64,
}

/// One row of the expression table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionRow {
    pub gene_id: String,
    pub counts: u64,
    pub chrom: String,
    pub start: i64,
    pub end: i64,
    pub full_length_kb: f64,
    pub effective_length_kb: f64,
    pub fpkm: f64,
    pub tpm: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strand_parsing() {
        assert_eq!("+".parse::<Strand>(), Ok(Strand::Positive));
        assert_eq!("-".parse::<Strand>(), Ok(Strand::Negative));
        assert_eq!(".".parse::<Strand>(), Ok(Strand::Unknown));
        assert_eq!("*".parse::<Strand>(), Ok(Strand::Unknown));
        assert!("x".parse::<Strand>().is_err());
    }

    #[test]
    fn test_strand_compatibility() {
        assert!(Strand::Positive.is_compatible(Strand::Positive));
        assert!(!Strand::Positive.is_compatible(Strand::Negative));
        assert!(Strand::Unknown.is_compatible(Strand::Negative));
        assert!(Strand::Negative.is_compatible(Strand::Unknown));
    }

    #[test]
    fn test_count_mode_parsing() {
        assert_eq!("union".parse::<CountMode>(), Ok(CountMode::Union));
        assert_eq!("Union".parse::<CountMode>(), Ok(CountMode::Union));
        assert_eq!(
            "IntersectionStrict".parse::<CountMode>(),
            Ok(CountMode::IntersectionStrict)
        );
        assert_eq!(
            "intersection-not-empty".parse::<CountMode>(),
            Ok(CountMode::IntersectionNotEmpty)
        );
        assert_eq!(
            "intersection_strict".parse::<CountMode>(),
            Ok(CountMode::IntersectionStrict)
        );
        assert!("overlap".parse::<CountMode>().is_err());
        assert!("".parse::<CountMode>().is_err());
    }

    #[test]
    fn test_interval_length() {
        let interval = GenomicInterval::new("chr1".to_string(), 1000, 1099, Strand::Positive);
        assert_eq!(interval.length(), 100);
    }

    #[test]
    fn test_interval_overlap_and_containment() {
        let interval = GenomicInterval::new("chr1".to_string(), 100, 200, Strand::Positive);
        assert!(interval.overlaps(200, 300));
        assert!(interval.overlaps(50, 100));
        assert!(!interval.overlaps(201, 300));
        assert!(interval.contains(100, 200));
        assert!(interval.contains(150, 160));
        assert!(!interval.contains(150, 201));
    }

    #[test]
    fn test_fragment_from_record() {
        let record = AlignmentRecord::single("r1", "chr1", 10, 59, Strand::Negative, 30);
        let fragment = Fragment::from(&record);
        assert_eq!(fragment.chrom, "chr1");
        assert_eq!(fragment.length(), 50);
        assert_eq!(fragment.strand, Strand::Negative);
    }
}
