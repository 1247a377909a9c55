//! Fragment assembly from alignment records.
//!
//! Applies the mapping-quality and primary-alignment filters, joins mates
//! in paired mode and drops fragments that cannot be counted. The assembler
//! is a lazy iterator adaptor: records are pulled one at a time and the only
//! buffered state is the set of mates still waiting for their partner.

use ahash::AHashSet;
use anyhow::Result;
use indexmap::IndexMap;

use crate::config::Config;
use crate::types::{AlignmentRecord, Fragment, Strand};

/// Exclusion tallies collected while assembling fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Records pulled from the source.
    pub records: u64,
    pub low_mapq: u64,
    pub non_primary: u64,
    /// Mate pairs whose mates sit on different chromosomes.
    pub non_concordant: u64,
    /// Mates emitted alone because their partner is missing.
    pub orphans_counted: u64,
    /// Mates dropped because their partner is missing.
    pub orphans_dropped: u64,
    pub empty: u64,
    pub unknown_chrom: u64,
    /// Fragments handed downstream.
    pub fragments: u64,
}

/// Options that shape fragment assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyOptions {
    pub single_end: bool,
    pub count_fragments: bool,
    pub mapq_filter: u32,
}

impl From<&Config> for AssemblyOptions {
    fn from(config: &Config) -> Self {
        AssemblyOptions {
            single_end: config.single_end,
            count_fragments: config.count_fragments,
            mapq_filter: config.mapq_filter,
        }
    }
}

/// Turns alignment records into countable fragments.
pub struct FragmentAssembler<I> {
    records: I,
    options: AssemblyOptions,
    known_chroms: Option<AHashSet<String>>,
    /// Mates waiting for their partner, keyed by read name.
    pending: IndexMap<String, AlignmentRecord>,
    /// Unmatched mates being drained once the source is exhausted.
    leftovers: Option<indexmap::map::IntoIter<String, AlignmentRecord>>,
    stats: AssemblyStats,
}

impl<I> FragmentAssembler<I>
where
    I: Iterator<Item = Result<AlignmentRecord>>,
{
    pub fn new(records: I, options: AssemblyOptions) -> Self {
        FragmentAssembler {
            records,
            options,
            known_chroms: None,
            pending: IndexMap::new(),
            leftovers: None,
            stats: AssemblyStats::default(),
        }
    }

    /// Drop fragments on chromosomes outside `chroms`.
    pub fn with_known_chroms<'a, C>(mut self, chroms: C) -> Self
    where
        C: IntoIterator<Item = &'a str>,
    {
        self.known_chroms = Some(chroms.into_iter().map(str::to_string).collect());
        self
    }

    /// Tallies so far. Complete once the iterator returned `None`.
    pub fn stats(&self) -> &AssemblyStats {
        &self.stats
    }

    /// Number of mates currently waiting for a partner.
    pub fn pending_mates(&self) -> usize {
        self.pending.len()
    }

    /// Feed one record through the filters and the pairing buffer.
    fn accept(&mut self, record: AlignmentRecord) -> Option<Fragment> {
        if record.mapq < self.options.mapq_filter {
            self.stats.low_mapq += 1;
            return None;
        }
        if !record.is_primary {
            self.stats.non_primary += 1;
            return None;
        }

        if self.options.single_end {
            return Some(Fragment::from(&record));
        }

        if !record.paired || !record.mate_present {
            return self.orphan(&record);
        }

        match self.pending.swap_remove(&record.name) {
            None => {
                self.pending.insert(record.name.clone(), record);
                None
            }
            Some(mate) => self.join(mate, record),
        }
    }

    fn join(&mut self, a: AlignmentRecord, b: AlignmentRecord) -> Option<Fragment> {
        if a.chrom != b.chrom {
            self.stats.non_concordant += 1;
            return None;
        }
        let strand = fragment_strand(&a, &b);
        Some(Fragment::new(
            a.chrom,
            a.start.min(b.start),
            a.end.max(b.end),
            strand,
        ))
    }

    fn orphan(&mut self, record: &AlignmentRecord) -> Option<Fragment> {
        if self.options.count_fragments {
            self.stats.orphans_counted += 1;
            Some(Fragment::from(record))
        } else {
            self.stats.orphans_dropped += 1;
            None
        }
    }

    /// Final filter applied to every candidate fragment.
    fn keep(&mut self, fragment: Fragment) -> Option<Fragment> {
        if fragment.end < fragment.start {
            self.stats.empty += 1;
            return None;
        }
        if let Some(known) = &self.known_chroms {
            if !known.contains(&fragment.chrom) {
                self.stats.unknown_chrom += 1;
                return None;
            }
        }
        self.stats.fragments += 1;
        Some(fragment)
    }
}

/// Strand of a joined pair: the first mate decides.
fn fragment_strand(a: &AlignmentRecord, b: &AlignmentRecord) -> Strand {
    match (a.first_mate, b.first_mate) {
        (true, _) => a.strand,
        (false, true) => b.strand,
        (false, false) => Strand::Unknown,
    }
}

impl<I> Iterator for FragmentAssembler<I>
where
    I: Iterator<Item = Result<AlignmentRecord>>,
{
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.leftovers.is_none() {
            match self.records.next() {
                Some(Ok(record)) => {
                    self.stats.records += 1;
                    if let Some(fragment) = self.accept(record) {
                        if let Some(fragment) = self.keep(fragment) {
                            return Some(Ok(fragment));
                        }
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => self.leftovers = Some(std::mem::take(&mut self.pending).into_iter()),
            }
        }

        // Source drained: flush mates whose partner never arrived.
        while let Some((_, record)) = self.leftovers.as_mut().and_then(|it| it.next()) {
            if let Some(fragment) = self.orphan(&record) {
                if let Some(fragment) = self.keep(fragment) {
                    return Some(Ok(fragment));
                }
            }
        }
        None
    }
}
