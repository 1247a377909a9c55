//! End-to-end counting run.
//!
//! Wires the readers, the fragment assembler, the overlap resolver and the
//! normalizer together. With more than one thread the producer (reader and
//! mate pairing) runs on the calling thread and hands fragment batches to a
//! rayon pool over a bounded channel. Every worker counts into its own
//! accumulator and the partial counts are summed once the stream is drained.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{info, warn};
use std::mem;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crate::annotation::AnnotationIndex;
use crate::config::Config;
use crate::counter::{
    count_batch, AssemblyOptions, AssemblyStats, CountAccumulator, FragmentAssembler,
    OverlapResolver,
};
use crate::normalize::normalize;
use crate::output::{write_expression_table, write_summary};
use crate::parser::{parse_gtf, SamReader};
use crate::types::{CountMode, ExpressionRow, Fragment};

/// Totals of one run, reported in the log and the optional summary file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub genes: usize,
    pub assembly: AssemblyStats,
    pub assigned: u64,
    pub no_feature: u64,
    pub ambiguous: u64,
}

impl RunSummary {
    fn new(genes: usize, assembly: AssemblyStats, counts: &CountAccumulator) -> Self {
        RunSummary {
            genes,
            assembly,
            assigned: counts.assigned(),
            no_feature: counts.no_feature(),
            ambiguous: counts.ambiguous(),
        }
    }

    /// Status lines in report order.
    pub fn entries(&self) -> Vec<(&'static str, u64)> {
        let a = &self.assembly;
        vec![
            ("Assigned", self.assigned),
            ("Unassigned_NoFeatures", self.no_feature),
            ("Unassigned_Ambiguity", self.ambiguous),
            ("Unassigned_MappingQuality", a.low_mapq),
            ("Unassigned_Secondary", a.non_primary),
            ("Unassigned_NonConcordant", a.non_concordant),
            ("Unassigned_Singleton", a.orphans_dropped),
            ("Unassigned_Empty", a.empty),
            ("Unassigned_UnknownChromosome", a.unknown_chrom),
        ]
    }
}

/// Number of worker threads for a requested count (0 = one per CPU).
pub fn resolve_threads(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get()
    } else {
        requested
    }
}

/// Parse the annotation and build the gene index.
pub fn load_annotation(path: &Path, gene_id_tag: &str) -> Result<AnnotationIndex> {
    info!("Parsing GTF file: {}", path.display());
    let exons = parse_gtf(path, gene_id_tag)?;
    let index = AnnotationIndex::build(exons)
        .with_context(|| format!("Invalid gene model in {}", path.display()))?;
    if index.is_empty() {
        warn!("No genes found in {}", path.display());
    }
    info!(
        "Loaded {} genes on {} chromosomes",
        index.len(),
        index.chroms().count()
    );
    Ok(index)
}

/// Count fragments on the calling thread.
pub fn count_sequential<I>(
    index: &AnnotationIndex,
    mode: CountMode,
    stranded: bool,
    fragments: I,
) -> Result<CountAccumulator>
where
    I: Iterator<Item = Result<Fragment>>,
{
    let resolver = OverlapResolver::new(index, mode, stranded);
    let mut counts = CountAccumulator::new(index.len());
    for fragment in fragments {
        counts.add(resolver.resolve(&fragment?));
    }
    Ok(counts)
}

/// Count fragments on `num_threads` workers, feeding them `batch_size` fragments at a time.
pub fn count_parallel<I>(
    index: Arc<AnnotationIndex>,
    config: &Config,
    num_threads: usize,
    fragments: I,
) -> Result<CountAccumulator>
where
    I: Iterator<Item = Result<Fragment>>,
{
    info!("Using parallel mode with {} threads", num_threads);

    let (work_tx, work_rx): (Sender<Vec<Fragment>>, Receiver<Vec<Fragment>>) =
        bounded(num_threads * 4);
    // One partial accumulator per worker; never blocks.
    let (result_tx, result_rx): (Sender<CountAccumulator>, Receiver<CountAccumulator>) =
        bounded(num_threads);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to create thread pool")?;

    let mode = config.mode;
    let stranded = config.stranded;
    let index_for_workers = Arc::clone(&index);

    let workers_handle = thread::spawn(move || {
        pool.scope(|s| {
            for _ in 0..num_threads {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let index = Arc::clone(&index_for_workers);

                s.spawn(move |_| {
                    worker_loop(work_rx, result_tx, &index, mode, stranded);
                });
            }
        });
    });

    // Producer: pairing state lives here, so mates never end up in different batches.
    let batch_size = config.batch_size;
    let mut batch = Vec::with_capacity(batch_size);
    let mut failure = None;
    for fragment in fragments {
        match fragment {
            Ok(fragment) => {
                batch.push(fragment);
                if batch.len() >= batch_size {
                    let full = mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    if work_tx.send(full).is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    if failure.is_none() && !batch.is_empty() {
        let _ = work_tx.send(batch);
    }

    // Close work channel to signal workers to exit
    drop(work_tx);

    workers_handle
        .join()
        .map_err(|_| anyhow!("Worker thread panicked"))?;

    if let Some(e) = failure {
        return Err(e);
    }

    let mut counts = CountAccumulator::new(index.len());
    for partial in result_rx.try_iter() {
        counts.merge(&partial);
    }
    Ok(counts)
}

/// Worker loop: counts every batch it receives, then reports its totals.
fn worker_loop(
    work_rx: Receiver<Vec<Fragment>>,
    result_tx: Sender<CountAccumulator>,
    index: &AnnotationIndex,
    mode: CountMode,
    stranded: bool,
) {
    let resolver = OverlapResolver::new(index, mode, stranded);
    let mut counts = CountAccumulator::new(index.len());
    while let Ok(batch) = work_rx.recv() {
        count_batch(&resolver, &batch, &mut counts);
    }
    let _ = result_tx.send(counts);
}

/// Read, assemble, count and normalize. Nothing is written.
pub fn quantify(
    config: &Config,
    annotation: &Path,
    alignments: &Path,
) -> Result<(Vec<ExpressionRow>, RunSummary)> {
    config.validate()?;
    let index = Arc::new(load_annotation(annotation, &config.gene_id_tag)?);

    info!("Processing alignment file: {}", alignments.display());
    let reader = SamReader::new(alignments)?;
    let mut assembler = FragmentAssembler::new(reader, AssemblyOptions::from(config))
        .with_known_chroms(index.chroms());

    let num_threads = resolve_threads(config.threads);
    let counts = if num_threads == 1 {
        count_sequential(&index, config.mode, config.stranded, assembler.by_ref())
    } else {
        count_parallel(Arc::clone(&index), config, num_threads, assembler.by_ref())
    }
    .with_context(|| format!("Failed to read alignments from {}", alignments.display()))?;

    let summary = RunSummary::new(index.len(), *assembler.stats(), &counts);
    info!(
        "Processed {} records into {} fragments ({} mode)",
        summary.assembly.records,
        summary.assembly.fragments,
        config.mode.as_str()
    );
    info!(
        "Assigned {}, no feature {}, ambiguous {}",
        summary.assigned, summary.no_feature, summary.ambiguous
    );

    let rows = normalize(&index, counts.counts());
    Ok((rows, summary))
}

/// Full run: quantify and write the table (and summary, if requested).
pub fn run(
    config: &Config,
    annotation: &Path,
    alignments: &Path,
    output: &Path,
    summary_path: Option<&Path>,
) -> Result<RunSummary> {
    let (rows, summary) = quantify(config, annotation, alignments)?;

    info!("Writing output to: {} ({} genes)", output.display(), rows.len());
    write_expression_table(output, &rows)?;

    if let Some(path) = summary_path {
        info!("Writing summary to: {}", path.display());
        write_summary(path, &summary)?;
    }
    Ok(summary)
}
