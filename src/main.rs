//! CLI entry point for genecount.

use anyhow::{bail, Result};
use clap::Parser;
use log::{info, Level};
use std::path::PathBuf;

use genecount::config::{Config, DEFAULT_BATCH_SIZE};
use genecount::pipeline::run;

/// Gene-level fragment counting and expression normalization.
///
/// Counts alignments from a SAM file against genes from a GTF file and
/// writes raw counts, FPKM and TPM per gene as CSV.
#[derive(Parser, Debug)]
#[command(name = "genecount")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GTF annotation file (required)
    #[arg(short = 'a', long = "annotation")]
    annotation: PathBuf,

    /// SAM alignment file (required)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output CSV file (required)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Overlap mode: union, intersection-strict or intersection-not-empty
    #[arg(short = 'm', long = "mode", default_value = "union")]
    mode: String,

    /// Join mates into one fragment per pair
    #[arg(long = "paired")]
    paired: bool,

    /// Only count fragments against genes on the same strand
    #[arg(long = "stranded")]
    stranded: bool,

    /// In paired mode, count mates whose partner is missing
    #[arg(long = "count-fragments")]
    count_fragments: bool,

    /// Minimum mapping quality
    #[arg(short = 'q', long = "mapq", default_value = "0", allow_negative_numbers = true)]
    mapq: i64,

    /// GTF tag for gene ID
    #[arg(short = 'G', long = "gene", default_value = "gene_id")]
    gene_tag: String,

    /// Number of worker threads (0 = auto-detect, 1 = sequential)
    #[arg(long = "threads", short = 'j', default_value = "1")]
    threads: usize,

    /// Fragments per work item in parallel mode
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Optional tab-separated summary of assignment outcomes
    #[arg(long = "summary")]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    simple_logger::init_with_level(Level::Info)?;

    // Validate inputs
    if !args.annotation.exists() {
        bail!("GTF file not found: {}", args.annotation.display());
    }
    if !args.input.exists() {
        bail!("SAM file not found: {}", args.input.display());
    }

    let mut config = Config::new();
    config.set_mode(&args.mode)?;
    config.set_mapq_filter(args.mapq)?;
    config.set_batch_size(args.batch_size)?;
    config.single_end = !args.paired;
    config.stranded = args.stranded;
    config.count_fragments = args.count_fragments;
    config.gene_id_tag = args.gene_tag.clone();
    config.threads = args.threads;

    if args.count_fragments && !args.paired {
        info!("--count-fragments has no effect without --paired");
    }

    run(
        &config,
        &args.annotation,
        &args.input,
        &args.output,
        args.summary.as_deref(),
    )?;

    info!("Done!");
    Ok(())
}
