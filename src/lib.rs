//! genecount - Gene-level read counting and expression normalization.
//!
//! This library assigns aligned sequencing fragments to genes from a GTF
//! annotation and turns the per-gene counts into FPKM and TPM.
//!
//! # Features
//!
//! - Parse GTF and SAM files (with gzip support)
//! - Collapse each gene's exons into a non-overlapping footprint
//! - Pair mates into fragments, with mapping-quality and primary filters
//! - Resolve overlaps in union, intersection-strict or intersection-not-empty mode
//! - Count sequentially or on a worker pool
//!
//! # Example
//!
//! ```ignore
//! use genecount::config::Config;
//! use genecount::pipeline::run;
//! use std::path::Path;
//!
//! let mut config = Config::default();
//! config.set_mode("intersection-not-empty")?;
//! let summary = run(
//!     &config,
//!     Path::new("genes.gtf"),
//!     Path::new("sample.sam"),
//!     Path::new("counts.csv"),
//!     None,
//! )?;
//! println!("{} fragments assigned", summary.assigned);
//! ```

pub mod annotation;
pub mod config;
pub mod counter;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod types;

pub use annotation::AnnotationIndex;
pub use config::Config;
pub use counter::{Assignment, CountAccumulator, FragmentAssembler, OverlapResolver};
pub use types::{CountMode, ExpressionRow, Fragment, Gene, Strand};
