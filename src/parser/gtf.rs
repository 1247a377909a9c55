//! GTF file parser with gzip support.
//!
//! Extracts exon records from GTF (Gene Transfer Format) annotation files.
//! Gene, transcript and other feature lines are ignored: gene models are
//! derived from exons alone.

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::Path;

use crate::parser::util::open_input;
use crate::types::{Exon, Strand};

/// Parse a GTF file and return its exons in file order.
///
/// Supports both plain text and gzip-compressed GTF files.
pub fn parse_gtf(path: &Path, gene_id_tag: &str) -> Result<Vec<Exon>> {
    let reader = open_input(path, "GTF")?;
    parse_gtf_reader(reader, gene_id_tag)
}

/// Parse GTF data from a reader.
pub fn parse_gtf_reader<R: BufRead>(reader: R, gene_id_tag: &str) -> Result<Vec<Exon>> {
    let mut exons = Vec::new();

    for (line_idx, line_result) in reader.lines().enumerate() {
        let line_no = line_idx + 1;
        let line = line_result.context("Failed to read GTF line")?;

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 9 {
            continue;
        }

        if fields[2] != "exon" {
            continue;
        }

        let chrom = fields[0];
        let start: i64 = fields[3]
            .parse()
            .with_context(|| format!("Failed to parse start coordinate on GTF line {}", line_no))?;
        let end: i64 = fields[4]
            .parse()
            .with_context(|| format!("Failed to parse end coordinate on GTF line {}", line_no))?;
        if start < 1 {
            bail!("Start coordinate {} is below 1 on GTF line {}", start, line_no);
        }
        let strand = fields[6]
            .parse::<Strand>()
            .with_context(|| format!("Invalid strand on GTF line {}", line_no))?;

        let gene_id = extract_attribute(fields[8], gene_id_tag).with_context(|| {
            format!("Failed to extract {} from exon on GTF line {}", gene_id_tag, line_no)
        })?;

        exons.push(Exon::new(gene_id, chrom.to_string(), start, end, strand));
    }

    Ok(exons)
}

/// Extract an attribute value from the GTF attributes string.
///
/// GTF attributes are in the format: key "value"; key "value"; ...
fn extract_attribute(attributes: &str, key: &str) -> Option<String> {
    for attribute in attributes.split(';') {
        let attribute = attribute.trim();
        let Some((name, value)) = attribute.split_once(' ') else {
            continue;
        };
        if name == key {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}
