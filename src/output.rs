//! Output formatting for genecount results.
//!
//! This module writes the expression table as CSV and the optional
//! counting summary. Files are written to a temporary sibling and renamed
//! into place, so a failed or aborted run never leaves a partial table.

use anyhow::{Context, Result};
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::pipeline::RunSummary;
use crate::types::ExpressionRow;

/// Column names of the expression table.
pub const HEADER: [&str; 9] = [
    "gene_id",
    "counts",
    "chrom",
    "start",
    "end",
    "full_length_kb",
    "effective_length_kb",
    "fpkm",
    "tpm",
];

/// Write the output header.
pub fn write_header<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "{}", HEADER.join(","))?;
    Ok(())
}

/// Quote a CSV field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Format a float; NaN is spelled `NaN`.
fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        value.to_string()
    }
}

/// Format a single output line for one gene.
pub fn format_output_line(row: &ExpressionRow) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{}",
        csv_field(&row.gene_id),
        row.counts,
        csv_field(&row.chrom),
        row.start,
        row.end,
        format_float(row.full_length_kb),
        format_float(row.effective_length_kb),
        format_float(row.fpkm),
        format_float(row.tpm),
    )
}

/// Write header and rows to any writer.
pub fn write_rows<W: Write>(writer: &mut W, rows: &[ExpressionRow]) -> Result<()> {
    write_header(writer)?;
    for row in rows {
        writeln!(writer, "{}", format_output_line(row))?;
    }
    Ok(())
}

/// Write `contents` to `path` through a temporary file in the same directory.
fn write_atomically<F>(path: &Path, contents: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    {
        let mut writer = BufWriter::new(&mut temp);
        contents(&mut writer)?;
        writer.flush()?;
    }
    temp.persist(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    Ok(())
}

/// Write the expression table to `path`.
pub fn write_expression_table(path: &Path, rows: &[ExpressionRow]) -> Result<()> {
    write_atomically(path, |writer| write_rows(writer, rows))
}

/// Write the counting summary as `Status\tCount` lines.
pub fn write_summary_to<W: Write>(writer: &mut W, summary: &RunSummary) -> Result<()> {
    writeln!(writer, "Status\tCount")?;
    for (status, count) in summary.entries() {
        writeln!(writer, "{}\t{}", status, count)?;
    }
    Ok(())
}

/// Write the counting summary to `path`.
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    write_atomically(path, |writer| write_summary_to(writer, summary))
}
