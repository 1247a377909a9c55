//! Expression normalization.
//!
//! Turns final integer counts into RPM, FPKM, RPK and TPM. TPM depends on
//! the RPK of every gene, so normalization runs once, after all fragments
//! have been counted.

use log::warn;

use crate::annotation::AnnotationIndex;
use crate::types::ExpressionRow;

/// Reads per million: `count * 1e6 / total`. NaN when `total` is 0.
pub fn rpm(count: u64, total: u64) -> f64 {
    if total == 0 {
        return f64::NAN;
    }
    count as f64 * 1e6 / total as f64
}

/// Reads per kilobase of effective length. NaN for a zero length.
pub fn rpk(count: u64, effective_length_kb: f64) -> f64 {
    if effective_length_kb <= 0.0 {
        return f64::NAN;
    }
    count as f64 / effective_length_kb
}

/// FPKM from an RPM value. NaN for a zero length.
pub fn fpkm(rpm: f64, effective_length_kb: f64) -> f64 {
    if effective_length_kb <= 0.0 {
        return f64::NAN;
    }
    rpm / effective_length_kb
}

/// TPM for every gene given all RPK values.
///
/// Non-finite RPK values (degenerate genes) stay NaN and are left out of
/// the scaling sum.
pub fn tpm(rpks: &[f64]) -> Vec<f64> {
    let scale: f64 = rpks.iter().filter(|v| v.is_finite()).sum::<f64>() / 1e6;
    rpks.iter()
        .map(|&v| {
            if !v.is_finite() || scale == 0.0 {
                f64::NAN
            } else {
                v / scale
            }
        })
        .collect()
}

/// Build one expression row per gene, sorted by gene identifier.
///
/// `counts` is indexed like `index.genes()`.
pub fn normalize(index: &AnnotationIndex, counts: &[u64]) -> Vec<ExpressionRow> {
    debug_assert_eq!(index.len(), counts.len());

    let total: u64 = counts.iter().sum();
    if total == 0 {
        warn!("No fragments were assigned to any gene; FPKM and TPM are NaN for every gene");
    }

    let degenerate = index
        .genes()
        .iter()
        .filter(|g| g.effective_length_kb <= 0.0)
        .count();
    if degenerate > 0 {
        warn!("{} genes have zero effective length; their FPKM and TPM are NaN", degenerate);
    }

    let rpks: Vec<f64> = index
        .genes()
        .iter()
        .zip(counts)
        .map(|(gene, &count)| rpk(count, gene.effective_length_kb))
        .collect();
    let tpms = tpm(&rpks);

    let mut rows: Vec<ExpressionRow> = index
        .genes()
        .iter()
        .zip(counts)
        .zip(tpms)
        .map(|((gene, &count), tpm)| ExpressionRow {
            gene_id: gene.id.clone(),
            counts: count,
            chrom: gene.chrom.clone(),
            start: gene.start(),
            end: gene.end(),
            full_length_kb: gene.full_length_kb,
            effective_length_kb: gene.effective_length_kb,
            fpkm: fpkm(rpm(count, total), gene.effective_length_kb),
            tpm,
        })
        .collect();

    rows.sort_by(|a, b| a.gene_id.cmp(&b.gene_id));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Exon, Strand};

    fn index(genes: &[(&str, i64, i64)]) -> AnnotationIndex {
        AnnotationIndex::build(genes.iter().map(|(id, start, end)| {
            Exon::new(id.to_string(), "chr1".to_string(), *start, *end, Strand::Positive)
        }))
        .unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_rpm_and_rpk() {
        assert!(close(rpm(10, 10), 1e6));
        assert!(close(rpm(5, 20), 250_000.0));
        assert!(rpm(0, 0).is_nan());
        assert!(close(rpk(10, 0.1), 100.0));
        assert!(rpk(10, 0.0).is_nan());
        assert!(fpkm(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_single_gene_scenario() {
        let index = index(&[("G1", 1000, 1099)]);
        let rows = normalize(&index, &[10]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.counts, 10);
        assert!((row.effective_length_kb - 0.1).abs() < 1e-12);
        assert!((row.fpkm - 1e7).abs() / 1e7 < 1e-9);
        assert!((row.tpm - 1e6).abs() / 1e6 < 1e-9);
    }

    #[test]
    fn test_tpm_sums_to_one_million() {
        let index = index(&[("A", 1, 1000), ("B", 5001, 5500), ("C", 9001, 12000)]);
        let rows = normalize(&index, &[7, 31, 2]);
        let sum: f64 = rows.iter().map(|r| r.tpm).sum();
        assert!((sum - 1e6).abs() / 1e6 < 1e-3);
    }

    #[test]
    fn test_zero_total_gives_nan() {
        let index = index(&[("A", 1, 1000), ("B", 5001, 5500)]);
        let rows = normalize(&index, &[0, 0]);
        for row in rows {
            assert_eq!(row.counts, 0);
            assert!(row.fpkm.is_nan());
            assert!(row.tpm.is_nan());
        }
    }

    #[test]
    fn test_tpm_skips_non_finite_rpk() {
        let values = tpm(&[f64::NAN, 100.0, 300.0]);
        assert!(values[0].is_nan());
        assert!(close(values[1], 250_000.0));
        assert!(close(values[2], 750_000.0));
    }

    #[test]
    fn test_rows_sorted_by_gene_id() {
        let index = index(&[("zeta", 1, 100), ("alpha", 201, 300), ("Mid", 401, 500)]);
        let rows = normalize(&index, &[1, 2, 3]);
        let ids: Vec<&str> = rows.iter().map(|r| r.gene_id.as_str()).collect();
        assert_eq!(ids, vec!["Mid", "alpha", "zeta"]);
    }
}
