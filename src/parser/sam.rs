//! SAM file reader with gzip support.
//!
//! Streams alignment records out of SAM text files. Header lines and
//! unmapped reads are skipped; everything else becomes an
//! [`AlignmentRecord`] spanning the reference bases its CIGAR consumes.

use anyhow::{anyhow, bail, Context, Result};
use std::io::BufRead;
use std::path::Path;

use crate::parser::util::open_input;
use crate::types::{AlignmentRecord, Strand};

const FLAG_PAIRED: u16 = 0x1;
const FLAG_UNMAPPED: u16 = 0x4;
const FLAG_MATE_UNMAPPED: u16 = 0x8;
const FLAG_REVERSE: u16 = 0x10;
const FLAG_FIRST_SEGMENT: u16 = 0x40;
const FLAG_LAST_SEGMENT: u16 = 0x80;
const FLAG_SECONDARY: u16 = 0x100;
const FLAG_SUPPLEMENTARY: u16 = 0x800;

/// Largest 1-based position a SAM record can carry (2^31 - 1).
const MAX_POS: u32 = i32::MAX as u32;

/// Streaming SAM reader.
///
/// Yields records in file order. Malformed lines are reported as errors
/// carrying the line number.
pub struct SamReader {
    reader: Box<dyn BufRead + Send>,
    line: String,
    line_no: usize,
}

impl SamReader {
    /// Create a new SamReader from a file path (supports .gz).
    pub fn new(path: &Path) -> Result<Self> {
        Ok(Self::from_reader(open_input(path, "SAM")?))
    }

    /// Wrap an already opened reader.
    pub fn from_reader(reader: Box<dyn BufRead + Send>) -> Self {
        SamReader {
            reader,
            line: String::new(),
            line_no: 0,
        }
    }

    fn next_record(&mut self) -> Result<Option<AlignmentRecord>> {
        loop {
            self.line.clear();
            let bytes_read = self
                .reader
                .read_line(&mut self.line)
                .context("Failed to read SAM line")?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let trimmed = self.line.trim_end();
            if trimmed.is_empty() || trimmed.starts_with('@') {
                continue;
            }

            if let Some(record) = parse_sam_line(trimmed)
                .with_context(|| format!("Malformed SAM record on line {}", self.line_no))?
            {
                return Ok(Some(record));
            }
        }
    }
}

impl Iterator for SamReader {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Parse one SAM alignment line.
///
/// Returns `None` for records that carry no placement (unmapped flag,
/// `*` reference, position 0 or `*` CIGAR).
pub fn parse_sam_line(line: &str) -> Result<Option<AlignmentRecord>> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 11 {
        bail!("expected at least 11 columns, found {}", fields.len());
    }

    let flag: u16 = fields[1]
        .parse()
        .with_context(|| format!("invalid FLAG '{}'", fields[1]))?;
    let chrom = fields[2];
    let pos: u32 = fields[3]
        .parse()
        .with_context(|| format!("invalid POS '{}'", fields[3]))?;
    if pos > MAX_POS {
        bail!("POS {} exceeds the maximum of {}", pos, MAX_POS);
    }
    let pos = i64::from(pos);
    let mapq: u32 = fields[4]
        .parse()
        .with_context(|| format!("invalid MAPQ '{}'", fields[4]))?;
    let cigar = fields[5];

    if flag & FLAG_UNMAPPED != 0 || chrom == "*" || pos == 0 || cigar == "*" {
        return Ok(None);
    }

    let ref_len = reference_length(cigar)?;
    let end = pos + ref_len - 1;
    let paired = flag & FLAG_PAIRED != 0;
    let strand = if flag & FLAG_REVERSE != 0 {
        Strand::Negative
    } else {
        Strand::Positive
    };

    Ok(Some(AlignmentRecord {
        name: fields[0].to_string(),
        chrom: chrom.to_string(),
        start: pos,
        end,
        strand,
        mapq,
        paired,
        mate_present: paired && flag & FLAG_MATE_UNMAPPED == 0,
        first_mate: !paired || flag & FLAG_FIRST_SEGMENT != 0 || flag & FLAG_LAST_SEGMENT == 0,
        is_primary: flag & (FLAG_SECONDARY | FLAG_SUPPLEMENTARY) == 0,
    }))
}

/// Number of reference bases consumed by a CIGAR string.
///
/// M, D, N, = and X consume the reference; I, S, H and P do not.
pub fn reference_length(cigar: &str) -> Result<i64> {
    let mut total = 0i64;
    let mut len = 0i64;
    let mut has_digits = false;

    for c in cigar.chars() {
        if let Some(d) = c.to_digit(10) {
            len = len
                .checked_mul(10)
                .and_then(|l| l.checked_add(i64::from(d)))
                .filter(|&l| l <= i64::from(MAX_POS))
                .ok_or_else(|| anyhow!("CIGAR operation length too large in '{}'", cigar))?;
            has_digits = true;
            continue;
        }
        if !has_digits {
            return Err(anyhow!("invalid CIGAR '{}'", cigar));
        }
        match c {
            'M' | 'D' | 'N' | '=' | 'X' => {
                total = total
                    .checked_add(len)
                    .filter(|&t| t <= i64::from(MAX_POS))
                    .ok_or_else(|| anyhow!("CIGAR '{}' spans more than {} bases", cigar, MAX_POS))?;
            }
            'I' | 'S' | 'H' | 'P' => {}
            _ => bail!("invalid CIGAR operation '{}' in '{}'", c, cigar),
        }
        len = 0;
        has_digits = false;
    }
    if has_digits {
        bail!("CIGAR '{}' ends without an operation", cigar);
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn reader_for(content: &'static str) -> SamReader {
        SamReader::from_reader(Box::new(BufReader::new(content.as_bytes())))
    }

    #[test]
    fn test_reference_length() {
        assert_eq!(reference_length("100M").unwrap(), 100);
        assert_eq!(reference_length("10S80M10S").unwrap(), 80);
        assert_eq!(reference_length("50M1000N50M").unwrap(), 1100);
        assert_eq!(reference_length("20M2I20M3D10M").unwrap(), 53);
        assert_eq!(reference_length("5H10=2X5H").unwrap(), 12);
        assert!(reference_length("M").is_err());
        assert!(reference_length("10Q").is_err());
        assert!(reference_length("10M5").is_err());
    }

    #[test]
    fn test_parse_single_end_line() {
        let line = "read1\t16\tchr1\t1000\t60\t100M\t*\t0\t0\t*\t*";
        let record = parse_sam_line(line).unwrap().unwrap();
        assert_eq!(record.name, "read1");
        assert_eq!(record.chrom, "chr1");
        assert_eq!(record.start, 1000);
        assert_eq!(record.end, 1099);
        assert_eq!(record.strand, Strand::Negative);
        assert_eq!(record.mapq, 60);
        assert!(!record.paired);
        assert!(!record.mate_present);
        assert!(record.first_mate);
        assert!(record.is_primary);
    }

    #[test]
    fn test_parse_paired_flags() {
        // 99 = paired, proper pair, mate reverse, first in pair
        let first = parse_sam_line("p1\t99\tchr1\t100\t60\t50M\t=\t300\t250\t*\t*")
            .unwrap()
            .unwrap();
        assert!(first.paired);
        assert!(first.mate_present);
        assert!(first.first_mate);
        assert_eq!(first.strand, Strand::Positive);

        // 147 = paired, proper pair, reverse, second in pair
        let second = parse_sam_line("p1\t147\tchr1\t300\t60\t50M\t=\t100\t-250\t*\t*")
            .unwrap()
            .unwrap();
        assert!(!second.first_mate);
        assert_eq!(second.strand, Strand::Negative);

        // 73 = paired, mate unmapped, first in pair
        let orphan = parse_sam_line("p2\t73\tchr1\t100\t60\t50M\t=\t100\t0\t*\t*")
            .unwrap()
            .unwrap();
        assert!(orphan.paired);
        assert!(!orphan.mate_present);
    }

    #[test]
    fn test_parse_secondary_and_supplementary() {
        let secondary = parse_sam_line("r\t256\tchr1\t100\t0\t50M\t*\t0\t0\t*\t*")
            .unwrap()
            .unwrap();
        assert!(!secondary.is_primary);
        let supplementary = parse_sam_line("r\t2048\tchr1\t100\t0\t50M\t*\t0\t0\t*\t*")
            .unwrap()
            .unwrap();
        assert!(!supplementary.is_primary);
    }

    #[test]
    fn test_parse_unmapped_is_skipped() {
        assert!(parse_sam_line("r\t4\t*\t0\t0\t*\t*\t0\t0\t*\t*").unwrap().is_none());
        assert!(parse_sam_line("r\t0\tchr1\t100\t0\t*\t*\t0\t0\t*\t*").unwrap().is_none());
    }

    #[test]
    fn test_parse_malformed_line() {
        assert!(parse_sam_line("r\t0\tchr1").is_err());
        assert!(parse_sam_line("r\tx\tchr1\t100\t0\t50M\t*\t0\t0\t*\t*").is_err());
        assert!(parse_sam_line("r\t0\tchr1\t100\t-1\t50M\t*\t0\t0\t*\t*").is_err());
        // Out-of-range coordinates and lengths are errors, not overflows.
        assert!(reference_length("99999999999999999999M").is_err());
        assert!(reference_length("2147483647M2147483647N").is_err());
        assert!(parse_sam_line("r\t0\tchr1\t9223372036854775000\t60\t1000M\t*\t0\t0\t*\t*").is_err());
        assert!(parse_sam_line("r\t0\tchr1\t2147483648\t60\t10M\t*\t0\t0\t*\t*").is_err());
        assert!(parse_sam_line("r\t0\tchr1\t-5\t60\t10M\t*\t0\t0\t*\t*").is_err());
        let last = parse_sam_line("r\t0\tchr1\t2147483647\t60\t2147483647M\t*\t0\t0\t*\t*")
            .unwrap()
            .unwrap();
        assert_eq!(last.end, 2 * 2147483647 - 1);
    }

    #[test]
    fn test_reader_skips_header_and_unmapped() {
        let content = "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:5000\n\
r1\t0\tchr1\t100\t60\t10M\t*\t0\t0\t*\t*\n\
r2\t4\t*\t0\t0\t*\t*\t0\t0\t*\t*\n\
\n\
r3\t16\tchr1\t200\t60\t10M\t*\t0\t0\t*\t*\n";
        let records: Vec<AlignmentRecord> = reader_for(content).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "r1");
        assert_eq!(records[1].name, "r3");
    }

    #[test]
    fn test_reader_reports_line_number() {
        let content = "@HD\tVN:1.6\nr1\t0\tchr1\t100\t60\t10M\t*\t0\t0\t*\t*\nbroken\tline\n";
        let results: Vec<Result<AlignmentRecord>> = reader_for(content).collect();
        assert_eq!(results.len(), 2);
        let err = results[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
