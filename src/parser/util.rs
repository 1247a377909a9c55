//! Utility functions for file parsing.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Creates a buffered reader that automatically handles gzip-compressed files.
///
/// Compression is detected from the ".gz" extension or from the gzip magic
/// bytes, so bgzip-compressed inputs without the extension also work.
pub fn create_buffered_reader(file: File, path: &Path) -> Box<dyn BufRead + Send> {
    let mut plain = BufReader::new(file);
    let by_extension = path.to_string_lossy().ends_with(".gz");
    let by_magic = plain
        .fill_buf()
        .map(|head| head.starts_with(&GZIP_MAGIC))
        .unwrap_or(false);

    if by_extension || by_magic {
        Box::new(BufReader::new(MultiGzDecoder::new(plain)))
    } else {
        Box::new(plain)
    }
}

/// Open `path` for buffered reading, decompressing gzip transparently.
pub fn open_input(path: &Path, what: &str) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", what, path.display()))?;
    Ok(create_buffered_reader(file, path))
}
