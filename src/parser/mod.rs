//! Readers for annotation and alignment text formats.

pub mod gtf;
pub mod sam;
pub mod util;

pub use gtf::{parse_gtf, parse_gtf_reader};
pub use sam::SamReader;
