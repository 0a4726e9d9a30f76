//! Shared helpers
//!
//! - Frame helpers: TSV reading, column validation, TSV/Parquet writers
//! - Ranked fallback: species → genus → family value resolution

pub mod fallback;
pub mod frame_helpers;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use fallback::{Provenance, RankedFallback, RankedObservation, Resolution};
pub use frame_helpers::{materialize_with_columns, read_tsv};
