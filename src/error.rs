//! Typed failure cases for the annotation pipeline
//!
//! Everything else travels as `anyhow::Error` with context; these variants are
//! the conditions callers are expected to match on (via `downcast_ref`).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotateError {
    /// No family/genus/species rank could be derived from the taxonomy
    #[error(
        "None of the taxonomy levels \"family\", \"genus\", or \"species\" are present. \
         Please check your taxonomy file."
    )]
    MissingRanks,

    /// Taxonomy table lacks the feature identifier + taxon columns
    #[error("Taxonomy table must have a feature identifier and a taxon column; found {found} column(s)")]
    TaxonomyShape { found: usize },

    #[error("Feature identifier '{0}' appears more than once in the taxonomy")]
    DuplicateFeatureId(String),

    /// Trait reference header does not match the fixed 24-column layout
    #[error(
        "Header line does not match FungalTraitsFormat. It must consist of the following values: {}\n\nFound instead: {}{}",
        .expected.join(", "),
        .found.join(", "),
        describe_difference(.missing, .unexpected)
    )]
    TraitHeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("{table}: missing required column '{column}'. Available columns: {available:?}")]
    MissingColumn {
        table: String,
        column: String,
        available: Vec<String>,
    },
}

fn describe_difference(missing: &[String], unexpected: &[String]) -> String {
    let mut out = String::new();
    if !missing.is_empty() {
        out.push_str(&format!("\nMissing: {}", missing.join(", ")));
    }
    if !unexpected.is_empty() {
        out.push_str(&format!("\nUnexpected: {}", unexpected.join(", ")));
    }
    out
}
