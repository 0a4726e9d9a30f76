//! FungalTraits Annotator
//!
//! Annotates fungal taxonomy tables with spore volume estimates and
//! FungalTraits lifestyle attributes.
//!
//! - `taxonomy`: ranked taxon strings → family/genus/species columns
//! - `data`: spore measurement and FungalTraits reference tables
//! - `annotate`: spore volume fallback and trait merge
//! - `pipeline`: `TraitAnnotator` coordinator and `AnnotatedTable` output

pub mod annotate;
pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod taxonomy;
pub mod utils;

// Re-export commonly used types
pub use annotate::{DisambiguationRules, FamilyPreference};
pub use config::AnnotatorConfig;
pub use data::{ReferenceData, SporeCategory, SporeFilterPolicy, SporeReference, TraitReference};
pub use error::AnnotateError;
pub use pipeline::{annotate, AnnotatedTable, OutputFormat, TraitAnnotator, FEATURE_ID_COL};
pub use taxonomy::{load_taxonomy, parse_taxonomy, PrefixDetection, Rank, Taxonomy};
pub use utils::{Provenance, Resolution};
