//! Annotation stages applied to a parsed taxonomy
//!
//! - `spore_volume`: per-category spore volume with rank provenance
//! - `traits`: FungalTraits lifestyle columns joined on genus

pub mod spore_volume;
pub mod traits;

pub use spore_volume::{add_spore_volume, SporeAnnotations};
pub use traits::{add_fungal_traits, DisambiguationRules, FamilyPreference, TraitMatches};
