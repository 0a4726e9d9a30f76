//! Reference Data Loading
//!
//! Loads the two static reference tables with Polars:
//! - Spore measurements (one row per measured spore, keyed by organism/genus/family)
//! - FungalTraits lifestyle table (one row per genus, fixed 24-column header)

use crate::config::AnnotatorConfig;
use crate::error::AnnotateError;
use crate::taxonomy::Rank;
use crate::utils::fallback::RankedObservation;
use crate::utils::frame_helpers::{column_names, materialize_with_columns, read_tsv, string_values};
use anyhow::{Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

pub const SPORE_NAME_COL: &str = "names_to_use";
pub const SPORE_GENUS_COL: &str = "genus";
pub const SPORE_FAMILY_COL: &str = "family";
pub const SPORE_TYPE_COL: &str = "SporeType";
pub const SPORE_VOLUME_COL: &str = "SporeVolume";
pub const SPORE_LOG_VOLUME_COL: &str = "log10_spore_volume";

/// Columns the spore table must provide
pub const REQUIRED_SPORE_COLS: &[&str] = &[
    SPORE_NAME_COL,
    SPORE_GENUS_COL,
    SPORE_FAMILY_COL,
    SPORE_TYPE_COL,
    SPORE_VOLUME_COL,
];

/// FungalTraits header (order-independent)
pub const TRAIT_HEADER: [&str; 24] = [
    "jrk_template",
    "Phylum",
    "Class",
    "Order",
    "Family",
    "GENUS",
    "COMMENT on genus",
    "primary_lifestyle",
    "Secondary_lifestyle",
    "Comment_on_lifestyle_template",
    "Endophytic_interaction_capability_template",
    "Plant_pathogenic_capacity_template",
    "Decay_substrate_template",
    "Decay_type_template",
    "Aquatic_habitat_template",
    "Animal_biotrophic_capacity_template",
    "Specific_hosts",
    "Growth_form_template",
    "Fruitbody_type_template",
    "Hymenium_type_template",
    "Ectomycorrhiza_exploration_type_template",
    "Ectomycorrhiza_lineage_template",
    "primary_photobiont",
    "secondary_photobiont",
];

pub const TRAIT_GENUS_COL: &str = "GENUS";
pub const TRAIT_FAMILY_COL: &str = "Family";

/// Lineage helpers used for disambiguation only, never emitted
pub const LINEAGE_COLUMNS: [&str; 7] = [
    "GENUS",
    "COMMENT on genus",
    "jrk_template",
    "Phylum",
    "Class",
    "Order",
    "Family",
];

/// What to do with non-positive spore volumes
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum SporeFilterPolicy {
    /// Drop rows with absent or non-positive volume; log10 precomputed at load
    #[default]
    PositiveOnly,
    /// Keep every row; log10 computed at aggregation (zero → -inf, negative → NaN)
    KeepAll,
}

/// The four spore classes annotated separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SporeCategory {
    Mitospores,
    Meiospores,
    MultinucleateSexualSpores,
    MultinucleateAsexualSpores,
}

impl SporeCategory {
    /// Output column order
    pub const ALL: [SporeCategory; 4] = [
        SporeCategory::Mitospores,
        SporeCategory::Meiospores,
        SporeCategory::MultinucleateSexualSpores,
        SporeCategory::MultinucleateAsexualSpores,
    ];

    /// `SporeType` value after space → underscore normalization
    pub fn label(self) -> &'static str {
        match self {
            SporeCategory::Mitospores => "Mitospores",
            SporeCategory::Meiospores => "Meiospores",
            SporeCategory::MultinucleateSexualSpores => "Multinucleate_sexual_spores",
            SporeCategory::MultinucleateAsexualSpores => "Multinucleate_asexual_spores",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.label() == label)
    }

    /// e.g. `mitospores_spore_volume`
    pub fn volume_column(self) -> String {
        format!("{}_spore_volume", self.label().to_lowercase())
    }

    /// e.g. `mitospores_spore_volume_information`
    pub fn information_column(self) -> String {
        format!("{}_spore_volume_information", self.label().to_lowercase())
    }
}

impl fmt::Display for SporeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One spore measurement
#[derive(Debug, Clone, PartialEq)]
pub struct SporeRecord {
    pub name: Option<String>,
    pub genus: Option<String>,
    pub family: Option<String>,
    /// Raw normalized `SporeType`
    pub spore_type: Option<String>,
    pub category: Option<SporeCategory>,
    pub volume: Option<f64>,
    /// Present when the filter policy precomputes it
    log10_volume: Option<f64>,
}

impl SporeRecord {
    /// log10(volume), precomputed or derived on demand
    pub fn log10_volume(&self) -> Option<f64> {
        self.log10_volume.or_else(|| self.volume.map(libm::log10))
    }
}

impl RankedObservation for SporeRecord {
    fn key(&self, rank: Rank) -> Option<&str> {
        match rank {
            Rank::Species => self.name.as_deref(),
            Rank::Genus => self.genus.as_deref(),
            Rank::Family => self.family.as_deref(),
        }
    }

    fn value(&self) -> Option<f64> {
        self.volume
    }

    fn log10_value(&self) -> Option<f64> {
        self.log10_volume()
    }
}

/// Normalized spore measurement table
#[derive(Debug, Clone)]
pub struct SporeReference {
    records: Vec<SporeRecord>,
    policy: SporeFilterPolicy,
}

impl SporeReference {
    pub fn load(path: &Path, policy: SporeFilterPolicy) -> Result<Self> {
        let df = read_tsv(path)?;
        Self::from_frame(&df, policy).with_context(|| format!("Invalid spore data: {:?}", path))
    }

    /// Normalize names and spore types (spaces → underscores), apply the filter policy
    pub fn from_frame(df: &DataFrame, policy: SporeFilterPolicy) -> Result<Self> {
        let df = materialize_with_columns(df, REQUIRED_SPORE_COLS, "spore data")?;

        let names = string_values(&df, SPORE_NAME_COL)?;
        let genera = string_values(&df, SPORE_GENUS_COL)?;
        let families = string_values(&df, SPORE_FAMILY_COL)?;
        let types = string_values(&df, SPORE_TYPE_COL)?;
        let volumes = string_values(&df, SPORE_VOLUME_COL)?;

        let mut records = Vec::with_capacity(df.height());
        let mut unparsable = 0usize;
        let mut dropped = 0usize;

        let rows = names.into_iter().zip(genera).zip(families).zip(types).zip(volumes);
        for ((((name, genus), family), spore_type), volume) in rows {
            let volume = match volume.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => match raw.parse::<f64>() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        unparsable += 1;
                        None
                    }
                },
                _ => None,
            };

            let log10_volume = match policy {
                SporeFilterPolicy::PositiveOnly => match volume {
                    Some(v) if v > 0.0 => Some(libm::log10(v)),
                    _ => {
                        dropped += 1;
                        continue;
                    }
                },
                SporeFilterPolicy::KeepAll => None,
            };

            let spore_type = spore_type.map(|s| s.replace(' ', "_"));
            let category = spore_type.as_deref().and_then(SporeCategory::from_label);

            records.push(SporeRecord {
                name: name.map(|s| s.replace(' ', "_")),
                genus,
                family,
                spore_type,
                category,
                volume,
                log10_volume,
            });
        }

        if unparsable > 0 {
            tracing::warn!(rows = unparsable, "Spore volumes that are not numbers treated as absent");
        }
        let uncategorized = records.iter().filter(|r| r.category.is_none()).count();
        if uncategorized > 0 {
            tracing::warn!(rows = uncategorized, "Spore rows with an unknown SporeType are never matched");
        }
        tracing::debug!(kept = records.len(), dropped, ?policy, "Normalized spore data");

        Ok(Self { records, policy })
    }

    pub fn records(&self) -> &[SporeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn policy(&self) -> SporeFilterPolicy {
        self.policy
    }

    /// Rows of one spore category, in table order
    pub fn for_category(&self, category: SporeCategory) -> Vec<&SporeRecord> {
        self.records
            .iter()
            .filter(|record| record.category == Some(category))
            .collect()
    }

    /// Normalized table, with the log-volume column filled when precomputed
    #[cfg(test)]
    pub(crate) fn to_frame(&self) -> Result<DataFrame> {
        let columns = vec![
            text_column(&self.records, SPORE_NAME_COL, |r| r.name.as_deref()),
            text_column(&self.records, SPORE_GENUS_COL, |r| r.genus.as_deref()),
            text_column(&self.records, SPORE_FAMILY_COL, |r| r.family.as_deref()),
            text_column(&self.records, SPORE_TYPE_COL, |r| r.spore_type.as_deref()),
            Series::new(
                SPORE_VOLUME_COL.into(),
                self.records.iter().map(|r| r.volume).collect::<Vec<_>>(),
            )
            .into_column(),
            Series::new(
                SPORE_LOG_VOLUME_COL.into(),
                self.records.iter().map(|r| r.log10_volume).collect::<Vec<_>>(),
            )
            .into_column(),
        ];

        DataFrame::new(columns).context("Failed to build spore frame")
    }
}

#[cfg(test)]
fn text_column(
    records: &[SporeRecord],
    name: &str,
    field: impl Fn(&SporeRecord) -> Option<&str>,
) -> Column {
    let values: Vec<Option<&str>> = records.iter().map(field).collect();
    Series::new(name.into(), values).into_column()
}

/// Check a trait table header against [`TRAIT_HEADER`] as a set
///
/// # Errors
/// [`AnnotateError::TraitHeaderMismatch`] with expected, observed, missing and
/// unexpected column names.
pub fn validate_trait_header(found: &[String]) -> Result<()> {
    let expected: BTreeSet<&str> = TRAIT_HEADER.iter().copied().collect();
    let observed: BTreeSet<&str> = found.iter().map(String::as_str).collect();

    if expected == observed && found.len() == TRAIT_HEADER.len() {
        return Ok(());
    }

    let missing = TRAIT_HEADER
        .iter()
        .filter(|name| !observed.contains(*name))
        .map(|name| name.to_string())
        .collect();
    let unexpected = found
        .iter()
        .filter(|name| !expected.contains(name.as_str()))
        .cloned()
        .collect();

    Err(AnnotateError::TraitHeaderMismatch {
        expected: TRAIT_HEADER.iter().map(|s| s.to_string()).collect(),
        found: found.to_vec(),
        missing,
        unexpected,
    }
    .into())
}

/// Validate a trait asset on disk without keeping it
pub fn validate_trait_file(path: &Path) -> Result<()> {
    let df = read_tsv(path)?;
    validate_trait_header(&column_names(&df))
        .with_context(|| format!("Invalid FungalTraits table: {:?}", path))
}

/// FungalTraits lifestyle table, row-major in header order
#[derive(Debug, Clone)]
pub struct TraitReference {
    header: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    /// Genus → row indices in table order (usually one, two for reclassified genera)
    by_genus: FxHashMap<String, SmallVec<[usize; 2]>>,
    family_idx: usize,
}

impl TraitReference {
    pub fn load(path: &Path) -> Result<Self> {
        let df = read_tsv(path)?;
        Self::from_frame(&df).with_context(|| format!("Invalid FungalTraits table: {:?}", path))
    }

    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let header = column_names(df);
        validate_trait_header(&header)?;

        let columns = header
            .iter()
            .map(|name| string_values(df, name))
            .collect::<Result<Vec<_>>>()?;

        let rows: Vec<Vec<Option<String>>> = (0..df.height())
            .map(|idx| columns.iter().map(|values| values[idx].clone()).collect())
            .collect();

        let position = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .with_context(|| format!("Column '{}' not found", name))
        };
        let genus_idx = position(TRAIT_GENUS_COL)?;
        let family_idx = position(TRAIT_FAMILY_COL)?;

        let mut by_genus: FxHashMap<String, SmallVec<[usize; 2]>> = FxHashMap::default();
        for (idx, row) in rows.iter().enumerate() {
            if let Some(genus) = &row[genus_idx] {
                by_genus.entry(genus.clone()).or_default().push(idx);
            }
        }

        let repeated = by_genus.values().filter(|idxs| idxs.len() > 1).count();
        tracing::debug!(rows = rows.len(), genera = by_genus.len(), repeated, "Loaded trait reference");

        Ok(Self {
            header,
            rows,
            by_genus,
            family_idx,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header positions of the emitted trait columns, in header order
    pub fn output_columns(&self) -> Vec<(usize, &str)> {
        self.header
            .iter()
            .enumerate()
            .filter(|(_, name)| !LINEAGE_COLUMNS.contains(&name.as_str()))
            .map(|(idx, name)| (idx, name.as_str()))
            .collect()
    }

    /// Reference rows listed under `genus`
    pub fn rows_for_genus(&self, genus: &str) -> &[usize] {
        self.by_genus
            .get(genus)
            .map(|idxs| idxs.as_slice())
            .unwrap_or(&[])
    }

    pub fn row(&self, idx: usize) -> &[Option<String>] {
        &self.rows[idx]
    }

    /// Asserted family of a reference row
    pub fn family(&self, idx: usize) -> Option<&str> {
        self.rows[idx][self.family_idx].as_deref()
    }
}

/// Both reference tables, loaded fresh per annotator
pub struct ReferenceData {
    pub spores: SporeReference,
    pub traits: TraitReference,
}

impl ReferenceData {
    /// Load the spore and trait tables named in `config`
    pub fn load(config: &AnnotatorConfig) -> Result<Self> {
        let spores = SporeReference::load(&config.spore_data_path, config.spore_filter)?;
        let traits = TraitReference::load(&config.fungal_traits_path)?;

        tracing::info!(
            spore_rows = spores.len(),
            trait_rows = traits.len(),
            "Loaded reference data"
        );

        Ok(Self { spores, traits })
    }
}
