//! Taxonomy Parsing
//!
//! Splits ranked taxon strings (`d__Fungi;p__Ascomycota;...;s__Candida_albicans`)
//! into family/genus/species columns. The slot → rank mapping is inferred once per
//! table from the prefixes of a fully annotated row.

use crate::error::AnnotateError;
use crate::utils::frame_helpers::read_tsv;
use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// File expected inside a taxonomy artifact directory
pub const TAXONOMY_FILE: &str = "taxonomy.tsv";

/// Separator between rank prefix and name within a token
pub const RANK_SEPARATOR: &str = "__";

/// Token slots for one taxon string (most taxonomies have ≤ 8 levels)
type Slots<'a> = SmallVec<[Option<&'a str>; 8]>;

/// Taxonomic ranks the annotator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Family,
    Genus,
    Species,
}

impl Rank {
    /// Coarse to fine
    pub const ALL: [Rank; 3] = [Rank::Family, Rank::Genus, Rank::Species];

    /// Map a single-letter taxon prefix to its rank
    pub fn from_prefix(prefix: &str) -> Option<Rank> {
        match prefix {
            "f" => Some(Rank::Family),
            "g" => Some(Rank::Genus),
            "s" => Some(Rank::Species),
            _ => None,
        }
    }

    pub fn column_name(self) -> &'static str {
        match self {
            Rank::Family => "family",
            Rank::Genus => "genus",
            Rank::Species => "species",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Which row supplies the rank prefixes
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PrefixDetection {
    /// First row in which every slot holds a token
    #[default]
    FirstCompleteRow,
    /// First row in which every slot holds a `<prefix>__<name>` token
    FirstPrefixedRow,
}

impl PrefixDetection {
    fn is_eligible(self, slots: &[Option<&str>]) -> bool {
        match self {
            PrefixDetection::FirstCompleteRow => slots.iter().all(Option::is_some),
            PrefixDetection::FirstPrefixedRow => slots.iter().all(|slot| {
                slot.and_then(|token| token.split_once(RANK_SEPARATOR))
                    .map_or(false, |(prefix, _)| !prefix.is_empty())
            }),
        }
    }
}

/// Parsed taxonomy: feature identifiers plus the recognised rank columns
#[derive(Debug, Clone, PartialEq)]
pub struct Taxonomy {
    id_column: String,
    feature_ids: Vec<String>,
    ranks: BTreeMap<Rank, Vec<Option<String>>>,
}

impl Taxonomy {
    pub fn len(&self) -> usize {
        self.feature_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_ids.is_empty()
    }

    /// Header of the identifier column in the source table
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Ranks present, coarse to fine
    pub fn ranks(&self) -> impl Iterator<Item = Rank> + '_ {
        self.ranks.keys().copied()
    }

    pub fn has_rank(&self, rank: Rank) -> bool {
        self.ranks.contains_key(&rank)
    }

    pub fn rank_values(&self, rank: Rank) -> Option<&[Option<String>]> {
        self.ranks.get(&rank).map(Vec::as_slice)
    }

    /// Name at `rank` for row `row`, if the rank exists and the cell is set
    pub fn value(&self, rank: Rank, row: usize) -> Option<&str> {
        self.ranks
            .get(&rank)
            .and_then(|values| values.get(row))
            .and_then(|cell| cell.as_deref())
    }

    /// Identifier column joined with the rank columns
    #[cfg(test)]
    pub(crate) fn to_frame(&self) -> Result<DataFrame> {
        let mut columns =
            vec![Series::new(self.id_column.as_str().into(), &self.feature_ids).into_column()];
        for (rank, values) in &self.ranks {
            columns.push(Series::new(rank.column_name().into(), values).into_column());
        }
        DataFrame::new(columns).context("Failed to build taxonomy frame")
    }
}

/// Load `taxonomy.tsv` from a taxonomy artifact directory
pub fn load_taxonomy(dir: &Path, detection: PrefixDetection) -> Result<Taxonomy> {
    let path = dir.join(TAXONOMY_FILE);
    let df = read_tsv(&path)?;
    let taxonomy =
        parse_taxonomy(&df, detection).with_context(|| format!("Invalid taxonomy: {:?}", path))?;

    tracing::info!(
        rows = taxonomy.len(),
        ranks = ?taxonomy.ranks().collect::<Vec<_>>(),
        "Loaded taxonomy"
    );
    Ok(taxonomy)
}

/// Parse a taxonomy frame: column 0 = feature identifier, column 1 = taxon string
///
/// Columns past the second (e.g. `Confidence`) are ignored.
///
/// # Errors
/// - [`AnnotateError::TaxonomyShape`] with fewer than two columns
/// - [`AnnotateError::DuplicateFeatureId`] when an identifier repeats
/// - [`AnnotateError::MissingRanks`] when no family/genus/species slot is found
pub fn parse_taxonomy(df: &DataFrame, detection: PrefixDetection) -> Result<Taxonomy> {
    let columns = df.get_columns();
    if columns.len() < 2 {
        return Err(AnnotateError::TaxonomyShape { found: columns.len() }.into());
    }
    if columns.len() > 2 {
        tracing::debug!(ignored = columns.len() - 2, "Ignoring extra taxonomy columns");
    }

    let id_column = columns[0].name().to_string();
    let ids = columns[0]
        .str()
        .with_context(|| format!("Column '{}' is not string type", id_column))?;
    let taxa = columns[1]
        .str()
        .with_context(|| format!("Column '{}' is not string type", columns[1].name()))?;

    let mut feature_ids = Vec::with_capacity(df.height());
    let mut seen = FxHashSet::default();
    for (idx, id) in ids.into_iter().enumerate() {
        let id = id.ok_or_else(|| anyhow!("Row {}: missing feature identifier", idx + 1))?;
        if !seen.insert(id) {
            return Err(AnnotateError::DuplicateFeatureId(id.to_string()).into());
        }
        feature_ids.push(id.to_string());
    }

    // STEP 1: Split into slots, padded to the widest row
    let mut rows: Vec<Slots> = taxa.into_iter().map(split_slots).collect();
    let width = rows.iter().map(|slots| slots.len()).max().unwrap_or(0);
    for slots in &mut rows {
        slots.resize(width, None);
    }

    // STEP 2: Prefixes from the first eligible row
    let source = rows
        .iter()
        .find(|slots| detection.is_eligible(slots))
        .ok_or(AnnotateError::MissingRanks)?;
    let prefixes: Vec<&str> = source
        .iter()
        .map(|slot| slot.map_or("", token_prefix))
        .collect();

    // STEP 3: Slot index per recognised rank (first slot wins)
    let mut rank_slots: BTreeMap<Rank, usize> = BTreeMap::new();
    for (slot_idx, prefix) in prefixes.iter().enumerate() {
        if let Some(rank) = Rank::from_prefix(prefix) {
            rank_slots.entry(rank).or_insert(slot_idx);
        }
    }
    tracing::debug!(?prefixes, ?rank_slots, "Inferred taxonomy prefixes");

    if rank_slots.is_empty() {
        return Err(AnnotateError::MissingRanks.into());
    }

    // STEP 4-5: Strip prefixes for the retained ranks
    let ranks = rank_slots
        .into_iter()
        .map(|(rank, slot_idx)| {
            let values = rows
                .iter()
                .map(|slots| {
                    slots[slot_idx]
                        .map(token_name)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                })
                .collect();
            (rank, values)
        })
        .collect();

    Ok(Taxonomy {
        id_column,
        feature_ids,
        ranks,
    })
}

fn split_slots(taxon: Option<&str>) -> Slots<'_> {
    match taxon {
        Some(taxon) => taxon.split(';').map(|token| Some(token.trim())).collect(),
        None => SmallVec::new(),
    }
}

/// Text before the first separator, or the whole token
fn token_prefix(token: &str) -> &str {
    token
        .split_once(RANK_SEPARATOR)
        .map_or(token, |(prefix, _)| prefix)
}

/// Text after the last separator, or the whole token
fn token_name(token: &str) -> &str {
    match token.rfind(RANK_SEPARATOR) {
        Some(pos) => &token[pos + RANK_SEPARATOR.len()..],
        None => token,
    }
}
