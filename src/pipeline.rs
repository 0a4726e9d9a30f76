//! Trait Annotator - Main coordinator for annotating a taxonomy
//!
//! Loads both reference tables once, then for each taxonomy:
//! 1. Parse ranks (family/genus/species)
//! 2. Spore volume per category with provenance
//! 3. FungalTraits merge on genus
//! 4. Assemble the output table keyed by feature identifier

use crate::annotate::{add_fungal_traits, add_spore_volume};
use crate::config::AnnotatorConfig;
use crate::data::{ReferenceData, SporeCategory};
use crate::taxonomy::{load_taxonomy, Rank, Taxonomy};
use crate::utils::fallback::Provenance;
use crate::utils::frame_helpers::{write_parquet, write_tsv};
use anyhow::{Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Row key column of the annotated table
pub const FEATURE_ID_COL: &str = "feature-id";

/// Serialization format for the annotated table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Tsv,
    Parquet,
}

/// Rows per provenance label, per spore category
pub type ProvenanceSummary = BTreeMap<SporeCategory, BTreeMap<Provenance, usize>>;

/// Annotated feature table
///
/// Columns: `feature-id`, `genus` (when the taxonomy has a genus rank), one
/// volume/provenance pair per spore category, then the FungalTraits columns.
#[derive(Debug, Clone)]
pub struct AnnotatedTable {
    frame: DataFrame,
    index: FxHashMap<String, usize>,
    summary: ProvenanceSummary,
    trait_matches: usize,
}

impl AnnotatedTable {
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Row position of a feature identifier
    pub fn position(&self, feature_id: &str) -> Option<usize> {
        self.index.get(feature_id).copied()
    }

    /// Features that picked up a FungalTraits row
    pub fn trait_matches(&self) -> usize {
        self.trait_matches
    }

    pub fn provenance_summary(&self) -> &ProvenanceSummary {
        &self.summary
    }

    pub fn write_tsv(&self, path: &Path) -> Result<()> {
        write_tsv(&mut self.frame.clone(), path)
    }

    pub fn write_parquet(&self, path: &Path) -> Result<()> {
        write_parquet(&mut self.frame.clone(), path)
    }

    pub fn write(&self, path: &Path, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Tsv => self.write_tsv(path),
            OutputFormat::Parquet => self.write_parquet(path),
        }?;
        tracing::info!(?path, ?format, rows = self.height(), "Wrote annotated table");
        Ok(())
    }
}

/// Main annotator
pub struct TraitAnnotator {
    config: AnnotatorConfig,
    references: ReferenceData,
}

impl TraitAnnotator {
    /// Load the reference tables named in `config`
    pub fn new(config: AnnotatorConfig) -> Result<Self> {
        tracing::info!(
            spore_data = ?config.spore_data_path,
            fungal_traits = ?config.fungal_traits_path,
            "Initializing trait annotator"
        );
        let references = ReferenceData::load(&config)?;
        Ok(Self::from_references(config, references))
    }

    /// Annotator over already loaded reference tables
    pub fn from_references(config: AnnotatorConfig, references: ReferenceData) -> Self {
        Self { config, references }
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    pub fn references(&self) -> &ReferenceData {
        &self.references
    }

    /// Annotate the `taxonomy.tsv` inside a taxonomy artifact directory
    pub fn annotate(&self, taxonomy_dir: &Path) -> Result<AnnotatedTable> {
        let taxonomy = load_taxonomy(taxonomy_dir, self.config.prefix_detection)?;
        self.annotate_taxonomy(&taxonomy)
    }

    /// Annotate a parsed taxonomy; one output row per taxonomy row, in input order
    pub fn annotate_taxonomy(&self, taxonomy: &Taxonomy) -> Result<AnnotatedTable> {
        let spores = add_spore_volume(taxonomy, &self.references.spores);
        let traits = add_fungal_traits(
            taxonomy,
            &self.references.traits,
            &self.config.disambiguation,
        );

        let mut columns =
            vec![Series::new(FEATURE_ID_COL.into(), taxonomy.feature_ids()).into_column()];
        if let Some(genera) = taxonomy.rank_values(Rank::Genus) {
            columns.push(Series::new(Rank::Genus.column_name().into(), genera).into_column());
        }
        columns.extend(spores.columns());
        columns.extend(traits.columns(&self.references.traits));

        let frame = DataFrame::new(columns).context("Failed to assemble annotated table")?;

        // Identifiers are unique once parsed
        let index: FxHashMap<String, usize> = taxonomy
            .feature_ids()
            .iter()
            .enumerate()
            .map(|(row, id)| (id.clone(), row))
            .collect();

        let summary: ProvenanceSummary = SporeCategory::ALL
            .into_iter()
            .map(|category| (category, spores.provenance_counts(category)))
            .collect();

        for (category, counts) in &summary {
            let counts: BTreeMap<&str, usize> =
                counts.iter().map(|(p, n)| (p.label(), *n)).collect();
            tracing::info!(%category, ?counts, "Spore volume provenance");
        }
        tracing::info!(
            rows = frame.height(),
            columns = frame.width(),
            trait_matches = traits.matched(),
            "Annotation complete"
        );

        Ok(AnnotatedTable {
            frame,
            index,
            summary,
            trait_matches: traits.matched(),
        })
    }
}

/// One-shot annotation: load references, annotate `taxonomy_dir`
pub fn annotate(taxonomy_dir: &Path, config: AnnotatorConfig) -> Result<AnnotatedTable> {
    TraitAnnotator::new(config)?.annotate(taxonomy_dir)
}
