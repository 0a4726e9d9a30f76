//! Spore Volume Annotation
//!
//! Runs the species → genus → family fallback once per spore category. Each
//! category produces a volume column and a provenance column
//! (`species` | `genus` | `family` | `no hit`).

use crate::data::{SporeCategory, SporeReference};
use crate::taxonomy::Taxonomy;
use crate::utils::fallback::{Provenance, RankedFallback, Resolution};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Per-category resolutions, one entry per taxonomy row
#[derive(Debug, Clone, PartialEq)]
pub struct SporeAnnotations {
    categories: Vec<(SporeCategory, Vec<Resolution>)>,
}

impl SporeAnnotations {
    pub fn category(&self, category: SporeCategory) -> &[Resolution] {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, resolved)| resolved.as_slice())
            .unwrap_or(&[])
    }

    /// Categories in output order
    pub fn iter(&self) -> impl Iterator<Item = (SporeCategory, &[Resolution])> {
        self.categories
            .iter()
            .map(|(category, resolved)| (*category, resolved.as_slice()))
    }

    /// Volume + provenance column pairs, in [`SporeCategory::ALL`] order
    pub fn columns(&self) -> Vec<Column> {
        let mut columns = Vec::with_capacity(self.categories.len() * 2);
        for (category, resolved) in &self.categories {
            let volumes: Vec<Option<f64>> = resolved.iter().map(|r| r.value).collect();
            let labels: Vec<&str> = resolved.iter().map(|r| r.provenance.label()).collect();

            columns.push(Series::new(category.volume_column().into(), volumes).into_column());
            columns.push(Series::new(category.information_column().into(), labels).into_column());
        }
        columns
    }

    /// Row count per provenance label
    pub fn provenance_counts(&self, category: SporeCategory) -> BTreeMap<Provenance, usize> {
        let mut counts = BTreeMap::new();
        for resolution in self.category(category) {
            *counts.entry(resolution.provenance).or_insert(0) += 1;
        }
        counts
    }
}

/// Annotate every taxonomy row with a volume estimate per spore category
pub fn add_spore_volume(taxonomy: &Taxonomy, spores: &SporeReference) -> SporeAnnotations {
    let fallback = RankedFallback::spore_volume();

    let categories = SporeCategory::ALL
        .into_iter()
        .map(|category| {
            let observations = spores.for_category(category);
            let resolved = fallback.resolve(taxonomy, &observations);

            let matched = resolved.iter().filter(|r| r.is_matched()).count();
            tracing::debug!(
                %category,
                reference_rows = observations.len(),
                matched,
                unmatched = resolved.len() - matched,
                "Annotated spore volume"
            );

            (category, resolved)
        })
        .collect();

    SporeAnnotations { categories }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SporeFilterPolicy;
    use crate::taxonomy::{parse_taxonomy, PrefixDetection, Rank};
    use approx::assert_relative_eq;

    fn spores() -> SporeReference {
        let df = df![
            "names_to_use" => &["Candida albicans", "Candida tropicalis", "Candida glabrata", "Mucor racemosus"],
            "genus" => &["Candida", "Candida", "Candida", "Mucor"],
            "family" => &["Saccharomycetaceae", "Saccharomycetaceae", "Saccharomycetaceae", "Mucoraceae"],
            "SporeType" => &["Mitospores", "Mitospores", "Meiospores", "Multinucleate asexual spores"],
            "SporeVolume" => &["10", "1000", "50", "-1"],
        ]
        .unwrap();
        SporeReference::from_frame(&df, SporeFilterPolicy::PositiveOnly).unwrap()
    }

    fn taxonomy() -> Taxonomy {
        let df = df![
            "Feature ID" => &["f1", "f2", "f3"],
            "Taxon" => &[
                "f__Saccharomycetaceae;g__Candida;s__Candida_albicans",
                "f__Saccharomycetaceae;g__Candida;s__Candida_auris",
                "f__Mucoraceae;g__Mucor;s__Mucor_racemosus",
            ],
        ]
        .unwrap();
        parse_taxonomy(&df, PrefixDetection::FirstCompleteRow).unwrap()
    }

    #[test]
    fn test_categories_are_independent() {
        let annotations = add_spore_volume(&taxonomy(), &spores());

        let mito = annotations.category(SporeCategory::Mitospores);
        assert_eq!(mito[0].value, Some(10.0));
        assert_eq!(mito[0].provenance, Provenance::Matched(Rank::Species));
        assert_relative_eq!(mito[1].value.unwrap(), 100.0, epsilon = 1e-9);
        assert_eq!(mito[1].provenance, Provenance::Matched(Rank::Genus));
        assert_eq!(mito[2], Resolution::NO_HIT);

        // Only Candida glabrata is measured for meiospores
        let meio = annotations.category(SporeCategory::Meiospores);
        assert_relative_eq!(meio[0].value.unwrap(), 50.0, epsilon = 1e-9);
        assert_eq!(meio[0].provenance, Provenance::Matched(Rank::Genus));

        // Mucor's only measurement is non-positive and filtered out
        let asexual = annotations.category(SporeCategory::MultinucleateAsexualSpores);
        assert!(asexual.iter().all(|r| *r == Resolution::NO_HIT));
    }

    #[test]
    fn test_columns_layout() {
        let annotations = add_spore_volume(&taxonomy(), &spores());
        let columns = annotations.columns();
        assert_eq!(columns.len(), 8);

        let names: Vec<&str> = columns.iter().map(|c| c.name().as_str()).collect();
        assert_eq!(names[0], "mitospores_spore_volume");
        assert_eq!(names[1], "mitospores_spore_volume_information");
        assert_eq!(names[7], "multinucleate_asexual_spores_spore_volume_information");

        let info = columns[1].str().unwrap();
        assert_eq!(info.get(0), Some("species"));
        assert_eq!(info.get(1), Some("genus"));
        assert_eq!(info.get(2), Some("no hit"));
        assert_eq!(columns[0].null_count(), 1);
    }

    #[test]
    fn test_provenance_counts() {
        let annotations = add_spore_volume(&taxonomy(), &spores());
        let counts = annotations.provenance_counts(SporeCategory::Mitospores);
        assert_eq!(counts.get(&Provenance::Matched(Rank::Species)), Some(&1));
        assert_eq!(counts.get(&Provenance::Matched(Rank::Genus)), Some(&1));
        assert_eq!(counts.get(&Provenance::NoHit), Some(&1));
    }
}
