//! FungalTraits Merge
//!
//! Left-joins taxonomy rows to the lifestyle table on genus. A handful of genera
//! are listed twice under different families (taxonomic reclassification); the
//! `DisambiguationRules` table decides which reference row a feature keeps.

use crate::data::TraitReference;
use crate::taxonomy::{Rank, Taxonomy};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// Strategy for choosing between reference rows sharing a genus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FamilyPreference {
    /// Keep the first row whose `Family` contradicts the taxonomy family
    PreferContradictingFamily,
    /// Keep the row whose `Family` equals the taxonomy family when exactly one
    /// does; otherwise keep the first row whose `Family` contradicts it
    MatchTaxonomyFamily,
    /// Keep the first row in reference order
    FirstListed,
}

impl FamilyPreference {
    /// Pick one of `candidates` (reference row indices, non-empty)
    ///
    /// Without a taxonomy family nothing agrees or contradicts, so the contradiction
    /// strategies keep the first candidate.
    pub fn choose(
        self,
        candidates: &[usize],
        traits: &TraitReference,
        taxonomy_family: Option<&str>,
    ) -> usize {
        match self {
            FamilyPreference::FirstListed => candidates[0],
            FamilyPreference::PreferContradictingFamily => {
                let Some(family) = taxonomy_family else {
                    return candidates[0];
                };
                candidates
                    .iter()
                    .copied()
                    .find(|&idx| traits.family(idx).map_or(false, |f| f != family))
                    .unwrap_or(candidates[0])
            }
            FamilyPreference::MatchTaxonomyFamily => {
                let agrees =
                    |idx: usize| taxonomy_family.is_some() && traits.family(idx) == taxonomy_family;

                let matching: SmallVec<[usize; 2]> =
                    candidates.iter().copied().filter(|&idx| agrees(idx)).collect();
                if matching.len() == 1 {
                    return matching[0];
                }

                candidates
                    .iter()
                    .copied()
                    .find(|&idx| !agrees(idx))
                    .unwrap_or(candidates[0])
            }
        }
    }
}

/// Genus → preference, plus the strategy for genera without a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguationRules {
    rules: BTreeMap<String, FamilyPreference>,
    fallback: FamilyPreference,
}

impl Default for DisambiguationRules {
    /// Caudospora and Campanulospora appear twice in FungalTraits 1.2; the row
    /// asserting the other family is kept
    fn default() -> Self {
        Self::new(FamilyPreference::FirstListed)
            .with_rule("Caudospora", FamilyPreference::PreferContradictingFamily)
            .with_rule("Campanulospora", FamilyPreference::PreferContradictingFamily)
    }
}

impl DisambiguationRules {
    /// Empty table
    pub fn new(fallback: FamilyPreference) -> Self {
        Self {
            rules: BTreeMap::new(),
            fallback,
        }
    }

    pub fn with_rule(mut self, genus: &str, preference: FamilyPreference) -> Self {
        self.rules.insert(genus.to_string(), preference);
        self
    }

    pub fn has_rule(&self, genus: &str) -> bool {
        self.rules.contains_key(genus)
    }

    pub fn preference_for(&self, genus: &str) -> FamilyPreference {
        self.rules.get(genus).copied().unwrap_or(self.fallback)
    }
}

/// Chosen reference row per taxonomy row (`None` = genus not in the table)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitMatches {
    rows: Vec<Option<usize>>,
    /// Features that had more than one distinct candidate
    disambiguated: usize,
}

impl TraitMatches {
    pub fn rows(&self) -> &[Option<usize>] {
        &self.rows
    }

    pub fn matched(&self) -> usize {
        self.rows.iter().filter(|row| row.is_some()).count()
    }

    pub fn disambiguated(&self) -> usize {
        self.disambiguated
    }

    /// Emitted trait columns (lineage helpers excluded), in reference header order
    pub fn columns(&self, traits: &TraitReference) -> Vec<Column> {
        traits
            .output_columns()
            .into_iter()
            .map(|(col_idx, name)| {
                let values: Vec<Option<&str>> = self
                    .rows
                    .iter()
                    .map(|row| row.and_then(|idx| traits.row(idx)[col_idx].as_deref()))
                    .collect();
                Series::new(name.into(), values).into_column()
            })
            .collect()
    }
}

/// Left-join taxonomy genus to reference `GENUS`, one reference row per feature
///
/// Exact duplicate reference rows collapse first; remaining ties go through
/// `rules` using the taxonomy's family.
pub fn add_fungal_traits(
    taxonomy: &Taxonomy,
    traits: &TraitReference,
    rules: &DisambiguationRules,
) -> TraitMatches {
    let mut rows = Vec::with_capacity(taxonomy.len());
    let mut disambiguated = 0usize;
    let mut unruled: BTreeSet<&str> = BTreeSet::new();

    for row in 0..taxonomy.len() {
        let Some(genus) = taxonomy.value(Rank::Genus, row) else {
            rows.push(None);
            continue;
        };

        // Drop exact duplicates, keeping reference order
        let mut distinct: SmallVec<[usize; 2]> = SmallVec::new();
        for &idx in traits.rows_for_genus(genus) {
            if !distinct.iter().any(|&kept| traits.row(kept) == traits.row(idx)) {
                distinct.push(idx);
            }
        }

        let chosen = match distinct.len() {
            0 => None,
            1 => Some(distinct[0]),
            _ => {
                disambiguated += 1;
                if !rules.has_rule(genus) {
                    unruled.insert(genus);
                }
                let family = taxonomy.value(Rank::Family, row);
                Some(rules.preference_for(genus).choose(&distinct, traits, family))
            }
        };
        rows.push(chosen);
    }

    if !unruled.is_empty() {
        tracing::warn!(
            genera = ?unruled,
            "Genera listed more than once in FungalTraits without a disambiguation rule; using fallback"
        );
    }

    let matches = TraitMatches {
        rows,
        disambiguated,
    };
    tracing::debug!(
        rows = taxonomy.len(),
        matched = matches.matched(),
        disambiguated,
        "Merged fungal traits"
    );
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{parse_taxonomy, PrefixDetection};
    use crate::utils::test_fixtures::{trait_frame, trait_row};

    fn reclassified_traits() -> TraitReference {
        let df = trait_frame(&[
            trait_row("Sordariaceae", "Caudospora", "litter_saprotroph"),
            trait_row("Mucoraceae", "Mucor", "soil_saprotroph"),
            trait_row("Lasiosphaeriaceae", "Caudospora", "wood_saprotroph"),
            trait_row("Mucoraceae", "Mucor", "soil_saprotroph"),
            trait_row("Xylariaceae", "Campanulospora", "wood_saprotroph"),
            trait_row("Diaporthaceae", "Campanulospora", "plant_pathogen"),
        ]);
        TraitReference::from_frame(&df).unwrap()
    }

    fn taxonomy(taxa: &[&str]) -> Taxonomy {
        let ids: Vec<String> = (0..taxa.len()).map(|i| format!("f{}", i + 1)).collect();
        let df = df!["Feature ID" => ids, "Taxon" => taxa].unwrap();
        parse_taxonomy(&df, PrefixDetection::FirstCompleteRow).unwrap()
    }

    #[test]
    fn test_left_join_keeps_every_row() {
        let tax = taxonomy(&[
            "f__Mucoraceae;g__Mucor",
            "f__Pleosporaceae;g__Alternaria",
            "f__Pleosporaceae;g__",
        ]);
        let traits = reclassified_traits();
        let matches = add_fungal_traits(&tax, &traits, &DisambiguationRules::default());

        assert_eq!(matches.rows().len(), 3);
        // Exact duplicate Mucor rows collapse without counting as a tie
        assert_eq!(matches.rows(), &[Some(1), None, None]);
        assert_eq!(matches.disambiguated(), 0);

        let columns = matches.columns(&traits);
        assert_eq!(columns.len(), 17);
        let lifestyle = columns[0].str().unwrap();
        assert_eq!(lifestyle.get(0), Some("soil_saprotroph"));
        assert_eq!(lifestyle.get(1), None);
    }

    #[test]
    fn test_caudospora_keeps_row_contradicting_taxonomy_family() {
        let tax = taxonomy(&[
            "f__Sordariaceae;g__Caudospora",
            "f__Lasiosphaeriaceae;g__Caudospora",
        ]);
        let traits = reclassified_traits();
        let matches = add_fungal_traits(&tax, &traits, &DisambiguationRules::default());

        // One row per feature, asserting the family the taxonomy does not
        assert_eq!(matches.rows(), &[Some(2), Some(0)]);
        assert_eq!(matches.disambiguated(), 2);

        let lifestyle = matches.columns(&traits)[0].clone();
        let lifestyle = lifestyle.str().unwrap();
        assert_eq!(lifestyle.get(0), Some("wood_saprotroph"));
        assert_eq!(lifestyle.get(1), Some("litter_saprotroph"));
    }

    #[test]
    fn test_campanulospora_keeps_row_contradicting_taxonomy_family() {
        let tax = taxonomy(&[
            "f__Xylariaceae;g__Campanulospora",
            "f__Diaporthaceae;g__Campanulospora",
        ]);
        let traits = reclassified_traits();
        let matches = add_fungal_traits(&tax, &traits, &DisambiguationRules::default());

        assert_eq!(matches.rows(), &[Some(5), Some(4)]);
        assert_eq!(matches.disambiguated(), 2);
    }

    #[test]
    fn test_caudospora_without_taxonomy_family_keeps_first_row() {
        let tax = taxonomy(&["f__Boliniaceae;g__Caudospora", "f__;g__Caudospora"]);
        let traits = reclassified_traits();
        let matches = add_fungal_traits(&tax, &traits, &DisambiguationRules::default());

        // Both rows contradict Boliniaceae; no family at all keeps the first
        assert_eq!(matches.rows(), &[Some(0), Some(0)]);
    }

    #[test]
    fn test_match_taxonomy_family_rule() {
        let tax = taxonomy(&[
            "f__Sordariaceae;g__Caudospora",
            "f__Lasiosphaeriaceae;g__Caudospora",
            "f__Boliniaceae;g__Caudospora",
        ]);
        let traits = reclassified_traits();
        let rules = DisambiguationRules::new(FamilyPreference::FirstListed)
            .with_rule("Caudospora", FamilyPreference::MatchTaxonomyFamily);
        let matches = add_fungal_traits(&tax, &traits, &rules);

        // Agreeing row when unique, else the first contradicting row
        assert_eq!(matches.rows(), &[Some(0), Some(2), Some(0)]);
    }

    #[test]
    fn test_match_taxonomy_family_with_two_agreeing_rows() {
        let df = trait_frame(&[
            trait_row("Sordariaceae", "Caudospora", "litter_saprotroph"),
            trait_row("Sordariaceae", "Caudospora", "wood_saprotroph"),
            trait_row("Lasiosphaeriaceae", "Caudospora", "dung_saprotroph"),
        ]);
        let traits = TraitReference::from_frame(&df).unwrap();

        let chosen = FamilyPreference::MatchTaxonomyFamily.choose(&[0, 1, 2], &traits, Some("Sordariaceae"));
        assert_eq!(chosen, 2);
        let chosen =
            FamilyPreference::PreferContradictingFamily.choose(&[0, 1, 2], &traits, Some("Sordariaceae"));
        assert_eq!(chosen, 2);
        let chosen =
            FamilyPreference::PreferContradictingFamily.choose(&[0, 1], &traits, Some("Sordariaceae"));
        assert_eq!(chosen, 0);
    }

    #[test]
    fn test_unruled_genus_uses_fallback() {
        let tax = taxonomy(&["f__Lasiosphaeriaceae;g__Caudospora"]);
        let traits = reclassified_traits();

        let first_listed = DisambiguationRules::new(FamilyPreference::FirstListed);
        let matches = add_fungal_traits(&tax, &traits, &first_listed);
        assert_eq!(matches.rows(), &[Some(0)]);

        let by_family = DisambiguationRules::new(FamilyPreference::MatchTaxonomyFamily);
        let matches = add_fungal_traits(&tax, &traits, &by_family);
        assert_eq!(matches.rows(), &[Some(2)]);
    }

    #[test]
    fn test_default_rules() {
        let rules = DisambiguationRules::default();
        assert_eq!(
            rules.preference_for("Caudospora"),
            FamilyPreference::PreferContradictingFamily
        );
        assert_eq!(
            rules.preference_for("Campanulospora"),
            FamilyPreference::PreferContradictingFamily
        );
        assert_eq!(rules.preference_for("Mucor"), FamilyPreference::FirstListed);
    }

    #[test]
    fn test_rules_deserialize_kebab_case() {
        let rules: DisambiguationRules = serde_json::from_str(
            r#"{"rules": {"Caudospora": "prefer-contradicting-family"}, "fallback": "match-taxonomy-family"}"#,
        )
        .unwrap();
        assert_eq!(
            rules.preference_for("Caudospora"),
            FamilyPreference::PreferContradictingFamily
        );
        assert_eq!(
            rules.preference_for("Campanulospora"),
            FamilyPreference::MatchTaxonomyFamily
        );
    }
}
