//! Annotator configuration
//!
//! JSON file with every field optional. Asset paths default to the bundled
//! reference tables under `assets/`, or under `$FUNGAL_TRAITS_ASSET_DIR` when set.

use crate::annotate::traits::DisambiguationRules;
use crate::data::SporeFilterPolicy;
use crate::taxonomy::PrefixDetection;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable relocating the reference assets
pub const ASSET_DIR_ENV: &str = "FUNGAL_TRAITS_ASSET_DIR";

pub const DEFAULT_ASSET_DIR: &str = "assets";
pub const SPORE_DATA_FILE: &str = "Spore_data_12Nov21.tsv";
pub const FUNGAL_TRAITS_FILE: &str = "FungalTraits_1.2_ver_16Dec_2020_V.1.2.tsv";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotatorConfig {
    /// Spore measurement table (TSV)
    pub spore_data_path: PathBuf,

    /// FungalTraits lifestyle table (TSV, 24 fixed columns)
    pub fungal_traits_path: PathBuf,

    pub prefix_detection: PrefixDetection,
    pub spore_filter: SporeFilterPolicy,

    /// Genus → strategy for reference genera listed more than once
    pub disambiguation: DisambiguationRules,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self::with_asset_dir(Path::new(DEFAULT_ASSET_DIR))
    }
}

impl AnnotatorConfig {
    /// Defaults with both reference tables resolved inside `dir`
    pub fn with_asset_dir(dir: &Path) -> Self {
        Self {
            spore_data_path: dir.join(SPORE_DATA_FILE),
            fungal_traits_path: dir.join(FUNGAL_TRAITS_FILE),
            prefix_detection: PrefixDetection::default(),
            spore_filter: SporeFilterPolicy::default(),
            disambiguation: DisambiguationRules::default(),
        }
    }

    /// Defaults, honouring `$FUNGAL_TRAITS_ASSET_DIR`
    pub fn from_env() -> Self {
        match std::env::var_os(ASSET_DIR_ENV) {
            Some(dir) => Self::with_asset_dir(Path::new(&dir)),
            None => Self::default(),
        }
    }

    /// Load configuration from a JSON file
    ///
    /// Asset paths left out of the file fall back to [`AnnotatorConfig::from_env`].
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut value: serde_json::Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path))?;

        // Overlay the file onto the environment-aware defaults
        let base = serde_json::to_value(Self::from_env())
            .context("Failed to serialize default config")?;
        if let (Some(obj), serde_json::Value::Object(defaults)) = (value.as_object_mut(), base) {
            for (key, default) in defaults {
                obj.entry(key).or_insert(default);
            }
        }

        serde_json::from_value(value)
            .with_context(|| format!("Invalid annotator config: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::traits::FamilyPreference;
    use std::io::Write;

    #[test]
    fn test_default_paths_point_into_assets() {
        let cfg = AnnotatorConfig::default();
        assert_eq!(cfg.spore_data_path, Path::new("assets").join(SPORE_DATA_FILE));
        assert_eq!(cfg.fungal_traits_path, Path::new("assets").join(FUNGAL_TRAITS_FILE));
        assert_eq!(cfg.prefix_detection, PrefixDetection::FirstCompleteRow);
        assert_eq!(cfg.spore_filter, SporeFilterPolicy::PositiveOnly);
    }

    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "spore_data_path": "/data/spores.tsv",
                "spore_filter": "keep-all",
                "disambiguation": {{
                    "rules": {{ "Caudospora": "match-taxonomy-family" }},
                    "fallback": "first-listed"
                }}
            }}"#
        )
        .unwrap();

        let cfg = AnnotatorConfig::load(file.path()).unwrap();
        assert_eq!(cfg.spore_data_path, PathBuf::from("/data/spores.tsv"));
        assert_eq!(cfg.spore_filter, SporeFilterPolicy::KeepAll);
        assert_eq!(cfg.prefix_detection, PrefixDetection::FirstCompleteRow);
        assert_eq!(
            cfg.disambiguation.preference_for("Caudospora"),
            FamilyPreference::MatchTaxonomyFamily
        );
        assert_eq!(
            cfg.disambiguation.preference_for("Campanulospora"),
            FamilyPreference::FirstListed
        );
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "spore_volume_filter": "keep-all" }}"#).unwrap();

        let err = AnnotatorConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("spore_volume_filter"));
    }
}
