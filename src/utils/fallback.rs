//! Ranked Fallback Resolver
//!
//! Assigns each taxonomy row a value from a reference table by walking an
//! ordered list of `(rank, aggregation)` steps: the first step that produces a
//! value for a row wins and later steps never revisit that row.
//!
//! Coarse steps aggregate with a geometric mean (arithmetic mean of log10
//! values, exponentiated) since measurement volumes are log-normal.

use crate::taxonomy::{Rank, Taxonomy};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

/// A reference row that can be matched at several ranks
pub trait RankedObservation {
    /// Name of this observation at `rank`
    fn key(&self, rank: Rank) -> Option<&str>;

    /// Measured value
    fn value(&self) -> Option<f64>;

    /// log10 of the value; override when precomputed
    fn log10_value(&self) -> Option<f64> {
        self.value().map(libm::log10)
    }
}

/// How observations sharing a key are reduced to one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// First usable observation for the key, unmodified
    Exact,
    /// 10^(mean log10 value), NaN logs ignored
    GeometricMean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackStep {
    pub rank: Rank,
    pub aggregation: Aggregation,
}

/// Which rank supplied a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provenance {
    Matched(Rank),
    NoHit,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Matched(rank) => rank.column_name(),
            Provenance::NoHit => "no hit",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Value and provenance for one taxonomy row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub value: Option<f64>,
    pub provenance: Provenance,
}

impl Resolution {
    pub const NO_HIT: Resolution = Resolution {
        value: None,
        provenance: Provenance::NoHit,
    };

    pub fn is_matched(&self) -> bool {
        self.value.is_some()
    }
}

/// Ordered cascade of fallback steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedFallback {
    steps: Vec<FallbackStep>,
}

impl RankedFallback {
    pub fn new(steps: Vec<FallbackStep>) -> Self {
        Self { steps }
    }

    /// species (exact) → genus (geometric mean) → family (geometric mean)
    pub fn spore_volume() -> Self {
        Self::new(vec![
            FallbackStep {
                rank: Rank::Species,
                aggregation: Aggregation::Exact,
            },
            FallbackStep {
                rank: Rank::Genus,
                aggregation: Aggregation::GeometricMean,
            },
            FallbackStep {
                rank: Rank::Family,
                aggregation: Aggregation::GeometricMean,
            },
        ])
    }

    pub fn steps(&self) -> &[FallbackStep] {
        &self.steps
    }

    /// Resolve every taxonomy row against `observations`
    ///
    /// Steps whose rank the taxonomy lacks are skipped. Each step only builds
    /// lookups for keys still needed by unmatched rows.
    pub fn resolve<O: RankedObservation>(
        &self,
        taxonomy: &Taxonomy,
        observations: &[&O],
    ) -> Vec<Resolution> {
        let mut resolved = vec![Resolution::NO_HIT; taxonomy.len()];

        for step in &self.steps {
            let Some(keys) = taxonomy.rank_values(step.rank) else {
                continue;
            };

            let pending: FxHashSet<&str> = resolved
                .iter()
                .zip(keys)
                .filter(|(resolution, _)| !resolution.is_matched())
                .filter_map(|(_, key)| key.as_deref())
                .collect();
            if pending.is_empty() {
                continue;
            }

            let lookup = match step.aggregation {
                Aggregation::Exact => exact_lookup(observations, step.rank, &pending),
                Aggregation::GeometricMean => {
                    geometric_mean_lookup(observations, step.rank, &pending)
                }
            };

            let mut hits = 0usize;
            for (resolution, key) in resolved.iter_mut().zip(keys) {
                if resolution.is_matched() {
                    continue;
                }
                if let Some(&value) = key.as_deref().and_then(|k| lookup.get(k)) {
                    *resolution = Resolution {
                        value: Some(value),
                        provenance: Provenance::Matched(step.rank),
                    };
                    hits += 1;
                }
            }

            tracing::trace!(rank = %step.rank, pending = pending.len(), hits, "Fallback step");
        }

        resolved
    }
}

/// Key → first non-NaN value
fn exact_lookup<'a, O: RankedObservation>(
    observations: &'a [&O],
    rank: Rank,
    pending: &FxHashSet<&str>,
) -> FxHashMap<&'a str, f64> {
    let mut lookup = FxHashMap::default();
    for obs in observations {
        let (Some(key), Some(value)) = (obs.key(rank), obs.value()) else {
            continue;
        };
        if value.is_nan() || !pending.contains(key) {
            continue;
        }
        lookup.entry(key).or_insert(value);
    }
    lookup
}

/// Key → 10^(mean log10 value) over observations with a non-NaN log value
fn geometric_mean_lookup<'a, O: RankedObservation>(
    observations: &'a [&O],
    rank: Rank,
    pending: &FxHashSet<&str>,
) -> FxHashMap<&'a str, f64> {
    let mut sums: FxHashMap<&str, (f64, usize)> = FxHashMap::default();
    for obs in observations {
        let Some(key) = obs.key(rank) else {
            continue;
        };
        if !pending.contains(key) {
            continue;
        }
        match obs.log10_value() {
            Some(log) if !log.is_nan() => {
                let entry = sums.entry(key).or_insert((0.0, 0));
                entry.0 += log;
                entry.1 += 1;
            }
            _ => {}
        }
    }

    sums.into_iter()
        .map(|(key, (sum, n))| (key, libm::pow(10.0, sum / n as f64)))
        .filter(|(_, value)| !value.is_nan())
        .collect()
}
