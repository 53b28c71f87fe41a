use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// One condition label, e.g. the anchor rendering or a treatment rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub label: String,
    /// Randomized conditions swap slots among themselves on every run.
    #[serde(default)]
    pub randomized: bool,
}

impl ConditionSpec {
    pub fn fixed(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            randomized: false,
        }
    }

    pub fn randomized(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            randomized: true,
        }
    }
}

/// Inputs to plan construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanSpec {
    pub catalog: Vec<String>,
    pub run_count: usize,
    pub conditions: Vec<ConditionSpec>,
    pub source_root: String,
}

impl Default for PlanSpec {
    fn default() -> Self {
        Self {
            catalog: [
                "03.wav", "04.wav", "05.wav", "06.wav", "07.wav", "08.wav", "10.wav", "11.wav",
                "12.wav", "20.wav",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            run_count: 6,
            conditions: vec![
                ConditionSpec::fixed("Anchor"),
                ConditionSpec::randomized("MT"),
                ConditionSpec::randomized("MASS"),
            ],
            source_root: "phrases".to_string(),
        }
    }
}

impl PlanSpec {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        if self.run_count == 0 {
            return Err(ConfigError::NoRuns);
        }
        if self.run_count > self.catalog.len() {
            return Err(ConfigError::RunCountExceedsCatalog {
                runs: self.run_count,
                catalog: self.catalog.len(),
            });
        }
        let mut items = HashSet::new();
        if let Some(dup) = self.catalog.iter().find(|item| !items.insert(item.as_str())) {
            return Err(ConfigError::DuplicateItem(dup.clone()));
        }
        if self.conditions.is_empty() {
            return Err(ConfigError::NoConditions);
        }
        let mut labels = HashSet::new();
        if let Some(dup) = self
            .conditions
            .iter()
            .find(|c| !labels.insert(c.label.as_str()))
        {
            return Err(ConfigError::DuplicateCondition(dup.label.clone()));
        }
        Ok(())
    }

    /// Audio source path for one condition of one catalog item.
    pub fn source_path(&self, label: &str, item: &str) -> String {
        let root = self.source_root.trim_end_matches('/');
        if root.is_empty() {
            format!("{label}/{item}")
        } else {
            format!("{root}/{label}/{item}")
        }
    }
}

/// A condition label paired with the audio source that renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialEntry {
    pub label: String,
    pub source: String,
}

impl TrialEntry {
    /// Key under which taps for this trial are grouped.
    pub fn trial_key(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Run {
    pub item: String,
    pub entries: Vec<TrialEntry>,
}

/// Ordered runs, each with one entry per condition. Randomized once, at
/// construction, and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialPlan {
    runs: Vec<Run>,
    condition_count: usize,
}

impl TrialPlan {
    /// Permutes the catalog, keeps the first `run_count` items and shuffles the
    /// randomized condition slots independently for each run. The catalog in
    /// `spec` is never touched.
    pub fn build<R: Rng + ?Sized>(spec: &PlanSpec, rng: &mut R) -> Result<Self, ConfigError> {
        spec.validate()?;

        let mut items: Vec<&str> = spec.catalog.iter().map(String::as_str).collect();
        items.shuffle(rng);
        items.truncate(spec.run_count);

        let slots: Vec<usize> = spec
            .conditions
            .iter()
            .enumerate()
            .filter(|(_, c)| c.randomized)
            .map(|(i, _)| i)
            .collect();

        let runs = items
            .into_iter()
            .map(|item| {
                let mut order: Vec<&ConditionSpec> = spec.conditions.iter().collect();
                let mut movable: Vec<&ConditionSpec> = slots.iter().map(|&i| order[i]).collect();
                movable.shuffle(rng);
                for (&slot, condition) in slots.iter().zip(movable) {
                    order[slot] = condition;
                }
                let entries = order
                    .into_iter()
                    .map(|c| TrialEntry {
                        label: c.label.clone(),
                        source: spec.source_path(&c.label, item),
                    })
                    .collect();
                Run {
                    item: item.to_string(),
                    entries,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            runs = runs.len(),
            conditions = spec.conditions.len(),
            "trial plan built"
        );

        Ok(Self {
            runs,
            condition_count: spec.conditions.len(),
        })
    }

    /// Deterministic plan for a given seed.
    pub fn from_seed(spec: &PlanSpec, seed: u64) -> Result<Self, ConfigError> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::build(spec, &mut rng)
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn condition_count(&self) -> usize {
        self.condition_count
    }

    pub fn entry(&self, run: usize, condition: usize) -> Option<&TrialEntry> {
        self.runs.get(run).and_then(|r| r.entries.get(condition))
    }

    pub fn trial_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.runs
            .iter()
            .flat_map(|r| r.entries.iter().map(TrialEntry::trial_key))
    }
}
