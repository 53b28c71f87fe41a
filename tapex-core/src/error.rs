use std::path::PathBuf;

use thiserror::Error;

/// Configuration problems. All of them surface at construction, never mid-session.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("item catalog is empty")]
    EmptyCatalog,

    #[error("run count must be at least 1")]
    NoRuns,

    #[error("run count {runs} exceeds catalog size {catalog}")]
    RunCountExceedsCatalog { runs: usize, catalog: usize },

    #[error("catalog item `{0}` appears more than once")]
    DuplicateItem(String),

    #[error("no conditions configured")]
    NoConditions,

    #[error("condition `{0}` appears more than once")]
    DuplicateCondition(String),

    #[error("micro-step list must contain exactly one phrase step, found {0}")]
    PhraseStepCount(usize),

    #[error("{step} countdown must last at least one second")]
    ZeroCountdown { step: &'static str },

    #[error("plan has {plan} conditions per run but the config lists {config}")]
    PlanMismatch { plan: usize, config: usize },

    #[error("cannot read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
