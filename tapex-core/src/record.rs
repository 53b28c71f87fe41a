use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Session-wide mapping from trial key to tap timestamps in milliseconds,
/// each relative to the opening of that trial's recording window. Entries are
/// only ever appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TapRecord {
    taps: BTreeMap<String, Vec<f64>>,
}

impl TapRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a trial key so it is exported even when no tap arrives.
    pub fn open(&mut self, key: &str) {
        self.taps.entry(key.to_string()).or_default();
    }

    pub fn append(&mut self, key: &str, elapsed_ms: f64) {
        self.taps.entry(key.to_string()).or_default().push(elapsed_ms);
    }

    pub fn get(&self, key: &str) -> Option<&[f64]> {
        self.taps.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.taps.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> + '_ {
        self.taps.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn total_taps(&self) -> usize {
        self.taps.values().map(Vec::len).sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
