use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tapex_core::{ResultSink, SinkError, TapRecord};
use tracing::info;
use uuid::Uuid;

/// One spreadsheet row per trial key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    /// Shared by every row of one session
    pub id: String,
    /// Trial key without the source root
    pub phrase: String,
    /// Timestamps rendered as `[a, b, c]`
    pub values: String,
}

pub fn to_rows(record: &TapRecord, session_id: Uuid, source_root: &str) -> Vec<SheetRow> {
    let prefix = format!("{}/", source_root.trim_end_matches('/'));
    let id = session_id.to_string();
    record
        .iter()
        .map(|(key, taps)| SheetRow {
            id: id.clone(),
            phrase: key.strip_prefix(&prefix).unwrap_or(key).to_string(),
            values: format_values(taps),
        })
        .collect()
}

fn format_values(taps: &[f64]) -> String {
    let inner = taps
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{inner}]")
}

/// Appends rows as JSON lines, one session after another.
#[derive(Debug, Clone)]
pub struct RowsFileSink {
    path: PathBuf,
    source_root: String,
    session_id: Uuid,
}

impl RowsFileSink {
    pub fn new(path: impl Into<PathBuf>, source_root: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source_root: source_root.into(),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl ResultSink for RowsFileSink {
    fn submit(&mut self, record: &TapRecord) -> Result<(), SinkError> {
        let rows = to_rows(record, self.session_id, &self.source_root);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = BufWriter::new(file);
        for row in &rows {
            serde_json::to_writer(&mut out, row)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        info!(
            path = %self.path.display(),
            rows = rows.len(),
            session = %self.session_id,
            "rows appended"
        );
        // next submission belongs to a new session
        self.session_id = Uuid::new_v4();
        Ok(())
    }

    fn name(&self) -> &str {
        "rows-file"
    }
}
