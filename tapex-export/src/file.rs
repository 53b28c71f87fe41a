use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tapex_core::{ResultSink, SinkError, TapRecord};
use tracing::info;

/// Writes the record as pretty JSON, replacing any previous file.
pub fn write_record(path: &Path, record: &TapRecord) -> Result<(), SinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, record)?;
    out.write_all(b"\n")?;
    out.flush()?;
    info!(path = %path.display(), trials = record.len(), "tap record written");
    Ok(())
}

/// Local file export of the tap record.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
    name: String,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }
}

impl ResultSink for JsonFileSink {
    fn submit(&mut self, record: &TapRecord) -> Result<(), SinkError> {
        write_record(&self.path, record)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record() -> TapRecord {
        let mut record = TapRecord::new();
        record.append("phrases/Anchor/03.wav", 412.5);
        record.append("phrases/Anchor/03.wav", 901.0);
        record.open("phrases/MT/03.wav");
        record
    }

    #[test]
    fn written_file_decodes_to_the_same_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("taps.json");
        let mut sink = JsonFileSink::new(&path);

        sink.submit(&sample_record()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(TapRecord::from_json(&text).unwrap(), sample_record());
        assert!(sink.name().starts_with("file:"));
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let dir = tempdir().unwrap();
        let mut sink = JsonFileSink::new(dir.path());
        assert!(matches!(sink.submit(&sample_record()), Err(SinkError::Io(_))));
    }
}
