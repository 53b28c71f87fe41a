//! Result sinks for a finished tap record: local JSON file export, HTTP
//! upload, and spreadsheet-style rows keyed by a per-session id.
//! [`BackgroundSink`] moves any of them off the caller's thread.

pub mod background;
pub mod file;
pub mod http;
pub mod rows;

pub use background::BackgroundSink;
pub use file::{JsonFileSink, write_record};
pub use http::{HttpSink, UploadFormat};
pub use rows::{RowsFileSink, SheetRow, to_rows};
