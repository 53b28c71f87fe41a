use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tapex_core::{ResultSink, SinkError, TapRecord};
use tracing::{debug, info};
use uuid::Uuid;

use crate::rows::to_rows;

/// Body shape of the upload.
#[derive(Copy, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadFormat {
    /// `{ trialKey: [ms, ...] }` as recorded
    #[default]
    Record,
    /// Spreadsheet rows tagged with the session id
    Rows,
}

/// POSTs the record to a remote endpoint once. No retries.
pub struct HttpSink {
    client: Client,
    url: String,
    format: UploadFormat,
    source_root: String,
    session_id: Uuid,
}

impl HttpSink {
    pub fn new(
        url: impl Into<String>,
        format: UploadFormat,
        source_root: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url: url.into(),
            format,
            source_root: source_root.into(),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl ResultSink for HttpSink {
    fn submit(&mut self, record: &TapRecord) -> Result<(), SinkError> {
        let request = self.client.post(&self.url);
        let request = match self.format {
            UploadFormat::Record => request.json(record),
            UploadFormat::Rows => {
                request.json(&to_rows(record, self.session_id, &self.source_root))
            }
        };
        debug!(url = %self.url, format = ?self.format, "uploading tap record");

        let response = request
            .send()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(url = %self.url, session = %self.session_id, "tap record uploaded");
        self.session_id = Uuid::new_v4();
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Accepts one request, answers with `status`, and hands back the body.
    fn one_shot_server(status: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    length = v.trim().parse().unwrap();
                }
            }
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).unwrap();
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
            )
            .unwrap();
            String::from_utf8(body).unwrap()
        });
        (url, handle)
    }

    fn record() -> TapRecord {
        let mut record = TapRecord::new();
        record.append("phrases/MASS/05.wav", 75.5);
        record
    }

    #[test]
    fn posts_the_record_as_json() {
        let (url, server) = one_shot_server("200 OK");
        let mut sink = HttpSink::new(url, UploadFormat::Record, "phrases");

        sink.submit(&record()).unwrap();

        let body = server.join().unwrap();
        assert_eq!(TapRecord::from_json(&body).unwrap(), record());
    }

    #[test]
    fn posts_rows_when_asked() {
        let (url, server) = one_shot_server("200 OK");
        let mut sink = HttpSink::new(url, UploadFormat::Rows, "phrases");
        let id = sink.session_id().to_string();

        sink.submit(&record()).unwrap();

        let rows: Vec<crate::SheetRow> = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, id);
        assert_eq!(rows[0].phrase, "MASS/05.wav");
    }

    #[test]
    fn error_status_is_a_rejection() {
        let (url, server) = one_shot_server("500 Internal Server Error");
        let mut sink = HttpSink::new(url, UploadFormat::Record, "phrases");

        let err = sink.submit(&record()).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, SinkError::Rejected { status: 500, .. }));
    }

    #[test]
    fn unreachable_endpoint_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        drop(listener);
        let mut sink = HttpSink::new(url, UploadFormat::Record, "phrases");

        assert!(matches!(
            sink.submit(&record()),
            Err(SinkError::Transport(_))
        ));
    }
}
