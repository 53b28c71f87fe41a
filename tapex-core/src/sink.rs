use thiserror::Error;

use crate::record::TapRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("endpoint rejected upload with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// State of a submission started with [`ResultSink::begin_submit`].
#[derive(Debug)]
pub enum Delivery {
    Settled(Result<(), SinkError>),
    /// Still running; the result arrives through [`ResultSink::poll_submit`]
    Pending,
}

/// Receives the finished Tap Record once, when the session ends.
pub trait ResultSink {
    fn submit(&mut self, record: &TapRecord) -> Result<(), SinkError>;

    fn name(&self) -> &str {
        "sink"
    }

    /// Starts a submission without waiting on the destination. Sinks that
    /// finish on the spot settle immediately.
    fn begin_submit(&mut self, record: &TapRecord) -> Delivery {
        Delivery::Settled(self.submit(record))
    }

    /// Result of a pending submission, once it is known.
    fn poll_submit(&mut self) -> Option<Result<(), SinkError>> {
        None
    }
}

impl<S: ResultSink + ?Sized> ResultSink for Box<S> {
    fn submit(&mut self, record: &TapRecord) -> Result<(), SinkError> {
        (**self).submit(record)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn begin_submit(&mut self, record: &TapRecord) -> Delivery {
        (**self).begin_submit(record)
    }

    fn poll_submit(&mut self) -> Option<Result<(), SinkError>> {
        (**self).poll_submit()
    }
}

/// Keeps every submitted record in memory.
impl ResultSink for Vec<TapRecord> {
    fn submit(&mut self, record: &TapRecord) -> Result<(), SinkError> {
        self.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
