use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

use tapex_core::{Delivery, ResultSink, SinkError, TapRecord};
use tracing::{debug, warn};

/// Runs the wrapped sink on a worker thread so a slow destination never
/// holds up the event loop. Only the latest submission's result is kept.
pub struct BackgroundSink<S> {
    inner: Arc<Mutex<S>>,
    name: String,
    pending: Option<Receiver<Result<(), SinkError>>>,
}

impl<S> BackgroundSink<S>
where
    S: ResultSink + Send + 'static,
{
    pub fn new(inner: S) -> Self {
        let name = inner.name().to_string();
        Self {
            inner: Arc::new(Mutex::new(inner)),
            name,
            pending: None,
        }
    }
}

fn submit_locked<S: ResultSink>(inner: &Mutex<S>, record: &TapRecord) -> Result<(), SinkError> {
    let mut sink = inner
        .lock()
        .map_err(|_| SinkError::Transport("export worker panicked".to_string()))?;
    sink.submit(record)
}

impl<S> ResultSink for BackgroundSink<S>
where
    S: ResultSink + Send + 'static,
{
    fn submit(&mut self, record: &TapRecord) -> Result<(), SinkError> {
        submit_locked(&self.inner, record)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn begin_submit(&mut self, record: &TapRecord) -> Delivery {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = record.clone();
        let sink = self.name.clone();

        let spawned = thread::Builder::new()
            .name("tapex-export".to_string())
            .spawn(move || {
                let result = submit_locked(&inner, &owned);
                if tx.send(result).is_err() {
                    debug!(%sink, "submission result no longer awaited");
                }
            });

        match spawned {
            Ok(_) => {
                debug!(sink = %self.name, "submission handed to worker");
                self.pending = Some(rx);
                Delivery::Pending
            }
            Err(e) => {
                warn!(
                    sink = %self.name,
                    error = %e,
                    "cannot start export worker, submitting inline"
                );
                Delivery::Settled(self.submit(record))
            }
        }
    }

    fn poll_submit(&mut self) -> Option<Result<(), SinkError>> {
        let rx = self.pending.as_ref()?;
        match rx.try_recv() {
            Ok(result) => {
                self.pending = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                Some(Err(SinkError::Transport(
                    "export worker exited without a result".to_string(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    use crate::{HttpSink, UploadFormat};

    struct SlowSink {
        delay: Duration,
        fail: bool,
    }

    impl ResultSink for SlowSink {
        fn submit(&mut self, _record: &TapRecord) -> Result<(), SinkError> {
            thread::sleep(self.delay);
            if self.fail {
                Err(SinkError::Transport("connection reset".to_string()))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn wait_for_result<S: ResultSink>(sink: &mut S) -> Option<Result<(), SinkError>> {
        let deadline = Instant::now() + Duration::from_secs(15);
        while Instant::now() < deadline {
            if let Some(result) = sink.poll_submit() {
                return Some(result);
            }
            thread::sleep(Duration::from_millis(10));
        }
        None
    }

    #[test]
    fn begin_returns_while_the_sink_is_still_working() {
        let mut sink = BackgroundSink::new(SlowSink {
            delay: Duration::from_secs(2),
            fail: false,
        });
        assert_eq!(sink.name(), "slow");

        let started = Instant::now();
        assert!(matches!(sink.begin_submit(&TapRecord::new()), Delivery::Pending));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(sink.poll_submit().is_none());

        assert!(matches!(wait_for_result(&mut sink), Some(Ok(()))));
        assert!(sink.poll_submit().is_none(), "result is handed out once");
    }

    #[test]
    fn worker_failures_come_back_through_poll() {
        let mut sink = BackgroundSink::new(SlowSink {
            delay: Duration::from_millis(20),
            fail: true,
        });
        sink.begin_submit(&TapRecord::new());
        assert!(matches!(
            wait_for_result(&mut sink),
            Some(Err(SinkError::Transport(_)))
        ));
    }

    #[test]
    fn silent_upload_endpoint_does_not_block_begin() {
        // Bound but never accepted: the upload hangs until the client timeout.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        let mut sink = BackgroundSink::new(HttpSink::new(url, UploadFormat::Record, "phrases"));

        let started = Instant::now();
        assert!(matches!(sink.begin_submit(&TapRecord::new()), Delivery::Pending));
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(sink.poll_submit().is_none());
        drop(listener);
    }
}
