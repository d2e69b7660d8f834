//! Periodic fetching of the full log text.
//!
//! One task per active source. Fetches run one after another inside that task, so
//! reports reach the session in completion order. Each report carries the source
//! sequence number the poller was started with; the session drops reports from a
//! poller that belongs to a source it has since switched away from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::session::SessionEvent;
use crate::sources::LogFetcher;

/// Outcome of one fetch
#[derive(Debug)]
pub struct FetchReport {
    pub source_seq: u64,
    pub result: Result<String, FetchError>,
    pub elapsed: Duration,
}

/// Fetch success/failure counters, surfaced in the status bar
#[derive(Clone, Debug, Default)]
pub struct PollStats {
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub last_error: Option<String>,
}

impl PollStats {
    pub fn record(&mut self, result: &Result<String, FetchError>) {
        match result {
            Ok(_) => {
                self.successes += 1;
                self.consecutive_failures = 0;
            }
            Err(e) => {
                self.failures += 1;
                self.consecutive_failures += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// The view is stale if the most recent fetch failed
    pub fn is_stale(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Handle to a running poll loop; the loop stops when this is dropped
pub struct Poller {
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn spawn(
        fetcher: Arc<dyn LogFetcher>,
        source_seq: u64,
        every: Duration,
        fetch_timeout: Duration,
        tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let name = fetcher.name();
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(source = %name, source_seq, "poller started");

            loop {
                ticker.tick().await;

                let started = Instant::now();
                let result = match timeout(fetch_timeout, fetcher.fetch()).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(fetch_timeout)),
                };
                if let Err(e) = &result {
                    warn!(source = %name, source_seq, error = %e, "log fetch failed, retrying next interval");
                }

                let report = FetchReport {
                    source_seq,
                    result,
                    elapsed: started.elapsed(),
                };
                if tx.send(SessionEvent::Fetched(report)).is_err() {
                    break; // Session dropped
                }
            }
        });

        Self { handle }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
