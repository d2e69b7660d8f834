//! Search over the log buffer.
//!
//! `SearchSession` owns the committed term, the epoch, and the published match index.
//! Every change that invalidates results (new term, cleared term, new buffer
//! generation) bumps the epoch; scans compare against it cooperatively and a report
//! is only published if its epoch is still current when it arrives.

pub mod debounce;
pub mod scan;
pub mod window;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::buffer::BufferSnapshot;
use scan::{MatchIndex, ScanReport, ScanRequest, Span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStatus {
    Idle,
    Scanning,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

pub struct SearchSession {
    term: Arc<str>,
    epoch: u64,
    epoch_tx: watch::Sender<u64>,
    generation: u64,
    index: MatchIndex,
    /// Position in `index.line_order()`; `None` means no active selection
    cursor: Option<usize>,
    status: SearchStatus,
    /// The snapshot the published index reflects
    scanned: Option<Arc<BufferSnapshot>>,
    /// Epoch of the scan currently running, if any
    in_flight: Option<u64>,
    chunk_lines: usize,
}

impl SearchSession {
    pub fn new(chunk_lines: usize) -> Self {
        let (epoch_tx, _) = watch::channel(0);
        Self {
            term: Arc::from(""),
            epoch: 0,
            epoch_tx,
            generation: 0,
            index: MatchIndex::default(),
            cursor: None,
            status: SearchStatus::Idle,
            scanned: None,
            in_flight: None,
            chunk_lines: chunk_lines.max(1),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_active(&self) -> bool {
        !self.term.is_empty()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn index(&self) -> &MatchIndex {
        &self.index
    }

    pub fn match_count(&self) -> usize {
        self.index.match_count()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The line holding the active match
    pub fn active_line(&self) -> Option<usize> {
        self.cursor
            .and_then(|c| self.index.line_order().get(c).copied())
    }

    pub fn spans(&self, line: usize) -> Option<&[Span]> {
        self.index.spans(line)
    }

    /// A receiver scans use to notice they have been superseded
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.epoch_tx.subscribe()
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
        self.epoch_tx.send_replace(self.epoch);
        self.in_flight = None;
        debug!(epoch = self.epoch, "search epoch advanced");
    }

    fn reset_results(&mut self) {
        self.index = MatchIndex::default();
        self.cursor = None;
        self.scanned = None;
        self.status = SearchStatus::Idle;
    }

    fn full_scan(&mut self, snapshot: &Arc<BufferSnapshot>) -> ScanRequest {
        self.status = SearchStatus::Scanning;
        self.in_flight = Some(self.epoch);
        ScanRequest {
            epoch: self.epoch,
            term: Arc::clone(&self.term),
            snapshot: Arc::clone(snapshot),
            start_line: snapshot.first_line(),
            incremental: false,
            chunk_lines: self.chunk_lines,
        }
    }

    /// Adopt a newly committed term. An empty term clears everything and scans nothing.
    pub fn commit(&mut self, term: &str, snapshot: &Arc<BufferSnapshot>) -> Option<ScanRequest> {
        if term == &*self.term && self.status != SearchStatus::Idle {
            return None;
        }
        self.term = Arc::from(term);
        self.bump_epoch();
        self.reset_results();
        if term.is_empty() {
            return None;
        }
        Some(self.full_scan(snapshot))
    }

    /// Drop the term and all results
    pub fn clear(&mut self) {
        if self.term.is_empty() && self.status == SearchStatus::Idle {
            return;
        }
        self.term = Arc::from("");
        self.bump_epoch();
        self.reset_results();
    }

    /// The buffer moved to a new generation: results are meaningless now
    pub fn on_generation_change(&mut self, generation: u64) {
        if generation == self.generation {
            return;
        }
        self.generation = generation;
        self.bump_epoch();
        self.reset_results();
    }

    /// The buffer changed within the current generation.
    ///
    /// Returns a scan to run: a full scan if none has completed for this term yet, or an
    /// incremental one covering the lines since the last scan.
    pub fn on_buffer_update(&mut self, snapshot: &Arc<BufferSnapshot>) -> Option<ScanRequest> {
        if snapshot.generation() != self.generation {
            self.on_generation_change(snapshot.generation());
        }
        self.prune(snapshot.first_line());

        if self.term.is_empty() || self.in_flight.is_some() {
            return None;
        }

        match (&self.scanned, self.status) {
            (_, SearchStatus::Idle) | (None, _) => Some(self.full_scan(snapshot)),
            (Some(scanned), SearchStatus::Ready) if !Arc::ptr_eq(scanned, snapshot) => {
                // The last scanned line may have grown, so rescan it
                let start = scanned
                    .line_count()
                    .saturating_sub(1)
                    .max(snapshot.first_line());
                self.in_flight = Some(self.epoch);
                Some(ScanRequest {
                    epoch: self.epoch,
                    term: Arc::clone(&self.term),
                    snapshot: Arc::clone(snapshot),
                    start_line: start,
                    incremental: true,
                    chunk_lines: self.chunk_lines,
                })
            }
            _ => None,
        }
    }

    /// Publish a finished scan. Returns false if it was stale and discarded.
    pub fn accept(&mut self, report: ScanReport) -> bool {
        if report.epoch != self.epoch {
            trace!(
                report_epoch = report.epoch,
                epoch = self.epoch,
                "discarding stale scan"
            );
            return false;
        }
        self.in_flight = None;

        let active_line = self.active_line();
        if report.incremental {
            self.index.splice_from(report.start_line, report.index);
        } else {
            self.index = report.index;
        }
        self.index.prune_before(report.snapshot.first_line());
        self.cursor = active_line.and_then(|line| self.index.position(line));
        self.scanned = Some(report.snapshot);
        self.status = SearchStatus::Ready;
        true
    }

    fn prune(&mut self, first_line: usize) {
        let active_line = self.active_line();
        if self.index.prune_before(first_line) > 0 {
            self.cursor = active_line.and_then(|line| self.index.position(line));
        }
    }

    /// Move the cursor with wraparound; returns the line to jump to
    pub fn navigate(&mut self, direction: Direction) -> Option<usize> {
        let count = self.index.line_order().len();
        if count == 0 {
            return None;
        }
        let next = match (self.cursor, direction) {
            (None, Direction::Next) => 0,
            (None, Direction::Prev) => count - 1,
            (Some(c), Direction::Next) => (c + 1) % count,
            (Some(c), Direction::Prev) => (c + count - 1) % count,
        };
        self.cursor = Some(next);
        self.active_line()
    }

    /// Make an arbitrary match active; returns its line
    pub fn select(&mut self, match_index: usize) -> Option<usize> {
        let line = *self.index.line_order().get(match_index)?;
        self.cursor = Some(match_index);
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LogBuffer;

    fn buffer_with(lines: &[&str]) -> LogBuffer {
        let mut buffer = LogBuffer::new(10_000);
        buffer.apply_fetch(&lines.join("\n"));
        buffer
    }

    async fn run(search: &SearchSession, request: ScanRequest) -> ScanReport {
        scan::run_scan(request, search.subscribe()).await.unwrap()
    }

    #[tokio::test]
    async fn test_commit_scan_accept() {
        let buffer = buffer_with(&["error: a", "ok", "error: b", "error: a"]);
        let mut search = SearchSession::new(1000);
        let request = search.commit("error", &buffer.snapshot()).unwrap();
        assert_eq!(search.status(), SearchStatus::Scanning);

        let report = run(&search, request).await;
        assert!(search.accept(report));
        assert_eq!(search.status(), SearchStatus::Ready);
        assert_eq!(search.index().line_order(), &[0, 2, 3]);
        assert_eq!(search.match_count(), 3);
        assert_eq!(search.cursor(), None);
    }

    #[test]
    fn test_empty_term_is_idle_without_scan() {
        let buffer = buffer_with(&["a"]);
        let mut search = SearchSession::new(1000);
        assert!(search.commit("", &buffer.snapshot()).is_none());
        assert_eq!(search.status(), SearchStatus::Idle);
        assert_eq!(search.match_count(), 0);
    }

    #[tokio::test]
    async fn test_no_matches_is_ready_with_zero() {
        let buffer = buffer_with(&["a", "b"]);
        let mut search = SearchSession::new(1000);
        let request = search.commit("zzz", &buffer.snapshot()).unwrap();
        let report = run(&search, request).await;
        assert!(search.accept(report));
        assert_eq!(search.status(), SearchStatus::Ready);
        assert_eq!(search.match_count(), 0);
        assert_eq!(search.navigate(Direction::Next), None);
    }

    #[tokio::test]
    async fn test_term_change_discards_old_report() {
        let buffer = buffer_with(&["error", "warn"]);
        let mut search = SearchSession::new(1000);
        let old = search.commit("error", &buffer.snapshot()).unwrap();
        let old_report = run(&search, old).await;

        let new = search.commit("warn", &buffer.snapshot()).unwrap();
        assert!(!search.accept(old_report));
        assert_eq!(search.status(), SearchStatus::Scanning);

        let report = run(&search, new).await;
        assert!(search.accept(report));
        assert_eq!(search.index().line_order(), &[1]);
    }

    #[tokio::test]
    async fn test_navigation_wraps() {
        let buffer = buffer_with(&["x", "-", "x", "x"]);
        let mut search = SearchSession::new(1000);
        let request = search.commit("x", &buffer.snapshot()).unwrap();
        let report = run(&search, request).await;
        search.accept(report);

        assert_eq!(search.navigate(Direction::Next), Some(0));
        assert_eq!(search.navigate(Direction::Prev), Some(3));
        assert_eq!(search.cursor(), Some(2));
        assert_eq!(search.navigate(Direction::Next), Some(0));
        assert_eq!(search.select(1), Some(2));
        assert_eq!(search.select(9), None);
        assert_eq!(search.cursor(), Some(1));
    }

    #[tokio::test]
    async fn test_incremental_scan_merges_growth() {
        let mut buffer = buffer_with(&["x1", "y", "x partial"]);
        let mut search = SearchSession::new(1000);
        let request = search.commit("x", &buffer.snapshot()).unwrap();
        let report = run(&search, request).await;
        search.accept(report);
        search.navigate(Direction::Next);

        // Last line grew and two more arrived
        buffer.apply_fetch("x1\ny\nx partial x\nz\nx");
        let request = search.on_buffer_update(&buffer.snapshot()).unwrap();
        assert!(request.incremental);
        assert_eq!(request.start_line, 2);
        let report = run(&search, request).await;
        assert!(search.accept(report));

        assert_eq!(search.index().line_order(), &[0, 2, 4]);
        assert_eq!(search.match_count(), 4);
        assert_eq!(search.active_line(), Some(0));
        // Nothing new since the last scan
        assert!(search.on_buffer_update(&buffer.snapshot()).is_none());
    }

    #[tokio::test]
    async fn test_generation_change_resets() {
        let mut buffer = buffer_with(&["x", "x"]);
        let mut search = SearchSession::new(1000);
        let request = search.commit("x", &buffer.snapshot()).unwrap();
        let epoch = search.epoch();

        buffer.reset();
        search.on_generation_change(buffer.generation());
        assert!(search.epoch() > epoch);
        assert_eq!(search.status(), SearchStatus::Idle);

        // The scan submitted before the reset notices on its first check
        assert!(scan::run_scan(request, search.subscribe()).await.is_none());

        // The term survives; the first fetch of the new generation rescans
        buffer.apply_fetch("x");
        let request = search.on_buffer_update(&buffer.snapshot()).unwrap();
        assert!(!request.incremental);
        assert_eq!(search.status(), SearchStatus::Scanning);
    }

    #[tokio::test]
    async fn test_eviction_prunes_matches_and_cursor() {
        let mut buffer = LogBuffer::new(3);
        buffer.apply_fetch("x0\nx1\nx2");
        let mut search = SearchSession::new(1000);
        let request = search.commit("x", &buffer.snapshot()).unwrap();
        let report = run(&search, request).await;
        search.accept(report);
        search.navigate(Direction::Next);
        assert_eq!(search.active_line(), Some(0));

        buffer.apply_fetch("x0\nx1\nx2\nx3\nx4");
        let request = search.on_buffer_update(&buffer.snapshot()).unwrap();
        assert_eq!(search.cursor(), None);
        let report = run(&search, request).await;
        search.accept(report);
        assert_eq!(search.index().line_order(), &[2, 3, 4]);
    }
}
