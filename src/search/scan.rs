//! Case-insensitive substring scanning.
//!
//! A scan walks a buffer snapshot in fixed-size chunks and yields to the runtime
//! between chunks, so polling, input and drawing keep running while a large log is
//! searched. After every yield the scan compares its epoch with the session's current
//! one and gives up without publishing anything if they differ.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::trace;

use crate::buffer::BufferSnapshot;

/// A match inside one line, in character offsets (`end` exclusive)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Simple per-character lowercase mapping. Characters whose lowercase form expands to
/// several characters are kept as-is so offsets stay one-to-one.
fn fold(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// A search term, case-folded once up front
#[derive(Clone, Debug)]
pub struct Needle {
    folded: Vec<char>,
    ascii: Option<Vec<u8>>,
}

impl Needle {
    pub fn new(term: &str) -> Self {
        let folded: Vec<char> = term.chars().map(fold).collect();
        let ascii = folded
            .iter()
            .all(char::is_ascii)
            .then(|| folded.iter().map(|&c| c as u8).collect());
        Self { folded, ascii }
    }

    /// All non-overlapping occurrences in `line`, left to right
    pub fn find_spans(&self, line: &str) -> Vec<Span> {
        let n = self.folded.len();
        if n == 0 {
            return Vec::new();
        }

        // ASCII line: byte offsets are character offsets
        if line.is_ascii() {
            let Some(needle) = &self.ascii else {
                return Vec::new();
            };
            return scan_spans(line.as_bytes(), needle, |b, &c| b.to_ascii_lowercase() == c);
        }

        let hay: Vec<char> = line.chars().collect();
        scan_spans(&hay, &self.folded, |&h, &c| fold(h) == c)
    }
}

fn scan_spans<H, N>(hay: &[H], needle: &[N], eq: impl Fn(&H, &N) -> bool) -> Vec<Span> {
    let n = needle.len();
    let mut spans = Vec::new();
    let mut i = 0;
    while i + n <= hay.len() {
        if hay[i..i + n].iter().zip(needle).all(|(h, c)| eq(h, c)) {
            spans.push(Span { start: i, end: i + n });
            // A match consumes its span
            i += n;
        } else {
            i += 1;
        }
    }
    spans
}

/// Lines with at least one match, in line order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchIndex {
    spans: HashMap<usize, Vec<Span>>,
    line_order: Vec<usize>,
    match_count: usize,
}

impl MatchIndex {
    fn push(&mut self, line: usize, spans: Vec<Span>) {
        debug_assert!(self.line_order.last().is_none_or(|&last| last < line));
        self.match_count += spans.len();
        self.line_order.push(line);
        self.spans.insert(line, spans);
    }

    /// Total occurrences across all lines
    pub fn match_count(&self) -> usize {
        self.match_count
    }

    /// Ascending line numbers containing at least one match
    pub fn line_order(&self) -> &[usize] {
        &self.line_order
    }

    pub fn spans(&self, line: usize) -> Option<&[Span]> {
        self.spans.get(&line).map(Vec::as_slice)
    }

    /// Position of `line` in the navigable order
    pub fn position(&self, line: usize) -> Option<usize> {
        self.line_order.binary_search(&line).ok()
    }

    /// Replace every entry at or after `start` with the entries of `tail`
    pub fn splice_from(&mut self, start: usize, tail: MatchIndex) {
        let cut = self.line_order.partition_point(|&l| l < start);
        for line in self.line_order.drain(cut..) {
            if let Some(spans) = self.spans.remove(&line) {
                self.match_count -= spans.len();
            }
        }
        for line in tail.line_order {
            if let Some(spans) = tail.spans.get(&line) {
                self.push(line, spans.clone());
            }
        }
    }

    /// Drop entries for lines evicted from the buffer; returns how many lines went
    pub fn prune_before(&mut self, first_line: usize) -> usize {
        let cut = self.line_order.partition_point(|&l| l < first_line);
        for line in self.line_order.drain(..cut) {
            if let Some(spans) = self.spans.remove(&line) {
                self.match_count -= spans.len();
            }
        }
        cut
    }
}

/// One unit of scan work, tagged with the epoch it was submitted under
#[derive(Debug)]
pub struct ScanRequest {
    pub epoch: u64,
    pub term: Arc<str>,
    pub snapshot: Arc<BufferSnapshot>,
    /// First line to scan; anything before it is already indexed
    pub start_line: usize,
    pub incremental: bool,
    pub chunk_lines: usize,
}

/// A completed scan, ready to publish if its epoch is still current
#[derive(Debug)]
pub struct ScanReport {
    pub epoch: u64,
    pub start_line: usize,
    pub incremental: bool,
    pub snapshot: Arc<BufferSnapshot>,
    pub index: MatchIndex,
}

/// Run a chunked scan. Returns `None` if the epoch moved on before the scan finished.
pub async fn run_scan(request: ScanRequest, epoch: watch::Receiver<u64>) -> Option<ScanReport> {
    let needle = Needle::new(&request.term);
    let chunk = request.chunk_lines.max(1);
    let mut index = MatchIndex::default();
    let mut lines = request.snapshot.lines_from(request.start_line);
    let mut chunks = 0usize;

    loop {
        let current = *epoch.borrow();
        if current != request.epoch {
            trace!(
                scan_epoch = request.epoch,
                current, chunks, "scan superseded, discarding partial results"
            );
            return None;
        }

        let mut taken = 0;
        for (number, line) in lines.by_ref().take(chunk) {
            taken += 1;
            let spans = needle.find_spans(line);
            if !spans.is_empty() {
                index.push(number, spans);
            }
        }
        chunks += 1;

        if taken < chunk {
            break;
        }
        tokio::task::yield_now().await;
    }
    drop(lines);

    // The last chunk ran without a yield, but check once more before handing over
    if *epoch.borrow() != request.epoch {
        return None;
    }

    trace!(
        epoch = request.epoch,
        chunks,
        matches = index.match_count(),
        "scan complete"
    );
    Some(ScanReport {
        epoch: request.epoch,
        start_line: request.start_line,
        incremental: request.incremental,
        snapshot: request.snapshot,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LogBuffer;
    use std::task::{Context, Poll, Waker};

    fn snapshot(lines: &[&str]) -> Arc<BufferSnapshot> {
        let mut buffer = LogBuffer::new(10_000);
        buffer.apply_fetch(&lines.join("\n"));
        buffer.snapshot()
    }

    fn request(epoch: u64, term: &str, snap: Arc<BufferSnapshot>, chunk: usize) -> ScanRequest {
        ScanRequest {
            epoch,
            term: Arc::from(term),
            snapshot: snap,
            start_line: 0,
            incremental: false,
            chunk_lines: chunk,
        }
    }

    /// Independent count: lowercase both sides and count non-overlapping occurrences
    fn brute_force_count(lines: &[String], term: &str) -> usize {
        let term = term.to_ascii_lowercase();
        lines
            .iter()
            .map(|l| l.to_ascii_lowercase().matches(term.as_str()).count())
            .sum()
    }

    #[test]
    fn test_find_spans_case_insensitive() {
        let needle = Needle::new("ERROR");
        assert_eq!(
            needle.find_spans("error: x Error y"),
            vec![Span { start: 0, end: 5 }, Span { start: 9, end: 14 }]
        );
    }

    #[test]
    fn test_find_spans_non_overlapping() {
        let needle = Needle::new("aa");
        assert_eq!(
            needle.find_spans("aaaa"),
            vec![Span { start: 0, end: 2 }, Span { start: 2, end: 4 }]
        );
        assert_eq!(needle.find_spans("aaa"), vec![Span { start: 0, end: 2 }]);
    }

    #[test]
    fn test_find_spans_unicode_char_offsets() {
        let needle = Needle::new("ÜBER");
        assert_eq!(
            needle.find_spans("→ über alles"),
            vec![Span { start: 2, end: 6 }]
        );
        // Non-ASCII needle can never match an ASCII line
        assert!(needle.find_spans("uber alles").is_empty());
    }

    #[test]
    fn test_empty_needle_matches_nothing() {
        assert!(Needle::new("").find_spans("anything").is_empty());
    }

    #[tokio::test]
    async fn test_scan_scenario() {
        let snap = snapshot(&["error: a", "ok", "error: b", "error: a"]);
        let (_tx, rx) = watch::channel(1);
        let report = run_scan(request(1, "error", snap, 1000), rx).await.unwrap();
        assert_eq!(report.index.line_order(), &[0, 2, 3]);
        assert_eq!(report.index.match_count(), 3);
        assert_eq!(report.index.spans(1), None);
    }

    #[tokio::test]
    async fn test_scan_matches_brute_force_across_chunks() {
        let lines: Vec<String> = (0..2_345)
            .map(|i| match i % 7 {
                0 => format!("{i} WARN disk warn warn"),
                3 => format!("{i} request ok"),
                5 => format!("{i} Warning: retrying"),
                _ => format!("{i} noise"),
            })
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let snap = snapshot(&refs);

        for chunk in [1, 100, 1000, 5000] {
            let (_tx, rx) = watch::channel(0);
            let report = run_scan(request(0, "warn", Arc::clone(&snap), chunk), rx)
                .await
                .unwrap();
            assert_eq!(report.index.match_count(), brute_force_count(&lines, "warn"));
        }
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() {
        let snap = snapshot(&["a b a", "b", "A"]);
        let (_tx, rx) = watch::channel(3);
        let first = run_scan(request(3, "a", Arc::clone(&snap), 1), rx.clone()).await.unwrap();
        let second = run_scan(request(3, "a", snap, 1), rx).await.unwrap();
        assert_eq!(first.index, second.index);
    }

    #[tokio::test]
    async fn test_stale_epoch_discards_scan() {
        let snap = snapshot(&["error"; 10]);
        let (tx, rx) = watch::channel(1);
        let handle = tokio::spawn(run_scan(request(1, "error", snap, 2), rx));
        // Term changed before the scan got to run
        tx.send_replace(2);
        assert!(handle.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_epoch_change_between_chunks_aborts_scan() {
        let snap = snapshot(&["error"; 10]);
        let (tx, rx) = watch::channel(1);
        let mut scan = std::pin::pin!(run_scan(request(1, "error", snap, 1), rx));

        // First chunk runs, then the scan yields
        let mut cx = Context::from_waker(Waker::noop());
        assert!(matches!(scan.as_mut().poll(&mut cx), Poll::Pending));

        tx.send_replace(2);
        assert!(scan.await.is_none());
    }

    #[tokio::test]
    async fn test_incremental_scan_starts_at_line() {
        let snap = snapshot(&["x", "x", "y", "x"]);
        let (_tx, rx) = watch::channel(0);
        let mut req = request(0, "x", snap, 10);
        req.start_line = 2;
        req.incremental = true;
        let report = run_scan(req, rx).await.unwrap();
        assert_eq!(report.index.line_order(), &[3]);
    }

    #[test]
    fn test_splice_and_prune() {
        let mut index = MatchIndex::default();
        index.push(1, vec![Span { start: 0, end: 1 }]);
        index.push(4, vec![Span { start: 0, end: 1 }, Span { start: 2, end: 3 }]);
        index.push(6, vec![Span { start: 0, end: 1 }]);
        assert_eq!(index.match_count(), 4);

        let mut tail = MatchIndex::default();
        tail.push(6, vec![Span { start: 1, end: 2 }]);
        tail.push(9, vec![Span { start: 0, end: 1 }]);
        index.splice_from(6, tail);
        assert_eq!(index.line_order(), &[1, 4, 6, 9]);
        assert_eq!(index.spans(6), Some(&[Span { start: 1, end: 2 }][..]));
        assert_eq!(index.match_count(), 5);

        assert_eq!(index.prune_before(5), 2);
        assert_eq!(index.line_order(), &[6, 9]);
        assert_eq!(index.match_count(), 2);
        assert_eq!(index.position(9), Some(1));
    }
}
