//! One displayed log view: buffer, viewport, and search, driven by events.
//!
//! Everything here runs on the single UI task. Background work (the poller, search
//! scans, exports) only ever talks back through `SessionEvent`s on the session's
//! channel, so the session state never needs a lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::buffer::{BufferSnapshot, BufferUpdate, LogBuffer};
use crate::config::Config;
use crate::error::FetchError;
use crate::poller::{FetchReport, PollStats, Poller};
use crate::render::RenderCommand;
use crate::search::debounce::InputDebouncer;
use crate::search::scan::{self, ScanReport, ScanRequest};
use crate::search::window::{self, Segment, SegmentCache, WindowOptions};
use crate::search::{Direction, SearchSession, SearchStatus};
use crate::sources::SourceSpec;
use crate::viewport::ViewportCoordinator;

/// Results of background work, delivered to the UI task
#[derive(Debug)]
pub enum SessionEvent {
    Fetched(FetchReport),
    Scanned(ScanReport),
    Exported(Result<PathBuf, String>),
}

pub struct LogSession {
    config: Config,
    source: SourceSpec,
    /// Bumped on every source switch; poller reports carry the value they started with
    source_seq: u64,
    buffer: LogBuffer,
    viewport: ViewportCoordinator,
    search: SearchSession,
    debouncer: InputDebouncer,
    segments: SegmentCache,
    window: WindowOptions,
    poller: Option<Poller>,
    stats: PollStats,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl LogSession {
    pub fn new(config: Config, source: SourceSpec) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            buffer: LogBuffer::new(config.max_lines),
            viewport: ViewportCoordinator::new(config.near_bottom_lines),
            search: SearchSession::new(config.scan_chunk_lines),
            debouncer: InputDebouncer::new(config.debounce()),
            segments: SegmentCache::new(config.segment_cache_capacity),
            window: WindowOptions {
                limit: config.result_window,
                context: config.snippet_context,
            },
            source_seq: 0,
            poller: None,
            stats: PollStats::default(),
            source,
            config,
            tx,
        };
        (session, rx)
    }

    pub fn source(&self) -> &SourceSpec {
        &self.source
    }

    pub fn source_seq(&self) -> u64 {
        self.source_seq
    }

    pub fn snapshot(&self) -> Arc<BufferSnapshot> {
        self.buffer.snapshot()
    }

    pub fn viewport(&self) -> &ViewportCoordinator {
        &self.viewport
    }

    pub fn search(&self) -> &SearchSession {
        &self.search
    }

    pub fn raw_query(&self) -> &str {
        self.debouncer.raw()
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// When the host should next call `tick`, if an edit is pending
    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Start polling the current source
    pub fn start(&mut self) -> Result<(), FetchError> {
        let fetcher = self.source.fetcher()?;
        self.poller = Some(Poller::spawn(
            fetcher,
            self.source_seq,
            self.config.poll_interval(),
            self.config.fetch_timeout(),
            self.tx.clone(),
        ));
        info!(source = %self.source.name(), "polling started");
        Ok(())
    }

    /// Display a different source. The buffer starts a new generation and any scan in
    /// flight for the old one is abandoned.
    pub fn switch_source(&mut self, source: SourceSpec) -> Result<Vec<RenderCommand>, FetchError> {
        // Fail before tearing anything down
        source.fetcher()?;

        self.poller = None;
        self.source = source;
        self.source_seq += 1;
        self.stats = PollStats::default();
        let generation = self.buffer.reset();
        self.search.on_generation_change(generation);
        debug!(source = %self.source.name(), source_seq = self.source_seq, "switched source");

        let mut cmds = self.viewport.reset(&self.buffer.snapshot());
        cmds.extend(self.search_commands());
        self.start()?;
        Ok(cmds)
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<RenderCommand> {
        match event {
            SessionEvent::Fetched(report) => self.on_fetch(report),
            SessionEvent::Scanned(report) => self.on_scan(report),
            // The host reports export outcomes itself
            SessionEvent::Exported(_) => Vec::new(),
        }
    }

    fn on_fetch(&mut self, report: FetchReport) -> Vec<RenderCommand> {
        if report.source_seq != self.source_seq {
            trace!(
                report_seq = report.source_seq,
                source_seq = self.source_seq,
                "dropping report from previous source"
            );
            return Vec::new();
        }
        self.stats.record(&report.result);
        match report.result {
            Ok(text) => self.apply_text(&text),
            // Already logged by the poller; the buffer stays as it was
            Err(_) => Vec::new(),
        }
    }

    fn apply_text(&mut self, text: &str) -> Vec<RenderCommand> {
        let update = self.buffer.apply_fetch(text);
        if update == BufferUpdate::Unchanged {
            return Vec::new();
        }

        let snapshot = self.buffer.snapshot();
        let mut cmds = self.viewport.on_buffer_update(&snapshot);
        let searching = self.search.is_active() || matches!(update, BufferUpdate::Reset { .. });
        if let Some(request) = self.search.on_buffer_update(&snapshot) {
            self.submit_scan(request);
        }
        if searching {
            cmds.extend(self.search_commands());
        }
        cmds
    }

    fn on_scan(&mut self, report: ScanReport) -> Vec<RenderCommand> {
        if !self.search.accept(report) {
            return Vec::new();
        }
        // Output may have arrived while the scan ran
        if let Some(request) = self.search.on_buffer_update(&self.buffer.snapshot()) {
            self.submit_scan(request);
        }
        self.search_commands()
    }

    fn submit_scan(&self, request: ScanRequest) {
        let epoch = self.search.subscribe();
        let tx = self.tx.clone();
        debug!(
            epoch = request.epoch,
            start_line = request.start_line,
            incremental = request.incremental,
            "submitting scan"
        );
        tokio::spawn(async move {
            if let Some(report) = scan::run_scan(request, epoch).await {
                let _ = tx.send(SessionEvent::Scanned(report));
            }
        });
    }

    fn search_commands(&mut self) -> Vec<RenderCommand> {
        let snapshot = self.buffer.snapshot();
        let results = window::build_results(&self.search, &snapshot, &mut self.segments, &self.window);
        vec![
            RenderCommand::SetSearchResults(results),
            RenderCommand::SetSearchStatus(self.search.status()),
        ]
    }

    fn commit_term(&mut self, term: &str) -> Vec<RenderCommand> {
        let snapshot = self.buffer.snapshot();
        if let Some(request) = self.search.commit(term, &snapshot) {
            self.viewport.enter_search();
            self.submit_scan(request);
        }
        self.search_commands()
    }

    /// A keystroke in the query input
    pub fn edit_query(&mut self, raw: &str, now: Instant) -> Vec<RenderCommand> {
        if self.debouncer.edit(raw, now) {
            self.search.clear();
            self.search_commands()
        } else {
            Vec::new()
        }
    }

    /// Commit the pending query once it has been quiet long enough
    pub fn tick(&mut self, now: Instant) -> Vec<RenderCommand> {
        match self.debouncer.poll(now) {
            Some(term) => self.commit_term(&term),
            None => Vec::new(),
        }
    }

    pub fn clear_query(&mut self) -> Vec<RenderCommand> {
        self.debouncer.clear();
        self.search.clear();
        self.search_commands()
    }

    pub fn navigate(&mut self, direction: Direction) -> Vec<RenderCommand> {
        let Some(line) = self.search.navigate(direction) else {
            return Vec::new();
        };
        let mut cmds = self.viewport.jump_to_line(line, true, &self.buffer.snapshot());
        cmds.extend(self.search_commands());
        cmds
    }

    /// Jump to a result and leave search mode, paused at that line
    pub fn open_result(&mut self, match_index: usize) -> Vec<RenderCommand> {
        let Some(line) = self.search.select(match_index) else {
            return Vec::new();
        };
        let mut cmds = self.viewport.jump_to_line(line, true, &self.buffer.snapshot());
        cmds.extend(self.clear_query());
        cmds
    }

    pub fn scroll_by(&mut self, delta: isize) -> Vec<RenderCommand> {
        self.viewport.scroll_by(delta, &self.buffer.snapshot())
    }

    pub fn scroll_to_top(&mut self) -> Vec<RenderCommand> {
        self.viewport.scroll_to_top()
    }

    pub fn jump_to_latest(&mut self) -> Vec<RenderCommand> {
        self.viewport.jump_to_latest(&self.buffer.snapshot())
    }

    /// Called by the host after each drawn frame
    pub fn finish_frame(&mut self) -> Vec<RenderCommand> {
        self.viewport.finish_jump(&self.buffer.snapshot())
    }

    pub fn set_viewport_height(&mut self, height: usize) -> Vec<RenderCommand> {
        self.viewport.set_height(height)
    }

    pub fn set_selection_active(&mut self, active: bool) -> Vec<RenderCommand> {
        self.viewport.set_selection_active(active, &self.buffer.snapshot())
    }

    /// Matched/unmatched segments for a line in the main view, if it has matches
    pub fn segments_for_line(&mut self, snapshot: &BufferSnapshot, line: usize) -> Option<Arc<[Segment]>> {
        self.search.spans(line)?;
        let text = snapshot.line(line)?;
        Some(self.segments.segments(text, self.search.term()))
    }

    /// Write the source's export artifact to the export directory in the background
    pub fn export(&self) {
        let tx = self.tx.clone();
        let dir = self.config.export_dir();
        let name = self.source.name();
        let fetcher = self.source.fetcher();
        let fallback = self.buffer.snapshot();

        tokio::spawn(async move {
            let text = match fetcher {
                Ok(fetcher) => match fetcher.export().await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(source = %name, error = %e, "export fetch failed, writing buffered lines");
                        fallback.text()
                    }
                },
                Err(e) => {
                    warn!(source = %name, error = %e, "cannot build exporter, writing buffered lines");
                    fallback.text()
                }
            };
            let path = dir.join(export_file_name(&name, Local::now()));
            let result = write_export(&dir, &path, &text)
                .await
                .map(|()| path)
                .map_err(|e| e.to_string());
            let _ = tx.send(SessionEvent::Exported(result));
        });
    }
}

/// `<source>-<timestamp>.log`, with path separators in the source name replaced
pub fn export_file_name(source: &str, now: DateTime<Local>) -> String {
    let safe: String = source
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    format!("{}-{}.log", safe, now.format("%Y%m%d-%H%M%S"))
}

async fn write_export(dir: &Path, path: &Path, text: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, text).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::{NamedTempFile, TempDir};

    use crate::viewport::ViewMode;

    fn session() -> (LogSession, mpsc::UnboundedReceiver<SessionEvent>) {
        let source = SourceSpec::File {
            path: PathBuf::from("/nonexistent/hound-test.log"),
        };
        LogSession::new(Config::default(), source)
    }

    fn fetched(session: &LogSession, text: &str) -> SessionEvent {
        SessionEvent::Fetched(FetchReport {
            source_seq: session.source_seq(),
            result: Ok(text.to_string()),
            elapsed: Duration::from_millis(1),
        })
    }

    fn numbered(n: usize) -> String {
        (0..n).map(|i| format!("line {i}\n")).collect()
    }

    fn has_render(cmds: &[RenderCommand]) -> bool {
        cmds.iter().any(|c| matches!(c, RenderCommand::Render { .. }))
    }

    fn results(cmds: &[RenderCommand]) -> Option<&window::SearchResults> {
        cmds.iter().rev().find_map(|c| match c {
            RenderCommand::SetSearchResults(r) => Some(r),
            _ => None,
        })
    }

    fn status(cmds: &[RenderCommand]) -> Option<SearchStatus> {
        cmds.iter().rev().find_map(|c| match c {
            RenderCommand::SetSearchStatus(s) => Some(*s),
            _ => None,
        })
    }

    async fn next_scan(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        loop {
            match rx.recv().await {
                Some(event @ SessionEvent::Scanned(_)) => return event,
                Some(_) => continue,
                None => panic!("session channel closed"),
            }
        }
    }

    /// Commit `term` through the debouncer and publish the resulting scan
    async fn search_for(
        session: &mut LogSession,
        rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
        term: &str,
    ) -> Vec<RenderCommand> {
        let t0 = Instant::now();
        session.edit_query(term, t0);
        let cmds = session.tick(t0 + Duration::from_millis(150));
        assert_eq!(status(&cmds), Some(SearchStatus::Scanning));
        let event = next_scan(rx).await;
        session.handle(event)
    }

    #[tokio::test]
    async fn test_fetch_renders_while_tailing() {
        let (mut session, _rx) = session();
        session.set_viewport_height(10);
        let event = fetched(&session, &numbered(30));
        let cmds = session.handle(event);
        assert!(has_render(&cmds));
        assert!(cmds.iter().any(|c| matches!(
            c,
            RenderCommand::ScrollToLine { line: 29, top: 20, .. }
        )));
        assert_eq!(session.stats().successes, 1);
    }

    #[tokio::test]
    async fn test_unchanged_fetch_emits_nothing() {
        let (mut session, _rx) = session();
        let event = fetched(&session, "a\nb");
        session.handle(event);
        let event = fetched(&session, "a\nb");
        assert!(session.handle(event).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_buffer() {
        let (mut session, _rx) = session();
        let event = fetched(&session, "a\nb");
        session.handle(event);
        let cmds = session.handle(SessionEvent::Fetched(FetchReport {
            source_seq: session.source_seq(),
            result: Err(FetchError::Http { status: 503 }),
            elapsed: Duration::from_millis(1),
        }));
        assert!(cmds.is_empty());
        assert_eq!(session.snapshot().line_count(), 2);
        assert!(session.stats().is_stale());
    }

    #[tokio::test]
    async fn test_report_from_previous_source_is_dropped() {
        let (mut session, _rx) = session();
        let cmds = session.handle(SessionEvent::Fetched(FetchReport {
            source_seq: session.source_seq() + 1,
            result: Ok("x".to_string()),
            elapsed: Duration::from_millis(1),
        }));
        assert!(cmds.is_empty());
        assert!(session.snapshot().is_empty());
        assert_eq!(session.stats().successes, 0);
    }

    #[tokio::test]
    async fn test_paused_growth_only_updates_badge() {
        let (mut session, _rx) = session();
        session.set_viewport_height(10);
        let event = fetched(&session, &numbered(100));
        session.handle(event);
        session.scroll_by(-30);
        assert_eq!(session.viewport().mode(), ViewMode::Paused);

        let event = fetched(&session, &numbered(150));
        let cmds = session.handle(event);
        assert!(!has_render(&cmds));
        assert!(cmds
            .iter()
            .any(|c| matches!(c, RenderCommand::SetUnseenBadge(50))));

        let cmds = session.jump_to_latest();
        assert!(has_render(&cmds));
        session.finish_frame();
        assert!(session.viewport().is_tailing());
    }

    #[tokio::test]
    async fn test_search_publishes_matches() {
        let (mut session, mut rx) = session();
        let event = fetched(&session, "error: a\nok\nerror: b\nError: c");
        session.handle(event);

        let cmds = search_for(&mut session, &mut rx, "error").await;
        assert_eq!(status(&cmds), Some(SearchStatus::Ready));
        let published = results(&cmds).unwrap();
        assert_eq!(published.total_matches, 3);
        assert_eq!(published.cards.len(), 3);
        assert_eq!(session.search().index().line_order(), &[0, 2, 3]);
        // Search results are shown paused
        assert_eq!(session.viewport().mode(), ViewMode::Paused);

        let snapshot = session.snapshot();
        let segments = session.segments_for_line(&snapshot, 2).unwrap();
        assert!(segments[0].matched);
        assert!(session.segments_for_line(&snapshot, 1).is_none());
    }

    #[tokio::test]
    async fn test_growth_rescans_incrementally() {
        let (mut session, mut rx) = session();
        let event = fetched(&session, "x\ny");
        session.handle(event);
        search_for(&mut session, &mut rx, "x").await;

        let event = fetched(&session, "x\ny\nx\nx");
        session.handle(event);
        let event = next_scan(&mut rx).await;
        let cmds = session.handle(event);
        assert_eq!(results(&cmds).unwrap().total_matches, 3);
    }

    #[tokio::test]
    async fn test_generation_change_mid_scan_discards_results() {
        let (mut session, mut rx) = session();
        let event = fetched(&session, "x1\nx2\nx3\nx4");
        session.handle(event);

        let t0 = Instant::now();
        session.edit_query("x", t0);
        session.tick(t0 + Duration::from_millis(150));
        let stale = next_scan(&mut rx).await;

        // The log was truncated before the scan result was handled
        let event = fetched(&session, "x9");
        let cmds = session.handle(event);
        assert_eq!(status(&cmds), Some(SearchStatus::Scanning));
        assert!(session.handle(stale).is_empty());
        assert_eq!(session.search().match_count(), 0);

        let fresh = next_scan(&mut rx).await;
        let cmds = session.handle(fresh);
        assert_eq!(results(&cmds).unwrap().total_matches, 1);
        assert_eq!(session.search().index().line_order(), &[0]);
    }

    #[tokio::test]
    async fn test_term_change_discards_old_scan() {
        let (mut session, mut rx) = session();
        let event = fetched(&session, "error\nwarn\nwarn");
        session.handle(event);

        let t0 = Instant::now();
        session.edit_query("error", t0);
        session.tick(t0 + Duration::from_millis(150));
        session.edit_query("warn", t0 + Duration::from_millis(200));
        session.tick(t0 + Duration::from_millis(400));

        // Only the scan for the current term publishes
        let mut published = Vec::new();
        while published.is_empty() {
            let event = next_scan(&mut rx).await;
            published = session.handle(event);
        }
        assert_eq!(results(&published).unwrap().total_matches, 2);
    }

    #[tokio::test]
    async fn test_clearing_query_is_immediate() {
        let (mut session, mut rx) = session();
        let event = fetched(&session, "error");
        session.handle(event);
        search_for(&mut session, &mut rx, "error").await;

        let cmds = session.edit_query("", Instant::now());
        assert_eq!(status(&cmds), Some(SearchStatus::Idle));
        assert_eq!(results(&cmds).unwrap().total_matches, 0);
        assert!(!session.search().is_active());
        // Nothing is left pending for the next tick
        assert!(session.tick(Instant::now() + Duration::from_secs(5)).is_empty());
    }

    #[tokio::test]
    async fn test_navigate_and_open_result() {
        let (mut session, mut rx) = session();
        session.set_viewport_height(4);
        let mut text = numbered(50);
        text.push_str("needle one\n");
        text.push_str(&numbered(20));
        text.push_str("needle two\n");
        let event = fetched(&session, &text);
        session.handle(event);
        search_for(&mut session, &mut rx, "needle").await;

        let cmds = session.navigate(Direction::Next);
        assert!(cmds.iter().any(|c| matches!(
            c,
            RenderCommand::ScrollToLine { line: 50, flash: true, .. }
        )));
        assert_eq!(results(&cmds).unwrap().active, Some(0));
        session.finish_frame();

        let cmds = session.open_result(1);
        assert!(cmds.iter().any(|c| matches!(
            c,
            RenderCommand::ScrollToLine { line: 71, flash: true, .. }
        )));
        assert_eq!(status(&cmds), Some(SearchStatus::Idle));
        assert!(!session.search().is_active());
        assert_eq!(session.raw_query(), "");
        session.finish_frame();
        assert_eq!(session.viewport().mode(), ViewMode::Paused);
        assert_eq!(session.viewport().anchor_line(), Some(71));
    }

    #[tokio::test]
    async fn test_switch_source_resets_view() {
        let mut first = NamedTempFile::new().unwrap();
        writeln!(first, "first").unwrap();
        let mut second = NamedTempFile::new().unwrap();
        writeln!(second, "second").unwrap();

        let (mut session, mut rx) = LogSession::new(
            Config::default(),
            SourceSpec::File {
                path: first.path().to_path_buf(),
            },
        );
        session.start().unwrap();
        let event = rx.recv().await.unwrap();
        session.handle(event);
        assert_eq!(session.snapshot().line(0), Some("first"));

        let cmds = session
            .switch_source(SourceSpec::File {
                path: second.path().to_path_buf(),
            })
            .unwrap();
        assert!(has_render(&cmds));
        assert_eq!(session.source_seq(), 1);
        assert!(session.snapshot().is_empty());

        // A late report from the first poller may still be queued
        while session.snapshot().is_empty() {
            let event = rx.recv().await.unwrap();
            session.handle(event);
        }
        assert_eq!(session.snapshot().line(0), Some("second"));
        assert_eq!(session.snapshot().generation(), 1);
    }

    #[tokio::test]
    async fn test_switch_to_invalid_source_keeps_current() {
        let (mut session, _rx) = session();
        let event = fetched(&session, "a");
        session.handle(event);
        let result = session.switch_source(SourceSpec::K8s {
            pod: "--all".to_string(),
            namespace: None,
            container: None,
        });
        assert!(matches!(result, Err(FetchError::InvalidSource(_))));
        assert_eq!(session.source_seq(), 0);
        assert_eq!(session.snapshot().line_count(), 1);
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let mut log = NamedTempFile::new().unwrap();
        write!(log, "one\ntwo\n").unwrap();
        let dir = TempDir::new().unwrap();
        let config = Config {
            export_dir: Some(dir.path().join("exports")),
            ..Config::default()
        };
        let (session, mut rx) = LogSession::new(
            config,
            SourceSpec::File {
                path: log.path().to_path_buf(),
            },
        );

        session.export();
        let path = match rx.recv().await.unwrap() {
            SessionEvent::Exported(result) => result.unwrap(),
            other => panic!("unexpected event: {other:?}"),
        };
        assert!(path.starts_with(dir.path().join("exports")));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_export_file_name_is_path_safe() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            export_file_name("k8s:prod/api", now),
            "k8s_prod_api-20240309-140507.log"
        );
    }
}
