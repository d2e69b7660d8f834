//! The log buffer: the latest fetched text, split into lines.
//!
//! Every fetch replaces the snapshot wholesale; readers (the renderer, an in-flight
//! scan) hold an `Arc<BufferSnapshot>` that never changes underneath them.
//!
//! Line numbers are absolute within a generation. Only the newest `max_lines` lines are
//! retained, so `first_line` moves forward as old lines are evicted, but a given line
//! keeps its number.

use std::sync::Arc;

use tracing::debug;

/// An immutable view of the buffer at one point in time
#[derive(Debug, Default)]
pub struct BufferSnapshot {
    generation: u64,
    first_line: usize,
    lines: Vec<String>,
}

impl BufferSnapshot {
    fn empty(generation: u64) -> Self {
        Self {
            generation,
            first_line: 0,
            lines: Vec::new(),
        }
    }

    fn from_text(generation: u64, text: &str, total: usize, max_lines: usize) -> Self {
        let first_line = total.saturating_sub(max_lines);
        let lines = text.lines().skip(first_line).map(str::to_owned).collect();
        Self {
            generation,
            first_line,
            lines,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Absolute number of the oldest retained line
    pub fn first_line(&self) -> usize {
        self.first_line
    }

    /// Total number of lines seen in this generation (retained or evicted)
    pub fn line_count(&self) -> usize {
        self.first_line + self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Get a retained line by absolute number
    pub fn line(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(self.first_line)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    /// Retained lines from `start` (absolute, clamped) to the end, with their numbers
    pub fn lines_from(&self, start: usize) -> impl Iterator<Item = (usize, &str)> {
        let skip = start.saturating_sub(self.first_line).min(self.lines.len());
        self.lines[skip..]
            .iter()
            .enumerate()
            .map(move |(i, line)| (self.first_line + skip + i, line.as_str()))
    }

    /// The retained text, newline-joined
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// What a fetch did to the buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUpdate {
    /// Same line count and same last line; the snapshot was kept
    Unchanged,
    /// Lines were appended (or the unterminated last line grew)
    Appended { previous_count: usize },
    /// The text shrank, so a new generation was started
    Reset { generation: u64 },
}

/// Owner of the current snapshot for one log view
pub struct LogBuffer {
    snapshot: Arc<BufferSnapshot>,
    max_lines: usize,
}

impl LogBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            snapshot: Arc::new(BufferSnapshot::empty(0)),
            max_lines: max_lines.max(1),
        }
    }

    pub fn snapshot(&self) -> Arc<BufferSnapshot> {
        Arc::clone(&self.snapshot)
    }

    pub fn generation(&self) -> u64 {
        self.snapshot.generation
    }

    pub fn line_count(&self) -> usize {
        self.snapshot.line_count()
    }

    /// Start a new, empty generation (source switch or explicit reset)
    pub fn reset(&mut self) -> u64 {
        let generation = self.snapshot.generation + 1;
        debug!(generation, "log buffer reset");
        self.snapshot = Arc::new(BufferSnapshot::empty(generation));
        generation
    }

    /// Replace the snapshot with freshly fetched text
    pub fn apply_fetch(&mut self, text: &str) -> BufferUpdate {
        let total = text.lines().count();
        let previous_count = self.snapshot.line_count();

        if total < previous_count {
            let generation = self.snapshot.generation + 1;
            debug!(
                generation,
                previous_count, total, "log text shrank, starting new generation"
            );
            self.snapshot = Arc::new(BufferSnapshot::from_text(
                generation,
                text,
                total,
                self.max_lines,
            ));
            return BufferUpdate::Reset { generation };
        }

        if total == previous_count && text.lines().last() == self.last_line() {
            return BufferUpdate::Unchanged;
        }

        self.snapshot = Arc::new(BufferSnapshot::from_text(
            self.snapshot.generation,
            text,
            total,
            self.max_lines,
        ));
        BufferUpdate::Appended { previous_count }
    }

    fn last_line(&self) -> Option<&str> {
        self.snapshot.lines.last().map(String::as_str)
    }
}
