use std::time::{Duration, Instant};

/// Coalesces rapid query edits into one committed term.
///
/// The raw term updates on every keystroke; it is only promoted to the committed term
/// after `delay` without further edits. Clearing is immediate.
#[derive(Debug)]
pub struct InputDebouncer {
    raw: String,
    committed: String,
    delay: Duration,
    last_edit: Option<Instant>,
}

impl InputDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            raw: String::new(),
            committed: String::new(),
            delay,
            last_edit: None,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    /// Whether an edit is waiting for the quiet period to pass
    pub fn is_pending(&self) -> bool {
        self.last_edit.is_some()
    }

    /// When the pending edit will be committed
    pub fn deadline(&self) -> Option<Instant> {
        self.last_edit.map(|at| at + self.delay)
    }

    /// Record an edit. An empty term clears synchronously; returns whether that
    /// cleared anything.
    pub fn edit(&mut self, raw: &str, now: Instant) -> bool {
        if raw.is_empty() {
            return self.clear();
        }
        if raw == self.raw && self.last_edit.is_none() {
            return false;
        }
        self.raw = raw.to_string();
        self.last_edit = Some(now);
        false
    }

    /// Commit the raw term if the quiet period has passed, returning the new committed term
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        let last_edit = self.last_edit?;
        if now.duration_since(last_edit) < self.delay {
            return None;
        }
        self.last_edit = None;
        if self.raw == self.committed {
            return None;
        }
        self.committed = self.raw.clone();
        Some(self.committed.clone())
    }

    /// Clear both terms. Returns whether there was something to clear.
    pub fn clear(&mut self) -> bool {
        let had_state = !self.raw.is_empty() || !self.committed.is_empty();
        self.raw.clear();
        self.committed.clear();
        self.last_edit = None;
        had_state
    }
}
