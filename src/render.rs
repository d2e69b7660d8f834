use std::sync::Arc;

use crate::buffer::BufferSnapshot;
use crate::search::SearchStatus;
use crate::search::window::SearchResults;

/// Instructions from the engine to whatever draws the log view
#[derive(Clone, Debug)]
pub enum RenderCommand {
    /// Replace the displayed text
    Render { snapshot: Arc<BufferSnapshot> },
    /// Bring `line` into view with `top` as the first visible line
    ScrollToLine { line: usize, top: usize, flash: bool },
    /// "N new lines" affordance while paused
    SetUnseenBadge(usize),
    SetSearchResults(SearchResults),
    SetSearchStatus(SearchStatus),
}
