//! Tail/pause/jump state machine for the log view.
//!
//! The coordinator decides, on every buffer update and scroll, whether the renderer
//! should follow new output or hold the reader's position. It owns the scroll offset
//! and remembers which snapshot was last pushed to the renderer, which is how it knows
//! how many lines the reader hasn't seen.

use std::sync::Arc;

use tracing::trace;

use crate::buffer::BufferSnapshot;
use crate::render::RenderCommand;

/// Where a programmatic jump settles once it has been drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resume {
    Tailing,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    /// Follow new output
    Tailing,
    /// Hold position; count unseen lines
    Paused,
    /// A programmatic scroll is in progress; user scroll events are ignored until the
    /// next frame resolves it
    Jumping { target: usize, resume: Resume },
}

pub struct ViewportCoordinator {
    mode: ViewMode,
    /// Snapshot currently shown by the renderer
    rendered: Arc<BufferSnapshot>,
    /// Where the reader was while paused
    anchor_line: Option<usize>,
    top_line: usize,
    height: usize,
    near_bottom: usize,
    selection_active: bool,
    /// A tailing render was skipped because of a selection
    render_held: bool,
}

impl ViewportCoordinator {
    pub fn new(near_bottom: usize) -> Self {
        Self {
            mode: ViewMode::Tailing,
            rendered: Arc::new(BufferSnapshot::default()),
            anchor_line: None,
            top_line: 0,
            height: 1,
            near_bottom,
            selection_active: false,
            render_held: false,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn is_tailing(&self) -> bool {
        self.mode == ViewMode::Tailing
    }

    pub fn top_line(&self) -> usize {
        self.top_line
    }

    pub fn anchor_line(&self) -> Option<usize> {
        self.anchor_line
    }

    pub fn selection_active(&self) -> bool {
        self.selection_active
    }

    pub fn last_rendered_line_count(&self) -> usize {
        self.rendered.line_count()
    }

    /// Lines in `latest` that have not been pushed to the renderer
    pub fn unseen_count(&self, latest: &BufferSnapshot) -> usize {
        if latest.generation() != self.rendered.generation() {
            return latest.line_count();
        }
        latest.line_count().saturating_sub(self.rendered.line_count())
    }

    fn max_top(&self) -> usize {
        self.rendered
            .line_count()
            .saturating_sub(self.height)
            .max(self.rendered.first_line())
    }

    fn clamp_top(&self, top: usize) -> usize {
        top.clamp(self.rendered.first_line(), self.max_top())
    }

    fn is_near_bottom(&self, top: usize) -> bool {
        top + self.near_bottom >= self.max_top()
    }

    fn render(&mut self, snapshot: &Arc<BufferSnapshot>, cmds: &mut Vec<RenderCommand>) {
        self.rendered = Arc::clone(snapshot);
        self.render_held = false;
        cmds.push(RenderCommand::Render {
            snapshot: Arc::clone(snapshot),
        });
    }

    fn scroll(&mut self, line: usize, top: usize, flash: bool, cmds: &mut Vec<RenderCommand>) {
        self.top_line = top;
        cmds.push(RenderCommand::ScrollToLine { line, top, flash });
    }

    fn follow_bottom(&mut self, cmds: &mut Vec<RenderCommand>) {
        let last = self.rendered.line_count().saturating_sub(1);
        let top = self.max_top();
        self.scroll(last, top, false, cmds);
    }

    fn badge(&self, latest: &BufferSnapshot, cmds: &mut Vec<RenderCommand>) {
        cmds.push(RenderCommand::SetUnseenBadge(self.unseen_count(latest)));
    }

    /// React to a new buffer snapshot
    pub fn on_buffer_update(&mut self, latest: &Arc<BufferSnapshot>) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        let reset = latest.generation() != self.rendered.generation()
            || latest.line_count() < self.rendered.line_count();

        match self.mode {
            ViewMode::Tailing if self.selection_active && !reset => {
                trace!("selection active, holding tail render");
                self.render_held = true;
            }
            ViewMode::Tailing => {
                // A reset invalidates whatever was selected
                self.selection_active = false;
                self.render(latest, &mut cmds);
                self.follow_bottom(&mut cmds);
            }
            ViewMode::Paused | ViewMode::Jumping { .. } => {
                if reset {
                    self.render(latest, &mut cmds);
                    let top = self.clamp_top(self.anchor_line.unwrap_or(self.top_line));
                    self.scroll(top, top, false, &mut cmds);
                }
            }
        }

        self.badge(latest, &mut cmds);
        cmds
    }

    /// A user-initiated scroll by `delta` lines
    pub fn scroll_by(&mut self, delta: isize, latest: &Arc<BufferSnapshot>) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        if matches!(self.mode, ViewMode::Jumping { .. }) {
            return cmds;
        }

        let top = self.clamp_top(self.top_line.saturating_add_signed(delta));
        match self.mode {
            ViewMode::Tailing => {
                if !self.is_near_bottom(top) {
                    self.mode = ViewMode::Paused;
                    self.anchor_line = Some(top);
                }
                self.scroll(top, top, false, &mut cmds);
            }
            ViewMode::Paused if delta > 0 && self.is_near_bottom(top) => {
                self.mode = ViewMode::Tailing;
                self.anchor_line = None;
                if self.selection_active {
                    self.scroll(top, top, false, &mut cmds);
                } else {
                    if !Arc::ptr_eq(&self.rendered, latest) {
                        self.render(latest, &mut cmds);
                    }
                    self.follow_bottom(&mut cmds);
                }
                self.badge(latest, &mut cmds);
            }
            _ => {
                self.anchor_line = Some(top);
                self.scroll(top, top, false, &mut cmds);
            }
        }
        cmds
    }

    /// Scroll to the oldest retained line (pauses)
    pub fn scroll_to_top(&mut self) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        if matches!(self.mode, ViewMode::Jumping { .. }) {
            return cmds;
        }
        let top = self.rendered.first_line();
        self.mode = ViewMode::Paused;
        self.anchor_line = Some(top);
        self.scroll(top, top, false, &mut cmds);
        cmds
    }

    /// Explicit "jump to latest": re-render and go back to tailing
    pub fn jump_to_latest(&mut self, latest: &Arc<BufferSnapshot>) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        self.selection_active = false;
        self.anchor_line = None;
        self.mode = ViewMode::Jumping {
            target: latest.line_count().saturating_sub(1),
            resume: Resume::Tailing,
        };
        self.render(latest, &mut cmds);
        self.follow_bottom(&mut cmds);
        self.badge(latest, &mut cmds);
        cmds
    }

    /// Programmatic scroll to a line (search navigation, opening a result)
    pub fn jump_to_line(
        &mut self,
        line: usize,
        flash: bool,
        latest: &Arc<BufferSnapshot>,
    ) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        let not_rendered = latest.generation() != self.rendered.generation()
            || line >= self.rendered.line_count()
            || line < self.rendered.first_line();
        if not_rendered {
            self.render(latest, &mut cmds);
        }

        self.mode = ViewMode::Jumping {
            target: line,
            resume: Resume::Paused,
        };
        self.anchor_line = Some(line);
        let top = self.clamp_top(line.saturating_sub(self.height / 2));
        self.scroll(line, top, flash, &mut cmds);
        self.badge(latest, &mut cmds);
        cmds
    }

    /// Resolve a pending jump; the host calls this after each drawn frame
    pub fn finish_jump(&mut self, latest: &Arc<BufferSnapshot>) -> Vec<RenderCommand> {
        let ViewMode::Jumping { resume, .. } = self.mode else {
            return Vec::new();
        };
        match resume {
            Resume::Paused => {
                self.mode = ViewMode::Paused;
                Vec::new()
            }
            Resume::Tailing => {
                self.mode = ViewMode::Tailing;
                if Arc::ptr_eq(&self.rendered, latest) {
                    Vec::new()
                } else {
                    self.on_buffer_update(latest)
                }
            }
        }
    }

    /// Search results are shown paused so navigation doesn't fight the tail
    pub fn enter_search(&mut self) {
        if self.mode == ViewMode::Tailing {
            self.mode = ViewMode::Paused;
            self.anchor_line = Some(self.top_line);
        }
    }

    pub fn set_selection_active(
        &mut self,
        active: bool,
        latest: &Arc<BufferSnapshot>,
    ) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        self.selection_active = active;
        if !active && self.render_held && self.mode == ViewMode::Tailing {
            self.render(latest, &mut cmds);
            self.follow_bottom(&mut cmds);
            self.badge(latest, &mut cmds);
        }
        cmds
    }

    pub fn set_height(&mut self, height: usize) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        let height = height.max(1);
        if height == self.height {
            return cmds;
        }
        self.height = height;
        if self.mode == ViewMode::Tailing {
            self.follow_bottom(&mut cmds);
        } else {
            let top = self.clamp_top(self.top_line);
            if top != self.top_line {
                self.scroll(top, top, false, &mut cmds);
            }
        }
        cmds
    }

    /// Source switch: start over, tailing an empty buffer
    pub fn reset(&mut self, latest: &Arc<BufferSnapshot>) -> Vec<RenderCommand> {
        let mut cmds = Vec::new();
        self.mode = ViewMode::Tailing;
        self.anchor_line = None;
        self.selection_active = false;
        self.render(latest, &mut cmds);
        self.follow_bottom(&mut cmds);
        self.badge(latest, &mut cmds);
        cmds
    }
}
