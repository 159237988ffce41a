//! # Controller State
//!
//! All UI and aggregate-view state for one run, owned and mutated by the
//! single event loop in `tui::mod`. Every message is handled to completion
//! before the next is considered, so nothing here needs locking.
//!
//! The run moves through a small state machine:
//!
//! ```text
//! Initializing ──first layout──▶ Running ◀──▶ ExitDialogOpen
//!                                  │                │ Yes
//!                                  │ all done       ▼
//!                                  └──────▶ Terminating ──▶ Done
//! ```

use std::sync::Arc;

use ratatui::layout::Rect;

use crate::RunOptions;
use crate::core::command::Command;
use crate::core::executor::{MultiExecutor, SessionEvent};
use crate::tui::dialog::Dialog;
use crate::tui::pane::Pane;

/// Geometry of one pane: its full block (including the right/bottom
/// border) and the viewport inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PaneGeometry {
    pub block: Rect,
    pub view_width: u16,
    pub view_height: u16,
}

/// Partitions `width`×`height` into a `rows`×`cols` grid, row-major, with
/// the remainder columns/rows going to the first few. Each pane keeps one
/// column/row for its border, the rest is viewport.
pub(crate) fn grid_layout(
    width: u16,
    height: u16,
    rows: usize,
    cols: usize,
    count: usize,
) -> Vec<PaneGeometry> {
    // Grid dimensions beyond the u16 cell space degenerate to zero-size
    // panes; a plain cast would wrap the divisor to zero.
    let cols_u16 = u16::try_from(cols).unwrap_or(u16::MAX).max(1);
    let rows_u16 = u16::try_from(rows).unwrap_or(u16::MAX).max(1);
    let base_w = width / cols_u16;
    let rem_w = width % cols_u16;
    let base_h = height / rows_u16;
    let rem_h = height % rows_u16;

    let mut geometries = Vec::with_capacity(count);
    let mut y = 0u16;
    for row in 0..rows {
        let block_h = base_h + u16::from((row as u16) < rem_h);
        let mut x = 0u16;
        for col in 0..cols {
            let idx = row * cols + col;
            if idx >= count {
                break;
            }
            let block_w = base_w + u16::from((col as u16) < rem_w);
            geometries.push(PaneGeometry {
                block: Rect::new(x, y, block_w, block_h),
                view_width: block_w.saturating_sub(1),
                view_height: block_h.saturating_sub(1),
            });
            x += block_w;
        }
        y += block_h;
    }
    geometries
}

pub(crate) struct App {
    pub executor: Arc<MultiExecutor>,
    pub options: RunOptions,
    pub panes: Vec<Pane>,
    pub rows: usize,
    pub cols: usize,
    pub active_pane: usize,
    /// Set after the first layout has started every session.
    pub ready: bool,
    pub all_done: bool,
    pub terminating: bool,
    pub dialog: Option<Dialog>,
    /// Pane block rects from the last layout; hit testing and rendering
    /// share these.
    pub regions: Vec<Rect>,
}

impl App {
    pub fn new(commands: &[Command], options: RunOptions, executor: Arc<MultiExecutor>) -> Self {
        let count = commands.len();
        let cols = options.columns;
        let rows = count.div_ceil(cols);
        let panes = commands
            .iter()
            .map(|c| {
                Pane::new(
                    c.display_command_line(),
                    c.pane_label().map(String::from),
                    c.title(),
                    options.command_lines,
                )
            })
            .collect();
        Self {
            executor,
            options,
            panes,
            rows,
            cols,
            active_pane: 0,
            ready: false,
            all_done: false,
            terminating: false,
            dialog: None,
            regions: vec![Rect::ZERO; count],
        }
    }

    /// Applies a (re)computed layout: stores the pane regions, updates each
    /// pane's viewport, and forwards the new PTY size to live sessions.
    pub fn apply_layout(&mut self, width: u16, height: u16) {
        let geometries = grid_layout(width, height, self.rows, self.cols, self.panes.len());
        for (idx, geometry) in geometries.iter().enumerate() {
            self.regions[idx] = geometry.block;
            let pane = &mut self.panes[idx];
            pane.set_geometry(geometry.view_width, geometry.view_height);
            if self.ready
                && pane.live()
                && let Some(resize) = &pane.resize
            {
                resize.resize(geometry.view_width, geometry.view_height);
            }
        }
    }

    /// Applies one session event to its pane, preserving the viewport's
    /// pin-to-bottom state (a pane the user scrolled away from does not
    /// move; a pinned pane follows).
    pub fn handle_session_event(&mut self, pane_idx: usize, event: SessionEvent) {
        let pane = &mut self.panes[pane_idx];
        match event {
            SessionEvent::Line {
                text,
                terminator,
                error,
            } => pane.apply_line(text, terminator, error),
            SessionEvent::Exit {
                exited,
                exit_code,
                errored,
                error,
            } => pane.record_exit(exited, exit_code, errored, error),
        }
    }

    pub fn cycle_active(&mut self, forward: bool) {
        let count = self.panes.len();
        self.active_pane = if forward {
            (self.active_pane + 1) % count
        } else {
            (self.active_pane + count - 1) % count
        };
    }

    /// Hit test: selects the pane whose block contains (x, y), if any.
    pub fn select_at(&mut self, x: u16, y: u16) -> bool {
        let position = ratatui::layout::Position::new(x, y);
        for (idx, region) in self.regions.iter().enumerate() {
            if region.contains(position) {
                self.active_pane = idx;
                return true;
            }
        }
        false
    }

    pub fn active(&mut self) -> &mut Pane {
        &mut self.panes[self.active_pane]
    }

    pub fn active_title(&self) -> &str {
        &self.panes[self.active_pane].title
    }

    pub fn open_exit_dialog(&mut self) {
        self.dialog = Some(Dialog::exit_confirmation(self.all_done));
    }
}
