//! # Pane
//!
//! Per-command UI state: the accumulated content buffer, the pending
//! unterminated tail (which carriage-return overwrites replace), the
//! scroll viewport with its stick-to-bottom flag, and the final status.
//! Mutated only by the single UI loop.

use crate::core::command::CommandError;
use crate::core::executor::ResizeHandle;
use crate::core::splitter::Terminator;

/// One buffered line of pane content. `error` lines are synthetic
/// executor-injected failures, rendered highlighted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PaneLine {
    pub text: String,
    pub error: bool,
}

pub(crate) struct Pane {
    pub command_line: String,
    pub label: Option<String>,
    /// Window title while this pane is active.
    pub title: String,
    pub print_command_line: bool,

    /// LF-terminated lines, in arrival order.
    pub lines: Vec<PaneLine>,
    /// Pending unterminated last line, kept separate so a CR-terminated
    /// overwrite can replace it wholesale.
    pub tail: Option<PaneLine>,

    /// Viewport dimensions (the pane block minus its border column/row).
    pub view_width: u16,
    pub view_height: u16,
    /// Scroll offset in wrapped display rows, ignored while pinned.
    pub scroll: u16,
    /// Auto-follow: keep the viewport pinned to the newest output until the
    /// user scrolls away from the bottom.
    pub stick_to_bottom: bool,
    /// Total wrapped content height, cached by the compositor each frame so
    /// event handling can clamp scrolling without re-wrapping.
    pub content_height: u16,

    /// Forwards viewport size changes to the session's PTY. `None` if the
    /// session was never admitted.
    pub resize: Option<ResizeHandle>,

    pub exited: bool,
    pub exit_code: u32,
    pub errored: bool,
    pub error: Option<CommandError>,
}

impl Pane {
    pub fn new(
        command_line: String,
        label: Option<String>,
        title: String,
        print_command_line: bool,
    ) -> Self {
        Self {
            command_line,
            label,
            title,
            print_command_line,
            lines: Vec::new(),
            tail: None,
            view_width: 0,
            view_height: 0,
            scroll: 0,
            stick_to_bottom: true,
            content_height: 0,
            resize: None,
            exited: false,
            exit_code: 0,
            errored: false,
            error: None,
        }
    }

    /// Applies one tokenized output line. LF flushes the pending tail and
    /// appends; CR replaces the pending tail (progress-bar overwrite);
    /// anything else is appended to the tail as a defensive fallback (and
    /// as the delivery path for synthetic error lines).
    pub fn apply_line(&mut self, text: String, terminator: Terminator, error: bool) {
        match terminator {
            Terminator::Lf => {
                self.tail = None;
                self.lines.push(PaneLine { text, error });
            }
            Terminator::Cr => {
                self.tail = Some(PaneLine { text, error });
            }
            Terminator::None => match &mut self.tail {
                Some(tail) => {
                    tail.text.push_str(&text);
                    tail.error |= error;
                }
                None => self.tail = Some(PaneLine { text, error }),
            },
        }
    }

    /// Records the session's terminal outcome.
    pub fn record_exit(
        &mut self,
        exited: bool,
        exit_code: u32,
        errored: bool,
        error: Option<CommandError>,
    ) {
        self.exited = exited;
        self.exit_code = exit_code;
        self.errored = errored;
        self.error = error;
    }

    /// New geometry from a layout pass. The viewport is reset to follow the
    /// bottom, matching a fresh view over re-wrapped content.
    pub fn set_geometry(&mut self, view_width: u16, view_height: u16) {
        self.view_width = view_width;
        self.view_height = view_height;
        self.scroll = 0;
        self.stick_to_bottom = true;
    }

    pub fn live(&self) -> bool {
        !self.exited && !self.errored
    }

    pub fn max_scroll(&self) -> u16 {
        self.content_height.saturating_sub(self.view_height)
    }

    /// Effective scroll offset for rendering: the bottom while pinned, the
    /// clamped user offset otherwise.
    pub fn scroll_offset(&self) -> u16 {
        if self.stick_to_bottom {
            self.max_scroll()
        } else {
            self.scroll.min(self.max_scroll())
        }
    }

    pub fn scroll_up(&mut self, n: u16) {
        self.scroll = self.scroll_offset().saturating_sub(n);
        self.stick_to_bottom = false;
    }

    pub fn scroll_down(&mut self, n: u16) {
        let target = self.scroll_offset().saturating_add(n);
        if target >= self.max_scroll() {
            self.scroll_to_bottom();
        } else {
            self.scroll = target;
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = 0;
        self.stick_to_bottom = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
        self.stick_to_bottom = true;
    }

    /// Scroll percentage for the bottom-right overlay.
    pub fn scroll_percent(&self) -> u16 {
        let max = self.max_scroll();
        if max == 0 {
            100
        } else {
            (u32::from(self.scroll_offset()) * 100 / u32::from(max)) as u16
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane() -> Pane {
        Pane::new("cmd".into(), None, "cmd".into(), false)
    }

    #[test]
    fn lf_appends_and_clears_tail() {
        let mut p = pane();
        p.apply_line("one".into(), Terminator::Lf, false);
        p.apply_line("two".into(), Terminator::Lf, false);
        assert_eq!(p.lines.len(), 2);
        assert!(p.tail.is_none());
    }

    #[test]
    fn cr_overwrite_is_superseded_by_lf_line() {
        // "abc\r" then "def\n" across two reads: the CR line was a
        // transient overwrite, fully replaced by the LF line.
        let mut p = pane();
        p.apply_line("abc".into(), Terminator::Cr, false);
        assert_eq!(p.tail.as_ref().map(|t| t.text.as_str()), Some("abc"));
        p.apply_line("def".into(), Terminator::Lf, false);
        assert_eq!(p.lines.last().map(|l| l.text.as_str()), Some("def"));
        assert!(p.tail.is_none());
    }

    #[test]
    fn cr_replaces_previous_cr_tail() {
        let mut p = pane();
        p.apply_line("10%".into(), Terminator::Cr, false);
        p.apply_line("90%".into(), Terminator::Cr, false);
        assert_eq!(p.tail.as_ref().map(|t| t.text.as_str()), Some("90%"));
        assert!(p.lines.is_empty());
    }

    #[test]
    fn unterminated_line_appends_to_tail() {
        let mut p = pane();
        p.apply_line("par".into(), Terminator::None, false);
        p.apply_line("tial".into(), Terminator::None, false);
        assert_eq!(p.tail.as_ref().map(|t| t.text.as_str()), Some("partial"));
    }

    #[test]
    fn error_line_lands_highlighted_in_tail() {
        let mut p = pane();
        p.apply_line("failed to start: no such file".into(), Terminator::None, true);
        assert!(p.tail.as_ref().is_some_and(|t| t.error));
    }

    #[test]
    fn pinned_pane_follows_new_output() {
        let mut p = pane();
        p.set_geometry(40, 5);
        p.content_height = 20;
        assert!(p.stick_to_bottom);
        assert_eq!(p.scroll_offset(), 15);
        p.content_height = 30;
        assert_eq!(p.scroll_offset(), 25);
    }

    #[test]
    fn scrolled_away_pane_does_not_move() {
        let mut p = pane();
        p.set_geometry(40, 5);
        p.content_height = 20;
        p.scroll_up(10);
        assert!(!p.stick_to_bottom);
        assert_eq!(p.scroll_offset(), 5);
        // More output arrives; the viewport stays put.
        p.content_height = 40;
        assert_eq!(p.scroll_offset(), 5);
    }

    #[test]
    fn scrolling_to_bottom_re_pins() {
        let mut p = pane();
        p.set_geometry(40, 5);
        p.content_height = 20;
        p.scroll_up(3);
        assert!(!p.stick_to_bottom);
        p.scroll_down(5);
        assert!(p.stick_to_bottom);
    }

    #[test]
    fn scroll_percent_saturates() {
        let mut p = pane();
        p.set_geometry(40, 10);
        p.content_height = 5;
        assert_eq!(p.scroll_percent(), 100);
        p.content_height = 30;
        p.scroll_to_top();
        assert_eq!(p.scroll_percent(), 0);
        p.scroll_to_bottom();
        assert_eq!(p.scroll_percent(), 100);
    }
}
