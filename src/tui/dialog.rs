//! Modal confirmation dialog: a prompt, an ordered row of buttons, and a
//! selection. State is rebuilt on every open; while a dialog is up it
//! intercepts all keyboard input.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph, Widget, Wrap};

use super::event::TuiEvent;

pub(crate) const DIALOG_WIDTH: u16 = 40;

const DIALOG_BG: Color = Color::Indexed(56); // Purple3
const PROMPT_FG: Color = Color::Indexed(255); // Grey93
const ACTIVE_BUTTON_BG: Color = Color::Indexed(168); // HotPink3
const INACTIVE_BUTTON_BG: Color = Color::Indexed(246); // Grey58

/// What a confirmed button does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialogAction {
    /// Begin the termination flow.
    Terminate,
    /// Dismiss the dialog and return to the grid.
    Close,
}

pub(crate) struct Dialog {
    pub prompt: String,
    pub buttons: Vec<(String, DialogAction)>,
    pub selected: usize,
}

impl Dialog {
    /// The exit confirmation. The prompt reflects whether everything has
    /// already finished.
    pub fn exit_confirmation(all_done: bool) -> Self {
        let prompt = if all_done {
            "All done. Quit?"
        } else {
            "Interrupt? All running commands will be gracefully terminated."
        };
        Self {
            prompt: prompt.to_string(),
            buttons: vec![
                ("Yes".to_string(), DialogAction::Terminate),
                ("No".to_string(), DialogAction::Close),
            ],
            selected: 0,
        }
    }

    /// Handles one input event, returning the action to execute, if any.
    pub fn handle_event(&mut self, event: &TuiEvent) -> Option<DialogAction> {
        let count = self.buttons.len();
        match event {
            TuiEvent::CycleNext => self.selected = (self.selected + 1) % count,
            TuiEvent::CyclePrev => self.selected = (self.selected + count - 1) % count,
            TuiEvent::Right => {
                if self.selected + 1 < count {
                    self.selected += 1;
                }
            }
            TuiEvent::Left => {
                self.selected = self.selected.saturating_sub(1);
            }
            TuiEvent::Confirm => return Some(self.buttons[self.selected].1),
            TuiEvent::Quit => return Some(DialogAction::Close),
            _ => {}
        }
        None
    }

    /// Height of the rendered dialog box.
    pub fn height(&self) -> u16 {
        // Padded prompt + blank line + button row.
        let prompt_rows = wrapped_rows(&self.prompt, DIALOG_WIDTH - 4);
        prompt_rows + 2 + 2
    }

    /// Renders the dialog into `area` (already centered and clamped by the
    /// compositor).
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let bg = Style::default().bg(DIALOG_BG);
        let prompt_style = bg.fg(PROMPT_FG);
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                buf[(x, y)].set_style(bg);
            }
        }

        let inner = area.inner(ratatui::layout::Margin {
            horizontal: 2,
            vertical: 1,
        });
        let prompt_rows = wrapped_rows(&self.prompt, inner.width);
        let prompt_area = Rect {
            height: prompt_rows.min(inner.height),
            ..inner
        };
        Paragraph::new(self.prompt.as_str())
            .style(prompt_style)
            .centered()
            .wrap(Wrap { trim: true })
            .render(prompt_area, buf);

        // Button row, centered below the prompt with one blank line.
        let mut spans: Vec<Span> = Vec::new();
        for (i, (text, _)) in self.buttons.iter().enumerate() {
            let style = if i == self.selected {
                prompt_style.bg(ACTIVE_BUTTON_BG)
            } else {
                prompt_style.bg(INACTIVE_BUTTON_BG)
            };
            spans.push(Span::styled(format!(" {text} "), style));
            if i + 1 < self.buttons.len() {
                spans.push(Span::styled(" ", bg));
            }
        }
        let button_y = prompt_area.bottom() + 1;
        if button_y < area.bottom() {
            let row = Rect {
                x: inner.x,
                y: button_y,
                width: inner.width,
                height: 1,
            };
            Paragraph::new(Line::from(spans)).centered().render(row, buf);
        }
    }
}

/// Static feedback box in the dialog's styling (the "Terminating..."
/// banner).
pub(crate) fn feedback_box(text: &str, area: Rect, buf: &mut Buffer) {
    Clear.render(area, buf);
    let style = Style::default().bg(DIALOG_BG).fg(PROMPT_FG);
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            buf[(x, y)].set_style(style);
        }
    }
    let inner = area.inner(ratatui::layout::Margin {
        horizontal: 2,
        vertical: 1,
    });
    Paragraph::new(text)
        .style(style)
        .centered()
        .wrap(Wrap { trim: true })
        .render(inner, buf);
}

/// Height of the feedback box for `text`.
pub(crate) fn feedback_height(text: &str) -> u16 {
    wrapped_rows(text, DIALOG_WIDTH - 4) + 2
}

fn wrapped_rows(text: &str, width: u16) -> u16 {
    if width == 0 {
        return 1;
    }
    textwrap::wrap(text, width as usize).len().max(1) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_cycles_and_clamps() {
        let mut d = Dialog::exit_confirmation(false);
        assert_eq!(d.selected, 0);
        d.handle_event(&TuiEvent::CycleNext);
        assert_eq!(d.selected, 1);
        d.handle_event(&TuiEvent::CycleNext);
        assert_eq!(d.selected, 0);
        d.handle_event(&TuiEvent::CyclePrev);
        assert_eq!(d.selected, 1);
        // Arrow keys clamp at the edges instead of wrapping.
        d.handle_event(&TuiEvent::Right);
        assert_eq!(d.selected, 1);
        d.handle_event(&TuiEvent::Left);
        d.handle_event(&TuiEvent::Left);
        assert_eq!(d.selected, 0);
    }

    #[test]
    fn confirm_returns_selected_action() {
        let mut d = Dialog::exit_confirmation(false);
        assert_eq!(d.handle_event(&TuiEvent::Confirm), Some(DialogAction::Terminate));
        d.handle_event(&TuiEvent::CycleNext);
        assert_eq!(d.handle_event(&TuiEvent::Confirm), Some(DialogAction::Close));
    }

    #[test]
    fn quit_key_closes() {
        let mut d = Dialog::exit_confirmation(true);
        assert_eq!(d.handle_event(&TuiEvent::Quit), Some(DialogAction::Close));
    }

    #[test]
    fn prompt_reflects_all_done() {
        assert!(Dialog::exit_confirmation(true).prompt.contains("All done"));
        assert!(Dialog::exit_confirmation(false).prompt.contains("Interrupt"));
    }
}
