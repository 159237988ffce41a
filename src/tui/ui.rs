//! # Compositor
//!
//! Pure rendering: the pane grid, the per-pane border decorations, and the
//! dialog / termination overlays. Everything draws into a `Buffer`, so the
//! same code paths back both live frames and the final static snapshot.

use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders, Widget};
use unicode_width::UnicodeWidthStr;

use crate::tui::dialog::{DIALOG_WIDTH, feedback_box, feedback_height};
use crate::tui::pane::Pane;
use crate::tui::state::App;

const ACTIVE_BORDER: Color = Color::Indexed(168); // HotPink3
const INACTIVE_BORDER: Color = Color::Indexed(241); // Grey39
const COMMAND_LINE_FG: Color = Color::Indexed(75); // SteelBlue1
const ERROR_FG: Color = Color::Indexed(196); // Red1
const EXIT_OK_FG: Color = Color::Indexed(76); // Chartreuse3

const TERMINATING_FEEDBACK: &str = "Terminating. Waiting for all commands to exit...";

/// Draws one full frame: the grid, then whichever overlay is active.
pub(crate) fn draw_ui(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    let buf = frame.buffer_mut();
    render_grid(app, buf);
    if app.terminating {
        let banner = centered(area, DIALOG_WIDTH, feedback_height(TERMINATING_FEEDBACK));
        feedback_box(TERMINATING_FEEDBACK, banner, buf);
    } else if let Some(dialog) = &app.dialog {
        dialog.render(centered(area, DIALOG_WIDTH, dialog.height()), buf);
    }
}

pub(crate) fn render_grid(app: &mut App, buf: &mut Buffer) {
    for idx in 0..app.panes.len() {
        let region = app.regions[idx];
        if region.width == 0 || region.height == 0 {
            continue;
        }
        render_pane(&mut app.panes[idx], region, idx == app.active_pane, buf);
    }
}

/// Renders the grid into an off-screen buffer and flattens it to plain
/// text, one trimmed row per line. Printed after teardown when the final
/// static view is requested.
pub(crate) fn final_view(app: &mut App, width: u16, height: u16) -> String {
    let mut buf = Buffer::empty(Rect::new(0, 0, width, height));
    render_grid(app, &mut buf);
    let mut out = String::new();
    for y in 0..height {
        let mut row = String::new();
        for x in 0..width {
            row.push_str(buf[(x, y)].symbol());
        }
        out.push_str(row.trim_end());
        out.push('\n');
    }
    out
}

fn render_pane(pane: &mut Pane, block_area: Rect, active: bool, buf: &mut Buffer) {
    let border = Style::default().fg(if active { ACTIVE_BORDER } else { INACTIVE_BORDER });
    let block = Block::new()
        .borders(Borders::RIGHT | Borders::BOTTOM)
        .border_style(border);
    let inner = block.inner(block_area);
    block.render(block_area, buf);

    let lines = content_lines(pane, inner.width);
    pane.content_height = lines.len().min(u16::MAX as usize) as u16;
    let offset = pane.scroll_offset() as usize;
    for (row, (text, style)) in lines
        .iter()
        .skip(offset)
        .take(inner.height as usize)
        .enumerate()
    {
        buf.set_stringn(
            inner.x,
            inner.y + row as u16,
            text,
            inner.width as usize,
            *style,
        );
    }

    decorate_border(pane, block_area, border, buf);
}

/// Wraps the pane's buffered content to `width` display columns. The
/// command line header, when enabled, scrolls with the content.
fn content_lines(pane: &Pane, width: u16) -> Vec<(String, Style)> {
    let mut out = Vec::new();
    if width == 0 {
        return out;
    }
    if pane.print_command_line {
        append_wrapped(
            &mut out,
            &pane.command_line,
            width,
            Style::default().fg(COMMAND_LINE_FG),
        );
    }
    for line in pane.lines.iter().chain(pane.tail.as_ref()) {
        let style = if line.error {
            Style::default().fg(ERROR_FG)
        } else {
            Style::default()
        };
        append_wrapped(&mut out, &line.text, width, style);
    }
    out
}

fn append_wrapped(out: &mut Vec<(String, Style)>, text: &str, width: u16, style: Style) {
    if text.is_empty() {
        out.push((String::new(), style));
        return;
    }
    let options = textwrap::Options::new(width as usize).break_words(true);
    for piece in textwrap::wrap(text, options) {
        out.push((piece.into_owned(), style));
    }
}

/// Status decorations drawn over the bottom border row: exit status on the
/// left, the label centered, scroll position on the right.
fn decorate_border(pane: &Pane, block_area: Rect, border: Style, buf: &mut Buffer) {
    if block_area.height == 0 || block_area.width < 2 {
        return;
    }
    let y = block_area.bottom() - 1;
    let max = block_area.width.saturating_sub(1) as usize;

    if let Some(label) = &pane.label {
        let text = format!(" {label} ");
        let text_width = text.width() as u16;
        if text_width < block_area.width {
            let x = block_area.x + (block_area.width - text_width) / 2;
            buf.set_stringn(x, y, &text, max, border);
        }
    }

    let status = if pane.errored {
        Some((" ERROR ".to_string(), Style::default().fg(ERROR_FG)))
    } else if pane.exited {
        let fg = if pane.exit_code == 0 { EXIT_OK_FG } else { ERROR_FG };
        Some((format!(" EXIT {} ", pane.exit_code), Style::default().fg(fg)))
    } else {
        None
    };
    if let Some((text, style)) = status {
        buf.set_stringn(block_area.x, y, &text, max, style);
    }

    let percent = format!(" {}% ", pane.scroll_percent());
    let percent_width = percent.width() as u16;
    if percent_width + 1 < block_area.width {
        let x = block_area.right() - 1 - percent_width;
        buf.set_stringn(x, y, &percent, max, border);
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    )
}
