use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseEventKind};

/// Mouse wheel scroll step, in rows.
const WHEEL_STEP: u16 = 3;

/// TUI-specific input events. Translation from raw crossterm events is
/// context-free; the loop (or the dialog, when open) decides what each
/// event means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TuiEvent {
    /// q, esc or ctrl+c: quit intent (opens the dialog, or closes it).
    Quit,
    /// tab / shift+tab: cycle active pane, or dialog selection.
    CycleNext,
    CyclePrev,
    /// Arrow keys, used by the dialog.
    Left,
    Right,
    /// Enter.
    Confirm,
    /// Viewport movement for the active pane.
    ScrollUp(u16),
    ScrollDown(u16),
    PageUp,
    PageDown,
    ScrollTop,
    ScrollBottom,
    /// Left-button release at (column, row): pane selection.
    Click(u16, u16),
    /// Terminal was resized.
    Resize(u16, u16),
}

/// Poll for an event with a timeout.
pub(crate) fn poll_event_timeout(timeout: Duration) -> Option<TuiEvent> {
    if !event::poll(timeout).ok()? {
        return None;
    }
    translate(event::read().ok()?)
}

/// Poll for an event without blocking.
pub(crate) fn poll_event_immediate() -> Option<TuiEvent> {
    poll_event_timeout(Duration::ZERO)
}

fn translate(event: Event) -> Option<TuiEvent> {
    match event {
        Event::Key(key) => {
            if key.kind != KeyEventKind::Press {
                return None;
            }
            match (key.modifiers, key.code) {
                (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(TuiEvent::Quit),
                (_, KeyCode::Char('q')) | (_, KeyCode::Esc) => Some(TuiEvent::Quit),
                (_, KeyCode::BackTab) => Some(TuiEvent::CyclePrev),
                (_, KeyCode::Tab) => Some(TuiEvent::CycleNext),
                (_, KeyCode::Enter) => Some(TuiEvent::Confirm),
                (_, KeyCode::Left) => Some(TuiEvent::Left),
                (_, KeyCode::Right) => Some(TuiEvent::Right),
                (_, KeyCode::Up) => Some(TuiEvent::ScrollUp(1)),
                (_, KeyCode::Down) => Some(TuiEvent::ScrollDown(1)),
                (_, KeyCode::PageUp) => Some(TuiEvent::PageUp),
                (_, KeyCode::PageDown) => Some(TuiEvent::PageDown),
                (_, KeyCode::Home) => Some(TuiEvent::ScrollTop),
                (_, KeyCode::End) => Some(TuiEvent::ScrollBottom),
                _ => None,
            }
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Up(event::MouseButton::Left) => {
                Some(TuiEvent::Click(mouse.column, mouse.row))
            }
            MouseEventKind::ScrollUp => Some(TuiEvent::ScrollUp(WHEEL_STEP)),
            MouseEventKind::ScrollDown => Some(TuiEvent::ScrollDown(WHEEL_STEP)),
            _ => None,
        },
        Event::Resize(width, height) => Some(TuiEvent::Resize(width, height)),
        _ => None,
    }
}
