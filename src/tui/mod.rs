//! # TUI Adapter
//!
//! The ratatui-specific layer. Owns the terminal, runs the single
//! synchronous event loop, and translates keyboard/mouse events into
//! state changes. This is the only module that knows about ratatui and
//! crossterm.
//!
//! ## Loop shape
//!
//! One iteration: draw if anything changed, poll crossterm with a short
//! timeout, drain every pending terminal event, then drain every pending
//! session event (per-pane bounded channels, `try_recv`) and control
//! message. All state is mutated here, on this thread, so no handler ever
//! observes a half-applied update.

pub(crate) mod dialog;
mod event;
pub(crate) mod pane;
pub(crate) mod state;
pub(crate) mod ui;

use std::io::stdout;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::SetTitle;
use log::{debug, info};
use ratatui::DefaultTerminal;
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;

use crate::RunOptions;
use crate::core::command::Command;
use crate::core::executor::{MultiExecutor, SessionEvent};
use crate::tui::dialog::DialogAction;
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};
use crate::tui::state::App;

const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Control messages from background watchers to the event loop. Session
/// output does not travel this way; each session has its own bounded
/// channel drained directly by the loop.
enum Msg {
    /// Every session worker has finished on its own.
    AllDone,
    /// `terminate_all` has returned (or hit its ceiling).
    AllTerminated,
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        execute!(stdout(), EnableMouseCapture)?;
        info!("terminal modes enabled (mouse capture)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(stdout(), DisableMouseCapture, SetTitle(""));
    }
}

/// Runs the whole interactive session. Returns the final static snapshot
/// of the grid when [`RunOptions::final_view`] asks for one.
pub(crate) fn run_tui(
    commands: &[Command],
    options: RunOptions,
    executor: Arc<MultiExecutor>,
    handle: Handle,
) -> std::io::Result<Option<String>> {
    let mut terminal = ratatui::try_init()?;
    // The terminal is already in raw mode and the alternate screen at this
    // point, so a failure here must unwind both before propagating.
    let guard = match TerminalModeGuard::new() {
        Ok(guard) => guard,
        Err(e) => {
            ratatui::restore();
            return Err(e);
        }
    };

    let mut app = App::new(commands, options, executor);
    let result = event_loop(&mut terminal, &mut app, commands, &handle);

    drop(guard);
    ratatui::restore();

    let (width, height) = result?;
    Ok(app
        .options
        .final_view
        .then(|| ui::final_view(&mut app, width, height)))
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    app: &mut App,
    commands: &[Command],
    handle: &Handle,
) -> std::io::Result<(u16, u16)> {
    let size = terminal.size()?;
    let (mut width, mut height) = (size.width, size.height);
    app.apply_layout(width, height);

    // Start every session at its initial viewport size.
    let mut receivers: Vec<Option<tokio::sync::mpsc::Receiver<SessionEvent>>> =
        Vec::with_capacity(commands.len());
    for (idx, command) in commands.iter().enumerate() {
        let (cols, rows) = (app.panes[idx].view_width, app.panes[idx].view_height);
        match Arc::clone(&app.executor).start(idx, cols, rows, command) {
            Some((resize, rx)) => {
                app.panes[idx].resize = Some(resize);
                receivers.push(Some(rx));
            }
            None => receivers.push(None),
        }
    }
    app.ready = true;
    update_title(app);

    // Channel for control messages from background watchers
    let (control_tx, control_rx) = mpsc::channel();
    {
        let executor = Arc::clone(&app.executor);
        let tx = control_tx.clone();
        handle.spawn(async move {
            executor.wait_for_all_done().await;
            let _ = tx.send(Msg::AllDone);
        });
    }

    let mut needs_redraw = true; // Force first frame

    loop {
        if needs_redraw {
            terminal.draw(|f| ui::draw_ui(f, app))?;
            needs_redraw = false;
        }

        let first_event = poll_event_timeout(POLL_TIMEOUT);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Process first event + drain ALL pending events before next draw
        for tui_event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if let TuiEvent::Resize(w, h) = tui_event {
                (width, height) = (w, h);
                app.apply_layout(w, h);
                continue;
            }

            // While terminating, input is inert; the loop only waits.
            if app.terminating {
                continue;
            }

            // An open dialog captures everything.
            if let Some(dialog) = &mut app.dialog {
                if let Some(action) = dialog.handle_event(&tui_event) {
                    app.dialog = None;
                    match action {
                        DialogAction::Terminate => begin_termination(app, handle, &control_tx),
                        DialogAction::Close => {}
                    }
                }
                continue;
            }

            match tui_event {
                TuiEvent::Quit => app.open_exit_dialog(),
                TuiEvent::CycleNext | TuiEvent::Right => {
                    app.cycle_active(true);
                    update_title(app);
                }
                TuiEvent::CyclePrev | TuiEvent::Left => {
                    app.cycle_active(false);
                    update_title(app);
                }
                TuiEvent::Click(x, y) => {
                    if app.select_at(x, y) {
                        update_title(app);
                    }
                }
                TuiEvent::ScrollUp(n) => app.active().scroll_up(n),
                TuiEvent::ScrollDown(n) => app.active().scroll_down(n),
                TuiEvent::PageUp => {
                    let page = app.active().view_height.max(1);
                    app.active().scroll_up(page);
                }
                TuiEvent::PageDown => {
                    let page = app.active().view_height.max(1);
                    app.active().scroll_down(page);
                }
                TuiEvent::ScrollTop => app.active().scroll_to_top(),
                TuiEvent::ScrollBottom => app.active().scroll_to_bottom(),
                TuiEvent::Confirm | TuiEvent::Resize(..) => {}
            }
        }

        // Drain buffered session output into the panes.
        for (idx, slot) in receivers.iter_mut().enumerate() {
            let Some(rx) = slot else { continue };
            loop {
                match rx.try_recv() {
                    Ok(session_event) => {
                        needs_redraw = true;
                        app.handle_session_event(idx, session_event);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        *slot = None;
                        break;
                    }
                }
            }
        }

        let mut should_quit = false;
        while let Ok(msg) = control_rx.try_recv() {
            needs_redraw = true;
            match msg {
                Msg::AllDone => {
                    debug!("all sessions finished");
                    // During termination the AllTerminated message decides.
                    if !app.terminating {
                        app.all_done = true;
                        if app.options.auto_quit {
                            should_quit = true;
                        } else {
                            app.open_exit_dialog();
                        }
                    }
                }
                Msg::AllTerminated => {
                    debug!("termination complete");
                    should_quit = true;
                }
            }
        }

        if should_quit {
            return Ok((width, height));
        }
    }
}

fn begin_termination(app: &mut App, handle: &Handle, tx: &mpsc::Sender<Msg>) {
    info!("termination requested");
    app.terminating = true;
    let executor = Arc::clone(&app.executor);
    let tx = tx.clone();
    handle.spawn(async move {
        executor.terminate_all().await;
        let _ = tx.send(Msg::AllTerminated);
    });
}

/// Mirrors the active pane's title into the terminal window title.
fn update_title(app: &App) {
    let _ = execute!(stdout(), SetTitle(app.active_title()));
}
