//! Run several commands concurrently, each on its own PTY, with live
//! output in a grid of scrollable terminal panes.
//!
//! ```no_run
//! use gridrun::{Command, RunOptions, run};
//!
//! let commands = vec![
//!     Command::new("cargo").args(["build", "--release"]).label("build"),
//!     Command::shell("sleep 2 && echo done"),
//! ];
//! let outcome = run(commands, RunOptions::default())?;
//! for command in &outcome.commands {
//!     println!("{}: {:?}", command.display_command_line(), command.exit_status());
//! }
//! # Ok::<(), gridrun::RunError>(())
//! ```

use std::fmt;
use std::sync::Arc;

pub mod core;
mod tui;

#[cfg(test)]
pub(crate) mod test_support;

pub use crate::core::command::{Command, CommandError};
pub use portable_pty::ExitStatus;

use crate::core::executor::MultiExecutor;

/// Presentation and lifecycle options for one [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Grid width in panes. Rows are added as needed.
    pub columns: usize,
    /// Print each command line at the top of its pane.
    pub command_lines: bool,
    /// Leave the UI as soon as every command has finished, instead of
    /// waiting for the user to quit.
    pub auto_quit: bool,
    /// After teardown, print a static snapshot of the final grid.
    pub final_view: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            columns: 1,
            command_lines: false,
            auto_quit: false,
            final_view: false,
        }
    }
}

impl RunOptions {
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_command_lines(mut self, on: bool) -> Self {
        self.command_lines = on;
        self
    }

    pub fn with_auto_quit(mut self, on: bool) -> Self {
        self.auto_quit = on;
        self
    }

    pub fn with_final_view(mut self, on: bool) -> Self {
        self.final_view = on;
        self
    }
}

/// What a finished [`run`] leaves behind: the commands, with their
/// per-command results filled in, and the overall verdict.
#[derive(Debug)]
pub struct RunOutcome {
    pub commands: Vec<Command>,
    /// True iff every command ran to completion and exited 0.
    pub all_successful: bool,
}

#[derive(Debug)]
pub enum RunError {
    /// [`run`] was called with an empty command list.
    EmptyCommands,
    /// [`RunOptions::columns`] was zero.
    InvalidColumns,
    /// Terminal setup, drawing, or teardown failed.
    Terminal(std::io::Error),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::EmptyCommands => write!(f, "no commands to run"),
            RunError::InvalidColumns => write!(f, "columns must be at least 1"),
            RunError::Terminal(e) => write!(f, "terminal error: {e}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Terminal(e) => Some(e),
            _ => None,
        }
    }
}

/// Runs every command concurrently and shows their output in the grid UI
/// until the user quits (or, with [`RunOptions::auto_quit`], until every
/// command has finished). Blocks the calling thread for the whole session.
pub fn run(commands: Vec<Command>, options: RunOptions) -> Result<RunOutcome, RunError> {
    if commands.is_empty() {
        return Err(RunError::EmptyCommands);
    }
    if options.columns == 0 {
        return Err(RunError::InvalidColumns);
    }

    let runtime = tokio::runtime::Runtime::new().map_err(RunError::Terminal)?;
    let executor = MultiExecutor::new(runtime.handle().clone());

    let snapshot = tui::run_tui(
        &commands,
        options,
        Arc::clone(&executor),
        runtime.handle().clone(),
    )
    .map_err(RunError::Terminal)?;

    let all_successful = executor.all_successful();
    if let Some(text) = snapshot {
        print!("{text}");
    }

    Ok(RunOutcome {
        commands,
        all_successful,
    })
}
