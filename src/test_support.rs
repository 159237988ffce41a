//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::OnceLock;

use tokio::runtime::Runtime;

use crate::RunOptions;
use crate::core::command::Command;
use crate::core::executor::MultiExecutor;
use crate::tui::state::App;

/// A shared runtime so synchronous UI tests can build executors without
/// each spinning one up.
pub fn test_runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| Runtime::new().expect("test runtime"))
}

/// Creates an App over `count` placeholder commands in a `columns`-wide
/// grid, with no sessions started.
pub fn test_app(count: usize, columns: usize) -> App {
    let commands: Vec<Command> = (0..count)
        .map(|i| Command::new("echo").arg(i.to_string()).label(format!("cmd{i}")))
        .collect();
    let options = RunOptions::default().with_columns(columns);
    let executor = MultiExecutor::new(test_runtime().handle().clone());
    App::new(&commands, options, executor)
}
