//! Validation of the public entry point that does not need a live terminal.

use gridrun::{Command, RunError, RunOptions};

#[test]
fn empty_command_list_is_rejected() {
    let result = gridrun::run(Vec::new(), RunOptions::default());
    assert!(matches!(result, Err(RunError::EmptyCommands)));
}

#[test]
fn zero_columns_is_rejected() {
    let commands = vec![Command::new("true")];
    let result = gridrun::run(commands, RunOptions::default().with_columns(0));
    assert!(matches!(result, Err(RunError::InvalidColumns)));
}

#[test]
fn run_error_messages_are_stable() {
    assert_eq!(RunError::EmptyCommands.to_string(), "no commands to run");
    assert_eq!(
        RunError::InvalidColumns.to_string(),
        "columns must be at least 1"
    );
    let terminal = RunError::Terminal(std::io::Error::other("boom"));
    assert_eq!(terminal.to_string(), "terminal error: boom");
}

#[test]
fn commands_report_nothing_before_running() {
    let command = Command::shell("echo hi").label("greeter");
    assert_eq!(command.pane_label(), Some("greeter"));
    assert_eq!(command.display_command_line(), "echo hi");
    assert!(command.exit_status().is_none());
    assert!(command.error().is_none());
}

#[test]
fn options_builders_compose() {
    let options = RunOptions::default()
        .with_columns(3)
        .with_command_lines(true)
        .with_auto_quit(true)
        .with_final_view(true);
    assert_eq!(options.columns, 3);
    assert!(options.command_lines && options.auto_quit && options.final_view);
}
