//! # Command
//!
//! Passive descriptor of one unit of work: what to run, how to present it,
//! and — once the run is over — how it went. A `Command` is built by the
//! caller, handed to [`run`](crate::run), and returned with its result
//! fields filled in. The executor and the pane only ever hold a cheap
//! handle to the shared result slot, never the `Command` itself.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use portable_pty::{CommandBuilder, ExitStatus};

/// How the process is specified: an explicit program invocation, or a
/// command line handed to the system shell.
#[derive(Debug, Clone)]
pub(crate) enum CommandSpec {
    Program { program: String, args: Vec<String> },
    Shell(String),
}

/// Error from running a single command. Never fatal to the run as a whole;
/// inspect per command via [`Command::error`] after [`run`](crate::run).
#[derive(Debug, Clone)]
pub enum CommandError {
    /// The process could not be started (bad executable, PTY failure).
    Spawn(String),
    /// The process exited with a non-zero (or abnormal) status.
    Exit(u32),
    /// Waiting on the process failed at the OS level.
    Wait(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Spawn(msg) => write!(f, "failed to start: {msg}"),
            CommandError::Exit(code) => write!(f, "exit status {code}"),
            CommandError::Wait(msg) => write!(f, "wait failed: {msg}"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Terminal outcome of one command, written by the executor.
#[derive(Debug, Default)]
pub(crate) struct CommandResult {
    /// Set when the session worker has fully finished (including the
    /// early return taken on termination).
    pub done: bool,
    pub exit_status: Option<ExitStatus>,
    pub error: Option<CommandError>,
}

/// Shared handle to a command's result slot. Cloned into the session worker
/// and the termination path; the `Command` itself stays with the caller.
pub(crate) type ResultHandle = Arc<Mutex<CommandResult>>;

/// One unit of work to be run in its own pane.
///
/// ```no_run
/// use gridrun::Command;
///
/// let build = Command::new("cargo").args(["build", "--release"]).label("build");
/// let logs = Command::shell("tail -f app.log | grep --line-buffered ERROR")
///     .label("app.log");
/// ```
pub struct Command {
    spec: CommandSpec,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    label: Option<String>,
    command_line: Option<String>,
    result: ResultHandle,
}

impl Command {
    /// Creates a command that runs `program` directly (no shell).
    pub fn new(program: impl Into<String>) -> Self {
        Self::from_spec(CommandSpec::Program {
            program: program.into(),
            args: Vec::new(),
        })
    }

    /// Creates a command that runs `line` through the system shell
    /// (`sh -c` on unix). The display command line defaults to `line`
    /// itself rather than the shell invocation.
    pub fn shell(line: impl Into<String>) -> Self {
        Self::from_spec(CommandSpec::Shell(line.into()))
    }

    fn from_spec(spec: CommandSpec) -> Self {
        Self {
            spec,
            env: Vec::new(),
            cwd: None,
            label: None,
            command_line: None,
            result: ResultHandle::default(),
        }
    }

    /// Appends one argument. No-op for shell commands.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        if let CommandSpec::Program { args, .. } = &mut self.spec {
            args.push(arg.into());
        }
        self
    }

    /// Appends arguments. No-op for shell commands.
    pub fn args<I, S>(mut self, new_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let CommandSpec::Program { args, .. } = &mut self.spec {
            args.extend(new_args.into_iter().map(Into::into));
        }
        self
    }

    /// Sets one environment variable for the process (on top of the
    /// inherited environment).
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the working directory of the process.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Sets a label shown centered at the bottom of the pane.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Overrides the display command line. Useful for hiding details like a
    /// wrapper shell invocation. Defaults to a shell-quoted rendering of the
    /// program and arguments (or the shell line verbatim).
    pub fn command_line(mut self, line: impl Into<String>) -> Self {
        self.command_line = Some(line.into());
        self
    }

    /// The display command line, set explicitly or generated.
    pub fn display_command_line(&self) -> String {
        if let Some(line) = &self.command_line {
            return line.clone();
        }
        match &self.spec {
            CommandSpec::Shell(line) => line.clone(),
            CommandSpec::Program { program, args } => {
                let mut words = Vec::with_capacity(args.len() + 1);
                words.push(program.clone());
                words.extend(args.iter().cloned());
                shell_words::join(&words)
            }
        }
    }

    /// The pane label, if one was set.
    pub fn pane_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Exit status of the process, if it was started and waited for.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.result.lock().expect("result lock poisoned").exit_status.clone()
    }

    /// The error from running the command, including non-zero exit.
    /// `None` after a clean zero exit.
    pub fn error(&self) -> Option<CommandError> {
        self.result.lock().expect("result lock poisoned").error.clone()
    }

    /// Title for the terminal window while this pane is active: the program
    /// name, with the label in parentheses when both are set and differ.
    pub(crate) fn title(&self) -> String {
        let program = match &self.spec {
            CommandSpec::Program { program, .. } => program.as_str(),
            CommandSpec::Shell(_) => "sh",
        };
        match &self.label {
            Some(label) if label != program => format!("{program} ({label})"),
            _ => program.to_string(),
        }
    }

    pub(crate) fn result_handle(&self) -> ResultHandle {
        Arc::clone(&self.result)
    }

    /// Builds the PTY spawn request for this command.
    pub(crate) fn to_builder(&self) -> CommandBuilder {
        let mut builder = match &self.spec {
            CommandSpec::Program { program, args } => {
                let mut b = CommandBuilder::new(program);
                b.args(args);
                b
            }
            CommandSpec::Shell(line) => shell_builder(line),
        };
        for (key, value) in &self.env {
            builder.env(key, value);
        }
        if let Some(dir) = &self.cwd {
            builder.cwd(dir);
        }
        builder
    }
}

#[cfg(unix)]
fn shell_builder(line: &str) -> CommandBuilder {
    let mut b = CommandBuilder::new("sh");
    b.args(["-c", line]);
    b
}

#[cfg(not(unix))]
fn shell_builder(line: &str) -> CommandBuilder {
    let mut b = CommandBuilder::new("cmd.exe");
    b.args(["/C", line]);
    b
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("spec", &self.spec)
            .field("label", &self.label)
            .field("command_line", &self.display_command_line())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_command_line_is_shell_quoted() {
        let cmd = Command::new("grep").args(["-r", "hello world", "."]);
        assert_eq!(cmd.display_command_line(), "grep -r 'hello world' .");
    }

    #[test]
    fn shell_command_line_is_verbatim() {
        let cmd = Command::shell("tail -f a.log | grep ERROR");
        assert_eq!(cmd.display_command_line(), "tail -f a.log | grep ERROR");
    }

    #[test]
    fn explicit_command_line_wins() {
        let cmd = Command::shell("sh -c something-ugly").command_line("pretty");
        assert_eq!(cmd.display_command_line(), "pretty");
    }

    #[test]
    fn title_combines_program_and_label() {
        assert_eq!(Command::new("cargo").title(), "cargo");
        assert_eq!(Command::new("cargo").label("build").title(), "cargo (build)");
        assert_eq!(Command::new("cargo").label("cargo").title(), "cargo");
        assert_eq!(Command::shell("make all").label("make").title(), "sh (make)");
    }

    #[test]
    fn results_start_empty() {
        let cmd = Command::new("true");
        assert!(cmd.exit_status().is_none());
        assert!(cmd.error().is_none());
    }
}
