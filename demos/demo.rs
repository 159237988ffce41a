//! Interactive demo: a handful of contrasting workloads in one grid.
//!
//! Run from the repository root with:
//!
//! ```sh
//! cargo run --example demo
//! ```
//!
//! Build the companion workload first (`cargo build --example workload`) to
//! get the progress-bar pane; otherwise it falls back to spawning it
//! through cargo.

use clap::Parser;
use gridrun::{Command, RunOptions};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;

#[derive(Parser)]
#[command(name = "demo", about = "gridrun demo grid")]
struct Args {
    /// Grid width in panes
    #[arg(short, long, default_value_t = 2)]
    columns: usize,

    /// Quit as soon as every command has finished
    #[arg(long)]
    auto_quit: bool,

    /// Print a static snapshot of the grid after quitting
    #[arg(long)]
    final_view: bool,

    /// Hide the command line at the top of each pane
    #[arg(long)]
    no_command_lines: bool,
}

fn main() -> Result<(), gridrun::RunError> {
    let args = Args::parse();

    // File logger - the terminal itself belongs to the UI
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create("gridrun-demo.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    let commands = vec![
        Command::shell("for i in $(seq 1 200); do echo \"line $i\"; sleep 0.05; done")
            .label("counter"),
        workload_command(),
        Command::new("ls").args(["-l", "/"]).label("quick"),
        Command::shell("sleep 2; echo about to fail; exit 3").label("fails"),
        Command::shell("sleep 600").label("sleeper"),
    ];

    let options = RunOptions::default()
        .with_columns(args.columns)
        .with_command_lines(!args.no_command_lines)
        .with_auto_quit(args.auto_quit)
        .with_final_view(args.final_view);

    let outcome = gridrun::run(commands, options)?;

    println!("all successful: {}", outcome.all_successful);
    for command in &outcome.commands {
        match command.error() {
            None => println!("{}: ok", command.display_command_line()),
            Some(e) => println!("{}: {}", command.display_command_line(), e),
        }
    }
    Ok(())
}

/// Prefers the already-built workload example next to this binary, falling
/// back to building it through cargo.
fn workload_command() -> Command {
    let built = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("workload")))
        .filter(|p| p.exists());
    match built {
        Some(path) => Command::new(path.display().to_string()).label("workload"),
        None => Command::shell("cargo run -q --example workload").label("workload"),
    }
}
