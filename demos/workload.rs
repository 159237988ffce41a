//! Synthetic workload for exercising the grid: ticks twice a second with a
//! colored timestamp and the terminal size, periodically animates a
//! carriage-return progress bar, ignores the first SIGINT, and exits 1 on
//! SIGTERM. Useful for watching resize propagation and the termination
//! escalation.

use std::io::Write;
use std::time::{Duration, Instant};

#[cfg(unix)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut interval = tokio::time::interval(Duration::from_millis(500));
    let start = Instant::now();
    let mut interrupted = false;
    let mut tick = 0u64;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if interrupted {
                    continue;
                }
                tick += 1;
                print_tick(tick, start);
            }
            _ = sigint.recv() => {
                println!("\x1b[33mgot SIGINT, ignored\x1b[0m");
                interrupted = true;
            }
            _ = sigterm.recv() => {
                println!("\x1b[31mgot SIGTERM\x1b[0m");
                std::process::exit(1);
            }
        }
    }
}

#[cfg(not(unix))]
fn main() {
    let start = Instant::now();
    let mut tick = 0u64;
    loop {
        std::thread::sleep(Duration::from_millis(500));
        tick += 1;
        print_tick(tick, start);
    }
}

fn print_tick(tick: u64, start: Instant) {
    let secs = start.elapsed().as_secs() % 10000;
    let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
    let plain_prefix = format!("[{secs:04}] {width}x{height}");
    let mut line = format!("\x1b[32m[{secs:04}]\x1b[0m {width}x{height}");

    let phase = tick % 8;
    if phase >= 4 {
        // Animated progress bar, redrawn in place with CR until the last
        // frame commits it with LF.
        line.push(' ');
        let avail = (width as usize)
            .saturating_sub(plain_prefix.len() + 1)
            .max(18);
        let filled = (avail - 2) * (phase as usize - 3) / 4;
        line.push('[');
        line.push_str(&"=".repeat(filled.saturating_sub(1)));
        line.push('>');
        line.push_str(&" ".repeat(avail - 2 - filled));
        line.push(']');
        if phase == 7 {
            println!("{line}");
        } else {
            print!("{line}\r");
        }
    } else if phase == 1 {
        println!("{line} test program with terminal size, progress bar and color");
    } else {
        println!("{line}");
    }
    let _ = std::io::stdout().flush();
}
