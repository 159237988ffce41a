//! # MultiExecutor
//!
//! The process-supervision engine. Owns one session per command: spawns it
//! on a pseudo-terminal sized to its pane, streams tokenized output lines,
//! forwards resizes, reports the terminal outcome, and — on request —
//! gracefully terminates everything still running under a global deadline.
//!
//! One tokio worker task per session does the heavy lifting; blocking PTY
//! reads and child waits run on the blocking pool. The UI loop never talks
//! to a process directly: it consumes `SessionEvent`s from a bounded queue
//! per session (producers block once ~100 events are pending, which gives
//! natural backpressure against a flooding child).

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use portable_pty::{Child, ChildKiller, CommandBuilder, PtySize, native_pty_system};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use super::command::{Command, CommandError, ResultHandle};
use super::splitter::{LineSplitter, Terminator, sanitize_line};

/// Pending-event ceiling per session, worker → UI loop.
const EVENT_QUEUE_CAPACITY: usize = 100;
/// Pause between escalation stages (interrupt → terminate → kill).
const SIGNAL_GRACE: Duration = Duration::from_secs(3);
/// Hard ceiling on [`MultiExecutor::terminate_all`], no matter what the
/// children do.
const TERMINATE_CEILING: Duration = Duration::from_secs(10);

/// One asynchronous notification from a session worker.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// A tokenized line of output. `error` marks synthetic lines injected
    /// by the executor itself (spawn/wait failures) for highlighting.
    Line {
        text: String,
        terminator: Terminator,
        error: bool,
    },
    /// The session is over. `exited` with `exit_code` for a real process
    /// exit, `errored` for spawn/wait failures.
    Exit {
        exited: bool,
        exit_code: u32,
        errored: bool,
        error: Option<CommandError>,
    },
}

/// Loop-side handle for forwarding viewport size changes to the PTY.
/// Sends are coalesced (only the latest size matters) and silently ignored
/// once the session has finished.
pub(crate) struct ResizeHandle(watch::Sender<PtySize>);

impl ResizeHandle {
    pub fn resize(&self, cols: u16, rows: u16) {
        let _ = self.0.send(pty_size(cols, rows));
    }
}

/// Live-process half of a session, shared between the worker's normal wait
/// path and the termination path. Whichever waits first takes the child out
/// of the slot; `finished` stops the signal chain from escalating further.
struct Session {
    pid: Option<u32>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    child: Mutex<Option<Box<dyn Child + Send + Sync>>>,
    finished: AtomicBool,
}

impl Session {
    #[cfg(unix)]
    fn send_signal(&self, signal: libc::c_int) {
        if let Some(pid) = self.pid {
            debug!("sending signal {signal} to pid {pid}");
            unsafe {
                libc::kill(pid as libc::pid_t, signal);
            }
        }
    }

    fn force_kill(&self) {
        if let Err(e) = self.killer.lock().expect("killer lock poisoned").kill() {
            debug!("force kill failed (process likely gone): {e}");
        }
    }
}

/// One admitted command: its result slot, plus the live session once (and
/// if) the spawn succeeded.
struct AdmittedCommand {
    result: ResultHandle,
    session: Option<Arc<Session>>,
}

#[derive(Default)]
struct Aggregate {
    admitted: Vec<AdmittedCommand>,
    success_count: usize,
    finished_count: usize,
}

/// Supervisor for all sessions of one run.
pub(crate) struct MultiExecutor {
    handle: Handle,
    aggregate: Mutex<Aggregate>,
    terminating: AtomicBool,
    /// Publishes `finished_count`; waiters watch it reach the admitted count.
    finished_tx: watch::Sender<usize>,
}

impl MultiExecutor {
    pub fn new(handle: Handle) -> Arc<Self> {
        Arc::new(Self {
            handle,
            aggregate: Mutex::default(),
            terminating: AtomicBool::new(false),
            finished_tx: watch::Sender::new(0),
        })
    }

    /// Launches one session worker for `command`, with the PTY sized
    /// `cols`×`rows`. Returns `None` — admitting nothing — once
    /// [`terminate_all`](Self::terminate_all) has been requested.
    pub fn start(
        self: Arc<Self>,
        pane_idx: usize,
        cols: u16,
        rows: u16,
        command: &Command,
    ) -> Option<(ResizeHandle, mpsc::Receiver<SessionEvent>)> {
        if self.terminating.load(Ordering::SeqCst) {
            debug!("start ignored for pane {pane_idx}: already terminating");
            return None;
        }

        let index = {
            let mut agg = self.lock_aggregate();
            agg.admitted.push(AdmittedCommand {
                result: command.result_handle(),
                session: None,
            });
            agg.admitted.len() - 1
        };

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (resize_tx, resize_rx) = watch::channel(pty_size(cols, rows));

        let executor = Arc::clone(&self);
        let builder = command.to_builder();
        let result = command.result_handle();
        info!(
            "starting pane {pane_idx}: {} ({cols}x{rows})",
            command.display_command_line()
        );
        self.handle.spawn(async move {
            executor
                .run_session(pane_idx, index, builder, result.clone(), event_tx, resize_rx)
                .await;
            result.lock().expect("result lock poisoned").done = true;
            executor.session_finished();
            debug!("session worker for pane {pane_idx} finished");
        });

        Some((ResizeHandle(resize_tx), event_rx))
    }

    /// Suspends until every admitted session worker has finished. Must not
    /// be called before all commands have been admitted with
    /// [`start`](Self::start).
    pub async fn wait_for_all_done(&self) {
        let target = self.lock_aggregate().admitted.len();
        let mut rx = self.finished_tx.subscribe();
        // Never errors: the sender lives inside self.
        let _ = rx.wait_for(|&finished| finished >= target).await;
    }

    /// Gracefully terminates every session not yet finished, escalating
    /// per session, and waits for the workers to drain — but never longer
    /// than 10 seconds. Idempotent. Escalation for stragglers continues in
    /// the background after the ceiling.
    pub async fn terminate_all(&self) {
        if !self.terminating.swap(true, Ordering::SeqCst) {
            info!("terminating all running sessions");
        }

        let targets: Vec<(ResultHandle, Arc<Session>)> = {
            let agg = self.lock_aggregate();
            agg.admitted
                .iter()
                .filter(|cmd| !cmd.result.lock().expect("result lock poisoned").done)
                .filter_map(|cmd| {
                    cmd.session
                        .as_ref()
                        .map(|s| (Arc::clone(&cmd.result), Arc::clone(s)))
                })
                .collect()
        };
        for (result, session) in targets {
            tokio::spawn(gracefully_terminate(session, result));
        }

        if tokio::time::timeout(TERMINATE_CEILING, self.wait_for_all_done())
            .await
            .is_err()
        {
            warn!("termination ceiling reached with sessions still running");
        }
    }

    /// True iff every admitted command ran to completion and exited 0.
    pub fn all_successful(&self) -> bool {
        let agg = self.lock_aggregate();
        agg.success_count == agg.admitted.len()
    }

    #[cfg(test)]
    pub fn success_count(&self) -> usize {
        self.lock_aggregate().success_count
    }

    #[cfg(test)]
    pub fn admitted_count(&self) -> usize {
        self.lock_aggregate().admitted.len()
    }

    async fn run_session(
        &self,
        pane_idx: usize,
        index: usize,
        builder: CommandBuilder,
        result: ResultHandle,
        events: mpsc::Sender<SessionEvent>,
        mut resize_rx: watch::Receiver<PtySize>,
    ) {
        let size = *resize_rx.borrow();
        let pair = match native_pty_system().openpty(size) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("pane {pane_idx}: failed to open pty: {e}");
                report_failure(&events, &result, CommandError::Spawn(e.to_string())).await;
                return;
            }
        };
        let child = match pair.slave.spawn_command(builder) {
            Ok(child) => child,
            Err(e) => {
                warn!("pane {pane_idx}: spawn failed: {e}");
                report_failure(&events, &result, CommandError::Spawn(e.to_string())).await;
                return;
            }
        };
        // The slave side belongs to the child now.
        drop(pair.slave);
        let reader = match pair.master.try_clone_reader() {
            Ok(reader) => reader,
            Err(e) => {
                report_failure(&events, &result, CommandError::Spawn(e.to_string())).await;
                return;
            }
        };

        let session = Arc::new(Session {
            pid: child.process_id(),
            killer: Mutex::new(child.clone_killer()),
            child: Mutex::new(Some(child)),
            finished: AtomicBool::new(false),
        });
        self.lock_aggregate().admitted[index].session = Some(Arc::clone(&session));

        // Resize forwarding. Owns the master so the PTY stays open for the
        // child's whole lifetime; ends when the loop drops its handle.
        let master = pair.master;
        tokio::spawn(async move {
            while resize_rx.changed().await.is_ok() {
                let size = *resize_rx.borrow();
                if let Err(e) = master.resize(size) {
                    debug!("pty resize failed: {e}");
                }
            }
        });

        // Blocking read + tokenize loop. Runs until PTY EOF (the read also
        // errors with EIO on Linux once the child side is gone).
        let line_tx = events.clone();
        let read_loop = tokio::task::spawn_blocking(move || {
            let mut reader = reader;
            let mut splitter = LineSplitter::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                splitter.push(&buf[..n]);
                while let Some((bytes, terminator)) = splitter.next_line() {
                    let event = SessionEvent::Line {
                        text: sanitize_line(&bytes),
                        terminator,
                        error: false,
                    };
                    if line_tx.blocking_send(event).is_err() {
                        return;
                    }
                }
            }
            if let Some((bytes, terminator)) = splitter.finish() {
                let _ = line_tx.blocking_send(SessionEvent::Line {
                    text: sanitize_line(&bytes),
                    terminator,
                    error: false,
                });
            }
        });
        let _ = read_loop.await;

        if self.terminating.load(Ordering::SeqCst) {
            // The termination path owns the wait now; waiting here as well
            // would race it for reaping the same process.
            return;
        }

        let child = session.child.lock().expect("child lock poisoned").take();
        let Some(mut child) = child else {
            // Termination won the race after all.
            return;
        };
        let waited = tokio::task::spawn_blocking(move || child.wait()).await;
        session.finished.store(true, Ordering::SeqCst);

        match waited {
            Ok(Ok(status)) => {
                let exit_code = status.exit_code();
                {
                    let mut res = result.lock().expect("result lock poisoned");
                    res.exit_status = Some(status.clone());
                }
                if status.success() {
                    self.lock_aggregate().success_count += 1;
                } else {
                    result.lock().expect("result lock poisoned").error =
                        Some(CommandError::Exit(exit_code));
                }
                debug!("pane {pane_idx}: exited with status {exit_code}");
                let _ = events
                    .send(SessionEvent::Exit {
                        exited: true,
                        exit_code,
                        errored: false,
                        error: None,
                    })
                    .await;
            }
            Ok(Err(e)) => {
                warn!("pane {pane_idx}: wait failed: {e}");
                report_failure(&events, &result, CommandError::Wait(e.to_string())).await;
            }
            Err(e) => {
                warn!("pane {pane_idx}: wait task failed: {e}");
                report_failure(&events, &result, CommandError::Wait(e.to_string())).await;
            }
        }
    }

    fn session_finished(&self) {
        let finished = {
            let mut agg = self.lock_aggregate();
            agg.finished_count += 1;
            agg.finished_count
        };
        let _ = self.finished_tx.send(finished);
    }

    fn lock_aggregate(&self) -> std::sync::MutexGuard<'_, Aggregate> {
        self.aggregate.lock().expect("aggregate lock poisoned")
    }
}

/// Records the error on the command, paints it into the pane as a
/// highlighted line, and reports an errored exit.
async fn report_failure(
    events: &mpsc::Sender<SessionEvent>,
    result: &ResultHandle,
    error: CommandError,
) {
    result.lock().expect("result lock poisoned").error = Some(error.clone());
    let _ = events
        .send(SessionEvent::Line {
            text: error.to_string(),
            terminator: Terminator::None,
            error: true,
        })
        .await;
    let _ = events
        .send(SessionEvent::Exit {
            exited: false,
            exit_code: 0,
            errored: true,
            error: Some(error),
        })
        .await;
}

/// Best-effort graceful termination of one session: the staged signal chain
/// races a blocking wait-for-exit; the first to observe completion stops
/// the other via the session's `finished` flag.
async fn gracefully_terminate(session: Arc<Session>, result: ResultHandle) {
    tokio::spawn(escalate(Arc::clone(&session)));

    let child = session.child.lock().expect("child lock poisoned").take();
    let Some(mut child) = child else {
        // The worker already owns the wait; the signal chain runs until it
        // observes completion.
        return;
    };
    let waited = tokio::task::spawn_blocking(move || child.wait()).await;
    session.finished.store(true, Ordering::SeqCst);

    match waited {
        Ok(Ok(status)) => {
            let mut res = result.lock().expect("result lock poisoned");
            res.exit_status = Some(status.clone());
            // The wait itself reports no error for signal-terminated
            // processes; normalize any abnormal status into one. A clean
            // zero exit despite the signaling stays error-free.
            if !status.success() {
                res.error = Some(CommandError::Exit(status.exit_code()));
            }
        }
        Ok(Err(e)) => {
            result.lock().expect("result lock poisoned").error =
                Some(CommandError::Wait(e.to_string()));
        }
        Err(e) => {
            result.lock().expect("result lock poisoned").error =
                Some(CommandError::Wait(e.to_string()));
        }
    }
}

/// Staged signal delivery: interrupt, 3s, terminate, 3s, kill. Each stage
/// is skipped once the process is known to have exited. Platforms without
/// interrupt semantics collapse to an immediate hard kill.
#[cfg(unix)]
async fn escalate(session: Arc<Session>) {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        if session.finished.load(Ordering::SeqCst) {
            return;
        }
        session.send_signal(signal);
        tokio::time::sleep(SIGNAL_GRACE).await;
    }
    if session.finished.load(Ordering::SeqCst) {
        return;
    }
    info!("escalating to SIGKILL for pid {:?}", session.pid);
    session.force_kill();
}

#[cfg(not(unix))]
async fn escalate(session: Arc<Session>) {
    session.force_kill();
}

fn pty_size(cols: u16, rows: u16) -> PtySize {
    PtySize {
        rows,
        cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::command::Command;
    use std::time::Instant;

    fn executor() -> Arc<MultiExecutor> {
        MultiExecutor::new(Handle::current())
    }

    /// Drains a session's event stream until the Exit event, returning the
    /// collected lines and the exit event.
    async fn drain(
        mut rx: mpsc::Receiver<SessionEvent>,
    ) -> (Vec<(String, Terminator, bool)>, Option<SessionEvent>) {
        let mut lines = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::Line {
                    text,
                    terminator,
                    error,
                } => lines.push((text, terminator, error)),
                exit @ SessionEvent::Exit { .. } => return (lines, Some(exit)),
            }
        }
        (lines, None)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn zero_exit_counts_as_success() {
        let ex = executor();
        let cmd = Command::shell("exit 0");
        let (_resize, rx) = ex.clone().start(0, 80, 24, &cmd).unwrap();
        let (_lines, exit) = drain(rx).await;
        ex.wait_for_all_done().await;

        assert!(matches!(
            exit,
            Some(SessionEvent::Exit {
                exited: true,
                exit_code: 0,
                errored: false,
                ..
            })
        ));
        assert!(ex.all_successful());
        assert!(cmd.error().is_none());
        assert!(cmd.exit_status().is_some_and(|s| s.success()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mixed_outcomes_tally_one_success() {
        let ex = executor();
        let ok = Command::shell("exit 0");
        let failing = Command::shell("exit 1");
        let missing = Command::new("definitely-not-a-real-executable-4d2");

        let (_r0, rx0) = ex.clone().start(0, 80, 24, &ok).unwrap();
        let (_r1, rx1) = ex.clone().start(1, 80, 24, &failing).unwrap();
        let (_r2, rx2) = ex.clone().start(2, 80, 24, &missing).unwrap();
        drain(rx0).await;
        drain(rx1).await;
        let (lines, exit) = drain(rx2).await;
        ex.wait_for_all_done().await;

        assert!(!ex.all_successful());
        assert_eq!(ex.success_count(), 1);
        assert!(ok.error().is_none());
        assert!(matches!(failing.error(), Some(CommandError::Exit(1))));
        assert!(matches!(missing.error(), Some(CommandError::Spawn(_))));
        // The spawn failure surfaces as a highlighted synthetic line.
        assert!(lines.iter().any(|(_, term, error)| *error && *term == Terminator::None));
        assert!(matches!(
            exit,
            Some(SessionEvent::Exit { errored: true, exited: false, .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn output_lines_arrive_in_order_with_terminators() {
        let ex = executor();
        let cmd = Command::shell("printf 'abc\\r'; printf 'def\\n'");
        let (_resize, rx) = ex.clone().start(0, 80, 24, &cmd).unwrap();
        let (lines, _exit) = drain(rx).await;
        ex.wait_for_all_done().await;

        let abc = lines.iter().position(|(t, _, _)| t == "abc").unwrap();
        let def = lines.iter().position(|(t, _, _)| t == "def").unwrap();
        assert!(abc < def);
        assert_eq!(lines[abc].1, Terminator::Cr);
        assert_eq!(lines[def].1, Terminator::Lf);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn terminate_all_interrupts_sleepers() {
        let ex = executor();
        let cmd = Command::shell("sleep 30");
        let (_resize, _rx) = ex.clone().start(0, 80, 24, &cmd).unwrap();
        // Give the shell a moment to exec.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = Instant::now();
        ex.terminate_all().await;
        assert!(started.elapsed() < TERMINATE_CEILING + Duration::from_millis(500));
        assert!(!ex.all_successful());
        // Killed by SIGINT: abnormal status normalized into an error.
        assert!(cmd.error().is_some());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn cooperative_process_ends_in_the_interrupt_stage() {
        let ex = executor();
        // `exec` so the signal lands on the sleeper itself; SIGINT alone
        // must end it well before the terminate stage would fire.
        let cmd = Command::shell("exec sleep 30");
        let (_resize, _rx) = ex.clone().start(0, 80, 24, &cmd).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = Instant::now();
        ex.terminate_all().await;
        assert!(started.elapsed() < SIGNAL_GRACE);
        assert!(cmd.error().is_some());
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn escalation_stages_arrive_in_order() {
        let ex = executor();
        // Survives the interrupt, yields on the terminate. The trap output
        // records which stage reached the process, and in what order.
        let cmd = Command::shell(
            "trap 'echo got-int' INT; trap 'echo got-term; exit 3' TERM; while :; do sleep 0.1; done",
        );
        let (_resize, rx) = ex.clone().start(0, 80, 24, &cmd).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = Instant::now();
        ex.terminate_all().await;
        let elapsed = started.elapsed();
        // One full grace period passes between the two signals, and the
        // kill stage is never reached.
        assert!(elapsed >= SIGNAL_GRACE - Duration::from_millis(200));
        assert!(elapsed < SIGNAL_GRACE * 2);

        let (lines, _exit) = drain(rx).await;
        let int = lines.iter().position(|(t, _, _)| t == "got-int").unwrap();
        let term = lines.iter().position(|(t, _, _)| t == "got-term").unwrap();
        assert!(int < term);
        assert!(matches!(cmd.error(), Some(CommandError::Exit(3))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn terminate_all_returns_within_ceiling_for_stubborn_processes() {
        let ex = executor();
        // Ignores INT and TERM; only the final SIGKILL lands, and the
        // orphaned sleep keeps the PTY open past the worker's read loop.
        let cmd = Command::shell("trap '' INT TERM; sleep 30");
        let (_resize, _rx) = ex.clone().start(0, 80, 24, &cmd).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let started = Instant::now();
        ex.terminate_all().await;
        assert!(started.elapsed() < TERMINATE_CEILING + Duration::from_secs(1));
        assert!(!ex.all_successful());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_after_terminate_is_a_no_op() {
        let ex = executor();
        ex.terminate_all().await;
        let cmd = Command::shell("exit 0");
        assert!(ex.clone().start(0, 80, 24, &cmd).is_none());
        assert_eq!(ex.admitted_count(), 0);
    }
}
