//! Worker process supervision: handshake, per-call deadline, teardown.

use std::io::BufReader;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use twenty48_engine::{Board, Direction};

use crate::protocol::{Message, direction_from_code, pack_board, write_message};

/// How long a freshly spawned worker may take to report `Ready`.
pub const STARTUP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default per-move deadline when the caller passes no tighter budget.
pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Lower bound on any wait, so a nearly exhausted budget still gives the
/// worker one scheduling quantum to answer.
const MIN_WAIT: Duration = Duration::from_millis(50);

/// Grace period between a `Stop` request and the forced kill.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum BridgeError {
    #[display("missing solver library: {}", path.display())]
    MissingLibrary {
        #[error(not(source))]
        path: PathBuf,
    },
    #[display("external engine failed to start: {reason}")]
    StartupFailed {
        #[error(not(source))]
        reason: String,
    },
}

/// Where to find the worker binary and the native solver library it hosts.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_path: PathBuf,
    pub library_path: PathBuf,
}

/// Handle to one live worker: the child process, its stdin, and a channel
/// drained by a background reader thread parsing frames off its stdout.
///
/// A session never survives a failed call; it is replaced, not repaired.
struct WorkerSession {
    child: Child,
    stdin: ChildStdin,
    replies: Receiver<Result<Message, String>>,
}

impl std::fmt::Debug for WorkerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSession")
            .field("pid", &self.child.id())
            .finish_non_exhaustive()
    }
}

impl WorkerSession {
    fn spawn(config: &WorkerConfig) -> Result<Self, String> {
        let mut child = Command::new(&config.worker_path)
            .arg(&config.library_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| format!("failed to spawn worker {}: {e}", config.worker_path.display()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| "worker stdin unavailable".to_owned())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "worker stdout unavailable".to_owned())?;

        let (tx, replies) = mpsc::channel();
        thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let message = crate::protocol::read_message(&mut reader);
                match message {
                    Ok(message) => {
                        if tx.send(Ok(message)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        // Either EOF (worker exited) or a corrupt stream;
                        // report once and stop, the supervisor tears down.
                        let _ = tx.send(Err(err.to_string()));
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            replies,
        })
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn send(&mut self, message: &Message) -> Result<(), String> {
        write_message(&mut self.stdin, message).map_err(|e| e.to_string())
    }

    /// Requests a graceful stop, escalates to a kill if the worker does
    /// not exit within the grace period, and reaps the process.
    fn stop(mut self) {
        let _ = self.send(&Message::Stop);
        let waited = Instant::now();
        while waited.elapsed() < SHUTDOWN_GRACE {
            if !self.is_alive() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        if self.is_alive() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Supervisor for the external native solver.
///
/// Owns at most one worker process, spawned lazily on first use and after
/// any failure. Every request is a blocking round trip bounded by the
/// caller's budget; any timeout, protocol violation, or channel error
/// records a diagnostic, discards the session, and surfaces as `None`.
#[derive(Debug)]
pub struct ExternalEngine {
    config: WorkerConfig,
    session: Option<WorkerSession>,
    last_error: Option<String>,
}

impl ExternalEngine {
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            session: None,
            last_error: None,
        }
    }

    /// Checks the solver library exists and performs the startup handshake
    /// once, so callers can distinguish "not installed" from a later
    /// runtime failure.
    pub fn load(config: WorkerConfig) -> Result<Self, BridgeError> {
        if !config.library_path.is_file() {
            return Err(BridgeError::MissingLibrary {
                path: config.library_path,
            });
        }
        let mut engine = Self::new(config);
        if engine.warmup() {
            Ok(engine)
        } else {
            let reason = engine
                .last_error
                .clone()
                .unwrap_or_else(|| "failed to start worker".to_owned());
            engine.shutdown();
            Err(BridgeError::StartupFailed { reason })
        }
    }

    /// Most recent failure diagnostic, kept for status reporting.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Spawns the worker eagerly. Returns false (with `last_error` set) if
    /// the handshake fails.
    pub fn warmup(&mut self) -> bool {
        self.ensure_worker(STARTUP_TIMEOUT)
    }

    /// Asks the worker for a move, waiting at most `budget` across spawn,
    /// handshake, and the request round trip. `None` means unavailable;
    /// the caller is expected to fall back to its own search.
    pub fn choose_move(&mut self, board: &Board, budget: Duration) -> Option<Direction> {
        let budget = budget.max(MIN_WAIT);
        let started = Instant::now();

        if !self.ensure_worker(budget) {
            return None;
        }

        let Some(remaining) = budget.checked_sub(started.elapsed()).filter(|r| !r.is_zero()) else {
            self.last_error = Some(format!("external engine timed out after {budget:?}"));
            return None;
        };

        let packed = pack_board(board);
        let session = self.session.as_mut()?;
        if let Err(err) = session.send(&Message::MoveRequest(packed)) {
            self.fail(format!("worker send failed: {err}"));
            return None;
        }

        match session.replies.recv_timeout(remaining.max(MIN_WAIT)) {
            Ok(Ok(Message::MoveReply(code))) => match direction_from_code(code) {
                Some(direction) => Some(direction),
                None => {
                    self.fail(format!("worker returned unknown direction code {code}"));
                    None
                }
            },
            Ok(Ok(Message::Error(reason))) => {
                self.fail(reason);
                None
            }
            Ok(Ok(other)) => {
                self.fail(format!("unexpected worker reply: {other:?}"));
                None
            }
            Ok(Err(err)) => {
                self.fail(format!("worker protocol error: {err}"));
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                self.fail(format!("external engine timed out after {remaining:?}"));
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.fail("worker disconnected".to_owned());
                None
            }
        }
    }

    /// Tears down any live worker. The next request respawns.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop();
        }
    }

    fn fail(&mut self, reason: String) {
        self.last_error = Some(reason);
        self.shutdown();
    }

    /// Reuses the live session or spawns a fresh worker and waits for the
    /// `Ready` handshake, bounded by `startup_timeout`.
    fn ensure_worker(&mut self, startup_timeout: Duration) -> bool {
        if let Some(session) = self.session.as_mut()
            && session.is_alive()
        {
            return true;
        }
        self.shutdown();

        let mut session = match WorkerSession::spawn(&self.config) {
            Ok(session) => session,
            Err(err) => {
                self.last_error = Some(err);
                return false;
            }
        };

        match session.replies.recv_timeout(startup_timeout.max(MIN_WAIT)) {
            Ok(Ok(Message::Ready)) => {
                self.session = Some(session);
                self.last_error = None;
                true
            }
            Ok(Ok(Message::Error(reason))) => {
                self.last_error = Some(reason);
                session.stop();
                false
            }
            Ok(Ok(other)) => {
                self.last_error = Some(format!("unexpected handshake reply: {other:?}"));
                session.stop();
                false
            }
            Ok(Err(err)) => {
                self.last_error = Some(format!("worker exited during startup: {err}"));
                session.stop();
                false
            }
            Err(RecvTimeoutError::Timeout) => {
                self.last_error = Some("worker startup timed out".to_owned());
                session.stop();
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.last_error = Some("worker exited during startup".to_owned());
                session.stop();
                false
            }
        }
    }
}

impl Drop for ExternalEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
