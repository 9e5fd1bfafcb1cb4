//! Asynchronous bridge to one external UCI engine process.
//!
//! The child process is owned by a background task that holds its stdin and
//! stdout. Callers talk to that task over a channel and get a [`PendingMove`]
//! back immediately; the handle resolves once, with a legal move or an
//! [`EngineFailure`]. Only one request may be outstanding at a time.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::engine::uci_protocol::{parse_engine_line, strength_options, EngineLine, GoParams, UciCommand};
use crate::errors::{EngineFailure, MatchError, MatchResult};
use crate::game_state::game_state::GameState;
use crate::moves::chess_move::Move;
use crate::utils::long_algebraic::{find_legal_move, parse_coordinate_move};

/// How strongly the engine should play, and how long it may think.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineStrength {
    /// `UCI_Elo` with `UCI_LimitStrength`; `None` plays at full strength.
    pub elo: Option<u16>,
    /// `Skill Level`, for engines that support it.
    pub skill_level: Option<u8>,
    /// `go movetime`. Also bounds the request deadline unless `depth` is set.
    pub movetime_ms: u64,
    /// `go depth` instead of `go movetime` when set.
    pub depth: Option<u8>,
}

impl Default for EngineStrength {
    fn default() -> Self {
        Self {
            elo: None,
            skill_level: None,
            movetime_ms: 500,
            depth: None,
        }
    }
}

impl EngineStrength {
    pub fn with_elo(elo: u16) -> Self {
        Self {
            elo: Some(elo),
            ..Self::default()
        }
    }

    /// How long the engine may search: the movetime, or `depth_limit` for a
    /// depth-bounded search.
    pub fn search_budget(&self, depth_limit: Duration) -> Duration {
        match self.depth {
            Some(_) => depth_limit,
            None => Duration::from_millis(self.movetime_ms),
        }
    }
}

type ReplySender = oneshot::Sender<Result<String, EngineFailure>>;

enum WorkerRequest {
    Think {
        commands: Vec<UciCommand>,
        deadline: Duration,
        reply: ReplySender,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Handle to a running engine subprocess.
pub struct EngineBridge {
    requests: mpsc::Sender<WorkerRequest>,
    in_flight: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    response_grace: Duration,
    depth_search_limit: Duration,
    shutdown_timeout: Duration,
}

impl EngineBridge {
    /// Start the engine and complete the UCI handshake.
    pub async fn spawn(config: &EngineConfig) -> Result<Self, EngineFailure> {
        let program = config.program.display().to_string();
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| EngineFailure::Spawn {
                program: program.clone(),
                message: err.to_string(),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| EngineFailure::Spawn {
            program: program.clone(),
            message: "stdin was not captured".to_owned(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EngineFailure::Spawn {
            program: program.clone(),
            message: "stdout was not captured".to_owned(),
        })?;

        let mut io = EngineIo {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            response_grace: config.response_grace,
            healthy: true,
        };

        let handshake = async {
            io.send(&UciCommand::Uci).await?;
            io.wait_for(EngineLine::UciOk).await?;
            io.send(&UciCommand::set_option("Threads", config.threads)).await?;
            io.send(&UciCommand::set_option("Hash", config.hash_mb)).await?;
            io.send(&UciCommand::UciNewGame).await?;
            io.send(&UciCommand::IsReady).await?;
            io.wait_for(EngineLine::ReadyOk).await
        };
        match tokio::time::timeout(config.handshake_timeout, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(failure)) => return Err(failure),
            Err(_) => {
                return Err(EngineFailure::Timeout {
                    millis: config.handshake_timeout.as_millis() as u64,
                })
            }
        }

        info!(program = %program, pid = ?io.child.id(), "engine started");

        let (requests, receiver) = mpsc::channel(4);
        let in_flight = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));
        let worker = tokio::spawn(run_worker(
            io,
            receiver,
            Arc::clone(&in_flight),
            Arc::clone(&alive),
            config.shutdown_timeout,
        ));

        Ok(Self {
            requests,
            in_flight,
            alive,
            worker: Some(worker),
            response_grace: config.response_grace,
            depth_search_limit: config.depth_search_limit,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Whether the subprocess is still usable.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Whether a request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Ask for a move in `board`, the position reached from `start` by `moves`.
    ///
    /// Returns at once. Fails with [`MatchError::Busy`] while another request is
    /// outstanding, and with `ProcessExited` once the subprocess is gone.
    pub fn request_move(
        &self,
        board: &GameState,
        start: &GameState,
        moves: &[Move],
        strength: &EngineStrength,
    ) -> MatchResult<PendingMove> {
        if !self.is_alive() {
            return Err(MatchError::Engine(EngineFailure::ProcessExited));
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(MatchError::Busy);
        }

        let mut commands = strength_options(strength);
        commands.push(UciCommand::position(start, moves));
        commands.push(UciCommand::Go(GoParams::from_strength(strength)));
        let deadline = strength.search_budget(self.depth_search_limit) + self.response_grace;

        let (reply, receiver) = oneshot::channel();
        let request = WorkerRequest::Think {
            commands,
            deadline,
            reply,
        };
        if self.requests.try_send(request).is_err() {
            self.in_flight.store(false, Ordering::Release);
            return Err(MatchError::Engine(EngineFailure::ProcessExited));
        }

        Ok(PendingMove {
            receiver,
            board: board.clone(),
        })
    }

    /// Send `quit`, wait briefly, then make sure the process is gone. Any
    /// outstanding request resolves as cancelled.
    pub async fn shutdown(mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let (done, finished) = oneshot::channel();
        if self.requests.send(WorkerRequest::Shutdown { done }).await.is_ok() {
            // A cancelled request drains for up to the grace period first.
            let limit = self.shutdown_timeout + self.response_grace;
            if tokio::time::timeout(limit, finished).await.is_err() {
                warn!("engine did not shut down in time; aborting its task");
            }
        }

        // Dropping the task drops the child, which kills it.
        worker.abort();
        let _ = worker.await;
        self.alive.store(false, Ordering::Release);
    }
}

impl Drop for EngineBridge {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

/// A move request in progress.
///
/// Resolves exactly once. Dropping it (or calling [`PendingMove::cancel`])
/// tells the engine to stop; its eventual answer is discarded.
#[must_use = "a pending move does nothing unless awaited"]
pub struct PendingMove {
    receiver: oneshot::Receiver<Result<String, EngineFailure>>,
    board: GameState,
}

impl PendingMove {
    pub fn cancel(self) {
        drop(self);
    }
}

impl Future for PendingMove {
    type Output = Result<Move, EngineFailure>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(text))) => Poll::Ready(resolve_suggestion(&self.board, &text)),
            Poll::Ready(Ok(Err(failure))) => Poll::Ready(Err(failure)),
            // The worker went away without answering.
            Poll::Ready(Err(_)) => Poll::Ready(Err(EngineFailure::Cancelled)),
        }
    }
}

/// Turn a `bestmove` token into a legal move of `board`.
pub fn resolve_suggestion(board: &GameState, text: &str) -> Result<Move, EngineFailure> {
    if text == "(none)" || text == "0000" {
        return Err(EngineFailure::Malformed(format!("bestmove {text}")));
    }
    let coords = parse_coordinate_move(text).ok_or_else(|| EngineFailure::Malformed(format!("bestmove {text}")))?;
    find_legal_move(board, coords).ok_or_else(|| EngineFailure::IllegalSuggestion(text.to_owned()))
}

struct EngineIo {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    response_grace: Duration,
    /// Cleared when the engine stops answering; the worker then drops it.
    healthy: bool,
}

enum ThinkEvent {
    Line(std::io::Result<Option<String>>),
    Deadline,
    Abandoned,
}

impl EngineIo {
    async fn send(&mut self, command: &UciCommand) -> Result<(), EngineFailure> {
        let line = command.to_string();
        trace!(line = %line, "to engine");
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self) -> Result<EngineLine, EngineFailure> {
        match self.lines.next_line().await? {
            Some(line) => {
                trace!(line = %line, "from engine");
                Ok(parse_engine_line(&line))
            }
            None => Err(EngineFailure::ProcessExited),
        }
    }

    async fn wait_for(&mut self, expected: EngineLine) -> Result<(), EngineFailure> {
        loop {
            if self.next_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Run one search. Gives up at `deadline` or when the requester hangs up.
    async fn think(
        &mut self,
        commands: &[UciCommand],
        deadline: Duration,
        reply: &mut ReplySender,
    ) -> Result<String, EngineFailure> {
        for command in commands {
            self.send(command).await?;
        }

        let sleep = tokio::time::sleep(deadline);
        tokio::pin!(sleep);

        loop {
            let event = tokio::select! {
                line = self.lines.next_line() => ThinkEvent::Line(line),
                _ = &mut sleep => ThinkEvent::Deadline,
                _ = reply.closed() => ThinkEvent::Abandoned,
            };

            match event {
                ThinkEvent::Line(line) => {
                    let Some(line) = line? else {
                        return Err(EngineFailure::ProcessExited);
                    };
                    trace!(line = %line, "from engine");
                    match parse_engine_line(&line) {
                        EngineLine::BestMove { mv, .. } => return Ok(mv),
                        EngineLine::Malformed(text) => return Err(EngineFailure::Malformed(text)),
                        _ => {}
                    }
                }
                ThinkEvent::Deadline => {
                    warn!(deadline_ms = deadline.as_millis() as u64, "engine missed its deadline");
                    self.stop_and_drain().await;
                    return Err(EngineFailure::Timeout {
                        millis: deadline.as_millis() as u64,
                    });
                }
                ThinkEvent::Abandoned => {
                    debug!("move request cancelled; stopping engine");
                    self.stop_and_drain().await;
                    return Err(EngineFailure::Cancelled);
                }
            }
        }
    }

    /// Send `stop` and discard output up to the search's `bestmove`. An engine
    /// that does not answer within the grace period is marked unhealthy.
    async fn stop_and_drain(&mut self) {
        let grace = self.response_grace;
        let drain = async {
            self.send(&UciCommand::Stop).await?;
            loop {
                if let EngineLine::BestMove { .. } = self.next_line().await? {
                    return Ok::<(), EngineFailure>(());
                }
            }
        };
        let drained = matches!(tokio::time::timeout(grace, drain).await, Ok(Ok(())));
        if !drained {
            self.healthy = false;
        }
    }

    async fn quit(mut self, shutdown_timeout: Duration) {
        let _ = self.send(&UciCommand::Quit).await;
        match tokio::time::timeout(shutdown_timeout, self.child.wait()).await {
            Ok(Ok(status)) => debug!(?status, "engine exited"),
            Ok(Err(err)) => warn!(error = %err, "waiting for engine failed"),
            Err(_) => {
                warn!("engine ignored quit; killing it");
                let _ = self.child.kill().await;
            }
        }
    }
}

async fn run_worker(
    io: EngineIo,
    mut requests: mpsc::Receiver<WorkerRequest>,
    in_flight: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    shutdown_timeout: Duration,
) {
    let mut io = Some(io);

    while let Some(request) = requests.recv().await {
        match request {
            WorkerRequest::Think {
                commands,
                deadline,
                mut reply,
            } => {
                let result = match io.as_mut() {
                    Some(engine) => engine.think(&commands, deadline, &mut reply).await,
                    None => Err(EngineFailure::ProcessExited),
                };

                let lost_process = matches!(
                    result,
                    Err(EngineFailure::ProcessExited) | Err(EngineFailure::Io(_))
                ) || io.as_ref().is_some_and(|engine| !engine.healthy);
                if lost_process && io.is_some() {
                    warn!(failure = ?result, "engine process lost");
                    // Dropping the handle kills whatever is left of the child.
                    io = None;
                    alive.store(false, Ordering::Release);
                }

                in_flight.store(false, Ordering::Release);
                let _ = reply.send(result);
            }
            WorkerRequest::Shutdown { done } => {
                if let Some(engine) = io.take() {
                    engine.quit(shutdown_timeout).await;
                }
                alive.store(false, Ordering::Release);
                let _ = done.send(());
                return;
            }
        }
    }

    // Every bridge handle is gone.
    if let Some(engine) = io.take() {
        engine.quit(shutdown_timeout).await;
    }
    alive.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_must_be_legal_in_the_position() {
        let board = GameState::new_game();
        assert_eq!(resolve_suggestion(&board, "e2e4").map(|mv| mv.to_uci()), Ok("e2e4".to_owned()));
        assert_eq!(
            resolve_suggestion(&board, "e2e5"),
            Err(EngineFailure::IllegalSuggestion("e2e5".to_owned()))
        );
        assert!(matches!(resolve_suggestion(&board, "(none)"), Err(EngineFailure::Malformed(_))));
        assert!(matches!(resolve_suggestion(&board, "xyz"), Err(EngineFailure::Malformed(_))));
    }

    #[test]
    fn depth_searches_are_not_bounded_by_movetime() {
        let limit = Duration::from_secs(30);
        let timed = EngineStrength {
            movetime_ms: 50,
            ..EngineStrength::default()
        };
        assert_eq!(timed.search_budget(limit), Duration::from_millis(50));
        let deep = EngineStrength { depth: Some(12), ..timed };
        assert_eq!(deep.search_budget(limit), limit);
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let config = EngineConfig {
            program: "/nonexistent/plum-arbiter-engine".into(),
            ..EngineConfig::default()
        };
        let result = EngineBridge::spawn(&config).await;
        assert!(matches!(result, Err(EngineFailure::Spawn { .. })));
    }
}
