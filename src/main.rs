//! Play one game against an external UCI engine from the terminal.
//!
//! Moves are typed in coordinate notation (`e2e4`, `e7e8q`); see `help` for
//! the other commands.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use plum_arbiter::config::{ArbiterConfig, EngineConfig};
use plum_arbiter::engine::engine_bridge::EngineStrength;
use plum_arbiter::game_state::chess_types::{Color, PieceKind};
use plum_arbiter::move_generation::game_status::GameStatus;
use plum_arbiter::registry::match_registry::{ChallengeOptions, MatchRegistry};
use plum_arbiter::session::events::{MatchEvent, MatchEventKind};
use plum_arbiter::session::participant::{MatchId, Opponent, PlayerId};
use plum_arbiter::session::time_control::TimeControlSettings;
use plum_arbiter::utils::pgn::{write_pgn, PgnInfo};

const CLOCK_TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SideArg {
    White,
    Black,
    Random,
}

#[derive(Debug, Parser)]
#[command(name = "plum_arbiter", about = "Play chess against a UCI engine")]
struct Args {
    /// UCI engine executable.
    #[arg(long, default_value = "stockfish")]
    engine: PathBuf,

    /// Limit the engine to this Elo.
    #[arg(long)]
    elo: Option<u16>,

    /// Engine thinking time per move, in milliseconds.
    #[arg(long, default_value_t = 500)]
    movetime: u64,

    /// Your color.
    #[arg(long, value_enum, default_value_t = SideArg::White)]
    color: SideArg,

    /// Time control such as `5`, `5|3` or `10+5`; untimed when omitted.
    #[arg(long)]
    time_control: Option<TimeControlSettings>,

    /// Pause before each engine move, in milliseconds.
    #[arg(long, default_value_t = 0)]
    delay: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("plum_arbiter=info")))
        .init();

    let args = Args::parse();
    let config = ArbiterConfig {
        engine: EngineConfig {
            program: args.engine.clone(),
            ..EngineConfig::default()
        },
        cpu_move_delay: Duration::from_millis(args.delay),
        ..ArbiterConfig::default()
    };
    let registry = MatchRegistry::new(config).context("invalid configuration")?;

    let strength = EngineStrength {
        elo: args.elo,
        movetime_ms: args.movetime,
        ..EngineStrength::default()
    };
    let color = match args.color {
        SideArg::White => Some(Color::White),
        SideArg::Black => Some(Color::Black),
        SideArg::Random => None,
    };

    let me = PlayerId::new();
    let mut printer = spawn_printer(registry.subscribe());
    let id = registry
        .challenge(
            me,
            Opponent::Computer(Some(strength)),
            ChallengeOptions {
                color,
                time_control: args.time_control,
            },
        )
        .await?;
    let ticker = args.time_control.map(|_| spawn_ticker(registry.clone()));

    println!("type `help` for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = &mut printer => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match handle_command(&registry, id, me, line.trim()).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(err) => println!("{err:#}"),
                }
            }
        }
    }

    if let Some(ticker) = ticker {
        ticker.abort();
    }
    registry.shutdown().await;
    Ok(())
}

/// Run one command. Returns true to quit.
async fn handle_command(registry: &MatchRegistry, id: MatchId, me: PlayerId, line: &str) -> anyhow::Result<bool> {
    let mut words = line.split_whitespace();
    match words.next() {
        None => {}
        Some("quit") | Some("exit") => return Ok(true),
        Some("help") => {
            println!("<move>            play a move, e.g. e2e4 or e7e8q");
            println!("resign | draw     resign, or offer a draw");
            println!("promote <q|r|b|n> piece for your next promotion");
            println!("hint              ask the engine for a move");
            println!("retry             ask the engine again after a failure");
            println!("fen | moves | pgn show the game");
            println!("quit");
        }
        Some("resign") => {
            registry.resign(id, me).await?;
        }
        Some("draw") => {
            registry.offer_draw(id, me).await?;
        }
        Some("promote") => {
            let Some(kind) = words.next().and_then(|w| w.chars().next()).and_then(PieceKind::from_char) else {
                bail!("usage: promote <q|r|b|n>");
            };
            registry.set_promotion(id, me, kind).await?;
            println!("next promotion: {kind}");
        }
        Some("hint") => {
            let mv = registry.suggest_move(id, me).await?;
            println!("hint: {}", mv.to_uci());
        }
        Some("retry") => registry.retry_engine_move(id).await?,
        Some("fen") => {
            let snapshot = registry.snapshot(id).await?;
            let replay = snapshot.replay()?;
            if let Some(board) = replay.history.last() {
                println!("{}", board.get_fen());
            }
        }
        Some("moves") => {
            let snapshot = registry.snapshot(id).await?;
            println!("{}", snapshot.moves.join(" "));
        }
        Some("pgn") => {
            let snapshot = registry.snapshot(id).await?;
            print!("{}", write_pgn(&snapshot, &PgnInfo::default())?);
        }
        Some(notation) => {
            registry.submit_move(id, me, notation).await?;
        }
    }
    Ok(false)
}

/// Print events until the match ends.
fn spawn_printer(mut events: broadcast::Receiver<MatchEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    println!("({skipped} events missed)");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            };
            match event.kind {
                MatchEventKind::Started { seats, time_control } => {
                    println!("white: {}, black: {}", seats.white, seats.black);
                    if let Some(control) = time_control {
                        println!("time control: {control}");
                    }
                }
                MatchEventKind::MoveMade { color, uci, status, .. } => {
                    let suffix = if status == GameStatus::Check { " (check)" } else { "" };
                    println!("{color} plays {uci}{suffix}");
                }
                MatchEventKind::EngineFailed { failure, .. } => {
                    println!("engine failed: {failure}; type `retry` to try again");
                }
                MatchEventKind::DrawOffered { by } => println!("{by} offers a draw"),
                MatchEventKind::Completed { outcome, snapshot } => {
                    println!("game over: {outcome}");
                    match write_pgn(&snapshot, &PgnInfo::default()) {
                        Ok(pgn) => print!("{pgn}"),
                        Err(err) => println!("could not export PGN: {err}"),
                    }
                    return;
                }
                MatchEventKind::Aborted { reason, .. } => {
                    println!("game aborted: {reason:?}");
                    return;
                }
                _ => {}
            }
        }
    })
}

fn spawn_ticker(registry: MatchRegistry) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLOCK_TICK);
        let mut last = tokio::time::Instant::now();
        loop {
            interval.tick().await;
            let now = tokio::time::Instant::now();
            registry.tick_clocks(now - last).await;
            last = now;
        }
    })
}
