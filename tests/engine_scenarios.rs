//! End-to-end scenarios against a scripted fake UCI engine.
//!
//! The engine is a `/bin/sh` loop. Its first argument picks a behaviour for
//! `go`: `script` answers with the remaining arguments in order, `late` does
//! the same after a second, `crash` exits, `slow` only answers after `stop`,
//! and `hang` never answers. `sleepy` scripts replies like `script` but takes
//! a second before it reads the handshake.

use std::time::Duration;

use plum_arbiter::config::{ArbiterConfig, EngineConfig};
use plum_arbiter::engine::engine_bridge::{EngineBridge, EngineStrength};
use plum_arbiter::errors::{EngineFailure, MatchError};
use plum_arbiter::game_state::chess_types::Color;
use plum_arbiter::game_state::game_state::GameState;
use plum_arbiter::registry::match_registry::{ChallengeOptions, MatchRegistry};
use plum_arbiter::session::events::{MatchEvent, MatchEventKind};
use plum_arbiter::session::outcome::{Outcome, SessionStatus, WinReason};
use plum_arbiter::session::participant::{Opponent, PlayerId};
use plum_arbiter::session::snapshot::SessionSnapshot;
use tokio::sync::broadcast;

const FAKE_ENGINE: &str = r#"
mode="$1"; shift
if [ "$mode" = sleepy ]; then sleep 1; fi
while IFS= read -r line; do
  case "$line" in
    uci) echo "id name fake-engine"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      case "$mode" in
        crash) exit 3 ;;
        slow|hang) ;;
        late)
          sleep 1
          if [ "$#" -gt 0 ]; then echo "bestmove $1"; shift; else echo "bestmove (none)"; fi ;;
        *)
          echo "info depth 1 score cp 13"
          if [ "$#" -gt 0 ]; then echo "bestmove $1"; shift; else echo "bestmove (none)"; fi ;;
      esac ;;
    stop) if [ "$mode" = slow ]; then echo "bestmove 0000"; fi ;;
    quit) exit 0 ;;
  esac
done
"#;

const WAIT: Duration = Duration::from_secs(5);

fn fake_engine(mode: &str, replies: &[&str]) -> EngineConfig {
    let mut args = vec![
        "-c".to_owned(),
        FAKE_ENGINE.to_owned(),
        "fake-engine".to_owned(),
        mode.to_owned(),
    ];
    args.extend(replies.iter().map(|reply| (*reply).to_owned()));
    EngineConfig {
        program: "/bin/sh".into(),
        args,
        handshake_timeout: Duration::from_secs(2),
        response_grace: Duration::from_millis(200),
        shutdown_timeout: Duration::from_millis(500),
        ..EngineConfig::default()
    }
}

fn quick() -> EngineStrength {
    EngineStrength {
        movetime_ms: 50,
        ..EngineStrength::default()
    }
}

fn registry(engine: EngineConfig) -> MatchRegistry {
    MatchRegistry::new(ArbiterConfig {
        engine,
        default_strength: quick(),
        ..ArbiterConfig::default()
    })
    .expect("valid config")
}

fn playing(color: Color) -> ChallengeOptions {
    ChallengeOptions {
        color: Some(color),
        time_control: None,
    }
}

/// Wait for the first event `pick` accepts.
async fn wait_for<T>(
    events: &mut broadcast::Receiver<MatchEvent>,
    mut pick: impl FnMut(MatchEventKind) -> Option<T>,
) -> T {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event stream open");
            if let Some(found) = pick(event.kind) {
                return found;
            }
        }
    })
    .await
    .expect("event should arrive in time")
}

async fn engine_failure(events: &mut broadcast::Receiver<MatchEvent>) -> EngineFailure {
    wait_for(events, |kind| match kind {
        MatchEventKind::EngineFailed { failure, .. } => Some(failure),
        _ => None,
    })
    .await
}

async fn engine_move(events: &mut broadcast::Receiver<MatchEvent>, color: Color) -> String {
    wait_for(events, |kind| match kind {
        MatchEventKind::MoveMade { color: mover, uci, .. } if mover == color => Some(uci),
        _ => None,
    })
    .await
}

#[tokio::test]
async fn engine_answers_human_moves() {
    let registry = registry(fake_engine("script", &["e7e5", "b8c6"]));
    let mut events = registry.subscribe();
    let me = PlayerId::new();

    let id = registry
        .challenge(me, Opponent::Computer(None), playing(Color::White))
        .await
        .expect("match starts");

    registry.submit_move(id, me, "e2e4").await.expect("legal");
    assert_eq!(engine_move(&mut events, Color::Black).await, "e7e5");
    registry.submit_move(id, me, "g1f3").await.expect("legal");
    assert_eq!(engine_move(&mut events, Color::Black).await, "b8c6");

    let snapshot = registry.snapshot(id).await.expect("live match");
    assert_eq!(snapshot.moves, vec!["e2e4", "e7e5", "g1f3", "b8c6"]);
    let text = snapshot.to_json().expect("serializes");
    assert_eq!(SessionSnapshot::from_json(&text).expect("deserializes"), snapshot);

    registry.shutdown().await;
}

#[tokio::test]
async fn engine_crash_leaves_the_match_active() {
    let registry = registry(fake_engine("crash", &[]));
    let mut events = registry.subscribe();
    let me = PlayerId::new();

    let id = registry
        .challenge(me, Opponent::Computer(None), playing(Color::Black))
        .await
        .expect("match starts");

    let failure = engine_failure(&mut events).await;
    assert!(
        matches!(failure, EngineFailure::ProcessExited | EngineFailure::Io(_)),
        "unexpected failure {failure:?}"
    );

    let snapshot = registry.snapshot(id).await.expect("still live");
    assert_eq!(snapshot.status, SessionStatus::Active);
    assert!(snapshot.moves.is_empty());
    assert_eq!(registry.submit_move(id, me, "e7e5").await, Err(MatchError::NotYourTurn));

    // A retry starts a fresh process, which crashes the same way.
    registry.retry_engine_move(id).await.expect("retry scheduled");
    let again = engine_failure(&mut events).await;
    assert!(matches!(again, EngineFailure::ProcessExited | EngineFailure::Io(_)));
    assert_eq!(registry.snapshot(id).await.expect("still live").status, SessionStatus::Active);

    registry.shutdown().await;
}

#[tokio::test]
async fn illegal_suggestion_is_rejected() {
    let registry = registry(fake_engine("script", &["e2e5"]));
    let mut events = registry.subscribe();
    let me = PlayerId::new();

    let id = registry
        .challenge(me, Opponent::Computer(None), playing(Color::Black))
        .await
        .expect("match starts");

    assert_eq!(
        engine_failure(&mut events).await,
        EngineFailure::IllegalSuggestion("e2e5".to_owned())
    );
    assert!(registry.snapshot(id).await.expect("live").moves.is_empty());
    registry.shutdown().await;
}

#[tokio::test]
async fn silent_engine_times_out() {
    let registry = registry(fake_engine("hang", &[]));
    let mut events = registry.subscribe();
    let me = PlayerId::new();

    let id = registry
        .challenge(me, Opponent::Computer(None), playing(Color::Black))
        .await
        .expect("match starts");

    // movetime 50 ms plus 200 ms grace.
    assert_eq!(engine_failure(&mut events).await, EngineFailure::Timeout { millis: 250 });
    assert_eq!(registry.snapshot(id).await.expect("live").status, SessionStatus::Active);
    registry.shutdown().await;
}

#[tokio::test]
async fn thinking_engine_blocks_moves_until_the_game_ends() {
    let registry = registry(fake_engine("slow", &[]));
    let mut events = registry.subscribe();
    let me = PlayerId::new();

    let id = registry
        .challenge(me, Opponent::Computer(None), playing(Color::Black))
        .await
        .expect("match starts");

    assert_eq!(registry.submit_move(id, me, "e7e5").await, Err(MatchError::Busy));
    assert_eq!(registry.retry_engine_move(id).await, Err(MatchError::Busy));

    let outcome = registry.resign(id, me).await.expect("resigning is always allowed");
    assert_eq!(
        outcome,
        Outcome::Win {
            winner: Color::White,
            reason: WinReason::Resignation
        }
    );
    wait_for(&mut events, |kind| kind.is_terminal().then_some(())).await;
    assert_eq!(registry.active_match_count(), 0);
    assert_eq!(registry.match_of(me), None);
}

#[tokio::test]
async fn bridge_allows_one_request_and_cancels_on_drop() {
    let bridge = EngineBridge::spawn(&fake_engine("slow", &[])).await.expect("handshake");
    let board = GameState::new_game();

    let pending = bridge
        .request_move(&board, &board, &[], &EngineStrength::default())
        .expect("first request accepted");
    assert!(matches!(
        bridge.request_move(&board, &board, &[], &EngineStrength::default()),
        Err(MatchError::Busy)
    ));

    pending.cancel();
    tokio::time::timeout(WAIT, async {
        while bridge.is_busy() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("cancelled request should drain");
    assert!(bridge.is_alive());

    tokio::time::timeout(WAIT, bridge.shutdown())
        .await
        .expect("shutdown should finish");
}

#[tokio::test]
async fn computer_plays_itself_until_the_script_runs_out() {
    let registry = registry(fake_engine("script", &["e2e4", "e7e5", "g1f3", "b8c6"]));
    let mut events = registry.subscribe();
    let watcher = PlayerId::new();

    let id = registry
        .challenge(
            watcher,
            Opponent::ComputerVsComputer {
                white: None,
                black: Some(EngineStrength {
                    elo: Some(1500),
                    ..quick()
                }),
            },
            ChallengeOptions::default(),
        )
        .await
        .expect("match starts");

    assert!(matches!(engine_failure(&mut events).await, EngineFailure::Malformed(_)));
    let snapshot = registry.snapshot(id).await.expect("live");
    assert_eq!(snapshot.moves, vec!["e2e4", "e7e5", "g1f3", "b8c6"]);

    assert_eq!(registry.player_disconnected(watcher).await, Ok(Some(id)));
    assert_eq!(registry.active_match_count(), 0);
}

#[tokio::test]
async fn shutdown_with_a_request_in_flight_returns_the_game() {
    let registry = registry(fake_engine("slow", &[]));
    let me = PlayerId::new();
    let id = registry
        .challenge(me, Opponent::Computer(None), playing(Color::Black))
        .await
        .expect("match starts");

    let saved = tokio::time::timeout(WAIT, registry.shutdown())
        .await
        .expect("shutdown should not wait for the engine");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].match_id, id);
    assert!(saved[0].moves.is_empty());
}

#[tokio::test]
async fn fools_mate_between_players() {
    let registry = registry(fake_engine("crash", &[]));
    let mut events = registry.subscribe();
    let (alice, bob) = (PlayerId::new(), PlayerId::new());

    let id = registry
        .challenge(alice, Opponent::Player(bob), playing(Color::White))
        .await
        .expect("challenge");
    registry.accept_challenge(id, bob).await.expect("accept");

    for (player, mv) in [(alice, "f2f3"), (bob, "e7e5"), (alice, "g2g4")] {
        registry.submit_move(id, player, mv).await.expect("legal");
    }
    let result = registry.submit_move(id, bob, "d8h4").await.expect("mate");
    let expected = Outcome::Win {
        winner: Color::Black,
        reason: WinReason::Checkmate,
    };
    assert_eq!(result.outcome, Some(expected));

    let final_snapshot = wait_for(&mut events, |kind| match kind {
        MatchEventKind::Completed { snapshot, .. } => Some(snapshot),
        _ => None,
    })
    .await;
    assert_eq!(final_snapshot.status, SessionStatus::Completed { outcome: expected });
    let text = final_snapshot.to_json().expect("serializes");
    assert_eq!(SessionSnapshot::from_json(&text).expect("deserializes"), *final_snapshot);
    assert!(matches!(
        registry.submit_move(id, alice, "a2a3").await,
        Err(MatchError::InvalidState(_))
    ));
    assert_eq!(registry.snapshot(id).await.expect("final state"), *final_snapshot);
}

#[tokio::test]
async fn depth_requests_outlast_the_movetime() {
    let engine = EngineConfig {
        depth_search_limit: Duration::from_secs(3),
        ..fake_engine("late", &["e2e4"])
    };
    let bridge = EngineBridge::spawn(&engine).await.expect("handshake");
    let board = GameState::new_game();
    let deep = EngineStrength {
        depth: Some(12),
        ..quick()
    };

    let pending = bridge.request_move(&board, &board, &[], &deep).expect("accepted");
    let mv = tokio::time::timeout(WAIT, pending)
        .await
        .expect("reply in time")
        .expect("a depth search has until the search limit");
    assert_eq!(mv.to_uci(), "e2e4");

    let pending = bridge.request_move(&board, &board, &[], &quick()).expect("accepted");
    let timed_out = tokio::time::timeout(WAIT, pending).await.expect("deadline fires");
    assert_eq!(timed_out, Err(EngineFailure::Timeout { millis: 250 }));
    bridge.shutdown().await;
}

#[tokio::test]
async fn starting_engine_does_not_hold_the_match() {
    let registry = registry(fake_engine("sleepy", &["e2e4"]));
    let me = PlayerId::new();
    let id = registry
        .challenge(me, Opponent::Computer(None), playing(Color::Black))
        .await
        .expect("match starts");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let quick_reply = Duration::from_millis(500);
    let snapshot = tokio::time::timeout(quick_reply, registry.snapshot(id))
        .await
        .expect("snapshot while the engine starts")
        .expect("live");
    assert!(snapshot.moves.is_empty());
    let outcome = tokio::time::timeout(quick_reply, registry.resign(id, me))
        .await
        .expect("resign while the engine starts")
        .expect("resign");
    assert_eq!(
        outcome,
        Outcome::Win {
            winner: Color::White,
            reason: WinReason::Resignation
        }
    );
    assert_eq!(registry.active_match_count(), 0);
}
