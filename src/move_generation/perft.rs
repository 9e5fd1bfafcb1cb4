//! Move-path enumeration for validating the generator against reference counts.

use std::sync::Arc;
use std::thread;

use crate::game_state::game_state::GameState;
use crate::move_generation::legal_move_generator::{generate_legal_moves, legal_moves};
use crate::move_generation::move_generator::{GeneratedMove, MoveGenerator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerftCounts {
    pub nodes: usize,
    pub captures: usize,
    pub en_passant: usize,
    pub castles: usize,
    pub promotions: usize,
    pub checks: usize,
    pub discovery_checks: usize,
    pub double_checks: usize,
    pub checkmates: usize,
}

impl PerftCounts {
    fn merge(&mut self, rhs: PerftCounts) {
        self.nodes += rhs.nodes;
        self.captures += rhs.captures;
        self.en_passant += rhs.en_passant;
        self.castles += rhs.castles;
        self.promotions += rhs.promotions;
        self.checks += rhs.checks;
        self.discovery_checks += rhs.discovery_checks;
        self.double_checks += rhs.double_checks;
        self.checkmates += rhs.checkmates;
    }

    fn record_leaf(&mut self, generated: &GeneratedMove) {
        self.nodes += 1;

        let mv = &generated.mv;
        if mv.is_capture() {
            self.captures += 1;
        }
        if mv.is_en_passant() {
            self.en_passant += 1;
        }
        if mv.is_castling() {
            self.castles += 1;
        }
        if mv.promotion.is_some() {
            self.promotions += 1;
        }

        let annotations = generated.annotations;
        if annotations.gives_check {
            self.checks += 1;
        }
        if annotations.is_discovery_check {
            self.discovery_checks += 1;
        }
        if annotations.is_double_check {
            self.double_checks += 1;
        }
        if annotations.is_checkmate {
            self.checkmates += 1;
        }
    }
}

/// Leaf counters at `depth`. Check counters are only populated by a generator
/// that annotates its moves.
pub fn perft<G: MoveGenerator>(generator: &G, game_state: &GameState, depth: u8) -> PerftCounts {
    if depth == 0 {
        return PerftCounts {
            nodes: 1,
            ..PerftCounts::default()
        };
    }

    let mut total = PerftCounts::default();
    for mv in generator.generate_legal_moves(game_state) {
        perft_recurse(generator, &mv, depth, 1, &mut total);
    }
    total
}

/// Same as [`perft`] with one worker thread per root move.
pub fn perft_multi_threaded(
    generator: Arc<dyn MoveGenerator>,
    game_state: &GameState,
    depth: u8,
) -> PerftCounts {
    if depth == 0 {
        return PerftCounts {
            nodes: 1,
            ..PerftCounts::default()
        };
    }

    let handles: Vec<_> = generator
        .generate_legal_moves(game_state)
        .into_iter()
        .map(|mv| {
            let generator_ref = Arc::clone(&generator);
            thread::spawn(move || {
                let mut local = PerftCounts::default();
                perft_recurse(generator_ref.as_ref(), &mv, depth, 1, &mut local);
                local
            })
        })
        .collect();

    let mut total = PerftCounts::default();
    for handle in handles {
        match handle.join() {
            Ok(local) => total.merge(local),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
    total
}

/// Node count only, with bulk counting at the last ply.
pub fn perft_nodes(game_state: &GameState, depth: u8) -> u64 {
    match depth {
        0 => 1,
        1 => legal_moves(game_state).len() as u64,
        _ => generate_legal_moves(game_state)
            .iter()
            .map(|generated| perft_nodes(&generated.game_after_move, depth - 1))
            .sum(),
    }
}

fn perft_recurse<G: MoveGenerator + ?Sized>(
    generator: &G,
    mv: &GeneratedMove,
    search_depth: u8,
    current_depth: u8,
    counts: &mut PerftCounts,
) {
    if current_depth == search_depth {
        counts.record_leaf(mv);
        return;
    }

    for child in generator.generate_legal_moves(&mv.game_after_move) {
        perft_recurse(generator, &child, search_depth, current_depth + 1, counts);
    }
}
