//! Full legal move generation pipeline.
//!
//! Orchestrates piece-wise pseudo-legal generation, applies candidate moves,
//! filters illegal self-check outcomes, and optionally annotates checking moves.

use crate::game_state::{chess_types::*, game_state::GameState};
use crate::move_generation::legal_move_apply::play_unchecked;
use crate::move_generation::legal_move_checks::{attackers_to_square, is_king_in_check};
use crate::move_generation::legal_moves_king::generate_king_moves;
use crate::move_generation::legal_moves_knight::generate_knight_moves;
use crate::move_generation::legal_moves_pawn::generate_pawn_moves;
use crate::move_generation::legal_moves_sliding::generate_sliding_moves;
use crate::move_generation::move_generator::{GeneratedMove, MoveAnnotations, MoveGenerator};
use crate::moves::chess_move::Move;

/// Generator that fills in [`MoveAnnotations`] (check kind, mate).
pub struct LegalMoveGenerator;
/// Generator that skips annotations.
pub struct FastLegalMoveGenerator;

impl MoveGenerator for LegalMoveGenerator {
    fn generate_legal_moves(&self, game_state: &GameState) -> Vec<GeneratedMove> {
        generate_internal(game_state, true)
    }
}

impl MoveGenerator for FastLegalMoveGenerator {
    fn generate_legal_moves(&self, game_state: &GameState) -> Vec<GeneratedMove> {
        generate_internal(game_state, false)
    }
}

/// Legal moves with their successor positions, unannotated.
#[inline]
pub fn generate_legal_moves(game_state: &GameState) -> Vec<GeneratedMove> {
    generate_internal(game_state, false)
}

/// Legal moves for the side to move.
pub fn legal_moves(game_state: &GameState) -> Vec<Move> {
    let mut pseudo = pseudo_legal_moves(game_state);
    let side = game_state.side_to_move;
    pseudo.retain(|mv| !is_king_in_check(&play_unchecked(game_state, mv), side));
    pseudo
}

/// Destination squares of the legal moves starting on `from`, deduplicated
/// across promotion kinds.
pub fn legal_destinations(game_state: &GameState, from: Square) -> Vec<Square> {
    let mut destinations: Vec<Square> = legal_moves(game_state)
        .into_iter()
        .filter(|mv| mv.from == from)
        .map(|mv| mv.to)
        .collect();
    destinations.sort_unstable();
    destinations.dedup();
    destinations
}

fn pseudo_legal_moves(game_state: &GameState) -> Vec<Move> {
    let mut pseudo = Vec::<Move>::with_capacity(64);

    generate_pawn_moves(game_state, &mut pseudo);
    generate_knight_moves(game_state, &mut pseudo);
    generate_sliding_moves(game_state, &mut pseudo);
    generate_king_moves(game_state, &mut pseudo);

    pseudo
}

fn generate_internal(game_state: &GameState, annotate: bool) -> Vec<GeneratedMove> {
    let pseudo = pseudo_legal_moves(game_state);
    let mut legal = Vec::<GeneratedMove>::with_capacity(pseudo.len());

    for mv in pseudo {
        let next = play_unchecked(game_state, &mv);

        // Illegal if own king is in check after move.
        if is_king_in_check(&next, game_state.side_to_move) {
            continue;
        }

        let annotations = if annotate {
            classify_move_annotations(game_state, &mv, &next)
        } else {
            MoveAnnotations::default()
        };

        legal.push(GeneratedMove {
            mv,
            game_after_move: next,
            annotations,
        });
    }

    legal
}

fn classify_move_annotations(prev: &GameState, mv: &Move, next: &GameState) -> MoveAnnotations {
    let Some(defender_king_sq) = next.king_square(next.side_to_move) else {
        return MoveAnnotations::default();
    };

    let checkers = attackers_to_square(next, defender_king_sq, prev.side_to_move);
    if checkers.is_empty() {
        return MoveAnnotations::default();
    }

    let moved_piece_after = mv.promotion.unwrap_or(mv.piece);
    let moved_piece_is_checker = checkers
        .iter()
        .any(|&(sq, piece)| sq == mv.to && piece == moved_piece_after);

    let is_double_check = checkers.len() >= 2;
    let is_discovery_check = !is_double_check
        && !moved_piece_is_checker
        && is_discovered_line_check(mv.from, checkers[0], defender_king_sq);

    MoveAnnotations {
        gives_check: true,
        is_discovery_check,
        is_double_check,
        is_checkmate: legal_moves(next).is_empty(),
    }
}

fn is_discovered_line_check(from: Square, checker: (Square, PieceKind), king_sq: Square) -> bool {
    let (checker_sq, checker_piece) = checker;
    match checker_piece {
        PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen => {}
        _ => return false,
    }

    is_square_between(from, checker_sq, king_sq)
}

fn is_square_between(mid: Square, a: Square, b: Square) -> bool {
    if mid == a || mid == b {
        return false;
    }

    let (af, ar) = (file_of(a) as i8, rank_of(a) as i8);
    let (bf, br) = (file_of(b) as i8, rank_of(b) as i8);
    let (mf, mr) = (file_of(mid) as i8, rank_of(mid) as i8);

    let df = bf - af;
    let dr = br - ar;

    // Must be aligned on rank/file/diagonal.
    if !(df == 0 || dr == 0 || df.abs() == dr.abs()) {
        return false;
    }

    let (step_f, step_r) = (df.signum(), dr.signum());
    let mut f = af + step_f;
    let mut r = ar + step_r;
    while f != bf || r != br {
        if f == mf && r == mr {
            return true;
        }
        f += step_f;
        r += step_r;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::{legal_destinations, legal_moves, FastLegalMoveGenerator, LegalMoveGenerator};
    use crate::game_state::game_state::GameState;
    use crate::move_generation::legal_move_checks::is_king_in_check;
    use crate::move_generation::move_generator::MoveGenerator;
    use crate::utils::algebraic::parse_square;

    #[test]
    fn fast_generator_matches_annotated_generator() {
        let game = GameState::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
            .expect("kiwipete should parse");
        let annotated = LegalMoveGenerator.generate_legal_moves(&game);
        let fast = FastLegalMoveGenerator.generate_legal_moves(&game);
        assert_eq!(annotated.len(), 48);
        assert_eq!(fast.len(), 48);
        assert_eq!(legal_moves(&game).len(), 48);
    }

    #[test]
    fn no_legal_move_leaves_the_mover_in_check() {
        let positions = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "4r1k1/8/8/8/8/8/4B3/4K3 w - - 0 1",
        ];
        for fen in positions {
            let game = GameState::from_fen(fen).expect("FEN should parse");
            for generated in FastLegalMoveGenerator.generate_legal_moves(&game) {
                assert!(
                    !is_king_in_check(&generated.game_after_move, game.side_to_move),
                    "{} leaves the king attacked in {fen}",
                    generated.mv
                );
            }
        }
    }

    #[test]
    fn mating_move_is_annotated() {
        let game = GameState::from_fen("rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq - 0 2")
            .expect("FEN should parse");
        let mate = LegalMoveGenerator
            .generate_legal_moves(&game)
            .into_iter()
            .find(|generated| generated.mv.to_uci() == "d8h4")
            .expect("Qh4 should be legal");
        assert!(mate.annotations.gives_check);
        assert!(mate.annotations.is_checkmate);
        assert!(!mate.annotations.is_double_check);
    }

    #[test]
    fn destinations_for_knight_on_start_square() {
        let game = GameState::new_game();
        let from = parse_square("g1").expect("valid square");
        let expected: Vec<u8> = ["f3", "h3"]
            .iter()
            .map(|name| parse_square(name).expect("valid square"))
            .collect();
        assert_eq!(legal_destinations(&game, from), expected);
    }
}
