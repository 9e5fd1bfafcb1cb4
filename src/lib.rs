//! Crate root module declarations for the Plum Arbiter match host.
//!
//! The rules core (board, move generation, draw detection) sits under
//! `game_state`, `moves` and `move_generation`; matches are driven by
//! `session` and `registry`, and computer moves come from an external UCI
//! engine through `engine`.

pub mod config;
pub mod errors;

pub mod game_state {
    pub mod chess_rules;
    pub mod chess_types;
    pub mod game_state;
}

pub mod moves {
    pub mod chess_move;
    pub mod leaper_attacks;
    pub mod slider_attacks;
}

pub mod move_generation {
    pub mod game_status;
    pub mod legal_move_apply;
    pub mod legal_move_checks;
    pub mod legal_move_generator;
    pub mod legal_move_shared;
    pub mod legal_moves_king;
    pub mod legal_moves_knight;
    pub mod legal_moves_pawn;
    pub mod legal_moves_sliding;
    pub mod move_generator;
    pub mod perft;
}

pub mod engine {
    pub mod engine_bridge;
    pub mod uci_protocol;
}

pub mod session {
    pub mod events;
    pub mod game_session;
    pub mod outcome;
    pub mod participant;
    pub mod snapshot;
    pub mod time_control;
}

pub mod registry {
    pub mod match_registry;
}

pub mod utils {
    pub mod algebraic;
    pub mod fen_generator;
    pub mod fen_parser;
    pub mod long_algebraic;
    pub mod pgn;
}
