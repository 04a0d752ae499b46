//! Bitboard board representation and legal move generation.
//!
//! This crate provides:
//! - [`Bitboard`] - 64-bit square sets with efficient operations
//! - [`AttackTables`] - leaper tables and magic-bitboard slider lookups,
//!   built once with [`AttackTables::new`] and passed by reference
//! - [`Position`] - board state with incremental Zobrist hashing and an
//!   owned undo stack for make/unmake
//! - Legal move generation driven by check and pin masks
//! - Static exchange evaluation and perft
//!
//! # Example
//!
//! ```
//! use chess_engine::{generate_moves, perft, AttackTables, MoveFilter, Position};
//!
//! let tables = AttackTables::new();
//! let mut position = Position::startpos();
//! let moves = generate_moves(&tables, &position, MoveFilter::All);
//! assert_eq!(moves.len(), 20);
//! assert_eq!(perft(&tables, &mut position, 3), 8902);
//! ```

mod bitboard;
pub mod movegen;
mod position;
mod see;
mod zobrist;

pub use bitboard::Bitboard;
pub use movegen::perft::{perft, perft_divide};
pub use movegen::{
    find_move, generate_moves, is_in_check, pinned_pieces, AttackTables, MoveFilter, MoveList,
};
pub use position::{CastlingRights, Position, PositionError};
pub use see::{see, see_ge};
pub use zobrist::{ZobristKeys, ZOBRIST};
