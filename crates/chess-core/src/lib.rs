//! Core value types for the search engine.
//!
//! - [`Piece`] and [`Color`]
//! - [`Square`], [`File`] and [`Rank`] for board coordinates
//! - [`Move`], a packed 16-bit move
//! - [`Fen`] for reading and writing positions

mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use color::Color;
pub use fen::{castling, Fen, FenError};
pub use mov::{Move, MoveFlag};
pub use piece::Piece;
pub use square::{File, Rank, Square};
