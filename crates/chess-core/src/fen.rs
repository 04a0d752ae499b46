//! FEN (Forsyth-Edwards Notation) tokenizing and validation.
//!
//! [`Fen`] checks syntax only. Whether the described position can occur
//! (king counts, pawns on back ranks, a plausible en-passant square) is
//! decided by the engine when it builds its board.

use std::fmt;

use thiserror::Error;

use crate::{Color, Piece, Square};

/// Errors that can occur when parsing FEN strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 4 or 6 fields, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),
}

/// Castling bits in FEN order: `K`, `Q`, `k`, `q`.
pub mod castling {
    pub const WHITE_KINGSIDE: u8 = 0b0001;
    pub const WHITE_QUEENSIDE: u8 = 0b0010;
    pub const BLACK_KINGSIDE: u8 = 0b0100;
    pub const BLACK_QUEENSIDE: u8 = 0b1000;
}

/// A syntactically valid FEN record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fen {
    /// Board contents indexed by square (a1 = 0).
    pub board: [Option<(Piece, Color)>; 64],
    pub side_to_move: Color,
    /// Castling bits, see [`castling`].
    pub castling: u8,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Fen {
    /// The standard starting position.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Parses a FEN string.
    ///
    /// The two clock fields may be omitted (EPD style), in which case they
    /// default to `0 1`.
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let board = parse_placement(parts[0])?;

        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = parse_castling(parts[2])?;
        let en_passant = parse_en_passant(parts[3])?;

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let halfmove = parts[4]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidHalfmoveClock(parts[4].to_string()))?;
            let fullmove = parts[5]
                .parse::<u32>()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| FenError::InvalidFullmoveNumber(parts[5].to_string()))?;
            (halfmove, fullmove)
        } else {
            (0, 1)
        };

        Ok(Fen {
            board,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    /// Renders the piece placement field.
    pub fn placement(&self) -> String {
        let mut out = String::with_capacity(72);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.board[rank * 8 + file] {
                    Some((piece, color)) => {
                        if empty > 0 {
                            out.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        out.push(piece.to_fen_char(color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push(char::from(b'0' + empty));
            }
            if rank > 0 {
                out.push('/');
            }
        }
        out
    }

    fn castling_field(&self) -> String {
        if self.castling == 0 {
            return "-".to_string();
        }
        [
            (castling::WHITE_KINGSIDE, 'K'),
            (castling::WHITE_QUEENSIDE, 'Q'),
            (castling::BLACK_KINGSIDE, 'k'),
            (castling::BLACK_QUEENSIDE, 'q'),
        ]
        .into_iter()
        .filter(|(bit, _)| self.castling & bit != 0)
        .map(|(_, c)| c)
        .collect()
    }
}

impl fmt::Display for Fen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ep = self
            .en_passant
            .map_or_else(|| "-".to_string(), |sq| sq.to_algebraic());
        write!(
            f,
            "{} {} {} {} {} {}",
            self.placement(),
            self.side_to_move.to_fen_char(),
            self.castling_field(),
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

fn parse_placement(placement: &str) -> Result<[Option<(Piece, Color)>; 64], FenError> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(FenError::InvalidPiecePlacement(format!(
            "expected 8 ranks, got {}",
            ranks.len()
        )));
    }

    let mut board = [None; 64];
    for (i, text) in ranks.iter().enumerate() {
        let rank = 7 - i;
        let mut file = 0usize;
        for c in text.chars() {
            if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                file += skip as usize;
            } else if let Some(piece) = Piece::from_fen_char(c) {
                if file < 8 {
                    board[rank * 8 + file] = Some(piece);
                }
                file += 1;
            } else {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "invalid character '{}' in rank {}",
                    c,
                    rank + 1
                )));
            }
        }
        if file != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "rank {} has {} squares, expected 8",
                rank + 1,
                file
            )));
        }
    }
    Ok(board)
}

fn parse_castling(field: &str) -> Result<u8, FenError> {
    if field == "-" {
        return Ok(0);
    }
    let mut bits = 0u8;
    for c in field.chars() {
        let bit = match c {
            'K' => castling::WHITE_KINGSIDE,
            'Q' => castling::WHITE_QUEENSIDE,
            'k' => castling::BLACK_KINGSIDE,
            'q' => castling::BLACK_QUEENSIDE,
            _ => {
                return Err(FenError::InvalidCastlingRights(format!(
                    "invalid character '{}' in '{}'",
                    c, field
                )))
            }
        };
        if bits & bit != 0 {
            return Err(FenError::InvalidCastlingRights(format!(
                "duplicate '{}' in '{}'",
                c, field
            )));
        }
        bits |= bit;
    }
    Ok(bits)
}

fn parse_en_passant(field: &str) -> Result<Option<Square>, FenError> {
    if field == "-" {
        return Ok(None);
    }
    match Square::from_algebraic(field) {
        Some(sq) if sq.rank_index() == 2 || sq.rank_index() == 5 => Ok(Some(sq)),
        _ => Err(FenError::InvalidEnPassantSquare(field.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_startpos() {
        let fen = Fen::parse(Fen::STARTPOS).unwrap();
        assert_eq!(fen.side_to_move, Color::White);
        assert_eq!(fen.castling, 0b1111);
        assert_eq!(fen.en_passant, None);
        assert_eq!(fen.board[Square::E1.idx()], Some((Piece::King, Color::White)));
        assert_eq!(fen.board[Square::D8.idx()], Some((Piece::Queen, Color::Black)));
        assert_eq!(fen.board.iter().flatten().count(), 32);
    }

    #[test]
    fn display_roundtrip() {
        for text in [
            Fen::STARTPOS,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 12 40",
            "4k3/8/8/8/8/8/8/4K3 w Kq - 0 1",
        ] {
            assert_eq!(Fen::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn clocks_are_optional() {
        let fen = Fen::parse("4k3/8/8/8/8/8/8/4K3 b - -").unwrap();
        assert_eq!(fen.side_to_move, Color::Black);
        assert_eq!(fen.halfmove_clock, 0);
        assert_eq!(fen.fullmove_number, 1);
        assert!(matches!(
            Fen::parse("4k3/8/8/8/8/8/8/4K3 b - - 0"),
            Err(FenError::InvalidPartCount(5))
        ));
    }

    #[test]
    fn rejects_bad_placement() {
        for text in [
            "8/8/8/8/8/8/8 w - - 0 1",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPXPPP/RNBQKBNR w KQkq - 0 1",
            "rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "7/8/8/8/8/8/8/8 w - - 0 1",
            "08/8/8/8/8/8/8/8 w - - 0 1",
        ] {
            assert!(
                matches!(Fen::parse(text), Err(FenError::InvalidPiecePlacement(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn rejects_bad_fields() {
        assert!(matches!(
            Fen::parse("invalid"),
            Err(FenError::InvalidPartCount(1))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 x KQkq - 0 1"),
            Err(FenError::InvalidActiveColor(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w XYZ - 0 1"),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w KK - 0 1"),
            Err(FenError::InvalidCastlingRights(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - e4 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - x3 0 1"),
            Err(FenError::InvalidEnPassantSquare(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - - abc 1"),
            Err(FenError::InvalidHalfmoveClock(_))
        ));
        assert!(matches!(
            Fen::parse("8/8/8/8/8/8/8/8 w - - 0 0"),
            Err(FenError::InvalidFullmoveNumber(_))
        ));
    }

    #[test]
    fn en_passant_square() {
        let fen = Fen::parse("8/8/8/8/8/8/8/8 b - d6 0 1").unwrap();
        assert_eq!(fen.en_passant, Square::from_algebraic("d6"));
    }

    #[test]
    fn error_messages_carry_input() {
        let err = Fen::parse("8/8/8/8/8/8/8/8 w - - 0 xyz").unwrap_err();
        assert!(err.to_string().contains("xyz"));
        let err = Fen::parse("8/8/8/8/8/8/8/8 w - z9 0 1").unwrap_err();
        assert!(err.to_string().contains("z9"));
    }
}
