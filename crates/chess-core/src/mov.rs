//! Compact move encoding.

use crate::{Piece, Square};
use std::fmt;

/// What kind of move a [`Move`] is, beyond its squares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MoveFlag {
    /// Any move without special handling, captures included.
    Normal = 0,
    /// Pawn double push from its starting rank.
    DoublePush = 1,
    /// Kingside castling (O-O).
    CastleKingside = 2,
    /// Queenside castling (O-O-O).
    CastleQueenside = 3,
    /// En passant capture.
    EnPassant = 4,
    PromoteKnight = 5,
    PromoteBishop = 6,
    PromoteRook = 7,
    PromoteQueen = 8,
}

impl MoveFlag {
    const fn from_bits(bits: u16) -> MoveFlag {
        match bits {
            1 => MoveFlag::DoublePush,
            2 => MoveFlag::CastleKingside,
            3 => MoveFlag::CastleQueenside,
            4 => MoveFlag::EnPassant,
            5 => MoveFlag::PromoteKnight,
            6 => MoveFlag::PromoteBishop,
            7 => MoveFlag::PromoteRook,
            8 => MoveFlag::PromoteQueen,
            _ => MoveFlag::Normal,
        }
    }

    /// The promotion flag producing the given piece, if it is a legal promotion target.
    #[inline]
    pub const fn promotion_to(piece: Piece) -> Option<MoveFlag> {
        match piece {
            Piece::Knight => Some(MoveFlag::PromoteKnight),
            Piece::Bishop => Some(MoveFlag::PromoteBishop),
            Piece::Rook => Some(MoveFlag::PromoteRook),
            Piece::Queen => Some(MoveFlag::PromoteQueen),
            _ => None,
        }
    }

    /// Returns the promotion piece if this is a promotion move.
    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        match self {
            MoveFlag::PromoteKnight => Some(Piece::Knight),
            MoveFlag::PromoteBishop => Some(Piece::Bishop),
            MoveFlag::PromoteRook => Some(Piece::Rook),
            MoveFlag::PromoteQueen => Some(Piece::Queen),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        matches!(
            self,
            MoveFlag::PromoteKnight
                | MoveFlag::PromoteBishop
                | MoveFlag::PromoteRook
                | MoveFlag::PromoteQueen
        )
    }

    #[inline]
    pub const fn is_castling(self) -> bool {
        matches!(self, MoveFlag::CastleKingside | MoveFlag::CastleQueenside)
    }
}

/// A chess move: 6 bits from, 6 bits to, 4 bits flag.
///
/// Moves are plain values; whether a move captures depends on the position
/// it is played in.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move(u16);

impl Move {
    /// Placeholder for "no move". Also stands for the null move in search.
    pub const NULL: Move = Move(0);

    #[inline]
    pub const fn new(from: Square, to: Square, flag: MoveFlag) -> Self {
        Move((from.index() as u16) | ((to.index() as u16) << 6) | ((flag as u16) << 12))
    }

    /// Creates a move with [`MoveFlag::Normal`].
    #[inline]
    pub const fn normal(from: Square, to: Square) -> Self {
        Self::new(from, to, MoveFlag::Normal)
    }

    #[inline]
    pub const fn from(self) -> Square {
        // SAFETY: masked to 6 bits, always a valid square index
        unsafe { Square::from_index_unchecked((self.0 & 0x3F) as u8) }
    }

    #[inline]
    pub const fn to(self) -> Square {
        // SAFETY: masked to 6 bits, always a valid square index
        unsafe { Square::from_index_unchecked(((self.0 >> 6) & 0x3F) as u8) }
    }

    #[inline]
    pub const fn flag(self) -> MoveFlag {
        MoveFlag::from_bits(self.0 >> 12)
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        self.flag().is_promotion()
    }

    #[inline]
    pub const fn promotion_piece(self) -> Option<Piece> {
        self.flag().promotion_piece()
    }

    /// The packed 16-bit representation.
    #[inline]
    pub const fn to_raw(self) -> u16 {
        self.0
    }

    /// Rebuilds a move from [`Move::to_raw`] output. Unknown flag bits decode as normal.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        let flag = MoveFlag::from_bits(raw >> 12);
        Move((raw & 0x0FFF) | ((flag as u16) << 12))
    }

    /// Long algebraic (UCI) notation, e.g. "e2e4" or "e7e8q"; the null move is "0000".
    pub fn to_uci(self) -> String {
        if self.is_null() {
            return "0000".to_string();
        }
        let promo = match self.flag() {
            MoveFlag::PromoteKnight => "n",
            MoveFlag::PromoteBishop => "b",
            MoveFlag::PromoteRook => "r",
            MoveFlag::PromoteQueen => "q",
            _ => "",
        };
        format!("{}{}{}", self.from(), self.to(), promo)
    }

    /// Parses long algebraic notation.
    ///
    /// Only the squares and the promotion piece are recovered; the other
    /// flags depend on the position and are resolved by matching against the
    /// legal move list.
    pub fn from_uci(s: &str) -> Option<Self> {
        if s.len() < 4 || s.len() > 5 || !s.is_ascii() {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let flag = match s.chars().nth(4) {
            None => MoveFlag::Normal,
            Some('n' | 'N') => MoveFlag::PromoteKnight,
            Some('b' | 'B') => MoveFlag::PromoteBishop,
            Some('r' | 'R') => MoveFlag::PromoteRook,
            Some('q' | 'Q') => MoveFlag::PromoteQueen,
            Some(_) => return None,
        };
        Some(Move::new(from, to, flag))
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NULL
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({})", self.to_uci())
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{File, Rank};

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn move_encoding() {
        let m = Move::new(sq("e2"), sq("e4"), MoveFlag::DoublePush);
        assert_eq!(m.from(), sq("e2"));
        assert_eq!(m.to(), sq("e4"));
        assert_eq!(m.flag(), MoveFlag::DoublePush);
        assert!(!m.is_null());
    }

    #[test]
    fn raw_preserves_every_flag() {
        let flags = [
            MoveFlag::Normal,
            MoveFlag::DoublePush,
            MoveFlag::CastleKingside,
            MoveFlag::CastleQueenside,
            MoveFlag::EnPassant,
            MoveFlag::PromoteKnight,
            MoveFlag::PromoteBishop,
            MoveFlag::PromoteRook,
            MoveFlag::PromoteQueen,
        ];
        for flag in flags {
            let m = Move::new(sq("b7"), sq("a8"), flag);
            assert_eq!(Move::from_raw(m.to_raw()), m);
        }
        // Garbage flag bits decode as a normal move.
        assert_eq!(Move::from_raw(0xF000 | 0x0123).flag(), MoveFlag::Normal);
    }

    #[test]
    fn uci_rendering() {
        assert_eq!(Move::normal(sq("g1"), sq("f3")).to_uci(), "g1f3");
        assert_eq!(
            Move::new(sq("e7"), sq("e8"), MoveFlag::PromoteQueen).to_uci(),
            "e7e8q"
        );
        assert_eq!(
            Move::new(sq("a2"), sq("b1"), MoveFlag::PromoteKnight).to_uci(),
            "a2b1n"
        );
        assert_eq!(Move::NULL.to_uci(), "0000");
    }

    #[test]
    fn uci_parsing() {
        let m = Move::from_uci("e2e4").unwrap();
        assert_eq!(m.from(), Square::new(File::E, Rank::R2));
        assert_eq!(m.to(), Square::new(File::E, Rank::R4));
        assert_eq!(Move::from_uci("e7e8R").unwrap().flag(), MoveFlag::PromoteRook);
        assert!(Move::from_uci("e7e8x").is_none());
        assert!(Move::from_uci("e2").is_none());
        assert!(Move::from_uci("e2e4qq").is_none());
        assert!(Move::from_uci("e2e9").is_none());
    }

    #[test]
    fn promotion_flags() {
        for piece in Piece::PROMOTIONS {
            let flag = MoveFlag::promotion_to(piece).unwrap();
            assert!(flag.is_promotion());
            assert_eq!(flag.promotion_piece(), Some(piece));
        }
        assert_eq!(MoveFlag::promotion_to(Piece::King), None);
        assert!(MoveFlag::CastleQueenside.is_castling());
        assert!(!MoveFlag::EnPassant.is_castling());
    }

    const FLAGS: [MoveFlag; 9] = [
        MoveFlag::Normal,
        MoveFlag::DoublePush,
        MoveFlag::CastleKingside,
        MoveFlag::CastleQueenside,
        MoveFlag::EnPassant,
        MoveFlag::PromoteKnight,
        MoveFlag::PromoteBishop,
        MoveFlag::PromoteRook,
        MoveFlag::PromoteQueen,
    ];

    proptest::proptest! {
        #[test]
        fn packing_and_uci_keep_squares(from in 0u8..64, to in 0u8..64, flag in 0usize..9) {
            proptest::prop_assume!(from != to);
            let m = Move::new(
                Square::from_index(from).unwrap(),
                Square::from_index(to).unwrap(),
                FLAGS[flag],
            );
            proptest::prop_assert_eq!(Move::from_raw(m.to_raw()), m);
            let parsed = Move::from_uci(&m.to_uci()).unwrap();
            proptest::prop_assert_eq!(parsed.from(), m.from());
            proptest::prop_assert_eq!(parsed.to(), m.to());
            proptest::prop_assert_eq!(parsed.promotion_piece(), m.promotion_piece());
        }
    }
}
