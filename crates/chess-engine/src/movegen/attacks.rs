//! Attack tables for every piece type.

use crate::Bitboard;
use chess_core::{Color, Piece, Square};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::magics::{self, Magic, Slider};

const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_DELTAS: [(i8, i8); 8] = [
    (0, 1),
    (1, 1),
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

const KNIGHT_ATTACKS: [Bitboard; 64] = leaper_table(&KNIGHT_DELTAS);
const KING_ATTACKS: [Bitboard; 64] = leaper_table(&KING_DELTAS);
const PAWN_ATTACKS: [[Bitboard; 64]; 2] = [
    leaper_table(&[(-1, 1), (1, 1)]),
    leaper_table(&[(-1, -1), (1, -1)]),
];

const fn leaper_table(deltas: &[(i8, i8)]) -> [Bitboard; 64] {
    let mut table = [Bitboard::EMPTY; 64];
    let mut sq = 0u8;
    while sq < 64 {
        let file = (sq % 8) as i8;
        let rank = (sq / 8) as i8;
        let mut bits = 0u64;
        let mut i = 0;
        while i < deltas.len() {
            let (df, dr) = deltas[i];
            if let Some(target) = Square::from_coords(file + df, rank + dr) {
                bits |= target.bitboard();
            }
            i += 1;
        }
        table[sq as usize] = Bitboard(bits);
        sq += 1;
    }
    table
}

/// Seed for the fallback magic search; fixed so every run builds identical tables.
const MAGIC_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Immutable attack lookups, built once and shared by reference.
pub struct AttackTables {
    bishop_magics: [Magic; 64],
    rook_magics: [Magic; 64],
    bishop_table: Vec<Bitboard>,
    rook_table: Vec<Bitboard>,
    /// `between[a * 64 + b]`: squares strictly between two aligned squares.
    between: Vec<Bitboard>,
    /// `line[a * 64 + b]`: the full board line through two aligned squares.
    line: Vec<Bitboard>,
}

impl AttackTables {
    /// Builds every table. Takes a few milliseconds; call it once per process.
    pub fn new() -> Self {
        let mut rng = StdRng::seed_from_u64(MAGIC_SEED);
        let (bishop_magics, bishop_table) = magics::build(Slider::Bishop, &mut rng);
        let (rook_magics, rook_table) = magics::build(Slider::Rook, &mut rng);

        let mut between = vec![Bitboard::EMPTY; 64 * 64];
        let mut line = vec![Bitboard::EMPTY; 64 * 64];
        for a in Square::all() {
            for b in Square::all() {
                if a == b {
                    continue;
                }
                let (a_bb, b_bb) = (Bitboard::from_square(a), Bitboard::from_square(b));
                for slider in [Slider::Bishop, Slider::Rook] {
                    if slider.slow_attacks(a, Bitboard::EMPTY).contains(b) {
                        between[a.idx() * 64 + b.idx()] =
                            slider.slow_attacks(a, b_bb) & slider.slow_attacks(b, a_bb);
                        line[a.idx() * 64 + b.idx()] = (slider.slow_attacks(a, Bitboard::EMPTY)
                            & slider.slow_attacks(b, Bitboard::EMPTY))
                            | a_bb
                            | b_bb;
                    }
                }
            }
        }

        AttackTables {
            bishop_magics,
            rook_magics,
            bishop_table,
            rook_table,
            between,
            line,
        }
    }

    #[inline]
    pub fn knight(&self, sq: Square) -> Bitboard {
        KNIGHT_ATTACKS[sq.idx()]
    }

    #[inline]
    pub fn king(&self, sq: Square) -> Bitboard {
        KING_ATTACKS[sq.idx()]
    }

    /// Squares a pawn of `color` on `sq` attacks.
    #[inline]
    pub fn pawn(&self, color: Color, sq: Square) -> Bitboard {
        PAWN_ATTACKS[color.index()][sq.idx()]
    }

    #[inline]
    pub fn bishop(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.bishop_table[self.bishop_magics[sq.idx()].index(occupied)]
    }

    #[inline]
    pub fn rook(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.rook_table[self.rook_magics[sq.idx()].index(occupied)]
    }

    #[inline]
    pub fn queen(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.bishop(sq, occupied) | self.rook(sq, occupied)
    }

    /// Attack set of any piece. `color` only matters for pawns.
    #[inline]
    pub fn attacks(&self, piece: Piece, color: Color, sq: Square, occupied: Bitboard) -> Bitboard {
        match piece {
            Piece::Pawn => self.pawn(color, sq),
            Piece::Knight => self.knight(sq),
            Piece::Bishop => self.bishop(sq, occupied),
            Piece::Rook => self.rook(sq, occupied),
            Piece::Queen => self.queen(sq, occupied),
            Piece::King => self.king(sq),
        }
    }

    /// Squares strictly between `a` and `b`; empty unless they share a line.
    #[inline]
    pub fn between(&self, a: Square, b: Square) -> Bitboard {
        self.between[a.idx() * 64 + b.idx()]
    }

    /// The whole line through `a` and `b` (edge to edge); empty unless aligned.
    #[inline]
    pub fn line(&self, a: Square, b: Square) -> Bitboard {
        self.line[a.idx() * 64 + b.idx()]
    }

    /// True when `a`, `b` and `c` lie on one line.
    #[inline]
    pub fn aligned(&self, a: Square, b: Square, c: Square) -> bool {
        self.line(a, b).contains(c)
    }
}

impl Default for AttackTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::OnceLock;

    fn tables() -> &'static AttackTables {
        static TABLES: OnceLock<AttackTables> = OnceLock::new();
        TABLES.get_or_init(AttackTables::new)
    }

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn leaper_counts() {
        let t = tables();
        assert_eq!(t.knight(sq("d4")).count(), 8);
        assert_eq!(t.knight(Square::A1).count(), 2);
        assert_eq!(t.knight(sq("a4")).count(), 4);
        assert_eq!(t.king(sq("d4")).count(), 8);
        assert_eq!(t.king(Square::A1).count(), 3);
        assert_eq!(t.king(sq("a4")).count(), 5);
    }

    #[test]
    fn knight_targets() {
        let expected: Bitboard = ["d6", "f6", "g5", "g3", "f2", "d2", "c3", "c5"]
            .into_iter()
            .map(sq)
            .collect();
        assert_eq!(tables().knight(sq("e4")), expected);
    }

    #[test]
    fn pawn_attacks_by_color() {
        let t = tables();
        let white: Bitboard = [sq("c5"), sq("e5")].into_iter().collect();
        let black: Bitboard = [sq("c3"), sq("e3")].into_iter().collect();
        assert_eq!(t.pawn(Color::White, sq("d4")), white);
        assert_eq!(t.pawn(Color::Black, sq("d4")), black);
        assert_eq!(t.pawn(Color::White, sq("a4")), Bitboard::from_square(sq("b5")));
        assert!(t.pawn(Color::White, sq("d8")).is_empty());
    }

    #[test]
    fn slider_counts_on_empty_board() {
        let t = tables();
        assert_eq!(t.bishop(sq("d4"), Bitboard::EMPTY).count(), 13);
        assert_eq!(t.rook(sq("d4"), Bitboard::EMPTY).count(), 14);
        assert_eq!(t.queen(sq("d4"), Bitboard::EMPTY).count(), 27);
        assert_eq!(t.bishop(Square::A1, Bitboard::EMPTY).count(), 7);
        assert_eq!(t.rook(Square::A1, Bitboard::EMPTY).count(), 14);
    }

    #[test]
    fn between_and_line() {
        let t = tables();
        let between: Bitboard = [sq("e2"), sq("e3"), sq("e4")].into_iter().collect();
        assert_eq!(t.between(Square::E1, sq("e5")), between);
        assert_eq!(t.between(sq("e5"), Square::E1), between);
        assert_eq!(t.between(Square::A1, Square::H8).count(), 6);
        assert!(t.between(Square::A1, sq("b3")).is_empty());
        assert!(t.between(Square::A1, Square::B1).is_empty());
        assert_eq!(t.line(sq("c3"), sq("e5")).count(), 8);
        assert!(t.line(sq("c3"), sq("e5")).contains(Square::H8));
        assert!(t.line(Square::A1, sq("b3")).is_empty());
        assert!(t.aligned(Square::E1, sq("e4"), Square::E8));
        assert!(!t.aligned(Square::E1, sq("e4"), Square::D8));
    }

    #[test]
    fn attacks_dispatch() {
        let t = tables();
        let occ = Bitboard::from_square(sq("d6"));
        assert_eq!(
            t.attacks(Piece::Rook, Color::Black, sq("d4"), occ),
            t.rook(sq("d4"), occ)
        );
        assert_eq!(
            t.attacks(Piece::Pawn, Color::Black, sq("d4"), occ),
            t.pawn(Color::Black, sq("d4"))
        );
    }

    proptest! {
        #[test]
        fn magic_lookup_matches_ray_casting(index in 0u8..64, occupied in any::<u64>()) {
            let t = tables();
            let square = Square::from_index(index).unwrap();
            let occ = Bitboard(occupied);
            prop_assert_eq!(t.bishop(square, occ), Slider::Bishop.slow_attacks(square, occ));
            prop_assert_eq!(t.rook(square, occ), Slider::Rook.slow_attacks(square, occ));
        }

        #[test]
        fn lookup_ignores_irrelevant_bits(index in 0u8..64, occupied in any::<u64>()) {
            let t = tables();
            let square = Square::from_index(index).unwrap();
            // The slider's own square never matters.
            let with = Bitboard(occupied).with(square);
            let without = Bitboard(occupied).without(square);
            prop_assert_eq!(t.rook(square, with), t.rook(square, without));
        }
    }
}
