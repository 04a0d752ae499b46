//! Static evaluation seam.
//!
//! The search only asks for a score of the side to move; [`Evaluator`] is the
//! boundary. [`PieceSquareEvaluator`] is a small reference implementation:
//! material plus piece-square tables, with the king table tapered between
//! middlegame and endgame by the remaining non-pawn material.

use chess_core::{Color, Piece, Square};
use chess_engine::Position;

/// Scores a position in centipawns, positive when the side to move is better.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, position: &Position) -> i32;
}

impl<F> Evaluator for F
where
    F: Fn(&Position) -> i32 + Send + Sync,
{
    fn evaluate(&self, position: &Position) -> i32 {
        self(position)
    }
}

/// Piece values in centipawns
const PIECE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 0];

// Piece-square tables, written rank 8 first as seen from White's side of the
// board. Index with `square ^ 56` for White and `square` for Black.
#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
     0,  0,   0,   0,   0,   0,  0,  0,
    50, 50,  50,  50,  50,  50, 50, 50,
    10, 10,  20,  30,  30,  20, 10, 10,
     5,  5,  10,  25,  25,  10,  5,  5,
     0,  0,   0,  20,  20,   0,  0,  0,
     5, -5, -10,   0,   0, -10, -5,  5,
     5, 10,  10, -20, -20,  10, 10,  5,
     0,  0,   0,   0,   0,   0,  0,  0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
    -20, -10, -10, -5, -5, -10, -10, -20,
    -10,   0,   0,  0,  0,   0,   0, -10,
    -10,   0,   5,  5,  5,   5,   0, -10,
     -5,   0,   5,  5,  5,   5,   0,  -5,
      0,   0,   5,  5,  5,   5,   0,  -5,
    -10,   5,   5,  5,  5,   5,   0, -10,
    -10,   0,   5,  0,  0,   0,   0, -10,
    -20, -10, -10, -5, -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING_MIDDLEGAME_PST: [i32; 64] = [
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,   0,   0,   0,   0,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

#[rustfmt::skip]
const KING_ENDGAME_PST: [i32; 64] = [
    -50, -40, -30, -20, -20, -30, -40, -50,
    -30, -20, -10,   0,   0, -10, -20, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -30,   0,   0,   0,   0, -30, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];

/// Game phase weight of each piece; a full board sums to [`MAX_PHASE`].
const PHASE_WEIGHTS: [i32; 6] = [0, 1, 1, 2, 4, 0];
const MAX_PHASE: i32 = 24;

/// Material and piece-square evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PieceSquareEvaluator;

impl PieceSquareEvaluator {
    pub fn new() -> Self {
        PieceSquareEvaluator
    }

    /// Non-pawn material phase, from 0 (bare kings and pawns) to [`MAX_PHASE`].
    fn phase(position: &Position) -> i32 {
        Piece::ALL
            .into_iter()
            .map(|piece| {
                PHASE_WEIGHTS[piece.index()] * position.pieces_of_kind(piece).count() as i32
            })
            .sum::<i32>()
            .min(MAX_PHASE)
    }

    /// Score of one side's pieces, from that side's point of view.
    fn side_score(position: &Position, color: Color, phase: i32) -> i32 {
        let mut score = 0;
        for piece in Piece::ALL {
            for sq in position.pieces(piece, color) {
                let idx = pst_index(sq, color);
                score += PIECE_VALUES[piece.index()];
                score += match piece {
                    Piece::Pawn => PAWN_PST[idx],
                    Piece::Knight => KNIGHT_PST[idx],
                    Piece::Bishop => BISHOP_PST[idx],
                    Piece::Rook => ROOK_PST[idx],
                    Piece::Queen => QUEEN_PST[idx],
                    Piece::King => {
                        (KING_MIDDLEGAME_PST[idx] * phase
                            + KING_ENDGAME_PST[idx] * (MAX_PHASE - phase))
                            / MAX_PHASE
                    }
                };
            }
        }
        score
    }
}

#[inline]
fn pst_index(sq: Square, color: Color) -> usize {
    match color {
        Color::White => sq.flip_rank().idx(),
        Color::Black => sq.idx(),
    }
}

impl Evaluator for PieceSquareEvaluator {
    fn evaluate(&self, position: &Position) -> i32 {
        let phase = Self::phase(position);
        let white = Self::side_score(position, Color::White, phase);
        let black = Self::side_score(position, Color::Black, phase);
        match position.side_to_move() {
            Color::White => white - black,
            Color::Black => black - white,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(fen: &str) -> i32 {
        PieceSquareEvaluator.evaluate(&Position::from_fen(fen).unwrap())
    }

    #[test]
    fn startpos_is_balanced() {
        assert_eq!(PieceSquareEvaluator.evaluate(&Position::startpos()), 0);
    }

    #[test]
    fn symmetric_for_side_to_move() {
        let white = eval("4k3/8/8/8/3P4/8/8/4K3 w - - 0 1");
        let black = eval("4k3/8/8/3p4/8/8/8/4K3 b - - 0 1");
        assert_eq!(white, black);
        assert_eq!(
            eval("4k3/8/8/8/3P4/8/8/4K3 w - - 0 1"),
            -eval("4k3/8/8/8/3P4/8/8/4K3 b - - 0 1")
        );
    }

    #[test]
    fn material_dominates() {
        assert!(eval("4k3/8/8/8/8/8/8/3QK3 w - - 0 1") > 800);
        assert!(eval("4k3/8/8/8/8/8/8/3QK3 b - - 0 1") < -800);
    }

    #[test]
    fn pawn_tables_reward_advancement() {
        let home = eval("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        let advanced = eval("4k3/4P3/8/8/8/8/8/4K3 w - - 0 1");
        assert!(advanced > home);
    }

    #[test]
    fn endgame_king_prefers_centre() {
        let corner = eval("7k/8/8/8/8/8/8/K7 w - - 0 1");
        let centre = eval("7k/8/8/8/3K4/8/8/8 w - - 0 1");
        assert!(centre > corner);
    }

    #[test]
    fn closures_are_evaluators() {
        let material_only = |position: &Position| position.occupied().count() as i32;
        assert_eq!(material_only.evaluate(&Position::startpos()), 32);
    }
}
