//! Static exchange evaluation.
//!
//! Plays out the sequence of captures on the target square of a move, each
//! side always recapturing with its least valuable attacker, and returns the
//! material balance for the side making the move when both sides stop at
//! the best moment. Sliders uncovered behind a capturer join the exchange.

use crate::{AttackTables, Bitboard, Position};
use chess_core::{Move, MoveFlag, Piece};

/// Material won (positive) or lost by playing `mv`, in centipawns.
///
/// Castling scores 0. `mv` is assumed pseudo-legal for `position`.
pub fn see(tables: &AttackTables, position: &Position, mv: Move) -> i32 {
    if mv.is_null() || mv.flag().is_castling() {
        return 0;
    }
    let from = mv.from();
    let to = mv.to();
    let Some((mover, us)) = position.piece_at(from) else {
        return 0;
    };

    let mut occupied = position.occupied().without(from);
    let mut first_gain = match mv.flag() {
        MoveFlag::EnPassant => {
            occupied = occupied.without(to.offset(-us.forward()));
            Piece::Pawn.see_value()
        }
        _ => position
            .piece_at(to)
            .map_or(0, |(captured, _)| captured.see_value()),
    };

    // Value of whatever now stands on `to`, about to be captured next.
    let mut on_square = mover.see_value();
    if let Some(promoted) = mv.promotion_piece() {
        first_gain += promoted.see_value() - Piece::Pawn.see_value();
        on_square = promoted.see_value();
    }

    let diagonal = position.pieces_of_kind(Piece::Bishop) | position.pieces_of_kind(Piece::Queen);
    let orthogonal = position.pieces_of_kind(Piece::Rook) | position.pieces_of_kind(Piece::Queen);
    let promotes_here = to.rank_index() == 0 || to.rank_index() == 7;

    let mut gains = [0i32; 32];
    gains[0] = first_gain;
    let mut depth = 0;
    let mut attackers = position.attackers_to(tables, to, occupied) & occupied;
    let mut side = !us;

    loop {
        let ours = attackers & position.color(side);
        if ours.is_empty() {
            break;
        }
        let Some((piece, sq)) = least_valuable(position, ours) else {
            break;
        };
        // A king may only recapture when nothing defends the square.
        if piece == Piece::King && attackers.intersects(position.color(!side)) {
            break;
        }

        depth += 1;
        if depth == gains.len() {
            break;
        }
        gains[depth] = on_square - gains[depth - 1];
        on_square = piece.see_value();
        if piece == Piece::Pawn && promotes_here {
            gains[depth] += Piece::Queen.see_value() - Piece::Pawn.see_value();
            on_square = Piece::Queen.see_value();
        }

        occupied = occupied.without(sq);
        if matches!(piece, Piece::Pawn | Piece::Bishop | Piece::Queen) {
            attackers |= tables.bishop(to, occupied) & diagonal;
        }
        if matches!(piece, Piece::Rook | Piece::Queen) {
            attackers |= tables.rook(to, occupied) & orthogonal;
        }
        attackers &= occupied;
        side = !side;
    }

    while depth > 0 {
        gains[depth - 1] = -(-gains[depth - 1]).max(gains[depth]);
        depth -= 1;
    }
    gains[0]
}

/// Whether `mv` wins at least `threshold` centipawns of material.
#[inline]
pub fn see_ge(tables: &AttackTables, position: &Position, mv: Move, threshold: i32) -> bool {
    see(tables, position, mv) >= threshold
}

fn least_valuable(position: &Position, candidates: Bitboard) -> Option<(Piece, chess_core::Square)> {
    Piece::ALL.into_iter().find_map(|piece| {
        (candidates & position.pieces_of_kind(piece))
            .lsb()
            .map(|sq| (piece, sq))
    })
}
