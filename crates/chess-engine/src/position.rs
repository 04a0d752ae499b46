//! Board state with make/unmake.

use std::fmt;

use chess_core::{castling, Color, Fen, FenError, Move, MoveFlag, Piece, Square};
use thiserror::Error;

use crate::zobrist::ZOBRIST;
use crate::{generate_moves, AttackTables, Bitboard, MoveFilter};

/// Castling rights flags, in FEN `KQkq` bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    pub const NONE: CastlingRights = CastlingRights(0);
    pub const ALL: CastlingRights = CastlingRights(0b1111);

    #[inline]
    pub const fn new(flags: u8) -> Self {
        CastlingRights(flags & 0b1111)
    }

    #[inline]
    pub const fn kingside(self, color: Color) -> bool {
        let flag = match color {
            Color::White => castling::WHITE_KINGSIDE,
            Color::Black => castling::BLACK_KINGSIDE,
        };
        self.0 & flag != 0
    }

    #[inline]
    pub const fn queenside(self, color: Color) -> bool {
        let flag = match color {
            Color::White => castling::WHITE_QUEENSIDE,
            Color::Black => castling::BLACK_QUEENSIDE,
        };
        self.0 & flag != 0
    }

    /// Clears every right lost by a piece moving from or to `sq`.
    #[inline]
    fn touch(&mut self, sq: Square) {
        self.0 &= CASTLING_MASK[sq.idx()];
    }

    #[inline]
    pub const fn raw(self) -> u8 {
        self.0
    }
}

/// Per-square mask of the castling rights that survive a move touching it.
const CASTLING_MASK: [u8; 64] = {
    let mut masks = [0b1111u8; 64];
    masks[Square::A1.idx()] = !castling::WHITE_QUEENSIDE;
    masks[Square::E1.idx()] = !(castling::WHITE_KINGSIDE | castling::WHITE_QUEENSIDE);
    masks[Square::H1.idx()] = !castling::WHITE_KINGSIDE;
    masks[Square::A8.idx()] = !castling::BLACK_QUEENSIDE;
    masks[Square::E8.idx()] = !(castling::BLACK_KINGSIDE | castling::BLACK_QUEENSIDE);
    masks[Square::H8.idx()] = !castling::BLACK_KINGSIDE;
    masks
};

/// Rook origin and destination for a castling king landing on `king_to`.
#[inline]
pub(crate) fn castling_rook(king_to: Square, flag: MoveFlag) -> (Square, Square) {
    match flag {
        MoveFlag::CastleKingside => (king_to.offset(1), king_to.offset(-1)),
        _ => (king_to.offset(-2), king_to.offset(1)),
    }
}

/// Rejections for FENs that parse but describe an impossible position.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PositionError {
    #[error(transparent)]
    Fen(#[from] FenError),

    #[error("{color} has {count} kings, expected exactly one")]
    KingCount { color: Color, count: u32 },

    #[error("pawn on back rank at {0}")]
    PawnOnBackRank(Square),

    #[error("en passant square {0} has no double-pushed pawn in front of it")]
    InvalidEnPassant(Square),
}

/// State needed to take back one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Undo {
    mv: Move,
    captured: Option<Piece>,
    castling: CastlingRights,
    en_passant: Option<Square>,
    halfmove_clock: u32,
    hash: u64,
}

/// A chess position plus the undo stack of the moves that led to it.
#[derive(Clone, PartialEq, Eq)]
pub struct Position {
    pieces: [[Bitboard; 6]; 2],
    colors: [Bitboard; 2],
    board: [Option<(Piece, Color)>; 64],
    side_to_move: Color,
    castling: CastlingRights,
    /// Only set when a pawn of the side to move attacks the square.
    en_passant: Option<Square>,
    halfmove_clock: u32,
    fullmove_number: u32,
    hash: u64,
    history: Vec<Undo>,
}

impl Position {
    pub fn startpos() -> Self {
        Self::from_fen(Fen::STARTPOS).expect("STARTPOS is valid")
    }

    pub fn from_fen(text: &str) -> Result<Self, PositionError> {
        let fen = Fen::parse(text)?;
        let mut position = Position {
            pieces: [[Bitboard::EMPTY; 6]; 2],
            colors: [Bitboard::EMPTY; 2],
            board: [None; 64],
            side_to_move: fen.side_to_move,
            castling: CastlingRights::NONE,
            en_passant: None,
            halfmove_clock: fen.halfmove_clock,
            fullmove_number: fen.fullmove_number,
            hash: 0,
            history: Vec::with_capacity(256),
        };

        for sq in Square::all() {
            if let Some((piece, color)) = fen.board[sq.idx()] {
                if piece == Piece::Pawn && (sq.rank_index() == 0 || sq.rank_index() == 7) {
                    return Err(PositionError::PawnOnBackRank(sq));
                }
                position.put(color, piece, sq);
            }
        }

        for color in Color::ALL {
            let count = position.pieces(Piece::King, color).count();
            if count != 1 {
                return Err(PositionError::KingCount { color, count });
            }
        }

        position.castling = position.sanitize_castling(CastlingRights::new(fen.castling));

        if let Some(ep) = fen.en_passant {
            let us = fen.side_to_move;
            let pushed = ep.offset(-us.forward());
            let expected_rank = if us == Color::White { 5 } else { 2 };
            if ep.rank_index() != expected_rank
                || position.board[ep.idx()].is_some()
                || position.board[pushed.idx()] != Some((Piece::Pawn, !us))
            {
                return Err(PositionError::InvalidEnPassant(ep));
            }
            if position.ep_capturable(ep, us) {
                position.en_passant = Some(ep);
            }
        }

        position.hash = position.compute_hash();
        Ok(position)
    }

    /// Drops rights whose king or rook is not on its home square.
    fn sanitize_castling(&self, rights: CastlingRights) -> CastlingRights {
        let mut rights = rights;
        for (color, king, rooks) in [
            (Color::White, Square::E1, [Square::H1, Square::A1]),
            (Color::Black, Square::E8, [Square::H8, Square::A8]),
        ] {
            if self.board[king.idx()] != Some((Piece::King, color)) {
                rights.touch(king);
            }
            for rook in rooks {
                if self.board[rook.idx()] != Some((Piece::Rook, color)) {
                    rights.touch(rook);
                }
            }
        }
        rights
    }

    /// Whether a pawn of `us` could capture onto `ep` at all.
    #[inline]
    fn ep_capturable(&self, ep: Square, us: Color) -> bool {
        // Squares our pawns would capture from are the ones an enemy pawn on
        // `ep` would attack.
        Bitboard::from_square(ep)
            .pawn_captures(!us)
            .intersects(self.pieces(Piece::Pawn, us))
    }

    pub fn to_fen(&self) -> String {
        Fen {
            board: self.board,
            side_to_move: self.side_to_move,
            castling: self.castling.raw(),
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
        .to_string()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[inline]
    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    #[inline]
    pub fn en_passant(&self) -> Option<Square> {
        self.en_passant
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Incrementally maintained Zobrist key.
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<(Piece, Color)> {
        self.board[sq.idx()]
    }

    #[inline]
    pub fn pieces(&self, piece: Piece, color: Color) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    /// Pieces of one kind for both colours.
    #[inline]
    pub fn pieces_of_kind(&self, piece: Piece) -> Bitboard {
        self.pieces[0][piece.index()] | self.pieces[1][piece.index()]
    }

    #[inline]
    pub fn color(&self, color: Color) -> Bitboard {
        self.colors[color.index()]
    }

    #[inline]
    pub fn occupied(&self) -> Bitboard {
        self.colors[0] | self.colors[1]
    }

    #[inline]
    pub fn king_square(&self, color: Color) -> Square {
        // A king is always present: enforced by `from_fen` and kept by legal moves.
        self.pieces(Piece::King, color)
            .lsb()
            .unwrap_or(Square::A1)
    }

    /// Bishops and queens of `color`.
    #[inline]
    pub fn diagonal_sliders(&self, color: Color) -> Bitboard {
        self.pieces(Piece::Bishop, color) | self.pieces(Piece::Queen, color)
    }

    /// Rooks and queens of `color`.
    #[inline]
    pub fn orthogonal_sliders(&self, color: Color) -> Bitboard {
        self.pieces(Piece::Rook, color) | self.pieces(Piece::Queen, color)
    }

    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        (self.color(color) - self.pieces(Piece::Pawn, color) - self.pieces(Piece::King, color))
            .is_not_empty()
    }

    /// Number of moves (including null moves) on the undo stack.
    #[inline]
    pub fn ply_count(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn last_move(&self) -> Option<Move> {
        self.history.last().map(|undo| undo.mv)
    }

    /// Captured piece of the last move, if any.
    #[inline]
    pub fn last_captured(&self) -> Option<Piece> {
        self.history.last().and_then(|undo| undo.captured)
    }

    /// Every piece of either colour attacking `sq`, given `occupied`.
    pub fn attackers_to(&self, tables: &AttackTables, sq: Square, occupied: Bitboard) -> Bitboard {
        (tables.pawn(Color::White, sq) & self.pieces(Piece::Pawn, Color::Black))
            | (tables.pawn(Color::Black, sq) & self.pieces(Piece::Pawn, Color::White))
            | (tables.knight(sq) & self.pieces_of_kind(Piece::Knight))
            | (tables.king(sq) & self.pieces_of_kind(Piece::King))
            | (tables.bishop(sq, occupied)
                & (self.pieces_of_kind(Piece::Bishop) | self.pieces_of_kind(Piece::Queen)))
            | (tables.rook(sq, occupied)
                & (self.pieces_of_kind(Piece::Rook) | self.pieces_of_kind(Piece::Queen)))
    }

    /// Whether `by` attacks `sq` with the given occupancy.
    pub fn is_attacked(
        &self,
        tables: &AttackTables,
        sq: Square,
        by: Color,
        occupied: Bitboard,
    ) -> bool {
        tables.pawn(!by, sq).intersects(self.pieces(Piece::Pawn, by))
            || tables.knight(sq).intersects(self.pieces(Piece::Knight, by))
            || tables.king(sq).intersects(self.pieces(Piece::King, by))
            || tables.bishop(sq, occupied).intersects(self.diagonal_sliders(by))
            || tables.rook(sq, occupied).intersects(self.orthogonal_sliders(by))
    }

    /// Opposing pieces giving check to the side to move.
    pub fn checkers(&self, tables: &AttackTables) -> Bitboard {
        let us = self.side_to_move;
        self.attackers_to(tables, self.king_square(us), self.occupied()) & self.color(!us)
    }

    #[inline]
    fn put(&mut self, color: Color, piece: Piece, sq: Square) {
        self.pieces[color.index()][piece.index()].set(sq);
        self.colors[color.index()].set(sq);
        self.board[sq.idx()] = Some((piece, color));
        self.hash ^= ZOBRIST.piece(color, piece, sq);
    }

    #[inline]
    fn remove(&mut self, color: Color, piece: Piece, sq: Square) {
        self.pieces[color.index()][piece.index()].clear(sq);
        self.colors[color.index()].clear(sq);
        self.board[sq.idx()] = None;
        self.hash ^= ZOBRIST.piece(color, piece, sq);
    }

    #[inline]
    fn shift(&mut self, color: Color, piece: Piece, from: Square, to: Square) {
        self.remove(color, piece, from);
        self.put(color, piece, to);
    }

    /// Plays a legal move, pushing its undo record.
    pub fn make_move(&mut self, mv: Move) {
        let us = self.side_to_move;
        let them = !us;
        let (from, to, flag) = (mv.from(), mv.to(), mv.flag());
        let Some((piece, _)) = self.board[from.idx()] else {
            debug_assert!(false, "no piece on {from} for {mv} in {}", self.to_fen());
            return;
        };

        let captured = match flag {
            MoveFlag::EnPassant => Some(Piece::Pawn),
            _ => self.board[to.idx()].map(|(p, _)| p),
        };

        self.history.push(Undo {
            mv,
            captured,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        });

        if let Some(ep) = self.en_passant.take() {
            self.hash ^= ZOBRIST.en_passant(ep.file_index());
        }

        self.halfmove_clock += 1;
        if let Some(victim) = captured {
            let target = if flag == MoveFlag::EnPassant {
                to.offset(-us.forward())
            } else {
                to
            };
            self.remove(them, victim, target);
            self.halfmove_clock = 0;
        }
        if piece == Piece::Pawn {
            self.halfmove_clock = 0;
        }

        match flag {
            MoveFlag::CastleKingside | MoveFlag::CastleQueenside => {
                let (rook_from, rook_to) = castling_rook(to, flag);
                self.shift(us, Piece::King, from, to);
                self.shift(us, Piece::Rook, rook_from, rook_to);
            }
            _ => match flag.promotion_piece() {
                Some(promoted) => {
                    self.remove(us, Piece::Pawn, from);
                    self.put(us, promoted, to);
                }
                None => self.shift(us, piece, from, to),
            },
        }

        if flag == MoveFlag::DoublePush {
            let ep = from.offset(us.forward());
            if self.ep_capturable(ep, them) {
                self.en_passant = Some(ep);
                self.hash ^= ZOBRIST.en_passant(ep.file_index());
            }
        }

        let old_rights = self.castling;
        self.castling.touch(from);
        self.castling.touch(to);
        if old_rights != self.castling {
            self.hash ^= ZOBRIST.castling(old_rights.raw()) ^ ZOBRIST.castling(self.castling.raw());
        }

        self.side_to_move = them;
        self.hash ^= ZOBRIST.black_to_move();
        if us == Color::Black {
            self.fullmove_number += 1;
        }

        debug_assert_eq!(self.hash, self.compute_hash(), "hash drift after {mv}");
    }

    /// Takes back the last move played with [`Position::make_move`].
    pub fn unmake_move(&mut self) {
        let Some(undo) = self.history.pop() else {
            debug_assert!(false, "unmake_move with an empty history");
            return;
        };
        debug_assert!(!undo.mv.is_null(), "use unmake_null_move for null moves");

        let them = self.side_to_move;
        let us = !them;
        self.side_to_move = us;
        if us == Color::Black {
            self.fullmove_number -= 1;
        }

        let (from, to, flag) = (undo.mv.from(), undo.mv.to(), undo.mv.flag());
        match flag {
            MoveFlag::CastleKingside | MoveFlag::CastleQueenside => {
                let (rook_from, rook_to) = castling_rook(to, flag);
                self.shift(us, Piece::Rook, rook_to, rook_from);
                self.shift(us, Piece::King, to, from);
            }
            _ => match flag.promotion_piece() {
                Some(promoted) => {
                    self.remove(us, promoted, to);
                    self.put(us, Piece::Pawn, from);
                }
                None => {
                    if let Some((piece, _)) = self.board[to.idx()] {
                        self.shift(us, piece, to, from);
                    }
                }
            },
        }

        if let Some(victim) = undo.captured {
            let target = if flag == MoveFlag::EnPassant {
                to.offset(-us.forward())
            } else {
                to
            };
            self.put(them, victim, target);
        }

        self.castling = undo.castling;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
    }

    /// Passes the turn. Never legal while in check.
    pub fn make_null_move(&mut self) {
        self.history.push(Undo {
            mv: Move::NULL,
            captured: None,
            castling: self.castling,
            en_passant: self.en_passant,
            halfmove_clock: self.halfmove_clock,
            hash: self.hash,
        });
        if let Some(ep) = self.en_passant.take() {
            self.hash ^= ZOBRIST.en_passant(ep.file_index());
        }
        self.halfmove_clock += 1;
        self.side_to_move = !self.side_to_move;
        self.hash ^= ZOBRIST.black_to_move();
    }

    pub fn unmake_null_move(&mut self) {
        let Some(undo) = self.history.pop() else {
            debug_assert!(false, "unmake_null_move with an empty history");
            return;
        };
        debug_assert!(undo.mv.is_null());
        self.side_to_move = !self.side_to_move;
        self.en_passant = undo.en_passant;
        self.halfmove_clock = undo.halfmove_clock;
        self.hash = undo.hash;
    }

    /// True if the current position occurred before within the reversible
    /// window, without looking past a null move.
    pub fn is_repetition(&self) -> bool {
        let window = (self.halfmove_clock as usize).min(self.history.len());
        for back in 1..=window {
            let undo = &self.history[self.history.len() - back];
            if undo.mv.is_null() {
                return false;
            }
            if back % 2 == 0 && undo.hash == self.hash {
                return true;
            }
        }
        false
    }

    #[inline]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// Neither side can deliver mate: bare kings, a single minor piece, or
    /// only bishops that all stand on one square colour.
    pub fn is_insufficient_material(&self) -> bool {
        let heavy = self.pieces_of_kind(Piece::Pawn)
            | self.pieces_of_kind(Piece::Rook)
            | self.pieces_of_kind(Piece::Queen);
        if heavy.is_not_empty() {
            return false;
        }
        let knights = self.pieces_of_kind(Piece::Knight);
        let bishops = self.pieces_of_kind(Piece::Bishop);
        let minors = knights | bishops;
        if minors.count() <= 1 {
            return true;
        }
        knights.is_empty()
            && ((bishops & Bitboard::LIGHT_SQUARES).is_empty()
                || (bishops & Bitboard::DARK_SQUARES).is_empty())
    }

    /// Drawn by rule. A mate delivered on the hundredth halfmove stands, so
    /// the fifty-move test needs the attack tables.
    pub fn is_draw(&self, tables: &AttackTables) -> bool {
        self.is_insufficient_material()
            || self.is_repetition()
            || (self.is_fifty_move_draw() && !self.is_checkmate(tables))
    }

    pub fn is_checkmate(&self, tables: &AttackTables) -> bool {
        self.checkers(tables).is_not_empty()
            && generate_moves(tables, self, MoveFilter::All).is_empty()
    }

    /// Full recomputation of the Zobrist key.
    pub fn compute_hash(&self) -> u64 {
        let mut hash = 0;
        for sq in Square::all() {
            if let Some((piece, color)) = self.board[sq.idx()] {
                hash ^= ZOBRIST.piece(color, piece, sq);
            }
        }
        if self.side_to_move == Color::Black {
            hash ^= ZOBRIST.black_to_move();
        }
        hash ^= ZOBRIST.castling(self.castling.raw());
        if let Some(ep) = self.en_passant {
            hash ^= ZOBRIST.en_passant(ep.file_index());
        }
        hash
    }

    /// Checks the board invariants: disjoint piece sets that agree with the
    /// mailbox, one king per side.
    pub fn is_consistent(&self) -> bool {
        let mut seen = Bitboard::EMPTY;
        for color in Color::ALL {
            let mut union = Bitboard::EMPTY;
            for piece in Piece::ALL {
                let bb = self.pieces(piece, color);
                if seen.intersects(bb) {
                    return false;
                }
                seen |= bb;
                union |= bb;
                if bb.into_iter().any(|sq| self.board[sq.idx()] != Some((piece, color))) {
                    return false;
                }
            }
            if union != self.color(color) || self.pieces(Piece::King, color).count() != 1 {
                return false;
            }
        }
        seen == self.occupied() && self.board.iter().flatten().count() == seen.count() as usize
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_fen())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            write!(f, "{} ", rank + 1)?;
            for file in 0..8u8 {
                let sq = Square::from_index(rank * 8 + file).ok_or(fmt::Error)?;
                let c = self.board[sq.idx()].map_or('.', |(p, c)| p.to_fen_char(c));
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "  a b c d e f g h")?;
        write!(f, "{}", self.to_fen())
    }
}
