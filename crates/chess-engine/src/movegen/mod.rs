//! Legal move generation.
//!
//! Moves are generated directly as legal moves: checkers and pinned pieces
//! are computed once per call, and every non-king move is masked by the
//! check-evasion target set and, for pinned pieces, by the pin line. King
//! moves are tested against attacks with the king lifted off the board, and
//! en passant is checked with the exact occupancy after the capture.

mod attacks;
mod magics;
pub mod perft;

use crate::{Bitboard, Position};
use chess_core::{Color, Move, MoveFlag, Piece, Square};

pub use attacks::AttackTables;
pub use magics::{find_magic, Slider};

/// A list of moves with a fixed maximum capacity.
///
/// Chess positions have at most 218 legal moves, so we use a fixed-size
/// array to avoid heap allocations during move generation.
#[derive(Clone)]
pub struct MoveList {
    moves: [Move; Self::MAX_MOVES],
    len: usize,
}

impl MoveList {
    pub const MAX_MOVES: usize = 256;

    #[inline]
    pub const fn new() -> Self {
        MoveList {
            moves: [Move::NULL; Self::MAX_MOVES],
            len: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, m: Move) {
        debug_assert!(self.len < Self::MAX_MOVES);
        self.moves[self.len] = m;
        self.len += 1;
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[Move] {
        &self.moves[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Move] {
        &mut self.moves[..self.len]
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Move> {
        self.as_slice().iter()
    }

    #[inline]
    pub fn contains(&self, m: Move) -> bool {
        self.as_slice().contains(&m)
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Retains only moves for which the predicate returns true.
    pub fn retain<F>(&mut self, mut f: F)
    where
        F: FnMut(&Move) -> bool,
    {
        let mut write = 0;
        for read in 0..self.len {
            if f(&self.moves[read]) {
                self.moves[write] = self.moves[read];
                write += 1;
            }
        }
        self.len = write;
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for MoveList {
    type Output = Move;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        debug_assert!(index < self.len);
        &self.moves[index]
    }
}

impl<'a> IntoIterator for &'a MoveList {
    type Item = &'a Move;
    type IntoIter = std::slice::Iter<'a, Move>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl std::fmt::Debug for MoveList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

/// Which subset of the legal moves to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveFilter {
    All,
    /// Captures, en passant and every promotion.
    Noisy,
    /// Everything [`MoveFilter::Noisy`] leaves out, castling included.
    Quiet,
    /// Captures, en passant and capturing promotions.
    Captures,
}

impl MoveFilter {
    #[inline]
    fn captures(self) -> bool {
        !matches!(self, MoveFilter::Quiet)
    }

    #[inline]
    fn quiets(self) -> bool {
        matches!(self, MoveFilter::All | MoveFilter::Quiet)
    }

    #[inline]
    fn push_promotions(self) -> bool {
        matches!(self, MoveFilter::All | MoveFilter::Noisy)
    }
}

/// Generates the legal moves of `position` selected by `filter`.
pub fn generate_moves(tables: &AttackTables, position: &Position, filter: MoveFilter) -> MoveList {
    let mut moves = MoveList::new();
    Generator::new(tables, position, filter).run(&mut moves);
    moves
}

/// Whether the king of `color` is attacked.
pub fn is_in_check(tables: &AttackTables, position: &Position, color: Color) -> bool {
    position.is_attacked(
        tables,
        position.king_square(color),
        !color,
        position.occupied(),
    )
}

/// Pieces of the side to move that are pinned to their own king.
pub fn pinned_pieces(tables: &AttackTables, position: &Position) -> Bitboard {
    let us = position.side_to_move();
    let them = !us;
    let king = position.king_square(us);
    let theirs = position.color(them);
    let snipers = (tables.rook(king, theirs) & position.orthogonal_sliders(them))
        | (tables.bishop(king, theirs) & position.diagonal_sliders(them));

    let mut pinned = Bitboard::EMPTY;
    for sniper in snipers {
        let blockers = tables.between(king, sniper) & position.occupied();
        if !blockers.more_than_one() && blockers.intersects(position.color(us)) {
            pinned |= blockers;
        }
    }
    pinned
}

/// Resolves long algebraic notation to the matching legal move.
pub fn find_move(tables: &AttackTables, position: &Position, uci: &str) -> Option<Move> {
    let parsed = Move::from_uci(uci)?;
    generate_moves(tables, position, MoveFilter::All)
        .iter()
        .copied()
        .find(|m| {
            m.from() == parsed.from()
                && m.to() == parsed.to()
                && m.promotion_piece() == parsed.promotion_piece()
        })
}

struct Generator<'a> {
    tables: &'a AttackTables,
    position: &'a Position,
    filter: MoveFilter,
    us: Color,
    them: Color,
    king: Square,
    occupied: Bitboard,
    ours: Bitboard,
    theirs: Bitboard,
    checkers: Bitboard,
    pinned: Bitboard,
    /// Squares a non-king move must land on: everywhere, or the checker and
    /// the ray between it and the king.
    evasion: Bitboard,
}

impl<'a> Generator<'a> {
    fn new(tables: &'a AttackTables, position: &'a Position, filter: MoveFilter) -> Self {
        let us = position.side_to_move();
        let checkers = position.checkers(tables);
        let king = position.king_square(us);
        let evasion = match checkers.lsb() {
            None => Bitboard::FULL,
            Some(checker) => checkers | tables.between(king, checker),
        };
        Generator {
            tables,
            position,
            filter,
            us,
            them: !us,
            king,
            occupied: position.occupied(),
            ours: position.color(us),
            theirs: position.color(!us),
            checkers,
            pinned: pinned_pieces(tables, position),
            evasion,
        }
    }

    fn run(&self, moves: &mut MoveList) {
        self.king_moves(moves);
        if self.checkers.more_than_one() {
            return;
        }
        self.pawn_moves(moves);
        self.piece_moves(moves);
        if self.checkers.is_empty() && self.filter.quiets() {
            self.castling_moves(moves);
        }
    }

    /// Destination squares allowed by the filter for non-pawn moves.
    fn destinations(&self) -> Bitboard {
        match self.filter {
            MoveFilter::All => !self.ours,
            MoveFilter::Noisy | MoveFilter::Captures => self.theirs,
            MoveFilter::Quiet => !self.occupied,
        }
    }

    #[inline]
    fn pin_line(&self, from: Square) -> Bitboard {
        if self.pinned.contains(from) {
            self.tables.line(self.king, from)
        } else {
            Bitboard::FULL
        }
    }

    fn king_moves(&self, moves: &mut MoveList) {
        let lifted = self.occupied.without(self.king);
        for to in self.tables.king(self.king) & self.destinations() {
            if !self.position.is_attacked(self.tables, to, self.them, lifted) {
                moves.push(Move::normal(self.king, to));
            }
        }
    }

    fn piece_moves(&self, moves: &mut MoveList) {
        let targets = self.destinations() & self.evasion;

        // A pinned knight never has a move along its pin line.
        for from in self.position.pieces(Piece::Knight, self.us) - self.pinned {
            for to in self.tables.knight(from) & targets {
                moves.push(Move::normal(from, to));
            }
        }
        for from in self.position.diagonal_sliders(self.us) {
            let reach = self.tables.bishop(from, self.occupied) & targets & self.pin_line(from);
            for to in reach {
                moves.push(Move::normal(from, to));
            }
        }
        for from in self.position.orthogonal_sliders(self.us) {
            let reach = self.tables.rook(from, self.occupied) & targets & self.pin_line(from);
            for to in reach {
                moves.push(Move::normal(from, to));
            }
        }
    }

    fn pawn_moves(&self, moves: &mut MoveList) {
        let forward = self.us.forward();
        let promotion_rank = self.us.promotion_rank();
        let start_rank = self.us.pawn_rank();

        for from in self.position.pieces(Piece::Pawn, self.us) {
            let allowed = self.evasion & self.pin_line(from);

            let one = from.offset(forward);
            if !self.occupied.contains(one) {
                if one.rank_index() == promotion_rank {
                    if self.filter.push_promotions() && allowed.contains(one) {
                        push_promotions(moves, from, one);
                    }
                } else if self.filter.quiets() {
                    if allowed.contains(one) {
                        moves.push(Move::normal(from, one));
                    }
                    if from.rank_index() == start_rank {
                        let two = one.offset(forward);
                        if !self.occupied.contains(two) && allowed.contains(two) {
                            moves.push(Move::new(from, two, MoveFlag::DoublePush));
                        }
                    }
                }
            }

            if !self.filter.captures() {
                continue;
            }
            let attacks = self.tables.pawn(self.us, from);
            for to in attacks & self.theirs & allowed {
                if to.rank_index() == promotion_rank {
                    push_promotions(moves, from, to);
                } else {
                    moves.push(Move::normal(from, to));
                }
            }
            if let Some(ep) = self.position.en_passant() {
                if attacks.contains(ep) && self.en_passant_is_legal(from, ep) {
                    moves.push(Move::new(from, ep, MoveFlag::EnPassant));
                }
            }
        }
    }

    /// Replays the capture on the occupancy: two pieces leave their squares
    /// at once, which can open a line to the king that no pin test sees.
    fn en_passant_is_legal(&self, from: Square, ep: Square) -> bool {
        let victim = ep.offset(-self.us.forward());
        let occupied = self.occupied.without(from).without(victim).with(ep);
        let leaper_checkers = self.checkers
            & (self.position.pieces(Piece::Pawn, self.them)
                | self.position.pieces(Piece::Knight, self.them))
            & !Bitboard::from_square(victim);
        leaper_checkers.is_empty()
            && !self
                .tables
                .rook(self.king, occupied)
                .intersects(self.position.orthogonal_sliders(self.them))
            && !self
                .tables
                .bishop(self.king, occupied)
                .intersects(self.position.diagonal_sliders(self.them))
    }

    fn castling_moves(&self, moves: &mut MoveList) {
        let rights = self.position.castling();
        let home = match self.us {
            Color::White => Square::E1,
            Color::Black => Square::E8,
        };
        if self.king != home {
            return;
        }
        for (allowed, flag, rook_from, king_to) in [
            (
                rights.kingside(self.us),
                MoveFlag::CastleKingside,
                home.offset(3),
                home.offset(2),
            ),
            (
                rights.queenside(self.us),
                MoveFlag::CastleQueenside,
                home.offset(-4),
                home.offset(-2),
            ),
        ] {
            if !allowed || self.position.piece_at(rook_from) != Some((Piece::Rook, self.us)) {
                continue;
            }
            if self.tables.between(home, rook_from).intersects(self.occupied) {
                continue;
            }
            // The king crosses every square from its neighbour to `king_to`.
            let transit = self.tables.between(home, king_to).with(king_to);
            if transit
                .into_iter()
                .any(|sq| self.position.is_attacked(self.tables, sq, self.them, self.occupied))
            {
                continue;
            }
            moves.push(Move::new(home, king_to, flag));
        }
    }
}

#[inline]
fn push_promotions(moves: &mut MoveList, from: Square, to: Square) {
    for piece in Piece::PROMOTIONS {
        if let Some(flag) = MoveFlag::promotion_to(piece) {
            moves.push(Move::new(from, to, flag));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn tables() -> &'static AttackTables {
        static TABLES: OnceLock<AttackTables> = OnceLock::new();
        TABLES.get_or_init(AttackTables::new)
    }

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn legal(fen: &str) -> MoveList {
        let position = Position::from_fen(fen).unwrap();
        generate_moves(tables(), &position, MoveFilter::All)
    }

    fn has(moves: &MoveList, uci: &str) -> bool {
        moves.iter().any(|m| m.to_uci() == uci)
    }

    #[test]
    fn movelist_push_and_retain() {
        let mut list = MoveList::new();
        assert!(list.is_empty());
        list.push(Move::normal(sq("e2"), sq("e3")));
        list.push(Move::normal(sq("e2"), sq("e4")));
        list.push(Move::normal(sq("d2"), sq("d4")));
        assert_eq!(list.len(), 3);
        assert_eq!(list[1], Move::normal(sq("e2"), sq("e4")));
        list.retain(|m| m.from() == sq("e2"));
        assert_eq!(list.len(), 2);
        assert!(list.contains(Move::normal(sq("e2"), sq("e3"))));
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn startpos_has_twenty_moves() {
        assert_eq!(legal(chess_core::Fen::STARTPOS).len(), 20);
    }

    #[test]
    fn pinned_rook_slides_only_along_pin() {
        // Black rook e8 pins the white rook on e2 against the king on e1.
        let fen = "4r1k1/8/8/8/8/8/4R3/4K3 w - - 0 1";
        let position = Position::from_fen(fen).unwrap();
        assert_eq!(
            pinned_pieces(tables(), &position),
            Bitboard::from_square(sq("e2"))
        );
        let moves = legal(fen);
        let rook_moves: Vec<_> = moves.iter().filter(|m| m.from() == sq("e2")).collect();
        assert_eq!(rook_moves.len(), 6);
        assert!(rook_moves.iter().all(|m| m.to().file_index() == 4));
        assert!(has(&moves, "e2e8"));
    }

    #[test]
    fn pinned_pawn_moves_along_file_only() {
        let fen = "4r1k1/8/8/8/8/3p1p2/4P3/4K3 w - - 0 1";
        let position = Position::from_fen(fen).unwrap();
        assert_eq!(
            pinned_pieces(tables(), &position),
            Bitboard::from_square(sq("e2"))
        );
        let moves = legal(fen);
        assert!(has(&moves, "e2e3"));
        assert!(has(&moves, "e2e4"));
        assert!(!has(&moves, "e2d3"));
        assert!(!has(&moves, "e2f3"));
    }

    #[test]
    fn diagonally_pinned_pawn_captures_the_pinner() {
        let moves = legal("4k3/8/8/8/8/5b2/4P3/3K4 w - - 0 1");
        assert!(has(&moves, "e2f3"));
        assert!(!has(&moves, "e2e3"));
        assert!(!has(&moves, "e2e4"));
    }

    #[test]
    fn pinned_knight_cannot_move() {
        let moves = legal("4k3/4r3/8/8/8/8/4N3/4K3 w - - 0 1");
        assert!(moves.iter().all(|m| m.from() != sq("e2")));
    }

    #[test]
    fn double_check_allows_only_king_moves() {
        // Rook e8 and bishop b4 both check the king on e1.
        let fen = "4r1k1/8/8/8/1b6/8/8/R3K3 w Q - 0 1";
        let position = Position::from_fen(fen).unwrap();
        assert_eq!(position.checkers(tables()).count(), 2);
        let moves = legal(fen);
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|m| m.from() == Square::E1));
        assert!(!has(&moves, "e1c1"));
    }

    #[test]
    fn single_check_block_or_capture() {
        let moves = legal("4r1k1/8/8/8/8/8/1B6/R3K3 w Q - 0 1");
        assert!(has(&moves, "b2e5"));
        assert!(!has(&moves, "b2c3"));
        assert!(!has(&moves, "e1c1"));
        assert!(moves
            .iter()
            .all(|m| m.from() == Square::E1 || m.to().file_index() == 4));
    }

    #[test]
    fn knight_check_cannot_be_blocked() {
        let moves = legal("4k3/8/8/8/8/3n4/8/R3K3 w Q - 0 1");
        assert!(moves.iter().all(|m| m.from() == Square::E1));
    }

    #[test]
    fn king_cannot_step_along_checking_ray() {
        // Moving away from the rook on the same file is still check.
        let moves = legal("4r1k1/8/8/8/8/8/8/4K3 w - - 0 1");
        assert!(!has(&moves, "e1e2"));
        assert!(has(&moves, "e1d1"));
    }

    #[test]
    fn castling_requires_safe_transit() {
        let both = legal("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        assert!(has(&both, "e1g1"));
        assert!(has(&both, "e1c1"));

        // Rook on f8 covers f1.
        let attacked = legal("r3kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert!(!has(&attacked, "e1g1"));
        assert!(has(&attacked, "e1c1"));

        // b1 may be attacked for queenside castling; only c1 and d1 matter.
        let b1 = legal("1r2k3/8/8/8/8/8/8/R3K3 w Q - 0 1");
        assert!(has(&b1, "e1c1"));

        // b1 occupied blocks it.
        let blocked = legal("4k3/8/8/8/8/8/8/RN2K3 w Q - 0 1");
        assert!(!has(&blocked, "e1c1"));

        // No castling out of check.
        let checked = legal("4r1k1/8/8/8/8/8/8/R3K2R w KQ - 0 1");
        assert!(!has(&checked, "e1g1"));
        assert!(!has(&checked, "e1c1"));
    }

    #[test]
    fn en_passant_generated_and_horizontal_pin_respected() {
        let moves = legal("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1");
        assert!(has(&moves, "e5d6"));
        let flagged = moves.iter().find(|m| m.to_uci() == "e5d6").unwrap();
        assert_eq!(flagged.flag(), MoveFlag::EnPassant);

        // Both pawns leave the fifth rank, exposing the king on a5 to the rook.
        let pinned = legal("8/8/8/K2pP2r/8/8/8/7k w - d6 0 1");
        assert!(!has(&pinned, "e5d6"));
    }

    #[test]
    fn en_passant_resolves_pawn_check() {
        // The d5 pawn checks the king on c4.
        let moves = legal("8/8/8/3pP3/2K5/8/8/7k w - d6 0 1");
        assert!(has(&moves, "e5d6"));
    }

    #[test]
    fn promotions_in_all_four_pieces() {
        let moves = legal("8/P7/8/8/8/8/8/4K2k w - - 0 1");
        let promos: Vec<_> = moves.iter().filter(|m| m.is_promotion()).collect();
        assert_eq!(promos.len(), 4);
    }

    #[test]
    fn filters_partition_moves() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let position = Position::from_fen(fen).unwrap();
        let all = generate_moves(tables(), &position, MoveFilter::All);
        let noisy = generate_moves(tables(), &position, MoveFilter::Noisy);
        let quiet = generate_moves(tables(), &position, MoveFilter::Quiet);
        let captures = generate_moves(tables(), &position, MoveFilter::Captures);
        assert_eq!(noisy.len() + quiet.len(), all.len());
        assert!(noisy.iter().all(|m| all.contains(*m) && !quiet.contains(*m)));
        assert!(captures.iter().all(|m| noisy.contains(*m)));
        assert_eq!(captures.len(), 8);
        assert!(has(&quiet, "e1g1"));
    }

    #[test]
    fn quiet_promotion_is_noisy_not_capture() {
        let position = Position::from_fen("1n2k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let noisy = generate_moves(tables(), &position, MoveFilter::Noisy);
        let captures = generate_moves(tables(), &position, MoveFilter::Captures);
        let quiet = generate_moves(tables(), &position, MoveFilter::Quiet);
        assert_eq!(noisy.iter().filter(|m| m.to() == sq("a8")).count(), 4);
        assert_eq!(captures.iter().filter(|m| m.to() == sq("a8")).count(), 0);
        assert_eq!(captures.iter().filter(|m| m.to() == sq("b8")).count(), 4);
        assert!(quiet.iter().all(|m| !m.is_promotion()));
    }

    #[test]
    fn check_detection() {
        let position = Position::from_fen("4k3/8/8/8/8/8/4q3/4K3 w - - 0 1").unwrap();
        assert!(is_in_check(tables(), &position, Color::White));
        assert!(!is_in_check(tables(), &position, Color::Black));
        assert!(!is_in_check(tables(), &Position::startpos(), Color::White));
    }

    #[test]
    fn find_move_infers_flags() {
        let position = Position::startpos();
        let m = find_move(tables(), &position, "e2e4").unwrap();
        assert_eq!(m.flag(), MoveFlag::DoublePush);
        assert!(find_move(tables(), &position, "e2e5").is_none());
        assert!(find_move(tables(), &position, "junk").is_none());

        let castle = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
        assert_eq!(
            find_move(tables(), &castle, "e8c8").unwrap().flag(),
            MoveFlag::CastleQueenside
        );
        let promo = Position::from_fen("8/P7/8/8/8/8/8/4K2k w - - 0 1").unwrap();
        assert_eq!(
            find_move(tables(), &promo, "a7a8n").unwrap().flag(),
            MoveFlag::PromoteKnight
        );
        assert!(find_move(tables(), &promo, "a7a8").is_none());
    }

    #[test]
    fn checkmate_and_stalemate_have_no_moves() {
        assert!(legal("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").is_empty());
        assert!(legal("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").is_empty());
    }
}
