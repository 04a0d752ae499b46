//! Move ordering.
//!
//! Every move gets one score and the picker hands moves out best first by
//! selection, so a cutoff on an early move skips sorting the rest.
//!
//! Tiers, highest first: the transposition-table move, queen promotions,
//! captures that do not lose material (MVV-LVA, then SEE), killers, quiets by
//! history, losing captures, under-promotions.

use crate::history::{ContinuationKeys, History};
use chess_core::{Move, MoveFlag, Piece};
use chess_engine::{see, AttackTables, MoveList, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const TT_MOVE: i32 = 1 << 30;
const QUEEN_PROMOTION: i32 = 1 << 29;
const GOOD_CAPTURE: i32 = 1 << 28;
const KILLER: i32 = 1 << 27;
const LOSING_CAPTURE: i32 = -(1 << 28);
const UNDER_PROMOTION: i32 = -(1 << 29);

/// Piece captured by `mv`, if any.
#[inline]
pub fn captured_piece(position: &Position, mv: Move) -> Option<Piece> {
    if mv.flag() == MoveFlag::EnPassant {
        Some(Piece::Pawn)
    } else {
        position.piece_at(mv.to()).map(|(piece, _)| piece)
    }
}

/// Neither a capture nor a promotion.
#[inline]
pub fn is_quiet(position: &Position, mv: Move) -> bool {
    !mv.is_promotion() && captured_piece(position, mv).is_none()
}

/// Most valuable victim first, least valuable attacker as tie-break.
#[inline]
fn mvv_lva(victim: Piece, attacker: Piece) -> i32 {
    victim.see_value() * 16 - attacker.index() as i32
}

/// Small random bonuses for quiet moves, indexed by from and to square.
///
/// Helper threads each draw their own so equal quiet scores are tried in a
/// different order on every worker. The main worker has none.
pub struct Jitter(Option<Box<[i32; 64 * 64]>>);

impl Jitter {
    pub const NONE: Jitter = Jitter(None);

    /// Bonuses below 32 for `worker`; worker 0 gets [`Jitter::NONE`].
    pub fn for_worker(worker: usize) -> Self {
        if worker == 0 {
            return Self::NONE;
        }
        let mut rng = StdRng::seed_from_u64(worker as u64);
        let mut table = Box::new([0; 64 * 64]);
        for bonus in table.iter_mut() {
            *bonus = rng.random_range(0..32);
        }
        Jitter(Some(table))
    }

    #[inline]
    fn get(&self, mv: Move) -> i32 {
        self.0
            .as_ref()
            .map_or(0, |table| table[mv.from().idx() * 64 + mv.to().idx()])
    }
}

/// Everything move scoring needs to know about the node.
pub struct OrderContext<'a> {
    pub tables: &'a AttackTables,
    pub position: &'a Position,
    pub history: &'a History,
    pub tt_move: Move,
    pub ply: usize,
    pub keys: ContinuationKeys,
    pub jitter: &'a Jitter,
}

impl OrderContext<'_> {
    pub fn score(&self, mv: Move) -> i32 {
        if mv == self.tt_move {
            return TT_MOVE;
        }
        let attacker = self
            .position
            .piece_at(mv.from())
            .map_or(Piece::Pawn, |(piece, _)| piece);
        let victim = captured_piece(self.position, mv);

        match mv.promotion_piece() {
            Some(Piece::Queen) => {
                return QUEEN_PROMOTION + victim.map_or(0, |v| mvv_lva(v, attacker));
            }
            Some(_) => return UNDER_PROMOTION + victim.map_or(0, |v| mvv_lva(v, attacker)),
            None => {}
        }

        if let Some(victim) = victim {
            let exchange = see(self.tables, self.position, mv);
            return if exchange >= 0 {
                GOOD_CAPTURE + mvv_lva(victim, attacker) * 64 + exchange.min(1 << 15)
            } else {
                LOSING_CAPTURE + mvv_lva(victim, attacker)
            };
        }

        let killers = self.history.killers(self.ply);
        if mv == killers[0] {
            return KILLER + 1;
        }
        if mv == killers[1] {
            return KILLER;
        }
        self.history.quiet_score(self.position, mv, &self.keys) + self.jitter.get(mv)
    }
}

/// Hands out moves in descending score order.
pub struct MovePicker {
    moves: MoveList,
    scores: [i32; MoveList::MAX_MOVES],
    next: usize,
}

impl MovePicker {
    pub fn new(moves: MoveList, context: &OrderContext<'_>) -> Self {
        let mut scores = [0; MoveList::MAX_MOVES];
        for (score, &mv) in scores.iter_mut().zip(moves.iter()) {
            *score = context.score(mv);
        }
        MovePicker {
            moves,
            scores,
            next: 0,
        }
    }

    /// Next best move and its ordering score.
    pub fn next(&mut self) -> Option<(Move, i32)> {
        let len = self.moves.len();
        if self.next >= len {
            return None;
        }
        let mut best = self.next;
        for i in self.next + 1..len {
            if self.scores[i] > self.scores[best] {
                best = i;
            }
        }
        self.moves.as_mut_slice().swap(self.next, best);
        self.scores.swap(self.next, best);
        let picked = (self.moves[self.next], self.scores[self.next]);
        self.next += 1;
        Some(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HistoryConfig;
    use chess_engine::{find_move, generate_moves, MoveFilter};
    use std::sync::OnceLock;

    fn tables() -> &'static AttackTables {
        static TABLES: OnceLock<AttackTables> = OnceLock::new();
        TABLES.get_or_init(AttackTables::new)
    }

    fn ordered(position: &Position, history: &History, tt_move: Move, jitter: &Jitter) -> Vec<Move> {
        let context = OrderContext {
            tables: tables(),
            position,
            history,
            tt_move,
            ply: 0,
            keys: [None, None],
            jitter,
        };
        let mut picker = MovePicker::new(generate_moves(tables(), position, MoveFilter::All), &context);
        let mut out = Vec::new();
        while let Some((mv, _)) = picker.next() {
            out.push(mv);
        }
        out
    }

    fn uci(moves: &[Move]) -> Vec<String> {
        moves.iter().map(|m| m.to_uci()).collect()
    }

    #[test]
    fn tiers_in_order() {
        // Promotions with and without taking the rook, a pawn defended by a pawn.
        let position = Position::from_fen("1r2k3/P7/8/2p5/3p4/8/8/3QK3 w - - 0 1").unwrap();
        let history = History::new(HistoryConfig::default());
        let order = uci(&ordered(&position, &history, Move::NULL, &Jitter::NONE));
        assert_eq!(order[0], "a7b8q");
        assert_eq!(order[1], "a7a8q");
        let losing = order.iter().position(|m| m == "d1d4").unwrap();
        let under = order.iter().position(|m| m == "a7a8n").unwrap();
        let quiet = order.iter().position(|m| m == "e1f1").unwrap();
        assert!(quiet < losing);
        assert!(losing < under);
    }

    #[test]
    fn tt_move_and_killers_lead_quiets() {
        let position = Position::startpos();
        let mut history = History::new(HistoryConfig::default());
        let killer = find_move(tables(), &position, "b1c3").unwrap();
        history.record_cutoff(&position, 0, 1, killer, &[], &[None, None]);
        let tt_move = find_move(tables(), &position, "e2e4").unwrap();
        let order = uci(&ordered(&position, &history, tt_move, &Jitter::NONE));
        assert_eq!(order[0], "e2e4");
        assert_eq!(order[1], "b1c3");
        assert_eq!(order.len(), 20);
    }

    #[test]
    fn history_orders_quiets() {
        let position = Position::startpos();
        let mut history = History::new(HistoryConfig::default());
        let good = find_move(tables(), &position, "d2d4").unwrap();
        // Record at another ply so it is not a killer here.
        history.record_cutoff(&position, 5, 6, good, &[], &[None, None]);
        let order = uci(&ordered(&position, &history, Move::NULL, &Jitter::NONE));
        assert_eq!(order[0], "d2d4");
    }

    #[test]
    fn helper_jitter_is_small_and_deterministic() {
        let position = Position::startpos();
        let history = History::new(HistoryConfig::default());
        let jitter = Jitter::for_worker(3);
        let a = ordered(&position, &history, Move::NULL, &jitter);
        let b = ordered(&position, &history, Move::NULL, &Jitter::for_worker(3));
        assert_eq!(a, b);
        let context = OrderContext {
            tables: tables(),
            position: &position,
            history: &history,
            tt_move: Move::NULL,
            ply: 0,
            keys: [None, None],
            jitter: &jitter,
        };
        let scores: Vec<i32> = generate_moves(tables(), &position, MoveFilter::All)
            .iter()
            .map(|&mv| context.score(mv))
            .collect();
        assert!(scores.iter().all(|score| (0..32).contains(score)));
        assert!(scores.iter().any(|&score| score != scores[0]));
        assert_eq!(Jitter::for_worker(0).get(a[0]), 0);
    }

    #[test]
    fn quiet_and_capture_detection() {
        let position = Position::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let ep = find_move(tables(), &position, "e5d6").unwrap();
        assert_eq!(captured_piece(&position, ep), Some(Piece::Pawn));
        assert!(!is_quiet(&position, ep));
        let push = find_move(tables(), &position, "e5e6").unwrap();
        assert!(is_quiet(&position, push));
    }
}
