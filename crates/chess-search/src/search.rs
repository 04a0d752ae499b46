//! One search worker: iterative deepening over negamax alpha-beta with
//! quiescence search.
//!
//! A worker owns its position copy, history tables, killers and principal
//! variation. The only state it shares with other workers is in [`Shared`]:
//! the transposition table, the stop flag and the node counter.

use crate::config::SearchParams;
use crate::eval::Evaluator;
use crate::history::{piece_to, ContinuationKeys, History, PieceTo};
use crate::limits::{nps, IterationInfo};
use crate::ordering::{captured_piece, is_quiet, Jitter, MovePicker, OrderContext};
use crate::score::{from_tt, is_mate, to_tt, DRAW, INF, MATE, MATE_BOUND, MAX_PLY};
use crate::tt::{Bound, TranspositionTable};
use chess_core::{Move, Piece};
use chess_engine::{generate_moves, see_ge, AttackTables, MoveFilter, MoveList, Position};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Nodes between looks at the clock and the node budget.
const CHECK_INTERVAL: u64 = 2048;

/// Largest aspiration half-width before falling back to a full window.
const MAX_ASPIRATION_DELTA: i32 = 1000;

/// Callback receiving the main worker's completed iterations.
pub type Reporter = dyn Fn(&IterationInfo) + Send + Sync;

/// State shared by every worker of one search.
pub(crate) struct Shared<'a> {
    pub tables: &'a AttackTables,
    pub tt: &'a TranspositionTable,
    pub evaluator: &'a dyn Evaluator,
    pub params: &'a SearchParams,
    pub stop: &'a AtomicBool,
    pub nodes: &'a AtomicU64,
    pub start: Instant,
    /// Hard limit: every worker unwinds once it passes.
    pub deadline: Option<Instant>,
    /// The main worker starts no new iteration after this.
    pub soft_deadline: Option<Instant>,
    pub node_limit: Option<u64>,
    pub max_depth: i32,
}

/// What a worker reports back when it stops.
#[derive(Debug, Clone)]
pub(crate) struct WorkerResult {
    pub id: usize,
    pub best_move: Option<Move>,
    pub score: i32,
    pub depth: u32,
    pub seldepth: u32,
    pub nodes: u64,
    pub pv: Vec<Move>,
}

/// Late-move reductions by depth and move number.
struct Reductions([[i32; 64]; 64]);

impl Reductions {
    fn new(params: &SearchParams) -> Self {
        let mut table = [[0; 64]; 64];
        for (depth, row) in table.iter_mut().enumerate().skip(1) {
            for (moves, reduction) in row.iter_mut().enumerate().skip(1) {
                let r = params.lmr_base + (depth as f64).ln() * (moves as f64).ln() / params.lmr_divisor;
                *reduction = r.max(0.0) as i32;
            }
        }
        Reductions(table)
    }

    #[inline]
    fn get(&self, depth: i32, move_number: usize) -> i32 {
        self.0[(depth.max(0) as usize).min(63)][move_number.min(63)]
    }
}

/// Triangular principal-variation table.
struct PvTable {
    lines: Box<[[Move; MAX_PLY + 1]]>,
    len: [usize; MAX_PLY + 1],
}

impl PvTable {
    fn new() -> Self {
        PvTable {
            lines: vec![[Move::NULL; MAX_PLY + 1]; MAX_PLY + 1].into_boxed_slice(),
            len: [0; MAX_PLY + 1],
        }
    }

    #[inline]
    fn clear(&mut self, ply: usize) {
        if ply <= MAX_PLY {
            self.len[ply] = 0;
        }
    }

    /// `mv` followed by the line just returned from `ply + 1`.
    fn update(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        let child_len = self.len[ply + 1].min(MAX_PLY);
        let (head, tail) = self.lines.split_at_mut(ply + 1);
        let line = &mut head[ply];
        line[0] = mv;
        line[1..=child_len].copy_from_slice(&tail[0][..child_len]);
        self.len[ply] = child_len + 1;
    }

    fn root_line(&self) -> Vec<Move> {
        self.lines[0][..self.len[0]].to_vec()
    }
}

pub(crate) struct Worker<'a> {
    id: usize,
    shared: &'a Shared<'a>,
    history: &'a mut History,
    position: Position,
    reductions: Box<Reductions>,
    pv: PvTable,
    /// Continuation key of the move made at each ply; `None` for null moves.
    played: [Option<PieceTo>; MAX_PLY + 1],
    root_depth: i32,
    nodes: u64,
    flushed: u64,
    seldepth: usize,
    stopped: bool,
    jitter: Jitter,
}

impl<'a> Worker<'a> {
    pub fn new(id: usize, shared: &'a Shared<'a>, history: &'a mut History, position: Position) -> Self {
        Worker {
            id,
            shared,
            history,
            position,
            reductions: Box::new(Reductions::new(shared.params)),
            pv: PvTable::new(),
            played: [None; MAX_PLY + 1],
            root_depth: 0,
            nodes: 0,
            flushed: 0,
            seldepth: 0,
            stopped: false,
            jitter: Jitter::for_worker(id),
        }
    }

    /// Iterative deepening until a limit or the stop flag ends the search.
    pub fn run(mut self, report: Option<&Reporter>) -> WorkerResult {
        let mut result = WorkerResult {
            id: self.id,
            best_move: None,
            score: 0,
            depth: 0,
            seldepth: 0,
            nodes: 0,
            pv: Vec::new(),
        };

        // Odd helpers start one ply deeper so workers spread over depths.
        let first_depth = 1 + (self.id % 2) as i32;
        let mut previous = 0;
        for depth in first_depth..=self.shared.max_depth {
            self.root_depth = depth;
            self.seldepth = 0;
            let score = self.aspiration(depth, previous);
            if self.stopped {
                break;
            }
            previous = score;

            let pv = self.pv.root_line();
            if let Some(&best) = pv.first() {
                result.best_move = Some(best);
            }
            result.score = score;
            result.depth = depth as u32;
            result.seldepth = self.seldepth as u32;
            result.pv = pv;
            self.report(&result, report);

            if is_mate(score) && MATE - score.abs() <= depth {
                break;
            }
            if self.id == 0 && self.shared.soft_deadline.is_some_and(|soft| Instant::now() >= soft) {
                break;
            }
        }

        self.flush_nodes();
        result.nodes = self.nodes;
        result
    }

    fn report(&mut self, result: &WorkerResult, report: Option<&Reporter>) {
        if self.id != 0 {
            trace!(
                worker = self.id,
                depth = result.depth,
                score = result.score,
                "helper iteration complete"
            );
            return;
        }
        self.flush_nodes();
        let elapsed = self.shared.start.elapsed();
        let nodes = self.shared.nodes.load(Ordering::Relaxed);
        let pv = result
            .pv
            .iter()
            .map(|m| m.to_uci())
            .collect::<Vec<_>>()
            .join(" ");
        info!(
            depth = result.depth,
            seldepth = result.seldepth,
            score = result.score,
            nodes,
            nps = nps(nodes, elapsed),
            hashfull = self.shared.tt.hashfull(),
            pv = %pv,
            "iteration complete"
        );
        if let Some(report) = report {
            report(&IterationInfo {
                depth: result.depth,
                seldepth: result.seldepth,
                score: result.score,
                nodes,
                elapsed,
                hashfull: self.shared.tt.hashfull(),
                pv: result.pv.clone(),
            });
        }
    }

    fn aspiration(&mut self, depth: i32, previous: i32) -> i32 {
        let params = self.shared.params;
        if depth < params.aspiration_min_depth || is_mate(previous) {
            return self.negamax(depth, 0, -INF, INF, false);
        }

        let mut delta = params.aspiration_window;
        let mut alpha = (previous - delta).max(-INF);
        let mut beta = (previous + delta).min(INF);
        loop {
            let score = self.negamax(depth, 0, alpha, beta, false);
            if self.stopped {
                return score;
            }
            if score <= alpha {
                debug!(worker = self.id, depth, alpha, beta, "aspiration fail low");
                beta = (alpha + beta) / 2;
                alpha = (score - delta).max(-INF);
            } else if score >= beta {
                debug!(worker = self.id, depth, alpha, beta, "aspiration fail high");
                beta = (score + delta).min(INF);
            } else {
                return score;
            }
            delta += delta / 2;
            if delta > MAX_ASPIRATION_DELTA {
                alpha = -INF;
                beta = INF;
            }
        }
    }

    fn flush_nodes(&mut self) {
        self.shared
            .nodes
            .fetch_add(self.nodes - self.flushed, Ordering::Relaxed);
        self.flushed = self.nodes;
    }

    /// Counts a node and reports whether the search must unwind.
    #[inline]
    fn visit(&mut self, ply: usize) -> bool {
        self.nodes += 1;
        self.seldepth = self.seldepth.max(ply);
        if self.stopped {
            return true;
        }
        if self.nodes % CHECK_INTERVAL == 0 {
            self.flush_nodes();
            let out_of_time = self
                .shared
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline);
            let out_of_nodes = self
                .shared
                .node_limit
                .is_some_and(|limit| self.shared.nodes.load(Ordering::Relaxed) >= limit);
            if out_of_time || out_of_nodes {
                self.shared.stop.store(true, Ordering::Relaxed);
            }
        }
        if self.shared.stop.load(Ordering::Relaxed) {
            self.stopped = true;
        }
        self.stopped
    }

    #[inline]
    fn evaluate(&self) -> i32 {
        self.shared
            .evaluator
            .evaluate(&self.position)
            .clamp(-MATE_BOUND + 1, MATE_BOUND - 1)
    }

    #[inline]
    fn continuation_keys(&self, ply: usize) -> ContinuationKeys {
        [
            ply.checked_sub(1).and_then(|p| self.played[p]),
            ply.checked_sub(2).and_then(|p| self.played[p]),
        ]
    }

    fn picker(&self, moves: MoveList, tt_move: Move, ply: usize) -> MovePicker {
        let context = OrderContext {
            tables: self.shared.tables,
            position: &self.position,
            history: &*self.history,
            tt_move,
            ply,
            keys: self.continuation_keys(ply),
            jitter: &self.jitter,
        };
        MovePicker::new(moves, &context)
    }

    fn negamax(&mut self, depth: i32, ply: usize, mut alpha: i32, mut beta: i32, allow_null: bool) -> i32 {
        self.pv.clear(ply);
        if depth <= 0 {
            return self.quiescence(ply, alpha, beta, 0);
        }
        if self.visit(ply) {
            return alpha;
        }

        let tables = self.shared.tables;
        let params = self.shared.params;
        let root = ply == 0;
        let pv_node = beta - alpha > 1;
        let in_check = self.position.checkers(tables).is_not_empty();

        if !root {
            if self.position.is_draw(tables) {
                return DRAW;
            }
            if ply >= MAX_PLY - 1 {
                return self.evaluate();
            }
            alpha = alpha.max(-MATE + ply as i32);
            beta = beta.min(MATE - ply as i32 - 1);
            if alpha >= beta {
                return alpha;
            }
        }

        let key = self.position.hash();
        let entry = self.shared.tt.probe(key);
        let tt_move = entry.map_or(Move::NULL, |e| e.mv);
        if let Some(entry) = entry {
            if !root && !pv_node && entry.depth >= depth {
                let score = from_tt(entry.score, ply);
                let cutoff = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => score >= beta,
                    Bound::Upper => score <= alpha,
                };
                if cutoff {
                    return score.clamp(alpha, beta);
                }
            }
        }

        let moves = generate_moves(tables, &self.position, MoveFilter::All);
        if moves.is_empty() {
            return if in_check { -MATE + ply as i32 } else { DRAW };
        }

        let us = self.position.side_to_move();
        let static_eval = if in_check { -INF } else { self.evaluate() };

        if !root && !pv_node && !in_check {
            if depth <= params.rfp_max_depth
                && !is_mate(beta)
                && static_eval - params.rfp_margin * depth >= beta
            {
                return beta;
            }

            // Zugzwang is common once only pawns remain.
            if allow_null
                && depth >= params.nmp_min_depth
                && static_eval >= beta
                && self.position.has_non_pawn_material(us)
            {
                let reduction = params.nmp_base_reduction + depth / params.nmp_depth_divisor;
                self.played[ply] = None;
                self.position.make_null_move();
                let score = -self.negamax(depth - 1 - reduction, ply + 1, -beta, -beta + 1, false);
                self.position.unmake_null_move();
                if self.stopped {
                    return alpha;
                }
                if score >= beta {
                    return beta;
                }
            }
        }

        let futile = !pv_node
            && !in_check
            && depth <= params.futility_max_depth
            && static_eval + params.futility_margin * depth <= alpha;
        let keys = self.continuation_keys(ply);
        let killers = self.history.killers(ply);
        let mut picker = self.picker(moves, tt_move, ply);

        let original_alpha = alpha;
        let mut best_score = -INF;
        let mut best_move = Move::NULL;
        let mut searched = 0usize;
        let mut quiets_tried = MoveList::new();

        while let Some((mv, _)) = picker.next() {
            let quiet = is_quiet(&self.position, mv);

            if !root && quiet && best_score > -MATE_BOUND {
                if !pv_node
                    && !in_check
                    && depth <= params.lmp_max_depth
                    && quiets_tried.len() as i32 >= 3 + depth * depth
                {
                    continue;
                }
                if futile {
                    continue;
                }
            }

            let safe = params.check_extension && see_ge(tables, &self.position, mv, 0);
            let moved = piece_to(&self.position, mv);
            self.position.make_move(mv);
            debug_assert!(
                !self.position.is_attacked(
                    tables,
                    self.position.king_square(us),
                    !us,
                    self.position.occupied()
                ),
                "{mv} leaves the king in check"
            );
            self.played[ply] = moved;
            searched += 1;

            let gives_check = self.position.checkers(tables).is_not_empty();
            let extended = ply < 2 * self.root_depth as usize
                && ((gives_check && safe)
                    || (params.promotion_extension && mv.promotion_piece() == Some(Piece::Queen)));
            let new_depth = depth - 1 + i32::from(extended);

            let score = if searched == 1 {
                -self.negamax(new_depth, ply + 1, -beta, -alpha, true)
            } else {
                let mut reduction = 0;
                if depth >= params.lmr_min_depth && quiet && !in_check && !gives_check {
                    reduction = self.reductions.get(depth, searched);
                    if pv_node {
                        reduction -= 1;
                    }
                    if mv == killers[0] || mv == killers[1] {
                        reduction -= 1;
                    }
                    reduction = reduction.clamp(0, (new_depth - 1).max(0));
                }
                let mut score = -self.negamax(new_depth - reduction, ply + 1, -alpha - 1, -alpha, true);
                if score > alpha && reduction > 0 {
                    score = -self.negamax(new_depth, ply + 1, -alpha - 1, -alpha, true);
                }
                if score > alpha && score < beta {
                    score = -self.negamax(new_depth, ply + 1, -beta, -alpha, true);
                }
                score
            };
            self.position.unmake_move();

            if self.stopped {
                return alpha;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = mv;
                    alpha = score;
                    self.pv.update(ply, mv);
                    if score >= beta {
                        break;
                    }
                }
            }
            if quiet {
                quiets_tried.push(mv);
            }
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else if alpha > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };

        if bound == Bound::Lower && is_quiet(&self.position, best_move) {
            self.history.record_cutoff(
                &self.position,
                ply,
                depth,
                best_move,
                quiets_tried.as_slice(),
                &keys,
            );
        }

        self.shared
            .tt
            .store(key, depth, bound, best_move, to_tt(best_score, ply));

        match bound {
            Bound::Lower => beta,
            _ => alpha,
        }
    }

    fn quiescence(&mut self, ply: usize, mut alpha: i32, beta: i32, qply: u32) -> i32 {
        self.pv.clear(ply);
        if self.visit(ply) {
            return alpha;
        }
        if ply >= MAX_PLY - 1 {
            return self.evaluate();
        }
        let tables = self.shared.tables;
        if ply > 0 && self.position.is_draw(tables) {
            return DRAW;
        }

        let key = self.position.hash();
        let entry = self.shared.tt.probe(key);
        let tt_move = entry.map_or(Move::NULL, |e| e.mv);
        if let Some(entry) = entry {
            let score = from_tt(entry.score, ply);
            let cutoff = match entry.bound {
                Bound::Exact => true,
                Bound::Lower => score >= beta,
                Bound::Upper => score <= alpha,
            };
            if cutoff {
                return score.clamp(alpha, beta);
            }
        }

        let in_check = self.position.checkers(tables).is_not_empty();
        let stand_pat;
        let moves = if in_check {
            // Every evasion, so mates are never missed.
            let moves = generate_moves(tables, &self.position, MoveFilter::All);
            if moves.is_empty() {
                return -MATE + ply as i32;
            }
            stand_pat = -INF;
            moves
        } else {
            stand_pat = self.evaluate();
            if stand_pat >= beta {
                return beta;
            }
            alpha = alpha.max(stand_pat);
            generate_moves(tables, &self.position, MoveFilter::Noisy)
        };

        let original_alpha = alpha;
        let mut best_move = Move::NULL;
        let delta = self.shared.params.qsearch_delta;
        let mut picker = self.picker(moves, tt_move, ply);

        while let Some((mv, _)) = picker.next() {
            if !in_check {
                if !see_ge(tables, &self.position, mv, 1) {
                    continue;
                }
                let gain = captured_piece(&self.position, mv).map_or(0, Piece::see_value)
                    + mv.promotion_piece().map_or(0, |p| p.see_value() - Piece::Pawn.see_value());
                if stand_pat + gain + delta <= alpha {
                    continue;
                }
            }

            match self.quiescence_child(mv, ply, alpha, beta, qply, false) {
                None => return alpha,
                Some(score) if score > alpha => {
                    alpha = score;
                    best_move = mv;
                    self.pv.update(ply, mv);
                    if score >= beta {
                        self.shared
                            .tt
                            .store(key, 0, Bound::Lower, mv, to_tt(score, ply));
                        return beta;
                    }
                }
                Some(_) => {}
            }
        }

        if !in_check && qply == 0 {
            for &mv in &generate_moves(tables, &self.position, MoveFilter::Quiet) {
                if !see_ge(tables, &self.position, mv, 0) {
                    continue;
                }
                match self.quiescence_child(mv, ply, alpha, beta, qply, true) {
                    None => return alpha,
                    Some(score) if score > alpha => {
                        alpha = score;
                        best_move = mv;
                        self.pv.update(ply, mv);
                        if score >= beta {
                            self.shared
                                .tt
                                .store(key, 0, Bound::Lower, mv, to_tt(score, ply));
                            return beta;
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        let bound = if alpha > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };
        self.shared
            .tt
            .store(key, 0, bound, best_move, to_tt(alpha, ply));
        alpha
    }

    /// Searches one quiescence child. Returns `None` once the search stops,
    /// and `Some(-INF)` for a non-checking move when `checks_only` is set.
    fn quiescence_child(
        &mut self,
        mv: Move,
        ply: usize,
        alpha: i32,
        beta: i32,
        qply: u32,
        checks_only: bool,
    ) -> Option<i32> {
        let moved = piece_to(&self.position, mv);
        self.position.make_move(mv);
        if checks_only && self.position.checkers(self.shared.tables).is_empty() {
            self.position.unmake_move();
            return Some(-INF);
        }
        self.played[ply] = moved;
        let score = -self.quiescence(ply + 1, -beta, -alpha, qply + 1);
        self.position.unmake_move();
        if self.stopped {
            None
        } else {
            Some(score)
        }
    }
}
