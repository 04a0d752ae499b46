//! The search coordinator.
//!
//! [`Engine`] owns everything that outlives a single search: the
//! transposition table and one [`History`] per worker. Attack tables are
//! built once per process and shared by every engine. Each call to
//! [`Engine::search`] runs Lazy SMP: the calling thread is worker 0 and the
//! remaining workers run on scoped threads, all sharing the table and the
//! stop flag.

use crate::config::{ConfigError, EngineConfig, MAX_THREADS};
use crate::eval::{Evaluator, PieceSquareEvaluator};
use crate::history::History;
use crate::limits::{IterationInfo, SearchLimits, SearchResult};
use crate::score::{DRAW, MATE, MAX_PLY};
use crate::search::{Reporter, Shared, Worker, WorkerResult};
use crate::tt::TranspositionTable;
use chess_engine::{generate_moves, is_in_check, AttackTables, MoveFilter, Position};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Attack tables shared by every engine in the process, built on first use.
fn attack_tables() -> &'static AttackTables {
    static TABLES: OnceLock<AttackTables> = OnceLock::new();
    TABLES.get_or_init(AttackTables::new)
}

/// Cancels a running search from another thread.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct Engine {
    tables: &'static AttackTables,
    config: EngineConfig,
    tt: TranspositionTable,
    histories: Vec<History>,
    evaluator: Box<dyn Evaluator>,
    stop: Arc<AtomicBool>,
    reporter: Option<Box<Reporter>>,
}

impl Engine {
    /// Engine with the reference piece-square evaluator.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` does not validate.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_evaluator(config, PieceSquareEvaluator)
    }

    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` does not validate.
    pub fn with_evaluator(
        config: EngineConfig,
        evaluator: impl Evaluator + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, Box::new(evaluator)))
    }

    fn build(config: EngineConfig, evaluator: Box<dyn Evaluator>) -> Self {
        let histories = (0..config.threads)
            .map(|_| History::new(config.history.clone()))
            .collect();
        Engine {
            tables: attack_tables(),
            tt: TranspositionTable::new(config.hash_mb),
            histories,
            evaluator,
            stop: Arc::new(AtomicBool::new(false)),
            reporter: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tables(&self) -> &AttackTables {
        self.tables
    }

    pub fn tt(&self) -> &TranspositionTable {
        &self.tt
    }

    /// # Errors
    ///
    /// Rejects zero threads and anything above [`MAX_THREADS`].
    pub fn set_threads(&mut self, threads: usize) -> Result<(), ConfigError> {
        if threads == 0 || threads > MAX_THREADS {
            return Err(ConfigError::Threads(threads));
        }
        let history = self.config.history.clone();
        self.histories
            .resize_with(threads, || History::new(history.clone()));
        self.config.threads = threads;
        Ok(())
    }

    /// Reallocates the transposition table, dropping its contents.
    ///
    /// # Errors
    ///
    /// Rejects a zero size.
    pub fn set_hash(&mut self, mb: usize) -> Result<(), ConfigError> {
        if mb == 0 {
            return Err(ConfigError::ZeroHash);
        }
        self.tt.resize(mb);
        self.config.hash_mb = mb;
        Ok(())
    }

    /// Receives every completed iteration of the main worker.
    pub fn set_reporter(&mut self, reporter: impl Fn(&IterationInfo) + Send + Sync + 'static) {
        self.reporter = Some(Box::new(reporter));
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Forgets everything learned in earlier games.
    pub fn new_game(&mut self) {
        self.tt.clear();
        for history in &mut self.histories {
            history.clear();
        }
    }

    /// Searches `position` until `limits` (or a stop request) end it.
    pub fn search(&mut self, position: &Position, limits: SearchLimits) -> SearchResult {
        let start = Instant::now();
        self.stop.store(false, Ordering::Relaxed);
        self.tt.new_search();
        for history in &mut self.histories {
            history.age();
        }

        let moves = generate_moves(self.tables, position, MoveFilter::All);
        if moves.is_empty() {
            let score = if is_in_check(self.tables, position, position.side_to_move()) {
                -MATE
            } else {
                DRAW
            };
            debug!(score, "no legal moves");
            return SearchResult {
                best_move: None,
                score,
                depth: 0,
                seldepth: 0,
                nodes: 0,
                elapsed: start.elapsed(),
                pv: Vec::new(),
            };
        }
        if moves.len() == 1 && !limits.infinite {
            let only = moves[0];
            debug!(mv = %only, "single legal move");
            return SearchResult {
                best_move: Some(only),
                score: self.evaluator.evaluate(position),
                depth: 0,
                seldepth: 0,
                nodes: 0,
                elapsed: start.elapsed(),
                pv: vec![only],
            };
        }

        let (deadline, soft_deadline) = match limits.movetime.filter(|_| !limits.infinite) {
            Some(movetime) => {
                let budget = movetime
                    .saturating_sub(Duration::from_millis(self.config.move_overhead_ms))
                    .max(Duration::from_millis(1));
                (Some(start + budget), Some(start + budget / 2))
            }
            None => (None, None),
        };
        let deepest = MAX_PLY as i32 - 1;
        let max_depth = match limits.depth.filter(|_| !limits.infinite) {
            Some(depth) => (depth as i32).clamp(1, deepest),
            None => deepest,
        };

        debug!(
            threads = self.histories.len(),
            ?limits,
            fen = %position.to_fen(),
            "search start"
        );

        let nodes = AtomicU64::new(0);
        let shared = Shared {
            tables: self.tables,
            tt: &self.tt,
            evaluator: self.evaluator.as_ref(),
            params: &self.config.search,
            stop: &self.stop,
            nodes: &nodes,
            start,
            deadline,
            soft_deadline,
            node_limit: limits.nodes.filter(|_| !limits.infinite),
            max_depth,
        };
        let reporter = self.reporter.as_deref();

        let results: Vec<WorkerResult> = match self.histories.split_first_mut() {
            Some((main_history, helper_histories)) => std::thread::scope(|scope| {
                let shared = &shared;
                let helpers: Vec<_> = helper_histories
                    .iter_mut()
                    .enumerate()
                    .map(|(i, history)| {
                        let position = position.clone();
                        scope.spawn(move || Worker::new(i + 1, shared, history, position).run(None))
                    })
                    .collect();

                let main = Worker::new(0, shared, main_history, position.clone()).run(reporter);
                shared.stop.store(true, Ordering::Relaxed);

                let mut results = vec![main];
                for (i, helper) in helpers.into_iter().enumerate() {
                    match helper.join() {
                        Ok(result) => results.push(result),
                        Err(_) => warn!(worker = i + 1, "search helper panicked"),
                    }
                }
                results
            }),
            None => Vec::new(),
        };

        let total_nodes: u64 = results.iter().map(|r| r.nodes).sum();
        let elapsed = start.elapsed();
        let result = match pick_result(results) {
            Some(best) => SearchResult {
                best_move: best.best_move,
                score: best.score,
                depth: best.depth,
                seldepth: best.seldepth,
                nodes: total_nodes,
                elapsed,
                pv: best.pv,
            },
            None => SearchResult {
                best_move: Some(moves[0]),
                score: self.evaluator.evaluate(position),
                depth: 0,
                seldepth: 0,
                nodes: total_nodes,
                elapsed,
                pv: vec![moves[0]],
            },
        };
        debug!(
            best = ?result.best_move.map(|m| m.to_uci()),
            score = result.score,
            depth = result.depth,
            nodes = result.nodes,
            elapsed_ms = elapsed.as_millis() as u64,
            "search stop"
        );
        result
    }
}

/// The deepest completed iteration wins; equal depths go to the lower
/// worker id, so the main worker wins ties.
fn pick_result(results: Vec<WorkerResult>) -> Option<WorkerResult> {
    results
        .into_iter()
        .filter(|r| r.best_move.is_some())
        .max_by(|a, b| a.depth.cmp(&b.depth).then(b.id.cmp(&a.id)))
}

/// One-shot search with default settings: `thread_count` workers (clamped to
/// `1..=MAX_THREADS`) for at most `time_budget`. Reuses the process-wide
/// attack tables.
pub fn search(position: &Position, time_budget: Duration, thread_count: usize) -> SearchResult {
    let config = EngineConfig {
        threads: thread_count.clamp(1, MAX_THREADS),
        ..EngineConfig::default()
    };
    Engine::build(config, Box::new(PieceSquareEvaluator)).search(position, SearchLimits::movetime(time_budget))
}
