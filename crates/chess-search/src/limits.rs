//! Search limits and results.

use chess_core::Move;
use std::time::Duration;

/// When a search should stop. Unset limits do not apply; with nothing set
/// the search runs until [`StopHandle::stop`](crate::StopHandle::stop) or
/// the maximum depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    pub movetime: Option<Duration>,
    pub depth: Option<u32>,
    pub nodes: Option<u64>,
    /// Ignore every other limit.
    pub infinite: bool,
}

impl SearchLimits {
    pub fn movetime(movetime: Duration) -> Self {
        SearchLimits {
            movetime: Some(movetime),
            ..Self::default()
        }
    }

    pub fn depth(depth: u32) -> Self {
        SearchLimits {
            depth: Some(depth),
            ..Self::default()
        }
    }

    pub fn infinite() -> Self {
        SearchLimits {
            infinite: true,
            ..Self::default()
        }
    }

    pub fn with_movetime(mut self, movetime: Duration) -> Self {
        self.movetime = Some(movetime);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_nodes(mut self, nodes: u64) -> Self {
        self.nodes = Some(nodes);
        self
    }
}

/// Outcome of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// `None` only when the position has no legal move.
    pub best_move: Option<Move>,
    pub score: i32,
    /// Deepest fully completed iteration.
    pub depth: u32,
    pub seldepth: u32,
    /// Nodes visited by all workers.
    pub nodes: u64,
    pub elapsed: Duration,
    pub pv: Vec<Move>,
}

impl SearchResult {
    pub fn nps(&self) -> u64 {
        nps(self.nodes, self.elapsed)
    }
}

/// Progress report after each completed iteration of the main worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationInfo {
    pub depth: u32,
    pub seldepth: u32,
    pub score: i32,
    pub nodes: u64,
    pub elapsed: Duration,
    /// Transposition table fill, in permille.
    pub hashfull: u32,
    pub pv: Vec<Move>,
}

impl IterationInfo {
    pub fn nps(&self) -> u64 {
        nps(self.nodes, self.elapsed)
    }
}

pub(crate) fn nps(nodes: u64, elapsed: Duration) -> u64 {
    let micros = elapsed.as_micros().max(1);
    (u128::from(nodes) * 1_000_000 / micros) as u64
}
