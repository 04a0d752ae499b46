//! Engine configuration.
//!
//! Every field carries a serde default, so a partial TOML table (or none at
//! all) deserializes to a working configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on search threads.
pub const MAX_THREADS: usize = 256;

/// Errors reported by [`EngineConfig::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("thread count must be between 1 and {MAX_THREADS}, got {0}")]
    Threads(usize),
    #[error("hash size must be at least 1 MB")]
    ZeroHash,
    #[error("history max_score must be in 1..=32767, got {0}")]
    HistoryMax(i32),
    #[error("history bonus_max must be in 1..=max_score, got {0}")]
    HistoryBonus(i32),
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
}

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transposition table size in megabytes. Defaults to 16.
    #[serde(default = "default_hash_mb")]
    pub hash_mb: usize,
    /// Number of Lazy SMP workers, the calling thread included. Defaults to 1.
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Subtracted from every fixed move time. Defaults to 10 ms.
    #[serde(default = "default_move_overhead_ms")]
    pub move_overhead_ms: u64,
    #[serde(default)]
    pub search: SearchParams,
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_hash_mb() -> usize {
    16
}

fn default_threads() -> usize {
    1
}

fn default_move_overhead_ms() -> u64 {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hash_mb: default_hash_mb(),
            threads: default_threads(),
            move_overhead_ms: default_move_overhead_ms(),
            search: SearchParams::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Checks every setting the search relies on.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(ConfigError::Threads(self.threads));
        }
        if self.hash_mb == 0 {
            return Err(ConfigError::ZeroHash);
        }
        self.history.validate()?;
        self.search.validate()
    }
}

/// Pruning and extension parameters. Depths are in plies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Half-width of the first aspiration window, in centipawns.
    pub aspiration_window: i32,
    /// First iteration that uses an aspiration window.
    pub aspiration_min_depth: i32,
    /// Reverse futility margin per ply of remaining depth.
    pub rfp_margin: i32,
    pub rfp_max_depth: i32,
    pub nmp_min_depth: i32,
    pub nmp_base_reduction: i32,
    /// Null-move reduction grows by one every this many plies.
    pub nmp_depth_divisor: i32,
    /// Futility margin per ply of remaining depth.
    pub futility_margin: i32,
    pub futility_max_depth: i32,
    /// Late-move pruning skips quiets after `3 + depth²` of them at or below this depth.
    pub lmp_max_depth: i32,
    pub lmr_min_depth: i32,
    pub lmr_base: f64,
    pub lmr_divisor: f64,
    /// Delta-pruning margin in quiescence search.
    pub qsearch_delta: i32,
    pub check_extension: bool,
    pub promotion_extension: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            aspiration_window: 25,
            aspiration_min_depth: 4,
            rfp_margin: 75,
            rfp_max_depth: 8,
            nmp_min_depth: 3,
            nmp_base_reduction: 3,
            nmp_depth_divisor: 4,
            futility_margin: 100,
            futility_max_depth: 6,
            lmp_max_depth: 6,
            lmr_min_depth: 3,
            lmr_base: 0.75,
            lmr_divisor: 2.25,
            qsearch_delta: 200,
            check_extension: true,
            promotion_extension: true,
        }
    }
}

impl SearchParams {
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("search.aspiration_window", f64::from(self.aspiration_window)),
            ("search.nmp_depth_divisor", f64::from(self.nmp_depth_divisor)),
            ("search.lmr_divisor", self.lmr_divisor),
        ];
        for (name, value) in positive {
            if value <= 0.0 || value.is_nan() {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }
}

/// Constants of the history gravity update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Scores converge towards `±max_score` and never exceed it.
    pub max_score: i32,
    pub bonus_scale: i32,
    pub bonus_offset: i32,
    pub bonus_max: i32,
    /// Penalise quiets searched before the quiet that caused a cutoff.
    pub apply_malus: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            max_score: 16384,
            bonus_scale: 256,
            bonus_offset: 128,
            bonus_max: 2048,
            apply_malus: true,
        }
    }
}

impl HistoryConfig {
    /// Bonus for a cutoff at `depth`, in `1..=bonus_max`.
    #[inline]
    pub fn bonus(&self, depth: i32) -> i32 {
        (self.bonus_scale * depth - self.bonus_offset).clamp(1, self.bonus_max)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=i32::from(i16::MAX)).contains(&self.max_score) {
            return Err(ConfigError::HistoryMax(self.max_score));
        }
        if !(1..=self.max_score).contains(&self.bonus_max) {
            return Err(ConfigError::HistoryBonus(self.bonus_max));
        }
        Ok(())
    }
}
