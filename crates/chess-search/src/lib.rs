//! Iterative-deepening alpha-beta search over [`chess_engine`] positions.
//!
//! ```
//! use chess_engine::Position;
//! use chess_search::{Engine, EngineConfig, SearchLimits};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! let position = Position::from_fen("6k1/5ppp/8/8/8/8/8/4Q1K1 w - - 0 1").unwrap();
//! let result = engine.search(&position, SearchLimits::depth(3));
//! assert_eq!(result.best_move.map(|m| m.to_uci()).as_deref(), Some("e1e8"));
//! ```

mod config;
mod engine;
mod eval;
pub mod history;
mod limits;
pub mod ordering;
mod score;
mod search;
pub mod tt;

pub use config::{ConfigError, EngineConfig, HistoryConfig, SearchParams, MAX_THREADS};
pub use engine::{search, Engine, StopHandle};
pub use eval::{Evaluator, PieceSquareEvaluator};
pub use limits::{IterationInfo, SearchLimits, SearchResult};
pub use score::{is_mate, mate_in, DRAW, INF, MATE, MAX_PLY};
pub use search::Reporter;
pub use tt::{Bound, TranspositionTable, TtEntry};
