//! Text and JSON rendering of search results.

use chess_core::Move;
use chess_search::{mate_in, IterationInfo, SearchResult};
use serde::Serialize;

/// JSON form of a finished search.
#[derive(Debug, Serialize)]
pub struct SearchJson {
    /// `None` when the side to move has no legal move.
    pub best_move: Option<String>,
    /// Centipawns, absent when the score is a mate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_cp: Option<i32>,
    /// Full moves to mate, negative when being mated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_mate: Option<i32>,
    pub depth: u32,
    pub seldepth: u32,
    pub nodes: u64,
    pub nps: u64,
    pub time_ms: u64,
    pub pv: Vec<String>,
}

impl From<&SearchResult> for SearchJson {
    fn from(result: &SearchResult) -> Self {
        let mate = mate_in(result.score);
        SearchJson {
            best_move: result.best_move.map(|m| m.to_uci()),
            score_cp: if mate.is_none() { Some(result.score) } else { None },
            score_mate: mate,
            depth: result.depth,
            seldepth: result.seldepth,
            nodes: result.nodes,
            nps: result.nps(),
            time_ms: result.elapsed.as_millis() as u64,
            pv: uci_line(&result.pv),
        }
    }
}

pub fn uci_line(moves: &[Move]) -> Vec<String> {
    moves.iter().map(|m| m.to_uci()).collect()
}

/// `cp 35` or `mate 3`.
pub fn format_score(score: i32) -> String {
    match mate_in(score) {
        Some(moves) => format!("mate {moves}"),
        None => format!("cp {score}"),
    }
}

pub fn format_iteration(info: &IterationInfo) -> String {
    format!(
        "depth {} seldepth {} score {} nodes {} nps {} hashfull {} time {} pv {}",
        info.depth,
        info.seldepth,
        format_score(info.score),
        info.nodes,
        info.nps(),
        info.hashfull,
        info.elapsed.as_millis(),
        uci_line(&info.pv).join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_search::MATE;
    use std::time::Duration;

    #[test]
    fn scores() {
        assert_eq!(format_score(35), "cp 35");
        assert_eq!(format_score(-120), "cp -120");
        assert_eq!(format_score(MATE - 3), "mate 2");
        assert_eq!(format_score(-(MATE - 2)), "mate -1");
    }

    #[test]
    fn json_omits_the_unused_score_kind() {
        let result = SearchResult {
            best_move: None,
            score: MATE - 1,
            depth: 1,
            seldepth: 1,
            nodes: 40,
            elapsed: Duration::from_millis(2),
            pv: Vec::new(),
        };
        let json = serde_json::to_value(SearchJson::from(&result)).unwrap();
        assert_eq!(json["score_mate"], 1);
        assert!(json.get("score_cp").is_none());
        assert!(json["best_move"].is_null());
        assert_eq!(json["nps"], 20_000);
    }

    #[test]
    fn iteration_line() {
        let info = IterationInfo {
            depth: 3,
            seldepth: 5,
            score: 20,
            nodes: 1000,
            elapsed: Duration::from_millis(10),
            hashfull: 4,
            pv: Vec::new(),
        };
        assert_eq!(
            format_iteration(&info),
            "depth 3 seldepth 5 score cp 20 nodes 1000 nps 100000 hashfull 4 time 10 pv "
        );
    }
}
