//! Perft (performance test) for move generator validation.
//!
//! Perft counts the number of leaf nodes at a given depth, which can be
//! compared against known-correct values to validate the move generator.

use super::{generate_moves, AttackTables, MoveFilter};
use crate::Position;
use chess_core::Move;

/// Counts the number of leaf nodes at the given depth.
///
/// The position is walked with make/unmake and is left unchanged.
pub fn perft(tables: &AttackTables, position: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }

    let moves = generate_moves(tables, position, MoveFilter::All);

    // Bulk counting: legal generation means the leaves need no make/unmake.
    if depth == 1 {
        return moves.len() as u64;
    }

    let mut nodes = 0u64;
    for &m in &moves {
        position.make_move(m);
        nodes += perft(tables, position, depth - 1);
        position.unmake_move();
    }
    nodes
}

/// Perft split by root move, sorted by the move's UCI text.
pub fn perft_divide(tables: &AttackTables, position: &mut Position, depth: u32) -> Vec<(Move, u64)> {
    if depth == 0 {
        return Vec::new();
    }
    let moves = generate_moves(tables, position, MoveFilter::All);
    let mut results = Vec::with_capacity(moves.len());

    for &m in &moves {
        position.make_move(m);
        let nodes = perft(tables, position, depth - 1);
        position.unmake_move();
        results.push((m, nodes));
    }

    results.sort_by_key(|(m, _)| m.to_uci());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    fn tables() -> &'static AttackTables {
        static TABLES: OnceLock<AttackTables> = OnceLock::new();
        TABLES.get_or_init(AttackTables::new)
    }

    fn perft_fen(fen: &str, depth: u32) -> u64 {
        let mut position = Position::from_fen(fen).unwrap();
        let before = position.clone();
        let nodes = perft(tables(), &mut position, depth);
        assert_eq!(position, before);
        nodes
    }

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    const POSITION_3: &str = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    const POSITION_4: &str = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    const POSITION_5: &str = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
    const POSITION_6: &str =
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";

    #[test]
    fn perft_depth_zero_is_one() {
        assert_eq!(perft_fen(chess_core::Fen::STARTPOS, 0), 1);
    }

    #[test]
    fn perft_startpos_depth_1() {
        assert_eq!(perft_fen(chess_core::Fen::STARTPOS, 1), 20);
    }

    #[test]
    fn perft_startpos_depth_2() {
        assert_eq!(perft_fen(chess_core::Fen::STARTPOS, 2), 400);
    }

    #[test]
    fn perft_startpos_depth_3() {
        assert_eq!(perft_fen(chess_core::Fen::STARTPOS, 3), 8902);
    }

    #[test]
    fn perft_startpos_depth_4() {
        assert_eq!(perft_fen(chess_core::Fen::STARTPOS, 4), 197_281);
    }

    // Depth 5 is slower, only run in release mode
    #[test]
    #[ignore]
    fn perft_startpos_depth_5() {
        assert_eq!(perft_fen(chess_core::Fen::STARTPOS, 5), 4_865_609);
    }

    #[test]
    #[ignore]
    fn perft_startpos_depth_6() {
        assert_eq!(perft_fen(chess_core::Fen::STARTPOS, 6), 119_060_324);
    }

    // Kiwipete: castling, en passant and promotions all in play
    #[test]
    fn perft_kiwipete() {
        assert_eq!(perft_fen(KIWIPETE, 1), 48);
        assert_eq!(perft_fen(KIWIPETE, 2), 2039);
        assert_eq!(perft_fen(KIWIPETE, 3), 97_862);
    }

    #[test]
    #[ignore]
    fn perft_kiwipete_depth_4() {
        assert_eq!(perft_fen(KIWIPETE, 4), 4_085_603);
    }

    // Endgame with discovered checks and en passant pins
    #[test]
    fn perft_position_3() {
        assert_eq!(perft_fen(POSITION_3, 1), 14);
        assert_eq!(perft_fen(POSITION_3, 2), 191);
        assert_eq!(perft_fen(POSITION_3, 3), 2812);
        assert_eq!(perft_fen(POSITION_3, 4), 43_238);
    }

    #[test]
    #[ignore]
    fn perft_position_3_depth_5() {
        assert_eq!(perft_fen(POSITION_3, 5), 674_624);
    }

    #[test]
    fn perft_position_4() {
        assert_eq!(perft_fen(POSITION_4, 1), 6);
        assert_eq!(perft_fen(POSITION_4, 2), 264);
        assert_eq!(perft_fen(POSITION_4, 3), 9467);
    }

    #[test]
    fn perft_position_5() {
        assert_eq!(perft_fen(POSITION_5, 1), 44);
        assert_eq!(perft_fen(POSITION_5, 2), 1486);
        assert_eq!(perft_fen(POSITION_5, 3), 62_379);
    }

    #[test]
    fn perft_position_6() {
        assert_eq!(perft_fen(POSITION_6, 1), 46);
        assert_eq!(perft_fen(POSITION_6, 2), 2079);
        assert_eq!(perft_fen(POSITION_6, 3), 89_890);
    }

    #[test]
    fn perft_divide_sums_to_perft() {
        let mut position = Position::startpos();
        let divide = perft_divide(tables(), &mut position, 3);
        assert_eq!(divide.len(), 20);
        assert_eq!(divide.iter().map(|(_, n)| n).sum::<u64>(), 8902);
        let e2e4 = divide.iter().find(|(m, _)| m.to_uci() == "e2e4").unwrap();
        assert_eq!(e2e4.1, 600);
        assert!(divide.windows(2).all(|w| w[0].0.to_uci() <= w[1].0.to_uci()));
    }
}
