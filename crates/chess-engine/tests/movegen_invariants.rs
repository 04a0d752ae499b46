//! Move-generator invariants checked over random playouts.

use chess_core::Fen;
use chess_engine::{generate_moves, is_in_check, AttackTables, MoveFilter, Position};
use proptest::prelude::*;
use std::sync::OnceLock;

fn tables() -> &'static AttackTables {
    static TABLES: OnceLock<AttackTables> = OnceLock::new();
    TABLES.get_or_init(AttackTables::new)
}

const START_FENS: &[&str] = &[
    Fen::STARTPOS,
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
];

fn playout() -> impl Strategy<Value = (usize, Vec<u16>)> {
    (0..START_FENS.len(), prop::collection::vec(any::<u16>(), 1..40))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn moves_never_leave_own_king_attacked((start, choices) in playout()) {
        let mut position = Position::from_fen(START_FENS[start]).unwrap();
        for choice in choices {
            let moves = generate_moves(tables(), &position, MoveFilter::All);
            if moves.is_empty() {
                break;
            }
            for &m in &moves {
                let mover = position.side_to_move();
                position.make_move(m);
                prop_assert!(
                    !is_in_check(tables(), &position, mover),
                    "{} leaves the king attacked in {}", m, position.to_fen()
                );
                position.unmake_move();
            }
            position.make_move(moves[usize::from(choice) % moves.len()]);
        }
    }

    #[test]
    fn make_unmake_restores_everything((start, choices) in playout()) {
        let original = Position::from_fen(START_FENS[start]).unwrap();
        let mut position = original.clone();
        let mut played = 0;
        for choice in choices {
            let moves = generate_moves(tables(), &position, MoveFilter::All);
            if moves.is_empty() {
                break;
            }
            let before = position.clone();
            let m = moves[usize::from(choice) % moves.len()];
            position.make_move(m);
            prop_assert_eq!(position.hash(), position.compute_hash());
            prop_assert!(position.is_consistent());
            position.unmake_move();
            prop_assert_eq!(&position, &before);
            position.make_move(m);
            played += 1;
        }
        for _ in 0..played {
            position.unmake_move();
        }
        prop_assert_eq!(position.to_fen(), original.to_fen());
        prop_assert_eq!(position.hash(), original.hash());
        prop_assert_eq!(&position, &original);
    }

    #[test]
    fn noisy_and_quiet_partition_all((start, choices) in playout()) {
        let mut position = Position::from_fen(START_FENS[start]).unwrap();
        for choice in choices {
            let all = generate_moves(tables(), &position, MoveFilter::All);
            let noisy = generate_moves(tables(), &position, MoveFilter::Noisy);
            let quiet = generate_moves(tables(), &position, MoveFilter::Quiet);
            let captures = generate_moves(tables(), &position, MoveFilter::Captures);
            prop_assert_eq!(noisy.len() + quiet.len(), all.len());
            for m in &all {
                prop_assert!(noisy.contains(*m) != quiet.contains(*m));
            }
            for m in &captures {
                prop_assert!(noisy.contains(*m));
            }
            if all.is_empty() {
                break;
            }
            position.make_move(all[usize::from(choice) % all.len()]);
        }
    }

    #[test]
    fn fen_round_trips_along_playouts((start, choices) in playout()) {
        let mut position = Position::from_fen(START_FENS[start]).unwrap();
        for choice in choices {
            let reparsed = Position::from_fen(&position.to_fen()).unwrap();
            prop_assert_eq!(reparsed.hash(), position.hash());
            prop_assert_eq!(reparsed.to_fen(), position.to_fen());
            let moves = generate_moves(tables(), &position, MoveFilter::All);
            if moves.is_empty() {
                break;
            }
            position.make_move(moves[usize::from(choice) % moves.len()]);
        }
    }
}
