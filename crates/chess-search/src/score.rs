//! Score constants and mate arithmetic.
//!
//! Scores are centipawns from the side to move's point of view. A forced
//! mate found `n` plies from the root scores `MATE - n`; being mated scores
//! `-(MATE - n)`.

/// Deepest ply any search line may reach.
pub const MAX_PLY: usize = 128;

pub const MATE: i32 = 32_000;
/// Strictly above every reachable score.
pub const INF: i32 = 32_001;
pub const DRAW: i32 = 0;

/// Scores at or beyond this magnitude are mates.
pub const MATE_BOUND: i32 = MATE - MAX_PLY as i32;

#[inline]
pub fn is_mate(score: i32) -> bool {
    score.abs() >= MATE_BOUND && score.abs() <= MATE
}

/// Full moves to mate: positive when the side to move mates, negative when
/// it is mated.
pub fn mate_in(score: i32) -> Option<i32> {
    if !is_mate(score) {
        return None;
    }
    let plies = MATE - score.abs();
    Some(if score > 0 {
        (plies + 1) / 2
    } else {
        -(plies / 2)
    })
}

/// Makes a mate score relative to the node at `ply` before storing it.
#[inline]
pub(crate) fn to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score + ply as i32
    } else if score <= -MATE_BOUND {
        score - ply as i32
    } else {
        score
    }
}

/// Inverse of [`to_tt`].
#[inline]
pub(crate) fn from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score - ply as i32
    } else if score <= -MATE_BOUND {
        score + ply as i32
    } else {
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_distances() {
        assert_eq!(mate_in(MATE - 1), Some(1));
        assert_eq!(mate_in(MATE - 3), Some(2));
        assert_eq!(mate_in(-(MATE - 2)), Some(-1));
        assert_eq!(mate_in(-MATE), Some(0));
        assert_eq!(mate_in(150), None);
        assert!(!is_mate(INF));
    }

    #[test]
    fn tt_adjustment_round_trips() {
        for ply in [0usize, 1, 7, 40] {
            for score in [0, 250, -900, MATE - 5, -(MATE - 9)] {
                assert_eq!(from_tt(to_tt(score, ply), ply), score);
            }
        }
        // A mate in 3 plies seen from ply 2 is a mate in 1 ply from that node.
        assert_eq!(to_tt(MATE - 3, 2), MATE - 1);
    }
}
