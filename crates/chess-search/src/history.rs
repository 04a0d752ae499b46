//! Move-ordering memory: killer moves and history tables.
//!
//! Every history table is a [`HistoryTable`] over some [`HistoryIndex`]
//! shape. Updates use the gravity formula
//! `new = old + bonus - old * |bonus| / max`, which keeps every entry inside
//! `-max..=max` no matter how often it is rewarded.

use crate::config::HistoryConfig;
use crate::score::MAX_PLY;
use chess_core::{Color, Move, Piece, Square};
use chess_engine::Position;
use std::marker::PhantomData;

/// Gravity update of one history entry.
#[inline]
pub fn gravity(old: i32, bonus: i32, max: i32) -> i32 {
    let bonus = bonus.clamp(-max, max);
    old + bonus - old * bonus.abs() / max
}

/// Index shape of a history table.
pub trait HistoryIndex {
    const SIZE: usize;
    fn index(&self) -> usize;
}

/// Quiet move by side, from-square and to-square.
#[derive(Debug, Clone, Copy)]
pub struct Butterfly {
    pub color: Color,
    pub from: Square,
    pub to: Square,
}

impl HistoryIndex for Butterfly {
    const SIZE: usize = 2 * 64 * 64;

    #[inline]
    fn index(&self) -> usize {
        (self.color.index() * 64 + self.from.idx()) * 64 + self.to.idx()
    }
}

/// A coloured piece arriving on a square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceTo {
    pub color: Color,
    pub piece: Piece,
    pub to: Square,
}

impl PieceTo {
    const COUNT: usize = 2 * 6 * 64;

    #[inline]
    fn index(self) -> usize {
        (self.color.index() * 6 + self.piece.index()) * 64 + self.to.idx()
    }
}

/// A move following an earlier move of the same line.
#[derive(Debug, Clone, Copy)]
pub struct Continuation {
    pub previous: PieceTo,
    pub current: PieceTo,
}

impl HistoryIndex for Continuation {
    const SIZE: usize = PieceTo::COUNT * PieceTo::COUNT;

    #[inline]
    fn index(&self) -> usize {
        self.previous.index() * PieceTo::COUNT + self.current.index()
    }
}

/// Dense table of saturating scores, stored as `i16`.
pub struct HistoryTable<I: HistoryIndex> {
    entries: Box<[i16]>,
    shape: PhantomData<I>,
}

impl<I: HistoryIndex> HistoryTable<I> {
    pub fn new() -> Self {
        HistoryTable {
            entries: vec![0; I::SIZE].into_boxed_slice(),
            shape: PhantomData,
        }
    }

    #[inline]
    pub fn get(&self, index: I) -> i32 {
        i32::from(self.entries[index.index()])
    }

    /// `max` must lie in `1..=i16::MAX`.
    #[inline]
    pub fn update(&mut self, index: I, bonus: i32, max: i32) {
        let entry = &mut self.entries[index.index()];
        *entry = gravity(i32::from(*entry), bonus, max) as i16;
    }

    /// Halves every entry.
    pub fn age(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry /= 2;
        }
    }

    pub fn clear(&mut self) {
        self.entries.fill(0);
    }
}

impl<I: HistoryIndex> Default for HistoryTable<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Two killer slots per ply, most recent first.
pub struct Killers {
    slots: Box<[[Move; 2]]>,
}

impl Killers {
    pub fn new() -> Self {
        Killers {
            slots: vec![[Move::NULL; 2]; MAX_PLY + 1].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn get(&self, ply: usize) -> [Move; 2] {
        self.slots.get(ply).copied().unwrap_or([Move::NULL; 2])
    }

    pub fn record(&mut self, ply: usize, mv: Move) {
        if let Some(slot) = self.slots.get_mut(ply) {
            if slot[0] != mv {
                slot[1] = slot[0];
                slot[0] = mv;
            }
        }
    }

    pub fn clear(&mut self) {
        self.slots.fill([Move::NULL; 2]);
    }
}

impl Default for Killers {
    fn default() -> Self {
        Self::new()
    }
}

/// The continuation keys of a node: the moves played one and two plies
/// earlier, when they exist and were not null moves.
pub type ContinuationKeys = [Option<PieceTo>; 2];

/// All history state owned by one search worker.
pub struct History {
    config: HistoryConfig,
    butterfly: HistoryTable<Butterfly>,
    continuation: [HistoryTable<Continuation>; 2],
    killers: Killers,
}

impl History {
    pub fn new(config: HistoryConfig) -> Self {
        History {
            config,
            butterfly: HistoryTable::new(),
            continuation: [HistoryTable::new(), HistoryTable::new()],
            killers: Killers::new(),
        }
    }

    #[inline]
    pub fn killers(&self, ply: usize) -> [Move; 2] {
        self.killers.get(ply)
    }

    /// Combined butterfly and continuation score of a quiet move.
    pub fn quiet_score(&self, position: &Position, mv: Move, keys: &ContinuationKeys) -> i32 {
        let color = position.side_to_move();
        let mut score = self.butterfly.get(Butterfly {
            color,
            from: mv.from(),
            to: mv.to(),
        });
        if let Some(current) = piece_to(position, mv) {
            for (table, previous) in self.continuation.iter().zip(keys) {
                if let Some(previous) = *previous {
                    score += table.get(Continuation { previous, current });
                }
            }
        }
        score
    }

    /// Rewards the quiet `best` that failed high at `depth`, and penalises
    /// the quiets searched before it.
    pub fn record_cutoff(
        &mut self,
        position: &Position,
        ply: usize,
        depth: i32,
        best: Move,
        tried: &[Move],
        keys: &ContinuationKeys,
    ) {
        self.killers.record(ply, best);
        let bonus = self.config.bonus(depth);
        self.update_quiet(position, best, bonus, keys);
        if self.config.apply_malus {
            for &mv in tried {
                self.update_quiet(position, mv, -bonus, keys);
            }
        }
    }

    fn update_quiet(&mut self, position: &Position, mv: Move, bonus: i32, keys: &ContinuationKeys) {
        let max = self.config.max_score;
        self.butterfly.update(
            Butterfly {
                color: position.side_to_move(),
                from: mv.from(),
                to: mv.to(),
            },
            bonus,
            max,
        );
        if let Some(current) = piece_to(position, mv) {
            for (table, previous) in self.continuation.iter_mut().zip(keys) {
                if let Some(previous) = *previous {
                    table.update(Continuation { previous, current }, bonus, max);
                }
            }
        }
    }

    /// Called between searches: halves the tables and forgets killers.
    pub fn age(&mut self) {
        self.butterfly.age();
        for table in &mut self.continuation {
            table.age();
        }
        self.killers.clear();
    }

    pub fn clear(&mut self) {
        self.butterfly.clear();
        for table in &mut self.continuation {
            table.clear();
        }
        self.killers.clear();
    }
}

/// The piece `mv` moves and where it lands, read before the move is made.
#[inline]
pub fn piece_to(position: &Position, mv: Move) -> Option<PieceTo> {
    position
        .piece_at(mv.from())
        .map(|(piece, color)| PieceTo {
            color,
            piece,
            to: mv.to(),
        })
}
