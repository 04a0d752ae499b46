//! Shared transposition table.
//!
//! Each slot holds two relaxed atomics: the packed entry and the position key
//! XOR-ed with it. Writers never lock. A reader that sees the halves of two
//! different writes recomputes a key that does not match and treats the slot
//! as a miss, so torn entries are never trusted.
//!
//! Entry layout (`data`):
//!
//! | bits  | field      |
//! |-------|------------|
//! | 0-15  | move       |
//! | 16-31 | score      |
//! | 32-39 | depth      |
//! | 40-41 | bound      |
//! | 42-49 | generation |
//! | 63    | occupied   |

use chess_core::Move;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// How a stored score relates to the true value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exact,
    /// The true score is at least the stored one (fail high).
    Lower,
    /// The true score is at most the stored one (fail low).
    Upper,
}

impl Bound {
    fn to_bits(self) -> u64 {
        match self {
            Bound::Exact => 1,
            Bound::Lower => 2,
            Bound::Upper => 3,
        }
    }

    fn from_bits(bits: u64) -> Option<Bound> {
        match bits {
            1 => Some(Bound::Exact),
            2 => Some(Bound::Lower),
            3 => Some(Bound::Upper),
            _ => None,
        }
    }
}

/// A decoded table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtEntry {
    /// `Move::NULL` when no best move was recorded.
    pub mv: Move,
    pub score: i32,
    pub depth: i32,
    pub bound: Bound,
}

const OCCUPIED: u64 = 1 << 63;
const ENTRY_BYTES: usize = 16;

#[derive(Default)]
struct Slot {
    key: AtomicU64,
    data: AtomicU64,
}

pub struct TranspositionTable {
    slots: Box<[Slot]>,
    generation: AtomicU8,
}

impl TranspositionTable {
    /// Allocates the largest power-of-two slot count fitting in `mb` megabytes.
    pub fn new(mb: usize) -> Self {
        let bytes = mb.max(1) * 1024 * 1024;
        let count = prev_power_of_two(bytes / ENTRY_BYTES);
        TranspositionTable {
            slots: (0..count).map(|_| Slot::default()).collect(),
            generation: AtomicU8::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    fn slot(&self, key: u64) -> &Slot {
        // `len` is a power of two.
        &self.slots[(key as usize) & (self.slots.len() - 1)]
    }

    #[inline]
    fn generation(&self) -> u64 {
        u64::from(self.generation.load(Ordering::Relaxed))
    }

    pub fn probe(&self, key: u64) -> Option<TtEntry> {
        let slot = self.slot(key);
        let data = slot.data.load(Ordering::Relaxed);
        let stored_key = slot.key.load(Ordering::Relaxed);
        if data & OCCUPIED == 0 || stored_key ^ data != key {
            return None;
        }
        Some(TtEntry {
            mv: Move::from_raw(data as u16),
            score: i32::from((data >> 16) as u16 as i16),
            depth: ((data >> 32) & 0xFF) as i32,
            bound: Bound::from_bits((data >> 40) & 0b11)?,
        })
    }

    /// Stores an entry unless the slot holds deeper work from this search.
    ///
    /// Negative depths are stored as zero. A null `mv` keeps the move
    /// already stored for the same position.
    pub fn store(&self, key: u64, depth: i32, bound: Bound, mv: Move, score: i32) {
        let slot = self.slot(key);
        let old = slot.data.load(Ordering::Relaxed);
        let old_key = slot.key.load(Ordering::Relaxed) ^ old;
        let generation = self.generation();
        let depth = depth.clamp(0, 255) as u64;

        let same_position = old & OCCUPIED != 0 && old_key == key;
        let replace = old & OCCUPIED == 0
            || (old >> 42) & 0xFF != generation
            || depth >= (old >> 32) & 0xFF
            || (same_position && bound == Bound::Exact);
        if !replace {
            return;
        }

        let mv = if mv.is_null() && same_position {
            Move::from_raw(old as u16)
        } else {
            mv
        };
        let score = score.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16 as u16;
        let data = u64::from(mv.to_raw())
            | u64::from(score) << 16
            | depth << 32
            | bound.to_bits() << 40
            | generation << 42
            | OCCUPIED;
        slot.data.store(data, Ordering::Relaxed);
        slot.key.store(key ^ data, Ordering::Relaxed);
    }

    /// Starts a new search generation; older entries become preferred victims.
    pub fn new_search(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for slot in self.slots.iter() {
            slot.data.store(0, Ordering::Relaxed);
            slot.key.store(0, Ordering::Relaxed);
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    /// Reallocates the table, dropping every entry.
    pub fn resize(&mut self, mb: usize) {
        *self = TranspositionTable::new(mb);
    }

    /// Permille of sampled slots written during the current search.
    pub fn hashfull(&self) -> u32 {
        let sample = self.slots.len().min(1000);
        if sample == 0 {
            return 0;
        }
        let generation = self.generation();
        let used = self.slots[..sample]
            .iter()
            .filter(|slot| {
                let data = slot.data.load(Ordering::Relaxed);
                data & OCCUPIED != 0 && (data >> 42) & 0xFF == generation
            })
            .count();
        (used * 1000 / sample) as u32
    }
}

fn prev_power_of_two(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        1 << (usize::BITS - 1 - n.leading_zeros())
    }
}
