//! Magic bitboards for sliding pieces.
//!
//! For every square the relevant blocker squares are hashed with
//! `(occupied & mask) * magic >> shift` into a per-square slice of the attack
//! table. Built-in constants are verified against every blocker subset when
//! the tables are built; a square whose constant collides gets a fresh magic
//! from [`find_magic`].

use crate::Bitboard;
use chess_core::Square;
use rand::Rng;

/// Sliding piece geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slider {
    Bishop,
    Rook,
}

impl Slider {
    const fn directions(self) -> [(i8, i8); 4] {
        match self {
            Slider::Bishop => [(1, 1), (1, -1), (-1, 1), (-1, -1)],
            Slider::Rook => [(1, 0), (-1, 0), (0, 1), (0, -1)],
        }
    }

    /// Squares whose occupancy can change this slider's attacks from `sq`.
    ///
    /// The last square of each ray is left out: a piece there blocks nothing.
    pub fn relevant_mask(self, sq: Square) -> Bitboard {
        let mut mask = Bitboard::EMPTY;
        for (df, dr) in self.directions() {
            let mut file = sq.file_index() as i8 + df;
            let mut rank = sq.rank_index() as i8 + dr;
            while Square::from_coords(file + df, rank + dr).is_some() {
                if let Some(current) = Square::from_coords(file, rank) {
                    mask.set(current);
                }
                file += df;
                rank += dr;
            }
        }
        mask
    }

    /// Ray-cast attacks; the reference the hashed tables are checked against.
    pub fn slow_attacks(self, sq: Square, occupied: Bitboard) -> Bitboard {
        let mut attacks = Bitboard::EMPTY;
        for (df, dr) in self.directions() {
            let mut file = sq.file_index() as i8 + df;
            let mut rank = sq.rank_index() as i8 + dr;
            while let Some(target) = Square::from_coords(file, rank) {
                attacks.set(target);
                if occupied.contains(target) {
                    break;
                }
                file += df;
                rank += dr;
            }
        }
        attacks
    }
}

/// Hashing parameters for one square.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Magic {
    pub mask: Bitboard,
    pub magic: u64,
    pub shift: u8,
    /// Start of this square's slice in the shared attack table.
    pub offset: usize,
}

impl Magic {
    const EMPTY: Magic = Magic {
        mask: Bitboard::EMPTY,
        magic: 0,
        shift: 64,
        offset: 0,
    };

    #[inline]
    pub fn index(&self, occupied: Bitboard) -> usize {
        self.offset + hash(occupied & self.mask, self.magic, self.shift)
    }
}

#[inline]
fn hash(relevant: Bitboard, magic: u64, shift: u8) -> usize {
    (relevant.0.wrapping_mul(magic) >> shift) as usize
}

/// Candidates with few set bits hash far more often without collisions.
fn sparse(rng: &mut impl Rng) -> u64 {
    rng.random::<u64>() & rng.random::<u64>() & rng.random::<u64>()
}

/// Every blocker subset of `mask` with its true attack set.
fn subsets(slider: Slider, sq: Square, mask: Bitboard) -> Vec<(Bitboard, Bitboard)> {
    let mut out = Vec::with_capacity(1 << mask.count());
    let mut blockers = Bitboard::EMPTY;
    loop {
        out.push((blockers, slider.slow_attacks(sq, blockers)));
        // Carry-rippler: next subset of the mask.
        blockers = Bitboard(blockers.0.wrapping_sub(mask.0) & mask.0);
        if blockers.is_empty() {
            break;
        }
    }
    out
}

/// Fills one square's table slice, or `None` on a destructive collision.
///
/// Slider attack sets are never empty, so an empty slot means unused.
fn try_fill(subsets: &[(Bitboard, Bitboard)], magic: u64, shift: u8) -> Option<Vec<Bitboard>> {
    let mut slots = vec![Bitboard::EMPTY; 1usize << (64 - shift)];
    for &(blockers, attacks) in subsets {
        let slot = &mut slots[hash(blockers, magic, shift)];
        if slot.is_empty() {
            *slot = attacks;
        } else if *slot != attacks {
            return None;
        }
    }
    Some(slots)
}

const SEARCH_ATTEMPTS: u32 = 10_000_000;

/// Randomized search for a collision-free magic using `bits` index bits.
///
/// Returns `None` if no candidate works within a fixed number of attempts.
pub fn find_magic(slider: Slider, sq: Square, bits: u32, rng: &mut impl Rng) -> Option<u64> {
    let mask = slider.relevant_mask(sq);
    let subsets = subsets(slider, sq, mask);
    let shift = (64 - bits) as u8;
    (0..SEARCH_ATTEMPTS).map(|_| sparse(&mut *rng)).find(|&candidate| {
        // Quick reject: the top byte of the product must be well mixed.
        (mask.0.wrapping_mul(candidate) & 0xFF00_0000_0000_0000).count_ones() >= 6
            && try_fill(&subsets, candidate, shift).is_some()
    })
}

/// Builds the magics and shared attack table for one slider.
pub(crate) fn build(slider: Slider, rng: &mut impl Rng) -> ([Magic; 64], Vec<Bitboard>) {
    let builtin = match slider {
        Slider::Bishop => &BISHOP_MAGICS,
        Slider::Rook => &ROOK_MAGICS,
    };
    let mut magics = [Magic::EMPTY; 64];
    let mut table = Vec::new();

    for sq in Square::all() {
        let mask = slider.relevant_mask(sq);
        let subsets = subsets(slider, sq, mask);
        let mut bits = mask.count();
        let mut magic = builtin[sq.idx()];
        let slots = loop {
            let shift = (64 - bits) as u8;
            if let Some(slots) = try_fill(&subsets, magic, shift) {
                break slots;
            }
            match find_magic(slider, sq, bits, &mut *rng) {
                Some(found) => magic = found,
                None => bits += 1,
            }
        };
        magics[sq.idx()] = Magic {
            mask,
            magic,
            shift: (64 - bits) as u8,
            offset: table.len(),
        };
        table.extend(slots);
    }

    (magics, table)
}

// Verified against every blocker subset in `build`.
const BISHOP_MAGICS: [u64; 64] = [
    0x89a1121896040240,
    0x2004844802002010,
    0x2068080051921000,
    0x62880a0220200808,
    0x0004042004000000,
    0x0100822020200011,
    0xc00444222012000a,
    0x0028808801216001,
    0x0400492088408100,
    0x0201c401040c0084,
    0x00840800910a0010,
    0x0000082080240060,
    0x2000840504006000,
    0x30010c4108405004,
    0x1008005410080802,
    0x8144042209100900,
    0x0208081020014400,
    0x004800201208ca00,
    0x0f18140408012008,
    0x1004002802102001,
    0x0841000820080811,
    0x0040200200a42008,
    0x0000800054042000,
    0x88010400410c9000,
    0x0520040470104290,
    0x1004040051500081,
    0x2002081833080021,
    0x000400c00c010142,
    0x941408200c002000,
    0x0658810000806011,
    0x0188071040440a00,
    0x4800404002011c00,
    0x0104442040404200,
    0x0511080200222104,
    0x0004022401120400,
    0x80c0040400080120,
    0x8040010040820802,
    0x0480810700020090,
    0x0102008e00040242,
    0x0809005202050100,
    0x8002024220104080,
    0x0431008804142000,
    0x0019001802081400,
    0x0200014208040080,
    0x3308082008200100,
    0x041010500040c020,
    0x4012020c04210308,
    0x208220a202004080,
    0x0111040120082000,
    0x6803040141280a00,
    0x2101004202410000,
    0x8200000041108022,
    0x0000021082088000,
    0x0002410204010040,
    0x0040100400809000,
    0x0822088220820214,
    0x0040808090012004,
    0x00910224040218c9,
    0x0402814422015008,
    0x0090014004842410,
    0x0001000042304105,
    0x0010008830412a00,
    0x2520081090008908,
    0x40102000a0a60140,
];

const ROOK_MAGICS: [u64; 64] = [
    0x0a8002c000108020,
    0x06c00049b0002001,
    0x0100200010090040,
    0x2480041000800801,
    0x0280028004000800,
    0x0900410008040022,
    0x0280020001001080,
    0x2880002041000080,
    0xa000800080400034,
    0x0004808020004000,
    0x2290802004801000,
    0x0411000d00100020,
    0x0402800800040080,
    0x000b000401004208,
    0x2409000100040200,
    0x0001002100004082,
    0x0022878001e24000,
    0x1090810021004010,
    0x0801030040200012,
    0x0500808008001000,
    0x0a08018014000880,
    0x8000808004000200,
    0x0201008080010200,
    0x0801020000441091,
    0x0000800080204005,
    0x1040200040100048,
    0x0000120200402082,
    0x0d14880480100080,
    0x0012040280080080,
    0x0100040080020080,
    0x9020010080800200,
    0x0813241200148449,
    0x0491604001800080,
    0x0100401000402001,
    0x4820010021001040,
    0x0400402202000812,
    0x0209009005000802,
    0x0810800601800400,
    0x4301083214000150,
    0x204026458e001401,
    0x0040204000808000,
    0x8001008040010020,
    0x8410820820420010,
    0x1003001000090020,
    0x0804040008008080,
    0x0012000810020004,
    0x1000100200040208,
    0x430000a044020001,
    0x0280009023410300,
    0x00e0100040002240,
    0x0000200100401700,
    0x2244100408008080,
    0x0008000400801980,
    0x0002000810040200,
    0x8010100228810400,
    0x2000009044210200,
    0x4080008040102101,
    0x0040002080411d01,
    0x2005524060000901,
    0x0502001008400422,
    0x489a000810200402,
    0x0001004400080a13,
    0x4000011008020084,
    0x0026002114058042,
];
