//! Zobrist keys.
//!
//! A position key is the XOR of one key per (colour, piece, square) occupant,
//! a side-to-move key when Black is to move, one key per castling-rights
//! combination and one key per en-passant file. The tables are evaluated at
//! compile time.

use chess_core::{Color, Piece, Square};

pub struct ZobristKeys {
    pieces: [[[u64; 64]; 6]; 2],
    black_to_move: u64,
    /// Indexed by the full rights bitmask: the XOR of its single-right keys.
    castling: [u64; 16],
    en_passant: [u64; 8],
}

const fn splitmix(state: u64) -> (u64, u64) {
    let state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (state, z ^ (z >> 31))
}

impl ZobristKeys {
    const fn generate() -> Self {
        let mut state = 0x3243_F6A8_885A_308D;
        let mut pieces = [[[0u64; 64]; 6]; 2];
        let mut color = 0;
        while color < 2 {
            let mut piece = 0;
            while piece < 6 {
                let mut sq = 0;
                while sq < 64 {
                    let (next, key) = splitmix(state);
                    state = next;
                    pieces[color][piece][sq] = key;
                    sq += 1;
                }
                piece += 1;
            }
            color += 1;
        }

        let (next, black_to_move) = splitmix(state);
        state = next;

        let mut rights = [0u64; 4];
        let mut i = 0;
        while i < 4 {
            let (next, key) = splitmix(state);
            state = next;
            rights[i] = key;
            i += 1;
        }
        let mut castling = [0u64; 16];
        let mut mask = 0;
        while mask < 16 {
            let mut bit = 0;
            while bit < 4 {
                if mask & (1 << bit) != 0 {
                    castling[mask] ^= rights[bit];
                }
                bit += 1;
            }
            mask += 1;
        }

        let mut en_passant = [0u64; 8];
        let mut file = 0;
        while file < 8 {
            let (next, key) = splitmix(state);
            state = next;
            en_passant[file] = key;
            file += 1;
        }

        ZobristKeys {
            pieces,
            black_to_move,
            castling,
            en_passant,
        }
    }

    #[inline]
    pub fn piece(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.pieces[color.index()][piece.index()][sq.idx()]
    }

    #[inline]
    pub fn black_to_move(&self) -> u64 {
        self.black_to_move
    }

    /// Key for a full castling-rights value (4 bits).
    #[inline]
    pub fn castling(&self, rights: u8) -> u64 {
        self.castling[(rights & 0xF) as usize]
    }

    #[inline]
    pub fn en_passant(&self, file: u8) -> u64 {
        self.en_passant[(file & 7) as usize]
    }
}

pub static ZOBRIST: ZobristKeys = ZobristKeys::generate();
