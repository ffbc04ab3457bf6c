//! DEFLATE alphabet constants and fixed lookup tables (RFC 1951 §3.2.5-3.2.7).

use std::sync::LazyLock;

use crate::compress::huffman::{canonical_codes, HuffmanCode};

/// Bits in the longest literal/length or distance code.
pub const MAX_BITS: u8 = 15;
/// Bits in the longest bit-length code.
pub const MAX_BL_BITS: u8 = 7;

/// Number of length codes, not counting the special end-of-block code.
pub const LENGTH_CODES: usize = 29;
/// Number of literal bytes 0..=255.
pub const LITERALS: usize = 256;
/// Number of literal/length codes, including the end-of-block code.
pub const L_CODES: usize = LITERALS + 1 + LENGTH_CODES;
/// Number of distance codes.
pub const D_CODES: usize = 30;
/// Number of codes used to transfer the bit lengths.
pub const BL_CODES: usize = 19;
/// Node storage for the literal/length tree: every leaf plus every internal node.
pub const HEAP_SIZE: usize = 2 * L_CODES + 1;

/// End-of-block literal code.
pub const END_BLOCK: usize = 256;
/// Repeat previous bit length 3-6 times (2 bits of repeat count).
pub const REP_3_6: usize = 16;
/// Repeat a zero length 3-10 times (3 bits of repeat count).
pub const REPZ_3_10: usize = 17;
/// Repeat a zero length 11-138 times (7 bits of repeat count).
pub const REPZ_11_138: usize = 18;

/// Shortest match length.
pub const MIN_MATCH: usize = 3;
/// Longest match length.
pub const MAX_MATCH: usize = 258;
/// Largest distance a DEFLATE stream can express.
pub const MAX_DIST: usize = 32768;

/// Block type: stored.
pub const STORED_BLOCK: u32 = 0;
/// Block type: fixed Huffman codes.
pub const STATIC_TREES: u32 = 1;
/// Block type: dynamic Huffman codes.
pub const DYN_TREES: u32 = 2;

/// Extra bits for each length code.
pub const EXTRA_LBITS: [u8; LENGTH_CODES] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Extra bits for each distance code.
pub const EXTRA_DBITS: [u8; D_CODES] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Extra bits for each bit-length code.
pub const EXTRA_BLBITS: [u8; BL_CODES] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2, 3, 7];

/// Order in which the bit-length code lengths are transmitted. Codes likely
/// to be unused come last so trailing zeros can be trimmed.
pub const BL_ORDER: [u8; BL_CODES] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Size of the distance-code lookup: 256 direct entries for distances 0..=255,
/// then 256 entries indexed by the distance shifted right by 7.
pub const DIST_CODE_LEN: usize = 512;

/// Precomputed DEFLATE lookup tables.
#[derive(Debug)]
pub struct StaticTables {
    /// Fixed literal/length codes. Codes 286 and 287 take part in the code
    /// assignment so the tree is complete.
    pub ltree: [HuffmanCode; L_CODES + 2],
    /// Fixed distance codes, all 5 bits.
    pub dtree: [HuffmanCode; D_CODES],
    /// Distance code for `dist - 1`, see [`d_code`].
    pub dist_code: [u8; DIST_CODE_LEN],
    /// Length code for `match_length - MIN_MATCH`.
    pub length_code: [u8; MAX_MATCH - MIN_MATCH + 1],
    /// First normalized length for each code.
    pub base_length: [u8; LENGTH_CODES],
    /// First normalized distance for each code.
    pub base_dist: [u16; D_CODES],
}

static STATIC_TABLES: LazyLock<StaticTables> = LazyLock::new(make_static_tables);

/// Shared lookup tables, built on first use.
#[inline]
pub fn static_tables() -> &'static StaticTables {
    &STATIC_TABLES
}

/// Build every DEFLATE lookup table from the extra-bit counts.
pub fn make_static_tables() -> StaticTables {
    let mut length_code = [0u8; MAX_MATCH - MIN_MATCH + 1];
    let mut base_length = [0u8; LENGTH_CODES];
    let mut length = 0usize;
    for code in 0..LENGTH_CODES - 1 {
        base_length[code] = length as u8;
        for _ in 0..(1usize << EXTRA_LBITS[code]) {
            length_code[length] = code as u8;
            length += 1;
        }
    }
    debug_assert_eq!(length, 256);
    // Length 258 has its own code; overwrite the last slot of code 27 so that
    // normalized length 255 maps to code 28.
    length_code[length - 1] = (LENGTH_CODES - 1) as u8;

    let mut dist_code = [0u8; DIST_CODE_LEN];
    let mut base_dist = [0u16; D_CODES];
    let mut dist = 0usize;
    for code in 0..16 {
        base_dist[code] = dist as u16;
        for _ in 0..(1usize << EXTRA_DBITS[code]) {
            dist_code[dist] = code as u8;
            dist += 1;
        }
    }
    debug_assert_eq!(dist, 256);
    dist >>= 7;
    for code in 16..D_CODES {
        base_dist[code] = (dist << 7) as u16;
        for _ in 0..(1usize << (EXTRA_DBITS[code] - 7)) {
            dist_code[256 + dist] = code as u8;
            dist += 1;
        }
    }
    debug_assert_eq!(dist, 256);

    let mut lengths = [0u8; L_CODES + 2];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);
    let mut ltree = [HuffmanCode::default(); L_CODES + 2];
    ltree.copy_from_slice(&canonical_codes(&lengths));

    let mut dtree = [HuffmanCode::default(); D_CODES];
    for (n, entry) in dtree.iter_mut().enumerate() {
        *entry = HuffmanCode {
            code: reverse_bits(n as u16, 5),
            length: 5,
        };
    }

    StaticTables {
        ltree,
        dtree,
        dist_code,
        length_code,
        base_length,
        base_dist,
    }
}

/// Distance code for a distance already reduced by one (`0..MAX_DIST`).
#[inline]
pub fn d_code(tables: &StaticTables, dist: usize) -> usize {
    if dist < 256 {
        tables.dist_code[dist] as usize
    } else {
        tables.dist_code[256 + (dist >> 7)] as usize
    }
}

/// Reverse the low `length` bits of `code`.
#[inline]
pub fn reverse_bits(code: u16, length: u8) -> u16 {
    debug_assert!((1..=16).contains(&length));
    code.reverse_bits() >> (16 - length)
}
