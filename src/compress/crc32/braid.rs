//! Braided CRC-32: [`N`] independent CRCs over interleaved 64-bit words.
//!
//! The input is viewed as blocks of `N` words. Lane `i` runs a CRC over word
//! `i` of every block, so the lanes have no data dependency on each other.
//! Each lane table maps one byte of a word straight to its contribution
//! `N * W` bytes later, which folds the skipped words of the other lanes in
//! for free. In the last block the lanes are merged by running ordinary
//! word-wise CRCs over their XOR with the data.
//!
//! Both word orders are implemented. Words are loaded with an explicit byte
//! order, so either path gives the right answer on any host and [`crc32`]
//! picks the one matching the host.
//!
//! [`crc32`]: super::crc32

use super::{crc_bytes, crc_tables, multmodp, CrcTables};
use crate::compress::crc32::combine::x2nmodp_with;

/// Number of braids.
pub const N: usize = 5;
/// Word width in bytes.
pub const W: usize = 8;
/// Shortest input that takes the braided path: one full block must remain
/// after stepping to a word boundary.
pub const BRAID_THRESHOLD: usize = N * W + W - 1;

/// Build the little- and big-endian lane tables.
pub(crate) fn make_braid_tables(x2n: &[u32; 32]) -> ([[u32; 256]; W], [[u64; 256]; W]) {
    let mut ltl = [[0u32; 256]; W];
    let mut big = [[0u64; 256]; W];
    for k in 0..W {
        let p = x2nmodp_with(x2n, ((N * W + 3 - k) << 3) as u64, 0);
        for i in 1..256u32 {
            let q = multmodp(i << 24, p);
            ltl[k][i as usize] = q;
            big[W - 1 - k][i as usize] = (q as u64).swap_bytes();
        }
    }
    (ltl, big)
}

#[inline]
fn load_le(bytes: &[u8]) -> u64 {
    let mut word = [0u8; W];
    word.copy_from_slice(bytes);
    u64::from_le_bytes(word)
}

#[inline]
fn load_be(bytes: &[u8]) -> u64 {
    let mut word = [0u8; W];
    word.copy_from_slice(bytes);
    u64::from_be_bytes(word)
}

/// CRC of one little-endian word, byte by byte.
#[inline]
fn crc_word(t: &CrcTables, mut data: u64) -> u32 {
    for _ in 0..W {
        data = (data >> 8) ^ t.table[(data & 0xff) as usize] as u64;
    }
    data as u32
}

/// CRC of one big-endian word, in the byte-swapped domain.
#[inline]
fn crc_word_big(t: &CrcTables, mut data: u64) -> u64 {
    for _ in 0..W {
        data = (data << 8) ^ t.big_table[(data >> ((W - 1) << 3)) as usize & 0xff];
    }
    data
}

/// Split `data` into a head that reaches a word boundary, the braided body
/// (a whole number of blocks, at least one) and the tail.
fn split_for_braid(data: &[u8]) -> (&[u8], &[u8], &[u8]) {
    let head = data.as_ptr().align_offset(W).min(W - 1).min(data.len());
    let (head, rest) = data.split_at(head);
    let blks = rest.len() / (N * W);
    let (body, tail) = rest.split_at(blks * N * W);
    (head, body, tail)
}

/// Braided loop over little-endian words, on a pre-inverted CRC.
pub(crate) fn braid_le(t: &CrcTables, crc: u32, data: &[u8]) -> u32 {
    if data.len() < BRAID_THRESHOLD {
        return crc_bytes(&t.table, crc, data);
    }
    let (head, body, tail) = split_for_braid(data);
    let crc = crc_bytes(&t.table, crc, head);

    let mut lanes = [0u32; N];
    lanes[0] = crc;

    // All blocks but the last advance each lane past the whole block.
    let (blocks, last) = body.split_at(body.len() - N * W);
    for block in blocks.chunks_exact(N * W) {
        for (lane, word) in lanes.iter_mut().zip(block.chunks_exact(W)) {
            let word = *lane as u64 ^ load_le(word);
            let mut next = 0u32;
            for (k, table) in t.braid_le.iter().enumerate() {
                next ^= table[((word >> (k << 3)) & 0xff) as usize];
            }
            *lane = next;
        }
    }

    // Fold the lanes together through the last block.
    let mut crc = 0u32;
    for (lane, word) in lanes.iter().zip(last.chunks_exact(W)) {
        crc = crc_word(t, *lane as u64 ^ load_le(word) ^ crc as u64);
    }

    crc_bytes(&t.table, crc, tail)
}

/// Braided loop over big-endian words, on a pre-inverted CRC.
pub(crate) fn braid_be(t: &CrcTables, crc: u32, data: &[u8]) -> u32 {
    if data.len() < BRAID_THRESHOLD {
        return crc_bytes(&t.table, crc, data);
    }
    let (head, body, tail) = split_for_braid(data);
    let crc = crc_bytes(&t.table, crc, head);

    let mut lanes = [0u64; N];
    lanes[0] = (crc as u64).swap_bytes();

    let (blocks, last) = body.split_at(body.len() - N * W);
    for block in blocks.chunks_exact(N * W) {
        for (lane, word) in lanes.iter_mut().zip(block.chunks_exact(W)) {
            let word = *lane ^ load_be(word);
            let mut next = 0u64;
            for (k, table) in t.braid_be.iter().enumerate() {
                next ^= table[((word >> (k << 3)) & 0xff) as usize];
            }
            *lane = next;
        }
    }

    let mut comb = 0u64;
    for (lane, word) in lanes.iter().zip(last.chunks_exact(W)) {
        comb = crc_word_big(t, *lane ^ load_be(word) ^ comb);
    }
    let crc = comb.swap_bytes() as u32;

    crc_bytes(&t.table, crc, tail)
}

/// [`crc32`](super::crc32) forced onto the little-endian braided path.
pub fn crc32_braided_le(crc: u32, data: &[u8]) -> u32 {
    !braid_le(crc_tables(), !crc, data)
}

/// [`crc32`](super::crc32) forced onto the big-endian braided path.
pub fn crc32_braided_be(crc: u32, data: &[u8]) -> u32 {
    !braid_be(crc_tables(), !crc, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::crc32::crc32_bytewise;

    fn sample(len: usize) -> Vec<u8> {
        (0..len as u32)
            .map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect()
    }

    #[test]
    fn test_threshold() {
        assert_eq!(BRAID_THRESHOLD, 47);
    }

    #[test]
    fn test_both_orders_around_threshold() {
        let data = sample(BRAID_THRESHOLD + 64);
        for len in [BRAID_THRESHOLD - 1, BRAID_THRESHOLD, BRAID_THRESHOLD + 1] {
            for offset in 0..W {
                let slice = &data[offset..offset + len];
                let expected = crc32_bytewise(0, slice);
                assert_eq!(crc32_braided_le(0, slice), expected, "le len {len} offset {offset}");
                assert_eq!(crc32_braided_be(0, slice), expected, "be len {len} offset {offset}");
            }
        }
    }

    #[test]
    fn test_many_blocks_with_initial_crc() {
        let data = sample(4096 + 13);
        let seed = crc32_bytewise(0, b"prefix");
        let expected = crc32_bytewise(seed, &data);
        assert_eq!(crc32_braided_le(seed, &data), expected);
        assert_eq!(crc32_braided_be(seed, &data), expected);
    }

    #[test]
    fn test_split_for_braid() {
        let data = sample(200);
        let (head, body, tail) = split_for_braid(&data);
        assert!(head.len() < W);
        assert_eq!(body.len() % (N * W), 0);
        assert!(body.len() >= N * W);
        assert!(tail.len() < N * W);
        assert_eq!(head.len() + body.len() + tail.len(), data.len());
    }

    #[test]
    fn test_lane_tables_agree() {
        let t = crc_tables();
        for k in 0..W {
            for i in 0..256 {
                assert_eq!(
                    (t.braid_le[k][i] as u64).swap_bytes(),
                    t.braid_be[W - 1 - k][i]
                );
            }
        }
    }
}
