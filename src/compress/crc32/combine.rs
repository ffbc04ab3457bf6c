//! CRC combination through polynomial arithmetic modulo p(x).
//!
//! A CRC register is a polynomial over GF(2) in reflected bit order: bit 31
//! holds the coefficient of x^0. Appending `len2` bytes to a message
//! multiplies its CRC by `x^(8 * len2) mod p(x)`, so the CRC of a
//! concatenation follows from the two parts' CRCs and the second length.
//! The length of the first part plays no role, so [`crc32_combine`] takes
//! only `(crc1, crc2, len2)`; a four-argument `(crc_a, len_a, crc_b, len_b)`
//! call maps to `crc32_combine(crc_a, crc_b, len_b)`.

use super::{crc_tables, POLY};

/// Multiply `a` by `b` modulo p(x).
pub fn multmodp(a: u32, mut b: u32) -> u32 {
    if a == 0 {
        return 0;
    }
    let mut m = 1u32 << 31;
    let mut p = 0u32;
    loop {
        if a & m != 0 {
            p ^= b;
            if a & (m - 1) == 0 {
                break;
            }
        }
        m >>= 1;
        b = if b & 1 != 0 { (b >> 1) ^ POLY } else { b >> 1 };
    }
    p
}

/// `x^(n * 2^k) mod p(x)` from a table of `x^(2^k)`.
pub(crate) fn x2nmodp_with(x2n: &[u32; 32], mut n: u64, mut k: u32) -> u32 {
    let mut p = 1u32 << 31; // x^0 == 1
    while n != 0 {
        if n & 1 != 0 {
            p = multmodp(x2n[(k & 31) as usize], p);
        }
        n >>= 1;
        k += 1;
    }
    p
}

/// `x^(n * 2^k) mod p(x)`, in O(log n) multiplications.
pub fn x2nmodp(n: u64, k: u32) -> u32 {
    x2nmodp_with(&crc_tables().x2n, n, k)
}

/// CRC of `A ++ B` from `crc1 = crc32(A)`, `crc2 = crc32(B)` and `len2 = |B|`.
///
/// `|A|` is not needed.
pub fn crc32_combine(crc1: u32, crc2: u32, len2: u64) -> u32 {
    multmodp(x2nmodp(len2, 3), crc1) ^ crc2
}

/// Operator for [`crc32_combine_op`], reusable for every second part of
/// length `len2`.
pub fn crc32_combine_gen(len2: u64) -> u32 {
    x2nmodp(len2, 3)
}

/// [`crc32_combine`] with a precomputed operator from [`crc32_combine_gen`].
pub fn crc32_combine_op(crc1: u32, crc2: u32, op: u32) -> u32 {
    multmodp(op, crc1) ^ crc2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::crc32::crc32;

    #[test]
    fn test_multmodp_identity_and_zero() {
        let one = 1u32 << 31;
        for v in [0u32, 1, 0xCBF4_3926, u32::MAX] {
            assert_eq!(multmodp(one, v), v);
            assert_eq!(multmodp(v, one), v);
            assert_eq!(multmodp(0, v), 0);
        }
    }

    #[test]
    fn test_multmodp_commutes() {
        let pairs = [(0x1234_5678u32, 0x9ABC_DEF0u32), (0xDEAD_BEEF, 0x0BAD_F00D)];
        for (a, b) in pairs {
            assert_eq!(multmodp(a, b), multmodp(b, a));
        }
    }

    #[test]
    fn test_x2nmodp_matches_table() {
        let t = crc_tables();
        for k in 0..32 {
            assert_eq!(x2nmodp(1, k), t.x2n[k as usize]);
        }
        assert_eq!(x2nmodp(0, 3), 1 << 31);
    }

    #[test]
    fn test_combine_check_value() {
        let a = crc32(0, b"12345");
        let b = crc32(0, b"6789");
        assert_eq!(crc32_combine(a, b, 4), 0xCBF43926);
    }

    #[test]
    fn test_combine_ignores_first_length() {
        // The same second part after first parts of different lengths.
        let b = crc32(0, b"tail");
        for first in [&b"x"[..], &b"longer first part"[..], &[0u8; 1000][..]] {
            let mut joined = first.to_vec();
            joined.extend_from_slice(b"tail");
            assert_eq!(crc32_combine(crc32(0, first), b, 4), crc32(0, &joined));
        }
    }

    #[test]
    fn test_combine_with_empty_parts() {
        let a = crc32(0, b"hello");
        assert_eq!(crc32_combine(a, 0, 0), a);
        assert_eq!(crc32_combine(0, a, 5), a);
    }

    #[test]
    fn test_combine_gen_op() {
        let data = vec![0xA5u8; 3000];
        let op = crc32_combine_gen(1000);
        let part = crc32(0, &data[..1000]);
        let mut acc = part;
        acc = crc32_combine_op(acc, part, op);
        acc = crc32_combine_op(acc, part, op);
        assert_eq!(acc, crc32(0, &data));
    }
}
