//! CRC-32 checksum (CRC-32/ISO-HDLC, as used by gzip, zip and PNG).
//!
//! Short inputs run a byte-at-a-time table loop. From [`BRAID_THRESHOLD`]
//! bytes on, the input is split into five interleaved word streams whose
//! CRCs are computed independently and merged at the end (see [`braid`]).
//! CRCs of adjacent ranges can be joined without the data through
//! [`crc32_combine`].

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::sync::LazyLock;

pub mod braid;
pub mod combine;

pub use braid::{crc32_braided_be, crc32_braided_le, BRAID_THRESHOLD, N, W};
pub use combine::{crc32_combine, crc32_combine_gen, crc32_combine_op, multmodp, x2nmodp};

/// Reflected CRC-32 polynomial (0x04C11DB7 bit-reversed).
pub const POLY: u32 = 0xEDB8_8320;

/// Lookup tables for every CRC path.
#[derive(Debug)]
pub struct CrcTables {
    /// Byte-at-a-time table.
    pub table: [u32; 256],
    /// `table` with each entry byte-swapped into a 64-bit word.
    pub big_table: [u64; 256],
    /// Per-byte-position braid tables for little-endian words.
    pub braid_le: [[u32; 256]; W],
    /// Per-byte-position braid tables for big-endian words.
    pub braid_be: [[u64; 256]; W],
    /// `x^(2^k) mod p(x)` for k in 0..32.
    pub x2n: [u32; 32],
}

static CRC_TABLES: LazyLock<CrcTables> = LazyLock::new(make_crc_tables);

/// Shared tables, built on first use by whichever thread gets there first.
#[inline]
pub fn crc_tables() -> &'static CrcTables {
    &CRC_TABLES
}

/// Generate every CRC table from the polynomial.
pub fn make_crc_tables() -> CrcTables {
    let mut table = [0u32; 256];
    let mut big_table = [0u64; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut p = i as u32;
        for _ in 0..8 {
            p = if p & 1 != 0 { (p >> 1) ^ POLY } else { p >> 1 };
        }
        *entry = p;
        big_table[i] = (p as u64).swap_bytes();
    }

    let mut x2n = [0u32; 32];
    let mut p = 1u32 << 30; // x^1
    x2n[0] = p;
    for entry in x2n.iter_mut().skip(1) {
        p = multmodp(p, p);
        *entry = p;
    }

    let (braid_le, braid_be) = braid::make_braid_tables(&x2n);

    CrcTables {
        table,
        big_table,
        braid_le,
        braid_be,
        x2n,
    }
}

/// One table step per byte on a pre-inverted CRC.
#[inline]
pub(crate) fn crc_bytes(table: &[u32; 256], mut crc: u32, data: &[u8]) -> u32 {
    for &b in data {
        crc = (crc >> 8) ^ table[((crc ^ b as u32) & 0xff) as usize];
    }
    crc
}

#[inline]
fn host_is_little_endian() -> bool {
    1u16.to_ne_bytes()[0] == 1
}

/// Update `crc` with `data`.
///
/// Start from 0; feeding the result back in continues the checksum, so
/// `crc32(crc32(0, a), b) == crc32(0, a ++ b)`.
pub fn crc32(crc: u32, data: &[u8]) -> u32 {
    let tables = crc_tables();
    let crc = !crc;
    let crc = if data.len() < BRAID_THRESHOLD {
        crc_bytes(&tables.table, crc, data)
    } else if host_is_little_endian() {
        braid::braid_le(tables, crc, data)
    } else {
        braid::braid_be(tables, crc, data)
    };
    !crc
}

/// Like [`crc32`], where absent input yields the initial value 0.
pub fn crc32_opt(crc: u32, data: Option<&[u8]>) -> u32 {
    match data {
        Some(data) => crc32(crc, data),
        None => 0,
    }
}

/// Update `crc` with `data` one byte at a time.
pub fn crc32_bytewise(crc: u32, data: &[u8]) -> u32 {
    !crc_bytes(&crc_tables().table, !crc, data)
}

/// CRC of `data` computed over independent chunks of `chunk_size` bytes and
/// merged with [`crc32_combine`]. With the `parallel` feature the chunks run
/// on the rayon pool.
pub fn crc32_chunked(data: &[u8], chunk_size: usize) -> u32 {
    let chunk_size = chunk_size.max(1);

    #[cfg(feature = "parallel")]
    let parts: Vec<(u32, u64)> = data
        .par_chunks(chunk_size)
        .map(|chunk| (crc32(0, chunk), chunk.len() as u64))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let parts: Vec<(u32, u64)> = data
        .chunks(chunk_size)
        .map(|chunk| (crc32(0, chunk), chunk.len() as u64))
        .collect();

    parts
        .into_iter()
        .fold(0, |acc, (crc, len)| crc32_combine(acc, crc, len))
}

/// Calculate CRC32 incrementally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc32 {
    crc: u32,
    len: u64,
}

impl Crc32 {
    /// Create a new CRC32 calculator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the CRC with more data.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        self.crc = crc32(self.crc, data);
        self.len += data.len() as u64;
    }

    /// Append the range hashed by `other`, as if its bytes had been passed
    /// to [`update`](Self::update).
    pub fn combine(&mut self, other: &Crc32) {
        self.crc = crc32_combine(self.crc, other.crc, other.len);
        self.len += other.len;
    }

    /// Number of bytes hashed.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True when no bytes have been hashed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finalize and return the CRC value.
    #[inline]
    pub fn finalize(self) -> u32 {
        self.crc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_empty() {
        assert_eq!(crc32(0, &[]), 0x00000000);
        assert_eq!(crc32(0xDEAD_BEEF, &[]), 0xDEAD_BEEF);
    }

    #[test]
    fn test_crc32_check_value() {
        // Standard test: CRC32 of "123456789" should be 0xCBF43926
        let data = b"123456789";
        assert_eq!(crc32(0, data), 0xCBF43926);
        assert_eq!(crc32_bytewise(0, data), 0xCBF43926);
    }

    #[test]
    fn test_crc32_short_input() {
        assert_eq!(crc32(0, b"abc"), 0x352441C2);
    }

    #[test]
    fn test_crc32_long_known_value() {
        let data = b"The quick brown fox jumps over the lazy dog. The quick brown fox jumps.";
        assert!(data.len() >= BRAID_THRESHOLD);
        assert_eq!(crc32(0, data), crc32_bytewise(0, data));
        assert_eq!(
            crc32(0, b"The quick brown fox jumps over the lazy dog"),
            0x414FA339
        );
    }

    #[test]
    fn test_crc32_opt_none_is_identity() {
        assert_eq!(crc32_opt(0x1234_5678, None), 0);
        assert_eq!(crc32_opt(0, Some(b"123456789")), 0xCBF43926);
    }

    #[test]
    fn test_tables() {
        let t = crc_tables();
        assert_eq!(t.table[0], 0);
        assert_eq!(t.table[1], 0x7707_3096);
        assert_eq!(t.table[255], 0x2D02_EF8D);
        assert_eq!(t.big_table[1], 0x9630_0777_0000_0000);
        assert_eq!(t.x2n[0], 1 << 30);
        // x^2 and x^4.
        assert_eq!(t.x2n[1], 1 << 29);
        assert_eq!(t.x2n[2], 1 << 27);
    }

    #[test]
    fn test_make_crc_tables_is_pure() {
        let a = make_crc_tables();
        let b = crc_tables();
        assert_eq!(a.table, b.table);
        assert_eq!(a.braid_le, b.braid_le);
        assert_eq!(a.braid_be, b.braid_be);
        assert_eq!(a.x2n, b.x2n);
    }

    #[test]
    fn test_crc32_incremental() {
        let data = b"123456789";

        // Full calculation
        let full_crc = crc32(0, data);

        // Incremental calculation
        let mut crc = Crc32::new();
        crc.update(&data[..4]);
        crc.update(&data[4..]);
        assert_eq!(crc.len(), 9);
        let incremental_crc = crc.finalize();

        assert_eq!(full_crc, incremental_crc);
    }

    #[test]
    fn test_hasher_combine() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i * 31 % 251) as u8).collect();
        let (left, right) = data.split_at(377);

        let mut a = Crc32::new();
        a.update(left);
        let mut b = Crc32::new();
        b.update(right);
        a.combine(&b);

        assert_eq!(a.len(), 1000);
        assert_eq!(a.finalize(), crc32(0, &data));
    }

    #[test]
    fn test_crc32_chunked() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i ^ (i >> 3)) as u8).collect();
        let expected = crc32(0, &data);
        for chunk in [0, 1, 7, 64, 1000, 10_000, 20_000] {
            assert_eq!(crc32_chunked(&data, chunk), expected, "chunk {chunk}");
        }
        assert_eq!(crc32_chunked(&[], 16), 0);
    }
}
