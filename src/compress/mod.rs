//! Compression primitives.
//!
//! - [`tables`]: DEFLATE alphabet constants and the fixed code trees.
//! - [`huffman`]: length-limited canonical Huffman construction.
//! - [`deflate`]: symbol tally, block strategy and block emission.
//! - [`crc32`]: CRC-32 computation and combination.

pub mod crc32;
pub mod deflate;
pub mod huffman;
pub mod tables;

pub use crc32::{crc32, crc32_combine, Crc32};
pub use deflate::{
    deflate, deflate_to_slice, deflate_with_stats, BlockKind, DataType, DeflateOptions,
    DeflateStats, Deflater, Strategy,
};
pub use huffman::{build_code, canonical_codes, HuffmanCode};
