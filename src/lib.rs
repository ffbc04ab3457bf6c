//! # zentropy
//!
//! The entropy-coding half of a DEFLATE compressor and a fast CRC-32 engine.
//!
//! The DEFLATE side takes a stream of literal and `(distance, length)` symbols
//! (as an LZ77 match finder would produce them), builds length-limited
//! canonical Huffman codes for every block and writes stored, fixed or dynamic
//! blocks, whichever is cheapest. Output is bit-exact with zlib's block
//! emitter for the same symbol stream.
//!
//! The checksum side computes CRC-32/ISO-HDLC with a braided word loop and
//! combines the CRCs of adjacent byte ranges without touching the data.
//!
//! ## Features
//!
//! - **Small dependency footprint**: `thiserror` and `tracing` only
//! - Optional chunked CRC across threads via the `parallel` feature
//! - Optional `zentropy` command-line tool via the `cli` feature
//!
//! ## Example
//!
//! ```rust
//! use zentropy::compress::{crc32, deflate, DeflateOptions};
//!
//! let data = b"abracadabra abracadabra";
//! let compressed = deflate(data, &DeflateOptions::default()).unwrap();
//! assert!(!compressed.is_empty());
//!
//! assert_eq!(crc32(0, b"123456789"), 0xCBF4_3926);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bits;
pub mod compress;
pub mod error;

pub use compress::{crc32, deflate, Crc32, DeflateOptions, Deflater, Strategy};
pub use error::{Error, Result};
