//! DEFLATE block emission (RFC 1951).
//!
//! A [`Deflater`] collects literal and match symbols, and at every block
//! boundary builds the literal/length, distance and bit-length trees, compares
//! the exact cost of a stored, a fixed and a dynamic block, and writes the
//! cheapest one. Match finding is not part of this crate; symbols come either
//! from the caller ([`Deflater::tally`]) or from the two window-free symbol
//! sources behind [`Deflater::encode`]: every byte as a literal, or runs of
//! the previous byte as distance-1 matches.

use tracing::{debug, trace};

use crate::bits::BitWriter;
use crate::compress::huffman::{
    build_tree, walk_lengths, BlockCost, HuffmanCode, LengthOp, Tree, TreeDesc,
};
use crate::compress::tables::{
    d_code, static_tables, StaticTables, BL_CODES, BL_ORDER, DYN_TREES, D_CODES, END_BLOCK,
    EXTRA_BLBITS, EXTRA_DBITS, EXTRA_LBITS, LITERALS, L_CODES, MAX_BITS, MAX_BL_BITS, MAX_DIST,
    MAX_MATCH, MIN_MATCH, STATIC_TREES, STORED_BLOCK,
};
use crate::error::{Error, Result};

/// Largest payload of a single stored block.
const MAX_STORED: usize = 65535;

/// How blocks are encoded and where symbols come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Pick the cheapest block type. [`Deflater::encode`] emits literals only.
    #[default]
    Default,
    /// Every byte is a literal; no matches at all.
    HuffmanOnly,
    /// Runs of the previous byte become distance-1 matches.
    Rle,
    /// Never emit dynamic trees; stored blocks remain possible.
    Fixed,
    /// Stored blocks only.
    Stored,
}

/// Compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateOptions {
    /// Block encoding strategy.
    pub strategy: Strategy,
    /// Memory level 1-9; the symbol buffer holds `2^(mem_level + 6) - 1`
    /// symbols, which bounds the block size.
    pub mem_level: u8,
}

impl Default for DeflateOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Default,
            mem_level: 8,
        }
    }
}

impl DeflateOptions {
    /// Literals only, cheapest block type.
    pub fn huffman_only() -> Self {
        Self {
            strategy: Strategy::HuffmanOnly,
            ..Self::default()
        }
    }

    /// Run-length matches at distance 1.
    pub fn rle() -> Self {
        Self {
            strategy: Strategy::Rle,
            ..Self::default()
        }
    }

    /// Fixed Huffman codes (or stored when smaller).
    pub fn fixed() -> Self {
        Self {
            strategy: Strategy::Fixed,
            ..Self::default()
        }
    }

    /// Stored blocks only.
    pub fn stored() -> Self {
        Self {
            strategy: Strategy::Stored,
            ..Self::default()
        }
    }

    /// Same options with a different memory level.
    pub fn with_mem_level(mut self, mem_level: u8) -> Self {
        self.mem_level = mem_level;
        self
    }
}

/// Guess at the kind of input, made from the literals of the first block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataType {
    /// Contains control bytes other than TAB, LF and CR.
    Binary,
    /// Only printable bytes and common whitespace.
    Text,
    /// No block flushed yet.
    #[default]
    Unknown,
}

/// Block type chosen for a flushed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Raw bytes.
    Stored,
    /// Fixed Huffman codes.
    Static,
    /// Huffman codes sent in the block header.
    Dynamic,
}

/// Accounting for one compression context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeflateStats {
    /// Stored blocks written, counting each 65535-byte piece.
    pub stored_blocks: usize,
    /// Blocks written with fixed codes.
    pub static_blocks: usize,
    /// Blocks written with dynamic codes.
    pub dynamic_blocks: usize,
    /// Literal symbols tallied.
    pub literals: usize,
    /// Match symbols tallied.
    pub matches: usize,
    /// Input bytes consumed by [`Deflater::encode`].
    pub bytes_in: usize,
    /// Compressed bytes produced.
    pub bytes_out: usize,
}

impl DeflateStats {
    /// Total blocks written.
    pub fn blocks(&self) -> usize {
        self.stored_blocks + self.static_blocks + self.dynamic_blocks
    }
}

/// A tallied symbol: `dist == 0` marks a literal in `lc`; otherwise `lc` is
/// the match length minus [`MIN_MATCH`].
#[derive(Debug, Clone, Copy)]
struct Symbol {
    dist: u16,
    lc: u8,
}

/// DEFLATE block encoder.
///
/// Symbols accumulate until [`tally`](Self::tally) reports a full buffer or
/// the caller decides to end the block; [`flush_block`](Self::flush_block)
/// then encodes them.
#[derive(Debug)]
pub struct Deflater {
    options: DeflateOptions,
    writer: BitWriter,
    dyn_ltree: Tree,
    dyn_dtree: Tree,
    bl_tree: Tree,
    symbols: Vec<Symbol>,
    lit_bufsize: usize,
    cost: BlockCost,
    data_type: DataType,
    stats: DeflateStats,
}

impl Deflater {
    /// Create an encoder. Fails when `mem_level` is outside `1..=9`.
    pub fn new(options: DeflateOptions) -> Result<Self> {
        if !(1..=9).contains(&options.mem_level) {
            return Err(Error::InvalidMemLevel(options.mem_level));
        }
        let lit_bufsize = 1usize << (options.mem_level + 6);

        let mut deflater = Self {
            options,
            writer: BitWriter::with_capacity(lit_bufsize),
            dyn_ltree: Tree::new(L_CODES),
            dyn_dtree: Tree::new(D_CODES),
            bl_tree: Tree::new(BL_CODES),
            symbols: Vec::with_capacity(lit_bufsize),
            lit_bufsize,
            cost: BlockCost::default(),
            data_type: DataType::Unknown,
            stats: DeflateStats::default(),
        };
        deflater.init_block();
        Ok(deflater)
    }

    /// Options this encoder was created with.
    #[inline]
    pub fn options(&self) -> &DeflateOptions {
        &self.options
    }

    /// Input classification, set when the first block is flushed.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Accounting so far.
    #[inline]
    pub fn stats(&self) -> &DeflateStats {
        &self.stats
    }

    /// Symbols waiting for the next block.
    #[inline]
    pub fn pending_symbols(&self) -> usize {
        self.symbols.len()
    }

    /// Compressed bytes written so far, not counting bits still buffered.
    #[inline]
    pub fn output(&self) -> &[u8] {
        self.writer.as_bytes()
    }

    /// Take the compressed bytes written so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        let out = self.writer.take_bytes();
        self.stats.bytes_out += out.len();
        out
    }

    /// Record a symbol: a literal when `dist == 0` (`lc` is the byte), or a
    /// match of length `lc + MIN_MATCH` at distance `dist`.
    ///
    /// Returns true when the symbol buffer is full and the block must be
    /// flushed before the next tally.
    #[inline]
    pub fn tally(&mut self, dist: u32, lc: u8) -> bool {
        self.symbols.push(Symbol {
            dist: dist as u16,
            lc,
        });
        if dist == 0 {
            self.dyn_ltree.nodes[lc as usize].freq += 1;
            self.stats.literals += 1;
        } else {
            self.stats.matches += 1;
            let dist = dist as usize - 1;
            debug_assert!(dist < MAX_DIST, "tally: bad match distance");
            let t = static_tables();
            self.dyn_ltree.nodes[t.length_code[lc as usize] as usize + LITERALS + 1].freq += 1;
            self.dyn_dtree.nodes[d_code(t, dist)].freq += 1;
        }
        self.symbols.len() == self.lit_bufsize - 1
    }

    /// Record a literal byte. See [`tally`](Self::tally).
    #[inline]
    pub fn tally_literal(&mut self, byte: u8) -> bool {
        self.tally(0, byte)
    }

    /// Record a match of `length` (3..=258) at `distance` (1..=32768).
    /// See [`tally`](Self::tally).
    #[inline]
    pub fn tally_match(&mut self, distance: u16, length: u16) -> bool {
        debug_assert!((1..=MAX_DIST).contains(&(distance as usize)));
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&(length as usize)));
        self.tally(distance as u32, (length as usize - MIN_MATCH) as u8)
    }

    /// End the current block and write it.
    ///
    /// `buf` is the raw input the pending symbols were produced from; when
    /// it is `None` a stored block is never chosen. With `last` set the block
    /// is marked final and the output is padded to a byte boundary.
    pub fn flush_block(&mut self, buf: Option<&[u8]>, last: bool) -> BlockKind {
        let stored_len = buf.map_or(0, |b| b.len()) as u64;
        let mut max_blindex = 0;

        let (mut opt_lenb, static_lenb) = if self.options.strategy != Strategy::Stored {
            if self.data_type == DataType::Unknown {
                self.data_type = self.detect_data_type();
                trace!(data_type = ?self.data_type, "detected input type");
            }

            let t = static_tables();
            build_tree(&mut self.dyn_ltree, &literal_desc(t), &mut self.cost);
            build_tree(&mut self.dyn_dtree, &distance_desc(t), &mut self.cost);
            max_blindex = self.build_bl_tree();

            let opt_lenb = (self.cost.opt_len.wrapping_add(3 + 7)) >> 3;
            let static_lenb = (self.cost.static_len.wrapping_add(3 + 7)) >> 3;
            trace!(
                opt = opt_lenb,
                fixed = static_lenb,
                stored = stored_len,
                symbols = self.symbols.len(),
                "block cost"
            );
            (opt_lenb, static_lenb)
        } else {
            (stored_len + 5, stored_len + 5)
        };

        if static_lenb <= opt_lenb || self.options.strategy == Strategy::Fixed {
            opt_lenb = static_lenb;
        }

        let kind = match buf {
            Some(bytes) if stored_len + stored_split_overhead(stored_len) + 4 <= opt_lenb => {
                self.stored_block(bytes, last);
                BlockKind::Stored
            }
            _ if static_lenb == opt_lenb => {
                self.writer.write_bits((STATIC_TREES << 1) + last as u32, 3);
                let t = static_tables();
                compress_block(&mut self.writer, &self.symbols, &t.ltree, &t.dtree, t);
                self.stats.static_blocks += 1;
                BlockKind::Static
            }
            _ => {
                self.writer.write_bits((DYN_TREES << 1) + last as u32, 3);
                self.send_all_trees(
                    self.dyn_ltree.max_code + 1,
                    self.dyn_dtree.max_code + 1,
                    max_blindex + 1,
                );
                let ltree = self.dyn_ltree.codes(L_CODES);
                let dtree = self.dyn_dtree.codes(D_CODES);
                compress_block(&mut self.writer, &self.symbols, &ltree, &dtree, static_tables());
                self.stats.dynamic_blocks += 1;
                BlockKind::Dynamic
            }
        };
        debug!(?kind, stored_len, last, "flushed block");

        self.init_block();
        if last {
            self.writer.flush_partial();
        }
        kind
    }

    /// Write `bytes` as stored blocks, splitting payloads above 65535 bytes.
    /// Only the final piece carries the `last` flag.
    pub fn stored_block(&mut self, bytes: &[u8], last: bool) {
        let pieces = bytes.len().div_ceil(MAX_STORED).max(1);
        for i in 0..pieces {
            let start = (i * MAX_STORED).min(bytes.len());
            let end = (start + MAX_STORED).min(bytes.len());
            let piece = &bytes[start..end];
            let final_piece = last && i + 1 == pieces;

            self.writer
                .write_bits((STORED_BLOCK << 1) + final_piece as u32, 3);
            self.writer.flush_partial();
            let len = piece.len() as u16;
            self.writer.put_short(len);
            self.writer.put_short(!len);
            self.writer.put_bytes(piece);
            self.stats.stored_blocks += 1;
        }
    }

    /// Write an empty fixed-code block, giving the decoder enough lookahead
    /// to finish the previous block. Used at flush points.
    pub fn align(&mut self) {
        self.writer.write_bits(STATIC_TREES << 1, 3);
        let eob = static_tables().ltree[END_BLOCK];
        self.writer.write_bits(eob.code as u32, eob.length);
        self.writer.flush_bits();
    }

    /// Move complete bytes out of the bit accumulator.
    pub fn flush_bits(&mut self) {
        self.writer.flush_bits();
    }

    /// Encode `data` with the configured symbol source, flushing a block
    /// whenever the symbol buffer fills and once more at the end.
    ///
    /// With [`Strategy::Stored`] the data is split into stored blocks
    /// directly. A run match never reaches back before the start of `data`.
    pub fn encode(&mut self, data: &[u8], last: bool) {
        self.stats.bytes_in += data.len();

        if self.options.strategy == Strategy::Stored {
            if data.is_empty() {
                if last {
                    self.flush_block(Some(&[]), true);
                }
                return;
            }
            let mut chunks = data.chunks(MAX_STORED).peekable();
            while let Some(chunk) = chunks.next() {
                let is_last = last && chunks.peek().is_none();
                self.flush_block(Some(chunk), is_last);
            }
            return;
        }

        let mut block_start = 0;
        let mut pos = 0;
        while pos < data.len() {
            let run = if self.options.strategy == Strategy::Rle {
                run_length(data, pos)
            } else {
                0
            };

            let full = if run >= MIN_MATCH {
                let full = self.tally(1, (run - MIN_MATCH) as u8);
                pos += run;
                full
            } else {
                let full = self.tally_literal(data[pos]);
                pos += 1;
                full
            };

            if full {
                self.flush_block(Some(&data[block_start..pos]), false);
                block_start = pos;
            }
        }

        if last || block_start < data.len() {
            self.flush_block(Some(&data[block_start..]), last);
        }
    }

    /// Pad the output to a byte boundary and return everything written.
    pub fn finish(self) -> Vec<u8> {
        self.finish_with_stats().0
    }

    /// Like [`finish`](Self::finish), also returning the accounting.
    pub fn finish_with_stats(self) -> (Vec<u8>, DeflateStats) {
        let mut stats = self.stats;
        let out = self.writer.finish();
        stats.bytes_out += out.len();
        (out, stats)
    }

    fn init_block(&mut self) {
        self.dyn_ltree.reset_freqs(L_CODES);
        self.dyn_dtree.reset_freqs(D_CODES);
        self.bl_tree.reset_freqs(BL_CODES);

        self.dyn_ltree.nodes[END_BLOCK].freq = 1;
        self.cost = BlockCost::default();
        self.symbols.clear();
    }

    /// Count how the code lengths of both trees will be run-length encoded,
    /// build the bit-length tree, and add the header cost.
    ///
    /// Returns the index in [`BL_ORDER`] of the last bit-length code to send.
    fn build_bl_tree(&mut self) -> usize {
        let Self {
            dyn_ltree,
            dyn_dtree,
            bl_tree,
            cost,
            ..
        } = self;

        let mut count = |op: LengthOp| bl_tree.nodes[op.symbol()].freq += 1;
        walk_lengths(&dyn_ltree.nodes, dyn_ltree.max_code, &mut count);
        walk_lengths(&dyn_dtree.nodes, dyn_dtree.max_code, &mut count);

        build_tree(bl_tree, &bit_length_desc(), cost);

        // At least 4 bit-length codes are always sent.
        let max_blindex = (3..BL_CODES)
            .rev()
            .find(|&i| bl_tree.nodes[BL_ORDER[i] as usize].len != 0)
            .unwrap_or(2);

        // 3 bits per bit-length code, plus HLIT, HDIST and HCLEN.
        cost.opt_len = cost
            .opt_len
            .wrapping_add(3 * (max_blindex as u64 + 1) + 5 + 5 + 4);
        trace!(max_blindex, opt_len = cost.opt_len, "bit length tree");
        max_blindex
    }

    /// Write the dynamic block header: counts, bit-length code lengths, then
    /// both trees' run-length-encoded code lengths.
    fn send_all_trees(&mut self, lcodes: usize, dcodes: usize, blcodes: usize) {
        debug_assert!(lcodes >= 257 && dcodes >= 1 && blcodes >= 4, "not enough codes");
        debug_assert!(lcodes <= L_CODES && dcodes <= D_CODES && blcodes <= BL_CODES);

        self.writer.write_bits((lcodes - 257) as u32, 5);
        self.writer.write_bits((dcodes - 1) as u32, 5);
        self.writer.write_bits((blcodes - 4) as u32, 4);
        for &sym in &BL_ORDER[..blcodes] {
            self.writer
                .write_bits(self.bl_tree.nodes[sym as usize].len as u32, 3);
        }

        let bl_codes = self.bl_tree.codes(BL_CODES);
        let writer = &mut self.writer;
        let mut send = |op: LengthOp| {
            send_code(writer, bl_codes[op.symbol()]);
            let (value, bits) = op.extra();
            if bits != 0 {
                writer.write_bits(value, bits);
            }
        };
        walk_lengths(&self.dyn_ltree.nodes, lcodes - 1, &mut send);
        walk_lengths(&self.dyn_dtree.nodes, dcodes - 1, &mut send);
    }

    /// Classify the block's literals. Binary if any byte from the block list
    /// (controls other than TAB, LF, CR) occurs; text if TAB, LF, CR or a
    /// byte >= 32 occurs; binary otherwise, which includes empty input.
    fn detect_data_type(&self) -> DataType {
        let freq = |n: usize| self.dyn_ltree.nodes[n].freq;

        let mut block_mask: u32 = 0xf3ff_c07f;
        for n in 0..32 {
            if block_mask & 1 != 0 && freq(n) != 0 {
                return DataType::Binary;
            }
            block_mask >>= 1;
        }

        if freq(9) != 0 || freq(10) != 0 || freq(13) != 0 {
            return DataType::Text;
        }
        if (32..LITERALS).any(|n| freq(n) != 0) {
            return DataType::Text;
        }
        DataType::Binary
    }
}

fn literal_desc(t: &StaticTables) -> TreeDesc<'_> {
    TreeDesc {
        static_codes: Some(&t.ltree),
        extra_bits: &EXTRA_LBITS,
        extra_base: LITERALS + 1,
        elems: L_CODES,
        max_length: MAX_BITS,
    }
}

fn distance_desc(t: &StaticTables) -> TreeDesc<'_> {
    TreeDesc {
        static_codes: Some(&t.dtree),
        extra_bits: &EXTRA_DBITS,
        extra_base: 0,
        elems: D_CODES,
        max_length: MAX_BITS,
    }
}

fn bit_length_desc() -> TreeDesc<'static> {
    TreeDesc {
        static_codes: None,
        extra_bits: &EXTRA_BLBITS,
        extra_base: 0,
        elems: BL_CODES,
        max_length: MAX_BL_BITS,
    }
}

#[inline]
fn send_code(writer: &mut BitWriter, code: HuffmanCode) {
    debug_assert!(code.length != 0, "sending a symbol without a code");
    writer.write_bits(code.code as u32, code.length);
}

/// Write the block's symbols with the given trees, then end-of-block.
fn compress_block(
    writer: &mut BitWriter,
    symbols: &[Symbol],
    ltree: &[HuffmanCode],
    dtree: &[HuffmanCode],
    t: &StaticTables,
) {
    for sym in symbols {
        let lc = sym.lc as usize;
        if sym.dist == 0 {
            send_code(writer, ltree[lc]);
            continue;
        }

        let code = t.length_code[lc] as usize;
        send_code(writer, ltree[code + LITERALS + 1]);
        let extra = EXTRA_LBITS[code];
        if extra != 0 {
            writer.write_bits((lc - t.base_length[code] as usize) as u32, extra);
        }

        let dist = sym.dist as usize - 1;
        let code = d_code(t, dist);
        debug_assert!(code < D_CODES, "bad d_code");
        send_code(writer, dtree[code]);
        let extra = EXTRA_DBITS[code];
        if extra != 0 {
            writer.write_bits((dist - t.base_dist[code] as usize) as u32, extra);
        }
    }

    send_code(writer, ltree[END_BLOCK]);
}

/// Header bytes added by splitting a stored payload of `len` bytes into
/// pieces of at most 65535, beyond the first piece's header.
fn stored_split_overhead(len: u64) -> u64 {
    let pieces = len.div_ceil(MAX_STORED as u64).max(1);
    5 * (pieces - 1)
}

/// Length of the run of `data[pos - 1]` starting at `pos`, capped at
/// [`MAX_MATCH`]. Zero when fewer than [`MIN_MATCH`] bytes remain.
fn run_length(data: &[u8], pos: usize) -> usize {
    if pos == 0 || data.len() - pos < MIN_MATCH {
        return 0;
    }
    let prev = data[pos - 1];
    data[pos..]
        .iter()
        .take(MAX_MATCH)
        .take_while(|&&b| b == prev)
        .count()
}

/// Compress `data` into a raw DEFLATE stream.
pub fn deflate(data: &[u8], options: &DeflateOptions) -> Result<Vec<u8>> {
    deflate_with_stats(data, options).map(|(out, _)| out)
}

/// Compress `data` and report block and symbol accounting.
pub fn deflate_with_stats(data: &[u8], options: &DeflateOptions) -> Result<(Vec<u8>, DeflateStats)> {
    let mut deflater = Deflater::new(*options)?;
    deflater.encode(data, true);
    let (out, stats) = deflater.finish_with_stats();
    debug!(
        bytes_in = stats.bytes_in,
        bytes_out = stats.bytes_out,
        blocks = stats.blocks(),
        "deflate finished"
    );
    Ok((out, stats))
}

/// Compress `data` into `out`, returning the number of bytes written.
pub fn deflate_to_slice(data: &[u8], options: &DeflateOptions, out: &mut [u8]) -> Result<usize> {
    let compressed = deflate(data, options)?;
    if compressed.len() > out.len() {
        return Err(Error::buffer_too_small(compressed.len(), out.len()));
    }
    out[..compressed.len()].copy_from_slice(&compressed);
    Ok(compressed.len())
}
