//! Length-limited canonical Huffman construction for DEFLATE.
//!
//! Trees are built over an index-addressed node array: leaves occupy
//! `0..elems` and internal nodes are appended after them. A binary min-heap
//! of node indices ([`NodeHeap`]) drives the merge; popped nodes are parked
//! in a region at the top of the heap storage that stays sorted by increasing
//! frequency, which is what the length-overflow repair walks.
//!
//! Given the same frequencies the resulting code lengths match zlib's
//! `trees.c` exactly, including the tie-break on subtree depth.

use tracing::trace;

use crate::compress::tables::{reverse_bits, MAX_BITS};

/// Huffman code: bit-reversed code value ready for LSB-first output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    /// The code bits, already reversed.
    pub code: u16,
    /// Number of bits in the code.
    pub length: u8,
}

/// One entry of a tree under construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Node {
    /// Symbol or subtree frequency.
    pub freq: u32,
    /// Bit-reversed code, valid once codes are generated.
    pub code: u16,
    /// Parent node index.
    pub dad: u16,
    /// Code length in bits.
    pub len: u8,
}

/// A dynamic tree: node storage plus the largest symbol with a non-zero
/// frequency.
#[derive(Debug, Clone)]
pub struct Tree {
    /// Leaves first, then internal nodes.
    pub nodes: Vec<Node>,
    /// Largest leaf index with a non-zero code length.
    pub max_code: usize,
}

impl Tree {
    /// Tree with room for `elems` leaves and their internal nodes.
    pub fn new(elems: usize) -> Self {
        Self {
            nodes: vec![Node::default(); 2 * elems + 1],
            max_code: 0,
        }
    }

    /// Zero the frequencies of the first `elems` leaves.
    pub fn reset_freqs(&mut self, elems: usize) {
        for node in &mut self.nodes[..elems] {
            node.freq = 0;
        }
    }

    /// Generated codes for the first `elems` symbols.
    pub fn codes(&self, elems: usize) -> Vec<HuffmanCode> {
        self.nodes[..elems]
            .iter()
            .map(|n| HuffmanCode {
                code: n.code,
                length: n.len,
            })
            .collect()
    }
}

/// Static description of an alphabet.
#[derive(Debug, Clone, Copy)]
pub struct TreeDesc<'a> {
    /// Fixed code for the same alphabet, used to estimate the static cost.
    pub static_codes: Option<&'a [HuffmanCode]>,
    /// Extra bits per code, starting at `extra_base`.
    pub extra_bits: &'a [u8],
    /// First symbol that carries extra bits.
    pub extra_base: usize,
    /// Number of symbols in the alphabet.
    pub elems: usize,
    /// Longest allowed code.
    pub max_length: u8,
}

/// Running bit costs of the current block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCost {
    /// Bit length of the block with the trees built so far.
    pub opt_len: u64,
    /// Bit length of the block with fixed trees.
    pub static_len: u64,
}

/// Binary min-heap of node indices, 1-based.
///
/// Ordering is by frequency, then by subtree depth: for equal frequencies the
/// shallower node is smaller, and equal depths compare as smaller (`<=`).
/// That last detail decides which of two equal nodes is merged first and is
/// required for output identical to zlib.
///
/// Slots `max..` hold retired nodes, sorted by increasing frequency from the
/// top of the storage downward; the root ends up at `max`.
#[derive(Debug)]
pub struct NodeHeap {
    heap: Vec<u16>,
    len: usize,
    max: usize,
    depth: Vec<u8>,
}

impl NodeHeap {
    /// Heap able to hold every node of a tree with `nodes` slots.
    pub fn new(nodes: usize) -> Self {
        Self {
            heap: vec![0; nodes],
            len: 0,
            max: nodes,
            depth: vec![0; nodes],
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no live entry remains.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a leaf without restoring the heap order.
    fn push_leaf(&mut self, n: usize) {
        self.len += 1;
        self.heap[self.len] = n as u16;
        self.depth[n] = 0;
    }

    #[inline]
    fn smaller(&self, nodes: &[Node], n: usize, m: usize) -> bool {
        nodes[n].freq < nodes[m].freq
            || (nodes[n].freq == nodes[m].freq && self.depth[n] <= self.depth[m])
    }

    /// Restore the heap property by moving entry `k` down, exchanging it with
    /// the smaller of its two children.
    fn sift_down(&mut self, nodes: &[Node], mut k: usize) {
        let v = self.heap[k] as usize;
        let mut j = k << 1;
        while j <= self.len {
            if j < self.len && self.smaller(nodes, self.heap[j + 1] as usize, self.heap[j] as usize)
            {
                j += 1;
            }
            if self.smaller(nodes, v, self.heap[j] as usize) {
                break;
            }
            self.heap[k] = self.heap[j];
            k = j;
            j <<= 1;
        }
        self.heap[k] = v as u16;
    }

    /// Remove and return the smallest entry.
    fn pop(&mut self, nodes: &[Node]) -> usize {
        let top = self.heap[1] as usize;
        self.heap[1] = self.heap[self.len];
        self.len -= 1;
        self.sift_down(nodes, 1);
        top
    }

    #[inline]
    fn peek(&self) -> usize {
        self.heap[1] as usize
    }

    /// Park a popped node in the sorted region.
    #[inline]
    fn retire(&mut self, n: usize) {
        self.max -= 1;
        self.heap[self.max] = n as u16;
    }
}

/// Build the tree for one alphabet: code lengths (limited to
/// `desc.max_length`), codes, and `tree.max_code`. `cost` accumulates the
/// block's bit length with these codes and with the fixed codes.
pub fn build_tree(tree: &mut Tree, desc: &TreeDesc<'_>, cost: &mut BlockCost) {
    let elems = desc.elems;
    let nodes = &mut tree.nodes;
    let mut heap = NodeHeap::new(nodes.len());
    let mut max_code: Option<usize> = None;

    for (n, node) in nodes[..elems].iter_mut().enumerate() {
        if node.freq != 0 {
            heap.push_leaf(n);
            max_code = Some(n);
        } else {
            node.len = 0;
        }
    }

    // DEFLATE needs at least one code of each kind, so force two codes of
    // non-zero frequency. The fake leaves cost nothing in the stream.
    while heap.len() < 2 {
        let node = match max_code {
            None => 0,
            Some(m) if m < 2 => m + 1,
            Some(_) => 0,
        };
        if max_code.map_or(true, |m| m < 2) {
            max_code = Some(node);
        }
        heap.push_leaf(node);
        nodes[node].freq = 1;
        cost.opt_len = cost.opt_len.wrapping_sub(1);
        if let Some(stree) = desc.static_codes {
            cost.static_len = cost.static_len.wrapping_sub(stree[node].length as u64);
        }
    }
    let max_code = max_code.unwrap_or(0);
    tree.max_code = max_code;

    // Leaves occupy heap[1..=len]; heapify from the last parent.
    for k in (1..=heap.len() / 2).rev() {
        heap.sift_down(nodes, k);
    }

    let mut node = elems;
    loop {
        let n = heap.pop(nodes);
        let m = heap.peek();

        heap.retire(n);
        heap.retire(m);

        nodes[node].freq = nodes[n].freq.saturating_add(nodes[m].freq);
        heap.depth[node] = heap.depth[n].max(heap.depth[m]).wrapping_add(1);
        nodes[n].dad = node as u16;
        nodes[m].dad = node as u16;

        heap.heap[1] = node as u16;
        node += 1;
        heap.sift_down(nodes, 1);

        if heap.len() < 2 {
            break;
        }
    }
    let root = heap.peek();
    heap.retire(root);

    let bl_count = gen_bitlen(nodes, max_code, desc, &heap, cost);
    gen_codes(nodes, max_code, &bl_count);
}

/// Assign code lengths by walking the sorted region from the root outward,
/// then repair any length above `desc.max_length`.
///
/// Returns the number of codes of each length.
fn gen_bitlen(
    nodes: &mut [Node],
    max_code: usize,
    desc: &TreeDesc<'_>,
    heap: &NodeHeap,
    cost: &mut BlockCost,
) -> [u16; MAX_BITS as usize + 1] {
    let max_length = desc.max_length;
    let heap_size = heap.heap.len();
    let mut bl_count = [0u16; MAX_BITS as usize + 1];
    let mut overflow: i32 = 0;

    nodes[heap.heap[heap.max] as usize].len = 0;

    for h in heap.max + 1..heap_size {
        let n = heap.heap[h] as usize;
        let mut bits = nodes[nodes[n].dad as usize].len + 1;
        if bits > max_length {
            bits = max_length;
            overflow += 1;
        }
        nodes[n].len = bits;

        if n > max_code {
            continue;
        }

        bl_count[bits as usize] += 1;
        let xbits = if n >= desc.extra_base {
            desc.extra_bits[n - desc.extra_base] as u64
        } else {
            0
        };
        let f = nodes[n].freq as u64;
        cost.opt_len = cost
            .opt_len
            .wrapping_add(f.wrapping_mul(bits as u64 + xbits));
        if let Some(stree) = desc.static_codes {
            cost.static_len = cost
                .static_len
                .wrapping_add(f.wrapping_mul(stree[n].length as u64 + xbits));
        }
    }

    if overflow == 0 {
        return bl_count;
    }

    trace!(overflow, max_length, "bit length overflow");

    // Find the first bit length which could increase.
    let max = max_length as usize;
    loop {
        let mut bits = max - 1;
        while bl_count[bits] == 0 {
            bits -= 1;
        }
        // Move one leaf down the tree and take an overflow item as its brother.
        bl_count[bits] -= 1;
        bl_count[bits + 1] += 2;
        // The brother of the overflow item also moves one step up, but this
        // does not affect bl_count[max_length].
        bl_count[max] -= 1;
        overflow -= 2;
        if overflow <= 0 {
            break;
        }
    }

    // Recompute every leaf length, least frequent first. The sorted region
    // makes this a plain walk from the top of the heap storage.
    let mut h = heap_size;
    for bits in (1..=max).rev() {
        let mut n = bl_count[bits];
        while n != 0 {
            h -= 1;
            let m = heap.heap[h] as usize;
            if m > max_code {
                continue;
            }
            if nodes[m].len as usize != bits {
                let delta = (bits as u64).wrapping_sub(nodes[m].len as u64);
                cost.opt_len = cost
                    .opt_len
                    .wrapping_add(delta.wrapping_mul(nodes[m].freq as u64));
                nodes[m].len = bits as u8;
            }
            n -= 1;
        }
    }

    bl_count
}

/// Assign canonical codes to symbols `0..=max_code` from their lengths.
///
/// Codes of the same length are consecutive in symbol order, and shorter
/// codes precede longer ones. Codes are stored bit-reversed.
fn gen_codes(nodes: &mut [Node], max_code: usize, bl_count: &[u16; MAX_BITS as usize + 1]) {
    let mut next_code = [0u32; MAX_BITS as usize + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_BITS as usize {
        code = (code + bl_count[bits - 1] as u32) << 1;
        next_code[bits] = code;
    }
    debug_assert_eq!(
        code + bl_count[MAX_BITS as usize] as u32,
        1 << MAX_BITS,
        "inconsistent bit counts"
    );

    for node in &mut nodes[..=max_code] {
        let len = node.len;
        if len == 0 {
            continue;
        }
        node.code = reverse_bits(next_code[len as usize] as u16, len);
        next_code[len as usize] += 1;
    }
}

/// Canonical codes for a complete set of code lengths (at most 15 bits).
///
/// Symbols with length 0 get no code. Codes are bit-reversed.
pub fn canonical_codes(lengths: &[u8]) -> Vec<HuffmanCode> {
    let mut bl_count = [0u16; MAX_BITS as usize + 1];
    for &len in lengths {
        if len > 0 {
            bl_count[len as usize] += 1;
        }
    }

    let mut next_code = [0u32; MAX_BITS as usize + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_BITS as usize {
        code = (code + bl_count[bits - 1] as u32) << 1;
        next_code[bits] = code;
    }

    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return HuffmanCode::default();
            }
            let c = next_code[len as usize];
            next_code[len as usize] += 1;
            HuffmanCode {
                code: reverse_bits(c as u16, len),
                length: len,
            }
        })
        .collect()
}

/// Build length-limited canonical codes for an arbitrary alphabet.
///
/// Runs the same construction as the block trees, so at least two symbols
/// always receive a code even when fewer have a non-zero frequency.
pub fn build_code(frequencies: &[u32], max_length: u8) -> Vec<HuffmanCode> {
    if frequencies.is_empty() {
        return Vec::new();
    }
    debug_assert!((1..=MAX_BITS).contains(&max_length));

    // Fake leaves may use symbols 0..=2; keep them clear of internal nodes.
    let elems = frequencies.len().max(3);
    let mut tree = Tree::new(elems);
    for (node, &f) in tree.nodes.iter_mut().zip(frequencies) {
        node.freq = f;
    }
    let desc = TreeDesc {
        static_codes: None,
        extra_bits: &[],
        extra_base: elems,
        elems,
        max_length,
    };
    let mut cost = BlockCost::default();
    build_tree(&mut tree, &desc, &mut cost);

    let mut codes = tree.codes(elems);
    codes.truncate(frequencies.len());
    codes
}

/// One step of the run-length encoding of a code-length sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthOp {
    /// A literal code length 0..=15.
    Length(u8),
    /// Code 16: repeat the previous length 3-6 times.
    RepeatPrevious(u8),
    /// Code 17: 3-10 zero lengths.
    RepeatZeroShort(u8),
    /// Code 18: 11-138 zero lengths.
    RepeatZeroLong(u8),
}

impl LengthOp {
    /// Bit-length alphabet symbol for this step.
    pub fn symbol(self) -> usize {
        match self {
            LengthOp::Length(len) => len as usize,
            LengthOp::RepeatPrevious(_) => 16,
            LengthOp::RepeatZeroShort(_) => 17,
            LengthOp::RepeatZeroLong(_) => 18,
        }
    }

    /// Extra bits following the symbol: `(value, width)`.
    pub fn extra(self) -> (u32, u8) {
        match self {
            LengthOp::Length(_) => (0, 0),
            LengthOp::RepeatPrevious(count) => (count as u32 - 3, 2),
            LengthOp::RepeatZeroShort(count) => (count as u32 - 3, 3),
            LengthOp::RepeatZeroLong(count) => (count as u32 - 11, 7),
        }
    }
}

/// Run-length encode the code lengths of symbols `0..=max_code`, calling
/// `emit` for every step in stream order.
///
/// The same walk serves both to count bit-length frequencies and to send the
/// encoded lengths, so the two can never disagree.
pub fn walk_lengths(nodes: &[Node], max_code: usize, mut emit: impl FnMut(LengthOp)) {
    // One past max_code reads as a length that matches nothing.
    const GUARD: u16 = 0xffff;
    let len_at = |n: usize| -> u16 {
        if n <= max_code {
            nodes[n].len as u16
        } else {
            GUARD
        }
    };

    let mut prevlen: Option<u8> = None;
    let mut nextlen = len_at(0);
    let mut count: u8 = 0;
    let (mut max_count, mut min_count) = if nextlen == 0 { (138, 3) } else { (7, 4) };

    for n in 0..=max_code {
        let curlen = nextlen as u8;
        nextlen = len_at(n + 1);
        count += 1;
        if count < max_count && curlen as u16 == nextlen {
            continue;
        } else if count < min_count {
            for _ in 0..count {
                emit(LengthOp::Length(curlen));
            }
        } else if curlen != 0 {
            if prevlen != Some(curlen) {
                emit(LengthOp::Length(curlen));
                count -= 1;
            }
            debug_assert!((3..=6).contains(&count), "3_6?");
            emit(LengthOp::RepeatPrevious(count));
        } else if count <= 10 {
            emit(LengthOp::RepeatZeroShort(count));
        } else {
            emit(LengthOp::RepeatZeroLong(count));
        }

        count = 0;
        prevlen = Some(curlen);
        (max_count, min_count) = if nextlen == 0 {
            (138, 3)
        } else if curlen as u16 == nextlen {
            (6, 3)
        } else {
            (7, 4)
        };
    }
}
