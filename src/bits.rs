//! Bit-level output for the DEFLATE bitstream.
//!
//! DEFLATE packs everything least-significant bit first. Codes pass through a
//! 16-bit accumulator; whenever a write would overflow it, the full 16 bits go
//! out as two bytes (low byte first) and the leftover high bits of the value
//! start the next accumulator. The byte order of the output never depends on
//! the host.

/// Width of the bit accumulator.
const BUF_SIZE: u8 = 16;

/// A bit writer that packs bits into bytes, LSB first.
#[derive(Debug)]
pub struct BitWriter {
    buffer: Vec<u8>,
    /// Bits not yet written to `buffer`, LSB first.
    bit_buf: u16,
    /// Number of valid bits in `bit_buf` (0..=16).
    bit_count: u8,
}

impl BitWriter {
    /// Create a new bit writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new bit writer with specified byte capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            bit_buf: 0,
            bit_count: 0,
        }
    }

    /// Write the low `num_bits` bits of `value`, LSB first.
    ///
    /// `num_bits` must be at most 16 and `value` must not carry bits above
    /// `num_bits`.
    #[inline]
    pub fn write_bits(&mut self, value: u32, num_bits: u8) {
        debug_assert!(num_bits <= BUF_SIZE, "at most 16 bits per write");
        debug_assert!(
            num_bits == BUF_SIZE || value >> num_bits == 0,
            "value {value:#x} wider than {num_bits} bits"
        );
        if num_bits == 0 {
            return;
        }

        if self.bit_count > BUF_SIZE - num_bits {
            // Fill the accumulator, emit it, keep the spill-over.
            self.bit_buf |= (value << self.bit_count) as u16;
            let full = self.bit_buf;
            self.put_short(full);
            self.bit_buf = (value >> (BUF_SIZE - self.bit_count)) as u16;
            self.bit_count = self.bit_count + num_bits - BUF_SIZE;
        } else {
            self.bit_buf |= (value << self.bit_count) as u16;
            self.bit_count += num_bits;
        }
    }

    /// Append a 16-bit value directly to the output, low byte first.
    #[inline]
    pub fn put_short(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Append raw bytes directly to the output. Must be byte-aligned.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        debug_assert_eq!(self.bit_count, 0, "raw bytes require byte alignment");
        self.buffer.extend_from_slice(bytes);
    }

    /// Move whole bytes from the accumulator to the output, keeping at most
    /// seven pending bits.
    pub fn flush_bits(&mut self) {
        if self.bit_count == BUF_SIZE {
            let full = self.bit_buf;
            self.put_short(full);
            self.bit_buf = 0;
            self.bit_count = 0;
        } else if self.bit_count >= 8 {
            self.buffer.push(self.bit_buf as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Emit every pending bit, zero-padding the final byte.
    pub fn flush_partial(&mut self) {
        if self.bit_count > 8 {
            let pending = self.bit_buf;
            self.put_short(pending);
        } else if self.bit_count > 0 {
            self.buffer.push(self.bit_buf as u8);
        }
        self.bit_buf = 0;
        self.bit_count = 0;
    }

    /// Flush and return the output.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.flush_partial();
        self.buffer
    }

    /// Bytes written so far (not counting bits still in the accumulator).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Take the bytes written so far, leaving pending bits in place.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Returns length in bytes (not counting bits in the accumulator).
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when nothing has been written, including pending bits.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.bit_count == 0
    }

    /// Number of bits waiting in the accumulator.
    pub fn pending_bits(&self) -> u8 {
        self.bit_count
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_writer_single_bits() {
        let mut writer = BitWriter::new();
        // Write 8 bits: 10110100 LSB first
        for bit in [0, 0, 1, 0, 1, 1, 0, 1] {
            writer.write_bits(bit, 1);
        }

        let result = writer.finish();
        assert_eq!(result, vec![0b10110100]);
    }

    #[test]
    fn test_bit_writer_multi_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0b11, 2);
        writer.write_bits(0b001, 3);

        let result = writer.finish();
        // LSB first: 101 + 11 + 001 = 00111101
        assert_eq!(result, vec![0b00111101]);
    }

    #[test]
    fn test_bit_writer_cross_byte() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xFF, 8);
        writer.write_bits(0x0F, 4);

        let result = writer.finish();
        assert_eq!(result, vec![0xFF, 0x0F]);
    }

    #[test]
    fn test_accumulator_spills_at_sixteen_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0x1FFF, 13);
        assert_eq!(writer.len(), 0);
        assert_eq!(writer.pending_bits(), 13);

        // 13 + 5 overflows: two bytes go out, 2 bits stay behind.
        writer.write_bits(0b10101, 5);
        assert_eq!(writer.len(), 2);
        assert_eq!(writer.pending_bits(), 2);
        assert_eq!(writer.as_bytes(), &[0xFF, 0xBF]);

        assert_eq!(writer.finish(), vec![0xFF, 0xBF, 0b10]);
    }

    #[test]
    fn test_spill_leaves_remainder_in_accumulator() {
        // Every width from 1 to 16 after every fill level, checked against a
        // plain bit list.
        for fill in 0..=16u8 {
            for width in 1..=16u8 {
                let mut writer = BitWriter::new();
                let mut bits = Vec::new();
                let low = if fill == 16 { 0xFFFF } else { (1u32 << fill) - 1 };
                writer.write_bits(low & 0x5555, fill);
                bits.extend((0..fill).map(|i| (0x5555u32 >> i) & 1));
                let value = ((1u32 << width) - 1) & 0xA5C3;
                writer.write_bits(value, width);
                bits.extend((0..width).map(|i| (value >> i) & 1));

                let total = fill as usize + width as usize;
                let expected_pending = if total > 16 { total - 16 } else { total };
                assert_eq!(writer.pending_bits() as usize, expected_pending);

                let out = writer.finish();
                for (i, bit) in bits.iter().enumerate() {
                    let got = ((out[i / 8] >> (i % 8)) & 1) as u32;
                    assert_eq!(got, *bit, "fill {fill} width {width} bit {i}");
                }
            }
        }
    }

    #[test]
    fn test_exact_sixteen_bits_stay_pending() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xABCD, 16);
        assert_eq!(writer.len(), 0);
        assert_eq!(writer.pending_bits(), 16);

        writer.write_bits(1, 1);
        assert_eq!(writer.as_bytes(), &[0xCD, 0xAB]);
        assert_eq!(writer.pending_bits(), 1);
    }

    #[test]
    fn test_flush_bits_keeps_partial_byte() {
        let mut writer = BitWriter::new();
        writer.write_bits(0x3FF, 10);
        writer.flush_bits();
        assert_eq!(writer.as_bytes(), &[0xFF]);
        assert_eq!(writer.pending_bits(), 2);

        writer.write_bits(0xFFFF, 16);
        // 18 bits were queued: 16 flushed by the spill, 2 pending.
        writer.flush_bits();
        assert_eq!(writer.pending_bits(), 2);
        assert_eq!(writer.len(), 3);
    }

    #[test]
    fn test_flush_bits_full_accumulator() {
        let mut writer = BitWriter::new();
        writer.write_bits(0x1234, 16);
        writer.flush_bits();
        assert_eq!(writer.as_bytes(), &[0x34, 0x12]);
        assert_eq!(writer.pending_bits(), 0);
    }

    #[test]
    fn test_flush_partial_pads_with_zeros() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1, 1);
        writer.flush_partial();
        assert_eq!(writer.as_bytes(), &[0x01]);

        writer.write_bits(0x1FF, 9);
        writer.flush_partial();
        assert_eq!(writer.as_bytes(), &[0x01, 0xFF, 0x01]);
        assert_eq!(writer.pending_bits(), 0);
    }

    #[test]
    fn test_put_short_little_endian() {
        let mut writer = BitWriter::new();
        writer.put_short(0xBEEF);
        writer.put_bytes(&[0x7F]);
        assert_eq!(writer.finish(), vec![0xEF, 0xBE, 0x7F]);
    }

    #[test]
    fn test_put_bytes_aligned() {
        let mut writer = BitWriter::new();
        writer.put_bytes(&[0xAB, 0xCD]);
        let result = writer.finish();
        assert_eq!(result, vec![0xAB, 0xCD]);
    }

    #[test]
    fn test_take_bytes_keeps_pending_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xFF, 8);
        writer.write_bits(0b11, 2);
        writer.flush_bits();
        assert_eq!(writer.take_bytes(), vec![0xFF]);
        assert_eq!(writer.pending_bits(), 2);
        assert_eq!(writer.finish(), vec![0b11]);
    }

    #[test]
    fn test_zero_width_write_is_noop() {
        let mut writer = BitWriter::new();
        writer.write_bits(0, 0);
        assert!(writer.is_empty());
    }

    #[test]
    fn test_bit_writer_len_and_is_empty() {
        let mut writer = BitWriter::new();
        assert!(writer.is_empty());
        assert_eq!(writer.len(), 0);

        writer.write_bits(0xFF, 8);
        assert!(!writer.is_empty());
        // Still in the accumulator.
        assert_eq!(writer.len(), 0);
        writer.flush_bits();
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn test_bit_writer_default() {
        let writer: BitWriter = Default::default();
        assert!(writer.is_empty());
    }
}
