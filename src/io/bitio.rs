//! MSB-first bit-level reader and writer used by the Huffman codec.
//!
//! The writer pads the final partial byte with zero bits; the reader cannot
//! tell padding from data, so callers track the exact symbol count or use
//! a terminator symbol.

use crate::error::{EmbroideryError, Result};

/// Largest bit count accepted by a single read or write
pub const MAX_BITS: usize = 32;

/// Writes bits MSB-first into a byte buffer.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// Completed bytes
    bytes: Vec<u8>,
    /// Partial byte, MSB-aligned
    bit_buffer: u8,
    /// Bits held in `bit_buffer` (0-7)
    bit_count: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the lowest `count` bits of `value`, most significant first.
    pub fn write_bits(&mut self, value: u32, count: usize) -> Result<()> {
        if count > MAX_BITS {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "bit write of {} bits exceeds {}",
                count, MAX_BITS
            )));
        }

        let mut remaining = count;
        while remaining > 0 {
            let free = 8 - self.bit_count as usize;
            let take = remaining.min(free);
            let shift = remaining - take;
            let bits = ((value >> shift) & ((1u32 << take) - 1)) as u8;

            self.bit_buffer |= bits << (free - take);
            self.bit_count += take as u8;
            if self.bit_count == 8 {
                self.bytes.push(self.bit_buffer);
                self.bit_buffer = 0;
                self.bit_count = 0;
            }
            remaining -= take;
        }
        Ok(())
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(bit as u32, 1)
    }

    /// Total bits written, including the partial byte
    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8 + self.bit_count as usize
    }

    /// Flush the partial byte (zero padded) and return the output
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.bytes.push(self.bit_buffer);
        }
        self.bytes
    }
}

/// Reads bits MSB-first from a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Current bit position (0 = MSB of the first byte)
    bit_position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            bit_position: 0,
        }
    }

    /// Read `count` bits, most significant first.
    ///
    /// Fails with `Truncated` when fewer than `count` bits remain.
    pub fn read_bits(&mut self, count: usize) -> Result<u32> {
        if count > MAX_BITS {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "bit read of {} bits exceeds {}",
                count, MAX_BITS
            )));
        }
        if count > self.bits_remaining() {
            return Err(EmbroideryError::truncated(format!(
                "bitstream ended at bit {} ({} more requested)",
                self.bit_position, count
            )));
        }

        let mut result = 0u32;
        let mut remaining = count;
        while remaining > 0 {
            let byte = self.data[self.bit_position / 8];
            let available = 8 - self.bit_position % 8;
            let take = remaining.min(available);
            let mask = ((1u16 << take) - 1) as u8;
            let bits = (byte >> (available - take)) & mask;

            result = (result << take) | bits as u32;
            self.bit_position += take;
            remaining -= take;
        }
        Ok(result)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_position
    }

    pub fn position(&self) -> usize {
        self.bit_position
    }

    pub fn is_empty(&self) -> bool {
        self.bits_remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_bits_padded() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3).unwrap();
        writer.write_bits(0b11, 2).unwrap();
        assert_eq!(writer.bit_len(), 5);
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0b1011_1000]);

        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(2).unwrap(), 0b11);
        assert_eq!(reader.bits_remaining(), 3);
    }

    #[test]
    fn test_cross_byte_values() {
        let mut writer = BitWriter::new();
        writer.write_bit(true).unwrap();
        writer.write_bits(0xABCD, 16).unwrap();
        writer.write_bits(0x12345, 20).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(16).unwrap(), 0xABCD);
        assert_eq!(reader.read_bits(20).unwrap(), 0x12345);
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let data = [0xFFu8];
        let mut reader = BitReader::new(&data);
        reader.read_bits(6).unwrap();
        assert!(matches!(reader.read_bits(3), Err(EmbroideryError::Truncated(_))));
    }

    #[test]
    fn test_zero_bits() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xFF, 0).unwrap();
        assert!(writer.finish().is_empty());
        let mut reader = BitReader::new(&[]);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
        assert!(reader.is_empty());
    }
}
