//! Canonical, length-limited Huffman codec for 16-bit symbols.
//!
//! Code lengths come from the greedy frequency merge with ties broken by
//! (frequency, lowest symbol); codes are then assigned canonically by
//! (length, symbol). The same frequency multiset therefore always produces
//! the same table bytes, whichever order the symbols were counted in.
//!
//! Tables can also be supplied directly as per-symbol code lengths, for
//! formats that define a fixed table.

use super::bitio::{BitReader, BitWriter};
use crate::error::{EmbroideryError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{Cursor, Read, Write};

/// Longest code length any table may use
pub const MAX_CODE_LENGTH: u8 = 16;

/// Block framing mode: table supplied by the format
pub const MODE_FIXED_TABLE: u8 = 0;
/// Block framing mode: table embedded in the block
pub const MODE_EMBEDDED_TABLE: u8 = 1;

/// When a decode stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Stop after decoding this symbol (not included in the output)
    Symbol(u16),
    /// Stop after this many symbols
    Count(usize),
}

/// A canonical prefix code over symbols `0..alphabet_size`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTable {
    /// Code length per symbol, 0 when the symbol has no code
    lengths: Vec<u8>,
    /// Canonical code per symbol (valid where the length is non-zero)
    codes: Vec<u32>,
    /// Symbols ordered by (length, symbol)
    sorted_symbols: Vec<u16>,
    /// Number of codes of each length
    length_counts: [u16; MAX_CODE_LENGTH as usize + 1],
}

impl CodeTable {
    /// Build a table from per-symbol frequencies (index = symbol).
    ///
    /// Symbols with zero frequency get no code. A single used symbol gets a
    /// one-bit code.
    pub fn build(frequencies: &[u64], max_code_length: u8) -> Result<Self> {
        if max_code_length == 0 || max_code_length > MAX_CODE_LENGTH {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "maximum code length {} outside 1..={}",
                max_code_length, MAX_CODE_LENGTH
            )));
        }
        if frequencies.len() > u16::MAX as usize + 1 {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "alphabet of {} symbols exceeds 16-bit symbols",
                frequencies.len()
            )));
        }

        let used: Vec<(u16, u64)> = frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(s, &f)| (s as u16, f))
            .collect();

        if used.len() > 1usize << max_code_length {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "{} symbols cannot be coded in {} bits",
                used.len(),
                max_code_length
            )));
        }

        let mut lengths = vec![0u8; frequencies.len()];
        match used.len() {
            0 => {}
            1 => lengths[used[0].0 as usize] = 1,
            _ => {
                let depths = merge_depths(&used);
                let limited = limit_lengths(&used, &depths, max_code_length);
                for (&(symbol, _), &len) in used.iter().zip(limited.iter()) {
                    lengths[symbol as usize] = len;
                }
            }
        }
        Self::from_lengths(&lengths)
    }

    /// Build a table from supplied code lengths (index = symbol, 0 = unused)
    pub fn from_lengths(lengths: &[u8]) -> Result<Self> {
        if lengths.len() > u16::MAX as usize + 1 {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "alphabet of {} symbols exceeds 16-bit symbols",
                lengths.len()
            )));
        }
        let mut length_counts = [0u16; MAX_CODE_LENGTH as usize + 1];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > MAX_CODE_LENGTH {
                return Err(EmbroideryError::corrupt(format!(
                    "code length {} for symbol {} exceeds {}",
                    len, symbol, MAX_CODE_LENGTH
                )));
            }
            if len > 0 {
                length_counts[len as usize] += 1;
            }
        }

        // Kraft inequality: the code must not be over-subscribed.
        let mut available: i64 = 1;
        for &count in &length_counts[1..] {
            available = (available << 1) - count as i64;
            if available < 0 {
                return Err(EmbroideryError::corrupt("over-subscribed code lengths"));
            }
        }

        let mut sorted_symbols: Vec<u16> = (0..lengths.len())
            .filter(|&s| lengths[s] > 0)
            .map(|s| s as u16)
            .collect();
        sorted_symbols.sort_by_key(|&s| (lengths[s as usize], s));

        let mut codes = vec![0u32; lengths.len()];
        let mut code = 0u32;
        let mut previous_len = 0u8;
        for &symbol in &sorted_symbols {
            let len = lengths[symbol as usize];
            code <<= len - previous_len;
            codes[symbol as usize] = code;
            code += 1;
            previous_len = len;
        }

        Ok(CodeTable {
            lengths: lengths.to_vec(),
            codes,
            sorted_symbols,
            length_counts,
        })
    }

    /// Number of symbols the table covers (coded or not)
    pub fn alphabet_size(&self) -> usize {
        self.lengths.len()
    }

    /// Code length of a symbol, `None` if the symbol has no code
    pub fn code_length(&self, symbol: u16) -> Option<u8> {
        match self.lengths.get(symbol as usize) {
            Some(&len) if len > 0 => Some(len),
            _ => None,
        }
    }

    /// Code of a symbol as (bits, length)
    pub fn code(&self, symbol: u16) -> Option<(u32, u8)> {
        self.code_length(symbol)
            .map(|len| (self.codes[symbol as usize], len))
    }

    /// Per-symbol code lengths
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Longest code in the table
    pub fn max_length(&self) -> u8 {
        self.lengths.iter().copied().max().unwrap_or(0)
    }

    /// Serialize as `[u32 alphabet size][u32 used][(u16 symbol, u8 length)...]`
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<LittleEndian>(self.lengths.len() as u32)?;
        w.write_u32::<LittleEndian>(self.sorted_symbols.len() as u32)?;
        let mut used: Vec<u16> = self.sorted_symbols.clone();
        used.sort_unstable();
        for symbol in used {
            w.write_u16::<LittleEndian>(symbol)?;
            w.write_u8(self.lengths[symbol as usize])?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(8 + 3 * self.sorted_symbols.len());
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Parse a table written by [`CodeTable::write_to`]
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let alphabet = r.read_u32::<LittleEndian>()? as usize;
        let used = r.read_u32::<LittleEndian>()? as usize;
        if alphabet > u16::MAX as usize + 1 || used > alphabet {
            return Err(EmbroideryError::corrupt(format!(
                "code table declares {} of {} symbols",
                used, alphabet
            )));
        }
        let mut lengths = vec![0u8; alphabet];
        for _ in 0..used {
            let symbol = r.read_u16::<LittleEndian>()? as usize;
            let len = r.read_u8()?;
            if symbol >= alphabet {
                return Err(EmbroideryError::corrupt(format!(
                    "code table symbol {} outside alphabet of {}",
                    symbol, alphabet
                )));
            }
            lengths[symbol] = len;
        }
        Self::from_lengths(&lengths)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_from(&mut Cursor::new(bytes))
    }

    /// Read one symbol, one bit at a time
    pub fn read_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let mut code: i64 = 0;
        let mut first: i64 = 0;
        let mut index: usize = 0;
        for len in 1..=MAX_CODE_LENGTH as usize {
            code |= reader.read_bits(1)? as i64;
            let count = self.length_counts[len] as i64;
            if code - first < count {
                return Ok(self.sorted_symbols[index + (code - first) as usize]);
            }
            index += count as usize;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(EmbroideryError::corrupt(format!(
            "no code matches bits before bit {}",
            reader.position()
        )))
    }
}

/// Frequencies of each symbol in `symbols`, sized to the largest symbol
pub fn frequencies_of(symbols: &[u16]) -> Vec<u64> {
    let size = symbols.iter().copied().max().map_or(0, |m| m as usize + 1);
    let mut freqs = vec![0u64; size];
    for &s in symbols {
        freqs[s as usize] += 1;
    }
    freqs
}

/// Write the codes of `symbols` to `writer`.
///
/// A symbol without a code fails with `UnsupportedFeature`.
pub fn encode(symbols: &[u16], table: &CodeTable, writer: &mut BitWriter) -> Result<()> {
    for &symbol in symbols {
        let (code, len) = table.code(symbol).ok_or_else(|| {
            EmbroideryError::UnsupportedFeature(format!("symbol {} has no code in the table", symbol))
        })?;
        writer.write_bits(code, len as usize)?;
    }
    Ok(())
}

/// Read symbols until `termination` is met.
///
/// Running out of bits first fails with `Truncated`.
pub fn decode(reader: &mut BitReader<'_>, table: &CodeTable, termination: Termination) -> Result<Vec<u16>> {
    let mut out = Vec::new();
    match termination {
        Termination::Count(n) => {
            if n > reader.bits_remaining() {
                return Err(EmbroideryError::truncated(format!(
                    "{} symbols declared but only {} bits remain",
                    n,
                    reader.bits_remaining()
                )));
            }
            out.reserve(n);
            for _ in 0..n {
                out.push(table.read_symbol(reader)?);
            }
        }
        Termination::Symbol(stop) => loop {
            let symbol = table.read_symbol(reader)?;
            if symbol == stop {
                break;
            }
            out.push(symbol);
        },
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Block framing
// ---------------------------------------------------------------------------

/// Compress `symbols` into a self-describing block:
/// `[u32 count][u8 mode][table?][u32 byte length][bits]`.
///
/// With `fixed` the block refers to that table (mode 0); otherwise a table
/// is built from the data and embedded (mode 1).
pub fn compress_block(symbols: &[u16], fixed: Option<&CodeTable>) -> Result<Vec<u8>> {
    let built;
    let (mode, table) = match fixed {
        Some(t) => (MODE_FIXED_TABLE, t),
        None => {
            built = CodeTable::build(&frequencies_of(symbols), MAX_CODE_LENGTH)?;
            (MODE_EMBEDDED_TABLE, &built)
        }
    };

    let mut writer = BitWriter::new();
    encode(symbols, table, &mut writer)?;
    let bits = writer.finish();

    let mut out = Vec::with_capacity(bits.len() + 16);
    out.write_u32::<LittleEndian>(symbols.len() as u32)?;
    out.write_u8(mode)?;
    if mode == MODE_EMBEDDED_TABLE {
        table.write_to(&mut out)?;
    }
    out.write_u32::<LittleEndian>(bits.len() as u32)?;
    out.extend_from_slice(&bits);
    tracing::trace!(symbols = symbols.len(), bytes = out.len(), mode, "compressed block");
    Ok(out)
}

/// Decompress a block written by [`compress_block`].
///
/// Returns the symbols and the number of bytes the block occupied.
pub fn decompress_block(bytes: &[u8], fixed: Option<&CodeTable>) -> Result<(Vec<u16>, usize)> {
    let mut cursor = Cursor::new(bytes);
    let count = cursor.read_u32::<LittleEndian>()? as usize;
    let mode = cursor.read_u8()?;
    let embedded;
    let table = match mode {
        MODE_FIXED_TABLE => fixed.ok_or_else(|| {
            EmbroideryError::UnsupportedFeature("block refers to a fixed table but none was supplied".into())
        })?,
        MODE_EMBEDDED_TABLE => {
            embedded = CodeTable::read_from(&mut cursor)?;
            &embedded
        }
        other => {
            return Err(EmbroideryError::corrupt(format!("unknown block mode {}", other)));
        }
    };
    let byte_len = cursor.read_u32::<LittleEndian>()? as usize;
    let start = cursor.position() as usize;
    let end = start
        .checked_add(byte_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| {
            EmbroideryError::truncated(format!(
                "block declares {} bit bytes but {} remain",
                byte_len,
                bytes.len() - start
            ))
        })?;

    let mut reader = BitReader::new(&bytes[start..end]);
    let symbols = decode(&mut reader, table, Termination::Count(count))?;
    Ok((symbols, end))
}

// ---------------------------------------------------------------------------
// Length construction
// ---------------------------------------------------------------------------

/// Leaf depths of the greedy merge tree, in the order of `used`
fn merge_depths(used: &[(u16, u64)]) -> Vec<u8> {
    // Node ids: leaves 0..n, internal nodes appended after.
    let n = used.len();
    let mut parent: Vec<usize> = vec![usize::MAX; 2 * n - 1];
    let mut heap: BinaryHeap<Reverse<(u64, u16, usize)>> = used
        .iter()
        .enumerate()
        .map(|(id, &(symbol, freq))| Reverse((freq, symbol, id)))
        .collect();

    let mut next_id = n;
    while heap.len() > 1 {
        let (Some(Reverse((fa, sa, a))), Some(Reverse((fb, sb, b)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        parent[a] = next_id;
        parent[b] = next_id;
        heap.push(Reverse((fa + fb, sa.min(sb), next_id)));
        next_id += 1;
    }

    // Parents always have larger ids, so depths resolve from the root down.
    let mut depth = vec![0u32; next_id];
    for id in (0..next_id.saturating_sub(1)).rev() {
        depth[id] = depth[parent[id]] + 1;
    }
    depth[..n].iter().map(|&d| d.min(u8::MAX as u32) as u8).collect()
}

/// Redistribute lengths so none exceeds `max_len`.
///
/// Lengths already within the limit are returned unchanged. Otherwise the
/// length histogram is repaired and lengths are handed out again, shortest
/// first, to symbols ordered by (frequency descending, symbol).
fn limit_lengths(used: &[(u16, u64)], depths: &[u8], max_len: u8) -> Vec<u8> {
    let longest = depths.iter().copied().max().unwrap_or(0);
    if longest <= max_len {
        return depths.to_vec();
    }

    let mut counts = vec![0u32; longest as usize + 1];
    for &d in depths {
        counts[d as usize] += 1;
    }
    // Move pairs of over-long leaves up, splitting a shorter leaf each time.
    for len in (max_len as usize + 1..=longest as usize).rev() {
        while counts[len] > 0 {
            let mut j = len - 2;
            while j > 0 && counts[j] == 0 {
                j -= 1;
            }
            if j == 0 {
                break;
            }
            counts[len] -= 2;
            counts[len - 1] += 1;
            counts[j + 1] += 2;
            counts[j] -= 1;
        }
    }

    let mut order: Vec<usize> = (0..used.len()).collect();
    order.sort_by_key(|&i| (Reverse(used[i].1), used[i].0));

    let mut out = vec![0u8; used.len()];
    let mut lens = (1..=max_len).flat_map(|len| std::iter::repeat(len).take(counts[len as usize] as usize));
    for i in order {
        out[i] = lens.next().unwrap_or(max_len);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_lengths() {
        // Classic example: a=45 b=13 c=12 d=16 e=9 f=5
        let table = CodeTable::build(&[45, 13, 12, 16, 9, 5], 16).unwrap();
        assert_eq!(table.lengths(), &[1, 3, 3, 3, 4, 4]);
        assert_eq!(table.code(0), Some((0b0, 1)));
        assert_eq!(table.code(1), Some((0b100, 3)));
        assert_eq!(table.code(5), Some((0b1111, 4)));
    }

    #[test]
    fn test_single_symbol_gets_one_bit() {
        let table = CodeTable::build(&[0, 0, 7], 16).unwrap();
        assert_eq!(table.code(2), Some((0, 1)));
        assert_eq!(table.code_length(0), None);
    }

    #[test]
    fn test_length_limit() {
        // Fibonacci frequencies give a maximally skewed tree.
        let mut freqs = vec![1u64, 1];
        for i in 2..20 {
            freqs.push(freqs[i - 1] + freqs[i - 2]);
        }
        let table = CodeTable::build(&freqs, 8).unwrap();
        assert!(table.max_length() <= 8);
        let kraft: f64 = table
            .lengths()
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 2f64.powi(-(l as i32)))
            .sum();
        assert!(kraft <= 1.0 + 1e-12);
    }

    #[test]
    fn test_deterministic_bytes() {
        let a = CodeTable::build(&[5, 5, 5, 5, 1, 0, 9], 16).unwrap();
        let b = CodeTable::build(&[5, 5, 5, 5, 1, 0, 9], 16).unwrap();
        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        assert_eq!(CodeTable::from_bytes(&a.to_bytes().unwrap()).unwrap(), a);
    }

    #[test]
    fn test_encode_decode_terminator() {
        let table = CodeTable::from_lengths(&[2, 2, 2, 2]).unwrap();
        let mut writer = BitWriter::new();
        encode(&[1, 2, 1, 0, 3], &table, &mut writer).unwrap();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        assert_eq!(decode(&mut reader, &table, Termination::Symbol(3)).unwrap(), vec![1, 2, 1, 0]);
    }

    #[test]
    fn test_missing_symbol_unsupported() {
        let table = CodeTable::from_lengths(&[1, 1]).unwrap();
        let mut writer = BitWriter::new();
        assert!(matches!(
            encode(&[4], &table, &mut writer),
            Err(EmbroideryError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_oversubscribed_rejected() {
        assert!(CodeTable::from_lengths(&[1, 1, 1]).is_err());
    }

    #[test]
    fn test_block_truncated() {
        let symbols: Vec<u16> = (0..200).map(|i| (i * 7 % 13) as u16).collect();
        let block = compress_block(&symbols, None).unwrap();
        let (decoded, used) = decompress_block(&block, None).unwrap();
        assert_eq!(decoded, symbols);
        assert_eq!(used, block.len());
        for cut in 0..block.len() {
            assert!(decompress_block(&block[..cut], None).is_err(), "cut at {}", cut);
        }
    }
}
