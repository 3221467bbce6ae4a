//! LZH block codec (LZ77 with per-block Huffman tables) used by HUS streams.
//!
//! A stream is a sequence of blocks, read MSB-first. Each block holds:
//!
//! | field | encoding |
//! |---|---|
//! | token count | 16 bits |
//! | code-length code | 5-bit count, then lengths (see below) |
//! | character code | 9-bit count, then lengths written with the code-length code |
//! | distance code | 5-bit count, then lengths |
//! | tokens | character code, plus a distance for matches |
//!
//! A count of 0 is followed by a single symbol in the count's width; that
//! symbol is then coded in zero bits. Lengths of the code-length and
//! distance codes are 3-bit values where 7 continues in unary (each 1 bit
//! adds one, a 0 bit ends it). In the code-length code a 2-bit count of
//! zero lengths to skip follows the third length.
//!
//! Code-length symbols 0, 1 and 2 stand for runs of 1, 3 + 4 bits and
//! 20 + 9 bits unused characters; symbol `c` above that is length `c - 2`.
//!
//! Characters below 256 are literal bytes. Character `c` above that copies
//! `c - 253` bytes starting `d + 1` bytes back, where distance symbol `j`
//! gives `d = 0` for `j == 0`, otherwise `2^(j-1)` plus `j - 1` extra bits.

use super::bitio::{BitReader, BitWriter};
use super::huffman::{CodeTable, MAX_CODE_LENGTH};
use crate::error::{EmbroideryError, Result};

/// Farthest back-reference the encoder emits
pub const WINDOW_SIZE: usize = 1 << 13;
pub const MIN_MATCH: usize = 3;
pub const MAX_MATCH: usize = 256;

/// Literals plus one symbol per match length
const CHAR_ALPHABET: usize = 256 + MAX_MATCH - MIN_MATCH + 1;
/// Character that ends a stream early
const END_SYMBOL: u16 = CHAR_ALPHABET as u16;
/// Run symbols plus lengths 1..=16
const LENGTH_ALPHABET: usize = 3 + MAX_CODE_LENGTH as usize;
/// Enough distance symbols for [`WINDOW_SIZE`]
const DISTANCE_ALPHABET: usize = 14;

const LENGTH_COUNT_BITS: usize = 5;
const CHAR_COUNT_BITS: usize = 9;
const DISTANCE_COUNT_BITS: usize = 5;
const TOKEN_COUNT_BITS: usize = 16;
const MAX_BLOCK_TOKENS: usize = u16::MAX as usize;

const HASH_BITS: usize = 12;
const MAX_CHAIN: usize = 128;
const NO_POSITION: usize = usize::MAX;

/// A block's prefix code: a real table, or one symbol sent in zero bits
#[derive(Debug, Clone, PartialEq, Eq)]
enum PrefixCode {
    Single(u16),
    Table(CodeTable),
}

impl PrefixCode {
    fn for_frequencies(frequencies: &[u64]) -> Result<Self> {
        let mut used = frequencies.iter().enumerate().filter(|&(_, &f)| f > 0);
        match (used.next(), used.next()) {
            (None, _) => Ok(PrefixCode::Single(0)),
            (Some((symbol, _)), None) => Ok(PrefixCode::Single(symbol as u16)),
            _ => Ok(PrefixCode::Table(CodeTable::build(frequencies, MAX_CODE_LENGTH)?)),
        }
    }

    fn read_symbol(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        match self {
            PrefixCode::Single(symbol) => Ok(*symbol),
            PrefixCode::Table(table) => table.read_symbol(reader),
        }
    }

    fn write_symbol(&self, symbol: u16, writer: &mut BitWriter) -> Result<()> {
        match self {
            PrefixCode::Single(only) if *only == symbol => Ok(()),
            PrefixCode::Table(table) => {
                let (code, len) = table.code(symbol).ok_or_else(|| {
                    EmbroideryError::UnsupportedFeature(format!("symbol {} has no code in the block", symbol))
                })?;
                writer.write_bits(code, len as usize)
            }
            PrefixCode::Single(only) => Err(EmbroideryError::UnsupportedFeature(format!(
                "symbol {} in a block coded for {} only",
                symbol, only
            ))),
        }
    }
}

/// Lengths up to the last coded symbol
fn trimmed(lengths: &[u8]) -> &[u8] {
    let end = lengths.iter().rposition(|&l| l != 0).map_or(0, |p| p + 1);
    &lengths[..end]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Literal(u8),
    /// `distance` is the back-reference minus one
    Match { length: usize, distance: usize },
}

impl Token {
    fn char_symbol(self) -> u16 {
        match self {
            Token::Literal(byte) => byte as u16,
            Token::Match { length, .. } => (length + 256 - MIN_MATCH) as u16,
        }
    }
}

/// Distance symbol, extra bits value and extra bit count
fn distance_code(distance: usize) -> (u16, u32, usize) {
    if distance == 0 {
        return (0, 0, 0);
    }
    let width = (usize::BITS - distance.leading_zeros()) as usize;
    let extra = width - 1;
    (width as u16, (distance - (1 << extra)) as u32, extra)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn read_length(reader: &mut BitReader<'_>) -> Result<u8> {
    let mut len = reader.read_bits(3)? as u8;
    if len == 7 {
        while reader.read_bit()? {
            len += 1;
            if len > MAX_CODE_LENGTH {
                return Err(EmbroideryError::corrupt(format!(
                    "LZH code length above {}",
                    MAX_CODE_LENGTH
                )));
            }
        }
    }
    Ok(len)
}

/// Code-length or distance code; `skip_after_third` enables the zero skip
fn read_small_code(reader: &mut BitReader<'_>, count_bits: usize, skip_after_third: bool) -> Result<PrefixCode> {
    let count = reader.read_bits(count_bits)? as usize;
    if count == 0 {
        return Ok(PrefixCode::Single(reader.read_bits(count_bits)? as u16));
    }
    let mut lengths = vec![0u8; count];
    let mut index = 0;
    while index < count {
        if skip_after_third && index == 3 {
            index += reader.read_bits(2)? as usize;
            if index >= count {
                return Err(EmbroideryError::corrupt("LZH zero-length skip runs past the code-length table"));
            }
        }
        lengths[index] = read_length(reader)?;
        index += 1;
    }
    Ok(PrefixCode::Table(CodeTable::from_lengths(&lengths)?))
}

fn read_char_code(reader: &mut BitReader<'_>, length_code: &PrefixCode) -> Result<PrefixCode> {
    let count = reader.read_bits(CHAR_COUNT_BITS)? as usize;
    if count == 0 {
        return Ok(PrefixCode::Single(reader.read_bits(CHAR_COUNT_BITS)? as u16));
    }
    let mut lengths = vec![0u8; count];
    let mut index = 0;
    while index < count {
        match length_code.read_symbol(reader)? {
            0 => index += 1,
            1 => index += 3 + reader.read_bits(4)? as usize,
            2 => index += 20 + reader.read_bits(CHAR_COUNT_BITS)? as usize,
            c => {
                lengths[index] = u8::try_from(c - 2).unwrap_or(u8::MAX);
                index += 1;
            }
        }
    }
    if index > count {
        return Err(EmbroideryError::corrupt(format!(
            "LZH unused-character run ends at {} past {} characters",
            index, count
        )));
    }
    Ok(PrefixCode::Table(CodeTable::from_lengths(&lengths)?))
}

struct BlockCodes {
    chars: PrefixCode,
    distances: PrefixCode,
}

fn read_block_header(reader: &mut BitReader<'_>) -> Result<(usize, BlockCodes)> {
    let tokens = reader.read_bits(TOKEN_COUNT_BITS)? as usize;
    if tokens == 0 {
        return Err(EmbroideryError::corrupt("LZH block with no tokens"));
    }
    let lengths = read_small_code(reader, LENGTH_COUNT_BITS, true)?;
    let chars = read_char_code(reader, &lengths)?;
    let distances = read_small_code(reader, DISTANCE_COUNT_BITS, false)?;
    Ok((tokens, BlockCodes { chars, distances }))
}

fn read_distance(reader: &mut BitReader<'_>, distances: &PrefixCode) -> Result<usize> {
    let symbol = distances.read_symbol(reader)? as usize;
    if symbol == 0 {
        return Ok(0);
    }
    let extra = symbol - 1;
    Ok((1usize << extra) + reader.read_bits(extra)? as usize)
}

/// Decode `expected` bytes from an LZH stream.
///
/// Blocks are read until enough bytes are produced; data after that is
/// ignored. A stream that runs out first fails with `Truncated`.
pub fn decompress(data: &[u8], expected: usize) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(data);
    let mut out = Vec::with_capacity(expected);
    let mut remaining = 0usize;
    let mut codes: Option<BlockCodes> = None;

    while out.len() < expected {
        if remaining == 0 {
            let (tokens, block) = read_block_header(&mut reader)?;
            remaining = tokens;
            codes = Some(block);
        }
        let block = codes
            .as_ref()
            .ok_or_else(|| EmbroideryError::corrupt("LZH token outside a block"))?;
        remaining -= 1;

        let symbol = block.chars.read_symbol(&mut reader)?;
        if symbol < 256 {
            out.push(symbol as u8);
            continue;
        }
        if symbol >= END_SYMBOL {
            break;
        }
        let length = symbol as usize + MIN_MATCH - 256;
        let back = read_distance(&mut reader, &block.distances)? + 1;
        if back > out.len() {
            return Err(EmbroideryError::corrupt(format!(
                "LZH back-reference of {} bytes with {} decoded",
                back,
                out.len()
            )));
        }
        let start = out.len() - back;
        for i in start..start + length {
            let byte = out[i];
            out.push(byte);
        }
    }

    if out.len() < expected {
        return Err(EmbroideryError::truncated(format!(
            "LZH stream ended after {} of {} bytes",
            out.len(),
            expected
        )));
    }
    out.truncate(expected);
    Ok(out)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn hash(bytes: &[u8]) -> usize {
    ((bytes[0] as usize) << 8 ^ (bytes[1] as usize) << 4 ^ bytes[2] as usize) & ((1 << HASH_BITS) - 1)
}

struct MatchFinder<'a> {
    data: &'a [u8],
    head: Vec<usize>,
    previous: Vec<usize>,
}

impl<'a> MatchFinder<'a> {
    fn new(data: &'a [u8]) -> Self {
        MatchFinder {
            data,
            head: vec![NO_POSITION; 1 << HASH_BITS],
            previous: vec![NO_POSITION; data.len()],
        }
    }

    fn insert(&mut self, pos: usize) {
        if pos + MIN_MATCH <= self.data.len() {
            let h = hash(&self.data[pos..]);
            self.previous[pos] = self.head[h];
            self.head[h] = pos;
        }
    }

    /// Longest earlier match at `pos` as (length, distance)
    fn longest(&self, pos: usize) -> (usize, usize) {
        if pos + MIN_MATCH > self.data.len() {
            return (0, 0);
        }
        let limit = (self.data.len() - pos).min(MAX_MATCH);
        let ahead = &self.data[pos..pos + limit];
        let mut best = (0, 0);
        let mut candidate = self.head[hash(ahead)];
        for _ in 0..MAX_CHAIN {
            if candidate == NO_POSITION || pos - candidate > WINDOW_SIZE {
                break;
            }
            let length = self.data[candidate..]
                .iter()
                .zip(ahead)
                .take_while(|(a, b)| a == b)
                .count();
            if length > best.0 {
                best = (length, pos - candidate - 1);
                if length == limit {
                    break;
                }
            }
            candidate = self.previous[candidate];
        }
        best
    }
}

/// Greedy parse into literals and matches
fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut finder = MatchFinder::new(data);
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (length, distance) = finder.longest(pos);
        let advance = if length >= MIN_MATCH {
            tokens.push(Token::Match { length, distance });
            length
        } else {
            tokens.push(Token::Literal(data[pos]));
            1
        };
        for p in pos..pos + advance {
            finder.insert(p);
        }
        pos += advance;
    }
    tokens
}

fn write_length(len: u8, writer: &mut BitWriter) -> Result<()> {
    if len < 7 {
        return writer.write_bits(len as u32, 3);
    }
    writer.write_bits(7, 3)?;
    for _ in 7..len {
        writer.write_bit(true)?;
    }
    writer.write_bit(false)
}

fn write_small_code(
    code: &PrefixCode,
    count_bits: usize,
    skip_after_third: bool,
    writer: &mut BitWriter,
) -> Result<()> {
    let table = match code {
        PrefixCode::Single(symbol) => {
            writer.write_bits(0, count_bits)?;
            return writer.write_bits(*symbol as u32, count_bits);
        }
        PrefixCode::Table(table) => table,
    };
    let lengths = trimmed(table.lengths());
    writer.write_bits(lengths.len() as u32, count_bits)?;
    let mut index = 0;
    while index < lengths.len() {
        write_length(lengths[index], writer)?;
        index += 1;
        if skip_after_third && index == 3 && index < lengths.len() {
            let skip = lengths[3..].iter().take(3).take_while(|&&l| l == 0).count();
            writer.write_bits(skip as u32, 2)?;
            index += skip;
        }
    }
    Ok(())
}

/// Character lengths as code-length symbols with their extra bits
fn char_length_symbols(lengths: &[u8]) -> Vec<(u16, u32, usize)> {
    let mut out = Vec::new();
    let mut index = 0;
    while index < lengths.len() {
        if lengths[index] != 0 {
            out.push((lengths[index] as u16 + 2, 0, 0));
            index += 1;
            continue;
        }
        let run = lengths[index..].iter().take_while(|&&l| l == 0).count();
        index += run;
        match run {
            1 | 2 => out.extend(std::iter::repeat((0, 0, 0)).take(run)),
            3..=18 => out.push((1, (run - 3) as u32, 4)),
            19 => {
                out.push((0, 0, 0));
                out.push((1, 15, 4));
            }
            _ => out.push((2, (run - 20) as u32, CHAR_COUNT_BITS)),
        }
    }
    out
}

fn write_char_code(chars: &PrefixCode, writer: &mut BitWriter) -> Result<()> {
    let table = match chars {
        PrefixCode::Single(symbol) => {
            write_small_code(&PrefixCode::Single(0), LENGTH_COUNT_BITS, true, writer)?;
            writer.write_bits(0, CHAR_COUNT_BITS)?;
            return writer.write_bits(*symbol as u32, CHAR_COUNT_BITS);
        }
        PrefixCode::Table(table) => table,
    };
    let lengths = trimmed(table.lengths());
    let symbols = char_length_symbols(lengths);
    let mut frequencies = vec![0u64; LENGTH_ALPHABET];
    for &(symbol, _, _) in &symbols {
        frequencies[symbol as usize] += 1;
    }
    let length_code = PrefixCode::for_frequencies(&frequencies)?;
    write_small_code(&length_code, LENGTH_COUNT_BITS, true, writer)?;
    writer.write_bits(lengths.len() as u32, CHAR_COUNT_BITS)?;
    for (symbol, extra, bits) in symbols {
        length_code.write_symbol(symbol, writer)?;
        writer.write_bits(extra, bits)?;
    }
    Ok(())
}

fn write_block(tokens: &[Token], writer: &mut BitWriter) -> Result<()> {
    let mut char_frequencies = vec![0u64; CHAR_ALPHABET];
    let mut distance_frequencies = vec![0u64; DISTANCE_ALPHABET];
    for &token in tokens {
        char_frequencies[token.char_symbol() as usize] += 1;
        if let Token::Match { distance, .. } = token {
            distance_frequencies[distance_code(distance).0 as usize] += 1;
        }
    }
    let chars = PrefixCode::for_frequencies(&char_frequencies)?;
    let distances = PrefixCode::for_frequencies(&distance_frequencies)?;

    writer.write_bits(tokens.len() as u32, TOKEN_COUNT_BITS)?;
    write_char_code(&chars, writer)?;
    write_small_code(&distances, DISTANCE_COUNT_BITS, false, writer)?;
    for &token in tokens {
        chars.write_symbol(token.char_symbol(), writer)?;
        if let Token::Match { distance, .. } = token {
            let (symbol, extra, bits) = distance_code(distance);
            distances.write_symbol(symbol, writer)?;
            writer.write_bits(extra, bits)?;
        }
    }
    Ok(())
}

/// Compress `data` into LZH blocks; empty input gives an empty stream
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let tokens = tokenize(data);
    let mut writer = BitWriter::new();
    for block in tokens.chunks(MAX_BLOCK_TOKENS) {
        write_block(block, &mut writer)?;
    }
    let out = writer.finish();
    tracing::trace!(input = data.len(), tokens = tokens.len(), output = out.len(), "lzh compressed");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        let mut state = 0x2545_F491u32;
        (0..len)
            .map(|i| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                if i % 5 == 0 {
                    (state >> 24) as u8
                } else {
                    (i % 7) as u8
                }
            })
            .collect()
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x9E37_79B9u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn test_literal_block() {
        // One block of 256 eight-bit literal codes, as written by literal-only HUS writers.
        let mut data = vec![0x00, 0x05, 0x02, 0xA0, 0x01, 0xFE];
        data.extend_from_slice(b"hello");
        assert_eq!(decompress(&data, 5).unwrap(), b"hello");
    }

    #[test]
    fn test_back_reference_block() {
        let mut w = BitWriter::new();
        w.write_bits(4, 16).unwrap();
        // code-length code: symbols 2 and 4, one bit each
        w.write_bits(5, 5).unwrap();
        for len in [0, 0, 1] {
            w.write_bits(len, 3).unwrap();
        }
        w.write_bits(1, 2).unwrap();
        w.write_bits(1, 3).unwrap();
        // characters 'a' 'b' 'c' and a six-byte match, two bits each
        w.write_bits(260, 9).unwrap();
        w.write_bits(0, 1).unwrap();
        w.write_bits(97 - 20, 9).unwrap();
        for _ in 0..3 {
            w.write_bits(1, 1).unwrap();
        }
        w.write_bits(0, 1).unwrap();
        w.write_bits(259 - 100 - 20, 9).unwrap();
        w.write_bits(1, 1).unwrap();
        // distance code: only symbol 2
        w.write_bits(0, 5).unwrap();
        w.write_bits(2, 5).unwrap();
        // a b c, then copy 6 from 3 back
        for code in [0b00, 0b01, 0b10, 0b11] {
            w.write_bits(code, 2).unwrap();
        }
        w.write_bits(0, 1).unwrap();
        let data = w.finish();
        assert_eq!(decompress(&data, 9).unwrap(), b"abcabcabc");
    }

    #[test]
    fn test_single_symbol_tables_cost_no_bits() {
        let mut w = BitWriter::new();
        w.write_bits(5, 16).unwrap();
        w.write_bits(0, 10).unwrap();
        w.write_bits(0, 18).unwrap();
        w.write_bits(0, 10).unwrap();
        let data = w.finish();
        assert_eq!(data.len(), 7);
        assert_eq!(decompress(&data, 5).unwrap(), vec![0u8; 5]);
    }

    #[test]
    fn test_reference_before_start_rejected() {
        let mut w = BitWriter::new();
        w.write_bits(1, 16).unwrap();
        w.write_bits(0, 10).unwrap();
        w.write_bits(0, 9).unwrap();
        w.write_bits(259, 9).unwrap();
        w.write_bits(0, 10).unwrap();
        let data = w.finish();
        assert!(matches!(decompress(&data, 6), Err(EmbroideryError::CorruptData(_))));
    }

    #[test]
    fn test_empty_block_rejected() {
        assert!(matches!(decompress(&[0, 0, 0, 0], 1), Err(EmbroideryError::CorruptData(_))));
    }

    #[test]
    fn test_round_trip() {
        for data in [
            Vec::new(),
            vec![0x80],
            vec![0u8; 300],
            b"abcabcabcabcabd".to_vec(),
            sample(5000),
            (0..=255u8).collect(),
        ] {
            let packed = compress(&data).unwrap();
            assert_eq!(decompress(&packed, data.len()).unwrap(), data);
        }
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let data: Vec<u8> = (0..4000).map(|i| [0x80, 0x80, 0x81, 0x80][i % 4]).collect();
        let packed = compress(&data).unwrap();
        assert!(packed.len() < data.len() / 10, "{} bytes", packed.len());
    }

    #[test]
    fn test_many_blocks() {
        let data = noise(70_000);
        let tokens = tokenize(&data).len();
        assert!(tokens > MAX_BLOCK_TOKENS, "{} tokens", tokens);
        let packed = compress(&data).unwrap();
        assert_eq!(decompress(&packed, data.len()).unwrap(), data);
    }

    #[test]
    fn test_every_prefix_truncated() {
        let data = sample(400);
        let packed = compress(&data).unwrap();
        for len in 0..packed.len() {
            assert!(
                matches!(decompress(&packed[..len], data.len()), Err(EmbroideryError::Truncated(_))),
                "prefix of {} bytes",
                len
            );
        }
    }

    #[test]
    fn test_distance_codes() {
        assert_eq!(distance_code(0), (0, 0, 0));
        assert_eq!(distance_code(1), (1, 0, 0));
        assert_eq!(distance_code(2), (2, 0, 1));
        assert_eq!(distance_code(3), (2, 1, 1));
        assert_eq!(distance_code(WINDOW_SIZE - 1), (13, 4095, 12));
    }
}
