//! Husqvarna Viking HUS.
//!
//! Header (little-endian):
//!
//! | offset | field |
//! |---|---|
//! | 0x00 | u32 magic `0x00C8AF5B` |
//! | 0x04 | u32 record count (including the end record) |
//! | 0x08 | u32 color count |
//! | 0x0C | i16 max x, max y, min x, min y |
//! | 0x14 | u32 offsets of the attribute, x and y streams |
//! | 0x20 | 8-byte label, u16 reserved |
//! | 0x2A | colors × u16 Husqvarna Viking palette index |
//!
//! The three streams hold one byte per record (command attribute, signed x
//! move, signed y move), each compressed with the [`lzh`](crate::io::lzh)
//! codec. A stream runs from its offset to the next stream's offset; the y
//! stream runs to the end of the file.

use crate::error::{EmbroideryError, Result};
use crate::io::lzh;
use crate::io::stitch_stream::{self, PatternBuilder, Record, RecordKind, StreamLimits};
use crate::io::{FormatAdapter, FormatFeatures, IoConfiguration};
use crate::notification::{NotificationCollection, NotificationType};
use crate::palette;
use crate::pattern::Pattern;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const FORMAT: &str = "hus";

pub const MAGIC: u32 = 0x00C8_AF5B;
pub const HEADER_SIZE: usize = 0x2A;
pub const MAX_STEP: i32 = 127;

const ATTR_STITCH: u8 = 0x80;
const ATTR_JUMP: u8 = 0x81;
const ATTR_COLOR_CHANGE: u8 = 0x84;
const ATTR_TRIM: u8 = 0x88;
const ATTR_END: u8 = 0x90;

const LIMITS: StreamLimits = StreamLimits {
    max_step: MAX_STEP,
    trim: true,
    stop: false,
};

fn attribute(kind: RecordKind) -> u8 {
    match kind {
        RecordKind::Stitch => ATTR_STITCH,
        RecordKind::Jump => ATTR_JUMP,
        RecordKind::ColorChange | RecordKind::Stop => ATTR_COLOR_CHANGE,
        RecordKind::Trim => ATTR_TRIM,
        RecordKind::End => ATTR_END,
    }
}

/// Extents as stored in the header; false when one had to be clamped
fn header_extents(extents: [i32; 4]) -> ([i16; 4], bool) {
    let mut exact = true;
    let clamped = extents.map(|v| {
        let c = v.clamp(i16::MIN as i32, i16::MAX as i32);
        exact &= c == v;
        c as i16
    });
    (clamped, exact)
}

/// Decode the stream in `bytes[start..end]`; `end` of `None` runs to the end
fn read_stream(bytes: &[u8], start: u32, end: Option<u32>, expected: usize, name: &str) -> Result<Vec<u8>> {
    let start = start as usize;
    let end = end.map_or(bytes.len(), |e| e as usize);
    if end > bytes.len() {
        return Err(EmbroideryError::truncated(format!(
            "HUS {} stream ends at {} beyond {} bytes",
            name,
            end,
            bytes.len()
        )));
    }
    if start > end {
        return Err(EmbroideryError::corrupt(format!(
            "HUS {} stream starts at {} after its end {}",
            name, start, end
        )));
    }
    lzh::decompress(&bytes[start..end], expected)
}

/// Husqvarna Viking HUS adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct HusFormat;

impl FormatAdapter for HusFormat {
    fn id(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Husqvarna Viking HUS"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hus"]
    }

    fn features(&self) -> FormatFeatures {
        FormatFeatures::STITCHES
            | FormatFeatures::COLOR_CHANGES
            | FormatFeatures::TRIMS
            | FormatFeatures::THREAD_COLORS
            | FormatFeatures::COMPRESSED
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        match Cursor::new(bytes).read_u32::<LittleEndian>() {
            Ok(MAGIC) => 100,
            _ => 0,
        }
    }

    fn load(&self, bytes: &[u8], notifications: &mut NotificationCollection) -> Result<Pattern> {
        if bytes.len() < HEADER_SIZE {
            return Err(EmbroideryError::truncated(format!(
                "HUS header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let mut r = Cursor::new(bytes);
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(EmbroideryError::UnrecognizedFormat(format!("HUS magic {:#010x}", magic)));
        }
        let record_count = r.read_u32::<LittleEndian>()? as usize;
        let color_count = r.read_u32::<LittleEndian>()? as usize;
        let _extents = [
            r.read_i16::<LittleEndian>()?,
            r.read_i16::<LittleEndian>()?,
            r.read_i16::<LittleEndian>()?,
            r.read_i16::<LittleEndian>()?,
        ];
        let attribute_offset = r.read_u32::<LittleEndian>()?;
        let x_offset = r.read_u32::<LittleEndian>()?;
        let y_offset = r.read_u32::<LittleEndian>()?;
        r.set_position(HEADER_SIZE as u64);

        let catalog = palette::husqvarna_viking();
        let mut threads = Vec::new();
        for position in 0..color_count {
            let index = r.read_u16::<LittleEndian>()? as usize;
            threads.push(super::palette_thread(catalog, index, position, FORMAT, notifications));
        }

        if (attribute_offset as usize) < r.position() as usize {
            return Err(EmbroideryError::corrupt(format!(
                "HUS attribute stream at {} overlaps the color table",
                attribute_offset
            )));
        }
        let attributes = read_stream(bytes, attribute_offset, Some(x_offset), record_count, "attribute")?;
        let xs = read_stream(bytes, x_offset, Some(y_offset), record_count, "x")?;
        let ys = read_stream(bytes, y_offset, None, record_count, "y")?;

        let mut builder = PatternBuilder::new();
        let mut unknown = 0usize;
        for ((&attr, &x), &y) in attributes.iter().zip(&xs).zip(&ys) {
            let dx = x as i8 as i32;
            let dy = y as i8 as i32;
            let kind = match attr {
                ATTR_STITCH => RecordKind::Stitch,
                ATTR_JUMP => RecordKind::Jump,
                ATTR_COLOR_CHANGE => RecordKind::ColorChange,
                ATTR_TRIM => RecordKind::Trim,
                ATTR_END => RecordKind::End,
                _ => {
                    unknown += 1;
                    RecordKind::Stitch
                }
            };
            builder.push(Record::new(kind, dx, dy));
            if builder.is_ended() {
                break;
            }
        }
        if !builder.is_ended() {
            return Err(EmbroideryError::truncated("HUS records end without an end record"));
        }
        if unknown > 0 {
            notifications.notify(
                NotificationType::Warning,
                FORMAT,
                format!("{} record(s) with unknown attributes read as stitches", unknown),
            );
        }
        Ok(builder.finish(threads, FORMAT, notifications))
    }

    fn save(
        &self,
        pattern: &Pattern,
        config: &IoConfiguration,
        notifications: &mut NotificationCollection,
    ) -> Result<Vec<u8>> {
        let prepared = stitch_stream::prepare(pattern, config.flatten_tolerance, FORMAT, notifications)?;
        let stream = stitch_stream::lower(&prepared, LIMITS, FORMAT, notifications);
        if stream.body().is_empty() {
            return Err(EmbroideryError::UnsupportedFeature(
                "HUS files must contain at least one stitch record".into(),
            ));
        }
        super::note_unstored_header(pattern, false, false, FORMAT, notifications);

        let catalog = palette::husqvarna_viking();
        let mut color_indices = Vec::with_capacity(stream.segment_threads.len());
        for &thread_index in &stream.segment_threads {
            let thread = &pattern.threads[thread_index];
            let index = super::palette_index(catalog, thread, config.strict_threads, FORMAT, notifications)?;
            color_indices.push(index as u16);
        }

        let (mut x, mut y) = (0i32, 0i32);
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (0i32, 0i32, 0i32, 0i32);
        for record in stream.body() {
            x += record.dx;
            y += record.dy;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let (extents, exact) = header_extents([max_x, max_y, min_x, min_y]);
        if !exact {
            notifications.notify(
                NotificationType::Degraded,
                FORMAT,
                format!(
                    "design extents x {}..{}, y {}..{} clamped to the 16-bit header fields",
                    min_x, max_x, min_y, max_y
                ),
            );
        }

        let attributes: Vec<u8> = stream.records.iter().map(|r| attribute(r.kind)).collect();
        let xs: Vec<u8> = stream.records.iter().map(|r| r.dx as i8 as u8).collect();
        let ys: Vec<u8> = stream.records.iter().map(|r| r.dy as i8 as u8).collect();
        let attribute_block = lzh::compress(&attributes)?;
        let x_block = lzh::compress(&xs)?;
        let y_block = lzh::compress(&ys)?;

        let attribute_offset = HEADER_SIZE + color_indices.len() * 2;
        let x_offset = attribute_offset + attribute_block.len();
        let y_offset = x_offset + x_block.len();

        let mut out = Vec::with_capacity(y_offset + y_block.len());
        out.write_u32::<LittleEndian>(MAGIC)?;
        out.write_u32::<LittleEndian>(stream.records.len() as u32)?;
        out.write_u32::<LittleEndian>(color_indices.len() as u32)?;
        for v in extents {
            out.write_i16::<LittleEndian>(v)?;
        }
        out.write_u32::<LittleEndian>(attribute_offset as u32)?;
        out.write_u32::<LittleEndian>(x_offset as u32)?;
        out.write_u32::<LittleEndian>(y_offset as u32)?;
        out.extend_from_slice(&[0u8; 8]);
        out.write_u16::<LittleEndian>(0)?;
        for index in &color_indices {
            out.write_u16::<LittleEndian>(*index)?;
        }
        out.extend_from_slice(&attribute_block);
        out.extend_from_slice(&x_block);
        out.extend_from_slice(&y_block);
        Ok(out)
    }
}
