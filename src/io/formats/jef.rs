//! Janome JEF.
//!
//! Layout (little-endian):
//!
//! | offset | field |
//! |---|---|
//! | 0x00 | u32 offset of the stitch data (`0x74 + 8 * colors`) |
//! | 0x04 | u32 flags (0x14) |
//! | 0x08 | 14 ASCII date digits `YYYYMMDDhhmmss` + 2 zero bytes |
//! | 0x18 | u32 color count |
//! | 0x1C | u32 stitch data length in 2-byte units |
//! | 0x20 | u32 hoop code |
//! | 0x24 | 4 × i32 design extents (left, top, right, bottom) |
//! | 0x34 | 4 × (4 × i32) design-to-hoop-edge distances, -1 when it does not fit |
//! | 0x74 | colors × i32 Janome palette index (1-based), colors × i32 thread type |
//!
//! Records are pairs of signed bytes; `0x80` escapes a command byte:
//! `01` color change, `02` jump (each followed by a move), `10` end.

use crate::error::{EmbroideryError, Result};
use crate::io::stitch_stream::{self, PatternBuilder, Record, RecordKind, StreamLimits};
use crate::io::{FormatAdapter, FormatFeatures, IoConfiguration};
use crate::notification::{NotificationCollection, NotificationType};
use crate::palette;
use crate::pattern::{Hoop, Pattern};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const FORMAT: &str = "jef";

pub const HEADER_SIZE: usize = 0x74;
pub const MAX_STEP: i32 = 127;
const FLAGS: u32 = 0x14;
const THREAD_TYPE: i32 = 0x0D;
const DATE_LEN: usize = 14;
const DEFAULT_DATE: &str = "00000000000000";

const ESCAPE: u8 = 0x80;
const COLOR_CHANGE: u8 = 0x01;
const JUMP: u8 = 0x02;
const END: u8 = 0x10;

/// Metadata key for the header date
pub const META_DATE: &str = "jef.date";

/// Hoop codes and their sizes in millimeters
pub const HOOPS: [(u32, f64, f64); 5] = [
    (0, 110.0, 110.0),
    (1, 50.0, 50.0),
    (2, 140.0, 200.0),
    (3, 126.0, 110.0),
    (4, 200.0, 200.0),
];

/// Hoops whose edge distances are written, in header order
const EDGE_HOOPS: [u32; 4] = [0, 1, 2, 3];

const LIMITS: StreamLimits = StreamLimits {
    max_step: MAX_STEP,
    trim: false,
    stop: false,
};

pub fn hoop_for_code(code: u32) -> Option<Hoop> {
    HOOPS
        .iter()
        .find(|h| h.0 == code)
        .map(|&(_, w, h)| Hoop::from_mm(w, h))
}

fn code_for_hoop(hoop: &Hoop) -> Option<u32> {
    HOOPS
        .iter()
        .find(|&&(_, w, h)| Hoop::from_mm(w, h) == *hoop)
        .map(|h| h.0)
}

/// Smallest hoop (by area) holding a design centered on the origin
fn smallest_hoop(extents: (i32, i32, i32, i32)) -> Option<u32> {
    let (left, top, right, bottom) = extents;
    let half_w = left.max(right) as f64;
    let half_h = top.max(bottom) as f64;
    let mut hoops = HOOPS.to_vec();
    hoops.sort_by(|a, b| (a.1 * a.2).total_cmp(&(b.1 * b.2)));
    hoops
        .into_iter()
        .find(|&(_, w, h)| half_w * 2.0 <= w * 10.0 && half_h * 2.0 <= h * 10.0)
        .map(|h| h.0)
}

fn encode_record(record: &Record, out: &mut Vec<u8>) {
    let dx = record.dx as i8 as u8;
    let dy = record.dy as i8 as u8;
    match record.kind {
        RecordKind::Stitch => out.extend_from_slice(&[dx, dy]),
        RecordKind::Jump | RecordKind::Trim => out.extend_from_slice(&[ESCAPE, JUMP, dx, dy]),
        RecordKind::ColorChange | RecordKind::Stop => out.extend_from_slice(&[ESCAPE, COLOR_CHANGE, dx, dy]),
        RecordKind::End => out.extend_from_slice(&[ESCAPE, END]),
    }
}

fn decode_records(data: &[u8], notifications: &mut NotificationCollection) -> Result<Vec<Record>> {
    let mut records = Vec::with_capacity(data.len() / 2);
    let mut i = 0;
    while i < data.len() {
        let pair = data
            .get(i..i + 2)
            .ok_or_else(|| EmbroideryError::truncated(format!("JEF record at offset {} is cut short", i)))?;
        if pair[0] != ESCAPE {
            records.push(Record::stitch(pair[0] as i8 as i32, pair[1] as i8 as i32));
            i += 2;
            continue;
        }
        if pair[1] == END {
            records.push(Record::command(RecordKind::End));
            return Ok(records);
        }
        let command = data
            .get(i..i + 4)
            .ok_or_else(|| EmbroideryError::truncated(format!("JEF command at offset {} is cut short", i)))?;
        let (dx, dy) = (command[2] as i8 as i32, command[3] as i8 as i32);
        match command[1] {
            COLOR_CHANGE => records.push(Record::new(RecordKind::ColorChange, dx, dy)),
            JUMP => records.push(Record::jump(dx, dy)),
            other => {
                notifications.notify(
                    NotificationType::Warning,
                    FORMAT,
                    format!("unknown command {:#04x} read as a jump", other),
                );
                records.push(Record::jump(dx, dy));
            }
        }
        i += 4;
    }
    Err(EmbroideryError::truncated("JEF stitch data ends without an end record"))
}

/// Janome JEF adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct JefFormat;

impl FormatAdapter for JefFormat {
    fn id(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Janome JEF"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["jef"]
    }

    fn features(&self) -> FormatFeatures {
        FormatFeatures::STITCHES
            | FormatFeatures::COLOR_CHANGES
            | FormatFeatures::THREAD_COLORS
            | FormatFeatures::HOOP
            | FormatFeatures::METADATA
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        if bytes.len() < HEADER_SIZE {
            return 0;
        }
        let mut r = Cursor::new(bytes);
        let (Ok(offset), Ok(flags)) = (r.read_u32::<LittleEndian>(), r.read_u32::<LittleEndian>()) else {
            return 0;
        };
        r.set_position(0x18);
        let Ok(colors) = r.read_u32::<LittleEndian>() else {
            return 0;
        };
        let expected = (colors as u64) * 8 + HEADER_SIZE as u64;
        if offset as u64 == expected && offset as usize <= bytes.len() {
            if flags == FLAGS {
                90
            } else {
                70
            }
        } else {
            0
        }
    }

    fn load(&self, bytes: &[u8], notifications: &mut NotificationCollection) -> Result<Pattern> {
        if bytes.len() < HEADER_SIZE {
            return Err(EmbroideryError::truncated(format!(
                "JEF header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let mut r = Cursor::new(bytes);
        let stitch_offset = r.read_u32::<LittleEndian>()? as usize;
        let _flags = r.read_u32::<LittleEndian>()?;
        let date = String::from_utf8_lossy(&bytes[0x08..0x08 + DATE_LEN]).into_owned();
        r.set_position(0x18);
        let color_count = r.read_u32::<LittleEndian>()? as usize;
        let unit_count = r.read_u32::<LittleEndian>()? as usize;
        let hoop_code = r.read_u32::<LittleEndian>()?;

        let table_end = color_count
            .checked_mul(8)
            .and_then(|n| n.checked_add(HEADER_SIZE))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| EmbroideryError::truncated(format!("JEF color table of {} colors", color_count)))?;
        if stitch_offset < table_end {
            return Err(EmbroideryError::corrupt(format!(
                "JEF stitch data at {:#x} overlaps the color table ending at {:#x}",
                stitch_offset, table_end
            )));
        }
        if stitch_offset > bytes.len() {
            return Err(EmbroideryError::truncated(format!(
                "JEF stitch data at {:#x} beyond {} bytes",
                stitch_offset,
                bytes.len()
            )));
        }

        let janome = palette::janome();
        r.set_position(HEADER_SIZE as u64);
        let mut threads = Vec::with_capacity(color_count);
        for position in 0..color_count {
            let index = r.read_i32::<LittleEndian>()?;
            let catalog_index = usize::try_from(index.saturating_sub(1)).unwrap_or(usize::MAX);
            threads.push(super::palette_thread(janome, catalog_index, position, FORMAT, notifications));
        }

        let records = decode_records(&bytes[stitch_offset..], notifications)?;
        let data_units = records
            .iter()
            .map(|r| match r.kind {
                RecordKind::Stitch | RecordKind::End => 1,
                _ => 2,
            })
            .sum::<usize>();
        if data_units != unit_count {
            notifications.notify(
                NotificationType::Warning,
                FORMAT,
                format!("header declares {} stitch units, file has {}", unit_count, data_units),
            );
        }

        let mut builder = PatternBuilder::new();
        for record in records {
            builder.push(record);
        }
        let mut pattern = builder.finish(threads, FORMAT, notifications);
        pattern.hoop = hoop_for_code(hoop_code);
        if pattern.hoop.is_none() {
            notifications.notify(
                NotificationType::Warning,
                FORMAT,
                format!("unknown hoop code {}", hoop_code),
            );
        }
        let date = date.trim_end_matches(['\0', ' ']).to_string();
        if !date.is_empty() && date != DEFAULT_DATE {
            pattern.metadata.insert(META_DATE.to_string(), date);
        }
        Ok(pattern)
    }

    fn save(
        &self,
        pattern: &Pattern,
        config: &IoConfiguration,
        notifications: &mut NotificationCollection,
    ) -> Result<Vec<u8>> {
        let prepared = stitch_stream::prepare(pattern, config.flatten_tolerance, FORMAT, notifications)?;
        let stream = stitch_stream::lower(&prepared, LIMITS, FORMAT, notifications);
        super::note_unstored_header(pattern, false, true, FORMAT, notifications);

        let janome = palette::janome();
        let mut color_indices = Vec::with_capacity(stream.segment_threads.len());
        for &thread_index in &stream.segment_threads {
            let thread = &pattern.threads[thread_index];
            let index = super::palette_index(janome, thread, config.strict_threads, FORMAT, notifications)?;
            color_indices.push(index as i32 + 1);
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
        let extents = (-min_x, max_y, max_x, -min_y);

        let hoop_code = match pattern.hoop.as_ref() {
            Some(hoop) => match code_for_hoop(hoop) {
                Some(code) => code,
                None => {
                    let code = smallest_hoop(extents).unwrap_or(4);
                    notifications.notify(
                        NotificationType::Degraded,
                        FORMAT,
                        format!("hoop {} replaced by hoop code {}", hoop, code),
                    );
                    code
                }
            },
            None => smallest_hoop(extents).unwrap_or(4),
        };

        let mut data = Vec::with_capacity(stream.records.len() * 2);
        for record in &stream.records {
            encode_record(record, &mut data);
        }

        let colors = color_indices.len();
        let mut out = Vec::with_capacity(HEADER_SIZE + colors * 8 + data.len());
        out.write_u32::<LittleEndian>((HEADER_SIZE + colors * 8) as u32)?;
        out.write_u32::<LittleEndian>(FLAGS)?;
        let date = pattern.metadata.get(META_DATE).map_or(DEFAULT_DATE, String::as_str);
        let mut date_bytes = [0u8; 16];
        for (slot, byte) in date_bytes.iter_mut().zip(date.bytes().take(DATE_LEN)) {
            *slot = byte;
        }
        out.extend_from_slice(&date_bytes);
        out.write_u32::<LittleEndian>(colors as u32)?;
        out.write_u32::<LittleEndian>((data.len() / 2) as u32)?;
        out.write_u32::<LittleEndian>(hoop_code)?;

        let (left, top, right, bottom) = extents;
        for v in [left, top, right, bottom] {
            out.write_i32::<LittleEndian>(v)?;
        }
        for code in EDGE_HOOPS {
            let edges = HOOPS
                .iter()
                .find(|h| h.0 == code)
                .map(|&(_, w, h)| {
                    let (half_w, half_h) = ((w * 5.0) as i32, (h * 5.0) as i32);
                    [half_w - left, half_h - top, half_w - right, half_h - bottom]
                })
                .filter(|e| e.iter().all(|&d| d >= 0))
                .unwrap_or([-1; 4]);
            for v in edges {
                out.write_i32::<LittleEndian>(v)?;
            }
        }

        for index in &color_indices {
            out.write_i32::<LittleEndian>(*index)?;
        }
        for _ in 0..colors {
            out.write_i32::<LittleEndian>(THREAD_TYPE)?;
        }
        out.extend_from_slice(&data);
        Ok(out)
    }
}
