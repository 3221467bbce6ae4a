//! Melco OFM (read only).
//!
//! An OFM file is a compound container; the design lives in the
//! `EdsIV Object` stream (little-endian unless noted):
//!
//! | position | content |
//! |---|---|
//! | 0x1C6 | thread section |
//! | after it | 0x110 reserved bytes, u32, u16-prefixed class name, u16 object count, u16 |
//! | then | class record, then objects until the key `0xFEFF` |
//!
//! Thread section: u32, u16 color count, two u16, a u16-prefixed byte
//! string, then per color `r g b pad`, two u16, u32 color number, two u32,
//! u16, the color name, u16. After the colors: u16, the primary library
//! name, a u16 count of further library names and the names themselves.
//!
//! Names are the `FF FE FF` marker, a u8 length in UTF-16 units and the
//! UTF-16LE text. A class record is u16, a u16 length and an ASCII class
//! name; `CExpStitch` objects carry stitches, `CColorChange` objects a color
//! change. After each object a u16 key follows: `0xFFFF` introduces a new
//! class record, `0xFEFF` ends the design, any other value repeats the last
//! class.
//!
//! Every object starts with a block header (u16, two u32, two names,
//! 24 reserved bytes). Stitch objects continue with a u32 record count and
//! 5-byte records: a flag byte, then big-endian i16 x and y in 0.1 mm,
//! absolute and y-down. Flag 0 starts the object with a jump, flag 32 with a
//! trim; the other records are stitches.

use crate::error::{EmbroideryError, Result};
use crate::io::compound::{sector::SIGNATURE, CompoundFile};
use crate::io::stitch_stream::{PatternBuilder, Record, RecordKind};
use crate::io::{FormatAdapter, FormatFeatures, IoConfiguration};
use crate::notification::{NotificationCollection, NotificationType};
use crate::pattern::{Pattern, Thread};
use crate::types::Rgb;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use encoding_rs::UTF_16LE;
use std::io::{Cursor, Read, Seek, SeekFrom};

const FORMAT: &str = "ofm";

/// Stream holding the design
pub const OBJECT_STREAM: &str = "EdsIV Object";
pub const THREADS_OFFSET: u64 = 0x1C6;
const RESERVED_AFTER_THREADS: i64 = 0x110;
const BLOCK_HEADER_RESERVED: i64 = 24;

const NAME_MARKER: [u8; 3] = [0xFF, 0xFE, 0xFF];
const KEY_NEW_CLASS: u16 = 0xFFFF;
const KEY_END: u16 = 0xFEFF;

const FLAG_JUMP_START: u8 = 0;
const FLAG_TRIM_START: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectClass {
    Stitches,
    ColorChange,
}

impl ObjectClass {
    fn from_name(name: &str) -> Result<Self> {
        match name {
            "CExpStitch" => Ok(ObjectClass::Stitches),
            "CColorChange" => Ok(ObjectClass::ColorChange),
            other => Err(EmbroideryError::corrupt(format!("OFM object class {:?}", other))),
        }
    }
}

fn read_name(r: &mut Cursor<&[u8]>) -> Result<String> {
    let mut marker = [0u8; 3];
    r.read_exact(&mut marker)?;
    if marker != NAME_MARKER {
        return Err(EmbroideryError::corrupt(format!(
            "OFM name marker {:02X?} at {:#x}",
            marker,
            r.position() - 3
        )));
    }
    let units = r.read_u8()? as usize;
    let mut raw = vec![0u8; units * 2];
    r.read_exact(&mut raw)?;
    let (text, _, _) = UTF_16LE.decode(&raw);
    Ok(text.into_owned())
}

fn skip(r: &mut Cursor<&[u8]>, count: i64) -> Result<()> {
    let target = r.position() as i64 + count;
    if target as u64 > r.get_ref().len() as u64 {
        return Err(EmbroideryError::truncated(format!(
            "OFM object stream ends before {:#x}",
            target
        )));
    }
    r.seek(SeekFrom::Current(count))?;
    Ok(())
}

fn read_threads(r: &mut Cursor<&[u8]>) -> Result<Vec<Thread>> {
    let _ = r.read_u32::<LittleEndian>()?;
    let count = r.read_u16::<LittleEndian>()? as usize;
    let _ = r.read_u16::<LittleEndian>()?;
    let _ = r.read_u16::<LittleEndian>()?;
    let skipped = r.read_u16::<LittleEndian>()?;
    skip(r, skipped as i64)?;

    let mut colors = Vec::new();
    for _ in 0..count {
        let mut rgb = [0u8; 4];
        r.read_exact(&mut rgb)?;
        let _ = r.read_u16::<LittleEndian>()?;
        let _ = r.read_u16::<LittleEndian>()?;
        let number = r.read_u32::<LittleEndian>()?;
        skip(r, 10)?;
        let name = read_name(r)?;
        let _ = r.read_u16::<LittleEndian>()?;
        colors.push((Rgb::new(rgb[0], rgb[1], rgb[2]), number, name));
    }

    let _ = r.read_u16::<LittleEndian>()?;
    let library = read_name(r)?;
    let others = r.read_u16::<LittleEndian>()?;
    for _ in 0..others {
        read_name(r)?;
    }

    Ok(colors
        .into_iter()
        .map(|(color, number, name)| Thread {
            color,
            catalog_code: Some(number.to_string()),
            brand: (!library.is_empty()).then(|| library.clone()),
            description: (!name.is_empty()).then_some(name),
        })
        .collect())
}

fn read_class(r: &mut Cursor<&[u8]>) -> Result<ObjectClass> {
    let _ = r.read_u16::<LittleEndian>()?;
    let len = r.read_u16::<LittleEndian>()? as usize;
    let mut name = vec![0u8; len];
    r.read_exact(&mut name)?;
    ObjectClass::from_name(&String::from_utf8_lossy(&name))
}

fn skip_block_header(r: &mut Cursor<&[u8]>) -> Result<()> {
    let _ = r.read_u16::<LittleEndian>()?;
    let _ = r.read_u32::<LittleEndian>()?;
    let _ = r.read_u32::<LittleEndian>()?;
    read_name(r)?;
    read_name(r)?;
    skip(r, BLOCK_HEADER_RESERVED)
}

/// Folds absolute y-down stitches into machine records
struct StitchReader {
    builder: PatternBuilder,
    stitched: bool,
    unknown_flags: usize,
}

impl StitchReader {
    fn push_absolute(&mut self, kind: RecordKind, x: i16, y: i16) {
        let at = self.builder.position();
        let dx = x as i32 - at.x as i32;
        let dy = -(y as i32) - at.y as i32;
        self.builder.push(Record::new(kind, dx, dy));
    }

    fn read_stitches(&mut self, r: &mut Cursor<&[u8]>) -> Result<()> {
        skip_block_header(r)?;
        let count = r.read_u32::<LittleEndian>()?;
        for i in 0..count {
            let flag = r.read_u8()?;
            let x = r.read_i16::<BigEndian>()?;
            let y = r.read_i16::<BigEndian>()?;
            let kind = match flag {
                FLAG_JUMP_START if i == 0 => RecordKind::Jump,
                FLAG_TRIM_START if i == 0 => RecordKind::Trim,
                FLAG_JUMP_START | FLAG_TRIM_START => RecordKind::Stitch,
                _ => {
                    self.unknown_flags += 1;
                    continue;
                }
            };
            self.push_absolute(kind, x, y);
            self.stitched = true;
        }
        Ok(())
    }

    fn read_color_change(&mut self, r: &mut Cursor<&[u8]>) -> Result<()> {
        skip_block_header(r)?;
        // the first thread needs no change
        if self.stitched {
            self.builder.push(Record::command(RecordKind::ColorChange));
        }
        Ok(())
    }
}

/// Melco OFM adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct OfmFormat;

impl FormatAdapter for OfmFormat {
    fn id(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Melco OFM (read only)"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ofm"]
    }

    fn features(&self) -> FormatFeatures {
        FormatFeatures::STITCHES
            | FormatFeatures::COLOR_CHANGES
            | FormatFeatures::TRIMS
            | FormatFeatures::THREAD_COLORS
            | FormatFeatures::CONTAINER
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        if !bytes.starts_with(&SIGNATURE) {
            return 0;
        }
        match CompoundFile::open(bytes) {
            Ok(file) if file.contains(OBJECT_STREAM) => 100,
            _ => 0,
        }
    }

    fn load(&self, bytes: &[u8], notifications: &mut NotificationCollection) -> Result<Pattern> {
        let file = CompoundFile::open(bytes)?;
        let stream = file.read_stream(OBJECT_STREAM)?;
        let mut r = Cursor::new(stream);
        skip(&mut r, THREADS_OFFSET as i64)?;
        let threads = read_threads(&mut r)?;

        skip(&mut r, RESERVED_AFTER_THREADS)?;
        let _ = r.read_u32::<LittleEndian>()?;
        let name_len = r.read_u16::<LittleEndian>()?;
        skip(&mut r, name_len as i64)?;
        let objects = r.read_u16::<LittleEndian>()?;
        let _ = r.read_u16::<LittleEndian>()?;

        let mut reader = StitchReader {
            builder: PatternBuilder::new(),
            stitched: false,
            unknown_flags: 0,
        };
        let mut class = read_class(&mut r)?;
        let mut read = 0usize;
        loop {
            match class {
                ObjectClass::Stitches => reader.read_stitches(&mut r)?,
                ObjectClass::ColorChange => reader.read_color_change(&mut r)?,
            }
            read += 1;
            match r.read_u16::<LittleEndian>()? {
                KEY_END => break,
                KEY_NEW_CLASS => class = read_class(&mut r)?,
                _ => {}
            }
        }
        reader.builder.push(Record::command(RecordKind::End));

        if reader.unknown_flags > 0 {
            notifications.notify(
                NotificationType::Warning,
                FORMAT,
                format!("{} stitch record(s) with unknown flags skipped", reader.unknown_flags),
            );
        }
        tracing::debug!(objects = read, declared = objects, threads = threads.len(), "read OFM objects");
        Ok(reader.builder.finish(threads, FORMAT, notifications))
    }

    fn save(
        &self,
        _pattern: &Pattern,
        _config: &IoConfiguration,
        _notifications: &mut NotificationCollection,
    ) -> Result<Vec<u8>> {
        Err(EmbroideryError::UnsupportedFeature("OFM files can only be read".into()))
    }
}
