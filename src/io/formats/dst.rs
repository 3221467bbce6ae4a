//! Tajima DST.
//!
//! A 512-byte ASCII header of `KEY:value` fields terminated by carriage
//! returns, followed by 3-byte records. Each record moves up to ±121 units
//! per axis using balanced ternary digits spread over the three bytes; the
//! top bits of the third byte carry jump and color change flags. The file
//! ends with the record `00 00 F3`.

use crate::error::{EmbroideryError, Result};
use crate::io::stitch_stream::{self, PatternBuilder, Record, RecordKind, StreamLimits};
use crate::io::{FormatAdapter, FormatFeatures, IoConfiguration};
use crate::notification::{NotificationCollection, NotificationType};
use crate::pattern::Pattern;
use encoding_rs::WINDOWS_1252;
use indexmap::IndexMap;
use nom::bytes::complete::{tag, take, take_till};
use nom::combinator::opt;
use nom::multi::many0;
use nom::sequence::tuple;
use nom::IResult;

const FORMAT: &str = "dst";

pub const HEADER_SIZE: usize = 512;
pub const RECORD_SIZE: usize = 3;
pub const MAX_STEP: i32 = 121;
const LABEL_WIDTH: usize = 16;
const HEADER_END: u8 = 0x1A;
const DEFAULT_PD: &str = "******";

/// Metadata key for a non-default `PD` header field
pub const META_PD: &str = "dst.pd";

const LIMITS: StreamLimits = StreamLimits {
    max_step: MAX_STEP,
    trim: false,
    stop: false,
};

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn field(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    let (input, (key, _, value, _)) = tuple((
        take(2usize),
        tag(":"),
        take_till(|c| c == b'\r' || c == b'\n' || c == HEADER_END),
        opt(tag("\r")),
    ))(input)?;
    Ok((input, (key, value)))
}

/// Header fields in file order, keyed by their two-letter name
fn parse_fields(header: &[u8]) -> IndexMap<String, Vec<u8>> {
    let end = header.iter().position(|&b| b == HEADER_END).unwrap_or(header.len());
    let fields = match many0(field)(&header[..end]) {
        Ok((_, fields)) => fields,
        Err(_) => Vec::new(),
    };
    fields
        .into_iter()
        .map(|(key, value)| (String::from_utf8_lossy(key).into_owned(), value.to_vec()))
        .collect()
}

fn numeric(fields: &IndexMap<String, Vec<u8>>, key: &str) -> Option<i64> {
    let value = fields.get(key)?;
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

fn write_header(
    label: &[u8],
    record_count: usize,
    color_changes: usize,
    extents: (i64, i64, i64, i64),
    end: (i64, i64),
    pd: &str,
) -> Result<Vec<u8>> {
    let (min_x, max_x, min_y, max_y) = extents;
    let mut out = Vec::with_capacity(HEADER_SIZE);
    out.extend_from_slice(b"LA:");
    out.extend_from_slice(label);
    out.resize(3 + LABEL_WIDTH, b' ');
    out.push(b'\r');
    let signed = |v: i64| format!("{}{:>5}", if v < 0 { '-' } else { '+' }, v.abs());
    let text = format!(
        "ST:{:>7}\rCO:{:>3}\r+X:{:>5}\r-X:{:>5}\r+Y:{:>5}\r-Y:{:>5}\rAX:{}\rAY:{}\rMX:{}\rMY:{}\rPD:{:<6}\r",
        record_count,
        color_changes,
        max_x,
        -min_x,
        max_y,
        -min_y,
        signed(end.0),
        signed(end.1),
        signed(0),
        signed(0),
        pd,
    );
    out.extend_from_slice(text.as_bytes());
    out.push(HEADER_END);
    if out.len() > HEADER_SIZE {
        return Err(EmbroideryError::UnsupportedFeature(format!(
            "DST header fields need {} bytes (design too large)",
            out.len()
        )));
    }
    out.resize(HEADER_SIZE, b' ');
    Ok(out)
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Digit weights and their (plus, minus) bits as (byte, mask) pairs
const X_DIGITS: [(i32, (usize, u8), (usize, u8)); 5] = [
    (81, (2, 0x04), (2, 0x08)),
    (27, (1, 0x04), (1, 0x08)),
    (9, (0, 0x04), (0, 0x08)),
    (3, (1, 0x01), (1, 0x02)),
    (1, (0, 0x01), (0, 0x02)),
];

const Y_DIGITS: [(i32, (usize, u8), (usize, u8)); 5] = [
    (81, (2, 0x20), (2, 0x10)),
    (27, (1, 0x20), (1, 0x10)),
    (9, (0, 0x20), (0, 0x10)),
    (3, (1, 0x80), (1, 0x40)),
    (1, (0, 0x80), (0, 0x40)),
];

fn encode_axis(mut value: i32, digits: &[(i32, (usize, u8), (usize, u8)); 5], out: &mut [u8; 3]) {
    for &(weight, (plus_byte, plus_mask), (minus_byte, minus_mask)) in digits {
        let half = weight / 2;
        if value > half {
            out[plus_byte] |= plus_mask;
            value -= weight;
        } else if value < -half {
            out[minus_byte] |= minus_mask;
            value += weight;
        }
    }
}

fn decode_axis(bytes: &[u8], digits: &[(i32, (usize, u8), (usize, u8)); 5]) -> i32 {
    digits
        .iter()
        .map(|&(weight, (pb, pm), (mb, mm))| {
            let mut v = 0;
            if bytes[pb] & pm != 0 {
                v += weight;
            }
            if bytes[mb] & mm != 0 {
                v -= weight;
            }
            v
        })
        .sum()
}

/// Encode one record; moves must be within ±[`MAX_STEP`]
pub fn encode_record(record: &Record) -> [u8; 3] {
    if record.kind == RecordKind::End {
        return [0x00, 0x00, 0xF3];
    }
    let mut out = [0u8; 3];
    encode_axis(record.dx, &X_DIGITS, &mut out);
    encode_axis(record.dy, &Y_DIGITS, &mut out);
    out[2] |= match record.kind {
        RecordKind::Jump | RecordKind::Trim => 0x83,
        RecordKind::ColorChange | RecordKind::Stop => 0xC3,
        _ => 0x03,
    };
    out
}

pub fn decode_record(bytes: &[u8]) -> Record {
    let dx = decode_axis(bytes, &X_DIGITS);
    let dy = decode_axis(bytes, &Y_DIGITS);
    let kind = if bytes[2] & 0xF3 == 0xF3 {
        RecordKind::End
    } else if bytes[2] & 0xC3 == 0xC3 {
        RecordKind::ColorChange
    } else if bytes[2] & 0x83 == 0x83 {
        RecordKind::Jump
    } else {
        RecordKind::Stitch
    };
    match kind {
        RecordKind::End => Record::command(RecordKind::End),
        _ => Record::new(kind, dx, dy),
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

/// Tajima DST adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct DstFormat;

impl FormatAdapter for DstFormat {
    fn id(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Tajima DST"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["dst"]
    }

    fn features(&self) -> FormatFeatures {
        FormatFeatures::STITCHES | FormatFeatures::COLOR_CHANGES | FormatFeatures::METADATA
    }

    fn detect(&self, bytes: &[u8]) -> u8 {
        if bytes.starts_with(b"LA:") {
            if bytes.len() >= HEADER_SIZE {
                90
            } else {
                60
            }
        } else {
            0
        }
    }

    fn load(&self, bytes: &[u8], notifications: &mut NotificationCollection) -> Result<Pattern> {
        if bytes.len() < HEADER_SIZE {
            return Err(EmbroideryError::truncated(format!(
                "DST header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        let fields = parse_fields(&bytes[..HEADER_SIZE]);

        let mut builder = PatternBuilder::new();
        let mut records = 0usize;
        for chunk in bytes[HEADER_SIZE..].chunks(RECORD_SIZE) {
            if chunk.len() < RECORD_SIZE {
                break;
            }
            let record = decode_record(chunk);
            builder.push(record);
            if builder.is_ended() {
                break;
            }
            records += 1;
        }
        if !builder.is_ended() {
            return Err(EmbroideryError::truncated(format!(
                "DST stitch data ends after {} records without an end record",
                records
            )));
        }

        if let Some(declared) = numeric(&fields, "ST") {
            if declared != records as i64 {
                notifications.notify(
                    NotificationType::Warning,
                    FORMAT,
                    format!("header declares {} records, file has {}", declared, records),
                );
            }
        }

        let mut pattern = builder.finish(Vec::new(), FORMAT, notifications);
        if let Some(label) = fields.get("LA") {
            let (text, _, _) = WINDOWS_1252.decode(label);
            pattern.name = text.trim_end().to_string();
        }
        if let Some(pd) = fields.get("PD") {
            let pd = String::from_utf8_lossy(pd).trim().to_string();
            if pd != DEFAULT_PD && !pd.is_empty() {
                pattern.metadata.insert(META_PD.to_string(), pd);
            }
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
        super::note_unstored_threads(pattern, &stream.segment_threads, FORMAT, notifications);
        super::note_unstored_header(pattern, true, false, FORMAT, notifications);

        let (label, _, _) = WINDOWS_1252.encode(&pattern.name);
        if label.len() > LABEL_WIDTH {
            notifications.notify(
                NotificationType::Degraded,
                FORMAT,
                format!("label truncated to {} characters", LABEL_WIDTH),
            );
        }
        let label = &label[..label.len().min(LABEL_WIDTH)];

        let (mut x, mut y) = (0i64, 0i64);
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (0i64, 0i64, 0i64, 0i64);
        for record in stream.body() {
            x += record.dx as i64;
            y += record.dy as i64;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        let pd = pattern.metadata.get(META_PD).map_or(DEFAULT_PD, String::as_str);
        let mut out = write_header(
            label,
            stream.body().len(),
            stream.color_changes(),
            (min_x, max_x, min_y, max_y),
            (x, y),
            pd,
        )?;
        out.reserve(stream.records.len() * RECORD_SIZE);
        for record in &stream.records {
            out.extend_from_slice(&encode_record(record));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::StitchType;
    use crate::types::Vector2;

    #[test]
    fn test_ternary_extremes() {
        for (dx, dy) in [(121, -121), (-121, 121), (0, 0), (40, -41), (1, 13), (-14, 5)] {
            let record = Record::stitch(dx, dy);
            assert_eq!(decode_record(&encode_record(&record)), record);
        }
    }

    #[test]
    fn test_flag_bits() {
        assert_eq!(encode_record(&Record::command(RecordKind::End)), [0x00, 0x00, 0xF3]);
        assert_eq!(encode_record(&Record::jump(0, 0))[2], 0x83);
        assert_eq!(encode_record(&Record::command(RecordKind::ColorChange))[2], 0xC3);
        assert_eq!(decode_record(&[0x00, 0x00, 0xC3]).kind, RecordKind::ColorChange);
        assert_eq!(decode_record(&[0x01, 0x00, 0x83]), Record::jump(1, 0));
    }

    #[test]
    fn test_header_fields() {
        let header = write_header(b"ROSE", 10, 2, (-5, 30, -7, 12), (3, 4), DEFAULT_PD).unwrap();
        assert_eq!(header.len(), HEADER_SIZE);
        assert!(header.starts_with(b"LA:ROSE            \rST:     10\rCO:  2\r"));
        let fields = parse_fields(&header);
        assert_eq!(numeric(&fields, "ST"), Some(10));
        assert_eq!(numeric(&fields, "-X"), Some(5));
        assert_eq!(fields.get("AX").map(Vec::as_slice), Some(&b"+    3"[..]));
        assert_eq!(fields.get("PD").map(Vec::as_slice), Some(&b"******"[..]));
    }

    #[test]
    fn test_save_load() {
        let mut pattern = Pattern::with_name("Leaf");
        let layer = pattern.add_layer("0");
        pattern.add_thread(stitch_stream::default_thread(0));
        pattern.add_stitch(layer, Vector2::new(10.0, 10.0), StitchType::Normal).unwrap();
        pattern.add_stitch(layer, Vector2::new(-20.0, 15.0), StitchType::Normal).unwrap();

        let mut notes = NotificationCollection::new();
        let bytes = DstFormat.save(&pattern, &IoConfiguration::default(), &mut notes).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 3 * RECORD_SIZE);
        assert!(notes.is_empty());
        assert_eq!(DstFormat.detect(&bytes), 90);

        let loaded = DstFormat.load(&bytes, &mut notes).unwrap();
        assert_eq!(loaded, pattern);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_missing_end_is_truncated() {
        let mut bytes = write_header(b"", 1, 0, (0, 1, 0, 1), (1, 1), DEFAULT_PD).unwrap();
        bytes.extend_from_slice(&encode_record(&Record::stitch(1, 1)));
        let mut notes = NotificationCollection::new();
        assert!(matches!(DstFormat.load(&bytes, &mut notes), Err(EmbroideryError::Truncated(_))));
    }

    #[test]
    fn test_pd_kept_in_metadata() {
        let mut pattern = Pattern::new();
        pattern.metadata.insert(META_PD.to_string(), "ABC123".to_string());
        let mut notes = NotificationCollection::new();
        let bytes = DstFormat.save(&pattern, &IoConfiguration::default(), &mut notes).unwrap();
        let loaded = DstFormat.load(&bytes, &mut notes).unwrap();
        assert_eq!(loaded.metadata.get(META_PD).map(String::as_str), Some("ABC123"));
    }
}
