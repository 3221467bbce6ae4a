//! Melco EXP.
//!
//! Headerless: pairs of signed bytes are stitches, and `0x80` introduces a
//! 4-byte command (`80 01` color change, `80 04` jump, `80 80 07 00` trim).
//! There is no end marker and no header to check lengths against, so a cut
//! file cannot be told apart from a short one; a dangling partial record is
//! reported and ignored.

use crate::error::Result;
use crate::io::stitch_stream::{self, PatternBuilder, Record, RecordKind, StreamLimits};
use crate::io::{FormatAdapter, FormatFeatures, IoConfiguration};
use crate::notification::{NotificationCollection, NotificationType};
use crate::pattern::Pattern;

const FORMAT: &str = "exp";

pub const MAX_STEP: i32 = 127;
const ESCAPE: u8 = 0x80;
const COLOR_CHANGE: u8 = 0x01;
const JUMP: u8 = 0x04;
const JUMP_ALT: u8 = 0x02;
const TRIM: u8 = 0x80;

const LIMITS: StreamLimits = StreamLimits {
    max_step: MAX_STEP,
    trim: true,
    stop: false,
};

fn encode_record(record: &Record, out: &mut Vec<u8>) {
    let dx = record.dx as i8 as u8;
    let dy = record.dy as i8 as u8;
    match record.kind {
        RecordKind::Stitch => out.extend_from_slice(&[dx, dy]),
        RecordKind::Jump => out.extend_from_slice(&[ESCAPE, JUMP, dx, dy]),
        RecordKind::Trim => out.extend_from_slice(&[ESCAPE, TRIM, 0x07, 0x00]),
        RecordKind::ColorChange | RecordKind::Stop => out.extend_from_slice(&[ESCAPE, COLOR_CHANGE, 0x00, 0x00]),
        RecordKind::End => {}
    }
}

/// Decode records. Also returns the offset of a trailing partial record and
/// the number of unknown commands skipped.
fn decode_records(bytes: &[u8]) -> (Vec<Record>, Option<usize>, usize) {
    let mut records = Vec::with_capacity(bytes.len() / 2);
    let mut unknown = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != ESCAPE {
            let Some(&dy) = bytes.get(i + 1) else {
                return (records, Some(i), unknown);
            };
            records.push(Record::stitch(bytes[i] as i8 as i32, dy as i8 as i32));
            i += 2;
            continue;
        }
        let Some(command) = bytes.get(i..i + 4) else {
            return (records, Some(i), unknown);
        };
        let (dx, dy) = (command[2] as i8 as i32, command[3] as i8 as i32);
        match command[1] {
            c if c & COLOR_CHANGE != 0 => records.push(Record::command(RecordKind::ColorChange)),
            JUMP | JUMP_ALT => records.push(Record::jump(dx, dy)),
            TRIM => records.push(Record::command(RecordKind::Trim)),
            _ => unknown += 1,
        }
        i += 4;
    }
    (records, None, unknown)
}

/// Melco EXP adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpFormat;

impl FormatAdapter for ExpFormat {
    fn id(&self) -> &'static str {
        FORMAT
    }

    fn description(&self) -> &'static str {
        "Melco EXP"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["exp"]
    }

    fn features(&self) -> FormatFeatures {
        FormatFeatures::STITCHES | FormatFeatures::COLOR_CHANGES | FormatFeatures::TRIMS
    }

    /// Any even-length byte string is a valid EXP file, so detection never
    /// claims the input.
    fn detect(&self, bytes: &[u8]) -> u8 {
        if !bytes.is_empty() && bytes.len() % 2 == 0 {
            10
        } else {
            0
        }
    }

    fn load(&self, bytes: &[u8], notifications: &mut NotificationCollection) -> Result<Pattern> {
        let (records, dangling, unknown) = decode_records(bytes);
        if let Some(offset) = dangling {
            notifications.notify(
                NotificationType::Warning,
                FORMAT,
                format!("incomplete record at offset {} ignored", offset),
            );
        }
        if unknown > 0 {
            notifications.notify(
                NotificationType::Warning,
                FORMAT,
                format!("{} unknown command(s) skipped", unknown),
            );
        }
        let mut builder = PatternBuilder::new();
        for record in records {
            builder.push(record);
        }
        Ok(builder.finish(Vec::new(), FORMAT, notifications))
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
        super::note_unstored_header(pattern, false, false, FORMAT, notifications);

        let mut out = Vec::with_capacity(stream.records.len() * 2);
        for record in &stream.records {
            encode_record(record, &mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Block, StitchType};
    use crate::types::Vector2;

    #[test]
    fn test_record_bytes() {
        let mut out = Vec::new();
        encode_record(&Record::stitch(-1, 127), &mut out);
        encode_record(&Record::jump(5, -5), &mut out);
        encode_record(&Record::command(RecordKind::ColorChange), &mut out);
        encode_record(&Record::command(RecordKind::Trim), &mut out);
        encode_record(&Record::command(RecordKind::End), &mut out);
        assert_eq!(
            out,
            vec![0xFF, 0x7F, 0x80, 0x04, 0x05, 0xFB, 0x80, 0x01, 0x00, 0x00, 0x80, 0x80, 0x07, 0x00]
        );
        let (records, dangling, unknown) = decode_records(&out);
        assert_eq!(dangling, None);
        assert_eq!(unknown, 0);
        assert_eq!(
            records,
            vec![
                Record::stitch(-1, 127),
                Record::jump(5, -5),
                Record::command(RecordKind::ColorChange),
                Record::command(RecordKind::Trim),
            ]
        );
    }

    #[test]
    fn test_dangling_byte_is_a_warning() {
        let mut notes = NotificationCollection::new();
        let pattern = ExpFormat.load(&[0x01, 0x02, 0x03], &mut notes).unwrap();
        assert_eq!(pattern.stitch_count(), 1);
        assert!(notes.has_type(NotificationType::Warning));
    }

    #[test]
    fn test_trim_survives() {
        let mut pattern = Pattern::new();
        let layer = pattern.add_layer("0");
        pattern.add_thread(stitch_stream::default_thread(0));
        pattern.add_stitch(layer, Vector2::new(3.0, 4.0), StitchType::Normal).unwrap();
        pattern
            .add_block(layer, Block::stitches(0, StitchType::Trim, Vec::new()))
            .unwrap();
        pattern.add_stitch(layer, Vector2::new(50.0, 4.0), StitchType::Jump).unwrap();

        let mut notes = NotificationCollection::new();
        let bytes = ExpFormat.save(&pattern, &IoConfiguration::default(), &mut notes).unwrap();
        assert!(notes.is_empty());
        let loaded = ExpFormat.load(&bytes, &mut notes).unwrap();
        assert_eq!(loaded, pattern);
    }

    #[test]
    fn test_detect_is_never_confident() {
        assert!(ExpFormat.detect(&[0, 0, 0, 0]) < crate::io::CONFIDENT_SCORE);
        assert_eq!(ExpFormat.detect(&[]), 0);
    }
}
