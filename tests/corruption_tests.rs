//! Damaged input: truncation at every offset and random byte damage.
//!
//!   cargo test --test corruption_tests

mod common;

use common::builders;
use embroidery::io;
use embroidery::{EmbroideryError, Pattern, StitchType, Vector2};
use proptest::prelude::*;

/// Two colors, a trim, and a jump: enough to exercise every record kind
fn sample() -> Pattern {
    let mut pattern = builders::red_square();
    pattern.add_thread(embroidery::Thread::new(embroidery::Rgb::new(0, 0, 255)));
    pattern.add_stitch_with_thread(0, 1, Vector2::new(60.0, 60.0), StitchType::Jump).unwrap();
    for (x, y) in [(70.0, 60.0), (70.0, 70.0), (60.0, 70.0)] {
        pattern.add_stitch_with_thread(0, 1, Vector2::new(x, y), StitchType::Normal).unwrap();
    }
    pattern
}

#[test]
fn every_truncation_is_rejected() {
    let pattern = sample();
    for format in common::TRUNCATION_CHECKED_FORMATS {
        let bytes = common::save_bytes(&pattern, format);
        assert!(io::load(&bytes, Some(format)).is_ok(), "{format}");
        for len in 0..bytes.len() {
            match io::load(&bytes[..len], Some(format)) {
                Err(EmbroideryError::Truncated(_)) | Err(EmbroideryError::MalformedContainer(_)) => {}
                other => panic!("{format} cut to {len} of {} bytes: {other:?}", bytes.len()),
            }
        }
    }
}

#[test]
fn truncated_exp_keeps_whole_records() {
    let bytes = common::save_bytes(&sample(), "exp");
    let (pattern, notes) = io::load_with_notifications(&bytes[..bytes.len() - 1], Some("exp")).unwrap();
    assert!(!notes.is_empty());
    assert!(pattern.stitch_count() < sample().stitch_count());
}

#[test]
fn garbage_is_not_recognized() {
    let garbage: Vec<u8> = (0..700u32).map(|i| (i * 37 % 256) as u8).collect();
    assert!(matches!(io::load(&garbage, None), Err(EmbroideryError::UnrecognizedFormat(_))));
    assert!(matches!(io::load(&[], None), Err(EmbroideryError::UnrecognizedFormat(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Flipped bytes may load or fail, but never panic or hang
    #[test]
    fn damaged_files_never_panic(
        format_index in 0usize..5,
        flips in prop::collection::vec((any::<prop::sample::Index>(), 1u8..=255), 1..8),
    ) {
        let format = common::ALL_FORMATS[format_index];
        let mut bytes = common::save_bytes(&sample(), format);
        for (index, mask) in flips {
            let at = index.index(bytes.len());
            bytes[at] ^= mask;
        }
        let _ = io::load(&bytes, Some(format));
    }
}
