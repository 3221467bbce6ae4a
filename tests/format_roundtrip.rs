//! Save/load round trips through every format.
//!
//!   cargo test --test format_roundtrip

mod common;

use common::builders::{self, Segment};
use common::comparison::{sewn_points, stitch_diffs};
use embroidery::io::{self, IoConfiguration};
use embroidery::palette;
use embroidery::{Block, EmbroideryError, NotificationType, Pattern, Rgb, StitchType, Vector2};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

/// Points reached by moves of at most 60 units from the previous point
fn walk(start: (i32, i32), len: usize) -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::vec((-60i32..=60, -60i32..=60), len).prop_map(move |deltas| {
        let mut at = start;
        deltas
            .into_iter()
            .map(|(dx, dy)| {
                at = (at.0 + dx, at.1 + dy);
                at
            })
            .collect()
    })
}

/// One to four color segments of alternating normal and jump runs
fn segments() -> impl Strategy<Value = Vec<Segment>> {
    prop::collection::vec((1usize..=3, any::<bool>(), prop::collection::vec(1usize..=6, 3)), 1..=4).prop_flat_map(
        |shapes| {
            let total: usize = shapes.iter().map(|(runs, _, lens)| lens[..*runs].iter().sum::<usize>()).sum();
            walk((0, 0), total).prop_map(move |points| {
                let mut points = points.into_iter();
                shapes
                    .iter()
                    .map(|(runs, jump_first, lens)| {
                        (0..*runs)
                            .map(|r| {
                                let stitch_type = if (r % 2 == 0) == *jump_first {
                                    StitchType::Jump
                                } else {
                                    StitchType::Normal
                                };
                                (stitch_type, points.by_ref().take(lens[r]).collect())
                            })
                            .collect()
                    })
                    .collect()
            })
        },
    )
}

fn assert_stitches_survive(original: &Pattern, format: &str) {
    let (loaded, save_notes, load_notes) = common::roundtrip(original, format);
    assert!(save_notes.is_empty(), "{format} save: {save_notes:?}");
    assert!(load_notes.is_empty(), "{format} load: {load_notes:?}");
    let diffs = stitch_diffs(original, &loaded);
    assert!(diffs.is_empty(), "{format}: {diffs:#?}");
    assert_eq!(loaded.threads, original.threads, "{format} threads");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn dst_keeps_stitches(segments in segments()) {
        let pattern = builders::stitch_pattern(&segments, builders::generic_threads);
        assert_stitches_survive(&pattern, "dst");
    }

    #[test]
    fn exp_keeps_stitches(segments in segments()) {
        let pattern = builders::stitch_pattern(&segments, builders::generic_threads);
        assert_stitches_survive(&pattern, "exp");
    }

    #[test]
    fn jef_keeps_stitches_and_janome_threads(segments in segments()) {
        let pattern = builders::stitch_pattern(&segments, builders::catalog_threads(palette::janome()));
        assert_stitches_survive(&pattern, "jef");
    }

    #[test]
    fn hus_keeps_stitches_and_viking_threads(segments in segments()) {
        let pattern = builders::stitch_pattern(&segments, builders::catalog_threads(palette::husqvarna_viking()));
        assert_stitches_survive(&pattern, "hus");
    }

    #[test]
    fn ecf_is_lossless(segments in segments(), name in "[A-Za-z0-9 ]{0,20}") {
        let mut pattern = builders::stitch_pattern(&segments, builders::generic_threads);
        pattern.name = name;
        let (loaded, _, _) = common::roundtrip(&pattern, "ecf");
        prop_assert_eq!(loaded, pattern);
    }
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn red_thread_survives_ecf() {
    let (loaded, save_notes, _) = common::roundtrip(&builders::red_square(), "ecf");
    assert!(save_notes.is_empty());
    assert_eq!(loaded.layers.len(), 1);
    assert_eq!(loaded.layers[0].blocks.len(), 1);
    let run = loaded.layers[0].blocks[0].as_stitches().unwrap();
    assert_eq!(run.stitch_type, StitchType::Normal);
    assert_eq!(
        run.points,
        vec![Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0), Vector2::new(10.0, 10.0)]
    );
    let thread = &loaded.threads[0];
    assert_eq!(thread.brand.as_deref(), Some("X"));
    assert_eq!(thread.catalog_code.as_deref(), Some("1"));
    // Brand "X" has no catalog: the entry is the nearest generic color.
    let entry = thread.catalog_entry();
    assert_eq!(entry.color, Rgb::RED);
    assert_eq!(entry.name, "Red");
}

#[test]
fn red_square_points_survive_every_format() {
    let original = builders::red_square();
    for format in common::ALL_FORMATS {
        let (loaded, _, _) = common::roundtrip(&original, format);
        assert_eq!(sewn_points(&loaded), sewn_points(&original), "{format}");
    }
}

#[test]
fn red_thread_matches_palette_red() {
    for (format, brand) in [("jef", palette::JANOME_BRAND), ("hus", palette::HUSQVARNA_VIKING_BRAND)] {
        let (loaded, save_notes, _) = common::roundtrip(&builders::red_square(), format);
        assert!(save_notes.is_empty(), "{format}: {save_notes:?}");
        assert_eq!(loaded.threads[0].brand.as_deref(), Some(brand));
        assert_eq!(loaded.threads[0].color, Rgb::RED, "{format}");
    }
}

#[test]
fn red_thread_dropped_by_count_only_formats() {
    for format in ["dst", "exp"] {
        let (loaded, save_notes, _) = common::roundtrip(&builders::red_square(), format);
        assert!(save_notes.has_type(NotificationType::FeatureDropped), "{format}");
        assert_eq!(loaded.threads.len(), 1);
        assert_eq!(loaded.threads[0].brand.as_deref(), Some(palette::GENERIC_BRAND));
    }
}

#[test]
fn explicit_color_change_and_end_commands() {
    let mut original = Pattern::new();
    let layer = original.add_layer("0");
    original.add_thread(builders::catalog_threads(palette::janome())(0));
    let runs = [
        (StitchType::Normal, vec![Vector2::new(10.0, 0.0), Vector2::new(20.0, 0.0)]),
        (StitchType::ColorChange, Vec::new()),
        (StitchType::End, Vec::new()),
        (StitchType::Normal, vec![Vector2::new(30.0, 30.0)]),
    ];
    for (stitch_type, points) in runs {
        original.add_block(layer, Block::stitches(0, stitch_type, points)).unwrap();
    }

    for format in ["jef", "hus", "dst", "exp"] {
        let (loaded, save_notes, _) = common::roundtrip(&original, format);
        assert!(save_notes.has_type(NotificationType::FeatureDropped), "{format}");
        assert_eq!(
            sewn_points(&loaded),
            vec![Vector2::new(10.0, 0.0), Vector2::new(20.0, 0.0)],
            "{format}"
        );
    }
    // Both color segments are listed, each with the same thread.
    for format in ["jef", "hus"] {
        let (loaded, _, _) = common::roundtrip(&original, format);
        assert_eq!(loaded.threads.len(), 2, "{format}");
        assert_eq!(loaded.threads[0].color, loaded.threads[1].color, "{format}");
    }
}

#[test]
fn empty_pattern_per_format() {
    let empty = Pattern::new();
    for format in ["ecf", "dst", "exp"] {
        let (loaded, _, _) = common::roundtrip(&empty, format);
        assert_eq!(loaded, empty, "{format}");
    }

    // JEF always names a hoop; the smallest one is picked for an empty design.
    let (loaded, _, _) = common::roundtrip(&empty, "jef");
    assert!(loaded.layers.is_empty());
    assert!(loaded.threads.is_empty());
    assert_eq!(loaded.hoop, embroidery::io::formats::jef::hoop_for_code(1));

    assert!(matches!(io::save(&empty, "hus"), Err(EmbroideryError::UnsupportedFeature(_))));
}

#[test]
fn geometry_is_flattened_for_stitch_formats() {
    let pattern = builders::all_geometry_pattern();
    for format in common::STITCH_FORMATS {
        let (bytes, notes) = io::save_with_notifications(&pattern, format).unwrap();
        assert!(notes.has_type(NotificationType::Degraded), "{format}");
        assert!(notes.has_type(NotificationType::FeatureDropped), "{format}");
        let loaded = io::load(&bytes, Some(format)).unwrap();
        assert!(loaded.stitch_count() > 50, "{format}: {}", loaded.stitch_count());
        assert!(loaded.blocks().all(|b| !b.is_geometry()));
        assert_eq!(loaded.layers.len(), 1);
    }
}

#[test]
fn ecf_keeps_geometry_and_dimensions() {
    let pattern = builders::all_geometry_pattern();
    let (loaded, save_notes, load_notes) = common::roundtrip(&pattern, "ecf");
    assert!(save_notes.is_empty());
    assert!(load_notes.is_empty());
    assert_eq!(loaded, pattern);
}

#[test]
fn detection_without_hint() {
    let pattern = builders::red_square();
    for format in ["ecf", "hus", "jef", "dst"] {
        let bytes = common::save_bytes(&pattern, format);
        let adapter = io::registry().detect(&bytes).map(|a| a.id());
        assert_eq!(adapter, Some(format));
        assert!(io::load(&bytes, None).is_ok());
    }
    // Headerless EXP cannot be recognized from content alone.
    let bytes = common::save_bytes(&pattern, "exp");
    assert!(matches!(io::load(&bytes, None), Err(EmbroideryError::UnrecognizedFormat(_))));
    assert!(io::load(&bytes, Some("exp")).is_ok());
}

#[test]
fn strict_threads_reject_off_palette_colors() {
    let mut pattern = builders::red_square();
    pattern.threads[0].color = Rgb::new(3, 200, 77);
    let config = IoConfiguration::default().with_strict_threads(true);
    for format in ["jef", "hus"] {
        assert!(matches!(
            io::save_with_config(&pattern, format, &config),
            Err(EmbroideryError::UnsupportedFeature(_))
        ));
        let (_, notes) = io::save_with_notifications(&pattern, format).unwrap();
        assert!(notes.has_type(NotificationType::Degraded), "{format}");
    }
}

#[test]
fn files_round_trip_through_disk() {
    let pattern = builders::all_geometry_pattern();
    let path = common::test_output_path("all_geometry.ecf");
    io::save_file(&path, &pattern, "ecf").unwrap();
    assert_eq!(io::load_file(&path, None).unwrap(), pattern);
    std::fs::remove_file(&path).unwrap();
}
