//! Shared test utilities for embroidery integration tests.
//!
//! Pattern builders, save/load helpers and the per-format lists used by the
//! round-trip and corruption tests. Every test crate imports this via
//! `mod common;`.

#![allow(dead_code)]

pub mod builders;
pub mod comparison;

use embroidery::io::{self, IoConfiguration};
use embroidery::{NotificationCollection, Pattern};
use std::path::PathBuf;

// ===========================================================================
// Format lists
// ===========================================================================

/// Every registered format id, in detection priority order.
pub const ALL_FORMATS: [&str; 5] = ["ecf", "hus", "jef", "dst", "exp"];

/// Formats that store stitches only (one layer, no geometry).
pub const STITCH_FORMATS: [&str; 4] = ["hus", "jef", "dst", "exp"];

/// Formats whose truncated files are always rejected.
pub const TRUNCATION_CHECKED_FORMATS: [&str; 4] = ["ecf", "hus", "jef", "dst"];

// ===========================================================================
// Paths
// ===========================================================================

/// Resolve a path in a per-process scratch directory, creating it if needed.
pub fn test_output_path(filename: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("embroidery-tests-{}", std::process::id()));
    let _ = std::fs::create_dir_all(&dir);
    dir.join(filename)
}

// ===========================================================================
// Save / load helpers
// ===========================================================================

/// Save and reload with the default configuration, panicking on failure.
///
/// Loading passes the format id as a hint so headerless formats work too.
pub fn roundtrip(pattern: &Pattern, format: &str) -> (Pattern, NotificationCollection, NotificationCollection) {
    roundtrip_with(pattern, format, &IoConfiguration::default())
}

pub fn roundtrip_with(
    pattern: &Pattern,
    format: &str,
    config: &IoConfiguration,
) -> (Pattern, NotificationCollection, NotificationCollection) {
    let (bytes, save_notes) = io::save_with_config(pattern, format, config)
        .unwrap_or_else(|e| panic!("saving {format} failed: {e}"));
    let (loaded, load_notes) = io::load_with_notifications(&bytes, Some(format))
        .unwrap_or_else(|e| panic!("loading {format} failed: {e}"));
    (loaded, save_notes, load_notes)
}

/// Save with the default configuration, panicking on failure.
pub fn save_bytes(pattern: &Pattern, format: &str) -> Vec<u8> {
    io::save(pattern, format).unwrap_or_else(|e| panic!("saving {format} failed: {e}"))
}
