//! Compound container reader/writer tests.
//!
//!   cargo test --test container_tests

mod common;

use embroidery::io::compound::sector::{ENDOFCHAIN, HEADER_DIFAT_SLOTS};
use embroidery::io::compound::ContainerConfig;
use embroidery::{CompoundFile, EmbroideryError};

// ===========================================================================
// Helpers
// ===========================================================================

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn put_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn sector_offset(id: u32, sector_size: usize) -> usize {
    (id as usize + 1) * sector_size
}

fn patterned(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + seed) % 251) as u8).collect()
}

/// Version 3 image with one 4096-byte stream "Big" in sectors 0-7
fn single_stream_image() -> Vec<u8> {
    let mut file = CompoundFile::create(ContainerConfig::default()).unwrap();
    file.write_stream("Big", &patterned(4096, 1)).unwrap();
    file.serialize().unwrap()
}

fn first_fat_sector(bytes: &[u8]) -> u32 {
    u32_at(bytes, 0x4C)
}

fn directory_offset(bytes: &[u8]) -> usize {
    sector_offset(u32_at(bytes, 0x30), 512)
}

fn assert_malformed(bytes: &[u8]) {
    match CompoundFile::open(bytes) {
        Err(EmbroideryError::MalformedContainer(_)) => {}
        other => panic!("expected MalformedContainer, got {other:?}"),
    }
}

// ===========================================================================
// Layout
// ===========================================================================

#[test]
fn test_tree_round_trip() {
    let mut file = CompoundFile::create(ContainerConfig::default()).unwrap();
    file.write_stream("Header", b"abc").unwrap();
    file.write_stream("Layer0001/Blocks", &patterned(5000, 3)).unwrap();
    file.write_stream("Layer0000/Blocks", &patterned(100, 4)).unwrap();
    file.write_stream("Layer0000/Empty", b"").unwrap();
    file.write_stream("Layer0000/Deep/Nested/Stream", &patterned(70, 5)).unwrap();

    let bytes = file.serialize().unwrap();
    assert_eq!(bytes.len() % 512, 0);
    let reopened = CompoundFile::open(&bytes).unwrap();

    let mut expected = file.list_streams();
    let mut actual = reopened.list_streams();
    expected.sort();
    actual.sort();
    assert_eq!(actual, expected);
    for path in &expected {
        assert_eq!(reopened.read_stream(path).unwrap(), file.read_stream(path).unwrap(), "{path}");
    }
    // Names compare without regard to case.
    assert_eq!(reopened.read_stream("header").unwrap(), b"abc");
}

#[test]
fn test_small_streams_use_mini_stream() {
    let mut file = CompoundFile::create(ContainerConfig::default()).unwrap();
    file.write_stream("Small", &patterned(100, 0)).unwrap();
    let bytes = file.serialize().unwrap();
    assert_eq!(u32_at(&bytes, 0x38), 4096);
    assert_ne!(u32_at(&bytes, 0x3C), ENDOFCHAIN);
    assert_eq!(u32_at(&bytes, 0x40), 1);

    let mut file = CompoundFile::create(ContainerConfig::default()).unwrap();
    file.write_stream("Large", &patterned(4096, 0)).unwrap();
    let bytes = file.serialize().unwrap();
    assert_eq!(u32_at(&bytes, 0x3C), ENDOFCHAIN);
    assert_eq!(u32_at(&bytes, 0x40), 0);
}

#[test]
fn test_cutoff_is_always_4096() {
    for config in [ContainerConfig::default(), ContainerConfig::version4()] {
        let mut file = CompoundFile::create(config).unwrap();
        file.write_stream("Small", &patterned(100, 0)).unwrap();
        let bytes = file.serialize().unwrap();
        assert_eq!(u32_at(&bytes, 0x38), 0x1000);
    }
}

#[test]
fn test_non_standard_cutoff_rejected() {
    let mut file = CompoundFile::create(ContainerConfig::default()).unwrap();
    file.write_stream("Small", &patterned(100, 0)).unwrap();
    let bytes = file.serialize().unwrap();
    for cutoff in [0u32, 0x10_0000] {
        let mut patched = bytes.clone();
        patched[0x38..0x3C].copy_from_slice(&cutoff.to_le_bytes());
        assert_malformed(&patched);
    }
}

#[test]
fn test_version4_layout() {
    let mut file = CompoundFile::create(ContainerConfig::version4()).unwrap();
    file.write_stream("Data", &patterned(10_000, 9)).unwrap();
    file.write_stream("Tiny", b"x").unwrap();
    let bytes = file.serialize().unwrap();
    assert_eq!(bytes.len() % 4096, 0);
    assert_eq!(u16::from_le_bytes([bytes[0x1A], bytes[0x1B]]), 4);
    assert_eq!(u16::from_le_bytes([bytes[0x1E], bytes[0x1F]]), 12);
    let reopened = CompoundFile::open(&bytes).unwrap();
    assert_eq!(reopened.config().sector_size, 4096);
    assert_eq!(reopened.read_stream("Data").unwrap(), &patterned(10_000, 9)[..]);
    assert_eq!(reopened.read_stream("Tiny").unwrap(), b"x");
}

#[test]
fn test_large_container_uses_difat() {
    // 8 MiB needs more FAT sectors than the header can list.
    let data = patterned(8 * 1024 * 1024, 11);
    let mut file = CompoundFile::create(ContainerConfig::default()).unwrap();
    file.write_stream("Huge", &data).unwrap();
    file.write_stream("Note", b"beside a huge stream").unwrap();
    let bytes = file.serialize().unwrap();

    let fat_sectors = u32_at(&bytes, 0x2C) as usize;
    assert!(fat_sectors > HEADER_DIFAT_SLOTS, "{fat_sectors} FAT sectors");
    assert_ne!(u32_at(&bytes, 0x44), ENDOFCHAIN);
    assert!(u32_at(&bytes, 0x48) >= 1);

    let reopened = CompoundFile::open(&bytes).unwrap();
    assert_eq!(reopened.read_stream("Huge").unwrap(), &data[..]);
    assert_eq!(reopened.read_stream("Note").unwrap(), b"beside a huge stream");
}

// ===========================================================================
// Corruption
// ===========================================================================

#[test]
fn test_fat_cycle_is_malformed() {
    let mut bytes = single_stream_image();
    let fat = sector_offset(first_fat_sector(&bytes), 512);
    // Sector 3 points back to sector 1.
    put_u32(&mut bytes, fat + 3 * 4, 1);
    assert_malformed(&bytes);
}

#[test]
fn test_out_of_range_sector_is_malformed() {
    let mut bytes = single_stream_image();
    let fat = sector_offset(first_fat_sector(&bytes), 512);
    put_u32(&mut bytes, fat + 3 * 4, 100_000);
    assert_malformed(&bytes);
}

#[test]
fn test_root_of_wrong_type_is_malformed() {
    let mut bytes = single_stream_image();
    let dir = directory_offset(&bytes);
    bytes[dir + 0x42] = 1;
    assert_malformed(&bytes);
}

#[test]
fn test_directory_cycle_is_malformed() {
    let mut bytes = single_stream_image();
    let dir = directory_offset(&bytes);
    // Entry 1 lists itself as its left sibling.
    put_u32(&mut bytes, dir + 128 + 0x44, 1);
    assert_malformed(&bytes);
}

#[test]
fn test_oversized_stream_is_malformed() {
    let mut bytes = single_stream_image();
    let dir = directory_offset(&bytes);
    put_u32(&mut bytes, dir + 128 + 0x78, 1 << 20);
    assert_malformed(&bytes);
}

#[test]
fn test_bad_signature_is_malformed() {
    let mut bytes = single_stream_image();
    bytes[0] ^= 0xFF;
    assert_malformed(&bytes);
}

#[test]
fn test_truncated_image_fails() {
    let bytes = single_stream_image();
    for len in [0, 100, 511, 512, 2048, bytes.len() - 512, bytes.len() - 1] {
        let err = CompoundFile::open(&bytes[..len]).unwrap_err();
        assert!(
            matches!(err, EmbroideryError::Truncated(_) | EmbroideryError::MalformedContainer(_)),
            "{len} bytes: {err:?}"
        );
    }
}
