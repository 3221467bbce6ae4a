//! 128-byte directory entries and their name ordering

use super::sector::*;
use crate::error::{EmbroideryError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::cmp::Ordering;
use std::io::{Cursor, Read};

/// Longest entry name in UTF-16 code units (excluding the terminator)
pub const MAX_NAME_UNITS: usize = 31;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Unused,
    Storage,
    Stream,
    Root,
}

impl EntryType {
    /// Decode the on-disk object type byte
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(EntryType::Unused),
            1 => Ok(EntryType::Storage),
            2 => Ok(EntryType::Stream),
            5 => Ok(EntryType::Root),
            other => Err(EmbroideryError::malformed(format!("unknown directory entry type {}", other))),
        }
    }

    /// On-disk object type byte
    pub fn to_byte(self) -> u8 {
        match self {
            EntryType::Unused => 0,
            EntryType::Storage => 1,
            EntryType::Stream => 2,
            EntryType::Root => 5,
        }
    }
}

/// Red-black tree color
pub const COLOR_RED: u8 = 0;
pub const COLOR_BLACK: u8 = 1;

/// A directory entry as stored on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub entry_type: EntryType,
    pub color: u8,
    pub left: u32,
    pub right: u32,
    pub child: u32,
    pub clsid: [u8; 16],
    pub state_bits: u32,
    pub creation_time: u64,
    pub modified_time: u64,
    pub start_sector: u32,
    pub size: u64,
}

impl DirectoryEntry {
    /// An unused slot
    pub fn unused() -> Self {
        DirectoryEntry {
            name: String::new(),
            entry_type: EntryType::Unused,
            color: COLOR_RED,
            left: NOSTREAM,
            right: NOSTREAM,
            child: NOSTREAM,
            clsid: [0; 16],
            state_bits: 0,
            creation_time: 0,
            modified_time: 0,
            start_sector: 0,
            size: 0,
        }
    }

    /// Black entry with no children or data
    pub fn new(name: impl Into<String>, entry_type: EntryType) -> Self {
        DirectoryEntry {
            name: name.into(),
            entry_type,
            color: COLOR_BLACK,
            ..Self::unused()
        }
    }

    /// Parse one entry. `major_version` 3 ignores the upper half of the size.
    pub fn parse(bytes: &[u8], major_version: u16) -> Result<Self> {
        if bytes.len() < DIRECTORY_ENTRY_SIZE {
            return Err(EmbroideryError::truncated("directory entry"));
        }
        let mut r = Cursor::new(bytes);
        let mut raw_name = [0u8; 64];
        r.read_exact(&mut raw_name)?;
        let name_len = r.read_u16::<LittleEndian>()? as usize;
        let entry_type = EntryType::from_byte(r.read_u8()?)?;
        let color = r.read_u8()?;
        let left = r.read_u32::<LittleEndian>()?;
        let right = r.read_u32::<LittleEndian>()?;
        let child = r.read_u32::<LittleEndian>()?;
        let mut clsid = [0u8; 16];
        r.read_exact(&mut clsid)?;
        let state_bits = r.read_u32::<LittleEndian>()?;
        let creation_time = r.read_u64::<LittleEndian>()?;
        let modified_time = r.read_u64::<LittleEndian>()?;
        let start_sector = r.read_u32::<LittleEndian>()?;
        let mut size = r.read_u64::<LittleEndian>()?;
        if major_version == 3 {
            size &= 0xFFFF_FFFF;
        }

        let name = if entry_type == EntryType::Unused {
            String::new()
        } else {
            decode_name(&raw_name, name_len)?
        };

        Ok(DirectoryEntry {
            name,
            entry_type,
            color,
            left,
            right,
            child,
            clsid,
            state_bits,
            creation_time,
            modified_time,
            start_sector,
            size,
        })
    }

    /// Write the 128-byte record
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let units = encode_name(&self.name)?;
        let mut raw_name = [0u8; 64];
        for (i, unit) in units.iter().enumerate() {
            raw_name[2 * i..2 * i + 2].copy_from_slice(&unit.to_le_bytes());
        }
        out.extend_from_slice(&raw_name);
        let name_len = if units.is_empty() { 0 } else { (units.len() as u16 + 1) * 2 };
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u8(self.entry_type.to_byte())?;
        out.write_u8(self.color)?;
        out.write_u32::<LittleEndian>(self.left)?;
        out.write_u32::<LittleEndian>(self.right)?;
        out.write_u32::<LittleEndian>(self.child)?;
        out.extend_from_slice(&self.clsid);
        out.write_u32::<LittleEndian>(self.state_bits)?;
        out.write_u64::<LittleEndian>(self.creation_time)?;
        out.write_u64::<LittleEndian>(self.modified_time)?;
        out.write_u32::<LittleEndian>(self.start_sector)?;
        out.write_u64::<LittleEndian>(self.size)?;
        Ok(())
    }
}

fn decode_name(raw: &[u8; 64], name_len: usize) -> Result<String> {
    if name_len < 2 || name_len > 64 || name_len % 2 != 0 {
        return Err(EmbroideryError::malformed(format!("directory name length {}", name_len)));
    }
    let units: Vec<u16> = raw[..name_len - 2]
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| EmbroideryError::malformed("directory name is not valid UTF-16"))
}

/// UTF-16 code units of a valid entry name
pub fn encode_name(name: &str) -> Result<Vec<u16>> {
    let units: Vec<u16> = name.encode_utf16().collect();
    if units.len() > MAX_NAME_UNITS {
        return Err(EmbroideryError::UnsupportedFeature(format!(
            "entry name '{}' exceeds {} UTF-16 units",
            name, MAX_NAME_UNITS
        )));
    }
    Ok(units)
}

/// Check a path component for a stream or storage
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EmbroideryError::UnsupportedFeature("empty entry name".into()));
    }
    if name.chars().any(|c| matches!(c, '/' | '\\' | ':' | '!')) {
        return Err(EmbroideryError::UnsupportedFeature(format!(
            "entry name '{}' contains a reserved character",
            name
        )));
    }
    encode_name(name).map(|_| ())
}

/// Sibling ordering: shorter names first, then by uppercase name
pub fn compare_names(a: &str, b: &str) -> Ordering {
    let la = a.encode_utf16().count();
    let lb = b.encode_utf16().count();
    la.cmp(&lb).then_with(|| {
        let ua: Vec<u16> = a.to_uppercase().encode_utf16().collect();
        let ub: Vec<u16> = b.to_uppercase().encode_utf16().collect();
        ua.cmp(&ub)
    })
}

/// Names are equal under the container's case-insensitive comparison
pub fn names_match(a: &str, b: &str) -> bool {
    compare_names(a, b) == Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_round_trip() {
        let mut entry = DirectoryEntry::new("Stitches", EntryType::Stream);
        entry.start_sector = 12;
        entry.size = 4000;
        entry.left = 3;
        let mut out = Vec::new();
        entry.write_to(&mut out).unwrap();
        assert_eq!(out.len(), DIRECTORY_ENTRY_SIZE);
        assert_eq!(&out[64..66], &18u16.to_le_bytes());
        assert_eq!(out[66], 2);
        assert_eq!(DirectoryEntry::parse(&out, 3).unwrap(), entry);
    }

    #[test]
    fn test_name_order() {
        assert_eq!(compare_names("Zz", "aaa"), Ordering::Less);
        assert_eq!(compare_names("abc", "ABD"), Ordering::Less);
        assert!(names_match("Header", "HEADER"));
    }

    #[test]
    fn test_name_limits() {
        assert!(validate_name(&"x".repeat(31)).is_ok());
        assert!(validate_name(&"x".repeat(32)).is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn test_bad_type() {
        let mut out = Vec::new();
        DirectoryEntry::new("A", EntryType::Stream).write_to(&mut out).unwrap();
        out[66] = 9;
        assert!(matches!(DirectoryEntry::parse(&out, 3), Err(EmbroideryError::MalformedContainer(_))));
    }
}
