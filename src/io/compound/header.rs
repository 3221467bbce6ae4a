//! Container header (first 512 bytes)

use super::sector::*;
use crate::error::{EmbroideryError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

pub const MINOR_VERSION: u16 = 0x003E;
pub const BYTE_ORDER_MARK: u16 = 0xFFFE;

/// Parsed container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub minor_version: u16,
    /// 3 for 512-byte sectors, 4 for 4096-byte sectors
    pub major_version: u16,
    pub sector_shift: u16,
    pub mini_sector_shift: u16,
    /// Always 0 for version 3
    pub directory_sector_count: u32,
    pub fat_sector_count: u32,
    pub first_directory_sector: u32,
    pub transaction_signature: u32,
    pub mini_stream_cutoff: u32,
    pub first_mini_fat_sector: u32,
    pub mini_fat_sector_count: u32,
    pub first_difat_sector: u32,
    pub difat_sector_count: u32,
    /// The 109 DIFAT slots held in the header
    pub difat: Vec<u32>,
}

impl Header {
    /// Header for a new container with the given sector size
    pub fn new(sector_size: usize) -> Self {
        let (major_version, sector_shift) = if sector_size == 4096 { (4, 12) } else { (3, 9) };
        Header {
            minor_version: MINOR_VERSION,
            major_version,
            sector_shift,
            mini_sector_shift: MINI_SECTOR_SHIFT,
            directory_sector_count: 0,
            fat_sector_count: 0,
            first_directory_sector: ENDOFCHAIN,
            transaction_signature: 0,
            mini_stream_cutoff: MINI_STREAM_CUTOFF,
            first_mini_fat_sector: ENDOFCHAIN,
            mini_fat_sector_count: 0,
            first_difat_sector: ENDOFCHAIN,
            difat_sector_count: 0,
            difat: vec![FREESECT; HEADER_DIFAT_SLOTS],
        }
    }

    /// Sector size in bytes from the sector shift
    pub fn sector_size(&self) -> usize {
        1usize << self.sector_shift
    }

    /// Parse and validate the header fields
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(EmbroideryError::truncated(format!(
                "container header needs {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }
        if bytes[..8] != SIGNATURE {
            return Err(EmbroideryError::malformed("bad container signature"));
        }

        let mut r = Cursor::new(&bytes[24..HEADER_SIZE]);
        let minor_version = r.read_u16::<LittleEndian>()?;
        let major_version = r.read_u16::<LittleEndian>()?;
        let byte_order = r.read_u16::<LittleEndian>()?;
        let sector_shift = r.read_u16::<LittleEndian>()?;
        let mini_sector_shift = r.read_u16::<LittleEndian>()?;
        let mut reserved = [0u8; 6];
        std::io::Read::read_exact(&mut r, &mut reserved)?;
        let directory_sector_count = r.read_u32::<LittleEndian>()?;
        let fat_sector_count = r.read_u32::<LittleEndian>()?;
        let first_directory_sector = r.read_u32::<LittleEndian>()?;
        let transaction_signature = r.read_u32::<LittleEndian>()?;
        let mini_stream_cutoff = r.read_u32::<LittleEndian>()?;
        let first_mini_fat_sector = r.read_u32::<LittleEndian>()?;
        let mini_fat_sector_count = r.read_u32::<LittleEndian>()?;
        let first_difat_sector = r.read_u32::<LittleEndian>()?;
        let difat_sector_count = r.read_u32::<LittleEndian>()?;
        let mut difat = Vec::with_capacity(HEADER_DIFAT_SLOTS);
        for _ in 0..HEADER_DIFAT_SLOTS {
            difat.push(r.read_u32::<LittleEndian>()?);
        }

        if byte_order != BYTE_ORDER_MARK {
            return Err(EmbroideryError::malformed(format!("bad byte order mark {:#06x}", byte_order)));
        }
        match (major_version, sector_shift) {
            (3, 9) | (4, 12) => {}
            _ => {
                return Err(EmbroideryError::malformed(format!(
                    "version {} with sector shift {} is not supported",
                    major_version, sector_shift
                )));
            }
        }
        if mini_sector_shift != MINI_SECTOR_SHIFT {
            return Err(EmbroideryError::malformed(format!(
                "mini sector shift {} (expected {})",
                mini_sector_shift, MINI_SECTOR_SHIFT
            )));
        }
        if mini_stream_cutoff != MINI_STREAM_CUTOFF {
            return Err(EmbroideryError::malformed(format!(
                "mini stream cutoff {} (expected {})",
                mini_stream_cutoff, MINI_STREAM_CUTOFF
            )));
        }
        if major_version == 3 && directory_sector_count != 0 {
            return Err(EmbroideryError::malformed("version 3 header declares directory sectors"));
        }
        if first_directory_sector == ENDOFCHAIN || !is_regular(first_directory_sector) {
            return Err(EmbroideryError::malformed("container has no directory"));
        }
        if fat_sector_count as usize > HEADER_DIFAT_SLOTS && difat_sector_count == 0 {
            return Err(EmbroideryError::malformed(format!(
                "{} FAT sectors need a DIFAT chain but none is declared",
                fat_sector_count
            )));
        }

        Ok(Header {
            minor_version,
            major_version,
            sector_shift,
            mini_sector_shift,
            directory_sector_count,
            fat_sector_count,
            first_directory_sector,
            transaction_signature,
            mini_stream_cutoff,
            first_mini_fat_sector,
            mini_fat_sector_count,
            first_difat_sector,
            difat_sector_count,
            difat,
        })
    }

    /// Write the header padded to one full sector
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(&[0u8; 16]);
        out.write_u16::<LittleEndian>(self.minor_version)?;
        out.write_u16::<LittleEndian>(self.major_version)?;
        out.write_u16::<LittleEndian>(BYTE_ORDER_MARK)?;
        out.write_u16::<LittleEndian>(self.sector_shift)?;
        out.write_u16::<LittleEndian>(self.mini_sector_shift)?;
        out.extend_from_slice(&[0u8; 6]);
        out.write_u32::<LittleEndian>(self.directory_sector_count)?;
        out.write_u32::<LittleEndian>(self.fat_sector_count)?;
        out.write_u32::<LittleEndian>(self.first_directory_sector)?;
        out.write_u32::<LittleEndian>(self.transaction_signature)?;
        out.write_u32::<LittleEndian>(self.mini_stream_cutoff)?;
        out.write_u32::<LittleEndian>(self.first_mini_fat_sector)?;
        out.write_u32::<LittleEndian>(self.mini_fat_sector_count)?;
        out.write_u32::<LittleEndian>(self.first_difat_sector)?;
        out.write_u32::<LittleEndian>(self.difat_sector_count)?;
        for i in 0..HEADER_DIFAT_SLOTS {
            out.write_u32::<LittleEndian>(self.difat.get(i).copied().unwrap_or(FREESECT))?;
        }
        out.resize(start + self.sector_size(), 0);
        Ok(())
    }
}
