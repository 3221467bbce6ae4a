//! Sector identifiers and sector addressing

use crate::error::{EmbroideryError, Result};

/// Container signature at offset 0
pub const SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Largest regular sector id
pub const MAXREGSECT: u32 = 0xFFFF_FFFA;
/// Sector holds DIFAT entries
pub const DIFSECT: u32 = 0xFFFF_FFFC;
/// Sector holds FAT entries
pub const FATSECT: u32 = 0xFFFF_FFFD;
/// Last sector of a chain
pub const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
/// Unallocated sector
pub const FREESECT: u32 = 0xFFFF_FFFF;
/// No directory entry
pub const NOSTREAM: u32 = 0xFFFF_FFFF;

/// Size of the header structure (the first sector is padded to the sector size)
pub const HEADER_SIZE: usize = 512;
pub const HEADER_DIFAT_SLOTS: usize = 109;
pub const DIRECTORY_ENTRY_SIZE: usize = 128;
pub const MINI_SECTOR_SHIFT: u16 = 6;
pub const MINI_SECTOR_SIZE: usize = 1 << MINI_SECTOR_SHIFT;
/// Streams shorter than this live in the mini stream. Fixed by the layout;
/// readers apply it whatever the header says, so it is never configurable.
pub const MINI_STREAM_CUTOFF: u32 = 4096;

/// Sector ids stored per FAT sector
pub fn ids_per_sector(sector_size: usize) -> usize {
    sector_size / 4
}

/// Number of `unit`-sized pieces needed for `len` bytes
pub fn div_ceil(len: usize, unit: usize) -> usize {
    if unit == 0 {
        0
    } else {
        len.div_ceil(unit)
    }
}

/// Regular sector ids are below [`MAXREGSECT`]
pub fn is_regular(id: u32) -> bool {
    id <= MAXREGSECT
}

/// Read-only view of a container image as numbered sectors
#[derive(Debug, Clone, Copy)]
pub struct SectorView<'a> {
    data: &'a [u8],
    sector_size: usize,
}

impl<'a> SectorView<'a> {
    /// View over a whole container image, header sector included
    pub fn new(data: &'a [u8], sector_size: usize) -> Self {
        SectorView { data, sector_size }
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Sectors present after the header sector (a partial last sector counts)
    pub fn sector_count(&self) -> usize {
        div_ceil(self.data.len().saturating_sub(self.sector_size), self.sector_size)
    }

    /// Bytes of sector `id`
    pub fn sector(&self, id: u32) -> Result<&'a [u8]> {
        if !is_regular(id) || id as usize >= self.sector_count() {
            return Err(EmbroideryError::malformed(format!(
                "sector {:#x} outside the {} sectors of the file",
                id,
                self.sector_count()
            )));
        }
        let start = (id as usize + 1) * self.sector_size;
        let end = start + self.sector_size;
        if end > self.data.len() {
            return Err(EmbroideryError::truncated(format!(
                "sector {} ends at {} but the file has {} bytes",
                id,
                end,
                self.data.len()
            )));
        }
        Ok(&self.data[start..end])
    }
}
