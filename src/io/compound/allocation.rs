//! Sector allocation tables: FAT, mini FAT and the DIFAT chain

use super::header::Header;
use super::sector::*;
use crate::error::{EmbroideryError, Result};
use ahash::AHashSet;
use byteorder::{ByteOrder, LittleEndian};

/// A next-sector table (the FAT, or the mini FAT for mini sectors)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationTable {
    entries: Vec<u32>,
}

impl AllocationTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table over entries already read from disk
    pub fn from_entries(entries: Vec<u32>) -> Self {
        AllocationTable { entries }
    }

    /// Number of sector slots, free ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no sectors are tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw next-sector ids, indexed by sector id
    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    /// Next sector after `id`, or `None` past the end of the table
    pub fn get(&self, id: u32) -> Option<u32> {
        self.entries.get(id as usize).copied()
    }

    /// Append a contiguous chain of `count` sectors and return its start
    pub fn push_chain(&mut self, count: usize) -> u32 {
        if count == 0 {
            return ENDOFCHAIN;
        }
        let start = self.entries.len() as u32;
        for i in 1..count {
            self.entries.push(start + i as u32);
        }
        self.entries.push(ENDOFCHAIN);
        start
    }

    /// Mark `count` sectors with a special id (FATSECT, DIFSECT)
    pub fn push_marked(&mut self, count: usize, marker: u32) -> u32 {
        let start = self.entries.len() as u32;
        self.entries.extend(std::iter::repeat(marker).take(count));
        start
    }

    /// Pad with free sectors to a multiple of `per_sector` entries
    pub fn pad_to(&mut self, per_sector: usize) {
        let target = div_ceil(self.entries.len(), per_sector) * per_sector;
        self.entries.resize(target, FREESECT);
    }

    /// Sector ids of the chain starting at `start`.
    ///
    /// Every id must be below `limit`; the chain must end with ENDOFCHAIN and
    /// never revisit a sector.
    pub fn chain(&self, start: u32, limit: usize, what: &str) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        let mut seen = AHashSet::new();
        let mut current = start;
        while current != ENDOFCHAIN {
            if !is_regular(current) || current as usize >= limit {
                return Err(EmbroideryError::malformed(format!(
                    "{} chain refers to sector {:#x} (limit {})",
                    what, current, limit
                )));
            }
            if !seen.insert(current) {
                return Err(EmbroideryError::malformed(format!(
                    "{} chain revisits sector {}",
                    what, current
                )));
            }
            ids.push(current);
            current = self.get(current).ok_or_else(|| {
                EmbroideryError::malformed(format!("{} sector {} has no allocation entry", what, current))
            })?;
        }
        Ok(ids)
    }

    /// Little-endian bytes of the table
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.entries.len() * 4];
        LittleEndian::write_u32_into(&self.entries, &mut out);
        out
    }
}

/// Decode a run of little-endian u32 values
pub fn read_ids(bytes: &[u8]) -> Vec<u32> {
    let mut ids = vec![0u32; bytes.len() / 4];
    LittleEndian::read_u32_into(&bytes[..ids.len() * 4], &mut ids);
    ids
}

/// Sector ids of the FAT sectors, from the header slots and the DIFAT chain
pub fn read_difat(view: &SectorView<'_>, header: &Header) -> Result<Vec<u32>> {
    let fat_count = header.fat_sector_count as usize;
    let sector_count = view.sector_count();
    if fat_count > sector_count {
        return Err(EmbroideryError::malformed(format!(
            "{} FAT sectors declared in a file of {} sectors",
            fat_count, sector_count
        )));
    }

    let mut fat_sectors: Vec<u32> = header.difat.iter().copied().take(fat_count.min(HEADER_DIFAT_SLOTS)).collect();

    let per_sector = ids_per_sector(view.sector_size()) - 1;
    let mut seen = AHashSet::new();
    let mut next = header.first_difat_sector;
    let mut remaining = header.difat_sector_count;
    while fat_sectors.len() < fat_count {
        if remaining == 0 || next == ENDOFCHAIN {
            return Err(EmbroideryError::malformed(format!(
                "DIFAT chain ends after {} of {} FAT sectors",
                fat_sectors.len(),
                fat_count
            )));
        }
        if !seen.insert(next) {
            return Err(EmbroideryError::malformed(format!("DIFAT chain revisits sector {}", next)));
        }
        let ids = read_ids(view.sector(next)?);
        let wanted = (fat_count - fat_sectors.len()).min(per_sector);
        fat_sectors.extend_from_slice(&ids[..wanted]);
        next = ids[per_sector];
        remaining -= 1;
    }

    if let Some(bad) = fat_sectors.iter().find(|&&id| !is_regular(id) || id as usize >= sector_count) {
        return Err(EmbroideryError::malformed(format!("FAT sector id {:#x} out of range", bad)));
    }
    Ok(fat_sectors)
}

/// Load the FAT from its sectors
pub fn read_fat(view: &SectorView<'_>, fat_sectors: &[u32]) -> Result<AllocationTable> {
    let mut entries = Vec::with_capacity(fat_sectors.len() * ids_per_sector(view.sector_size()));
    for &id in fat_sectors {
        entries.extend(read_ids(view.sector(id)?));
    }
    Ok(AllocationTable::from_entries(entries))
}

/// Concatenate the sectors of a chain, cut to `size` bytes when given
pub fn read_chain(view: &SectorView<'_>, chain: &[u32], size: Option<usize>) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(chain.len() * view.sector_size());
    for &id in chain {
        out.extend_from_slice(view.sector(id)?);
    }
    if let Some(size) = size {
        out.truncate(size);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_chain() {
        let mut fat = AllocationTable::new();
        assert_eq!(fat.push_chain(3), 0);
        assert_eq!(fat.push_chain(0), ENDOFCHAIN);
        assert_eq!(fat.push_chain(1), 3);
        assert_eq!(fat.entries(), &[1, 2, ENDOFCHAIN, ENDOFCHAIN]);
        assert_eq!(fat.chain(0, 10, "test").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_detected() {
        let fat = AllocationTable::from_entries(vec![1, 2, 0]);
        let err = fat.chain(0, 3, "stream").unwrap_err();
        assert!(matches!(err, EmbroideryError::MalformedContainer(_)));
    }

    #[test]
    fn test_out_of_range() {
        let fat = AllocationTable::from_entries(vec![7, ENDOFCHAIN]);
        assert!(fat.chain(0, 2, "stream").is_err());
        assert!(fat.chain(FREESECT, 2, "stream").is_err());
    }

    #[test]
    fn test_pad_and_bytes() {
        let mut fat = AllocationTable::new();
        fat.push_chain(1);
        fat.push_marked(1, FATSECT);
        fat.pad_to(4);
        assert_eq!(fat.len(), 4);
        assert_eq!(read_ids(&fat.to_bytes()), vec![ENDOFCHAIN, FATSECT, FREESECT, FREESECT]);
    }
}
