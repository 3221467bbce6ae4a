//! Serializing a container image
//!
//! Sector layout, in file order: regular stream data, the mini stream, the
//! mini FAT, the directory, the FAT, then the DIFAT sectors. Sibling entries
//! are written as a balanced binary tree ordered by [`compare_names`], all
//! nodes black.

use super::allocation::AllocationTable;
use super::directory::{compare_names, DirectoryEntry, EntryType};
use super::header::Header;
use super::sector::*;
use super::{CompoundFile, NodeKind, ROOT};
use crate::error::{EmbroideryError, Result};
use byteorder::{LittleEndian, WriteBytesExt};

enum Placement {
    Empty,
    Mini(u32),
    Regular(u32),
}

/// Build the container image for `file`
pub fn serialize(file: &CompoundFile) -> Result<Vec<u8>> {
    let config = *file.config();
    config.validate()?;
    let sector_size = config.sector_size;
    let per_sector = ids_per_sector(sector_size);
    let nodes = file.nodes();

    let mut entries = nodes
        .iter()
        .map(|node| {
            let entry_type = match node.kind {
                NodeKind::Root => EntryType::Root,
                NodeKind::Storage => EntryType::Storage,
                NodeKind::Stream => EntryType::Stream,
            };
            let mut entry = DirectoryEntry::new(node.name.clone(), entry_type);
            entry.clsid = node.clsid;
            entry
        })
        .collect::<Vec<_>>();

    for (index, node) in nodes.iter().enumerate() {
        if node.kind == NodeKind::Stream {
            continue;
        }
        let mut children = node.children.clone();
        children.sort_by(|&a, &b| compare_names(&nodes[a].name, &nodes[b].name));
        entries[index].child = link_balanced(&children, &mut entries);
    }

    // Mini stream and mini FAT
    let mut mini_fat = AllocationTable::new();
    let mut mini_stream = Vec::new();
    let mut placements = Vec::with_capacity(nodes.len());
    for node in nodes {
        let placement = if node.kind != NodeKind::Stream || node.data.is_empty() {
            Placement::Empty
        } else if (node.data.len() as u64) < MINI_STREAM_CUTOFF as u64 {
            let start = mini_fat.push_chain(div_ceil(node.data.len(), MINI_SECTOR_SIZE));
            mini_stream.extend_from_slice(&node.data);
            mini_stream.resize(div_ceil(mini_stream.len(), MINI_SECTOR_SIZE) * MINI_SECTOR_SIZE, 0);
            Placement::Mini(start)
        } else {
            Placement::Regular(0)
        };
        placements.push(placement);
    }
    if !mini_fat.is_empty() {
        mini_fat.pad_to(per_sector);
    }

    // Regular sectors
    let mut fat = AllocationTable::new();
    for (placement, node) in placements.iter_mut().zip(nodes) {
        if let Placement::Regular(start) = placement {
            *start = fat.push_chain(div_ceil(node.data.len(), sector_size));
        }
    }
    let mini_stream_start = fat.push_chain(div_ceil(mini_stream.len(), sector_size));
    let mini_fat_sectors = mini_fat.len() / per_sector;
    let mini_fat_start = fat.push_chain(mini_fat_sectors);
    let entries_per_sector = sector_size / DIRECTORY_ENTRY_SIZE;
    let directory_sectors = div_ceil(entries.len(), entries_per_sector);
    let directory_start = fat.push_chain(directory_sectors);

    let (fat_sectors, difat_sectors) = fat_layout(fat.len(), per_sector);
    let fat_start = fat.push_marked(fat_sectors, FATSECT);
    let difat_start = fat.push_marked(difat_sectors, DIFSECT);
    fat.pad_to(per_sector);

    for ((entry, node), placement) in entries.iter_mut().zip(nodes).zip(&placements) {
        match *placement {
            Placement::Empty => {
                if node.kind == NodeKind::Stream {
                    entry.start_sector = ENDOFCHAIN;
                }
            }
            Placement::Mini(start) | Placement::Regular(start) => {
                entry.start_sector = start;
                entry.size = node.data.len() as u64;
            }
        }
    }
    entries[ROOT].start_sector = mini_stream_start;
    entries[ROOT].size = mini_stream.len() as u64;

    let mut header = Header::new(sector_size);
    header.fat_sector_count = fat_sectors as u32;
    header.first_directory_sector = directory_start;
    if config.major_version() == 4 {
        header.directory_sector_count = directory_sectors as u32;
    }
    header.first_mini_fat_sector = mini_fat_start;
    header.mini_fat_sector_count = mini_fat_sectors as u32;
    let fat_ids: Vec<u32> = (0..fat_sectors as u32).map(|i| fat_start + i).collect();
    for (slot, &id) in header.difat.iter_mut().zip(&fat_ids) {
        *slot = id;
    }
    if difat_sectors > 0 {
        header.first_difat_sector = difat_start;
        header.difat_sector_count = difat_sectors as u32;
    }

    let total_sectors = fat.len().min(difat_start as usize + difat_sectors);
    let mut out = Vec::with_capacity((total_sectors + 1) * sector_size);
    header.write_to(&mut out)?;

    for (placement, node) in placements.iter().zip(nodes) {
        if let Placement::Regular(_) = placement {
            write_padded(&mut out, &node.data, sector_size);
        }
    }
    write_padded(&mut out, &mini_stream, sector_size);
    write_padded(&mut out, &mini_fat.to_bytes(), sector_size);

    let mut directory = Vec::with_capacity(directory_sectors * sector_size);
    for entry in &entries {
        entry.write_to(&mut directory)?;
    }
    while directory.len() < directory_sectors * sector_size {
        DirectoryEntry::unused().write_to(&mut directory)?;
    }
    out.extend_from_slice(&directory);

    out.extend_from_slice(&fat.to_bytes());

    let overflow = fat_ids.get(HEADER_DIFAT_SLOTS..).unwrap_or(&[]);
    for (i, chunk) in overflow.chunks(per_sector - 1).enumerate() {
        for &id in chunk {
            out.write_u32::<LittleEndian>(id)?;
        }
        for _ in chunk.len()..per_sector - 1 {
            out.write_u32::<LittleEndian>(FREESECT)?;
        }
        let next = if i + 1 < difat_sectors { difat_start + i as u32 + 1 } else { ENDOFCHAIN };
        out.write_u32::<LittleEndian>(next)?;
    }

    let expected = (1 + difat_start as usize + difat_sectors) * sector_size;
    if out.len() != expected {
        return Err(EmbroideryError::malformed(format!(
            "serialized {} bytes, layout expects {}",
            out.len(),
            expected
        )));
    }

    tracing::debug!(
        bytes = out.len(),
        entries = entries.len(),
        fat_sectors,
        difat_sectors,
        "serialized compound container"
    );
    Ok(out)
}

/// Link `sorted` as a balanced tree through left/right and return its root
fn link_balanced(sorted: &[usize], entries: &mut [DirectoryEntry]) -> u32 {
    if sorted.is_empty() {
        return NOSTREAM;
    }
    let mid = sorted.len() / 2;
    let left = link_balanced(&sorted[..mid], entries);
    let right = link_balanced(&sorted[mid + 1..], entries);
    let root = sorted[mid];
    entries[root].left = left;
    entries[root].right = right;
    root as u32
}

/// FAT and DIFAT sector counts for `used` allocated sectors.
///
/// The FAT must also cover its own sectors and the DIFAT sectors, so the
/// counts are grown until they stop changing.
fn fat_layout(used: usize, per_sector: usize) -> (usize, usize) {
    let mut fat_sectors = 0;
    loop {
        let difat_sectors = if fat_sectors > HEADER_DIFAT_SLOTS {
            div_ceil(fat_sectors - HEADER_DIFAT_SLOTS, per_sector - 1)
        } else {
            0
        };
        let needed = div_ceil(used + fat_sectors + difat_sectors, per_sector);
        if needed <= fat_sectors {
            return (fat_sectors, difat_sectors);
        }
        fat_sectors = needed;
    }
}

fn write_padded(out: &mut Vec<u8>, data: &[u8], sector_size: usize) {
    out.extend_from_slice(data);
    out.resize(out.len() + (sector_size - data.len() % sector_size) % sector_size, 0);
}
