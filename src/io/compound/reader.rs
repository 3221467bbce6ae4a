//! Opening a container image
//!
//! The whole structure is validated up front: header fields, the DIFAT and
//! FAT, every chain (range and cycles), the directory tree (each entry is
//! reached at most once) and the stream sizes against their chains.

use super::allocation::{read_chain, read_difat, read_fat, read_ids, AllocationTable};
use super::directory::{DirectoryEntry, EntryType};
use super::header::Header;
use super::sector::*;
use super::{CompoundFile, ContainerConfig, Node, NodeKind, ROOT_NAME};
use crate::error::{EmbroideryError, Result};
use ahash::AHashSet;

struct Context<'a> {
    view: SectorView<'a>,
    fat: AllocationTable,
    sector_limit: usize,
    mini_fat: AllocationTable,
    mini_stream: Vec<u8>,
}

/// Parse a container image into the in-memory arena
pub fn open(bytes: &[u8]) -> Result<CompoundFile> {
    let header = Header::parse(bytes)?;
    let sector_size = header.sector_size();
    if bytes.len() < sector_size {
        return Err(EmbroideryError::truncated(format!(
            "header sector needs {} bytes, got {}",
            sector_size,
            bytes.len()
        )));
    }
    let view = SectorView::new(bytes, sector_size);

    let fat_sectors = read_difat(&view, &header)?;
    let fat = read_fat(&view, &fat_sectors)?;
    let sector_limit = view.sector_count().min(fat.len());

    let directory_chain = fat.chain(header.first_directory_sector, sector_limit, "directory")?;
    if header.major_version == 4
        && header.directory_sector_count != 0
        && header.directory_sector_count as usize != directory_chain.len()
    {
        return Err(EmbroideryError::malformed(format!(
            "header declares {} directory sectors, chain has {}",
            header.directory_sector_count,
            directory_chain.len()
        )));
    }
    let directory_bytes = read_chain(&view, &directory_chain, None)?;
    let entries = directory_bytes
        .chunks_exact(DIRECTORY_ENTRY_SIZE)
        .map(|chunk| DirectoryEntry::parse(chunk, header.major_version))
        .collect::<Result<Vec<_>>>()?;

    let root = match entries.first() {
        Some(e) if e.entry_type == EntryType::Root => e,
        _ => return Err(EmbroideryError::malformed("directory entry 0 is not the root")),
    };

    let mini_fat = if header.first_mini_fat_sector == ENDOFCHAIN {
        if header.mini_fat_sector_count != 0 {
            return Err(EmbroideryError::malformed("mini FAT sectors declared without a chain"));
        }
        AllocationTable::new()
    } else {
        let chain = fat.chain(header.first_mini_fat_sector, sector_limit, "mini FAT")?;
        if chain.len() != header.mini_fat_sector_count as usize {
            return Err(EmbroideryError::malformed(format!(
                "header declares {} mini FAT sectors, chain has {}",
                header.mini_fat_sector_count,
                chain.len()
            )));
        }
        AllocationTable::from_entries(read_ids(&read_chain(&view, &chain, None)?))
    };

    let mini_stream = if root.size == 0 {
        Vec::new()
    } else {
        let size = checked_size(root.size, bytes.len(), ROOT_NAME)?;
        let chain = fat.chain(root.start_sector, sector_limit, "mini stream")?;
        check_chain_length(chain.len(), size, sector_size, ROOT_NAME)?;
        read_chain(&view, &chain, Some(size))?
    };

    let ctx = Context {
        view,
        fat,
        sector_limit,
        mini_fat,
        mini_stream,
    };

    let mut nodes = vec![Node {
        name: ROOT_NAME.to_string(),
        kind: NodeKind::Root,
        children: Vec::new(),
        data: Vec::new(),
        clsid: root.clsid,
    }];

    // (first sibling entry, parent node)
    let mut pending = vec![(root.child, 0usize)];
    let mut visited = AHashSet::new();
    visited.insert(0u32);
    while let Some((first, parent)) = pending.pop() {
        for index in siblings_in_order(&entries, first, &mut visited)? {
            let entry = &entries[index as usize];
            let node_index = nodes.len();
            let node = match entry.entry_type {
                EntryType::Storage => {
                    pending.push((entry.child, node_index));
                    Node {
                        name: entry.name.clone(),
                        kind: NodeKind::Storage,
                        children: Vec::new(),
                        data: Vec::new(),
                        clsid: entry.clsid,
                    }
                }
                EntryType::Stream => Node {
                    name: entry.name.clone(),
                    kind: NodeKind::Stream,
                    children: Vec::new(),
                    data: read_stream_data(&ctx, entry, bytes.len())?,
                    clsid: entry.clsid,
                },
                EntryType::Root | EntryType::Unused => {
                    return Err(EmbroideryError::malformed(format!(
                        "directory entry {} of type {:?} linked into the tree",
                        index, entry.entry_type
                    )));
                }
            };
            nodes.push(node);
            nodes[parent].children.push(node_index);
        }
    }

    tracing::debug!(
        version = header.major_version,
        entries = entries.len(),
        nodes = nodes.len(),
        "opened compound container"
    );

    Ok(CompoundFile::from_parts(nodes, ContainerConfig { sector_size }))
}

/// In-order walk of one sibling tree. Every entry id may be reached once
/// across the whole directory.
fn siblings_in_order(entries: &[DirectoryEntry], first: u32, visited: &mut AHashSet<u32>) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    let mut stack = Vec::new();
    let mut current = first;
    loop {
        while current != NOSTREAM {
            if current as usize >= entries.len() {
                return Err(EmbroideryError::malformed(format!(
                    "directory link {} outside {} entries",
                    current,
                    entries.len()
                )));
            }
            if !visited.insert(current) {
                return Err(EmbroideryError::malformed(format!("directory entry {} reached twice", current)));
            }
            stack.push(current);
            current = entries[current as usize].left;
        }
        match stack.pop() {
            Some(index) => {
                out.push(index);
                current = entries[index as usize].right;
            }
            None => break,
        }
    }
    Ok(out)
}

fn checked_size(size: u64, file_len: usize, name: &str) -> Result<usize> {
    usize::try_from(size).ok().filter(|&s| s <= file_len).ok_or_else(|| {
        EmbroideryError::malformed(format!("'{}' declares {} bytes in a {} byte file", name, size, file_len))
    })
}

fn check_chain_length(chain_len: usize, size: usize, unit: usize, name: &str) -> Result<()> {
    let expected = div_ceil(size, unit);
    if chain_len != expected {
        return Err(EmbroideryError::malformed(format!(
            "'{}' has {} bytes but a chain of {} sectors (expected {})",
            name, size, chain_len, expected
        )));
    }
    Ok(())
}

fn read_stream_data(ctx: &Context<'_>, entry: &DirectoryEntry, file_len: usize) -> Result<Vec<u8>> {
    if entry.size == 0 {
        return Ok(Vec::new());
    }
    let size = checked_size(entry.size, file_len, &entry.name)?;

    if entry.size < MINI_STREAM_CUTOFF as u64 {
        let limit = div_ceil(ctx.mini_stream.len(), MINI_SECTOR_SIZE);
        let chain = ctx.mini_fat.chain(entry.start_sector, limit, "mini stream sector")?;
        check_chain_length(chain.len(), size, MINI_SECTOR_SIZE, &entry.name)?;
        let mut data = Vec::with_capacity(chain.len() * MINI_SECTOR_SIZE);
        for id in chain {
            let start = id as usize * MINI_SECTOR_SIZE;
            let end = (start + MINI_SECTOR_SIZE).min(ctx.mini_stream.len());
            data.extend_from_slice(&ctx.mini_stream[start..end]);
        }
        if data.len() < size {
            return Err(EmbroideryError::truncated(format!(
                "'{}' needs {} bytes, mini stream holds {}",
                entry.name,
                size,
                data.len()
            )));
        }
        data.truncate(size);
        Ok(data)
    } else {
        let chain = ctx.fat.chain(entry.start_sector, ctx.sector_limit, &entry.name)?;
        check_chain_length(chain.len(), size, ctx.view.sector_size(), &entry.name)?;
        read_chain(&ctx.view, &chain, Some(size))
    }
}
