//! Compound container engine.
//!
//! Reads and writes sector-based structured-storage containers (the MS-CFB
//! layout): a header, a FAT of next-sector links, an optional DIFAT chain
//! once the FAT outgrows the header slots, a directory of 128-byte entries
//! forming a tree of storages and streams, and a mini stream for short
//! streams addressed through the mini FAT.
//!
//! An opened container is fully validated and copied into an in-memory
//! arena of [`Node`]s; nothing is decoded lazily from the source bytes.
//!
//! # Module Structure
//!
//! - [`sector`] - sector ids, sizes and the sector view over a file image
//! - [`header`] - the 512-byte header
//! - [`allocation`] - FAT/mini FAT tables, chain walking, DIFAT
//! - [`directory`] - directory entries and sibling name ordering
//! - [`reader`] - `open` and its validation
//! - [`writer`] - `serialize`

pub mod allocation;
pub mod directory;
pub mod header;
pub mod reader;
pub mod sector;
pub mod writer;

use crate::error::{EmbroideryError, Result};
use directory::{names_match, validate_name};

/// Container layout settings used when creating a container.
///
/// The mini stream cutoff is not a setting: every container is written with
/// the fixed [`sector::MINI_STREAM_CUTOFF`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerConfig {
    /// 512 (version 3) or 4096 (version 4)
    pub sector_size: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        ContainerConfig { sector_size: 512 }
    }
}

impl ContainerConfig {
    /// Version 4 layout with 4096-byte sectors
    pub fn version4() -> Self {
        ContainerConfig { sector_size: 4096 }
    }

    /// Header major version for the sector size: 4 for 4096-byte sectors,
    /// otherwise 3
    pub fn major_version(&self) -> u16 {
        if self.sector_size == 4096 {
            4
        } else {
            3
        }
    }

    /// Check the settings before a container is created or written
    pub fn validate(&self) -> Result<()> {
        if self.sector_size != 512 && self.sector_size != 4096 {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "sector size {} (must be 512 or 4096)",
                self.sector_size
            )));
        }
        Ok(())
    }
}

/// Kind of an arena node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Storage,
    Stream,
}

/// A storage or stream in the container tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Child node indices (storages and the root only)
    pub children: Vec<usize>,
    /// Stream content (streams only)
    pub data: Vec<u8>,
    pub clsid: [u8; 16],
}

impl Node {
    fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Node {
            name: name.into(),
            kind,
            children: Vec::new(),
            data: Vec::new(),
            clsid: [0; 16],
        }
    }
}

/// Index of the root node in the arena
pub const ROOT: usize = 0;

/// Name of the root entry
pub const ROOT_NAME: &str = "Root Entry";

/// An in-memory compound container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundFile {
    nodes: Vec<Node>,
    config: ContainerConfig,
}

impl CompoundFile {
    /// Create an empty container
    pub fn create(config: ContainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(CompoundFile {
            nodes: vec![Node::new(ROOT_NAME, NodeKind::Root)],
            config,
        })
    }

    /// Open and validate a container image
    pub fn open(bytes: &[u8]) -> Result<Self> {
        reader::open(bytes)
    }

    /// Serialize to a container image
    pub fn serialize(&self) -> Result<Vec<u8>> {
        writer::serialize(self)
    }

    /// Layout the container was created with, or read from an opened header
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// The arena; index [`ROOT`] is the root entry
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Node at an arena index
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Slash-separated paths of all streams, in tree order
    pub fn list_streams(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, String)> = vec![(ROOT, String::new())];
        while let Some((index, prefix)) = stack.pop() {
            let node = &self.nodes[index];
            match node.kind {
                NodeKind::Stream => out.push(prefix),
                NodeKind::Root | NodeKind::Storage => {
                    for &child in node.children.iter().rev() {
                        let name = &self.nodes[child].name;
                        let path = if prefix.is_empty() {
                            name.clone()
                        } else {
                            format!("{}/{}", prefix, name)
                        };
                        stack.push((child, path));
                    }
                }
            }
        }
        out
    }

    fn find_child(&self, parent: usize, name: &str) -> Option<usize> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| names_match(&self.nodes[c].name, name))
    }

    /// Node index for a slash-separated path
    pub fn find(&self, path: &str) -> Option<usize> {
        path.split('/')
            .filter(|p| !p.is_empty())
            .try_fold(ROOT, |node, part| self.find_child(node, part))
    }

    /// Whether a storage or stream exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Content of the stream at `path`
    pub fn read_stream(&self, path: &str) -> Result<&[u8]> {
        match self.find(path).map(|i| &self.nodes[i]) {
            Some(node) if node.kind == NodeKind::Stream => Ok(&node.data),
            _ => Err(EmbroideryError::StreamNotFound(path.to_string())),
        }
    }

    /// Create or replace the stream at `path`, creating storages on the way
    pub fn write_stream(&mut self, path: &str, bytes: &[u8]) -> Result<()> {
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some((leaf, storages)) = parts.split_last() else {
            return Err(EmbroideryError::UnsupportedFeature("empty stream path".into()));
        };
        for part in &parts {
            validate_name(part)?;
        }
        if self.config.major_version() == 3 && bytes.len() as u64 > u32::MAX as u64 {
            return Err(EmbroideryError::UnsupportedFeature(format!(
                "stream '{}' is too large for 512-byte sector containers",
                path
            )));
        }

        let mut parent = ROOT;
        for &storage in storages {
            parent = match self.find_child(parent, storage) {
                Some(i) if self.nodes[i].kind == NodeKind::Storage => i,
                Some(_) => {
                    return Err(EmbroideryError::UnsupportedFeature(format!(
                        "'{}' in '{}' is a stream, not a storage",
                        storage, path
                    )));
                }
                None => self.add_node(parent, Node::new(storage, NodeKind::Storage)),
            };
        }

        match self.find_child(parent, leaf) {
            Some(i) if self.nodes[i].kind == NodeKind::Stream => {
                self.nodes[i].data = bytes.to_vec();
            }
            Some(_) => {
                return Err(EmbroideryError::UnsupportedFeature(format!(
                    "'{}' is a storage, not a stream",
                    path
                )));
            }
            None => {
                let mut node = Node::new(*leaf, NodeKind::Stream);
                node.data = bytes.to_vec();
                self.add_node(parent, node);
            }
        }
        Ok(())
    }

    fn add_node(&mut self, parent: usize, node: Node) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    pub(crate) fn from_parts(nodes: Vec<Node>, config: ContainerConfig) -> Self {
        CompoundFile { nodes, config }
    }
}
