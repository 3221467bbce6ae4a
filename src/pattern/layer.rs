//! Pattern layers

use super::block::Block;
use crate::geometry::Dimension;
use crate::types::{BoundingBox2D, Transform};
use bitflags::bitflags;

bitflags! {
    /// Layer state flags; stored and reported, never enforced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerFlags: u8 {
        /// Layer is shown
        const VISIBLE = 0x1;
        /// Layer is protected from editing
        const LOCKED = 0x2;
    }
}

impl Default for LayerFlags {
    fn default() -> Self {
        LayerFlags::VISIBLE
    }
}

/// Name of the single layer stitch-only formats load into
pub const DEFAULT_LAYER_NAME: &str = "0";

/// A named, ordered collection of blocks and dimension annotations
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Layer name
    pub name: String,
    /// Layer flags
    pub flags: LayerFlags,
    /// Blocks in sewing order
    pub blocks: Vec<Block>,
    /// Dimension annotations
    pub dimensions: Vec<Dimension>,
}

impl Layer {
    /// Create a new empty, visible layer
    pub fn new(name: impl Into<String>) -> Self {
        Layer {
            name: name.into(),
            flags: LayerFlags::default(),
            blocks: Vec::new(),
            dimensions: Vec::new(),
        }
    }

    /// Create the standard "0" layer
    pub fn layer_0() -> Self {
        Self::new(DEFAULT_LAYER_NAME)
    }

    /// Set the layer as locked
    pub fn lock(&mut self) {
        self.flags.insert(LayerFlags::LOCKED);
    }

    /// Set the layer as unlocked
    pub fn unlock(&mut self) {
        self.flags.remove(LayerFlags::LOCKED);
    }

    /// Check if the layer is locked
    pub fn is_locked(&self) -> bool {
        self.flags.contains(LayerFlags::LOCKED)
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.flags.set(LayerFlags::VISIBLE, visible);
    }

    /// Check if the layer is visible
    pub fn is_visible(&self) -> bool {
        self.flags.contains(LayerFlags::VISIBLE)
    }

    /// Layer holds neither blocks nor dimensions
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.dimensions.is_empty()
    }

    /// Extents of the layer's blocks (dimensions excluded)
    pub fn bounds(&self) -> Option<BoundingBox2D> {
        self.blocks
            .iter()
            .fold(None, |acc, b| BoundingBox2D::union(acc, b.bounds()))
    }

    pub fn transform(&mut self, transform: &Transform) {
        for block in &mut self.blocks {
            block.transform(transform);
        }
        for dim in &mut self.dimensions {
            dim.transform(transform);
        }
    }
}

impl Default for Layer {
    fn default() -> Self {
        Self::layer_0()
    }
}
