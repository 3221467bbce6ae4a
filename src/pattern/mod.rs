//! The canonical pattern model.
//!
//! Every format adapter loads into a [`Pattern`] and saves from one. The
//! model is plain data plus a small editing surface; it performs no I/O.

pub mod block;
pub mod layer;
pub mod thread;

pub use block::{Block, BlockKind, StitchRun, StitchType};
pub use layer::{Layer, LayerFlags, DEFAULT_LAYER_NAME};
pub use thread::Thread;

use crate::error::{EmbroideryError, Result};
use crate::geometry::{Dimension, Geometry, Path, Shape};
use crate::types::{BoundingBox2D, Transform, Vector2};
use indexmap::IndexMap;
use std::fmt;

/// Display unit preference; coordinates are always stored in 0.1 mm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Millimeters,
    Inches,
}

impl Units {
    /// Pattern units (0.1 mm) per display unit
    pub fn pattern_units_per_unit(&self) -> f64 {
        match self {
            Units::Millimeters => 10.0,
            Units::Inches => 254.0,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Units::Millimeters => write!(f, "mm"),
            Units::Inches => write!(f, "in"),
        }
    }
}

/// Embroidery hoop size in pattern units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hoop {
    pub width: f64,
    pub height: f64,
}

impl Hoop {
    pub fn new(width: f64, height: f64) -> Self {
        Hoop { width, height }
    }

    /// Hoop size in millimetres
    pub fn from_mm(width: f64, height: f64) -> Self {
        Hoop::new(width * 10.0, height * 10.0)
    }

    /// Design bounds fit when centered in the hoop
    pub fn fits(&self, bounds: &BoundingBox2D) -> bool {
        bounds.width() <= self.width && bounds.height() <= self.height
    }
}

impl fmt::Display for Hoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} mm", self.width / 10.0, self.height / 10.0)
    }
}

/// Root aggregate of the model: layers, threads and pattern-level metadata
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pattern {
    pub name: String,
    pub hoop: Option<Hoop>,
    pub units: Units,
    /// Threads in color-change order; blocks refer to them by index
    pub threads: Vec<Thread>,
    /// Layers in sewing order
    pub layers: Vec<Layer>,
    /// Format header fields kept for re-saving
    pub metadata: IndexMap<String, String>,
}

impl Pattern {
    /// Create an empty pattern (no layers, no threads)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Pattern {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a layer and return its index
    pub fn add_layer(&mut self, name: impl Into<String>) -> usize {
        self.layers.push(Layer::new(name));
        self.layers.len() - 1
    }

    /// Append a thread and return its index
    pub fn add_thread(&mut self, thread: Thread) -> usize {
        self.threads.push(thread);
        self.threads.len() - 1
    }

    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    /// Find a layer by name (case-insensitive)
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name.eq_ignore_ascii_case(name))
    }

    fn layer_or_err(&mut self, layer: usize) -> Result<&mut Layer> {
        let count = self.layers.len();
        self.layers.get_mut(layer).ok_or_else(|| {
            EmbroideryError::InvalidGeometry(format!("layer {} out of range ({} layers)", layer, count))
        })
    }

    /// Thread of the last block in `layer`, or thread 0
    pub fn current_thread(&self, layer: usize) -> usize {
        self.layers
            .get(layer)
            .and_then(|l| l.blocks.last())
            .map_or(0, |b| b.thread_index)
    }

    /// Append a stitch point with the layer's current thread.
    ///
    /// The point extends the last block when it is a stitch run of the same
    /// type, otherwise it starts a new block.
    pub fn add_stitch(&mut self, layer: usize, point: Vector2, stitch_type: StitchType) -> Result<()> {
        let thread = self.current_thread(layer);
        self.add_stitch_with_thread(layer, thread, point, stitch_type)
    }

    /// Last stitch point of `layer`, or the origin
    pub fn last_stitch_point(&self, layer: usize) -> Vector2 {
        self.layers
            .get(layer)
            .and_then(|l| {
                l.blocks
                    .iter()
                    .rev()
                    .find_map(|b| b.as_stitches().and_then(|run| run.points.last().copied()))
            })
            .unwrap_or(Vector2::ZERO)
    }

    /// Append a stitch `delta` away from the layer's last stitch point
    pub fn add_stitch_rel(&mut self, layer: usize, delta: Vector2, stitch_type: StitchType) -> Result<()> {
        let point = self.last_stitch_point(layer) + delta;
        self.add_stitch(layer, point, stitch_type)
    }

    /// Append a stitch point sewn with `thread_index`
    pub fn add_stitch_with_thread(
        &mut self,
        layer: usize,
        thread_index: usize,
        point: Vector2,
        stitch_type: StitchType,
    ) -> Result<()> {
        let layer = self.layer_or_err(layer)?;
        if let Some(Block {
            thread_index: t,
            kind: BlockKind::Stitches(run),
        }) = layer.blocks.last_mut()
        {
            if *t == thread_index && run.stitch_type == stitch_type {
                run.points.push(point);
                return Ok(());
            }
        }
        layer
            .blocks
            .push(Block::stitches(thread_index, stitch_type, vec![point]));
        Ok(())
    }

    /// Append a whole block to a layer
    pub fn add_block(&mut self, layer: usize, block: Block) -> Result<()> {
        self.layer_or_err(layer)?.blocks.push(block);
        Ok(())
    }

    /// Append a geometry item; consecutive items with one thread share a block
    pub fn add_geometry(&mut self, layer: usize, thread_index: usize, geometry: impl Into<Geometry>) -> Result<()> {
        let geometry = geometry.into();
        let layer = self.layer_or_err(layer)?;
        if let Some(Block {
            thread_index: t,
            kind: BlockKind::Geometry(items),
        }) = layer.blocks.last_mut()
        {
            if *t == thread_index {
                items.push(geometry);
                return Ok(());
            }
        }
        layer.blocks.push(Block::geometry(thread_index, vec![geometry]));
        Ok(())
    }

    pub fn add_dimension(&mut self, layer: usize, dimension: Dimension) -> Result<()> {
        self.layer_or_err(layer)?.dimensions.push(dimension);
        Ok(())
    }

    /// Extents of all blocks; dimensions and construction lines are excluded
    pub fn bounds(&self) -> Option<BoundingBox2D> {
        self.layers
            .iter()
            .fold(None, |acc, l| BoundingBox2D::union(acc, l.bounds()))
    }

    /// Total points in all stitch runs
    pub fn stitch_count(&self) -> usize {
        self.blocks().map(Block::point_count).sum()
    }

    /// All blocks of all layers in sewing order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.layers.iter().flat_map(|l| l.blocks.iter())
    }

    /// Pattern contains no blocks and no dimensions
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Layer::is_empty)
    }

    /// Apply a transform to every block and dimension
    pub fn transform(&mut self, transform: &Transform) {
        for layer in &mut self.layers {
            layer.transform(transform);
        }
    }

    /// Copy of the pattern with every geometry block replaced by stitches.
    ///
    /// Each flattened run becomes a single-point jump to its start followed
    /// by a normal run through the remaining points. Construction geometry
    /// produces nothing.
    pub fn flattened(&self, tolerance: f64) -> Result<Pattern> {
        self.validate()?;
        let mut out = Pattern {
            layers: Vec::with_capacity(self.layers.len()),
            ..self.clone_header()
        };
        for layer in &self.layers {
            let mut flat = Layer {
                name: layer.name.clone(),
                flags: layer.flags,
                blocks: Vec::with_capacity(layer.blocks.len()),
                dimensions: layer.dimensions.clone(),
            };
            for block in &layer.blocks {
                match &block.kind {
                    BlockKind::Stitches(_) => flat.blocks.push(block.clone()),
                    BlockKind::Geometry(items) => {
                        for run in items.iter().flat_map(|g| g.flatten_runs(tolerance)) {
                            flat.blocks.extend(run_to_blocks(block.thread_index, run));
                        }
                    }
                }
            }
            out.layers.push(flat);
        }
        Ok(out)
    }

    /// Copy of the pattern with normal stitch runs turned into paths.
    ///
    /// Each run becomes a polyline starting where the needle was before the
    /// run, so the jump leading into it is dropped. Trim and stop blocks and
    /// existing geometry are kept. [`Pattern::flattened`] turns the paths
    /// back into jump plus normal runs.
    pub fn stitches_to_paths(&self) -> Result<Pattern> {
        self.validate()?;
        let mut out = Pattern {
            layers: Vec::with_capacity(self.layers.len()),
            ..self.clone_header()
        };
        for layer in &self.layers {
            let mut traced = Layer {
                name: layer.name.clone(),
                flags: layer.flags,
                blocks: Vec::with_capacity(layer.blocks.len()),
                dimensions: layer.dimensions.clone(),
            };
            let mut needle: Option<Vector2> = None;
            for block in &layer.blocks {
                let Some(run) = block.as_stitches() else {
                    traced.blocks.push(block.clone());
                    continue;
                };
                match run.stitch_type {
                    StitchType::Normal => {
                        if let Some(path) = run_to_path(needle, &run.points) {
                            push_path(&mut traced.blocks, block.thread_index, path);
                        }
                    }
                    StitchType::Jump => {}
                    _ => traced.blocks.push(block.clone()),
                }
                needle = run.points.last().copied().or(needle);
            }
            out.layers.push(traced);
        }
        Ok(out)
    }

    fn clone_header(&self) -> Pattern {
        Pattern {
            name: self.name.clone(),
            hoop: self.hoop,
            units: self.units,
            threads: self.threads.clone(),
            layers: Vec::new(),
            metadata: self.metadata.clone(),
        }
    }

    /// Check the model invariants.
    ///
    /// Every block's thread index must refer to a thread, every coordinate
    /// must be finite and every layer must be named.
    pub fn validate(&self) -> Result<()> {
        for (li, layer) in self.layers.iter().enumerate() {
            if layer.name.is_empty() {
                return Err(EmbroideryError::InvalidGeometry(format!("layer {} has no name", li)));
            }
            for (bi, block) in layer.blocks.iter().enumerate() {
                if block.thread_index >= self.threads.len() {
                    return Err(EmbroideryError::InvalidGeometry(format!(
                        "layer '{}' block {} uses thread {} but the pattern has {} threads",
                        layer.name,
                        bi,
                        block.thread_index,
                        self.threads.len()
                    )));
                }
                if !block.is_finite() {
                    return Err(EmbroideryError::InvalidGeometry(format!(
                        "layer '{}' block {} has non-finite coordinates",
                        layer.name, bi
                    )));
                }
            }
            if let Some(di) = layer.dimensions.iter().position(|d| !d.is_finite()) {
                return Err(EmbroideryError::InvalidGeometry(format!(
                    "layer '{}' dimension {} has non-finite coordinates",
                    layer.name, di
                )));
            }
        }
        if let Some(hoop) = &self.hoop {
            if !(hoop.width.is_finite() && hoop.height.is_finite()) || hoop.width < 0.0 || hoop.height < 0.0 {
                return Err(EmbroideryError::InvalidGeometry(format!("invalid hoop size {}", hoop)));
            }
        }
        Ok(())
    }
}

fn run_to_path(start: Option<Vector2>, points: &[Vector2]) -> Option<Path> {
    let (&first, rest) = points.split_first()?;
    let (from, rest) = match start {
        Some(from) => (from, points),
        None => (first, rest),
    };
    if rest.is_empty() {
        return None;
    }
    Some(rest.iter().fold(Path::new().move_to(from), |path, &p| path.line_to(p)))
}

fn push_path(blocks: &mut Vec<Block>, thread_index: usize, path: Path) {
    if let Some(Block {
        thread_index: t,
        kind: BlockKind::Geometry(items),
    }) = blocks.last_mut()
    {
        if *t == thread_index {
            items.push(path.into());
            return;
        }
    }
    blocks.push(Block::geometry(thread_index, vec![path.into()]));
}

fn run_to_blocks(thread_index: usize, run: Vec<Vector2>) -> Vec<Block> {
    let Some(&start) = run.first() else {
        return Vec::new();
    };
    let rest = if run.len() > 1 { run[1..].to_vec() } else { vec![start] };
    vec![
        Block::stitches(thread_index, StitchType::Jump, vec![start]),
        Block::stitches(thread_index, StitchType::Normal, rest),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Circle, InfiniteLine, Line};
    use crate::types::Rgb;

    fn red_square() -> Pattern {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(Thread::new(Rgb::RED));
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)] {
            p.add_stitch(layer, Vector2::new(x, y), StitchType::Normal).unwrap();
        }
        p
    }

    #[test]
    fn test_new_is_empty() {
        let p = Pattern::new();
        assert!(p.layers.is_empty());
        assert!(p.is_empty());
        assert!(p.bounds().is_none());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_add_stitch_extends_block() {
        let mut p = red_square();
        assert_eq!(p.layers[0].blocks.len(), 1);
        p.add_stitch(0, Vector2::new(20.0, 20.0), StitchType::Jump).unwrap();
        p.add_stitch(0, Vector2::new(25.0, 20.0), StitchType::Normal).unwrap();
        assert_eq!(p.layers[0].blocks.len(), 3);
        assert_eq!(p.stitch_count(), 5);
    }

    #[test]
    fn test_add_stitch_bad_layer() {
        let mut p = Pattern::new();
        let err = p.add_stitch(0, Vector2::ZERO, StitchType::Normal).unwrap_err();
        assert!(matches!(err, EmbroideryError::InvalidGeometry(_)));
    }

    #[test]
    fn test_validate_thread_index() {
        let mut p = red_square();
        p.add_stitch_with_thread(0, 3, Vector2::ZERO, StitchType::Normal).unwrap();
        assert!(matches!(p.validate(), Err(EmbroideryError::InvalidGeometry(_))));
    }

    #[test]
    fn test_validate_non_finite() {
        let mut p = red_square();
        p.add_stitch(0, Vector2::new(f64::INFINITY, 0.0), StitchType::Normal).unwrap();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_bounds_ignore_construction_and_dimensions() {
        let mut p = red_square();
        p.add_geometry(0, 0, InfiniteLine::new(Vector2::ZERO, Vector2::UNIT_Y)).unwrap();
        p.add_dimension(0, Dimension::radius(Vector2::new(500.0, 500.0), Vector2::new(600.0, 500.0)))
            .unwrap();
        let b = p.bounds().unwrap();
        assert_eq!(b.max, Vector2::new(10.0, 10.0));
    }

    #[test]
    fn test_add_geometry_groups_by_thread() {
        let mut p = red_square();
        p.add_thread(Thread::new(Rgb::BLACK));
        p.add_geometry(0, 1, Line::from_coords(0.0, 0.0, 1.0, 1.0)).unwrap();
        p.add_geometry(0, 1, Line::from_coords(1.0, 1.0, 2.0, 2.0)).unwrap();
        p.add_geometry(0, 0, Line::from_coords(2.0, 2.0, 3.0, 3.0)).unwrap();
        assert_eq!(p.layers[0].blocks.len(), 3);
        assert_eq!(p.layers[0].blocks[1].as_geometry().map(<[Geometry]>::len), Some(2));
    }

    #[test]
    fn test_add_stitch_rel() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(Thread::new(Rgb::RED));
        p.add_stitch_rel(layer, Vector2::new(5.0, 5.0), StitchType::Jump).unwrap();
        p.add_stitch_rel(layer, Vector2::new(10.0, 0.0), StitchType::Normal).unwrap();
        p.add_stitch_rel(layer, Vector2::new(0.0, -20.0), StitchType::Normal).unwrap();
        let points: Vec<Vector2> = p.blocks().flat_map(|b| b.as_stitches().unwrap().points.clone()).collect();
        assert_eq!(
            points,
            vec![Vector2::new(5.0, 5.0), Vector2::new(15.0, 5.0), Vector2::new(15.0, -15.0)]
        );
        assert!(p.add_stitch_rel(4, Vector2::ZERO, StitchType::Normal).is_err());
    }

    #[test]
    fn test_stitch_rel_after_geometry_uses_last_stitch() {
        let mut p = red_square();
        p.add_geometry(0, 0, Line::from_coords(100.0, 100.0, 200.0, 200.0)).unwrap();
        p.add_stitch_rel(0, Vector2::new(1.0, 1.0), StitchType::Normal).unwrap();
        let last = p.layers[0].blocks.last().unwrap().as_stitches().unwrap();
        assert_eq!(last.points, vec![Vector2::new(11.0, 11.0)]);
    }

    #[test]
    fn test_stitches_to_paths() {
        let mut p = red_square();
        p.add_thread(Thread::new(Rgb::BLACK));
        p.add_stitch_with_thread(0, 1, Vector2::new(50.0, 0.0), StitchType::Jump).unwrap();
        p.add_stitch_with_thread(0, 1, Vector2::new(60.0, 0.0), StitchType::Normal).unwrap();
        p.add_stitch_with_thread(0, 1, Vector2::new(60.0, 10.0), StitchType::Trim).unwrap();

        let traced = p.stitches_to_paths().unwrap();
        let blocks = &traced.layers[0].blocks;
        assert_eq!(blocks.len(), 3);
        let square = Path::new()
            .move_to(Vector2::new(0.0, 0.0))
            .line_to(Vector2::new(10.0, 0.0))
            .line_to(Vector2::new(10.0, 10.0));
        assert_eq!(blocks[0].as_geometry(), Some(&[Geometry::Path(square)][..]));
        let hop = Path::new().move_to(Vector2::new(50.0, 0.0)).line_to(Vector2::new(60.0, 0.0));
        assert_eq!(blocks[1].thread_index, 1);
        assert_eq!(blocks[1].as_geometry(), Some(&[Geometry::Path(hop)][..]));
        assert_eq!(blocks[2].as_stitches().map(|r| r.stitch_type), Some(StitchType::Trim));
    }

    #[test]
    fn test_paths_flatten_back_to_stitches() {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(Thread::new(Rgb::RED));
        p.add_stitch(layer, Vector2::new(5.0, 0.0), StitchType::Jump).unwrap();
        for (x, y) in [(15.0, 0.0), (15.0, 10.0), (5.0, 10.0)] {
            p.add_stitch(layer, Vector2::new(x, y), StitchType::Normal).unwrap();
        }
        let back = p.stitches_to_paths().unwrap().flattened(0.5).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_flattened_replaces_geometry() {
        let mut p = red_square();
        p.add_geometry(0, 0, Circle::from_coords(0.0, 0.0, 50.0)).unwrap();
        let flat = p.flattened(0.5).unwrap();
        assert!(flat.blocks().all(|b| !b.is_geometry()));
        let jump = flat.layers[0].blocks[1].as_stitches().unwrap();
        assert_eq!(jump.stitch_type, StitchType::Jump);
        assert_eq!(jump.points, vec![Vector2::new(50.0, 0.0)]);
        assert_eq!(flat, p.flattened(0.5).unwrap());
    }
}
