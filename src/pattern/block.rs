//! Blocks: the ordered content units of a layer

use crate::geometry::{Geometry, Shape};
use crate::types::{BoundingBox2D, Transform, Vector2};
use std::fmt;

/// Machine meaning of the points in a [`StitchRun`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StitchType {
    /// Needle penetrations
    #[default]
    Normal,
    /// Moves without stitching
    Jump,
    /// Thread cut followed by moves
    Trim,
    /// Machine pause
    Stop,
    /// Explicit thread change marker
    ColorChange,
    /// End of design
    End,
}

impl StitchType {
    /// Points of this type put thread into the fabric
    pub fn is_stitch(&self) -> bool {
        matches!(self, StitchType::Normal)
    }

    /// Points of this type only move the frame
    pub fn is_move(&self) -> bool {
        !self.is_stitch()
    }
}

impl fmt::Display for StitchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StitchType::Normal => "normal",
            StitchType::Jump => "jump",
            StitchType::Trim => "trim",
            StitchType::Stop => "stop",
            StitchType::ColorChange => "color change",
            StitchType::End => "end",
        };
        write!(f, "{}", name)
    }
}

/// Consecutive points sharing one stitch type.
///
/// Each point is an absolute position in pattern units; the needle travels
/// from the previous position (the end of the preceding block) to each point
/// in turn.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StitchRun {
    pub stitch_type: StitchType,
    pub points: Vec<Vector2>,
}

impl StitchRun {
    pub fn new(stitch_type: StitchType, points: Vec<Vector2>) -> Self {
        StitchRun { stitch_type, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_point(&self) -> Option<Vector2> {
        self.points.last().copied()
    }
}

/// Content of a block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    Stitches(StitchRun),
    Geometry(Vec<Geometry>),
}

/// A run of stitches or a group of geometry items sewn with one thread
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Index into the pattern's thread list
    pub thread_index: usize,
    pub kind: BlockKind,
}

impl Block {
    /// Create a stitch block
    pub fn stitches(thread_index: usize, stitch_type: StitchType, points: Vec<Vector2>) -> Self {
        Block {
            thread_index,
            kind: BlockKind::Stitches(StitchRun::new(stitch_type, points)),
        }
    }

    /// Create a geometry block
    pub fn geometry(thread_index: usize, items: Vec<Geometry>) -> Self {
        Block {
            thread_index,
            kind: BlockKind::Geometry(items),
        }
    }

    pub fn as_stitches(&self) -> Option<&StitchRun> {
        match &self.kind {
            BlockKind::Stitches(run) => Some(run),
            BlockKind::Geometry(_) => None,
        }
    }

    pub fn as_geometry(&self) -> Option<&[Geometry]> {
        match &self.kind {
            BlockKind::Geometry(items) => Some(items),
            BlockKind::Stitches(_) => None,
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self.kind, BlockKind::Geometry(_))
    }

    /// Number of stitch points (0 for geometry blocks)
    pub fn point_count(&self) -> usize {
        self.as_stitches().map_or(0, StitchRun::len)
    }

    /// Extents of the block content
    pub fn bounds(&self) -> Option<BoundingBox2D> {
        match &self.kind {
            BlockKind::Stitches(run) => BoundingBox2D::from_points(&run.points),
            BlockKind::Geometry(items) => items
                .iter()
                .fold(None, |acc, g| BoundingBox2D::union(acc, g.bounds())),
        }
    }

    pub fn transform(&mut self, transform: &Transform) {
        match &mut self.kind {
            BlockKind::Stitches(run) => {
                for p in &mut run.points {
                    *p = transform.apply(*p);
                }
            }
            BlockKind::Geometry(items) => {
                for g in items {
                    g.transform(transform);
                }
            }
        }
    }

    /// All coordinates are finite
    pub fn is_finite(&self) -> bool {
        match &self.kind {
            BlockKind::Stitches(run) => run.points.iter().all(Vector2::is_finite),
            BlockKind::Geometry(items) => items.iter().all(|g| g.is_finite()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Line, Ray};

    #[test]
    fn test_stitch_block_bounds() {
        let block = Block::stitches(
            0,
            StitchType::Normal,
            vec![Vector2::new(0.0, 0.0), Vector2::new(10.0, -5.0)],
        );
        let b = block.bounds().unwrap();
        assert_eq!(b.min, Vector2::new(0.0, -5.0));
        assert_eq!(block.point_count(), 2);
    }

    #[test]
    fn test_geometry_bounds_skip_construction() {
        let block = Block::geometry(
            1,
            vec![
                Line::from_coords(0.0, 0.0, 5.0, 5.0).into(),
                Ray::new(Vector2::ZERO, Vector2::UNIT_X).into(),
            ],
        );
        let b = block.bounds().unwrap();
        assert_eq!(b.max, Vector2::new(5.0, 5.0));
        assert_eq!(block.point_count(), 0);
    }

    #[test]
    fn test_non_finite_detected() {
        let block = Block::stitches(0, StitchType::Jump, vec![Vector2::new(f64::NAN, 0.0)]);
        assert!(!block.is_finite());
    }
}
