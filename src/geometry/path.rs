//! Compound path primitive made of line and curve segments

use super::bezier::Bezier;
use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// One drawing command of a [`Path`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    /// Start a new subpath
    MoveTo(Vector2),
    LineTo(Vector2),
    /// Quadratic curve: control point, end point
    QuadTo(Vector2, Vector2),
    /// Cubic curve: two control points, end point
    CubicTo(Vector2, Vector2, Vector2),
    /// Return to the start of the current subpath
    Close,
}

impl PathSegment {
    fn points_mut(&mut self) -> Vec<&mut Vector2> {
        match self {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => vec![p],
            PathSegment::QuadTo(c, p) => vec![c, p],
            PathSegment::CubicTo(c1, c2, p) => vec![c1, c2, p],
            PathSegment::Close => Vec::new(),
        }
    }

    fn points(&self) -> Vec<Vector2> {
        match *self {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => vec![p],
            PathSegment::QuadTo(c, p) => vec![c, p],
            PathSegment::CubicTo(c1, c2, p) => vec![c1, c2, p],
            PathSegment::Close => Vec::new(),
        }
    }
}

/// An outline built from segments; each `MoveTo` starts a separate run
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn move_to(mut self, p: Vector2) -> Self {
        self.segments.push(PathSegment::MoveTo(p));
        self
    }

    pub fn line_to(mut self, p: Vector2) -> Self {
        self.segments.push(PathSegment::LineTo(p));
        self
    }

    pub fn quad_to(mut self, control: Vector2, p: Vector2) -> Self {
        self.segments.push(PathSegment::QuadTo(control, p));
        self
    }

    pub fn cubic_to(mut self, c1: Vector2, c2: Vector2, p: Vector2) -> Self {
        self.segments.push(PathSegment::CubicTo(c1, c2, p));
        self
    }

    pub fn close(mut self) -> Self {
        self.segments.push(PathSegment::Close);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Shape for Path {
    fn bounds(&self) -> Option<BoundingBox2D> {
        let points: Vec<Vector2> = self.segments.iter().flat_map(PathSegment::points).collect();
        BoundingBox2D::from_points(&points)
    }

    fn transform(&mut self, transform: &Transform) {
        for segment in &mut self.segments {
            for p in segment.points_mut() {
                *p = transform.apply(*p);
            }
        }
    }

    /// All subpaths joined into one polyline
    fn flatten(&self, tolerance: f64) -> Vec<Vector2> {
        self.flatten_runs(tolerance).into_iter().flatten().collect()
    }

    fn flatten_runs(&self, tolerance: f64) -> Vec<Vec<Vector2>> {
        let mut runs = Vec::new();
        let mut current: Vec<Vector2> = Vec::new();
        let mut start = Vector2::ZERO;
        let mut cursor = Vector2::ZERO;

        for segment in &self.segments {
            match *segment {
                PathSegment::MoveTo(p) => {
                    if current.len() > 1 {
                        runs.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(p);
                    start = p;
                    cursor = p;
                }
                PathSegment::LineTo(p) => {
                    if current.is_empty() {
                        current.push(cursor);
                    }
                    current.push(p);
                    cursor = p;
                }
                PathSegment::QuadTo(c, p) => {
                    if current.is_empty() {
                        current.push(cursor);
                    }
                    let curve = Bezier::quadratic(cursor, c, p);
                    current.extend(curve.flatten(tolerance).into_iter().skip(1));
                    cursor = p;
                }
                PathSegment::CubicTo(c1, c2, p) => {
                    if current.is_empty() {
                        current.push(cursor);
                    }
                    let curve = Bezier::cubic(cursor, c1, c2, p);
                    current.extend(curve.flatten(tolerance).into_iter().skip(1));
                    cursor = p;
                }
                PathSegment::Close => {
                    if current.len() > 1 && cursor != start {
                        current.push(start);
                    }
                    cursor = start;
                }
            }
        }
        if current.len() > 1 {
            runs.push(current);
        }
        runs
    }

    fn is_finite(&self) -> bool {
        self.segments
            .iter()
            .flat_map(PathSegment::points)
            .all(|p| p.is_finite())
    }

    fn shape_type(&self) -> &'static str {
        "PATH"
    }
}
