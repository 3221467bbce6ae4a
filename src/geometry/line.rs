//! Line segment primitive

use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// A straight segment between two points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Line {
    pub start: Vector2,
    pub end: Vector2,
}

impl Line {
    pub fn new(start: Vector2, end: Vector2) -> Self {
        Line { start, end }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Line::new(Vector2::new(x1, y1), Vector2::new(x2, y2))
    }

    pub fn length(&self) -> f64 {
        self.start.distance(&self.end)
    }

    pub fn midpoint(&self) -> Vector2 {
        self.start.lerp(&self.end, 0.5)
    }
}

impl Shape for Line {
    fn bounds(&self) -> Option<BoundingBox2D> {
        BoundingBox2D::from_points(&[self.start, self.end])
    }

    fn transform(&mut self, transform: &Transform) {
        self.start = transform.apply(self.start);
        self.end = transform.apply(self.end);
    }

    fn flatten(&self, _tolerance: f64) -> Vec<Vector2> {
        vec![self.start, self.end]
    }

    fn is_finite(&self) -> bool {
        self.start.is_finite() && self.end.is_finite()
    }

    fn shape_type(&self) -> &'static str {
        "LINE"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_metrics() {
        let line = Line::from_coords(0.0, 0.0, 30.0, 40.0);
        assert_eq!(line.length(), 50.0);
        assert_eq!(line.midpoint(), Vector2::new(15.0, 20.0));
        let b = line.bounds().unwrap();
        assert_eq!(b.max, Vector2::new(30.0, 40.0));
    }
}
