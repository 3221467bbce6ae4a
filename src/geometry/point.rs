//! Point primitive

use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// A single location, stitched as one needle penetration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub location: Vector2,
}

impl Point {
    pub fn new(location: Vector2) -> Self {
        Point { location }
    }

    pub fn from_coords(x: f64, y: f64) -> Self {
        Point::new(Vector2::new(x, y))
    }
}

impl Shape for Point {
    fn bounds(&self) -> Option<BoundingBox2D> {
        Some(BoundingBox2D::from_point(self.location))
    }

    fn transform(&mut self, transform: &Transform) {
        self.location = transform.apply(self.location);
    }

    fn flatten(&self, _tolerance: f64) -> Vec<Vector2> {
        vec![self.location]
    }

    fn is_finite(&self) -> bool {
        self.location.is_finite()
    }

    fn shape_type(&self) -> &'static str {
        "POINT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point() {
        let mut p = Point::from_coords(1.0, 2.0);
        assert_eq!(p.flatten(1.0), vec![Vector2::new(1.0, 2.0)]);
        p.transform(&Transform::from_scale(2.0));
        assert_eq!(p.location, Vector2::new(2.0, 4.0));
    }
}
