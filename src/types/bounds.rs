//! Axis-aligned extents of stitches and geometry

use super::Vector2;
use std::fmt;

/// Axis-aligned box in pattern units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox2D {
    pub min: Vector2,
    pub max: Vector2,
}

impl BoundingBox2D {
    pub fn new(min: Vector2, max: Vector2) -> Self {
        BoundingBox2D { min, max }
    }

    /// Degenerate box around one point
    pub fn from_point(point: Vector2) -> Self {
        BoundingBox2D::new(point, point)
    }

    /// Smallest box holding every point; `None` for an empty slice
    pub fn from_points(points: &[Vector2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(BoundingBox2D::from_point(*first), |mut bbox, p| {
            bbox.expand_to_include(*p);
            bbox
        }))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Largest absolute coordinate on either axis
    pub fn reach(&self) -> f64 {
        [self.min.x, self.min.y, self.max.x, self.max.y]
            .into_iter()
            .fold(0.0f64, |m, v| m.max(v.abs()))
    }

    pub fn expand_to_include(&mut self, point: Vector2) {
        self.min = Vector2::new(self.min.x.min(point.x), self.min.y.min(point.y));
        self.max = Vector2::new(self.max.x.max(point.x), self.max.y.max(point.y));
    }

    pub fn merge(&self, other: &BoundingBox2D) -> BoundingBox2D {
        let mut merged = *self;
        merged.expand_to_include(other.min);
        merged.expand_to_include(other.max);
        merged
    }

    /// Fold helper for optional extents (empty blocks, unbounded geometry)
    pub fn union(a: Option<BoundingBox2D>, b: Option<BoundingBox2D>) -> Option<BoundingBox2D> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.merge(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

impl fmt::Display for BoundingBox2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extents_of_stitch_points() {
        let stitches = [Vector2::new(0.0, 0.0), Vector2::new(120.0, 45.0), Vector2::new(-30.0, 10.0)];
        let bbox = BoundingBox2D::from_points(&stitches).unwrap();
        assert_eq!(bbox.min, Vector2::new(-30.0, 0.0));
        assert_eq!(bbox.max, Vector2::new(120.0, 45.0));
        assert_eq!(bbox.width(), 150.0);
        assert_eq!(bbox.height(), 45.0);
        assert!(BoundingBox2D::from_points(&[]).is_none());
    }

    #[test]
    fn test_reach() {
        let bbox = BoundingBox2D::new(Vector2::new(-250.0, 3.0), Vector2::new(100.0, 40.0));
        assert_eq!(bbox.reach(), 250.0);
        assert_eq!(BoundingBox2D::from_point(Vector2::ZERO).reach(), 0.0);
    }

    #[test]
    fn test_union_skips_missing_extents() {
        let a = BoundingBox2D::from_point(Vector2::new(1.0, 1.0));
        let b = BoundingBox2D::from_point(Vector2::new(-1.0, 4.0));
        let u = BoundingBox2D::union(Some(a), Some(b)).unwrap();
        assert_eq!(u.min, Vector2::new(-1.0, 1.0));
        assert_eq!(u.max, Vector2::new(1.0, 4.0));
        assert_eq!(BoundingBox2D::union(None, Some(a)), Some(a));
        assert_eq!(BoundingBox2D::union(None, None), None);
    }
}
