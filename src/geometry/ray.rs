//! Semi-infinite construction line

use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// A construction line starting at `base_point` and running along `direction`.
///
/// Rays are drafting aids: they have no bounds and never produce stitches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub base_point: Vector2,
    /// Unit direction
    pub direction: Vector2,
}

impl Ray {
    pub fn new(base_point: Vector2, direction: Vector2) -> Self {
        Ray {
            base_point,
            direction: direction.normalize(),
        }
    }

    /// Point at distance `t` along the ray
    pub fn point_at(&self, t: f64) -> Vector2 {
        self.base_point + self.direction * t.max(0.0)
    }
}

impl Default for Ray {
    fn default() -> Self {
        Ray::new(Vector2::ZERO, Vector2::UNIT_X)
    }
}

impl Shape for Ray {
    fn bounds(&self) -> Option<BoundingBox2D> {
        None
    }

    fn transform(&mut self, transform: &Transform) {
        self.base_point = transform.apply(self.base_point);
        self.direction = transform.apply_direction(self.direction).normalize();
    }

    fn flatten(&self, _tolerance: f64) -> Vec<Vector2> {
        Vec::new()
    }

    fn is_finite(&self) -> bool {
        self.base_point.is_finite() && self.direction.is_finite()
    }

    fn shape_type(&self) -> &'static str {
        "RAY"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_normalized() {
        let ray = Ray::new(Vector2::new(1.0, 1.0), Vector2::new(0.0, 5.0));
        assert_eq!(ray.direction, Vector2::UNIT_Y);
        assert_eq!(ray.point_at(2.0), Vector2::new(1.0, 3.0));
        assert_eq!(ray.point_at(-2.0), Vector2::new(1.0, 1.0));
    }
}
