//! Infinite construction line

use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// A construction line through `base_point`, infinite in both directions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfiniteLine {
    pub base_point: Vector2,
    /// Unit direction
    pub direction: Vector2,
}

impl InfiniteLine {
    pub fn new(base_point: Vector2, direction: Vector2) -> Self {
        InfiniteLine {
            base_point,
            direction: direction.normalize(),
        }
    }

    pub fn point_at(&self, t: f64) -> Vector2 {
        self.base_point + self.direction * t
    }

    /// Perpendicular distance from `point` to the line
    pub fn distance_to(&self, point: Vector2) -> f64 {
        (point - self.base_point).cross(&self.direction).abs()
    }
}

impl Default for InfiniteLine {
    fn default() -> Self {
        InfiniteLine::new(Vector2::ZERO, Vector2::UNIT_X)
    }
}

impl Shape for InfiniteLine {
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
        "INFINITE_LINE"
    }
}
