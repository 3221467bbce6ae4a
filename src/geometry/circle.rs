//! Circle primitive

use super::flatten::arc_segments;
use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};
use std::f64::consts::{PI, TAU};

/// A full circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vector2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Vector2, radius: f64) -> Self {
        Circle { center, radius }
    }

    pub fn from_coords(x: f64, y: f64, radius: f64) -> Self {
        Circle::new(Vector2::new(x, y), radius)
    }

    pub fn diameter(&self) -> f64 {
        self.radius * 2.0
    }

    pub fn circumference(&self) -> f64 {
        2.0 * PI * self.radius
    }

    pub fn area(&self) -> f64 {
        PI * self.radius * self.radius
    }
}

impl Default for Circle {
    fn default() -> Self {
        Circle::new(Vector2::ZERO, 1.0)
    }
}

impl Shape for Circle {
    fn bounds(&self) -> Option<BoundingBox2D> {
        let r = Vector2::new(self.radius.abs(), self.radius.abs());
        Some(BoundingBox2D::new(self.center - r, self.center + r))
    }

    fn transform(&mut self, transform: &Transform) {
        self.center = transform.apply(self.center);
        self.radius *= transform.scale_factor();
    }

    /// Closed polyline starting at angle 0; the last point repeats the first.
    fn flatten(&self, tolerance: f64) -> Vec<Vector2> {
        let n = arc_segments(self.radius, TAU, tolerance).max(3);
        let mut points: Vec<Vector2> = (0..n)
            .map(|i| Vector2::polar(self.center, self.radius, TAU * i as f64 / n as f64))
            .collect();
        points.push(points[0]);
        points
    }

    fn is_finite(&self) -> bool {
        self.center.is_finite() && self.radius.is_finite()
    }

    fn shape_type(&self) -> &'static str {
        "CIRCLE"
    }
}
