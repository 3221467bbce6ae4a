//! Circular arc primitive

use super::flatten::arc_segments;
use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// A counter-clockwise portion of a circle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    /// Center point of the arc
    pub center: Vector2,
    /// Radius of the arc
    pub radius: f64,
    /// Start angle in radians
    pub start_angle: f64,
    /// End angle in radians
    pub end_angle: f64,
}

impl Arc {
    /// Create a new arc with center, radius, and angles
    pub fn new(center: Vector2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Arc {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }

    /// Create a new arc from coordinates, radius, and angles
    pub fn from_coords(x: f64, y: f64, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Arc::new(Vector2::new(x, y), radius, start_angle, end_angle)
    }

    /// Get the sweep angle (angular extent) in radians, in `(0, 2π]`
    pub fn sweep_angle(&self) -> f64 {
        let sweep = (self.end_angle - self.start_angle).rem_euclid(TAU);
        if sweep == 0.0 && self.end_angle != self.start_angle {
            TAU
        } else {
            sweep
        }
    }

    /// Get the arc length
    pub fn arc_length(&self) -> f64 {
        self.radius * self.sweep_angle()
    }

    /// Point at `angle` on the underlying circle
    pub fn point_at(&self, angle: f64) -> Vector2 {
        Vector2::polar(self.center, self.radius, angle)
    }

    /// Get the start point of the arc
    pub fn start_point(&self) -> Vector2 {
        self.point_at(self.start_angle)
    }

    /// Get the end point of the arc
    pub fn end_point(&self) -> Vector2 {
        self.point_at(self.end_angle)
    }

    /// Get the midpoint of the arc
    pub fn midpoint(&self) -> Vector2 {
        self.point_at(self.start_angle + self.sweep_angle() / 2.0)
    }

    /// Angle lies within the swept range
    pub fn contains_angle(&self, angle: f64) -> bool {
        (angle - self.start_angle).rem_euclid(TAU) <= self.sweep_angle()
    }
}

impl Default for Arc {
    fn default() -> Self {
        Arc::new(Vector2::ZERO, 1.0, 0.0, FRAC_PI_2)
    }
}

impl Shape for Arc {
    fn bounds(&self) -> Option<BoundingBox2D> {
        let mut bbox = BoundingBox2D::from_point(self.start_point());
        bbox.expand_to_include(self.end_point());
        for quadrant in [0.0, FRAC_PI_2, PI, PI + FRAC_PI_2] {
            if self.contains_angle(quadrant) {
                bbox.expand_to_include(self.point_at(quadrant));
            }
        }
        Some(bbox)
    }

    fn transform(&mut self, transform: &Transform) {
        // Non-uniform scaling is approximated by the X axis scale factor.
        let rotation = transform.rotation_angle();
        self.center = transform.apply(self.center);
        self.radius *= transform.scale_factor();
        if transform.is_mirroring() {
            let (start, end) = (self.start_angle, self.end_angle);
            self.start_angle = rotation - end;
            self.end_angle = rotation - start;
        } else {
            self.start_angle += rotation;
            self.end_angle += rotation;
        }
    }

    fn flatten(&self, tolerance: f64) -> Vec<Vector2> {
        let sweep = self.sweep_angle();
        let n = arc_segments(self.radius, sweep, tolerance);
        (0..=n)
            .map(|i| self.point_at(self.start_angle + sweep * i as f64 / n as f64))
            .collect()
    }

    fn is_finite(&self) -> bool {
        self.center.is_finite()
            && self.radius.is_finite()
            && self.start_angle.is_finite()
            && self.end_angle.is_finite()
    }

    fn shape_type(&self) -> &'static str {
        "ARC"
    }
}
