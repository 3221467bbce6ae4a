//! Ellipse (and elliptical arc) primitive

use super::flatten::arc_segments;
use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};
use std::f64::consts::TAU;

/// An ellipse or elliptical arc
///
/// The curve is `center + major_axis * cos(t) + minor_axis() * sin(t)` for
/// `t` from `start_parameter` to `end_parameter` (counter-clockwise).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center: Vector2,
    /// Vector from the center to the end of the major axis
    pub major_axis: Vector2,
    /// Minor to major axis ratio
    pub minor_axis_ratio: f64,
    pub start_parameter: f64,
    pub end_parameter: f64,
}

impl Ellipse {
    /// Create a full ellipse from center, major axis and axis ratio
    pub fn from_center_axes(center: Vector2, major_axis: Vector2, minor_axis_ratio: f64) -> Self {
        Ellipse {
            center,
            major_axis,
            minor_axis_ratio,
            start_parameter: 0.0,
            end_parameter: TAU,
        }
    }

    pub fn major_radius(&self) -> f64 {
        self.major_axis.length()
    }

    pub fn minor_radius(&self) -> f64 {
        self.major_radius() * self.minor_axis_ratio
    }

    /// Vector from the center to the end of the minor axis
    pub fn minor_axis(&self) -> Vector2 {
        self.major_axis.perpendicular() * self.minor_axis_ratio
    }

    /// Parametric sweep in `(0, 2π]`
    pub fn sweep(&self) -> f64 {
        let sweep = (self.end_parameter - self.start_parameter).rem_euclid(TAU);
        if sweep == 0.0 && self.end_parameter != self.start_parameter {
            TAU
        } else {
            sweep
        }
    }

    pub fn is_full(&self) -> bool {
        (self.sweep() - TAU).abs() < 1e-12
    }

    pub fn point_at(&self, t: f64) -> Vector2 {
        self.center + self.major_axis * t.cos() + self.minor_axis() * t.sin()
    }
}

impl Default for Ellipse {
    fn default() -> Self {
        Ellipse::from_center_axes(Vector2::ZERO, Vector2::UNIT_X, 1.0)
    }
}

impl Shape for Ellipse {
    fn bounds(&self) -> Option<BoundingBox2D> {
        if !self.is_full() {
            return BoundingBox2D::from_points(&self.flatten(super::flatten::MIN_TOLERANCE * 10.0));
        }
        let major = self.major_axis;
        let minor = self.minor_axis();
        let half = Vector2::new(
            (major.x * major.x + minor.x * minor.x).sqrt(),
            (major.y * major.y + minor.y * minor.y).sqrt(),
        );
        Some(BoundingBox2D::new(self.center - half, self.center + half))
    }

    fn transform(&mut self, transform: &Transform) {
        // Non-uniform scaling is approximated: the major axis follows the
        // transform and the axis ratio is kept.
        self.center = transform.apply(self.center);
        self.major_axis = transform.apply_direction(self.major_axis);
        if transform.is_mirroring() {
            let (start, end) = (self.start_parameter, self.end_parameter);
            self.start_parameter = -end;
            self.end_parameter = -start;
        }
    }

    /// The parametric step is chosen for the circle of the major radius; the
    /// affine squeeze onto the ellipse only shortens chord deviations.
    fn flatten(&self, tolerance: f64) -> Vec<Vector2> {
        let sweep = self.sweep();
        let n = arc_segments(self.major_radius(), sweep, tolerance).max(if self.is_full() { 3 } else { 1 });
        let mut points: Vec<Vector2> = (0..=n)
            .map(|i| self.point_at(self.start_parameter + sweep * i as f64 / n as f64))
            .collect();
        if self.is_full() {
            points[n] = points[0];
        }
        points
    }

    fn is_finite(&self) -> bool {
        self.center.is_finite()
            && self.major_axis.is_finite()
            && self.minor_axis_ratio.is_finite()
            && self.start_parameter.is_finite()
            && self.end_parameter.is_finite()
    }

    fn shape_type(&self) -> &'static str {
        "ELLIPSE"
    }
}
