//! Rectangle primitive

use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// A rectangle anchored at `origin`, rotated counter-clockwise by `rotation`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Vector2,
    pub width: f64,
    pub height: f64,
    /// Rotation about `origin` in radians
    pub rotation: f64,
}

impl Rect {
    pub fn new(origin: Vector2, width: f64, height: f64) -> Self {
        Rect {
            origin,
            width,
            height,
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Corners in counter-clockwise order starting at `origin`
    pub fn corners(&self) -> [Vector2; 4] {
        let u = Vector2::new(self.rotation.cos(), self.rotation.sin());
        let v = u.perpendicular();
        let o = self.origin;
        [
            o,
            o + u * self.width,
            o + u * self.width + v * self.height,
            o + v * self.height,
        ]
    }

    pub fn area(&self) -> f64 {
        (self.width * self.height).abs()
    }
}

impl Shape for Rect {
    fn bounds(&self) -> Option<BoundingBox2D> {
        BoundingBox2D::from_points(&self.corners())
    }

    fn transform(&mut self, transform: &Transform) {
        let [o, a, _, b] = self.corners();
        let o = transform.apply(o);
        let a = transform.apply(a);
        let b = transform.apply(b);
        let u = a - o;
        let v = b - o;
        self.origin = o;
        self.rotation = u.angle();
        self.width = u.length();
        // Height is negative when the far side lies clockwise of the base edge.
        let side = if u.cross(&v) < 0.0 { -1.0 } else { 1.0 };
        self.height = v.length() * side;
    }

    /// Closed outline: four corners plus the first corner again
    fn flatten(&self, _tolerance: f64) -> Vec<Vector2> {
        let c = self.corners();
        vec![c[0], c[1], c[2], c[3], c[0]]
    }

    fn is_finite(&self) -> bool {
        self.origin.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.rotation.is_finite()
    }

    fn shape_type(&self) -> &'static str {
        "RECT"
    }
}
