//! Bézier curve primitive

use super::flatten::polynomial_segments;
use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// A Bézier curve of any degree (`control_points.len() - 1`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bezier {
    pub control_points: Vec<Vector2>,
}

impl Bezier {
    pub fn new(control_points: Vec<Vector2>) -> Self {
        Bezier { control_points }
    }

    /// Cubic curve from its four control points
    pub fn cubic(p0: Vector2, p1: Vector2, p2: Vector2, p3: Vector2) -> Self {
        Bezier::new(vec![p0, p1, p2, p3])
    }

    /// Quadratic curve from its three control points
    pub fn quadratic(p0: Vector2, p1: Vector2, p2: Vector2) -> Self {
        Bezier::new(vec![p0, p1, p2])
    }

    pub fn degree(&self) -> usize {
        self.control_points.len().saturating_sub(1)
    }

    /// Evaluate with de Casteljau's algorithm
    pub fn point_at(&self, t: f64) -> Option<Vector2> {
        let mut work = self.control_points.clone();
        if work.is_empty() {
            return None;
        }
        for level in (1..work.len()).rev() {
            for i in 0..level {
                work[i] = work[i].lerp(&work[i + 1], t);
            }
        }
        Some(work[0])
    }
}

impl Shape for Bezier {
    /// Control polygon extents (the curve lies within its convex hull)
    fn bounds(&self) -> Option<BoundingBox2D> {
        BoundingBox2D::from_points(&self.control_points)
    }

    fn transform(&mut self, transform: &Transform) {
        for p in &mut self.control_points {
            *p = transform.apply(*p);
        }
    }

    fn flatten(&self, tolerance: f64) -> Vec<Vector2> {
        match self.control_points.len() {
            0 => Vec::new(),
            1 => vec![self.control_points[0]],
            _ => {
                let n = polynomial_segments(&self.control_points, self.degree(), tolerance);
                let last = self.control_points[self.control_points.len() - 1];
                let mut points: Vec<Vector2> = (0..n)
                    .filter_map(|i| self.point_at(i as f64 / n as f64))
                    .collect();
                points.push(last);
                points
            }
        }
    }

    fn is_finite(&self) -> bool {
        self.control_points.iter().all(Vector2::is_finite)
    }

    fn shape_type(&self) -> &'static str {
        "BEZIER"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bezier {
        Bezier::cubic(
            Vector2::new(0.0, 0.0),
            Vector2::new(0.0, 100.0),
            Vector2::new(100.0, 100.0),
            Vector2::new(100.0, 0.0),
        )
    }

    #[test]
    fn test_endpoints_interpolated() {
        let b = sample();
        assert_eq!(b.point_at(0.0), Some(Vector2::new(0.0, 0.0)));
        assert_eq!(b.point_at(1.0), Some(Vector2::new(100.0, 0.0)));
        assert_eq!(b.point_at(0.5), Some(Vector2::new(50.0, 75.0)));
    }

    #[test]
    fn test_flatten_within_tolerance() {
        let b = sample();
        let pts = b.flatten(0.5);
        assert_eq!(pts.first(), Some(&Vector2::new(0.0, 0.0)));
        assert_eq!(pts.last(), Some(&Vector2::new(100.0, 0.0)));
        // Check the midpoint of every chord against the curve.
        let n = pts.len() - 1;
        for i in 0..n {
            let t_mid = (i as f64 + 0.5) / n as f64;
            let on_curve = b.point_at(t_mid).unwrap();
            let chord_mid = pts[i].lerp(&pts[i + 1], 0.5);
            assert!(on_curve.distance(&chord_mid) <= 0.5 + 1e-9);
        }
    }

    #[test]
    fn test_flatten_deterministic() {
        assert_eq!(sample().flatten(0.3), sample().flatten(0.3));
    }
}
