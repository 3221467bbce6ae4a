//! Uniform clamped B-spline primitive

use super::flatten::polynomial_segments;
use super::Shape;
use crate::types::{BoundingBox2D, Transform, Vector2};

/// A clamped B-spline with uniform interior knots.
///
/// The curve starts at the first control point and ends at the last one.
#[derive(Debug, Clone, PartialEq)]
pub struct Spline {
    /// Degree of the spline (typically 3 for cubic)
    pub degree: usize,
    pub control_points: Vec<Vector2>,
}

impl Spline {
    pub fn new(degree: usize, control_points: Vec<Vector2>) -> Self {
        Spline {
            degree,
            control_points,
        }
    }

    /// Degree actually used for evaluation, limited by the number of points
    pub fn effective_degree(&self) -> usize {
        self.degree.max(1).min(self.control_points.len().saturating_sub(1))
    }

    /// Clamped uniform knot vector over `[0, spans]`
    pub fn knots(&self) -> Vec<f64> {
        let p = self.effective_degree();
        let n = self.control_points.len();
        let spans = n.saturating_sub(p).max(1);
        let mut knots = Vec::with_capacity(n + p + 1);
        knots.extend(std::iter::repeat(0.0).take(p + 1));
        knots.extend((1..spans).map(|k| k as f64));
        knots.extend(std::iter::repeat(spans as f64).take(p + 1));
        knots
    }

    /// Number of polynomial spans
    pub fn span_count(&self) -> usize {
        self.control_points
            .len()
            .saturating_sub(self.effective_degree())
            .max(1)
    }

    /// Evaluate at `u` in `[0, span_count]` with de Boor's algorithm
    pub fn point_at(&self, u: f64) -> Option<Vector2> {
        let n = self.control_points.len();
        if n == 0 {
            return None;
        }
        let p = self.effective_degree();
        if p == 0 {
            return Some(self.control_points[0]);
        }
        let knots = self.knots();
        let spans = self.span_count();
        let u = u.clamp(0.0, spans as f64);
        // Knot span index k with knots[k] <= u < knots[k + 1].
        let k = ((u.floor() as usize).min(spans - 1)) + p;

        let mut d: Vec<Vector2> = (0..=p).map(|j| self.control_points[j + k - p]).collect();
        for r in 1..=p {
            for j in (r..=p).rev() {
                let i = j + k - p;
                let denom = knots[i + p + 1 - r] - knots[i];
                let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
                d[j] = d[j - 1].lerp(&d[j], alpha);
            }
        }
        Some(d[p])
    }
}

impl Default for Spline {
    fn default() -> Self {
        Spline::new(3, Vec::new())
    }
}

impl Shape for Spline {
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
        let n = self.control_points.len();
        if n <= 1 {
            return self.control_points.clone();
        }
        let p = self.effective_degree();
        let spans = self.span_count();
        let mut points = Vec::new();
        for span in 0..spans {
            let local = &self.control_points[span..(span + p + 1).min(n)];
            let segments = polynomial_segments(local, p, tolerance);
            for i in 0..segments {
                let u = span as f64 + i as f64 / segments as f64;
                if let Some(point) = self.point_at(u) {
                    points.push(point);
                }
            }
        }
        points.push(self.control_points[n - 1]);
        points
    }

    fn is_finite(&self) -> bool {
        self.control_points.iter().all(Vector2::is_finite)
    }

    fn shape_type(&self) -> &'static str {
        "SPLINE"
    }
}
