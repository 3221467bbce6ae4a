//! Geometry primitives and dimension annotations of the pattern model.
//!
//! The set of primitives is closed: [`Geometry`] is a tagged union over all
//! of them, and each variant implements [`Shape`] for bounds, transforms and
//! flattening to stitch points. Coordinates are pattern units (0.1 mm).

use crate::types::{BoundingBox2D, Transform, Vector2};

pub mod arc;
pub mod bezier;
pub mod circle;
pub mod dimension;
pub mod ellipse;
pub mod flatten;
pub mod infinite_line;
pub mod line;
pub mod path;
pub mod point;
pub mod ray;
pub mod rect;
pub mod spline;

pub use arc::Arc;
pub use bezier::Bezier;
pub use circle::Circle;
pub use dimension::{Dimension, DimensionKind};
pub use ellipse::Ellipse;
pub use flatten::DEFAULT_TOLERANCE;
pub use infinite_line::InfiniteLine;
pub use line::Line;
pub use path::{Path, PathSegment};
pub use point::Point;
pub use ray::Ray;
pub use rect::Rect;
pub use spline::Spline;

/// Capabilities shared by every geometry primitive
pub trait Shape {
    /// Extents of the primitive, `None` for unbounded construction lines
    fn bounds(&self) -> Option<BoundingBox2D>;

    /// Apply an affine transform in place
    fn transform(&mut self, transform: &Transform);

    /// Polyline approximating the primitive within `tolerance`.
    ///
    /// Construction geometry (rays, infinite lines) produces no points.
    fn flatten(&self, tolerance: f64) -> Vec<Vector2>;

    /// Independent polylines, one per stitched run
    fn flatten_runs(&self, tolerance: f64) -> Vec<Vec<Vector2>> {
        let points = self.flatten(tolerance);
        if points.is_empty() {
            Vec::new()
        } else {
            vec![points]
        }
    }

    /// All defining parameters are finite
    fn is_finite(&self) -> bool;

    /// Primitive type name
    fn shape_type(&self) -> &'static str;

    /// Move the primitive by `offset`
    fn translate(&mut self, offset: Vector2) {
        self.transform(&Transform::from_translation(offset));
    }
}

/// Closed set of geometry primitives
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    Line(Line),
    Arc(Arc),
    Circle(Circle),
    Ellipse(Ellipse),
    Bezier(Bezier),
    Spline(Spline),
    Path(Path),
    Ray(Ray),
    InfiniteLine(InfiniteLine),
    Rect(Rect),
}

impl Geometry {
    /// Get a reference to the shape trait object
    pub fn as_shape(&self) -> &dyn Shape {
        match self {
            Geometry::Point(g) => g,
            Geometry::Line(g) => g,
            Geometry::Arc(g) => g,
            Geometry::Circle(g) => g,
            Geometry::Ellipse(g) => g,
            Geometry::Bezier(g) => g,
            Geometry::Spline(g) => g,
            Geometry::Path(g) => g,
            Geometry::Ray(g) => g,
            Geometry::InfiniteLine(g) => g,
            Geometry::Rect(g) => g,
        }
    }

    /// Get a mutable reference to the shape trait object
    pub fn as_shape_mut(&mut self) -> &mut dyn Shape {
        match self {
            Geometry::Point(g) => g,
            Geometry::Line(g) => g,
            Geometry::Arc(g) => g,
            Geometry::Circle(g) => g,
            Geometry::Ellipse(g) => g,
            Geometry::Bezier(g) => g,
            Geometry::Spline(g) => g,
            Geometry::Path(g) => g,
            Geometry::Ray(g) => g,
            Geometry::InfiniteLine(g) => g,
            Geometry::Rect(g) => g,
        }
    }

    /// Curved primitives need flattening before a stitch-only format can store them
    pub fn is_curve(&self) -> bool {
        matches!(
            self,
            Geometry::Arc(_)
                | Geometry::Circle(_)
                | Geometry::Ellipse(_)
                | Geometry::Bezier(_)
                | Geometry::Spline(_)
                | Geometry::Path(_)
        )
    }

    /// Drafting-only primitives that never produce stitches
    pub fn is_construction(&self) -> bool {
        matches!(self, Geometry::Ray(_) | Geometry::InfiniteLine(_))
    }
}

impl Shape for Geometry {
    fn bounds(&self) -> Option<BoundingBox2D> {
        self.as_shape().bounds()
    }

    fn transform(&mut self, transform: &Transform) {
        self.as_shape_mut().transform(transform)
    }

    fn flatten(&self, tolerance: f64) -> Vec<Vector2> {
        self.as_shape().flatten(tolerance)
    }

    fn flatten_runs(&self, tolerance: f64) -> Vec<Vec<Vector2>> {
        self.as_shape().flatten_runs(tolerance)
    }

    fn is_finite(&self) -> bool {
        self.as_shape().is_finite()
    }

    fn shape_type(&self) -> &'static str {
        self.as_shape().shape_type()
    }
}

macro_rules! impl_from_primitive {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Geometry {
                fn from(value: $variant) -> Self {
                    Geometry::$variant(value)
                }
            }
        )*
    };
}

impl_from_primitive!(Point, Line, Arc, Circle, Ellipse, Bezier, Spline, Path, Ray, InfiniteLine, Rect);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch() {
        let g: Geometry = Line::new(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0)).into();
        assert_eq!(g.shape_type(), "LINE");
        assert_eq!(g.flatten(1.0).len(), 2);
        assert!(!g.is_curve());
    }

    #[test]
    fn test_construction_geometry_is_not_stitched() {
        let g: Geometry = Ray::new(Vector2::ZERO, Vector2::UNIT_X).into();
        assert!(g.is_construction());
        assert!(g.flatten(1.0).is_empty());
        assert!(g.flatten_runs(1.0).is_empty());
        assert!(g.bounds().is_none());
    }

    #[test]
    fn test_translate_default() {
        let mut g: Geometry = Point::new(Vector2::new(1.0, 1.0)).into();
        g.translate(Vector2::new(2.0, 3.0));
        assert_eq!(g, Geometry::Point(Point::new(Vector2::new(3.0, 4.0))));
    }
}
