//! Dimension annotations
//!
//! Dimensions carry reference points and display text. They are stored and
//! transformed with the pattern but never produce stitches and are excluded
//! from pattern bounds.

use crate::types::{Transform, Vector2};
use std::f64::consts::TAU;

/// Placeholder in [`Dimension::text`] replaced by the measured value
pub const MEASUREMENT_PLACEHOLDER: &str = "<>";

/// Reference geometry of a dimension, one variant per dimension type
#[derive(Debug, Clone, PartialEq)]
pub enum DimensionKind {
    /// Distance between two points, measured along the line joining them
    Aligned {
        first: Vector2,
        second: Vector2,
        /// Point on the dimension line
        line_point: Vector2,
    },
    /// Angle between the rays vertex→first and vertex→second
    Angular {
        vertex: Vector2,
        first: Vector2,
        second: Vector2,
        arc_point: Vector2,
    },
    /// Length of the counter-clockwise arc around `center` from `first` to `second`
    ArcLength {
        center: Vector2,
        first: Vector2,
        second: Vector2,
        arc_point: Vector2,
    },
    Diameter {
        center: Vector2,
        chord_point: Vector2,
        leader_length: f64,
    },
    /// Polyline callout; `arrow` draws an arrowhead at the first point
    Leader { points: Vec<Vector2>, arrow: bool },
    /// Distance projected onto an axis rotated by `rotation`
    Linear {
        first: Vector2,
        second: Vector2,
        line_point: Vector2,
        rotation: f64,
    },
    /// X or Y coordinate of a feature point
    Ordinate {
        feature_point: Vector2,
        leader_end: Vector2,
        x_type: bool,
    },
    Radius {
        center: Vector2,
        chord_point: Vector2,
        leader_length: f64,
    },
}

impl DimensionKind {
    /// Dimension type name
    pub fn type_name(&self) -> &'static str {
        match self {
            DimensionKind::Aligned { .. } => "ALIGNED",
            DimensionKind::Angular { .. } => "ANGULAR",
            DimensionKind::ArcLength { .. } => "ARC_LENGTH",
            DimensionKind::Diameter { .. } => "DIAMETER",
            DimensionKind::Leader { .. } => "LEADER",
            DimensionKind::Linear { .. } => "LINEAR",
            DimensionKind::Ordinate { .. } => "ORDINATE",
            DimensionKind::Radius { .. } => "RADIUS",
        }
    }

    fn points_mut(&mut self) -> Vec<&mut Vector2> {
        match self {
            DimensionKind::Aligned {
                first,
                second,
                line_point,
            } => vec![first, second, line_point],
            DimensionKind::Angular {
                vertex,
                first,
                second,
                arc_point,
            } => vec![vertex, first, second, arc_point],
            DimensionKind::ArcLength {
                center,
                first,
                second,
                arc_point,
            } => vec![center, first, second, arc_point],
            DimensionKind::Diameter {
                center, chord_point, ..
            }
            | DimensionKind::Radius {
                center, chord_point, ..
            } => vec![center, chord_point],
            DimensionKind::Leader { points, .. } => points.iter_mut().collect(),
            DimensionKind::Linear {
                first,
                second,
                line_point,
                ..
            } => vec![first, second, line_point],
            DimensionKind::Ordinate {
                feature_point,
                leader_end,
                ..
            } => vec![feature_point, leader_end],
        }
    }
}

/// A dimension annotation
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    /// Display text; empty or containing `<>` shows the measured value
    pub text: String,
    pub text_position: Vector2,
    pub kind: DimensionKind,
}

impl Dimension {
    pub fn new(kind: DimensionKind) -> Self {
        Dimension {
            text: String::new(),
            text_position: Vector2::ZERO,
            kind,
        }
    }

    /// Set the display text
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_text_position(mut self, position: Vector2) -> Self {
        self.text_position = position;
        self
    }

    pub fn aligned(first: Vector2, second: Vector2, line_point: Vector2) -> Self {
        Dimension::new(DimensionKind::Aligned {
            first,
            second,
            line_point,
        })
    }

    pub fn linear(first: Vector2, second: Vector2, line_point: Vector2, rotation: f64) -> Self {
        Dimension::new(DimensionKind::Linear {
            first,
            second,
            line_point,
            rotation,
        })
    }

    pub fn radius(center: Vector2, chord_point: Vector2) -> Self {
        Dimension::new(DimensionKind::Radius {
            center,
            chord_point,
            leader_length: 0.0,
        })
    }

    pub fn diameter(center: Vector2, chord_point: Vector2) -> Self {
        Dimension::new(DimensionKind::Diameter {
            center,
            chord_point,
            leader_length: 0.0,
        })
    }

    pub fn leader(points: Vec<Vector2>) -> Self {
        Dimension::new(DimensionKind::Leader {
            points,
            arrow: true,
        })
    }

    /// Measured value: pattern units for distances, radians for angles.
    ///
    /// Leaders measure nothing and return 0.
    pub fn measurement(&self) -> f64 {
        match &self.kind {
            DimensionKind::Aligned { first, second, .. } => first.distance(second),
            DimensionKind::Angular {
                vertex,
                first,
                second,
                ..
            } => {
                let a = (*first - *vertex).angle();
                let b = (*second - *vertex).angle();
                (b - a).rem_euclid(TAU)
            }
            DimensionKind::ArcLength {
                center,
                first,
                second,
                ..
            } => {
                let radius = center.distance(first);
                let a = (*first - *center).angle();
                let b = (*second - *center).angle();
                radius * (b - a).rem_euclid(TAU)
            }
            DimensionKind::Diameter {
                center, chord_point, ..
            } => 2.0 * center.distance(chord_point),
            DimensionKind::Leader { .. } => 0.0,
            DimensionKind::Linear {
                first,
                second,
                rotation,
                ..
            } => {
                let axis = Vector2::new(rotation.cos(), rotation.sin());
                (*second - *first).dot(&axis).abs()
            }
            DimensionKind::Ordinate {
                feature_point,
                x_type,
                ..
            } => {
                if *x_type {
                    feature_point.x
                } else {
                    feature_point.y
                }
            }
            DimensionKind::Radius {
                center, chord_point, ..
            } => center.distance(chord_point),
        }
    }

    /// Text shown on screen, with the placeholder expanded.
    ///
    /// Distances are shown in millimetres, angles in degrees.
    pub fn display_text(&self) -> String {
        let value = match self.kind {
            DimensionKind::Leader { .. } => return self.text.clone(),
            DimensionKind::Angular { .. } => format!("{:.1}°", self.measurement().to_degrees()),
            DimensionKind::Radius { .. } => format!("R{:.1}", self.measurement() / 10.0),
            DimensionKind::Diameter { .. } => format!("Ø{:.1}", self.measurement() / 10.0),
            _ => format!("{:.1}", self.measurement() / 10.0),
        };
        if self.text.is_empty() {
            value
        } else {
            self.text.replace(MEASUREMENT_PLACEHOLDER, &value)
        }
    }

    /// All reference points including the text position
    pub fn reference_points(&self) -> Vec<Vector2> {
        let mut kind = self.kind.clone();
        let mut points: Vec<Vector2> = kind.points_mut().into_iter().map(|p| *p).collect();
        points.push(self.text_position);
        points
    }

    /// Apply an affine transform to every reference point
    pub fn transform(&mut self, transform: &Transform) {
        let scale = transform.scale_factor();
        for p in self.kind.points_mut() {
            *p = transform.apply(*p);
        }
        self.text_position = transform.apply(self.text_position);
        match &mut self.kind {
            DimensionKind::Linear { rotation, .. } => {
                let axis = Vector2::new(rotation.cos(), rotation.sin());
                *rotation = transform.apply_direction(axis).angle();
            }
            DimensionKind::Diameter { leader_length, .. }
            | DimensionKind::Radius { leader_length, .. } => *leader_length *= scale,
            _ => {}
        }
    }

    pub fn is_finite(&self) -> bool {
        let lengths_ok = match &self.kind {
            DimensionKind::Linear { rotation, .. } => rotation.is_finite(),
            DimensionKind::Diameter { leader_length, .. }
            | DimensionKind::Radius { leader_length, .. } => leader_length.is_finite(),
            _ => true,
        };
        lengths_ok && self.reference_points().iter().all(Vector2::is_finite)
    }
}
