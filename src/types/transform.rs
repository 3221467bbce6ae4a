//! Affine transforms for moving, rotating and scaling pattern geometry

use crate::types::Vector2;
use std::ops::Mul;

/// 3x3 matrix for homogeneous 2D transformations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix3 {
    /// Matrix elements stored in row-major order
    pub m: [[f64; 3]; 3],
}

impl Matrix3 {
    /// Create identity matrix
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Create translation matrix
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            m: [[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]],
        }
    }

    /// Create counter-clockwise rotation matrix about the origin
    pub fn rotation(angle: f64) -> Self {
        let cos = angle.cos();
        let sin = angle.sin();
        Self {
            m: [[cos, -sin, 0.0], [sin, cos, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Create scaling matrix
    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self {
            m: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Calculate determinant of the linear part
    pub fn linear_determinant(&self) -> f64 {
        self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]
    }

    /// Transform a point (translation applied)
    pub fn transform_point(&self, v: Vector2) -> Vector2 {
        Vector2::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2],
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2],
        )
    }

    /// Transform a direction (translation ignored)
    pub fn transform_direction(&self, v: Vector2) -> Vector2 {
        Vector2::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y,
            self.m[1][0] * v.x + self.m[1][1] * v.y,
        )
    }
}

impl Mul for Matrix3 {
    type Output = Matrix3;

    fn mul(self, other: Matrix3) -> Matrix3 {
        let mut result = [[0.0; 3]; 3];
        for (i, row) in result.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.m[i][k] * other.m[k][j]).sum();
            }
        }
        Matrix3 { m: result }
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::identity()
    }
}

/// An affine transform applied to geometry and stitches
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    pub matrix: Matrix3,
}

impl Transform {
    /// Create identity transform
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Create translation transform
    pub fn from_translation(offset: Vector2) -> Self {
        Self {
            matrix: Matrix3::translation(offset.x, offset.y),
        }
    }

    /// Create rotation transform about `origin`
    pub fn from_rotation(origin: Vector2, angle: f64) -> Self {
        let to_origin = Matrix3::translation(-origin.x, -origin.y);
        let back = Matrix3::translation(origin.x, origin.y);
        Self {
            matrix: back * Matrix3::rotation(angle) * to_origin,
        }
    }

    /// Create uniform scaling transform about the origin
    pub fn from_scale(scale: f64) -> Self {
        Self {
            matrix: Matrix3::scaling(scale, scale),
        }
    }

    /// Create non-uniform scaling transform about `origin`
    pub fn from_scaling_with_origin(sx: f64, sy: f64, origin: Vector2) -> Self {
        let to_origin = Matrix3::translation(-origin.x, -origin.y);
        let back = Matrix3::translation(origin.x, origin.y);
        Self {
            matrix: back * Matrix3::scaling(sx, sy) * to_origin,
        }
    }

    /// Apply transform to a point
    pub fn apply(&self, point: Vector2) -> Vector2 {
        self.matrix.transform_point(point)
    }

    /// Apply only the linear portion (for direction vectors)
    pub fn apply_direction(&self, direction: Vector2) -> Vector2 {
        self.matrix.transform_direction(direction)
    }

    /// Uniform scale factor, taken from how the unit X vector is stretched
    pub fn scale_factor(&self) -> f64 {
        self.apply_direction(Vector2::UNIT_X).length()
    }

    /// Rotation angle of the transform, taken from the image of the X axis
    pub fn rotation_angle(&self) -> f64 {
        self.apply_direction(Vector2::UNIT_X).angle()
    }

    /// Transform mirrors geometry (negative determinant)
    pub fn is_mirroring(&self) -> bool {
        self.matrix.linear_determinant() < 0.0
    }

    /// Combine with another transform (this transform applied first)
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            matrix: other.matrix * self.matrix,
        }
    }

    /// Check if transform is identity
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}
