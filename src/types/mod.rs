//! Basic value types shared by the pattern model and the format adapters

pub mod bounds;
pub mod color;
pub mod transform;
pub mod vector;

pub use bounds::BoundingBox2D;
pub use color::Rgb;
pub use transform::Transform;
pub use vector::Vector2;
