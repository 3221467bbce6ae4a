//! # embroidery
//!
//! A pure Rust library for reading and writing machine embroidery files.
//!
//! Patterns are held in one format-neutral model (layers of stitch runs and
//! vector geometry, a thread table, hoop and metadata) and converted to and
//! from the machine formats through pluggable adapters.
//!
//! ## Features
//!
//! - Tajima DST, Melco EXP, Janome JEF and Husqvarna Viking HUS
//! - ECF, a lossless compound-file format for the full model
//! - Compound (CFB) container reader and writer, versions 3 and 4
//! - Melco OFM reading from its compound container
//! - Canonical Huffman codec (ECF) and LZH codec (HUS)
//! - Thread catalogs with nearest-color matching
//! - Non-fatal conversion issues reported as notifications
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use embroidery::{io, Pattern};
//!
//! // Format picked by extension, then by content
//! let (pattern, notes) = io::load_file_with_notifications("rose.dst", None)?;
//! for note in notes.iter() {
//!     println!("{}", note);
//! }
//!
//! // Convert to Janome
//! io::save_file("rose.jef", &pattern, "jef")?;
//! # Ok::<(), embroidery::EmbroideryError>(())
//! ```
//!
//! ## Architecture
//!
//! - `Pattern` - Central model: layers, blocks, threads
//! - `Geometry` - Closed set of vector primitives, flattened on save
//! - `FormatAdapter` - Trait every file format implements
//! - `CompoundFile` - Storage/stream tree backing ECF

#![allow(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod geometry;
pub mod io;
pub mod notification;
pub mod palette;
pub mod pattern;
pub mod types;

// Re-export commonly used types
pub use error::{EmbroideryError, Result};
pub use types::{BoundingBox2D, Rgb, Transform, Vector2};

pub use geometry::{
    Arc, Bezier, Circle, Dimension, DimensionKind, Ellipse, Geometry, InfiniteLine, Line, Path, PathSegment, Point,
    Ray, Rect, Shape, Spline,
};

pub use pattern::{Block, BlockKind, Hoop, Layer, LayerFlags, Pattern, StitchRun, StitchType, Thread, Units};

pub use io::{CompoundFile, FormatAdapter, FormatFeatures, FormatRegistry, IoConfiguration};
pub use notification::{Notification, NotificationCollection, NotificationType};
