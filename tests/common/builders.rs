//! Test pattern builders.
//!
//! `stitch_subset_pattern` produces patterns inside the subset every stitch
//! format reproduces exactly: integer coordinates, a single layer "0",
//! threads used in order, and moves short enough to need no splitting.

#![allow(dead_code)]

use embroidery::io::stitch_stream::default_thread;
use embroidery::palette::{self, Catalog};
use embroidery::{
    Arc, Bezier, Block, Circle, Dimension, Ellipse, Hoop, Line, Path, Pattern, Point, Ray, Rect, Rgb, Spline,
    StitchType, Thread, Vector2,
};
use std::f64::consts::PI;

/// One color segment of a stitch pattern: its runs as (type, points)
pub type Segment = Vec<(StitchType, Vec<(i32, i32)>)>;

/// Single layer "0" with one thread per segment, taken from `threads`
pub fn stitch_pattern(segments: &[Segment], threads: impl Fn(usize) -> Thread) -> Pattern {
    let mut pattern = Pattern::new();
    if segments.iter().all(|s| s.is_empty()) {
        return pattern;
    }
    let layer = pattern.add_layer("0");
    for (thread_index, segment) in segments.iter().enumerate() {
        pattern.add_thread(threads(thread_index));
        for (stitch_type, points) in segment {
            let points = points.iter().map(|&(x, y)| Vector2::new(x as f64, y as f64)).collect();
            pattern
                .add_block(layer, Block::stitches(thread_index, *stitch_type, points))
                .unwrap();
        }
    }
    pattern
}

/// Threads of the generic cycle, which count-only formats reproduce
pub fn generic_threads(index: usize) -> Thread {
    default_thread(index)
}

/// Threads of a manufacturer catalog, spread across the table
pub fn catalog_threads(catalog: &'static Catalog) -> impl Fn(usize) -> Thread {
    move |index| {
        let position = (index * 7 + 3) % catalog.len();
        Thread::from_catalog(catalog, catalog.entry(position).unwrap())
    }
}

/// A square outline stitched in one red thread
pub fn red_square() -> Pattern {
    let mut pattern = Pattern::new();
    let layer = pattern.add_layer("0");
    pattern.add_thread(Thread::with_catalog(Rgb::RED, "X", "1"));
    for (x, y) in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)] {
        pattern.add_stitch(layer, Vector2::new(x, y), StitchType::Normal).unwrap();
    }
    pattern
}

/// Two layers holding every geometry primitive plus dimension annotations
pub fn all_geometry_pattern() -> Pattern {
    let mut pattern = Pattern::with_name("all geometry");
    pattern.hoop = Some(Hoop::from_mm(200.0, 200.0));
    pattern.add_thread(Thread::from_catalog(palette::janome(), palette::janome().entry(0).unwrap()));
    pattern.add_thread(Thread::new(Rgb::new(20, 120, 220)));
    let outline = pattern.add_layer("outline");
    let detail = pattern.add_layer("detail");

    pattern.add_geometry(outline, 0, Point::from_coords(-50.0, -50.0)).unwrap();
    pattern.add_geometry(outline, 0, Line::from_coords(-40.0, -40.0, 40.0, -40.0)).unwrap();
    pattern.add_geometry(outline, 0, Arc::from_coords(0.0, 0.0, 30.0, 0.0, PI)).unwrap();
    pattern.add_geometry(outline, 0, Circle::from_coords(0.0, 0.0, 45.0)).unwrap();
    pattern
        .add_geometry(
            outline,
            0,
            Ellipse::from_center_axes(Vector2::new(10.0, 5.0), Vector2::new(20.0, 0.0), 0.4),
        )
        .unwrap();
    pattern
        .add_geometry(
            detail,
            1,
            Bezier::cubic(
                Vector2::new(-30.0, 0.0),
                Vector2::new(-10.0, 30.0),
                Vector2::new(10.0, -30.0),
                Vector2::new(30.0, 0.0),
            ),
        )
        .unwrap();
    pattern
        .add_geometry(
            detail,
            1,
            Spline::new(
                3,
                vec![
                    Vector2::new(0.0, 0.0),
                    Vector2::new(10.0, 20.0),
                    Vector2::new(20.0, -20.0),
                    Vector2::new(30.0, 10.0),
                    Vector2::new(40.0, 0.0),
                ],
            ),
        )
        .unwrap();
    pattern
        .add_geometry(
            detail,
            1,
            Path::new()
                .move_to(Vector2::new(0.0, 0.0))
                .line_to(Vector2::new(10.0, 0.0))
                .quad_to(Vector2::new(15.0, 10.0), Vector2::new(20.0, 0.0))
                .close(),
        )
        .unwrap();
    pattern
        .add_geometry(detail, 1, Rect::new(Vector2::new(-20.0, -20.0), 15.0, 10.0).with_rotation(0.5))
        .unwrap();
    pattern.add_geometry(detail, 1, Ray::new(Vector2::ZERO, Vector2::UNIT_X)).unwrap();
    pattern
        .add_dimension(
            detail,
            Dimension::aligned(Vector2::new(-40.0, -40.0), Vector2::new(40.0, -40.0), Vector2::new(0.0, -48.0)),
        )
        .unwrap();
    pattern
        .add_dimension(detail, Dimension::diameter(Vector2::ZERO, Vector2::new(45.0, 0.0)).with_text("<> mm"))
        .unwrap();
    pattern
}
