//! Pattern comparison utilities for tests.
//!
//! Stitch formats only keep absolute stitch positions and the run structure,
//! so comparisons work on a flattened view: (thread, type, points) per block.

#![allow(dead_code)]

use embroidery::{BlockKind, Pattern, StitchType, Vector2};

/// Default tolerance for floating-point comparisons.
pub const TOL: f64 = 1e-6;

/// Check approximate equality of two f64 values within `tol`.
pub fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

/// Assert two Vector2 values are approximately equal component-wise.
pub fn assert_vec2_eq(a: &Vector2, b: &Vector2, tol: f64) {
    assert!(
        approx_eq(a.x, b.x, tol) && approx_eq(a.y, b.y, tol),
        "Vector2 mismatch: ({},{}) vs ({},{}) tol={tol}",
        a.x,
        a.y,
        b.x,
        b.y
    );
}

/// Blocks of every layer as (thread, stitch type, points); geometry is skipped
pub fn stitch_runs(pattern: &Pattern) -> Vec<(usize, StitchType, Vec<Vector2>)> {
    pattern
        .blocks()
        .filter_map(|b| match &b.kind {
            BlockKind::Stitches(run) => Some((b.thread_index, run.stitch_type, run.points.clone())),
            BlockKind::Geometry(_) => None,
        })
        .collect()
}

/// All stitch points of normal runs, in sewing order
pub fn sewn_points(pattern: &Pattern) -> Vec<Vector2> {
    stitch_runs(pattern)
        .into_iter()
        .filter(|(_, t, _)| *t == StitchType::Normal)
        .flat_map(|(_, _, points)| points)
        .collect()
}

/// Describe every difference in the stitch view of two patterns.
pub fn stitch_diffs(a: &Pattern, b: &Pattern) -> Vec<String> {
    let mut diffs = Vec::new();
    let (ra, rb) = (stitch_runs(a), stitch_runs(b));
    if ra.len() != rb.len() {
        diffs.push(format!("block count: {} vs {}", ra.len(), rb.len()));
    }
    for (i, (x, y)) in ra.iter().zip(rb.iter()).enumerate() {
        if x.0 != y.0 {
            diffs.push(format!("block {i} thread: {} vs {}", x.0, y.0));
        }
        if x.1 != y.1 {
            diffs.push(format!("block {i} type: {} vs {}", x.1, y.1));
        }
        if x.2.len() != y.2.len() {
            diffs.push(format!("block {i} points: {} vs {}", x.2.len(), y.2.len()));
            continue;
        }
        for (j, (p, q)) in x.2.iter().zip(y.2.iter()).enumerate() {
            if !approx_eq(p.x, q.x, TOL) || !approx_eq(p.y, q.y, TOL) {
                diffs.push(format!("block {i} point {j}: ({},{}) vs ({},{})", p.x, p.y, q.x, q.y));
            }
        }
    }
    if a.threads.len() != b.threads.len() {
        diffs.push(format!("thread count: {} vs {}", a.threads.len(), b.threads.len()));
    }
    diffs
}
