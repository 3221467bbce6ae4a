//! Segment-count rules shared by the curve primitives.
//!
//! Every rule depends only on the curve parameters and the tolerance, so
//! flattening the same curve twice yields the same points.

/// Default maximum deviation between a curve and its stitch polyline,
/// in pattern units (0.1 mm).
pub const DEFAULT_TOLERANCE: f64 = 1.0;

/// Smallest tolerance honoured; anything finer is clamped.
pub const MIN_TOLERANCE: f64 = 1e-3;

/// Upper bound on the number of segments produced for a single curve.
pub const MAX_SEGMENTS: usize = 4096;

/// Clamp a caller-supplied tolerance into the supported range.
pub fn effective_tolerance(tolerance: f64) -> f64 {
    if tolerance.is_finite() && tolerance > MIN_TOLERANCE {
        tolerance
    } else if tolerance.is_finite() && tolerance > 0.0 {
        MIN_TOLERANCE
    } else {
        DEFAULT_TOLERANCE
    }
}

/// Segments needed so that every chord of a circular arc of `radius`
/// spanning `sweep` radians stays within `tolerance` of the arc (sagitta bound).
pub fn arc_segments(radius: f64, sweep: f64, tolerance: f64) -> usize {
    let radius = radius.abs();
    let sweep = sweep.abs();
    if radius <= 0.0 || sweep <= 0.0 {
        return 1;
    }
    let tolerance = effective_tolerance(tolerance);
    if tolerance >= radius {
        return (sweep / std::f64::consts::PI).ceil().max(1.0) as usize;
    }
    let max_step = 2.0 * (1.0 - tolerance / radius).acos();
    clamp_segments((sweep / max_step).ceil())
}

/// Segments for a polynomial curve of `degree` with the given control
/// polygon, from Wang's bound on the second differences.
pub fn polynomial_segments(control: &[crate::types::Vector2], degree: usize, tolerance: f64) -> usize {
    if degree < 2 || control.len() < 3 {
        return 1;
    }
    let tolerance = effective_tolerance(tolerance);
    let max_second_difference = control
        .windows(3)
        .map(|w| (w[0] - w[1] * 2.0 + w[2]).length())
        .fold(0.0_f64, f64::max);
    let d = degree as f64;
    let n = ((d * (d - 1.0) / 8.0) * max_second_difference / tolerance).sqrt();
    clamp_segments(n.ceil())
}

fn clamp_segments(n: f64) -> usize {
    if n.is_finite() {
        (n as usize).clamp(1, MAX_SEGMENTS)
    } else {
        MAX_SEGMENTS
    }
}
