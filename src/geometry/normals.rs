//! Polygon normal computation.
//!
//! Newell's method over the polygon boundary; robust for non-convex and
//! slightly non-planar polygons, which is what the cell-normal decoration
//! pass needs.

/// Unit normal of the polygon `ids` over `points` by Newell's method.
/// Returns `[0,0,0]` for degenerate polygons (fewer than 3 points or zero
/// area).
pub fn polygon_normal(points: &[[f64; 3]], ids: &[usize]) -> [f64; 3] {
    if ids.len() < 3 {
        return [0.0; 3];
    }
    let mut n = [0.0f64; 3];
    for i in 0..ids.len() {
        let p = points[ids[i]];
        let q = points[ids[(i + 1) % ids.len()]];
        n[0] += (p[1] - q[1]) * (p[2] + q[2]);
        n[1] += (p[2] - q[2]) * (p[0] + q[0]);
        n[2] += (p[0] - q[0]) * (p[1] + q[1]);
    }
    normalize(n)
}

/// Normalize `v`, returning `[0,0,0]` when its magnitude underflows.
pub fn normalize(v: [f64; 3]) -> [f64; 3] {
    let mag = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if mag <= f64::EPSILON {
        [0.0; 3]
    } else {
        [v[0] / mag, v[1] / mag, v[2] / mag]
    }
}

/// Angle between two unit vectors, in degrees.
pub fn angle_deg(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
    dot.acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_normal_is_z() {
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
        let n = polygon_normal(&pts, &[0, 1, 2, 3]);
        assert!((n[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_polygon_has_zero_normal() {
        let pts = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        assert_eq!(polygon_normal(&pts, &[0, 1]), [0.0; 3]);
    }
}
