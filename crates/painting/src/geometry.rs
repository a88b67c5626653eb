//! Geometric predicates used by the brush cursors.
//!
//! All functions are pure and work in whatever frame the caller supplies.

use glam::Vec3;

use crate::constants::BARYCENTRIC_EPSILON;

/// Degenerate length threshold (squared)
const EPSILON_SQR: f32 = 1e-12;

/// Closest point to `p` on the segment `a`-`b`.
pub fn closest_point_on_segment(p: Vec3, a: Vec3, b: Vec3) -> Vec3 {
    let ab = b - a;
    let len_sqr = ab.length_squared();
    if len_sqr < EPSILON_SQR {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sqr).clamp(0.0, 1.0);
    a + ab * t
}

/// Whether any point of the segment `a`-`b` lies strictly inside the sphere.
pub fn segment_intersects_sphere(a: Vec3, b: Vec3, center: Vec3, radius_sqr: f32) -> bool {
    (closest_point_on_segment(center, a, b) - center).length_squared() < radius_sqr
}

/// Whether the segment `a`-`b` passes through the finite cylinder with axis
/// `c1`-`c2` (end caps excluded).
///
/// The segment parameter is first restricted to the range whose projection
/// falls between the caps, then the perpendicular distance to the axis (a
/// quadratic in the parameter) is minimised over that range.
pub fn segment_intersects_cylinder(
    a: Vec3,
    b: Vec3,
    c1: Vec3,
    c2: Vec3,
    radius_sqr: f32,
) -> bool {
    let axis = c2 - c1;
    let axis_len_sqr = axis.length_squared();
    if axis_len_sqr < EPSILON_SQR {
        return false;
    }

    let ab = b - a;
    let ac = a - c1;
    // Axis coordinate along the segment: s(t) = s0 + t * s1, caps at 0 and 1.
    let s0 = ac.dot(axis) / axis_len_sqr;
    let s1 = ab.dot(axis) / axis_len_sqr;

    let (mut t_min, mut t_max) = (0.0_f32, 1.0_f32);
    if s1.abs() < f32::EPSILON {
        if !(0.0..=1.0).contains(&s0) {
            return false;
        }
    } else {
        let t0 = -s0 / s1;
        let t1 = (1.0 - s0) / s1;
        t_min = t_min.max(t0.min(t1));
        t_max = t_max.min(t0.max(t1));
        if t_min > t_max {
            return false;
        }
    }

    // Perpendicular offset from the axis: w(t) = w0 + t * w1.
    let w0 = ac - axis * s0;
    let w1 = ab - axis * s1;
    let w1_len_sqr = w1.length_squared();
    let t = if w1_len_sqr < EPSILON_SQR {
        t_min
    } else {
        (-w0.dot(w1) / w1_len_sqr).clamp(t_min, t_max)
    };
    (w0 + w1 * t).length_squared() < radius_sqr
}

/// Whether the segment `a`-`b` touches the capsule spanned by two spheres
/// at `c1` and `c2` and the cylinder between them.
pub fn segment_intersects_capsule(
    a: Vec3,
    b: Vec3,
    c1: Vec3,
    c2: Vec3,
    radius_sqr: f32,
) -> bool {
    segment_intersects_sphere(a, b, c1, radius_sqr)
        || segment_intersects_sphere(a, b, c2, radius_sqr)
        || segment_intersects_cylinder(a, b, c1, c2, radius_sqr)
}

/// Barycentric point-in-triangle test with a small tolerance.
///
/// The point is assumed to lie (approximately) in the triangle's plane.
pub fn is_point_inside_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < EPSILON_SQR {
        return false;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    let u = 1.0 - v - w;
    u >= -BARYCENTRIC_EPSILON && v >= -BARYCENTRIC_EPSILON && w >= -BARYCENTRIC_EPSILON
}

/// Whether the line through `q1` and `q2` passes through triangle `p`.
///
/// Uses signed tetrahedron volumes: `q1` and `q2` must lie on opposite sides
/// of the triangle's plane, and the line must see all three edges turning
/// the same way.
pub fn line_crosses_triangle(q1: Vec3, q2: Vec3, p: &[Vec3; 3]) -> bool {
    let positive = |a: Vec3, b: Vec3, c: Vec3, d: Vec3| (b - a).cross(c - a).dot(d - a) > 0.0;
    let [p1, p2, p3] = *p;
    if positive(q1, p1, p2, p3) == positive(q2, p1, p2, p3) {
        return false;
    }
    let side = positive(q1, q2, p1, p2);
    positive(q1, q2, p2, p3) == side && positive(q1, q2, p3, p1) == side
}

/// Project `p` onto the plane through `origin` perpendicular to the unit vector `dir`.
pub fn project_onto_plane(p: Vec3, origin: Vec3, dir: Vec3) -> Vec3 {
    p - dir * (p - origin).dot(dir)
}

/// Incenter of a triangle (falls back to the centroid when degenerate).
pub fn incenter(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let la = (c - b).length();
    let lb = (a - c).length();
    let lc = (b - a).length();
    let perimeter = la + lb + lc;
    if perimeter <= f32::EPSILON {
        return (a + b + c) / 3.0;
    }
    (a * la + b * lb + c * lc) / perimeter
}
