//! 2D geometry primitives for the crease-pattern solver.
//!
//! Everything here works on `Vec2` (= `nalgebra::Vector2<f64>`). The
//! predicates take their tolerances from [`crate::tol`]; none of them
//! allocate.

use nalgebra::Vector2;

use crate::tol::{CONVEXITY_TOL, DIST_TOL};

pub type Vec2 = Vector2<f64>;

/// Angle of a vector in `(-pi, pi]`.
#[inline]
pub fn angle(v: Vec2) -> f64 {
    let a = v.y.atan2(v.x);
    if a == -std::f64::consts::PI {
        std::f64::consts::PI
    } else {
        a
    }
}

/// Wrap an angle into `(-pi, pi]`.
#[inline]
pub fn wrap_angle(a: f64) -> f64 {
    let mut x = a;
    while x <= -std::f64::consts::PI {
        x += std::f64::consts::TAU;
    }
    while x > std::f64::consts::PI {
        x -= std::f64::consts::TAU;
    }
    x
}

/// Turn angle at `q` when walking `p -> q -> r`, in `(-pi, pi]`. Zero means
/// straight ahead; positive is a left (CCW) turn.
#[inline]
pub fn angle_change(p: Vec2, q: Vec2, r: Vec2) -> f64 {
    wrap_angle(angle(r - q) - angle(q - p))
}

/// Rotate a vector a quarter turn counterclockwise.
#[inline]
pub fn rotate_ccw_90(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

#[inline]
pub fn mag(v: Vec2) -> f64 {
    v.norm()
}

#[inline]
pub fn mag2(v: Vec2) -> f64 {
    v.norm_squared()
}

#[inline]
pub fn inner(a: Vec2, b: Vec2) -> f64 {
    a.dot(&b)
}

#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Unit vector in the direction of `v`. `v` must not be the zero vector.
#[inline]
pub fn normalize(v: Vec2) -> Vec2 {
    v / v.norm()
}

/// True if `p`, `q`, `r` make a strict counterclockwise turn.
#[inline]
pub fn are_ccw(p: Vec2, q: Vec2, r: Vec2) -> bool {
    cross(q - p, r - p) > CONVEXITY_TOL
}

/// True if `p`, `q`, `r` make a strict clockwise turn.
#[inline]
pub fn are_cw(p: Vec2, q: Vec2, r: Vec2) -> bool {
    cross(q - p, r - p) < -CONVEXITY_TOL
}

/// True if the two directions are parallel to within the convexity tolerance.
#[inline]
pub fn are_parallel(a: Vec2, b: Vec2) -> bool {
    cross(a, b).abs() <= CONVEXITY_TOL * a.norm() * b.norm()
}

/// Incenter of the triangle `p1 p2 p3`.
pub fn incenter(p1: Vec2, p2: Vec2, p3: Vec2) -> Vec2 {
    let a = (p2 - p3).norm();
    let b = (p3 - p1).norm();
    let c = (p1 - p2).norm();
    (a * p1 + b * p2 + c * p3) / (a + b + c)
}

/// Inradius of the triangle `p1 p2 p3`.
pub fn inradius(p1: Vec2, p2: Vec2, p3: Vec2) -> f64 {
    let a = (p2 - p3).norm();
    let b = (p3 - p1).norm();
    let c = (p1 - p2).norm();
    cross(p2 - p1, p3 - p1).abs() / (a + b + c)
}

/// Intersection parameters of the lines `p + tp*rp` and `q + tq*rq`. Returns
/// `None` for (near-)parallel lines.
pub fn line_intersection_params(p: Vec2, rp: Vec2, q: Vec2, rq: Vec2) -> Option<(f64, f64)> {
    let det = cross(rp, rq);
    if det.abs() <= CONVEXITY_TOL * rp.norm() * rq.norm() {
        return None;
    }
    let d = q - p;
    let tp = cross(d, rq) / det;
    let tq = cross(d, rp) / det;
    Some((tp, tq))
}

/// Intersection point of the lines `p + t*rp` and `q + u*rq`.
pub fn line_intersection(p: Vec2, rp: Vec2, q: Vec2, rq: Vec2) -> Option<Vec2> {
    let (tp, _) = line_intersection_params(p, rp, q, rq)?;
    Some(p + tp * rp)
}

/// Cast a ray from `p` perpendicular to the segment `p1 -> p2` and intersect
/// it with the segment `q1 -> q2`. Returns the intersection point when it
/// falls within the segment (endpoints included).
pub fn project_p_to_q(p1: Vec2, p2: Vec2, p: Vec2, q1: Vec2, q2: Vec2) -> Option<Vec2> {
    let dir = rotate_ccw_90(p2 - p1);
    let (_, u) = line_intersection_params(p, dir, q1, q2 - q1)?;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    Some(q1 + u * (q2 - q1))
}

/// Drop `q` perpendicularly onto the segment `p1 -> p2`. Returns the foot of
/// the perpendicular when it lands within the segment.
pub fn project_q_to_p(q: Vec2, p1: Vec2, p2: Vec2) -> Option<Vec2> {
    let d = p2 - p1;
    let len2 = d.norm_squared();
    if len2 <= DIST_TOL * DIST_TOL {
        return None;
    }
    let u = inner(q - p1, d) / len2;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    Some(p1 + u * d)
}

/// True if `p` lies inside the convex polygon `pts` (vertices in ring order).
/// The point counts as inside when it is on the same side of every edge as
/// the polygon centroid.
pub fn convex_encloses(pts: &[Vec2], p: Vec2) -> bool {
    debug_assert!(pts.len() >= 3);
    let mut centroid = Vec2::zeros();
    for v in pts {
        centroid += *v;
    }
    centroid /= pts.len() as f64;
    for i in 0..pts.len() {
        let p1 = pts[i];
        let p2 = pts[(i + 1) % pts.len()];
        let mut n = rotate_ccw_90(p2 - p1);
        if inner(centroid - p1, n) < 0.0 {
            n = -n;
        }
        if inner(p - p1, n) < 0.0 {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn angle_range_is_half_open() {
        assert_eq!(angle(Vec2::new(1.0, 0.0)), 0.0);
        assert_eq!(angle(Vec2::new(0.0, 1.0)), FRAC_PI_2);
        assert_eq!(angle(Vec2::new(-1.0, 0.0)), PI);
        assert!(angle(Vec2::new(-1.0, -1e-12)) < 0.0);
    }

    #[test]
    fn angle_change_signs() {
        let p = Vec2::new(0.0, 0.0);
        let q = Vec2::new(1.0, 0.0);
        assert!(angle_change(p, q, Vec2::new(1.0, 1.0)) > 0.0);
        assert!(angle_change(p, q, Vec2::new(1.0, -1.0)) < 0.0);
        assert!(angle_change(p, q, Vec2::new(2.0, 0.0)).abs() < 1e-12);
    }

    #[test]
    fn ccw_cw_predicates() {
        let p = Vec2::new(0.0, 0.0);
        let q = Vec2::new(1.0, 0.0);
        assert!(are_ccw(p, q, Vec2::new(0.5, 1.0)));
        assert!(are_cw(p, q, Vec2::new(0.5, -1.0)));
        assert!(!are_ccw(p, q, Vec2::new(2.0, 0.0)));
        assert!(!are_cw(p, q, Vec2::new(2.0, 0.0)));
    }

    #[test]
    fn incenter_of_equilateral_is_centroid() {
        let p1 = Vec2::new(0.0, 0.0);
        let p2 = Vec2::new(1.0, 0.0);
        let p3 = Vec2::new(0.5, 3.0f64.sqrt() / 2.0);
        let c = incenter(p1, p2, p3);
        assert!((c - Vec2::new(0.5, 1.0 / (2.0 * 3.0f64.sqrt()))).norm() < 1e-12);
        // r = area / s for the unit equilateral triangle
        assert!((inradius(p1, p2, p3) - 1.0 / (2.0 * 3.0f64.sqrt())).abs() < 1e-12);
    }

    #[test]
    fn line_intersection_basics() {
        let p = line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 1.0),
        )
        .unwrap();
        assert!((p - Vec2::new(0.5, 0.5)).norm() < 1e-12);
        assert!(line_intersection(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn perpendicular_projection_onto_segment() {
        // Axial segment along x; target segment is the line y = 1.
        let q = project_p_to_q(
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.7, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(2.0, 1.0),
        )
        .unwrap();
        assert!((q - Vec2::new(0.7, 1.0)).norm() < 1e-12);
        // A point past the end of the target segment does not project.
        assert!(project_p_to_q(
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(2.0, 1.0),
        )
        .is_none());
    }

    #[test]
    fn foot_of_perpendicular() {
        let p = project_q_to_p(
            Vec2::new(0.5, 2.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
        )
        .unwrap();
        assert!((p - Vec2::new(0.5, 0.0)).norm() < 1e-12);
        assert!(project_q_to_p(
            Vec2::new(5.0, 2.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn convex_enclosure() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        assert!(convex_encloses(&square, Vec2::new(0.5, 0.5)));
        assert!(!convex_encloses(&square, Vec2::new(1.5, 0.5)));
    }
}
