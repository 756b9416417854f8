//! # Closed-form helix geometry
//!
//! Point/circle/plane helpers shared by the residual computation and the
//! derivative engine:
//!
//! - [`circle_pca`] – closest point on the fitted circle to a point, in the
//!   transverse plane.
//! - [`pca_on_line`] – closest point on a straight line to a point.
//! - [`line_plane_intersection`] – analytic line/plane intersection.
//! - [`helix_tangent`] – local straight-line approximation to the helix near
//!   a point (no closed form exists for the exact helix PCA).
//! - [`helix_surface_intersection`] – where the fitted helix crosses the
//!   plane of a sensor.
//!
//! A line direction parallel to the sensor plane makes the intersection
//! blow up; the result is a non-finite vector the caller can diagnose, never
//! a silently truncated one.

use nalgebra::{Vector2, Vector3};

use crate::constants::Radian;
use crate::geometry::SensorSurface;
use crate::helix::HelixParams;

/// Closest point on the circle `(x0, y0, radius)` to a point, projected in
/// the transverse plane.
///
/// Returns `None` when the point coincides with the circle center, where the
/// direction of closest approach is undefined.
pub fn circle_pca(
    radius: f64,
    x0: f64,
    y0: f64,
    point: &Vector3<f64>,
) -> Option<Vector2<f64>> {
    let center = Vector2::new(x0, y0);
    let transverse = Vector2::new(point.x, point.y);
    let offset = transverse - center;
    let norm = offset.norm();
    if norm == 0.0 {
        return None;
    }
    Some(center + offset * (radius / norm))
}

/// Closest point to `point` on the line through `reference` with unit
/// direction `direction`.
pub fn pca_on_line(
    point: &Vector3<f64>,
    direction: &Vector3<f64>,
    reference: &Vector3<f64>,
) -> Vector3<f64> {
    reference + (point - reference).dot(direction) * direction
}

/// Analytic intersection of a line and a plane.
///
/// Solves `p = point_on_line + d * direction` with
/// `(p - plane_point) . plane_normal = 0`. When the direction is parallel to
/// the plane the division blows up and the returned vector is non-finite.
pub fn line_plane_intersection(
    point_on_line: &Vector3<f64>,
    direction: &Vector3<f64>,
    plane_point: &Vector3<f64>,
    plane_normal: &Vector3<f64>,
) -> Vector3<f64> {
    let d = (plane_point - point_on_line).dot(plane_normal) / direction.dot(plane_normal);
    point_on_line + d * direction
}

/// Local straight-line approximation to the helix near `point`.
///
/// There is no closed form for the exact point of closest approach of a
/// helix to a point. Instead: take the circle PCA in the transverse plane,
/// read z off the z-vs-radius relation, step `angle_offset` further along
/// the circle for a second point, and re-project the original point onto the
/// line through both. The angular spacing between neighboring sensors is
/// small against the curvature, so the first-order linearization holds.
///
/// Return
/// ----------
/// * `Some((pca, tangent))` – the point of closest approach and the unit
///   tangent direction – or `None` when the circle PCA is undefined.
pub fn helix_tangent(
    params: &HelixParams,
    point: &Vector3<f64>,
    angle_offset: Radian,
) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let pca_circle = circle_pca(params.radius, params.x0, params.y0, point)?;

    // the transverse radius of the circle PCA fixes z
    let pca_radius = pca_circle.norm();
    let pca = Vector3::new(
        pca_circle.x,
        pca_circle.y,
        pca_radius * params.zslope + params.z0,
    );

    // second point at a slightly larger angle around the circle center
    let angle_pca = (pca_circle.y - params.y0).atan2(pca_circle.x - params.x0);
    let new_x = params.radius * (angle_pca + angle_offset).cos() + params.x0;
    let new_y = params.radius * (angle_pca + angle_offset).sin() + params.y0;
    let new_z = (new_x * new_x + new_y * new_y).sqrt() * params.zslope + params.z0;
    let second = Vector3::new(new_x, new_y, new_z);

    let tangent = (second - pca).normalize();

    // final PCA of the point to the local straight line
    let final_pca = pca_on_line(point, &tangent, &pca);
    Some((final_pca, tangent))
}

/// Intersection of the fitted helix with the plane of a sensor surface.
///
/// Builds the local tangent line near `point` and intersects it with the
/// sensor plane. The returned intersection may be non-finite when the track
/// runs parallel to the plane; `None` only marks an undefined tangent.
pub fn helix_surface_intersection(
    surface: &SensorSurface,
    params: &HelixParams,
    point: &Vector3<f64>,
    angle_offset: Radian,
) -> Option<(Vector3<f64>, Vector3<f64>, Vector3<f64>)> {
    let (pca, tangent) = helix_tangent(params, point, angle_offset)?;
    let intersection =
        line_plane_intersection(&pca, &tangent, &surface.center, &surface.normal);
    Some((intersection, pca, tangent))
}
