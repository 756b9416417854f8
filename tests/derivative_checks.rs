//! Validation of the derivative engine against closed forms.
//!
//! The z0 parameter has an exact derivative through the tangent-line
//! construction: shifting z0 by δ moves the line's support point by δ·ẑ and
//! leaves the tangent direction unchanged, so the intersection moves by
//! `ẑ − (ẑ·n / t·n) t` and the projected derivative follows in closed form.
//! The finite-difference engine must converge to it as the step shrinks.

mod common;

use approx::assert_relative_eq;
use helifit::derivatives::{local_derivatives, projection_vectors};
use helifit::geometry::{SensorSurface, SurfaceProvider, TransformKind};
use helifit::helix::geometry::helix_surface_intersection;
use nalgebra::Vector3;

const ANGLE_OFFSET: f64 = 0.005;

fn fixture_surface_and_point() -> (SensorSurface, Vector3<f64>) {
    let params = common::reference_helix();
    let layer = 1u8;
    let point = common::helix_point_at_radius(&params, common::SILICON_RADII[layer as usize]);

    let mut registry = helifit::SensorRegistry::new();
    let key = common::fixture_key(layer);
    registry.insert_ideal(key, common::barrel_sensor_transform(&point));
    let surface = registry.surface(&key, TransformKind::Aligned).unwrap();
    (surface, point)
}

#[test]
fn finite_difference_z0_derivative_converges_to_the_closed_form() {
    let params = common::reference_helix();
    let (surface, point) = fixture_surface_and_point();

    let (_, _, tangent) =
        helix_surface_intersection(&surface, &params, &point, ANGLE_OFFSET).unwrap();
    let (proj_x, proj_y) = projection_vectors(&surface, &tangent);

    // d(intersection)/d(z0) = ẑ − (ẑ·n / t·n) t
    let n = surface.normal;
    let shift = Vector3::z() - (Vector3::z().dot(&n) / tangent.dot(&n)) * tangent;
    let analytic_x = shift.dot(&proj_x);
    let analytic_y = shift.dot(&proj_y);

    let mut previous_error = f64::INFINITY;
    for step in [0.8, 0.4, 0.2, 0.1, 0.05] {
        let (d_x, d_y) =
            local_derivatives(&surface, &params, &point, &[step; 5], ANGLE_OFFSET).unwrap();
        let error = (d_x[4] - analytic_x).abs() + (d_y[4] - analytic_y).abs();
        assert!(
            error <= previous_error + 1e-12,
            "error grew from {previous_error} to {error} at step {step}"
        );
        previous_error = error;
    }

    // at the production step size the agreement is already tight
    let (d_x, d_y) =
        local_derivatives(&surface, &params, &point, &[0.1; 5], ANGLE_OFFSET).unwrap();
    assert_relative_eq!(d_x[4], analytic_x, epsilon = 1e-6);
    assert_relative_eq!(d_y[4], analytic_y, epsilon = 1e-6);
}

#[test]
fn all_local_derivatives_are_finite_on_the_fixture() {
    let params = common::reference_helix();
    let (surface, point) = fixture_surface_and_point();

    let (d_x, d_y) =
        local_derivatives(&surface, &params, &point, &[0.1; 5], ANGLE_OFFSET).unwrap();
    assert!(d_x.iter().chain(d_y.iter()).all(|d| d.is_finite()));

    // the radial sensor sees the azimuthal motion of the circle parameters
    assert!(d_x[1].abs() > 0.0 || d_x[2].abs() > 0.0);
    // z0 moves the fit along the local y axis of a barrel sensor
    assert!(d_y[4].abs() > 0.1);
}
