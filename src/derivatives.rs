//! # Residual derivatives with respect to local and global parameters
//!
//! The external solver wants, for each measured coordinate, the derivative
//! of the **fit** position with respect to every parameter. Measurements are
//! projected onto the sensor-plane x and y axes with the out-of-plane
//! component removed along the track tangent ([`projection_vectors`]): moving
//! along the track, a displacement out of the plane re-enters through the
//! tangent slope.
//!
//! - **Local parameters** (the five helix parameters) have no useful closed
//!   form through the tangent-line construction; [`local_derivatives`] uses
//!   central finite differences with a fixed per-parameter step. The step is
//!   deliberately not adaptive; extremely curved or nearly tangent tracks
//!   trade some discretization accuracy for predictability.
//! - **Global parameters** (three rotations, three translations of the
//!   alignment group) have exact closed forms; [`global_derivatives`]
//!   computes them analytically to avoid finite-difference noise.

use nalgebra::Vector3;

use crate::constants::{Radian, NGL, NLC};
use crate::geometry::SensorSurface;
use crate::helix::geometry::helix_surface_intersection;
use crate::helix::HelixParams;

/// Sensor-plane projection vectors for a given track tangent.
///
/// For each in-plane axis `A` and unit normal `Z`:
/// `proj_A = A - (t·A / t·Z) Z`. A tangent parallel to the plane makes the
/// division blow up; the non-finite components are caught downstream by the
/// record acceptance filter.
pub fn projection_vectors(
    surface: &SensorSurface,
    tangent: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let z = surface.normal;
    let (x_axis, y_axis) = surface.in_plane_axes();

    let proj_x = x_axis - (tangent.dot(&x_axis) / tangent.dot(&z)) * z;
    let proj_y = y_axis - (tangent.dot(&y_axis) / tangent.dot(&z)) * z;
    (proj_x, proj_y)
}

/// Central finite-difference derivatives of the fit position with respect to
/// the five helix parameters, projected on the sensor plane.
///
/// Arguments
/// -----------------
/// * `surface`: the sensor the cluster was measured on.
/// * `params`: best-fit helix parameters.
/// * `global`: corrected global cluster position (expansion point).
/// * `steps`: per-parameter finite-difference step, natural units.
/// * `angle_offset`: tangent-line angular offset (see
///   [`helix_tangent`](crate::helix::geometry::helix_tangent)).
///
/// Return
/// ----------
/// * `Some((d_x, d_y))` – derivative of the fitted x/y sensor coordinate per
///   parameter – or `None` when any perturbed intersection is undefined.
pub fn local_derivatives(
    surface: &SensorSurface,
    params: &HelixParams,
    global: &Vector3<f64>,
    steps: &[f64; NLC],
    angle_offset: Radian,
) -> Option<([f64; NLC], [f64; NLC])> {
    // projections are evaluated once, at the optimum
    let (_, _, tangent) = helix_surface_intersection(surface, params, global, angle_offset)?;
    let (proj_x, proj_y) = projection_vectors(surface, &tangent);

    let base = params.as_array();
    let mut d_x = [0.0; NLC];
    let mut d_y = [0.0; NLC];

    for ip in 0..NLC {
        let mut shifted = [Vector3::zeros(), Vector3::zeros()];
        for (ipm, sign) in [1.0, -1.0].into_iter().enumerate() {
            let mut perturbed = base;
            perturbed[ip] += sign * steps[ip];
            let (intersection, _, _) = helix_surface_intersection(
                surface,
                &HelixParams::from_array(perturbed),
                global,
                angle_offset,
            )?;
            shifted[ipm] = intersection;
        }
        let slope = (shifted[0] - shifted[1]) / (2.0 * steps[ip]);

        // the solver wants the derivative of the fit, not of the residual,
        // so the sign is not flipped here
        d_x[ip] = slope.dot(&proj_x);
        d_y[ip] = slope.dot(&proj_y);
    }

    Some((d_x, d_y))
}

/// Analytic derivatives of the fit position with respect to the six global
/// alignment parameters of the sensor's group.
///
/// Index order matches the solver's label order: `[0..3]` rotations about
/// x, y, z; `[3..6]` translations along x, y, z. A translation along `u`
/// contributes `u · proj`; a rotation about `u` contributes
/// `(u × (fitpoint − center)) · proj`.
pub fn global_derivatives(
    surface: &SensorSurface,
    tangent: &Vector3<f64>,
    fitpoint: &Vector3<f64>,
) -> ([f64; NGL], [f64; NGL]) {
    let (proj_x, proj_y) = projection_vectors(surface, tangent);

    let units = [Vector3::x(), Vector3::y(), Vector3::z()];
    let om = fitpoint - surface.center;

    let mut d_x = [0.0; NGL];
    let mut d_y = [0.0; NGL];
    for (i, u) in units.iter().enumerate() {
        let lever = u.cross(&om);
        d_x[i] = lever.dot(&proj_x);
        d_y[i] = lever.dot(&proj_y);
        d_x[i + 3] = u.dot(&proj_x);
        d_y[i + 3] = u.dot(&proj_y);
    }

    (d_x, d_y)
}
