//! # Helix model and the two-stage least-squares fit
//!
//! A track is modeled as a circle in the transverse (x, y) plane plus a
//! linear relation between z and the transverse radius:
//!
//! ```text
//! (x - x0)^2 + (y - y0)^2 = radius^2
//! z = zslope * sqrt(x^2 + y^2) + z0
//! ```
//!
//! [`fit_helix`] performs the two stages in order: an algebraic Taubin circle
//! fit of the transverse coordinates, then an ordinary least-squares line fit
//! of z against the transverse radius. Fewer than three input points, or a
//! degenerate (collinear) configuration that makes the circle fit singular,
//! yield `None` – the caller drops the track and moves on, nothing throws.
//!
//! The closed-form point/plane helpers used by the derivative engine live in
//! [`geometry`].

pub mod geometry;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::Centimeter;

/// Newton iteration cap for the Taubin characteristic polynomial.
const TAUBIN_MAX_ITER: usize = 99;

/// Helix fit parameters `(radius, x0, y0, zslope, z0)`.
///
/// Invariant: `radius > 0` for any value produced by [`fit_helix`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HelixParams {
    pub radius: Centimeter,
    pub x0: Centimeter,
    pub y0: Centimeter,
    pub zslope: f64,
    pub z0: Centimeter,
}

impl HelixParams {
    /// Parameters in solver order, the order used for local derivatives.
    pub fn as_array(&self) -> [f64; 5] {
        [self.radius, self.x0, self.y0, self.zslope, self.z0]
    }

    pub fn from_array(p: [f64; 5]) -> Self {
        HelixParams {
            radius: p[0],
            x0: p[1],
            y0: p[2],
            zslope: p[3],
            z0: p[4],
        }
    }
}

/// Fit a helix to a set of global 3D positions.
///
/// Stage 1 fits a circle to the transverse coordinates; stage 2 fits a line
/// to (transverse radius, z). Returns `None` when fewer than three points
/// are supplied or either stage is singular.
pub fn fit_helix(points: &[Vector3<f64>]) -> Option<HelixParams> {
    if points.len() < 3 {
        return None;
    }

    let (radius, x0, y0) = fit_circle_taubin(points)?;
    let (zslope, z0) = fit_z_line(points)?;

    Some(HelixParams {
        radius,
        x0,
        y0,
        zslope,
        z0,
    })
}

/// Algebraic circle fit (Taubin) of the transverse coordinates.
///
/// Works on centered moments and finds the smallest positive root of the
/// characteristic cubic by Newton iteration from zero. Collinear points make
/// the center solve singular; that case returns `None`.
fn fit_circle_taubin(points: &[Vector3<f64>]) -> Option<(f64, f64, f64)> {
    let n = points.len() as f64;

    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;

    // Centered second and third moments
    let (mut mxx, mut myy, mut mxy) = (0.0, 0.0, 0.0);
    let (mut mxz, mut myz, mut mzz) = (0.0, 0.0, 0.0);
    for p in points {
        let xi = p.x - mean_x;
        let yi = p.y - mean_y;
        let zi = xi * xi + yi * yi;
        mxx += xi * xi;
        myy += yi * yi;
        mxy += xi * yi;
        mxz += xi * zi;
        myz += yi * zi;
        mzz += zi * zi;
    }
    mxx /= n;
    myy /= n;
    mxy /= n;
    mxz /= n;
    myz /= n;
    mzz /= n;

    let mz = mxx + myy;
    let cov_xy = mxx * myy - mxy * mxy;
    let var_z = mzz - mz * mz;

    let a3 = 4.0 * mz;
    let a2 = -3.0 * mz * mz - mzz;
    let a1 = var_z * mz + 4.0 * cov_xy * mz - mxz * mxz - myz * myz;
    let a0 = mxz * (mxz * myy - myz * mxy) + myz * (myz * mxx - mxz * mxy) - var_z * cov_xy;
    let a22 = a2 + a2;
    let a33 = a3 + a3 + a3;

    // Newton from x = 0; the Taubin cubic always has its relevant root there
    let mut x = 0.0;
    let mut y = a0;
    for _ in 0..TAUBIN_MAX_ITER {
        let dy = a1 + x * (a22 + a33 * x);
        let x_new = x - y / dy;
        if !x_new.is_finite() || x_new == x {
            break;
        }
        let y_new = a0 + x_new * (a1 + x_new * (a2 + x_new * a3));
        if y_new.abs() > y.abs() {
            break;
        }
        x = x_new;
        y = y_new;
    }

    let det = x * x - x * mz + cov_xy;
    if det.abs() < f64::EPSILON || !det.is_finite() {
        return None;
    }

    let xc = (mxz * (myy - x) - myz * mxy) / det / 2.0;
    let yc = (myz * (mxx - x) - mxz * mxy) / det / 2.0;
    let radius = (xc * xc + yc * yc + mz).sqrt();
    if !radius.is_finite() || radius <= 0.0 {
        return None;
    }

    Some((radius, xc + mean_x, yc + mean_y))
}

/// Ordinary least-squares fit of z against the transverse radius.
fn fit_z_line(points: &[Vector3<f64>]) -> Option<(f64, f64)> {
    let n = points.len() as f64;

    let (mut sum_r, mut sum_z, mut sum_rz, mut sum_rr) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        let r = (p.x * p.x + p.y * p.y).sqrt();
        sum_r += r;
        sum_z += p.z;
        sum_rz += r * p.z;
        sum_rr += r * r;
    }

    let denom = n * sum_rr - sum_r * sum_r;
    if denom.abs() < f64::EPSILON {
        // all points at the same transverse radius
        return None;
    }

    let slope = (n * sum_rz - sum_r * sum_z) / denom;
    let intercept = (sum_z - slope * sum_r) / n;
    Some((slope, intercept))
}
