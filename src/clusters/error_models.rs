//! # Cluster measurement-error models
//!
//! Three mutually exclusive parameterizations of the per-cluster measurement
//! error, selected by the cluster's [`ClusterSchema`]:
//!
//! - **V3** – the clusterizer stored the errors directly; use them as-is.
//! - **V4** – errors reconstructed from geometry: intrinsic sensor resolution
//!   plus, for the TPC, a diffusion term growing with the drift length.
//! - **V5** – the V4 parameterization scaled by the measured cluster size,
//!   which tracks the charge sharing of wide clusters.
//!
//! All values are in centimeters. Residual weighting uses these sigmas
//! directly; a per-layer inflation factor is applied by the caller, not here.

use nalgebra::{Vector2, Vector3};

use crate::clusters::{Cluster, ClusterSchema};
use crate::detector::{ClusterKey, Subdetector};

/// Intrinsic resolution (rphi, z) of a silicon pixel sensor.
const PIXEL_SIGMA: (f64, f64) = (0.0030, 0.0030);

/// Strip pitch / sqrt(12) in rphi; one-strip-length / sqrt(12) along z.
const STRIP_SIGMA: (f64, f64) = (0.0023, 0.46);

/// Micromegas tile resolution (rphi, z).
const MICROMEGAS_SIGMA: (f64, f64) = (0.0300, 0.0500);

/// TPC intrinsic resolution at zero drift (rphi, z).
const TPC_SIGMA0: (f64, f64) = (0.0150, 0.0700);

/// TPC diffusion coefficients: sigma^2 grows linearly with the drift length.
const TPC_DIFFUSION: (f64, f64) = (6.0e-5, 1.2e-4);

/// Per-size inflation applied by the V5 model for each pad/strip beyond one.
const SIZE_INFLATION: f64 = 0.2;

/// Measurement error of one cluster, per local coordinate direction.
///
/// Arguments
/// -----------------
/// * `cluster`: the measurement; its schema selects the model.
/// * `key`: cluster key, used for the subdetector tag.
/// * `global`: corrected global position, used for the TPC drift length.
///
/// Return
/// ----------
/// * `Vector2(sigma_rphi, sigma_z)` in cm. Values are finite for any finite
///   input; corrupted upstream errors (NaN) propagate so the caller's
///   acceptance filter can drop the record.
pub fn cluster_sigma(cluster: &Cluster, key: &ClusterKey, global: &Vector3<f64>) -> Vector2<f64> {
    match cluster.schema {
        ClusterSchema::V3 => Vector2::new(cluster.rphi_error, cluster.z_error),
        ClusterSchema::V4 => parameterized_sigma(key, global),
        ClusterSchema::V5 => {
            let base = parameterized_sigma(key, global);
            Vector2::new(
                base.x * size_factor(cluster.phi_size),
                base.y * size_factor(cluster.z_size),
            )
        }
    }
}

fn parameterized_sigma(key: &ClusterKey, global: &Vector3<f64>) -> Vector2<f64> {
    let (s_phi, s_z) = match key.subdetector() {
        Subdetector::PixelBarrel => PIXEL_SIGMA,
        Subdetector::StripBarrel => STRIP_SIGMA,
        Subdetector::Micromegas => MICROMEGAS_SIGMA,
        Subdetector::Tpc => {
            let drift = global.z.abs();
            let var_phi = TPC_SIGMA0.0 * TPC_SIGMA0.0 + TPC_DIFFUSION.0 * drift;
            let var_z = TPC_SIGMA0.1 * TPC_SIGMA0.1 + TPC_DIFFUSION.1 * drift;
            return Vector2::new(var_phi.sqrt(), var_z.sqrt());
        }
    };
    Vector2::new(s_phi, s_z)
}

fn size_factor(size: u8) -> f64 {
    1.0 + SIZE_INFLATION * (size.saturating_sub(1)) as f64
}
