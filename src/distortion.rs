//! # TPC position corrections
//!
//! TPC clusters measure a drift **time**, not a z position, and the drifting
//! charge is displaced by field distortions. This module holds the
//! corrections applied to TPC clusters after the geometry transform to the
//! global frame:
//!
//! 1. drift-time → local-z conversion ([`DriftGeometry`]),
//! 2. beam-crossing z shift ([`CrossingCorrection`]),
//! 3. up to three cascaded distortion maps (static, run-averaged,
//!    fluctuation), each an implementation of [`DistortionMap`].
//!
//! Silicon and micromegas clusters are untouched by everything here.

use nalgebra::Vector3;

use crate::constants::Centimeter;
use crate::detector::{ClusterKey, SensorAddress, Subdetector};

/// A field-distortion correction: maps a nominal global position to the
/// corrected one. Implementations typically interpolate a measured map.
pub trait DistortionMap {
    fn corrected(&self, position: &Vector3<f64>) -> Vector3<f64>;
}

/// Drift geometry of the TPC gas volume.
#[derive(Debug, Clone)]
pub struct DriftGeometry {
    /// Drift velocity in cm per time-sample unit.
    pub drift_velocity: f64,
    /// Local z of the readout plane (cm).
    pub readout_plane_z: Centimeter,
}

impl Default for DriftGeometry {
    fn default() -> Self {
        DriftGeometry {
            drift_velocity: 8.0e-3,
            readout_plane_z: 52.89,
        }
    }
}

impl DriftGeometry {
    /// Convert a measured drift time into the local z position on the sensor.
    ///
    /// The drift length is measured from the readout plane; side 0 (south,
    /// negative z) mirrors the sign.
    pub fn time_to_local_z(&self, drift_time: f64, side: u8) -> Centimeter {
        let zloc = self.readout_plane_z - drift_time * self.drift_velocity;
        if side == 0 {
            -zloc
        } else {
            zloc
        }
    }
}

/// Correction of the global z for the beam crossing a seed belongs to.
///
/// Out-of-time tracks drift for a shorter or longer interval; the offset is
/// one fixed length per crossing, signed toward the readout plane.
#[derive(Debug, Clone)]
pub struct CrossingCorrection {
    /// z displacement per beam crossing (cm).
    pub z_per_crossing: Centimeter,
}

impl Default for CrossingCorrection {
    fn default() -> Self {
        CrossingCorrection {
            z_per_crossing: 0.0106,
        }
    }
}

impl CrossingCorrection {
    pub fn correct_z(&self, z: f64, side: u8, crossing: i16) -> f64 {
        let shift = crossing as f64 * self.z_per_crossing;
        if side == 0 {
            z + shift
        } else {
            z - shift
        }
    }
}

/// The full correction chain applied to TPC cluster global positions.
#[derive(Default)]
pub struct TpcCorrections {
    pub drift: DriftGeometry,
    pub crossing: CrossingCorrection,
    pub static_map: Option<Box<dyn DistortionMap>>,
    pub average_map: Option<Box<dyn DistortionMap>>,
    pub fluctuation_map: Option<Box<dyn DistortionMap>>,
}

impl TpcCorrections {
    /// Apply all configured corrections to the global position of a TPC
    /// cluster. Non-TPC keys are returned unchanged.
    pub fn correct_global(
        &self,
        key: &ClusterKey,
        crossing: i16,
        global: Vector3<f64>,
    ) -> Vector3<f64> {
        if key.subdetector() != Subdetector::Tpc {
            return global;
        }
        let side = match key.address {
            SensorAddress::Tpc { side, .. } => side,
            _ => return global,
        };

        let mut corrected = global;
        corrected.z = self.crossing.correct_z(corrected.z, side, crossing);

        for map in [&self.static_map, &self.average_map, &self.fluctuation_map]
            .into_iter()
            .flatten()
        {
            corrected = map.corrected(&corrected);
        }
        corrected
    }
}
