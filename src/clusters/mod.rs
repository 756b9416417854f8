//! # Clusters and the cluster provider seam
//!
//! A [`Cluster`] is one detector hit: local 2D coordinates on its sensor plus
//! an anisotropic measurement error. For TPC clusters `local_y` stores the
//! measured **drift time**, not a position; the fitter converts it to a local
//! z coordinate through [`crate::distortion::DriftGeometry`] before any
//! comparison with the fit.
//!
//! The fitter consumes clusters through the [`ClusterProvider`] trait so the
//! hosting framework's container can be injected directly. [`ClusterStore`]
//! is the in-memory implementation used in tests and standalone runs.

pub mod error_models;

use std::collections::HashMap;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use crate::constants::Centimeter;
use crate::detector::ClusterKey;

/// Cluster calibration schema version, selecting the measurement-error model.
///
/// The three models are mutually exclusive; which one applies is a property
/// of the upstream clusterizer that produced the hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterSchema {
    /// Errors stored directly on the cluster.
    V3,
    /// Errors parameterized from the cluster radius and drift length.
    V4,
    /// Radial parameterization additionally scaled by the cluster size.
    V5,
}

/// A single detector hit with local coordinates and measurement errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    /// Local x on the sensor plane (cm).
    pub local_x: Centimeter,
    /// Local y on the sensor plane (cm); drift time for TPC clusters.
    pub local_y: f64,
    /// Measurement error along the in-plane azimuthal direction (cm).
    pub rphi_error: Centimeter,
    /// Measurement error along the longitudinal direction (cm).
    pub z_error: Centimeter,
    /// Cluster extent in strips/pads along phi.
    pub phi_size: u8,
    /// Cluster extent along z / time bins.
    pub z_size: u8,
    pub schema: ClusterSchema,
}

impl Cluster {
    /// A schema-V3 cluster carrying its own errors.
    pub fn with_errors(
        local_x: Centimeter,
        local_y: f64,
        rphi_error: Centimeter,
        z_error: Centimeter,
    ) -> Self {
        Cluster {
            local_x,
            local_y,
            rphi_error,
            z_error,
            phi_size: 1,
            z_size: 1,
            schema: ClusterSchema::V3,
        }
    }
}

/// Cluster seam: resolve a measurement by key and enumerate the container.
///
/// Enumeration is only used by the full-track refit, which scans the silicon
/// subdetectors for clusters close to an already-fitted helix.
pub trait ClusterProvider {
    fn cluster(&self, key: &ClusterKey) -> Option<&Cluster>;

    fn keys(&self) -> Box<dyn Iterator<Item = ClusterKey> + '_>;
}

/// In-memory cluster container keyed by [`ClusterKey`].
#[derive(Debug, Clone, Default)]
pub struct ClusterStore {
    clusters: HashMap<ClusterKey, Cluster, RandomState>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: ClusterKey, cluster: Cluster) {
        self.clusters.insert(key, cluster);
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

impl ClusterProvider for ClusterStore {
    fn cluster(&self, key: &ClusterKey) -> Option<&Cluster> {
        self.clusters.get(key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = ClusterKey> + '_> {
        Box::new(self.clusters.keys().copied())
    }
}
