//! # Sensor surfaces and the geometry provider seam
//!
//! The fitter never owns detector geometry. It sees planar sensors through
//! the [`SurfaceProvider`] trait, queried per cluster key and per
//! [`TransformKind`] – the caller states on **every** query whether it wants
//! the aligned (calibrated) or the ideal (as-designed) placement. There is no
//! process-wide toggle.
//!
//! A [`SensorSurface`] is a value: center, outward unit normal, and the full
//! local-to-global isometry. Local coordinates are `(x, y)` in the sensor
//! plane with `z = 0` on the plane, so the local z axis maps to the surface
//! normal.
//!
//! [`SensorRegistry`] is the in-memory implementation used in tests and in
//! standalone runs; production embeddings implement [`SurfaceProvider`] over
//! their own geometry service.

use std::collections::HashMap;

use ahash::RandomState;
use nalgebra::{Isometry3, Point3, Vector3};

use crate::detector::ClusterKey;

/// Which placement of a sensor a geometry query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Placement including the current alignment corrections.
    Aligned,
    /// As-designed placement, ignoring alignment corrections.
    Ideal,
}

/// A planar sensor: center, outward unit normal, and local frame.
#[derive(Debug, Clone)]
pub struct SensorSurface {
    pub center: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub transform: Isometry3<f64>,
}

impl SensorSurface {
    /// Build a surface from its local-to-global isometry. The center is the
    /// translation part; the normal is the image of the local z axis.
    pub fn from_transform(transform: Isometry3<f64>) -> Self {
        let center = transform.translation.vector;
        let normal = transform.rotation * Vector3::z();
        SensorSurface {
            center,
            normal,
            transform,
        }
    }

    /// Map sensor-local coordinates to the global frame.
    pub fn local_to_global(&self, local: &Vector3<f64>) -> Vector3<f64> {
        (self.transform * Point3::from(*local)).coords
    }

    /// Map a global point into sensor-local coordinates.
    pub fn global_to_local(&self, global: &Vector3<f64>) -> Vector3<f64> {
        (self.transform.inverse() * Point3::from(*global)).coords
    }

    /// Unit vectors of the sensor-plane x and y axes, in the global frame.
    pub fn in_plane_axes(&self) -> (Vector3<f64>, Vector3<f64>) {
        (
            self.transform.rotation * Vector3::x(),
            self.transform.rotation * Vector3::y(),
        )
    }
}

/// Geometry seam: resolve the sensor surface a cluster was measured on.
///
/// Implementations return `None` for keys with no attached surface; the
/// fitter treats that as a per-measurement skip, never an error.
pub trait SurfaceProvider {
    fn surface(&self, key: &ClusterKey, kind: TransformKind) -> Option<SensorSurface>;
}

/// In-memory sensor table holding an aligned and an ideal placement per
/// sensor, keyed by cluster key.
#[derive(Debug, Clone, Default)]
pub struct SensorRegistry {
    sensors: HashMap<ClusterKey, SensorPlacement, RandomState>,
}

#[derive(Debug, Clone)]
struct SensorPlacement {
    aligned: Isometry3<f64>,
    ideal: Isometry3<f64>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensor with distinct aligned and ideal placements.
    pub fn insert(&mut self, key: ClusterKey, aligned: Isometry3<f64>, ideal: Isometry3<f64>) {
        self.sensors.insert(key, SensorPlacement { aligned, ideal });
    }

    /// Register a perfectly aligned sensor (aligned == ideal).
    pub fn insert_ideal(&mut self, key: ClusterKey, transform: Isometry3<f64>) {
        self.insert(key, transform, transform);
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl SurfaceProvider for SensorRegistry {
    fn surface(&self, key: &ClusterKey, kind: TransformKind) -> Option<SensorSurface> {
        self.sensors.get(key).map(|placement| {
            let transform = match kind {
                TransformKind::Aligned => placement.aligned,
                TransformKind::Ideal => placement.ideal,
            };
            SensorSurface::from_transform(transform)
        })
    }
}
