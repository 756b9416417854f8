//! Shared fixtures: an ideal barrel geometry whose sensors sit exactly on a
//! reference helix, with clusters measured at the sensor centers. Feeding
//! these through the fitter must reproduce the generating helix with zero
//! residuals.
#![allow(dead_code)]

use helifit::clusters::{Cluster, ClusterStore};
use helifit::constants::ClusterKeys;
use helifit::detector::{ClusterKey, SensorAddress};
use helifit::distortion::DriftGeometry;
use helifit::geometry::SensorRegistry;
use helifit::helix::HelixParams;
use helifit::seeds::TrackSeed;
use nalgebra::{Isometry3, Matrix3, Rotation3, Translation3, UnitQuaternion, Vector2, Vector3};

/// Transverse radii of the silicon barrel layers (cm).
pub const SILICON_RADII: [f64; 7] = [2.5, 3.2, 3.9, 7.2, 7.8, 9.6, 10.2];

/// Innermost TPC layer radius and radial layer spacing (cm).
pub const TPC_INNER_RADIUS: f64 = 30.0;
pub const TPC_LAYER_SPACING: f64 = 0.55;

/// A helix that crosses the whole barrel: transverse circle of radius 28 cm
/// through the origin region, moderate z slope.
pub fn reference_helix() -> HelixParams {
    HelixParams {
        radius: 28.0,
        x0: 24.0,
        y0: 16.0,
        zslope: 0.35,
        z0: 0.4,
    }
}

/// The point of the helix at the given transverse radius from the beamline
/// (the intersection of the fitted circle with the layer cylinder).
pub fn helix_point_at_radius(params: &HelixParams, layer_radius: f64) -> Vector3<f64> {
    let center = Vector2::new(params.x0, params.y0);
    let d = center.norm();

    // two-circle intersection: beamline cylinder and the helix circle
    let a = (layer_radius * layer_radius - params.radius * params.radius + d * d) / (2.0 * d);
    let h = (layer_radius * layer_radius - a * a).sqrt();
    let along = center / d;
    let perp = Vector2::new(-along.y, along.x);
    let transverse = along * a + perp * h;

    let r = transverse.norm();
    Vector3::new(transverse.x, transverse.y, params.zslope * r + params.z0)
}

/// Local-to-global transform of a barrel sensor centered at `center`:
/// normal radial, local x azimuthal, local y along the beamline.
pub fn barrel_sensor_transform(center: &Vector3<f64>) -> Isometry3<f64> {
    let phi = center.y.atan2(center.x);
    let r_hat = Vector3::new(phi.cos(), phi.sin(), 0.0);
    let phi_hat = Vector3::new(-phi.sin(), phi.cos(), 0.0);
    let z_hat = Vector3::z();

    let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[
        phi_hat, z_hat, r_hat,
    ]));
    Isometry3::from_parts(
        Translation3::new(center.x, center.y, center.z),
        UnitQuaternion::from_rotation_matrix(&rotation),
    )
}

/// Cluster key of the fixture sensor on a given layer.
pub fn fixture_key(layer: u8) -> ClusterKey {
    let address = match layer {
        0..=2 => SensorAddress::Pixel { stave: 1, chip: 2 },
        3..=6 => SensorAddress::Strip {
            ladder_phi: 3,
            ladder_z: 1,
        },
        l if l < 55 => SensorAddress::Tpc {
            sector: 4,
            side: 1,
        },
        _ => SensorAddress::Micromegas { tile: 0 },
    };
    ClusterKey::new(layer, address)
}

/// One ideal measurement: a sensor centered on the helix point of its layer,
/// with the cluster measured exactly at the sensor center.
pub struct IdealMeasurement {
    pub key: ClusterKey,
    pub transform: Isometry3<f64>,
    pub cluster: Cluster,
}

pub fn ideal_measurement(params: &HelixParams, layer: u8, layer_radius: f64) -> IdealMeasurement {
    let key = fixture_key(layer);
    let center = helix_point_at_radius(params, layer_radius);
    let transform = barrel_sensor_transform(&center);

    // TPC clusters carry a drift time in local y; pick the time that decodes
    // to local z = 0, i.e. the sensor center
    let cluster = match key.address {
        SensorAddress::Tpc { .. } => {
            let drift = DriftGeometry::default();
            let time_at_center = drift.readout_plane_z / drift.drift_velocity;
            Cluster::with_errors(0.0, time_at_center, 0.01, 0.03)
        }
        _ => Cluster::with_errors(0.0, 0.0, 0.003, 0.003),
    };

    IdealMeasurement {
        key,
        transform,
        cluster,
    }
}

/// A five-cluster silicon event on the reference helix: registry, cluster
/// store, and the seed referencing all five.
pub fn silicon_event(
    params: &HelixParams,
) -> (SensorRegistry, ClusterStore, TrackSeed) {
    let mut registry = SensorRegistry::new();
    let mut store = ClusterStore::new();
    let mut keys = ClusterKeys::new();

    for layer in 0u8..5 {
        let m = ideal_measurement(params, layer, SILICON_RADII[layer as usize]);
        registry.insert_ideal(m.key, m.transform);
        store.insert(m.key, m.cluster);
        keys.push(m.key);
    }

    (registry, store, TrackSeed::new(0, 1, keys))
}

/// A TPC event spanning every unmasked readout layer.
pub fn tpc_event(
    params: &HelixParams,
    masked: &[u8],
) -> (SensorRegistry, ClusterStore, TrackSeed) {
    let mut registry = SensorRegistry::new();
    let mut store = ClusterStore::new();
    let mut keys = ClusterKeys::new();

    for layer in 7u8..55 {
        if masked.contains(&layer) {
            continue;
        }
        let radius = TPC_INNER_RADIUS + TPC_LAYER_SPACING * (layer - 7) as f64;
        let m = ideal_measurement(params, layer, radius);
        registry.insert_ideal(m.key, m.transform);
        store.insert(m.key, m.cluster);
        keys.push(m.key);
    }

    (registry, store, TrackSeed::new(0, -1, keys))
}
