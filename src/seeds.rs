//! # Track seeds and per-track outputs
//!
//! Inputs: a [`TrackSeed`] is the upstream seeder's product – an ordered
//! cluster-key list, a charge, and a rough momentum scale. Seeds are
//! immutable here; the fitter never writes back into them.
//!
//! Outputs: for every accepted track the fitter produces
//!
//! - a vector of [`AlignmentState`] (one per accepted cluster: residual plus
//!   the full 2×5 local and 2×6 global derivative matrices, **unmasked**),
//!   keyed by track id in an [`AlignmentStateMap`];
//! - a [`FittedTrack`] for the diagnostic track map, with one
//!   [`TrackState`] (fit intersection and tangent) per cluster.
//!
//! Both maps use the same fast hasher as the rest of the crate. States are
//! moved into the maps when the track completes and never mutated afterward.

use std::collections::HashMap;

use ahash::RandomState;
use nalgebra::{SMatrix, Vector2, Vector3};

use crate::constants::{ClusterKeys, TrackId};
use crate::detector::ClusterKey;
use crate::helix::HelixParams;

/// One seed from the upstream seeding stage.
#[derive(Debug, Clone)]
pub struct TrackSeed {
    pub id: TrackId,
    /// Signed charge of the candidate, in units of e.
    pub charge: i8,
    /// Rough momentum scale from the seeder (GeV/c), used only for the
    /// diagnostic track map.
    pub momentum_estimate: f64,
    /// Beam crossing the seed was associated with.
    pub crossing: i16,
    pub cluster_keys: ClusterKeys,
}

impl TrackSeed {
    pub fn new(id: TrackId, charge: i8, cluster_keys: ClusterKeys) -> Self {
        TrackSeed {
            id,
            charge,
            momentum_estimate: 1.0,
            crossing: 0,
            cluster_keys,
        }
    }
}

/// The seed containers of one event, one per seeding stage.
#[derive(Debug, Clone, Default)]
pub struct EventSeeds {
    pub silicon: Vec<TrackSeed>,
    pub tpc: Vec<TrackSeed>,
}

impl EventSeeds {
    pub fn is_empty(&self) -> bool {
        self.silicon.is_empty() && self.tpc.is_empty()
    }
}

/// Residual and derivative matrices of one cluster on one fitted track.
///
/// The matrices are stored before fixed-parameter masking, so downstream
/// consumers see the full geometry; masking applies only to the emitted
/// solver records.
#[derive(Debug, Clone)]
pub struct AlignmentState {
    pub cluster_key: ClusterKey,
    pub residual: Vector2<f64>,
    pub local: SMatrix<f64, 2, 5>,
    pub global: SMatrix<f64, 2, 6>,
}

/// All alignment states of one track, in cluster iteration order.
pub type AlignmentStates = Vec<AlignmentState>;

/// Run-wide output map: track id → alignment states.
pub type AlignmentStateMap = HashMap<TrackId, AlignmentStates, RandomState>;

/// The fitted trajectory evaluated at one cluster's sensor.
#[derive(Debug, Clone)]
pub struct TrackState {
    pub cluster_key: ClusterKey,
    /// Intersection of the fitted helix with the sensor plane.
    pub position: Vector3<f64>,
    /// Unit tangent of the helix at the intersection.
    pub direction: Vector3<f64>,
}

/// Diagnostic record of one accepted track.
#[derive(Debug, Clone)]
pub struct FittedTrack {
    pub id: TrackId,
    pub charge: i8,
    pub params: HelixParams,
    /// Point of closest approach of the helix to the beamline.
    pub position: Vector3<f64>,
    /// Momentum estimate along the tangent at the innermost cluster.
    pub momentum: Vector3<f64>,
    pub states: Vec<TrackState>,
}

/// Run-wide diagnostic track map.
pub type TrackMap = HashMap<TrackId, FittedTrack, RandomState>;
