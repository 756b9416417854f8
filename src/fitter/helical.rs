//! # Per-event orchestration of fit, derivatives, and record emission
//!
//! [`HelicalFitter`] owns the run-wide resources – the solver record stream,
//! the constraint table, the optional diagnostics file, and the output maps
//! – and processes events one at a time. Per track:
//!
//! ```text
//! seed → cluster keys → global positions (+ TPC corrections)
//!      → helical fit                       (failed → drop track)
//!      → [FullTrack: silicon association + refit]
//!      → quality gates                     (failed → drop track)
//!      → per cluster: intersection, residual, derivatives
//!      → masked records to the solver stream, one per coordinate
//!      → end_record(); states moved into the output maps
//! ```
//!
//! Failures are isolated at two granularities, and nothing is retried: a
//! failed fit or gate silently drops the **track**, a missing surface or a
//! non-finite residual silently drops the **measurement**. Only construction
//! can fail hard (output files, invalid parameters).

use itertools::izip;
use log::{debug, info, warn};
use nalgebra::{RowSVector, SMatrix, Vector2, Vector3};

use crate::alignment::constraints::ConstraintWriter;
use crate::alignment::global_labels;
use crate::clusters::error_models::cluster_sigma;
use crate::clusters::{Cluster, ClusterProvider};
use crate::constants::{ClusterKeys, NGL, NLC};
use crate::detector::{ClusterKey, SensorAddress, Subdetector};
use crate::diagnostics::{DiagnosticRow, DiagnosticsWriter};
use crate::distortion::TpcCorrections;
use crate::fitter::{FitMode, FitterParams};
use crate::geometry::{SensorSurface, SurfaceProvider, TransformKind};
use crate::helifit_errors::HelifitError;
use crate::helix::geometry::{helix_surface_intersection, helix_tangent};
use crate::helix::{fit_helix, HelixParams};
use crate::mille::MilleWriter;
use crate::seeds::{
    AlignmentState, AlignmentStateMap, EventSeeds, FittedTrack, TrackMap, TrackSeed, TrackState,
};

/// Counters of one processed event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventSummary {
    pub tracks_seen: usize,
    pub tracks_accepted: usize,
    pub records_written: usize,
}

/// Everything a finished run leaves behind, besides the files on disk.
pub struct RunOutputs {
    pub alignment_states: AlignmentStateMap,
    pub tracks: TrackMap,
    pub constraints_written: usize,
}

/// The per-run fitting engine. See the module documentation for the track
/// pipeline; see [`FitterParams`] for the configuration surface.
pub struct HelicalFitter {
    params: FitterParams,
    mille: MilleWriter,
    constraints: ConstraintWriter,
    diagnostics: Option<DiagnosticsWriter>,
    tpc_corrections: TpcCorrections,
    alignment_states: AlignmentStateMap,
    tracks: TrackMap,
    event: i64,
}

impl HelicalFitter {
    /// Open the output streams and set up a run.
    ///
    /// This is the only hard-failure point of the pipeline: unwritable
    /// output paths abort the run before any event is touched.
    pub fn new(params: FitterParams) -> Result<Self, HelifitError> {
        let mille = MilleWriter::create(&params.data_path, &params.steering_path, params.text_mode)?;
        let diagnostics = params
            .diagnostics_path
            .as_deref()
            .map(DiagnosticsWriter::create)
            .transpose()?;

        info!(
            "HelicalFitter run setup: mode {:?}, groupings {:?}, data file {}",
            params.fit_mode, params.grouping, params.data_path
        );

        Ok(HelicalFitter {
            params,
            mille,
            constraints: ConstraintWriter::new(),
            diagnostics,
            tpc_corrections: TpcCorrections::default(),
            alignment_states: AlignmentStateMap::default(),
            tracks: TrackMap::default(),
            event: -1,
        })
    }

    /// Replace the default TPC correction chain (drift geometry, crossing
    /// correction, distortion maps).
    pub fn with_tpc_corrections(mut self, corrections: TpcCorrections) -> Self {
        self.tpc_corrections = corrections;
        self
    }

    pub fn params(&self) -> &FitterParams {
        &self.params
    }

    /// Alignment states accumulated so far, keyed by track id.
    pub fn alignment_states(&self) -> &AlignmentStateMap {
        &self.alignment_states
    }

    /// Diagnostic track map accumulated so far.
    pub fn tracks(&self) -> &TrackMap {
        &self.tracks
    }

    /// Process one event: all seeds of the container selected by the fit
    /// mode, each fully fitted and emitted before the next.
    pub fn process_event<G, C>(
        &mut self,
        seeds: &EventSeeds,
        geometry: &G,
        clusters: &C,
    ) -> Result<EventSummary, HelifitError>
    where
        G: SurfaceProvider,
        C: ClusterProvider,
    {
        self.event += 1;
        let mut summary = EventSummary::default();

        if seeds.is_empty() {
            return Ok(summary);
        }

        let driving: &[TrackSeed] = match self.params.fit_mode {
            FitMode::SiliconOnly => &seeds.silicon,
            FitMode::TpcOnly | FitMode::FullTrack => &seeds.tpc,
        };

        debug!(
            "event {}: {} silicon seeds, {} tpc seeds",
            self.event,
            seeds.silicon.len(),
            seeds.tpc.len()
        );

        for seed in driving {
            summary.tracks_seen += 1;
            if let Some(records) = self.process_seed(seed, geometry, clusters)? {
                summary.tracks_accepted += 1;
                summary.records_written += records;
            }
        }

        Ok(summary)
    }

    /// Close the run: commit the record stream, write the constraint file,
    /// and hand out the in-memory outputs.
    pub fn finish(self) -> Result<RunOutputs, HelifitError> {
        self.mille.finish()?;
        self.constraints.write_file(&self.params.constraint_path)?;
        if let Some(mut diagnostics) = self.diagnostics {
            diagnostics.flush()?;
        }

        info!(
            "HelicalFitter run done: {} tracks, {} constraints",
            self.tracks.len(),
            self.constraints.len()
        );

        Ok(RunOutputs {
            constraints_written: self.constraints.len(),
            alignment_states: self.alignment_states,
            tracks: self.tracks,
        })
    }

    /// Fit one seed and emit its records. `Ok(None)` marks a dropped track;
    /// `Ok(Some(n))` an accepted one with `n` emitted measurements.
    fn process_seed<G, C>(
        &mut self,
        seed: &TrackSeed,
        geometry: &G,
        clusters: &C,
    ) -> Result<Option<usize>, HelifitError>
    where
        G: SurfaceProvider,
        C: ClusterProvider,
    {
        let (mut keys, mut positions) = self.collect_clusters(seed, geometry, clusters);
        if keys.len() < 3 {
            debug!("track {}: only {} usable clusters", seed.id, keys.len());
            return Ok(None);
        }

        let Some(mut fitpars) = fit_helix(&positions) else {
            debug!("track {}: helical fit failed", seed.id);
            return Ok(None);
        };

        // extend TPC seeds into the silicon and refit the combined track
        if self.params.fit_mode == FitMode::FullTrack {
            let matched =
                self.associate_silicon(&fitpars, seed, geometry, clusters, &mut keys, &mut positions);
            if matched < self.params.min_silicon_for_match {
                debug!("track {}: silicon match found {} clusters", seed.id, matched);
                return Ok(None);
            }
            match fit_helix(&positions) {
                Some(refit) => fitpars = refit,
                None => {
                    debug!("track {}: full-track refit failed", seed.id);
                    return Ok(None);
                }
            }
        }

        debug!(
            "track {}: radius {} x0 {} y0 {} zslope {} z0 {}",
            seed.id, fitpars.radius, fitpars.x0, fitpars.y0, fitpars.zslope, fitpars.z0
        );

        let nsilicon = keys.iter().filter(|key| key.is_silicon()).count();
        let ntpc = keys
            .iter()
            .filter(|key| key.subdetector() == Subdetector::Tpc)
            .count();

        // quality gates: plain count thresholds, irrecoverable per track
        match self.params.fit_mode {
            FitMode::TpcOnly | FitMode::FullTrack if ntpc < self.params.min_tpc_clusters => {
                return Ok(None);
            }
            FitMode::SiliconOnly | FitMode::FullTrack
                if nsilicon < self.params.min_silicon_clusters =>
            {
                return Ok(None);
            }
            _ => {}
        }

        let mut track = self.init_track(seed, &fitpars, &keys, &positions);
        let mut states = Vec::with_capacity(keys.len());
        let mut records = 0usize;

        for (key, global) in izip!(&keys, &positions) {
            let Some(cluster) = clusters.cluster(key) else {
                continue;
            };
            records += self.process_measurement(
                key, cluster, global, &fitpars, seed, nsilicon, ntpc,
                geometry, &mut track, &mut states,
            )?;
        }

        self.alignment_states.insert(seed.id, states);
        self.tracks.insert(seed.id, track);
        // close out this track in the solver stream
        self.mille.end_record()?;

        Ok(Some(records))
    }

    /// Residual, derivatives, and records of a single cluster. Returns the
    /// number of emitted measurements (0, 1, or 2).
    #[allow(clippy::too_many_arguments)]
    fn process_measurement<G>(
        &mut self,
        key: &ClusterKey,
        cluster: &Cluster,
        global: &Vector3<f64>,
        fitpars: &HelixParams,
        seed: &TrackSeed,
        nsilicon: usize,
        ntpc: usize,
        geometry: &G,
        track: &mut FittedTrack,
        states: &mut Vec<AlignmentState>,
    ) -> Result<usize, HelifitError>
    where
        G: SurfaceProvider,
    {
        let Some(surface) = geometry.surface(key, TransformKind::Aligned) else {
            warn!("no aligned surface for cluster {key}");
            return Ok(0);
        };

        let angle_offset = self.params.tangent_angle_offset;
        let Some((fitpoint, pca, tangent)) =
            helix_surface_intersection(&surface, fitpars, global, angle_offset)
        else {
            return Ok(0);
        };

        // compare measured and fitted positions in the sensor frame
        let fit_local = surface.global_to_local(&fitpoint);
        let measured = self.measured_local(key, cluster);
        let residual = Vector2::new(measured.x - fit_local.x, measured.y - fit_local.y);

        let sigma = cluster_sigma(cluster, key, global);
        if !sigma.x.is_finite() || !sigma.y.is_finite() {
            return Ok(0);
        }

        let labels = global_labels(key, &self.params.grouping);

        // strip sensors stand tilted in the transverse plane; tie their x/y
        // translation parameters once per alignment group
        if key.subdetector() == Subdetector::StripBarrel {
            if let Some(ideal) = geometry.surface(key, TransformKind::Ideal) {
                self.constraints.register(labels[3], labels[4], &ideal.center);
            }
        }

        let Some((local_x, local_y)) = crate::derivatives::local_derivatives(
            &surface,
            fitpars,
            global,
            &self.params.fd_step,
            angle_offset,
        ) else {
            return Ok(0);
        };
        let (mut global_x, mut global_y) =
            crate::derivatives::global_derivatives(&surface, &tangent, &fitpoint);

        track.states.push(TrackState {
            cluster_key: *key,
            position: fitpoint,
            direction: tangent,
        });
        states.push(AlignmentState {
            cluster_key: *key,
            residual,
            local: SMatrix::from_rows(&[RowSVector::from(local_x), RowSVector::from(local_y)]),
            global: SMatrix::from_rows(&[RowSVector::from(global_x), RowSVector::from(global_y)]),
        });

        // frozen parameters lose their derivative, nothing else changes
        self.params.fixed.apply_mask(key, &mut global_x, &mut global_y);

        let inflation = self
            .params
            .layer_error_inflation
            .get(&key.layer)
            .copied()
            .unwrap_or(1.0);

        if let Some(diagnostics) = self.diagnostics.as_mut() {
            let row = diagnostic_row(
                self.event, seed, key, geometry, &surface, fitpars, global, &fitpoint,
                &pca, &tangent, &measured, &fit_local, &labels, &local_x, &global_x, &local_y,
                &global_y, nsilicon, ntpc,
            );
            diagnostics.write(&row)?;
        }

        let ceiling = self.params.error_ceiling;
        let mut written = 0;

        if residual.x.is_finite() && sigma.x < ceiling {
            self.mille
                .add_measurement(&local_x, &global_x, &labels, residual.x, inflation * sigma.x);
            written += 1;
        }

        // strips measure only the local x coordinate
        if residual.y.is_finite()
            && sigma.y < ceiling
            && key.subdetector() != Subdetector::StripBarrel
        {
            self.mille
                .add_measurement(&local_y, &global_y, &labels, residual.y, inflation * sigma.y);
            written += 1;
        }

        Ok(written)
    }

    /// Usable clusters of a seed with their corrected global positions:
    /// cluster present, surface attached, layer not administratively masked.
    fn collect_clusters<G, C>(
        &self,
        seed: &TrackSeed,
        geometry: &G,
        clusters: &C,
    ) -> (ClusterKeys, Vec<Vector3<f64>>)
    where
        G: SurfaceProvider,
        C: ClusterProvider,
    {
        let mut keys = ClusterKeys::new();
        let mut positions = Vec::with_capacity(seed.cluster_keys.len());

        for key in &seed.cluster_keys {
            let Some(cluster) = clusters.cluster(key) else {
                warn!("track {}: no cluster for key {key}", seed.id);
                continue;
            };
            let Some(surface) = geometry.surface(key, TransformKind::Aligned) else {
                continue;
            };
            if self.params.masked_layers.contains(&key.layer) {
                continue;
            }
            keys.push(*key);
            positions.push(self.cluster_global_position(key, cluster, &surface, seed.crossing));
        }
        (keys, positions)
    }

    fn cluster_global_position(
        &self,
        key: &ClusterKey,
        cluster: &Cluster,
        surface: &SensorSurface,
        crossing: i16,
    ) -> Vector3<f64> {
        let local = self.measured_local(key, cluster);
        let global = surface.local_to_global(&Vector3::new(local.x, local.y, 0.0));
        self.tpc_corrections.correct_global(key, crossing, global)
    }

    /// Measured local coordinates of a cluster; TPC drift times are
    /// converted to a local z position first.
    fn measured_local(&self, key: &ClusterKey, cluster: &Cluster) -> Vector2<f64> {
        match key.address {
            SensorAddress::Tpc { side, .. } => Vector2::new(
                cluster.local_x,
                self.tpc_corrections
                    .drift
                    .time_to_local_z(cluster.local_y, side),
            ),
            _ => Vector2::new(cluster.local_x, cluster.local_y),
        }
    }

    /// Scan the silicon subdetectors for clusters within the DCA cut of the
    /// fitted helix and append them to the key/position lists. Returns the
    /// number of silicon clusters on the track afterwards.
    fn associate_silicon<G, C>(
        &self,
        fitpars: &HelixParams,
        seed: &TrackSeed,
        geometry: &G,
        clusters: &C,
        keys: &mut ClusterKeys,
        positions: &mut Vec<Vector3<f64>>,
    ) -> usize
    where
        G: SurfaceProvider,
        C: ClusterProvider,
    {
        let angle_offset = self.params.tangent_angle_offset;
        let mut added = Vec::new();

        for key in clusters.keys() {
            if !key.is_silicon() || keys.contains(&key) {
                continue;
            }
            let Some(cluster) = clusters.cluster(&key) else {
                continue;
            };
            let Some(surface) = geometry.surface(&key, TransformKind::Aligned) else {
                continue;
            };
            let global = self.cluster_global_position(&key, cluster, &surface, seed.crossing);

            let Some((pca, _)) = helix_tangent(fitpars, &global, angle_offset) else {
                continue;
            };
            if (global - pca).norm() < self.params.dca_cut {
                added.push((key, global));
            }
        }

        // innermost first, so the combined track stays ordered by layer
        added.sort_by_key(|(key, _)| key.layer);
        for (key, global) in added {
            keys.push(key);
            positions.push(global);
        }

        keys.iter().filter(|key| key.is_silicon()).count()
    }

    /// Diagnostic track skeleton: PCA to the beamline and the seed momentum
    /// scale along the tangent at the innermost cluster.
    fn init_track(
        &self,
        seed: &TrackSeed,
        fitpars: &HelixParams,
        keys: &ClusterKeys,
        positions: &[Vector3<f64>],
    ) -> FittedTrack {
        let angle_offset = self.params.tangent_angle_offset;

        let position = helix_tangent(fitpars, &Vector3::zeros(), angle_offset)
            .map(|(pca, _)| pca)
            .unwrap_or_else(Vector3::zeros);

        let innermost = keys
            .iter()
            .enumerate()
            .min_by_key(|(_, key)| key.layer)
            .map(|(index, _)| index);
        let momentum = innermost
            .and_then(|index| helix_tangent(fitpars, &positions[index], angle_offset))
            .map(|(_, tangent)| seed.momentum_estimate * tangent)
            .unwrap_or_else(Vector3::zeros);

        FittedTrack {
            id: seed.id,
            charge: seed.charge,
            params: *fitpars,
            position,
            momentum,
            states: Vec::with_capacity(keys.len()),
        }
    }
}

/// Assemble the wide diagnostics row for one measurement.
#[allow(clippy::too_many_arguments)]
fn diagnostic_row<G: SurfaceProvider>(
    event: i64,
    seed: &TrackSeed,
    key: &ClusterKey,
    geometry: &G,
    surface: &SensorSurface,
    fitpars: &HelixParams,
    global: &Vector3<f64>,
    fitpoint: &Vector3<f64>,
    pca: &Vector3<f64>,
    tangent: &Vector3<f64>,
    measured: &Vector2<f64>,
    fit_local: &Vector3<f64>,
    labels: &[i32; NGL],
    local_x: &[f64; NLC],
    global_x: &[f64; NGL],
    local_y: &[f64; NLC],
    global_y: &[f64; NGL],
    nsilicon: usize,
    ntpc: usize,
) -> DiagnosticRow {
    let ideal = geometry
        .surface(key, TransformKind::Ideal)
        .unwrap_or_else(|| surface.clone());
    let ideal_global = ideal.local_to_global(&Vector3::new(measured.x, measured.y, 0.0));

    let subdetector = match key.subdetector() {
        Subdetector::PixelBarrel => 0,
        Subdetector::StripBarrel => 1,
        Subdetector::Tpc => 2,
        Subdetector::Micromegas => 3,
    };
    let side = match key.address {
        SensorAddress::Tpc { side, .. } => side as u32,
        _ => 0,
    };

    DiagnosticRow {
        event,
        track: seed.id,
        layer: key.layer,
        nsilicon: nsilicon as u32,
        ntpc: ntpc as u32,
        nclus: (nsilicon + ntpc) as u32,
        subdetector,
        sector: key.phi_index(),
        side,
        subsurface: key.z_index(),
        phi: global.y.atan2(global.x),
        labels: *labels,
        sensor_center: surface.center.into(),
        sensor_normal: surface.normal.into(),
        ideal_center: ideal.center.into(),
        ideal_normal: ideal.normal.into(),
        ideal_global: ideal_global.into(),
        fit_params: fitpars.as_array(),
        global: (*global).into(),
        fitpoint: (*fitpoint).into(),
        pca: (*pca).into(),
        tangent: (*tangent).into(),
        measured_local: [measured.x, measured.y],
        fit_local: [fit_local.x, fit_local.y],
        local_derivative_x: *local_x,
        global_derivative_x: *global_x,
        local_derivative_y: *local_y,
        global_derivative_y: *global_y,
    }
}
