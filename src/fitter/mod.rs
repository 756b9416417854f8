//! # Fitter configuration
//!
//! This module defines the [`FitterParams`] configuration struct and its
//! builder, which control cluster selection, quality gates, the numerical
//! tuning of the derivative engine, fixed-parameter masking, and the output
//! files of a run.
//!
//! ## Purpose
//!
//! [`FitterParams`] centralizes every tunable the
//! [`HelicalFitter`](crate::fitter::helical::HelicalFitter) reads. All values
//! are set before the run starts and are immutable afterwards; per-event
//! processing never mutates the configuration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use helifit::fitter::{FitMode, FitterParams};
//!
//! let params = FitterParams::builder()
//!     .fit_mode(FitMode::FullTrack)
//!     .min_tpc_clusters(35)
//!     .min_silicon_clusters(5)
//!     .error_ceiling(1.0)
//!     .layer_error_inflation(32, 2.0)
//!     .fixed_layer(0)
//!     .data_path("mille_data.bin")
//!     .build()
//!     .unwrap();
//! # let _ = params;
//! ```

pub mod helical;

use std::collections::{HashMap, HashSet};

use ahash::RandomState;
use camino::Utf8PathBuf;

use crate::alignment::{FixedParams, GroupingConfig};
use crate::constants::{
    Centimeter, Radian, DEFAULT_DCA_CUT, DEFAULT_ERROR_CEILING, DEFAULT_FD_STEP,
    DEFAULT_MIN_SILICON_CLUSTERS, DEFAULT_MIN_TPC_CLUSTERS, DEFAULT_TANGENT_ANGLE_OFFSET, NLC,
};
use crate::helifit_errors::HelifitError;

/// Which seed container drives the fit, and whether TPC seeds are extended
/// into the silicon before the final fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Fit silicon seeds only.
    SiliconOnly,
    /// Fit TPC seeds only.
    TpcOnly,
    /// Fit TPC seeds, then associate silicon clusters within the DCA cut and
    /// refit the combined track.
    FullTrack,
}

/// Configuration of a fitting run. Build through [`FitterParams::builder`].
#[derive(Debug, Clone)]
pub struct FitterParams {
    pub fit_mode: FitMode,

    // --- Quality gates ---
    /// Minimum silicon clusters for silicon and full-track fits.
    pub min_silicon_clusters: usize,
    /// Minimum TPC clusters for TPC and full-track fits.
    pub min_tpc_clusters: usize,
    /// Minimum silicon clusters a full-track refit must pick up to count as
    /// a successful silicon match.
    pub min_silicon_for_match: usize,
    /// DCA cut (cm) for associating silicon clusters to a fitted helix.
    pub dca_cut: Centimeter,

    // --- Numerical tuning ---
    /// Central finite-difference step per helix parameter.
    pub fd_step: [f64; NLC],
    /// Angular offset for the tangent-line approximation.
    pub tangent_angle_offset: Radian,
    /// Ceiling on a cluster coordinate's error; larger means corrupted.
    pub error_ceiling: Centimeter,

    // --- Per-layer adjustments ---
    /// Error inflation factor per layer (weight de-emphasis of layers known
    /// to be misaligned).
    pub layer_error_inflation: HashMap<u8, f64, RandomState>,
    /// Layers excluded from cluster collection entirely.
    pub masked_layers: HashSet<u8, RandomState>,

    // --- Alignment policy ---
    pub grouping: GroupingConfig,
    pub fixed: FixedParams,

    // --- Outputs ---
    pub data_path: Utf8PathBuf,
    pub steering_path: Utf8PathBuf,
    pub constraint_path: Utf8PathBuf,
    /// Write the record stream as text instead of binary (debugging only).
    pub text_mode: bool,
    /// Per-cluster diagnostic CSV; disabled when `None`.
    pub diagnostics_path: Option<Utf8PathBuf>,
}

impl Default for FitterParams {
    fn default() -> Self {
        // TPC readout pads known to be unusable for alignment
        let masked_layers = [7, 22, 23, 38, 39].into_iter().collect();

        FitterParams {
            fit_mode: FitMode::SiliconOnly,
            min_silicon_clusters: DEFAULT_MIN_SILICON_CLUSTERS,
            min_tpc_clusters: DEFAULT_MIN_TPC_CLUSTERS,
            min_silicon_for_match: 3,
            dca_cut: DEFAULT_DCA_CUT,
            fd_step: [DEFAULT_FD_STEP; NLC],
            tangent_angle_offset: DEFAULT_TANGENT_ANGLE_OFFSET,
            error_ceiling: DEFAULT_ERROR_CEILING,
            layer_error_inflation: HashMap::default(),
            masked_layers,
            grouping: GroupingConfig::default(),
            fixed: FixedParams::new(),
            data_path: Utf8PathBuf::from("mille_data.bin"),
            steering_path: Utf8PathBuf::from("mille_steering.txt"),
            constraint_path: Utf8PathBuf::from("mille_global_constraints.txt"),
            text_mode: false,
            diagnostics_path: None,
        }
    }
}

impl FitterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`FitterParamsBuilder`] with default values.
    pub fn builder() -> FitterParamsBuilder {
        FitterParamsBuilder::new()
    }
}

/// Builder for [`FitterParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct FitterParamsBuilder {
    params: FitterParams,
}

impl FitterParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit_mode(mut self, v: FitMode) -> Self {
        self.params.fit_mode = v;
        self
    }
    pub fn min_silicon_clusters(mut self, v: usize) -> Self {
        self.params.min_silicon_clusters = v;
        self
    }
    pub fn min_tpc_clusters(mut self, v: usize) -> Self {
        self.params.min_tpc_clusters = v;
        self
    }
    pub fn min_silicon_for_match(mut self, v: usize) -> Self {
        self.params.min_silicon_for_match = v;
        self
    }
    pub fn dca_cut(mut self, v: Centimeter) -> Self {
        self.params.dca_cut = v;
        self
    }
    pub fn fd_step(mut self, v: [f64; NLC]) -> Self {
        self.params.fd_step = v;
        self
    }
    pub fn tangent_angle_offset(mut self, v: Radian) -> Self {
        self.params.tangent_angle_offset = v;
        self
    }
    pub fn error_ceiling(mut self, v: Centimeter) -> Self {
        self.params.error_ceiling = v;
        self
    }
    pub fn layer_error_inflation(mut self, layer: u8, factor: f64) -> Self {
        self.params.layer_error_inflation.insert(layer, factor);
        self
    }
    pub fn masked_layer(mut self, layer: u8) -> Self {
        self.params.masked_layers.insert(layer);
        self
    }
    pub fn grouping(mut self, v: GroupingConfig) -> Self {
        self.params.grouping = v;
        self
    }
    pub fn fixed_layer(mut self, layer: u8) -> Self {
        self.params.fixed.set_layer_fixed(layer);
        self
    }
    pub fn fixed_layer_param(mut self, layer: u8, param: u8) -> Self {
        self.params.fixed.set_layer_param_fixed(layer, param);
        self
    }
    pub fn fixed_tpc_sector(mut self, region: u8, sector: u8, side: u8) -> Self {
        self.params.fixed.set_tpc_sector_fixed(region, sector, side);
        self
    }
    pub fn data_path(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.data_path = v.into();
        self
    }
    pub fn steering_path(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.steering_path = v.into();
        self
    }
    pub fn constraint_path(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.constraint_path = v.into();
        self
    }
    pub fn text_mode(mut self, v: bool) -> Self {
        self.params.text_mode = v;
        self
    }
    pub fn diagnostics_path(mut self, v: impl Into<Utf8PathBuf>) -> Self {
        self.params.diagnostics_path = Some(v.into());
        self
    }

    /// Finalize the builder, validating the configured parameters.
    ///
    /// Validation rules
    /// -----------------
    /// * every finite-difference step is finite and `> 0`;
    /// * `tangent_angle_offset > 0`, `error_ceiling > 0`, `dca_cut > 0`;
    /// * cluster-count gates are `>= 3` (below that no helix exists);
    /// * every error-inflation factor is finite and `> 0`.
    pub fn build(self) -> Result<FitterParams, HelifitError> {
        let p = &self.params;

        if p.fd_step.iter().any(|step| !step.is_finite() || *step <= 0.0) {
            return Err(HelifitError::InvalidFitterParameter(
                "finite-difference steps must be finite and > 0".into(),
            ));
        }
        if !(p.tangent_angle_offset.is_finite() && p.tangent_angle_offset > 0.0) {
            return Err(HelifitError::InvalidFitterParameter(
                "tangent_angle_offset must be > 0".into(),
            ));
        }
        if !(p.error_ceiling.is_finite() && p.error_ceiling > 0.0) {
            return Err(HelifitError::InvalidFitterParameter(
                "error_ceiling must be > 0".into(),
            ));
        }
        if !(p.dca_cut.is_finite() && p.dca_cut > 0.0) {
            return Err(HelifitError::InvalidFitterParameter(
                "dca_cut must be > 0".into(),
            ));
        }
        if p.min_silicon_clusters < 3 || p.min_tpc_clusters < 3 || p.min_silicon_for_match < 3 {
            return Err(HelifitError::InvalidFitterParameter(
                "cluster-count gates must be >= 3".into(),
            ));
        }
        if p
            .layer_error_inflation
            .values()
            .any(|factor| !factor.is_finite() || *factor <= 0.0)
        {
            return Err(HelifitError::InvalidFitterParameter(
                "error-inflation factors must be finite and > 0".into(),
            ));
        }

        Ok(self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let params = FitterParams::builder().build().unwrap();
        assert_eq!(params.fit_mode, FitMode::SiliconOnly);
        assert_eq!(params.min_tpc_clusters, DEFAULT_MIN_TPC_CLUSTERS);
        assert!(params.masked_layers.contains(&22));
    }

    #[test]
    fn invalid_steps_are_rejected() {
        let result = FitterParams::builder()
            .fd_step([0.1, 0.1, 0.0, 0.1, 0.1])
            .build();
        assert!(matches!(
            result,
            Err(HelifitError::InvalidFitterParameter(_))
        ));

        let result = FitterParams::builder().fd_step([f64::NAN; NLC]).build();
        assert!(result.is_err());
    }

    #[test]
    fn gates_below_three_are_rejected() {
        assert!(FitterParams::builder().min_silicon_clusters(2).build().is_err());
        assert!(FitterParams::builder().min_tpc_clusters(0).build().is_err());
    }

    #[test]
    fn inflation_factors_are_validated() {
        let result = FitterParams::builder()
            .layer_error_inflation(10, -1.0)
            .build();
        assert!(result.is_err());
    }
}
