//! # Alignment groups, global labels, and fixed-parameter masks
//!
//! Every measurement record carries six global parameters (three rotations,
//! three translations) of the **alignment group** its sensor belongs to. The
//! granularity of that group is configurable per subdetector: aligning each
//! sensor individually, whole staves/ladders, whole layers, or one rigid
//! body per subdetector.
//!
//! [`global_labels`] maps a cluster key and a [`GroupingConfig`] to the six
//! integer labels the external solver uses to identify the parameters. Labels
//! are unique across subdetectors and stable across runs: they only depend on
//! the key and the grouping.
//!
//! [`FixedParams`] expresses the frozen-parameter policy: layers, individual
//! (layer, parameter) pairs, or whole TPC subsectors can be excluded from the
//! alignment. Masked parameters have their global derivatives zeroed before
//! emission, which removes their contribution without dropping the
//! measurement itself.

pub mod constraints;

use std::collections::HashSet;

use ahash::RandomState;

use crate::constants::NGL;
use crate::detector::{
    tpc_region, tpc_subsector, ClusterKey, SensorAddress, Subdetector, TPC_SECTORS_PER_SIDE,
};

/// Upper bounds used to pack sensor indices into group numbers.
const PIXEL_MAX_STAVES: u32 = 20;
const PIXEL_MAX_CHIPS: u32 = 9;
const STRIP_MAX_LADDERS: u32 = 16;
const STRIP_MAX_Z: u32 = 4;

/// First label of each subdetector's block; blocks are sized generously so
/// the finest grouping still fits.
const PIXEL_LABEL_BASE: i32 = 1;
const STRIP_LABEL_BASE: i32 = 10_000;
const TPC_LABEL_BASE: i32 = 20_000;
const MICROMEGAS_LABEL_BASE: i32 = 30_000;

/// Alignment granularity for the pixel barrel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelGrouping {
    Sensor,
    Stave,
    Layer,
    Barrel,
}

/// Alignment granularity for the strip barrel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripGrouping {
    Sensor,
    Ladder,
    Layer,
    Barrel,
}

/// Alignment granularity for the TPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpcGrouping {
    /// One group per readout surface (layer, sector, side).
    Surface,
    /// One group per (region, side, sector) subsector.
    Sector,
    /// The whole TPC as one rigid body.
    Volume,
}

/// Alignment granularity for the micromegas tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicromegasGrouping {
    Tile,
    Barrel,
}

/// Per-subdetector grouping choice, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingConfig {
    pub pixel: PixelGrouping,
    pub strip: StripGrouping,
    pub tpc: TpcGrouping,
    pub micromegas: MicromegasGrouping,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        GroupingConfig {
            pixel: PixelGrouping::Sensor,
            strip: StripGrouping::Ladder,
            tpc: TpcGrouping::Sector,
            micromegas: MicromegasGrouping::Tile,
        }
    }
}

/// The six global parameter labels for the alignment group of a sensor.
///
/// Order matches the derivative arrays: rotations about x, y, z, then
/// translations along x, y, z.
pub fn global_labels(key: &ClusterKey, config: &GroupingConfig) -> [i32; NGL] {
    let base = label_base(key.subdetector());
    let group = group_index(key, config);

    let first = base + group * NGL as i32;
    core::array::from_fn(|param| first + param as i32)
}

fn label_base(subdetector: Subdetector) -> i32 {
    match subdetector {
        Subdetector::PixelBarrel => PIXEL_LABEL_BASE,
        Subdetector::StripBarrel => STRIP_LABEL_BASE,
        Subdetector::Tpc => TPC_LABEL_BASE,
        Subdetector::Micromegas => MICROMEGAS_LABEL_BASE,
    }
}

/// Index of the alignment group a sensor belongs to, within its subdetector.
fn group_index(key: &ClusterKey, config: &GroupingConfig) -> i32 {
    let layer = key.layer as u32;
    let index = match key.address {
        SensorAddress::Pixel { stave, chip } => match config.pixel {
            PixelGrouping::Sensor => {
                (layer * PIXEL_MAX_STAVES + stave as u32) * PIXEL_MAX_CHIPS + chip as u32
            }
            PixelGrouping::Stave => layer * PIXEL_MAX_STAVES + stave as u32,
            PixelGrouping::Layer => layer,
            PixelGrouping::Barrel => 0,
        },
        SensorAddress::Strip { ladder_phi, ladder_z } => {
            let strip_layer = layer - 3;
            match config.strip {
                StripGrouping::Sensor => {
                    (strip_layer * STRIP_MAX_LADDERS + ladder_phi as u32) * STRIP_MAX_Z
                        + ladder_z as u32
                }
                StripGrouping::Ladder => strip_layer * STRIP_MAX_LADDERS + ladder_phi as u32,
                StripGrouping::Layer => strip_layer,
                StripGrouping::Barrel => 0,
            }
        }
        SensorAddress::Tpc { sector, side } => match config.tpc {
            TpcGrouping::Surface => {
                (layer - 7) * 2 * TPC_SECTORS_PER_SIDE
                    + side as u32 * TPC_SECTORS_PER_SIDE
                    + sector as u32
            }
            TpcGrouping::Sector => tpc_subsector(tpc_region(key.layer), sector, side),
            TpcGrouping::Volume => 0,
        },
        SensorAddress::Micromegas { tile } => match config.micromegas {
            MicromegasGrouping::Tile => (layer - 55) * 8 + tile as u32,
            MicromegasGrouping::Barrel => 0,
        },
    };
    index as i32
}

/// The frozen-parameter policy: which alignment parameters are excluded from
/// the fit. Queried per measurement; masked derivatives are zeroed.
#[derive(Debug, Clone, Default)]
pub struct FixedParams {
    fixed_layers: HashSet<u8, RandomState>,
    fixed_layer_params: HashSet<(u8, u8), RandomState>,
    fixed_tpc_subsectors: HashSet<u32, RandomState>,
}

impl FixedParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze all six parameters of every group on a layer.
    pub fn set_layer_fixed(&mut self, layer: u8) {
        self.fixed_layers.insert(layer);
    }

    pub fn is_layer_fixed(&self, layer: u8) -> bool {
        self.fixed_layers.contains(&layer)
    }

    /// Freeze one parameter (0..6) of every group on a layer.
    pub fn set_layer_param_fixed(&mut self, layer: u8, param: u8) {
        self.fixed_layer_params.insert((layer, param));
    }

    pub fn is_layer_param_fixed(&self, layer: u8, param: u8) -> bool {
        self.fixed_layer_params.contains(&(layer, param))
    }

    /// Freeze a whole TPC subsector, identified by radial region, azimuthal
    /// sector, and side.
    pub fn set_tpc_sector_fixed(&mut self, region: u8, sector: u8, side: u8) {
        self.fixed_tpc_subsectors
            .insert(tpc_subsector(region, sector, side));
    }

    pub fn is_tpc_sector_fixed(&self, layer: u8, sector: u8, side: u8) -> bool {
        self.fixed_tpc_subsectors
            .contains(&tpc_subsector(tpc_region(layer), sector, side))
    }

    /// Zero the global derivatives of every parameter frozen for this key.
    ///
    /// Derivatives of floating parameters are untouched, so the measurement
    /// keeps contributing to them.
    pub fn apply_mask(
        &self,
        key: &ClusterKey,
        derivative_x: &mut [f64; NGL],
        derivative_y: &mut [f64; NGL],
    ) {
        let sector_fixed = match key.address {
            SensorAddress::Tpc { sector, side } => {
                self.is_tpc_sector_fixed(key.layer, sector, side)
            }
            _ => false,
        };

        for param in 0..NGL {
            if self.is_layer_fixed(key.layer)
                || self.is_layer_param_fixed(key.layer, param as u8)
                || sector_fixed
            {
                derivative_x[param] = 0.0;
                derivative_y[param] = 0.0;
            }
        }
    }
}
