//! # Detector model: subdetectors, layers, and cluster keys
//!
//! This module defines the closed set of subdetectors the fitter knows about
//! and the [`ClusterKey`] addressing scheme used to identify a single
//! measurement. A key carries the layer number plus the subdetector-specific
//! sensor address, so every piece of per-subsystem logic can `match` on a
//! tagged variant instead of re-deriving the subsystem from numeric layer
//! ranges.
//!
//! ## Layer layout
//!
//! The barrel is indexed radially outward:
//!
//! ```text
//! layer  0..=2   pixel barrel      (silicon)
//! layer  3..=6   strip barrel      (silicon)
//! layer  7..=54  TPC               (gas, drift measurement in local y)
//! layer 55..     micromegas tiles
//! ```
//!
//! [`Subdetector::from_layer`] provides the classification for inputs that
//! only carry a layer number; everywhere else the variant stored in the key's
//! [`SensorAddress`] is authoritative.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of TPC sectors in azimuth, per side.
pub const TPC_SECTORS_PER_SIDE: u32 = 12;

/// Number of layers in one TPC radial region.
pub const TPC_LAYERS_PER_REGION: u8 = 16;

/// First TPC layer.
pub const TPC_FIRST_LAYER: u8 = 7;

/// First micromegas layer.
pub const MICROMEGAS_FIRST_LAYER: u8 = 55;

/// The closed set of subdetectors contributing clusters to the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subdetector {
    PixelBarrel,
    StripBarrel,
    Tpc,
    Micromegas,
}

impl Subdetector {
    /// Classify a numeric layer into its subdetector.
    ///
    /// Returns `None` for layers beyond the known barrel stack.
    pub fn from_layer(layer: u8) -> Option<Subdetector> {
        match layer {
            0..=2 => Some(Subdetector::PixelBarrel),
            3..=6 => Some(Subdetector::StripBarrel),
            l if l < MICROMEGAS_FIRST_LAYER => Some(Subdetector::Tpc),
            l if l < MICROMEGAS_FIRST_LAYER + 2 => Some(Subdetector::Micromegas),
            _ => None,
        }
    }

    /// True for the pixel and strip barrels.
    pub fn is_silicon(self) -> bool {
        matches!(self, Subdetector::PixelBarrel | Subdetector::StripBarrel)
    }
}

impl fmt::Display for Subdetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subdetector::PixelBarrel => "pixel",
            Subdetector::StripBarrel => "strip",
            Subdetector::Tpc => "tpc",
            Subdetector::Micromegas => "micromegas",
        };
        write!(f, "{name}")
    }
}

/// Subdetector-specific part of a [`ClusterKey`].
///
/// The variant determines which subdetector the key belongs to; the fields
/// identify the sensor within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SensorAddress {
    /// Pixel barrel: stave within the layer, chip along the stave.
    Pixel { stave: u8, chip: u8 },
    /// Strip barrel: ladder in azimuth, sensor index along z.
    Strip { ladder_phi: u8, ladder_z: u8 },
    /// TPC: azimuthal sector and side (0 = south / negative z, 1 = north).
    Tpc { sector: u8, side: u8 },
    /// Micromegas: tile index.
    Micromegas { tile: u8 },
}

impl SensorAddress {
    pub fn subdetector(&self) -> Subdetector {
        match self {
            SensorAddress::Pixel { .. } => Subdetector::PixelBarrel,
            SensorAddress::Strip { .. } => Subdetector::StripBarrel,
            SensorAddress::Tpc { .. } => Subdetector::Tpc,
            SensorAddress::Micromegas { .. } => Subdetector::Micromegas,
        }
    }
}

/// Identifier of a single cluster measurement: layer plus sensor address.
///
/// Keys double as sensor identifiers in the geometry registry; two clusters
/// on the same sensor share layer and address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterKey {
    pub layer: u8,
    pub address: SensorAddress,
}

impl ClusterKey {
    pub fn new(layer: u8, address: SensorAddress) -> Self {
        ClusterKey { layer, address }
    }

    pub fn subdetector(&self) -> Subdetector {
        self.address.subdetector()
    }

    pub fn is_silicon(&self) -> bool {
        self.subdetector().is_silicon()
    }

    /// Azimuthal index of the sensor: stave, ladder, sector, or tile.
    pub fn phi_index(&self) -> u32 {
        match self.address {
            SensorAddress::Pixel { stave, .. } => stave as u32,
            SensorAddress::Strip { ladder_phi, .. } => ladder_phi as u32,
            SensorAddress::Tpc { sector, .. } => sector as u32,
            SensorAddress::Micromegas { tile } => tile as u32,
        }
    }

    /// Longitudinal index of the sensor: chip, z-sensor, or side.
    pub fn z_index(&self) -> u32 {
        match self.address {
            SensorAddress::Pixel { chip, .. } => chip as u32,
            SensorAddress::Strip { ladder_z, .. } => ladder_z as u32,
            SensorAddress::Tpc { side, .. } => side as u32,
            SensorAddress::Micromegas { .. } => 0,
        }
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/layer{}/{}:{}",
            self.subdetector(),
            self.layer,
            self.phi_index(),
            self.z_index()
        )
    }
}

/// Radial region of a TPC layer (0, 1, or 2), used for sector-level masking
/// and grouping.
pub fn tpc_region(layer: u8) -> u8 {
    debug_assert!(layer >= TPC_FIRST_LAYER && layer < MICROMEGAS_FIRST_LAYER);
    (layer - TPC_FIRST_LAYER) / TPC_LAYERS_PER_REGION
}

/// Combined TPC subsector index over (region, side, sector), unique across
/// the whole TPC.
pub fn tpc_subsector(region: u8, sector: u8, side: u8) -> u32 {
    region as u32 * 2 * TPC_SECTORS_PER_SIDE + side as u32 * TPC_SECTORS_PER_SIDE + sector as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_classification_covers_the_barrel() {
        assert_eq!(Subdetector::from_layer(0), Some(Subdetector::PixelBarrel));
        assert_eq!(Subdetector::from_layer(2), Some(Subdetector::PixelBarrel));
        assert_eq!(Subdetector::from_layer(3), Some(Subdetector::StripBarrel));
        assert_eq!(Subdetector::from_layer(6), Some(Subdetector::StripBarrel));
        assert_eq!(Subdetector::from_layer(7), Some(Subdetector::Tpc));
        assert_eq!(Subdetector::from_layer(54), Some(Subdetector::Tpc));
        assert_eq!(Subdetector::from_layer(55), Some(Subdetector::Micromegas));
        assert_eq!(Subdetector::from_layer(56), Some(Subdetector::Micromegas));
        assert_eq!(Subdetector::from_layer(57), None);
    }

    #[test]
    fn tpc_indexing() {
        assert_eq!(tpc_region(7), 0);
        assert_eq!(tpc_region(22), 0);
        assert_eq!(tpc_region(23), 1);
        assert_eq!(tpc_region(39), 2);
        assert_eq!(tpc_region(54), 2);

        // distinct (region, side, sector) triples map to distinct subsectors
        assert_eq!(tpc_subsector(0, 0, 0), 0);
        assert_eq!(tpc_subsector(0, 0, 1), 12);
        assert_eq!(tpc_subsector(1, 3, 0), 27);
        assert_eq!(tpc_subsector(2, 11, 1), 71);
    }
}
