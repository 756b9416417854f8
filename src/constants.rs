//! # Constants and type definitions for helifit
//!
//! This module centralizes the **parameter counts**, **default tuning
//! constants**, and **common type definitions** used throughout the `helifit`
//! library.
//!
//! ## Overview
//!
//! - Local/global alignment parameter counts as expected by the external
//!   least-squares solver
//! - Default numerical tuning (finite-difference steps, tangent angle offset)
//! - Core type aliases used across the crate
//! - Container types for cluster keys attached to a track seed
//!
//! These definitions are used by all main modules, including the helical fit,
//! the derivative engine, and the record writers.

use crate::detector::ClusterKey;
use smallvec::SmallVec;

// -------------------------------------------------------------------------------------------------
// Solver record dimensions
// -------------------------------------------------------------------------------------------------

/// Number of local (track) parameters per measurement record: the five helix
/// fit parameters `(radius, x0, y0, zslope, z0)`.
pub const NLC: usize = 5;

/// Number of global (alignment) parameters per alignment group: three
/// rotations followed by three translations.
pub const NGL: usize = 6;

// -------------------------------------------------------------------------------------------------
// Default numerical tuning
// -------------------------------------------------------------------------------------------------

/// Default central finite-difference step applied to each helix parameter, in
/// its natural unit (cm).
pub const DEFAULT_FD_STEP: f64 = 0.1;

/// Default angular offset (radians) used to build the local tangent line
/// approximation to the helix.
pub const DEFAULT_TANGENT_ANGLE_OFFSET: f64 = 0.005;

/// Default ceiling (cm) on a cluster's measurement error; larger values mark
/// the cluster coordinate as corrupted and its record is skipped.
pub const DEFAULT_ERROR_CEILING: f64 = 1.0;

/// Default minimum number of TPC clusters for a TPC or full-track fit.
pub const DEFAULT_MIN_TPC_CLUSTERS: usize = 35;

/// Default minimum number of silicon clusters for a silicon or full-track fit.
pub const DEFAULT_MIN_SILICON_CLUSTERS: usize = 5;

/// Default distance-of-closest-approach cut (cm) when associating silicon
/// clusters to a fitted TPC helix.
pub const DEFAULT_DCA_CUT: f64 = 0.3;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Length in centimeters, the working unit of the whole crate
pub type Centimeter = f64;
/// Angle in radians
pub type Radian = f64;
/// Identifier of a track within a run
pub type TrackId = u32;

/// A small, inline-optimized container for the cluster keys of a single seed.
pub type ClusterKeys = SmallVec<[ClusterKey; 12]>;
