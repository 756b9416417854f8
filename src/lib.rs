pub mod alignment;
pub mod clusters;
pub mod constants;
pub mod derivatives;
pub mod detector;
pub mod diagnostics;
pub mod distortion;
pub mod fitter;
pub mod geometry;
pub mod helifit_errors;
pub mod helix;
pub mod mille;
pub mod seeds;

pub use crate::detector::{ClusterKey, SensorAddress, Subdetector};
pub use crate::fitter::helical::{EventSummary, HelicalFitter, RunOutputs};
pub use crate::fitter::{FitMode, FitterParams};
pub use crate::geometry::{SensorRegistry, SensorSurface, SurfaceProvider, TransformKind};
pub use crate::helifit_errors::HelifitError;
pub use crate::helix::{fit_helix, HelixParams};
pub use crate::seeds::{EventSeeds, TrackSeed};
