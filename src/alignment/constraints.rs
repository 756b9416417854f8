//! # Geometric constraints between translation parameters
//!
//! Strip-barrel sensors stand with their normal tilted in the transverse
//! plane, so their x and y translation parameters are strongly correlated:
//! the solver can trade one against the other along the sensor plane. The
//! constraint table records, once per alignment group, the pair of
//! translation labels together with the sensor-center coordinates that tie
//! them, and is written as a flat text file at run end for the solver's
//! steering.
//!
//! Registration is idempotent: the first occurrence of a group wins and
//! duplicates are no-ops, so the table can be fed from the per-cluster loop
//! without bookkeeping on the caller's side.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use camino::Utf8Path;
use nalgebra::Vector3;

use crate::helifit_errors::HelifitError;

/// One registered constraint: the x- and y-translation labels of a group and
/// the sensor-plane coordinates coupling them.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub x: (i32, f64),
    pub y: (i32, f64),
}

/// Run-wide constraint table, keyed by the x-translation label.
///
/// A `BTreeMap` keeps the output file ordered by label, independent of the
/// cluster iteration order that filled the table.
#[derive(Debug, Clone, Default)]
pub struct ConstraintWriter {
    entries: BTreeMap<i32, Constraint>,
}

impl ConstraintWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the translation-parameter pair of one alignment group.
    ///
    /// Arguments
    /// -----------------
    /// * `label_x`, `label_y`: the group's x/y translation labels.
    /// * `center`: the **ideal** sensor center; only x and y enter the
    ///   constraint.
    ///
    /// Return
    /// ----------
    /// * `true` if the group was new, `false` if it was already registered
    ///   (in which case nothing changes).
    pub fn register(&mut self, label_x: i32, label_y: i32, center: &Vector3<f64>) -> bool {
        if self.entries.contains_key(&label_x) {
            return false;
        }
        self.entries.insert(
            label_x,
            Constraint {
                x: (label_x, center.x),
                y: (label_y, center.y),
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the table in the solver's steering format: three lines per
    /// constraint.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for constraint in self.entries.values() {
            writeln!(writer, "Constraint 0.0")?;
            writeln!(writer, "{}  {}", constraint.x.0, constraint.x.1)?;
            writeln!(writer, "{}  {}", constraint.y.0, constraint.y.1)?;
        }
        Ok(())
    }

    pub fn write_file(&self, path: &Utf8Path) -> Result<(), HelifitError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
