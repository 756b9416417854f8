//! # Per-cluster diagnostic output
//!
//! When a diagnostics path is configured, the fitter writes one CSV row per
//! emitted cluster: event/track bookkeeping, the alignment labels, aligned
//! and ideal sensor geometry, the fit parameters, the characteristic points
//! of the intersection construction, and the full derivative set. The file
//! is meant for offline validation plots and is not correctness-critical.

use std::fs::File;

use camino::Utf8Path;
use serde::Serialize;

use crate::helifit_errors::HelifitError;

/// Column names of the diagnostic file, in row order.
const HEADER: [&str; 75] = [
    "event", "track", "layer", "nsilicon", "ntpc", "nclus", "subdet", "sector", "side", "subsurf",
    "phi", "gl0", "gl1", "gl2", "gl3", "gl4", "gl5", "sensx", "sensy", "sensz", "normx", "normy",
    "normz", "sensx_ideal", "sensy_ideal", "sensz_ideal", "normx_ideal", "normy_ideal",
    "normz_ideal", "xglob_ideal", "yglob_ideal", "zglob_ideal", "radius", "x0", "y0", "zslope",
    "z0", "xglob", "yglob", "zglob", "xfit", "yfit", "zfit", "pcax", "pcay", "pcaz", "tangx",
    "tangy", "tangz", "xloc", "yloc", "fitx", "fity", "dx_dr", "dx_dx0", "dx_dy0", "dx_dzs",
    "dx_dz0", "dx_dalpha", "dx_dbeta", "dx_dgamma", "dx_dx", "dx_dy", "dx_dz", "dy_dr", "dy_dx0",
    "dy_dy0", "dy_dzs", "dy_dz0", "dy_dalpha", "dy_dbeta", "dy_dgamma", "dy_dx", "dy_dy", "dy_dz",
];

/// One diagnostic row. Field groups serialize in [`HEADER`] order.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRow {
    pub event: i64,
    pub track: u32,
    pub layer: u8,
    pub nsilicon: u32,
    pub ntpc: u32,
    pub nclus: u32,
    pub subdetector: u8,
    pub sector: u32,
    pub side: u32,
    pub subsurface: u32,
    pub phi: f64,
    pub labels: [i32; 6],
    pub sensor_center: [f64; 3],
    pub sensor_normal: [f64; 3],
    pub ideal_center: [f64; 3],
    pub ideal_normal: [f64; 3],
    pub ideal_global: [f64; 3],
    pub fit_params: [f64; 5],
    pub global: [f64; 3],
    pub fitpoint: [f64; 3],
    pub pca: [f64; 3],
    pub tangent: [f64; 3],
    pub measured_local: [f64; 2],
    pub fit_local: [f64; 2],
    pub local_derivative_x: [f64; 5],
    pub global_derivative_x: [f64; 6],
    pub local_derivative_y: [f64; 5],
    pub global_derivative_y: [f64; 6],
}

/// CSV writer for [`DiagnosticRow`]s; writes the header once on creation.
pub struct DiagnosticsWriter {
    writer: csv::Writer<File>,
}

impl DiagnosticsWriter {
    pub fn create(path: &Utf8Path) -> Result<Self, HelifitError> {
        // headers are written manually: the row struct contains fixed-size
        // arrays, which the csv serializer only flattens in headerless mode
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(File::create(path)?);
        writer.write_record(HEADER)?;
        Ok(DiagnosticsWriter { writer })
    }

    pub fn write(&mut self, row: &DiagnosticRow) -> Result<(), HelifitError> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), HelifitError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn rows_have_as_many_fields_as_the_header() {
        let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap();
        let path = dir.join("helifit_diag_test.csv");

        let mut writer = DiagnosticsWriter::create(&path).unwrap();
        let row = DiagnosticRow {
            event: 0,
            track: 1,
            layer: 2,
            nsilicon: 3,
            ntpc: 4,
            nclus: 7,
            subdetector: 0,
            sector: 1,
            side: 0,
            subsurface: 2,
            phi: 0.5,
            labels: [1, 2, 3, 4, 5, 6],
            sensor_center: [1.0; 3],
            sensor_normal: [0.0, 0.0, 1.0],
            ideal_center: [1.0; 3],
            ideal_normal: [0.0, 0.0, 1.0],
            ideal_global: [1.0; 3],
            fit_params: [10.0, 0.0, 0.0, 1.0, 0.0],
            global: [1.0; 3],
            fitpoint: [1.0; 3],
            pca: [1.0; 3],
            tangent: [0.0, 1.0, 0.0],
            measured_local: [0.1, 0.2],
            fit_local: [0.1, 0.2],
            local_derivative_x: [0.0; 5],
            global_derivative_x: [0.0; 6],
            local_derivative_y: [0.0; 5],
            global_derivative_y: [0.0; 6],
        };
        writer.write(&row).unwrap();
        writer.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header_fields = lines.next().unwrap().split(',').count();
        let row_fields = lines.next().unwrap().split(',').count();
        assert_eq!(header_fields, HEADER.len());
        assert_eq!(row_fields, header_fields);

        std::fs::remove_file(&path).ok();
    }
}
