//! # Measurement-record stream for the external alignment solver
//!
//! The external least-squares solver consumes a compact binary stream: one
//! record per track, holding every measurement of that track as interleaved
//! (value, label) pairs. [`MilleWriter`] buffers measurements with
//! [`add_measurement`](MilleWriter::add_measurement) and commits the buffer
//! as one record with [`end_record`](MilleWriter::end_record).
//!
//! ## Record layout
//!
//! Two parallel buffers are kept, one of `f32` values and one of `i32`
//! labels, with slot 0 of both reserved as a zero header pair. Each
//! measurement appends:
//!
//! ```text
//! (residual, 0) (local_deriv_i, i+1)...  (sigma, 0)  (global_deriv_j, label_j)...
//! ```
//!
//! Zero derivatives are suppressed; a global derivative is written only with
//! a positive label. `end_record` writes the word count `2 * (n + 1)` as a
//! little-endian `i32`, then the float block, then the int block, and resets
//! the buffers. An empty buffer writes nothing, so tracks whose every
//! measurement was filtered leave no trace in the stream.
//!
//! A text mode writes the same records in readable form for debugging, and
//! the steering file naming the data file is produced at construction.

use std::fs::File;
use std::io::{BufWriter, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use camino::{Utf8Path, Utf8PathBuf};

use crate::constants::{NGL, NLC};
use crate::helifit_errors::HelifitError;

/// Buffered writer for the solver's measurement-record stream.
pub struct MilleWriter {
    out: BufWriter<File>,
    float_buf: Vec<f32>,
    int_buf: Vec<i32>,
    binary: bool,
    data_path: Utf8PathBuf,
}

impl MilleWriter {
    /// Open the data stream and write the steering file referencing it.
    ///
    /// Arguments
    /// -----------------
    /// * `data_path`: the record stream consumed by the solver.
    /// * `steering_path`: steering file; receives the data file path.
    /// * `text_mode`: write records as text instead of binary (debugging).
    pub fn create(
        data_path: &Utf8Path,
        steering_path: &Utf8Path,
        text_mode: bool,
    ) -> Result<Self, HelifitError> {
        let out = BufWriter::new(File::create(data_path)?);

        let mut steering = File::create(steering_path)?;
        writeln!(steering, "{data_path}")?;

        Ok(MilleWriter {
            out,
            float_buf: vec![0.0],
            int_buf: vec![0],
            binary: !text_mode,
            data_path: data_path.to_owned(),
        })
    }

    /// Path of the data stream, as written into the steering file.
    pub fn data_path(&self) -> &Utf8Path {
        &self.data_path
    }

    /// Buffer one measurement: five local derivatives, six global
    /// derivatives with their labels, the residual, and its error.
    ///
    /// Measurements with `sigma <= 0` are ignored, matching the solver's own
    /// acceptance rule.
    pub fn add_measurement(
        &mut self,
        local: &[f64; NLC],
        global: &[f64; NGL],
        labels: &[i32; NGL],
        residual: f64,
        sigma: f64,
    ) {
        if sigma <= 0.0 {
            return;
        }

        self.float_buf.push(residual as f32);
        self.int_buf.push(0);

        for (i, derivative) in local.iter().enumerate() {
            if *derivative != 0.0 {
                self.float_buf.push(*derivative as f32);
                self.int_buf.push(i as i32 + 1);
            }
        }

        self.float_buf.push(sigma as f32);
        self.int_buf.push(0);

        for (derivative, label) in global.iter().zip(labels) {
            if *derivative != 0.0 && *label > 0 {
                self.float_buf.push(*derivative as f32);
                self.int_buf.push(*label);
            }
        }
    }

    /// Commit the buffered measurements as one record (one track) and reset.
    pub fn end_record(&mut self) -> Result<(), HelifitError> {
        if self.float_buf.len() > 1 {
            if self.binary {
                let num_words = (self.float_buf.len() * 2) as i32;
                self.out.write_i32::<LittleEndian>(num_words)?;
                for value in &self.float_buf {
                    self.out.write_f32::<LittleEndian>(*value)?;
                }
                for label in &self.int_buf {
                    self.out.write_i32::<LittleEndian>(*label)?;
                }
            } else {
                writeln!(self.out, "record {}", self.float_buf.len() - 1)?;
                for (value, label) in self.float_buf.iter().zip(&self.int_buf).skip(1) {
                    writeln!(self.out, "{label}  {value}")?;
                }
            }
        }

        self.float_buf.truncate(1);
        self.int_buf.truncate(1);
        Ok(())
    }

    /// Flush the underlying stream. Called by [`finish`](Self::finish); also
    /// safe to call between events.
    pub fn flush(&mut self) -> Result<(), HelifitError> {
        self.out.flush()?;
        Ok(())
    }

    /// Commit any pending record and flush the stream.
    pub fn finish(mut self) -> Result<(), HelifitError> {
        self.end_record()?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Read;

    fn temp_paths(tag: &str) -> (Utf8PathBuf, Utf8PathBuf) {
        let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap();
        (
            dir.join(format!("helifit_mille_{tag}.bin")),
            dir.join(format!("helifit_mille_{tag}.steer")),
        )
    }

    #[test]
    fn binary_record_layout() {
        let (data, steering) = temp_paths("layout");
        let mut writer = MilleWriter::create(&data, &steering, false).unwrap();

        let local = [1.0, 0.0, 2.0, 0.0, 0.0];
        let global = [0.5, 0.0, 0.0, 0.0, 0.0, -0.5];
        let labels = [101, 102, 103, 104, 105, 106];
        writer.add_measurement(&local, &global, &labels, 0.25, 0.01);
        writer.finish().unwrap();

        let mut file = File::open(&data).unwrap();
        let num_words = file.read_i32::<LittleEndian>().unwrap();
        // header pair + residual + two local + sigma + two global = 7 pairs
        assert_eq!(num_words, 14);

        let mut floats = vec![0.0f32; 7];
        for value in floats.iter_mut() {
            *value = file.read_f32::<LittleEndian>().unwrap();
        }
        let mut ints = vec![0i32; 7];
        for label in ints.iter_mut() {
            *label = file.read_i32::<LittleEndian>().unwrap();
        }
        assert_eq!(floats, vec![0.0, 0.25, 1.0, 2.0, 0.01, 0.5, -0.5]);
        assert_eq!(ints, vec![0, 0, 1, 3, 0, 101, 106]);

        // nothing after the record
        let mut rest = Vec::new();
        file.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());

        let steering_text = std::fs::read_to_string(&steering).unwrap();
        assert_eq!(steering_text.trim(), data.as_str());

        std::fs::remove_file(&data).ok();
        std::fs::remove_file(&steering).ok();
    }

    #[test]
    fn non_positive_sigma_and_empty_records_write_nothing() {
        let (data, steering) = temp_paths("empty");
        let mut writer = MilleWriter::create(&data, &steering, false).unwrap();

        writer.add_measurement(&[1.0; NLC], &[1.0; NGL], &[1, 2, 3, 4, 5, 6], 0.1, 0.0);
        writer.end_record().unwrap();
        writer.finish().unwrap();

        let metadata = std::fs::metadata(&data).unwrap();
        assert_eq!(metadata.len(), 0);

        std::fs::remove_file(&data).ok();
        std::fs::remove_file(&steering).ok();
    }

    #[test]
    fn text_mode_is_readable() {
        let (data, steering) = temp_paths("text");
        let mut writer = MilleWriter::create(&data, &steering, true).unwrap();
        writer.add_measurement(
            &[1.0, 0.0, 0.0, 0.0, 0.0],
            &[0.0; NGL],
            &[1, 2, 3, 4, 5, 6],
            0.5,
            0.02,
        );
        writer.finish().unwrap();

        let text = std::fs::read_to_string(&data).unwrap();
        assert!(text.starts_with("record 3"));
        assert!(text.contains("1  1"));

        std::fs::remove_file(&data).ok();
        std::fs::remove_file(&steering).ok();
    }
}
