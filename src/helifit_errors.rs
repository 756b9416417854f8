use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelifitError {
    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unable to write diagnostics row: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid fitter parameter: {0}")]
    InvalidFitterParameter(String),
}

impl PartialEq for HelifitError {
    fn eq(&self, other: &Self) -> bool {
        use HelifitError::*;
        match (self, other) {
            // I/O and CSV errors compare by variant only
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (InvalidFitterParameter(a), InvalidFitterParameter(b)) => a == b,

            _ => false,
        }
    }
}
