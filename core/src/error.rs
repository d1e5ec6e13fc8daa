use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while assembling NSD datasets or projecting surface maps.
///
/// Every variant is unrecoverable for the current run: the caller aborts
/// rather than falling back to defaults or a partially built dataset.
#[derive(Debug, Error)]
pub enum DataError {
    /// A training image filename did not carry a parseable NSD id.
    #[error("malformed image filename {filename:?} for subject {subject}: {reason}")]
    MalformedFilename {
        subject: u32,
        filename: String,
        reason: String,
    },

    /// A hemisphere selector outside the `all`/`lh`/`rh` enumeration.
    #[error("invalid hemisphere selector {selector:?}: expected \"all\", \"lh\" or \"rh\"")]
    InvalidHemisphere { selector: String },

    /// The requested batch size admits no full batch.
    #[error("batch size {batch_size} is invalid for {rows} available rows")]
    BatchSize { batch_size: usize, rows: usize },

    /// An expected release file could not be opened.
    #[error("missing file {}: {source}", path.display())]
    MissingFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Two arrays that must agree on a dimension do not.
    #[error("shape mismatch in {context}: expected {expected}, found {actual}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    /// A named ROI is absent from its class mapping (visualization path).
    #[error("ROI {roi:?} is not present in the mapping for class {roi_class:?}")]
    MissingRoi { roi: String, roi_class: String },

    /// A `.npy` file exists but could not be decoded.
    #[error("failed to decode {}: {source}", path.display())]
    Npy {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    /// An ROI mapping sidecar exists but could not be decoded.
    #[error("failed to decode ROI mapping {}: {reason}", path.display())]
    Mapping { path: PathBuf, reason: String },
}
