use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2};
use ndarray_npy::ReadNpyExt;

use crate::error::DataError;

pub(crate) fn read_1d(path: &Path) -> Result<Array1<f32>, DataError> {
    let file = open(path)?;
    Array1::<f32>::read_npy(file).map_err(|source| DataError::Npy {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_2d(path: &Path) -> Result<Array2<f32>, DataError> {
    let file = open(path)?;
    Array2::<f32>::read_npy(file).map_err(|source| DataError::Npy {
        path: path.to_path_buf(),
        source,
    })
}

fn open(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|source| DataError::MissingFile {
        path: path.to_path_buf(),
        source,
    })
}
