use std::path::{Path, PathBuf};

use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::index::{subject_dir, ImageIndexTable, SplitIndices};
use super::npy;
use super::roi::RoiMask;
use crate::error::DataError;

/// One cortical hemisphere.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Hemisphere {
    #[serde(rename = "lh")]
    Left,
    #[serde(rename = "rh")]
    Right,
}

impl Hemisphere {
    /// Filename prefix used throughout the release.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Left => "lh",
            Self::Right => "rh",
        }
    }
}

/// Which hemisphere(s) a dataset should cover.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HemisphereSelection {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "lh")]
    Left,
    #[serde(rename = "rh")]
    Right,
}

impl HemisphereSelection {
    /// Parse a selector string. Anything outside the three-value enumeration
    /// is rejected outright.
    pub fn from_str(value: &str) -> Result<Self, DataError> {
        match value {
            "all" => Ok(Self::All),
            "lh" => Ok(Self::Left),
            "rh" => Ok(Self::Right),
            other => Err(DataError::InvalidHemisphere {
                selector: other.to_string(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Left => "lh",
            Self::Right => "rh",
        }
    }
}

/// Train/test fMRI arrays restricted to one ROI class's vertices.
#[derive(Clone, Debug)]
pub struct SplitDatasets {
    pub train: Array2<f32>,
    pub test: Array2<f32>,
}

/// Build the train/test datasets for one subject, ROI class and hemisphere
/// selection.
///
/// Rows follow the subject's fixed 90/10 split; columns are the vertices the
/// class mask selects. For [`HemisphereSelection::All`] the two masked
/// hemisphere arrays are concatenated along the vertex axis, left before
/// right.
pub fn load_train_test_datasets(
    data_dir: &Path,
    subject: u32,
    roi_class: &str,
    selection: HemisphereSelection,
) -> Result<SplitDatasets, DataError> {
    let table = ImageIndexTable::load(data_dir, subject)?;
    let split = table.split();

    match selection {
        HemisphereSelection::Left => {
            hemisphere_datasets(data_dir, subject, roi_class, Hemisphere::Left, &table, &split)
        }
        HemisphereSelection::Right => {
            hemisphere_datasets(data_dir, subject, roi_class, Hemisphere::Right, &table, &split)
        }
        HemisphereSelection::All => {
            let lh =
                hemisphere_datasets(data_dir, subject, roi_class, Hemisphere::Left, &table, &split)?;
            let rh =
                hemisphere_datasets(data_dir, subject, roi_class, Hemisphere::Right, &table, &split)?;
            Ok(SplitDatasets {
                train: join_hemispheres(subject, &lh.train, &rh.train)?,
                test: join_hemispheres(subject, &lh.test, &rh.test)?,
            })
        }
    }
}

/// Load a subject's full per-hemisphere fMRI array, unsplit and unmasked.
/// Used by the surface visualizer, which works in full challenge space.
pub fn load_hemisphere_fmri(
    data_dir: &Path,
    subject: u32,
    hemisphere: Hemisphere,
) -> Result<Array2<f32>, DataError> {
    npy::read_2d(&fmri_path(data_dir, subject, hemisphere))
}

fn hemisphere_datasets(
    data_dir: &Path,
    subject: u32,
    roi_class: &str,
    hemisphere: Hemisphere,
    table: &ImageIndexTable,
    split: &SplitIndices,
) -> Result<SplitDatasets, DataError> {
    let fmri = load_hemisphere_fmri(data_dir, subject, hemisphere)?;
    if fmri.nrows() != table.len() {
        return Err(DataError::ShapeMismatch {
            context: format!(
                "subject {subject} {} stimulus rows vs image index table",
                hemisphere.prefix()
            ),
            expected: table.len(),
            actual: fmri.nrows(),
        });
    }

    let mask = RoiMask::load(data_dir, subject, roi_class, hemisphere)?;
    if mask.len() != fmri.ncols() {
        return Err(DataError::ShapeMismatch {
            context: format!(
                "subject {subject} {} {roi_class} mask vs fMRI vertices",
                hemisphere.prefix()
            ),
            expected: fmri.ncols(),
            actual: mask.len(),
        });
    }

    let columns = mask.selected_columns();
    Ok(SplitDatasets {
        train: select_rows_columns(&fmri, &split.train, &columns),
        test: select_rows_columns(&fmri, &split.test, &columns),
    })
}

fn select_rows_columns(fmri: &Array2<f32>, rows: &[usize], columns: &[usize]) -> Array2<f32> {
    fmri.select(Axis(0), rows).select(Axis(1), columns)
}

fn join_hemispheres(
    subject: u32,
    lh: &Array2<f32>,
    rh: &Array2<f32>,
) -> Result<Array2<f32>, DataError> {
    concatenate(Axis(1), &[lh.view(), rh.view()]).map_err(|_| DataError::ShapeMismatch {
        context: format!("subject {subject} lh vs rh stimulus rows"),
        expected: lh.nrows(),
        actual: rh.nrows(),
    })
}

fn fmri_path(data_dir: &Path, subject: u32, hemisphere: Hemisphere) -> PathBuf {
    subject_dir(data_dir, subject)
        .join("training_split")
        .join("training_fmri")
        .join(format!("{}_training_fmri.npy", hemisphere.prefix()))
}
