use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use ndarray::Array1;

use super::dataset::Hemisphere;
use super::index::subject_dir;
use super::npy;
use crate::error::DataError;

/// Boolean vertex mask for one ROI class in a hemisphere's challenge space.
///
/// The release stores a per-vertex ROI id; every positive id belongs to the
/// class, so the mask is the `> 0` threshold of that vector.
#[derive(Clone, Debug)]
pub struct RoiMask {
    vertices: Array1<bool>,
}

impl RoiMask {
    pub fn load(
        data_dir: &Path,
        subject: u32,
        roi_class: &str,
        hemisphere: Hemisphere,
    ) -> Result<Self, DataError> {
        let path = roi_masks_dir(data_dir, subject).join(format!(
            "{}.{}_challenge_space.npy",
            hemisphere.prefix(),
            roi_class
        ));
        let ids = npy::read_1d(&path)?;
        Ok(Self::from_ids(&ids))
    }

    /// Threshold a per-vertex ROI id vector into a membership mask.
    pub fn from_ids(ids: &Array1<f32>) -> Self {
        Self {
            vertices: ids.mapv(|id| id > 0.0),
        }
    }

    /// Total vertices in this hemisphere's challenge space.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices the class covers.
    pub fn true_count(&self) -> usize {
        self.vertices.iter().filter(|&&v| v).count()
    }

    /// Column indices to keep when masking an fMRI array.
    pub fn selected_columns(&self) -> Vec<usize> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, &keep)| keep)
            .map(|(column, _)| column)
            .collect()
    }
}

/// Challenge- and fsaverage-space ROI id vectors for one class and
/// hemisphere, together with the id-to-name mapping for the class.
///
/// Consumed by the surface visualizer only; the training path never needs
/// the fsaverage side.
#[derive(Clone, Debug)]
pub struct RoiSurfaceMaps {
    roi_class: String,
    challenge: Array1<f32>,
    fsaverage: Array1<f32>,
    mapping: BTreeMap<u32, String>,
}

impl RoiSurfaceMaps {
    pub fn load(
        data_dir: &Path,
        subject: u32,
        roi_class: &str,
        hemisphere: Hemisphere,
    ) -> Result<Self, DataError> {
        let dir = roi_masks_dir(data_dir, subject);
        let prefix = hemisphere.prefix();
        let challenge = npy::read_1d(&dir.join(format!("{prefix}.{roi_class}_challenge_space.npy")))?;
        let fsaverage = npy::read_1d(&dir.join(format!("{prefix}.{roi_class}_fsaverage_space.npy")))?;
        let mapping = load_mapping(&dir.join(format!("mapping_{roi_class}.json")))?;

        Ok(Self::new(roi_class, challenge, fsaverage, mapping))
    }

    pub fn new(
        roi_class: &str,
        challenge: Array1<f32>,
        fsaverage: Array1<f32>,
        mapping: BTreeMap<u32, String>,
    ) -> Self {
        Self {
            roi_class: roi_class.to_string(),
            challenge,
            fsaverage,
            mapping,
        }
    }

    pub fn roi_class(&self) -> &str {
        &self.roi_class
    }

    /// Per-vertex ROI ids in challenge space.
    pub fn challenge(&self) -> &Array1<f32> {
        &self.challenge
    }

    /// Per-vertex ROI ids on the fsaverage surface.
    pub fn fsaverage(&self) -> &Array1<f32> {
        &self.fsaverage
    }

    /// Numeric id of a named ROI within this class.
    pub fn roi_id(&self, roi: &str) -> Result<u32, DataError> {
        self.mapping
            .iter()
            .find(|(_, name)| name.as_str() == roi)
            .map(|(&id, _)| id)
            .ok_or_else(|| DataError::MissingRoi {
                roi: roi.to_string(),
                roi_class: self.roi_class.clone(),
            })
    }

    /// Every named ROI in the class, in id order.
    pub fn roi_names(&self) -> impl Iterator<Item = &str> {
        self.mapping.values().map(String::as_str)
    }
}

fn roi_masks_dir(data_dir: &Path, subject: u32) -> PathBuf {
    subject_dir(data_dir, subject).join("roi_masks")
}

/// Read the id-to-name mapping sidecar. The release ships this as a Python
/// pickle; a JSON conversion (`{"1": "EBA", ...}`) is expected instead.
fn load_mapping(path: &Path) -> Result<BTreeMap<u32, String>, DataError> {
    let file = File::open(path).map_err(|source| DataError::MissingFile {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: BTreeMap<String, String> =
        serde_json::from_reader(file).map_err(|err| DataError::Mapping {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

    let mut mapping = BTreeMap::new();
    for (key, name) in raw {
        let id = key.parse().map_err(|_| DataError::Mapping {
            path: path.to_path_buf(),
            reason: format!("non-numeric ROI id {key:?}"),
        })?;
        mapping.insert(id, name);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn mask_thresholds_positive_ids() {
        let mask = RoiMask::from_ids(&array![0.0, 1.0, 3.0, 0.0, 2.0]);
        assert_eq!(mask.len(), 5);
        assert_eq!(mask.true_count(), 3);
        assert_eq!(mask.selected_columns(), vec![1, 2, 4]);
    }

    #[test]
    fn roi_id_resolves_by_name() {
        let mapping =
            BTreeMap::from([(1, "EBA".to_string()), (2, "FBA-1".to_string())]);
        let maps = RoiSurfaceMaps::new("floc-bodies", array![0.0], array![0.0], mapping);
        assert_eq!(maps.roi_id("FBA-1").unwrap(), 2);
        assert_eq!(maps.roi_names().collect::<Vec<_>>(), vec!["EBA", "FBA-1"]);
    }

    #[test]
    fn missing_roi_name_is_rejected() {
        let mapping = BTreeMap::from([(1, "EBA".to_string())]);
        let maps = RoiSurfaceMaps::new("floc-bodies", array![0.0], array![0.0], mapping);
        let err = maps.roi_id("mTL-bodies").unwrap_err();
        assert!(matches!(err, DataError::MissingRoi { .. }));
    }
}
