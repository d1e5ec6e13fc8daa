//! Projection of challenge-space responses onto the fsaverage surface.
//!
//! Off the training path entirely: these functions consume the raw fMRI
//! arrays and ROI surface maps for inspection and reporting.

use ndarray::{Array1, ArrayView1};

use crate::error::DataError;
use crate::nsd::RoiSurfaceMaps;

/// Project a full challenge-space response row onto the fsaverage surface,
/// covering every vertex the ROI class labels. Unlabelled fsaverage vertices
/// stay zero.
pub fn project_class(
    maps: &RoiSurfaceMaps,
    response: ArrayView1<f32>,
) -> Result<Array1<f32>, DataError> {
    project(maps, response, |id| id > 0.0, "class")
}

/// Same projection restricted to a single named ROI within the class. The
/// name is resolved through the class mapping; an unknown name is
/// [`DataError::MissingRoi`].
pub fn project_roi(
    maps: &RoiSurfaceMaps,
    response: ArrayView1<f32>,
    roi: &str,
) -> Result<Array1<f32>, DataError> {
    let id = maps.roi_id(roi)? as f32;
    project(maps, response, move |vertex| vertex == id, roi)
}

fn project(
    maps: &RoiSurfaceMaps,
    response: ArrayView1<f32>,
    keep: impl Fn(f32) -> bool,
    what: &str,
) -> Result<Array1<f32>, DataError> {
    let challenge = maps.challenge();
    let fsaverage = maps.fsaverage();

    if response.len() != challenge.len() {
        return Err(DataError::ShapeMismatch {
            context: format!("{} {what} response vs challenge space", maps.roi_class()),
            expected: challenge.len(),
            actual: response.len(),
        });
    }

    let values: Vec<f32> = challenge
        .iter()
        .zip(response.iter())
        .filter(|(&id, _)| keep(id))
        .map(|(_, &value)| value)
        .collect();
    let targets: Vec<usize> = fsaverage
        .iter()
        .enumerate()
        .filter(|(_, &id)| keep(id))
        .map(|(vertex, _)| vertex)
        .collect();

    // Both spaces must label the same number of vertices for the selection.
    if values.len() != targets.len() {
        return Err(DataError::ShapeMismatch {
            context: format!(
                "{} {what} challenge vertices vs fsaverage vertices",
                maps.roi_class()
            ),
            expected: targets.len(),
            actual: values.len(),
        });
    }

    let mut projected = Array1::zeros(fsaverage.len());
    for (vertex, value) in targets.into_iter().zip(values) {
        projected[vertex] = value;
    }
    Ok(projected)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ndarray::array;

    use super::*;

    fn maps() -> RoiSurfaceMaps {
        RoiSurfaceMaps::new(
            "floc-bodies",
            // Challenge space: 5 vertices, two ROIs.
            array![0.0, 1.0, 2.0, 0.0, 1.0],
            // Fsaverage space: 7 vertices labelling the same ROIs.
            array![0.0, 1.0, 0.0, 2.0, 1.0, 0.0, 0.0],
            BTreeMap::from([(1, "EBA".to_string()), (2, "FBA-1".to_string())]),
        )
    }

    #[test]
    fn class_projection_places_values_at_labelled_vertices() {
        let response = array![10.0, 11.0, 12.0, 13.0, 14.0];
        let projected = project_class(&maps(), response.view()).unwrap();
        assert_eq!(projected, array![0.0, 11.0, 0.0, 12.0, 14.0, 0.0, 0.0]);
    }

    #[test]
    fn roi_projection_keeps_only_that_roi() {
        let response = array![10.0, 11.0, 12.0, 13.0, 14.0];
        let projected = project_roi(&maps(), response.view(), "EBA").unwrap();
        assert_eq!(projected, array![0.0, 11.0, 0.0, 0.0, 14.0, 0.0, 0.0]);
    }

    #[test]
    fn unknown_roi_is_missing_not_empty() {
        let response = Array1::from_elem(5, 0.0);
        let err = project_roi(&maps(), response.view(), "FFA-1").unwrap_err();
        assert!(matches!(err, DataError::MissingRoi { .. }));
    }

    #[test]
    fn wrong_response_length_is_a_shape_mismatch() {
        let response = array![1.0, 2.0];
        let err = project_class(&maps(), response.view()).unwrap_err();
        assert!(matches!(
            err,
            DataError::ShapeMismatch {
                expected: 5,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn disagreeing_spaces_are_a_shape_mismatch() {
        let maps = RoiSurfaceMaps::new(
            "floc-bodies",
            array![1.0, 1.0],
            array![1.0],
            BTreeMap::new(),
        );
        let response = array![1.0, 2.0];
        let err = project_class(&maps, response.view()).unwrap_err();
        assert!(matches!(err, DataError::ShapeMismatch { .. }));
    }
}
