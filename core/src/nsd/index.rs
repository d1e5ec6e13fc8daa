use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;

use crate::error::DataError;
use crate::rng::seeded_rng;

/// Marker preceding the dataset-global id in training image filenames.
const NSD_MARKER: &str = "nsd-";
/// Digits in an NSD id.
const NSD_ID_DIGITS: usize = 5;

/// Seed for the train/test shuffle. Fixed so every run, and every ROI class
/// and hemisphere combination within a run, sees the identical split.
pub const SPLIT_SEED: u64 = 42;

/// Fraction of a subject's images held out for evaluation.
const TEST_FRACTION: f64 = 0.1;

/// Mapping from a subject's local image ordinal to the dataset-global NSD id.
///
/// Ordinals follow sorted filename order and are contiguous per subject; ids
/// are dataset-defined and may repeat across subjects. Built by an explicit
/// [`ImageIndexTable::load`] call so construction order and failure handling
/// stay with the caller.
#[derive(Clone, Debug)]
pub struct ImageIndexTable {
    subject: u32,
    nsd_ids: Vec<u32>,
}

impl ImageIndexTable {
    /// Enumerate a subject's training images in lexicographic order and parse
    /// the NSD id embedded in each filename.
    pub fn load(data_dir: &Path, subject: u32) -> Result<Self, DataError> {
        let images_dir = subject_dir(data_dir, subject)
            .join("training_split")
            .join("training_images");
        let entries = fs::read_dir(&images_dir).map_err(|source| DataError::MissingFile {
            path: images_dir.clone(),
            source,
        })?;

        let mut filenames = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DataError::MissingFile {
                path: images_dir.clone(),
                source,
            })?;
            filenames.push(entry.file_name().to_string_lossy().into_owned());
        }
        filenames.sort();

        let mut nsd_ids = Vec::with_capacity(filenames.len());
        for filename in &filenames {
            nsd_ids.push(parse_nsd_id(subject, filename)?);
        }

        Ok(Self { subject, nsd_ids })
    }

    pub fn subject(&self) -> u32 {
        self.subject
    }

    pub fn len(&self) -> usize {
        self.nsd_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nsd_ids.is_empty()
    }

    /// NSD id for a local ordinal, if it exists.
    pub fn nsd_id(&self, ordinal: usize) -> Option<u32> {
        self.nsd_ids.get(ordinal).copied()
    }

    /// The fixed-seed train/test partition over this table's ordinals.
    pub fn split(&self) -> SplitIndices {
        SplitIndices::compute(self.len(), SPLIT_SEED)
    }
}

/// Disjoint train/test ordinal sets covering a subject's images.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitIndices {
    /// Deterministically partition `0..n` into 90% train / 10% test. The test
    /// set takes `ceil(n / 10)` ordinals so no image is left out of both
    /// sides.
    pub fn compute(n: usize, seed: u64) -> Self {
        let mut ordinals: Vec<usize> = (0..n).collect();
        ordinals.shuffle(&mut seeded_rng(seed));

        let test_len = ((n as f64) * TEST_FRACTION).ceil() as usize;
        let test = ordinals[..test_len].to_vec();
        let train = ordinals[test_len..].to_vec();
        Self { train, test }
    }
}

pub(crate) fn subject_dir(data_dir: &Path, subject: u32) -> PathBuf {
    data_dir.join(format!("subj{subject:02}"))
}

fn parse_nsd_id(subject: u32, filename: &str) -> Result<u32, DataError> {
    let malformed = |reason: String| DataError::MalformedFilename {
        subject,
        filename: filename.to_string(),
        reason,
    };

    let start = filename
        .find(NSD_MARKER)
        .ok_or_else(|| malformed(format!("marker {NSD_MARKER:?} not found")))?
        + NSD_MARKER.len();
    let digits = filename
        .get(start..start + NSD_ID_DIGITS)
        .ok_or_else(|| malformed(format!("fewer than {NSD_ID_DIGITS} characters after marker")))?;
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed(format!("expected digits after marker, found {digits:?}")));
    }
    digits
        .parse()
        .map_err(|_| malformed(format!("id {digits:?} does not fit a u32")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs::File;

    use super::*;

    #[test]
    fn parses_id_after_marker() {
        assert_eq!(parse_nsd_id(3, "train-0001_nsd-00013.png").unwrap(), 13);
        assert_eq!(parse_nsd_id(3, "train-0002_nsd-72999.png").unwrap(), 72999);
    }

    #[test]
    fn rejects_filename_without_marker() {
        let err = parse_nsd_id(3, "train-0001.png").unwrap_err();
        assert!(matches!(err, DataError::MalformedFilename { subject: 3, .. }));
    }

    #[test]
    fn rejects_non_numeric_id() {
        let err = parse_nsd_id(3, "train-0001_nsd-abcde.png").unwrap_err();
        assert!(matches!(err, DataError::MalformedFilename { .. }));
    }

    #[test]
    fn rejects_truncated_id() {
        let err = parse_nsd_id(3, "train-0001_nsd-12.png").unwrap_err();
        assert!(matches!(err, DataError::MalformedFilename { .. }));
    }

    #[test]
    fn split_is_disjoint_and_covering() {
        let split = SplitIndices::compute(20, SPLIT_SEED);
        assert_eq!(split.train.len(), 18);
        assert_eq!(split.test.len(), 2);

        let train: HashSet<_> = split.train.iter().copied().collect();
        let test: HashSet<_> = split.test.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 20);
        assert!(train.union(&test).all(|&i| i < 20));
    }

    #[test]
    fn split_is_deterministic() {
        let first = SplitIndices::compute(973, SPLIT_SEED);
        let second = SplitIndices::compute(973, SPLIT_SEED);
        assert_eq!(first, second);
    }

    #[test]
    fn split_handles_empty_table() {
        let split = SplitIndices::compute(0, SPLIT_SEED);
        assert!(split.train.is_empty());
        assert!(split.test.is_empty());
    }

    #[test]
    fn loads_table_in_sorted_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        let images = subject_dir(dir.path(), 3)
            .join("training_split")
            .join("training_images");
        fs::create_dir_all(&images).unwrap();
        // Created out of order on purpose; the table must sort.
        for (stem, id) in [("train-0002", 7), ("train-0001", 13), ("train-0003", 5)] {
            File::create(images.join(format!("{stem}_nsd-{id:05}.png"))).unwrap();
        }

        let table = ImageIndexTable::load(dir.path(), 3).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.nsd_id(0), Some(13));
        assert_eq!(table.nsd_id(1), Some(7));
        assert_eq!(table.nsd_id(2), Some(5));
        assert_eq!(table.nsd_id(3), None);
    }

    #[test]
    fn load_fails_for_missing_subject() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageIndexTable::load(dir.path(), 9).unwrap_err();
        assert!(matches!(err, DataError::MissingFile { .. }));
    }
}
