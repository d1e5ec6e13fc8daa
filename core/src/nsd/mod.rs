//! The NSD data pipeline: image-index bookkeeping, ROI masks, train/test
//! dataset construction and batching.

pub mod batch;
pub mod dataset;
pub mod index;
pub(crate) mod npy;
pub mod roi;

pub use batch::BatchIterator;
pub use dataset::{
    load_hemisphere_fmri, load_train_test_datasets, Hemisphere, HemisphereSelection, SplitDatasets,
};
pub use index::{ImageIndexTable, SplitIndices, SPLIT_SEED};
pub use roi::{RoiMask, RoiSurfaceMaps};
