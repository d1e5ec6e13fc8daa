pub mod config;
pub mod error;
pub mod metrics;
pub mod nsd;
pub mod report;
pub mod rng;
pub mod surface;
pub mod visualization;

pub use config::{load_or_init, TrainConfig};
pub use error::DataError;
pub use metrics::{EvaluationMetrics, StepMetrics};
pub use nsd::{
    load_hemisphere_fmri, load_train_test_datasets, BatchIterator, Hemisphere,
    HemisphereSelection, ImageIndexTable, RoiMask, RoiSurfaceMaps, SplitDatasets, SplitIndices,
};
pub use report::{ensure_report_file, update_sections, ReportSection, DEFAULT_REPORT_TEMPLATE};
pub use rng::seeded_rng;
pub use surface::{project_class, project_roi};
pub use visualization::encode_surface_png_data_url;
