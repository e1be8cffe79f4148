//! AQI regression: feature pipeline, random forest, training and inference.
//!
//! ```text
//!  AirQualityDataset ──► FeaturePartition::resolve ──► train_test_split
//!                                                           │
//!                          FeaturePipeline::fit (train rows only)
//!                                                           │
//!                          RandomForest::fit ──► R², RMSE, importances
//!                                                           │
//!                                    Arc<TrainedModel> ──► predict(FeatureRow)
//! ```

pub mod config;
pub mod features;
pub mod forest;
pub mod metrics;
pub mod trainer;
pub mod tree;

pub use config::{FeatureSpec, TrainerConfig};
pub use features::{FeaturePipeline, FeatureRow, FeatureSource, RecordView};
pub use trainer::{
    fit_and_evaluate, train_test_split, Evaluation, FeatureImportance, TrainTestSplit,
    TrainedModel, Trainer,
};
