//! Run preparation.
//!
//! Everything that can fail before the first unit is processed happens here,
//! in a fixed order: configuration check, model loading, model/config
//! agreement, unit discovery.

use crate::config::Config;
use crate::core::batch::BatchClassifier;
use crate::core::features::FeatureExtractor;
use crate::error::StartupError;
use crate::scoring::model::ModelArtifacts;
use crate::source::discovery::discover_units;
use crate::source::types::Unit;
use crate::source::workbook::{SeriesLoader, WorkbookLoader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A batch ready to run.
pub struct PreparedRun {
    pub model: Arc<ModelArtifacts>,
    pub classifier: BatchClassifier,
    /// Units in iteration order; may be empty
    pub units: Vec<Unit>,
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
}

/// Prepare a run reading workbooks from `data_dir`.
pub fn prepare_run(
    config: &Config,
    data_dir: &Path,
    model_dir: &Path,
) -> Result<PreparedRun, StartupError> {
    let loader = Arc::new(WorkbookLoader::new(config.features.section_name.clone()));
    prepare_run_with_loader(config, data_dir, model_dir, loader)
}

/// Prepare a run with a caller-supplied loader.
pub fn prepare_run_with_loader(
    config: &Config,
    data_dir: &Path,
    model_dir: &Path,
    loader: Arc<dyn SeriesLoader>,
) -> Result<PreparedRun, StartupError> {
    config.features.validate()?;

    let model = Arc::new(ModelArtifacts::load(model_dir)?);
    model.check_feature_config(&config.features)?;

    let units = discover_units(data_dir, &config.extension)?;

    let classifier = BatchClassifier::new(
        loader,
        FeatureExtractor::new(&config.features),
        model.clone(),
    )
    .with_workers(config.workers);

    Ok(PreparedRun {
        model,
        classifier,
        units,
        data_dir: data_dir.to_path_buf(),
        model_dir: model_dir.to_path_buf(),
    })
}
