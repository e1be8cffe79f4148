//! Explicit caches for the two expensive steps: loading a file and training
//! a model. Entries are keyed by a content fingerprint and replaced when the
//! fingerprint changes.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::data::loader::{load_file_with, LoadOptions};
use crate::data::model::AirQualityDataset;
use crate::model::{Evaluation, Trainer, TrainerConfig};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Hash of the schema and every cell.
    pub fn of_dataset(dataset: &AirQualityDataset) -> Self {
        let mut hasher = DefaultHasher::new();
        dataset.columns().hash(&mut hasher);
        dataset.records().hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Path, size and modification time of a file.
    pub fn of_file(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::DataNotFound {
                path: path.to_path_buf(),
            },
            _ => Error::Io(e),
        })?;
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        meta.len().hash(&mut hasher);
        meta.modified()?.hash(&mut hasher);
        Ok(Self(hasher.finish()))
    }

    /// Combine with a trainer configuration.
    pub fn with_config(self, config: &TrainerConfig) -> Self {
        let mut hasher = DefaultHasher::new();
        self.0.hash(&mut hasher);
        format!("{config:?}").hash(&mut hasher);
        Self(hasher.finish())
    }
}

// ---------------------------------------------------------------------------
// Dataset cache
// ---------------------------------------------------------------------------

/// Loaded datasets per path, reloaded when the file changes on disk.
#[derive(Debug, Default)]
pub struct DatasetCache {
    options: LoadOptions,
    entries: HashMap<PathBuf, (Fingerprint, Arc<AirQualityDataset>)>,
}

impl DatasetCache {
    pub fn new(options: LoadOptions) -> Self {
        Self {
            options,
            entries: HashMap::new(),
        }
    }

    pub fn get_or_load(&mut self, path: &Path) -> Result<Arc<AirQualityDataset>> {
        let fingerprint = Fingerprint::of_file(path)?;
        if let Some((cached, dataset)) = self.entries.get(path) {
            if *cached == fingerprint {
                log::debug!("Dataset cache hit for {}", path.display());
                return Ok(Arc::clone(dataset));
            }
        }

        let dataset = Arc::new(load_file_with(path, &self.options)?);
        self.entries
            .insert(path.to_path_buf(), (fingerprint, Arc::clone(&dataset)));
        Ok(dataset)
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Model cache
// ---------------------------------------------------------------------------

/// Evaluations of the current dataset, one per trainer config. Training on
/// a dataset with different content drops every earlier entry.
#[derive(Debug, Default)]
pub struct ModelCache {
    dataset: Option<Fingerprint>,
    entries: HashMap<Fingerprint, Arc<Evaluation>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(trainer: &Trainer, dataset: Fingerprint) -> Fingerprint {
        dataset.with_config(trainer.config())
    }

    pub fn get(&self, trainer: &Trainer, dataset: &AirQualityDataset) -> Option<Arc<Evaluation>> {
        let fingerprint = Fingerprint::of_dataset(dataset);
        if self.dataset != Some(fingerprint) {
            return None;
        }
        self.entries.get(&Self::key(trainer, fingerprint)).cloned()
    }

    /// Return the cached evaluation or train, store and return a new one.
    /// A failed fit stores nothing.
    pub fn get_or_train(
        &mut self,
        trainer: &Trainer,
        dataset: &AirQualityDataset,
    ) -> Result<Arc<Evaluation>> {
        let fingerprint = Fingerprint::of_dataset(dataset);
        let key = Self::key(trainer, fingerprint);
        if self.dataset == Some(fingerprint) {
            if let Some(hit) = self.entries.get(&key) {
                log::info!("Model cache hit; reusing trained model");
                return Ok(Arc::clone(hit));
            }
        }

        let evaluation = Arc::new(trainer.fit_and_evaluate(dataset)?);
        if self.dataset != Some(fingerprint) {
            if !self.entries.is_empty() {
                log::debug!("Dataset changed; dropping {} cached models", self.entries.len());
            }
            self.entries.clear();
            self.dataset = Some(fingerprint);
        }
        self.entries.insert(key, Arc::clone(&evaluation));
        Ok(evaluation)
    }

    pub fn invalidate(&mut self, trainer: &Trainer, dataset: &AirQualityDataset) {
        let key = Self::key(trainer, Fingerprint::of_dataset(dataset));
        self.entries.remove(&key);
    }

    pub fn clear(&mut self) {
        self.dataset = None;
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
