//! Per-session dataset store.
//!
//! A [`SessionState`] holds at most one raw and one cleaned dataset under the
//! well-known [`DatasetKey`]s, plus lazily computed column profiles for each.
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────┐
//! │  datasets: RwLock            │  profiles: RwLock                │
//! │  - raw: Arc<RawDataset>      │  DatasetKey -> (generation,      │
//! │  - cleaned: Arc<Cleaned..>   │                 Arc<profiles>)   │
//! │  - generation counter        │                                  │
//! └──────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! Storing a new raw dataset bumps the generation and drops the cleaned
//! dataset and every cached profile while the dataset lock is held, so no
//! reader can observe a cleaned dataset that belongs to an older upload.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::dataset::{CleanedDataset, RawDataset};
use crate::error::{ProcessingError, Result};
use crate::ingest::{ingest_bytes, ingest_file};
use crate::pipeline::Pipeline;
use crate::profiler::DataProfiler;
use crate::reporting::CleaningReport;
use crate::types::{ColumnProfile, DatasetKey};
use crate::view::DatasetView;

// ============================================================================
// STORED VALUES
// ============================================================================

/// A dataset as held by the session.
#[derive(Debug, Clone)]
pub enum StoredDataset {
    Raw(Arc<RawDataset>),
    Cleaned(Arc<CleanedDataset>),
}

impl StoredDataset {
    pub fn key(&self) -> DatasetKey {
        match self {
            Self::Raw(_) => DatasetKey::Raw,
            Self::Cleaned(_) => DatasetKey::Cleaned,
        }
    }

    pub fn view(&self) -> DatasetView<'_> {
        match self {
            Self::Raw(raw) => DatasetView::raw(raw),
            Self::Cleaned(cleaned) => DatasetView::cleaned(cleaned),
        }
    }

    /// Generation of the upload this dataset belongs to.
    pub fn generation(&self) -> u64 {
        match self {
            Self::Raw(raw) => raw.generation(),
            Self::Cleaned(cleaned) => cleaned.source_generation(),
        }
    }
}

impl From<RawDataset> for StoredDataset {
    fn from(raw: RawDataset) -> Self {
        Self::Raw(Arc::new(raw))
    }
}

impl From<CleanedDataset> for StoredDataset {
    fn from(cleaned: CleanedDataset) -> Self {
        Self::Cleaned(Arc::new(cleaned))
    }
}

#[derive(Debug, Default)]
struct Datasets {
    raw: Option<Arc<RawDataset>>,
    cleaned: Option<Arc<CleanedDataset>>,
    /// Report of the run that produced `cleaned`.
    report: Option<Arc<CleaningReport>>,
    generation: u64,
}

type CachedProfiles = (u64, Arc<Vec<ColumnProfile>>);

// ============================================================================
// WORKFLOW
// ============================================================================

/// One step of the dashboard workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowStep {
    pub name: &'static str,
    pub complete: bool,
}

/// Workflow progress derived from which datasets are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowProgress {
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowProgress {
    pub fn completed(&self) -> usize {
        self.steps.iter().filter(|s| s.complete).count()
    }

    pub fn percentage(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.completed() as f64 / self.steps.len() as f64 * 100.0
    }

    /// First step not yet complete.
    pub fn next_step(&self) -> Option<&'static str> {
        self.steps.iter().find(|s| !s.complete).map(|s| s.name)
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// Outcome of [`SessionState::run_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub cleaned: Arc<CleanedDataset>,
    pub report: Arc<CleaningReport>,
}

/// Every stored value, captured under one read of the dataset lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub raw: Option<Arc<RawDataset>>,
    pub cleaned: Option<Arc<CleanedDataset>>,
    pub report: Option<Arc<CleaningReport>>,
    pub workflow: WorkflowProgress,
}

/// The session-scoped store for raw and cleaned datasets.
#[derive(Debug, Default)]
pub struct SessionState {
    datasets: RwLock<Datasets>,
    profiles: RwLock<BTreeMap<DatasetKey, CachedProfiles>>,
}

static_assertions::assert_impl_all!(SessionState: Send, Sync);

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under its own key.
    pub fn put(&self, value: impl Into<StoredDataset>) -> Result<()> {
        match value.into() {
            StoredDataset::Raw(raw) => {
                self.store_raw(Arc::unwrap_or_clone(raw));
                Ok(())
            }
            StoredDataset::Cleaned(cleaned) => self.store_cleaned(cleaned, None),
        }
    }

    /// Store a new upload, replacing any previous one.
    ///
    /// The cleaned dataset and all cached profiles are cleared. Returns the
    /// generation assigned to the upload.
    pub fn put_raw(&self, raw: RawDataset) -> u64 {
        self.store_raw(raw).generation()
    }

    fn store_raw(&self, mut raw: RawDataset) -> Arc<RawDataset> {
        let mut datasets = self.datasets.write();
        datasets.generation += 1;
        let generation = datasets.generation;

        raw.set_generation(generation);
        let raw = Arc::new(raw);
        datasets.raw = Some(Arc::clone(&raw));
        datasets.report = None;
        if datasets.cleaned.take().is_some() {
            debug!("Cleaned dataset invalidated by upload #{}", generation);
        }
        self.profiles.write().clear();

        info!("Stored upload #{}", generation);
        raw
    }

    /// Store a cleaned dataset produced from the current raw dataset.
    ///
    /// # Errors
    ///
    /// [`ProcessingError::DependencyNotMet`] when there is no raw dataset, and
    /// [`ProcessingError::StaleDataset`] when `cleaned` came from an older upload.
    pub fn put_cleaned(&self, cleaned: CleanedDataset) -> Result<()> {
        self.store_cleaned(Arc::new(cleaned), None)
    }

    fn store_cleaned(
        &self,
        cleaned: Arc<CleanedDataset>,
        report: Option<Arc<CleaningReport>>,
    ) -> Result<()> {
        let mut datasets = self.datasets.write();
        let Some(raw) = &datasets.raw else {
            return Err(ProcessingError::DependencyNotMet {
                page: "store cleaned dataset".to_string(),
                required: DatasetKey::Raw,
            });
        };
        if cleaned.source_generation() != raw.generation() {
            return Err(ProcessingError::StaleDataset {
                cleaned_from: cleaned.source_generation(),
                current: raw.generation(),
            });
        }

        datasets.cleaned = Some(cleaned);
        datasets.report = report;
        self.profiles.write().remove(&DatasetKey::Cleaned);
        Ok(())
    }

    /// The value stored under `key`, if any.
    pub fn get(&self, key: DatasetKey) -> Option<StoredDataset> {
        match key {
            DatasetKey::Raw => self.raw().map(StoredDataset::Raw),
            DatasetKey::Cleaned => self.cleaned().map(StoredDataset::Cleaned),
        }
    }

    pub fn raw(&self) -> Option<Arc<RawDataset>> {
        self.datasets.read().raw.clone()
    }

    pub fn cleaned(&self) -> Option<Arc<CleanedDataset>> {
        self.datasets.read().cleaned.clone()
    }

    /// Report of the pipeline run behind the current cleaned dataset.
    ///
    /// `None` when the cleaned dataset was stored directly with [`Self::put_cleaned`].
    pub fn report(&self) -> Option<Arc<CleaningReport>> {
        self.datasets.read().report.clone()
    }

    pub fn contains(&self, key: DatasetKey) -> bool {
        let datasets = self.datasets.read();
        match key {
            DatasetKey::Raw => datasets.raw.is_some(),
            DatasetKey::Cleaned => datasets.cleaned.is_some(),
        }
    }

    /// The value under `key`, or [`ProcessingError::DependencyNotMet`] naming `page`.
    pub fn require(&self, key: DatasetKey, page: &str) -> Result<StoredDataset> {
        self.get(key).ok_or_else(|| ProcessingError::DependencyNotMet {
            page: page.to_string(),
            required: key,
        })
    }

    /// Drop every dataset and cached profile.
    pub fn clear(&self) {
        let mut datasets = self.datasets.write();
        datasets.raw = None;
        datasets.cleaned = None;
        datasets.report = None;
        self.profiles.write().clear();
        info!("Session cleared");
    }

    /// Column profiles for the dataset under `key`, computed on first access.
    ///
    /// Returns `Ok(None)` when nothing is stored under `key`.
    pub fn profiles(&self, key: DatasetKey) -> Result<Option<Arc<Vec<ColumnProfile>>>> {
        match self.get(key) {
            Some(stored) => self.profiles_of(&stored).map(Some),
            None => Ok(None),
        }
    }

    /// Column profiles for a dataset taken from this session.
    ///
    /// Profiles are cached per key and generation; a dataset that has since
    /// been replaced is profiled but not cached.
    pub fn profiles_of(&self, stored: &StoredDataset) -> Result<Arc<Vec<ColumnProfile>>> {
        let key = stored.key();
        let generation = stored.generation();

        if let Some((cached_generation, profiles)) = self.profiles.read().get(&key) {
            if *cached_generation == generation {
                return Ok(Arc::clone(profiles));
            }
        }

        debug!("Profiling {} dataset", key);
        let profiles = Arc::new(DataProfiler::profile_dataset(&stored.view())?);

        // Only cache if the dataset was not replaced while profiling.
        let datasets = self.datasets.read();
        if stored_generation(&datasets, key) == Some(generation) {
            self.profiles
                .write()
                .insert(key, (generation, Arc::clone(&profiles)));
        }
        Ok(profiles)
    }

    /// Ingest an upload and store it as the raw dataset.
    ///
    /// A failed upload leaves the session untouched.
    pub fn upload(&self, bytes: &[u8], name: &str, config: &IngestConfig) -> Result<Arc<RawDataset>> {
        let raw = ingest_bytes(bytes, name, config)?;
        Ok(self.store_raw(raw))
    }

    /// Read a file from disk and store it as the raw dataset.
    pub fn upload_file(
        &self,
        path: impl AsRef<Path>,
        config: &IngestConfig,
    ) -> Result<Arc<RawDataset>> {
        let raw = ingest_file(path, config)?;
        Ok(self.store_raw(raw))
    }

    /// Run `pipeline` over the raw dataset and store the result as cleaned.
    pub fn run_pipeline(&self, pipeline: &Pipeline) -> Result<PipelineOutcome> {
        let raw = self.raw().ok_or_else(|| ProcessingError::DependencyNotMet {
            page: "preprocessing".to_string(),
            required: DatasetKey::Raw,
        })?;

        let (cleaned, report) = pipeline.run(&raw)?;
        let cleaned = Arc::new(cleaned);
        let report = Arc::new(report);
        self.store_cleaned(Arc::clone(&cleaned), Some(Arc::clone(&report)))?;
        Ok(PipelineOutcome { cleaned, report })
    }

    /// Progress through the dashboard workflow.
    pub fn workflow(&self) -> WorkflowProgress {
        let datasets = self.datasets.read();
        workflow_progress(&datasets)
    }

    /// Datasets, report and workflow as one consistent view.
    pub fn snapshot(&self) -> SessionSnapshot {
        let datasets = self.datasets.read();
        SessionSnapshot {
            raw: datasets.raw.clone(),
            cleaned: datasets.cleaned.clone(),
            report: datasets.report.clone(),
            workflow: workflow_progress(&datasets),
        }
    }
}

fn workflow_progress(datasets: &Datasets) -> WorkflowProgress {
    let has_raw = datasets.raw.is_some();
    let has_cleaned = datasets.cleaned.is_some();
    let step = |name, complete| WorkflowStep { name, complete };

    WorkflowProgress {
        steps: vec![
            step("Problem Understanding", has_raw),
            step("Stakeholder Analysis", has_raw),
            step("KPI Definition", has_raw),
            step("Data Upload", has_raw),
            step("Data Preprocessing", has_cleaned),
            step("Data Visualization", has_cleaned),
        ],
    }
}

fn stored_generation(datasets: &Datasets, key: DatasetKey) -> Option<u64> {
    match key {
        DatasetKey::Raw => datasets.raw.as_ref().map(|r| r.generation()),
        DatasetKey::Cleaned => datasets.cleaned.as_ref().map(|c| c.source_generation()),
    }
}
