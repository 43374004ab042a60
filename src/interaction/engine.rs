use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{CatalogError, CatalogSnapshot, CatalogSource, SnapshotStore};
use crate::config::EngineConfig;

use super::aggregator::aggregate;
use super::extractor::CandidateExtractor;
use super::resolver::InteractionResolver;
use super::types::{AssessmentRequest, RiskAssessment};
use super::EngineError;

/// Extract → resolve → aggregate against one catalog snapshot per request.
///
/// The engine holds no per-request state, so one instance can serve any
/// number of threads. Reloads go through the shared [`SnapshotStore`];
/// a request keeps the snapshot it started with.
pub struct InteractionEngine {
    store: Arc<SnapshotStore>,
    config: EngineConfig,
}

impl InteractionEngine {
    pub fn new(store: Arc<SnapshotStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Validate the config and build the first snapshot from `source`.
    pub fn from_source(source: &CatalogSource, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = SnapshotStore::from_source(source, config.catalog.clone())?;
        Ok(Self::new(Arc::new(store), config))
    }

    /// Load a catalog directory and build the engine on it.
    pub fn load_dir(dir: &Path, config: EngineConfig) -> Result<Self, EngineError> {
        let source = CatalogSource::load_dir(dir)?;
        Self::from_source(&source, config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, EngineError> {
        self.store.current().map_err(lock_error)
    }

    /// Assess a request against the current snapshot.
    pub fn assess(&self, request: &AssessmentRequest) -> Result<RiskAssessment, EngineError> {
        let snapshot = self.snapshot()?;
        Ok(self.assess_with(&snapshot, request))
    }

    /// Assess a request against a given snapshot. Pure: identical inputs give
    /// identical assessments.
    pub fn assess_with(&self, snapshot: &CatalogSnapshot, request: &AssessmentRequest) -> RiskAssessment {
        let start = Instant::now();

        let extraction = CandidateExtractor::for_snapshot(snapshot, &self.config.extraction)
            .extract_request(&request.known_medications, &request.fragments);
        let outcome = InteractionResolver::for_snapshot(snapshot, &self.config.resolution)
            .resolve(&extraction.candidates);

        let mut assessment = aggregate(outcome.alerts, &self.config.override_policy);
        assessment.scope = outcome.scope;
        assessment.catalog_version = snapshot.version;
        assessment.unrecognized = extraction.unrecognized;
        assessment.medications = extraction.candidates;

        let processing_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            catalog_version = snapshot.version,
            fragments = request.fragments.len(),
            known = request.known_medications.len(),
            recognized = assessment.medications.len(),
            unrecognized = assessment.unrecognized.len(),
            alerts = assessment.alerts.len(),
            overall = assessment.overall_severity.as_str(),
            risk_level = assessment.risk_level.as_str(),
            requires_override = assessment.requires_override,
            processing_ms,
            "Interaction assessment complete"
        );

        assessment
    }

    /// Rebuild from `source` and publish. Returns the serving version.
    /// On failure the previous snapshot keeps serving.
    pub fn reload(&self, source: &CatalogSource) -> Result<u64, EngineError> {
        let snapshot = self.store.reload(source).map_err(lock_error)?;
        Ok(snapshot.version)
    }

    pub fn reload_dir(&self, dir: &Path) -> Result<u64, EngineError> {
        let source = CatalogSource::load_dir(dir)?;
        self.reload(&source)
    }
}

fn lock_error(e: CatalogError) -> EngineError {
    match e {
        CatalogError::LockFailed => EngineError::LockPoisoned,
        other => EngineError::Catalog(other),
    }
}
