//! Immutable catalog snapshots and the single swappable reference to the
//! current one.
//!
//! Readers clone an `Arc` under a read lock held only for the clone, then
//! work against that snapshot for the rest of the request. A reload builds a
//! complete new snapshot off-lock and publishes it with one pointer swap, so
//! no reader ever sees a half-built catalog.

use std::sync::{Arc, RwLock};

use chrono::NaiveDateTime;

use crate::config::CatalogConfig;

use super::alias::{AliasIndex, DrugCatalog};
use super::loader::CatalogSource;
use super::rules::RuleIndex;
use super::CatalogError;

/// One fully built, read-only version of the drug and rule catalogs.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub version: u64,
    pub fingerprint: String,
    pub built_at: NaiveDateTime,
    pub drugs: DrugCatalog,
    pub aliases: AliasIndex,
    pub rules: RuleIndex,
}

impl CatalogSnapshot {
    /// Build and validate every index. The result carries version 1 until a
    /// store assigns its publication version.
    pub fn build(source: &CatalogSource, config: &CatalogConfig) -> Result<Self, CatalogError> {
        let (drugs, aliases) = AliasIndex::from_records(&source.drugs, &source.classes)?;
        let rules = RuleIndex::build(&source.rules, &drugs, config.strict_rule_conflicts)?;
        let fingerprint = source.fingerprint();

        tracing::info!(
            drugs = drugs.drug_count(),
            classes = drugs.class_count(),
            aliases = aliases.len(),
            rules = rules.len(),
            fingerprint = %&fingerprint[..12],
            "Catalog snapshot built"
        );

        Ok(Self {
            version: 1,
            fingerprint,
            built_at: chrono::Local::now().naive_local(),
            drugs,
            aliases,
            rules,
        })
    }

    fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

/// Holder of the current snapshot. Single writer, many readers.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<CatalogSnapshot>>,
    config: CatalogConfig,
}

impl SnapshotStore {
    pub fn new(snapshot: CatalogSnapshot, config: CatalogConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
            config,
        }
    }

    /// Build the first snapshot from a source.
    pub fn from_source(source: &CatalogSource, config: CatalogConfig) -> Result<Self, CatalogError> {
        let snapshot = CatalogSnapshot::build(source, &config)?;
        Ok(Self::new(snapshot, config))
    }

    /// The snapshot requests should run against.
    pub fn current(&self) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let guard = self.current.read().map_err(|_| CatalogError::LockFailed)?;
        Ok(Arc::clone(&guard))
    }

    /// Build a snapshot from `source` and publish it.
    ///
    /// On a build error the current snapshot stays published and the error is
    /// returned to the loader. An unchanged source (same fingerprint) is not
    /// republished.
    pub fn reload(&self, source: &CatalogSource) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let current = self.current()?;
        if current.fingerprint == source.fingerprint() {
            tracing::debug!(version = current.version, "Catalog source unchanged, keeping snapshot");
            return Ok(current);
        }

        let built = match CatalogSnapshot::build(source, &self.config) {
            Ok(built) => built,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    serving_version = current.version,
                    "Catalog reload rejected, keeping last good snapshot"
                );
                return Err(e);
            }
        };

        Ok(self.publish(built)?)
    }

    /// Publish an already built snapshot under the next version number.
    pub fn publish(&self, snapshot: CatalogSnapshot) -> Result<Arc<CatalogSnapshot>, CatalogError> {
        let mut guard = self.current.write().map_err(|_| CatalogError::LockFailed)?;
        let previous = guard.version;
        let next = Arc::new(snapshot.with_version(previous + 1));
        *guard = Arc::clone(&next);

        tracing::info!(
            previous_version = previous,
            version = next.version,
            "Catalog snapshot published"
        );
        Ok(next)
    }
}
