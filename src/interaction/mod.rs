pub mod types;
pub mod extractor; // Candidate Extractor
pub mod resolver; // Interaction Resolver
pub mod aggregator; // Risk Aggregator
pub mod engine;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;

pub use aggregator::aggregate;
pub use engine::InteractionEngine;
pub use extractor::{clean_label, CandidateExtractor};
pub use resolver::{alert_id, risk_score, InteractionResolver, ResolutionOutcome};
pub use types::{
    AssessmentRequest, CandidateOrigin, ContributingRule, ExtractionResult, InteractionAlert,
    MatchCandidate, MatchKind, OverallSeverity, Resolution, ResolutionScope, RiskAssessment,
    RiskLevel,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog snapshot lock poisoned")]
    LockPoisoned,
}
