pub mod types;
pub mod normalize;
pub mod alias; // Drug Catalog & Alias Index
pub mod rules; // Interaction Rule Index
pub mod loader;
pub mod snapshot;

use thiserror::Error;

pub use alias::{AliasEntry, AliasIndex, AliasKind, AliasTarget, DrugCatalog, FuzzyMatches};
pub use loader::CatalogSource;
pub use normalize::normalize;
pub use rules::RuleIndex;
pub use snapshot::{CatalogSnapshot, SnapshotStore};
pub use types::{
    Category, ClassDefinition, ClassId, DrugId, DrugRecord, EvidenceLevel, InteractionRule,
    PairKey, Severity, Subject,
};

/// Structurally invalid catalog data. Fatal to the reload that produced it;
/// the previously published snapshot keeps serving.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Duplicate drug identifier: {0}")]
    DuplicateDrugId(DrugId),

    #[error("Duplicate class identifier: {0}")]
    DuplicateClassId(ClassId),

    #[error("Drug {drug} references undefined class {class}")]
    UnknownClass { drug: DrugId, class: ClassId },

    #[error("Drug {0} has an empty canonical name")]
    EmptyName(DrugId),

    #[error("Alias '{alias}' resolves to both {first} and {second}")]
    AliasConflict {
        alias: String,
        first: Subject,
        second: Subject,
    },

    #[error("Duplicate rule identifier: {0}")]
    DuplicateRuleId(String),

    #[error("Rule {rule} names the same drug on both sides")]
    SelfInteraction { rule: String },

    #[error("Rule {rule} references unknown subject {subject}")]
    UnknownSubject { rule: String, subject: Subject },

    #[error("Rules {first} and {second} conflict on pair {pair}")]
    ConflictingRules {
        pair: PairKey,
        first: String,
        second: String,
    },

    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Catalog source load failed ({0}): {1}")]
    SourceLoad(String, String),

    #[error("Catalog source parse failed ({0}): {1}")]
    SourceParse(String, String),

    #[error("Internal lock failed")]
    LockFailed,
}
