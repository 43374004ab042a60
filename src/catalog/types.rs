use std::fmt;

use serde::{Deserialize, Serialize};

use super::CatalogError;

/// Macro to generate a closed catalog vocabulary with as_str + std::str::FromStr.
/// Declaration order is the total order used for comparisons. Extra spellings
/// after `|` are accepted by `from_str` and should be mirrored as serde aliases.
macro_rules! catalog_enum {
    (
        $(#[$meta:meta])* $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $s:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = CatalogError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($s $(| $alias)* => Ok(Self::$variant)),+,
                    _ => Err(CatalogError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

catalog_enum!(
    /// Interaction mechanism family.
    Category {
        Pharmacokinetic => "pharmacokinetic",
        Pharmacodynamic => "pharmacodynamic",
        Physicochemical => "physicochemical",
    }
);

catalog_enum!(
    /// Strength of the evidence behind a rule, weakest first.
    EvidenceLevel {
        Theoretical => "theoretical",
        CaseReport => "case_report",
        Observational => "observational",
        Probable => "probable",
        ClinicalTrial => "clinical_trial",
        Established => "established",
        SystematicReview => "systematic_review",
    }
);

impl EvidenceLevel {
    /// Weight used by the alert risk score.
    pub fn score(&self) -> f64 {
        match self {
            Self::Theoretical => 0.5,
            Self::CaseReport => 0.5,
            Self::Observational => 0.7,
            Self::Probable => 0.8,
            Self::ClinicalTrial => 0.9,
            Self::Established => 1.0,
            Self::SystematicReview => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

catalog_enum!(
    /// Interaction severity tier. The derived order is the clinical order,
    /// so `max()` over severities is the aggregate risk.
    Severity {
        Minor => "minor",
        Moderate => "moderate",
        Major => "major",
        #[serde(alias = "critical", alias = "severe")]
        Contraindicated => "contraindicated" | "critical" | "severe",
    }
);

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Minor,
        Severity::Moderate,
        Severity::Major,
        Severity::Contraindicated,
    ];

    /// Weight used by the alert risk score.
    pub fn score(&self) -> f64 {
        match self {
            Self::Minor => 0.3,
            Self::Moderate => 0.6,
            Self::Major => 0.8,
            Self::Contraindicated => 1.0,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable catalog identifier of a drug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrugId(pub String);

/// Stable catalog identifier of a drug class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub String);

impl DrugId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ClassId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DrugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One side of an interaction rule, or one slot of a medication set.
///
/// Variant order matters: a specific drug sorts before any class, which
/// fixes the canonical order of a rule pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Subject {
    Drug(DrugId),
    Class(ClassId),
}

impl Subject {
    pub fn drug(id: impl Into<String>) -> Self {
        Self::Drug(DrugId::new(id))
    }

    pub fn class(id: impl Into<String>) -> Self {
        Self::Class(ClassId::new(id))
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Self::Class(_))
    }

    pub fn id_str(&self) -> &str {
        match self {
            Self::Drug(id) => id.as_str(),
            Self::Class(id) => id.as_str(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drug(id) => write!(f, "drug:{id}"),
            Self::Class(id) => write!(f, "class:{id}"),
        }
    }
}

/// Unordered pair of subjects stored lower-first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub first: Subject,
    pub second: Subject,
}

impl PairKey {
    pub fn new(a: Subject, b: Subject) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Number of specific-drug sides: 2 for a drug pair, 0 for a class pair.
    pub fn specificity(&self) -> u8 {
        u8::from(!self.first.is_class()) + u8::from(!self.second.is_class())
    }

    /// Both sides name a specific drug.
    pub fn is_specific(&self) -> bool {
        self.specificity() == 2
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.first, self.second)
    }
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

/// A drug class definition (e.g. "ACE_inhibitors").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub id: ClassId,
    /// Human-readable label, also indexed as a class alias.
    pub label: String,
    /// Extra label spellings found on packaging ("NSAID", "blood thinner").
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A catalogued drug. Immutable once the snapshot is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugRecord {
    pub id: DrugId,
    pub canonical_name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub brand_names: Vec<String>,
    /// Class memberships; a drug may sit in several classes.
    #[serde(default)]
    pub classes: Vec<ClassId>,
}

/// A pairwise interaction rule between drugs and/or classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRule {
    pub id: String,
    pub subject_a: Subject,
    pub subject_b: Subject,
    pub severity: Severity,
    pub category: Category,
    pub mechanism: String,
    #[serde(default)]
    pub clinical_effects: String,
    #[serde(default)]
    pub management: String,
    pub evidence: EvidenceLevel,
}

impl InteractionRule {
    pub fn pair_key(&self) -> PairKey {
        PairKey::new(self.subject_a.clone(), self.subject_b.clone())
    }

    /// True when two rules say the same thing about the same pair.
    pub fn same_content(&self, other: &InteractionRule) -> bool {
        self.pair_key() == other.pair_key()
            && self.severity == other.severity
            && self.category == other.category
            && self.mechanism == other.mechanism
            && self.clinical_effects == other.clinical_effects
            && self.management == other.management
            && self.evidence == other.evidence
    }
}
