use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{AliasKind, Category, EvidenceLevel, Severity, Subject};
use crate::config::OverrideAction;

/// How a candidate was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Exact hit on a canonical name or drug identifier.
    Exact,
    /// Exact hit on a generic, brand or class alias.
    Alias,
    /// Approximate hit within the edit-distance budget.
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Caller's already-known medication list.
    Known,
    /// Text fragment from a scanned label.
    Scanned,
}

/// A provisional match of one input to a catalog subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Input text as received.
    pub source_text: String,
    /// Catalog spelling of the alias that matched.
    pub matched_alias: String,
    /// Canonical drug name or class label.
    pub name: String,
    pub subject: Subject,
    pub kind: MatchKind,
    pub alias_kind: AliasKind,
    pub confidence: f64,
    pub origin: CandidateOrigin,
    /// Input position: known medications first, then fragments. Higher is newer.
    pub position: usize,
}

impl MatchCandidate {
    /// Named a drug class rather than a specific drug.
    pub fn is_class_level(&self) -> bool {
        self.subject.is_class()
    }
}

/// Output of candidate extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// One candidate per subject, ordered by input position.
    pub candidates: Vec<MatchCandidate>,
    /// Inputs that matched nothing within tolerance, in input order.
    pub unrecognized: Vec<String>,
}

impl ExtractionResult {
    pub fn specific(&self) -> impl Iterator<Item = &MatchCandidate> {
        self.candidates.iter().filter(|c| !c.is_class_level())
    }

    pub fn class_level(&self) -> impl Iterator<Item = &MatchCandidate> {
        self.candidates.iter().filter(|c| c.is_class_level())
    }
}

// ═══════════════════════════════════════════════════════════
// Alerts
// ═══════════════════════════════════════════════════════════

/// Which kind of rule produced an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// A rule naming both specific drugs.
    SpecificPair,
    /// A rule on a class on at least one side.
    ClassGeneralized,
}

/// One rule that matched a pair, primary or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingRule {
    pub rule_id: String,
    pub subject_a: Subject,
    pub subject_b: Subject,
    pub severity: Severity,
    pub category: Category,
    pub mechanism: String,
    pub evidence: EvidenceLevel,
}

/// A known interaction between two medications in the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionAlert {
    /// Stable per pair, so the same pair always yields the same id.
    pub id: Uuid,
    pub subject_a: Subject,
    pub subject_b: Subject,
    pub drug_a: String,
    pub drug_b: String,
    /// "A + B", used for ordering and display.
    pub pair_name: String,
    pub severity: Severity,
    pub category: Category,
    pub mechanism: String,
    pub clinical_effects: String,
    pub management: String,
    pub evidence: EvidenceLevel,
    pub resolution: Resolution,
    /// Primary rule first, then the rest in precedence order.
    pub contributing_rules: Vec<ContributingRule>,
    /// Lowest confidence of the two matched inputs.
    pub confidence: f64,
    pub risk_score: f64,
}

// ═══════════════════════════════════════════════════════════
// Assessment
// ═══════════════════════════════════════════════════════════

/// Aggregate verdict. `None` means no catalogued interaction, not
/// "no interaction exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallSeverity {
    None,
    Minor,
    Moderate,
    Major,
    Contraindicated,
}

impl From<Severity> for OverallSeverity {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Minor => Self::Minor,
            Severity::Moderate => Self::Moderate,
            Severity::Major => Self::Major,
            Severity::Contraindicated => Self::Contraindicated,
        }
    }
}

impl OverallSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::Major => "major",
            Self::Contraindicated => "contraindicated",
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        match self {
            Self::None => None,
            Self::Minor => Some(Severity::Minor),
            Self::Moderate => Some(Severity::Moderate),
            Self::Major => Some(Severity::Major),
            Self::Contraindicated => Some(Severity::Contraindicated),
        }
    }
}

/// Bucket of the highest alert risk score: >= 0.8 high, >= 0.6 moderate,
/// >= 0.3 low, below that minimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Minimal,
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.6 {
            Self::Moderate
        } else if score >= 0.3 {
            Self::Low
        } else {
            Self::Minimal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

/// How much of the pair space was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionScope {
    /// Every unordered pair.
    Full,
    /// Set exceeded the capacity threshold: newest item against the rest only.
    NewestOnly,
}

/// Final result of one assessment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_severity: OverallSeverity,
    /// Most severe first, then by pair name.
    pub alerts: Vec<InteractionAlert>,
    pub recommendations: Vec<String>,
    pub unrecognized: Vec<String>,
    pub requires_override: bool,
    pub action: OverrideAction,
    pub max_risk_score: f64,
    pub risk_level: RiskLevel,
    pub medications: Vec<MatchCandidate>,
    pub scope: ResolutionScope,
    pub catalog_version: u64,
}

/// Input to one assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentRequest {
    /// Raw text fragments from the label reader, unordered, possibly wrong.
    pub fragments: Vec<String>,
    /// Drug identifiers or names the caller already takes.
    pub known_medications: Vec<String>,
}

impl AssessmentRequest {
    pub fn from_fragments<S: Into<String>>(fragments: impl IntoIterator<Item = S>) -> Self {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            known_medications: Vec::new(),
        }
    }

    pub fn with_known<S: Into<String>>(mut self, known: impl IntoIterator<Item = S>) -> Self {
        self.known_medications = known.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_severity_orders_none_lowest() {
        assert!(OverallSeverity::None < OverallSeverity::Minor);
        assert!(OverallSeverity::Major < OverallSeverity::Contraindicated);
        assert_eq!(
            OverallSeverity::from(Severity::Major).severity(),
            Some(Severity::Major)
        );
        assert_eq!(OverallSeverity::None.severity(), None);
    }

    #[test]
    fn risk_level_buckets() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(0.29), RiskLevel::Minimal);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.59), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.79), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(0.8), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::High);
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"high\"");
    }

    #[test]
    fn request_builders() {
        let req = AssessmentRequest::from_fragments(["Warfarin 5mg"]).with_known(["aspirin"]);
        assert_eq!(req.fragments, vec!["Warfarin 5mg"]);
        assert_eq!(req.known_medications, vec!["aspirin"]);
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: AssessmentRequest = serde_json::from_str(r#"{"fragments": ["a"]}"#).unwrap();
        assert!(req.known_medications.is_empty());
    }
}
