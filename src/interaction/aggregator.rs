use std::collections::HashSet;

use crate::config::{OverrideAction, OverridePolicy};

use super::types::{InteractionAlert, OverallSeverity, ResolutionScope, RiskAssessment, RiskLevel};

/// Reduce alerts to one verdict.
///
/// Overall severity is the maximum over alerts, never an average. Alerts are
/// ordered most severe first, then by pair name. Recommendations are the
/// management texts of the ordered alerts, first occurrence kept.
///
/// Extraction-derived fields (`unrecognized`, `medications`) and snapshot
/// metadata are left empty for the caller to fill.
pub fn aggregate(mut alerts: Vec<InteractionAlert>, policy: &OverridePolicy) -> RiskAssessment {
    alerts.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.pair_name.cmp(&b.pair_name))
            .then_with(|| a.id.cmp(&b.id))
    });

    let overall_severity = alerts
        .iter()
        .map(|a| OverallSeverity::from(a.severity))
        .max()
        .unwrap_or(OverallSeverity::None);

    let action = overall_severity
        .severity()
        .map(|s| policy.action_for(s))
        .unwrap_or(OverrideAction::Informational);

    let max_risk_score = alerts.iter().map(|a| a.risk_score).fold(0.0, f64::max);

    RiskAssessment {
        overall_severity,
        recommendations: recommendations(&alerts),
        alerts,
        unrecognized: Vec::new(),
        requires_override: action == OverrideAction::Override,
        action,
        max_risk_score,
        risk_level: RiskLevel::from_score(max_risk_score),
        medications: Vec::new(),
        scope: ResolutionScope::Full,
        catalog_version: 0,
    }
}

fn recommendations(alerts: &[InteractionAlert]) -> Vec<String> {
    let mut seen = HashSet::new();
    alerts
        .iter()
        .map(|a| a.management.trim())
        .filter(|m| !m.is_empty())
        .filter(|m| seen.insert(*m))
        .map(str::to_string)
        .collect()
}
