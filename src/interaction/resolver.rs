use std::collections::BTreeSet;

use uuid::Uuid;

use crate::catalog::{CatalogSnapshot, ClassId, DrugCatalog, InteractionRule, PairKey, RuleIndex, Subject};
use crate::config::ResolutionConfig;

use super::types::{
    ContributingRule, InteractionAlert, MatchCandidate, Resolution, ResolutionScope,
};

/// Alerts for one medication set plus how much of it was checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome {
    pub alerts: Vec<InteractionAlert>,
    pub scope: ResolutionScope,
    /// Slots that took part in pair enumeration.
    pub slots: usize,
}

/// Turns a medication set into one alert per interacting pair.
pub struct InteractionResolver<'a> {
    rules: &'a RuleIndex,
    drugs: &'a DrugCatalog,
    config: &'a ResolutionConfig,
}

impl<'a> InteractionResolver<'a> {
    pub fn new(rules: &'a RuleIndex, drugs: &'a DrugCatalog, config: &'a ResolutionConfig) -> Self {
        Self {
            rules,
            drugs,
            config,
        }
    }

    pub fn for_snapshot(snapshot: &'a CatalogSnapshot, config: &'a ResolutionConfig) -> Self {
        Self::new(&snapshot.rules, &snapshot.drugs, config)
    }

    /// Resolve every relevant pair among the candidates.
    ///
    /// Candidates are expected one per subject, ordered oldest to newest.
    /// Pairs with no catalogued rule produce nothing.
    pub fn resolve(&self, candidates: &[MatchCandidate]) -> ResolutionOutcome {
        let slots = self.select_slots(candidates);
        let n = slots.len();

        let (pairs, scope) = if n > self.config.capacity_threshold {
            tracing::warn!(
                n,
                threshold = self.config.capacity_threshold,
                "Medication set exceeds capacity threshold, checking newest item only"
            );
            let newest = n - 1;
            let pairs: Vec<(usize, usize)> = (0..newest).map(|i| (i, newest)).collect();
            (pairs, ResolutionScope::NewestOnly)
        } else {
            let pairs: Vec<(usize, usize)> = (0..n)
                .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
                .collect();
            (pairs, ResolutionScope::Full)
        };

        let alerts: Vec<InteractionAlert> = pairs
            .into_iter()
            .filter_map(|(i, j)| self.resolve_pair(slots[i], slots[j]))
            .collect();

        tracing::debug!(slots = n, alerts = alerts.len(), "Pairs resolved");

        ResolutionOutcome {
            alerts,
            scope,
            slots: n,
        }
    }

    /// Specific drugs always take part. A class-level candidate takes part
    /// only when class generalization is on and no specific drug in the set
    /// already belongs to that class.
    fn select_slots<'c>(&self, candidates: &'c [MatchCandidate]) -> Vec<&'c MatchCandidate> {
        let covered: BTreeSet<&ClassId> = candidates
            .iter()
            .filter_map(|c| match &c.subject {
                Subject::Drug(id) => Some(self.drugs.classes_of(id)),
                Subject::Class(_) => None,
            })
            .flatten()
            .collect();

        candidates
            .iter()
            .filter(|c| match &c.subject {
                Subject::Drug(_) => true,
                Subject::Class(id) => {
                    let keep = self.config.class_generalization && !covered.contains(id);
                    if !keep {
                        tracing::debug!(class = %id, "Class-level candidate not used as a slot");
                    }
                    keep
                }
            })
            .collect()
    }

    fn resolve_pair(&self, a: &MatchCandidate, b: &MatchCandidate) -> Option<InteractionAlert> {
        let rules = self
            .rules
            .lookup_with(&a.subject, &b.subject, self.config.class_generalization);
        let primary = *rules.first()?;

        // Present the pair in canonical order so (a, b) and (b, a) agree
        let key = PairKey::new(a.subject.clone(), b.subject.clone());
        let (first, second) = if key.first == a.subject { (a, b) } else { (b, a) };

        let resolution = if primary.pair_key().is_specific() {
            Resolution::SpecificPair
        } else {
            Resolution::ClassGeneralized
        };

        let confidence = a.confidence.min(b.confidence);
        let risk_score = risk_score(primary, confidence);

        Some(InteractionAlert {
            id: alert_id(&key),
            subject_a: first.subject.clone(),
            subject_b: second.subject.clone(),
            drug_a: first.name.clone(),
            drug_b: second.name.clone(),
            pair_name: format!("{} + {}", first.name, second.name),
            severity: primary.severity,
            category: primary.category,
            mechanism: primary.mechanism.clone(),
            clinical_effects: primary.clinical_effects.clone(),
            management: primary.management.clone(),
            evidence: primary.evidence,
            resolution,
            contributing_rules: rules.iter().copied().map(contributing).collect(),
            confidence,
            risk_score,
        })
    }
}

/// `(severity + evidence) / 2`, scaled by match confidence, capped at 1.
pub fn risk_score(rule: &InteractionRule, confidence: f64) -> f64 {
    let base = (rule.severity.score() + rule.evidence.score()) / 2.0;
    (base * confidence).min(1.0)
}

/// Name-based UUID of a canonical pair, stable across runs and processes.
pub fn alert_id(key: &PairKey) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.to_string().as_bytes())
}

fn contributing(rule: &InteractionRule) -> ContributingRule {
    ContributingRule {
        rule_id: rule.id.clone(),
        subject_a: rule.subject_a.clone(),
        subject_b: rule.subject_b.clone(),
        severity: rule.severity,
        category: rule.category,
        mechanism: rule.mechanism.clone(),
        evidence: rule.evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        AliasKind, CatalogSource, Category, ClassDefinition, DrugId, DrugRecord, EvidenceLevel,
        Severity,
    };
    use crate::config::CatalogConfig;
    use crate::interaction::types::{CandidateOrigin, MatchKind};

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::build(&CatalogSource::load_test(), &CatalogConfig::default()).unwrap()
    }

    fn candidate(subject: Subject, position: usize) -> MatchCandidate {
        MatchCandidate {
            source_text: subject.id_str().to_string(),
            matched_alias: subject.id_str().to_string(),
            name: subject.id_str().to_string(),
            alias_kind: if subject.is_class() {
                AliasKind::Class
            } else {
                AliasKind::Canonical
            },
            subject,
            kind: MatchKind::Exact,
            confidence: 1.0,
            origin: CandidateOrigin::Scanned,
            position,
        }
    }

    fn drugs(ids: &[&str]) -> Vec<MatchCandidate> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| candidate(Subject::drug(*id), i))
            .collect()
    }

    fn resolve(snapshot: &CatalogSnapshot, candidates: &[MatchCandidate]) -> ResolutionOutcome {
        let config = ResolutionConfig::default();
        InteractionResolver::for_snapshot(snapshot, &config).resolve(candidates)
    }

    #[test]
    fn specific_rule_is_primary() {
        let snap = snapshot();
        let out = resolve(&snap, &drugs(&["warfarin", "aspirin"]));
        assert_eq!(out.alerts.len(), 1);
        let alert = &out.alerts[0];
        assert_eq!(alert.severity, Severity::Major);
        assert_eq!(alert.resolution, Resolution::SpecificPair);
        assert_eq!(alert.contributing_rules[0].rule_id, "warfarin-aspirin");
        // The class rule still contributes its mechanism
        assert!(alert
            .contributing_rules
            .iter()
            .any(|r| r.rule_id == "anticoagulants-nsaids"));
    }

    #[test]
    fn no_rule_no_alert() {
        let snap = snapshot();
        let out = resolve(&snap, &drugs(&["lisinopril", "metformin"]));
        assert!(out.alerts.is_empty());
        assert_eq!(out.scope, ResolutionScope::Full);
    }

    #[test]
    fn class_rule_yields_generalized_alert() {
        let snap = snapshot();
        let out = resolve(&snap, &drugs(&["lisinopril", "potassium_chloride"]));
        assert_eq!(out.alerts.len(), 1);
        assert_eq!(out.alerts[0].resolution, Resolution::ClassGeneralized);
        assert_eq!(out.alerts[0].severity, Severity::Major);
    }

    #[test]
    fn class_generalization_can_be_disabled() {
        let snap = snapshot();
        let config = ResolutionConfig {
            class_generalization: false,
            ..ResolutionConfig::default()
        };
        let resolver = InteractionResolver::for_snapshot(&snap, &config);
        assert!(resolver
            .resolve(&drugs(&["lisinopril", "potassium_chloride"]))
            .alerts
            .is_empty());
        let specific = resolver.resolve(&drugs(&["warfarin", "aspirin"]));
        assert_eq!(specific.alerts[0].contributing_rules.len(), 1);
    }

    #[test]
    fn three_drugs_two_pairs() {
        let snap = snapshot();
        let out = resolve(&snap, &drugs(&["simvastatin", "clarithromycin", "atorvastatin"]));
        assert_eq!(out.alerts.len(), 2);
        let severities: BTreeSet<_> = out.alerts.iter().map(|a| a.severity).collect();
        assert!(severities.contains(&Severity::Contraindicated));
        assert!(severities.contains(&Severity::Moderate));
    }

    #[test]
    fn pair_orientation_is_canonical() {
        let snap = snapshot();
        let forward = resolve(&snap, &drugs(&["warfarin", "aspirin"]));
        let reverse = resolve(&snap, &drugs(&["aspirin", "warfarin"]));
        assert_eq!(forward.alerts, reverse.alerts);
    }

    #[test]
    fn class_only_candidate_used_as_fallback() {
        let snap = snapshot();
        let candidates = vec![
            candidate(Subject::drug("warfarin"), 0),
            candidate(Subject::class("NSAIDs"), 1),
        ];
        let out = resolve(&snap, &candidates);
        assert_eq!(out.alerts.len(), 1);
        assert_eq!(out.alerts[0].resolution, Resolution::ClassGeneralized);
        assert_eq!(out.alerts[0].contributing_rules[0].rule_id, "anticoagulants-nsaids");
    }

    #[test]
    fn class_candidate_dropped_when_specific_member_present() {
        let snap = snapshot();
        let candidates = vec![
            candidate(Subject::drug("warfarin"), 0),
            candidate(Subject::drug("ibuprofen"), 1),
            candidate(Subject::class("NSAIDs"), 2),
        ];
        let out = resolve(&snap, &candidates);
        assert_eq!(out.slots, 2);
        assert_eq!(out.alerts.len(), 1);
    }

    fn class_member(id: &str, class: &str) -> DrugRecord {
        DrugRecord {
            id: DrugId::new(id),
            canonical_name: format!("{id}drug"),
            generic_name: None,
            brand_names: vec![],
            classes: vec![ClassId::new(class)],
        }
    }

    fn tiered_rule(id: &str, a: Subject, b: Subject, severity: Severity) -> InteractionRule {
        InteractionRule {
            id: id.into(),
            subject_a: a,
            subject_b: b,
            severity,
            category: Category::Pharmacodynamic,
            mechanism: format!("mechanism of {id}"),
            clinical_effects: String::new(),
            management: format!("manage {id}"),
            evidence: EvidenceLevel::Established,
        }
    }

    /// x sits in c1; y and z sit in c2. x–z has its own minor rule.
    fn tiered_snapshot() -> CatalogSnapshot {
        let class = |id: &str| ClassDefinition {
            id: ClassId::new(id),
            label: format!("class {id}"),
            aliases: vec![],
        };
        let source = CatalogSource {
            classes: vec![class("c1"), class("c2")],
            drugs: vec![
                class_member("x", "c1"),
                class_member("y", "c2"),
                class_member("z", "c2"),
            ],
            rules: vec![
                tiered_rule("x-c2", Subject::drug("x"), Subject::class("c2"), Severity::Moderate),
                tiered_rule("c1-c2", Subject::class("c1"), Subject::class("c2"), Severity::Major),
                tiered_rule("x-z", Subject::drug("x"), Subject::drug("z"), Severity::Minor),
            ],
        };
        CatalogSnapshot::build(&source, &CatalogConfig::default()).unwrap()
    }

    #[test]
    fn most_severe_class_rule_wins_across_tiers() {
        let snap = tiered_snapshot();
        let out = resolve(&snap, &drugs(&["x", "y"]));
        assert_eq!(out.alerts.len(), 1);
        let alert = &out.alerts[0];
        assert_eq!(alert.severity, Severity::Major);
        assert_eq!(alert.resolution, Resolution::ClassGeneralized);
        assert_eq!(alert.management, "manage c1-c2");
        let ids: Vec<_> = alert.contributing_rules.iter().map(|r| r.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["c1-c2", "x-c2"]);
    }

    #[test]
    fn specific_member_supersedes_class_candidate() {
        let snap = tiered_snapshot();
        let class_only = vec![
            candidate(Subject::drug("x"), 0),
            candidate(Subject::class("c2"), 1),
        ];
        let before = resolve(&snap, &class_only);
        assert_eq!(before.alerts.len(), 1);
        assert_eq!(before.alerts[0].severity, Severity::Major);

        // Once z is named, the c2 label is covered and z's own rule governs
        let mut with_member = class_only;
        with_member.push(candidate(Subject::drug("z"), 2));
        let after = resolve(&snap, &with_member);
        assert_eq!(after.slots, 2);
        assert_eq!(after.alerts.len(), 1);
        let alert = &after.alerts[0];
        assert_eq!(alert.severity, Severity::Minor);
        assert_eq!(alert.resolution, Resolution::SpecificPair);
        assert_eq!(alert.contributing_rules[0].rule_id, "x-z");
        assert!(alert.contributing_rules.iter().any(|r| r.rule_id == "c1-c2"));
    }

    #[test]
    fn same_class_duplication_alert() {
        let snap = snapshot();
        let out = resolve(&snap, &drugs(&["ibuprofen", "naproxen"]));
        assert_eq!(out.alerts.len(), 1);
        assert_eq!(out.alerts[0].contributing_rules[0].rule_id, "nsaid-duplication");
    }

    #[test]
    fn alert_confidence_and_risk_score() {
        let snap = snapshot();
        let mut candidates = drugs(&["warfarin", "aspirin"]);
        candidates[1].confidence = 0.8;
        let alert = &resolve(&snap, &candidates).alerts[0];
        assert_eq!(alert.confidence, 0.8);
        // major 0.8, established 1.0
        assert!((alert.risk_score - 0.9 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn alert_id_is_stable_per_pair() {
        let key = PairKey::new(Subject::drug("warfarin"), Subject::drug("aspirin"));
        let reversed = PairKey::new(Subject::drug("aspirin"), Subject::drug("warfarin"));
        assert_eq!(alert_id(&key), alert_id(&reversed));
        let other = PairKey::new(Subject::drug("digoxin"), Subject::drug("verapamil"));
        assert_ne!(alert_id(&key), alert_id(&other));
    }

    #[test]
    fn capacity_guard_checks_newest_only() {
        let snap = snapshot();
        let config = ResolutionConfig {
            capacity_threshold: 3,
            ..ResolutionConfig::default()
        };
        // digoxin-verapamil is an older pair, ibuprofen-warfarin involves the newest
        let candidates = drugs(&["digoxin", "verapamil", "metformin", "warfarin", "ibuprofen"]);
        let out = InteractionResolver::for_snapshot(&snap, &config).resolve(&candidates);
        assert_eq!(out.scope, ResolutionScope::NewestOnly);
        assert_eq!(out.alerts.len(), 1);
        assert_eq!(out.alerts[0].contributing_rules[0].rule_id, "anticoagulants-nsaids");
    }
}
