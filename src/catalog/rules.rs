use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::alias::DrugCatalog;
use super::types::{ClassId, DrugId, InteractionRule, PairKey, Subject};
use super::CatalogError;

/// Immutable index of interaction rules keyed by canonical subject pair.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    by_pair: HashMap<PairKey, Vec<InteractionRule>>,
    memberships: HashMap<DrugId, Vec<ClassId>>,
    rule_count: usize,
}

impl RuleIndex {
    /// Validate and index the rule catalog against a built drug catalog.
    ///
    /// Two rules for the same pair with different severities are resolved by
    /// keeping the more severe one, unless `strict_conflicts` is set, in which
    /// case the build fails. Rules with identical content are collapsed.
    pub fn build(
        rules: &[InteractionRule],
        catalog: &DrugCatalog,
        strict_conflicts: bool,
    ) -> Result<Self, CatalogError> {
        let mut seen_ids = HashSet::new();
        // BTreeMap keeps conflict handling independent of hash order
        let mut grouped: BTreeMap<PairKey, Vec<InteractionRule>> = BTreeMap::new();

        for rule in rules {
            if !seen_ids.insert(rule.id.as_str()) {
                return Err(CatalogError::DuplicateRuleId(rule.id.clone()));
            }
            if let (Subject::Drug(a), Subject::Drug(b)) = (&rule.subject_a, &rule.subject_b) {
                if a == b {
                    return Err(CatalogError::SelfInteraction {
                        rule: rule.id.clone(),
                    });
                }
            }
            for subject in [&rule.subject_a, &rule.subject_b] {
                if !catalog.contains(subject) {
                    return Err(CatalogError::UnknownSubject {
                        rule: rule.id.clone(),
                        subject: subject.clone(),
                    });
                }
            }

            let key = rule.pair_key();
            let bucket = grouped.entry(key.clone()).or_default();
            merge_rule(bucket, rule, &key, strict_conflicts)?;
        }

        let rule_count = grouped.values().map(Vec::len).sum();
        let by_pair = grouped.into_iter().collect();
        let memberships = catalog
            .drugs()
            .map(|d| (d.id.clone(), d.classes.clone()))
            .collect();

        Ok(Self {
            by_pair,
            memberships,
            rule_count,
        })
    }

    pub fn len(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    /// Rules stored under exactly this pair, without class expansion.
    pub fn rules_for_pair(&self, key: &PairKey) -> &[InteractionRule] {
        self.by_pair.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every rule relevant to the concrete pair `(a, b)`, including rules on
    /// the classes either drug belongs to.
    pub fn lookup(&self, a: &Subject, b: &Subject) -> Vec<&InteractionRule> {
        self.lookup_with(a, b, true)
    }

    /// Like [`lookup`](Self::lookup), with class expansion optional.
    ///
    /// Result order: rules naming both specific drugs first, then every
    /// class-level rule by severity descending, then rule id. Drug–class and
    /// class–class rules share one tier.
    /// The pair is canonicalised first, so `(a, b)` and `(b, a)` agree.
    pub fn lookup_with(
        &self,
        a: &Subject,
        b: &Subject,
        class_generalization: bool,
    ) -> Vec<&InteractionRule> {
        let key = PairKey::new(a.clone(), b.clone());
        let left = self.expand(&key.first, class_generalization);
        let right = self.expand(&key.second, class_generalization);

        let mut seen = BTreeSet::new();
        let mut found: Vec<&InteractionRule> = Vec::new();
        for x in &left {
            for y in &right {
                let pair = PairKey::new(x.clone(), y.clone());
                for rule in self.rules_for_pair(&pair) {
                    if seen.insert(rule.id.as_str()) {
                        found.push(rule);
                    }
                }
            }
        }

        found.sort_by(|r1, r2| {
            r2.pair_key()
                .is_specific()
                .cmp(&r1.pair_key().is_specific())
                .then_with(|| r2.severity.cmp(&r1.severity))
                .then_with(|| r1.id.cmp(&r2.id))
        });
        found
    }

    /// A subject plus, for drugs, every class it belongs to.
    fn expand(&self, subject: &Subject, class_generalization: bool) -> Vec<Subject> {
        let mut out = vec![subject.clone()];
        if let (Subject::Drug(id), true) = (subject, class_generalization) {
            if let Some(classes) = self.memberships.get(id) {
                out.extend(classes.iter().cloned().map(Subject::Class));
            }
        }
        out
    }
}

/// Add `rule` to the bucket for `key`, applying the conflict policy.
fn merge_rule(
    bucket: &mut Vec<InteractionRule>,
    rule: &InteractionRule,
    key: &PairKey,
    strict_conflicts: bool,
) -> Result<(), CatalogError> {
    if bucket.iter().any(|existing| existing.same_content(rule)) {
        tracing::debug!(rule = %rule.id, pair = %key, "Identical rule already indexed, skipping");
        return Ok(());
    }

    let conflicting = bucket
        .iter()
        .position(|existing| existing.severity != rule.severity);

    match conflicting {
        None => bucket.push(rule.clone()),
        Some(i) if strict_conflicts => {
            return Err(CatalogError::ConflictingRules {
                pair: key.clone(),
                first: bucket[i].id.clone(),
                second: rule.id.clone(),
            });
        }
        Some(i) => {
            let upgrade = rule.severity > bucket[i].severity;
            let (kept, dropped) = if upgrade {
                (rule.id.as_str(), bucket[i].id.as_str())
            } else {
                (bucket[i].id.as_str(), rule.id.as_str())
            };
            tracing::warn!(
                pair = %key,
                kept,
                dropped,
                "Conflicting rule severities for the same pair, keeping the more severe"
            );
            if upgrade {
                // Every rule left in a bucket shares one severity, so the new
                // rule replaces the whole bucket.
                bucket.clear();
                bucket.push(rule.clone());
            }
        }
    }

    Ok(())
}
