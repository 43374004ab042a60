//! Candidate extraction: noisy label text → catalog subjects with confidence.
//!
//! Each input is cleaned (dose quantities and dosage-form words removed),
//! normalised, then matched exactly, then approximately within a budget that
//! grows with name length. When the whole fragment fails, contiguous token
//! windows are tried so a sentence-like label line can still resolve.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{
    normalize, AliasEntry, AliasIndex, AliasKind, CatalogSnapshot, DrugCatalog, DrugId, Subject,
};
use crate::config::ExtractionConfig;

use super::types::{CandidateOrigin, ExtractionResult, MatchCandidate, MatchKind};

/// Dose quantities: "5mg", "81 mg", "0.5 g", "100mcg", "10ml", "2%".
static DOSE_QUANTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+(?:[.,]\d+)?\s*(?:(?:mg|mcg|µg|ug|g|ml|iu|units?|meq)\b|%)").unwrap()
});

/// Dosage-form words and stray unit tokens.
static FORM_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:tablets?|tabs?|capsules?|caps?|injection|solution|suspension|syrup|cream|ointment|drops|mg|mcg|g|ml)\b",
    )
    .unwrap()
});

/// Strip dose and form noise from a label line, then normalise it.
pub fn clean_label(raw: &str) -> String {
    let without_dose = DOSE_QUANTITY.replace_all(raw, " ");
    let without_form = FORM_WORDS.replace_all(&without_dose, " ");
    normalize(&without_form)
}

/// A name-level hit before it is attached to an input.
#[derive(Debug, Clone, Copy)]
struct NameMatch<'a> {
    entry: &'a AliasEntry,
    kind: MatchKind,
    confidence: f64,
}

/// Matches inputs against one snapshot's alias index.
pub struct CandidateExtractor<'a> {
    aliases: &'a AliasIndex,
    drugs: &'a DrugCatalog,
    config: &'a ExtractionConfig,
}

impl<'a> CandidateExtractor<'a> {
    pub fn new(aliases: &'a AliasIndex, drugs: &'a DrugCatalog, config: &'a ExtractionConfig) -> Self {
        Self {
            aliases,
            drugs,
            config,
        }
    }

    pub fn for_snapshot(snapshot: &'a CatalogSnapshot, config: &'a ExtractionConfig) -> Self {
        Self::new(&snapshot.aliases, &snapshot.drugs, config)
    }

    /// Extract candidates from scanned fragments only.
    pub fn extract<S: AsRef<str>>(&self, fragments: &[S]) -> ExtractionResult {
        self.extract_request::<&str, S>(&[], fragments)
    }

    /// Extract candidates from the caller's known medications followed by
    /// scanned fragments. Known medications take the lower (older) positions.
    pub fn extract_request<K: AsRef<str>, S: AsRef<str>>(
        &self,
        known: &[K],
        fragments: &[S],
    ) -> ExtractionResult {
        let mut collector = Collector::default();
        let mut position = 0;

        for raw in known {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }
            match self.match_known(raw, position) {
                Some(candidate) => collector.offer(candidate),
                None => collector.reject(raw),
            }
            position += 1;
        }

        for raw in fragments {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }
            match self.match_fragment(raw, position) {
                Some(candidate) => collector.offer(candidate),
                None => collector.reject(raw),
            }
            position += 1;
        }

        collector.finish()
    }

    /// Match one scanned fragment.
    pub fn match_fragment(&self, raw: &str, position: usize) -> Option<MatchCandidate> {
        self.match_text(raw)
            .map(|m| self.candidate(raw, m, CandidateOrigin::Scanned, position))
    }

    /// Match one known medication: drug identifier first, then as text.
    pub fn match_known(&self, raw: &str, position: usize) -> Option<MatchCandidate> {
        let id = DrugId::new(raw.trim());
        if let Some(drug) = self.drugs.drug(&id) {
            return Some(MatchCandidate {
                source_text: raw.to_string(),
                matched_alias: drug.canonical_name.clone(),
                name: drug.canonical_name.clone(),
                subject: Subject::Drug(id),
                kind: MatchKind::Exact,
                alias_kind: AliasKind::Canonical,
                confidence: 1.0,
                origin: CandidateOrigin::Known,
                position,
            });
        }
        self.match_text(raw)
            .map(|m| self.candidate(raw, m, CandidateOrigin::Known, position))
    }

    fn candidate(
        &self,
        raw: &str,
        m: NameMatch<'_>,
        origin: CandidateOrigin,
        position: usize,
    ) -> MatchCandidate {
        MatchCandidate {
            source_text: raw.to_string(),
            matched_alias: m.entry.display.clone(),
            name: self.drugs.display_name(&m.entry.target),
            subject: m.entry.target.clone(),
            kind: m.kind,
            alias_kind: m.entry.kind,
            confidence: m.confidence,
            origin,
            position,
        }
    }

    fn match_text(&self, raw: &str) -> Option<NameMatch<'a>> {
        let cleaned = clean_label(raw);
        if cleaned.chars().count() < self.config.min_fragment_chars {
            tracing::debug!(fragment = raw, "Fragment too short after cleaning");
            return None;
        }

        let found = self
            .match_exact(&cleaned)
            .or_else(|| self.match_fuzzy(&cleaned))
            .or_else(|| self.match_windows(&cleaned));

        match &found {
            Some(m) => tracing::debug!(
                fragment = raw,
                cleaned = %cleaned,
                target = %m.entry.target,
                kind = m.kind.as_str(),
                confidence = m.confidence,
                "Fragment matched"
            ),
            None => tracing::debug!(fragment = raw, cleaned = %cleaned, "Fragment unrecognized"),
        }
        found
    }

    fn match_exact(&self, name: &str) -> Option<NameMatch<'a>> {
        self.aliases.lookup_exact(name).map(|entry| NameMatch {
            entry,
            kind: if entry.kind == AliasKind::Canonical {
                MatchKind::Exact
            } else {
                MatchKind::Alias
            },
            confidence: 1.0,
        })
    }

    /// Best approximate hit above the acceptance floor.
    ///
    /// A tie at the best distance and alias kind between different targets
    /// keeps the first (alphabetical) entry but lowers its confidence.
    fn match_fuzzy(&self, name: &str) -> Option<NameMatch<'a>> {
        let len = name.chars().count();
        if len < self.config.min_fuzzy_chars {
            return None;
        }

        let max_distance = self.config.max_distance.for_len(len);
        let mut hits = self.aliases.lookup_fuzzy(name, max_distance);
        let (best, distance) = hits.next()?;

        let ambiguous = hits
            .take_while(|(e, d)| *d == distance && e.kind == best.kind)
            .any(|(e, _)| e.target != best.target);

        let mut confidence = 1.0 - distance as f64 / len as f64;
        if ambiguous {
            confidence *= 1.0 - self.config.ambiguity_penalty;
            tracing::debug!(name, target = %best.target, "Ambiguous fuzzy match, confidence lowered");
        }

        if confidence < self.config.acceptance_floor {
            tracing::debug!(
                name,
                alias = %best.alias,
                distance,
                confidence,
                floor = self.config.acceptance_floor,
                "Fuzzy match below acceptance floor"
            );
            return None;
        }

        Some(NameMatch {
            entry: best,
            kind: MatchKind::Fuzzy,
            confidence,
        })
    }

    /// Retry on contiguous token windows, longest first then leftmost.
    /// All windows are tried exactly before any is tried approximately.
    fn match_windows(&self, cleaned: &str) -> Option<NameMatch<'a>> {
        let tokens: Vec<&str> = cleaned.split(' ').collect();
        if tokens.len() < 2 {
            return None;
        }
        let widest = self.config.max_window_tokens.min(tokens.len() - 1);

        let windows: Vec<String> = (1..=widest)
            .rev()
            .flat_map(|w| tokens.windows(w).map(|win| win.join(" ")))
            .filter(|win| win.chars().count() >= self.config.min_fragment_chars)
            .collect();

        windows
            .iter()
            .find_map(|win| self.match_exact(win))
            .or_else(|| windows.iter().find_map(|win| self.match_fuzzy(win)))
    }
}

/// Deduplicates candidates by subject, keeping the most confident.
#[derive(Default)]
struct Collector {
    candidates: Vec<MatchCandidate>,
    by_subject: HashMap<Subject, usize>,
    unrecognized: Vec<String>,
}

impl Collector {
    /// The slot keeps the position and origin of the subject's first
    /// appearance; its match details come from the most confident input.
    fn offer(&mut self, candidate: MatchCandidate) {
        match self.by_subject.get(&candidate.subject) {
            Some(&i) => {
                let slot = &mut self.candidates[i];
                if candidate.confidence > slot.confidence {
                    let (position, origin) = (slot.position, slot.origin);
                    *slot = MatchCandidate {
                        position,
                        origin,
                        ..candidate
                    };
                }
            }
            None => {
                self.by_subject
                    .insert(candidate.subject.clone(), self.candidates.len());
                self.candidates.push(candidate);
            }
        }
    }

    fn reject(&mut self, raw: &str) {
        self.unrecognized.push(raw.trim().to_string());
    }

    fn finish(self) -> ExtractionResult {
        ExtractionResult {
            candidates: self.candidates,
            unrecognized: self.unrecognized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSource, DrugRecord};

    fn fixture() -> (DrugCatalog, AliasIndex) {
        let source = CatalogSource::load_test();
        AliasIndex::from_records(&source.drugs, &source.classes).unwrap()
    }

    fn extract(fragments: &[&str]) -> ExtractionResult {
        let (drugs, aliases) = fixture();
        let config = ExtractionConfig::default();
        CandidateExtractor::new(&aliases, &drugs, &config).extract(fragments)
    }

    #[test]
    fn clean_label_strips_dose_and_form() {
        assert_eq!(clean_label("Warfarin 5mg"), "warfarin");
        assert_eq!(clean_label("Asprin 81 mg tablets"), "asprin");
        assert_eq!(clean_label("Potassium Chloride 0.5g"), "potassium chloride");
        assert_eq!(clean_label("Amoxicillin 250mg/5ml suspension"), "amoxicillin");
        assert_eq!(clean_label("Hydrocortisone 1% cream"), "hydrocortisone");
        assert_eq!(clean_label("Xyzzy123"), "xyzzy123");
    }

    #[test]
    fn exact_canonical_match() {
        let result = extract(&["Warfarin 5mg"]);
        assert_eq!(result.candidates.len(), 1);
        let c = &result.candidates[0];
        assert_eq!(c.subject, Subject::drug("warfarin"));
        assert_eq!(c.kind, MatchKind::Exact);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.source_text, "Warfarin 5mg");
    }

    #[test]
    fn brand_is_alias_match() {
        let result = extract(&["COUMADIN"]);
        let c = &result.candidates[0];
        assert_eq!(c.subject, Subject::drug("warfarin"));
        assert_eq!(c.kind, MatchKind::Alias);
        assert_eq!(c.alias_kind, AliasKind::Brand);
        assert_eq!(c.name, "Warfarin");
    }

    #[test]
    fn misspelling_matches_fuzzily() {
        let result = extract(&["Asprin 81mg"]);
        let c = &result.candidates[0];
        assert_eq!(c.subject, Subject::drug("aspirin"));
        assert_eq!(c.kind, MatchKind::Fuzzy);
        assert!(c.confidence > 0.6);
        assert!((c.confidence - (1.0 - 1.0 / 6.0)).abs() < 1e-9);
    }

    #[test]
    fn gibberish_is_unrecognized() {
        let result = extract(&["Xyzzy123"]);
        assert!(result.candidates.is_empty());
        assert_eq!(result.unrecognized, vec!["Xyzzy123"]);
    }

    #[test]
    fn blank_fragments_are_ignored() {
        let result = extract(&["   ", ""]);
        assert!(result.candidates.is_empty());
        assert!(result.unrecognized.is_empty());
    }

    #[test]
    fn too_short_after_cleaning_is_unrecognized() {
        let result = extract(&["x 10mg"]);
        assert!(result.candidates.is_empty());
        assert_eq!(result.unrecognized, vec!["x 10mg"]);
    }

    #[test]
    fn short_names_are_not_fuzzy_matched() {
        // One edit from "aleve", but below the fuzzy length minimum
        let result = extract(&["alev"]);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn distance_beyond_budget_is_unrecognized() {
        // Transposition costs two edits; a 9-char name allows one
        let result = extract(&["Metfromin"]);
        assert!(result.candidates.is_empty());
        assert_eq!(result.unrecognized.len(), 1);
    }

    #[test]
    fn acceptance_floor_discards_weak_matches() {
        let (drugs, aliases) = fixture();
        let config = ExtractionConfig {
            acceptance_floor: 0.9,
            ..ExtractionConfig::default()
        };
        let result = CandidateExtractor::new(&aliases, &drugs, &config).extract(&["Asprin"]);
        assert!(result.candidates.is_empty());
        assert_eq!(result.unrecognized, vec!["Asprin"]);
    }

    #[test]
    fn token_window_finds_name_in_sentence() {
        let result = extract(&["Take one Lisinopril daily"]);
        assert_eq!(result.candidates.len(), 1);
        assert_eq!(result.candidates[0].subject, Subject::drug("lisinopril"));
    }

    #[test]
    fn multi_token_alias_wins_over_single_token() {
        let result = extract(&["Rx: Potassium Chloride ER"]);
        assert_eq!(result.candidates[0].subject, Subject::drug("potassium_chloride"));
    }

    #[test]
    fn dedup_by_subject_keeps_highest_confidence() {
        let result = extract(&["Asprin", "Bayer Aspirin 81mg", "Aspirin"]);
        let aspirin: Vec<_> = result
            .candidates
            .iter()
            .filter(|c| c.subject == Subject::drug("aspirin"))
            .collect();
        assert_eq!(aspirin.len(), 1);
        assert_eq!(aspirin[0].confidence, 1.0);
        // Slot stays where the subject first appeared
        assert_eq!(aspirin[0].position, 0);
    }

    #[test]
    fn brand_and_generic_collapse_to_one_drug() {
        let result = extract(&["Coumadin", "warfarin sodium"]);
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn class_label_is_class_level_candidate() {
        let result = extract(&["NSAID", "Warfarin"]);
        let classes: Vec<_> = result.class_level().collect();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].subject, Subject::class("NSAIDs"));
        assert_eq!(result.specific().count(), 1);
    }

    #[test]
    fn known_medication_by_id_or_name() {
        let (drugs, aliases) = fixture();
        let config = ExtractionConfig::default();
        let extractor = CandidateExtractor::new(&aliases, &drugs, &config);
        let result = extractor.extract_request(&["potassium_chloride", "Zocor"], &["Biaxin 500mg"]);

        assert_eq!(result.candidates.len(), 3);
        assert_eq!(result.candidates[0].origin, CandidateOrigin::Known);
        assert_eq!(result.candidates[0].kind, MatchKind::Exact);
        assert_eq!(result.candidates[1].subject, Subject::drug("simvastatin"));
        assert_eq!(result.candidates[2].origin, CandidateOrigin::Scanned);
        assert_eq!(result.candidates[2].position, 2);
    }

    #[test]
    fn ambiguous_tie_lowers_confidence() {
        let drugs = vec![
            DrugRecord {
                id: DrugId::new("a"),
                canonical_name: "Zantac".into(),
                generic_name: None,
                brand_names: vec![],
                classes: vec![],
            },
            DrugRecord {
                id: DrugId::new("b"),
                canonical_name: "Zantaz".into(),
                generic_name: None,
                brand_names: vec![],
                classes: vec![],
            },
        ];
        let (catalog, aliases) = AliasIndex::from_records(&drugs, &[]).unwrap();
        let config = ExtractionConfig::default();
        let result = CandidateExtractor::new(&aliases, &catalog, &config).extract(&["zantax"]);

        let c = &result.candidates[0];
        assert_eq!(c.subject, Subject::drug("a"));
        let expected = (1.0 - 1.0 / 6.0) * 0.9;
        assert!((c.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn candidates_keep_input_order() {
        let result = extract(&["Digoxin", "Xyzzy", "Verapamil"]);
        let names: Vec<_> = result.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Digoxin", "Verapamil"]);
        assert_eq!(result.unrecognized, vec!["Xyzzy"]);
    }
}
