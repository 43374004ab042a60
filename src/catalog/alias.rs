use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::normalize::normalize;
use super::types::{ClassDefinition, ClassId, DrugId, DrugRecord, Subject};
use super::CatalogError;

/// What an alias resolves to.
pub type AliasTarget = Subject;

/// Provenance of an alias. Declaration order is authority order:
/// a canonical name beats a generic name, which beats a brand, which beats a class label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasKind {
    Canonical,
    Generic,
    Brand,
    Class,
}

impl AliasKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::Generic => "generic",
            Self::Brand => "brand",
            Self::Class => "class",
        }
    }
}

/// One normalised name in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    /// Normalised key.
    pub alias: String,
    /// Spelling as it appears in the catalog.
    pub display: String,
    pub target: AliasTarget,
    pub kind: AliasKind,
}

// ---------------------------------------------------------------------------
// DrugCatalog
// ---------------------------------------------------------------------------

/// Validated drug and class records, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct DrugCatalog {
    drugs: BTreeMap<DrugId, DrugRecord>,
    classes: BTreeMap<ClassId, ClassDefinition>,
}

impl DrugCatalog {
    /// Validate and key the raw records.
    /// Fails on duplicate identifiers, empty names and dangling class references.
    pub fn build(
        drugs: &[DrugRecord],
        classes: &[ClassDefinition],
    ) -> Result<Self, CatalogError> {
        let mut class_map = BTreeMap::new();
        for class in classes {
            if class_map.insert(class.id.clone(), class.clone()).is_some() {
                return Err(CatalogError::DuplicateClassId(class.id.clone()));
            }
        }

        let mut drug_map = BTreeMap::new();
        for drug in drugs {
            if normalize(&drug.canonical_name).is_empty() {
                return Err(CatalogError::EmptyName(drug.id.clone()));
            }
            if let Some(class) = drug.classes.iter().find(|c| !class_map.contains_key(*c)) {
                return Err(CatalogError::UnknownClass {
                    drug: drug.id.clone(),
                    class: class.clone(),
                });
            }
            if drug_map.insert(drug.id.clone(), drug.clone()).is_some() {
                return Err(CatalogError::DuplicateDrugId(drug.id.clone()));
            }
        }

        Ok(Self {
            drugs: drug_map,
            classes: class_map,
        })
    }

    pub fn drug(&self, id: &DrugId) -> Option<&DrugRecord> {
        self.drugs.get(id)
    }

    pub fn class(&self, id: &ClassId) -> Option<&ClassDefinition> {
        self.classes.get(id)
    }

    pub fn drugs(&self) -> impl Iterator<Item = &DrugRecord> {
        self.drugs.values()
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassDefinition> {
        self.classes.values()
    }

    pub fn drug_count(&self) -> usize {
        self.drugs.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Class memberships of a drug (empty for unknown drugs).
    pub fn classes_of(&self, id: &DrugId) -> &[ClassId] {
        self.drugs
            .get(id)
            .map(|d| d.classes.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, subject: &Subject) -> bool {
        match subject {
            Subject::Drug(id) => self.drugs.contains_key(id),
            Subject::Class(id) => self.classes.contains_key(id),
        }
    }

    /// Display name for a subject: canonical drug name or class label,
    /// falling back to the raw identifier.
    pub fn display_name(&self, subject: &Subject) -> String {
        match subject {
            Subject::Drug(id) => self
                .drugs
                .get(id)
                .map(|d| d.canonical_name.clone())
                .unwrap_or_else(|| id.to_string()),
            Subject::Class(id) => self
                .classes
                .get(id)
                .map(|c| c.label.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// AliasIndex
// ---------------------------------------------------------------------------

/// Immutable name → identifier index with exact and bounded fuzzy lookup.
///
/// Fuzzy lookup is a linear scan with per-entry early cutoff, which is
/// adequate for catalogs of a few thousand names. A BK-tree could replace
/// the scan behind `lookup_fuzzy` without changing callers.
#[derive(Debug, Clone, Default)]
pub struct AliasIndex {
    /// Sorted by (alias, kind) so scans are deterministic.
    entries: Vec<AliasEntry>,
    /// Precomputed char vectors, parallel to `entries`.
    chars: Vec<Vec<char>>,
    exact: HashMap<String, usize>,
}

impl AliasIndex {
    /// Build the catalog and its alias index from raw records.
    pub fn from_records(
        drugs: &[DrugRecord],
        classes: &[ClassDefinition],
    ) -> Result<(DrugCatalog, AliasIndex), CatalogError> {
        let catalog = DrugCatalog::build(drugs, classes)?;
        let index = Self::build(&catalog)?;
        Ok((catalog, index))
    }

    /// Index every canonical, generic, brand and class name of the catalog.
    ///
    /// When one normalised name is listed several times for the same target the
    /// most authoritative kind is kept. A name shared by two different targets
    /// is rejected, so every alias resolves back to exactly one identifier.
    pub fn build(catalog: &DrugCatalog) -> Result<Self, CatalogError> {
        let mut by_alias: BTreeMap<String, AliasEntry> = BTreeMap::new();

        let mut insert = |display: &str, target: Subject, kind: AliasKind| {
            let alias = normalize(display);
            if alias.is_empty() {
                let alias_display = display;
                tracing::debug!(alias = %alias_display, target = %target, "Alias normalises to nothing, skipping");
                return Ok(());
            }
            match by_alias.get_mut(&alias) {
                Some(existing) if existing.target != target => Err(CatalogError::AliasConflict {
                    alias,
                    first: existing.target.clone(),
                    second: target,
                }),
                Some(existing) => {
                    if kind < existing.kind {
                        existing.kind = kind;
                        existing.display = display.to_string();
                    }
                    Ok(())
                }
                None => {
                    by_alias.insert(
                        alias.clone(),
                        AliasEntry {
                            alias,
                            display: display.to_string(),
                            target,
                            kind,
                        },
                    );
                    Ok(())
                }
            }
        };

        for drug in catalog.drugs() {
            let target = Subject::Drug(drug.id.clone());
            insert(&drug.canonical_name, target.clone(), AliasKind::Canonical)?;
            if let Some(generic) = &drug.generic_name {
                insert(generic, target.clone(), AliasKind::Generic)?;
            }
            for brand in &drug.brand_names {
                insert(brand, target.clone(), AliasKind::Brand)?;
            }
        }

        for class in catalog.classes() {
            let target = Subject::Class(class.id.clone());
            insert(&class.label, target.clone(), AliasKind::Class)?;
            insert(class.id.as_str(), target.clone(), AliasKind::Class)?;
            for alias in &class.aliases {
                insert(alias, target.clone(), AliasKind::Class)?;
            }
        }

        let entries: Vec<AliasEntry> = by_alias.into_values().collect();
        let chars = entries.iter().map(|e| e.alias.chars().collect()).collect();
        let exact = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.alias.clone(), i))
            .collect();

        tracing::debug!(aliases = entries.len(), "Alias index built");

        Ok(Self {
            entries,
            chars,
            exact,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    /// Exact lookup of an already-normalised name.
    pub fn lookup_exact(&self, normalized: &str) -> Option<&AliasEntry> {
        self.exact.get(normalized).map(|&i| &self.entries[i])
    }

    /// Approximate lookup of an already-normalised name.
    ///
    /// Yields `(entry, distance)` for every alias within `max_distance`, ordered
    /// by distance, then alias authority, then alias text. The sequence is
    /// computed one distance tier at a time; clone it to iterate again.
    pub fn lookup_fuzzy<'a>(&'a self, normalized: &str, max_distance: usize) -> FuzzyMatches<'a> {
        FuzzyMatches {
            index: self,
            query: normalized.chars().collect(),
            max_distance,
            next_tier: 0,
            tier: Vec::new(),
            pos: 0,
        }
    }
}

/// Lazy, finite, restartable (via `Clone`) fuzzy match sequence.
#[derive(Debug, Clone)]
pub struct FuzzyMatches<'a> {
    index: &'a AliasIndex,
    query: Vec<char>,
    max_distance: usize,
    next_tier: usize,
    tier: Vec<usize>,
    pos: usize,
}

impl FuzzyMatches<'_> {
    /// Collect the entries sitting exactly at distance `d`.
    fn load_tier(&mut self, d: usize) {
        let index = self.index;
        let mut hits: Vec<usize> = (0..index.entries.len())
            .filter(|&i| {
                let candidate = &index.chars[i];
                // Quick length filter: lengths differing by more than d can't match
                if candidate.len().abs_diff(self.query.len()) > d {
                    return false;
                }
                bounded_levenshtein(&self.query, candidate, d) == Some(d)
            })
            .collect();

        hits.sort_by(|&a, &b| {
            let (ea, eb) = (&index.entries[a], &index.entries[b]);
            ea.kind.cmp(&eb.kind).then_with(|| ea.alias.cmp(&eb.alias))
        });

        self.tier = hits;
        self.pos = 0;
    }
}

impl<'a> Iterator for FuzzyMatches<'a> {
    type Item = (&'a AliasEntry, usize);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.pos < self.tier.len() {
                let i = self.tier[self.pos];
                self.pos += 1;
                let distance = self.next_tier - 1;
                return Some((&self.index.entries[i], distance));
            }
            if self.next_tier > self.max_distance || self.query.is_empty() {
                return None;
            }
            let d = self.next_tier;
            self.load_tier(d);
            self.next_tier += 1;
        }
    }
}

/// Levenshtein distance between `a` and `b`, or `None` once it provably
/// exceeds `max`. Two-row dynamic programme with a per-row minimum cutoff.
pub fn bounded_levenshtein(a: &[char], b: &[char], max: usize) -> Option<usize> {
    let (m, n) = (a.len(), b.len());
    if m.abs_diff(n) > max {
        return None;
    }
    if m == 0 {
        return (n <= max).then_some(n);
    }
    if n == 0 {
        return (m <= max).then_some(m);
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for (i, &a_ch) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, &b_ch) in b.iter().enumerate() {
            let cost = usize::from(a_ch != b_ch);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
            row_min = row_min.min(curr[j + 1]);
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (prev[n] <= max).then_some(prev[n])
}
