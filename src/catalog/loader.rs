use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::{
    Category, ClassDefinition, ClassId, DrugId, DrugRecord, EvidenceLevel, InteractionRule,
    Severity, Subject,
};
use super::CatalogError;

pub const CLASSES_FILE: &str = "drug_classes.json";
pub const DRUGS_FILE: &str = "drugs.json";
pub const RULES_FILE: &str = "interaction_rules.json";

/// Raw catalog records as handed over by whatever store holds them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSource {
    #[serde(default)]
    pub classes: Vec<ClassDefinition>,
    #[serde(default)]
    pub drugs: Vec<DrugRecord>,
    #[serde(default)]
    pub rules: Vec<InteractionRule>,
}

impl CatalogSource {
    /// Load the three catalog JSON files from a directory.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let classes: Vec<ClassDefinition> = read_json(&dir.join(CLASSES_FILE), CLASSES_FILE)?;
        let drugs: Vec<DrugRecord> = read_json(&dir.join(DRUGS_FILE), DRUGS_FILE)?;
        let rules: Vec<InteractionRule> = read_json(&dir.join(RULES_FILE), RULES_FILE)?;

        tracing::info!(
            dir = %dir.display(),
            classes = classes.len(),
            drugs = drugs.len(),
            rules = rules.len(),
            "Catalog source loaded"
        );

        Ok(Self {
            classes,
            drugs,
            rules,
        })
    }

    /// SHA-256 of the canonical JSON form, hex encoded.
    /// Identical record sets always produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Create a small catalog for tests (no file I/O).
    pub fn load_test() -> Self {
        let classes = vec![
            class("ACE_inhibitors", "ACE inhibitor", &["ACE inhibitors"]),
            class("antihypertensives", "Antihypertensive", &[]),
            class("anticoagulants", "Anticoagulant", &["blood thinner"]),
            class("NSAIDs", "NSAID", &["nonsteroidal anti-inflammatory"]),
            class("potassium_supplements", "Potassium supplement", &[]),
            class("potassium_sparing_diuretics", "Potassium-sparing diuretic", &[]),
            class("statins", "Statin", &["HMG-CoA reductase inhibitor"]),
            class("macrolides", "Macrolide antibiotic", &[]),
            class("biguanides", "Biguanide", &[]),
        ];

        let drugs = vec![
            drug("warfarin", "Warfarin", Some("warfarin sodium"), &["Coumadin", "Jantoven"], &["anticoagulants"]),
            drug("aspirin", "Aspirin", Some("acetylsalicylic acid"), &["Bayer", "Ecotrin"], &["NSAIDs"]),
            drug("ibuprofen", "Ibuprofen", None, &["Advil", "Motrin"], &["NSAIDs"]),
            drug("naproxen", "Naproxen", None, &["Aleve"], &["NSAIDs"]),
            drug("lisinopril", "Lisinopril", Some("lisinopril"), &["Zestril", "Prinivil"], &["ACE_inhibitors", "antihypertensives"]),
            drug("enalapril", "Enalapril", None, &["Vasotec"], &["ACE_inhibitors", "antihypertensives"]),
            drug("spironolactone", "Spironolactone", None, &["Aldactone"], &["potassium_sparing_diuretics", "antihypertensives"]),
            drug("potassium_chloride", "Potassium chloride", None, &["Klor-Con"], &["potassium_supplements"]),
            drug("metformin", "Metformin", None, &["Glucophage", "Fortamet"], &["biguanides"]),
            drug("cyanocobalamin", "Cyanocobalamin", None, &["Vitamin B12"], &[]),
            drug("simvastatin", "Simvastatin", None, &["Zocor"], &["statins"]),
            drug("atorvastatin", "Atorvastatin", None, &["Lipitor"], &["statins"]),
            drug("clarithromycin", "Clarithromycin", None, &["Biaxin"], &["macrolides"]),
            drug("digoxin", "Digoxin", None, &["Lanoxin"], &[]),
            drug("verapamil", "Verapamil", None, &["Calan"], &["antihypertensives"]),
        ];

        let rules = vec![
            InteractionRule {
                id: "warfarin-aspirin".into(),
                subject_a: Subject::drug("warfarin"),
                subject_b: Subject::drug("aspirin"),
                severity: Severity::Major,
                category: Category::Pharmacodynamic,
                mechanism: "Additive anticoagulant and antiplatelet effects".into(),
                clinical_effects: "Increased risk of serious bleeding".into(),
                management: "Avoid unless directed by a prescriber; monitor INR and watch for bleeding.".into(),
                evidence: EvidenceLevel::Established,
            },
            InteractionRule {
                id: "anticoagulants-nsaids".into(),
                subject_a: Subject::class("NSAIDs"),
                subject_b: Subject::class("anticoagulants"),
                severity: Severity::Moderate,
                category: Category::Pharmacodynamic,
                mechanism: "NSAIDs impair platelet function and irritate the gastric mucosa".into(),
                clinical_effects: "Gastrointestinal bleeding".into(),
                management: "Prefer acetaminophen for pain relief; watch for signs of bleeding.".into(),
                evidence: EvidenceLevel::Probable,
            },
            InteractionRule {
                id: "nsaid-duplication".into(),
                subject_a: Subject::class("NSAIDs"),
                subject_b: Subject::class("NSAIDs"),
                severity: Severity::Moderate,
                category: Category::Pharmacodynamic,
                mechanism: "Duplicate NSAID therapy".into(),
                clinical_effects: "Gastrointestinal bleeding and kidney injury".into(),
                management: "Do not take two NSAIDs at the same time.".into(),
                evidence: EvidenceLevel::Established,
            },
            InteractionRule {
                id: "ace-inhibitors-nsaids".into(),
                subject_a: Subject::class("ACE_inhibitors"),
                subject_b: Subject::class("NSAIDs"),
                severity: Severity::Moderate,
                category: Category::Pharmacodynamic,
                mechanism: "NSAIDs blunt the antihypertensive effect and reduce renal perfusion".into(),
                clinical_effects: "Raised blood pressure, reduced kidney function".into(),
                management: "Monitor blood pressure and kidney function.".into(),
                evidence: EvidenceLevel::Probable,
            },
            InteractionRule {
                id: "ace-inhibitors-potassium".into(),
                subject_a: Subject::class("ACE_inhibitors"),
                subject_b: Subject::class("potassium_supplements"),
                severity: Severity::Major,
                category: Category::Pharmacodynamic,
                mechanism: "Reduced aldosterone secretion combined with an added potassium load".into(),
                clinical_effects: "Hyperkalemia".into(),
                management: "Monitor serum potassium; avoid routine potassium supplementation.".into(),
                evidence: EvidenceLevel::Established,
            },
            InteractionRule {
                id: "ace-inhibitors-potassium-sparing".into(),
                subject_a: Subject::class("potassium_sparing_diuretics"),
                subject_b: Subject::class("ACE_inhibitors"),
                severity: Severity::Major,
                category: Category::Pharmacodynamic,
                mechanism: "Both agents reduce renal potassium excretion".into(),
                clinical_effects: "Hyperkalemia".into(),
                management: "Monitor serum potassium; avoid routine potassium supplementation.".into(),
                evidence: EvidenceLevel::Established,
            },
            InteractionRule {
                id: "simvastatin-clarithromycin".into(),
                subject_a: Subject::drug("simvastatin"),
                subject_b: Subject::drug("clarithromycin"),
                severity: Severity::Contraindicated,
                category: Category::Pharmacokinetic,
                mechanism: "Strong CYP3A4 inhibition raises simvastatin exposure".into(),
                clinical_effects: "Myopathy and rhabdomyolysis".into(),
                management: "Do not combine; suspend simvastatin for the course of clarithromycin.".into(),
                evidence: EvidenceLevel::Established,
            },
            InteractionRule {
                id: "statins-macrolides".into(),
                subject_a: Subject::class("statins"),
                subject_b: Subject::class("macrolides"),
                severity: Severity::Moderate,
                category: Category::Pharmacokinetic,
                mechanism: "CYP3A4 inhibition raises statin exposure".into(),
                clinical_effects: "Muscle pain and myopathy".into(),
                management: "Consider a statin not metabolised by CYP3A4 during antibiotic therapy.".into(),
                evidence: EvidenceLevel::Probable,
            },
            InteractionRule {
                id: "digoxin-verapamil".into(),
                subject_a: Subject::drug("verapamil"),
                subject_b: Subject::drug("digoxin"),
                severity: Severity::Major,
                category: Category::Pharmacokinetic,
                mechanism: "P-glycoprotein inhibition raises digoxin levels".into(),
                clinical_effects: "Digoxin toxicity and bradycardia".into(),
                management: "Reduce the digoxin dose and monitor digoxin levels.".into(),
                evidence: EvidenceLevel::Established,
            },
            InteractionRule {
                id: "metformin-cyanocobalamin".into(),
                subject_a: Subject::drug("metformin"),
                subject_b: Subject::drug("cyanocobalamin"),
                severity: Severity::Minor,
                category: Category::Pharmacokinetic,
                mechanism: "Metformin reduces vitamin B12 absorption".into(),
                clinical_effects: "Lower vitamin B12 levels over time".into(),
                management: "Check vitamin B12 levels periodically.".into(),
                evidence: EvidenceLevel::Observational,
            },
        ];

        Self {
            classes,
            drugs,
            rules,
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, name: &str) -> Result<T, CatalogError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| CatalogError::SourceLoad(path.display().to_string(), e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| CatalogError::SourceParse(name.into(), e.to_string()))
}

fn class(id: &str, label: &str, aliases: &[&str]) -> ClassDefinition {
    ClassDefinition {
        id: ClassId::new(id),
        label: label.into(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
    }
}

fn drug(
    id: &str,
    name: &str,
    generic: Option<&str>,
    brands: &[&str],
    classes: &[&str],
) -> DrugRecord {
    DrugRecord {
        id: DrugId::new(id),
        canonical_name: name.into(),
        generic_name: generic.map(str::to_string),
        brand_names: brands.iter().map(|b| b.to_string()).collect(),
        classes: classes.iter().map(|c| ClassId::new(*c)).collect(),
    }
}
