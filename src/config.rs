//! Engine configuration.
//!
//! Resolved once at startup (defaults, or a JSON file) and handed to the
//! engine. Nothing here is read from the environment during a request.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Severity;

/// Application-level constants
pub const APP_NAME: &str = "rxguard";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable naming the catalog directory for the binary.
pub const CATALOG_DIR_ENV: &str = "RXGUARD_CATALOG_DIR";
/// Environment variable naming an optional JSON engine config for the binary.
pub const CONFIG_ENV: &str = "RXGUARD_CONFIG";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "rxguard=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config load failed ({0}): {1}")]
    Load(String, String),

    #[error("Config parse failed: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Everything the engine can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub extraction: ExtractionConfig,
    pub resolution: ResolutionConfig,
    pub catalog: CatalogConfig,
    pub override_policy: OverridePolicy,
}

/// Candidate extraction tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Fuzzy candidates below this confidence are discarded.
    pub acceptance_floor: f64,
    /// Edit-distance budget as a function of name length.
    pub max_distance: MaxDistance,
    /// Fraction of confidence removed when the best fuzzy hits tie
    /// between different drugs.
    pub ambiguity_penalty: f64,
    /// Cleaned fragments shorter than this are ignored.
    pub min_fragment_chars: usize,
    /// Names shorter than this are only matched exactly.
    pub min_fuzzy_chars: usize,
    /// Longest token window tried when a whole fragment does not match.
    pub max_window_tokens: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            acceptance_floor: 0.6,
            max_distance: MaxDistance::default(),
            ambiguity_penalty: 0.1,
            min_fragment_chars: 2,
            min_fuzzy_chars: 5,
            max_window_tokens: 3,
        }
    }
}

/// `max(minimum, floor(len / divisor))`, optionally clamped to `cap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxDistance {
    pub divisor: usize,
    pub minimum: usize,
    pub cap: Option<usize>,
}

impl Default for MaxDistance {
    fn default() -> Self {
        Self {
            divisor: 6,
            minimum: 1,
            cap: Some(3),
        }
    }
}

impl MaxDistance {
    /// Edit-distance budget for a name of `len` characters.
    pub fn for_len(&self, len: usize) -> usize {
        let scaled = (len / self.divisor.max(1)).max(self.minimum);
        match self.cap {
            Some(cap) => scaled.min(cap),
            None => scaled,
        }
    }
}

/// Interaction resolution tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Use class-level rules and class-only candidates.
    pub class_generalization: bool,
    /// Above this many medications only the newest is checked against the rest.
    pub capacity_threshold: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            class_generalization: true,
            capacity_threshold: 200,
        }
    }
}

/// Catalog build tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Fail the build on same-pair rules with different severities
    /// instead of keeping the more severe one.
    pub strict_rule_conflicts: bool,
}

/// What the caller must do before proceeding with a medication set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideAction {
    /// Shown for information only.
    Informational,
    /// Must be acknowledged, no hard stop.
    Acknowledge,
    /// Hard stop: explicit override required.
    Override,
}

/// Severity → required action table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverridePolicy {
    pub minor: OverrideAction,
    pub moderate: OverrideAction,
    pub major: OverrideAction,
    pub contraindicated: OverrideAction,
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self {
            minor: OverrideAction::Informational,
            moderate: OverrideAction::Acknowledge,
            major: OverrideAction::Override,
            contraindicated: OverrideAction::Override,
        }
    }
}

impl OverridePolicy {
    pub fn action_for(&self, severity: Severity) -> OverrideAction {
        match severity {
            Severity::Minor => self.minor,
            Severity::Moderate => self.moderate,
            Severity::Major => self.major,
            Severity::Contraindicated => self.contraindicated,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl EngineConfig {
    /// Read and validate a JSON config file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(path.display().to_string(), e.to_string()))?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ex = &self.extraction;
        if !(0.0..=1.0).contains(&ex.acceptance_floor) {
            return Err(ConfigError::Invalid(format!(
                "acceptance_floor must be within [0, 1], got {}",
                ex.acceptance_floor
            )));
        }
        if !(0.0..=1.0).contains(&ex.ambiguity_penalty) {
            return Err(ConfigError::Invalid(format!(
                "ambiguity_penalty must be within [0, 1], got {}",
                ex.ambiguity_penalty
            )));
        }
        if ex.max_distance.divisor == 0 {
            return Err(ConfigError::Invalid("max_distance.divisor must be > 0".into()));
        }
        if ex.max_window_tokens == 0 {
            return Err(ConfigError::Invalid("max_window_tokens must be > 0".into()));
        }
        if self.resolution.capacity_threshold < 2 {
            return Err(ConfigError::Invalid(
                "capacity_threshold must allow at least one pair".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.extraction.acceptance_floor, 0.6);
        assert!(config.resolution.class_generalization);
        assert_eq!(config.resolution.capacity_threshold, 200);
        assert!(!config.catalog.strict_rule_conflicts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn max_distance_scales_with_length() {
        let md = MaxDistance::default();
        assert_eq!(md.for_len(3), 1);
        assert_eq!(md.for_len(6), 1);
        assert_eq!(md.for_len(12), 2);
        assert_eq!(md.for_len(19), 3);

        let capped = MaxDistance {
            cap: Some(2),
            ..MaxDistance::default()
        };
        assert_eq!(capped.for_len(30), 2);
    }

    #[test]
    fn default_override_policy() {
        let policy = OverridePolicy::default();
        assert_eq!(policy.action_for(Severity::Minor), OverrideAction::Informational);
        assert_eq!(policy.action_for(Severity::Moderate), OverrideAction::Acknowledge);
        assert_eq!(policy.action_for(Severity::Major), OverrideAction::Override);
        assert_eq!(policy.action_for(Severity::Contraindicated), OverrideAction::Override);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = EngineConfig::from_json(
            r#"{"extraction": {"acceptance_floor": 0.75}, "override_policy": {"major": "acknowledge"}}"#,
        )
        .unwrap();
        assert_eq!(config.extraction.acceptance_floor, 0.75);
        assert_eq!(config.extraction.max_distance.divisor, 6);
        assert_eq!(config.override_policy.major, OverrideAction::Acknowledge);
        assert_eq!(config.override_policy.contraindicated, OverrideAction::Override);
    }

    #[test]
    fn out_of_range_floor_rejected() {
        let err = EngineConfig::from_json(r#"{"extraction": {"acceptance_floor": 1.5}}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_divisor_rejected() {
        let err =
            EngineConfig::from_json(r#"{"extraction": {"max_distance": {"divisor": 0}}}"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = EngineConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("engine.json");
        std::fs::write(&path, r#"{"resolution": {"class_generalization": false}}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert!(!config.resolution.class_generalization);
    }

    #[test]
    fn load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/rxguard.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Load(..)));
    }
}
