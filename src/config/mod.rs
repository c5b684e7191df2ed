// src/config/mod.rs
//! Static configuration: the classification taxonomy document (JSON) and the
//! prioritization parameters document (TOML), loaded once and cross-checked.

pub mod classifier;
pub mod scoring;

pub use classifier::{ClassifierConfig, UNKNOWN_CATEGORY};
pub use scoring::{ScoringConfig, TimeWindow, WindowScope};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

pub const DEFAULT_CLASSIFIER_CONFIG_PATH: &str = "config/classifier.json";
pub const DEFAULT_SCORING_CONFIG_PATH: &str = "config/scoring.toml";

pub const ENV_CLASSIFIER_CONFIG_PATH: &str = "TRIAGE_CLASSIFIER_CONFIG";
pub const ENV_SCORING_CONFIG_PATH: &str = "TRIAGE_SCORING_CONFIG";

/// Both triage documents, validated together. Hot reload is out of scope;
/// load once at startup and share.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    pub classifier: Arc<ClassifierConfig>,
    pub scoring: Arc<ScoringConfig>,
}

impl TriageConfig {
    /// Resolve paths (env override → default), load both documents, then
    /// cross-validate. A missing file falls back to the built-in seed with a
    /// warning; a present-but-invalid file is a hard error.
    pub fn load() -> anyhow::Result<Self> {
        let classifier_path = std::env::var(ENV_CLASSIFIER_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLASSIFIER_CONFIG_PATH));
        let scoring_path = std::env::var(ENV_SCORING_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SCORING_CONFIG_PATH));

        let classifier = if classifier_path.exists() {
            ClassifierConfig::load_from_file(&classifier_path)?
        } else {
            warn!(
                path = %classifier_path.display(),
                "classifier config not found, using built-in seed"
            );
            ClassifierConfig::default_seed()
        };
        let scoring = if scoring_path.exists() {
            ScoringConfig::load_from_file(&scoring_path)?
        } else {
            warn!(
                path = %scoring_path.display(),
                "scoring config not found, using built-in seed"
            );
            ScoringConfig::default_seed()
        };

        Self::from_parts(classifier, scoring)
    }

    /// Built-in seeds for tests and demos; skips the filesystem entirely.
    pub fn seeded() -> Self {
        Self::from_parts(ClassifierConfig::default_seed(), ScoringConfig::default_seed())
            .expect("seed configs must cross-validate")
    }

    pub fn from_parts(
        classifier: ClassifierConfig,
        scoring: ScoringConfig,
    ) -> anyhow::Result<Self> {
        cross_validate(&classifier, &scoring)?;
        Ok(Self {
            classifier: Arc::new(classifier),
            scoring: Arc::new(scoring),
        })
    }
}

/// The report-category half of every context-multiplier key must exist in the
/// taxonomy (or be the `unknown` sentinel). The POI half was already checked
/// against `category_weights` when the scoring document was compiled.
fn cross_validate(classifier: &ClassifierConfig, scoring: &ScoringConfig) -> anyhow::Result<()> {
    for key in scoring.context_multipliers.keys() {
        let report = key.split_once('+').map(|(r, _)| r).unwrap_or_default();
        if report != UNKNOWN_CATEGORY && !classifier.is_taxonomy_key(report) {
            anyhow::bail!(
                "context multiplier `{key}` references report category `{report}` which is not in the taxonomy"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_config_cross_validates() {
        let cfg = TriageConfig::seeded();
        assert!(cfg.classifier.is_taxonomy_key("flooding"));
        assert!(cfg.scoring.category_weights.contains_key("school"));
    }

    #[test]
    fn typo_in_report_category_fails_load() {
        let classifier = ClassifierConfig::default_seed();
        let scoring = ScoringConfig::from_toml_str(
            r#"
[scoring]
decay_factor = 100.0
max_radius = 500.0

[scoring.priority_thresholds]
high = 0.8
medium = 0.5

[category_weights]
school = 1.5

[context_multipliers]
"floooding+school" = 1.2
"#,
        )
        .unwrap();
        assert!(TriageConfig::from_parts(classifier, scoring).is_err());
    }

    #[test]
    fn unknown_report_category_is_allowed_in_context_keys() {
        let classifier = ClassifierConfig::default_seed();
        let scoring = ScoringConfig::from_toml_str(
            r#"
[scoring]
decay_factor = 100.0
max_radius = 500.0

[scoring.priority_thresholds]
high = 0.8
medium = 0.5

[category_weights]
school = 1.5

[context_multipliers]
"unknown+school" = 1.1
"#,
        )
        .unwrap();
        assert!(TriageConfig::from_parts(classifier, scoring).is_ok());
    }
}
