// src/priority.rs
//! Keyword-driven priority detection. High keywords win immediately, then
//! medium keywords, then the category default. This stage never escalates on
//! failure: anything unconfigured is `Low`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::ClassifierConfig;

/// Report priority. Ordered so escalation is a plain `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct PriorityKeywordDetector {
    cfg: Arc<ClassifierConfig>,
}

impl PriorityKeywordDetector {
    pub fn new(cfg: Arc<ClassifierConfig>) -> Self {
        Self { cfg }
    }

    /// First substring match wins; no scoring. Unknown categories and
    /// categories without a configured default map to `Low`.
    pub fn determine_priority(&self, category: &str, description: &str) -> Priority {
        let text = description.to_lowercase();

        let keywords = &self.cfg.priority.keywords;
        if keywords.high.iter().any(|k| text.contains(k.as_str())) {
            return Priority::High;
        }
        if keywords.medium.iter().any(|k| text.contains(k.as_str())) {
            return Priority::Medium;
        }

        self.cfg
            .priority
            .default_by_category
            .get(category)
            .copied()
            .unwrap_or(Priority::Low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PriorityKeywordDetector {
        PriorityKeywordDetector::new(Arc::new(ClassifierConfig::default_seed()))
    }

    #[test]
    fn ordering_supports_escalation_by_max() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert_eq!(Priority::Low.max(Priority::High), Priority::High);
    }

    #[test]
    fn high_keyword_wins_regardless_of_category() {
        let d = detector();
        for category in ["waste_dump", "streetlight_broken", "unknown", "nonsense"] {
            assert_eq!(
                d.determine_priority(category, "Tình huống KHẨN CẤP ở đây"),
                Priority::High,
                "category {category}"
            );
        }
    }

    #[test]
    fn medium_keyword_checked_after_high() {
        let d = detector();
        assert_eq!(
            d.determine_priority("waste_dump", "rác gây ảnh hưởng đến khu dân cư"),
            Priority::Medium
        );
        // High keyword outranks a co-occurring medium keyword.
        assert_eq!(
            d.determine_priority("waste_dump", "ảnh hưởng lớn, rất nguy hiểm"),
            Priority::High
        );
    }

    #[test]
    fn category_default_applies_without_keywords() {
        let d = detector();
        assert_eq!(
            d.determine_priority("flooding", "mô tả trung tính"),
            Priority::High
        );
        assert_eq!(
            d.determine_priority("waste_dump", "mô tả trung tính"),
            Priority::Low
        );
    }

    #[test]
    fn unconfigured_category_is_low() {
        let d = detector();
        assert_eq!(
            d.determine_priority("unknown", "mô tả trung tính"),
            Priority::Low
        );
    }

    #[test]
    fn serde_round_trip_is_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        let p: Priority = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(p, Priority::Medium);
    }
}
