// src/pipeline.rs
//! The triage pipeline: classification → keyword priority → proximity
//! escalation → one `TriageDecision` with an auditable reason trail.
//!
//! Proximity can only raise the keyword-derived priority, never lower it.
//! Unknown classifications route the report to manual review.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::classifier::{anon_hash, Classification, TextClassifier};
use crate::config::TriageConfig;
use crate::directory::{GeoPoint, PoiDirectory};
use crate::embedding::DynEmbedder;
use crate::priority::{Priority, PriorityKeywordDetector};
use crate::proximity::{Boost, ProximityScorer};

/// Reason attached when a high keyword forced the priority.
const HIGH_KEYWORD_REASON: &str = "High-priority keyword detected in description";
/// Reason attached when neither keywords nor proximity said anything.
const CATEGORY_DEFAULT_REASON: &str = "Priority from category default";
/// Informational note threshold; deliberately independent of the boost
/// thresholds in the scoring config.
const INFO_SCORE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Workflow status handed back to the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    AutoClassified,
    NeedsManualReview,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::AutoClassified => "auto_classified",
            Status::NeedsManualReview => "needs_manual_review",
        }
    }
}

/// Terminal output of the pipeline; constructed once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageDecision {
    pub category: String,
    pub confidence: f32,
    pub priority: Priority,
    pub reasons: Vec<String>,
    pub status: Status,
}

impl TriageDecision {
    /// Flat shape for the external record store's update API: one joined
    /// reason string, severity mirroring the priority.
    pub fn to_update(&self) -> ReportUpdate {
        ReportUpdate {
            category: self.category.clone(),
            category_confidence: self.confidence,
            priority: self.priority,
            severity: self.priority,
            status: self.status,
            auto_priority_reason: self.reasons.join("; "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUpdate {
    pub category: String,
    pub category_confidence: f32,
    pub priority: Priority,
    pub severity: Priority,
    pub status: Status,
    pub auto_priority_reason: String,
}

pub struct TriagePipeline {
    classifier: TextClassifier,
    detector: PriorityKeywordDetector,
    scorer: ProximityScorer,
}

impl TriagePipeline {
    pub fn new(
        classifier: TextClassifier,
        detector: PriorityKeywordDetector,
        scorer: ProximityScorer,
    ) -> Self {
        Self {
            classifier,
            detector,
            scorer,
        }
    }

    /// Wire the three stages from one config plus the two external
    /// capabilities.
    pub fn from_config(
        config: &TriageConfig,
        embedder: DynEmbedder,
        directory: Arc<dyn PoiDirectory>,
    ) -> Self {
        Self::new(
            TextClassifier::new(config.classifier.clone(), embedder),
            PriorityKeywordDetector::new(config.classifier.clone()),
            ProximityScorer::new(config.scoring.clone(), directory),
        )
    }

    /// Triage one report. Always returns a decision; degraded capabilities
    /// surface as conservative unknown/low results, never as errors.
    pub async fn process_report(&self, report: &ReportInput) -> TriageDecision {
        let Classification {
            category,
            confidence,
        } = self
            .classifier
            .classify(&report.title, &report.description)
            .await;

        let nlp_priority = self
            .detector
            .determine_priority(&category, &report.description);

        let proximity = self
            .scorer
            .check_poi_proximity(report.location, Some(&category), None)
            .await;

        let mut final_priority = nlp_priority;
        let mut reasons: Vec<String> = Vec::new();

        if nlp_priority == Priority::High {
            reasons.push(HIGH_KEYWORD_REASON.to_string());
        }

        if proximity.is_sensitive {
            match proximity.boost {
                Boost::High => {
                    final_priority = Priority::High;
                    reasons.push(proximity.reason.clone());
                }
                Boost::Medium if final_priority == Priority::Low => {
                    final_priority = Priority::Medium;
                    reasons.push(proximity.reason.clone());
                }
                _ => {
                    if proximity.score > INFO_SCORE_THRESHOLD {
                        // Worth surfacing, not worth escalating.
                        reasons.push(format!(
                            "Near sensitive area (score {:.3})",
                            proximity.score
                        ));
                    }
                }
            }
        }

        if reasons.is_empty() {
            reasons.push(CATEGORY_DEFAULT_REASON.to_string());
        }

        let status = if category == crate::config::UNKNOWN_CATEGORY {
            Status::NeedsManualReview
        } else {
            Status::AutoClassified
        };

        info!(
            id = %anon_hash(&format!("{} {}", report.title, report.description)),
            category = %category,
            confidence,
            nlp_priority = %nlp_priority,
            final_priority = %final_priority,
            boost = %proximity.boost,
            status = status.as_str(),
            "triaged report"
        );

        TriageDecision {
            category,
            confidence,
            priority: final_priority,
            reasons,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{PointOfInterest, StaticDirectory};
    use crate::embedding::MockEmbedder;

    fn pipeline_with(pois: Vec<PointOfInterest>) -> TriagePipeline {
        let config = TriageConfig::seeded();
        TriagePipeline::from_config(
            &config,
            Arc::new(MockEmbedder::default()),
            Arc::new(StaticDirectory::new(pois)),
        )
    }

    #[tokio::test]
    async fn empty_report_needs_manual_review() {
        let p = pipeline_with(vec![]);
        let d = p.process_report(&ReportInput::default()).await;
        assert_eq!(d.category, "unknown");
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.status, Status::NeedsManualReview);
        assert_eq!(d.priority, Priority::Low);
        assert_eq!(d.reasons, vec![CATEGORY_DEFAULT_REASON.to_string()]);
    }

    #[tokio::test]
    async fn high_keyword_reason_is_recorded() {
        let p = pipeline_with(vec![]);
        let d = p
            .process_report(&ReportInput {
                title: "Rác thải".into(),
                description: "bãi rác bốc mùi, tình trạng nguy hiểm".into(),
                location: None,
            })
            .await;
        assert_eq!(d.priority, Priority::High);
        assert!(d.reasons.iter().any(|r| r == HIGH_KEYWORD_REASON));
    }

    #[tokio::test]
    async fn update_shape_joins_reasons() {
        let p = pipeline_with(vec![]);
        let d = p
            .process_report(&ReportInput {
                title: "Ngập".into(),
                description: "nước ngập khẩn cấp".into(),
                location: None,
            })
            .await;
        let u = d.to_update();
        assert_eq!(u.severity, u.priority);
        assert_eq!(u.auto_priority_reason, d.reasons.join("; "));
        let v = serde_json::to_value(&u).unwrap();
        assert!(v.get("categoryConfidence").is_some());
        assert!(v.get("autoPriorityReason").is_some());
        assert_eq!(v["status"], serde_json::json!("auto_classified"));
    }
}
