// src/config/classifier.rs
//! Classification taxonomy + thresholds + model selection, loaded from JSON.
//!
//! The document is static: category descriptions feed the embedding index,
//! keyword lists feed the legacy classifier and the priority detector, and
//! the model section picks the primary/fallback embedding models.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::{fs, path::Path};

use crate::priority::Priority;

/// Sentinel category for low-confidence / no-signal classifications.
/// Never part of the taxonomy itself.
pub const UNKNOWN_CATEGORY: &str = "unknown";

fn default_min_confidence() -> f32 {
    0.6
}
fn default_fallback_to_legacy() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Primary embedding model (language-specific).
    pub name: String,
    /// Optional multilingual fallback used when the primary model fails.
    #[serde(default)]
    pub fallback_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum cosine similarity to accept a semantic classification.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,
    /// Compare the legacy result against a low-confidence semantic result.
    #[serde(default = "default_fallback_to_legacy")]
    pub fallback_to_legacy: bool,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            fallback_to_legacy: default_fallback_to_legacy(),
        }
    }
}

/// One taxonomy entry: the description is what gets embedded, the keywords
/// drive the legacy rule-based path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityKeywords {
    #[serde(default)]
    pub high: Vec<String>,
    #[serde(default)]
    pub medium: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityConfig {
    #[serde(default)]
    pub keywords: PriorityKeywords,
    #[serde(default)]
    pub default_by_category: HashMap<String, Priority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// BTreeMap keeps category iteration deterministic (ties in scoring
    /// resolve to the lexicographically first category).
    pub categories: BTreeMap<String, CategorySpec>,
    #[serde(default)]
    pub priority: PriorityConfig,
}

impl ClassifierConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read classifier config at {}: {}",
                path.as_ref().display(),
                e
            )
        })?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let cfg: ClassifierConfig = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.categories.is_empty() {
            anyhow::bail!("classifier config: taxonomy must not be empty");
        }
        if self.categories.contains_key(UNKNOWN_CATEGORY) {
            anyhow::bail!(
                "classifier config: `{}` is a reserved sentinel, not a taxonomy key",
                UNKNOWN_CATEGORY
            );
        }
        if !(0.0..=1.0).contains(&self.thresholds.min_confidence) {
            anyhow::bail!(
                "classifier config: min_confidence {} outside [0, 1]",
                self.thresholds.min_confidence
            );
        }
        for (cat, spec) in &self.categories {
            if spec.description.trim().is_empty() {
                anyhow::bail!("classifier config: category `{cat}` has an empty description");
            }
        }
        for cat in self.priority.default_by_category.keys() {
            if !self.categories.contains_key(cat) {
                anyhow::bail!(
                    "classifier config: default_by_category references unknown category `{cat}`"
                );
            }
        }
        Ok(())
    }

    /// True if `category` is a taxonomy key (the `unknown` sentinel is not).
    pub fn is_taxonomy_key(&self, category: &str) -> bool {
        self.categories.contains_key(category)
    }

    /// Longest configured keyword list; normalization base for legacy scores.
    pub fn max_keyword_list_len(&self) -> usize {
        self.categories
            .values()
            .map(|s| s.keywords.len())
            .max()
            .unwrap_or(0)
    }

    /// Built-in seed mirroring the production taxonomy. Used by tests and as
    /// fallback when no config file is deployed.
    pub fn default_seed() -> Self {
        let mut categories = BTreeMap::new();
        for (id, description, keywords) in [
            (
                "streetlight_broken",
                "Đèn đường bị hỏng, không sáng, chập chờn hoặc tắt hoàn toàn vào ban đêm",
                vec!["đèn", "hỏng", "không sáng", "chập chờn", "tối"],
            ),
            (
                "waste_dump",
                "Rác thải bị xả bừa bãi, điểm tập kết rác ô nhiễm, bốc mùi hôi thối",
                vec!["rác", "bẩn", "ô nhiễm", "xả rác", "bốc mùi"],
            ),
            (
                "road_damage",
                "Mặt đường hư hỏng, ổ gà, sụt lún, nứt vỡ gây nguy hiểm cho người tham gia giao thông",
                vec!["ổ gà", "đường hỏng", "sụt lún", "nứt", "hư hỏng"],
            ),
            (
                "flooding",
                "Ngập úng, nước không thoát được sau mưa, hệ thống thoát nước tắc nghẽn",
                vec!["ngập", "úng", "nước", "thoát nước"],
            ),
            (
                "infrastructure_damage",
                "Nắp cống vỡ hoặc mất, cáp điện hở, dây điện rơi xuống đường, hạ tầng kỹ thuật hư hại",
                vec!["nắp cống", "cống", "vỡ", "hở", "cáp", "dây điện"],
            ),
        ] {
            categories.insert(
                id.to_string(),
                CategorySpec {
                    description: description.to_string(),
                    keywords: keywords.into_iter().map(str::to_string).collect(),
                },
            );
        }

        let keywords = PriorityKeywords {
            high: ["khẩn cấp", "nguy hiểm", "tai nạn", "cháy", "điện giật", "sập"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            medium: ["ảnh hưởng", "cản trở", "bất tiện", "kéo dài"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let mut default_by_category = HashMap::new();
        for (cat, p) in [
            ("flooding", Priority::High),
            ("infrastructure_damage", Priority::High),
            ("road_damage", Priority::Medium),
            ("streetlight_broken", Priority::Medium),
            ("waste_dump", Priority::Low),
        ] {
            default_by_category.insert(cat.to_string(), p);
        }

        Self {
            model: ModelConfig {
                name: "keepitreal/vietnamese-sbert".to_string(),
                fallback_name: Some(
                    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2".to_string(),
                ),
            },
            thresholds: Thresholds::default(),
            categories,
            priority: PriorityConfig {
                keywords,
                default_by_category,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_valid() {
        let cfg = ClassifierConfig::default_seed();
        cfg.validate().expect("seed must validate");
        assert!(cfg.is_taxonomy_key("flooding"));
        assert!(!cfg.is_taxonomy_key(UNKNOWN_CATEGORY));
        assert_eq!(cfg.max_keyword_list_len(), 6);
    }

    #[test]
    fn rejects_reserved_unknown_key() {
        let raw = r#"{
            "model": { "name": "m" },
            "categories": {
                "unknown": { "description": "nope" }
            }
        }"#;
        assert!(ClassifierConfig::from_json_str(raw).is_err());
    }

    #[test]
    fn rejects_default_for_missing_category() {
        let raw = r#"{
            "model": { "name": "m" },
            "categories": {
                "flooding": { "description": "water" }
            },
            "priority": {
                "default_by_category": { "potholes": "high" }
            }
        }"#;
        assert!(ClassifierConfig::from_json_str(raw).is_err());
    }

    #[test]
    fn thresholds_default_when_absent() {
        let raw = r#"{
            "model": { "name": "m" },
            "categories": { "flooding": { "description": "water" } }
        }"#;
        let cfg = ClassifierConfig::from_json_str(raw).unwrap();
        assert!((cfg.thresholds.min_confidence - 0.6).abs() < 1e-6);
        assert!(cfg.thresholds.fallback_to_legacy);
    }
}
