// src/classifier.rs
//! Text classifier: maps (title, description) onto the category taxonomy.
//!
//! Two strategies, tried in order: semantic similarity against pre-embedded
//! category descriptions, then the rule-based keyword scorer. The semantic
//! path needs the embedding capability; when it is missing or fails, the
//! keyword path is the answer. `classify` never errors; the worst case is
//! `{"unknown", 0.0}`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::{ClassifierConfig, UNKNOWN_CATEGORY};
use crate::embedding::{DynEmbedder, ModelTier};

/// Reports shorter than this many tokens get a contextual prefix before
/// embedding; very short texts otherwise embed poorly.
const SHORT_TEXT_MIN_TOKENS: usize = 5;
const SHORT_TEXT_CONTEXT: &str = "Báo cáo sự cố hạ tầng đô thị:";

/// Threshold relaxation when only the fallback (multilingual) model answered.
const FALLBACK_MODEL_RELAX: f32 = 0.9;

/// Keyword occurring more than once counts extra in the legacy scorer.
const REPEATED_KEYWORD_SCORE: f32 = 1.5;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub confidence: f32,
}

impl Classification {
    pub fn unknown(confidence: f32) -> Self {
        Self {
            category: UNKNOWN_CATEGORY.to_string(),
            confidence,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.category == UNKNOWN_CATEGORY
    }
}

/// Category descriptions embedded once per process, L2-normalized so cosine
/// similarity is a dot product.
struct CategoryIndex {
    entries: Vec<(String, Vec<f32>)>,
}

pub struct TextClassifier {
    cfg: Arc<ClassifierConfig>,
    embedder: DynEmbedder,
    // Single-flight lazy init: concurrent first calls await one computation.
    // A failed init is retried on the next call rather than cached.
    index: OnceCell<CategoryIndex>,
}

impl TextClassifier {
    pub fn new(cfg: Arc<ClassifierConfig>, embedder: DynEmbedder) -> Self {
        Self {
            cfg,
            embedder,
            index: OnceCell::new(),
        }
    }

    /// Classify a report. Tries the semantic path; compares against the
    /// keyword path when the semantic result stayed below threshold; degrades
    /// to the keyword path on any semantic failure.
    pub async fn classify(&self, title: &str, description: &str) -> Classification {
        let text = format!("{title} {description}");
        let text = text.trim();
        if text.is_empty() {
            return Classification::unknown(0.0);
        }

        let result = match self.classify_semantic(text).await {
            Ok(semantic) => {
                if self.cfg.thresholds.fallback_to_legacy && semantic.is_unknown() {
                    let legacy = self.classify_legacy(title, description);
                    // Keep the semantic result unless the keyword path is
                    // strictly more confident.
                    if legacy.confidence > semantic.confidence {
                        legacy
                    } else {
                        semantic
                    }
                } else {
                    semantic
                }
            }
            Err(e) => {
                warn!(backend = self.embedder.name(), error = %e, "semantic classification unavailable, using keyword rules");
                self.classify_legacy(title, description)
            }
        };

        debug!(
            id = %anon_hash(text),
            category = %result.category,
            confidence = result.confidence,
            "classified report"
        );
        result
    }

    async fn classify_semantic(&self, text: &str) -> anyhow::Result<Classification> {
        let index = self
            .index
            .get_or_try_init(|| self.build_index())
            .await?;

        let normalized = if token_count(text) < SHORT_TEXT_MIN_TOKENS {
            format!("{SHORT_TEXT_CONTEXT} {text}")
        } else {
            text.to_string()
        };

        let embedding = self.embedder.encode(&normalized).await?;
        let mut report_vec = embedding.vector;
        l2_normalize(&mut report_vec);

        let mut best: Option<(&str, f32)> = None;
        for (category, cat_vec) in &index.entries {
            let similarity = dot(&report_vec, cat_vec);
            match best {
                Some((_, s)) if similarity <= s => {}
                _ => best = Some((category, similarity)),
            }
        }
        let (category, confidence) =
            best.ok_or_else(|| anyhow::anyhow!("category index is empty"))?;

        let mut min_confidence = self.cfg.thresholds.min_confidence;
        if embedding.tier == ModelTier::Fallback {
            min_confidence *= FALLBACK_MODEL_RELAX;
        }

        // Cosine of normalized vectors lives in [-1, 1]; the reported
        // confidence must stay in [0, 1].
        let confidence = confidence.clamp(0.0, 1.0);

        if confidence < min_confidence {
            // Category stays unknown but the numeric confidence is kept.
            return Ok(Classification::unknown(round2(confidence)));
        }
        Ok(Classification {
            category: category.to_string(),
            confidence: round2(confidence),
        })
    }

    async fn build_index(&self) -> anyhow::Result<CategoryIndex> {
        let mut entries = Vec::with_capacity(self.cfg.categories.len());
        for (category, spec) in &self.cfg.categories {
            let embedding = self.embedder.encode(&spec.description).await?;
            let mut vector = embedding.vector;
            l2_normalize(&mut vector);
            entries.push((category.clone(), vector));
        }
        debug!(categories = entries.len(), "category embedding index built");
        Ok(CategoryIndex { entries })
    }

    /// Rule-based classification: each configured keyword adds 1 point, or
    /// 1.5 when it occurs more than once in the text. Confidence normalizes
    /// by the longest keyword list across categories.
    pub fn classify_legacy(&self, title: &str, description: &str) -> Classification {
        let text = format!("{} {}", title.to_lowercase(), description.to_lowercase());

        let mut best: Option<(&str, f32)> = None;
        for (category, spec) in &self.cfg.categories {
            let mut score = 0.0f32;
            for keyword in &spec.keywords {
                match text.matches(keyword.as_str()).count() {
                    0 => {}
                    1 => score += 1.0,
                    _ => score += REPEATED_KEYWORD_SCORE,
                }
            }
            match best {
                Some((_, s)) if score <= s => {}
                _ => best = Some((category, score)),
            }
        }

        match best {
            Some((category, score)) if score > 0.0 => {
                let base = self.cfg.max_keyword_list_len().max(1) as f32;
                Classification {
                    category: category.to_string(),
                    confidence: round2((score / base).min(1.0)),
                }
            }
            _ => Classification::unknown(0.0),
        }
    }
}

fn token_count(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}

/// Short hex digest for log lines; report text is never logged raw.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
