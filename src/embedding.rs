//! Embedding adapter: the classifier consumes `encode(text) -> vector` as an
//! opaque capability. A remote inference endpoint backs the real path; a
//! deterministic mock backs tests and local demos; a disabled client makes
//! the classifier degrade to its rule-based path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ClassifierConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// Which configured model produced a vector. The classifier relaxes its
/// confidence threshold when only the fallback model was reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f32>,
    pub tier: ModelTier,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn encode(&self, text: &str) -> anyhow::Result<Embedding>;
    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynEmbedder = Arc<dyn Embedder>;

/// Factory: pick a backend from config and environment.
///
/// * `EMBED_TEST_MODE=mock` → deterministic mock (tests, demos).
/// * `EMBEDDINGS_URL` set → remote inference endpoint.
/// * otherwise → disabled (classifier runs rule-based only).
pub fn build_embedder(config: &ClassifierConfig) -> DynEmbedder {
    if std::env::var("EMBED_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockEmbedder::default());
    }
    match std::env::var("EMBEDDINGS_URL") {
        Ok(url) if !url.trim().is_empty() => Arc::new(RemoteEmbedder::new(
            url,
            config.model.name.clone(),
            config.model.fallback_name.clone(),
        )),
        _ => Arc::new(DisabledEmbedder),
    }
}

// ------------------------------------------------------------
// Remote endpoint
// ------------------------------------------------------------

/// Calls an embeddings inference endpoint (`POST {base}/v1/embeddings`,
/// OpenAI-compatible body). Tries the primary model first, then the
/// configured multilingual fallback. Requires no key; `EMBEDDINGS_API_KEY`
/// is attached as a bearer token when present.
pub struct RemoteEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    primary: String,
    fallback: Option<String>,
}

impl RemoteEmbedder {
    pub fn new(base_url: String, primary: String, fallback: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("urbanreflex-triage/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        let api_key = std::env::var("EMBEDDINGS_API_KEY").ok().filter(|k| !k.is_empty());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            primary,
            fallback,
        }
    }

    async fn fetch(&self, model: &str, input: &str) -> anyhow::Result<Vec<f32>> {
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            input: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            data: Vec<Row>,
        }
        #[derive(Deserialize)]
        struct Row {
            embedding: Vec<f32>,
        }

        let mut req = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .json(&Req { model, input });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?.error_for_status()?;
        let body: Resp = resp.json().await?;
        let vector = body
            .data
            .into_iter()
            .next()
            .map(|r| r.embedding)
            .ok_or_else(|| anyhow::anyhow!("embeddings endpoint returned no rows"))?;
        if vector.is_empty() {
            anyhow::bail!("embeddings endpoint returned an empty vector");
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn encode(&self, text: &str) -> anyhow::Result<Embedding> {
        match self.fetch(&self.primary, text).await {
            Ok(vector) => Ok(Embedding {
                vector,
                tier: ModelTier::Primary,
            }),
            Err(primary_err) => {
                let Some(fallback) = &self.fallback else {
                    return Err(primary_err);
                };
                warn!(
                    model = %self.primary,
                    error = %primary_err,
                    "primary embedding model failed, trying fallback"
                );
                let vector = self.fetch(fallback, text).await?;
                Ok(Embedding {
                    vector,
                    tier: ModelTier::Fallback,
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

// ------------------------------------------------------------
// Mock + disabled backends
// ------------------------------------------------------------

/// Deterministic hash-bucketed bag-of-words vectors. Texts sharing tokens get
/// high cosine similarity, which is enough for demos and pipeline tests.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dim: usize,
    pub tier: ModelTier,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dim: 64,
            tier: ModelTier::Primary,
        }
    }
}

impl MockEmbedder {
    pub fn with_tier(tier: ModelTier) -> Self {
        Self { tier, ..Self::default() }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut v = vec![0.0f32; self.dim];
        for token in text.to_lowercase().split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let idx = (hasher.finish() as usize) % self.dim;
            v[idx] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn encode(&self, text: &str) -> anyhow::Result<Embedding> {
        Ok(Embedding {
            vector: self.vectorize(text),
            tier: self.tier,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always errors; selected when no endpoint is configured.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn encode(&self, _text: &str) -> anyhow::Result<Embedding> {
        anyhow::bail!("embedding capability is not configured")
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
