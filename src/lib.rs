// src/lib.rs
// Public library surface for integration tests (and the demo binary).

pub mod classifier;
pub mod config;
pub mod directory;
pub mod embedding;
pub mod pipeline;
pub mod priority;
pub mod proximity;

// ---- Re-exports for stable public API ----
pub use crate::classifier::{Classification, TextClassifier};
pub use crate::config::{ClassifierConfig, ScoringConfig, TriageConfig, UNKNOWN_CATEGORY};
pub use crate::directory::{
    GeoPoint, NgsiDirectory, PoiDirectory, PointOfInterest, StaticDirectory,
};
pub use crate::embedding::{build_embedder, DynEmbedder, Embedder, MockEmbedder};
pub use crate::pipeline::{ReportInput, ReportUpdate, Status, TriageDecision, TriagePipeline};
pub use crate::priority::{Priority, PriorityKeywordDetector};
pub use crate::proximity::{Boost, ProximityCheck, ProximityScorer};
