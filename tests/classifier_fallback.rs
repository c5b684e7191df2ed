// tests/classifier_fallback.rs
//
// Degraded-capability behavior: with the embedding backend failing on every
// call, the classifier must produce exactly the rule-based output, and the
// pipeline must still return a well-formed decision.

use std::sync::Arc;

use async_trait::async_trait;
use urbanreflex_triage::{
    Embedder, GeoPoint, PoiDirectory, PointOfInterest, Priority, ReportInput, StaticDirectory,
    Status, TextClassifier, TriageConfig, TriagePipeline,
};
use urbanreflex_triage::embedding::Embedding;

struct AlwaysFailingEmbedder;

#[async_trait]
impl Embedder for AlwaysFailingEmbedder {
    async fn encode(&self, _text: &str) -> anyhow::Result<Embedding> {
        anyhow::bail!("model download failed")
    }
    fn name(&self) -> &'static str {
        "broken"
    }
}

struct AlwaysFailingDirectory;

#[async_trait]
impl PoiDirectory for AlwaysFailingDirectory {
    async fn nearby(
        &self,
        _center: GeoPoint,
        _radius_m: f64,
    ) -> anyhow::Result<Vec<PointOfInterest>> {
        anyhow::bail!("request timed out")
    }
}

#[tokio::test]
async fn broken_embedder_matches_legacy_exactly() {
    let config = TriageConfig::seeded();
    let classifier = TextClassifier::new(config.classifier.clone(), Arc::new(AlwaysFailingEmbedder));

    let cases = [
        ("Đèn đường", "đèn hỏng không sáng vào ban đêm"),
        ("Rác", "xả rác bừa bãi, bốc mùi"),
        ("Ổ gà", "đường hỏng, sụt lún nghiêm trọng"),
        ("", "nội dung không khớp danh mục nào"),
        ("", ""),
    ];
    for (title, description) in cases {
        let got = classifier.classify(title, description).await;
        let legacy = classifier.classify_legacy(title, description);
        if title.trim().is_empty() && description.trim().is_empty() {
            assert_eq!(got.category, "unknown");
            assert_eq!(got.confidence, 0.0);
        } else {
            assert_eq!(got, legacy, "{title:?}/{description:?}");
        }
    }
}

#[tokio::test]
async fn classify_output_is_always_well_formed() {
    let config = TriageConfig::seeded();
    let classifier = TextClassifier::new(config.classifier.clone(), Arc::new(AlwaysFailingEmbedder));

    for (title, description) in [
        ("💡", "🚧"),
        ("a", "b"),
        ("ngập", "ngập ngập ngập ngập ngập ngập ngập"),
    ] {
        let r = classifier.classify(title, description).await;
        assert!((0.0..=1.0).contains(&r.confidence));
        assert!(
            r.category == "unknown" || config.classifier.is_taxonomy_key(&r.category),
            "bad category {}",
            r.category
        );
    }
}

#[tokio::test]
async fn everything_degraded_still_yields_conservative_decision() {
    let config = TriageConfig::seeded();
    let pipeline = TriagePipeline::from_config(
        &config,
        Arc::new(AlwaysFailingEmbedder),
        Arc::new(AlwaysFailingDirectory),
    );
    let d = pipeline
        .process_report(&ReportInput {
            title: "Vấn đề".into(),
            description: "nội dung không khớp danh mục nào".into(),
            location: Some(GeoPoint {
                lon: 105.8342,
                lat: 21.0278,
            }),
        })
        .await;

    assert_eq!(d.category, "unknown");
    assert_eq!(d.priority, Priority::Low);
    assert_eq!(d.status, Status::NeedsManualReview);
}

#[tokio::test]
async fn high_keyword_beats_everything_even_when_degraded() {
    let config = TriageConfig::seeded();
    let pipeline = TriagePipeline::from_config(
        &config,
        Arc::new(AlwaysFailingEmbedder),
        Arc::new(StaticDirectory::default()),
    );
    let d = pipeline
        .process_report(&ReportInput {
            title: "Sự cố".into(),
            description: "dây điện rơi, nguy cơ điện giật, khẩn cấp".into(),
            location: None,
        })
        .await;
    assert_eq!(d.priority, Priority::High);
}
