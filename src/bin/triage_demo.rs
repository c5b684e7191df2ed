//! Demo that triages a few sample reports end to end.
//!
//! With no environment set, runs fully offline: mock embedder plus a static
//! POI directory around central Hanoi. Set `EMBEDDINGS_URL` and
//! `TRIAGE_DIRECTORY_URL` to exercise the real backends.

use std::sync::Arc;

use urbanreflex_triage::{
    build_embedder, GeoPoint, NgsiDirectory, PoiDirectory, PointOfInterest, ReportInput,
    StaticDirectory, TriageConfig, TriagePipeline,
};

fn sample_directory() -> StaticDirectory {
    let poi = |id: &str, name: &str, category: &str, lon: f64, lat: f64| PointOfInterest {
        id: format!("urn:ngsi-ld:PointOfInterest:{id}"),
        name: name.to_string(),
        categories: vec![category.to_string()],
        location: GeoPoint { lon, lat },
    };
    StaticDirectory::new(vec![
        poi("thcs-trung-vuong", "THCS Trưng Vương", "school", 105.8523, 21.0245),
        poi("bv-bach-mai", "Bệnh viện Bạch Mai", "hospital", 105.8400, 20.9990),
        poi("pccc-q1", "Trạm PCCC số 1", "emergencyService", 105.8467, 21.0301),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    // Fall back to the deterministic mock when no embedding endpoint is set.
    if std::env::var("EMBEDDINGS_URL").is_err() {
        std::env::set_var("EMBED_TEST_MODE", "mock");
    }

    let config = TriageConfig::load()?;
    let embedder = build_embedder(&config.classifier);
    let directory: Arc<dyn PoiDirectory> = match std::env::var("TRIAGE_DIRECTORY_URL") {
        Ok(url) => Arc::new(NgsiDirectory::new(url)),
        Err(_) => Arc::new(sample_directory()),
    };

    let pipeline = TriagePipeline::from_config(&config, embedder, directory);

    let reports = [
        ReportInput {
            title: "Đèn đường hỏng".into(),
            description: "Đèn đường trước cổng trường không sáng, rất tối vào ban đêm".into(),
            location: Some(GeoPoint {
                lon: 105.8525,
                lat: 21.0247,
            }),
        },
        ReportInput {
            title: "Ngập nước".into(),
            description: "Nước ngập sâu không rút, tình huống khẩn cấp".into(),
            location: Some(GeoPoint {
                lon: 105.8401,
                lat: 20.9992,
            }),
        },
        ReportInput {
            title: "".into(),
            description: "".into(),
            location: None,
        },
    ];

    for report in &reports {
        let decision = pipeline.process_report(report).await;
        println!("{}", serde_json::to_string_pretty(&decision.to_update())?);
    }

    println!("triage-demo done");
    Ok(())
}
