// src/directory.rs
//! Point-of-interest directory access. The engine only needs "POIs within a
//! radius of a point"; the production backend is an NGSI-LD context broker,
//! tests and demos use a static in-memory directory.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// WGS84 coordinate, GeoJSON axis order (longitude first).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub categories: Vec<String>,
    pub location: GeoPoint,
}

#[async_trait]
pub trait PoiDirectory: Send + Sync {
    /// POIs within `radius_m` meters of `center`. The backend bounds the
    /// result count; errors are the caller's to degrade on.
    async fn nearby(&self, center: GeoPoint, radius_m: f64)
        -> anyhow::Result<Vec<PointOfInterest>>;
}

// ------------------------------------------------------------
// NGSI-LD broker client
// ------------------------------------------------------------

/// The broker needs one specific JSON-LD context for PointOfInterest queries.
const POI_CONTEXT_LINK: &str = "<https://raw.githubusercontent.com/smart-data-models/dataModel.PointOfInterest/master/context.jsonld>; rel=\"http://www.w3.org/ns/json-ld#context\"; type=\"application/ld+json\"";

/// One query is made per report, so keep the page small.
const QUERY_LIMIT: u32 = 10;

pub struct NgsiDirectory {
    http: reqwest::Client,
    base_url: String,
}

impl NgsiDirectory {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("urbanreflex-triage/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/* ---- wire shapes (keyValues representation) ---- */

#[derive(Deserialize)]
struct PoiEntity {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    category: Option<OneOrMany>,
    #[serde(default)]
    location: Option<GeoJsonPoint>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Deserialize)]
struct GeoJsonPoint {
    coordinates: [f64; 2],
}

#[async_trait]
impl PoiDirectory for NgsiDirectory {
    async fn nearby(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> anyhow::Result<Vec<PointOfInterest>> {
        let georel = format!("near;maxDistance=={}", radius_m.round() as i64);
        let coordinates = format!("[{},{}]", center.lon, center.lat);
        let limit = QUERY_LIMIT.to_string();

        let resp = self
            .http
            .get(format!("{}/ngsi-ld/v1/entities", self.base_url))
            .header("Link", POI_CONTEXT_LINK)
            .query(&[
                ("type", "PointOfInterest"),
                ("georel", georel.as_str()),
                ("geometry", "Point"),
                ("coordinates", coordinates.as_str()),
                ("options", "keyValues"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let entities: Vec<PoiEntity> = resp.json().await?;
        let pois = entities
            .into_iter()
            .filter_map(|e| {
                // Entities without coordinates cannot be scored; skip them.
                let location = e.location?;
                Some(PointOfInterest {
                    id: e.id,
                    name: e.name.unwrap_or_else(|| "Unnamed POI".to_string()),
                    categories: e.category.map(OneOrMany::into_vec).unwrap_or_default(),
                    location: GeoPoint {
                        lon: location.coordinates[0],
                        lat: location.coordinates[1],
                    },
                })
            })
            .collect();
        Ok(pois)
    }
}

// ------------------------------------------------------------
// In-memory directory for tests and demos
// ------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    pois: Vec<PointOfInterest>,
}

impl StaticDirectory {
    pub fn new(pois: Vec<PointOfInterest>) -> Self {
        Self { pois }
    }
}

#[async_trait]
impl PoiDirectory for StaticDirectory {
    async fn nearby(
        &self,
        center: GeoPoint,
        radius_m: f64,
    ) -> anyhow::Result<Vec<PointOfInterest>> {
        Ok(self
            .pois
            .iter()
            .filter(|p| crate::proximity::haversine_m(center, p.location) <= radius_m)
            .take(QUERY_LIMIT as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_with_single_category_string_parses() {
        let raw = r#"{
            "id": "urn:ngsi-ld:PointOfInterest:thcs-1",
            "name": "THCS Trưng Vương",
            "category": "school",
            "location": { "type": "Point", "coordinates": [105.8342, 21.0278] }
        }"#;
        let e: PoiEntity = serde_json::from_str(raw).unwrap();
        assert_eq!(e.category.map(OneOrMany::into_vec).unwrap(), vec!["school"]);
    }

    #[test]
    fn entity_with_category_list_parses() {
        let raw = r#"{
            "id": "urn:ngsi-ld:PointOfInterest:bv-1",
            "category": ["hospital", "emergencyService"],
            "location": { "type": "Point", "coordinates": [105.85, 21.02] }
        }"#;
        let e: PoiEntity = serde_json::from_str(raw).unwrap();
        assert_eq!(e.name, None);
        assert_eq!(
            e.category.map(OneOrMany::into_vec).unwrap(),
            vec!["hospital", "emergencyService"]
        );
    }

    #[tokio::test]
    async fn static_directory_filters_by_radius() {
        let near = PointOfInterest {
            id: "near".into(),
            name: "near".into(),
            categories: vec!["school".into()],
            location: GeoPoint {
                lon: 105.8343,
                lat: 21.0279,
            },
        };
        let far = PointOfInterest {
            id: "far".into(),
            name: "far".into(),
            categories: vec!["school".into()],
            location: GeoPoint {
                lon: 105.9,
                lat: 21.1,
            },
        };
        let dir = StaticDirectory::new(vec![near.clone(), far]);
        let center = GeoPoint {
            lon: 105.8342,
            lat: 21.0278,
        };
        let found = dir.nearby(center, 500.0).await.unwrap();
        assert_eq!(found, vec![near]);
    }
}
