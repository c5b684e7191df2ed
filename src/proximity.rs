// src/proximity.rs
//! Geospatial-temporal priority escalation.
//!
//! A report near a school, hospital, or emergency service gets its priority
//! boosted. Each nearby sensitive POI is scored as
//! `distance_score * category_weight * context_multiplier * time_multiplier`
//! and the best POI decides the boost. Directory failures and missing
//! locations degrade to a zero result; this component never raises.

use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ScoringConfig, UNKNOWN_CATEGORY};
use crate::directory::{GeoPoint, PointOfInterest, PoiDirectory};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters (haversine).
pub fn haversine_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Escalation level suggested by proximity alone. Ordered so "at least
/// medium" comparisons read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Boost {
    None,
    Medium,
    High,
}

impl fmt::Display for Boost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Boost::None => "none",
            Boost::Medium => "medium",
            Boost::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximityCheck {
    pub is_sensitive: bool,
    /// Best POI score, clamped to [0, 1].
    pub score: f64,
    pub boost: Boost,
    pub reason: String,
    /// Names of scoring POIs, best first.
    pub nearby_pois: Vec<String>,
}

impl ProximityCheck {
    fn zero(reason: &str) -> Self {
        Self {
            is_sensitive: false,
            score: 0.0,
            boost: Boost::None,
            reason: reason.to_string(),
            nearby_pois: Vec::new(),
        }
    }
}

pub struct ProximityScorer {
    cfg: Arc<ScoringConfig>,
    directory: Arc<dyn PoiDirectory>,
}

impl ProximityScorer {
    pub fn new(cfg: Arc<ScoringConfig>, directory: Arc<dyn PoiDirectory>) -> Self {
        Self { cfg, directory }
    }

    /// Check a report location against nearby sensitive POIs.
    ///
    /// `report_category` defaults to the `unknown` sentinel for the context
    /// multiplier lookup. `now` is injectable for tests; `None` means the
    /// configured timezone's current wall clock (system local time when no
    /// timezone is configured).
    pub async fn check_poi_proximity(
        &self,
        location: Option<GeoPoint>,
        report_category: Option<&str>,
        now: Option<DateTime<FixedOffset>>,
    ) -> ProximityCheck {
        let Some(center) = location else {
            return ProximityCheck::zero("No location provided");
        };

        let minute = minute_of_day(now.unwrap_or_else(|| self.now_in_configured_tz()));

        let pois = match self.directory.nearby(center, self.cfg.max_radius).await {
            Ok(pois) => pois,
            Err(e) => {
                // Transient directory failures degrade to "no POIs found".
                warn!(error = %e, "POI directory query failed");
                Vec::new()
            }
        };

        self.score_pois(
            center,
            report_category.unwrap_or(UNKNOWN_CATEGORY),
            minute,
            &pois,
        )
    }

    /// Pure scoring core, independent of clock and directory I/O.
    pub fn score_pois(
        &self,
        center: GeoPoint,
        report_category: &str,
        minute_of_day: u32,
        pois: &[PointOfInterest],
    ) -> ProximityCheck {
        let mut scored: Vec<(String, f64)> = Vec::new();

        for poi in pois {
            // First listed sensitive category wins the tie-break. Arbitrary
            // but fixed; reordering a POI's category list changes the score.
            let Some(poi_category) = poi
                .categories
                .iter()
                .find(|c| self.cfg.category_weights.contains_key(c.as_str()))
            else {
                continue;
            };

            let distance = haversine_m(center, poi.location);
            let distance_score = self.distance_score(distance);
            let category_weight = self
                .cfg
                .category_weights
                .get(poi_category.as_str())
                .copied()
                .unwrap_or(1.0);
            let context_multiplier = self
                .cfg
                .context_multipliers
                .get(&format!("{report_category}+{poi_category}"))
                .copied()
                .unwrap_or(1.0);
            let time_multiplier = self.time_multiplier(poi_category, minute_of_day);

            let score = distance_score * category_weight * context_multiplier * time_multiplier;
            debug!(
                poi = %poi.name,
                poi_category = %poi_category,
                distance_m = distance,
                distance_score,
                category_weight,
                context_multiplier,
                time_multiplier,
                score,
                "scored POI"
            );
            if score > 0.0 {
                scored.push((poi.name.clone(), score));
            }
        }

        if scored.is_empty() {
            return ProximityCheck::zero("No sensitive POIs nearby");
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let score = scored[0].1.clamp(0.0, 1.0);

        let th = self.cfg.priority_thresholds;
        let boost = if score >= th.high {
            Boost::High
        } else if score >= th.medium {
            Boost::Medium
        } else {
            Boost::None
        };

        let top: Vec<&str> = scored.iter().take(3).map(|(n, _)| n.as_str()).collect();
        let reason = format!(
            "Proximity to sensitive POIs: {} (score {:.3})",
            top.join(", "),
            score
        );

        ProximityCheck {
            is_sensitive: score > 0.0,
            score,
            boost,
            reason,
            nearby_pois: scored.into_iter().map(|(n, _)| n).collect(),
        }
    }

    /// Exponential decay with distance; 1.0 at (or behind) the POI itself.
    fn distance_score(&self, distance_m: f64) -> f64 {
        if distance_m <= 0.0 {
            return 1.0;
        }
        (-distance_m / self.cfg.decay_factor).exp().clamp(0.0, 1.0)
    }

    /// Simultaneously active windows compose via max, not product.
    fn time_multiplier(&self, poi_category: &str, minute_of_day: u32) -> f64 {
        let mut multiplier = 1.0f64;
        for window in &self.cfg.time_windows {
            if window.applies_to(poi_category) && window.contains(minute_of_day) {
                multiplier = multiplier.max(window.multiplier);
            }
        }
        multiplier
    }

    fn now_in_configured_tz(&self) -> DateTime<FixedOffset> {
        match self.cfg.timezone {
            Some(offset) => Utc::now().with_timezone(&offset),
            None => {
                let local = Local::now();
                local.with_timezone(local.offset())
            }
        }
    }
}

fn minute_of_day(t: DateTime<FixedOffset>) -> u32 {
    t.hour() * 60 + t.minute()
}
