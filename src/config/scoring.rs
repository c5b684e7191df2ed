// src/config/scoring.rs
//! Prioritization parameters for the proximity scorer, loaded from TOML and
//! compiled into a validated runtime form (window times become minute-of-day,
//! the timezone string becomes a `FixedOffset`). Bad documents fail at load,
//! not at scoring time.

use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::HashMap;
use std::{fs, path::Path};

/* ----------------------------
Raw schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
struct ScoringRoot {
    scoring: ScoringSection,
    category_weights: HashMap<String, f64>,
    #[serde(default)]
    context_multipliers: HashMap<String, f64>,
    #[serde(default)]
    time_windows: Vec<TimeWindowCfg>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoringSection {
    /// Exponential distance-decay constant, meters.
    decay_factor: f64,
    /// Directory query radius, meters.
    max_radius: f64,
    /// Fixed UTC offset like "+07:00". Absent → system local time.
    #[serde(default)]
    timezone: Option<String>,
    priority_thresholds: PriorityThresholds,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriorityThresholds {
    pub high: f64,
    pub medium: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct TimeWindowCfg {
    id: String,
    /// POI category the window applies to, or "any" for rush-hour style
    /// windows that apply regardless of category.
    applies_to: String,
    /// "HH:MM", inclusive on both ends.
    start: String,
    end: String,
    multiplier: f64,
}

/* ----------------------------
Compiled runtime form
---------------------------- */

#[derive(Debug, Clone, PartialEq)]
pub enum WindowScope {
    Any,
    PoiCategory(String),
}

#[derive(Debug, Clone)]
pub struct TimeWindow {
    pub id: String,
    pub scope: WindowScope,
    /// Minute-of-day bounds, inclusive.
    pub start_min: u32,
    pub end_min: u32,
    pub multiplier: f64,
}

impl TimeWindow {
    pub fn contains(&self, minute_of_day: u32) -> bool {
        self.start_min <= minute_of_day && minute_of_day <= self.end_min
    }

    pub fn applies_to(&self, poi_category: &str) -> bool {
        match &self.scope {
            WindowScope::Any => true,
            WindowScope::PoiCategory(c) => c == poi_category,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub decay_factor: f64,
    pub max_radius: f64,
    pub timezone: Option<FixedOffset>,
    pub priority_thresholds: PriorityThresholds,
    /// Sensitive POI category → weight. POIs without any of these categories
    /// are invisible to the scorer.
    pub category_weights: HashMap<String, f64>,
    /// "<report_category>+<poi_category>" → multiplier.
    pub context_multipliers: HashMap<String, f64>,
    pub time_windows: Vec<TimeWindow>,
}

impl ScoringConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(&path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read scoring config at {}: {}",
                path.as_ref().display(),
                e
            )
        })?;
        Self::from_toml_str(&data)
    }

    pub fn from_toml_str(data: &str) -> anyhow::Result<Self> {
        let raw: ScoringRoot = toml::from_str(data)?;

        if !(raw.scoring.decay_factor.is_finite() && raw.scoring.decay_factor > 0.0) {
            anyhow::bail!("scoring config: decay_factor must be a positive number of meters");
        }
        if !(raw.scoring.max_radius.is_finite() && raw.scoring.max_radius > 0.0) {
            anyhow::bail!("scoring config: max_radius must be a positive number of meters");
        }
        let th = raw.scoring.priority_thresholds;
        if !(th.high.is_finite() && th.medium.is_finite() && th.medium <= th.high) {
            anyhow::bail!(
                "scoring config: priority_thresholds must satisfy medium <= high (got medium={}, high={})",
                th.medium,
                th.high
            );
        }
        if raw.category_weights.is_empty() {
            anyhow::bail!("scoring config: category_weights must not be empty");
        }
        for (cat, w) in &raw.category_weights {
            if !(w.is_finite() && *w >= 0.0) {
                anyhow::bail!("scoring config: weight for `{cat}` must be finite and >= 0");
            }
        }

        // Composite keys are "<report>+<poi>"; catch malformed pairs and
        // typo'd POI categories here instead of silently defaulting to 1.0
        // at scoring time. Report categories are cross-checked against the
        // taxonomy by `TriageConfig::load`.
        for (key, m) in &raw.context_multipliers {
            let Some((report, poi)) = key.split_once('+') else {
                anyhow::bail!(
                    "scoring config: context multiplier key `{key}` is not of the form `report+poi`"
                );
            };
            if report.is_empty() || poi.is_empty() {
                anyhow::bail!("scoring config: context multiplier key `{key}` has an empty side");
            }
            if !raw.category_weights.contains_key(poi) {
                anyhow::bail!(
                    "scoring config: context multiplier `{key}` references unweighted POI category `{poi}`"
                );
            }
            if !(m.is_finite() && *m >= 0.0) {
                anyhow::bail!("scoring config: multiplier for `{key}` must be finite and >= 0");
            }
        }

        let timezone = match raw.scoring.timezone.as_deref() {
            None => None,
            Some(tz) => Some(tz.parse::<FixedOffset>().map_err(|e| {
                anyhow::anyhow!("scoring config: bad timezone offset `{tz}`: {e}")
            })?),
        };

        let mut time_windows = Vec::with_capacity(raw.time_windows.len());
        for w in &raw.time_windows {
            let start_min = parse_minute_of_day(&w.start)
                .map_err(|e| anyhow::anyhow!("scoring config: window `{}`: {e}", w.id))?;
            let end_min = parse_minute_of_day(&w.end)
                .map_err(|e| anyhow::anyhow!("scoring config: window `{}`: {e}", w.id))?;
            if start_min > end_min {
                anyhow::bail!(
                    "scoring config: window `{}` starts after it ends ({} > {})",
                    w.id,
                    w.start,
                    w.end
                );
            }
            if !(w.multiplier.is_finite() && w.multiplier >= 0.0) {
                anyhow::bail!(
                    "scoring config: window `{}` multiplier must be finite and >= 0",
                    w.id
                );
            }
            let scope = if w.applies_to.eq_ignore_ascii_case("any") {
                WindowScope::Any
            } else {
                if !raw.category_weights.contains_key(&w.applies_to) {
                    anyhow::bail!(
                        "scoring config: window `{}` applies to unweighted POI category `{}`",
                        w.id,
                        w.applies_to
                    );
                }
                WindowScope::PoiCategory(w.applies_to.clone())
            };
            time_windows.push(TimeWindow {
                id: w.id.clone(),
                scope,
                start_min,
                end_min,
                multiplier: w.multiplier,
            });
        }

        Ok(Self {
            decay_factor: raw.scoring.decay_factor,
            max_radius: raw.scoring.max_radius,
            timezone,
            priority_thresholds: th,
            category_weights: raw.category_weights,
            context_multipliers: raw.context_multipliers,
            time_windows,
        })
    }

    /// Built-in seed matching `config/scoring.toml`.
    pub fn default_seed() -> Self {
        Self::from_toml_str(SEED_TOML).expect("seed scoring config must parse")
    }
}

fn parse_minute_of_day(s: &str) -> anyhow::Result<u32> {
    let Some((h, m)) = s.split_once(':') else {
        anyhow::bail!("time `{s}` is not HH:MM");
    };
    let h: u32 = h.parse().map_err(|_| anyhow::anyhow!("bad hour in `{s}`"))?;
    let m: u32 = m
        .parse()
        .map_err(|_| anyhow::anyhow!("bad minute in `{s}`"))?;
    if h > 23 || m > 59 {
        anyhow::bail!("time `{s}` out of range");
    }
    Ok(h * 60 + m)
}

const SEED_TOML: &str = r#"
[scoring]
decay_factor = 150.0
max_radius = 500.0
timezone = "+07:00"

[scoring.priority_thresholds]
high = 0.75
medium = 0.45

[category_weights]
school = 1.6
hospital = 2.0
emergencyService = 1.8

[context_multipliers]
"flooding+school" = 1.5
"road_damage+school" = 1.3
"infrastructure_damage+school" = 1.4
"flooding+hospital" = 1.4
"infrastructure_damage+hospital" = 1.5
"streetlight_broken+school" = 1.2
"road_damage+emergencyService" = 1.4
"flooding+emergencyService" = 1.3

[[time_windows]]
id = "school_dismissal_noon"
applies_to = "school"
start = "11:00"
end = "11:45"
multiplier = 1.5

[[time_windows]]
id = "school_dismissal_afternoon"
applies_to = "school"
start = "16:30"
end = "17:30"
multiplier = 1.5

[[time_windows]]
id = "rush_hour_morning"
applies_to = "any"
start = "07:00"
end = "09:00"
multiplier = 1.2

[[time_windows]]
id = "rush_hour_evening"
applies_to = "any"
start = "17:00"
end = "19:00"
multiplier = 1.2

[[time_windows]]
id = "hospital_peak"
applies_to = "hospital"
start = "08:00"
end = "20:00"
multiplier = 1.3
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_parses_and_compiles() {
        let cfg = ScoringConfig::default_seed();
        assert_eq!(cfg.time_windows.len(), 5);
        assert!(cfg.timezone.is_some());
        assert!((cfg.category_weights["hospital"] - 2.0).abs() < 1e-9);
        let noon = cfg
            .time_windows
            .iter()
            .find(|w| w.id == "school_dismissal_noon")
            .unwrap();
        assert_eq!(noon.start_min, 11 * 60);
        assert_eq!(noon.end_min, 11 * 60 + 45);
        assert!(noon.applies_to("school"));
        assert!(!noon.applies_to("hospital"));
    }

    #[test]
    fn any_window_applies_everywhere() {
        let cfg = ScoringConfig::default_seed();
        let rush = cfg
            .time_windows
            .iter()
            .find(|w| w.id == "rush_hour_morning")
            .unwrap();
        assert!(rush.applies_to("school"));
        assert!(rush.applies_to("hospital"));
        assert!(rush.contains(8 * 60));
        assert!(!rush.contains(9 * 60 + 1));
        // inclusive bounds
        assert!(rush.contains(7 * 60));
        assert!(rush.contains(9 * 60));
    }

    #[test]
    fn malformed_context_key_is_rejected() {
        let raw = r#"
[scoring]
decay_factor = 100.0
max_radius = 500.0

[scoring.priority_thresholds]
high = 0.8
medium = 0.5

[category_weights]
school = 1.5

[context_multipliers]
"flooding-school" = 1.2
"#;
        let err = ScoringConfig::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("report+poi"), "{err}");
    }

    #[test]
    fn unweighted_poi_in_context_key_is_rejected() {
        let raw = r#"
[scoring]
decay_factor = 100.0
max_radius = 500.0

[scoring.priority_thresholds]
high = 0.8
medium = 0.5

[category_weights]
school = 1.5

[context_multipliers]
"flooding+kindergarten" = 1.2
"#;
        assert!(ScoringConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let raw = r#"
[scoring]
decay_factor = 100.0
max_radius = 500.0

[scoring.priority_thresholds]
high = 0.8
medium = 0.5

[category_weights]
school = 1.5

[[time_windows]]
id = "backwards"
applies_to = "school"
start = "12:00"
end = "11:00"
multiplier = 1.5
"#;
        assert!(ScoringConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let raw = r#"
[scoring]
decay_factor = 100.0
max_radius = 500.0
timezone = "Indochina/Somewhere"

[scoring.priority_thresholds]
high = 0.8
medium = 0.5

[category_weights]
school = 1.5
"#;
        assert!(ScoringConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn minute_parsing_bounds() {
        assert_eq!(parse_minute_of_day("00:00").unwrap(), 0);
        assert_eq!(parse_minute_of_day("23:59").unwrap(), 1439);
        assert!(parse_minute_of_day("24:00").is_err());
        assert!(parse_minute_of_day("7").is_err());
    }
}
