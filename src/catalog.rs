// ================================
// src/catalog.rs - traffic-light dataset and route filtering
// ================================
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

use crate::{
    error::LoadError,
    geo::{self, Coordinate},
    route::Route,
    traffic_light::{Instant, TimeWindow, TrafficLight, SCHEDULE_WRAP},
};

/// Default proximity for a light to count as on the route.
pub const DEFAULT_PROXIMITY_M: f64 = 30.0;

/// Seed phases `(start, end)` in seconds after load for lights without an
/// explicit schedule.
const SEED_PHASES_S: [(i64, i64); 2] = [(10, 20), (70, 80)];

/// Fixed-cycle signal timing for one light, keyed by feature id.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScheduleOverride {
    pub id: String,
    pub green_secs: u32,
    pub red_secs: u32,
    #[serde(default)]
    pub offset_secs: u32,
}

impl ScheduleOverride {
    /// Green windows for 24 hours from `now + offset`, green first.
    pub fn phases(&self, now: Instant) -> Result<Vec<TimeWindow>, LoadError> {
        if self.green_secs == 0 {
            return Err(self.invalid("green duration must be positive"));
        }

        let green = TimeDelta::seconds(i64::from(self.green_secs));
        let cycle = TimeDelta::seconds(i64::from(self.green_secs) + i64::from(self.red_secs));
        let anchor = now + TimeDelta::seconds(i64::from(self.offset_secs));
        let horizon = anchor + SCHEDULE_WRAP;

        let mut phases = Vec::new();
        let mut start = anchor;
        while start < horizon {
            phases.push(TimeWindow::with_length(start, green));
            start += cycle;
        }
        Ok(phases)
    }

    fn invalid(&self, reason: &str) -> LoadError {
        LoadError::InvalidSchedule {
            id: self.id.clone(),
            reason: reason.to_string(),
        }
    }
}

// GeoJSON subset we read. Extra fields are ignored.
#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<serde_json::Value>,
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

impl Feature {
    fn id_string(&self) -> String {
        match &self.id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => "unknown".to_string(),
            Some(other) => other.to_string(),
        }
    }

    /// GeoJSON stores `[longitude, latitude, ...]`.
    fn location(&self) -> Option<Coordinate> {
        match self.geometry.as_ref()?.coordinates.as_slice() {
            [lon, lat, ..] => Some(Coordinate::new(*lat, *lon)),
            _ => None,
        }
    }
}

/// All known traffic lights, read-only after load.
#[derive(Debug, Clone, Default)]
pub struct TrafficLightCatalog {
    lights: Vec<TrafficLight>,
}

impl TrafficLightCatalog {
    pub fn new(lights: Vec<TrafficLight>) -> Self {
        Self { lights }
    }

    /// Load a GeoJSON feature collection from disk.
    pub fn load(
        path: impl AsRef<Path>,
        schedules: &[ScheduleOverride],
        now: Instant,
    ) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_geojson_str(&raw, schedules, now)?;
        info!(
            path = %path.display(),
            lights = catalog.len(),
            "traffic-light catalog loaded"
        );
        Ok(catalog)
    }

    /// Parse a GeoJSON document. Features without a usable point are skipped.
    pub fn from_geojson_str(
        raw: &str,
        schedules: &[ScheduleOverride],
        now: Instant,
    ) -> Result<Self, LoadError> {
        let collection: FeatureCollection = serde_json::from_str(raw)?;

        let mut lights = Vec::with_capacity(collection.features.len());
        for feature in &collection.features {
            let id = feature.id_string();
            let Some(location) = feature.location() else {
                warn!(%id, "skipping feature without point coordinates");
                continue;
            };

            let phases = match schedules.iter().find(|s| s.id == id) {
                Some(schedule) => {
                    debug!(
                        %id,
                        green = schedule.green_secs,
                        red = schedule.red_secs,
                        "using schedule override"
                    );
                    schedule.phases(now)?
                }
                None => seed_phases(now),
            };

            lights.push(TrafficLight::new(id, location, phases));
        }

        if lights.is_empty() {
            return Err(LoadError::Empty);
        }
        Ok(Self { lights })
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn lights(&self) -> &[TrafficLight] {
        &self.lights
    }

    /// Lights closer than `threshold_m` to any route point, in catalog order.
    pub fn relevant(&self, route: &Route, threshold_m: f64) -> Vec<&TrafficLight> {
        self.lights
            .iter()
            .filter(|light| {
                route
                    .points()
                    .iter()
                    .any(|p| geo::distance(light.location(), *p) < threshold_m)
            })
            .collect()
    }
}

fn seed_phases(now: Instant) -> Vec<TimeWindow> {
    SEED_PHASES_S
        .iter()
        .map(|&(from, to)| {
            TimeWindow::with_length(now + TimeDelta::seconds(from), TimeDelta::seconds(to - from))
        })
        .collect()
}
