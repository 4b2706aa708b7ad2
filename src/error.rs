// ================================
// src/error.rs - error types
// ================================
use std::time::Duration;
use thiserror::Error;

/// Errors raised while building the traffic-light catalog.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read traffic-light dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The dataset is not a valid GeoJSON feature collection.
    #[error("malformed traffic-light dataset: {0}")]
    Json(#[from] serde_json::Error),

    /// The dataset parsed but contained no usable features.
    #[error("traffic-light dataset contains no usable features")]
    Empty,

    /// A schedule override cannot produce green phases.
    #[error("invalid schedule for light {id}: {reason}")]
    InvalidSchedule { id: String, reason: String },
}

/// Errors surfaced by position or speed sensors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// The sensor has no reading to offer this cycle.
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    /// The read did not complete in time.
    #[error("sensor read timed out after {0:?}")]
    Timeout(Duration),

    /// An earlier read that timed out has not returned yet.
    #[error("previous sensor read still running")]
    Busy,
}

/// Errors from a route planner backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    /// A route needs at least a start and an end point.
    #[error("route needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    /// The routing backend failed.
    #[error("routing backend failed: {0}")]
    Backend(String),
}

/// Malformed operator destination input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DestinationError {
    #[error("expected two coordinates, got {0} field(s)")]
    FieldCount(usize),

    #[error("not a finite number: {0:?}")]
    NotANumber(String),
}

/// Errors loading the parameter file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// A parameter parsed but is outside what the loop accepts.
    #[error("invalid parameter {field} = {value}")]
    Invalid { field: &'static str, value: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, value: impl ToString) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
        }
    }
}

impl SensorError {
    /// Creates an unavailable error from any message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_timeout_display() {
        let err = SensorError::Timeout(Duration::from_millis(250));
        let msg = format!("{err}");
        assert!(msg.contains("timed out"));
        assert!(msg.contains("250ms"));
    }

    #[test]
    fn invalid_schedule_display() {
        let err = LoadError::InvalidSchedule {
            id: "node/42".to_string(),
            reason: "zero-length green".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("node/42"));
        assert!(msg.contains("zero-length green"));
    }

    #[test]
    fn invalid_parameter_display() {
        let msg = ConfigError::invalid("min_speed", f64::NAN).to_string();
        assert_eq!(msg, "invalid parameter min_speed = NaN");
    }

    #[test]
    fn route_error_display() {
        let msg = format!("{}", RouteError::TooFewPoints(1));
        assert!(msg.contains("got 1"));
    }
}
