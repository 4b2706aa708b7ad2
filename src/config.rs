// ================================
// src/config.rs - TOML parameters with hot reload
// ================================
use serde::Deserialize;
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    thread,
    time::{Duration, SystemTime},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    advisor::{DEADBAND, MAX_SPEED, MIN_SPEED, PREFERRED_SPEED},
    catalog::{ScheduleOverride, DEFAULT_PROXIMITY_M},
    error::ConfigError,
    geo::Coordinate,
    route::DEFAULT_ROUTE_STEPS,
};

/// Default parameter file, overridable through `CONFIG_PATH`.
pub const DEFAULT_CONFIG_PATH: &str = "./green_wave.toml";

const WATCH_INTERVAL: Duration = Duration::from_millis(500);

/// How the next light is picked from the relevant set.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First light in catalog filter order.
    #[default]
    First,
    /// First light ahead of the rider along the route.
    AlongRoute,
}

/// Which green phase of the selected light the advice aims for.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhasePolicy {
    /// The next phase that has not ended yet.
    #[default]
    Next,
    /// The upcoming phase whose required speed is closest to `preferred_speed`.
    PreferredSpeed,
}

/// Which mock sensors feed the loop.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorMode {
    /// Constant position.
    #[default]
    Fixed,
    /// Rider moving from `mock_position` toward the destination.
    Simulated,
}

/// Advisory parameters loaded from TOML
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AdvisoryParams {
    // Speed band (m/s)
    pub min_speed: f64,
    pub max_speed: f64,
    pub deadband: f64,
    pub phase_policy: PhasePolicy,
    pub preferred_speed: f64,
    // Route and filtering
    pub proximity_threshold_m: f64,
    pub route_steps: usize,
    pub selection: SelectionPolicy,
    // Loop timing
    pub period_ms: u64,
    pub sensor_timeout_ms: u64,
    // Startup-only inputs
    pub catalog_path: PathBuf,
    pub fallback_destination: Coordinate,
    pub schedules: Vec<ScheduleOverride>,
    // Mock sensors
    pub sensor_mode: SensorMode,
    pub mock_position: Coordinate,
    pub mock_speed: f64,
    pub speed_jitter: f64,
    pub ride_speed: f64,
    // Debug options
    pub debug_mode: bool,
}

impl Default for AdvisoryParams {
    fn default() -> Self {
        Self {
            min_speed: MIN_SPEED,
            max_speed: MAX_SPEED,
            deadband: DEADBAND,
            phase_policy: PhasePolicy::Next,
            preferred_speed: PREFERRED_SPEED,
            proximity_threshold_m: DEFAULT_PROXIMITY_M,
            route_steps: DEFAULT_ROUTE_STEPS,
            selection: SelectionPolicy::First,
            period_ms: 1000,
            sensor_timeout_ms: 250,
            catalog_path: PathBuf::from("./traffic_light.json"),
            fallback_destination: Coordinate::new(50.948270, 6.932673),
            schedules: Vec::new(),
            sensor_mode: SensorMode::Fixed,
            mock_position: Coordinate::new(50.937720, 6.924954),
            mock_speed: 5.0,
            speed_jitter: 0.0,
            ride_speed: 3.0,
            debug_mode: false,
        }
    }
}

impl AdvisoryParams {
    /// Parse and validate parameters from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let params = Self::from_toml_str(&config_str).map_err(|source| ConfigError::Toml {
            path: path.display().to_string(),
            source,
        })?;
        params.validate()?;
        Ok(params)
    }

    /// Rejects values the advisory loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let must_be_finite = [
            ("min_speed", self.min_speed),
            ("max_speed", self.max_speed),
            ("deadband", self.deadband),
            ("preferred_speed", self.preferred_speed),
            ("mock_speed", self.mock_speed),
            ("speed_jitter", self.speed_jitter),
            ("ride_speed", self.ride_speed),
        ];
        if let Some(&(field, value)) = must_be_finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::invalid(field, value));
        }

        if !(self.proximity_threshold_m.is_finite() && self.proximity_threshold_m >= 0.0) {
            return Err(ConfigError::invalid(
                "proximity_threshold_m",
                self.proximity_threshold_m,
            ));
        }
        if self.period_ms == 0 {
            return Err(ConfigError::invalid("period_ms", self.period_ms));
        }
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Like [`AdvisoryParams::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }
}

/// Config path from `CONFIG_PATH`, falling back to [`DEFAULT_CONFIG_PATH`].
pub fn config_path() -> PathBuf {
    env::var_os("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Clone of the current parameters; a poisoned lock still yields its value.
pub fn snapshot(params: &Mutex<AdvisoryParams>) -> AdvisoryParams {
    params.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Parameter owner with hot-reload
pub struct ParameterManager {
    params: Arc<Mutex<AdvisoryParams>>,
    config_path: PathBuf,
}

impl ParameterManager {
    /// Load from [`config_path`].
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path(config_path())
    }

    pub fn from_path(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = config_path.into();
        let params = Arc::new(Mutex::new(AdvisoryParams::load_or_default(&config_path)?));

        info!(path = %config_path.display(), "parameter manager initialized");

        Ok(Self {
            params,
            config_path,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Shared handle read by the advisory loop every cycle.
    pub fn get_params(&self) -> Arc<Mutex<AdvisoryParams>> {
        self.params.clone()
    }

    pub fn snapshot(&self) -> AdvisoryParams {
        snapshot(&self.params)
    }

    /// Re-read the file if it changed since `last_modified`.
    ///
    /// Returns the new modification time when parameters were swapped.
    /// A file that fails to parse leaves the current parameters in place.
    pub fn reload_if_modified(&self, last_modified: SystemTime) -> Option<SystemTime> {
        let modified = fs::metadata(&self.config_path)
            .and_then(|m| m.modified())
            .ok()?;
        if modified <= last_modified {
            return None;
        }

        match AdvisoryParams::load(&self.config_path) {
            Ok(new_params) => {
                *self.params.lock().unwrap_or_else(PoisonError::into_inner) = new_params;
                info!(path = %self.config_path.display(), "parameters hot-reloaded");
                Some(modified)
            }
            Err(e) => {
                warn!(error = %e, "hot-reload failed, keeping previous parameters");
                Some(modified)
            }
        }
    }

    /// Background thread polling the file until `cancel` fires.
    pub fn start_file_watcher(self: &Arc<Self>, cancel: CancellationToken) -> thread::JoinHandle<()> {
        let manager = Arc::clone(self);
        let mut last_modified = fs::metadata(&manager.config_path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);

        thread::spawn(move || {
            while !cancel.is_cancelled() {
                thread::sleep(WATCH_INTERVAL);
                if let Some(modified) = manager.reload_if_modified(last_modified) {
                    last_modified = modified;
                }
            }
            debug!("config watcher stopped");
        })
    }
}
