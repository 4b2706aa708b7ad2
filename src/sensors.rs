// ================================
// src/sensors.rs - position and speed inputs
// ================================
use rand::Rng;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{task::JoinHandle, time::timeout};

use crate::{
    config::{AdvisoryParams, SensorMode},
    destination::Destination,
    error::SensorError,
    geo::Coordinate,
    route::{LinearRoutePlanner, RoutePlanner},
};

/// Source of the rider's current position.
pub trait PositionSource: Send + Sync {
    fn read(&self) -> Result<Coordinate, SensorError>;
}

/// Source of the rider's current speed in m/s.
pub trait SpeedSensor: Send + Sync {
    fn read(&self) -> Result<f64, SensorError>;
}

/// Blocking sensor reads run off the async workers, one at a time.
///
/// A read that outlives its deadline keeps running on the blocking pool.
/// Until it returns, further reads fail with [`SensorError::Busy`] instead
/// of parking another blocking thread.
pub struct TimedRead<T> {
    in_flight: Option<JoinHandle<Result<T, SensorError>>>,
}

impl<T: Send + 'static> TimedRead<T> {
    pub fn new() -> Self {
        Self { in_flight: None }
    }

    /// True while a timed-out read is still running.
    pub fn is_busy(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Run `read` bounded by `limit`.
    pub async fn read<F>(&mut self, limit: Duration, read: F) -> Result<T, SensorError>
    where
        F: FnOnce() -> Result<T, SensorError> + Send + 'static,
    {
        if self.is_busy() {
            return Err(SensorError::Busy);
        }
        // A late result from an earlier read is stale.
        self.in_flight = None;

        let mut handle = tokio::task::spawn_blocking(read);
        match timeout(limit, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(SensorError::unavailable(format!(
                "sensor task failed: {join_error}"
            ))),
            Err(_) => {
                self.in_flight = Some(handle);
                Err(SensorError::Timeout(limit))
            }
        }
    }
}

impl<T: Send + 'static> Default for TimedRead<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Position that never changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinate);

impl PositionSource for FixedPosition {
    fn read(&self) -> Result<Coordinate, SensorError> {
        Ok(self.0)
    }
}

/// Rider leaving `origin` at `speed_mps` toward the current destination.
///
/// The position is derived from wall time since construction, walked along
/// the straight route to whatever the destination is at read time.
pub struct SimulatedRide {
    origin: Coordinate,
    destination: Destination,
    speed_mps: f64,
    planner: LinearRoutePlanner,
    started: Instant,
}

impl SimulatedRide {
    pub fn new(origin: Coordinate, destination: Destination, speed_mps: f64) -> Self {
        Self {
            origin,
            destination,
            speed_mps: speed_mps.max(0.0),
            planner: LinearRoutePlanner::default(),
            started: Instant::now(),
        }
    }

    /// Position after `elapsed` of riding.
    pub fn position_after(&self, elapsed: Duration) -> Result<Coordinate, SensorError> {
        let route = self
            .planner
            .compute_route(self.origin, self.destination.get())
            .map_err(|e| SensorError::unavailable(e.to_string()))?;
        Ok(route.advance(elapsed.as_secs_f64() * self.speed_mps))
    }
}

impl PositionSource for SimulatedRide {
    fn read(&self) -> Result<Coordinate, SensorError> {
        self.position_after(self.started.elapsed())
    }
}

/// Speed with optional uniform jitter, never negative.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpeed {
    speed_mps: f64,
    jitter: f64,
}

impl FixedSpeed {
    pub fn new(speed_mps: f64) -> Self {
        Self {
            speed_mps,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.abs();
        self
    }
}

impl SpeedSensor for FixedSpeed {
    fn read(&self) -> Result<f64, SensorError> {
        let noise = if self.jitter > 0.0 {
            rand::rng().random_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        Ok((self.speed_mps + noise).max(0.0))
    }
}

/// Build the configured mock sensors.
pub fn mock_sensors(
    params: &AdvisoryParams,
    destination: &Destination,
) -> (Arc<dyn PositionSource>, Arc<dyn SpeedSensor>) {
    let position: Arc<dyn PositionSource> = match params.sensor_mode {
        SensorMode::Fixed => Arc::new(FixedPosition(params.mock_position)),
        SensorMode::Simulated => Arc::new(SimulatedRide::new(
            params.mock_position,
            destination.clone(),
            params.ride_speed,
        )),
    };
    let speed = Arc::new(FixedSpeed::new(params.mock_speed).with_jitter(params.speed_jitter));
    (position, speed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ORIGIN: Coordinate = Coordinate::new(50.937720, 6.924954);
    const TARGET: Coordinate = Coordinate::new(50.948270, 6.932673);

    #[test]
    fn fixed_position_reads_constant() {
        let sensor = FixedPosition(ORIGIN);
        assert_eq!(sensor.read(), Ok(ORIGIN));
        assert_eq!(sensor.read(), Ok(ORIGIN));
    }

    #[test]
    fn jitter_stays_in_range() {
        let sensor = FixedSpeed::new(5.0).with_jitter(0.3);
        for _ in 0..200 {
            let v = sensor.read().unwrap();
            assert!((4.7..=5.3).contains(&v), "v = {v}");
        }
    }

    #[test]
    fn speed_never_negative() {
        let sensor = FixedSpeed::new(0.1).with_jitter(2.0);
        for _ in 0..200 {
            assert!(sensor.read().unwrap() >= 0.0);
        }
    }

    #[test]
    fn simulated_ride_moves_toward_destination() {
        let ride = SimulatedRide::new(ORIGIN, Destination::new(TARGET), 3.0);

        assert_eq!(ride.position_after(Duration::ZERO).unwrap(), ORIGIN);

        let after = ride.position_after(Duration::from_secs(100)).unwrap();
        assert_relative_eq!(geo::distance(ORIGIN, after), 300.0, epsilon = 0.5);

        let arrived = ride.position_after(Duration::from_secs(100_000)).unwrap();
        assert_eq!(arrived, TARGET);
    }

    #[test]
    fn mock_sensors_follow_mode() {
        let destination = Destination::new(TARGET);
        let params = AdvisoryParams {
            mock_speed: 4.0,
            ..AdvisoryParams::default()
        };
        let (position, speed) = mock_sensors(&params, &destination);
        assert_eq!(position.read(), Ok(params.mock_position));
        assert_eq!(speed.read(), Ok(4.0));
    }

    #[tokio::test]
    async fn timed_read_passes_value() {
        let mut reader = TimedRead::new();
        let value = reader.read(Duration::from_millis(500), || Ok(7.5)).await;
        assert_eq!(value, Ok(7.5));
        assert!(!reader.is_busy());
    }

    #[tokio::test]
    async fn stalled_read_times_out() {
        let limit = Duration::from_millis(20);
        let mut reader = TimedRead::<f64>::new();
        let result = reader
            .read(limit, || {
                std::thread::sleep(Duration::from_millis(300));
                Ok(1.0)
            })
            .await;
        assert_eq!(result, Err(SensorError::Timeout(limit)));
    }

    #[tokio::test]
    async fn hung_read_is_not_reissued() {
        let limit = Duration::from_millis(20);
        let started = Arc::new(AtomicUsize::new(0));
        let mut reader = TimedRead::<f64>::new();

        let slow_read = |started: Arc<AtomicUsize>| {
            move || -> Result<f64, SensorError> {
                started.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(200));
                Ok(1.0)
            }
        };

        let first = reader.read(limit, slow_read(Arc::clone(&started))).await;
        assert_eq!(first, Err(SensorError::Timeout(limit)));
        assert!(reader.is_busy());

        let second = reader.read(limit, slow_read(Arc::clone(&started))).await;
        assert_eq!(second, Err(SensorError::Busy));
        assert_eq!(started.load(Ordering::SeqCst), 1);

        // Once the hung read returns, the next one goes through.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!reader.is_busy());
        let third = reader.read(limit, || Ok(2.0)).await;
        assert_eq!(third, Ok(2.0));
    }

    #[tokio::test]
    async fn sensor_failure_propagates() {
        let mut reader = TimedRead::<Coordinate>::new();
        let result = reader
            .read(Duration::from_millis(500), || {
                Err(SensorError::unavailable("no fix"))
            })
            .await;
        assert_eq!(result, Err(SensorError::Unavailable("no fix".to_string())));
    }
}
