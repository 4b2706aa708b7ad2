// ================================
// src/controller.rs - advisory cycle and periodic loop
// ================================
use chrono::Utc;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    advisor::SpeedAdvisor,
    catalog::TrafficLightCatalog,
    config::{self, AdvisoryParams},
    destination::Destination,
    error::{RouteError, SensorError},
    geo::Coordinate,
    output::{OutputSink, Signal},
    route::{LinearRoutePlanner, RoutePlanner},
    selector::LightSelector,
    sensors::{PositionSource, SpeedSensor, TimedRead},
    traffic_light::Instant,
};

/// Everything one cycle reads from the outside world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleInputs {
    pub position: Coordinate,
    pub destination: Coordinate,
    /// m/s
    pub current_speed: f64,
    pub now: Instant,
}

/// Collaborators one cycle computes with.
pub struct CycleContext<'a> {
    pub catalog: &'a TrafficLightCatalog,
    pub planner: &'a dyn RoutePlanner,
    pub selector: &'a dyn LightSelector,
    pub advisor: SpeedAdvisor,
    pub proximity_threshold_m: f64,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Sent to the output sink.
    Emitted(Signal),
    /// The selected light has no reachable green phase.
    NoUsablePhase { light_id: String },
    SensorUnavailable(SensorError),
    RouteUnavailable(RouteError),
}

impl CycleOutcome {
    pub fn signal(&self) -> Option<&Signal> {
        match self {
            CycleOutcome::Emitted(signal) => Some(signal),
            _ => None,
        }
    }
}

/// One advisory pass: plan, filter, select, phase, speed.
///
/// Pure in its inputs; sensor reads and output happen in the controller.
pub fn evaluate_cycle(inputs: &CycleInputs, ctx: &CycleContext<'_>) -> CycleOutcome {
    // 1. Route from the rider to the destination
    let route = match ctx.planner.compute_route(inputs.position, inputs.destination) {
        Ok(route) => route,
        Err(e) => return CycleOutcome::RouteUnavailable(e),
    };

    // 2. Lights along it
    let lights = ctx.catalog.relevant(&route, ctx.proximity_threshold_m);
    if lights.is_empty() {
        return CycleOutcome::Emitted(Signal::NoRelevantLights);
    }

    // 3. Light to advise on
    let Some(light) = ctx.selector.select(inputs.position, &route, &lights) else {
        return CycleOutcome::Emitted(Signal::NoRelevantLights);
    };

    // 4. Green phase to aim for and the speed reaching it
    let Some(target) = ctx.advisor.target_phase(inputs.position, light, inputs.now) else {
        return CycleOutcome::NoUsablePhase {
            light_id: light.id().to_string(),
        };
    };

    // 5. Speed advice
    let result = ctx.advisor.instruct(target.optimal_speed, inputs.current_speed);

    CycleOutcome::Emitted(Signal::Advisory {
        light_id: light.id().to_string(),
        result,
    })
}

/// Drives [`evaluate_cycle`] once per period.
pub struct AdvisoryLoopController {
    catalog: Arc<TrafficLightCatalog>,
    destination: Destination,
    position: Arc<dyn PositionSource>,
    speed: Arc<dyn SpeedSensor>,
    sink: Box<dyn OutputSink>,
    params: Arc<Mutex<AdvisoryParams>>,
    planner: Option<Box<dyn RoutePlanner>>,
    position_read: TimedRead<Coordinate>,
    speed_read: TimedRead<f64>,
}

impl AdvisoryLoopController {
    pub fn new(
        catalog: Arc<TrafficLightCatalog>,
        destination: Destination,
        position: Arc<dyn PositionSource>,
        speed: Arc<dyn SpeedSensor>,
        sink: Box<dyn OutputSink>,
        params: Arc<Mutex<AdvisoryParams>>,
    ) -> Self {
        Self {
            catalog,
            destination,
            position,
            speed,
            sink,
            params,
            planner: None,
            position_read: TimedRead::new(),
            speed_read: TimedRead::new(),
        }
    }

    /// Replace the straight-line planner, e.g. with a road-network backend.
    pub fn with_planner(mut self, planner: Box<dyn RoutePlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Run one cycle and emit its signal, if any.
    pub async fn tick(&mut self) -> CycleOutcome {
        // Parameters may be hot-reloaded between cycles
        let params = config::snapshot(&self.params);

        let sensed = self.sense(params.sensor_timeout()).await;

        let outcome = match sensed {
            Ok((position, current_speed)) => {
                let inputs = CycleInputs {
                    position,
                    destination: self.destination.get(),
                    current_speed,
                    now: Utc::now(),
                };
                self.evaluate(&inputs, &params)
            }
            Err(e) => CycleOutcome::SensorUnavailable(e),
        };

        if params.debug_mode {
            info!(?outcome, "cycle finished");
        }
        self.report(&outcome);
        outcome
    }

    /// Position then speed, each bounded by `limit`.
    async fn sense(&mut self, limit: Duration) -> Result<(Coordinate, f64), SensorError> {
        let position = Arc::clone(&self.position);
        let coordinate = self.position_read.read(limit, move || position.read()).await?;

        let speed = Arc::clone(&self.speed);
        let current_speed = self.speed_read.read(limit, move || speed.read()).await?;

        Ok((coordinate, current_speed))
    }

    fn evaluate(&self, inputs: &CycleInputs, params: &AdvisoryParams) -> CycleOutcome {
        let default_planner = LinearRoutePlanner::new(params.route_steps);
        let planner: &dyn RoutePlanner = match &self.planner {
            Some(planner) => planner.as_ref(),
            None => &default_planner,
        };
        let selector: Box<dyn LightSelector> = params.selection.into();

        let ctx = CycleContext {
            catalog: &self.catalog,
            planner,
            selector: selector.as_ref(),
            advisor: SpeedAdvisor::from_params(params),
            proximity_threshold_m: params.proximity_threshold_m,
        };
        evaluate_cycle(inputs, &ctx)
    }

    fn report(&mut self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Emitted(signal) => self.sink.emit(signal),
            CycleOutcome::NoUsablePhase { light_id } => {
                warn!(%light_id, "no usable green phase, skipping advisory");
            }
            CycleOutcome::SensorUnavailable(e) => {
                warn!(error = %e, "no sensor data this cycle");
            }
            CycleOutcome::RouteUnavailable(e) => {
                warn!(error = %e, "no route this cycle");
            }
        }
    }

    /// Cycle until `cancel` fires; returns the number of completed cycles.
    ///
    /// The period sleep starts after each cycle finishes, and only the sleep
    /// is interrupted by cancellation.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        info!(lights = self.catalog.len(), "advisory loop started");
        let mut cycles = 0;

        while !cancel.is_cancelled() {
            self.tick().await;
            cycles += 1;

            let period = config::snapshot(&self.params).period();
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(period) => {}
            }
        }

        debug!(cycles, "advisory loop stopped");
        cycles
    }
}
