// ================================
// src/advisor.rs - optimal speed and instruction classification
// ================================
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::{
    config::{AdvisoryParams, PhasePolicy},
    geo,
    traffic_light::{Instant, TimeWindow, TrafficLight},
};

/// Slowest advisable speed in m/s (about 3.6 km/h).
pub const MIN_SPEED: f64 = 1.0;
/// Fastest advisable speed in m/s (about 36 km/h).
pub const MAX_SPEED: f64 = 10.0;
/// Speed difference below which the rider is told to hold speed.
pub const DEADBAND: f64 = 0.5;
/// Comfortable cruising speed the preferred-speed policy aims for, m/s.
pub const PREFERRED_SPEED: f64 = 6.0;
/// Cost added to a phase whose required speed is outside the band.
const OUT_OF_BAND_PENALTY: f64 = 1000.0;

const MPS_TO_KMH: f64 = 3.6;

/// Discrete advice shown to the rider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Instruction {
    Maintain,
    Accelerate,
    Decelerate,
}

impl Instruction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Instruction::Maintain => "Maintain speed",
            Instruction::Accelerate => "Accelerate",
            Instruction::Decelerate => "Decelerate",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one speed computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdvisoryResult {
    /// m/s
    pub optimal_speed: f64,
    /// m/s
    pub current_speed: f64,
    pub instruction: Instruction,
}

impl AdvisoryResult {
    pub fn optimal_kmh(&self) -> f64 {
        self.optimal_speed * MPS_TO_KMH
    }

    pub fn current_kmh(&self) -> f64 {
        self.current_speed * MPS_TO_KMH
    }
}

/// Arrival-speed band calculator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedAdvisor {
    min_speed: f64,
    max_speed: f64,
    deadband: f64,
    phase_policy: PhasePolicy,
    preferred_speed: f64,
}

impl Default for SpeedAdvisor {
    fn default() -> Self {
        Self::new(MIN_SPEED, MAX_SPEED, DEADBAND)
    }
}

/// Phase chosen for a light and the speed that reaches it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseTarget {
    pub phase: TimeWindow,
    /// m/s, inside the advisor's band
    pub optimal_speed: f64,
}

impl SpeedAdvisor {
    /// Bounds are reordered if given backwards.
    pub fn new(min_speed: f64, max_speed: f64, deadband: f64) -> Self {
        Self {
            min_speed: min_speed.min(max_speed),
            max_speed: max_speed.max(min_speed),
            deadband: deadband.abs(),
            phase_policy: PhasePolicy::Next,
            preferred_speed: PREFERRED_SPEED,
        }
    }

    pub fn with_phase_policy(mut self, policy: PhasePolicy, preferred_speed: f64) -> Self {
        self.phase_policy = policy;
        self.preferred_speed = preferred_speed;
        self
    }

    pub fn from_params(params: &AdvisoryParams) -> Self {
        Self::new(params.min_speed, params.max_speed, params.deadband)
            .with_phase_policy(params.phase_policy, params.preferred_speed)
    }

    pub fn min_speed(&self) -> f64 {
        self.min_speed
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    /// Speed that lands the rider inside `green_phase` at `light`.
    ///
    /// Targets the midpoint between the slowest speed still arriving before
    /// the phase ends and the speed arriving right at its start, clamped to
    /// the allowed band. A phase that is already over returns the maximum.
    pub fn compute_optimal_speed(
        &self,
        position: geo::Coordinate,
        light: &TrafficLight,
        green_phase: &TimeWindow,
        now: Instant,
    ) -> f64 {
        let distance_m = geo::distance(position, light.location());

        let time_until_start = seconds_between(now, green_phase.start());
        let time_until_end = seconds_between(now, green_phase.end());

        // Phase missed; stopping and waiting is left to the rider.
        if time_until_end <= 0.0 {
            debug!(light = light.id(), "green phase already over");
            return self.max_speed;
        }

        let v_min = distance_m / time_until_end.max(1.0);
        let v_max = distance_m / time_until_start.max(1.0);
        let v_opt = ((v_min + v_max) / 2.0).clamp(self.min_speed, self.max_speed);

        debug!(
            light = light.id(),
            distance_m,
            time_until_start,
            time_until_end,
            v_min,
            v_max,
            v_opt,
            "optimal speed computed"
        );

        v_opt
    }

    /// Among the phases that have not ended, the one whose required speed
    /// is closest to the preferred speed.
    ///
    /// A future phase is timed for its midpoint, an active one for its end.
    /// Phases needing a speed outside the band are only picked when nothing
    /// else is left. Falls back to the wrapped next phase when every stored
    /// phase has elapsed.
    pub fn choose_best_phase(
        &self,
        position: geo::Coordinate,
        light: &TrafficLight,
        now: Instant,
    ) -> Option<PhaseTarget> {
        let distance_m = geo::distance(position, light.location());

        let upcoming: Vec<TimeWindow> = light
            .phases()
            .iter()
            .filter(|phase| phase.end() > now)
            .copied()
            .collect();
        let candidates: Vec<TimeWindow> = if upcoming.is_empty() {
            light.usable_green_phase(now).into_iter().collect()
        } else {
            upcoming
        };

        let mut best: Option<(f64, TimeWindow, f64)> = None;
        for phase in candidates {
            let target_time = if now < phase.start() {
                phase.start() + phase.duration() / 2
            } else {
                phase.end()
            };
            let v_required = distance_m / seconds_between(now, target_time).max(1.0);

            let mut cost = (v_required - self.preferred_speed).abs();
            if v_required < self.min_speed || v_required > self.max_speed {
                cost += OUT_OF_BAND_PENALTY;
            }

            if best.map_or(true, |(best_cost, _, _)| cost < best_cost) {
                best = Some((cost, phase, v_required));
            }
        }

        let (cost, phase, v_required) = best?;
        debug!(
            light = light.id(),
            distance_m,
            v_required,
            cost,
            "preferred-speed phase chosen"
        );
        Some(PhaseTarget {
            phase,
            optimal_speed: v_required.clamp(self.min_speed, self.max_speed),
        })
    }

    /// Phase and speed for `light` under the configured phase policy.
    ///
    /// `None` when the light has no reachable green phase.
    pub fn target_phase(
        &self,
        position: geo::Coordinate,
        light: &TrafficLight,
        now: Instant,
    ) -> Option<PhaseTarget> {
        match self.phase_policy {
            PhasePolicy::Next => {
                let phase = light.usable_green_phase(now)?;
                Some(PhaseTarget {
                    phase,
                    optimal_speed: self.compute_optimal_speed(position, light, &phase, now),
                })
            }
            PhasePolicy::PreferredSpeed => self.choose_best_phase(position, light, now),
        }
    }

    /// Target minus current, signed.
    pub fn speed_diff(target: f64, current: f64) -> f64 {
        target - current
    }

    /// Maps a speed difference to an instruction.
    ///
    /// Inside the deadband is `Maintain`, above it `Accelerate`, anything
    /// else (including exactly `+deadband`) `Decelerate`.
    pub fn classify(&self, diff: f64) -> Instruction {
        if diff.abs() < self.deadband {
            Instruction::Maintain
        } else if diff > self.deadband {
            Instruction::Accelerate
        } else {
            Instruction::Decelerate
        }
    }

    /// Full advisory for a phase and a measured speed.
    pub fn advise(
        &self,
        position: geo::Coordinate,
        light: &TrafficLight,
        green_phase: &TimeWindow,
        current_speed: f64,
        now: Instant,
    ) -> AdvisoryResult {
        let optimal_speed = self.compute_optimal_speed(position, light, green_phase, now);
        self.instruct(optimal_speed, current_speed)
    }

    /// Advisory for an already computed target speed.
    pub fn instruct(&self, optimal_speed: f64, current_speed: f64) -> AdvisoryResult {
        let diff = Self::speed_diff(optimal_speed, current_speed);
        AdvisoryResult {
            optimal_speed,
            current_speed,
            instruction: self.classify(diff),
        }
    }
}

/// Fractional seconds from `from` to `to`, negative if `to` is earlier.
fn seconds_between(from: Instant, to: Instant) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
