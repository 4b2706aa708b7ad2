// ================================
// src/traffic_light.rs - signal location and green-phase schedule
// ================================
use chrono::{DateTime, TimeDelta, Utc};

use crate::geo::Coordinate;

/// Instant type used for all schedule arithmetic.
pub type Instant = DateTime<Utc>;

/// Period of the daily wrap applied when every stored phase has elapsed.
pub const SCHEDULE_WRAP: TimeDelta = TimeDelta::hours(24);

/// A green-phase interval, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: Instant,
    end: Instant,
}

impl TimeWindow {
    /// Returns `None` when `end` precedes `start`.
    pub fn new(start: Instant, end: Instant) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Window of `length` starting at `start`; negative lengths collapse to zero.
    pub fn with_length(start: Instant, length: TimeDelta) -> Self {
        Self {
            start,
            end: start + length.max(TimeDelta::zero()),
        }
    }

    /// Zero-length window at `at`, the "no phase data" marker.
    pub fn degenerate(at: Instant) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }

    /// True while `now` lies inside `[start, end)`.
    pub fn is_active(&self, now: Instant) -> bool {
        self.start <= now && now < self.end
    }

    /// Same window moved by `delta`.
    pub fn shifted(&self, delta: TimeDelta) -> Self {
        Self {
            start: self.start + delta,
            end: self.end + delta,
        }
    }
}

/// A traffic light: fixed location plus green phases sorted by start.
///
/// Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficLight {
    id: String,
    location: Coordinate,
    phases: Vec<TimeWindow>,
}

impl TrafficLight {
    /// Phases are sorted by start so lookups can scan front to back.
    pub fn new(id: impl Into<String>, location: Coordinate, mut phases: Vec<TimeWindow>) -> Self {
        phases.sort_by_key(TimeWindow::start);
        Self {
            id: id.into(),
            location,
            phases,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Coordinate {
        self.location
    }

    pub fn phases(&self) -> &[TimeWindow] {
        &self.phases
    }

    /// First phase whose end lies after `now`; an active phase qualifies.
    ///
    /// When every phase has elapsed the first phase is repeated 24 hours
    /// later. A light without phases yields the degenerate window
    /// `(now, now)`.
    pub fn next_green_phase(&self, now: Instant) -> TimeWindow {
        if let Some(phase) = self.phases.iter().find(|phase| phase.end > now) {
            return *phase;
        }

        match self.phases.first() {
            Some(first) => first.shifted(SCHEDULE_WRAP),
            None => TimeWindow::degenerate(now),
        }
    }

    /// The next phase if it can still be reached, `None` otherwise.
    ///
    /// Filters out the degenerate no-data window and windows that are still
    /// over after the single daily wrap.
    pub fn usable_green_phase(&self, now: Instant) -> Option<TimeWindow> {
        let window = self.next_green_phase(now);
        (!window.is_degenerate() && window.end > now).then_some(window)
    }
}
