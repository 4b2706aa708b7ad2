// ================================
// src/route.rs - waypoint routes and the pluggable planner
// ================================
use crate::{
    error::RouteError,
    geo::{self, Coordinate},
};

/// Default number of interpolation steps of the linear planner.
pub const DEFAULT_ROUTE_STEPS: usize = 10;

/// Ordered waypoints from start to destination, at least two long.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<Coordinate>,
}

impl Route {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, RouteError> {
        if points.len() < 2 {
            return Err(RouteError::TooFewPoints(points.len()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Never true for a constructed route.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> Coordinate {
        self.points[0]
    }

    pub fn end(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    /// Consecutive waypoint pairs.
    pub fn segments(&self) -> impl Iterator<Item = (Coordinate, Coordinate)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Total haversine length in meters.
    pub fn length_m(&self) -> f64 {
        self.segments().map(|(a, b)| geo::distance(a, b)).sum()
    }

    /// Point reached after travelling `meters` along the route.
    ///
    /// Negative distances clamp to the start, distances past the end clamp
    /// to the destination.
    pub fn advance(&self, meters: f64) -> Coordinate {
        if meters <= 0.0 {
            return self.start();
        }

        let mut travelled = 0.0;
        for (a, b) in self.segments() {
            let segment = geo::distance(a, b);
            if travelled + segment >= meters {
                let fraction = if segment > 0.0 {
                    (meters - travelled) / segment
                } else {
                    0.0
                };
                return a.lerp(b, fraction);
            }
            travelled += segment;
        }

        self.end()
    }
}

/// Produces a route between two coordinates.
///
/// Implementations must return the exact `start` as first point and the
/// exact `end` as last point. A road-network backend can replace the
/// straight-line default without touching the consumers.
pub trait RoutePlanner: Send + Sync {
    fn compute_route(&self, start: Coordinate, end: Coordinate) -> Result<Route, RouteError>;
}

/// Straight-line placeholder planner.
#[derive(Debug, Clone, Copy)]
pub struct LinearRoutePlanner {
    steps: usize,
}

impl LinearRoutePlanner {
    /// `steps` of zero is treated as one.
    pub fn new(steps: usize) -> Self {
        Self {
            steps: steps.max(1),
        }
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl Default for LinearRoutePlanner {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTE_STEPS)
    }
}

impl RoutePlanner for LinearRoutePlanner {
    fn compute_route(&self, start: Coordinate, end: Coordinate) -> Result<Route, RouteError> {
        let steps = self.steps;
        let points = (0..=steps)
            .map(|i| match i {
                0 => start,
                i if i == steps => end,
                i => start.lerp(end, i as f64 / steps as f64),
            })
            .collect();

        Route::new(points)
    }
}
