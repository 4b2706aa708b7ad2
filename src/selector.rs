// ================================
// src/selector.rs - choosing the light to advise on
// ================================
use crate::{
    config::SelectionPolicy,
    geo::{self, Coordinate},
    route::Route,
    traffic_light::TrafficLight,
};

/// Picks the single light the rider is advised on.
pub trait LightSelector: Send + Sync {
    fn select<'a>(
        &self,
        position: Coordinate,
        route: &Route,
        lights: &[&'a TrafficLight],
    ) -> Option<&'a TrafficLight>;
}

/// First relevant light in catalog filter order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstRelevant;

impl LightSelector for FirstRelevant {
    fn select<'a>(
        &self,
        _position: Coordinate,
        _route: &Route,
        lights: &[&'a TrafficLight],
    ) -> Option<&'a TrafficLight> {
        lights.first().copied()
    }
}

/// First light ahead of the rider measured along the route.
///
/// Falls back to the last light when every light is behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlongRoute;

impl LightSelector for AlongRoute {
    fn select<'a>(
        &self,
        position: Coordinate,
        route: &Route,
        lights: &[&'a TrafficLight],
    ) -> Option<&'a TrafficLight> {
        let rider_at = distance_along_route(route, position);
        lights
            .iter()
            .find(|light| distance_along_route(route, light.location()) > rider_at)
            .or_else(|| lights.last())
            .copied()
    }
}

impl From<SelectionPolicy> for Box<dyn LightSelector> {
    fn from(policy: SelectionPolicy) -> Self {
        match policy {
            SelectionPolicy::First => Box::new(FirstRelevant),
            SelectionPolicy::AlongRoute => Box::new(AlongRoute),
        }
    }
}

/// Meters from the route start to the projection of `point` onto the
/// nearest segment.
pub fn distance_along_route(route: &Route, point: Coordinate) -> f64 {
    let mut travelled = 0.0;
    let mut best_offset = f64::INFINITY;
    let mut best_along = 0.0;

    for (a, b) in route.segments() {
        let segment_len = geo::distance(a, b);
        if segment_len > 0.0 {
            let (t, offset) = project_onto_segment(point, a, b);
            if offset < best_offset {
                best_offset = offset;
                best_along = travelled + t * segment_len;
            }
        }
        travelled += segment_len;
    }

    best_along
}

/// Clamped segment parameter `t` of the projection and the perpendicular
/// offset in meters.
fn project_onto_segment(point: Coordinate, a: Coordinate, b: Coordinate) -> (f64, f64) {
    let ref_lat = ((a.latitude + b.latitude) / 2.0).to_radians();
    let (x1, y1) = geo::project_local(a, ref_lat);
    let (x2, y2) = geo::project_local(b, ref_lat);
    let (xp, yp) = geo::project_local(point, ref_lat);

    let dx = x2 - x1;
    let dy = y2 - y1;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (0.0, (xp - x1).hypot(yp - y1));
    }

    let t = (((xp - x1) * dx + (yp - y1) * dy) / len_sq).clamp(0.0, 1.0);
    let offset = (xp - (x1 + t * dx)).hypot(yp - (y1 + t * dy));
    (t, offset)
}
