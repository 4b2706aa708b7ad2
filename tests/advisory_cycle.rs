use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use green_wave::{
    advisor::{Instruction, MIN_SPEED},
    catalog::{ScheduleOverride, TrafficLightCatalog},
    controller::{evaluate_cycle, CycleContext, CycleInputs, CycleOutcome},
    geo::{self, Coordinate},
    output::{ConsoleSink, OutputSink, Signal},
    route::{LinearRoutePlanner, RoutePlanner},
    selector::{AlongRoute, FirstRelevant, LightSelector},
    traffic_light::Instant,
    SpeedAdvisor,
};

const LIGHT: Coordinate = Coordinate::new(50.9376, 6.9250);

fn t0() -> Instant {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
}

fn geojson(features: &[(&str, Coordinate)]) -> String {
    let features: Vec<String> = features
        .iter()
        .map(|(id, c)| {
            format!(
                r#"{{"type":"Feature","id":"{id}","properties":{{"highway":"traffic_signals"}},"geometry":{{"type":"Point","coordinates":[{},{}]}}}}"#,
                c.longitude, c.latitude
            )
        })
        .collect();
    format!(
        r#"{{"type":"FeatureCollection","features":[{}]}}"#,
        features.join(",")
    )
}

fn catalog(features: &[(&str, Coordinate)]) -> TrafficLightCatalog {
    TrafficLightCatalog::from_geojson_str(&geojson(features), &[], t0()).unwrap()
}

fn cycle(catalog: &TrafficLightCatalog, position: Coordinate, destination: Coordinate) -> CycleOutcome {
    let ctx = CycleContext {
        catalog,
        planner: &LinearRoutePlanner::default(),
        selector: &FirstRelevant,
        advisor: SpeedAdvisor::default(),
        proximity_threshold_m: 30.0,
    };
    let inputs = CycleInputs {
        position,
        destination,
        current_speed: 5.0,
        now: t0(),
    };
    evaluate_cycle(&inputs, &ctx)
}

#[test]
fn light_near_route_is_relevant_and_far_light_is_not() {
    let start = Coordinate::new(50.9370, 6.92509);
    let end = Coordinate::new(50.9380, 6.92509);
    let route = LinearRoutePlanner::default().compute_route(start, end).unwrap();

    let near = catalog(&[("node/1", LIGHT)]);
    let relevant = near.relevant(&route, 30.0);
    assert_eq!(relevant.len(), 1);
    assert_eq!(relevant[0].id(), "node/1");

    let moved = Coordinate::new(LIGHT.latitude + 0.009, LIGHT.longitude);
    assert!(geo::distance(LIGHT, moved) > 990.0);
    let far = catalog(&[("node/1", moved)]);
    assert!(far.relevant(&route, 30.0).is_empty());
}

#[test]
fn standing_at_destination_gets_minimum_speed() {
    let route = LinearRoutePlanner::default().compute_route(LIGHT, LIGHT).unwrap();
    assert_eq!(route.len(), 11);
    assert!(route.points().iter().all(|p| *p == LIGHT));

    let outcome = cycle(&catalog(&[("node/1", LIGHT)]), LIGHT, LIGHT);
    let Some(Signal::Advisory { result, .. }) = outcome.signal() else {
        panic!("expected advisory, got {outcome:?}");
    };
    assert_relative_eq!(result.optimal_speed, MIN_SPEED);
    assert_eq!(result.instruction, Instruction::Decelerate);
}

#[test]
fn no_relevant_lights_is_reported_not_advised() {
    let far = Coordinate::new(51.0, 7.1);
    let outcome = cycle(&catalog(&[("node/1", far)]), LIGHT, LIGHT);
    assert_eq!(outcome, CycleOutcome::Emitted(Signal::NoRelevantLights));

    let mut sink = ConsoleSink::new(Vec::new());
    sink.emit(outcome.signal().unwrap());
    let line = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(line.trim_end(), "No relevant traffic lights on the route.");
}

#[test]
fn scheduled_light_drives_advice() {
    let origin = Coordinate::new(50.937720, 6.924954);
    let destination = Coordinate::new(50.948270, 6.932673);
    let ahead = origin.lerp(destination, 0.4);

    let schedules = [ScheduleOverride {
        id: "node/2107720091".to_string(),
        green_secs: 65,
        red_secs: 45,
        offset_secs: 6,
    }];
    let catalog = TrafficLightCatalog::from_geojson_str(
        &geojson(&[("node/2107720091", ahead)]),
        &schedules,
        t0(),
    )
    .unwrap();

    let light = &catalog.lights()[0];
    assert_eq!(light.phases()[0].start(), t0() + chrono::TimeDelta::seconds(6));

    // ~517 m, green from +6 s to +71 s
    let outcome = cycle(&catalog, origin, destination);
    let Some(Signal::Advisory { light_id, result }) = outcome.signal() else {
        panic!("expected advisory, got {outcome:?}");
    };
    assert_eq!(light_id, "node/2107720091");
    assert_relative_eq!(result.optimal_speed, 10.0);
    assert_eq!(result.instruction, Instruction::Accelerate);
}

#[test]
fn along_route_selection_skips_passed_light() {
    let rider = Coordinate::new(50.9372, 6.9251);
    let destination = Coordinate::new(50.9426, 6.9251);
    let catalog = catalog(&[
        ("just_passed", Coordinate::new(50.9371, 6.9251)),
        ("ahead", Coordinate::new(50.9400, 6.9251)),
    ]);
    let inputs = CycleInputs {
        position: rider,
        destination,
        current_speed: 5.0,
        now: t0(),
    };

    let picked = |selector: &dyn LightSelector| {
        let ctx = CycleContext {
            catalog: &catalog,
            planner: &LinearRoutePlanner::default(),
            selector,
            advisor: SpeedAdvisor::default(),
            proximity_threshold_m: 30.0,
        };
        match evaluate_cycle(&inputs, &ctx) {
            CycleOutcome::Emitted(Signal::Advisory { light_id, .. }) => light_id,
            other => panic!("expected advisory, got {other:?}"),
        }
    };

    assert_eq!(picked(&FirstRelevant), "just_passed");
    assert_eq!(picked(&AlongRoute), "ahead");
}
