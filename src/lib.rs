// ================================
// src/lib.rs
// ================================
pub mod advisor;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod destination;
pub mod error;
pub mod geo;
pub mod output;
pub mod route;
pub mod selector;
pub mod sensors;
pub mod traffic_light;

pub use advisor::{AdvisoryResult, Instruction, SpeedAdvisor};
pub use catalog::TrafficLightCatalog;
pub use config::{AdvisoryParams, ParameterManager, PhasePolicy};
pub use controller::{AdvisoryLoopController, CycleOutcome};
pub use destination::Destination;
pub use geo::Coordinate;
pub use traffic_light::{TimeWindow, TrafficLight};
