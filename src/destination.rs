// ================================
// src/destination.rs - shared destination cell and operator input
// ================================
use std::{
    io::BufRead,
    sync::{Arc, PoisonError, RwLock},
    thread,
};
use tracing::{debug, info, warn};

use crate::{error::DestinationError, geo::Coordinate};

/// Shared destination, written by the operator and read once per cycle.
///
/// The coordinate pair is swapped under a lock so readers never see a
/// half-written value.
#[derive(Debug, Clone)]
pub struct Destination {
    inner: Arc<RwLock<Coordinate>>,
}

impl Destination {
    pub fn new(initial: Coordinate) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn set(&self, destination: Coordinate) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = destination;
    }

    pub fn get(&self) -> Coordinate {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parse `"lat lon"` or `"lat, lon"`.
pub fn parse_destination(input: &str) -> Result<Coordinate, DestinationError> {
    let fields: Vec<&str> = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|field| !field.is_empty())
        .collect();

    let [lat, lon] = fields.as_slice() else {
        return Err(DestinationError::FieldCount(fields.len()));
    };

    Ok(Coordinate::new(parse_finite(lat)?, parse_finite(lon)?))
}

fn parse_finite(field: &str) -> Result<f64, DestinationError> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DestinationError::NotANumber(field.to_string()))
}

/// Parsed destination, or `fallback` with a warning on malformed input.
pub fn resolve_destination(input: &str, fallback: Coordinate) -> Coordinate {
    match parse_destination(input) {
        Ok(destination) => destination,
        Err(e) => {
            warn!(error = %e, %fallback, "invalid destination input, using default");
            fallback
        }
    }
}

/// Thread applying each valid input line to `destination` until EOF.
///
/// Invalid lines are logged and leave the current destination untouched.
pub fn spawn_operator_input<R>(reader: R, destination: Destination) -> thread::JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    thread::spawn(move || {
        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "operator input closed");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match parse_destination(&line) {
                Ok(coordinate) => {
                    destination.set(coordinate);
                    info!(destination = %coordinate, "destination updated");
                }
                Err(e) => warn!(error = %e, "ignoring destination input"),
            }
        }
        debug!("operator input finished");
    })
}
