// ================================
// src/output.rs - advisory sinks
// ================================
use std::io::{self, Write};
use tracing::warn;

use crate::advisor::AdvisoryResult;

/// What a completed cycle hands to the rider.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Advisory {
        light_id: String,
        result: AdvisoryResult,
    },
    NoRelevantLights,
}

/// Receives one signal per emitting cycle.
pub trait OutputSink: Send {
    fn emit(&mut self, signal: &Signal);
}

/// Line-per-signal text output.
pub struct ConsoleSink<W: Write + Send> {
    writer: W,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> OutputSink for ConsoleSink<W> {
    fn emit(&mut self, signal: &Signal) {
        let written = match signal {
            Signal::Advisory { light_id, result } => writeln!(
                self.writer,
                "[{light_id}] V_optimal={:.2} m/s ({:.1} km/h) | V_actual={:.2} m/s ({:.1} km/h) -> {}",
                result.optimal_speed,
                result.optimal_kmh(),
                result.current_speed,
                result.current_kmh(),
                result.instruction
            ),
            Signal::NoRelevantLights => {
                writeln!(self.writer, "No relevant traffic lights on the route.")
            }
        };

        if let Err(e) = written.and_then(|()| self.writer.flush()) {
            warn!(error = %e, "failed to write advisory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::Instruction;

    #[test]
    fn formats_advisory_line() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.emit(&Signal::Advisory {
            light_id: "node/7".to_string(),
            result: AdvisoryResult {
                optimal_speed: 6.0,
                current_speed: 5.0,
                instruction: Instruction::Accelerate,
            },
        });
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out,
            "[node/7] V_optimal=6.00 m/s (21.6 km/h) | V_actual=5.00 m/s (18.0 km/h) -> Accelerate\n"
        );
    }

    #[test]
    fn formats_no_lights() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.emit(&Signal::NoRelevantLights);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out, "No relevant traffic lights on the route.\n");
    }
}
