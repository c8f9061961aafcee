//! Common error types for the heap-lab services

use thiserror::Error;

/// Errors surfaced to the control layer
#[derive(Debug, Error)]
pub enum PressureError {
    /// Unrecognized scenario name from the control surface
    #[error("unknown scenario '{requested}'; valid scenarios: {}", .valid.join(", "))]
    UnknownScenario {
        requested: String,
        valid: Vec<String>,
    },

    /// A collection event could not be decoded; the event is skipped
    #[error("malformed collection event: {0}")]
    EventParse(String),
}
