//! Error taxonomy and structured action results.
//!
//! Core subsystems report failure as data rather than unwinding: the tick
//! scheduler records a per-probe error in the observation and keeps going.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Probe or target state forbids the action.
    InvalidPrecondition,
    /// Fuel, energy, or material too low.
    InsufficientResource,
    /// A bounded table is full.
    OutOfCapacity,
    /// UID lookup miss.
    NotFound,
    /// Bad JSON or unknown field.
    MalformedInput,
    /// KV-store failure.
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct SimError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SimError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPrecondition, message)
    }

    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientResource, message)
    }

    pub fn capacity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfCapacity, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedInput, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }
}

/// Outcome of one action execution.
///
/// `completed == false` with `success == true` means the action is still in
/// progress (multi-tick).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<SimError>,
}

impl ActionResult {
    pub fn ok(completed: bool) -> Self {
        Self {
            success: true,
            completed,
            error: None,
        }
    }

    pub fn fail(error: SimError) -> Self {
        Self {
            success: false,
            completed: false,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_displays_message() {
        let err = SimError::insufficient("not enough fuel");
        assert_eq!(err.to_string(), "not enough fuel");
        assert_eq!(err.kind, ErrorKind::InsufficientResource);
    }

    #[test]
    fn boundary_constructors_carry_their_kind() {
        assert_eq!(
            SimError::malformed("bad json").kind,
            ErrorKind::MalformedInput
        );
        assert_eq!(
            SimError::storage("disk went away").kind,
            ErrorKind::Storage
        );
    }

    #[test]
    fn result_constructors() {
        assert!(ActionResult::ok(true).completed);
        assert!(!ActionResult::ok(false).completed);
        let failed = ActionResult::fail(SimError::not_found("no such body"));
        assert!(!failed.success);
        assert_eq!(failed.error.unwrap().kind, ErrorKind::NotFound);
    }

    #[test]
    fn kind_serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidPrecondition).unwrap(),
            "\"invalid_precondition\""
        );
    }
}
