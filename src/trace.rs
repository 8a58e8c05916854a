//! Run trace and audit hashing
//!
//! Every state transition of a run is appended to the trace, making the
//! run auditable after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Write;

/// States of the workflow driver state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Planning,
    Selecting,
    Collecting,
    Analyzing,
    Assessing,
    Synthesizing,
    Done,
}

impl DriverState {
    /// True for the four states in which an executor runs.
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            DriverState::Collecting
                | DriverState::Analyzing
                | DriverState::Assessing
                | DriverState::Synthesizing
        )
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::Planning => "planning",
            DriverState::Selecting => "selecting",
            DriverState::Collecting => "collecting",
            DriverState::Analyzing => "analyzing",
            DriverState::Assessing => "assessing",
            DriverState::Synthesizing => "synthesizing",
            DriverState::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// One append-only record of a state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub at: DateTime<Utc>,
    pub from: DriverState,
    pub to: DriverState,
    pub task_id: Option<String>,
}

impl TraceRecord {
    pub fn new(from: DriverState, to: DriverState, task_id: Option<String>) -> Self {
        Self {
            at: Utc::now(),
            from,
            to,
            task_id,
        }
    }
}

/// Compute SHA256 hash of a directive for audit integrity.
/// Streams bytes directly into the hasher, no intermediate String.
pub fn compute_directive_hash(directive: &str) -> String {
    let mut hasher = Sha256::new();

    if HashWriter(&mut hasher).write_all(directive.as_bytes()).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_hash_is_stable() {
        let a = compute_directive_hash("Assess AAPL before earnings");
        let b = compute_directive_hash("Assess AAPL before earnings");
        let c = compute_directive_hash("Assess MSFT before earnings");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_execution_states() {
        assert!(DriverState::Collecting.is_execution());
        assert!(DriverState::Synthesizing.is_execution());
        assert!(!DriverState::Planning.is_execution());
        assert!(!DriverState::Selecting.is_execution());
        assert!(!DriverState::Done.is_execution());
    }
}
