//! Error types for the Conflux update engine.
//!
//! Organized by failure class: part failures (recovered per-part),
//! coupling failures (recovered per-tick), and configuration misuse
//! (rejected before any state changes).

use std::error::Error;
use std::fmt;

/// Error from a single update part.
///
/// Returned by [`UpdatePart::run`](crate::UpdatePart::run). Caught at
/// the pool-task boundary and reported through the listener channel;
/// the part's completion signal still fires so the tick barrier cannot
/// deadlock on a failing part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartError {
    /// The part's update logic failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for PartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
        }
    }
}

impl Error for PartError {}

/// Error from coupling propagation.
///
/// Returned by
/// [`CouplingManager::update_all_couplings`](crate::CouplingManager::update_all_couplings).
/// Recovered at the driver loop level: the tick is abandoned, the
/// failure is reported once, and the loop continues with the next tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CouplingError {
    /// Propagating the coupling graph failed.
    PropagationFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for CouplingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PropagationFailed { reason } => write!(f, "coupling propagation failed: {reason}"),
        }
    }
}

impl Error for CouplingError {}

/// Configuration misuse, rejected before any engine state changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Requested worker count is zero.
    InvalidThreadCount {
        /// The rejected value.
        value: usize,
    },
    /// The operation is only permitted while the engine is stopped.
    EngineRunning {
        /// Which operation was rejected.
        operation: &'static str,
    },
    /// The driver thread is gone (coordinator already shut down).
    DriverUnavailable,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidThreadCount { value } => {
                write!(f, "thread count must be at least 1, got {value}")
            }
            Self::EngineRunning { operation } => {
                write!(f, "{operation} is only permitted while the engine is stopped")
            }
            Self::DriverUnavailable => write!(f, "driver thread is not available"),
        }
    }
}

impl Error for ConfigError {}
