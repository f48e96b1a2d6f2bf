/*
 * Error Module
 *
 * This module defines the error taxonomy for the simulation pipeline.
 * Every error here is fatal for the frame loop: startup errors stop the
 * loop from ever starting, and device errors terminate it.
 */

use thiserror::Error;

/// Errors raised by the simulation pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The platform cannot provide the compute support the pipeline needs.
    #[error("compute capability unavailable: {0}")]
    Capability(String),

    /// The requested population does not fit the device limits.
    #[error(
        "{limit_name} ({limit_bytes} bytes) is too small, need at least {required_bytes} bytes \
         for {requested} entities. Max number of entities is {max_population}"
    )]
    Capacity {
        /// Population that was asked for.
        requested: u64,
        /// Bytes the population needs.
        required_bytes: u64,
        /// Name of the device limit that was exceeded.
        limit_name: &'static str,
        /// Value of that limit.
        limit_bytes: u64,
        /// Largest population the limit allows.
        max_population: u64,
    },

    /// A readback buffer is not a whole number of records.
    #[error("buffer of {size} bytes is not divisible by the record stride of {stride} bytes")]
    Alignment {
        /// Byte size of the buffer.
        size: u64,
        /// Record stride in bytes.
        stride: u64,
    },

    /// A startup parameter is invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A dispatch or copy would bind buffers illegally.
    #[error("invalid binding: {0}")]
    Binding(String),

    /// A rule program could not be resolved or rejected its inputs.
    #[error("rule program error: {0}")]
    Program(String),

    /// The device queue failed.
    #[error("device error: {0}")]
    Device(String),
}

/// Result type for pipeline operations.
pub type SimResult<T> = Result<T, SimulationError>;
