//! Error types for rebump-core configuration.

use thiserror::Error;

use crate::version::VersionError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// A `[[files]]` entry has no usable target.
    #[error("files[{index}]: {reason}")]
    TargetConflict {
        /// Position of the entry in `files`.
        index: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// A `[parts.<name>]` entry breaks its invariants.
    #[error("part {name:?}: {reason}")]
    InvalidPart {
        /// The part name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `parse`/`serialize` pair cannot be compiled.
    #[error("invalid version settings at {location}: {source}")]
    InvalidParse {
        /// `top level` or `files[N]`.
        location: String,
        /// The underlying failure.
        #[source]
        source: VersionError,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
