//! Error types for the simulation core.
//!
//! Numeric edge cases (zero distances, empty aggregates) are handled by
//! policy inside the algorithms and never surface here.

use std::collections::TryReserveError;

use thiserror::Error;

/// Main error type for simulation operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Growing one of the simulation buffers failed.
    #[error("failed to grow {what}: {source}")]
    Capacity {
        what: &'static str,
        #[source]
        source: TryReserveError,
    },

    /// The tree needed more nodes than its configured limit allows.
    #[error("tree node limit of {limit} reached")]
    NodeLimit { limit: usize },

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The simulation worker thread could not be started.
    #[error("failed to spawn simulation thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    /// The simulation worker thread panicked before it could be joined.
    #[error("simulation thread panicked: {0}")]
    ThreadJoin(String),
}

/// Result type alias for simulation operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wraps an allocation failure for the named buffer.
    #[must_use]
    pub fn capacity(what: &'static str, source: TryReserveError) -> Self {
        Self::Capacity { what, source }
    }
}

/// Reserves room for `additional` more elements, reporting failure instead of aborting.
pub(crate) fn reserve<T>(vec: &mut Vec<T>, additional: usize, what: &'static str) -> Result<()> {
    vec.try_reserve(additional)
        .map_err(|source| Error::capacity(what, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_names_buffer() {
        let mut v: Vec<u64> = Vec::new();
        let err = reserve(&mut v, usize::MAX, "quadtree nodes").unwrap_err();
        assert!(err.to_string().contains("quadtree nodes"));
        assert!(matches!(err, Error::Capacity { .. }));
    }

    #[test]
    fn test_reserve_ok() {
        let mut v: Vec<u32> = Vec::new();
        reserve(&mut v, 16, "parents").unwrap();
        assert!(v.capacity() >= 16);
    }

    #[test]
    fn test_config_error_display() {
        let err: Error = toml::from_str::<toml::Table>("= nope").unwrap_err().into();
        assert!(err.to_string().starts_with("config error"));
    }
}
