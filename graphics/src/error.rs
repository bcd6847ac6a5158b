//! Graphics error types.
//!
//! Recoverable failures (driver errors, out-of-memory) travel as
//! [`GraphicsError`]. Programming errors such as stale handles or
//! device-limit violations go through [`fatal!`] instead: the failure is
//! logged and the thread panics.

use thiserror::Error;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// A descriptor pool has no room left for the requested set.
    #[error("descriptor pool out of memory")]
    OutOfPoolMemory,
    /// A descriptor pool is too fragmented to satisfy the request.
    #[error("descriptor pool fragmented")]
    FragmentedPool,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GraphicsError {
    /// Whether this error means a descriptor pool is exhausted and another
    /// pool should be tried.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::OutOfPoolMemory | Self::FragmentedPool)
    }
}

/// Log an invariant violation and abort the current operation.
///
/// Used for conditions that indicate a bug in the caller (stale handles,
/// double destroys, exceeded device limits) rather than a runtime state.
macro_rules! fatal {
    ($($arg:tt)*) => {{
        let message = format!($($arg)*);
        log::error!("{}", message);
        panic!("{}", message);
    }};
}

pub(crate) use fatal;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::InitializationFailed("no GPU found".to_string());
        assert_eq!(err.to_string(), "initialization failed: no GPU found");
    }

    #[test]
    fn test_pool_exhaustion_classification() {
        assert!(GraphicsError::OutOfPoolMemory.is_pool_exhausted());
        assert!(GraphicsError::FragmentedPool.is_pool_exhausted());
        assert!(!GraphicsError::OutOfMemory.is_pool_exhausted());
    }

    #[test]
    #[should_panic(expected = "broken invariant 42")]
    fn test_fatal_panics_with_message() {
        fatal!("broken invariant {}", 42);
    }
}
