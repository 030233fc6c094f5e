// Error Taxonomy
use thiserror::Error;

pub type Result<T> = core::result::Result<T, SumError>;

/// Every way an invocation can fail. None of these are retried internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SumError {
    /// Device memory could not be reserved for the requested buffer.
    #[error("device allocation of {requested} bytes failed ({available} bytes available)")]
    Allocation { requested: usize, available: usize },

    /// A host/device copy did not complete or did not match its source.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The launch configuration was rejected or a group faulted.
    #[error("kernel launch failed: {0}")]
    KernelLaunch(String),

    /// Host input does not form a K x N input set.
    #[error("invalid input shape: {0}")]
    Shape(String),
}

impl SumError {
    pub(crate) fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    pub(crate) fn launch(msg: impl Into<String>) -> Self {
        Self::KernelLaunch(msg.into())
    }

    pub(crate) fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}
