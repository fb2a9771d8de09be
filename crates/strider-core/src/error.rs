//! Construction-time configuration errors.

use thiserror::Error;

/// Invalid configuration detected while building a component. These are
/// fatal: the process should exit rather than run with a half-built robot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid gait group size: {0} (must be 1, 2, or 3)")]
    InvalidGroupSize(usize),

    #[error("invalid target frame rate: {0} (must be > 0)")]
    InvalidFps(u32),

    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}
