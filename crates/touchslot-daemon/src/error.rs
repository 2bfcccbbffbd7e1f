//! Daemon errors.

use thiserror::Error;

use crate::mapping::MappingError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("conflicting options: {0}")]
    Conflict(String),

    #[error("input error: {0}")]
    Input(#[from] touchslot_input::InputError),

    #[error("display size query failed: {0}")]
    DisplaySize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DaemonError {
    /// Process exit code for a fatal startup error of this class.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Mapping(_) => 1,
            Self::Conflict(_) => 2,
            Self::Input(_) => 3,
            Self::DisplaySize(_) => 4,
            Self::Io(_) | Self::Other(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_class() {
        assert_eq!(DaemonError::Config("x".into()).exit_code(), 1);
        assert_eq!(
            DaemonError::Mapping(MappingError::ZeroScreen).exit_code(),
            1
        );
        assert_eq!(DaemonError::Conflict("x".into()).exit_code(), 2);
        assert_eq!(
            DaemonError::Input(touchslot_input::InputError::Unavailable).exit_code(),
            3
        );
        assert_eq!(DaemonError::DisplaySize("x".into()).exit_code(), 4);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "x");
        assert_eq!(DaemonError::Io(io).exit_code(), 5);
    }
}
