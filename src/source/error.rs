use std::result;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueSourceError {
    #[error("Controller index not found for {name}")]
    ControllerNotFound { name: String },

    #[error("Controller index {index} is not valid")]
    IndexNotFound { index: u32 },

    #[error("Invalid clock time reading {hour}:{minute}:{second}")]
    InvalidClockTime { hour: f64, minute: f64, second: f64 },

    #[error("Malformed loco name `{raw}`, expected `provider.:.product.:.engine`")]
    MalformedLocoName { raw: String },

    #[error("RailDriver API error: {0}")]
    Api(String),
}

impl ValueSourceError {
    /// Returns `true` if the error reports a controller that is not (or no longer) valid.
    ///
    /// Callers polling controller values use this to tell a vanished controller apart from a
    /// genuine failure of the underlying interface.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ControllerNotFound { .. } | Self::IndexNotFound { .. }
        )
    }
}

pub type Result<T> = result::Result<T, ValueSourceError>;
