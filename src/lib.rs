#![doc = include_str!("../README.md")]

/// Exports [`RailDriver`] and the [`RailDriverApi`] surface it is built on.
///
/// [`RailDriver`]: crate::driver::RailDriver
/// [`RailDriverApi`]: crate::driver::RailDriverApi
pub mod driver;
/// Exports [`Listener`] and other types related to change notification.
///
/// [`Listener`]: crate::listener::Listener
pub mod listener;
/// Exports the [`ValueSource`] trait, the fixed controller indexes of the special readings, and
/// the values composed from them.
///
/// [`ValueSource`]: crate::source::ValueSource
pub mod source;
mod util;

pub use driver::RailDriver;
pub use listener::{Listener, ListenerConfig};

/// Error types returned by `raildriver`.
pub mod error {
    pub use super::listener::{
        error::{ListenerError, PollIntervalValidationError},
        process::error::ListenerProcessFatalError,
    };
    pub use super::source::error::ValueSourceError;
    pub use super::util::PanicPayload;

    /// Convenience general-purpose Result type alias.
    pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
}
