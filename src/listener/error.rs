use std::{result, sync::Arc};

use thiserror::Error;

use crate::source::error::ValueSourceError;

use super::{config::PollInterval, process::error::ListenerProcessFatalError};

#[derive(Error, Debug)]
pub enum PollIntervalValidationError {
    #[error("Invalid poll interval, must be at least {}", PollInterval::MIN)]
    TooShort,

    #[error("Invalid poll interval, must be at most {}", PollInterval::MAX)]
    TooLong,
}

#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Invalid field(s), not currently provided by the value source: {}", .fields.join(", "))]
    InvalidField { fields: Vec<String> },

    #[error("Failed to enumerate controllers: {0}")]
    Enumerate(ValueSourceError),

    #[error("Listener is already running")]
    AlreadyRunning,

    #[error("Listener must be started from within a Tokio runtime")]
    NoRuntime,

    #[error("Listener iteration failed: {0}")]
    IterationFailed(ListenerProcessFatalError),

    #[error("Listener shutdown procedure failed: {0}")]
    ShutdownFailed(Arc<ListenerProcessFatalError>),
}

pub(super) type Result<T> = result::Result<T, ListenerError>;
