use std::result;

use thiserror::Error;
use tokio::{sync::broadcast::error::RecvError, task::JoinError};

use crate::{source::error::ValueSourceError, util::PanicPayload};

use super::super::core::{CallbackError, SpecialField};

/// Faults that terminate the sampling loop.
///
/// A subscribed controller that is no longer valid is not a fault; it is dropped from the current
/// sample and polling continues.
#[derive(Error, Debug)]
pub enum ListenerProcessFatalError {
    #[error("Reading subscribed field `{field}` failed: {source}")]
    FieldRead {
        field: String,
        source: ValueSourceError,
    },

    #[error("Reading special field `{field}` failed: {source}")]
    SpecialFieldRead {
        field: SpecialField,
        source: ValueSourceError,
    },

    #[error("`{event}` callback panicked: {payload}")]
    CallbackPanicked {
        event: String,
        payload: PanicPayload,
    },

    #[error("`{event}` callback error: {error}")]
    CallbackFailed { event: String, error: CallbackError },

    #[error("Iteration {iteration} panicked: {payload}")]
    IterationPanicked { iteration: u64, payload: PanicPayload },

    #[error("Sampling pass join error: {0}")]
    SamplingPassJoin(JoinError),

    #[error("Shutdown `RecvError` error: {0}")]
    ShutdownSignalRecv(RecvError),

    #[error("TaskJoin error {0}")]
    ListenerProcessTaskJoin(JoinError),

    #[error("Listener shutdown timeout error")]
    ShutdownTimeout,
}

pub(crate) type ProcessResult<T> = result::Result<T, ListenerProcessFatalError>;
