use std::{
    any::Any,
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::task::{JoinError, JoinHandle};

/// Task handle that aborts its task when dropped.
///
/// Dropping a [`Listener`](crate::listener::Listener) drops the handle of its sampling task, so a
/// forgotten listener never keeps polling in the background. Aborting does not interrupt a pass
/// already running on the blocking pool; that pass completes and its task exits.
#[derive(Debug)]
pub(crate) struct AbortOnDropHandle<T>(JoinHandle<T>);

impl<T> AbortOnDropHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    pub fn abort(&self) {
        self.0.abort();
    }
}

impl<T> From<JoinHandle<T>> for AbortOnDropHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        Self(handle)
    }
}

impl<T> Future for AbortOnDropHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDropHandle<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Message of a caught panic, as passed to `panic!`.
#[derive(Debug)]
pub struct PanicPayload(String);

impl From<Box<dyn Any + Send>> for PanicPayload {
    fn from(value: Box<dyn Any + Send>) -> Self {
        let message = match value.downcast::<String>() {
            Ok(message) => *message,
            Err(value) => value
                .downcast_ref::<&str>()
                .map_or_else(|| "unknown panic payload".to_string(), |s| s.to_string()),
        };

        Self(message)
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn panic_payload_from_str_message() {
        let payload: PanicPayload = panic::catch_unwind(|| panic!("boom")).unwrap_err().into();
        assert_eq!(payload.to_string(), "boom");
    }

    #[test]
    fn panic_payload_from_formatted_message() {
        let field = "Reverser";
        let payload: PanicPayload = panic::catch_unwind(|| panic!("bad {field}"))
            .unwrap_err()
            .into();
        assert_eq!(payload.to_string(), "bad Reverser");
    }

    #[test]
    fn panic_payload_from_unknown_type() {
        let payload: PanicPayload = panic::catch_unwind(|| panic::panic_any(42_u8))
            .unwrap_err()
            .into();
        assert_eq!(payload.to_string(), "unknown panic payload");
    }
}
