mod config;
mod core;
mod engine;
pub(crate) mod error;
pub(crate) mod process;
mod sampler;
mod state;

pub use config::{ListenerConfig, PollInterval};
pub use core::{
    BindingId, CallbackError, CallbackResult, FieldValue, SPECIAL_FIELD_MARKER, Sample,
    SpecialField, change_event_name,
};
pub use engine::Listener;
pub use state::{ListenerReader, ListenerReceiver, ListenerStatus};
