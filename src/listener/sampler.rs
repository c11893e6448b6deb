use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicU64, Ordering},
};

use strum::IntoEnumIterator;
use tracing::debug;

use crate::source::ValueSource;

use super::{
    core::{
        BindingTable, FieldValue, Sample, SpecialField, change_event_name, invoke_callback,
    },
    process::error::{ListenerProcessFatalError, ProcessResult},
};

#[derive(Debug, Default)]
pub(super) struct SampleBuffers {
    pub current: Sample,
    pub previous: Sample,
}

/// State shared between a [`Listener`](super::Listener) and its sampling task.
///
/// No lock is held while the value source is read or while callbacks run, so callbacks are free
/// to call back into the listener (e.g. to bind or subscribe).
pub(super) struct Sampler {
    source: Arc<dyn ValueSource>,
    subscriptions: Mutex<Vec<String>>,
    bindings: Mutex<BindingTable>,
    samples: Mutex<SampleBuffers>,
    iteration: AtomicU64,
}

impl Sampler {
    pub fn new(source: Arc<dyn ValueSource>) -> Arc<Self> {
        Arc::new(Self {
            source,
            subscriptions: Mutex::new(Vec::new()),
            bindings: Mutex::new(BindingTable::default()),
            samples: Mutex::new(SampleBuffers::default()),
            iteration: AtomicU64::new(0),
        })
    }

    pub fn source(&self) -> &dyn ValueSource {
        self.source.as_ref()
    }

    pub fn lock_subscriptions(&self) -> MutexGuard<'_, Vec<String>> {
        self.subscriptions
            .lock()
            .expect("`Sampler` subscriptions mutex can't be poisoned")
    }

    pub fn lock_bindings(&self) -> MutexGuard<'_, BindingTable> {
        self.bindings
            .lock()
            .expect("`Sampler` bindings mutex can't be poisoned")
    }

    pub fn lock_samples(&self) -> MutexGuard<'_, SampleBuffers> {
        self.samples
            .lock()
            .expect("`Sampler` samples mutex can't be poisoned")
    }

    pub fn iteration(&self) -> u64 {
        self.iteration.load(Ordering::Acquire)
    }

    /// Runs one sample-diff-dispatch pass.
    ///
    /// Changes are only dispatched from the second pass on; the first pass establishes the
    /// baseline.
    pub fn iterate(&self) -> ProcessResult<()> {
        let iteration = self.iteration.fetch_add(1, Ordering::AcqRel) + 1;
        let dispatch = iteration > 1;

        let previous = {
            let mut samples = self.lock_samples();
            samples.previous = samples.current.clone();
            samples.previous.clone()
        };

        let subscriptions = self.lock_subscriptions().clone();

        for field in &subscriptions {
            match self.source.read(field.into()) {
                Ok(value) => {
                    let event = change_event_name(field);
                    self.record(field, value.into(), &previous, dispatch, &event)?;
                }
                Err(e) if e.is_not_found() => {
                    if self.lock_samples().current.remove(field).is_some() {
                        debug!(iteration, field = %field, "subscribed field is no longer valid");
                    }
                }
                Err(source) => {
                    return Err(ListenerProcessFatalError::FieldRead {
                        field: field.clone(),
                        source,
                    });
                }
            }
        }

        for special in SpecialField::iter() {
            let value = special
                .read(self.source())
                .map_err(|source| ListenerProcessFatalError::SpecialFieldRead {
                    field: special,
                    source,
                })?;

            self.record(
                special.identifier(),
                value,
                &previous,
                dispatch,
                special.event_name(),
            )?;
        }

        Ok(())
    }

    fn record(
        &self,
        field: &str,
        value: FieldValue,
        previous: &Sample,
        dispatch: bool,
        event: &str,
    ) -> ProcessResult<()> {
        self.lock_samples().current.insert(field, value.clone());

        let old = previous.get(field);
        if !dispatch || value == *old {
            return Ok(());
        }

        let callbacks = self.lock_bindings().callbacks(event);

        debug!(
            event,
            new = %value,
            old = %old,
            callbacks = callbacks.len(),
            "dispatching change"
        );

        for callback in &callbacks {
            invoke_callback(callback, event, &value, old)?;
        }

        Ok(())
    }
}
