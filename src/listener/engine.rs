use std::{
    collections::HashSet,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use tokio::{
    runtime::Handle,
    sync::broadcast::{self, error::RecvError},
    time,
};
use tracing::{debug, info, warn};

use crate::{source::ValueSource, util::AbortOnDropHandle};

use super::{
    config::ListenerConfig,
    core::{BindingId, CallbackResult, FieldValue, Sample, SpecialField},
    error::{ListenerError, Result},
    process::{ListenerProcess, error::ListenerProcessFatalError},
    sampler::Sampler,
    state::{ListenerReader, ListenerReceiver, ListenerStatus, ListenerStatusManager},
};

struct RunHandle {
    handle: AbortOnDropHandle<()>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Clears the manual pass flag when the pass ends, even by unwinding.
struct ManualPass<'a>(&'a AtomicBool);

impl Drop for ManualPass<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Polls a [`ValueSource`] in the background and dispatches change callbacks.
///
/// Every pass samples the subscribed controllers plus the seven [`SpecialField`]s, compares each
/// value with the one observed on the previous pass, and invokes the callbacks bound to
/// `on_<field>_change` with `(new, old)` when they differ. The first pass only establishes the
/// baseline and never dispatches.
///
/// Subscriptions and bindings can be changed at any time, including from inside a callback and
/// while the loop is running. Passes run on Tokio's blocking pool, so slow reads and callbacks
/// never stall the runtime. Callbacks run one at a time within a pass, and a slow callback delays
/// the next pass.
///
/// Dropping the `Listener` aborts its sampling task.
pub struct Listener {
    config: ListenerConfig,
    sampler: Arc<Sampler>,
    status_manager: Arc<ListenerStatusManager>,
    run: Mutex<Option<RunHandle>>,
    manual_pass: AtomicBool,
}

impl Listener {
    /// Creates a new idle listener over `source`.
    pub fn new(source: Arc<dyn ValueSource>, config: impl Into<ListenerConfig>) -> Self {
        let config = config.into();

        let (update_tx, _) = broadcast::channel(config.update_channel_capacity());

        Self {
            sampler: Sampler::new(source),
            status_manager: ListenerStatusManager::new(update_tx),
            run: Mutex::new(None),
            manual_pass: AtomicBool::new(false),
            config,
        }
    }

    fn lock_run(&self) -> MutexGuard<'_, Option<RunHandle>> {
        self.run
            .lock()
            .expect("`Listener` mutex can't be poisoned")
    }

    /// Replaces the subscription list with `fields`, preserving their order.
    ///
    /// Every name is checked against a fresh enumeration of the value source. If any of them is not
    /// currently valid, [`ListenerError::InvalidField`] lists all offending names and the previous
    /// subscription list is kept.
    pub fn subscribe<I, S>(&self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();

        let valid: HashSet<String> = self
            .sampler
            .source()
            .enumerate()
            .map_err(ListenerError::Enumerate)?
            .into_iter()
            .map(|(_, name)| name)
            .collect();

        let invalid: Vec<String> = fields
            .iter()
            .filter(|field| !valid.contains(field.as_str()))
            .cloned()
            .collect();

        if !invalid.is_empty() {
            return Err(ListenerError::InvalidField { fields: invalid });
        }

        debug!(fields = ?fields, "subscription replaced");
        *self.sampler.lock_subscriptions() = fields;

        Ok(())
    }

    /// Returns the current subscription list.
    pub fn subscriptions(&self) -> Vec<String> {
        self.sampler.lock_subscriptions().clone()
    }

    /// Registers `callback` for `event`.
    ///
    /// Any event name is accepted. Names that no field maps to (see
    /// [`change_event_name`](super::change_event_name)) are never dispatched. Callbacks bound to
    /// the same event run in registration order.
    ///
    /// A callback returning `Err` or panicking terminates the sampling loop, and the error becomes
    /// the listener's [`fault`](Self::fault).
    pub fn bind<F>(&self, event: impl Into<String>, callback: F) -> BindingId
    where
        F: Fn(&FieldValue, &FieldValue) -> CallbackResult + Send + Sync + 'static,
    {
        self.sampler
            .lock_bindings()
            .insert(event.into(), Arc::new(callback))
    }

    /// Registers `callback` for changes of the special field `field`.
    pub fn bind_special<F>(&self, field: SpecialField, callback: F) -> BindingId
    where
        F: Fn(&FieldValue, &FieldValue) -> CallbackResult + Send + Sync + 'static,
    {
        self.bind(field.event_name(), callback)
    }

    /// Removes the callback registered under `id`. Returns `false` if no such binding exists.
    pub fn unbind(&self, id: BindingId) -> bool {
        self.sampler.lock_bindings().remove(id)
    }

    /// Returns the number of registered callbacks, across all events.
    pub fn binding_count(&self) -> usize {
        self.sampler.lock_bindings().len()
    }

    /// Runs a single sample-diff-dispatch pass on the calling thread.
    ///
    /// Fails with [`ListenerError::AlreadyRunning`] while the sampling loop or another manual pass
    /// is running. [`start`](Self::start) is rejected the same way until the pass returns. Faults
    /// are returned to the caller and do not fill the [`fault`](Self::fault) slot.
    pub fn iterate(&self) -> Result<()> {
        {
            let _run_guard = self.lock_run();

            if self.status_manager.status_snapshot().is_running()
                || self.manual_pass.swap(true, Ordering::AcqRel)
            {
                return Err(ListenerError::AlreadyRunning);
            }
        }

        let _pass = ManualPass(&self.manual_pass);

        self.sampler
            .iterate()
            .map_err(ListenerError::IterationFailed)
    }

    /// Returns the number of passes run so far. Restarting the listener does not reset it.
    pub fn iteration(&self) -> u64 {
        self.sampler.iteration()
    }

    /// Returns a snapshot of the values observed on the latest pass.
    pub fn current_sample(&self) -> Sample {
        self.sampler.lock_samples().current.clone()
    }

    /// Returns a snapshot of the values observed on the pass before the latest one.
    pub fn previous_sample(&self) -> Sample {
        self.sampler.lock_samples().previous.clone()
    }

    /// Spawns the sampling loop on the current Tokio runtime.
    ///
    /// Must be called from within a Tokio runtime. Fails with [`ListenerError::AlreadyRunning`] if
    /// the loop is running, including when a stop was requested but has not taken effect yet.
    /// Starting clears the fault of the previous run.
    pub fn start(&self) -> Result<()> {
        if Handle::try_current().is_err() {
            return Err(ListenerError::NoRuntime);
        }

        let mut run_guard = self.lock_run();

        if self.manual_pass.load(Ordering::Acquire) || !self.status_manager.begin_run() {
            return Err(ListenerError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = ListenerProcess::spawn(
            &self.config,
            self.sampler.clone(),
            self.status_manager.clone(),
            shutdown_rx,
        );

        *run_guard = Some(RunHandle {
            handle,
            shutdown_tx,
        });

        Ok(())
    }

    /// Requests the sampling loop to stop and returns without waiting for it.
    ///
    /// The loop exits before its next pass; a pass in progress is completed first. Calling `stop`
    /// on an idle listener does nothing. Use [`until_stopped`](Self::until_stopped) to wait for the
    /// loop to exit.
    pub fn stop(&self) {
        let run_guard = self.lock_run();

        let Some(run) = run_guard.as_ref() else {
            return;
        };

        if !self.status_manager.initiate_shutdown() {
            return;
        }

        info!("listener stop requested");

        // The loop holds the receiver until it exits
        let _ = run.shutdown_tx.send(());
    }

    /// Stops the sampling loop and waits for it to exit, aborting it after the configured
    /// shutdown timeout.
    ///
    /// Returns an error if the loop had to be aborted. A pass stuck in a value source read keeps
    /// its blocking thread until the read returns. Shutting down an idle listener succeeds.
    pub async fn shutdown(&self) -> Result<()> {
        self.stop();

        let Some(mut run) = self.lock_run().take() else {
            return Ok(());
        };

        if run.handle.is_finished() {
            return Ok(());
        }

        let shutdown_res = tokio::select! {
            join_res = &mut run.handle => {
                join_res.map_err(ListenerProcessFatalError::ListenerProcessTaskJoin)
            }
            _ = time::sleep(self.config.shutdown_timeout()) => {
                run.handle.abort();
                Err(ListenerProcessFatalError::ShutdownTimeout)
            }
        };

        if let Err(e) = shutdown_res {
            warn!(error = %e, "listener shutdown failed");
            let fault = self.status_manager.terminate(e);
            return Err(ListenerError::ShutdownFailed(fault));
        }

        Ok(())
    }

    /// Waits until the sampling loop has exited and returns the final status.
    ///
    /// Returns immediately if the listener is not running.
    pub async fn until_stopped(&self) -> ListenerStatus {
        let mut status_rx = self.update_receiver();

        let status = self.status_snapshot();
        if !status.is_running() {
            return status;
        }

        loop {
            match status_rx.recv().await {
                Ok(status) => {
                    if status.is_stopped() {
                        return status;
                    }
                }
                Err(RecvError::Lagged(_)) => {
                    let status = self.status_snapshot();
                    if status.is_stopped() {
                        return status;
                    }
                }
                Err(RecvError::Closed) => return self.status_snapshot(),
            }
        }
    }

    /// Returns `true` while the sampling loop is running.
    pub fn is_running(&self) -> bool {
        self.status_snapshot().is_running()
    }

    /// Returns the fault that terminated the latest run, if any.
    pub fn fault(&self) -> Option<Arc<ListenerProcessFatalError>> {
        self.status_manager.fault()
    }

    /// Returns the current [`ListenerStatus`] as a snapshot.
    pub fn status_snapshot(&self) -> ListenerStatus {
        self.status_manager.status_snapshot()
    }

    /// Creates a new [`ListenerReceiver`] for subscribing to status updates.
    pub fn update_receiver(&self) -> ListenerReceiver {
        self.status_manager.update_receiver()
    }

    /// Returns a [`ListenerReader`] that observes the status of this listener.
    pub fn reader(&self) -> Arc<dyn ListenerReader> {
        self.status_manager.clone()
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("config", &self.config)
            .field("status", &self.status_snapshot())
            .field("iteration", &self.iteration())
            .field("subscriptions", &self.subscriptions())
            .finish()
    }
}
