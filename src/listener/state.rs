use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::broadcast;

use super::process::error::ListenerProcessFatalError;

/// Lifecycle status of a [`Listener`](super::Listener)'s sampling loop.
#[derive(Debug, Clone)]
pub enum ListenerStatus {
    /// The listener has never been started.
    NotStarted,
    /// The sampling loop is running.
    Running,
    /// A stop was requested and the loop has not exited yet.
    ShutdownInitiated,
    /// The sampling loop exited after a stop request.
    Stopped,
    /// The sampling loop exited because of a fault.
    Terminated(Arc<ListenerProcessFatalError>),
}

impl ListenerStatus {
    /// Returns `true` while a sampling loop is alive, including after a stop was requested but
    /// before the loop observed it.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running | Self::ShutdownInitiated)
    }

    /// Returns `true` if the sampling loop has exited (either stopped or terminated).
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped | Self::Terminated(_))
    }
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "Not started"),
            Self::Running => write!(f, "Running"),
            Self::ShutdownInitiated => write!(f, "Shutdown initiated"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Terminated(error) => write!(f, "Terminated: {error}"),
        }
    }
}

impl From<Arc<ListenerProcessFatalError>> for ListenerStatus {
    fn from(value: Arc<ListenerProcessFatalError>) -> Self {
        Self::Terminated(value)
    }
}

impl From<ListenerProcessFatalError> for ListenerStatus {
    fn from(value: ListenerProcessFatalError) -> Self {
        Arc::new(value).into()
    }
}

pub(super) type ListenerTransmitter = broadcast::Sender<ListenerStatus>;

/// Receiver for subscribing to [`ListenerStatus`] updates.
pub type ListenerReceiver = broadcast::Receiver<ListenerStatus>;

/// Trait for reading the listener status and subscribing to its updates.
///
/// Provides a read-only interface to the sampling loop state without the ability to control it.
pub trait ListenerReader: Send + Sync + 'static {
    /// Creates a new [`ListenerReceiver`] for subscribing to status updates.
    fn update_receiver(&self) -> ListenerReceiver;

    /// Returns the current [`ListenerStatus`] as a snapshot.
    fn status_snapshot(&self) -> ListenerStatus;

    /// Returns the fault that terminated the most recent run, if any.
    fn fault(&self) -> Option<Arc<ListenerProcessFatalError>>;
}

struct StatusState {
    status: ListenerStatus,
    fault: Option<Arc<ListenerProcessFatalError>>,
}

pub(super) struct ListenerStatusManager {
    state: Mutex<StatusState>,
    update_tx: ListenerTransmitter,
}

impl ListenerStatusManager {
    pub fn new(update_tx: ListenerTransmitter) -> Arc<Self> {
        let state = Mutex::new(StatusState {
            status: ListenerStatus::NotStarted,
            fault: None,
        });

        Arc::new(Self { state, update_tx })
    }

    fn lock_state(&self) -> MutexGuard<'_, StatusState> {
        self.state
            .lock()
            .expect("`ListenerStatusManager` mutex can't be poisoned")
    }

    fn send(&self, status: ListenerStatus) {
        // Ignore no-receivers errors
        let _ = self.update_tx.send(status);
    }

    /// Marks a new run as started, clearing the fault of the previous run.
    ///
    /// Returns `false`, leaving the state untouched, if a run is still alive.
    pub fn begin_run(&self) -> bool {
        let mut state_guard = self.lock_state();
        if state_guard.status.is_running() {
            return false;
        }

        state_guard.status = ListenerStatus::Running;
        state_guard.fault = None;
        drop(state_guard);

        self.send(ListenerStatus::Running);
        true
    }

    /// Moves `Running` to `ShutdownInitiated`. Returns `false` in any other state.
    pub fn initiate_shutdown(&self) -> bool {
        let mut state_guard = self.lock_state();
        if !matches!(state_guard.status, ListenerStatus::Running) {
            return false;
        }

        state_guard.status = ListenerStatus::ShutdownInitiated;
        drop(state_guard);

        self.send(ListenerStatus::ShutdownInitiated);
        true
    }

    pub fn stopped(&self) {
        let mut state_guard = self.lock_state();
        if !state_guard.status.is_running() {
            return;
        }

        state_guard.status = ListenerStatus::Stopped;
        drop(state_guard);

        self.send(ListenerStatus::Stopped);
    }

    /// Stores `error` in the fault slot, unless it is already taken, and terminates the run.
    pub fn terminate(&self, error: ListenerProcessFatalError) -> Arc<ListenerProcessFatalError> {
        let mut state_guard = self.lock_state();
        let fault = state_guard.fault.get_or_insert_with(|| Arc::new(error)).clone();
        state_guard.status = ListenerStatus::Terminated(fault.clone());
        drop(state_guard);

        self.send(ListenerStatus::Terminated(fault.clone()));
        fault
    }
}

impl ListenerReader for ListenerStatusManager {
    fn update_receiver(&self) -> ListenerReceiver {
        self.update_tx.subscribe()
    }

    fn status_snapshot(&self) -> ListenerStatus {
        self.lock_state().status.clone()
    }

    fn fault(&self) -> Option<Arc<ListenerProcessFatalError>> {
        self.lock_state().fault.clone()
    }
}
