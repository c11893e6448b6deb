use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};

use tokio::{sync::broadcast, task, time};
use tracing::{error, info};

use crate::util::AbortOnDropHandle;

use super::{
    config::{ListenerConfig, ListenerProcessConfig},
    sampler::Sampler,
    state::ListenerStatusManager,
};

pub(crate) mod error;

use error::{ListenerProcessFatalError, ProcessResult};

pub(super) struct ListenerProcess {
    config: ListenerProcessConfig,
    sampler: Arc<Sampler>,
    status_manager: Arc<ListenerStatusManager>,
}

impl ListenerProcess {
    /// Spawns the sampling loop on the current Tokio runtime.
    ///
    /// `shutdown_rx` must be subscribed before the call so that a stop requested right after
    /// spawning is never missed.
    pub fn spawn(
        config: &ListenerConfig,
        sampler: Arc<Sampler>,
        status_manager: Arc<ListenerStatusManager>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> AbortOnDropHandle<()> {
        let config = config.into();

        tokio::spawn(async move {
            let process = Self {
                config,
                sampler,
                status_manager,
            };

            process.run(shutdown_rx).await
        })
        .into()
    }

    /// Runs one pass on the blocking pool, so slow reads and callbacks never stall the runtime's
    /// workers.
    async fn iterate(&self) -> ProcessResult<()> {
        let sampler = self.sampler.clone();

        task::spawn_blocking(move || {
            panic::catch_unwind(AssertUnwindSafe(|| sampler.iterate())).map_err(|e| {
                ListenerProcessFatalError::IterationPanicked {
                    iteration: sampler.iteration(),
                    payload: e.into(),
                }
            })?
        })
        .await
        .map_err(ListenerProcessFatalError::SamplingPassJoin)?
    }

    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(interval = ?self.config.interval(), "listener started");

        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                biased;
                shutdown_res = shutdown_rx.recv() => {
                    if let Err(e) = shutdown_res {
                        let e = ListenerProcessFatalError::ShutdownSignalRecv(e);
                        error!(error = %e, "listener shutdown signal failed");
                        self.status_manager.terminate(e);
                        return;
                    }

                    info!(iteration = self.sampler.iteration(), "listener stopped");
                    self.status_manager.stopped();
                    return;
                }
                _ = time::sleep(delay) => {}
            }

            if let Err(e) = self.iterate().await {
                error!(
                    iteration = self.sampler.iteration(),
                    error = %e,
                    "listener terminated by fault"
                );
                self.status_manager.terminate(e);
                return;
            }

            delay = self.config.interval();
        }
    }
}
